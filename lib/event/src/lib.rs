mod macros;
mod metric;
mod service_check;
pub mod tags;

pub use metric::{Metric, MetricKind};
pub use service_check::{ServiceCheck, ServiceCheckStatus};
pub use tags::Tags;

pub trait ByteSizeOf {
    /// Returns the in-memory size of this type
    ///
    /// This function returns the total number of bytes that
    /// [`std::mem::size_of`] does in addition to any interior
    /// allocated bytes. It default implementation is `std::mem::size_of`
    /// + `ByteSizeOf::allocated_bytes`
    fn size_of(&self) -> usize {
        std::mem::size_of_val(self) + self.allocated_bytes()
    }

    /// Returns the allocated bytes of this type
    fn allocated_bytes(&self) -> usize;
}

impl ByteSizeOf for String {
    fn allocated_bytes(&self) -> usize {
        self.len()
    }
}

impl<T> ByteSizeOf for Vec<T>
where
    T: ByteSizeOf,
{
    fn allocated_bytes(&self) -> usize {
        self.iter().fold(0, |acc, i| acc + i.size_of())
    }
}
