/// Build a [`Tags`](crate::Tags) from `key => value` pairs, every pair is
/// rendered as `key:value`.
#[macro_export]
macro_rules! tags {
    ( $($x:expr => $y:expr),* ) => ({
        #[allow(unused_mut)]
        let mut _tags = $crate::Tags::default();
        $(
            _tags.insert_pair($x, $y);
        )*
        _tags
    });
    ( $($x:expr => $y:expr,)* ) => (
        $crate::tags!{$($x => $y),*}
    );
}
