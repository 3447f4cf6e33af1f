pub mod memcached;
mod portpicker;
pub mod random;
pub mod temp;
pub mod wait;

// re-export
pub use portpicker::{pick_unused_local_port, pick_unused_port};

use std::net::{IpAddr, SocketAddr, TcpListener, ToSocketAddrs};

pub type Port = u16;

// Try to bind to a socket using TCP
fn test_bind_tcp<A: ToSocketAddrs>(addr: A) -> Option<Port> {
    Some(TcpListener::bind(addr).ok()?.local_addr().ok()?.port())
}

/// Check if a port is free on TCP
pub fn is_free_tcp(ip: IpAddr, port: Port) -> bool {
    test_bind_tcp(SocketAddr::new(ip, port)).is_some()
}
