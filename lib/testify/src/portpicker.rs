use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rand::Rng;

use crate::{Port, is_free_tcp, test_bind_tcp};

/// Asks the OS for a free port
fn ask_free_tcp_port(ip: IpAddr) -> Option<Port> {
    test_bind_tcp(SocketAddr::new(ip, 0))
}

/// Picks a TCP port that nothing listens on, so connecting to it is refused.
/// ```rust
/// use testify::pick_unused_port;
/// use std::net::{IpAddr, Ipv4Addr};
/// let port: u16 = pick_unused_port(IpAddr::V4(Ipv4Addr::LOCALHOST));
/// ```
pub fn pick_unused_port(ip: IpAddr) -> Port {
    let mut rng = rand::rng();

    loop {
        // Try random port first
        for _ in 0..10 {
            let port = rng.random_range(15000..25000);
            if is_free_tcp(ip, port) {
                return port;
            }
        }

        // Ask the OS for a port
        for _ in 0..10 {
            if let Some(port) = ask_free_tcp_port(ip) {
                return port;
            }
        }
    }
}

pub fn pick_unused_local_port() -> Port {
    pick_unused_port(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
