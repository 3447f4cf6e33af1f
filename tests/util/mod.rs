#![allow(dead_code)]

mod trace;

pub use trace::trace_init;

use mcache::config::CheckConfig;
use mcache::checks::memcached::InstanceConfig;
use testify::memcached::Responses;

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/memcached/{name}.txt"))
        .expect("read fixture")
}

/// Replies of a healthy memcached 1.6 with one slab class in use.
pub fn responses() -> Responses {
    Responses::new()
        .with("stats", fixture("stats"))
        .with("stats items", fixture("items"))
        .with("stats slabs", fixture("slabs"))
}

pub fn check_config(instances: Vec<InstanceConfig>) -> CheckConfig {
    CheckConfig {
        init_config: None,
        instances,
    }
}
