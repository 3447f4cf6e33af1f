#[macro_use]
extern crate tracing;

pub mod aggregator;
pub mod checks;
pub mod config;
pub mod recorder;
pub mod runner;
pub mod trace;

/// The version string printed by `--version`.
pub fn get_version() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
