//! Logging setup.

pub mod tracing;

pub use tracing::init_telemetry;
