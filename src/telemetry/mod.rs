//! Logging setup.

mod tracing;

pub use self::tracing::{init_tracing, TracingConfig};
