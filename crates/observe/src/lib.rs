//! Observability setup shared between the binaries: logging initialization
//! and a panic hook that routes panics through the log format.
pub mod tracing;
