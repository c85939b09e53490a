//! Tracing and component health for the BI backend.

pub mod health;
pub mod tracing_setup;

pub use health::{health, ComponentHealth, HealthReport, HealthRegistry, HealthStatus};
pub use tracing_setup::{init_tracing, init_tracing_from_env, TracingConfig};
