//! Ingestion pipeline and background work.
//!
//! The sync engine pulls vendor data and reconciles it into monthly fact
//! rows under the natural-key upsert contract. Queue handlers wrap the
//! engine; the cron scheduler fans out per-project jobs.

pub mod aggregate;
pub mod analyze;
pub mod handlers;
pub mod scheduler;
pub mod sync;

pub use aggregate::{recompute_ratios, AdsAccumulator, AdsRatios, TrafficAccumulator};
pub use analyze::{AiClient, AiConfig};
pub use handlers::register_handlers;
pub use scheduler::CronScheduler;
pub use sync::SyncEngine;
