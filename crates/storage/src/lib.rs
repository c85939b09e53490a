//! MySQL persistence layer.
//!
//! Dimension rows get plain CRUD; fact rows get natural-key upserts only.
//! The store traits in [`stores`] are the seam the ingestion engine and the
//! read path program against; the sqlx repositories implement them.

pub mod client;
pub mod config;
pub mod health;
pub mod repos;
pub mod schema;
pub mod stores;

pub use client::Storage;
pub use config::StorageConfig;
pub use repos::{
    CounterRepo, DirectRepo, GoalRepo, MetricsRepo, ProjectRepo, SeoRepo, UserRepo,
};
pub use stores::*;
