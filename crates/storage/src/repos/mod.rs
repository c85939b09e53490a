//! sqlx repository implementations of the store traits.

mod counters;
mod direct;
mod goals;
mod metrics;
mod projects;
mod seo;
mod users;

pub use counters::CounterRepo;
pub use direct::DirectRepo;
pub use goals::GoalRepo;
pub use metrics::MetricsRepo;
pub use projects::ProjectRepo;
pub use seo::SeoRepo;
pub use users::UserRepo;

use bi_core::Error;

/// Maps an insert failure, turning a unique-index violation into `Conflict`.
pub(crate) fn map_insert_error(e: sqlx::Error, what: &str) -> Error {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return Error::conflict(format!("{what} already exists"));
        }
    }
    e.into()
}
