//! Core types, period math, and errors for the BI backend.

pub mod error;
pub mod models;
pub mod period;

pub use error::{Error, Result};
pub use models::*;
pub use period::*;
