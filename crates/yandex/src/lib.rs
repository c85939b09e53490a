//! Yandex Metrika and Direct API clients.
//!
//! Both clients are thin stateless transports over HTTPS + JSON. They map
//! failures onto the transient/permanent vendor taxonomy and never retry;
//! retry policy belongs to the job queue.

pub mod capabilities;
pub mod config;
pub mod direct;
pub mod metrika;

pub use capabilities::{AdsApi, AdsApiFactory, AnalyticsApi, DirectClientFactory};
pub use config::YandexConfig;
pub use direct::{CampaignRef, CampaignReportRow, DirectClient};
pub use metrika::{AgeBreakdownRow, GoalConversions, GoalDefinition, MetrikaClient, TrafficSummary};

use bi_core::{Error, Result};

/// Maps a reqwest transport error (timeout, connect failure, broken pipe)
/// to a transient vendor error.
pub(crate) fn map_transport_error(err: reqwest::Error) -> Error {
    Error::vendor_transient(None, format!("transport error: {err}"))
}

/// Checks the HTTP status of a vendor response.
///
/// 429 and 5xx are transient; any other non-2xx is permanent.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let code = Some(status.as_u16() as i64);
    let body = resp.text().await.unwrap_or_default();
    let message = format!("HTTP {status}: {body}");

    if status.as_u16() == 429 || status.is_server_error() {
        Err(Error::vendor_transient(code, message))
    } else {
        Err(Error::vendor_permanent(code, message))
    }
}
