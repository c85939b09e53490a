//! Domain rows: dimension entities (admin-mutated) and monthly fact rows
//! (written only by the ingestion engine, keyed by natural tuple).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global user roles.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const USER: &str = "user";

    /// Per-project roles.
    pub const MANAGER: &str = "manager";
    pub const VIEWER: &str = "viewer";
}

/// A client project: the tenant axis. Every fact row is scoped to one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub timezone: String,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Yandex Metrika counter linked to a project.
///
/// At most one counter per project carries `is_primary = true`; the primary
/// counter's goals drive conversion measurement.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Counter {
    pub id: i64,
    pub project_id: i64,
    /// Vendor-side counter id.
    pub counter_id: i64,
    pub name: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Metrika goal, child of a counter.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Goal {
    pub id: i64,
    /// Local counter row id (not the vendor counter id).
    pub counter_id: i64,
    /// Vendor-assigned goal id.
    pub goal_id: i64,
    pub name: String,
    pub is_conversion: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Yandex Direct account linked to a project, unique per client login.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectAccount {
    pub id: i64,
    pub project_id: i64,
    pub client_login: String,
    pub account_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Direct campaign, child of an account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectCampaign {
    pub id: i64,
    pub direct_account_id: i64,
    /// Vendor-assigned campaign id.
    pub campaign_id: i64,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Age buckets used by the Metrika age breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBucket {
    #[serde(rename = "18-24")]
    From18To24,
    #[serde(rename = "25-34")]
    From25To34,
    #[serde(rename = "35-44")]
    From35To44,
    #[serde(rename = "45-54")]
    From45To54,
    #[serde(rename = "55+")]
    From55,
    #[serde(rename = "unknown")]
    Unknown,
}

impl AgeBucket {
    pub const ALL: &'static [AgeBucket] = &[
        AgeBucket::From18To24,
        AgeBucket::From25To34,
        AgeBucket::From35To44,
        AgeBucket::From45To54,
        AgeBucket::From55,
        AgeBucket::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From18To24 => "18-24",
            Self::From25To34 => "25-34",
            Self::From35To44 => "35-44",
            Self::From45To54 => "45-54",
            Self::From55 => "55+",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a vendor age-interval name to a bucket. Anything outside the
    /// known intervals aggregates under `unknown`.
    pub fn from_interval(name: &str) -> Self {
        match name.trim() {
            "18-24" => Self::From18To24,
            "25-34" => Self::From25To34,
            "35-44" => Self::From35To44,
            "45-54" => Self::From45To54,
            "55+" | "55 +" => Self::From55,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monthly aggregated Metrika metrics. Natural key: (project, year, month).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricsMonthly {
    pub id: i64,
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub visits: i64,
    pub users: i64,
    pub bounce_rate: f64,
    pub avg_session_duration_sec: i64,
    pub conversions: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Monthly metrics broken down by age bucket.
/// Natural key: (project, year, month, age_bucket).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricsAgeMonthly {
    pub id: i64,
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub age_bucket: String,
    pub visits: i64,
    pub users: i64,
    pub bounce_rate: f64,
    pub avg_session_duration_sec: i64,
    pub created_at: DateTime<Utc>,
}

/// Monthly metrics for a single Direct campaign.
/// Natural key: (project, campaign, year, month).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectCampaignMonthly {
    pub id: i64,
    pub project_id: i64,
    pub direct_campaign_id: i64,
    pub year: i32,
    pub month: i32,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr_pct: f64,
    pub cpc: f64,
    pub conversions: Option<i64>,
    pub cpa: Option<f64>,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

/// Monthly totals across all Direct campaigns of a project.
/// Natural key: (project, year, month).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectTotalsMonthly {
    pub id: i64,
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr_pct: f64,
    pub cpc: f64,
    pub conversions: Option<i64>,
    pub cpa: Option<f64>,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

/// Monthly SEO query positions.
/// Natural key: (project, year, month, query).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeoQueryMonthly {
    pub id: i64,
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub query: String,
    pub position: i32,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An API user. `role` is a global role (`admin` / `user`); per-project
/// roles live in [`UserProjectRole`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's role on a project (`manager` / `viewer`). Admins bypass this.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProjectRole {
    pub user_id: i64,
    pub project_id: i64,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
