//! Yandex Direct client: campaign lists and performance reports.
//!
//! The Direct v5 API takes JSON-RPC-flavored bodies (`method` + `params`)
//! and can return its error envelope inside an HTTP 200 response; that
//! envelope is always a permanent error.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use bi_core::{Error, Result};

use crate::config::YandexConfig;
use crate::{ensure_success, map_transport_error};

const PRODUCTION_BASE_URL: &str = "https://api.direct.yandex.com/json/v5";
const SANDBOX_BASE_URL: &str = "https://api-sandbox.direct.yandex.com/json/v5";

/// A campaign id/name pair from the campaigns endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CampaignRef {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// One row of the campaign performance report.
///
/// The vendor's aggregated `CTR`/`AvgCpc` are carried but never trusted:
/// the ingestion engine recomputes ratios from the raw counters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CampaignReportRow {
    #[serde(rename = "CampaignId")]
    pub campaign_id: i64,
    #[serde(rename = "CampaignName", default)]
    pub campaign_name: String,
    #[serde(rename = "Impressions", default)]
    pub impressions: i64,
    #[serde(rename = "Clicks", default)]
    pub clicks: i64,
    #[serde(rename = "Cost", default)]
    pub cost: f64,
    #[serde(rename = "CTR", default)]
    pub ctr: f64,
    #[serde(rename = "AvgCpc", default)]
    pub avg_cpc: f64,
    #[serde(rename = "Conversions", default)]
    pub conversions: Option<i64>,
    #[serde(rename = "CPA", default)]
    pub cpa: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error_string: String,
    #[serde(default)]
    error_code: i64,
}

#[derive(Debug, Deserialize)]
struct CampaignsResponse {
    #[serde(default)]
    result: Option<CampaignsResult>,
    #[serde(default)]
    error: Option<ApiErrorEnvelope>,
}

#[derive(Debug, Deserialize)]
struct CampaignsResult {
    #[serde(rename = "Campaigns", default)]
    campaigns: Vec<CampaignRef>,
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    #[serde(default)]
    result: Option<ReportResult>,
    #[serde(default)]
    error: Option<ApiErrorEnvelope>,
}

#[derive(Debug, Deserialize)]
struct ReportResult {
    #[serde(rename = "Report")]
    report: ReportBody,
}

#[derive(Debug, Deserialize)]
struct ReportBody {
    #[serde(rename = "Rows", default)]
    rows: Vec<CampaignReportRow>,
}

/// Direct API client, bound to one sub-account (`Client-Login`).
#[derive(Clone)]
pub struct DirectClient {
    http: reqwest::Client,
    token: String,
    client_login: String,
    base_url: String,
}

impl DirectClient {
    /// Creates a client for a sub-account against production or sandbox,
    /// depending on configuration.
    pub fn new(config: &YandexConfig, client_login: impl Into<String>) -> Result<Self> {
        let base_url = if config.direct_sandbox {
            SANDBOX_BASE_URL
        } else {
            PRODUCTION_BASE_URL
        };
        Self::with_base_url(config, client_login, base_url)
    }

    /// Creates a client against a custom base URL (tests).
    pub fn with_base_url(
        config: &YandexConfig,
        client_login: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            token: config.oauth_token.clone(),
            client_login: client_login.into(),
            base_url: base_url.into(),
        })
    }

    pub fn client_login(&self) -> &str {
        &self.client_login
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Client-Login", &self.client_login)
            .header("Accept-Language", "ru")
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        ensure_success(resp).await
    }

    /// Lists campaigns of the sub-account.
    pub async fn list_campaigns(&self) -> Result<Vec<CampaignRef>> {
        let body = json!({
            "method": "get",
            "params": {
                "SelectionCriteria": {},
                "FieldNames": ["Id", "Name"],
            },
        });

        let resp = self.post("/campaigns", body).await?;
        let parsed: CampaignsResponse = resp
            .json()
            .await
            .map_err(|e| Error::vendor_permanent(None, format!("invalid campaigns response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(vendor_envelope_error(err));
        }

        let campaigns = parsed.result.map(|r| r.campaigns).unwrap_or_default();
        debug!(
            client_login = %self.client_login,
            count = campaigns.len(),
            "Listed Direct campaigns"
        );
        Ok(campaigns)
    }

    /// Fetches the campaign performance report for a date window.
    pub async fn get_campaign_report(
        &self,
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<CampaignReportRow>> {
        let body = json!({
            "method": "get",
            "params": {
                "SelectionCriteria": {
                    "DateFrom": date_from,
                    "DateTo": date_to,
                },
                "FieldNames": [
                    "CampaignId", "CampaignName", "Impressions", "Clicks",
                    "Cost", "Ctr", "AvgCpc", "Conversions", "CostPerConversion",
                ],
                "ReportName": format!("campaign-performance-{date_from}-{date_to}"),
                "ReportType": "CAMPAIGN_PERFORMANCE_REPORT",
                "DateRangeType": "CUSTOM_DATE",
                "Format": "JSON",
                "IncludeVAT": "YES",
            },
        });

        let resp = self.post("/reports", body).await?;
        let parsed: ReportResponse = resp
            .json()
            .await
            .map_err(|e| Error::vendor_permanent(None, format!("invalid report response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(vendor_envelope_error(err));
        }

        let rows = parsed.result.map(|r| r.report.rows).unwrap_or_default();
        debug!(
            client_login = %self.client_login,
            rows = rows.len(),
            date_from,
            date_to,
            "Fetched Direct campaign report"
        );
        Ok(rows)
    }
}

fn vendor_envelope_error(err: ApiErrorEnvelope) -> Error {
    Error::vendor_permanent(
        Some(err.error_code),
        format!("API error: {} (code: {})", err.error_string, err.error_code),
    )
}
