//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use bi_core::User;
use cache::Cache;
use queue::QueueClient;
use report::{MarketingService, ReportService};
use storage::{
    CounterStore, DirectStore, GoalStore, MetricsStore, ProjectStore, SeoStore, UserStore,
};
use yandex::AnalyticsApi;

use crate::credentials::EnvCredentialStore;
use crate::middleware::auth::AuthKeys;
use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};

/// Cache TTL for user records looked up during JWT validation.
const USER_CACHE_TTL: Duration = Duration::from_secs(30);

/// Maximum cached user records.
const USER_CACHE_MAX_CAPACITY: u64 = 10_000;

/// OAuth authorization-code flow settings.
#[derive(Clone)]
pub struct OauthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: String,
    /// Backend URL, used to build the callback redirect URI.
    pub app_url: String,
    /// Frontend URL to land on after the flow completes.
    pub frontend_url: String,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<dyn ProjectStore>,
    pub counters: Arc<dyn CounterStore>,
    pub goals: Arc<dyn GoalStore>,
    pub direct: Arc<dyn DirectStore>,
    pub metrics: Arc<dyn MetricsStore>,
    pub seo: Arc<dyn SeoStore>,
    pub users: Arc<dyn UserStore>,

    /// Dimension cache; absent when Redis is down at boot.
    pub cache: Option<Cache>,
    pub queue: QueueClient,
    pub reports: Arc<ReportService>,
    pub marketing: Arc<MarketingService>,
    /// Metrika capability used by the goal-import admin endpoint.
    pub analytics: Arc<dyn AnalyticsApi>,

    /// Defaults applied to newly created projects.
    pub default_timezone: String,
    pub default_currency: String,

    pub auth: Arc<AuthKeys>,
    /// Short-TTL cache of user records hit on every authenticated request.
    pub user_cache: MokaCache<i64, User>,
    pub rate_limiter: SharedRateLimiter,
    /// Stricter bucket for the auth endpoints.
    pub auth_limiter: SharedRateLimiter,

    pub oauth: OauthSettings,
    pub credentials: Arc<EnvCredentialStore>,
}

/// Everything the state needs from the composition root.
pub struct AppStateParams {
    pub projects: Arc<dyn ProjectStore>,
    pub counters: Arc<dyn CounterStore>,
    pub goals: Arc<dyn GoalStore>,
    pub direct: Arc<dyn DirectStore>,
    pub metrics: Arc<dyn MetricsStore>,
    pub seo: Arc<dyn SeoStore>,
    pub users: Arc<dyn UserStore>,
    pub cache: Option<Cache>,
    pub queue: QueueClient,
    pub reports: Arc<ReportService>,
    pub marketing: Arc<MarketingService>,
    pub analytics: Arc<dyn AnalyticsApi>,
    pub auth: AuthKeys,
    pub oauth: OauthSettings,
    pub credentials: EnvCredentialStore,
    pub default_timezone: String,
    pub default_currency: String,
}

impl AppState {
    pub fn new(params: AppStateParams) -> Self {
        Self {
            projects: params.projects,
            counters: params.counters,
            goals: params.goals,
            direct: params.direct,
            metrics: params.metrics,
            seo: params.seo,
            users: params.users,
            cache: params.cache,
            queue: params.queue,
            reports: params.reports,
            marketing: params.marketing,
            analytics: params.analytics,
            default_timezone: params.default_timezone,
            default_currency: params.default_currency,
            auth: Arc::new(params.auth),
            user_cache: MokaCache::builder()
                .max_capacity(USER_CACHE_MAX_CAPACITY)
                .time_to_live(USER_CACHE_TTL)
                .build(),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            auth_limiter: Arc::new(RateLimiter::new(RateLimitConfig::auth())),
            oauth: params.oauth,
            credentials: Arc::new(params.credentials),
        }
    }

    /// Start the rate limiter cleanup background task.
    pub fn start_rate_limiter_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        let auth_limiter = self.auth_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                rate_limiter.cleanup(Duration::from_secs(600));
                auth_limiter.cleanup(Duration::from_secs(600));
            }
        })
    }

    /// Invalidates the user cache entry after an admin mutation.
    pub async fn invalidate_user(&self, user_id: i64) {
        self.user_cache.invalidate(&user_id).await;
    }
}
