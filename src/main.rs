//! BI backend for advertising analytics.
//!
//! Periodically pulls Yandex Metrika and Direct data, aggregates it into
//! monthly per-project facts, and serves a multi-tenant reporting API:
//! - cron scheduler fanning out per-project sync jobs
//! - durable Redis queue with retry and dead-letter lanes
//! - idempotent ingestion into MySQL under natural-key upserts
//! - Axum REST surface with JWT auth and role enforcement

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::credentials::EnvCredentialStore;
use api::middleware::auth::AuthKeys;
use api::state::{AppStateParams, OauthSettings};
use api::{router, AppState};
use cache::{Cache, CacheConfig};
use queue::{QueueClient, QueueConfig, QueueServer, RedisBroker};
use report::{MarketingService, ReportService};
use storage::{
    CounterRepo, DirectRepo, GoalRepo, MetricsRepo, ProjectRepo, SeoRepo, Storage, StorageConfig,
    UserRepo,
};
use telemetry::{health, init_tracing_from_env};
use worker::{register_handlers, AiClient, AiConfig, CronScheduler, SyncEngine};
use yandex::{AnalyticsApi, DirectClientFactory, MetrikaClient, YandexConfig};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Backend URL (OAuth callback base).
    #[serde(default = "default_app_url")]
    app_url: String,
    /// Frontend URL (OAuth redirect target).
    #[serde(default = "default_frontend_url")]
    frontend_url: String,

    #[serde(default = "default_jwt_secret")]
    jwt_secret: String,
    #[serde(default = "default_jwt_expiry_hours")]
    jwt_expiry_hours: i64,

    /// IANA zone for the scheduler and new projects.
    #[serde(default = "default_timezone")]
    default_timezone: String,

    #[serde(default)]
    storage: StorageConfig,

    #[serde(default)]
    queue: QueueConfig,

    #[serde(default)]
    yandex: YandexConfig,

    #[serde(default)]
    ai: AiConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_app_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_jwt_expiry_hours() -> i64 {
    24
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            app_url: default_app_url(),
            frontend_url: default_frontend_url(),
            jwt_secret: default_jwt_secret(),
            jwt_expiry_hours: default_jwt_expiry_hours(),
            default_timezone: default_timezone(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            yandex: YandexConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider BEFORE any TLS operations
    // rustls 0.23+ requires explicit crypto provider selection
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting BI backend v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    // MySQL
    let storage = Storage::connect(config.storage.clone())
        .await
        .context("Failed to connect to MySQL")?;

    if let Err(e) = storage::schema::init_schema(&storage).await {
        error!("Failed to initialize schema: {}", e);
        // Continue anyway - schema might already exist
    }

    if storage::health::check_connection(&storage).await {
        health().mysql.set_healthy();
        info!("MySQL connection: healthy");
    } else {
        health().mysql.set_unhealthy("Connection failed");
        error!("MySQL connection: unhealthy");
    }

    // Redis: queue broker plus dimension cache over the same endpoint
    let broker = Arc::new(
        RedisBroker::connect(&config.queue)
            .await
            .context("Failed to connect to Redis queue backend")?,
    );
    health().redis.set_healthy();

    let cache_config = CacheConfig {
        host: config.queue.host.clone(),
        port: config.queue.port,
        password: config.queue.password.clone(),
        db: config.queue.db,
    };
    let dim_cache = match Cache::connect(&cache_config).await {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("Dimension cache unavailable, reads go to MySQL: {}", e);
            None
        }
    };

    // Repositories
    let projects = Arc::new(ProjectRepo::new(&storage)) as Arc<dyn storage::ProjectStore>;
    let counters = Arc::new(CounterRepo::new(&storage)) as Arc<dyn storage::CounterStore>;
    let goals = Arc::new(GoalRepo::new(&storage)) as Arc<dyn storage::GoalStore>;
    let metrics = Arc::new(MetricsRepo::new(&storage)) as Arc<dyn storage::MetricsStore>;
    let direct = Arc::new(DirectRepo::new(&storage)) as Arc<dyn storage::DirectStore>;
    let seo = Arc::new(SeoRepo::new(&storage)) as Arc<dyn storage::SeoStore>;
    let users = Arc::new(UserRepo::new(&storage)) as Arc<dyn storage::UserStore>;

    // Vendor clients
    let analytics = Arc::new(
        MetrikaClient::new(&config.yandex).context("Failed to create Metrika client")?,
    ) as Arc<dyn AnalyticsApi>;
    let ads_factory = Arc::new(DirectClientFactory::new(config.yandex.clone()));

    // Ingestion engine and read path
    let engine = Arc::new(SyncEngine::new(
        projects.clone(),
        counters.clone(),
        goals.clone(),
        metrics.clone(),
        direct.clone(),
        analytics.clone(),
        ads_factory,
    ));
    let reports = Arc::new(ReportService::new(
        projects.clone(),
        metrics.clone(),
        direct.clone(),
        seo.clone(),
    ));
    let marketing = Arc::new(MarketingService::new(projects.clone(), direct.clone()));

    let ai = Arc::new(AiClient::new(config.ai.clone()).context("Failed to create AI client")?);

    // Queue server
    let queue_client = QueueClient::new(broker.clone());
    let mut queue_server = QueueServer::new(broker, config.queue.clone());
    register_handlers(
        &mut queue_server,
        engine,
        reports.clone(),
        ai,
        dim_cache.clone(),
    );
    let queue_server = Arc::new(queue_server);
    let _queue_handles = queue_server.clone().start();

    // Cron scheduler (enqueue-only)
    let scheduler = Arc::new(CronScheduler::new(
        &config.default_timezone,
        queue_client.clone(),
        projects.clone(),
    ));
    let scheduler_handles = scheduler.start();

    // HTTP API
    let state = AppState::new(AppStateParams {
        projects,
        counters,
        goals,
        direct,
        metrics,
        seo,
        users,
        cache: dim_cache,
        queue: queue_client,
        reports,
        marketing,
        analytics,
        auth: AuthKeys::new(&config.jwt_secret, config.jwt_expiry_hours),
        oauth: OauthSettings {
            client_id: config.yandex.client_id.clone(),
            client_secret: config.yandex.client_secret.clone(),
            scopes: config.yandex.oauth_scopes.clone(),
            app_url: config.app_url.clone(),
            frontend_url: config.frontend_url.clone(),
        },
        credentials: EnvCredentialStore::new(".env"),
        default_timezone: config.default_timezone.clone(),
        default_currency: config.yandex.default_currency.clone(),
    });
    let _rate_limiter_cleanup = state.start_rate_limiter_cleanup();

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    // Scheduler first: no new fires enqueue work during the drain.
    for handle in scheduler_handles {
        handle.abort();
    }

    // Let in-flight tasks finish or park themselves for re-delivery.
    queue_server.shutdown().await;

    storage.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The deployment environment speaks flat variable names; map them onto
    // the nested config explicitly.
    if let Ok(host) = std::env::var("HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("PORT") {
        config.port = port.parse().context("PORT must be a number")?;
    }
    if let Ok(url) = std::env::var("APP_URL") {
        config.app_url = url;
    }
    if let Ok(url) = std::env::var("FRONTEND_URL") {
        config.frontend_url = url;
    }
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        config.jwt_secret = secret;
    }
    if let Ok(expiry) = std::env::var("JWT_EXPIRY") {
        config.jwt_expiry_hours = expiry.parse().context("JWT_EXPIRY must be a number")?;
    }
    if let Ok(zone) = std::env::var("DEFAULT_TIMEZONE") {
        config.default_timezone = zone;
    }

    if let Ok(host) = std::env::var("DB_HOST") {
        config.storage.host = host;
    }
    if let Ok(port) = std::env::var("DB_PORT") {
        config.storage.port = port.parse().context("DB_PORT must be a number")?;
    }
    if let Ok(user) = std::env::var("DB_USERNAME").or_else(|_| std::env::var("DB_USER")) {
        config.storage.username = user;
    }
    if let Ok(password) = std::env::var("DB_PASSWORD") {
        config.storage.password = password;
    }
    if let Ok(db) = std::env::var("DB_DATABASE").or_else(|_| std::env::var("DB_NAME")) {
        config.storage.database = db;
    }

    if let Ok(host) = std::env::var("REDIS_HOST") {
        config.queue.host = host;
    }
    if let Ok(port) = std::env::var("REDIS_PORT") {
        config.queue.port = port.parse().context("REDIS_PORT must be a number")?;
    }
    if let Ok(password) = std::env::var("REDIS_PASSWORD") {
        config.queue.password = password;
    }
    if let Ok(db) = std::env::var("REDIS_DB") {
        config.queue.db = db.parse().context("REDIS_DB must be a number")?;
    }

    if let Ok(token) = std::env::var("YANDEX_OAUTH_TOKEN") {
        config.yandex.oauth_token = token;
    }
    if let Ok(id) = std::env::var("YANDEX_CLIENT_ID") {
        config.yandex.client_id = id;
    }
    if let Ok(secret) = std::env::var("YANDEX_CLIENT_SECRET") {
        config.yandex.client_secret = secret;
    }
    if let Ok(scopes) = std::env::var("YANDEX_OAUTH_SCOPES") {
        config.yandex.oauth_scopes = scopes;
    }
    if let Ok(currency) = std::env::var("YANDEX_DEFAULT_CURRENCY") {
        config.yandex.default_currency = currency;
    }
    if let Ok(sandbox) = std::env::var("YANDEX_DIRECT_SANDBOX") {
        config.yandex.direct_sandbox = sandbox == "true" || sandbox == "1";
    }

    if let Ok(url) = std::env::var("OLLAMA_API_URL") {
        config.ai.api_url = url;
    }
    if let Ok(key) = std::env::var("OLLAMA_API_KEY") {
        config.ai.api_key = key;
    }
    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
        config.ai.model = model;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
