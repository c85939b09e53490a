//! API routes.

pub mod auth;
pub mod counters;
pub mod direct;
pub mod goals;
pub mod health;
pub mod marketing;
pub mod metrics;
pub mod oauth;
pub mod projects;
pub mod reports;
pub mod sync;
pub mod users;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::rate_limit::{auth_rate_limit, rate_limit};
use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Credential endpoints get a stricter per-IP bucket.
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_rate_limit,
        ));

    let api = Router::new()
        .merge(auth_routes)
        .route("/oauth/yandex", get(oauth::initiate))
        .route("/oauth/yandex/callback", get(oauth::callback))
        .route("/oauth/status", get(oauth::status))
        .route("/projects", get(projects::list).post(projects::create))
        .route(
            "/projects/:id",
            get(projects::get).put(projects::update).delete(projects::remove),
        )
        .route(
            "/projects/:id/counters",
            get(counters::list).post(counters::create),
        )
        .route(
            "/projects/:id/counters/:counter_id",
            delete(counters::remove),
        )
        .route(
            "/projects/:id/counters/:counter_id/primary",
            put(counters::set_primary),
        )
        .route("/projects/:id/goals", get(goals::list_by_project))
        .route(
            "/counters/:id/goals",
            get(goals::list).post(goals::create),
        )
        .route("/counters/:id/goals/import", post(goals::import))
        .route("/goals/:id", delete(goals::remove))
        .route(
            "/projects/:id/direct-accounts",
            get(direct::list_accounts).post(direct::create_account),
        )
        .route("/direct-accounts/:id", delete(direct::remove_account))
        .route(
            "/direct-accounts/:id/campaigns",
            get(direct::list_campaigns),
        )
        .route("/projects/:id/campaigns", get(marketing::campaigns))
        .route("/projects/:id/metrics", get(metrics::get_metrics))
        .route("/projects/:id/marketing", get(marketing::get_marketing))
        .route(
            "/projects/:id/users",
            get(users::project_users).post(users::assign_role),
        )
        .route("/projects/:id/users/:user_id", delete(users::remove_role))
        .route("/users", get(users::list))
        .route("/users/:id", delete(users::remove))
        .route("/users/:id/projects", get(users::user_projects))
        .route("/public/report/:slug", get(reports::public_report))
        .route("/report/:id", get(reports::get_report))
        .route("/channel-metrics/:id", get(reports::channel_metrics))
        .route("/channel-metrics/:id/analyze", post(reports::analyze))
        .route("/sync/:id", post(sync::trigger))
        .layer(axum_middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .nest("/api", api)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
