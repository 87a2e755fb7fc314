use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{MethodRouter, get, patch, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::models::permission::{MOVIES_READ, MOVIES_WRITE};
use crate::services::{MovieService, UserService};
use crate::state::SharedState;

mod error;
pub mod extract;
mod healthcheck;
pub mod middleware;
mod movies;
mod observability;
mod tokens;
pub mod types;
mod users;

pub use error::ApiError;
pub use types::*;

use self::middleware::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserService> {
        &self.shared.user_service
    }

    #[must_use]
    pub fn movies(&self) -> &Arc<dyn MovieService> {
        &self.shared.movie_service
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.shared.rate_limiter
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

/// Wraps `route` so it only runs for activated users holding `code`.
fn gated(
    state: &Arc<AppState>,
    code: &'static str,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(from_fn_with_state(
        (state.clone(), code),
        self::middleware::require_permission,
    ))
}

fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::OPTIONS, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn router(state: Arc<AppState>) -> Router {
    let movie_routes = Router::new()
        .route(
            "/v1/movies",
            gated(&state, MOVIES_READ, get(movies::list_movies))
                .merge(gated(&state, MOVIES_WRITE, post(movies::create_movie))),
        )
        .route(
            "/v1/movies/{id}",
            gated(&state, MOVIES_READ, get(movies::show_movie))
                .merge(gated(&state, MOVIES_WRITE, patch(movies::update_movie)))
                .merge(gated(
                    &state,
                    MOVIES_WRITE,
                    axum::routing::delete(movies::delete_movie),
                )),
        );

    Router::new()
        .route("/v1/healthcheck", get(healthcheck::healthcheck))
        .route("/v1/users", post(users::register_user))
        .route("/v1/users/activated", put(users::activate_user))
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .route("/debug/metrics", get(observability::get_metrics))
        .merge(movie_routes)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(extract::MAX_BODY_BYTES))
        .layer(from_fn_with_state(
            state.clone(),
            self::middleware::authenticate,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            self::middleware::rate_limit,
        ))
        .layer(cors_layer(&state.config().server.cors_trusted_origins))
        .layer(from_fn(observability::logging_middleware))
        .layer(CatchPanicLayer::custom(observability::handle_panic))
        .layer(from_fn(observability::track_metrics))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
