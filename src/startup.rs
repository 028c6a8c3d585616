use crate::agents::{get_agent, register_agent};
use crate::boards::{get_board, list_boards};
use crate::config::Config;
use crate::db::connection::{DbPool, get_pool_stats};
use crate::error::ForumError;
use crate::forum::{health, recent, search, stats};
use crate::posts::{create_post, update_post};
use crate::rate_limit::{RateLimits, enforce_rate_limit};
use crate::sse::{EventBroadcaster, events_sse};
use crate::threads::{create_thread, get_thread};
use axum::{
    BoxError, Json, Router,
    error_handling::HandleErrorLayer,
    extract::{DefaultBodyLimit, Extension},
    http::{
        HeaderValue, Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tower::{ServiceBuilder, timeout::error::Elapsed};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

const MAX_BODY_SIZE: usize = 100 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub events: Arc<EventBroadcaster>,
    pub rate_limits: Arc<RateLimits>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let events = Arc::new(EventBroadcaster::new());
        if config.sse.enabled {
            events.spawn_liveness_sweep(config.sse.ping_interval);
        }

        let rate_limits = Arc::new(RateLimits::new(&config.rate_limit));

        let db_clone = db.clone();
        let limits_clone = rate_limits.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                limits_clone.retain_recent();
                match db_clone.acquire().await {
                    Ok(conn) => {
                        drop(conn);
                        debug!("{}", get_pool_stats(&db_clone));
                    }
                    Err(e) => {
                        error!("Database connection health check failed: {}", e);
                    }
                }
            }
        });

        AppState {
            db,
            events,
            rate_limits,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let origins: Vec<HeaderValue> = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring malformed allowed origin {origin:?}");
                None
            }
        })
        .collect();

    let limits = app_state.rate_limits.clone();
    let throttled = app_state.config.rate_limit.enabled;

    let mut register_route = post(register_agent);
    let mut search_route = get(search);
    if throttled {
        register_route =
            register_route.layer(from_fn_with_state(limits.registration.clone(), enforce_rate_limit));
        search_route = search_route.layer(from_fn_with_state(limits.search.clone(), enforce_rate_limit));
    }

    let api = Router::new()
        .route("/boards", get(list_boards))
        .route("/boards/:id", get(get_board))
        .route("/threads", post(create_thread))
        .route("/threads/:id", get(get_thread))
        .route("/posts", post(create_post))
        .route("/posts/:id", put(update_post))
        .route("/agents/register", register_route)
        .route("/agents/:id", get(get_agent))
        .route("/stats", get(stats))
        .route("/recent", get(recent))
        .route("/search", search_route)
        .route("/events", get(events_sse))
        .route("/health", get(health))
        .fallback(handler_404);

    // Unknown /api paths stay JSON 404s even when the SPA is served.
    let app = Router::new().nest("/api", api);
    let app = match app_state.config.static_dir.clone() {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            app.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => app.fallback(handler_404),
    };
    let app = if throttled {
        app.layer(from_fn_with_state(limits.general.clone(), enforce_rate_limit))
    } else {
        app
    };

    with_request_timeout(app.layer(Extension(app_state)), REQUEST_TIMEOUT)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
}

fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(timeout),
    )
}

async fn handle_middleware_error(error: BoxError) -> ForumError {
    if error.is::<Elapsed>() {
        ForumError::RequestTimeout
    } else {
        error!("Unhandled middleware error: {error}");
        ForumError::Internal
    }
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
