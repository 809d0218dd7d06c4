//! HTTP surface of the TTS webhook service.
//!
//! [`build_router`] wires the handlers, the access-control gate and the
//! tower-http middleware stack around a shared [`AppState`].

pub mod avatar;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod usage;
pub mod validation;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use avatar_core::{AvatarService, HeygenClient};
use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use tts_core::{AudioCache, BackendRegistry, SynthesisDispatcher};

use crate::config::ServerConfig;
use crate::gate::{AccessGate, ApiKeyValidator, RateLimiter};
use crate::metrics::AppMetrics;
use crate::usage::UsageTracker;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<SynthesisDispatcher>,
    pub gate: Arc<AccessGate>,
    pub usage: Arc<UsageTracker>,
    pub metrics: Arc<AppMetrics>,
    pub avatar: Arc<dyn AvatarService>,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Standard backends and the HeyGen client, all from `config`.
    pub fn from_config(config: ServerConfig) -> Self {
        let registry = BackendRegistry::from_config(&config.backends);
        let avatar = Arc::new(HeygenClient::with_base_url(
            config.heygen_api_key.clone(),
            config.heygen_base_url.clone(),
        ));
        Self::new(config, registry, avatar)
    }

    pub fn new(config: ServerConfig, registry: BackendRegistry, avatar: Arc<dyn AvatarService>) -> Self {
        let cache = Arc::new(AudioCache::new(config.cache_capacity));
        let dispatcher = SynthesisDispatcher::new(Arc::new(registry), cache, config.audio_dir.clone())
            .with_max_text_length(config.max_text_length);

        let gate = AccessGate::new(
            ApiKeyValidator::new(config.api_keys.clone()),
            RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window()),
            config.require_api_key,
        );

        info!(
            engines = dispatcher.registry().list().len(),
            default_engine = %config.default_engine,
            rate_limit = config.rate_limit_max_requests,
            window_secs = config.rate_limit_window_secs,
            require_api_key = config.require_api_key,
            "Application state initialized"
        );

        Self {
            dispatcher: Arc::new(dispatcher),
            gate: Arc::new(gate),
            usage: Arc::new(UsageTracker::new()),
            metrics: Arc::new(AppMetrics::default()),
            avatar,
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
            config: Arc::new(config),
        }
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok();
    if let Some(id) = &request_id {
        request.headers_mut().insert("x-request-id", id.clone());
    }
    let mut response = next.run(request).await;
    if let Some(id) = request_id {
        response.headers_mut().insert("x-request-id", id);
    }
    response
}

pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins");
        base.allow_origin(tower_http::cors::Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(tower_http::cors::AllowOrigin::list(origins))
    }
}

pub fn build_router(state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .into_inner();

    // Gated routes run to completion; only public routes carry the timeout.
    let gated = Router::new()
        .route("/webhook", post(handlers::webhook))
        .route("/cache", delete(handlers::clear_cache))
        .route("/usage", get(handlers::usage_all))
        .route("/usage/{identifier}", get(handlers::usage_for))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::access_control));

    let public = Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .route("/engines", get(handlers::list_engines))
        .route("/audio/{filename}", get(handlers::serve_audio))
        .route("/metrics", get(handlers::metrics))
        .route("/avatar/videos/{video_id}", get(handlers::avatar_video_status))
        .route("/avatar/avatars", get(handlers::avatar_list))
        .route("/avatar/voices", get(handlers::avatar_voices))
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    Router::new()
        .merge(public)
        .merge(gated)
        .layer(middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}
