//! Access control in front of the synthesis pipeline: API key validation,
//! then per-identifier sliding-window rate limiting.

mod api_keys;
mod rate_limit;

pub use api_keys::{generate_api_key, ApiKeyValidator, KeyMetadata};
pub use rate_limit::RateLimiter;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Query, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Who is calling, as resolved by the gate.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_ip: String,
    pub api_key: Option<String>,
    pub key_metadata: Option<KeyMetadata>,
    /// API key if one was presented, else the client address.
    pub identifier: String,
}

/// Instant the request passed into the gate.
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub Instant);

pub struct AccessGate {
    validator: ApiKeyValidator,
    limiter: RateLimiter,
    require_api_key: bool,
}

impl AccessGate {
    pub fn new(validator: ApiKeyValidator, limiter: RateLimiter, require_api_key: bool) -> Self {
        Self {
            validator,
            limiter,
            require_api_key,
        }
    }

    pub fn validator(&self) -> &ApiKeyValidator {
        &self.validator
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn check(&self, client_ip: &str, api_key: Option<&str>) -> Result<ClientIdentity, ApiError> {
        self.check_at(client_ip, api_key, Instant::now())
    }

    pub fn check_at(
        &self,
        client_ip: &str,
        api_key: Option<&str>,
        now: Instant,
    ) -> Result<ClientIdentity, ApiError> {
        let api_key = api_key.map(str::trim).filter(|k| !k.is_empty());

        let key_metadata = match api_key {
            Some(key) => Some(
                self.validator
                    .validate_key(key)
                    .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))?,
            ),
            None if self.require_api_key => {
                return Err(ApiError::Unauthorized("API key required".to_string()));
            }
            None => None,
        };

        let identifier = api_key.unwrap_or(client_ip).to_string();
        if !self.limiter.is_allowed_at(&identifier, now) {
            let reset = self.limiter.get_reset_time_at(&identifier, now);
            let retry_after_secs = (reset.as_secs_f64().ceil() as u64).max(1);
            warn!(identifier = %identifier, retry_after_secs, "Rate limit exceeded");
            return Err(ApiError::RateLimited { retry_after_secs });
        }

        Ok(ClientIdentity {
            client_ip: client_ip.to_string(),
            api_key: api_key.map(str::to_string),
            key_metadata,
            identifier,
        })
    }
}

#[derive(Deserialize)]
struct ApiKeyQuery {
    api_key: Option<String>,
}

/// `X-API-Key` header first, then the `api_key` query parameter.
fn presented_api_key(request: &Request) -> Option<String> {
    if let Some(key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return Some(key.to_string());
    }
    Query::<ApiKeyQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(q)| q.api_key)
}

pub async fn access_control(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let started = RequestStart(Instant::now());
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let api_key = presented_api_key(&request);
    let identity = state.gate.check(&client_ip, api_key.as_deref())?;
    debug!(identifier = %identity.identifier, "Request admitted");

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(started);
    Ok(next.run(request).await)
}

/// Periodically drop rate windows that have gone idle.
pub fn spawn_sweeper(gate: Arc<AccessGate>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = gate.limiter().sweep_idle(Instant::now());
            if removed > 0 {
                debug!(removed, "Swept idle rate-limit windows");
            }
        }
    })
}
