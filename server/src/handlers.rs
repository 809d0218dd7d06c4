use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::sync::atomic::Ordering;

use avatar_core::AvatarVideoRequest;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use tts_core::{BackendDescriptor, DispatchError, SynthesisRequest, VoiceType};

use crate::avatar::dispatch_best_effort;
use crate::error::ApiError;
use crate::gate::{ClientIdentity, RequestStart};
use crate::metrics::{MetricsResponse, SystemMetrics};
use crate::usage::UsageStats;
use crate::validation::{parse_timestamp, validate_audio_filename, validate_language, validate_speed};
use crate::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_agent() -> String {
    "unknown".to_string()
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default, alias = "text")]
    pub utterance: String,
    #[serde(alias = "backend")]
    pub engine: Option<String>,
    #[serde(default)]
    pub voice_type: VoiceType,
    pub language: Option<String>,
    pub speed: Option<f32>,
    pub timestamp: Option<String>,
    pub avatar_id: Option<String>,
    pub voice_id: Option<String>,
    pub background: Option<String>,
}

impl WebhookPayload {
    pub fn into_request(self, default_engine: &str) -> Result<SynthesisRequest, ApiError> {
        let speed = validate_speed(self.speed.unwrap_or(1.0))?;
        let timestamp = parse_timestamp(self.timestamp.as_deref())?;
        let language = self
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "en".to_string());
        validate_language(&language)?;
        let engine = self
            .engine
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| default_engine.to_string());

        let mut request = SynthesisRequest::new(self.agent, self.utterance, engine)
            .with_voice_type(self.voice_type)
            .with_language(language)
            .with_speed(speed)
            .with_timestamp(timestamp);
        request.avatar_id = self.avatar_id.filter(|id| !id.trim().is_empty());
        request.voice_id = self.voice_id;
        request.background = self.background;
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub audio_file: String,
    pub audio_url: String,
    pub agent: String,
    pub engine_used: String,
    /// Seconds from gate entry to response.
    pub processing_time: f64,
    pub file_size: u64,
    pub cache_hit: bool,
    pub fallback_used: bool,
}

pub async fn webhook(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    Extension(started): Extension<RequestStart>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<WebhookResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let characters = payload
        .as_ref()
        .map(|json| json.0.utterance.chars().count())
        .unwrap_or(0);

    let result = process_webhook(&state, started, payload).await;

    state.usage.record(&identity.identifier, characters, result.is_ok());
    state
        .metrics
        .webhook
        .record_request(started.0.elapsed().as_millis() as u64);
    if result.is_err() {
        state.metrics.webhook.record_error();
    }
    result.map(Json)
}

async fn process_webhook(
    state: &AppState,
    started: RequestStart,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<WebhookResponse, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::InvalidInput(rejection.body_text()))?;
    let request = payload.into_request(&state.config.default_engine)?;

    let preview: String = request.text.chars().take(50).collect();
    info!(
        agent = %request.agent,
        engine = %request.backend,
        timestamp = %request.timestamp,
        "Utterance received: '{preview}'"
    );

    let result = state.dispatcher.handle(&request).await.map_err(|e| {
        if matches!(e, DispatchError::SynthesisFailed(_)) {
            state.metrics.synthesis.record_failure();
        }
        e
    })?;
    state.metrics.synthesis.record(&result);

    let file_size = tokio::fs::metadata(&result.audio_file)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    let file_name = result
        .audio_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(avatar_id) = request.avatar_id.clone() {
        dispatch_best_effort(
            state.avatar.clone(),
            AvatarVideoRequest {
                text: request.text.clone(),
                avatar_id,
                voice_id: request.voice_id.clone(),
                background: request.background.clone(),
            },
            request.agent.clone(),
        );
    }

    Ok(WebhookResponse {
        status: "success",
        message: "Utterance processed successfully",
        audio_file: result.audio_file.to_string_lossy().into_owned(),
        audio_url: format!("/audio/{file_name}"),
        agent: request.agent,
        engine_used: result.engine_used,
        processing_time: started.0.elapsed().as_secs_f64(),
        file_size,
        cache_hit: result.cache_hit,
        fallback_used: result.fallback_used,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engines_available: BTreeMap<String, bool>,
    pub uptime: String,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub cache_size: usize,
}

fn format_uptime(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = state.started_at.elapsed().as_secs();
    let engines_available = state
        .dispatcher
        .registry()
        .list()
        .into_iter()
        .map(|d| (d.name, d.available))
        .collect();

    Json(HealthResponse {
        status: "healthy",
        version: VERSION,
        engines_available,
        uptime: format_uptime(uptime_seconds),
        uptime_seconds,
        total_requests: state.request_count.load(Ordering::Relaxed),
        cache_size: state.dispatcher.cache().len(),
    })
}

pub async fn list_engines(State(state): State<AppState>) -> Json<BTreeMap<String, BackendDescriptor>> {
    Json(
        state
            .dispatcher
            .registry()
            .list()
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect(),
    )
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let removed = state.dispatcher.cache().clear();
    info!(removed, "Cache cleared");
    Json(serde_json::json!({
        "status": "success",
        "message": "Cache cleared",
        "entries_removed": removed,
    }))
}

fn audio_content_type(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

pub async fn serve_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    validate_audio_filename(&filename)?;
    let path = state.dispatcher.audio_dir().join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound("Audio file not found".to_string()))?;
    Ok(([(header::CONTENT_TYPE, audio_content_type(&path))], bytes).into_response())
}

pub async fn usage_all(State(state): State<AppState>) -> Json<BTreeMap<String, UsageStats>> {
    Json(state.usage.get_all())
}

pub async fn usage_for(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Json<UsageStats> {
    Json(state.usage.get(&identifier))
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let request_count = state.request_count.load(Ordering::Relaxed);
    let uptime_seconds = state.started_at.elapsed().as_secs();
    Json(MetricsResponse {
        timestamp: Utc::now(),
        system: SystemMetrics::collect(request_count, uptime_seconds),
        webhook: state.metrics.webhook.snapshot(),
        synthesis: state.metrics.synthesis.snapshot(),
        cache_size: state.dispatcher.cache().len(),
    })
}

pub async fn avatar_video_status(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.avatar.get_video_status(&video_id).await?))
}

pub async fn avatar_list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.avatar.list_avatars().await?))
}

pub async fn avatar_voices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.avatar.list_voices().await?))
}
