//! Common utilities for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use avatar_core::{AvatarError, AvatarService, AvatarVideoRequest, VideoJob};
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use tts_core::{BackendRegistry, SynthesisOptions, Synthesizer, SystemSynthesizer};
use tts_webhook_server::{build_router, config::ServerConfig, AppState};

/// Cloud-style backend that always fails.
pub struct BrokenSynthesizer;

#[async_trait]
impl Synthesizer for BrokenSynthesizer {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn synthesize(&self, _text: &str, _options: &SynthesisOptions) -> anyhow::Result<PathBuf> {
        anyhow::bail!("OpenAI TTS engine not available")
    }
}

/// Backend that takes longer than a short request timeout.
pub struct SlowSynthesizer {
    pub delay: Duration,
}

#[async_trait]
impl Synthesizer for SlowSynthesizer {
    fn name(&self) -> &str {
        "slow"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn synthesize(&self, _text: &str, options: &SynthesisOptions) -> anyhow::Result<PathBuf> {
        tokio::time::sleep(self.delay).await;
        let path = options.output_path("wav");
        tokio::fs::write(&path, b"RIFF").await?;
        Ok(path)
    }
}

/// Avatar service that records calls and always fails.
#[derive(Default)]
pub struct RecordingAvatar {
    pub calls: AtomicUsize,
}

impl RecordingAvatar {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvatarService for RecordingAvatar {
    async fn create_avatar_video(&self, _request: &AvatarVideoRequest) -> Result<VideoJob, AvatarError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AvatarError::Api {
            status: 500,
            message: "avatar backend down".to_string(),
        })
    }

    async fn get_video_status(&self, _video_id: &str) -> Result<Value, AvatarError> {
        Err(AvatarError::MissingApiKey)
    }

    async fn list_avatars(&self) -> Result<Value, AvatarError> {
        Err(AvatarError::Api {
            status: 503,
            message: "down".to_string(),
        })
    }

    async fn list_voices(&self) -> Result<Value, AvatarError> {
        Ok(serde_json::json!({ "data": { "voices": [] } }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub avatar: Arc<RecordingAvatar>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn audio_dir(&self) -> PathBuf {
        self.dir.path().join("audio")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_webhook(&self, body: Value) -> Response<Body> {
        self.post_webhook_with_key(body, None).await
    }

    pub async fn post_webhook_with_key(&self, body: Value, api_key: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn clear_cache(&self) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri("/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Wait briefly for detached avatar tasks.
    pub async fn wait_for_avatar_calls(&self, expected: usize) -> usize {
        for _ in 0..50 {
            if self.avatar.calls() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.avatar.calls()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn expect_status(response: &Response<Body>, status: StatusCode) {
    assert_eq!(response.status(), status, "unexpected status");
}

/// App with a silent-fallback `system` default (espeak path does not exist)
/// and an always-failing `openai`.
pub fn create_test_app() -> TestApp {
    create_test_app_with(|_| {})
}

pub fn create_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    create_test_app_with_backends(Vec::new(), configure)
}

/// Same as [`create_test_app_with`], plus `extra` backends in the registry.
pub fn create_test_app_with_backends(
    extra: Vec<Arc<dyn Synthesizer>>,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig {
        audio_dir: dir.path().join("audio"),
        default_engine: "system".to_string(),
        ..ServerConfig::default()
    };
    configure(&mut config);

    let mut registry = BackendRegistry::new(Arc::new(SystemSynthesizer::new(
        "/nonexistent/espeak-for-tests",
    )));
    registry.register(Arc::new(BrokenSynthesizer));
    for backend in extra {
        registry.register(backend);
    }

    let avatar = Arc::new(RecordingAvatar::default());
    let state = AppState::new(config, registry, avatar.clone());
    let router = build_router(state.clone());

    TestApp {
        router,
        state,
        avatar,
        dir,
    }
}
