//! Avatar video generation client.
//!
//! [`HeygenClient`] talks to the HeyGen REST API. Callers depend on the
//! [`AvatarService`] trait so the webhook server can swap in a stub.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

pub const HEYGEN_DEFAULT_BASE_URL: &str = "https://api.heygen.com";

const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("HeyGen API key not provided")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HeyGen API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Text plus avatar selection for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarVideoRequest {
    pub text: String,
    pub avatar_id: String,
    pub voice_id: Option<String>,
    pub background: Option<String>,
}

/// Accepted generation job.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJob {
    pub video_id: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait AvatarService: Send + Sync {
    async fn create_avatar_video(&self, request: &AvatarVideoRequest) -> Result<VideoJob, AvatarError>;

    async fn get_video_status(&self, video_id: &str) -> Result<Value, AvatarError>;

    async fn list_avatars(&self) -> Result<Value, AvatarError>;

    async fn list_voices(&self) -> Result<Value, AvatarError>;
}

pub struct HeygenClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl HeygenClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, HEYGEN_DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, AvatarError> {
        self.api_key.as_deref().ok_or(AvatarError::MissingApiKey)
    }

    fn payload(request: &AvatarVideoRequest) -> Value {
        json!({
            "video_inputs": [{
                "character": {
                    "type": "avatar",
                    "avatar_id": request.avatar_id,
                    "avatar_style": "normal"
                },
                "voice": {
                    "type": "text",
                    "input_text": request.text,
                    "voice_id": request.voice_id.as_deref().unwrap_or("default")
                },
                "background": {
                    "type": "color",
                    "value": request.background.as_deref().unwrap_or("#ffffff")
                }
            }],
            "dimension": { "width": 1280, "height": 720 },
            "aspect_ratio": "16:9"
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, AvatarError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", api_key)
            .query(query)
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?;
        Self::read_json(response, path).await
    }

    async fn read_json(response: reqwest::Response, what: &str) -> Result<Value, AvatarError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), endpoint = what, "HeyGen API error: {message}");
            return Err(AvatarError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl AvatarService for HeygenClient {
    async fn create_avatar_video(&self, request: &AvatarVideoRequest) -> Result<VideoJob, AvatarError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .post(format!("{}/v2/video/generate", self.base_url))
            .header("X-Api-Key", api_key)
            .json(&Self::payload(request))
            .timeout(GENERATE_TIMEOUT)
            .send()
            .await?;
        let raw = Self::read_json(response, "/v2/video/generate").await?;

        // v2 nests the id under `data`; older responses put it at the top level
        let video_id = raw
            .pointer("/data/video_id")
            .or_else(|| raw.get("video_id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        info!(video_id = ?video_id, avatar_id = %request.avatar_id, "HeyGen video generation initiated");
        Ok(VideoJob { video_id, raw })
    }

    async fn get_video_status(&self, video_id: &str) -> Result<Value, AvatarError> {
        self.get_json("/v1/video_status.get", &[("video_id", video_id)]).await
    }

    async fn list_avatars(&self) -> Result<Value, AvatarError> {
        self.get_json("/v1/avatar.list", &[]).await
    }

    async fn list_voices(&self) -> Result<Value, AvatarError> {
        self.get_json("/v1/voice.list", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> AvatarVideoRequest {
        AvatarVideoRequest {
            text: "hello there".to_string(),
            avatar_id: "avatar-1".to_string(),
            voice_id: None,
            background: Some("#000000".to_string()),
        }
    }

    #[tokio::test]
    async fn create_video_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .and(header("X-Api-Key", "hg-key"))
            .and(body_partial_json(json!({
                "video_inputs": [{
                    "character": { "avatar_id": "avatar-1" },
                    "voice": { "input_text": "hello there", "voice_id": "default" },
                    "background": { "value": "#000000" }
                }],
                "aspect_ratio": "16:9"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "error": null, "data": { "video_id": "vid-42" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HeygenClient::with_base_url(Some("hg-key".into()), server.uri());
        let job = client.create_avatar_video(&request()).await.unwrap();
        assert_eq!(job.video_id.as_deref(), Some("vid-42"));
    }

    #[tokio::test]
    async fn api_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = HeygenClient::with_base_url(Some("hg-key".into()), server.uri());
        match client.create_avatar_video(&request()).await {
            Err(AvatarError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_short_circuits() {
        let client = HeygenClient::new(Some("   ".into()));
        assert!(!client.is_configured());
        assert!(matches!(
            client.create_avatar_video(&request()).await,
            Err(AvatarError::MissingApiKey)
        ));
        assert!(matches!(client.list_avatars().await, Err(AvatarError::MissingApiKey)));
    }

    #[tokio::test]
    async fn video_status_passes_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "vid-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "status": "completed" } })))
            .mount(&server)
            .await;

        let client = HeygenClient::with_base_url(Some("hg-key".into()), server.uri());
        let status = client.get_video_status("vid-42").await.unwrap();
        assert_eq!(status["data"]["status"], "completed");
    }
}
