//! Bot API client over HTTPS.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use gramkit_core::{ApiError, ApiResult, Bot, InputFile, TransportError, TransportResult};

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope of every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// A [`Bot`] that talks to the Bot API with one pooled `reqwest` client.
///
/// # Example
///
/// ```rust,ignore
/// use gramkit_transport::http::HttpBot;
///
/// let bot = HttpBot::builder("123:abc")
///     .timeout(std::time::Duration::from_secs(60))
///     .build()?;
/// let me = bot.get_me().await?;
/// ```
#[derive(Clone)]
pub struct HttpBot {
    client: Client,
    token: String,
    api_url: String,
}

impl HttpBot {
    /// Creates a client for `token` against the public API with default settings.
    pub fn new(token: impl Into<String>) -> TransportResult<Self> {
        Self::builder(token).build()
    }

    pub fn builder(token: impl Into<String>) -> HttpBotBuilder {
        HttpBotBuilder::new(token)
    }

    /// Base URL of the API server.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.token, file_path)
    }

    /// Unwraps the `{ok, result}` envelope.
    async fn read_envelope(method: &str, response: Response) -> ApiResult<Value> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| request_failed(method, e))?;

        match serde_json::from_slice::<ApiResponse>(&body) {
            Ok(envelope) if envelope.ok => Ok(envelope.result.unwrap_or(Value::Null)),
            Ok(envelope) => {
                let error_code = envelope
                    .error_code
                    .unwrap_or_else(|| i64::from(status.as_u16()));
                let description = envelope.description.unwrap_or_default();
                warn!(method, error_code, description = %description, "Bot API returned an error");
                Err(ApiError::api(error_code, description))
            }
            Err(_) if !status.is_success() => Err(TransportError::HttpStatus {
                method: method.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .into()),
            Err(e) => Err(ApiError::Serialization(format!(
                "malformed response from '{method}': {e}"
            ))),
        }
    }
}

/// Request URLs embed the token, so it is stripped before the error is kept.
fn request_failed(method: &str, error: reqwest::Error) -> TransportError {
    TransportError::request_failed(method, error.without_url())
}

impl fmt::Debug for HttpBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBot")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bot for HttpBot {
    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
        trace!(method, "Calling Bot API");
        let response = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(|e| request_failed(method, e))?;
        Self::read_envelope(method, response).await
    }

    async fn call_multipart(
        &self,
        method: &str,
        params: Value,
        field: &str,
        file: InputFile,
    ) -> ApiResult<Value> {
        let mut form = Form::new();
        if let Value::Object(map) = params {
            for (key, value) in map {
                // Nested values (reply_markup, ...) travel as JSON strings.
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                form = form.text(key, text);
            }
        }
        let size = file.bytes.len();
        form = form.part(
            field.to_string(),
            Part::bytes(file.bytes).file_name(file.file_name),
        );

        debug!(method, field, size, "Uploading file");
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_failed(method, e))?;
        Self::read_envelope(method, response).await
    }

    async fn download_file(&self, file_path: &str) -> ApiResult<Vec<u8>> {
        let response = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| request_failed("download", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus {
                method: "download".to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_failed("download", e))?;
        Ok(bytes.to_vec())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`HttpBot`].
#[derive(Debug, Clone)]
pub struct HttpBotBuilder {
    token: String,
    api_url: String,
    timeout: Duration,
}

impl HttpBotBuilder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Uses a different API server (a local Bot API server, or a test double).
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overall request timeout. Must exceed any long-polling timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> TransportResult<HttpBot> {
        if self.token.trim().is_empty() {
            return Err(TransportError::InvalidConfig("bot token is empty".into()));
        }

        let client = ClientBuilder::new()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        Ok(HttpBot {
            client,
            token: self.token,
            api_url: self.api_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use gramkit_core::{MediaKind, SendOptions};
    use serde_json::json;

    /// Serves a tiny imitation of the Bot API and returns its base URL.
    async fn fake_api() -> String {
        let router = Router::new()
            .route(
                "/bottest-token/getMe",
                post(|| async {
                    axum::Json(json!({
                        "ok": true,
                        "result": {"id": 42, "is_bot": true, "first_name": "Gram"}
                    }))
                }),
            )
            .route(
                "/bottest-token/sendMessage",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        axum::Json(json!({
                            "ok": false,
                            "error_code": 400,
                            "description": "Bad Request: chat not found"
                        })),
                    )
                }),
            )
            .route(
                "/bottest-token/getChat",
                post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            )
            .route(
                "/bottest-token/sendPhoto",
                post(|headers: HeaderMap| async move {
                    let multipart = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(|v| v.starts_with("multipart/form-data"));
                    axum::Json(json!({
                        "ok": multipart,
                        "result": {
                            "message_id": 3,
                            "date": 0,
                            "chat": {"id": 1, "type": "private"}
                        },
                        "description": "expected multipart"
                    }))
                }),
            )
            .route(
                "/file/bottest-token/docs/a.txt",
                get(|| async { "file contents" }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn bot() -> HttpBot {
        HttpBot::builder("test-token")
            .api_url(fake_api().await)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_me() {
        let me = bot().await.get_me().await.unwrap();
        assert_eq!(me.id, 42);
        assert!(me.is_bot);
    }

    #[tokio::test]
    async fn test_api_error_envelope() {
        let err = bot()
            .await
            .send_message(1.into(), "hi", SendOptions::default())
            .await
            .unwrap_err();
        match err {
            ApiError::Api {
                error_code,
                description,
            } => {
                assert_eq!(error_code, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_status() {
        let err = bot().await.get_chat(1.into()).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport(TransportError::HttpStatus { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let sent = bot()
            .await
            .send_media(
                1.into(),
                MediaKind::Photo,
                InputFile::new("cat.jpg", vec![0xFF, 0xD8]),
                Some("a cat"),
                SendOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(sent.message_id, 3);
    }

    #[tokio::test]
    async fn test_download_file() {
        let bytes = bot().await.download_file("docs/a.txt").await.unwrap();
        assert_eq!(bytes, b"file contents");
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            HttpBot::new("  "),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_network_error_hides_token() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpBot::builder("42:secret-value")
            .api_url(format!("http://{addr}"))
            .build()
            .unwrap()
            .get_me()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport(TransportError::RequestFailed { .. })
        ));
        assert!(!err.to_string().contains("secret-value"));
        assert!(!format!("{err:?}").contains("secret-value"));
    }

    #[test]
    fn test_debug_hides_token() {
        let bot = HttpBot::new("42:secret-value").unwrap();
        assert!(!format!("{bot:?}").contains("secret-value"));
    }
}
