//! Webhook receiver.
//!
//! Telegram POSTs one update per request to the configured path. When a
//! secret token was registered with `setWebhook`, every request carries it in
//! the `X-Telegram-Bot-Api-Secret-Token` header; requests without the exact
//! value are answered with 403 and never reach the update handler.
//!
//! | Outcome | Status |
//! |---------|--------|
//! | secret header missing or different | 403 |
//! | body is not a valid update | 400 |
//! | handler returned an error | 500 |
//! | handled | 200 `OK` |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use gramkit_core::{BoxedUpdateHandler, TransportResult, Update};

/// Header Telegram uses to echo the webhook secret.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Listening address and request checks of the webhook server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Expected value of the secret header; `None` accepts any request.
    pub secret_token: Option<String>,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            path: "/webhook".to_string(),
            secret_token: None,
        }
    }
}

impl WebhookServerConfig {
    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared state for request handlers.
struct ServerState {
    handler: BoxedUpdateHandler,
    secret_token: Option<String>,
}

/// HTTP server that feeds webhook updates into an [`UpdateHandler`](gramkit_core::UpdateHandler).
pub struct WebhookServer {
    config: WebhookServerConfig,
    state: Arc<ServerState>,
}

impl WebhookServer {
    pub fn new(config: WebhookServerConfig, handler: BoxedUpdateHandler) -> Self {
        let state = Arc::new(ServerState {
            handler,
            secret_token: config.secret_token.clone(),
        });
        Self { config, state }
    }

    pub fn config(&self) -> &WebhookServerConfig {
        &self.config
    }

    /// The request router, without binding a socket.
    pub fn router(&self) -> Router {
        let path = if self.config.path.starts_with('/') {
            self.config.path.clone()
        } else {
            format!("/{}", self.config.path)
        };

        Router::new()
            .route(&path, post(webhook_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves in a background task.
    pub async fn listen(&self) -> TransportResult<ListenerHandle> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, path = %self.config.path, "Webhook server listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                info!("Webhook server shutting down");
            });
            if let Err(e) = server.await {
                error!(error = %e, "Webhook server error");
            }
        });

        Ok(ListenerHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Handle to a running webhook server. Dropping it stops the server.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting requests and waits for in-flight ones to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Webhook server task ended abnormally");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// POST handler for the webhook path.
async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(expected) = &state.secret_token {
        let provided = headers.get(SECRET_TOKEN_HEADER).map(|v| v.as_bytes());
        if provided != Some(expected.as_bytes()) {
            warn!("Rejected webhook request with invalid secret token");
            return (StatusCode::FORBIDDEN, "Invalid secret token").into_response();
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, len = body.len(), "Rejected malformed webhook update");
            return (StatusCode::BAD_REQUEST, "Invalid update").into_response();
        }
    };

    let update_id = update.update_id;
    trace!(update_id, kind = update.kind.name(), "Received webhook update");

    match state.handler.handle_update(update).await {
        Ok(()) => {
            debug!(update_id, "Webhook update processed");
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => {
            error!(update_id, error = %e, "Failed to process webhook update");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
