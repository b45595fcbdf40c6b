//! WebSocket client for the push channel.
//!
//! [`PushClient`] holds the base URL; [`PushClient::connect`] opens the
//! per-session progress stream at `{ws_url}/ws/{session_id}`.

use bizeval_core::types::SessionId;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Raw push stream.
pub type PushStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Lifecycle of the push connection, observable through the tracker handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Closed by either side, or by the tracker after a terminal status.
    Closed,
    /// Failed to connect or dropped with an error. Polling carries on.
    Errored(String),
}

/// Connection settings for the push channel.
#[derive(Debug, Clone)]
pub struct PushClient {
    ws_url: String,
}

impl PushClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8000`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn endpoint(&self, session_id: &SessionId) -> String {
        format!("{}/ws/{}", self.ws_url, session_id)
    }

    /// Open the progress stream for `session_id`.
    pub async fn connect(&self, session_id: &SessionId) -> Result<PushStream, ChannelError> {
        let url = self.endpoint(session_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ChannelError::Connection(format!("Failed to connect to {url}: {e}"))
        })?;

        tracing::info!(session_id = %session_id, "Push channel connected to {}", self.ws_url);
        Ok(ws_stream)
    }
}

/// Errors that can occur on the push channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
