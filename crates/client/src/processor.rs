//! Push-channel message processing loop.
//!
//! Reads raw frames from the progress stream, decodes them into
//! [`ProgressEvent`](crate::messages::ProgressEvent)s and folds the
//! resulting candidates into the shared [`JobState`] in arrival order.

use bizeval_core::types::JobId;
use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::messages::parse_message;
use crate::state::JobState;

/// Why the processing loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEnd {
    /// The tracked job reached a terminal status.
    Terminal,
    /// The server sent a close frame.
    Closed,
    /// A receive error ended the stream.
    Errored(String),
    /// The stream ended without a close frame.
    Exhausted,
}

/// Process push frames until the job is terminal or the stream ends.
///
/// Malformed and unknown frames are logged and skipped; they never end the
/// loop. Binary and control frames are ignored.
pub async fn process_messages<S>(stream: &mut S, job_id: &JobId, state: &JobState) -> ChannelEnd
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                handle_text_message(&text, job_id, state);
                if state.is_terminal() {
                    return ChannelEnd::Terminal;
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::trace!(job_id = %job_id, "Ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(job_id = %job_id, ?frame, "Push channel closed by server");
                return ChannelEnd::Closed;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Push channel receive error");
                return ChannelEnd::Errored(e.to_string());
            }
        }
    }

    ChannelEnd::Exhausted
}

/// Decode one text frame and fold it.
fn handle_text_message(text: &str, job_id: &JobId, state: &JobState) {
    match parse_message(text) {
        Ok(Some(event)) => {
            tracing::debug!(job_id = %job_id, ?event, "Push event received");
            match event.into_candidate(job_id) {
                Some(candidate) => {
                    state.fold(candidate);
                }
                None => tracing::trace!(job_id = %job_id, "Push event carries no transition"),
            }
        }
        Ok(None) => {
            tracing::debug!(job_id = %job_id, raw_message = %text, "Ignoring unknown push message");
        }
        Err(e) => {
            tracing::warn!(
                job_id = %job_id,
                error = %e,
                raw_message = %text,
                "Failed to parse push message",
            );
        }
    }
}
