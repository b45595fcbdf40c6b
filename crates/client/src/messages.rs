//! Push-channel message types and decoder.
//!
//! The backend sends JSON text frames shaped `{"type", "message"?, "data"?}`.
//! [`parse_message`] turns one frame into a typed [`ProgressEvent`];
//! [`ProgressEvent::into_candidate`] maps it onto a state-machine
//! [`Candidate`]. Unknown `type` tags decode to `Ok(None)` so newer
//! backends never break older clients.

use bizeval_core::job::{Candidate, Channel, TrackPhase, Transition};
use bizeval_core::job_events::{
    DEFAULT_FAILURE_REASON, MSG_TYPE_ANALYSIS_COMPLETED, MSG_TYPE_ANALYSIS_FAILED,
    MSG_TYPE_ANALYSIS_PARTIAL, MSG_TYPE_ANALYSIS_STARTED, MSG_TYPE_CONNECTED,
    MSG_TYPE_CONSOLIDATION_STARTED, MSG_TYPE_TRACK_COMPLETED, MSG_TYPE_TRACK_FAILED,
    MSG_TYPE_TRACK_STARTED,
};
use bizeval_core::types::JobId;
use serde::Deserialize;
use serde_json::Value;

/// Every push message this client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The server accepted the socket.
    Connected { message: Option<String> },

    AnalysisStarted { message: Option<String> },

    /// `track` is `None` when `data.track` is absent. The server names
    /// only completed tracks.
    TrackStarted {
        track: Option<String>,
        message: Option<String>,
    },

    TrackCompleted {
        track: Option<String>,
        message: Option<String>,
    },

    TrackFailed {
        track: Option<String>,
        message: Option<String>,
    },

    ConsolidationStarted { message: Option<String> },

    /// Terminal success with the raw report payload.
    AnalysisCompleted {
        job_id: JobId,
        report: Value,
        message: Option<String>,
    },

    /// Terminal failure (including partial completion).
    AnalysisFailed { reason: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CompletedData {
    job_id: JobId,
    report: Value,
}

/// Errors for frames that carry a known tag but an unusable body.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{kind}' frame is missing {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

/// Parse a push-channel text frame.
///
/// Returns `Ok(None)` for unknown `type` values; callers should log and
/// continue.
pub fn parse_message(text: &str) -> Result<Option<ProgressEvent>, DecodeError> {
    let Envelope {
        kind,
        message,
        data,
    } = serde_json::from_str(text)?;

    let event = match kind.as_str() {
        MSG_TYPE_CONNECTED => ProgressEvent::Connected { message },
        MSG_TYPE_ANALYSIS_STARTED => ProgressEvent::AnalysisStarted { message },
        MSG_TYPE_TRACK_STARTED => ProgressEvent::TrackStarted {
            track: track_name(data),
            message,
        },
        MSG_TYPE_TRACK_COMPLETED => ProgressEvent::TrackCompleted {
            track: track_name(data),
            message,
        },
        MSG_TYPE_TRACK_FAILED => ProgressEvent::TrackFailed {
            track: track_name(data),
            message,
        },
        MSG_TYPE_CONSOLIDATION_STARTED => ProgressEvent::ConsolidationStarted { message },
        MSG_TYPE_ANALYSIS_COMPLETED => {
            let data = data.ok_or(DecodeError::MissingField {
                kind: MSG_TYPE_ANALYSIS_COMPLETED,
                field: "data",
            })?;
            let CompletedData { job_id, report } = serde_json::from_value(data)?;
            ProgressEvent::AnalysisCompleted {
                job_id,
                report,
                message,
            }
        }
        MSG_TYPE_ANALYSIS_FAILED | MSG_TYPE_ANALYSIS_PARTIAL => ProgressEvent::AnalysisFailed {
            reason: message.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
        },
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// `data.track`, when present as a non-empty string.
fn track_name(data: Option<Value>) -> Option<String> {
    match data?.get("track")? {
        Value::String(name) if !name.trim().is_empty() => Some(name.clone()),
        _ => None,
    }
}

impl ProgressEvent {
    /// Map the event onto a state-machine candidate for `tracked`.
    ///
    /// `Connected` carries no lifecycle information and a completion for
    /// another job id is not ours; both yield `None`.
    pub fn into_candidate(self, tracked: &JobId) -> Option<Candidate> {
        let (transition, message) = match self {
            Self::Connected { .. } => return None,
            Self::AnalysisStarted { message } => (Transition::AnalysisStarted, message),
            Self::TrackStarted { track, message } => (
                Transition::Track {
                    track,
                    phase: TrackPhase::Started,
                },
                message,
            ),
            Self::TrackCompleted { track, message } => (
                Transition::Track {
                    track,
                    phase: TrackPhase::Completed,
                },
                message,
            ),
            Self::TrackFailed { track, message } => (
                Transition::Track {
                    track,
                    phase: TrackPhase::Failed,
                },
                message,
            ),
            Self::ConsolidationStarted { message } => (Transition::ConsolidationStarted, message),
            Self::AnalysisCompleted {
                job_id,
                report,
                message,
            } => {
                if &job_id != tracked {
                    return None;
                }
                (Transition::Completed { report }, message)
            }
            Self::AnalysisFailed { reason } => {
                let message = Some(reason.clone());
                (Transition::Failed { reason }, message)
            }
        };

        Some(Candidate::new(Channel::Push, transition).with_message(message))
    }
}
