//! Tracker-level events.
//!
//! Lifecycle changes of the job itself are observed through the job watch
//! channel; these events describe what happens to the delivery channels
//! around it.

use bizeval_core::job::JobStatus;
use bizeval_core::types::JobId;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub enum TrackerEvent {
    /// The push channel for the job is open.
    ChannelUp { job_id: JobId },

    /// The push channel failed or closed. Polling continues regardless.
    ChannelDown { job_id: JobId, reason: String },

    /// A status poll failed; it will be retried on the next tick.
    PollFailed { job_id: JobId, error: String },

    /// The job reached `done` or `failed` and both channels are stopping.
    JobTerminal { job_id: JobId, status: JobStatus },
}
