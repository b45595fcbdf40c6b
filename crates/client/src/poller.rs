//! Poll reconciler.
//!
//! Queries the job status endpoint every `interval` and folds the answer
//! into the shared [`JobState`]. It is the safety net for the push
//! channel: it runs for the whole life of the job, whether push is up,
//! down or disabled, and stops on the first tick after the job becomes
//! terminal or when cancelled.

use std::sync::Arc;
use std::time::Duration;

use bizeval_core::error::CoreError;
use bizeval_core::job::{Candidate, Channel, FoldOutcome, RemoteStatus, Transition};
use bizeval_core::job_events::DEFAULT_FAILURE_REASON;
use bizeval_core::types::JobId;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{AnalysisBackend, ApiError, StatusResponse};
use crate::events::TrackerEvent;
use crate::state::JobState;

/// Why [`PollReconciler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Terminal,
    Cancelled,
}

/// A failed poll. Every variant is transient: the next tick retries.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Request(#[from] ApiError),

    /// Unknown status string or a report that could not be assembled.
    #[error(transparent)]
    Malformed(#[from] CoreError),

    #[error("Status is done but no report was returned")]
    MissingReport,
}

pub struct PollReconciler {
    backend: Arc<dyn AnalysisBackend>,
    job_id: JobId,
    state: JobState,
    interval: Duration,
    events: broadcast::Sender<TrackerEvent>,
}

impl PollReconciler {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        job_id: JobId,
        state: JobState,
        interval: Duration,
        events: broadcast::Sender<TrackerEvent>,
    ) -> Self {
        Self {
            backend,
            job_id,
            state,
            interval,
            events,
        }
    }

    /// Poll until the job is terminal or `cancel` fires.
    ///
    /// The first poll happens immediately. A request still in flight when
    /// `cancel` fires is dropped and its answer never folded.
    pub async fn run(&self, cancel: CancellationToken) -> PollExit {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            job_id = %self.job_id,
            poll_interval_ms = self.interval.as_millis() as u64,
            "Poll reconciler started",
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.exit(PollExit::Cancelled),
                _ = ticker.tick() => {}
            }

            if self.state.is_terminal() {
                return self.exit(PollExit::Terminal);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.exit(PollExit::Cancelled),
                result = self.reconcile() => {
                    if let Err(e) = result {
                        tracing::warn!(job_id = %self.job_id, error = %e, "Status poll failed");
                        let _ = self.events.send(TrackerEvent::PollFailed {
                            job_id: self.job_id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            if self.state.is_terminal() {
                return self.exit(PollExit::Terminal);
            }
        }
    }

    /// One poll: fetch the remote status and fold it.
    pub async fn reconcile(&self) -> Result<(), PollError> {
        let response = self.backend.fetch_status(&self.job_id).await?;
        tracing::debug!(job_id = %self.job_id, status = %response.status, "Status polled");

        let Some(candidate) = Self::candidate_for(response)? else {
            return Ok(());
        };

        match self.state.fold(candidate) {
            FoldOutcome::Rejected(e) => Err(PollError::Malformed(e)),
            FoldOutcome::Applied | FoldOutcome::Discarded(_) => Ok(()),
        }
    }

    /// Map a status answer onto a candidate; `pending` yields none.
    fn candidate_for(response: StatusResponse) -> Result<Option<Candidate>, PollError> {
        let transition = match RemoteStatus::from_wire(&response.status)? {
            RemoteStatus::Pending => return Ok(None),
            RemoteStatus::Running => Transition::AnalysisStarted,
            RemoteStatus::Done => Transition::Completed {
                report: response.report.ok_or(PollError::MissingReport)?,
            },
            RemoteStatus::Failed | RemoteStatus::Partial => Transition::Failed {
                reason: response
                    .message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
            },
        };

        Ok(Some(
            Candidate::new(Channel::Poll, transition).with_message(response.message),
        ))
    }

    fn exit(&self, exit: PollExit) -> PollExit {
        tracing::info!(job_id = %self.job_id, ?exit, "Poll reconciler stopped");
        exit
    }
}
