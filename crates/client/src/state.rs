//! Shared, observable job state.
//!
//! [`JobState`] is the only writer of a tracked [`Job`]. Both channel tasks
//! hold a clone and call [`JobState::fold`]; the fold and the change
//! notification happen under one lock, so readers never see a half-applied
//! transition and two candidates can never race on the same status.

use std::sync::Arc;

use bizeval_core::job::{Candidate, DiscardReason, FoldOutcome, Job, JobStatus, Transition};
use tokio::sync::watch;

/// Cloneable handle to a job's single source of truth.
#[derive(Clone)]
pub struct JobState {
    tx: Arc<watch::Sender<Job>>,
}

impl JobState {
    pub fn new(job: Job) -> Self {
        let (tx, _) = watch::channel(job);
        Self { tx: Arc::new(tx) }
    }

    /// Fold one candidate into the job.
    ///
    /// Subscribers are woken only when the candidate was applied.
    pub fn fold(&self, candidate: Candidate) -> FoldOutcome {
        let source = candidate.source;
        let target = describe(&candidate.transition);
        // Overwritten below: send_if_modified runs the closure exactly once.
        let mut outcome = FoldOutcome::Discarded(DiscardReason::Terminal);

        self.tx.send_if_modified(|job| {
            outcome = job.fold(candidate);
            outcome.is_applied()
        });

        let job = self.tx.borrow();
        match &outcome {
            FoldOutcome::Applied => tracing::info!(
                job_id = %job.id(),
                ?source,
                status = %job.status(),
                "Job transition applied",
            ),
            FoldOutcome::Discarded(reason) => tracing::debug!(
                job_id = %job.id(),
                ?source,
                ?reason,
                transition = %target,
                "Candidate discarded",
            ),
            FoldOutcome::Rejected(e) => tracing::warn!(
                job_id = %job.id(),
                ?source,
                error = %e,
                "Completion rejected",
            ),
        }

        outcome
    }

    /// Receive a notification after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.tx.subscribe()
    }

    /// Clone of the current job.
    pub fn snapshot(&self) -> Job {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.tx.borrow().status()
    }

    pub fn is_terminal(&self) -> bool {
        self.tx.borrow().is_terminal()
    }
}

/// Short log label; never includes the report payload.
fn describe(transition: &Transition) -> String {
    match transition {
        Transition::AnalysisStarted => "analysis_started".into(),
        Transition::Track { track, phase } => {
            format!("track {} {phase:?}", track.as_deref().unwrap_or("<unnamed>"))
        }
        Transition::ConsolidationStarted => "consolidation_started".into(),
        Transition::Completed { .. } => "completed".into(),
        Transition::Failed { .. } => "failed".into(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bizeval_core::job::{Channel, TrackPhase};
    use bizeval_core::types::{JobId, SessionId};

    use super::*;

    fn state() -> JobState {
        JobState::new(Job::new(JobId::new("1"), SessionId::new("s")))
    }

    #[tokio::test]
    async fn applied_fold_notifies_subscribers() {
        let state = state();
        let mut rx = state.subscribe();

        let outcome = state.fold(Candidate::new(Channel::Push, Transition::AnalysisStarted));
        assert_eq!(outcome, FoldOutcome::Applied);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert_eq!(state.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn discarded_fold_does_not_notify() {
        let state = state();
        state.fold(Candidate::new(Channel::Push, Transition::ConsolidationStarted));
        let rx = state.subscribe();

        let outcome = state.fold(Candidate::new(Channel::Poll, Transition::AnalysisStarted));
        assert_matches!(outcome, FoldOutcome::Discarded(DiscardReason::NotForward { .. }));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(state.status(), JobStatus::Consolidating);
    }

    #[tokio::test]
    async fn fold_reports_the_job_outcome() {
        let state = state();
        state.fold(Candidate::new(
            Channel::Poll,
            Transition::Failed {
                reason: "boom".into(),
            },
        ));
        let rx = state.subscribe();

        let late = Candidate::new(
            Channel::Push,
            Transition::Track {
                track: None,
                phase: TrackPhase::Started,
            },
        );
        assert_eq!(state.fold(late), FoldOutcome::Discarded(DiscardReason::Terminal));
        assert!(!rx.has_changed().unwrap());

        let fresh = JobState::new(Job::new(JobId::new("2"), SessionId::new("s")));
        let rejected = fresh.fold(Candidate::new(
            Channel::Push,
            Transition::Completed {
                report: serde_json::json!({}),
            },
        ));
        assert_matches!(rejected, FoldOutcome::Rejected(_));
        assert_eq!(fresh.status(), JobStatus::Created);
    }

    #[tokio::test]
    async fn clones_share_one_job() {
        let a = state();
        let b = a.clone();
        b.fold(Candidate::new(
            Channel::Poll,
            Transition::Failed {
                reason: "boom".into(),
            },
        ));
        assert!(a.is_terminal());
        assert_eq!(a.snapshot().failure(), Some("boom"));
    }
}
