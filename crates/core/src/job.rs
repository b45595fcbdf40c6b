//! Job lifecycle state machine.
//!
//! A [`Job`] is the single source of truth for one submitted analysis. Both
//! delivery channels hand it [`Candidate`] transitions through
//! [`Job::fold`]; a candidate is applied only when its target status is
//! forward-reachable from the current one:
//!
//! ```text
//! created -> running -> track_running* -> consolidating -> done
//!                 \__________________________________\-> failed
//! ```
//!
//! Everything else is discarded without touching state, which makes folds
//! idempotent and independent of which channel delivers first.
//!
//! Track frames may arrive without a track name. An unnamed start advances
//! the status and feeds its message but stays out of the track log; the
//! next named completion or failure with no logged start claims it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::job_events::{
    POLL_STATUS_DONE, POLL_STATUS_FAILED, POLL_STATUS_PARTIAL, POLL_STATUS_PENDING,
    POLL_STATUS_RUNNING,
};
use crate::report::{assemble, Report};
use crate::types::{JobId, SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running,
    TrackRunning,
    Consolidating,
    Done,
    Failed,
}

impl JobStatus {
    /// Position along the success path.
    fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Running => 1,
            Self::TrackRunning => 2,
            Self::Consolidating => 3,
            Self::Done | Self::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `to` is forward-reachable from `self`.
    ///
    /// `track_running` may repeat; `failed` is reachable from every
    /// non-terminal status; nothing leaves a terminal status.
    pub fn can_advance_to(self, to: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            Self::Created => false,
            Self::Failed => true,
            Self::TrackRunning if self == Self::TrackRunning => true,
            _ => to.rank() > self.rank(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::TrackRunning => "track_running",
            Self::Consolidating => "consolidating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status strings reported by the poll endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Running,
    Done,
    Failed,
    Partial,
}

impl RemoteStatus {
    pub fn from_wire(s: &str) -> Result<Self, CoreError> {
        match s {
            POLL_STATUS_PENDING => Ok(Self::Pending),
            POLL_STATUS_RUNNING => Ok(Self::Running),
            POLL_STATUS_DONE => Ok(Self::Done),
            POLL_STATUS_FAILED => Ok(Self::Failed),
            POLL_STATUS_PARTIAL => Ok(Self::Partial),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Track events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPhase {
    Started,
    Completed,
    Failed,
}

/// One entry of the ordered track log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackEvent {
    pub track: String,
    pub phase: TrackPhase,
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Which delivery channel produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Push,
    Poll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    AnalysisStarted,
    /// `track` is `None` when the frame did not name its track.
    Track {
        track: Option<String>,
        phase: TrackPhase,
    },
    ConsolidationStarted,
    /// Carries the raw report payload; it is assembled during the fold.
    Completed { report: Value },
    Failed { reason: String },
}

impl Transition {
    fn target(&self) -> JobStatus {
        match self {
            Self::AnalysisStarted => JobStatus::Running,
            Self::Track { .. } => JobStatus::TrackRunning,
            Self::ConsolidationStarted => JobStatus::Consolidating,
            Self::Completed { .. } => JobStatus::Done,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// A transition reported by one channel, not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: Channel,
    pub transition: Transition,
    /// Human-readable progress text shown in the live feed.
    pub message: Option<String>,
}

impl Candidate {
    pub fn new(source: Channel, transition: Transition) -> Self {
        Self {
            source,
            transition,
            message: None,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

/// Why a candidate left the job untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The job is already `done` or `failed`.
    Terminal,
    /// The target status is not ahead of the current one.
    NotForward { from: JobStatus, to: JobStatus },
    /// The same track and phase was already logged.
    DuplicateTrackEvent,
    /// A completed/failed phase arrived for a track that never started,
    /// named or not.
    TrackNotStarted,
    /// The track already completed or failed.
    TrackAlreadyEnded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FoldOutcome {
    Applied,
    Discarded(DiscardReason),
    /// A completion whose report could not be assembled.
    Rejected(CoreError),
}

impl FoldOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A status change and the channel that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedTransition {
    pub status: JobStatus,
    pub source: Channel,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: JobId,
    session_id: SessionId,
    status: JobStatus,
    created_at: Timestamp,
    events: Vec<TrackEvent>,
    report: Option<Report>,
    failure: Option<String>,
    notes: Vec<String>,
    transitions: Vec<AppliedTransition>,
    /// Track starts received without a name and not yet claimed by a named
    /// completion or failure.
    unnamed_starts: usize,
}

impl Job {
    /// Enter `created` for a freshly submitted job.
    pub fn new(id: JobId, session_id: SessionId) -> Self {
        Self {
            id,
            session_id,
            status: JobStatus::Created,
            created_at: chrono::Utc::now(),
            events: Vec::new(),
            report: None,
            failure: None,
            notes: Vec::new(),
            transitions: Vec::new(),
            unnamed_starts: 0,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Ordered track log, one entry per (track, phase).
    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    /// Present only once `done`.
    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// Present only once `failed`.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Progress messages of applied candidates, in arrival order.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn transitions(&self) -> &[AppliedTransition] {
        &self.transitions
    }

    /// Offer a candidate transition to the job.
    ///
    /// State changes only when the outcome is [`FoldOutcome::Applied`].
    pub fn fold(&mut self, candidate: Candidate) -> FoldOutcome {
        if self.status.is_terminal() {
            return FoldOutcome::Discarded(DiscardReason::Terminal);
        }

        let target = candidate.transition.target();
        if !self.status.can_advance_to(target) {
            return FoldOutcome::Discarded(DiscardReason::NotForward {
                from: self.status,
                to: target,
            });
        }

        match candidate.transition {
            Transition::Track {
                track: Some(track),
                phase,
            } => {
                let claims_unnamed = match self.check_track(&track, phase) {
                    Ok(()) => false,
                    Err(DiscardReason::TrackNotStarted) if self.unnamed_starts > 0 => true,
                    Err(reason) => return FoldOutcome::Discarded(reason),
                };
                if claims_unnamed {
                    self.unnamed_starts -= 1;
                    self.events.push(TrackEvent {
                        track: track.clone(),
                        phase: TrackPhase::Started,
                        message: None,
                    });
                }
                self.events.push(TrackEvent {
                    track,
                    phase,
                    message: candidate.message.clone(),
                });
            }
            Transition::Track { track: None, phase } => match phase {
                TrackPhase::Started => self.unnamed_starts += 1,
                TrackPhase::Completed | TrackPhase::Failed => {
                    if self.unnamed_starts == 0 {
                        return FoldOutcome::Discarded(DiscardReason::TrackNotStarted);
                    }
                    self.unnamed_starts -= 1;
                }
            },
            Transition::Completed { report } => match assemble(&report) {
                Ok(report) => self.report = Some(report),
                Err(e) => return FoldOutcome::Rejected(e),
            },
            Transition::Failed { reason } => self.failure = Some(reason),
            Transition::AnalysisStarted | Transition::ConsolidationStarted => {}
        }

        if self.status != target {
            self.status = target;
            self.transitions.push(AppliedTransition {
                status: target,
                source: candidate.source,
            });
        }
        if let Some(message) = candidate.message {
            self.notes.push(message);
        }
        FoldOutcome::Applied
    }

    fn check_track(&self, track: &str, phase: TrackPhase) -> Result<(), DiscardReason> {
        let logged = |p: TrackPhase| {
            self.events
                .iter()
                .any(|e| e.track == track && e.phase == p)
        };

        if logged(phase) {
            return Err(DiscardReason::DuplicateTrackEvent);
        }
        match phase {
            TrackPhase::Started => Ok(()),
            TrackPhase::Completed | TrackPhase::Failed => {
                if !logged(TrackPhase::Started) {
                    Err(DiscardReason::TrackNotStarted)
                } else if logged(TrackPhase::Completed) || logged(TrackPhase::Failed) {
                    Err(DiscardReason::TrackAlreadyEnded)
                } else {
                    Ok(())
                }
            }
        }
    }
}
