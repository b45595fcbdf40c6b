use bizeval_core::job::Job;
use bizeval_core::types::{JobId, SessionId, Timestamp};
use tokio::sync::watch;

use crate::api::SessionStart;

/// A client session opened against the backend.
///
/// Holds at most one active job; the gateway refuses a new submission while
/// that job is still in flight.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    ws_token: Option<String>,
    status: Option<String>,
    started_at: Timestamp,
    active: Option<watch::Receiver<Job>>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            ws_token: None,
            status: None,
            started_at: chrono::Utc::now(),
            active: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Opaque token returned by the backend, if any.
    pub fn ws_token(&self) -> Option<&str> {
        self.ws_token.as_deref()
    }

    /// Session status reported when the session was opened, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Bind a tracked job to this session.
    pub fn attach(&mut self, job: watch::Receiver<Job>) {
        self.active = Some(job);
    }

    /// Id of the job currently bound to the session, terminal or not.
    pub fn active_job(&self) -> Option<JobId> {
        self.active.as_ref().map(|rx| rx.borrow().id().clone())
    }

    /// Whether the bound job is still non-terminal.
    ///
    /// A job whose tracker has been dropped no longer counts.
    pub fn has_job_in_flight(&self) -> bool {
        match &self.active {
            Some(rx) => rx.has_changed().is_ok() && !rx.borrow().is_terminal(),
            None => false,
        }
    }
}

impl From<SessionStart> for Session {
    fn from(start: SessionStart) -> Self {
        Self {
            ws_token: start.ws_token,
            status: start.status,
            ..Self::new(start.session_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use bizeval_core::job::{Candidate, Channel, Transition};

    use super::*;
    use crate::state::JobState;

    #[test]
    fn fresh_session_has_no_job() {
        let session = Session::new(SessionId::new("s1"));
        assert!(!session.has_job_in_flight());
        assert!(session.active_job().is_none());
    }

    #[test]
    fn in_flight_until_terminal() {
        let state = JobState::new(Job::new(JobId::new("7"), SessionId::new("s1")));
        let mut session = Session::new(SessionId::new("s1"));
        session.attach(state.subscribe());

        assert!(session.has_job_in_flight());
        assert_eq!(session.active_job(), Some(JobId::new("7")));

        state.fold(Candidate::new(
            Channel::Push,
            Transition::Failed {
                reason: "x".into(),
            },
        ));
        assert!(!session.has_job_in_flight());
    }

    #[test]
    fn dropped_state_releases_the_session() {
        let state = JobState::new(Job::new(JobId::new("7"), SessionId::new("s1")));
        let mut session = Session::new(SessionId::new("s1"));
        session.attach(state.subscribe());
        drop(state);
        assert!(!session.has_job_in_flight());
    }

    #[test]
    fn from_session_start_keeps_token_and_status() {
        let start = SessionStart {
            session_id: SessionId::new("abc"),
            ws_token: Some("tok".into()),
            status: Some("active".into()),
        };
        let session = Session::from(start);
        assert_eq!(session.id().as_str(), "abc");
        assert_eq!(session.ws_token(), Some("tok"));
        assert_eq!(session.status(), Some("active"));

        let bare = Session::from(SessionStart {
            session_id: SessionId::new("def"),
            ws_token: None,
            status: None,
        });
        assert!(bare.status().is_none());
    }
}
