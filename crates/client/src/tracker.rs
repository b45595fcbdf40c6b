//! Job tracking orchestrator.
//!
//! [`JobTracker`] owns the channel configuration and spawns, per job, three
//! tasks sharing one [`JobState`]:
//!
//! - the push task (connect, then process frames until close or terminal),
//! - the poll task ([`PollReconciler`]),
//! - a supervisor that cancels both once the job is terminal.
//!
//! Tracker events are broadcast via a [`tokio::sync::broadcast`] channel.
//! Call [`JobTracker::subscribe`] before [`JobTracker::start`] to see every
//! event of the job, or [`TrackerHandle::events`] for later ones.

use std::sync::Arc;
use std::time::Duration;

use bizeval_core::job::Job;
use bizeval_core::types::{JobId, SessionId};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::AnalysisBackend;
use crate::client::{ChannelError, ConnectionState, PushClient};
use crate::config::TrackerConfig;
use crate::events::TrackerEvent;
use crate::poller::PollReconciler;
use crate::processor::{process_messages, ChannelEnd};
use crate::session::Session;
use crate::state::JobState;

/// Broadcast channel capacity for tracker events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on each task's exit during [`TrackerHandle::shutdown`].
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on sending our close frame to the server.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct JobTracker {
    backend: Arc<dyn AnalysisBackend>,
    /// `None` when push is disabled; polling then carries the job alone.
    push: Option<PushClient>,
    poll_interval: Duration,
    event_tx: broadcast::Sender<TrackerEvent>,
}

impl JobTracker {
    pub fn new(backend: Arc<dyn AnalysisBackend>, config: &TrackerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let push = config
            .push_enabled
            .then(|| PushClient::new(config.ws_url.clone()));

        Self {
            backend,
            push,
            poll_interval: config.poll_interval,
            event_tx,
        }
    }

    /// Subscribe to events of every job this tracker starts.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_tx.subscribe()
    }

    /// Begin tracking `job_id`, a job just created for `session`.
    ///
    /// The job enters `created` and is attached to the session before any
    /// task runs. Must be called within a Tokio runtime.
    pub fn start(&self, session: &mut Session, job_id: JobId) -> TrackerHandle {
        let state = JobState::new(Job::new(job_id.clone(), session.id().clone()));
        session.attach(state.subscribe());

        let cancel = CancellationToken::new();
        let initial = if self.push.is_some() {
            ConnectionState::Connecting
        } else {
            ConnectionState::Closed
        };
        let (conn_tx, conn_rx) = watch::channel(initial);
        let mut tasks = Vec::with_capacity(3);

        if let Some(push) = &self.push {
            let push = push.clone();
            let session_id = session.id().clone();
            let job_id = job_id.clone();
            let state = state.clone();
            let events = self.event_tx.clone();
            let cancel = cancel.child_token();
            tasks.push(tokio::spawn(async move {
                run_push_channel(&push, &session_id, &job_id, &state, &conn_tx, &events, &cancel)
                    .await;
            }));
        } else {
            tracing::info!(job_id = %job_id, "Push channel disabled, polling only");
        }

        {
            let poller = PollReconciler::new(
                Arc::clone(&self.backend),
                job_id.clone(),
                state.clone(),
                self.poll_interval,
                self.event_tx.clone(),
            );
            let cancel = cancel.child_token();
            tasks.push(tokio::spawn(async move {
                poller.run(cancel).await;
            }));
        }

        {
            let rx = state.subscribe();
            let job_id = job_id.clone();
            let events = self.event_tx.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                supervise(rx, &job_id, &events, &cancel).await;
            }));
        }

        tracing::info!(job_id = %job_id, session_id = %session.id(), "Tracking job");

        TrackerHandle {
            job_id,
            state,
            connection: conn_rx,
            event_tx: self.event_tx.clone(),
            cancel,
            tasks,
        }
    }
}

/// Live tracking context for one job.
///
/// Dropping the handle cancels both channels; [`shutdown`](Self::shutdown)
/// additionally waits for the tasks to exit.
pub struct TrackerHandle {
    job_id: JobId,
    state: JobState,
    connection: watch::Receiver<ConnectionState>,
    event_tx: broadcast::Sender<TrackerEvent>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TrackerHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Receive the job after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Job {
        self.state.snapshot()
    }

    /// Push channel state. Independent of the job status.
    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_tx.subscribe()
    }

    /// Wait until the job is `done` or `failed` and return it.
    pub async fn wait_terminal(&self) -> Job {
        let mut rx = self.state.subscribe();
        let terminal = rx
            .wait_for(|job| job.is_terminal())
            .await
            .map(|job| job.clone());
        // The sender lives in `self.state`, so the channel cannot close here.
        terminal.unwrap_or_else(|_| self.state.snapshot())
    }

    /// Cancel both channels and wait for every task to exit.
    pub async fn shutdown(mut self) {
        tracing::info!(job_id = %self.job_id, "Shutting down job tracker");
        self.cancel.cancel();

        for task in std::mem::take(&mut self.tasks) {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!(job_id = %self.job_id, "Tracker task did not stop in time");
            }
        }

        tracing::info!(job_id = %self.job_id, "Job tracker shut down complete");
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Connect once and feed frames into the job until close, terminal or
/// cancellation. Never reconnects; polling covers the gap.
async fn run_push_channel(
    client: &PushClient,
    session_id: &SessionId,
    job_id: &JobId,
    state: &JobState,
    conn: &watch::Sender<ConnectionState>,
    events: &broadcast::Sender<TrackerEvent>,
    cancel: &CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            conn.send_replace(ConnectionState::Closed);
            return;
        }
        result = client.connect(session_id) => result,
    };

    let mut stream = match connected {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Push channel down, relying on polling");
            conn.send_replace(ConnectionState::Errored(e.to_string()));
            let _ = events.send(TrackerEvent::ChannelDown {
                job_id: job_id.clone(),
                reason: e.to_string(),
            });
            return;
        }
    };

    conn.send_replace(ConnectionState::Open);
    let _ = events.send(TrackerEvent::ChannelUp {
        job_id: job_id.clone(),
    });

    let end = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        end = process_messages(&mut stream, job_id, state) => Some(end),
    };

    let down_reason = match end {
        None | Some(ChannelEnd::Terminal) => {
            if tokio::time::timeout(CLOSE_TIMEOUT, stream.close(None))
                .await
                .is_err()
            {
                tracing::debug!(job_id = %job_id, "Close handshake timed out");
            }
            conn.send_replace(ConnectionState::Closed);
            None
        }
        Some(ChannelEnd::Closed) | Some(ChannelEnd::Exhausted) => {
            conn.send_replace(ConnectionState::Closed);
            Some("closed by server".to_string())
        }
        Some(ChannelEnd::Errored(reason)) => {
            let reason = ChannelError::Protocol(reason).to_string();
            conn.send_replace(ConnectionState::Errored(reason.clone()));
            Some(reason)
        }
    };

    if let Some(reason) = down_reason {
        if !state.is_terminal() {
            tracing::warn!(job_id = %job_id, reason = %reason, "Push channel down, relying on polling");
        }
        let _ = events.send(TrackerEvent::ChannelDown {
            job_id: job_id.clone(),
            reason,
        });
    }

    tracing::info!(job_id = %job_id, "Push channel task exited");
}

/// Wait for a terminal status, announce it and cancel the channels.
async fn supervise(
    mut rx: watch::Receiver<Job>,
    job_id: &JobId,
    events: &broadcast::Sender<TrackerEvent>,
    cancel: &CancellationToken,
) {
    let terminal = async {
        rx.wait_for(|job| job.is_terminal())
            .await
            .map(|job| job.status())
    };

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        status = terminal => match status {
            Ok(status) => status,
            Err(_) => return,
        },
    };

    tracing::info!(job_id = %job_id, status = %status, "Job reached terminal status");
    let _ = events.send(TrackerEvent::JobTerminal {
        job_id: job_id.clone(),
        status,
    });
    cancel.cancel();
}
