//! BizEval job tracking client.
//!
//! Submits analysis jobs and follows them to completion over two channels
//! at once: the WebSocket push stream and an interval status poll. Both
//! feed one forward-only state machine, so whichever channel reports first
//! wins and late or duplicate reports are dropped.
//!
//! ```ignore
//! let backend: Arc<dyn AnalysisBackend> = Arc::new(BizEvalApi::new(config.api_url.clone()));
//! let gateway = SubmissionGateway::new(backend.clone());
//! let mut session = gateway.start_session().await?;
//! let job_id = gateway.submit(&session, &form).await?;
//! let handle = JobTracker::new(backend, &config).start(&mut session, job_id);
//! let job = handle.wait_terminal().await;
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod events;
pub mod gateway;
pub mod messages;
pub mod poller;
pub mod processor;
pub mod session;
pub mod state;
pub mod tracker;

pub use api::{AnalysisBackend, ApiError, BizEvalApi};
pub use client::{ChannelError, ConnectionState, PushClient};
pub use config::{ConfigError, TrackerConfig};
pub use events::TrackerEvent;
pub use gateway::{SubmissionGateway, SubmitError};
pub use poller::{PollError, PollReconciler};
pub use session::Session;
pub use state::JobState;
pub use tracker::{JobTracker, TrackerHandle};
