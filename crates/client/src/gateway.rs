//! Session start and form submission.

use std::sync::Arc;

use bizeval_core::error::CoreError;
use bizeval_core::form::SubmissionForm;
use bizeval_core::types::JobId;

use crate::api::{AnalysisBackend, ApiError};
use crate::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Required fields were blank; nothing was sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// The session already tracks a non-terminal job.
    #[error("Job {0} is still in progress for this session")]
    JobInFlight(JobId),

    /// The backend refused or never answered the request.
    #[error("Submission failed: {0}")]
    SubmissionFailed(#[from] ApiError),

    #[error("Failed to encode form: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Entry point for turning a filled form into a job id.
#[derive(Clone)]
pub struct SubmissionGateway {
    backend: Arc<dyn AnalysisBackend>,
}

impl SubmissionGateway {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    /// Open a new session with the backend.
    pub async fn start_session(&self) -> Result<Session, ApiError> {
        let start = self.backend.start_session().await?;
        tracing::info!(session_id = %start.session_id, "Session started");
        Ok(Session::from(start))
    }

    /// Validate `form` locally and submit it for `session`.
    ///
    /// Validation and the in-flight check run before any request is made.
    pub async fn submit<F: SubmissionForm>(
        &self,
        session: &Session,
        form: &F,
    ) -> Result<JobId, SubmitError> {
        form.validate()?;

        if session.has_job_in_flight() {
            if let Some(job_id) = session.active_job() {
                return Err(SubmitError::JobInFlight(job_id));
            }
        }

        let payload = serde_json::to_value(form).map_err(SubmitError::Encode)?;
        let job_id = self.backend.submit_form(session.id(), &payload).await?;

        tracing::info!(session_id = %session.id(), job_id = %job_id, "Form submitted");
        Ok(job_id)
    }
}
