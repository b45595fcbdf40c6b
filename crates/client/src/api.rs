//! REST client for the BizEval backend.
//!
//! [`AnalysisBackend`] is the seam the gateway and poll reconciler talk
//! through; [`BizEvalApi`] implements it over HTTP with [`reqwest`].

use async_trait::async_trait;
use bizeval_core::report::{download_path, DocumentKind};
use bizeval_core::types::{JobId, SessionId};
use serde::Deserialize;
use serde_json::Value;

/// Response of `POST /session/start`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStart {
    pub session_id: SessionId,
    #[serde(default)]
    pub ws_token: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of `POST /form/submit/{session_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

/// Response of `GET /report/{job_id}`.
///
/// `status` stays a raw string; the poll reconciler decides what it means.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub report: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// The backend operations the tracker depends on.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Open a new client session.
    async fn start_session(&self) -> Result<SessionStart, ApiError>;

    /// Create a job for `session_id` from an already-validated form payload.
    async fn submit_form(&self, session_id: &SessionId, payload: &Value)
        -> Result<JobId, ApiError>;

    /// Query the current status of a job.
    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusResponse, ApiError>;
}

/// HTTP client for one BizEval backend.
#[derive(Clone)]
pub struct BizEvalApi {
    client: reqwest::Client,
    api_url: String,
}

impl BizEvalApi {
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000/api`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Fetch the raw form description (`GET /form/structure`).
    pub async fn form_structure(&self) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(format!("{}/form/structure", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Absolute URL of a rendered report document. No request is made.
    pub fn download_url(&self, job_id: &JobId, kind: DocumentKind) -> String {
        format!("{}{}", self.api_url, download_path(job_id, kind))
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an [`ApiError::Status`]
    /// carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AnalysisBackend for BizEvalApi {
    async fn start_session(&self) -> Result<SessionStart, ApiError> {
        let response = self
            .client
            .post(format!("{}/session/start", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn submit_form(
        &self,
        session_id: &SessionId,
        payload: &Value,
    ) -> Result<JobId, ApiError> {
        let response = self
            .client
            .post(format!("{}/form/submit/{}", self.api_url, session_id))
            .json(payload)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        Ok(submitted.job_id)
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/report/{}", self.api_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_url_joins_base_and_path() {
        let api = BizEvalApi::new("http://host:8000/api".into());
        assert_eq!(
            api.download_url(&JobId::new("9"), DocumentKind::Docx),
            "http://host:8000/api/report/9/download/docx"
        );
    }

    #[test]
    fn status_response_tolerates_missing_report() {
        let r: StatusResponse =
            serde_json::from_str(r#"{"job_id": 3, "status": "running", "message": "busy"}"#)
                .unwrap();
        assert_eq!(r.status, "running");
        assert!(r.report.is_none());
        assert_eq!(r.message.as_deref(), Some("busy"));
    }

    #[test]
    fn session_start_accepts_numeric_id() {
        let s: SessionStart =
            serde_json::from_str(r#"{"session_id": 12, "ws_token": "abc", "status": "active"}"#)
                .unwrap();
        assert_eq!(s.session_id.as_str(), "12");
        assert_eq!(s.ws_token.as_deref(), Some("abc"));
    }
}
