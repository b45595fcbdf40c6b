#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Missing required fields: {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Unknown job status '{0}'")]
    UnknownStatus(String),
}
