//! Wire constants for the push channel and the poll endpoint.
//!
//! Push frames carry one of the `MSG_TYPE_*` tags in their `type` field.
//! The poll endpoint reports one of the `POLL_STATUS_*` strings.

/// Sent once by the server when the socket is accepted.
pub const MSG_TYPE_CONNECTED: &str = "connected";

/// The backend picked up the job and fanned out its tracks.
pub const MSG_TYPE_ANALYSIS_STARTED: &str = "analysis_started";

/// One analysis track began.
pub const MSG_TYPE_TRACK_STARTED: &str = "track_started";

/// One analysis track finished successfully.
pub const MSG_TYPE_TRACK_COMPLETED: &str = "track_completed";

/// One analysis track failed. The job may still finish.
pub const MSG_TYPE_TRACK_FAILED: &str = "track_failed";

/// All tracks are in; the consolidated report is being built.
pub const MSG_TYPE_CONSOLIDATION_STARTED: &str = "consolidation_started";

/// Terminal success. `data` carries `job_id` and `report`.
pub const MSG_TYPE_ANALYSIS_COMPLETED: &str = "analysis_completed";

/// Terminal failure. `message` carries the reason.
pub const MSG_TYPE_ANALYSIS_FAILED: &str = "analysis_failed";

/// Terminal: too few tracks succeeded to consolidate.
pub const MSG_TYPE_ANALYSIS_PARTIAL: &str = "analysis_partial";

/// Job accepted but not yet picked up.
pub const POLL_STATUS_PENDING: &str = "pending";

/// Job is being analysed.
pub const POLL_STATUS_RUNNING: &str = "running";

/// Job finished; the response carries the report.
pub const POLL_STATUS_DONE: &str = "done";

/// Job failed terminally.
pub const POLL_STATUS_FAILED: &str = "failed";

/// Job ended with only some tracks completed.
pub const POLL_STATUS_PARTIAL: &str = "partial";

/// Failure reason used when a failure report carries no text.
pub const DEFAULT_FAILURE_REASON: &str = "analysis failed";
