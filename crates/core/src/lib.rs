//! Domain core for the BizEval job tracker.
//!
//! Pure, I/O-free building blocks shared by both delivery channels:
//!
//! - [`job`]: the forward-only job lifecycle state machine.
//! - [`report`]: validation of the final report into a read-only view.
//! - [`form`]: submission forms and local required-field checks.
//! - [`job_events`]: wire tags of the push channel and poll endpoint.

pub mod error;
pub mod form;
pub mod job;
pub mod job_events;
pub mod report;
pub mod types;
