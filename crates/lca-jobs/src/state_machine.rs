//! Job lifecycle transitions
//!
//! `pending -> processing -> {completed | failed}`, `pending -> failed` when
//! the BOM cannot be loaded, and `pending | processing -> cancelled`.
//! Terminal states have no successors.

use crate::error::JobError;
use crate::job::JobStatus;

/// Validates a state transition.
///
/// # Errors
/// - `JobError::IllegalTransition` if `to` is not a successor of `from`
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), JobError> {
    if allowed(from, to) {
        Ok(())
    } else {
        tracing::debug!(%from, %to, "Rejected job transition");
        Err(JobError::IllegalTransition { from, to })
    }
}

/// Legal successors of a status
#[must_use]
pub fn allowed_transitions(from: JobStatus) -> Vec<JobStatus> {
    use JobStatus::{Cancelled, Completed, Failed, Pending, Processing};
    match from {
        Pending => vec![Processing, Failed, Cancelled],
        Processing => vec![Completed, Failed, Cancelled],
        Completed | Failed | Cancelled => vec![],
    }
}

fn allowed(from: JobStatus, to: JobStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
