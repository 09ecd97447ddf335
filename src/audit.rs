//! Append-only ledger of job status changes.
//!
//! Every status mutation the engine commits carries exactly one record
//! here, written in the same unit of work. Records are never updated or
//! deleted; the store API exposes no way to do either. Reviewers read a
//! job's history back in insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{JobId, JobStatus, UserId};

/// Comment recorded when a technician reports work done.
pub const SUBMITTED_COMMENT: &str = "Submitted for review by technician";

/// A committed ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Monotonic record id. Ordering by id is insertion order.
    pub id: i64,
    pub job_id: JobId,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub changed_by: UserId,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry waiting to be appended inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStatusChange {
    pub job_id: JobId,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub changed_by: UserId,
    pub comment: Option<String>,
}
