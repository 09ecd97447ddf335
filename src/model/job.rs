//! Jobs, their identity, and the review state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::non_blank;
use super::user::{CompanyId, UserId};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of scheduled field work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    pub customer_name: String,
    pub customer_address: String,
    pub customer_city: String,
    pub customer_phone: Option<String>,

    /// External order reference ("SK number").
    pub order_number: Option<String>,

    /// Free-form work category tag, e.g. NE3, NE4, TK, MESS.
    pub job_type: Option<String>,

    pub scheduled_from: DateTime<Utc>,
    pub scheduled_to: DateTime<Utc>,

    /// Technician who executes the job.
    pub assigned_user_id: UserId,

    /// Subcontractor the technician works for.
    pub company_id: CompanyId,

    pub created_by: UserId,
    pub creation_comment: Option<String>,

    pub status: JobStatus,

    /// Reviewer's note, set on approve and reject.
    pub admin_comment: Option<String>,

    /// Filled in when the technician submits the job for review.
    pub completion_notes: Option<String>,
    pub completed_success: Option<bool>,
    pub completed_at: Option<DateTime<Utc>>,

    /// The job this one was forwarded from, if any.
    pub source_job_id: Option<JobId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Human-facing reference: the order number when present, else the id.
    pub fn reference(&self) -> String {
        match self.order_number {
            Some(ref number) => number.clone(),
            None => self.id.0.to_string(),
        }
    }

    pub fn is_forwarded(&self) -> bool {
        self.source_job_id.is_some()
    }
}

/// Newtype for job IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl std::str::FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(JobId)
            .map_err(|e| Error::Validation(format!("invalid job id '{s}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Review lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Scheduled and owned by a technician, work not yet reported.
    Assigned,
    /// Technician reported the work; waiting for an admin decision.
    WaitingReview,
    /// Accepted by an admin. Terminal.
    Approved,
    /// Sent back to the technician, who may resubmit.
    Rejected,
}

impl JobStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Assigned, WaitingReview)
                | (Rejected, WaitingReview) // resubmission
                | (WaitingReview, Approved)
                | (WaitingReview, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Approved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Assigned => "ASSIGNED",
            JobStatus::WaitingReview => "WAITING_REVIEW",
            JobStatus::Approved => "APPROVED",
            JobStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASSIGNED" => Ok(JobStatus::Assigned),
            "WAITING_REVIEW" => Ok(JobStatus::WaitingReview),
            "APPROVED" => Ok(JobStatus::Approved),
            "REJECTED" => Ok(JobStatus::Rejected),
            _ => Err(Error::Other(format!("unknown job status: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduling window
// ---------------------------------------------------------------------------

/// Inclusive date window used to narrow job listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    /// A window only applies when both bounds are given.
    pub fn from_bounds(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<Self> {
        match (from, to) {
            (Some(from), Some(to)) => Some(Self { from, to }),
            _ => None,
        }
    }

    /// True if the job's whole schedule lies inside the window.
    pub fn contains(&self, job: &Job) -> bool {
        job.scheduled_from >= self.from && job.scheduled_to <= self.to
    }
}

// ---------------------------------------------------------------------------
// Creation input
// ---------------------------------------------------------------------------

/// Caller-supplied fields for a new job, as they arrive from a form.
///
/// Everything is optional here; [`JobFields::into_job`] enforces the
/// required set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFields {
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_city: Option<String>,
    pub customer_phone: Option<String>,
    pub order_number: Option<String>,
    pub job_type: Option<String>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
    pub assigned_user_id: Option<UserId>,
    pub company_id: Option<CompanyId>,
    pub creation_comment: Option<String>,
}

impl JobFields {
    /// Validate required fields and build an ASSIGNED job.
    pub fn into_job(self, created_by: UserId, now: DateTime<Utc>) -> Result<Job> {
        let customer_name = non_blank(self.customer_name);
        let customer_address = non_blank(self.customer_address);
        let customer_city = non_blank(self.customer_city);

        let mut missing = Vec::new();
        if customer_name.is_none() {
            missing.push("customer_name");
        }
        if customer_address.is_none() {
            missing.push("customer_address");
        }
        if customer_city.is_none() {
            missing.push("customer_city");
        }
        if self.scheduled_from.is_none() {
            missing.push("scheduled_from");
        }
        if self.scheduled_to.is_none() {
            missing.push("scheduled_to");
        }
        if self.assigned_user_id.is_none() {
            missing.push("assigned_user_id");
        }
        if self.company_id.is_none() {
            missing.push("company_id");
        }

        let (
            Some(customer_name),
            Some(customer_address),
            Some(customer_city),
            Some(scheduled_from),
            Some(scheduled_to),
            Some(assigned_user_id),
            Some(company_id),
        ) = (
            customer_name,
            customer_address,
            customer_city,
            self.scheduled_from,
            self.scheduled_to,
            self.assigned_user_id,
            self.company_id,
        )
        else {
            return Err(Error::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        };

        Ok(Job {
            id: JobId::new(),
            customer_name,
            customer_address,
            customer_city,
            customer_phone: non_blank(self.customer_phone),
            order_number: non_blank(self.order_number),
            job_type: non_blank(self.job_type),
            scheduled_from,
            scheduled_to,
            assigned_user_id,
            company_id,
            created_by,
            creation_comment: non_blank(self.creation_comment),
            status: JobStatus::Assigned,
            admin_comment: None,
            completion_notes: None,
            completed_success: None,
            completed_at: None,
            source_job_id: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn complete_fields() -> JobFields {
        JobFields {
            customer_name: Some("Anna Weber".to_string()),
            customer_address: Some("Hauptstrasse 4".to_string()),
            customer_city: Some("Ulm".to_string()),
            customer_phone: Some("  ".to_string()),
            order_number: Some("SK-1001".to_string()),
            job_type: Some("NE4".to_string()),
            scheduled_from: Some(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()),
            scheduled_to: Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()),
            assigned_user_id: Some(UserId(7)),
            company_id: Some(CompanyId(2)),
            creation_comment: None,
        }
    }

    #[test]
    fn review_transitions_follow_the_table() {
        use JobStatus::*;
        assert!(Assigned.can_transition_to(WaitingReview));
        assert!(Rejected.can_transition_to(WaitingReview));
        assert!(WaitingReview.can_transition_to(Approved));
        assert!(WaitingReview.can_transition_to(Rejected));

        assert!(!Assigned.can_transition_to(Approved));
        assert!(!WaitingReview.can_transition_to(WaitingReview));
        assert!(!Approved.can_transition_to(WaitingReview));
        assert!(!Approved.can_transition_to(Rejected));
    }

    #[test]
    fn only_approved_is_terminal() {
        assert!(JobStatus::Approved.is_terminal());
        assert!(!JobStatus::Rejected.is_terminal());
        assert!(!JobStatus::Assigned.is_terminal());
    }

    #[test]
    fn status_parses_its_own_display() {
        for status in [
            JobStatus::Assigned,
            JobStatus::WaitingReview,
            JobStatus::Approved,
            JobStatus::Rejected,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<JobStatus>().is_err());
    }

    #[test]
    fn window_requires_both_bounds() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(DateWindow::from_bounds(Some(t), None).is_none());
        assert!(DateWindow::from_bounds(None, Some(t)).is_none());
        assert!(DateWindow::from_bounds(Some(t), Some(t)).is_some());
    }

    #[test]
    fn complete_fields_build_an_assigned_job() {
        let now = Utc::now();
        let job = complete_fields().into_job(UserId(1), now).unwrap();
        assert_eq!(job.status, JobStatus::Assigned);
        assert_eq!(job.created_by, UserId(1));
        assert_eq!(job.customer_phone, None, "blank phone is dropped");
        assert_eq!(job.reference(), "SK-1001");
        assert!(!job.is_forwarded());
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let fields = JobFields {
            customer_city: Some(" ".to_string()),
            company_id: None,
            ..complete_fields()
        };
        let err = fields.into_job(UserId(1), Utc::now()).unwrap_err();
        match err {
            Error::Validation(msg) => {
                assert!(msg.contains("customer_city"), "{msg}");
                assert!(msg.contains("company_id"), "{msg}");
                assert!(!msg.contains("customer_name"), "{msg}");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
