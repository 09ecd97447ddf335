//! Transactional store abstraction.
//!
//! Reads go straight to the store. Writes are collected into a
//! [`UnitOfWork`] and applied by [`JobStore::commit`] as one atomic unit:
//! either every effect persists or none does. A status change inside a unit
//! of work carries the status the engine observed, so a concurrent writer
//! that got there first turns the commit into [`Error::Conflict`].
//!
//! [`Error::Conflict`]: crate::error::Error::Conflict

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{NewStatusChange, StatusChange};
use crate::error::Result;
use crate::model::*;

/// The persistence collaborator the engine runs against.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch one job, or `NotFound`.
    async fn job(&self, id: JobId) -> Result<Job>;

    /// Jobs matching a visibility filter, earliest schedule first.
    async fn jobs(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// WAITING_REVIEW jobs with their technician, latest schedule first.
    async fn pending_jobs(&self) -> Result<Vec<PendingJob>>;

    /// The job forwarded from `parent`, if one exists.
    async fn successor(&self, parent: JobId) -> Result<Option<Job>>;

    async fn attachments(&self, job_id: JobId) -> Result<Vec<Attachment>>;

    /// Ledger records for a job in insertion order.
    async fn history(&self, job_id: JobId) -> Result<Vec<StatusChange>>;

    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>>;

    /// Directory lookup. `None` when the user is unknown.
    async fn technician(&self, id: UserId) -> Result<Option<Technician>>;

    /// Apply every effect in `work` atomically.
    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt>;
}

// ---------------------------------------------------------------------------
// Filters and projections
// ---------------------------------------------------------------------------

/// Which jobs a listing may return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Restrict to one assignee. `None` means every assignee.
    pub assigned_user_id: Option<UserId>,
    pub window: Option<DateWindow>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(user) = self.assigned_user_id {
            if job.assigned_user_id != user {
                return false;
            }
        }
        match self.window {
            Some(window) => window.contains(job),
            None => true,
        }
    }
}

/// A job awaiting review, joined with the directory entry of its assignee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingJob {
    #[serde(flatten)]
    pub job: Job,
    pub technician_name: Option<String>,
    pub technician_job_role: Option<JobRole>,
}

// ---------------------------------------------------------------------------
// Unit of work
// ---------------------------------------------------------------------------

/// Status change guarded by the status the caller last saw.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub job_id: JobId,
    pub expected: JobStatus,
    pub status: JobStatus,
    /// `Some` overwrites the admin comment; `None` leaves it untouched.
    pub admin_comment: Option<String>,
    pub completion: Option<Completion>,
    pub at: DateTime<Utc>,
}

/// Completion report written on submit for review.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub notes: Option<String>,
    pub success: bool,
    pub completed_at: DateTime<Utc>,
}

/// Every write one engine operation needs, applied together or not at all.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    pub(crate) transition: Option<Transition>,
    pub(crate) new_jobs: Vec<Job>,
    pub(crate) attachments: Vec<NewAttachment>,
    pub(crate) history: Vec<NewStatusChange>,
    pub(crate) notifications: Vec<NewNotification>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition(&mut self, transition: Transition) -> &mut Self {
        self.transition = Some(transition);
        self
    }

    pub fn insert_job(&mut self, job: Job) -> &mut Self {
        self.new_jobs.push(job);
        self
    }

    pub fn attach(&mut self, attachment: NewAttachment) -> &mut Self {
        self.attachments.push(attachment);
        self
    }

    /// Queue a ledger record. Its id comes back in the [`CommitReceipt`].
    pub fn append_history(
        &mut self,
        job_id: JobId,
        old_status: JobStatus,
        new_status: JobStatus,
        changed_by: UserId,
        comment: Option<String>,
    ) -> &mut Self {
        self.history.push(NewStatusChange {
            job_id,
            old_status,
            new_status,
            changed_by,
            comment,
        });
        self
    }

    pub fn notify(&mut self, notification: NewNotification) -> &mut Self {
        self.notifications.push(notification);
        self
    }

    /// Notifications this unit will persist, in the order they were queued.
    pub fn pending_notifications(&self) -> &[NewNotification] {
        &self.notifications
    }

    pub fn is_empty(&self) -> bool {
        self.transition.is_none()
            && self.new_jobs.is_empty()
            && self.attachments.is_empty()
            && self.history.is_empty()
            && self.notifications.is_empty()
    }
}

/// Ids assigned by a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Ledger record ids, in append order.
    pub history_ids: Vec<i64>,
    pub attachment_ids: Vec<i64>,
    pub notification_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job_at(assignee: i64, from_hour: u32, to_hour: u32) -> Job {
        let fields = JobFields {
            customer_name: Some("Kunde".to_string()),
            customer_address: Some("Weg 1".to_string()),
            customer_city: Some("Bonn".to_string()),
            scheduled_from: Some(Utc.with_ymd_and_hms(2026, 5, 4, from_hour, 0, 0).unwrap()),
            scheduled_to: Some(Utc.with_ymd_and_hms(2026, 5, 4, to_hour, 0, 0).unwrap()),
            assigned_user_id: Some(UserId(assignee)),
            company_id: Some(CompanyId(1)),
            ..Default::default()
        };
        fields.into_job(UserId(1), Utc::now()).unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = JobFilter::default();
        assert!(filter.matches(&job_at(3, 8, 10)));
        assert!(filter.matches(&job_at(4, 8, 10)));
    }

    #[test]
    fn filter_combines_assignee_and_window() {
        let filter = JobFilter {
            assigned_user_id: Some(UserId(3)),
            window: DateWindow::from_bounds(
                Some(Utc.with_ymd_and_hms(2026, 5, 4, 7, 0, 0).unwrap()),
                Some(Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()),
            ),
        };
        assert!(filter.matches(&job_at(3, 8, 10)));
        assert!(!filter.matches(&job_at(4, 8, 10)), "other assignee");
        assert!(!filter.matches(&job_at(3, 11, 13)), "ends after window");
        assert!(!filter.matches(&job_at(3, 6, 9)), "starts before window");
    }

    #[test]
    fn unit_of_work_collects_effects() {
        let mut work = UnitOfWork::new();
        assert!(work.is_empty());

        let id = JobId::new();
        work.append_history(
            id,
            JobStatus::Assigned,
            JobStatus::WaitingReview,
            UserId(2),
            None,
        )
        .notify(NewNotification::new(UserId(2), "t", "m"));

        assert!(!work.is_empty());
        assert_eq!(work.history.len(), 1);
        assert_eq!(work.pending_notifications().len(), 1);
    }
}
