//! In-process store.
//!
//! Holds all state behind one mutex. A commit validates every precondition
//! before touching anything, so a failed commit leaves no trace. The lock is
//! never held across an await point.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::*;
use crate::error::Error;

/// Store backed by process memory. Used by tests and local experiments.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    technicians: HashMap<UserId, Technician>,
    attachments: Vec<Attachment>,
    history: Vec<StatusChange>,
    notifications: Vec<Notification>,
    last_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn successor_of(&self, parent: JobId) -> Option<&Job> {
        self.jobs
            .values()
            .find(|job| job.source_job_id == Some(parent))
    }

    /// Check every precondition of `work` without mutating anything.
    fn validate(&self, work: &UnitOfWork) -> Result<()> {
        if let Some(ref t) = work.transition {
            let current = self
                .jobs
                .get(&t.job_id)
                .ok_or_else(|| Error::NotFound(format!("job {}", t.job_id)))?;
            if current.status != t.expected {
                return Err(Error::Conflict(format!(
                    "job {} is {}, expected {}",
                    t.job_id, current.status, t.expected
                )));
            }
        }

        for (i, job) in work.new_jobs.iter().enumerate() {
            if self.jobs.contains_key(&job.id) {
                return Err(Error::Conflict(format!("job {} already exists", job.id)));
            }
            if let Some(parent) = job.source_job_id {
                if !self.jobs.contains_key(&parent) {
                    return Err(Error::NotFound(format!("source job {parent}")));
                }
                let forwarded_twice = work.new_jobs[..i]
                    .iter()
                    .any(|other| other.source_job_id == Some(parent));
                if forwarded_twice || self.successor_of(parent).is_some() {
                    return Err(Error::Conflict(format!(
                        "job {parent} has already been forwarded"
                    )));
                }
            }
        }

        let known = |id: &JobId| {
            self.jobs.contains_key(id) || work.new_jobs.iter().any(|job| job.id == *id)
        };
        for attachment in &work.attachments {
            if !known(&attachment.job_id) {
                return Err(Error::NotFound(format!("job {}", attachment.job_id)));
            }
        }
        for change in &work.history {
            if !known(&change.job_id) {
                return Err(Error::NotFound(format!("job {}", change.job_id)));
            }
        }

        Ok(())
    }

    fn apply(&mut self, work: UnitOfWork) -> CommitReceipt {
        let now = Utc::now();
        let mut receipt = CommitReceipt::default();

        if let Some(t) = work.transition {
            if let Some(job) = self.jobs.get_mut(&t.job_id) {
                job.status = t.status;
                job.updated_at = t.at;
                if let Some(comment) = t.admin_comment {
                    job.admin_comment = Some(comment);
                }
                if let Some(completion) = t.completion {
                    job.completion_notes = completion.notes;
                    job.completed_success = Some(completion.success);
                    job.completed_at = Some(completion.completed_at);
                }
            }
        }

        for job in work.new_jobs {
            self.jobs.insert(job.id, job);
        }

        for new in work.attachments {
            let id = self.next_id();
            self.attachments.push(Attachment {
                id,
                job_id: new.job_id,
                kind: new.kind,
                file_path: new.file_path,
                uploaded_by: new.uploaded_by,
                created_at: now,
            });
            receipt.attachment_ids.push(id);
        }

        for new in work.history {
            let id = self.next_id();
            self.history.push(StatusChange {
                id,
                job_id: new.job_id,
                old_status: new.old_status,
                new_status: new.new_status,
                changed_by: new.changed_by,
                comment: new.comment,
                created_at: now,
            });
            receipt.history_ids.push(id);
        }

        for new in work.notifications {
            let id = self.next_id();
            self.notifications.push(Notification {
                id,
                user_id: new.user_id,
                title: new.title,
                message: new.message,
                created_at: now,
            });
            receipt.notification_ids.push(id);
        }

        receipt
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory entry. Replaces any entry with the same id.
    pub fn add_technician(&self, technician: Technician) -> Result<()> {
        self.with_state(|state| {
            state.technicians.insert(technician.id, technician);
            Ok(())
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Other("memory store lock poisoned".to_string()))?;
        f(&mut state)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn job(&self, id: JobId) -> Result<Job> {
        self.with_state(|state| {
            state
                .jobs
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("job {id}")))
        })
    }

    async fn jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.with_state(|state| {
            let mut jobs: Vec<Job> = state
                .jobs
                .values()
                .filter(|job| filter.matches(job))
                .cloned()
                .collect();
            jobs.sort_by(|a, b| {
                a.scheduled_from
                    .cmp(&b.scheduled_from)
                    .then(a.created_at.cmp(&b.created_at))
            });
            Ok(jobs)
        })
    }

    async fn pending_jobs(&self) -> Result<Vec<PendingJob>> {
        self.with_state(|state| {
            let mut pending: Vec<PendingJob> = state
                .jobs
                .values()
                .filter(|job| job.status == JobStatus::WaitingReview)
                .map(|job| {
                    let technician = state.technicians.get(&job.assigned_user_id);
                    PendingJob {
                        job: job.clone(),
                        technician_name: technician.map(|t| t.name.clone()),
                        technician_job_role: technician.and_then(|t| t.job_role),
                    }
                })
                .collect();
            pending.sort_by(|a, b| b.job.scheduled_from.cmp(&a.job.scheduled_from));
            Ok(pending)
        })
    }

    async fn successor(&self, parent: JobId) -> Result<Option<Job>> {
        self.with_state(|state| Ok(state.successor_of(parent).cloned()))
    }

    async fn attachments(&self, job_id: JobId) -> Result<Vec<Attachment>> {
        self.with_state(|state| {
            Ok(state
                .attachments
                .iter()
                .filter(|a| a.job_id == job_id)
                .cloned()
                .collect())
        })
    }

    async fn history(&self, job_id: JobId) -> Result<Vec<StatusChange>> {
        self.with_state(|state| {
            Ok(state
                .history
                .iter()
                .filter(|h| h.job_id == job_id)
                .cloned()
                .collect())
        })
    }

    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.with_state(|state| {
            Ok(state
                .notifications
                .iter()
                .filter(|n| n.user_id == user_id)
                .cloned()
                .collect())
        })
    }

    async fn technician(&self, id: UserId) -> Result<Option<Technician>> {
        self.with_state(|state| Ok(state.technicians.get(&id).cloned()))
    }

    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt> {
        self.with_state(|state| {
            state.validate(&work)?;
            Ok(state.apply(work))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_job() -> Job {
        let now = Utc::now();
        JobFields {
            customer_name: Some("Kunde".to_string()),
            customer_address: Some("Weg 1".to_string()),
            customer_city: Some("Bonn".to_string()),
            scheduled_from: Some(now),
            scheduled_to: Some(now + Duration::hours(2)),
            assigned_user_id: Some(UserId(10)),
            company_id: Some(CompanyId(1)),
            ..Default::default()
        }
        .into_job(UserId(1), now)
        .unwrap()
    }

    async fn seeded() -> (MemoryStore, Job) {
        let store = MemoryStore::new();
        let job = new_job();
        let mut work = UnitOfWork::new();
        work.insert_job(job.clone());
        store.commit(work).await.unwrap();
        (store, job)
    }

    fn submit(job_id: JobId, expected: JobStatus) -> UnitOfWork {
        let now = Utc::now();
        let mut work = UnitOfWork::new();
        work.transition(Transition {
            job_id,
            expected,
            status: JobStatus::WaitingReview,
            admin_comment: None,
            completion: Some(Completion {
                notes: Some("done".to_string()),
                success: true,
                completed_at: now,
            }),
            at: now,
        })
        .append_history(
            job_id,
            expected,
            JobStatus::WaitingReview,
            UserId(10),
            None,
        )
        .attach(NewAttachment {
            job_id,
            kind: AttachmentKind::Photo,
            file_path: "/uploads/a.jpg".to_string(),
            uploaded_by: UserId(10),
        });
        work
    }

    #[tokio::test]
    async fn commit_applies_every_effect() {
        let (store, job) = seeded().await;

        let receipt = store
            .commit(submit(job.id, JobStatus::Assigned))
            .await
            .unwrap();
        assert_eq!(receipt.history_ids.len(), 1);
        assert_eq!(receipt.attachment_ids.len(), 1);

        let stored = store.job(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::WaitingReview);
        assert_eq!(stored.completed_success, Some(true));
        assert_eq!(store.attachments(job.id).await.unwrap().len(), 1);
        assert_eq!(store.history(job.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_expectation_conflicts_and_writes_nothing() {
        let (store, job) = seeded().await;

        let err = store
            .commit(submit(job.id, JobStatus::Rejected))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {err:?}");

        let stored = store.job(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Assigned);
        assert!(store.attachments(job.id).await.unwrap().is_empty());
        assert!(store.history(job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transition_on_unknown_job_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .commit(submit(JobId::new(), JobStatus::Assigned))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn second_successor_for_same_parent_conflicts() {
        let (store, parent) = seeded().await;

        let mut child = new_job();
        child.source_job_id = Some(parent.id);
        let mut work = UnitOfWork::new();
        work.insert_job(child.clone());
        store.commit(work).await.unwrap();

        let mut again = new_job();
        again.source_job_id = Some(parent.id);
        let mut work = UnitOfWork::new();
        work.insert_job(again.clone());
        let err = store.commit(work).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
        assert!(store.job(again.id).await.is_err());

        let successor = store.successor(parent.id).await.unwrap().unwrap();
        assert_eq!(successor.id, child.id);
    }

    #[tokio::test]
    async fn successor_requires_existing_parent() {
        let store = MemoryStore::new();
        let mut orphan = new_job();
        orphan.source_job_id = Some(JobId::new());
        let mut work = UnitOfWork::new();
        work.insert_job(orphan);
        let err = store.commit(work).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn history_ids_increase_in_append_order() {
        let (store, job) = seeded().await;
        store
            .commit(submit(job.id, JobStatus::Assigned))
            .await
            .unwrap();

        let mut work = UnitOfWork::new();
        work.transition(Transition {
            job_id: job.id,
            expected: JobStatus::WaitingReview,
            status: JobStatus::Rejected,
            admin_comment: Some("photos missing".to_string()),
            completion: None,
            at: Utc::now(),
        })
        .append_history(
            job.id,
            JobStatus::WaitingReview,
            JobStatus::Rejected,
            UserId(1),
            Some("photos missing".to_string()),
        );
        store.commit(work).await.unwrap();

        let history = store.history(job.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].id < history[1].id);
        assert_eq!(history[1].new_status, JobStatus::Rejected);
        assert_eq!(
            store.job(job.id).await.unwrap().admin_comment.as_deref(),
            Some("photos missing")
        );
    }
}
