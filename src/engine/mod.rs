//! Workflow engine: the only way job state changes.
//!
//! Each operation checks access, loads what it needs, builds one
//! [`UnitOfWork`] and commits it. Notifications queued in the unit of work
//! are handed to the [`NotificationSink`] after the commit succeeds.

mod review;

pub use review::ForwardOutcome;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tracing::{Instrument, info};

use crate::audit::StatusChange;
use crate::config::WorkflowPolicy;
use crate::error::{Error, Result};
use crate::model::{
    Attachment, DateWindow, Job, JobFields, JobId, NewAttachment, Notification, Requester, Upload,
};
use crate::notify::{NotificationSink, TracingSink, deliver_all};
use crate::policy::access;
use crate::store::{CommitReceipt, JobStore, PendingJob, UnitOfWork};
use crate::telemetry::metrics;
use crate::telemetry::workflow::start_job_span;

/// Runs review workflows against a [`JobStore`].
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn JobStore>,
    sink: Arc<dyn NotificationSink>,
    policy: WorkflowPolicy,
}

impl WorkflowEngine {
    /// Engine with the default policy that only logs notifications.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            sink: Arc::new(TracingSink),
            policy: WorkflowPolicy::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_policy(mut self, policy: WorkflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> WorkflowPolicy {
        self.policy
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Jobs the requester may see, optionally narrowed to a date window.
    ///
    /// The window only applies when both bounds are given.
    pub async fn list_jobs(
        &self,
        requester: &Requester,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Job>> {
        let filter = access::visibility(requester, DateWindow::from_bounds(from, to));
        self.store.jobs(&filter).await
    }

    /// The review queue. Admin tier only.
    pub async fn list_pending_jobs(&self, requester: &Requester) -> Result<Vec<PendingJob>> {
        if !access::can_decide(requester) {
            return Err(Error::Authorization(
                "only admins may view the review queue".to_string(),
            ));
        }
        self.store.pending_jobs().await
    }

    pub async fn job(&self, requester: &Requester, job_id: JobId) -> Result<Job> {
        let job = self.store.job(job_id).await?;
        if !access::can_view(&job, requester) {
            return Err(Error::Authorization(format!(
                "user {} may not view job {job_id}",
                requester.id
            )));
        }
        Ok(job)
    }

    /// Status ledger of a job, oldest record first.
    pub async fn job_history(
        &self,
        requester: &Requester,
        job_id: JobId,
    ) -> Result<Vec<StatusChange>> {
        self.job(requester, job_id).await?;
        self.store.history(job_id).await
    }

    pub async fn list_attachments(&self, job_id: JobId) -> Result<Vec<Attachment>> {
        self.store.attachments(job_id).await
    }

    /// The requester's own notifications.
    pub async fn notifications(&self, requester: &Requester) -> Result<Vec<Notification>> {
        self.store.notifications(requester.id).await
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create an ASSIGNED job with its initial attachments. Admin tier only.
    pub async fn create_job(
        &self,
        requester: &Requester,
        fields: JobFields,
        files: &[Upload],
    ) -> Result<JobId> {
        if !access::can_create(requester) {
            return Err(Error::Authorization(
                "only admins may create jobs".to_string(),
            ));
        }
        let job = fields.into_job(requester.id, Utc::now())?;
        let job_id = job.id;
        let assignee = job.assigned_user_id;

        let span = start_job_span("create", job_id);
        timed("create", async {
            let mut work = UnitOfWork::new();
            work.insert_job(job);
            for upload in files {
                work.attach(NewAttachment::from_upload(job_id, upload, requester.id));
            }
            self.commit(work).await?;

            metrics::jobs_created().add(1, &[KeyValue::new("origin", "direct")]);
            info!(
                assigned_user_id = assignee.0,
                attachments = files.len(),
                "job created"
            );
            Ok(job_id)
        })
        .instrument(span)
        .await
    }

    /// Commit `work`, then hand its notifications to the sink.
    ///
    /// Sink failures are logged by [`deliver_all`] and do not fail the call.
    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt> {
        let outbox = work.pending_notifications().to_vec();
        let receipt = self.store.commit(work).await?;
        deliver_all(self.sink.as_ref(), &outbox).await;
        Ok(receipt)
    }
}

/// Run an operation and record its duration.
async fn timed<T, F>(operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = fut.await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::operation_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[
            KeyValue::new("operation", operation),
            KeyValue::new("result", outcome),
        ],
    );
    result
}
