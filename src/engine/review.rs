//! Review transitions: submit, approve, reject, approve-and-forward.

use chrono::Utc;
use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{Instrument, Span, debug, info};

use super::{WorkflowEngine, timed};
use crate::audit::SUBMITTED_COMMENT;
use crate::error::{Error, Result};
use crate::model::{
    Job, JobId, JobStatus, NewAttachment, NewNotification, Requester, Upload, non_blank,
};
use crate::policy::access;
use crate::policy::forwarding::{self, ForwardSpec};
use crate::store::{Completion, Transition, UnitOfWork};
use crate::telemetry::metrics;
use crate::telemetry::workflow::{record_state_transition, start_job_span};

/// Admin comment recorded when an approval carries none.
const DEFAULT_APPROVE_COMMENT: &str = "Approved";

/// Result of [`WorkflowEngine::approve_and_forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForwardOutcome {
    pub job_id: JobId,
    /// The successor, when one was created.
    pub new_job_id: Option<JobId>,
}

impl WorkflowEngine {
    /// Technician reports the job done. Also used to resubmit after a
    /// rejection.
    pub async fn submit_for_review(
        &self,
        requester: &Requester,
        job_id: JobId,
        notes: Option<String>,
        success: bool,
        files: &[Upload],
    ) -> Result<Job> {
        let span = start_job_span("submit_for_review", job_id);
        timed("submit_for_review", async {
            let job = self.store.job(job_id).await?;
            if !access::can_submit_for_review(&job, requester) {
                return Err(Error::Authorization(format!(
                    "user {} is not assigned to job {job_id}",
                    requester.id
                )));
            }
            let to = JobStatus::WaitingReview;
            if !job.status.can_transition_to(to) {
                return Err(Error::InvalidTransition {
                    from: job.status,
                    to,
                });
            }

            let now = Utc::now();
            let mut work = UnitOfWork::new();
            work.transition(Transition {
                job_id,
                expected: job.status,
                status: to,
                admin_comment: None,
                completion: Some(Completion {
                    notes: non_blank(notes),
                    success,
                    completed_at: now,
                }),
                at: now,
            })
            .append_history(
                job_id,
                job.status,
                to,
                requester.id,
                Some(SUBMITTED_COMMENT.to_string()),
            );
            for upload in files {
                work.attach(NewAttachment::from_upload(job_id, upload, requester.id));
            }
            self.commit(work).await?;

            transitioned(job.status, to);
            info!(success, attachments = files.len(), "job submitted for review");
            self.store.job(job_id).await
        })
        .instrument(span)
        .await
    }

    /// Accept the reported work.
    pub async fn approve(
        &self,
        requester: &Requester,
        job_id: JobId,
        comment: Option<String>,
    ) -> Result<Job> {
        let span = start_job_span("approve", job_id);
        timed("approve", async {
            self.decide_approval(requester, job_id, comment, None, &[])
                .await?;
            self.store.job(job_id).await
        })
        .instrument(span)
        .await
    }

    /// Send the job back to its technician. `reason` must not be blank.
    pub async fn reject(&self, requester: &Requester, job_id: JobId, reason: &str) -> Result<Job> {
        let span = start_job_span("reject", job_id);
        timed("reject", async {
            ensure_decider(requester)?;
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(Error::Validation("reject reason is required".to_string()));
            }
            let job = self.store.job(job_id).await?;
            let to = JobStatus::Rejected;
            self.ensure_decidable(&job, to)?;

            let mut work = UnitOfWork::new();
            work.transition(Transition {
                job_id,
                expected: job.status,
                status: to,
                admin_comment: Some(reason.to_string()),
                completion: None,
                at: Utc::now(),
            })
            .append_history(
                job_id,
                job.status,
                to,
                requester.id,
                Some(reason.to_string()),
            )
            .notify(NewNotification::new(
                job.assigned_user_id,
                "Job rejected",
                format!("Job {} was rejected. Reason: {reason}", job.reference()),
            ));
            self.commit(work).await?;

            transitioned(job.status, to);
            info!(reason, "job rejected");
            self.store.job(job_id).await
        })
        .instrument(span)
        .await
    }

    /// Approve, and when the assignee did ground work, hand the job to a
    /// cable-insertion technician as a new job.
    ///
    /// Without a `forward` spec, or when the assignee is not eligible, this
    /// is a plain approval and `files` are ignored.
    pub async fn approve_and_forward(
        &self,
        requester: &Requester,
        job_id: JobId,
        comment: Option<String>,
        forward: Option<&ForwardSpec>,
        files: &[Upload],
    ) -> Result<ForwardOutcome> {
        let span = start_job_span("approve_and_forward", job_id);
        timed("approve_and_forward", async {
            self.decide_approval(requester, job_id, comment, forward, files)
                .await
        })
        .instrument(span)
        .await
    }

    /// Shared body of `approve` and `approve_and_forward`. Runs inside the
    /// caller's span.
    async fn decide_approval(
        &self,
        requester: &Requester,
        job_id: JobId,
        comment: Option<String>,
        forward: Option<&ForwardSpec>,
        files: &[Upload],
    ) -> Result<ForwardOutcome> {
        ensure_decider(requester)?;
        let job = self.store.job(job_id).await?;
        let to = JobStatus::Approved;
        self.ensure_decidable(&job, to)?;

        let now = Utc::now();
        let successor = match forward {
            Some(spec) => self.successor_for(&job, spec, requester, now).await?,
            None => None,
        };

        let comment =
            non_blank(comment).unwrap_or_else(|| DEFAULT_APPROVE_COMMENT.to_string());
        let mut work = UnitOfWork::new();
        work.transition(Transition {
            job_id,
            expected: job.status,
            status: to,
            admin_comment: Some(comment.clone()),
            completion: None,
            at: now,
        })
        .append_history(job_id, job.status, to, requester.id, Some(comment))
        .notify(NewNotification::new(
            job.assigned_user_id,
            "Job approved",
            format!("Job {} was approved.", job.reference()),
        ));

        let new_job_id = successor.as_ref().map(|s| s.id);
        match successor {
            Some(successor) => {
                for upload in files {
                    work.attach(NewAttachment::from_upload(
                        successor.id,
                        upload,
                        requester.id,
                    ));
                }
                work.notify(NewNotification::new(
                    successor.assigned_user_id,
                    "New cable insertion job",
                    format!(
                        "You have been assigned a new cable insertion job (from ground-work job {}).",
                        job.reference()
                    ),
                ));
                work.insert_job(successor);
            }
            None if !files.is_empty() => {
                debug!(files = files.len(), "no successor created, ignoring files");
            }
            None => {}
        }
        self.commit(work).await?;

        transitioned(job.status, to);
        match new_job_id {
            Some(new_job_id) => {
                metrics::jobs_created().add(1, &[KeyValue::new("origin", "forwarded")]);
                metrics::jobs_forwarded().add(1, &[KeyValue::new("result", "forwarded")]);
                info!(new_job_id = %new_job_id.0, "job approved and forwarded");
            }
            None => info!("job approved"),
        }

        Ok(ForwardOutcome { job_id, new_job_id })
    }

    /// Build the successor described by `spec`, or `None` when the job's
    /// assignee is not eligible for forwarding.
    async fn successor_for(
        &self,
        job: &Job,
        spec: &ForwardSpec,
        requester: &Requester,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let assignee_role = self
            .store
            .technician(job.assigned_user_id)
            .await?
            .and_then(|t| t.job_role);
        if !forwarding::is_eligible(assignee_role) {
            metrics::jobs_forwarded().add(1, &[KeyValue::new("result", "ineligible")]);
            info!(
                assignee_role = assignee_role.map(|r| r.as_str()),
                "assignee did not do ground work, not forwarding"
            );
            return Ok(None);
        }

        let target = spec.target()?;
        if self.policy.verify_forward_target {
            let technician = self.store.technician(target.user_id).await?;
            forwarding::verify_target(&target, technician.as_ref())?;
        }
        if let Some(existing) = self.store.successor(job.id).await? {
            return Err(Error::Conflict(format!(
                "job {} was already forwarded as job {}",
                job.id, existing.id
            )));
        }

        forwarding::derive(job, spec, requester.id, now).map(Some)
    }

    /// Approve and reject start from WAITING_REVIEW unless the policy
    /// allows deciding on any status.
    fn ensure_decidable(&self, job: &Job, to: JobStatus) -> Result<()> {
        if self.policy.require_waiting_review && !job.status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: job.status,
                to,
            });
        }
        Ok(())
    }
}

fn ensure_decider(requester: &Requester) -> Result<()> {
    if access::can_decide(requester) {
        Ok(())
    } else {
        Err(Error::Authorization(format!(
            "user {} may not review jobs",
            requester.id
        )))
    }
}

/// Record a committed transition on the current job span and in metrics.
fn transitioned(from: JobStatus, to: JobStatus) {
    record_state_transition(&Span::current(), from, to);
    metrics::job_state_transitions().add(
        1,
        &[
            KeyValue::new("from", from.as_str()),
            KeyValue::new("to", to.as_str()),
        ],
    );
}
