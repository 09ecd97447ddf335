//! Job queries and the transactional commit path on Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::StatusChange;
use crate::error::{Error, Result};
use crate::model::*;
use crate::store::{CommitReceipt, JobFilter, JobStore, PendingJob, UnitOfWork};

use super::Db;

#[async_trait]
impl JobStore for Db {
    async fn job(&self, id: JobId) -> Result<Job> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(id.0)
            .fetch_optional(self.pool())
            .await?;

        row.ok_or_else(|| Error::NotFound(format!("job {id}")))?
            .try_into_job()
    }

    async fn jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM jobs
             WHERE ($1::bigint IS NULL OR assigned_user_id = $1)
             AND ($2::timestamptz IS NULL OR scheduled_from >= $2)
             AND ($3::timestamptz IS NULL OR scheduled_to <= $3)
             ORDER BY scheduled_from ASC, created_at ASC",
        )
        .bind(filter.assigned_user_id.map(|u| u.0))
        .bind(filter.window.map(|w| w.from))
        .bind(filter.window.map(|w| w.to))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(JobRow::try_into_job).collect()
    }

    async fn pending_jobs(&self) -> Result<Vec<PendingJob>> {
        let rows: Vec<PendingRow> = sqlx::query_as(
            "SELECT j.*,
                    u.name     AS technician_name,
                    u.job_role AS technician_job_role
             FROM jobs j
             LEFT JOIN users u ON j.assigned_user_id = u.id
             WHERE j.status = 'WAITING_REVIEW'
             ORDER BY j.scheduled_from DESC",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PendingJob {
                    technician_job_role: JobRole::parse_optional(
                        row.technician_job_role.as_deref(),
                    )?,
                    technician_name: row.technician_name,
                    job: row.job.try_into_job()?,
                })
            })
            .collect()
    }

    async fn successor(&self, parent: JobId) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE source_job_id = $1")
            .bind(parent.0)
            .fetch_optional(self.pool())
            .await?;

        row.map(JobRow::try_into_job).transpose()
    }

    async fn attachments(&self, job_id: JobId) -> Result<Vec<Attachment>> {
        let rows: Vec<AttachmentRow> = sqlx::query_as(
            "SELECT id, job_id, type, file_path, uploaded_by, created_at
             FROM job_attachments WHERE job_id = $1 ORDER BY id ASC",
        )
        .bind(job_id.0)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Attachment {
                    id: row.id,
                    job_id: JobId(row.job_id),
                    kind: row.kind.parse()?,
                    file_path: row.file_path,
                    uploaded_by: UserId(row.uploaded_by),
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn history(&self, job_id: JobId) -> Result<Vec<StatusChange>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, job_id, old_status, new_status, changed_by, comment, created_at
             FROM job_status_history WHERE job_id = $1 ORDER BY id ASC",
        )
        .bind(job_id.0)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StatusChange {
                    id: row.id,
                    job_id: JobId(row.job_id),
                    old_status: row.old_status.parse()?,
                    new_status: row.new_status.parse()?,
                    changed_by: UserId(row.changed_by),
                    comment: row.comment,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let rows: Vec<(i64, i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, user_id, title, message, created_at
             FROM notifications WHERE user_id = $1 ORDER BY id ASC",
        )
        .bind(user_id.0)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, title, message, created_at)| Notification {
                id,
                user_id: UserId(user_id),
                title,
                message,
                created_at,
            })
            .collect())
    }

    async fn technician(&self, id: UserId) -> Result<Option<Technician>> {
        let row: Option<(i64, String, Option<i64>, Option<String>)> =
            sqlx::query_as("SELECT id, name, company_id, job_role FROM users WHERE id = $1")
                .bind(id.0)
                .fetch_optional(self.pool())
                .await?;

        row.map(|(id, name, company_id, job_role)| {
            Ok(Technician {
                id: UserId(id),
                name,
                company_id: company_id.map(CompanyId),
                job_role: JobRole::parse_optional(job_role.as_deref())?,
            })
        })
        .transpose()
    }

    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt> {
        let mut tx = self.pool().begin().await?;
        let mut receipt = CommitReceipt::default();

        if let Some(ref t) = work.transition {
            let completion = t.completion.as_ref();
            let rows_affected = sqlx::query(
                "UPDATE jobs SET
                    status = $1,
                    updated_at = $2,
                    admin_comment = COALESCE($3, admin_comment),
                    completion_notes = CASE WHEN $4::boolean THEN $5::text ELSE completion_notes END,
                    completed_success = CASE WHEN $4::boolean THEN $6::boolean ELSE completed_success END,
                    completed_at = CASE WHEN $4::boolean THEN $7::timestamptz ELSE completed_at END
                 WHERE id = $8 AND status = $9",
            )
            .bind(t.status.as_str())
            .bind(t.at)
            .bind(t.admin_comment.as_deref())
            .bind(completion.is_some())
            .bind(completion.and_then(|c| c.notes.as_deref()))
            .bind(completion.map(|c| c.success))
            .bind(completion.map(|c| c.completed_at))
            .bind(t.job_id.0)
            .bind(t.expected.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rows_affected == 0 {
                // Either the job vanished or someone changed its status first.
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM jobs WHERE id = $1")
                        .bind(t.job_id.0)
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(match current {
                    None => Error::NotFound(format!("job {}", t.job_id)),
                    Some((status,)) => Error::Conflict(format!(
                        "job {} is {status}, expected {}",
                        t.job_id, t.expected
                    )),
                });
            }
        }

        for job in &work.new_jobs {
            sqlx::query(
                "INSERT INTO jobs (
                    id, customer_name, customer_address, customer_city, customer_phone,
                    order_number, job_type, scheduled_from, scheduled_to,
                    assigned_user_id, company_id, created_by, creation_comment, status,
                    admin_comment, completion_notes, completed_success, completed_at,
                    source_job_id, created_at, updated_at
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                           $15, $16, $17, $18, $19, $20, $21)",
            )
            .bind(job.id.0)
            .bind(&job.customer_name)
            .bind(&job.customer_address)
            .bind(&job.customer_city)
            .bind(&job.customer_phone)
            .bind(&job.order_number)
            .bind(&job.job_type)
            .bind(job.scheduled_from)
            .bind(job.scheduled_to)
            .bind(job.assigned_user_id.0)
            .bind(job.company_id.0)
            .bind(job.created_by.0)
            .bind(&job.creation_comment)
            .bind(job.status.as_str())
            .bind(&job.admin_comment)
            .bind(&job.completion_notes)
            .bind(job.completed_success)
            .bind(job.completed_at)
            .bind(job.source_job_id.map(|id| id.0))
            .bind(job.created_at)
            .bind(job.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_job_error(e, job))?;
        }

        for attachment in &work.attachments {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO job_attachments (job_id, type, file_path, uploaded_by)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id",
            )
            .bind(attachment.job_id.0)
            .bind(attachment.kind.as_str())
            .bind(&attachment.file_path)
            .bind(attachment.uploaded_by.0)
            .fetch_one(&mut *tx)
            .await?;
            receipt.attachment_ids.push(id);
        }

        for change in &work.history {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO job_status_history (job_id, old_status, new_status, changed_by, comment)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id",
            )
            .bind(change.job_id.0)
            .bind(change.old_status.as_str())
            .bind(change.new_status.as_str())
            .bind(change.changed_by.0)
            .bind(&change.comment)
            .fetch_one(&mut *tx)
            .await?;
            receipt.history_ids.push(id);
        }

        for notification in &work.notifications {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO notifications (user_id, title, message)
                 VALUES ($1, $2, $3)
                 RETURNING id",
            )
            .bind(notification.user_id.0)
            .bind(&notification.title)
            .bind(&notification.message)
            .fetch_one(&mut *tx)
            .await?;
            receipt.notification_ids.push(id);
        }

        tx.commit().await?;
        Ok(receipt)
    }
}

/// Translate constraint violations on job insert into domain errors.
fn insert_job_error(err: sqlx::Error, job: &Job) -> Error {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return match job.source_job_id {
                Some(parent) => {
                    Error::Conflict(format!("job {parent} has already been forwarded"))
                }
                None => Error::Conflict(format!("job {} already exists", job.id)),
            };
        }
        if db_err.is_foreign_key_violation() {
            if let Some(parent) = job.source_job_id {
                return Error::NotFound(format!("source job {parent}"));
            }
        }
    }
    Error::Database(err)
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    customer_name: String,
    customer_address: String,
    customer_city: String,
    customer_phone: Option<String>,
    order_number: Option<String>,
    job_type: Option<String>,
    scheduled_from: DateTime<Utc>,
    scheduled_to: DateTime<Utc>,
    assigned_user_id: i64,
    company_id: i64,
    created_by: i64,
    creation_comment: Option<String>,
    status: String,
    admin_comment: Option<String>,
    completion_notes: Option<String>,
    completed_success: Option<bool>,
    completed_at: Option<DateTime<Utc>>,
    source_job_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn try_into_job(self) -> Result<Job> {
        Ok(Job {
            id: JobId(self.id),
            customer_name: self.customer_name,
            customer_address: self.customer_address,
            customer_city: self.customer_city,
            customer_phone: self.customer_phone,
            order_number: self.order_number,
            job_type: self.job_type,
            scheduled_from: self.scheduled_from,
            scheduled_to: self.scheduled_to,
            assigned_user_id: UserId(self.assigned_user_id),
            company_id: CompanyId(self.company_id),
            created_by: UserId(self.created_by),
            creation_comment: self.creation_comment,
            status: self.status.parse()?,
            admin_comment: self.admin_comment,
            completion_notes: self.completion_notes,
            completed_success: self.completed_success,
            completed_at: self.completed_at,
            source_job_id: self.source_job_id.map(JobId),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    #[sqlx(flatten)]
    job: JobRow,
    technician_name: Option<String>,
    technician_job_role: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    job_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    file_path: String,
    uploaded_by: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    job_id: Uuid,
    old_status: String,
    new_status: String,
    changed_by: i64,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}
