//! jobflow CLI: operator interface to the job review workflow.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use jobflow::config::Config;
use jobflow::config::secrets::ExposeSecret;
use jobflow::db::Db;
use jobflow::engine::WorkflowEngine;
use jobflow::model::{CompanyId, Job, JobFields, JobId, Requester, Role, Upload, UserId};
use jobflow::policy::ForwardSpec;
use jobflow::telemetry::{TelemetryConfig, init_telemetry};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "jobflow", about = "Field-service job review workflow")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Job operations
    Jobs {
        #[command(flatten)]
        identity: Identity,
        /// Print results as JSON
        #[arg(long, global = true)]
        json: bool,
        #[command(subcommand)]
        action: JobAction,
    },
}

/// Who the command acts as.
#[derive(Args)]
struct Identity {
    /// Acting user id
    #[arg(long = "as-user", global = true, default_value_t = 1)]
    as_user: i64,
    /// Acting user role (ADMIN, SEMI_ADMIN, USER)
    #[arg(long, global = true, default_value = "ADMIN")]
    role: Role,
}

#[derive(Subcommand)]
enum JobAction {
    /// List visible jobs
    List {
        /// Window start (RFC 3339); needs --to
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Window end (RFC 3339); needs --from
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// List jobs waiting for review
    Pending,
    /// Show a job
    Show {
        /// Job ID (full UUID or prefix)
        id: String,
    },
    /// Show the status history of a job
    History { id: String },
    /// List the attachments of a job
    Attachments { id: String },
    /// Create a job
    Create {
        #[arg(long)]
        customer_name: String,
        #[arg(long)]
        customer_address: String,
        #[arg(long)]
        customer_city: String,
        #[arg(long)]
        customer_phone: Option<String>,
        /// External order reference (SK number)
        #[arg(long)]
        order_number: Option<String>,
        /// Work category, e.g. NE3
        #[arg(long)]
        job_type: Option<String>,
        #[arg(long)]
        from: DateTime<Utc>,
        #[arg(long)]
        to: DateTime<Utc>,
        /// Technician the job is assigned to
        #[arg(long)]
        assignee: i64,
        #[arg(long)]
        company: i64,
        #[arg(long)]
        comment: Option<String>,
        /// Attach a file (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Report a job done
    Submit {
        id: String,
        #[arg(long)]
        notes: Option<String>,
        /// Report the work as unsuccessful
        #[arg(long)]
        failed: bool,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Approve a job
    Approve {
        id: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Reject a job
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Approve a job and forward it for cable insertion
    Forward {
        id: String,
        /// Approval comment
        #[arg(long)]
        comment: Option<String>,
        /// Company of the receiving technician
        #[arg(long)]
        company: Option<i64>,
        /// Receiving technician
        #[arg(long)]
        user: Option<i64>,
        /// Successor window start; defaults to the job's window
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        /// Creation comment of the successor
        #[arg(long)]
        note: Option<String>,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "jobflow".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;

    match cli.command {
        Command::Migrate => {
            db.health_check().await?;
            println!("Migrations applied.");
            Ok(())
        }
        Command::Jobs {
            identity,
            json,
            action,
        } => {
            let engine = WorkflowEngine::new(Arc::new(db)).with_policy(config.workflow_policy()?);
            let requester = Requester::new(UserId(identity.as_user), identity.role);
            cmd_jobs(&engine, &requester, json, action).await
        }
    }
}

async fn cmd_jobs(
    engine: &WorkflowEngine,
    requester: &Requester,
    json: bool,
    action: JobAction,
) -> anyhow::Result<()> {
    match action {
        JobAction::List { from, to } => {
            let jobs = engine.list_jobs(requester, from, to).await?;
            if json {
                return print_json(&jobs);
            }
            print_job_table(&jobs);
        }
        JobAction::Pending => {
            let pending = engine.list_pending_jobs(requester).await?;
            if json {
                return print_json(&pending);
            }
            if pending.is_empty() {
                println!("Nothing waiting for review.");
                return Ok(());
            }
            println!(
                "{:<8}  {:<12}  {:<24}  {:<20}  {:<18}  FROM",
                "ID", "ORDER", "CUSTOMER", "TECHNICIAN", "ROLE"
            );
            println!("{}", "-".repeat(104));
            for p in &pending {
                println!(
                    "{:<8}  {:<12}  {:<24}  {:<20}  {:<18}  {}",
                    p.job.id,
                    p.job.order_number.as_deref().unwrap_or("-"),
                    truncate(&p.job.customer_name, 24),
                    truncate(p.technician_name.as_deref().unwrap_or("-"), 20),
                    p.technician_job_role.map(|r| r.as_str()).unwrap_or("-"),
                    p.job.scheduled_from.format("%Y-%m-%d %H:%M"),
                );
            }
            println!("\n{} job(s)", pending.len());
        }
        JobAction::Show { id } => {
            let id = resolve_job_id(engine, requester, &id).await?;
            let job = engine.job(requester, id).await?;
            if json {
                return print_json(&job);
            }
            print_job(&job);
        }
        JobAction::History { id } => {
            let id = resolve_job_id(engine, requester, &id).await?;
            let history = engine.job_history(requester, id).await?;
            if json {
                return print_json(&history);
            }
            for change in &history {
                println!(
                    "{}  {:<14} -> {:<14}  by {:<6}  {}",
                    change.created_at.format("%Y-%m-%d %H:%M"),
                    change.old_status.as_str(),
                    change.new_status.as_str(),
                    change.changed_by.0,
                    change.comment.as_deref().unwrap_or("")
                );
            }
        }
        JobAction::Attachments { id } => {
            let id = resolve_job_id(engine, requester, &id).await?;
            // Visibility check before listing.
            engine.job(requester, id).await?;
            let attachments = engine.list_attachments(id).await?;
            if json {
                return print_json(&attachments);
            }
            for a in &attachments {
                println!("{:<4}  {:<8}  {}", a.id, a.kind.as_str(), a.file_path);
            }
        }
        JobAction::Create {
            customer_name,
            customer_address,
            customer_city,
            customer_phone,
            order_number,
            job_type,
            from,
            to,
            assignee,
            company,
            comment,
            files,
        } => {
            let fields = JobFields {
                customer_name: Some(customer_name),
                customer_address: Some(customer_address),
                customer_city: Some(customer_city),
                customer_phone,
                order_number,
                job_type,
                scheduled_from: Some(from),
                scheduled_to: Some(to),
                assigned_user_id: Some(UserId(assignee)),
                company_id: Some(CompanyId(company)),
                creation_comment: comment,
            };
            let id = engine
                .create_job(requester, fields, &uploads(&files))
                .await?;
            if json {
                return print_json(&serde_json::json!({ "id": id }));
            }
            println!("Created: {}", id.0);
        }
        JobAction::Submit {
            id,
            notes,
            failed,
            files,
        } => {
            let id = resolve_job_id(engine, requester, &id).await?;
            let job = engine
                .submit_for_review(requester, id, notes, !failed, &uploads(&files))
                .await?;
            report(&job, json)?;
        }
        JobAction::Approve { id, comment } => {
            let id = resolve_job_id(engine, requester, &id).await?;
            let job = engine.approve(requester, id, comment).await?;
            report(&job, json)?;
        }
        JobAction::Reject { id, reason } => {
            let id = resolve_job_id(engine, requester, &id).await?;
            let job = engine.reject(requester, id, &reason).await?;
            report(&job, json)?;
        }
        JobAction::Forward {
            id,
            comment,
            company,
            user,
            from,
            to,
            note,
            files,
        } => {
            let id = resolve_job_id(engine, requester, &id).await?;
            let spec = ForwardSpec {
                company_id: company.map(CompanyId),
                user_id: user.map(UserId),
                scheduled_from: from,
                scheduled_to: to,
                comment: note,
            };
            let outcome = engine
                .approve_and_forward(requester, id, comment, Some(&spec), &uploads(&files))
                .await?;
            if json {
                return print_json(&outcome);
            }
            match outcome.new_job_id {
                Some(new_id) => println!("Approved {}, forwarded as {}", id.0, new_id.0),
                None => println!("Approved {} (not forwarded)", id.0),
            }
        }
    }
    Ok(())
}

/// Accept a full UUID or a unique prefix of a visible job's id.
async fn resolve_job_id(
    engine: &WorkflowEngine,
    requester: &Requester,
    id_str: &str,
) -> anyhow::Result<JobId> {
    if id_str.len() >= 36 {
        return Ok(id_str.parse()?);
    }
    let jobs = engine.list_jobs(requester, None, None).await?;
    let matches: Vec<_> = jobs
        .iter()
        .filter(|job| job.id.0.to_string().starts_with(id_str))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no job matching prefix '{id_str}'"),
        1 => Ok(matches[0].id),
        n => anyhow::bail!("{n} jobs match prefix '{id_str}', be more specific"),
    }
}

/// Describe local files the way the blob store would hand them over.
fn uploads(files: &[PathBuf]) -> Vec<Upload> {
    files
        .iter()
        .map(|path| {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            Upload::new(path.display().to_string(), mime.essence_str())
        })
        .collect()
}

fn report(job: &Job, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(job);
    }
    println!("{}  {}", job.id.0, job.status);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_job_table(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!(
        "{:<8}  {:<12}  {:<14}  {:<24}  {:<16}  FROM",
        "ID", "ORDER", "STATUS", "CUSTOMER", "CITY"
    );
    println!("{}", "-".repeat(100));
    for job in jobs {
        println!(
            "{:<8}  {:<12}  {:<14}  {:<24}  {:<16}  {}",
            job.id,
            job.order_number.as_deref().unwrap_or("-"),
            job.status.as_str(),
            truncate(&job.customer_name, 24),
            truncate(&job.customer_city, 16),
            job.scheduled_from.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} job(s)", jobs.len());
}

fn print_job(job: &Job) {
    println!("ID:         {}", job.id.0);
    println!("Status:     {}", job.status);
    println!("Order:      {}", job.order_number.as_deref().unwrap_or("-"));
    println!("Type:       {}", job.job_type.as_deref().unwrap_or("-"));
    println!("Customer:   {}", job.customer_name);
    println!("Address:    {}, {}", job.customer_address, job.customer_city);
    println!("Phone:      {}", job.customer_phone.as_deref().unwrap_or("-"));
    println!(
        "Scheduled:  {} - {}",
        job.scheduled_from.format("%Y-%m-%d %H:%M"),
        job.scheduled_to.format("%Y-%m-%d %H:%M")
    );
    println!("Assignee:   {} (company {})", job.assigned_user_id, job.company_id);
    println!("Created by: {}", job.created_by);
    if let Some(ref comment) = job.creation_comment {
        println!("Comment:    {comment}");
    }
    if let Some(parent) = job.source_job_id {
        println!("Forwarded from: {}", parent.0);
    }
    if let Some(at) = job.completed_at {
        println!("---");
        println!(
            "Reported:   {} ({})",
            at,
            match job.completed_success {
                Some(true) => "success",
                Some(false) => "failure",
                None => "-",
            }
        );
        if let Some(ref notes) = job.completion_notes {
            println!("Notes:      {notes}");
        }
    }
    if let Some(ref comment) = job.admin_comment {
        println!("Review:     {comment}");
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
