//! # jobflow
//!
//! Review workflow for scheduled field-service jobs.
//!
//! Technicians report work done, admins approve or reject it, and approved
//! ground-work jobs can be forwarded to a cable-insertion technician as a
//! new job. Every status change is written to an append-only ledger and the
//! affected technicians are notified.
//!
//! [`engine::WorkflowEngine`] is the entry point. It runs against any
//! [`store::JobStore`]: [`db::Db`] for Postgres, [`store::MemoryStore`] for
//! tests.

pub mod audit;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod policy;
pub mod store;
pub mod telemetry;
