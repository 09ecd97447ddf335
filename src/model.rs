//! Core data model.
//!
//! A job is a scheduled piece of field work owned by one technician. It has
//! identity, customer and scheduling data, a review lifecycle, and an
//! optional link to the job it was forwarded from.

pub mod attachment;
pub mod job;
pub mod notification;
pub mod user;

pub use attachment::{Attachment, AttachmentKind, NewAttachment, Upload};
pub use job::{DateWindow, Job, JobFields, JobId, JobStatus};
pub use notification::{NewNotification, Notification};
pub use user::{CompanyId, JobRole, Requester, Role, Technician, UserId};

/// Trim a free-text input, treating blank strings as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
