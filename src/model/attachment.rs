//! Files attached to jobs.
//!
//! Blob storage happens elsewhere; the engine only records the path it was
//! handed and a coarse kind derived from the content type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::JobId;
use super::user::UserId;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentKind {
    Photo,
    Document,
    Other,
}

impl AttachmentKind {
    /// Classify an upload by its MIME type.
    ///
    /// `image/*` is a photo, `application/pdf` is a document, anything else
    /// (including an empty or malformed type) is other.
    pub fn classify(content_type: &str) -> AttachmentKind {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("image/") {
            AttachmentKind::Photo
        } else if essence == "application/pdf" {
            AttachmentKind::Document
        } else {
            AttachmentKind::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentKind::Photo => "PHOTO",
            AttachmentKind::Document => "DOCUMENT",
            AttachmentKind::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttachmentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PHOTO" => Ok(AttachmentKind::Photo),
            "DOCUMENT" => Ok(AttachmentKind::Document),
            "OTHER" => Ok(AttachmentKind::Other),
            _ => Err(Error::Other(format!("unknown attachment kind: {s}"))),
        }
    }
}

/// A file already written by the blob store, as handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Opaque storage path.
    pub file_path: String,
    pub content_type: String,
}

impl Upload {
    pub fn new(file_path: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content_type: content_type.into(),
        }
    }
}

/// Attachment row waiting to be written inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub job_id: JobId,
    pub kind: AttachmentKind,
    pub file_path: String,
    pub uploaded_by: UserId,
}

impl NewAttachment {
    pub fn from_upload(job_id: JobId, upload: &Upload, uploaded_by: UserId) -> Self {
        Self {
            job_id,
            kind: AttachmentKind::classify(&upload.content_type),
            file_path: upload.file_path.clone(),
            uploaded_by,
        }
    }
}

/// A stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub job_id: JobId,
    pub kind: AttachmentKind,
    pub file_path: String,
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_are_photos() {
        assert_eq!(AttachmentKind::classify("image/jpeg"), AttachmentKind::Photo);
        assert_eq!(AttachmentKind::classify("image/png"), AttachmentKind::Photo);
        assert_eq!(AttachmentKind::classify("IMAGE/HEIC"), AttachmentKind::Photo);
    }

    #[test]
    fn pdf_is_a_document() {
        assert_eq!(
            AttachmentKind::classify("application/pdf"),
            AttachmentKind::Document
        );
        assert_eq!(
            AttachmentKind::classify("application/pdf; name=report.pdf"),
            AttachmentKind::Document
        );
    }

    #[test]
    fn everything_else_is_other() {
        assert_eq!(
            AttachmentKind::classify("application/msword"),
            AttachmentKind::Other
        );
        assert_eq!(AttachmentKind::classify("text/plain"), AttachmentKind::Other);
        assert_eq!(AttachmentKind::classify(""), AttachmentKind::Other);
        assert_eq!(AttachmentKind::classify("imagefile"), AttachmentKind::Other);
    }

    #[test]
    fn new_attachment_takes_kind_from_upload() {
        let job_id = JobId::new();
        let upload = Upload::new("/uploads/trench.jpg", "image/jpeg");
        let row = NewAttachment::from_upload(job_id, &upload, UserId(4));
        assert_eq!(row.kind, AttachmentKind::Photo);
        assert_eq!(row.file_path, "/uploads/trench.jpg");
        assert_eq!(row.uploaded_by, UserId(4));
    }
}
