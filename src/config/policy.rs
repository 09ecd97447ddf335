//! Tunable workflow rules.
//!
//! ```toml
//! # jobflow-policy.toml
//! require_waiting_review = true
//! verify_forward_target = true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Rules the engine applies on top of the fixed state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowPolicy {
    /// Approve and reject only from WAITING_REVIEW. When false, admins may
    /// decide on a job in any status.
    pub require_waiting_review: bool,

    /// Check that a forward target exists, can do cable insertion, and
    /// belongs to the named company.
    pub verify_forward_target: bool,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            require_waiting_review: true,
            verify_forward_target: true,
        }
    }
}

impl WorkflowPolicy {
    /// Admin override: approve and reject regardless of status.
    pub fn permissive() -> Self {
        Self {
            require_waiting_review: false,
            ..Self::default()
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("bad workflow policy: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read policy file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_defaults() {
        assert_eq!(
            WorkflowPolicy::from_toml("").unwrap(),
            WorkflowPolicy::default()
        );
    }

    #[test]
    fn single_key_overrides() {
        let policy = WorkflowPolicy::from_toml("require_waiting_review = false").unwrap();
        assert!(!policy.require_waiting_review);
        assert!(policy.verify_forward_target);
        assert_eq!(policy, WorkflowPolicy::permissive());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = WorkflowPolicy::from_toml("allow_everything = true").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
