//! People the engine reasons about: requesters and technicians.
//!
//! Credentials and the user directory live outside this crate; these types
//! carry only what authorization and forwarding decisions need.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub i64);

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Account role of whoever is calling the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    SemiAdmin,
    User,
}

impl Role {
    /// ADMIN and SEMI_ADMIN share every review and scheduling capability.
    pub fn is_admin_tier(self) -> bool {
        matches!(self, Role::Admin | Role::SemiAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::SemiAdmin => "SEMI_ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ADMIN" => Ok(Role::Admin),
            "SEMI_ADMIN" => Ok(Role::SemiAdmin),
            "USER" => Ok(Role::User),
            _ => Err(Error::Validation(format!("unknown role: {s}"))),
        }
    }
}

/// The authenticated identity behind an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: UserId,
    pub role: Role,
}

impl Requester {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn admin(id: UserId) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn technician(id: UserId) -> Self {
        Self::new(id, Role::User)
    }
}

// ---------------------------------------------------------------------------
// Technicians
// ---------------------------------------------------------------------------

/// Work phases a technician is qualified for.
///
/// A technician with no role at all predates phase tracking and is treated
/// as doing both phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobRole {
    /// Ground work (phase 1).
    Tiefbau,
    /// Cable insertion (phase 2).
    Einblaeser,
    /// Both phases.
    TiefbauEinblaeser,
}

impl JobRole {
    pub fn as_str(self) -> &'static str {
        match self {
            JobRole::Tiefbau => "TIEFBAU",
            JobRole::Einblaeser => "EINBLAESER",
            JobRole::TiefbauEinblaeser => "TIEFBAU_EINBLAESER",
        }
    }

    /// Parse a stored role column. Empty means "unset".
    pub fn parse_optional(s: Option<&str>) -> Result<Option<JobRole>> {
        match s.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value.parse().map(Some),
        }
    }
}

impl std::fmt::Display for JobRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TIEFBAU" => Ok(JobRole::Tiefbau),
            "EINBLAESER" => Ok(JobRole::Einblaeser),
            "TIEFBAU_EINBLAESER" => Ok(JobRole::TiefbauEinblaeser),
            _ => Err(Error::Other(format!("unknown job role: {s}"))),
        }
    }
}

/// Read-only directory entry for a technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub id: UserId,
    pub name: String,
    pub company_id: Option<CompanyId>,
    pub job_role: Option<JobRole>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_tier_covers_admin_and_semi_admin() {
        assert!(Role::Admin.is_admin_tier());
        assert!(Role::SemiAdmin.is_admin_tier());
        assert!(!Role::User.is_admin_tier());
    }

    #[test]
    fn role_parsing_is_lenient_on_case_and_dashes() {
        assert_eq!("semi-admin".parse::<Role>().unwrap(), Role::SemiAdmin);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!(matches!(
            "root".parse::<Role>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn empty_job_role_is_unset() {
        assert_eq!(JobRole::parse_optional(None).unwrap(), None);
        assert_eq!(JobRole::parse_optional(Some("")).unwrap(), None);
        assert_eq!(
            JobRole::parse_optional(Some("tiefbau_einblaeser")).unwrap(),
            Some(JobRole::TiefbauEinblaeser)
        );
        assert!(JobRole::parse_optional(Some("PLUMBER")).is_err());
    }
}
