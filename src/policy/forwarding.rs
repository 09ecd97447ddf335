//! Approve-and-forward: handing a finished ground-work job to a
//! cable-insertion technician as a new job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{CompanyId, Job, JobId, JobRole, JobStatus, Technician, UserId};

/// Creation comment used when the reviewer leaves none.
pub const DEFAULT_FORWARD_COMMENT: &str = "Cable insertion job created from ground-work job";

/// Reviewer's instructions for the successor job.
///
/// Mirrors what arrives from the review form, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardSpec {
    pub company_id: Option<CompanyId>,
    pub user_id: Option<UserId>,
    /// Falls back to the parent's window when absent.
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl ForwardSpec {
    pub fn to(company_id: CompanyId, user_id: UserId) -> Self {
        Self {
            company_id: Some(company_id),
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn window(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.scheduled_from = Some(from);
        self.scheduled_to = Some(to);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The assignee of the successor. Both halves are required.
    pub fn target(&self) -> Result<ForwardTarget> {
        match (self.company_id, self.user_id) {
            (Some(company_id), Some(user_id)) => Ok(ForwardTarget {
                company_id,
                user_id,
            }),
            _ => Err(Error::Validation("forward target incomplete".to_string())),
        }
    }
}

/// Company and technician a successor job goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardTarget {
    pub company_id: CompanyId,
    pub user_id: UserId,
}

/// May a job done by a technician with `role` be forwarded?
///
/// Ground-work technicians and legacy technicians with no role are;
/// cable-insertion-only technicians finish the chain.
pub fn is_eligible(role: Option<JobRole>) -> bool {
    matches!(
        role,
        None | Some(JobRole::Tiefbau) | Some(JobRole::TiefbauEinblaeser)
    )
}

/// May a technician with `role` receive a forwarded job?
pub fn can_receive(role: Option<JobRole>) -> bool {
    matches!(
        role,
        None | Some(JobRole::Einblaeser) | Some(JobRole::TiefbauEinblaeser)
    )
}

/// Check the directory entry of the forward target.
pub fn verify_target(target: &ForwardTarget, technician: Option<&Technician>) -> Result<()> {
    let Some(technician) = technician else {
        return Err(Error::Validation(format!(
            "forward target {} does not exist",
            target.user_id
        )));
    };
    if !can_receive(technician.job_role) {
        return Err(Error::Validation(format!(
            "forward target {} cannot do cable insertion",
            target.user_id
        )));
    }
    if technician.company_id != Some(target.company_id) {
        return Err(Error::Validation(format!(
            "forward target {} does not belong to company {}",
            target.user_id, target.company_id
        )));
    }
    Ok(())
}

/// Build the successor of `parent` as described by `spec`.
pub fn derive(parent: &Job, spec: &ForwardSpec, actor: UserId, now: DateTime<Utc>) -> Result<Job> {
    let target = spec.target()?;

    Ok(Job {
        id: JobId::new(),
        customer_name: parent.customer_name.clone(),
        customer_address: parent.customer_address.clone(),
        customer_city: parent.customer_city.clone(),
        customer_phone: parent.customer_phone.clone(),
        order_number: parent.order_number.clone(),
        job_type: parent.job_type.clone(),
        scheduled_from: spec.scheduled_from.unwrap_or(parent.scheduled_from),
        scheduled_to: spec.scheduled_to.unwrap_or(parent.scheduled_to),
        assigned_user_id: target.user_id,
        company_id: target.company_id,
        created_by: actor,
        creation_comment: Some(
            crate::model::non_blank(spec.comment.clone())
                .unwrap_or_else(|| DEFAULT_FORWARD_COMMENT.to_string()),
        ),
        status: JobStatus::Assigned,
        admin_comment: None,
        completion_notes: None,
        completed_success: None,
        completed_at: None,
        source_job_id: Some(parent.id),
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobFields;
    use chrono::{Duration, TimeZone};

    fn parent() -> Job {
        JobFields {
            customer_name: Some("Anna Weber".to_string()),
            customer_address: Some("Hauptstrasse 4".to_string()),
            customer_city: Some("Ulm".to_string()),
            customer_phone: Some("0731 1234".to_string()),
            order_number: Some("SK-77".to_string()),
            job_type: Some("NE3".to_string()),
            scheduled_from: Some(Utc.with_ymd_and_hms(2026, 4, 1, 7, 0, 0).unwrap()),
            scheduled_to: Some(Utc.with_ymd_and_hms(2026, 4, 1, 15, 0, 0).unwrap()),
            assigned_user_id: Some(UserId(5)),
            company_id: Some(CompanyId(1)),
            ..Default::default()
        }
        .into_job(UserId(1), Utc::now())
        .unwrap()
    }

    fn technician(role: Option<JobRole>, company: i64) -> Technician {
        Technician {
            id: UserId(9),
            name: "Jonas".to_string(),
            company_id: Some(CompanyId(company)),
            job_role: role,
        }
    }

    #[test]
    fn eligibility_by_role() {
        assert!(is_eligible(Some(JobRole::Tiefbau)));
        assert!(is_eligible(Some(JobRole::TiefbauEinblaeser)));
        assert!(is_eligible(None), "legacy technicians do both phases");
        assert!(!is_eligible(Some(JobRole::Einblaeser)));
    }

    #[test]
    fn receiving_requires_second_phase_capability() {
        assert!(can_receive(Some(JobRole::Einblaeser)));
        assert!(can_receive(Some(JobRole::TiefbauEinblaeser)));
        assert!(can_receive(None));
        assert!(!can_receive(Some(JobRole::Tiefbau)));
    }

    #[test]
    fn incomplete_target_is_rejected() {
        let only_company = ForwardSpec {
            company_id: Some(CompanyId(2)),
            ..Default::default()
        };
        let err = derive(&parent(), &only_company, UserId(1), Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "forward target incomplete"));

        let only_user = ForwardSpec {
            user_id: Some(UserId(9)),
            ..Default::default()
        };
        assert!(only_user.target().is_err());
    }

    #[test]
    fn successor_copies_customer_and_takes_parent_window() {
        let parent = parent();
        let now = Utc::now();
        let child = derive(
            &parent,
            &ForwardSpec::to(CompanyId(2), UserId(9)),
            UserId(1),
            now,
        )
        .unwrap();

        assert_ne!(child.id, parent.id);
        assert_eq!(child.source_job_id, Some(parent.id));
        assert_eq!(child.status, JobStatus::Assigned);
        assert_eq!(child.customer_name, parent.customer_name);
        assert_eq!(child.customer_phone, parent.customer_phone);
        assert_eq!(child.order_number, parent.order_number);
        assert_eq!(child.job_type, parent.job_type);
        assert_eq!(child.scheduled_from, parent.scheduled_from);
        assert_eq!(child.scheduled_to, parent.scheduled_to);
        assert_eq!(child.assigned_user_id, UserId(9));
        assert_eq!(child.company_id, CompanyId(2));
        assert_eq!(child.created_by, UserId(1));
        assert_eq!(
            child.creation_comment.as_deref(),
            Some(DEFAULT_FORWARD_COMMENT)
        );
        assert_eq!(child.completed_success, None);
    }

    #[test]
    fn successor_uses_supplied_window_and_comment() {
        let parent = parent();
        let from = parent.scheduled_from + Duration::days(7);
        let to = from + Duration::hours(4);
        let spec = ForwardSpec::to(CompanyId(2), UserId(9))
            .window(from, to)
            .comment("bring the long blower");
        let child = derive(&parent, &spec, UserId(1), Utc::now()).unwrap();

        assert_eq!(child.scheduled_from, from);
        assert_eq!(child.scheduled_to, to);
        assert_eq!(
            child.creation_comment.as_deref(),
            Some("bring the long blower")
        );
    }

    #[test]
    fn target_verification() {
        let target = ForwardTarget {
            company_id: CompanyId(2),
            user_id: UserId(9),
        };

        assert!(verify_target(&target, Some(&technician(Some(JobRole::Einblaeser), 2))).is_ok());
        assert!(verify_target(&target, Some(&technician(None, 2))).is_ok());
        assert!(matches!(
            verify_target(&target, None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            verify_target(&target, Some(&technician(Some(JobRole::Tiefbau), 2))),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            verify_target(&target, Some(&technician(Some(JobRole::Einblaeser), 3))),
            Err(Error::Validation(_))
        ));
    }
}
