//! Role and ownership checks.
//!
//! Admin-tier requesters (ADMIN, SEMI_ADMIN) see and decide on every job.
//! Everyone else sees and reports only the jobs assigned to them.

use crate::model::{DateWindow, Job, Requester};
use crate::store::JobFilter;

/// The listing filter a requester is entitled to.
pub fn visibility(requester: &Requester, window: Option<DateWindow>) -> JobFilter {
    JobFilter {
        assigned_user_id: if requester.role.is_admin_tier() {
            None
        } else {
            Some(requester.id)
        },
        window,
    }
}

pub fn can_view(job: &Job, requester: &Requester) -> bool {
    requester.role.is_admin_tier() || job.assigned_user_id == requester.id
}

/// The assignee reports their own work; admins may report on their behalf.
pub fn can_submit_for_review(job: &Job, requester: &Requester) -> bool {
    job.assigned_user_id == requester.id || requester.role.is_admin_tier()
}

/// Approve, reject, and forward.
pub fn can_decide(requester: &Requester) -> bool {
    requester.role.is_admin_tier()
}

pub fn can_create(requester: &Requester) -> bool {
    requester.role.is_admin_tier()
}
