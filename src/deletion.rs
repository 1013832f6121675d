use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::schemas::{DeletionRequest, DeletionStatus, OrgId, UserId};

pub const DEFAULT_GRACE_DAYS: i64 = 30;

/// Where an account stands with respect to deletion at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Active,
    PendingDeletion,
    /// Grace period is over, the external purge job may remove the data.
    PurgeDue,
    Purged,
}

impl DeletionRequest {
    pub fn can_recover(&self, now: DateTime<Utc>) -> bool {
        self.status == DeletionStatus::PendingDeletion && now < self.scheduled_deletion_at
    }
}

pub fn account_state(request: Option<&DeletionRequest>, now: DateTime<Utc>) -> AccountState {
    match request.map(|r| (r.status, r.scheduled_deletion_at)) {
        None | Some((DeletionStatus::Recovered, _)) => AccountState::Active,
        Some((DeletionStatus::Purged, _)) => AccountState::Purged,
        Some((DeletionStatus::PendingDeletion, deadline)) if now < deadline => {
            AccountState::PendingDeletion
        }
        Some((DeletionStatus::PendingDeletion, _)) => AccountState::PurgeDue,
    }
}

pub fn request_deletion(
    existing: Option<&DeletionRequest>,
    user_id: UserId,
    org_id: OrgId,
    reason: Option<String>,
    now: DateTime<Utc>,
    grace: Duration,
) -> CoreResult<DeletionRequest> {
    match existing.map(|r| r.status) {
        Some(DeletionStatus::PendingDeletion) => {
            return Err(CoreError::Conflict(format!(
                "deletion of {user_id} is already scheduled"
            )))
        }
        Some(DeletionStatus::Purged) => {
            return Err(CoreError::Conflict(format!("account {user_id} was purged")))
        }
        Some(DeletionStatus::Recovered) | None => {}
    }

    Ok(DeletionRequest {
        user_id,
        org_id,
        status: DeletionStatus::PendingDeletion,
        reason,
        requested_at: now,
        scheduled_deletion_at: now + grace,
        recovered_at: None,
    })
}

fn restore(request: &mut DeletionRequest, now: DateTime<Utc>) -> CoreResult<()> {
    if request.status != DeletionStatus::PendingDeletion {
        return Err(CoreError::Conflict(format!(
            "no pending deletion for {}",
            request.user_id
        )));
    }
    if now >= request.scheduled_deletion_at {
        return Err(CoreError::Expired(format!(
            "recovery window closed at {}",
            request.scheduled_deletion_at
        )));
    }
    request.status = DeletionStatus::Recovered;
    request.recovered_at = Some(now);
    Ok(())
}

/// Recovery page entry point.
pub fn recover_account(request: &mut DeletionRequest, now: DateTime<Utc>) -> CoreResult<()> {
    restore(request, now)
}

/// Settings page entry point, same guard as [`recover_account`].
pub fn cancel_deletion(request: &mut DeletionRequest, now: DateTime<Utc>) -> CoreResult<()> {
    restore(request, now)
}
