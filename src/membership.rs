use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult};
use crate::schemas::{new_id, Invitation, InvitationStatus, Member, Role, UserId};

pub const INVITATION_VALID_DAYS: i64 = 7;

pub fn ensure_manager(actor: &Member) -> CoreResult<()> {
    if actor.disabled || !actor.role.can_manage() {
        return Err(CoreError::Forbidden(format!(
            "{} cannot manage the organization",
            actor.id
        )));
    }
    Ok(())
}

/// Owners and admins change roles; only an owner touches the owner role.
pub fn change_role(actor: &Member, target: &mut Member, role: Role) -> CoreResult<()> {
    ensure_manager(actor)?;
    if (role == Role::Owner || target.role == Role::Owner) && actor.role != Role::Owner {
        return Err(CoreError::Forbidden(
            "only an owner can grant or revoke ownership".to_string(),
        ));
    }
    target.role = role;
    Ok(())
}

pub fn create_invitation(
    actor: &Member,
    email: &str,
    role: Role,
    pending: &[Invitation],
    now: DateTime<Utc>,
) -> CoreResult<Invitation> {
    ensure_manager(actor)?;
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(CoreError::Validation(format!("{email} is not an email address")));
    }
    if role == Role::Owner && actor.role != Role::Owner {
        return Err(CoreError::Forbidden("only an owner can invite owners".to_string()));
    }
    let duplicate = pending.iter().any(|inv| {
        inv.status == InvitationStatus::Pending && inv.email == email && now < inv.expires_at
    });
    if duplicate {
        return Err(CoreError::Conflict(format!("{email} already has a pending invitation")));
    }

    Ok(Invitation {
        id: new_id(),
        org_id: actor.org_id.clone(),
        email,
        role,
        invited_by: actor.id.clone(),
        created_at: now,
        expires_at: now + Duration::days(INVITATION_VALID_DAYS),
        status: InvitationStatus::Pending,
    })
}

/// Turns a pending invitation into a membership for `user_id`. An invitation
/// found past its expiry is flagged expired and rejected.
pub fn accept_invitation(
    invitation: &mut Invitation,
    user_id: UserId,
    name: String,
    email: &str,
    now: DateTime<Utc>,
) -> CoreResult<Member> {
    if invitation.status != InvitationStatus::Pending {
        return Err(CoreError::Conflict(format!(
            "invitation {} is no longer pending",
            invitation.id
        )));
    }
    if now >= invitation.expires_at {
        invitation.status = InvitationStatus::Expired;
        return Err(CoreError::Expired(format!("invitation {} expired", invitation.id)));
    }
    if !invitation.email.eq_ignore_ascii_case(email.trim()) {
        return Err(CoreError::Forbidden(
            "invitation was sent to another address".to_string(),
        ));
    }
    if name.trim().is_empty() {
        return Err(CoreError::Validation("name is required".to_string()));
    }

    invitation.status = InvitationStatus::Accepted;
    Ok(Member {
        id: user_id,
        org_id: invitation.org_id.clone(),
        name: name.trim().to_string(),
        email: invitation.email.clone(),
        role: invitation.role,
        disabled: false,
        joined_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::tests::member;

    fn with_role(id: &str, role: Role) -> Member {
        Member { role, ..member(id) }
    }

    #[test]
    fn admin_changes_member_roles() {
        let admin = with_role("ana", Role::Admin);
        let mut ben = member("ben");
        change_role(&admin, &mut ben, Role::Cook).unwrap();
        assert_eq!(ben.role, Role::Cook);
    }

    #[test]
    fn only_owner_touches_ownership() {
        let admin = with_role("ana", Role::Admin);
        let mut ben = member("ben");
        assert!(matches!(change_role(&admin, &mut ben, Role::Owner), Err(CoreError::Forbidden(_))));

        let mut owner = with_role("olga", Role::Owner);
        assert!(matches!(change_role(&admin, &mut owner, Role::Member), Err(CoreError::Forbidden(_))));

        let boss = with_role("zed", Role::Owner);
        change_role(&boss, &mut ben, Role::Owner).unwrap();
        assert_eq!(ben.role, Role::Owner);
    }

    #[test]
    fn plain_members_cannot_manage() {
        let cook = with_role("ana", Role::Cook);
        let mut ben = member("ben");
        assert!(matches!(change_role(&cook, &mut ben, Role::Admin), Err(CoreError::Forbidden(_))));
    }

    #[test]
    fn invitation_lifecycle() {
        let now = Utc::now();
        let admin = with_role("ana", Role::Admin);
        let mut invitation = create_invitation(&admin, " Ben@Example.org ", Role::Member, &[], now).unwrap();
        assert_eq!(invitation.email, "ben@example.org");
        assert_eq!(invitation.expires_at, now + Duration::days(7));

        let dup = create_invitation(&admin, "ben@example.org", Role::Member, &[invitation.clone()], now);
        assert!(matches!(dup, Err(CoreError::Conflict(_))));

        let joined = accept_invitation(&mut invitation, "ben".into(), "Ben".into(), "BEN@example.org", now).unwrap();
        assert_eq!(joined.org_id, "flat");
        assert_eq!(joined.role, Role::Member);
        assert_eq!(invitation.status, InvitationStatus::Accepted);

        let again = accept_invitation(&mut invitation, "ben".into(), "Ben".into(), "ben@example.org", now);
        assert!(matches!(again, Err(CoreError::Conflict(_))));
    }

    #[test]
    fn expired_invitation_cannot_be_accepted() {
        let now = Utc::now();
        let admin = with_role("ana", Role::Admin);
        let mut invitation = create_invitation(&admin, "ben@example.org", Role::Member, &[], now).unwrap();
        let later = now + Duration::days(8);
        let err = accept_invitation(&mut invitation, "ben".into(), "Ben".into(), "ben@example.org", later).unwrap_err();
        assert!(matches!(err, CoreError::Expired(_)));
        assert_eq!(invitation.status, InvitationStatus::Expired);
    }

    #[test]
    fn invitation_for_someone_else_is_forbidden() {
        let now = Utc::now();
        let admin = with_role("ana", Role::Admin);
        let mut invitation = create_invitation(&admin, "ben@example.org", Role::Member, &[], now).unwrap();
        let err = accept_invitation(&mut invitation, "eve".into(), "Eve".into(), "eve@example.org", now).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }
}
