use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type OrgId = String;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Cook,
}

impl Role {
    /// Owners and admins manage roles, invitations and payment reviews.
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub id: UserId,
    pub org_id: OrgId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub disabled: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AvailabilityRecord {
    pub id: String,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SplitLine {
    pub user_id: UserId,
    pub amount: Decimal,
    pub paid: bool,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: String,
    pub org_id: OrgId,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub payer_id: UserId,
    pub expense_date: NaiveDate,
    pub split_between: Vec<SplitLine>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AdvancePayment {
    pub id: String,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub paid_to: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: NaiveDate,
    pub status: PaymentStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    PendingDeletion,
    Recovered,
    Purged,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DeletionRequest {
    pub user_id: UserId,
    pub org_id: OrgId,
    pub status: DeletionStatus,
    #[serde(default)]
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub scheduled_deletion_at: DateTime<Utc>,
    #[serde(default)]
    pub recovered_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Invitation {
    pub id: String,
    pub org_id: OrgId,
    pub email: String,
    pub role: Role,
    pub invited_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: InvitationStatus,
}
