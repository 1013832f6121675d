use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[cfg(test)]
use crate::error::CoreError;
use crate::error::CoreResult;
use crate::schemas::{AdvancePayment, AvailabilityRecord, DeletionRequest, Expense, Invitation, Member};

/// Record storage. Lookups are scoped to one organization except for the
/// per-user account records.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_members(&self, org_id: &str) -> CoreResult<Vec<Member>>;
    async fn find_member(&self, org_id: &str, user_id: &str) -> CoreResult<Option<Member>>;
    /// Every membership of a user, across organizations.
    async fn memberships_of(&self, user_id: &str) -> CoreResult<Vec<Member>>;
    async fn save_member(&self, member: &Member) -> CoreResult<()>;

    async fn list_availability(&self, org_id: &str) -> CoreResult<Vec<AvailabilityRecord>>;
    async fn insert_availability(&self, record: &AvailabilityRecord) -> CoreResult<()>;
    async fn delete_availability(&self, org_id: &str, id: &str) -> CoreResult<bool>;

    async fn insert_expense(&self, expense: &Expense) -> CoreResult<()>;
    async fn find_expense(&self, org_id: &str, id: &str) -> CoreResult<Option<Expense>>;
    async fn update_expense(&self, expense: &Expense) -> CoreResult<()>;
    async fn expenses_between(&self, org_id: &str, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Expense>>;

    async fn insert_payment(&self, payment: &AdvancePayment) -> CoreResult<()>;
    async fn find_payment(&self, org_id: &str, id: &str) -> CoreResult<Option<AdvancePayment>>;
    async fn update_payment(&self, payment: &AdvancePayment) -> CoreResult<()>;
    async fn payments_between(&self, org_id: &str, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<AdvancePayment>>;

    async fn find_deletion(&self, user_id: &str) -> CoreResult<Option<DeletionRequest>>;
    async fn save_deletion(&self, request: &DeletionRequest) -> CoreResult<()>;

    async fn list_invitations(&self, org_id: &str) -> CoreResult<Vec<Invitation>>;
    async fn find_invitation(&self, id: &str) -> CoreResult<Option<Invitation>>;
    async fn save_invitation(&self, invitation: &Invitation) -> CoreResult<()>;
}

#[derive(Default)]
struct Tables {
    members: Vec<Member>,
    availability: Vec<AvailabilityRecord>,
    expenses: Vec<Expense>,
    payments: Vec<AdvancePayment>,
    deletions: Vec<DeletionRequest>,
    invitations: Vec<Invitation>,
}

/// Keeps everything in process memory. Used by tests and when no database is
/// configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    deletion_writes_fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `save_deletion` fail with a storage error.
    #[cfg(test)]
    pub fn fail_deletion_writes(&self) {
        self.deletion_writes_fail.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn check_deletion_writes(&self) -> CoreResult<()> {
        if self.deletion_writes_fail.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("deletion writes are failing".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_deletion_writes(&self) -> CoreResult<()> {
        Ok(())
    }
}

fn upsert<T>(rows: &mut Vec<T>, row: &T, same: impl Fn(&T) -> bool)
where
    T: Clone,
{
    match rows.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_members(&self, org_id: &str) -> CoreResult<Vec<Member>> {
        let tables = self.tables.read().await;
        Ok(tables.members.iter().filter(|m| m.org_id == org_id).cloned().collect())
    }

    async fn find_member(&self, org_id: &str, user_id: &str) -> CoreResult<Option<Member>> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .find(|m| m.org_id == org_id && m.id == user_id)
            .cloned())
    }

    async fn memberships_of(&self, user_id: &str) -> CoreResult<Vec<Member>> {
        let tables = self.tables.read().await;
        Ok(tables.members.iter().filter(|m| m.id == user_id).cloned().collect())
    }

    async fn save_member(&self, member: &Member) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        upsert(&mut tables.members, member, |m| {
            m.org_id == member.org_id && m.id == member.id
        });
        Ok(())
    }

    async fn list_availability(&self, org_id: &str) -> CoreResult<Vec<AvailabilityRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.availability.iter().filter(|r| r.org_id == org_id).cloned().collect())
    }

    async fn insert_availability(&self, record: &AvailabilityRecord) -> CoreResult<()> {
        self.tables.write().await.availability.push(record.clone());
        Ok(())
    }

    async fn delete_availability(&self, org_id: &str, id: &str) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.availability.len();
        tables.availability.retain(|r| !(r.org_id == org_id && r.id == id));
        Ok(tables.availability.len() != before)
    }

    async fn insert_expense(&self, expense: &Expense) -> CoreResult<()> {
        self.tables.write().await.expenses.push(expense.clone());
        Ok(())
    }

    async fn find_expense(&self, org_id: &str, id: &str) -> CoreResult<Option<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .iter()
            .find(|e| e.org_id == org_id && e.id == id)
            .cloned())
    }

    async fn update_expense(&self, expense: &Expense) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        upsert(&mut tables.expenses, expense, |e| e.id == expense.id);
        Ok(())
    }

    async fn expenses_between(&self, org_id: &str, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .iter()
            .filter(|e| e.org_id == org_id && from <= e.expense_date && e.expense_date <= to)
            .cloned()
            .collect())
    }

    async fn insert_payment(&self, payment: &AdvancePayment) -> CoreResult<()> {
        self.tables.write().await.payments.push(payment.clone());
        Ok(())
    }

    async fn find_payment(&self, org_id: &str, id: &str) -> CoreResult<Option<AdvancePayment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.org_id == org_id && p.id == id)
            .cloned())
    }

    async fn update_payment(&self, payment: &AdvancePayment) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        upsert(&mut tables.payments, payment, |p| p.id == payment.id);
        Ok(())
    }

    async fn payments_between(&self, org_id: &str, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<AdvancePayment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.org_id == org_id && from <= p.payment_date && p.payment_date <= to)
            .cloned()
            .collect())
    }

    async fn find_deletion(&self, user_id: &str) -> CoreResult<Option<DeletionRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.deletions.iter().find(|d| d.user_id == user_id).cloned())
    }

    async fn save_deletion(&self, request: &DeletionRequest) -> CoreResult<()> {
        self.check_deletion_writes()?;
        let mut tables = self.tables.write().await;
        upsert(&mut tables.deletions, request, |d| d.user_id == request.user_id);
        Ok(())
    }

    async fn list_invitations(&self, org_id: &str) -> CoreResult<Vec<Invitation>> {
        let tables = self.tables.read().await;
        Ok(tables.invitations.iter().filter(|i| i.org_id == org_id).cloned().collect())
    }

    async fn find_invitation(&self, id: &str) -> CoreResult<Option<Invitation>> {
        let tables = self.tables.read().await;
        Ok(tables.invitations.iter().find(|i| i.id == id).cloned())
    }

    async fn save_invitation(&self, invitation: &Invitation) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        upsert(&mut tables.invitations, invitation, |i| i.id == invitation.id);
        Ok(())
    }
}
