use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::ReplaceOptions,
    Client, Collection, Database,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CoreResult;
use crate::schemas::{AdvancePayment, AvailabilityRecord, DeletionRequest, Expense, Invitation, Member};
use crate::store::Store;

pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database_name: &str) -> CoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(MongoStore {
            database: client.database(database_name),
        })
    }

    fn members(&self) -> Collection<Member> {
        self.database.collection("Members")
    }

    fn availability(&self) -> Collection<AvailabilityRecord> {
        self.database.collection("Availability")
    }

    fn expenses(&self) -> Collection<Expense> {
        self.database.collection("Expenses")
    }

    fn payments(&self) -> Collection<AdvancePayment> {
        self.database.collection("AdvancePayments")
    }

    fn deletions(&self) -> Collection<DeletionRequest> {
        self.database.collection("DeletionRequests")
    }

    fn invitations(&self) -> Collection<Invitation> {
        self.database.collection("Invitations")
    }
}

async fn find_all<T>(collection: &Collection<T>, filter: Document) -> CoreResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let cursor = collection.find(filter, None).await?;
    Ok(cursor.try_collect::<Vec<T>>().await?)
}

async fn upsert<T>(collection: &Collection<T>, filter: Document, row: &T) -> CoreResult<()>
where
    T: Serialize,
{
    let options = ReplaceOptions::builder().upsert(true).build();
    collection.replace_one(filter, row, options).await?;
    Ok(())
}

// Dates are stored as ISO strings, which sort in calendar order
fn date_range(field: &str, org_id: &str, from: NaiveDate, to: NaiveDate) -> Document {
    let mut filter = doc! { "org_id": org_id };
    filter.insert(field, doc! { "$gte": from.to_string(), "$lte": to.to_string() });
    filter
}

#[async_trait]
impl Store for MongoStore {
    async fn list_members(&self, org_id: &str) -> CoreResult<Vec<Member>> {
        find_all(&self.members(), doc! { "org_id": org_id }).await
    }

    async fn find_member(&self, org_id: &str, user_id: &str) -> CoreResult<Option<Member>> {
        Ok(self
            .members()
            .find_one(doc! { "org_id": org_id, "id": user_id }, None)
            .await?)
    }

    async fn memberships_of(&self, user_id: &str) -> CoreResult<Vec<Member>> {
        find_all(&self.members(), doc! { "id": user_id }).await
    }

    async fn save_member(&self, member: &Member) -> CoreResult<()> {
        upsert(
            &self.members(),
            doc! { "org_id": member.org_id.as_str(), "id": member.id.as_str() },
            member,
        )
        .await
    }

    async fn list_availability(&self, org_id: &str) -> CoreResult<Vec<AvailabilityRecord>> {
        find_all(&self.availability(), doc! { "org_id": org_id }).await
    }

    async fn insert_availability(&self, record: &AvailabilityRecord) -> CoreResult<()> {
        self.availability().insert_one(record, None).await?;
        Ok(())
    }

    async fn delete_availability(&self, org_id: &str, id: &str) -> CoreResult<bool> {
        let result = self
            .availability()
            .delete_one(doc! { "org_id": org_id, "id": id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_expense(&self, expense: &Expense) -> CoreResult<()> {
        self.expenses().insert_one(expense, None).await?;
        Ok(())
    }

    async fn find_expense(&self, org_id: &str, id: &str) -> CoreResult<Option<Expense>> {
        Ok(self
            .expenses()
            .find_one(doc! { "org_id": org_id, "id": id }, None)
            .await?)
    }

    async fn update_expense(&self, expense: &Expense) -> CoreResult<()> {
        upsert(&self.expenses(), doc! { "id": expense.id.as_str() }, expense).await
    }

    async fn expenses_between(&self, org_id: &str, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Expense>> {
        find_all(&self.expenses(), date_range("expense_date", org_id, from, to)).await
    }

    async fn insert_payment(&self, payment: &AdvancePayment) -> CoreResult<()> {
        self.payments().insert_one(payment, None).await?;
        Ok(())
    }

    async fn find_payment(&self, org_id: &str, id: &str) -> CoreResult<Option<AdvancePayment>> {
        Ok(self
            .payments()
            .find_one(doc! { "org_id": org_id, "id": id }, None)
            .await?)
    }

    async fn update_payment(&self, payment: &AdvancePayment) -> CoreResult<()> {
        upsert(&self.payments(), doc! { "id": payment.id.as_str() }, payment).await
    }

    async fn payments_between(&self, org_id: &str, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<AdvancePayment>> {
        find_all(&self.payments(), date_range("payment_date", org_id, from, to)).await
    }

    async fn find_deletion(&self, user_id: &str) -> CoreResult<Option<DeletionRequest>> {
        Ok(self
            .deletions()
            .find_one(doc! { "user_id": user_id }, None)
            .await?)
    }

    async fn save_deletion(&self, request: &DeletionRequest) -> CoreResult<()> {
        upsert(&self.deletions(), doc! { "user_id": request.user_id.as_str() }, request).await
    }

    async fn list_invitations(&self, org_id: &str) -> CoreResult<Vec<Invitation>> {
        find_all(&self.invitations(), doc! { "org_id": org_id }).await
    }

    async fn find_invitation(&self, id: &str) -> CoreResult<Option<Invitation>> {
        Ok(self.invitations().find_one(doc! { "id": id }, None).await?)
    }

    async fn save_invitation(&self, invitation: &Invitation) -> CoreResult<()> {
        upsert(&self.invitations(), doc! { "id": invitation.id.as_str() }, invitation).await
    }
}
