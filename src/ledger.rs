use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::availability::available_members;
use crate::error::{CoreError, CoreResult};
use crate::schemas::{
    new_id, AdvancePayment, AvailabilityRecord, Expense, Member, OrgId, PaymentStatus, SplitLine,
};

#[derive(Clone, Debug, Deserialize)]
pub struct ExpenseDraft {
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub expense_date: NaiveDate,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PaymentDraft {
    pub paid_to: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitWarning {
    /// Nobody was available on the expense date, the payer carries it alone.
    NoAvailableMembers,
}

/// Organization policy for advance payments.
#[derive(Clone, Copy, Debug, Default)]
pub struct PaymentPolicy {
    pub require_review: bool,
}

fn validate_amount(amount: Decimal) -> CoreResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(CoreError::Validation(format!(
            "amount {amount} has more than two decimals"
        )));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> CoreResult<String> {
    let currency = currency.trim();
    if currency.is_empty() {
        return Err(CoreError::Validation("currency is required".to_string()));
    }
    Ok(currency.to_uppercase())
}

pub fn split_total(expense: &Expense) -> Decimal {
    expense.split_between.iter().map(|line| line.amount).sum()
}

fn equal_share(amount: Decimal, count: Decimal, strategy: RoundingStrategy) -> Decimal {
    let mut share = (amount / count).round_dp_with_strategy(2, strategy);
    share.rescale(2);
    share
}

/// Builds an expense with an equal split frozen over the members available on
/// the expense date. Shares are rounded half-up to cents and the signed
/// remainder lands on the payer's line (or the first line if the payer is
/// away), so the lines always add up to the amount. When that would leave the
/// first line negative the shares are truncated instead.
pub fn create_expense(
    org_id: OrgId,
    draft: ExpenseDraft,
    payer_id: &str,
    members: &[Member],
    records: &[AvailabilityRecord],
    now: DateTime<Utc>,
) -> CoreResult<(Expense, Option<SplitWarning>)> {
    validate_amount(draft.amount)?;
    let currency = validate_currency(&draft.currency)?;

    let active: Vec<Member> = members.iter().filter(|m| !m.disabled).cloned().collect();
    let mut participants: Vec<&str> = available_members(records, draft.expense_date, &active)
        .into_iter()
        .map(|m| m.id.as_str())
        .collect();
    if let Some(pos) = participants.iter().position(|id| *id == payer_id) {
        let payer = participants.remove(pos);
        participants.insert(0, payer);
    }

    let mut warning = None;
    let split_between = if participants.is_empty() {
        warning = Some(SplitWarning::NoAvailableMembers);
        vec![SplitLine {
            user_id: payer_id.to_string(),
            amount: draft.amount,
            paid: true,
            paid_at: Some(now),
        }]
    } else {
        let count = Decimal::from(participants.len());
        let mut share = equal_share(draft.amount, count, RoundingStrategy::MidpointAwayFromZero);
        // Tiny amounts over many members can push the first line below zero
        if draft.amount - share * (count - Decimal::ONE) < Decimal::ZERO {
            share = equal_share(draft.amount, count, RoundingStrategy::ToZero);
        }
        let remainder = draft.amount - share * count;
        let mut lines: Vec<SplitLine> = participants
            .iter()
            .map(|id| {
                let is_payer = *id == payer_id;
                SplitLine {
                    user_id: id.to_string(),
                    amount: share,
                    paid: is_payer,
                    paid_at: is_payer.then_some(now),
                }
            })
            .collect();
        lines[0].amount += remainder;
        lines
    };

    let expense = Expense {
        id: new_id(),
        org_id,
        description: draft.description,
        amount: draft.amount,
        currency,
        payer_id: payer_id.to_string(),
        expense_date: draft.expense_date,
        split_between,
        created_at: now,
    };
    debug_assert_eq!(split_total(&expense), expense.amount);
    Ok((expense, warning))
}

/// Marks a split line as paid. Calling it again keeps the first `paid_at`.
pub fn mark_split_paid(expense: &mut Expense, user_id: &str, now: DateTime<Utc>) -> CoreResult<()> {
    let line = expense
        .split_between
        .iter_mut()
        .find(|line| line.user_id == user_id)
        .ok_or_else(|| CoreError::NotFound(format!("split for {user_id} on expense {}", expense.id)))?;
    if !line.paid {
        line.paid = true;
        line.paid_at = Some(now);
    }
    Ok(())
}

pub fn create_payment(
    org_id: OrgId,
    user_id: &str,
    draft: PaymentDraft,
    policy: PaymentPolicy,
    now: DateTime<Utc>,
) -> CoreResult<AdvancePayment> {
    validate_amount(draft.amount)?;
    let currency = validate_currency(&draft.currency)?;
    if draft.paid_to == user_id {
        return Err(CoreError::Validation(
            "an advance payment must go to another member".to_string(),
        ));
    }
    let status = if policy.require_review {
        PaymentStatus::Pending
    } else {
        PaymentStatus::Approved
    };
    Ok(AdvancePayment {
        id: new_id(),
        org_id,
        user_id: user_id.to_string(),
        paid_to: draft.paid_to,
        amount: draft.amount,
        currency,
        payment_date: draft.payment_date,
        status,
        note: draft.note,
        created_at: now,
    })
}

pub fn review_payment(payment: &mut AdvancePayment, approve: bool) -> CoreResult<()> {
    if payment.status != PaymentStatus::Pending {
        return Err(CoreError::Conflict(format!(
            "payment {} was already reviewed",
            payment.id
        )));
    }
    payment.status = if approve {
        PaymentStatus::Approved
    } else {
        PaymentStatus::Rejected
    };
    Ok(())
}
