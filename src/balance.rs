use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult};
use crate::ledger::split_total;
use crate::schemas::{AdvancePayment, Expense, Member, PaymentStatus, UserId};

/// Net position per member. Positive means the member owes the group.
pub type Balance = BTreeMap<UserId, Decimal>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonthRange {
    pub year: i32,
    pub month: u32,
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl MonthRange {
    pub fn new(year: i32, month: u32) -> CoreResult<Self> {
        let invalid = || CoreError::Validation(format!("{year}-{month:02} is not a valid month"));
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let last = next.pred_opt().ok_or_else(invalid)?;
        Ok(MonthRange { year, month, first, last })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonthBalance {
    pub currency: Option<String>,
    pub balance: Balance,
}

fn add(balance: &mut Balance, user: &str, amount: Decimal) {
    balance
        .entry(user.to_string())
        .and_modify(|v| *v += amount)
        .or_insert(amount);
}

/// Nets unpaid splits and approved advance payments dated inside `range`.
/// Every member appears in the result, with zero if nothing concerns them.
pub fn compute_month_balance(
    range: &MonthRange,
    members: &[Member],
    expenses: &[Expense],
    payments: &[AdvancePayment],
) -> CoreResult<MonthBalance> {
    let expenses: Vec<&Expense> = expenses
        .iter()
        .filter(|e| range.contains(e.expense_date))
        .collect();
    let payments: Vec<&AdvancePayment> = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Approved && range.contains(p.payment_date))
        .collect();

    let currencies: BTreeSet<&str> = expenses
        .iter()
        .map(|e| e.currency.as_str())
        .chain(payments.iter().map(|p| p.currency.as_str()))
        .collect();
    if currencies.len() > 1 {
        return Err(CoreError::Validation(format!(
            "cannot net mixed currencies: {}",
            currencies.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    let mut balance: Balance = members
        .iter()
        .map(|m| (m.id.clone(), Decimal::ZERO))
        .collect();

    for expense in &expenses {
        let discrepancy = expense.amount - split_total(expense);
        if !discrepancy.is_zero() {
            log::error!(
                "Expense {} splits do not add up to {} (off by {})",
                expense.id,
                expense.amount,
                discrepancy
            );
            return Err(CoreError::Inconsistent { discrepancy });
        }
        for line in &expense.split_between {
            if line.paid || line.user_id == expense.payer_id {
                continue;
            }
            add(&mut balance, &line.user_id, line.amount);
            add(&mut balance, &expense.payer_id, -line.amount);
        }
    }

    for payment in &payments {
        add(&mut balance, &payment.user_id, -payment.amount);
        add(&mut balance, &payment.paid_to, payment.amount);
    }

    let total: Decimal = balance.values().copied().sum();
    if !total.is_zero() {
        return Err(CoreError::Inconsistent { discrepancy: total });
    }

    Ok(MonthBalance {
        currency: currencies.into_iter().next().map(str::to_string),
        balance,
    })
}
