use crate::balance::{compute_month_balance, Balance, MonthRange};
use crate::error::{CoreError, CoreResult};
use crate::schemas::{AdvancePayment, Expense, Member, PaymentStatus, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::mem::swap;

#[derive(Clone, Debug)]
pub struct PersonalBalance {
    pub id: UserId,
    pub balance: Decimal,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct UserPair {
    pub user1: UserId,
    pub user2: UserId,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transfer {
    pub from: UserId,
    pub to: UserId,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemberBalance {
    pub user_id: UserId,
    pub name: Option<String>,
    pub net: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonthlyStatement {
    pub year: i32,
    pub month: u32,
    pub currency: Option<String>,
    pub balances: Vec<MemberBalance>,
    pub transfers: Vec<Transfer>,
}

/// Nets smaller than one cent count as settled.
fn is_settled(amount: Decimal) -> bool {
    amount.abs() < Decimal::new(1, 2)
}

fn record_debt(pairs: &mut HashMap<UserPair, Decimal>, debtor: &str, creditor: &str, amount: Decimal) {
    let mut pair = UserPair {
        user1: creditor.to_string(),
        user2: debtor.to_string(),
    };
    let mut amount = amount;

    // Alphabetical order keeps every debt between the same two people in one entry
    if pair.user1 > pair.user2 {
        swap(&mut pair.user1, &mut pair.user2);
        amount = -amount;
    }

    pairs
        .entry(pair)
        .and_modify(|balance| *balance += amount)
        .or_insert(amount);
}

// The transfers that will be made if no simplification happens
fn get_naive_transfers(range: &MonthRange, expenses: &[Expense], payments: &[AdvancePayment]) -> Vec<Transfer> {
    // Positive entries mean user2 owes user1
    let mut balances_between_people: HashMap<UserPair, Decimal> = HashMap::new();

    for expense in expenses.iter().filter(|e| range.contains(e.expense_date)) {
        for line in &expense.split_between {
            if line.paid || line.user_id == expense.payer_id {
                continue;
            }
            record_debt(&mut balances_between_people, &line.user_id, &expense.payer_id, line.amount);
        }
    }
    for payment in payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Approved && range.contains(p.payment_date))
    {
        // Paying in advance is a debt running the other way
        record_debt(&mut balances_between_people, &payment.paid_to, &payment.user_id, payment.amount);
    }

    let mut transfers: Vec<Transfer> = balances_between_people
        .into_iter()
        .filter(|(_, balance)| !is_settled(*balance))
        .map(|(people_pair, balance)| {
            let mut from = people_pair.user2;
            let mut to = people_pair.user1;
            if balance < Decimal::ZERO {
                swap(&mut from, &mut to);
            }
            Transfer {
                from,
                to,
                amount: balance.abs(),
            }
        })
        .collect();
    transfers.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
    transfers
}

// Largest balance last, ties broken by id so the result is reproducible
fn sort_for_pop(people: &mut [PersonalBalance]) {
    people.sort_by(|a, b| a.balance.cmp(&b.balance).then_with(|| b.id.cmp(&a.id)));
}

// Greedy matching of the largest debtor with the largest creditor
fn get_simplified_transfers(
    mut debtors: Vec<PersonalBalance>,
    mut creditors: Vec<PersonalBalance>,
) -> CoreResult<Vec<Transfer>> {
    let mut transfers = Vec::new();

    loop {
        sort_for_pop(&mut debtors);
        sort_for_pop(&mut creditors);
        let (debtor, creditor) = match (debtors.last_mut(), creditors.last_mut()) {
            (Some(debtor), Some(creditor)) => (debtor, creditor),
            _ => break,
        };

        let amount = debtor.balance.min(creditor.balance);
        transfers.push(Transfer {
            from: debtor.id.clone(),
            to: creditor.id.clone(),
            amount,
        });
        debtor.balance -= amount;
        creditor.balance -= amount;

        if is_settled(debtor.balance) {
            debtors.pop();
        }
        if is_settled(creditor.balance) {
            creditors.pop();
        }
    }

    let leftover: Decimal = debtors.iter().map(|p| p.balance).sum::<Decimal>()
        - creditors.iter().map(|p| p.balance).sum::<Decimal>();
    if !debtors.is_empty() || !creditors.is_empty() {
        return Err(CoreError::Inconsistent { discrepancy: leftover });
    }
    Ok(transfers)
}

/// Transfers that bring every net in `balance` back to zero.
pub fn settle(balance: &Balance) -> CoreResult<Vec<Transfer>> {
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();

    for (id, net) in balance {
        if is_settled(*net) {
            continue;
        }
        let person = PersonalBalance {
            id: id.clone(),
            balance: net.abs(),
        };
        if net.is_sign_positive() {
            debtors.push(person);
        } else {
            creditors.push(person);
        }
    }

    get_simplified_transfers(debtors, creditors)
}

/// Balances and settlement transfers for one month.
pub fn get_statement_for_month(
    range: &MonthRange,
    members: &[Member],
    expenses: &[Expense],
    payments: &[AdvancePayment],
) -> CoreResult<MonthlyStatement> {
    let month_balance = compute_month_balance(range, members, expenses, payments)?;

    let simplified_transfers = settle(&month_balance.balance)?;
    let naive_transfers = get_naive_transfers(range, expenses, payments);

    // The greedy pass is a heuristic, fall back to plain pairwise netting
    // when that happens to need fewer transfers
    let transfers = if naive_transfers.len() < simplified_transfers.len() {
        naive_transfers
    } else {
        simplified_transfers
    };

    let names: HashMap<&str, &str> = members
        .iter()
        .map(|m| (m.id.as_str(), m.name.as_str()))
        .collect();
    let balances = month_balance
        .balance
        .into_iter()
        .map(|(user_id, net)| MemberBalance {
            name: names.get(user_id.as_str()).map(|n| n.to_string()),
            user_id,
            net,
        })
        .collect();

    Ok(MonthlyStatement {
        year: range.year,
        month: range.month,
        currency: month_balance.currency,
        balances,
        transfers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::tests::{date, member};
    use crate::balance::tests::{expense, payment};
    use rust_decimal_macros::dec;

    fn balance(entries: &[(&str, Decimal)]) -> Balance {
        entries.iter().map(|(id, net)| (id.to_string(), *net)).collect()
    }

    fn apply(balance: &Balance, transfers: &[Transfer]) -> Balance {
        let mut result = balance.clone();
        for transfer in transfers {
            *result.get_mut(&transfer.from).unwrap() -= transfer.amount;
            *result.get_mut(&transfer.to).unwrap() += transfer.amount;
        }
        result
    }

    #[test]
    fn single_debt_needs_one_transfer() {
        let transfers = settle(&balance(&[("a", dec!(50)), ("b", dec!(-50))])).unwrap();
        assert_eq!(
            transfers,
            vec![Transfer {
                from: "a".to_string(),
                to: "b".to_string(),
                amount: dec!(50.00),
            }]
        );
    }

    #[test]
    fn settlement_zeroes_every_balance() {
        let nets = balance(&[
            ("ana", dec!(40.10)),
            ("ben", dec!(-25.05)),
            ("cleo", dec!(12.00)),
            ("dan", dec!(-30.00)),
            ("eve", dec!(2.95)),
        ]);
        let transfers = settle(&nets).unwrap();
        assert!(transfers.len() <= 4);
        assert!(apply(&nets, &transfers).values().all(|v| is_settled(*v)));
    }

    #[test]
    fn largest_debtor_pays_largest_creditor_first() {
        let nets = balance(&[("a", dec!(70)), ("b", dec!(30)), ("c", dec!(-60)), ("d", dec!(-40))]);
        let transfers = settle(&nets).unwrap();
        assert_eq!(transfers[0].from, "a");
        assert_eq!(transfers[0].to, "c");
        assert_eq!(transfers[0].amount, dec!(60));
        assert_eq!(transfers.len(), 3);
    }

    #[test]
    fn unbalanced_nets_are_inconsistent() {
        let err = settle(&balance(&[("a", dec!(50)), ("b", dec!(-49))])).unwrap_err();
        match err {
            CoreError::Inconsistent { discrepancy } => assert_eq!(discrepancy, dec!(1)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn settled_group_has_no_transfers() {
        assert!(settle(&balance(&[("a", dec!(0)), ("b", dec!(0))])).unwrap().is_empty());
    }

    #[test]
    fn statement_for_a_month() {
        let members = vec![member("ana"), member("ben"), member("cleo")];
        let range = MonthRange::new(2024, 4).unwrap();
        let expenses = vec![
            expense(
                "ana",
                date(2024, 4, 1),
                &[("ana", dec!(33.34), true), ("ben", dec!(33.33), false), ("cleo", dec!(33.33), false)],
            ),
            expense("ben", date(2024, 4, 10), &[("ben", dec!(20), true), ("cleo", dec!(20), false)]),
        ];
        let payments = vec![payment("cleo", "ana", dec!(10), date(2024, 4, 15), PaymentStatus::Approved)];

        let statement = get_statement_for_month(&range, &members, &expenses, &payments).unwrap();
        let nets: HashMap<_, _> = statement
            .balances
            .iter()
            .map(|b| (b.user_id.as_str(), b.net))
            .collect();
        assert_eq!(nets["ana"], dec!(-56.66));
        assert_eq!(nets["ben"], dec!(13.33));
        assert_eq!(nets["cleo"], dec!(43.33));
        assert_eq!(statement.balances[0].name.as_deref(), Some("ANA"));

        let total_paid: Decimal = statement.transfers.iter().map(|t| t.amount).sum();
        assert_eq!(total_paid, dec!(56.66));
        assert!(statement.transfers.iter().all(|t| t.to == "ana"));
    }

    #[test]
    fn naive_netting_covers_the_same_debts() {
        let range = MonthRange::new(2024, 4).unwrap();
        let expenses = vec![
            expense("ana", date(2024, 4, 1), &[("ana", dec!(10), true), ("ben", dec!(10), false)]),
            expense("ben", date(2024, 4, 2), &[("ben", dec!(4), true), ("ana", dec!(4), false)]),
        ];
        let transfers = get_naive_transfers(&range, &expenses, &[]);
        assert_eq!(
            transfers,
            vec![Transfer {
                from: "ben".to_string(),
                to: "ana".to_string(),
                amount: dec!(6),
            }]
        );
    }
}
