use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::schemas::{new_id, AvailabilityRecord, Member, OrgId, UserId};

impl AvailabilityRecord {
    pub fn new(
        org_id: OrgId,
        user_id: UserId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        note: Option<String>,
    ) -> CoreResult<Self> {
        if end_date < start_date {
            return Err(CoreError::Validation(format!(
                "away period ends ({end_date}) before it starts ({start_date})"
            )));
        }
        Ok(AvailabilityRecord {
            id: new_id(),
            org_id,
            user_id,
            start_date,
            end_date,
            note,
        })
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A member is away on `date` if any of their records covers it, bounds included.
pub fn is_available(records: &[AvailabilityRecord], user_id: &str, date: NaiveDate) -> bool {
    !records
        .iter()
        .any(|record| record.user_id == user_id && record.covers(date))
}

/// Members not away on `date`, in the order given. An empty result is not an
/// error; callers report it as a warning.
pub fn available_members<'a>(
    records: &[AvailabilityRecord],
    date: NaiveDate,
    all_members: &'a [Member],
) -> Vec<&'a Member> {
    all_members
        .iter()
        .filter(|member| is_available(records, &member.id, date))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schemas::Role;
    use chrono::Utc;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn member(id: &str) -> Member {
        Member {
            id: id.to_string(),
            org_id: "flat".to_string(),
            name: id.to_uppercase(),
            email: format!("{id}@example.org"),
            role: Role::Member,
            disabled: false,
            joined_at: Utc::now(),
        }
    }

    fn away(user: &str, start: NaiveDate, end: NaiveDate) -> AvailabilityRecord {
        AvailabilityRecord::new("flat".into(), user.into(), start, end, None).unwrap()
    }

    #[test]
    fn away_period_is_inclusive_on_both_ends() {
        let records = vec![away("ana", date(2024, 3, 10), date(2024, 3, 15))];

        assert!(is_available(&records, "ana", date(2024, 3, 9)));
        for day in 10..=15 {
            assert!(!is_available(&records, "ana", date(2024, 3, day)), "day {day}");
        }
        assert!(is_available(&records, "ana", date(2024, 3, 16)));
    }

    #[test]
    fn records_of_other_members_are_ignored() {
        let records = vec![away("ana", date(2024, 3, 10), date(2024, 3, 15))];
        assert!(is_available(&records, "ben", date(2024, 3, 12)));
    }

    #[test]
    fn single_day_record_is_allowed() {
        let record = away("ana", date(2024, 1, 1), date(2024, 1, 1));
        assert!(record.covers(date(2024, 1, 1)));
    }

    #[test]
    fn rejects_end_before_start() {
        let err = AvailabilityRecord::new(
            "flat".into(),
            "ana".into(),
            date(2024, 3, 15),
            date(2024, 3, 10),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn filters_members_who_are_away() {
        let members = vec![member("ana"), member("ben"), member("cleo")];
        let records = vec![
            away("ben", date(2024, 5, 1), date(2024, 5, 31)),
            away("cleo", date(2024, 6, 1), date(2024, 6, 2)),
        ];

        let ids: Vec<_> = available_members(&records, date(2024, 5, 20), &members)
            .into_iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ana", "cleo"]);
    }

    #[test]
    fn everybody_away_yields_empty_list() {
        let members = vec![member("ana")];
        let records = vec![away("ana", date(2024, 5, 1), date(2024, 5, 31))];
        assert!(available_members(&records, date(2024, 5, 2), &members).is_empty());
    }
}
