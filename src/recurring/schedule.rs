//! Works out which days a template is due on.

use time::{Date, Month};

use super::models::{Frequency, RecurringTemplate};

/// The days in `year`-`month` on which `template` occurs, up to and including `today`.
///
/// - Monthly: the template's day, clamped to the length of the month.
/// - Weekly: every day of the month so far whose weekday matches the
///   template's day (0 = Monday).
/// - Yearly: like monthly, but only in the month the template was created in.
///
/// Days past the end of the month are clamped, never rolled into the next
/// month. A missing or zero day means the 1st (monthly, yearly) or Monday
/// (weekly). For a month before `today`'s month every occurrence in the
/// month is due, for a later month none are.
///
/// The returned dates are in ascending order.
pub fn due_dates(template: &RecurringTemplate, year: i32, month: Month, today: Date) -> Vec<Date> {
    let Some(last_due_day) = last_reached_day(year, month, today) else {
        return Vec::new();
    };

    match template.frequency {
        Frequency::Monthly => clamped_day(template.day, year, month)
            .filter(|date| date.day() <= last_due_day)
            .into_iter()
            .collect(),
        Frequency::Yearly if template.created_at.month() == month => {
            clamped_day(template.day, year, month)
                .filter(|date| date.day() <= last_due_day)
                .into_iter()
                .collect()
        }
        Frequency::Yearly => Vec::new(),
        Frequency::Weekly => {
            let weekday = template.day.unwrap_or(0);

            (1..=last_due_day)
                .filter_map(|day| Date::from_calendar_date(year, month, day).ok())
                .filter(|date| date.weekday().number_days_from_monday() == weekday)
                .collect()
        }
    }
}

/// The last day of `year`-`month` that has been reached by `today`.
fn last_reached_day(year: i32, month: Month, today: Date) -> Option<u8> {
    let this_month = (today.year(), today.month() as u8);
    let target_month = (year, month as u8);

    if target_month == this_month {
        Some(today.day())
    } else if target_month < this_month {
        Some(month.length(year))
    } else {
        None
    }
}

fn clamped_day(day: Option<u8>, year: i32, month: Month) -> Option<Date> {
    let day = match day {
        None | Some(0) => 1,
        Some(day) => day.min(month.length(year)),
    };

    Date::from_calendar_date(year, month, day).ok()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use time::{
        Date, Month, OffsetDateTime,
        macros::{date, datetime},
    };

    use crate::{
        recurring::models::{Frequency, RecurringTemplate},
        transaction::TransactionKind,
    };

    use super::due_dates;

    fn template(frequency: Frequency, day: Option<u8>, created_at: OffsetDateTime) -> RecurringTemplate {
        RecurringTemplate {
            id: 1,
            budget_id: 1,
            category_id: None,
            title: "Test".to_owned(),
            amount: 100.0,
            kind: TransactionKind::Expense,
            frequency,
            day,
            active: true,
            created_at,
        }
    }

    fn due_this_month(template: &RecurringTemplate, today: Date) -> Vec<Date> {
        due_dates(template, today.year(), today.month(), today)
    }

    #[rstest]
    #[case::before_day(Some(15), date!(2025 - 03 - 14), vec![])]
    #[case::on_day(Some(15), date!(2025 - 03 - 15), vec![date!(2025 - 03 - 15)])]
    #[case::after_day(Some(15), date!(2025 - 03 - 20), vec![date!(2025 - 03 - 15)])]
    #[case::clamped_in_30_day_month(Some(31), date!(2025 - 04 - 30), vec![date!(2025 - 04 - 30)])]
    #[case::clamped_not_due_yet(Some(31), date!(2025 - 04 - 29), vec![])]
    #[case::clamped_in_february(Some(30), date!(2025 - 02 - 28), vec![date!(2025 - 02 - 28)])]
    #[case::clamped_in_leap_february(Some(31), date!(2024 - 02 - 29), vec![date!(2024 - 02 - 29)])]
    #[case::missing_day_is_first(None, date!(2025 - 03 - 01), vec![date!(2025 - 03 - 01)])]
    #[case::zero_day_is_first(Some(0), date!(2025 - 03 - 02), vec![date!(2025 - 03 - 01)])]
    fn monthly(#[case] day: Option<u8>, #[case] today: Date, #[case] want: Vec<Date>) {
        let template = template(Frequency::Monthly, day, datetime!(2024-01-10 12:00 UTC));

        assert_eq!(due_this_month(&template, today), want);
    }

    #[test]
    fn weekly_lists_every_matching_weekday_so_far() {
        // 4 = Friday. The Fridays of March 2025 up to the 22nd are the 7th, 14th and 21st.
        let template = template(Frequency::Weekly, Some(4), datetime!(2025-01-10 12:00 UTC));

        let got = due_this_month(&template, date!(2025 - 03 - 22));

        assert_eq!(
            got,
            vec![date!(2025 - 03 - 07), date!(2025 - 03 - 14), date!(2025 - 03 - 21)]
        );
    }

    #[test]
    fn weekly_includes_today() {
        let template = template(Frequency::Weekly, Some(4), datetime!(2025-01-10 12:00 UTC));

        let got = due_this_month(&template, date!(2025 - 03 - 21));

        assert_eq!(got.last(), Some(&date!(2025 - 03 - 21)));
    }

    #[test]
    fn weekly_without_day_is_monday() {
        let template = template(Frequency::Weekly, None, datetime!(2025-01-10 12:00 UTC));

        let got = due_this_month(&template, date!(2025 - 03 - 12));

        assert_eq!(got, vec![date!(2025 - 03 - 03), date!(2025 - 03 - 10)]);
    }

    #[test]
    fn weekly_before_first_occurrence_is_empty() {
        // 6 = Sunday. 1 March 2025 is a Saturday.
        let template = template(Frequency::Weekly, Some(6), datetime!(2025-01-10 12:00 UTC));

        assert!(due_this_month(&template, date!(2025 - 03 - 01)).is_empty());
    }

    #[rstest]
    #[case::creation_month(datetime!(2023-03-02 08:00 UTC), vec![date!(2025 - 03 - 10)])]
    #[case::other_month(datetime!(2023-04-02 08:00 UTC), vec![])]
    fn yearly_only_in_creation_month(#[case] created_at: OffsetDateTime, #[case] want: Vec<Date>) {
        let template = template(Frequency::Yearly, Some(10), created_at);

        assert_eq!(due_this_month(&template, date!(2025 - 03 - 15)), want);
    }

    #[test]
    fn yearly_waits_for_its_day() {
        let template = template(Frequency::Yearly, Some(20), datetime!(2023-03-02 08:00 UTC));

        assert!(due_this_month(&template, date!(2025 - 03 - 15)).is_empty());
    }

    #[test]
    fn past_month_is_fully_due() {
        let template = template(Frequency::Monthly, Some(31), datetime!(2024-01-10 12:00 UTC));

        let got = due_dates(&template, 2025, Month::February, date!(2025 - 03 - 01));

        assert_eq!(got, vec![date!(2025 - 02 - 28)]);
    }

    #[test]
    fn future_month_is_never_due() {
        let template = template(Frequency::Weekly, Some(0), datetime!(2024-01-10 12:00 UTC));

        let got = due_dates(&template, 2025, Month::April, date!(2025 - 03 - 31));

        assert!(got.is_empty());
    }
}
