//! Daily slot capacity: the oracle that reports booked/available counts for
//! a calendar date, the booking-rule validator, and the atomic reserve and
//! release operations on the per-date counter row.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use diesel::prelude::*;

use crate::models::{appointments::AppointmentStatus, day_slots::NewDaySlot};

pub const DAILY_SLOT_CAPACITY: i32 = 50;

const OPEN_MINUTES: u32 = 7 * 60;
const CLOSE_MINUTES: u32 = 18 * 60;

/// Snapshot of a date's capacity. Only valid at read time; admission is
/// decided by `reserve_slot` inside the booking transaction, never by this
/// snapshot alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAvailability {
    pub date: NaiveDate,
    pub booked: i64,
    pub available: i64,
    pub is_full: bool,
}

impl SlotAvailability {
    pub fn from_booked(date: NaiveDate, booked: i64) -> Self {
        let capacity = i64::from(DAILY_SLOT_CAPACITY);
        SlotAvailability {
            date,
            booked,
            available: (capacity - booked).max(0),
            is_full: booked >= capacity,
        }
    }
}

/// Booking-rule violations. All rules are evaluated independently so a
/// response can itemize every violated rule at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Weekend,
    OutsideHours,
    FullyBooked,
}

impl Violation {
    pub fn message(self) -> &'static str {
        match self {
            Violation::Weekend => "appointments must fall on a weekday (Monday to Friday)",
            Violation::OutsideHours => "appointments must be between 07:00 and 18:00",
            Violation::FullyBooked => "the selected date is fully booked",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

pub fn within_business_hours(time: NaiveTime) -> bool {
    let minutes = time.hour() * 60 + time.minute();
    minutes >= OPEN_MINUTES && minutes <= CLOSE_MINUTES
}

/// Checks a candidate slot against the weekday, business-hours and capacity
/// rules. Comparisons are numeric (day-of-week, minutes since midnight), so
/// no locale-dependent string comparison can sneak in. Pure aside from the
/// capacity snapshot the caller supplies.
pub fn validate_slot(
    date: NaiveDate,
    time: NaiveTime,
    availability: &SlotAvailability,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        violations.push(Violation::Weekend);
    }

    if !within_business_hours(time) {
        violations.push(Violation::OutsideHours);
    }

    if availability.is_full {
        violations.push(Violation::FullyBooked);
    }

    violations
}

/// Counts non-cancelled appointments on `date`. No side effects.
pub fn booked_count(conn: &MysqlConnection, date: NaiveDate) -> QueryResult<i64> {
    use crate::schema::appointments;

    appointments::table
        .filter(appointments::date.eq(date))
        .filter(appointments::status.ne(AppointmentStatus::Cancelled.as_str()))
        .count()
        .get_result(conn)
}

pub fn availability(conn: &MysqlConnection, date: NaiveDate) -> QueryResult<SlotAvailability> {
    let booked = booked_count(conn, date)?;
    Ok(SlotAvailability::from_booked(date, booked))
}

/// Atomically claims one slot for `date`. Must run inside the booking
/// transaction: the conditional increment takes a row lock on the counter
/// row, so two concurrent creates at `booked == 49` serialize here and only
/// one sees an affected row.
pub fn reserve_slot(conn: &MysqlConnection, date: NaiveDate) -> QueryResult<bool> {
    use crate::schema::day_slots;

    diesel::insert_or_ignore_into(day_slots::table)
        .values(NewDaySlot { date, booked: 0 })
        .execute(conn)?;

    let updated = diesel::update(
        day_slots::table
            .filter(day_slots::date.eq(date))
            .filter(day_slots::booked.lt(DAILY_SLOT_CAPACITY)),
    )
    .set(day_slots::booked.eq(day_slots::booked + 1))
    .execute(conn)?;

    Ok(updated == 1)
}

/// Returns a previously reserved slot, e.g. on cancellation.
pub fn release_slot(conn: &MysqlConnection, date: NaiveDate) -> QueryResult<()> {
    use crate::schema::day_slots;

    diesel::update(
        day_slots::table
            .filter(day_slots::date.eq(date))
            .filter(day_slots::booked.gt(0)),
    )
    .set(day_slots::booked.eq(day_slots::booked - 1))
    .execute(conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-06-10 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd(2024, 6, 10)
    }

    fn open_day() -> SlotAvailability {
        SlotAvailability::from_booked(monday(), 0)
    }

    #[test]
    fn booked_plus_available_equals_capacity() {
        for booked in 0..=55 {
            let avail = SlotAvailability::from_booked(monday(), booked);
            if booked <= 50 {
                assert_eq!(avail.booked + avail.available, 50);
            }
            if booked >= 50 {
                assert_eq!(avail.available, 0);
                assert!(avail.is_full);
            } else {
                assert!(!avail.is_full);
            }
        }
    }

    #[test]
    fn snapshot_is_idempotent() {
        let a = SlotAvailability::from_booked(monday(), 17);
        let b = SlotAvailability::from_booked(monday(), 17);
        assert_eq!(a, b);
    }

    #[test]
    fn weekend_violation_iff_saturday_or_sunday() {
        // 2024-06-10 through 2024-06-16: Monday through Sunday.
        for day in 10..=16 {
            let date = NaiveDate::from_ymd(2024, 6, day);
            let is_weekend = day == 15 || day == 16;
            for time in [NaiveTime::from_hms(9, 0, 0), NaiveTime::from_hms(23, 0, 0)].iter() {
                let violations =
                    validate_slot(date, *time, &SlotAvailability::from_booked(date, 0));
                assert_eq!(
                    violations.contains(&Violation::Weekend),
                    is_weekend,
                    "date {}",
                    date
                );
            }
        }
    }

    #[test]
    fn hours_violation_exactly_outside_the_inclusive_window() {
        let cases = [
            (6, 59, true),
            (7, 0, false),
            (12, 30, false),
            (18, 0, false),
            (18, 1, true),
            (19, 30, true),
        ];
        for (hour, minute, expect) in cases.iter() {
            let violations = validate_slot(
                monday(),
                NaiveTime::from_hms(*hour, *minute, 0),
                &open_day(),
            );
            assert_eq!(
                violations.contains(&Violation::OutsideHours),
                *expect,
                "{}:{:02}",
                hour,
                minute
            );
        }
    }

    #[test]
    fn admissible_monday_morning_has_no_violations() {
        let violations = validate_slot(monday(), NaiveTime::from_hms(9, 0, 0), &open_day());
        assert!(violations.is_empty());
    }

    #[test]
    fn saturday_reports_exactly_one_weekday_violation() {
        let saturday = NaiveDate::from_ymd(2024, 6, 15);
        let violations = validate_slot(
            saturday,
            NaiveTime::from_hms(10, 0, 0),
            &SlotAvailability::from_booked(saturday, 0),
        );
        assert_eq!(violations, vec![Violation::Weekend]);
    }

    #[test]
    fn late_evening_reports_exactly_one_hours_violation() {
        let violations = validate_slot(monday(), NaiveTime::from_hms(19, 30, 0), &open_day());
        assert_eq!(violations, vec![Violation::OutsideHours]);
    }

    #[test]
    fn full_date_reports_exactly_one_capacity_violation() {
        let full = SlotAvailability::from_booked(monday(), 50);
        assert_eq!(full.available, 0);
        assert!(full.is_full);
        let violations = validate_slot(monday(), NaiveTime::from_hms(9, 0, 0), &full);
        assert_eq!(violations, vec![Violation::FullyBooked]);
    }

    #[test]
    fn all_violations_are_reported_together() {
        let saturday = NaiveDate::from_ymd(2024, 6, 15);
        let violations = validate_slot(
            saturday,
            NaiveTime::from_hms(19, 30, 0),
            &SlotAvailability::from_booked(saturday, 50),
        );
        assert_eq!(
            violations,
            vec![
                Violation::Weekend,
                Violation::OutsideHours,
                Violation::FullyBooked
            ]
        );
    }
}
