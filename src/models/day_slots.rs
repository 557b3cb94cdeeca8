use crate::schema::day_slots;
use chrono::NaiveDate;

/// Per-date counter row backing the daily capacity ceiling. The booking
/// transaction reserves a slot with a conditional increment on this row, so
/// the row lock serializes concurrent creates for the same date.
#[derive(Queryable)]
pub struct DaySlot {
    pub date: NaiveDate,
    pub booked: i32,
}

#[derive(Insertable)]
#[table_name = "day_slots"]
pub struct NewDaySlot {
    pub date: NaiveDate,
    pub booked: i32,
}
