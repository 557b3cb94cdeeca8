use chrono::{NaiveDate, NaiveTime, ParseError};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const TIME_FMT_WITH_SECS: &str = "%H:%M:%S";

pub fn parse_date_str(s: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT)
}

pub fn parse_time_str(s: &str) -> Result<NaiveTime, ParseError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_FMT).or_else(|_| NaiveTime::parse_from_str(s, TIME_FMT_WITH_SECS))
}

pub fn format_date_str(date: &NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

pub fn format_time_str(time: &NaiveTime) -> String {
    time.format(TIME_FMT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        let date = parse_date_str("2024-06-10").unwrap();
        assert_eq!(date, NaiveDate::from_ymd(2024, 6, 10));
        assert!(parse_date_str("10/06/2024").is_err());
        assert!(parse_date_str("2024-13-01").is_err());
    }

    #[test]
    fn parses_times_with_and_without_seconds() {
        assert_eq!(
            parse_time_str("09:00").unwrap(),
            NaiveTime::from_hms(9, 0, 0)
        );
        assert_eq!(
            parse_time_str(" 18:00:00 ").unwrap(),
            NaiveTime::from_hms(18, 0, 0)
        );
        assert!(parse_time_str("9am").is_err());
    }

    #[test]
    fn formatting_round_trips_the_wire_format() {
        assert_eq!(
            format_date_str(&NaiveDate::from_ymd(2024, 6, 10)),
            "2024-06-10"
        );
        assert_eq!(format_time_str(&NaiveTime::from_hms(7, 30, 0)), "07:30");
    }
}
