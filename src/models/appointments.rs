use crate::schema::appointments;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Lifecycle of a clinic visit. Transitions only move forward;
/// `Cancelled` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Parses a client-supplied status. Case and surrounding whitespace are
    /// ignored, and "pending" is accepted as an intake synonym for
    /// `Scheduled`. Status strings are validated here, once, never at the
    /// individual authorization sites.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" | "pending" => Some(AppointmentStatus::Scheduled),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "in_progress" => Some(AppointmentStatus::InProgress),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    fn rank(self) -> u8 {
        match self {
            AppointmentStatus::Scheduled => 0,
            AppointmentStatus::Confirmed => 1,
            AppointmentStatus::InProgress => 2,
            AppointmentStatus::Completed => 3,
            AppointmentStatus::Cancelled => 4,
        }
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        if self == next || self.is_terminal() {
            return false;
        }
        match next {
            AppointmentStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_DURATION_MINUTES: i32 = 30;

#[derive(Queryable, Clone)]
pub struct Appointment {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub purpose: String,
    pub duration: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "appointments"]
pub struct NewAppointment {
    pub user_id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub purpose: String,
    pub duration: i32,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(AsChangeset, Default)]
#[table_name = "appointments"]
pub struct UpdateAppointment {
    pub time: Option<NaiveTime>,
    pub purpose: Option<String>,
    pub duration: Option<i32>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_pending_as_scheduled() {
        assert_eq!(
            AppointmentStatus::parse("pending"),
            Some(AppointmentStatus::Scheduled)
        );
        assert_eq!(
            AppointmentStatus::parse("scheduled"),
            Some(AppointmentStatus::Scheduled)
        );
    }

    #[test]
    fn parse_ignores_case_and_whitespace() {
        assert_eq!(
            AppointmentStatus::parse("  Confirmed "),
            Some(AppointmentStatus::Confirmed)
        );
        assert_eq!(
            AppointmentStatus::parse("IN_PROGRESS"),
            Some(AppointmentStatus::InProgress)
        );
        assert_eq!(AppointmentStatus::parse("done"), None);
    }

    #[test]
    fn transitions_move_forward_only() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Confirmed));
        assert!(Scheduled.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(!Confirmed.can_transition_to(Scheduled));
        assert!(!InProgress.can_transition_to(Confirmed));
        assert!(!Scheduled.can_transition_to(Scheduled));
    }

    #[test]
    fn cancelled_reachable_from_any_non_terminal_state() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        use AppointmentStatus::*;
        for next in [Scheduled, Confirmed, InProgress, Completed, Cancelled].iter() {
            assert!(!Completed.can_transition_to(*next));
            assert!(!Cancelled.can_transition_to(*next));
        }
    }
}
