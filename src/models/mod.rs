pub mod appointments;
pub mod audit_logs;
pub mod day_slots;
pub mod notifications;
pub mod users;

pub mod sessions;
