use crate::schema::notifications;
use chrono::NaiveDateTime;

pub const KIND_APPOINTMENT: &str = "appointment";

pub const PRIORITY_NORMAL: &str = "normal";
pub const PRIORITY_HIGH: &str = "high";

#[derive(Queryable)]
pub struct Notification {
    pub id: u64,
    pub recipient_id: u64,
    pub sender_id: Option<u64>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub appointment_id: Option<u64>,
    pub is_read: bool,
    pub priority: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[table_name = "notifications"]
pub struct NewNotification {
    pub recipient_id: u64,
    pub sender_id: Option<u64>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub appointment_id: Option<u64>,
    pub is_read: bool,
    pub priority: String,
}
