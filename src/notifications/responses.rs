use serde::Serialize;

#[derive(Serialize)]
pub struct NotificationItem {
    pub id: u64,
    pub sender_id: Option<u64>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub appointment_id: Option<u64>,
    pub is_read: bool,
    pub priority: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ListNotificationsResponse {
    pub page: i64,
    pub limit: i64,
    pub notifications: Vec<NotificationItem>,
}
