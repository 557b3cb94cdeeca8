use serde::Serialize;

#[derive(Serialize)]
pub struct AppointmentItem {
    pub id: u64,
    pub user_id: u64,
    pub appointment_date: String,
    pub appointment_time: String,
    pub purpose: String,
    pub duration: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct ListAppointmentsResponse {
    pub page: i64,
    pub limit: i64,
    pub appointments: Vec<AppointmentItem>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub date: String,
    pub booked_slots: i64,
    pub available_slots: i64,
    pub is_fully_booked: bool,
}
