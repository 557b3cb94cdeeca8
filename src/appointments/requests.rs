use serde::Deserialize;

#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    pub appointment_date: String,
    pub appointment_time: String,
    pub purpose: String,
    pub duration: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub purpose: Option<String>,
    pub duration: Option<i32>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ListAppointmentsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub student_id: Option<u64>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}
