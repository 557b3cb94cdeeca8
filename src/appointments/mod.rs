mod requests;
mod responses;

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;

use crate::{
    audit,
    auth::{self, Identity},
    capacity::{self, Violation},
    database::{assert, get_db_conn, last_insert_id},
    error::ApiError,
    mailer::Mailer,
    models::appointments::{
        Appointment, AppointmentStatus, NewAppointment, UpdateAppointment,
        DEFAULT_DURATION_MINUTES,
    },
    models::users::Role,
    notifications::fanout::{self, AppointmentEvent, AppointmentView, DeliveryStats},
    protocol::{CreatedResponse, MessageResponse},
    utils, DbPool,
};

use self::{requests::*, responses::*};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(list)
        .service(slot_availability)
        .service(create)
        .service(update)
        .service(remove);
}

fn appointment_item(row: Appointment) -> AppointmentItem {
    AppointmentItem {
        id: row.id,
        user_id: row.user_id,
        appointment_date: utils::format_date_str(&row.date),
        appointment_time: utils::format_time_str(&row.time),
        purpose: row.purpose,
        duration: row.duration,
        status: row.status,
        notes: row.notes,
        created_at: row.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        updated_at: row.updated_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

#[get("")]
async fn list(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    query: web::Query<ListAppointmentsQuery>,
) -> Result<HttpResponse, ApiError> {
    use crate::schema::appointments;

    let identity = auth::require_identity(&req, &pool).await?;
    let query = query.into_inner();
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).max(1).min(100);
    let offset = (page - 1) * limit;

    // The extra filters are only honored for clinic staff; everyone else is
    // always scoped to their own appointments.
    let is_staff = identity.role.is_clinic_staff();
    let status_filter = match &query.status {
        Some(s) => Some(
            AppointmentStatus::parse(s)
                .ok_or_else(|| ApiError::validation(vec![format!("unknown status '{}'", s)]))?,
        ),
        None => None,
    };
    let date_from = match &query.date_from {
        Some(s) => Some(utils::parse_date_str(s).map_err(|_| {
            ApiError::validation(vec!["date_from must be formatted as YYYY-MM-DD".to_string()])
        })?),
        None => None,
    };
    let date_to = match &query.date_to {
        Some(s) => Some(utils::parse_date_str(s).map_err(|_| {
            ApiError::validation(vec!["date_to must be formatted as YYYY-MM-DD".to_string()])
        })?),
        None => None,
    };

    let caller_id = identity.user_id;
    let student_id = query.student_id;
    let conn = get_db_conn(&pool)?;
    let rows = web::block(move || -> Result<Vec<Appointment>, ApiError> {
        let mut query = appointments::table.into_boxed();
        if is_staff {
            if let Some(id) = student_id {
                query = query.filter(appointments::user_id.eq(id));
            }
            if let Some(status) = status_filter {
                query = query.filter(appointments::status.eq(status.as_str()));
            }
            if let Some(from) = date_from {
                query = query.filter(appointments::date.ge(from));
            }
            if let Some(to) = date_to {
                query = query.filter(appointments::date.le(to));
            }
        } else {
            query = query.filter(appointments::user_id.eq(caller_id));
        }
        query
            .order((appointments::date.desc(), appointments::time.desc()))
            .offset(offset)
            .limit(limit)
            .load::<Appointment>(&conn)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ListAppointmentsResponse {
        page,
        limit,
        appointments: rows.into_iter().map(appointment_item).collect(),
    }))
}

#[get("/slots/availability/{date}")]
async fn slot_availability(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth::require_identity(&req, &pool).await?;

    let date = utils::parse_date_str(&path.into_inner()).map_err(|_| {
        ApiError::validation(vec!["date must be formatted as YYYY-MM-DD".to_string()])
    })?;

    let conn = get_db_conn(&pool)?;
    let avail = web::block(move || capacity::availability(&conn, date).map_err(ApiError::from))
        .await?;

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        date: utils::format_date_str(&avail.date),
        booked_slots: avail.booked,
        available_slots: avail.available,
        is_fully_booked: avail.is_full,
    }))
}

#[post("")]
async fn create(
    pool: web::Data<DbPool>,
    mailer: web::Data<Mailer>,
    req: HttpRequest,
    body: web::Json<CreateAppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    use crate::schema::appointments;

    let identity = auth::require_identity(&req, &pool).await?;
    if !identity.role.can_book() {
        return Err(ApiError::forbidden(
            "only students, faculty and staff may book appointments",
        ));
    }

    let info = body.into_inner();
    let mut field_errors = Vec::new();
    let purpose = info.purpose.trim().to_string();
    if purpose.is_empty() {
        field_errors.push("purpose is required".to_string());
    }
    let duration = info.duration.unwrap_or(DEFAULT_DURATION_MINUTES);
    if duration <= 0 {
        field_errors.push("duration must be a positive number of minutes".to_string());
    }
    let date = match utils::parse_date_str(&info.appointment_date) {
        Ok(date) => Some(date),
        Err(_) => {
            field_errors.push("appointment_date must be formatted as YYYY-MM-DD".to_string());
            None
        }
    };
    let time = match utils::parse_time_str(&info.appointment_time) {
        Ok(time) => Some(time),
        Err(_) => {
            field_errors.push("appointment_time must be formatted as HH:MM".to_string());
            None
        }
    };
    if !field_errors.is_empty() {
        return Err(ApiError::Validation(field_errors));
    }
    let (date, time) = (date.unwrap(), time.unwrap());
    let notes = info.notes.and_then(|n| {
        let n = n.trim().to_string();
        if n.is_empty() {
            None
        } else {
            Some(n)
        }
    });

    let user_id = identity.user_id;
    let purpose_for_view = purpose.clone();
    let conn = get_db_conn(&pool)?;
    let new_id = web::block(move || -> Result<u64, ApiError> {
        // Report every violated rule at once; the capacity read here is a
        // snapshot, admission is re-decided atomically below.
        let avail = capacity::availability(&conn, date)?;
        let violations = capacity::validate_slot(date, time, &avail);
        if !violations.is_empty() {
            return Err(ApiError::validation(violations));
        }

        conn.transaction(|| {
            if !capacity::reserve_slot(&conn, date)? {
                // Lost the race for the last slot since the snapshot.
                return Err(ApiError::validation(vec![Violation::FullyBooked]));
            }
            diesel::insert_into(appointments::table)
                .values(NewAppointment {
                    user_id,
                    date,
                    time,
                    purpose,
                    duration,
                    status: AppointmentStatus::Scheduled.as_str().to_string(),
                    notes,
                })
                .execute(&conn)?;
            let id = diesel::select(last_insert_id).get_result::<u64>(&conn)?;
            Ok(id)
        })
    })
    .await?;

    let view = AppointmentView {
        id: new_id,
        date,
        time,
        purpose: purpose_for_view,
        status: AppointmentStatus::Scheduled.as_str().to_string(),
    };
    let summary = format!(
        "{} booked appointment {} on {} at {}",
        identity.username,
        new_id,
        utils::format_date_str(&date),
        utils::format_time_str(&time)
    );
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);
    run_fan_out(
        &pool,
        mailer.get_ref(),
        AppointmentEvent::Created,
        view,
        identity.user_id,
        identity,
        "create",
        summary,
        ip,
    )
    .await;

    Ok(HttpResponse::Created().json(CreatedResponse {
        id: new_id,
        message: "appointment scheduled".to_string(),
    }))
}

enum UpdateOutcome {
    Updated(Appointment),
    Cancelled(Appointment),
}

#[put("/{id}")]
async fn update(
    pool: web::Data<DbPool>,
    mailer: web::Data<Mailer>,
    req: HttpRequest,
    path: web::Path<u64>,
    body: web::Json<UpdateAppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    use crate::schema::appointments;

    let identity = auth::require_identity(&req, &pool).await?;
    let id = path.into_inner();
    let info = body.into_inner();

    if info.appointment_date.is_some() {
        return Err(ApiError::validation(vec![
            "the appointment date cannot be changed; cancel and book a new appointment".to_string(),
        ]));
    }
    let status_change = match &info.status {
        Some(s) => Some(
            AppointmentStatus::parse(s)
                .ok_or_else(|| ApiError::validation(vec![format!("unknown status '{}'", s)]))?,
        ),
        None => None,
    };
    let time_change = match &info.appointment_time {
        Some(s) => Some(utils::parse_time_str(s).map_err(|_| {
            ApiError::validation(vec!["appointment_time must be formatted as HH:MM".to_string()])
        })?),
        None => None,
    };
    if let Some(duration) = info.duration {
        if duration <= 0 {
            return Err(ApiError::validation(vec![
                "duration must be a positive number of minutes".to_string(),
            ]));
        }
    }
    let purpose = match info.purpose {
        Some(p) => {
            let p = p.trim().to_string();
            if p.is_empty() {
                return Err(ApiError::validation(vec!["purpose cannot be empty".to_string()]));
            }
            Some(p)
        }
        None => None,
    };
    if status_change.is_none()
        && time_change.is_none()
        && info.duration.is_none()
        && purpose.is_none()
        && info.notes.is_none()
    {
        return Err(ApiError::validation(vec!["no fields to update".to_string()]));
    }

    let actor_id = identity.user_id;
    let is_staff = identity.role.is_clinic_staff();
    let duration = info.duration;
    let notes = info.notes;
    let conn = get_db_conn(&pool)?;
    let outcome = web::block(move || -> Result<UpdateOutcome, ApiError> {
        conn.transaction(|| {
            let appt = assert::appointment(&conn, id)?;
            let is_owner = appt.user_id == actor_id;
            if !is_owner && !is_staff {
                return Err(ApiError::forbidden(
                    "you may only modify your own appointments",
                ));
            }
            let current = AppointmentStatus::parse(&appt.status).ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!(
                    "corrupt status '{}' on appointment {}",
                    appt.status,
                    appt.id
                ))
            })?;

            if let Some(next) = status_change {
                if next == AppointmentStatus::Cancelled {
                    if current.is_terminal() {
                        return Err(ApiError::validation(vec![format!(
                            "a {} appointment cannot be cancelled",
                            current
                        )]));
                    }
                    cancel_row(&conn, &appt)?;
                    return Ok(UpdateOutcome::Cancelled(appt));
                }
                if !is_staff {
                    return Err(ApiError::forbidden(
                        "only clinic staff may change the appointment status",
                    ));
                }
                if !current.can_transition_to(next) {
                    return Err(ApiError::validation(vec![format!(
                        "cannot move an appointment from {} to {}",
                        current, next
                    )]));
                }
            }

            let touches_details =
                time_change.is_some() || duration.is_some() || purpose.is_some();
            if touches_details && !is_staff {
                return Err(ApiError::forbidden(
                    "only clinic staff may modify appointment details",
                ));
            }
            if let Some(time) = time_change {
                if !capacity::within_business_hours(time) {
                    return Err(ApiError::validation(vec![Violation::OutsideHours]));
                }
            }

            let changes = UpdateAppointment {
                time: time_change,
                purpose,
                duration,
                status: status_change.map(|s| s.as_str().to_string()),
                notes,
                updated_at: Some(Utc::now().naive_utc()),
            };
            diesel::update(appointments::table.find(id))
                .set(&changes)
                .execute(&conn)?;
            let updated = appointments::table.find(id).first::<Appointment>(&conn)?;
            Ok(UpdateOutcome::Updated(updated))
        })
    })
    .await?;

    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);
    let (event, appt, action, message, verb) = match outcome {
        UpdateOutcome::Updated(appt) => (
            AppointmentEvent::Updated,
            appt,
            "update",
            "appointment updated",
            "updated",
        ),
        UpdateOutcome::Cancelled(appt) => (
            AppointmentEvent::Cancelled,
            appt,
            "cancel",
            "appointment cancelled",
            "cancelled",
        ),
    };
    let view = AppointmentView {
        id: appt.id,
        date: appt.date,
        time: appt.time,
        purpose: appt.purpose.clone(),
        status: match event {
            AppointmentEvent::Cancelled => AppointmentStatus::Cancelled.as_str().to_string(),
            _ => appt.status.clone(),
        },
    };
    let summary = format!("{} {} appointment {}", identity.username, verb, appt.id);
    run_fan_out(
        &pool,
        mailer.get_ref(),
        event,
        view,
        appt.user_id,
        identity,
        action,
        summary,
        ip,
    )
    .await;

    Ok(HttpResponse::Ok().json(MessageResponse::new(message)))
}

#[delete("/{id}")]
async fn remove(
    pool: web::Data<DbPool>,
    mailer: web::Data<Mailer>,
    req: HttpRequest,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let identity = auth::require_identity(&req, &pool).await?;
    let id = path.into_inner();

    let actor_id = identity.user_id;
    let role = identity.role;
    let conn = get_db_conn(&pool)?;
    let appt = web::block(move || -> Result<Appointment, ApiError> {
        conn.transaction(|| {
            let appt = assert::appointment(&conn, id)?;
            let is_owner = appt.user_id == actor_id;
            if !is_owner && role != Role::Admin {
                return Err(ApiError::forbidden(
                    "you may only cancel your own appointments",
                ));
            }
            let current = AppointmentStatus::parse(&appt.status).ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!(
                    "corrupt status '{}' on appointment {}",
                    appt.status,
                    appt.id
                ))
            })?;
            if current.is_terminal() {
                return Err(ApiError::validation(vec![format!(
                    "a {} appointment cannot be cancelled",
                    current
                )]));
            }
            cancel_row(&conn, &appt)?;
            Ok(appt)
        })
    })
    .await?;

    let view = AppointmentView {
        id: appt.id,
        date: appt.date,
        time: appt.time,
        purpose: appt.purpose.clone(),
        status: AppointmentStatus::Cancelled.as_str().to_string(),
    };
    let summary = format!("{} cancelled appointment {}", identity.username, appt.id);
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);
    run_fan_out(
        &pool,
        mailer.get_ref(),
        AppointmentEvent::Cancelled,
        view,
        appt.user_id,
        identity,
        "cancel",
        summary,
        ip,
    )
    .await;

    Ok(HttpResponse::Ok().json(MessageResponse::new("appointment cancelled")))
}

/// Cancellation is a hard delete; the released slot goes back to the
/// counter row and the audit trail keeps the history.
fn cancel_row(conn: &MysqlConnection, appt: &Appointment) -> Result<(), ApiError> {
    use crate::schema::appointments;

    diesel::delete(appointments::table.find(appt.id)).execute(conn)?;
    capacity::release_slot(conn, appt.date)?;
    Ok(())
}

/// Runs the fan-out and the audit write after the booking transaction has
/// committed. Everything in here is best-effort: failures are logged, never
/// surfaced, and never roll back the appointment write.
async fn run_fan_out(
    pool: &web::Data<DbPool>,
    mailer: &Mailer,
    event: AppointmentEvent,
    view: AppointmentView,
    owner_id: u64,
    actor: Identity,
    action: &'static str,
    summary: String,
    ip: Option<String>,
) {
    let appointment_id = view.id;
    let conn = match get_db_conn(pool) {
        Ok(conn) => conn,
        Err(err) => {
            log::warn!(
                "fan-out skipped for appointment {}: {:?}",
                appointment_id,
                err
            );
            return;
        }
    };

    let mailer = mailer.clone();
    let result = web::block(move || -> Result<DeliveryStats, ApiError> {
        let stats = fanout::deliver(&conn, &mailer, event, &view, owner_id, actor.user_id);
        let metadata = serde_json::json!({
            "date": utils::format_date_str(&view.date),
            "time": utils::format_time_str(&view.time),
            "status": view.status,
        });
        audit::record(
            &conn,
            actor.user_id,
            actor.role,
            action,
            audit::ENTITY_APPOINTMENT,
            Some(view.id),
            summary,
            ip,
            Some(metadata.to_string()),
        );
        Ok(stats)
    })
    .await;

    match result {
        Ok(stats) => log::info!(
            "appointment {} {}: {} notifications delivered, {} failed, {} mails dispatched, {} failed",
            appointment_id,
            action,
            stats.notifications,
            stats.failures,
            stats.mails_sent,
            stats.mails_failed
        ),
        Err(err) => log::warn!(
            "fan-out for appointment {} failed: {:?}",
            appointment_id,
            err
        ),
    }
}
