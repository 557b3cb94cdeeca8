pub mod fanout;
mod responses;

use actix_web::{delete, get, put, web, HttpRequest, HttpResponse};
use diesel::prelude::*;
use serde::Deserialize;

use crate::{
    auth,
    database::get_db_conn,
    error::ApiError,
    models::notifications::Notification,
    protocol::MessageResponse,
    DbPool,
};

use self::responses::*;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(list).service(mark_read).service(remove);
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[get("")]
async fn list(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    use crate::schema::notifications;

    let identity = auth::require_identity(&req, &pool).await?;
    let query = query.into_inner();
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).max(1).min(100);
    let offset = (page - 1) * limit;

    let recipient_id = identity.user_id;
    let conn = get_db_conn(&pool)?;
    let rows = web::block(move || -> Result<Vec<Notification>, ApiError> {
        notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .order(notifications::created_at.desc())
            .offset(offset)
            .limit(limit)
            .load::<Notification>(&conn)
            .map_err(ApiError::from)
    })
    .await?;

    let items = rows
        .into_iter()
        .map(|row| NotificationItem {
            id: row.id,
            sender_id: row.sender_id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            appointment_id: row.appointment_id,
            is_read: row.is_read,
            priority: row.priority,
            created_at: row.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(ListNotificationsResponse {
        page,
        limit,
        notifications: items,
    }))
}

#[put("/{id}/read")]
async fn mark_read(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    use crate::schema::notifications;

    let identity = auth::require_identity(&req, &pool).await?;
    let id = path.into_inner();
    let recipient_id = identity.user_id;

    let conn = get_db_conn(&pool)?;
    web::block(move || -> Result<(), ApiError> {
        let updated = diesel::update(
            notifications::table
                .find(id)
                .filter(notifications::recipient_id.eq(recipient_id)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&conn)?;
        if updated == 0 {
            return Err(ApiError::not_found("no such notification"));
        }
        Ok(())
    })
    .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("notification marked as read")))
}

#[delete("/{id}")]
async fn remove(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    use crate::schema::notifications;

    let identity = auth::require_identity(&req, &pool).await?;
    let id = path.into_inner();
    let recipient_id = identity.user_id;

    let conn = get_db_conn(&pool)?;
    web::block(move || -> Result<(), ApiError> {
        let deleted = diesel::delete(
            notifications::table
                .find(id)
                .filter(notifications::recipient_id.eq(recipient_id)),
        )
        .execute(&conn)?;
        if deleted == 0 {
            return Err(ApiError::not_found("no such notification"));
        }
        Ok(())
    })
    .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("notification deleted")))
}
