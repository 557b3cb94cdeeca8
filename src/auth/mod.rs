mod requests;
mod responses;

use actix_web::{http::header, post, web, HttpRequest, HttpResponse};
use blake2::{Blake2b, Digest};
use chrono::Utc;
use diesel::prelude::*;

use crate::{
    audit,
    database::{assert, get_db_conn},
    error::ApiError,
    models::{sessions::SessionData, users::Role, users::UserData},
    DbPool,
};

use self::{requests::*, responses::*};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(login).service(logout);
}

const SESSION_TTL_SECS: i64 = 3600;

/// Resolved caller. Built once per request from the session token; role and
/// active status are validated here so handlers only deal with the enum.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: u64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

fn bearer_token(req: &HttpRequest) -> Result<String, ApiError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing authorization token"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("malformed authorization header"))?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing authorization token"));
    }
    Ok(token.to_string())
}

fn parse_role(user: &UserData) -> Result<Role, ApiError> {
    Role::parse(&user.role).ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!(
            "unrecognized role '{}' for user {}",
            user.role,
            user.id
        ))
    })
}

pub async fn require_identity(
    req: &HttpRequest,
    pool: &web::Data<DbPool>,
) -> Result<Identity, ApiError> {
    use crate::schema::sessions;

    let token = bearer_token(req)?;
    let conn = get_db_conn(pool)?;

    let identity = web::block(move || -> Result<Identity, ApiError> {
        let session = sessions::table
            .find(&token)
            .first::<SessionData>(&conn)
            .optional()?
            .ok_or_else(|| ApiError::unauthorized("not logged in"))?;

        let age = Utc::now().naive_utc().signed_duration_since(session.login_time);
        if age.num_seconds() > SESSION_TTL_SECS {
            return Err(ApiError::unauthorized("session expired"));
        }

        let user = assert::active_user(&conn, session.user_id)?;
        let role = parse_role(&user)?;
        Ok(Identity {
            user_id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            role,
        })
    })
    .await?;

    Ok(identity)
}

#[post("/login")]
async fn login(
    pool: web::Data<DbPool>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    use crate::schema::{sessions, users};

    let info = body.into_inner();
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);
    let conn = get_db_conn(&pool)?;

    let token = web::block(move || -> Result<String, ApiError> {
        let user = users::table
            .filter(users::username.eq(&info.username))
            .first::<UserData>(&conn)
            .optional()?
            .ok_or_else(|| ApiError::unauthorized("invalid username or password"))?;

        let digest = format!("{:x}", Blake2b::digest(info.password.as_bytes()));
        if user.password != digest {
            return Err(ApiError::unauthorized("invalid username or password"));
        }
        if !user.is_active {
            return Err(ApiError::unauthorized("account disabled"));
        }
        let role = parse_role(&user)?;

        let token = format!(
            "{:x}",
            Blake2b::digest(format!("{}:{}", user.username, Utc::now().timestamp_nanos()).as_bytes())
        );
        let session = SessionData {
            token: token.clone(),
            user_id: user.id,
            login_time: Utc::now().naive_utc(),
        };
        diesel::insert_into(sessions::table)
            .values(session)
            .execute(&conn)?;

        audit::record(
            &conn,
            user.id,
            role,
            "login",
            audit::ENTITY_SESSION,
            None,
            format!("user {} logged in", user.username),
            ip,
            None,
        );

        Ok(token)
    })
    .await?;

    Ok(HttpResponse::Ok().json(LoginResponse { token }))
}

#[post("/logout")]
async fn logout(pool: web::Data<DbPool>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    use crate::schema::sessions;

    let token = bearer_token(&req)?;
    let conn = get_db_conn(&pool)?;
    web::block(move || -> Result<(), ApiError> {
        diesel::delete(sessions::table.find(&token)).execute(&conn)?;
        Ok(())
    })
    .await?;

    Ok(HttpResponse::Ok().json(crate::protocol::MessageResponse::new("logged out")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_prefix_is_optional() {
        let req = TestRequest::default()
            .header("Authorization", "Bearer abc123")
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc123");

        let req = TestRequest::default()
            .header("Authorization", "abc123")
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc123");
    }

    #[test]
    fn missing_or_empty_header_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            bearer_token(&req),
            Err(ApiError::Unauthorized(_))
        ));

        let req = TestRequest::default()
            .header("Authorization", "Bearer ")
            .to_http_request();
        assert!(matches!(
            bearer_token(&req),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
