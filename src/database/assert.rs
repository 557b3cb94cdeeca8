use diesel::prelude::*;

use crate::{
    error::ApiError,
    models::{appointments::Appointment, users::UserData},
};

/// Fetches an appointment or fails with 404.
pub fn appointment(conn: &MysqlConnection, id: u64) -> Result<Appointment, ApiError> {
    use crate::schema::appointments;

    appointments::table
        .find(id)
        .first::<Appointment>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("no such appointment"))
}

/// Fetches a user and requires the account to be active.
pub fn active_user(conn: &MysqlConnection, id: u64) -> Result<UserData, ApiError> {
    use crate::schema::users;

    let user = users::table
        .find(id)
        .first::<UserData>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("no such user"))?;
    if !user.is_active {
        return Err(ApiError::forbidden("account disabled"));
    }
    Ok(user)
}
