pub mod assert;

use crate::{error::ApiError, DbPool};
use actix_web::web;
use diesel::{r2d2::ConnectionManager, MysqlConnection};
use r2d2::PooledConnection;

pub type DbConn = PooledConnection<ConnectionManager<MysqlConnection>>;

pub fn get_db_conn(pool: &web::Data<DbPool>) -> Result<DbConn, ApiError> {
    pool.get().map_err(ApiError::from)
}

no_arg_sql_function!(
    last_insert_id,
    diesel::sql_types::Unsigned<diesel::sql_types::Bigint>,
    "Represents the MySQL last_insert_id() function"
);
