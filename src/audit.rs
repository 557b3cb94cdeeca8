use diesel::prelude::*;

use crate::models::{audit_logs::NewAuditLog, users::Role};

pub const ENTITY_APPOINTMENT: &str = "appointment";
pub const ENTITY_SESSION: &str = "session";

/// Appends one audit row. Failures are logged and swallowed: the audit
/// trail must never abort or roll back the operation it records.
pub fn record(
    conn: &MysqlConnection,
    actor_id: u64,
    actor_role: Role,
    action: &str,
    entity_type: &str,
    entity_id: Option<u64>,
    description: String,
    ip_address: Option<String>,
    metadata: Option<String>,
) {
    use crate::schema::audit_logs;

    let row = NewAuditLog {
        user_id: actor_id,
        user_role: actor_role.as_str().to_string(),
        action: action.to_string(),
        entity_type: entity_type.to_string(),
        entity_id,
        description,
        ip_address,
        metadata,
    };

    if let Err(err) = diesel::insert_into(audit_logs::table).values(row).execute(conn) {
        log::warn!(
            "audit write failed for {} {} by user {}: {}",
            action,
            entity_type,
            actor_id,
            err
        );
    }
}
