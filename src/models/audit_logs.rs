use crate::schema::audit_logs;

/// Append-only. Audit rows are written once and never read back by the API,
/// so only the insertable side is modelled.
#[derive(Insertable)]
#[table_name = "audit_logs"]
pub struct NewAuditLog {
    pub user_id: u64,
    pub user_role: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<u64>,
    pub description: String,
    pub ip_address: Option<String>,
    pub metadata: Option<String>,
}
