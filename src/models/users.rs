use std::fmt;

/// Closed set of account roles. Role strings coming out of the database are
/// parsed exactly once, when a session is resolved; everything downstream
/// matches on the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Faculty,
    Staff,
    MedicalStaff,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "faculty" => Some(Role::Faculty),
            "staff" => Some(Role::Staff),
            "medical_staff" => Some(Role::MedicalStaff),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Staff => "staff",
            Role::MedicalStaff => "medical_staff",
            Role::Admin => "admin",
        }
    }

    /// Self-service roles allowed to book appointments for themselves.
    pub fn can_book(self) -> bool {
        matches!(self, Role::Student | Role::Faculty | Role::Staff)
    }

    /// Roles allowed to manage any appointment, not only their own.
    pub fn is_clinic_staff(self) -> bool {
        matches!(self, Role::MedicalStaff | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Queryable)]
pub struct UserData {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_case_and_whitespace() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("  medical_staff "), Some(Role::MedicalStaff));
        assert_eq!(Role::parse("STUDENT"), Some(Role::Student));
        assert_eq!(Role::parse("janitor"), None);
    }

    #[test]
    fn only_self_service_roles_can_book() {
        assert!(Role::Student.can_book());
        assert!(Role::Faculty.can_book());
        assert!(Role::Staff.can_book());
        assert!(!Role::MedicalStaff.can_book());
        assert!(!Role::Admin.can_book());
    }

    #[test]
    fn clinic_staff_covers_admin_and_medical_staff() {
        assert!(Role::Admin.is_clinic_staff());
        assert!(Role::MedicalStaff.is_clinic_staff());
        assert!(!Role::Student.is_clinic_staff());
    }
}
