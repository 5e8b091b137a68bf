use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{Role, User};
use crate::error::AuthError;

/// The authenticated caller. Only the session extractor builds one from a
/// verified token, so holding an `Identity` means authentication already ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}

/// The roles permitted to run an operation.
#[derive(Debug, Clone, Copy)]
pub struct RoleGate {
    permitted: &'static [Role],
}

pub const TEACHER_ONLY: RoleGate = RoleGate::new(&[Role::Teacher]);
pub const STUDENT_ONLY: RoleGate = RoleGate::new(&[Role::Student]);
pub const ANY_ROLE: RoleGate = RoleGate::new(&[Role::Teacher, Role::Student]);

impl RoleGate {
    pub const fn new(permitted: &'static [Role]) -> Self {
        assert!(!permitted.is_empty(), "a role gate needs at least one role");
        Self { permitted }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.permitted.contains(&role)
    }

    pub fn check(&self, identity: &Identity) -> Result<(), AuthError> {
        if self.permits(identity.role) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %identity.user_id,
                role = %identity.role,
                "role not permitted for operation"
            );
            Err(AuthError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "a@b.com".into(),
            full_name: "Ada".into(),
            role,
        }
    }

    #[test]
    fn test_teacher_only_gate() {
        assert!(TEACHER_ONLY.check(&identity(Role::Teacher)).is_ok());
        assert!(matches!(
            TEACHER_ONLY.check(&identity(Role::Student)),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn test_student_only_gate() {
        assert!(STUDENT_ONLY.check(&identity(Role::Student)).is_ok());
        assert!(STUDENT_ONLY.check(&identity(Role::Teacher)).is_err());
    }

    #[test]
    fn test_any_role_gate() {
        for role in [Role::Teacher, Role::Student] {
            assert!(ANY_ROLE.check(&identity(role)).is_ok());
        }
    }
}
