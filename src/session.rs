use serde::Serialize;

use crate::credentials::CredentialStore;
use crate::error::AuthError;
use crate::models::{AttendanceTable, Role};

/// Request-scoped identity handed to each command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub username: String,
    pub role: Option<Role>,
    pub authenticated: bool,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            username: String::new(),
            role: None,
            authenticated: false,
        }
    }

    /// Checks the credentials and, for students, that the roll number appears
    /// in the attendance roster. A missing roster lets the student in.
    pub fn login(
        store: &CredentialStore,
        username: &str,
        password: &str,
        roster: Option<&AttendanceTable>,
    ) -> Result<Self, AuthError> {
        let username = username.trim();
        let role = store
            .check_login(username, password)?
            .ok_or(AuthError::InvalidCredentials)?;

        if role == Role::Student {
            match roster {
                Some(table) if table.find_student(username).is_none() => {
                    tracing::warn!(username, "student roll number not in attendance records");
                    return Err(AuthError::UnknownRoll(username.to_string()));
                }
                Some(_) => {}
                None => tracing::warn!("no attendance roster available; skipping roll check"),
            }
        }

        tracing::info!(username, role = %role, "login succeeded");
        Ok(Self {
            username: username.to_string(),
            role: Some(role),
            authenticated: true,
        })
    }

    pub fn require(&self, role: Role) -> Result<(), AuthError> {
        if self.authenticated && self.role == Some(role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden { role: role.as_str() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::temp_dir;

    fn roster() -> AttendanceTable {
        AttendanceTable {
            columns: vec!["Roll.No".to_string(), "Percent".to_string()],
            rows: vec![vec!["23E51A6601".to_string(), "80".to_string()]],
        }
    }

    #[test]
    fn student_must_be_on_roster() {
        let dir = temp_dir("attendance-session-roster");
        let store = CredentialStore::new(dir.join("users.csv"));
        store.register("23E51A6601", "pw", Role::Student).expect("register");
        store.register("23E51A6699", "pw", Role::Student).expect("register");

        let session = Session::login(&store, "23E51A6601", "pw", Some(&roster())).expect("login");
        assert!(session.authenticated);
        assert_eq!(session.role, Some(Role::Student));
        assert!(session.require(Role::Student).is_ok());
        assert!(session.require(Role::Faculty).is_err());

        let err = Session::login(&store, "23E51A6699", "pw", Some(&roster())).unwrap_err();
        assert!(matches!(err, AuthError::UnknownRoll(_)));

        assert!(Session::login(&store, "23E51A6699", "pw", None).is_ok());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn faculty_skips_roster_and_bad_password_fails() {
        let dir = temp_dir("attendance-session-faculty");
        let store = CredentialStore::new(dir.join("users.csv"));
        store.register("prof", "pw", Role::Faculty).expect("register");

        let session = Session::login(&store, "prof", "pw", Some(&roster())).expect("login");
        assert!(session.require(Role::Faculty).is_ok());

        let err = Session::login(&store, "prof", "nope", None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn anonymous_has_no_access() {
        assert!(Session::anonymous().require(Role::Faculty).is_err());
    }
}
