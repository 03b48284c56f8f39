use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed-in user as reported by the identity provider.
///
/// Lives in the HTTP session only; passes keep nothing but the email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(display_name: Option<String>, email: Option<String>) -> Self {
        Self {
            display_name,
            email,
        }
    }

    pub fn with_email(email: &str) -> Self {
        Self::new(None, Some(email.to_string()))
    }

    /// Trimmed, lowercased email, or `None` when missing or blank
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
    }

    /// Part of the email before `@`
    pub fn email_local_part(&self) -> Option<String> {
        self.normalized_email()
            .and_then(|e| e.split('@').next().map(str::to_string))
            .filter(|local| !local.is_empty())
    }

    /// Name shown in the page header
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "Signed in".to_string())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }

    pub fn permissions(&self) -> Permissions {
        Permissions {
            can_return: true,
            can_delete: self.is_staff(),
            can_export: *self == Role::Admin,
            can_print_kiosk: self.is_staff(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions a role may take on the dashboard and teacher views.
/// The monitor board ignores these and stays read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_return: bool,
    pub can_delete: bool,
    pub can_export: bool,
    pub can_print_kiosk: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_local_part() {
        let identity = Identity::with_email("  Mrs.Daleo@School.edu ");
        assert_eq!(identity.email_local_part().as_deref(), Some("mrs.daleo"));
    }

    #[test]
    fn test_blank_email_is_absent() {
        let identity = Identity::new(Some("Kiosk".to_string()), Some("   ".to_string()));
        assert!(identity.normalized_email().is_none());
        assert!(identity.email_local_part().is_none());
    }

    #[test]
    fn test_permissions_by_role() {
        assert!(Role::Admin.permissions().can_export);
        assert!(!Role::Teacher.permissions().can_export);
        assert!(Role::Teacher.permissions().can_delete);
        assert!(!Role::Student.permissions().can_delete);
        assert!(Role::Student.permissions().can_return);
    }
}
