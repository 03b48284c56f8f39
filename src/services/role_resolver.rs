use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::models::identity::{normalize_email, Identity, Role};

/// How the teacher view decides which passes belong to a teacher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeacherMatch {
    /// `teacher` field contains the configured name or the email local part
    #[default]
    Substring,
    /// `teacher` field equals the configured name or the full email
    Keyed,
}

/// School roster as it appears under `[school]` in `hallpass.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub admin_emails: Vec<String>,
    /// Teacher email to display name
    #[serde(default)]
    pub teachers: HashMap<String, String>,
    #[serde(default)]
    pub staff_domain: Option<String>,
    #[serde(default)]
    pub teacher_match: TeacherMatch,
}

/// Maps a signed-in identity to a role. Built once from the roster and
/// shared read-only; swap the roster to change who is staff.
#[derive(Debug, Clone, Default)]
pub struct RoleResolver {
    admins: HashSet<String>,
    teachers: HashMap<String, String>,
    staff_domain: Option<String>,
    teacher_match: TeacherMatch,
}

impl RoleResolver {
    pub fn new(config: RosterConfig) -> Self {
        let admins = config
            .admin_emails
            .iter()
            .map(|email| normalize_email(email))
            .filter(|email| !email.is_empty())
            .collect();

        let teachers = config
            .teachers
            .into_iter()
            .map(|(email, name)| (normalize_email(&email), name.trim().to_string()))
            .collect();

        let staff_domain = config
            .staff_domain
            .map(|domain| domain.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|domain| !domain.is_empty());

        Self {
            admins,
            teachers,
            staff_domain,
            teacher_match: config.teacher_match,
        }
    }

    /// Admin check runs first, so an email listed as both admin and teacher
    /// resolves to admin.
    pub fn resolve(&self, identity: Option<&Identity>) -> Role {
        let Some(email) = identity.and_then(Identity::normalized_email) else {
            return Role::Student;
        };

        if self.admins.contains(&email) {
            return Role::Admin;
        }

        if self.teachers.contains_key(&email) {
            return Role::Teacher;
        }

        match (&self.staff_domain, email.rsplit_once('@')) {
            (Some(staff_domain), Some((_, domain))) if domain == staff_domain => Role::Teacher,
            _ => Role::Student,
        }
    }

    /// Display name configured for a teacher email
    pub fn teacher_name(&self, identity: &Identity) -> Option<&str> {
        identity
            .normalized_email()
            .and_then(|email| self.teachers.get(&email))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn teacher_match(&self) -> TeacherMatch {
        self.teacher_match
    }

    /// Configured teacher names, sorted, suggested in the pass and poster forms
    pub fn teacher_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .teachers
            .values()
            .filter(|name| !name.is_empty())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> RoleResolver {
        RoleResolver::new(RosterConfig {
            admin_emails: vec![
                "Principal@School.edu".to_string(),
                "both@school.edu".to_string(),
            ],
            teachers: HashMap::from([
                ("mrs.daleo@school.edu".to_string(), "Mrs. Daleo".to_string()),
                ("both@school.edu".to_string(), "Dr. Both".to_string()),
                ("sub@district.org".to_string(), "Mr. Sub".to_string()),
            ]),
            staff_domain: Some("school.edu".to_string()),
            teacher_match: TeacherMatch::Substring,
        })
    }

    fn role_of(email: &str) -> Role {
        resolver().resolve(Some(&Identity::with_email(email)))
    }

    #[test]
    fn test_missing_identity_is_student() {
        assert_eq!(resolver().resolve(None), Role::Student);
        assert_eq!(
            resolver().resolve(Some(&Identity::new(Some("Kiosk".to_string()), None))),
            Role::Student
        );
    }

    #[test]
    fn test_admin_wins_over_teacher_map() {
        assert_eq!(role_of("both@school.edu"), Role::Admin);
        assert_eq!(role_of("principal@school.edu"), Role::Admin);
    }

    #[test]
    fn test_teacher_map_and_domain_fallback() {
        assert_eq!(role_of("mrs.daleo@school.edu"), Role::Teacher);
        assert_eq!(role_of("random@school.edu"), Role::Teacher);
        assert_eq!(role_of("sub@district.org"), Role::Teacher);
        assert_eq!(role_of("x@other.org"), Role::Student);
    }

    #[test]
    fn test_domain_must_match_exactly() {
        assert_eq!(role_of("kid@student.school.edu"), Role::Student);
        assert_eq!(role_of("kid@school.edu.evil.com"), Role::Student);
    }

    #[test]
    fn test_no_staff_domain_configured() {
        let resolver = RoleResolver::new(RosterConfig::default());
        assert_eq!(
            resolver.resolve(Some(&Identity::with_email("random@school.edu"))),
            Role::Student
        );
    }

    #[test]
    fn test_teacher_name_lookup() {
        let resolver = resolver();
        let identity = Identity::with_email("MRS.DALEO@school.edu");
        assert_eq!(resolver.teacher_name(&identity), Some("Mrs. Daleo"));
        assert_eq!(
            resolver.teacher_name(&Identity::with_email("random@school.edu")),
            None
        );
    }

    #[test]
    fn test_teacher_names_are_sorted() {
        assert_eq!(
            resolver().teacher_names(),
            vec!["Dr. Both", "Mr. Sub", "Mrs. Daleo"]
        );
    }
}
