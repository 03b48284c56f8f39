use tower_sessions::Session;

use super::session::SESSION_KEY_IDENTITY;
use crate::error::AppError;
use crate::models::identity::{Identity, Permissions, Role};
use crate::services::role_resolver::RoleResolver;

/// Caller of a request: the session identity, if any, and its role.
///
/// The role is resolved again on every request so roster changes apply
/// without signing out.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: Option<Identity>,
    pub role: Role,
}

impl CurrentUser {
    pub fn resolve(identity: Option<Identity>, roster: &RoleResolver) -> Self {
        let role = roster.resolve(identity.as_ref());
        Self { identity, role }
    }

    pub fn permissions(&self) -> Permissions {
        self.role.permissions()
    }

    pub fn label(&self) -> Option<String> {
        self.identity.as_ref().map(Identity::label)
    }

    /// Teachers and admins only; anonymous callers are asked to sign in
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else if self.identity.is_none() {
            Err(AppError::Unauthorized)
        } else {
            Err(AppError::Forbidden("Staff access required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        match (self.role, &self.identity) {
            (Role::Admin, _) => Ok(()),
            (_, None) => Err(AppError::Unauthorized),
            _ => Err(AppError::Forbidden("Admin access required".to_string())),
        }
    }
}

/// Reads the signed-in identity from the session and resolves its role
pub async fn current_user(
    session: &Session,
    roster: &RoleResolver,
) -> Result<CurrentUser, AppError> {
    let identity: Option<Identity> = session.get(SESSION_KEY_IDENTITY).await?;
    Ok(CurrentUser::resolve(identity, roster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::role_resolver::RosterConfig;

    fn roster() -> RoleResolver {
        RoleResolver::new(RosterConfig {
            admin_emails: vec!["principal@school.edu".to_string()],
            staff_domain: Some("school.edu".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_anonymous_caller() {
        let user = CurrentUser::resolve(None, &roster());
        assert_eq!(user.role, Role::Student);
        assert!(matches!(user.require_staff(), Err(AppError::Unauthorized)));
        assert!(matches!(user.require_admin(), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_teacher_is_not_admin() {
        let identity = Identity::with_email("coach@school.edu");
        let user = CurrentUser::resolve(Some(identity), &roster());
        assert_eq!(user.role, Role::Teacher);
        assert!(user.require_staff().is_ok());
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_admin_passes_both_checks() {
        let identity = Identity::with_email("principal@school.edu");
        let user = CurrentUser::resolve(Some(identity), &roster());
        assert!(user.require_staff().is_ok());
        assert!(user.require_admin().is_ok());
    }
}
