use crate::domain::User;

/// The signed-in user for the current request.
///
/// Built by the session middleware from the account row behind the session
/// cookie, and passed explicitly into the account workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: i32,
    pub role: String,
    /// First name shown in the navigation bar
    pub display_name: String,
    pub avatar: Option<String>,
}

impl RequestContext {
    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    /// True when the user holds any of `roles`.
    pub fn has_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| *r == self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&[ADMIN_ROLE])
    }
}

impl From<&User> for RequestContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role_name.clone(),
            display_name: user.first_name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

pub const ADMIN_ROLE: &str = "admin";
pub const COORDINATOR_ROLE: &str = "coordinator";

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: &str) -> RequestContext {
        RequestContext {
            user_id: 1,
            role: role.into(),
            display_name: "Ana".into(),
            avatar: None,
        }
    }

    #[test]
    fn has_role_matches_any() {
        let coordinator = ctx("coordinator");
        assert!(coordinator.has_role(&[ADMIN_ROLE, COORDINATOR_ROLE]));
        assert!(!coordinator.has_role(&[ADMIN_ROLE]));
        assert!(!coordinator.is_admin());
        assert!(ctx("admin").is_admin());
    }
}
