//! Access decisions for protected pages.

use crate::session::{Role, Session};

/// Outcome of a [`RouteGuard`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The page may be shown.
    Allow,
    /// Nobody is signed in; go to the login entry point.
    RedirectToLogin,
    /// Signed in, but the role may not see this page; go to the home page.
    RedirectHome,
}

/// Restricts a page to signed-in users, optionally of given roles.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    roles: Vec<Role>,
}

impl RouteGuard {
    /// Any signed-in user.
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Signed-in users holding one of `roles`.
    pub fn for_roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Decide whether `session` may see the page.
    pub fn check(&self, session: &Session) -> Access {
        if !session.is_authenticated() {
            return Access::RedirectToLogin;
        }
        if self.roles.is_empty() {
            return Access::Allow;
        }
        match session.role() {
            Some(role) if self.roles.contains(role) => Access::Allow,
            _ => Access::RedirectHome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserProfile;
    use rstest::rstest;

    fn session_as(role: Option<&str>) -> Session {
        let mut session = Session::with_tokens("a", "r");
        let mut user = UserProfile::new("u");
        user.role = role.map(Role::from);
        session.user = Some(user);
        session
    }

    #[test]
    fn test_anonymous_goes_to_login() {
        let guard = RouteGuard::for_roles(["student"]);
        assert_eq!(guard.check(&Session::new()), Access::RedirectToLogin);

        // A refresh token alone is not a signed-in session.
        let mut session = Session::new();
        session.refresh_token = Some("r".to_string());
        assert_eq!(RouteGuard::authenticated().check(&session), Access::RedirectToLogin);
    }

    #[rstest]
    #[case(Some("student"), Access::Allow)]
    #[case(Some("teacher"), Access::RedirectHome)]
    #[case(None, Access::RedirectHome)]
    fn test_student_pages(#[case] role: Option<&str>, #[case] expected: Access) {
        let guard = RouteGuard::for_roles([Role::Student]);
        assert_eq!(guard.check(&session_as(role)), expected);
    }

    #[test]
    fn test_any_role_without_restriction() {
        let guard = RouteGuard::authenticated();
        assert_eq!(guard.check(&session_as(None)), Access::Allow);
        assert_eq!(guard.check(&session_as(Some("teacher"))), Access::Allow);
    }
}
