//! Request-scoped identity.

use crate::account::User;

/// The authenticated caller of a registry operation.
///
/// Only obtainable from a successful login ([`crate::Cradle::login`]), and
/// passed explicitly into every child registry call. A [`User`] value alone
/// does not grant a session:
///
/// ```compile_fail
/// use cradle::{Session, User};
///
/// let session = Session::from(User {
///     email: "pat@example.com".to_string(),
///     full_name: "Pat".to_string(),
/// });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    email: String,
    full_name: String,
}

impl Session {
    /// Open a session for an account that just authenticated.
    pub(crate) fn for_authenticated(user: User) -> Self {
        Self {
            email: user.email,
            full_name: user.full_name,
        }
    }

    /// Normalized email of the caller.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Display name of the caller, as it was at login.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

#[cfg(test)]
pub(crate) fn test_session(email: &str) -> Session {
    Session {
        email: email.to_string(),
        full_name: String::new(),
    }
}
