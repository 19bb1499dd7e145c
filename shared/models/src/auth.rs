use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Display name reported for unauthenticated requests.
pub const GUEST_USERNAME: &str = "Guest";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// None for federated accounts that never set a local password.
    pub password_hash: Option<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r == name)
    }
}

/// The identity attached to a request: exactly one of these exists per
/// request at evaluation time. Anonymous stands in when no session is
/// authenticated, so callers never special-case absence.
#[derive(Debug, Clone)]
pub enum Identity {
    Authenticated(User),
    Anonymous,
}

impl Identity {
    pub fn username(&self) -> &str {
        match self {
            Identity::Authenticated(user) => &user.username,
            Identity::Anonymous => GUEST_USERNAME,
        }
    }

    pub fn has_role(&self, name: &str) -> bool {
        match self {
            Identity::Authenticated(user) => user.has_role(name),
            Identity::Anonymous => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Authenticated(user) => Some(user),
            Identity::Anonymous => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username,
            roles: user.roles,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Username must be between 2 and 100 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,
}

/// Fields relayed back by an OpenID provider after a successful assertion.
/// All three are optional; the relay resolves a username from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenIdResponse {
    pub fullname: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
}

/// One-shot session-scoped notification, rendered by the host frontend on
/// the next response and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub message: String,
    pub category: String,
}

impl FlashMessage {
    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: "danger".to_string(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(roles: Vec<&str>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            password_hash: None,
            roles: roles.into_iter().map(String::from).collect(),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn anonymous_identity_reports_guest() {
        let identity = Identity::Anonymous;
        assert_eq!(identity.username(), "Guest");
        assert!(!identity.is_authenticated());
    }

    #[test]
    fn anonymous_identity_has_no_roles() {
        assert!(!Identity::Anonymous.has_role("admin"));
        assert!(!Identity::Anonymous.has_role("user"));
    }

    #[test]
    fn authenticated_identity_checks_role_set() {
        let identity = Identity::Authenticated(test_user(vec!["admin"]));
        assert!(identity.has_role("admin"));
        assert!(!identity.has_role("moderator"));
        assert_eq!(identity.username(), "jdoe");
    }
}
