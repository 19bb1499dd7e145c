use std::sync::Arc;

use actix_session::Session;
use actix_web::{http::header, HttpRequest};
use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use weblog_config::{AuthConfig, SessionProtection};
use weblog_models::auth::{Identity, User};

use crate::store::UserStore;

const USER_ID_KEY: &str = "user_id";
const FINGERPRINT_KEY: &str = "_fingerprint";

/// Digest of the client-identifying signals a session is bound to under
/// strong protection: remote address plus user agent.
pub fn client_fingerprint(req: &HttpRequest) -> String {
    let connection_info = req.connection_info();
    let ip = connection_info.realip_remote_addr().unwrap_or("unknown");
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(b"\n");
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

/// Central authority mapping an authenticated session to a loaded user
/// record. One instance per application, constructed at bootstrap.
pub struct IdentityManager {
    store: Arc<dyn UserStore>,
    config: AuthConfig,
}

impl IdentityManager {
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Resolves a persisted identifier to a user record for session
    /// rehydration. None triggers the anonymous state.
    pub async fn load_identity(&self, id: Uuid) -> Result<Option<User>> {
        self.store
            .find_by_id(id)
            .await
            .map_err(|e| anyhow!("failed to load identity: {}", e))
    }

    /// Marks the user as the authenticated identity for this session. The
    /// session key is rotated so a pre-login session id cannot be replayed,
    /// and under strong protection the client fingerprint is pinned.
    pub fn establish_session(&self, session: &Session, user: &User, fingerprint: &str) -> Result<()> {
        session.renew();
        session
            .insert(USER_ID_KEY, user.id)
            .map_err(|e| anyhow!("failed to write session: {}", e))?;

        if self.config.session_protection == SessionProtection::Strong {
            session
                .insert(FINGERPRINT_KEY, fingerprint)
                .map_err(|e| anyhow!("failed to write session: {}", e))?;
        }

        tracing::info!("Session established for user {} ({})", user.username, user.id);
        Ok(())
    }

    /// Returns the authenticated user, or `Identity::Anonymous` when the
    /// session carries no user, the bound fingerprint no longer matches, or
    /// the user record has gone away. Every failure path purges the session.
    pub async fn current_identity(&self, session: &Session, fingerprint: &str) -> Identity {
        let user_id = match session.get::<Uuid>(USER_ID_KEY) {
            Ok(Some(id)) => id,
            _ => return Identity::Anonymous,
        };

        if self.config.session_protection == SessionProtection::Strong {
            match session.get::<String>(FINGERPRINT_KEY) {
                Ok(Some(bound)) if bound == fingerprint => {}
                _ => {
                    tracing::warn!("Session fingerprint mismatch for user {}; invalidating", user_id);
                    session.purge();
                    return Identity::Anonymous;
                }
            }
        }

        match self.load_identity(user_id).await {
            Ok(Some(user)) => Identity::Authenticated(user),
            Ok(None) => {
                session.purge();
                Identity::Anonymous
            }
            Err(e) => {
                tracing::error!("Failed to rehydrate session for user {}: {}", user_id, e);
                Identity::Anonymous
            }
        }
    }

    /// Clears the authenticated state for this session.
    pub fn clear_session(&self, session: &Session) {
        session.purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn fingerprint_is_stable_for_identical_clients() {
        let a = TestRequest::default()
            .insert_header((header::USER_AGENT, "Mozilla/5.0"))
            .to_http_request();
        let b = TestRequest::default()
            .insert_header((header::USER_AGENT, "Mozilla/5.0"))
            .to_http_request();

        assert_eq!(client_fingerprint(&a), client_fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_user_agent() {
        let a = TestRequest::default()
            .insert_header((header::USER_AGENT, "Mozilla/5.0"))
            .to_http_request();
        let b = TestRequest::default()
            .insert_header((header::USER_AGENT, "curl/8.0"))
            .to_http_request();

        assert_ne!(client_fingerprint(&a), client_fingerprint(&b));
    }
}
