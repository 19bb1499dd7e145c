use std::sync::Arc;

use anyhow::{anyhow, Result};

use weblog_models::auth::{OpenIdResponse, User};

use crate::store::UserStore;

/// Finalizes OpenID-based logins: maps the relay's response to a local user
/// record, creating one on first login. The OpenID discovery and assertion
/// verification happen upstream; this service only consumes the outcome.
pub struct OpenIdRelay {
    store: Arc<dyn UserStore>,
}

/// Username precedence for federated responses: full name, then nickname,
/// then email. Whitespace-only values count as absent.
pub fn resolve_username(resp: &OpenIdResponse) -> Option<String> {
    [&resp.fullname, &resp.nickname, &resp.email]
        .into_iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

impl OpenIdRelay {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolves the provider response to a user, creating at most one new
    /// record. Returns None when the response carries no usable display
    /// name; the caller rejects the login in that case.
    pub async fn create_or_login(&self, resp: &OpenIdResponse) -> Result<Option<User>> {
        let Some(username) = resolve_username(resp) else {
            tracing::warn!("OpenID response carried no usable display name; rejecting login");
            return Ok(None);
        };

        let user = self
            .store
            .find_or_create_by_username(&username)
            .await
            .map_err(|e| anyhow!("failed to resolve federated user: {}", e))?;

        Ok(Some(user))
    }
}
