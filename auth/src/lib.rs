// Authentication module - session-backed login for the weblog platform
//
// This crate provides:
// - Local credential login (bcrypt)
// - Federated login via OpenID relay and OAuth providers (Twitter, Facebook)
// - Session-backed identity resolution with strong session protection
// - Role-based authorization guards

use std::sync::Arc;

use weblog_config::AuthConfig;

pub mod handlers;
pub mod services;
pub mod store;

use services::identity::IdentityManager;
use services::oauth::OAuthService;
use services::openid::OpenIdRelay;
use services::password::CredentialHasher;
use store::UserStore;

/// The wired-up authentication services. Constructed once at bootstrap and
/// handed to every handler through `web::Data`, so there is exactly one
/// instance of each service per application.
pub struct AuthModule {
    pub config: AuthConfig,
    pub store: Arc<dyn UserStore>,
    pub hasher: CredentialHasher,
    pub identity: IdentityManager,
    pub relay: OpenIdRelay,
    pub oauth: OAuthService,
}

impl AuthModule {
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        let hasher = CredentialHasher::new();
        let identity = IdentityManager::new(Arc::clone(&store), config.clone());
        let relay = OpenIdRelay::new(Arc::clone(&store));
        let oauth = OAuthService::new(&config);

        Self {
            config,
            store,
            hasher,
            identity,
            relay,
            oauth,
        }
    }

    /// Same wiring with a caller-supplied hasher, used by tests to lower the
    /// bcrypt cost.
    pub fn with_hasher(store: Arc<dyn UserStore>, config: AuthConfig, hasher: CredentialHasher) -> Self {
        let mut module = Self::new(store, config);
        module.hasher = hasher;
        module
    }
}
