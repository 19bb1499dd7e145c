use actix_session::Session;
use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use weblog_models::auth::FlashMessage;

use crate::services::flash::flash;
use crate::services::identity::client_fingerprint;
use crate::services::oauth::OAuthProvider;
use crate::AuthModule;

const OAUTH_STATE_KEY: &str = "oauth_state";

#[derive(Debug, Deserialize)]
pub struct OAuthAuthorizedQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn invalid_provider() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "error": "Invalid provider",
        "message": "Supported providers: twitter, facebook"
    }))
}

/// Login-initiation endpoint: sends the browser into the provider's
/// authorization flow with a state nonce pinned in the session.
pub async fn oauth_login(
    provider: web::Path<String>,
    module: web::Data<AuthModule>,
    session: Session,
) -> Result<HttpResponse> {
    let Some(provider) = OAuthProvider::from_path(&provider) else {
        return Ok(invalid_provider());
    };

    let state = Uuid::new_v4().to_string();
    session.insert(OAUTH_STATE_KEY, state.clone())?;

    let location = module.oauth.authorization_url(provider, &state);
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish())
}

/// Authorized callback: finalizes the login by exchanging the code,
/// reading the provider profile, and mapping its display name onto a local
/// user with the same create-or-reuse logic as the OpenID relay.
pub async fn oauth_authorized(
    provider: web::Path<String>,
    query: web::Query<OAuthAuthorizedQuery>,
    module: web::Data<AuthModule>,
    session: Session,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(provider) = OAuthProvider::from_path(&provider) else {
        return Ok(invalid_provider());
    };

    let expected_state = match session.get::<String>(OAUTH_STATE_KEY)? {
        Some(state) => state,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "error": "Invalid state"
            })));
        }
    };

    if query.state.as_deref() != Some(expected_state.as_str()) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Invalid state"
        })));
    }

    session.remove(OAUTH_STATE_KEY);

    // Denied consent or a missing code both end the attempt without a user
    // record; bounce back to the login view.
    let code = match (&query.error, &query.code) {
        (None, Some(code)) => code.clone(),
        _ => {
            tracing::warn!(
                "{} login aborted by provider: {:?}",
                provider,
                query.error
            );
            return reject_login(&module, &session);
        }
    };

    let token = match module.oauth.exchange_code(provider, &code).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to exchange {} code: {}", provider, e);
            return reject_login(&module, &session);
        }
    };

    let display_name = match module
        .oauth
        .fetch_display_name(provider, &token.access_token)
        .await
    {
        Ok(Some(name)) => name,
        Ok(None) => {
            tracing::warn!("{} profile carried no usable display name", provider);
            return reject_login(&module, &session);
        }
        Err(e) => {
            tracing::error!("Failed to fetch {} profile: {}", provider, e);
            return reject_login(&module, &session);
        }
    };

    let user = match module.store.find_or_create_by_username(&display_name).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Failed to resolve {} user {}: {}", provider, display_name, e);
            return Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Login failed"
            })));
        }
    };

    if let Err(e) = module.store.update_last_login(user.id).await {
        tracing::warn!("Failed to update last login for user {}: {}", user.id, e);
    }

    let fingerprint = client_fingerprint(&req);
    if let Err(e) = module.identity.establish_session(&session, &user, &fingerprint) {
        tracing::error!("Failed to establish session for user {}: {}", user.id, e);
        return Ok(HttpResponse::InternalServerError().json(json!({
            "error": "Failed to establish session"
        })));
    }

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, module.config.index_view.clone()))
        .finish())
}

fn reject_login(module: &AuthModule, session: &Session) -> Result<HttpResponse> {
    if let Err(e) = flash(session, FlashMessage::danger("Invalid login. Please try again.")) {
        tracing::warn!("Failed to flash invalid-login message: {}", e);
    }
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, module.config.login_view.clone()))
        .finish())
}
