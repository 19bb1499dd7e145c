use actix_session::Session;
use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use weblog_models::auth::{FlashMessage, OpenIdResponse};

use crate::services::flash::flash;
use crate::services::identity::client_fingerprint;
use crate::AuthModule;

#[derive(Debug, Deserialize)]
pub struct OpenIdBeginRequest {
    pub openid_url: String,
}

/// Initiates an OpenID login by sending the browser to the user's provider
/// with a return address pointing at our callback. Discovery and assertion
/// verification are the provider relay's concern, not ours.
pub async fn openid_begin(
    request: web::Json<OpenIdBeginRequest>,
    module: web::Data<AuthModule>,
) -> Result<HttpResponse> {
    let openid_url = request.openid_url.trim();
    if openid_url.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "OpenID URL is required"
        })));
    }

    let return_to = format!("{}/auth/openid/authorized", module.config.oauth_redirect_base);
    let location = format!(
        "{}?openid.mode=checkid_setup&openid.return_to={}",
        openid_url,
        urlencoding::encode(&return_to)
    );

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish())
}

/// Post-login callback: resolves the relayed profile to a local user. A
/// response with no usable display name is rejected with a flash message
/// and a bounce back to the login view; at most one user record is created
/// per call.
pub async fn openid_authorized(
    query: web::Query<OpenIdResponse>,
    module: web::Data<AuthModule>,
    session: Session,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match module.relay.create_or_login(&query).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            if let Err(e) = flash(&session, FlashMessage::danger("Invalid login. Please try again.")) {
                tracing::warn!("Failed to flash invalid-login message: {}", e);
            }
            return Ok(HttpResponse::Found()
                .insert_header((header::LOCATION, module.config.login_view.clone()))
                .finish());
        }
        Err(e) => {
            tracing::error!("OpenID login failed: {}", e);
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
