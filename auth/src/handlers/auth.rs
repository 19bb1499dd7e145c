use actix_session::Session;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde_json::json;
use validator::Validate;

use weblog_models::auth::{LoginRequest, RegisterRequest, UserProfile};

use crate::services::flash::take_flashes;
use crate::services::guard::extract_identity_from_request;
use crate::services::identity::client_fingerprint;
use crate::AuthModule;

/// Login view: reports the flash messages queued for this session so the
/// host frontend can render them. Reading drains the channel.
pub async fn login_view(session: Session) -> Result<HttpResponse> {
    let flashes = take_flashes(&session);
    Ok(HttpResponse::Ok().json(json!({
        "view": "login",
        "flashes": flashes
    })))
}

pub async fn login(
    request: web::Json<LoginRequest>,
    module: web::Data<AuthModule>,
    session: Session,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(validation_errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Validation failed",
            "details": validation_errors
        })));
    }

    let user = match module.store.find_by_username(&request.username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Ok(HttpResponse::Unauthorized().json(json!({
                "error": "Invalid credentials"
            })));
        }
        Err(e) => {
            tracing::error!("Failed to look up user {}: {}", request.username, e);
            return Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Login failed"
            })));
        }
    };

    // Federated accounts have no local password and cannot log in here.
    let verified = user
        .password_hash
        .as_deref()
        .map(|hash| module.hasher.verify(&request.password, hash))
        .unwrap_or(false);

    if !verified {
        return Ok(HttpResponse::Unauthorized().json(json!({
            "error": "Invalid credentials"
        })));
    }

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

    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

pub async fn register(
    request: web::Json<RegisterRequest>,
    module: web::Data<AuthModule>,
    session: Session,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(validation_errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Validation failed",
            "details": validation_errors
        })));
    }

    let password_hash = match module.hasher.hash(&request.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to create user"
            })));
        }
    };

    let user = match module
        .store
        .create_user(&request.username, Some(password_hash), &[])
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Failed to create user {}: {}", request.username, e);
            return Ok(HttpResponse::BadRequest().json(json!({
                "error": "Failed to create user",
                "details": format!("{}", e)
            })));
        }
    };

    let fingerprint = client_fingerprint(&req);
    if let Err(e) = module.identity.establish_session(&session, &user, &fingerprint) {
        tracing::error!("Failed to establish session for user {}: {}", user.id, e);
        return Ok(HttpResponse::InternalServerError().json(json!({
            "error": "Failed to establish session"
        })));
    }

    Ok(HttpResponse::Created().json(UserProfile::from(user)))
}

pub async fn logout(module: web::Data<AuthModule>, session: Session) -> Result<HttpResponse> {
    module.identity.clear_session(&session);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Logged out successfully"
    })))
}

/// Current identity. Always answers: "Guest" with no roles when the
/// session is not authenticated.
pub async fn me(
    module: web::Data<AuthModule>,
    session: Session,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let fingerprint = client_fingerprint(&req);
    let identity = module.identity.current_identity(&session, &fingerprint).await;

    let roles = identity
        .user()
        .map(|u| u.roles.clone())
        .unwrap_or_default();

    Ok(HttpResponse::Ok().json(json!({
        "authenticated": identity.is_authenticated(),
        "username": identity.username(),
        "roles": roles
    })))
}

pub async fn list_users(module: web::Data<AuthModule>, req: HttpRequest) -> Result<HttpResponse> {
    if let Some(identity) = extract_identity_from_request(&req) {
        tracing::info!("User listing requested by {}", identity.username());
    }

    match module.store.list_users(50, 0).await {
        Ok(users) => {
            let profiles: Vec<UserProfile> = users.into_iter().map(UserProfile::from).collect();
            let count = profiles.len();
            Ok(HttpResponse::Ok().json(json!({
                "users": profiles,
                "count": count
            })))
        }
        Err(e) => {
            tracing::error!("Failed to list users: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to list users"
            })))
        }
    }
}
