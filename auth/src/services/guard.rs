use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error as ActixError, HttpMessage, HttpResponse,
};
use actix_session::SessionExt;
use futures_util::future::LocalBoxFuture;
use serde_json::json;
use std::future::{ready, Ready};
use std::rc::Rc;

use weblog_models::auth::{FlashMessage, Identity};

use crate::services::flash::flash;
use crate::services::identity::client_fingerprint;
use crate::AuthModule;

/// Outcome of a capability check. The guard applies this before dispatch,
/// so a forbidden request never reaches the handler.
#[derive(Debug, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Forbidden,
}

pub fn check_role(identity: &Identity, role: &str) -> Access {
    if identity.has_role(role) {
        Access::Allowed
    } else {
        Access::Forbidden
    }
}

/// Resolves the request's identity through the session manager. Anonymous
/// when the module is not registered, which only happens in misassembled
/// test apps.
async fn resolve_identity(req: &ServiceRequest) -> Identity {
    let Some(module) = req.app_data::<web::Data<AuthModule>>() else {
        return Identity::Anonymous;
    };

    let session = req.get_session();
    let fingerprint = client_fingerprint(req.request());
    module.identity.current_identity(&session, &fingerprint).await
}

pub fn extract_identity_from_request(req: &actix_web::HttpRequest) -> Option<Identity> {
    req.extensions().get::<Identity>().cloned()
}

/// Gates a route group behind a named role. Role present: the handler runs
/// and its response passes through unchanged. Role absent: 403, handler
/// never invoked.
pub struct RequireRole {
    role: String,
}

impl RequireRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = RequireRoleMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleMiddleware {
            service: Rc::new(service),
            role: self.role.clone(),
        }))
    }
}

pub struct RequireRoleMiddleware<S> {
    service: Rc<S>,
    role: String,
}

impl<S, B> Service<ServiceRequest> for RequireRoleMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let role = self.role.clone();

        Box::pin(async move {
            let identity = resolve_identity(&req).await;

            match check_role(&identity, &role) {
                Access::Allowed => {
                    req.extensions_mut().insert(identity);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Access::Forbidden => {
                    tracing::warn!(
                        "Forbidden: {} lacks the {} role for {}",
                        identity.username(),
                        role,
                        req.path()
                    );
                    Ok(req
                        .into_response(HttpResponse::Forbidden().json(json!({
                            "error": "Insufficient permissions",
                            "message": format!("This endpoint requires the {} role", role)
                        })))
                        .map_into_right_body())
                }
            }
        })
    }
}

/// Gates a route group behind an authenticated session. Anonymous requests
/// are flashed the configured login message and redirected to the login
/// view instead of being served.
pub struct RequireLogin;

impl<S, B> Transform<S, ServiceRequest> for RequireLogin
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = RequireLoginMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireLoginMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireLoginMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireLoginMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let identity = resolve_identity(&req).await;

            if identity.is_authenticated() {
                req.extensions_mut().insert(identity);
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            let (login_view, message, category) = match req.app_data::<web::Data<AuthModule>>() {
                Some(module) => (
                    module.config.login_view.clone(),
                    module.config.login_message.clone(),
                    module.config.login_message_category.clone(),
                ),
                None => ("/auth/login".to_string(), String::new(), String::new()),
            };

            if !message.is_empty() {
                let session = req.get_session();
                if let Err(e) = flash(
                    &session,
                    FlashMessage {
                        message,
                        category,
                    },
                ) {
                    tracing::warn!("Failed to flash login-required message: {}", e);
                }
            }

            Ok(req
                .into_response(
                    HttpResponse::Found()
                        .insert_header((header::LOCATION, login_view))
                        .finish(),
                )
                .map_into_right_body())
        })
    }
}
