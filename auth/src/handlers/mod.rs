pub mod auth;
pub mod oauth;
pub mod openid;

use actix_web::web;

use crate::services::guard::{RequireLogin, RequireRole};

/// Mounts the auth route group. Local credential routes live at the scope
/// root; both OAuth provider blueprints share the `/auth/login` prefix so
/// their initiation and callback endpoints do not collide.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::get().to(auth::login_view))
            .route("/login", web::post().to(auth::login))
            .route("/register", web::post().to(auth::register))
            .route("/logout", web::post().to(auth::logout))
            .route("/me", web::get().to(auth::me))
            // OAuth provider blueprints (routed by provider sub-path)
            .route("/login/{provider}", web::get().to(oauth::oauth_login))
            .route(
                "/login/{provider}/authorized",
                web::get().to(oauth::oauth_authorized),
            )
            // OpenID relay
            .route("/openid", web::post().to(openid::openid_begin))
            .route("/openid/authorized", web::get().to(openid::openid_authorized))
            .service(
                web::scope("/admin")
                    .wrap(RequireRole::new("admin"))
                    .wrap(RequireLogin)
                    .route("/users", web::get().to(auth::list_users)),
            ),
    );
}
