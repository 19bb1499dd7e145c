use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use weblog_auth::handlers::configure_routes;
use weblog_auth::store::{MemoryUserStore, PgUserStore, UserStore};
use weblog_auth::AuthModule;
use weblog_config::AuthConfig;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    dotenv::dotenv().ok();

    let port = env::var("AUTH_SERVICE_PORT")
        .unwrap_or_else(|_| "3010".to_string())
        .parse::<u16>()
        .unwrap_or(3010);

    let config = AuthConfig::from_env();
    config.warn_on_missing_credentials();

    let store: Arc<dyn UserStore> = match env::var("DATABASE_URL") {
        Ok(database_url) if !database_url.trim().is_empty() => {
            tracing::info!("[Auth Service] Connecting to database...");
            match PgPoolOptions::new()
                .max_connections(10)
                .connect(&database_url)
                .await
            {
                Ok(pool) => {
                    tracing::info!("[Auth Service] Database connection established");
                    Arc::new(PgUserStore::new(pool))
                }
                Err(e) => {
                    tracing::warn!(
                        "[Auth Service] Database connection failed ({}); using in-memory user store",
                        e
                    );
                    Arc::new(MemoryUserStore::new())
                }
            }
        }
        _ => {
            tracing::warn!("[Auth Service] DATABASE_URL not set; using in-memory user store");
            Arc::new(MemoryUserStore::new())
        }
    };

    // Session cookies are signed; a short or missing secret falls back to a
    // per-process key, which invalidates sessions across restarts.
    let session_key = if config.session_secret.len() >= 32 {
        Key::derive_from(config.session_secret.as_bytes())
    } else {
        tracing::warn!("[Auth Service] SESSION_SECRET missing or too short; using an ephemeral session key");
        Key::generate()
    };

    let module = web::Data::new(AuthModule::new(store, config));

    tracing::info!("[Auth Service] Starting on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .app_data(module.clone())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_name("weblog_session".to_string())
                    .build(),
            )
            .wrap(cors)
            .wrap(Logger::default())
            .route("/health", web::get().to(health_check))
            .configure(configure_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}

async fn health_check(module: web::Data<AuthModule>) -> actix_web::Result<web::Json<serde_json::Value>> {
    let db_status = match module.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!("[Auth Service] Store health check failed: {}", e);
            "disconnected"
        }
    };

    Ok(web::Json(serde_json::json!({
        "status": "healthy",
        "service": "auth-service",
        "database": db_status,
        "timestamp": chrono::Utc::now()
    })))
}
