use std::sync::Arc;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use weblog_auth::handlers::configure_routes;
use weblog_auth::services::password::CredentialHasher;
use weblog_auth::store::{MemoryUserStore, UserStore};
use weblog_auth::AuthModule;
use weblog_config::{AuthConfig, ProviderCredentials, SessionProtection};
use weblog_models::auth::User;

fn test_config() -> AuthConfig {
    AuthConfig {
        login_view: "/auth/login".to_string(),
        index_view: "/".to_string(),
        login_message: "Please login to access this page".to_string(),
        login_message_category: "info".to_string(),
        session_protection: SessionProtection::Strong,
        session_secret: String::new(),
        oauth_redirect_base: "http://localhost:3010".to_string(),
        twitter: ProviderCredentials {
            client_id: "tw-key".to_string(),
            client_secret: "tw-secret".to_string(),
        },
        facebook: ProviderCredentials {
            client_id: "fb-id".to_string(),
            client_secret: "fb-secret".to_string(),
        },
    }
}

fn test_module(store: Arc<MemoryUserStore>) -> web::Data<AuthModule> {
    web::Data::new(AuthModule::with_hasher(
        store,
        test_config(),
        CredentialHasher::with_cost(4),
    ))
}

fn session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_secure(false)
        .build()
}

fn session_cookies<B>(resp: &ServiceResponse<B>) -> Vec<Cookie<'static>> {
    resp.response().cookies().map(|c| c.into_owned()).collect()
}

async fn seed_user(store: &MemoryUserStore, username: &str, password: &str, roles: Vec<&str>) -> User {
    let hasher = CredentialHasher::with_cost(4);
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: Some(hasher.hash(password).unwrap()),
        roles: roles.into_iter().map(String::from).collect(),
        is_active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };
    store.seed(user.clone()).await;
    user
}

#[actix_web::test]
async fn register_creates_user_and_establishes_session() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"username": "jdoe", "password": "hunter22hunter22"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cookies = session_cookies(&resp);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "jdoe");
    assert_eq!(store.user_count().await, 1);

    let mut req = test::TestRequest::get().uri("/auth/me");
    for cookie in &cookies {
        req = req.cookie(cookie.clone());
    }
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "jdoe");
}

#[actix_web::test]
async fn register_rejects_duplicate_username() {
    let store = Arc::new(MemoryUserStore::new());
    seed_user(&store, "jdoe", "hunter22hunter22", vec![]).await;

    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"username": "jdoe", "password": "hunter22hunter22"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.user_count().await, 1);
}

#[actix_web::test]
async fn register_rejects_short_password() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"username": "jdoe", "password": "short"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.user_count().await, 0);
}

#[actix_web::test]
async fn login_succeeds_with_valid_credentials() {
    let store = Arc::new(MemoryUserStore::new());
    seed_user(&store, "jdoe", "hunter22hunter22", vec![]).await;

    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"username": "jdoe", "password": "hunter22hunter22"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "jdoe");

    // Login touches the last-login timestamp.
    let user = store.find_by_username("jdoe").await.unwrap().unwrap();
    assert!(user.last_login_at.is_some());
}

#[actix_web::test]
async fn login_rejects_wrong_password() {
    let store = Arc::new(MemoryUserStore::new());
    seed_user(&store, "jdoe", "hunter22hunter22", vec![]).await;

    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"username": "jdoe", "password": "wrong_password"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn login_rejects_unknown_user() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"username": "nobody", "password": "hunter22hunter22"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn login_rejects_federated_account_without_password() {
    let store = Arc::new(MemoryUserStore::new());
    store.find_or_create_by_username("Jane Doe").await.unwrap();

    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"username": "Jane Doe", "password": "anything_at_all"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn logout_clears_the_session() {
    let store = Arc::new(MemoryUserStore::new());
    seed_user(&store, "jdoe", "hunter22hunter22", vec![]).await;

    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"username": "jdoe", "password": "hunter22hunter22"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let cookies = session_cookies(&resp);

    let mut req = test::TestRequest::post().uri("/auth/logout");
    for cookie in &cookies {
        req = req.cookie(cookie.clone());
    }
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = session_cookies(&resp);

    let mut req = test::TestRequest::get().uri("/auth/me");
    for cookie in &cookies {
        req = req.cookie(cookie.clone());
    }
    let resp = test::call_service(&app, req.to_request()).await;

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["username"], "Guest");
}

#[actix_web::test]
async fn anonymous_identity_reports_guest() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/auth/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["username"], "Guest");
    assert_eq!(body["roles"], json!([]));
}

#[actix_web::test]
async fn openid_begin_redirects_to_provider() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/openid")
        .set_json(json!({"openid_url": "https://openid.example.com/id"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(location.starts_with("https://openid.example.com/id?"));
    assert!(location.contains("openid.mode=checkid_setup"));
    assert!(location.contains("openid.return_to="));
}

#[actix_web::test]
async fn openid_begin_rejects_empty_url() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/openid")
        .set_json(json!({"openid_url": "  "}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn openid_callback_creates_user_and_redirects_home() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/auth/openid/authorized?nickname=jdoe")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/"
    );
    assert_eq!(store.user_count().await, 1);
    let cookies = session_cookies(&resp);

    let mut req = test::TestRequest::get().uri("/auth/me");
    for cookie in &cookies {
        req = req.cookie(cookie.clone());
    }
    let resp = test::call_service(&app, req.to_request()).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "jdoe");
}

#[actix_web::test]
async fn openid_callback_without_name_flashes_and_bounces_to_login() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/auth/openid/authorized")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );
    assert_eq!(store.user_count().await, 0);
    let cookies = session_cookies(&resp);

    // The failure message is waiting on the login view, and reading drains it.
    let mut req = test::TestRequest::get().uri("/auth/login");
    for cookie in &cookies {
        req = req.cookie(cookie.clone());
    }
    let resp = test::call_service(&app, req.to_request()).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["flashes"][0]["message"], "Invalid login. Please try again.");
    assert_eq!(body["flashes"][0]["category"], "danger");
}

#[actix_web::test]
async fn openid_callback_reuses_existing_user() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/auth/openid/authorized?fullname=Jane%20Doe")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
    }

    assert_eq!(store.user_count().await, 1);
}

#[actix_web::test]
async fn oauth_login_redirects_to_provider_with_state() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/auth/login/twitter")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(location.starts_with("https://twitter.com/i/oauth2/authorize?"));
    assert!(location.contains("client_id=tw-key"));
    assert!(location.contains("state="));
}

#[actix_web::test]
async fn oauth_login_rejects_unknown_provider() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/auth/login/github")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn oauth_callback_rejects_state_mismatch() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    // Begin the dance so a state nonce is pinned in the session.
    let req = test::TestRequest::get()
        .uri("/auth/login/twitter")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let cookies = session_cookies(&resp);

    let mut req = test::TestRequest::get()
        .uri("/auth/login/twitter/authorized?code=abc&state=forged");
    for cookie in &cookies {
        req = req.cookie(cookie.clone());
    }
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn oauth_callback_rejects_missing_session_state() {
    let store = Arc::new(MemoryUserStore::new());
    let app = test::init_service(
        App::new()
            .app_data(test_module(store.clone()))
            .wrap(session_middleware())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/auth/login/facebook/authorized?code=abc&state=whatever")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
