use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::HeaderMap;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use pulseid_core::config::{
    AuthConfig, CookieConfig, DatabaseConfig, InactivityConfig, JwtConfig,
};
use pulseid_server::{AppState, build_router};
use pulseid_storage_sqlite::SqliteAccountStore;

use crate::fakes::{RecordingMailer, StaticTokenVerifier};
use crate::stores::{TestStores, create_test_stores};

pub const TEST_ACCESS_SECRET: &str = "test-access-secret-at-least-32-chars-long";
pub const TEST_REFRESH_SECRET: &str = "test-refresh-secret-at-least-32-chars-long";
pub const TEST_PASSWORD: &str = "hunter2-test-password";

pub fn create_test_config() -> AuthConfig {
    AuthConfig {
        hostname: "127.0.0.1".to_string(),
        port: 0,
        public_url: "http://auth.test.local".to_string(),
        frontend_url: "http://app.test.local".to_string(),
        jwt: JwtConfig {
            access_secret: TEST_ACCESS_SECRET.to_string(),
            refresh_secret: TEST_REFRESH_SECRET.to_string(),
        },
        database: DatabaseConfig {
            url: String::new(), // not used; the store is pre-connected
        },
        smtp: None,
        google: None,
        cookies: CookieConfig { secure: false },
        inactivity: InactivityConfig::default(),
    }
}

/// An in-process application with its collaborators exposed, so tests can
/// read captured emails, mint Google identities, and rewrite timestamps.
pub struct TestApp {
    pub router: Router,
    pub state: AppState<SqliteAccountStore>,
    pub stores: TestStores,
    pub mailer: Arc<RecordingMailer>,
    pub verifier: Arc<StaticTokenVerifier>,
}

pub async fn create_test_app() -> TestApp {
    let stores = create_test_stores().await;
    let mailer = Arc::new(RecordingMailer::new());
    let verifier = Arc::new(StaticTokenVerifier::new());

    let state = AppState {
        account_store: Arc::new(stores.account_store.clone()),
        config: Arc::new(create_test_config()),
        mailer: mailer.clone(),
        id_verifier: verifier.clone(),
    };
    let router = build_router(state.clone());

    TestApp {
        router,
        state,
        stores,
        mailer,
        verifier,
    }
}

/// Send a request through the router and return (status, body_json).
pub async fn send_request(
    router: &Router,
    method: &str,
    uri: &str,
    auth_token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    let (status, _headers, json) = send_request_full(router, method, uri, auth_token, &[], body).await;
    (status, json)
}

/// Full-fidelity variant: extra request headers in, response headers out.
/// Cookie-flow tests read `set-cookie` and `x-new-token` from the result.
pub async fn send_request_full(
    router: &Router,
    method: &str,
    uri: &str,
    auth_token: Option<&str>,
    extra_headers: &[(&str, &str)],
    body: Option<Value>,
) -> (u16, HeaderMap, Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    let req_body = match body {
        Some(b) => Body::from(serde_json::to_vec(&b).unwrap()),
        None => Body::empty(),
    };

    let req = builder.body(req_body).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, headers, json)
}

/// Collect the `set-cookie` values from a response into a single `Cookie`
/// request-header string.
pub fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Wait for a background-dispatched email to land in the recording mailer.
pub async fn wait_for_email(mailer: &RecordingMailer, to: &str) -> crate::fakes::SentEmail {
    for _ in 0..100 {
        tokio::task::yield_now().await;
        if let Some(email) = mailer.last_to(to) {
            return email;
        }
    }
    panic!("no email arrived for {to}");
}

/// Like [`wait_for_email`], but skips past earlier mail to the same address
/// until one with a matching subject arrives.
pub async fn wait_for_email_with_subject(
    mailer: &RecordingMailer,
    to: &str,
    subject_fragment: &str,
) -> crate::fakes::SentEmail {
    for _ in 0..100 {
        if let Some(email) = mailer
            .sent()
            .into_iter()
            .rev()
            .find(|e| e.to == to && e.subject.contains(subject_fragment))
        {
            return email;
        }
        tokio::task::yield_now().await;
    }
    panic!("no email with subject containing {subject_fragment:?} arrived for {to}");
}

/// Register an account via the API and return its user id. A verification
/// email lands in the recording mailer.
pub async fn register_via_api(app: &TestApp, email: &str) -> String {
    let body = serde_json::json!({
        "firstName": "Test",
        "lastName": "User",
        "email": email,
        "password": TEST_PASSWORD,
    });
    let (status, json) =
        send_request(&app.router, "POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, 201, "register failed: {json}");
    json["userId"].as_str().unwrap().to_string()
}

/// Register and complete email verification; returns (user_id, access_token).
pub async fn register_and_verify(app: &TestApp, email: &str) -> (String, String) {
    let user_id = register_via_api(app, email).await;
    let code = wait_for_email(&app.mailer, email)
        .await
        .code()
        .expect("no verification code was emailed");

    let body = serde_json::json!({ "userId": user_id, "code": code });
    let (status, json) =
        send_request(&app.router, "POST", "/api/auth/verify-email", None, Some(body)).await;
    assert_eq!(status, 200, "verify-email failed: {json}");

    let token = json["accessToken"].as_str().unwrap().to_string();
    (user_id, token)
}

/// Log in with the standard test password; returns the response body.
pub async fn login_via_api(app: &TestApp, email: &str) -> (u16, Value) {
    let body = serde_json::json!({ "email": email, "password": TEST_PASSWORD });
    send_request(&app.router, "POST", "/api/auth/login", None, Some(body)).await
}
