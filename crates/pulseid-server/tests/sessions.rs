use jsonwebtoken::{EncodingKey, Header, encode};
use pulseid_core::{AccountStore, Role};
use pulseid_crypto::jwt::AccessClaims;
use pulseid_test_utils::*;
use serde_json::json;

fn expired_access_token(user_id: &str, email: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        role: Role::User,
        email: email.to_string(),
        name: "Test User".to_string(),
        verified: true,
        iat: now - 7200,
        exp: now - 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_ACCESS_SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn missing_credentials_401() {
    let app = create_test_app().await;
    let (status, body) = send_request(&app.router, "GET", "/api/auth/verify", None, None).await;
    assert_api_error(status, &body, 401, "AuthenticationRequired");
}

#[tokio::test]
async fn garbage_bearer_401() {
    let app = create_test_app().await;
    let (status, body) = send_request(
        &app.router,
        "GET",
        "/api/auth/verify",
        Some("totally-not-a-jwt"),
        None,
    )
    .await;
    assert_api_error(status, &body, 401, "InvalidToken");
}

#[tokio::test]
async fn bearer_token_authenticates() {
    let app = create_test_app().await;
    let (user_id, token) = register_and_verify(&app, "bearer@example.com").await;

    let (status, body) =
        send_request(&app.router, "GET", "/api/auth/verify", Some(&token), None).await;
    assert_api_ok(status, &body);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["email"], "bearer@example.com");
}

#[tokio::test]
async fn access_cookie_authenticates() {
    let app = create_test_app().await;
    let (user_id, token) = register_and_verify(&app, "cookie@example.com").await;

    let cookie = format!("token={token}");
    let (status, _headers, body) = send_request_full(
        &app.router,
        "GET",
        "/api/auth/verify",
        None,
        &[("cookie", &cookie)],
        None,
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["user"]["id"], user_id.as_str());
}

#[tokio::test]
async fn login_sets_session_cookies() {
    let app = create_test_app().await;
    register_and_verify(&app, "cookies@example.com").await;

    let body = json!({ "email": "cookies@example.com", "password": TEST_PASSWORD });
    let (status, headers, json_body) = send_request_full(
        &app.router,
        "POST",
        "/api/auth/login",
        None,
        &[],
        Some(body),
    )
    .await;
    assert_api_ok(status, &json_body);

    let cookies: Vec<String> = headers
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let access = cookies.iter().find(|c| c.starts_with("token=")).unwrap();
    let refresh = cookies
        .iter()
        .find(|c| c.starts_with("refreshToken="))
        .unwrap();
    assert!(access.contains("HttpOnly"), "{access}");
    assert!(access.contains("SameSite=Lax"), "{access}");
    assert!(refresh.contains("HttpOnly"), "{refresh}");
    assert!(refresh.contains("SameSite=None"), "{refresh}");
}

#[tokio::test]
async fn expired_access_with_refresh_cookie_transparently_refreshes() {
    let app = create_test_app().await;
    let (user_id, _) = register_and_verify(&app, "refresh@example.com").await;

    let expired = expired_access_token(&user_id, "refresh@example.com");
    let refresh = pulseid_crypto::create_refresh_token(&user_id, TEST_REFRESH_SECRET).unwrap();
    let cookie = format!("token={expired}; refreshToken={refresh}");

    let (status, headers, body) = send_request_full(
        &app.router,
        "GET",
        "/api/auth/verify",
        None,
        &[("cookie", &cookie)],
        None,
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["user"]["id"], user_id.as_str());

    // Replacement token in the header and as a fresh cookie.
    let new_token = headers
        .get("x-new-token")
        .expect("no x-new-token header")
        .to_str()
        .unwrap();
    assert!(pulseid_crypto::validate_access_token(new_token, TEST_ACCESS_SECRET).is_ok());
    let set_cookie = cookie_header(&headers);
    assert!(set_cookie.contains("token="), "{set_cookie}");
}

#[tokio::test]
async fn refresh_picks_up_role_changes() {
    let app = create_test_app().await;
    let (user_id, _) = register_and_verify(&app, "promoted@example.com").await;
    app.stores
        .account_store
        .update_role(&user_id, Role::Admin)
        .await
        .unwrap();

    let expired = expired_access_token(&user_id, "promoted@example.com");
    let refresh = pulseid_crypto::create_refresh_token(&user_id, TEST_REFRESH_SECRET).unwrap();
    let cookie = format!("token={expired}; refreshToken={refresh}");

    let (status, headers, body) = send_request_full(
        &app.router,
        "GET",
        "/api/auth/verify",
        None,
        &[("cookie", &cookie)],
        None,
    )
    .await;
    assert_api_ok(status, &body);

    let new_token = headers.get("x-new-token").unwrap().to_str().unwrap();
    let claims = pulseid_crypto::validate_access_token(new_token, TEST_ACCESS_SECRET).unwrap();
    assert_eq!(claims.role, Role::Admin);
}

#[tokio::test]
async fn expired_access_without_refresh_is_refresh_required() {
    let app = create_test_app().await;
    let (user_id, _) = register_and_verify(&app, "stale@example.com").await;

    let expired = expired_access_token(&user_id, "stale@example.com");
    let (status, body) =
        send_request(&app.router, "GET", "/api/auth/verify", Some(&expired), None).await;
    assert_api_error(status, &body, 401, "RefreshRequired");
}

#[tokio::test]
async fn deleted_account_is_rejected_despite_valid_token() {
    let app = create_test_app().await;
    let (user_id, token) = register_and_verify(&app, "undead@example.com").await;
    assert!(app.stores.account_store.soft_delete(&user_id).await.unwrap());

    let (status, body) =
        send_request(&app.router, "GET", "/api/auth/verify", Some(&token), None).await;
    assert_api_error(status, &body, 403, "AccountDeleted");
}

#[tokio::test]
async fn deleted_account_cannot_refresh() {
    let app = create_test_app().await;
    let (user_id, _) = register_and_verify(&app, "gonefishing@example.com").await;
    assert!(app.stores.account_store.soft_delete(&user_id).await.unwrap());

    let expired = expired_access_token(&user_id, "gonefishing@example.com");
    let refresh = pulseid_crypto::create_refresh_token(&user_id, TEST_REFRESH_SECRET).unwrap();
    let cookie = format!("token={expired}; refreshToken={refresh}");

    let (status, _headers, body) = send_request_full(
        &app.router,
        "GET",
        "/api/auth/verify",
        None,
        &[("cookie", &cookie)],
        None,
    )
    .await;
    assert_api_error(status, &body, 403, "AccountDeleted");
}

#[tokio::test]
async fn authenticated_requests_bump_last_activity() {
    let app = create_test_app().await;
    let (user_id, token) = register_and_verify(&app, "active@example.com").await;

    app.stores
        .set_datetime(
            &user_id,
            "last_activity",
            chrono::Utc::now() - chrono::Duration::days(10),
        )
        .await;

    let (status, _) =
        send_request(&app.router, "GET", "/api/auth/verify", Some(&token), None).await;
    assert_eq!(status, 200);

    let account = app
        .stores
        .account_store
        .get_account(&user_id)
        .await
        .unwrap()
        .unwrap();
    let age = chrono::Utc::now() - account.last_activity.unwrap();
    assert!(age < chrono::Duration::minutes(1));
}

#[tokio::test]
async fn logout_expires_cookies() {
    let app = create_test_app().await;
    let (status, headers, body) =
        send_request_full(&app.router, "POST", "/api/auth/logout", None, &[], None).await;
    assert_api_ok(status, &body);

    let cookies: Vec<String> = headers
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("token=")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
}

#[tokio::test]
async fn unverified_user_blocked_from_verified_only_route() {
    let app = create_test_app().await;
    let user_id = register_via_api(&app, "limbo@example.com").await;

    // Mint a token reflecting the unverified snapshot.
    let account = app
        .stores
        .account_store
        .get_account(&user_id)
        .await
        .unwrap()
        .unwrap();
    let token = pulseid_crypto::create_access_token(&account, TEST_ACCESS_SECRET).unwrap();

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/deactivate",
        Some(&token),
        None,
    )
    .await;
    assert_api_error(status, &body, 403, "VerificationRequired");
    assert_eq!(body["requireVerification"], true);
    assert_eq!(body["userId"], user_id.as_str());
}

#[tokio::test]
async fn self_deactivation_soft_deletes_and_ends_session() {
    let app = create_test_app().await;
    let (user_id, token) = register_and_verify(&app, "leaving@example.com").await;

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/deactivate",
        Some(&token),
        None,
    )
    .await;
    assert_api_ok(status, &body);

    let account = app
        .stores
        .account_store
        .get_account(&user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(account.is_deleted);
    assert_eq!(account.original_email.as_deref(), Some("leaving@example.com"));

    // The surviving token is now useless.
    let (status, body) =
        send_request(&app.router, "GET", "/api/auth/verify", Some(&token), None).await;
    assert_api_error(status, &body, 403, "AccountDeleted");
}
