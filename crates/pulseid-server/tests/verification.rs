use chrono::{Duration, Utc};
use pulseid_core::AccountStore;
use pulseid_test_utils::*;
use serde_json::json;

#[tokio::test]
async fn correct_code_verifies_and_starts_session() {
    let app = create_test_app().await;
    let user_id = register_via_api(&app, "verify@example.com").await;
    let code = wait_for_email(&app.mailer, "verify@example.com").await.code().unwrap();

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": code })),
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["user"]["isVerified"], true);
    assert!(body["accessToken"].as_str().is_some());

    let account = app
        .stores
        .account_store
        .get_account(&user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(account.is_verified);
    assert!(account.verification_code.is_none());
}

#[tokio::test]
async fn wrong_code_rejected() {
    let app = create_test_app().await;
    let user_id = register_via_api(&app, "wrong@example.com").await;

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": "000000" })),
    )
    .await;
    assert_api_error(status, &body, 400, "ValidationError");
}

#[tokio::test]
async fn wrong_code_on_expired_account_still_reads_as_wrong() {
    let app = create_test_app().await;
    let user_id = register_via_api(&app, "wrongexpired@example.com").await;
    app.stores
        .set_datetime(
            &user_id,
            "verification_code_expires",
            Utc::now() - Duration::minutes(1),
        )
        .await;

    // A mismatch must not leak that the stored code expired.
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": "000000" })),
    )
    .await;
    assert_api_error(status, &body, 400, "ValidationError");
}

#[tokio::test]
async fn expired_code_reissues_a_replacement() {
    let app = create_test_app().await;
    let user_id = register_via_api(&app, "expired@example.com").await;
    let old_code = wait_for_email(&app.mailer, "expired@example.com").await.code().unwrap();
    app.stores
        .set_datetime(
            &user_id,
            "verification_code_expires",
            Utc::now() - Duration::minutes(1),
        )
        .await;

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": old_code })),
    )
    .await;
    assert_api_error(status, &body, 400, "CodeExpired");
    assert!(body["message"].as_str().unwrap().contains("new code"));

    // Wait for the background send, then the fresh code must work.
    tokio::task::yield_now().await;
    let new_code = app.mailer.last_to("expired@example.com").unwrap().code().unwrap();
    assert_ne!(new_code, old_code);

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": new_code })),
    )
    .await;
    assert_api_ok(status, &body);
}

#[tokio::test]
async fn verifying_twice_is_idempotent() {
    let app = create_test_app().await;
    let (user_id, _) = register_and_verify(&app, "twice@example.com").await;

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": "irrelevant" })),
    )
    .await;
    assert_api_ok(status, &body);
    assert!(body["message"].as_str().unwrap().contains("already verified"));
    assert!(body["accessToken"].as_str().is_some());
}

#[tokio::test]
async fn unknown_user_is_404() {
    let app = create_test_app().await;
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": "no-such-user", "code": "123456" })),
    )
    .await;
    assert_api_error(status, &body, 404, "NotFound");
}

#[tokio::test]
async fn resend_overwrites_previous_code() {
    let app = create_test_app().await;
    let user_id = register_via_api(&app, "resend@example.com").await;
    let first_code = wait_for_email(&app.mailer, "resend@example.com").await.code().unwrap();

    let (status, _) = send_request(
        &app.router,
        "POST",
        "/api/auth/resend-verification",
        None,
        Some(json!({ "userId": user_id })),
    )
    .await;
    assert_eq!(status, 200);
    tokio::task::yield_now().await;

    let second_code = app.mailer.last_to("resend@example.com").unwrap().code().unwrap();
    assert_ne!(first_code, second_code);

    // The first code is dead after the overwrite.
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": first_code })),
    )
    .await;
    assert_api_error(status, &body, 400, "ValidationError");

    let (status, _) = send_request(
        &app.router,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "userId": user_id, "code": second_code })),
    )
    .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn unverified_login_gets_flag_and_fresh_code() {
    let app = create_test_app().await;
    let user_id = register_via_api(&app, "pending@example.com").await;
    let registration_code = wait_for_email(&app.mailer, "pending@example.com").await.code().unwrap();

    let (status, body) = login_via_api(&app, "pending@example.com").await;
    assert_api_ok(status, &body);
    assert_eq!(body["requireVerification"], true);
    assert_eq!(body["userId"], user_id.as_str());
    assert!(body["accessToken"].is_null(), "no session before verification");

    tokio::task::yield_now().await;
    let login_code = app.mailer.last_to("pending@example.com").unwrap().code().unwrap();
    assert_ne!(login_code, registration_code, "login should reissue the code");
}
