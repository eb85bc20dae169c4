use pulseid_core::{AccountStore, Role};
use pulseid_test_utils::*;
use serde_json::json;

/// Create a verified admin and return a fresh access token for them.
async fn admin_token(app: &TestApp, email: &str) -> String {
    let (user_id, _) = register_and_verify(app, email).await;
    app.stores
        .account_store
        .update_role(&user_id, Role::Admin)
        .await
        .unwrap();
    // Re-issue so the claims carry the admin role.
    let account = app
        .stores
        .account_store
        .get_account(&user_id)
        .await
        .unwrap()
        .unwrap();
    pulseid_crypto::create_access_token(&account, TEST_ACCESS_SECRET).unwrap()
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let app = create_test_app().await;
    let (_, user_token) = register_and_verify(&app, "plain@example.com").await;

    let (status, body) = send_request(
        &app.router,
        "GET",
        "/api/admin/users",
        Some(&user_token),
        None,
    )
    .await;
    assert_api_error(status, &body, 403, "AuthorizationError");

    let (status, body) = send_request(&app.router, "GET", "/api/admin/users", None, None).await;
    assert_api_error(status, &body, 401, "AuthenticationRequired");
}

#[tokio::test]
async fn list_users_hides_deleted_by_default() {
    let app = create_test_app().await;
    let token = admin_token(&app, "boss@example.com").await;
    let (victim, _) = register_and_verify(&app, "victim@example.com").await;
    app.stores.account_store.soft_delete(&victim).await.unwrap();

    let (status, body) = send_request(
        &app.router,
        "GET",
        "/api/admin/users",
        Some(&token),
        None,
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["total"], 1);

    let (status, body) = send_request(
        &app.router,
        "GET",
        "/api/admin/users?includeDeleted=true",
        Some(&token),
        None,
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["total"], 2);

    let deleted = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["isDeleted"] == true)
        .expect("deleted user missing from full listing");
    assert_eq!(deleted["originalEmail"], "victim@example.com");
    // Views never expose credential or token material.
    assert!(deleted.get("passwordHash").is_none());
    assert!(deleted.get("resetToken").is_none());
}

#[tokio::test]
async fn update_role_via_api() {
    let app = create_test_app().await;
    let token = admin_token(&app, "root@example.com").await;
    let (user_id, _) = register_and_verify(&app, "riser@example.com").await;

    let uri = format!("/api/admin/users/{user_id}/role");
    let (status, body) = send_request(
        &app.router,
        "PATCH",
        &uri,
        Some(&token),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["user"]["role"], "admin");

    let (status, body) = send_request(
        &app.router,
        "PATCH",
        &uri,
        Some(&token),
        Some(json!({ "role": "emperor" })),
    )
    .await;
    assert_api_error(status, &body, 400, "ValidationError");

    let (status, body) = send_request(
        &app.router,
        "PATCH",
        "/api/admin/users/no-such-id/role",
        Some(&token),
        Some(json!({ "role": "user" })),
    )
    .await;
    assert_api_error(status, &body, 404, "NotFound");
}

#[tokio::test]
async fn delete_and_restore_cycle() {
    let app = create_test_app().await;
    let token = admin_token(&app, "chief@example.com").await;
    let (user_id, _) = register_and_verify(&app, "cycled@example.com").await;

    let uri = format!("/api/admin/users/{user_id}");
    let (status, body) = send_request(&app.router, "DELETE", &uri, Some(&token), None).await;
    assert_api_ok(status, &body);

    // Double delete is an error, not a silent no-op.
    let (status, body) = send_request(&app.router, "DELETE", &uri, Some(&token), None).await;
    assert_api_error(status, &body, 400, "ValidationError");

    let restore_uri = format!("/api/admin/users/{user_id}/restore");
    let (status, body) =
        send_request(&app.router, "POST", &restore_uri, Some(&token), None).await;
    assert_api_ok(status, &body);
    assert_eq!(body["user"]["email"], "cycled@example.com");
    assert_eq!(body["user"]["isDeleted"], false);

    // Restoring a live account is an error.
    let (status, body) =
        send_request(&app.router, "POST", &restore_uri, Some(&token), None).await;
    assert_api_error(status, &body, 400, "ValidationError");

    // The restored user can log in again.
    let (status, body) = login_via_api(&app, "cycled@example.com").await;
    assert_api_ok(status, &body);
}

#[tokio::test]
async fn deactivation_stats_endpoint() {
    let app = create_test_app().await;
    let token = admin_token(&app, "counter@example.com").await;
    let (sleepy, _) = register_and_verify(&app, "sleepy@example.com").await;
    let (gone, _) = register_and_verify(&app, "gone@example.com").await;

    sqlx::query(
        "UPDATE users SET is_auto_deactivated = 1,
         auto_deactivated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
    )
    .bind(&sleepy)
    .execute(app.stores.account_store.pool())
    .await
    .unwrap();
    app.stores.account_store.soft_delete(&gone).await.unwrap();

    let (status, body) = send_request(
        &app.router,
        "GET",
        "/api/admin/stats/deactivation",
        Some(&token),
        None,
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["totalAccounts"], 3);
    assert_eq!(body["softDeleted"], 1);
    assert_eq!(body["autoDeactivated"], 1);
    assert_eq!(body["deactivatedLastWeek"], 1);
}
