mod common;

use axum::http::StatusCode;
use common::{ADMIN_EMAIL, PASSWORD, TestApp, anonymous, basic, login};
use serde_json::json;
use simpleblog::{accounts, auth::token::ChangeEmailClaims, permission::Permission};

async fn role_bits(app: &TestApp, user_id: i64) -> i64 {
    sqlx::query_scalar(
        "SELECT r.permissions FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = ?",
    )
    .bind(user_id)
    .fetch_one(&app.pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn register_confirm_and_login() {
    let app = TestApp::new().await;

    let res = app
        .post(
            "/auth/register",
            None,
            json!({ "email": " Carol@Example.com ", "password": "secret1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    // username falls back to the email
    assert_eq!(res.body["user"]["username"], " Carol@Example.com ".trim());
    let confirm_token = res.body["confirmation"]["token"].as_str().unwrap().to_string();

    let auth = basic("carol@example.com", "secret1");
    let res = app.get("/api/v1.0/posts/", Some(&auth)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post("/auth/confirm/not-a-token", Some(&auth), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(&format!("/auth/confirm/{confirm_token}"), Some(&auth), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["confirmed"], true);

    // confirming twice is harmless
    let res = app
        .post(&format!("/auth/confirm/{confirm_token}"), Some(&auth), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get("/api/v1.0/posts/", Some(&auth)).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "CAROL@example.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["confirmed"], true);
    let token = res.body["token"].as_str().unwrap();
    let res = app.get("/api/v1.0/posts/", Some(&basic(token, ""))).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "carol@example.com", "password": "wrong!" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_is_validated() {
    let app = TestApp::new().await;
    app.user("alice@example.com").await;

    let res = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "ALICE@example.com", "username": "other", "password": "secret1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "new@example.com", "username": "alice", "password": "secret1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "short@example.com", "password": "12345" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "not-an-email", "password": "secret1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_email_gets_every_permission() {
    let app = TestApp::new().await;
    let admin = app.user(ADMIN_EMAIL).await;
    let user = app.user("user@example.com").await;

    assert_eq!(role_bits(&app, admin.id).await, Permission::ALL.bits());
    assert_eq!(role_bits(&app, user.id).await, 0x0f);
}

#[tokio::test]
async fn unconfirmed_users_can_resend_and_log_out() {
    let app = TestApp::new().await;
    let dave = app.unconfirmed_user("dave@example.com").await;

    let res = app.post("/auth/confirm", Some(&login(&dave)), json!({})).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    let token = res.body["token"].as_str().unwrap().to_string();

    let res = app
        .post(&format!("/auth/confirm/{token}"), Some(&login(&dave)), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.post("/auth/logout", Some(&login(&dave)), json!({})).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.post("/auth/logout", Some(&anonymous()), json!({})).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn confirmation_tokens_are_bound_to_their_user() {
    let app = TestApp::new().await;
    let eve = app.unconfirmed_user("eve@example.com").await;
    let frank = app.unconfirmed_user("frank@example.com").await;

    let token = frank
        .generate_confirmation_token(&app.tokens, 3600)
        .unwrap();
    let res = app
        .post(&format!("/auth/confirm/{token}"), Some(&login(&eve)), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let eve = accounts::find_by_id(&app.pool, eve.id).await.unwrap().unwrap();
    assert!(!eve.confirmed);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new().await;
    let alice = app.user("alice@example.com").await;

    let res = app
        .post("/auth/reset-password", None, json!({ "email": "nobody@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert!(res.body.get("token").is_none());

    let res = app
        .post("/auth/reset-password", None, json!({ "email": "alice@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    let token = res.body["token"].as_str().unwrap().to_string();

    let res = app
        .post(
            &format!("/auth/reset-password/{token}"),
            None,
            json!({ "email": "alice@example.com", "password": "123" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            "/auth/reset-password/garbage",
            None,
            json!({ "email": "alice@example.com", "password": "brand new" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            &format!("/auth/reset-password/{token}"),
            None,
            json!({ "email": "alice@example.com", "password": "brand new" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get("/api/v1.0/posts/", Some(&login(&alice))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let res = app
        .get("/api/v1.0/posts/", Some(&basic("alice@example.com", "brand new")))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn settings_change_profile_and_password() {
    let app = TestApp::new().await;
    let alice = app.user("alice@example.com").await;
    app.user("bob@example.com").await;
    let auth = login(&alice);

    let res = app
        .put("/auth/settings/username", Some(&auth), json!({ "username": "bob" }))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .put("/auth/settings/username", Some(&auth), json!({ "username": "ally" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["username"], "ally");

    let res = app
        .put(
            "/auth/settings/introduction",
            Some(&auth),
            json!({ "introduction": "hi there" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["introduction"], "hi there");

    let res = app
        .put(
            "/auth/settings/password",
            Some(&auth),
            json!({ "old_password": "wrong one", "password": "another one" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .put(
            "/auth/settings/password",
            Some(&auth),
            json!({ "old_password": PASSWORD, "password": "another one" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let res = app
        .get("/api/v1.0/posts/", Some(&basic("alice@example.com", "another one")))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn email_change_flow() {
    let app = TestApp::new().await;
    let alice = app.user("alice@example.com").await;
    app.user("taken@example.com").await;
    let auth = login(&alice);

    let res = app
        .post("/auth/settings/email", Some(&auth), json!({ "email": "taken@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .post("/auth/settings/email", Some(&auth), json!({ "email": "New@Example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    let token = res.body["token"].as_str().unwrap().to_string();

    let res = app
        .post(&format!("/auth/change-email/{token}"), Some(&auth), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["email"], "new@example.com");

    let moved = basic("new@example.com", PASSWORD);
    let res = app.get("/api/v1.0/posts/", Some(&moved)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn email_change_fails_if_the_address_was_taken_meanwhile() {
    let app = TestApp::new().await;
    let mut alice = app.user("alice@example.com").await;

    let token = app
        .tokens
        .sign(
            &ChangeEmailClaims {
                change_email: alice.id,
                new_email: "late@example.com".into(),
            },
            3600,
        )
        .unwrap();
    app.user("late@example.com").await;

    let changed = alice.change_email(&app.pool, &app.tokens, &token).await.unwrap();
    assert!(!changed);
    assert_eq!(alice.email, "alice@example.com");

    let res = app
        .post(&format!("/auth/change-email/{token}"), Some(&login(&alice)), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follows_and_timeline() {
    let app = TestApp::new().await;
    let alice = app.user("alice@example.com").await;
    let bob = app.user("bob@example.com").await;
    let carol = app.user("carol@example.com").await;

    for (who, title) in [(&bob, "from bob"), (&carol, "from carol")] {
        let res = app
            .post(
                "/api/v1.0/posts/",
                Some(&login(who)),
                json!({ "title": title, "body": "b" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let follow = format!("/api/v1.0/users/{}/follow", bob.id);
    let res = app.post(&follow, Some(&login(&alice)), json!({})).await;
    assert_eq!(res.status, StatusCode::CREATED);
    let res = app.post(&follow, Some(&login(&alice)), json!({})).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let own = format!("/api/v1.0/users/{}/follow", alice.id);
    let res = app.post(&own, Some(&login(&alice)), json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .get(&format!("/api/v1.0/users/{}/timeline/", alice.id), Some(&anonymous()))
        .await;
    assert_eq!(res.body["count"], 1);
    assert_eq!(res.body["posts"][0]["title"], "from bob");

    let res = app
        .get(&format!("/api/v1.0/users/{}/followers/", bob.id), Some(&anonymous()))
        .await;
    assert_eq!(res.body["count"], 1);
    assert_eq!(res.body["users"][0]["username"], "alice");

    let res = app
        .get(&format!("/api/v1.0/users/{}/following/", alice.id), Some(&anonymous()))
        .await;
    assert_eq!(res.body["users"][0]["id"], bob.id);

    let res = app
        .get(&format!("/api/v1.0/users/{}", bob.id), Some(&anonymous()))
        .await;
    assert_eq!(res.body["followers_count"], 1);
    assert_eq!(res.body["post_count"], 1);
    assert!(res.body.get("email").is_none());

    let res = app.delete(&follow, Some(&login(&alice))).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = app.delete(&follow, Some(&login(&alice))).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.post(&follow, Some(&anonymous()), json!({})).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}
