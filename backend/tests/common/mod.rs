#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use simpleblog::{
    AppState,
    accounts::{self, NewUser},
    auth::TokenSigner,
    config::AppConfig,
    db,
    models::User,
    routes::create_router,
};
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub pool: SqlitePool,
    pub config: AppConfig,
    pub tokens: TokenSigner,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = db::in_memory().await.expect("in-memory database");
        let config = AppConfig {
            secret_key: "test secret".to_string(),
            admin_email: Some(ADMIN_EMAIL.to_string()),
            expose_tokens: true,
            ..AppConfig::default()
        };
        let state = AppState::new(pool.clone(), config.clone());
        let tokens = state.tokens.clone();
        Self {
            pool,
            config,
            tokens,
            router: create_router(state),
        }
    }

    pub async fn unconfirmed_user(&self, email: &str) -> User {
        let username = email.split('@').next().unwrap_or(email);
        accounts::create_user(
            &self.pool,
            &self.config,
            NewUser {
                email,
                username,
                password: PASSWORD,
            },
        )
        .await
        .expect("create user")
    }

    /// A confirmed account with the password [`PASSWORD`].
    pub async fn user(&self, email: &str) -> User {
        let mut user = self.unconfirmed_user(email).await;
        sqlx::query("UPDATE users SET confirmed = 1 WHERE id = ?")
            .bind(user.id)
            .execute(&self.pool)
            .await
            .expect("confirm user");
        user.confirmed = true;
        user
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, auth: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, auth, None).await
    }

    pub async fn post(&self, uri: &str, auth: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, auth, Some(body)).await
    }

    pub async fn put(&self, uri: &str, auth: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, auth, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, auth: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, auth, None).await
    }
}

pub fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

pub fn anonymous() -> String {
    basic("", "")
}

pub fn login(user: &User) -> String {
    basic(&user.email, PASSWORD)
}
