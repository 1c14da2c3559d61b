pub mod auth;
pub mod categories;
pub mod comments;
pub mod posts;
pub mod settings;
pub mod tokens;
pub mod users;

use crate::{AppState, error::AppError};
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/v1.0";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth_routes())
        .nest(API_PREFIX, api_routes())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/confirm", post(auth::resend_confirmation))
        .route("/confirm/{token}", post(auth::confirm))
        .route("/reset-password", post(auth::request_password_reset))
        .route("/reset-password/{token}", post(auth::reset_password))
        .route("/settings/username", put(settings::change_username))
        .route("/settings/introduction", put(settings::change_introduction))
        .route("/settings/password", put(settings::change_password))
        .route("/settings/email", post(settings::request_email_change))
        .route("/change-email/{token}", post(settings::change_email))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/token", get(tokens::get_token))
        .merge(post_routes())
        .merge(comment_routes())
        .merge(user_routes())
        .route("/categories/", post(categories::create_category))
}

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts/", get(posts::get_posts).post(posts::create_post))
        .route(
            "/posts/{id}",
            get(posts::get_one_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/posts/{id}/star",
            post(posts::star_post).delete(posts::unstar_post),
        )
        .route(
            "/posts/{id}/comments/",
            get(comments::get_post_comments).post(comments::create_comment),
        )
}

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comments/", get(comments::get_comments))
        .route(
            "/comments/{id}",
            get(comments::get_one_comment).delete(comments::delete_comment),
        )
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/posts/", get(users::get_user_posts))
        .route("/users/{id}/timeline/", get(users::get_user_timeline))
        .route(
            "/users/{id}/follow",
            post(users::follow_user).delete(users::unfollow_user),
        )
        .route("/users/{id}/followers/", get(users::get_followers))
        .route("/users/{id}/following/", get(users::get_following))
        .route("/users/{id}/categories/", get(categories::get_user_categories))
}

pub fn posts_url() -> String {
    format!("{API_PREFIX}/posts/")
}

pub fn post_url(id: i64) -> String {
    format!("{API_PREFIX}/posts/{id}")
}

pub fn comments_url(post_id: i64) -> String {
    format!("{API_PREFIX}/posts/{post_id}/comments/")
}

pub fn comment_url(id: i64) -> String {
    format!("{API_PREFIX}/comments/{id}")
}

pub fn user_url(id: i64) -> String {
    format!("{API_PREFIX}/users/{id}")
}

pub fn user_posts_url(id: i64) -> String {
    format!("{API_PREFIX}/users/{id}/posts/")
}

pub fn timeline_url(id: i64) -> String {
    format!("{API_PREFIX}/users/{id}/timeline/")
}
