use crate::{
    config::AppConfig,
    error::AppError,
    extractors::ApiUser,
    models::Comment,
    params::{Pagination, PaginationParams},
    permission::Permission,
    routes::{comment_url, comments_url, post_url, posts::fetch_post, user_url},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

const COMMENT_COLUMNS: &str = "id, body, timestamp, post_id, user_id";

#[derive(Serialize)]
pub struct CommentResponse {
    id: i64,
    url: String,
    body: String,
    timestamp: DateTime<Utc>,
    post: String,
    post_id: i64,
    author: String,
    author_id: i64,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            url: comment_url(comment.id),
            body: comment.body,
            timestamp: comment.timestamp,
            post: post_url(comment.post_id),
            post_id: comment.post_id,
            author: user_url(comment.user_id),
            author_id: comment.user_id,
        }
    }
}

#[derive(Serialize)]
pub struct CommentList {
    comments: Vec<CommentResponse>,
    prev: Option<String>,
    next: Option<String>,
    count: i64,
}

impl CommentList {
    fn new(comments: Vec<Comment>, pagination: Pagination, path: &str, count: i64) -> Self {
        let (prev, next) = pagination.links(path, count);
        Self {
            comments: comments.into_iter().map(CommentResponse::from).collect(),
            prev,
            next,
            count,
        }
    }
}

async fn fetch_comment(pool: &SqlitePool, id: i64) -> Result<Comment, AppError> {
    let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?");
    sqlx::query_as::<_, Comment>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_comments(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    _caller: ApiUser,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<CommentList>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let pagination = params.resolve(&config);

    let query = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
    );
    let comments = sqlx::query_as::<_, Comment>(&query)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&pool)
        .await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&pool)
        .await?;

    let path = format!("{}/comments/", crate::routes::API_PREFIX);
    Ok(Json(CommentList::new(comments, pagination, &path, count)))
}

pub async fn get_one_comment(
    State(pool): State<SqlitePool>,
    _caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<Json<CommentResponse>, AppError> {
    Ok(Json(fetch_comment(&pool, id).await?.into()))
}

pub async fn get_post_comments(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    _caller: ApiUser,
    Path(post_id): Path<i64>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<CommentList>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let pagination = params.resolve(&config);
    let post = fetch_post(&pool, post_id).await?;

    let query = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?
         ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
    );
    let comments = sqlx::query_as::<_, Comment>(&query)
        .bind(post.id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&pool)
        .await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
        .bind(post.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(CommentList::new(
        comments,
        pagination,
        &comments_url(post.id),
        count,
    )))
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub body: Option<String>,
}

pub async fn create_comment(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(post_id): Path<i64>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = caller.current.require(Permission::COMMENT)?;
    let post = fetch_post(&pool, post_id).await?;
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let body = payload
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::bad_request("comment does not have a body"))?;

    let query = format!(
        "INSERT INTO comments (body, timestamp, post_id, user_id) VALUES (?, ?, ?, ?)
         RETURNING {COMMENT_COLUMNS}"
    );
    let comment = sqlx::query_as::<_, Comment>(&query)
        .bind(body)
        .bind(Utc::now())
        .bind(post.id)
        .bind(user.id)
        .fetch_one(&pool)
        .await?;

    tracing::info!(comment_id = comment.id, post_id = post.id, "comment created");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, comment_url(comment.id))],
        Json(CommentResponse::from(comment)),
    ))
}

pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let comment = fetch_comment(&pool, id).await?;
    let is_author = caller.current.user().is_some_and(|u| u.id == comment.user_id);
    if !is_author && !caller.current.can(Permission::MODERATE_COMMENTS) {
        return Err(AppError::forbidden("Insufficient permissions"));
    }

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment.id)
        .execute(&pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
