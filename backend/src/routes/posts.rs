use crate::{
    config::AppConfig,
    error::AppError,
    extractors::ApiUser,
    markdown,
    models::{POST_COLUMNS, Post},
    params::{Pagination, PaginationParams},
    permission::Permission,
    routes::{comments_url, post_url, posts_url, user_url},
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
use sqlx::{Sqlite, SqlitePool, Transaction};

#[derive(Serialize)]
pub struct PostResponse {
    id: i64,
    url: String,
    title: String,
    body: String,
    body_html: String,
    timestamp: DateTime<Utc>,
    published: bool,
    stars: i64,
    author: String,
    author_id: i64,
    category_id: Option<i64>,
    comments: String,
    comment_count: i64,
    tags: Vec<String>,
}

impl PostResponse {
    pub async fn load(pool: &SqlitePool, post: Post) -> Result<Self, AppError> {
        let comment_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
                .bind(post.id)
                .fetch_one(pool)
                .await?;
        let tags: Vec<String> =
            sqlx::query_scalar("SELECT title FROM tags WHERE post_id = ? ORDER BY id")
                .bind(post.id)
                .fetch_all(pool)
                .await?;

        Ok(Self {
            id: post.id,
            url: post_url(post.id),
            title: post.title,
            body: post.body,
            body_html: post.body_html,
            timestamp: post.timestamp,
            published: post.published,
            stars: post.stars,
            author: user_url(post.user_id),
            author_id: post.user_id,
            category_id: post.category_id,
            comments: comments_url(post.id),
            comment_count,
            tags,
        })
    }
}

#[derive(Serialize)]
pub struct PostList {
    posts: Vec<PostResponse>,
    prev: Option<String>,
    next: Option<String>,
    count: i64,
}

impl PostList {
    pub async fn build(
        pool: &SqlitePool,
        posts: Vec<Post>,
        pagination: Pagination,
        path: &str,
        count: i64,
    ) -> Result<Self, AppError> {
        let mut response = Vec::with_capacity(posts.len());
        for post in posts {
            response.push(PostResponse::load(pool, post).await?);
        }
        let (prev, next) = pagination.links(path, count);
        Ok(Self {
            posts: response,
            prev,
            next,
            count,
        })
    }
}

pub async fn fetch_post(pool: &SqlitePool, id: i64) -> Result<Post, AppError> {
    let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?");
    sqlx::query_as::<_, Post>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

/// Trimmed, non-empty, first occurrence wins.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

async fn replace_tags(
    tx: &mut Transaction<'_, Sqlite>,
    post_id: i64,
    tags: &[String],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;
    for tag in tags {
        sqlx::query("INSERT INTO tags (title, post_id) VALUES (?, ?)")
            .bind(tag)
            .bind(post_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub async fn get_posts(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    _caller: ApiUser,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<PostList>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let pagination = params.resolve(&config);

    let query = format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
    );
    let posts = sqlx::query_as::<_, Post>(&query)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&pool)
        .await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&pool)
        .await?;

    Ok(Json(
        PostList::build(&pool, posts, pagination, &posts_url(), count).await?,
    ))
}

pub async fn get_one_post(
    State(pool): State<SqlitePool>,
    _caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, AppError> {
    let post = fetch_post(&pool, id).await?;
    Ok(Json(PostResponse::load(&pool, post).await?))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category_id: Option<i64>,
}

pub async fn create_post(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = caller.current.require(Permission::WRITE_ARTICLES)?;
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::bad_request("post does not have a title"))?;
    let body = payload
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("post does not have a body"))?;

    if let Some(category_id) = payload.category_id {
        let owned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ? AND user_id = ?")
                .bind(category_id)
                .bind(user.id)
                .fetch_one(&pool)
                .await?;
        if owned == 0 {
            return Err(AppError::bad_request("unknown category"));
        }
    }

    let tags = normalize_tags(payload.tags);
    let mut tx = pool.begin().await?;

    let query = format!(
        "INSERT INTO posts (title, body, body_html, timestamp, stars, user_id, category_id, published)
         VALUES (?, ?, ?, ?, 0, ?, ?, 1)
         RETURNING {POST_COLUMNS}"
    );
    let post = sqlx::query_as::<_, Post>(&query)
        .bind(title)
        .bind(body)
        .bind(markdown::render(body))
        .bind(Utc::now())
        .bind(user.id)
        .bind(payload.category_id)
        .fetch_one(&mut *tx)
        .await?;

    replace_tags(&mut tx, post.id, &tags).await?;
    tx.commit().await?;

    tracing::info!(post_id = post.id, user_id = user.id, "post created");
    let location = post_url(post.id);
    let response = PostResponse::load(&pool, post).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(response),
    ))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

pub async fn update_post(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(id): Path<i64>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Json<PostResponse>, AppError> {
    let mut post = fetch_post(&pool, id).await?;
    if !caller.current.owns_or_administers(post.user_id) {
        return Err(AppError::forbidden("Insufficient permissions"));
    }
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    if let Some(title) = payload.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::bad_request("post does not have a title"));
        }
        post.title = title.to_string();
    }
    if let Some(body) = payload.body {
        if body.trim().is_empty() {
            return Err(AppError::bad_request("post does not have a body"));
        }
        post.body_html = markdown::render(&body);
        post.body = body;
    }
    if let Some(published) = payload.published {
        post.published = published;
    }

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE posts SET title = ?, body = ?, body_html = ?, published = ? WHERE id = ?")
        .bind(&post.title)
        .bind(&post.body)
        .bind(&post.body_html)
        .bind(post.published)
        .bind(post.id)
        .execute(&mut *tx)
        .await?;
    if let Some(tags) = payload.tags {
        replace_tags(&mut tx, post.id, &normalize_tags(tags)).await?;
    }
    tx.commit().await?;

    Ok(Json(PostResponse::load(&pool, post).await?))
}

pub async fn delete_post(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let post = fetch_post(&pool, id).await?;
    if !caller.current.owns_or_administers(post.user_id) {
        return Err(AppError::forbidden("Insufficient permissions"));
    }

    // comments, tags and stars go with it (ON DELETE CASCADE)
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post.id)
        .execute(&pool)
        .await?;

    tracing::info!(post_id = post.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct StarResponse {
    post: String,
    starred: bool,
    stars: i64,
}

async fn set_star(pool: &SqlitePool, caller: ApiUser, id: i64, star: bool) -> Result<StarResponse, AppError> {
    let user = caller.current.require(Permission::FOLLOW)?;
    let post = fetch_post(pool, id).await?;

    let mut tx = pool.begin().await?;
    let (statement, delta) = if star {
        ("INSERT OR IGNORE INTO stars (post_id, user_id) VALUES (?, ?)", 1)
    } else {
        ("DELETE FROM stars WHERE post_id = ? AND user_id = ?", -1)
    };
    let changed = sqlx::query(statement)
        .bind(post.id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if changed > 0 {
        sqlx::query("UPDATE posts SET stars = stars + ? WHERE id = ?")
            .bind(delta)
            .bind(post.id)
            .execute(&mut *tx)
            .await?;
    }
    let stars: i64 = sqlx::query_scalar("SELECT stars FROM posts WHERE id = ?")
        .bind(post.id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(StarResponse {
        post: post_url(post.id),
        starred: star,
        stars,
    })
}

pub async fn star_post(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<Json<StarResponse>, AppError> {
    Ok(Json(set_star(&pool, caller, id, true).await?))
}

pub async fn unstar_post(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<Json<StarResponse>, AppError> {
    Ok(Json(set_star(&pool, caller, id, false).await?))
}
