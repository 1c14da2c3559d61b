use crate::{
    accounts,
    config::AppConfig,
    error::AppError,
    extractors::ApiUser,
    models::{Follow, POST_COLUMNS, Post, User},
    params::PaginationParams,
    permission::Permission,
    routes::{
        API_PREFIX, posts::PostList, timeline_url, user_posts_url, user_url,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Serialize)]
pub struct UserResponse {
    id: i64,
    url: String,
    username: String,
    avatar: String,
    introduction: Option<String>,
    register_date: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    posts: String,
    followed_posts: String,
    post_count: i64,
    followers_count: i64,
    following_count: i64,
}

impl UserResponse {
    pub async fn load(pool: &SqlitePool, user: &User) -> Result<Self, AppError> {
        let (post_count, followers_count, following_count): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM posts WHERE user_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
        )
        .bind(user.id)
        .fetch_one(pool)
        .await?;

        Ok(Self {
            id: user.id,
            url: user_url(user.id),
            username: user.username.clone(),
            avatar: user
                .avatar
                .clone()
                .unwrap_or_else(|| user.gravatar(100, "identicon", "g")),
            introduction: user.introduction.clone(),
            register_date: user.register_date,
            last_seen: user.last_seen,
            posts: user_posts_url(user.id),
            followed_posts: timeline_url(user.id),
            post_count,
            followers_count,
            following_count,
        })
    }
}

async fn fetch_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    accounts::find_by_id(pool, id)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn is_following(
    pool: &SqlitePool,
    follower_id: i64,
    followed_id: i64,
) -> Result<bool, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn get_user(
    State(pool): State<SqlitePool>,
    _caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = fetch_user(&pool, id).await?;
    Ok(Json(UserResponse::load(&pool, &user).await?))
}

pub async fn get_user_posts(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    _caller: ApiUser,
    Path(id): Path<i64>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<PostList>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let pagination = params.resolve(&config);
    let user = fetch_user(&pool, id).await?;

    let query = format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?
         ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
    );
    let posts = sqlx::query_as::<_, Post>(&query)
        .bind(user.id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&pool)
        .await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE user_id = ?")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(
        PostList::build(&pool, posts, pagination, &user_posts_url(user.id), count).await?,
    ))
}

/// Posts written by everyone the user follows.
pub async fn get_user_timeline(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    _caller: ApiUser,
    Path(id): Path<i64>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<PostList>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let pagination = params.resolve(&config);
    let user = fetch_user(&pool, id).await?;

    let query = format!(
        "SELECT {POST_COLUMNS} FROM posts
         WHERE user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)
         ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
    );
    let posts = sqlx::query_as::<_, Post>(&query)
        .bind(user.id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&pool)
        .await?;
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM posts
         WHERE user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(
        PostList::build(&pool, posts, pagination, &timeline_url(user.id), count).await?,
    ))
}

#[derive(Serialize)]
pub struct FollowResponse {
    follower: String,
    followed: String,
    timestamp: DateTime<Utc>,
}

impl From<Follow> for FollowResponse {
    fn from(follow: Follow) -> Self {
        Self {
            follower: user_url(follow.follower_id),
            followed: user_url(follow.followed_id),
            timestamp: follow.timestamp,
        }
    }
}

pub async fn follow_user(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<FollowResponse>), AppError> {
    let follower = caller.current.require(Permission::FOLLOW)?;
    let followed = fetch_user(&pool, id).await?;

    if follower.id == followed.id {
        return Err(AppError::bad_request("you cannot follow yourself"));
    }
    if is_following(&pool, follower.id, followed.id).await? {
        return Err(AppError::conflict("already following this user"));
    }

    let follow = sqlx::query_as::<_, Follow>(
        "INSERT INTO follows (follower_id, followed_id, timestamp) VALUES (?, ?, ?)
         RETURNING follower_id, followed_id, timestamp",
    )
    .bind(follower.id)
    .bind(followed.id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(AppError::from)
    .map_err(|e| {
        if e.is_unique_violation() {
            AppError::conflict("already following this user")
        } else {
            e
        }
    })?;

    tracing::info!(follower_id = follower.id, followed_id = followed.id, "followed");
    Ok((StatusCode::CREATED, Json(follow.into())))
}

pub async fn unfollow_user(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let follower = caller.current.require(Permission::FOLLOW)?;
    let followed = fetch_user(&pool, id).await?;

    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
        .bind(follower.id)
        .bind(followed.id)
        .execute(&pool)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!(follower_id = follower.id, followed_id = followed.id, "unfollowed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize, sqlx::FromRow)]
pub struct FollowEntry {
    id: i64,
    #[sqlx(skip)]
    url: String,
    username: String,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct FollowList {
    users: Vec<FollowEntry>,
    prev: Option<String>,
    next: Option<String>,
    count: i64,
}

#[derive(Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

async fn follow_list(
    pool: &SqlitePool,
    config: &AppConfig,
    id: i64,
    params: PaginationParams,
    direction: Direction,
) -> Result<FollowList, AppError> {
    let pagination = params.resolve(config);
    let user = fetch_user(pool, id).await?;

    // (column naming the listed user, column naming `user`, path segment)
    let (other, this, segment) = match direction {
        Direction::Followers => ("follower_id", "followed_id", "followers"),
        Direction::Following => ("followed_id", "follower_id", "following"),
    };

    let query = format!(
        "SELECT u.id, u.username, f.timestamp FROM follows f
         JOIN users u ON u.id = f.{other}
         WHERE f.{this} = ?
         ORDER BY f.timestamp DESC, u.id DESC LIMIT ? OFFSET ?"
    );
    let mut users = sqlx::query_as::<_, FollowEntry>(&query)
        .bind(user.id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;
    for entry in &mut users {
        entry.url = user_url(entry.id);
    }

    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM follows WHERE {this} = ?"))
        .bind(user.id)
        .fetch_one(pool)
        .await?;

    let path = format!("{API_PREFIX}/users/{}/{segment}/", user.id);
    let (prev, next) = pagination.links(&path, count);
    Ok(FollowList {
        users,
        prev,
        next,
        count,
    })
}

pub async fn get_followers(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    _caller: ApiUser,
    Path(id): Path<i64>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<FollowList>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    Ok(Json(
        follow_list(&pool, &config, id, params, Direction::Followers).await?,
    ))
}

pub async fn get_following(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    _caller: ApiUser,
    Path(id): Path<i64>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<FollowList>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    Ok(Json(
        follow_list(&pool, &config, id, params, Direction::Following).await?,
    ))
}
