use crate::permission::Permission;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub is_default: bool,
    pub permissions: i64,
}

impl Role {
    pub fn permissions(&self) -> Permission {
        Permission::from_bits(self.permissions)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub gravatar_hash: Option<String>,
    pub introduction: Option<String>,
    pub register_date: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub confirmed: bool,
    pub role_id: Option<i64>,
}

pub const USER_COLUMNS: &str = "id, email, username, password_hash, avatar, gravatar_hash, \
     introduction, register_date, last_seen, confirmed, role_id";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub body_html: String,
    pub timestamp: DateTime<Utc>,
    pub stars: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub published: bool,
}

pub const POST_COLUMNS: &str =
    "id, title, body, body_html, timestamp, stars, user_id, category_id, published";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub post_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Follow {
    pub follower_id: i64,
    pub followed_id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub user_id: i64,
}
