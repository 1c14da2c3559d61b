use crate::{
    accounts,
    error::AppError,
    extractors::ApiUser,
    models::Category,
    permission::Permission,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::SqlitePool;

pub async fn get_user_categories(
    State(pool): State<SqlitePool>,
    _caller: ApiUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Category>>, AppError> {
    let user = accounts::find_by_id(&pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, title, user_id FROM categories WHERE user_id = ? ORDER BY title",
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(categories))
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub title: String,
}

pub async fn create_category(
    State(pool): State<SqlitePool>,
    caller: ApiUser,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let user = caller.current.require(Permission::WRITE_ARTICLES)?;
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("category title must not be empty"));
    }

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (title, user_id) VALUES (?, ?) RETURNING id, title, user_id",
    )
    .bind(title)
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .map_err(AppError::from)
    .map_err(|e| {
        if e.is_unique_violation() {
            AppError::conflict("category already exists")
        } else {
            e
        }
    })?;

    Ok((StatusCode::CREATED, Json(category)))
}
