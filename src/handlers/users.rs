//! User handlers

use axum::{extract::{State, Query}, http::StatusCode, Json};
use serde::Serialize;
use validator::Validate;

use crate::{AppState, AppError, AppResult};
use crate::models::{CreateUser, User, UserInfo, UserListQuery};
use crate::middleware::auth::{AdminContext, UserContext};

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub message: String,
}

/// Create a user
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<UserInfo>)> {
    req.validate()?;

    if User::find_by_email(&state.pool, &req.email).await?.is_some() {
        return Err(AppError::AlreadyExists("Email already registered".to_string()));
    }

    // lost race with a concurrent insert of the same email
    let user = User::create(&state.pool, req).await.map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            AppError::AlreadyExists("Email already registered".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!("User created: {} ({})", user.name, user.id);

    Ok((StatusCode::CREATED, Json(user.to_info())))
}

/// List users with skip/limit paging
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Vec<UserInfo>>> {
    let users = User::list(&state.pool, query.skip(), query.limit()).await?;
    Ok(Json(users.iter().map(|u| u.to_info()).collect()))
}

/// Profile of the calling user
pub async fn profile(current: UserContext) -> Json<UserInfo> {
    Json(current.user.to_info())
}

/// Admin-only greeting
pub async fn admin(admin: AdminContext) -> Json<AdminResponse> {
    Json(AdminResponse {
        message: format!("Welcome, {}! You have admin access.", admin.user.name),
    })
}
