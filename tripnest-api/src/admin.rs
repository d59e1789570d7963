//! Account administration, mounted at `/api/users/admin`. Every route requires the admin role.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tripnest_core::{Role, User};
use uuid::Uuid;

use crate::auth::load_user;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::AdminUser;
use crate::response::{message, ok, ok_with_message};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/users/{id}/role", patch(update_role))
}

#[derive(Debug, Deserialize)]
struct RoleChange {
    role: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserList {
    count: usize,
    users: Vec<User>,
}

async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let users = state.repos.users.list_all().await?;
    Ok(ok(UserList {
        count: users.len(),
        users,
    }))
}

async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(load_user(&state, id).await?))
}

async fn update_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RoleChange>,
) -> Result<impl IntoResponse, AppError> {
    let role: Role = req
        .role
        .as_deref()
        .and_then(|r| r.parse().ok())
        .ok_or_else(|| {
            AppError::ValidationError("Invalid role. Must be 'guest', 'host', or 'admin'".to_string())
        })?;

    let mut user = load_user(&state, id).await?;
    user.role = role;
    user.updated_at = Utc::now();
    state.repos.users.update(&user).await?;

    tracing::info!(user_id = %user.id, role = %role, by = %admin.id, "role changed");
    Ok(ok_with_message("User role updated successfully", user))
}

async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.repos.users.delete(id).await? {
        return Err(AppError::NotFoundError("User not found".to_string()));
    }
    tracing::info!(user_id = %id, by = %admin.id, "user deleted");
    Ok(message("User deleted successfully"))
}
