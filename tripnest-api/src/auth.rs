//! Account routes, mounted at both `/api/users` and `/api/auth`.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tripnest_core::credentials::{hash_password, verify_password};
use tripnest_core::post::Location;
use tripnest_core::repository::is_already_exists;
use tripnest_core::{Post, PostStatus, PostType, Role, User, UserLocation};
use tripnest_shared::Masked;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{issue_token, AuthUser};
use crate::response::{created, ok, ok_with_message};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/profile", put(update_profile))
        .route("/profile/{user_id}", get(public_profile))
        .route("/location", get(get_location).put(update_location))
        .route("/{id}", get(get_user))
}

#[derive(Debug, Deserialize)]
struct SignupRequest {
    firstname: Option<String>,
    lastname: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SigninRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileUpdate {
    firstname: Option<String>,
    lastname: Option<String>,
    description: Option<String>,
    location: Option<Location>,
}

#[derive(Debug, Default, Deserialize)]
struct LocationUpdate {
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    #[serde(flatten)]
    place: Location,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationPayload {
    user_id: Uuid,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    location: Option<UserLocation>,
}

#[derive(Debug, Serialize)]
struct AuthPayload {
    token: String,
    user: User,
}

#[derive(Debug, Default, Serialize)]
struct PostStats {
    plan: u64,
    experience: u64,
    trek: u64,
    service: u64,
    total: u64,
}

impl PostStats {
    fn from_posts(posts: &[Post]) -> Self {
        let mut stats = PostStats::default();
        for post in posts {
            match post.post_type {
                PostType::Plan => stats.plan += 1,
                PostType::Experience => stats.experience += 1,
                PostType::Trek => stats.trek += 1,
                PostType::Service => stats.service += 1,
            }
            stats.total += 1;
        }
        stats
    }
}

#[derive(Debug, Serialize)]
struct PublicProfile {
    user: User,
    stats: PostStats,
    posts: Vec<Post>,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(firstname), Some(lastname), Some(email), Some(password)) = (
        required(req.firstname),
        required(req.lastname),
        required(req.email).map(|e| e.to_lowercase()),
        req.password,
    ) else {
        return Err(AppError::ValidationError(
            "Firstname, lastname, email and password are required".to_string(),
        ));
    };

    let role = match req.role.as_deref() {
        None | Some("guest") => Role::Guest,
        Some("host") => Role::Host,
        Some(_) => {
            return Err(AppError::ValidationError(
                "Invalid role. Must be 'guest' or 'host'".to_string(),
            ))
        }
    };

    if state.repos.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::ValidationError("User already exists".to_string()));
    }

    let hash = hash_password(&password)?;
    let user = User::new(firstname, lastname, email, hash, role);
    // A concurrent signup can still win the unique email index.
    if let Err(e) = state.repos.users.insert(&user).await {
        if is_already_exists(&e) {
            return Err(AppError::ValidationError("User already exists".to_string()));
        }
        return Err(e.into());
    }

    tracing::info!(user_id = %user.id, email = %Masked(user.email.clone()), role = %user.role, "user registered");

    let token = issue_token(&state.auth, &user)?;
    Ok(created("User registered successfully", AuthPayload { token, user }))
}

async fn signin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(email), Some(password)) = (required(req.email), req.password) else {
        return Err(AppError::ValidationError("Email and password are required".to_string()));
    };

    let user = state
        .repos
        .users
        .find_by_email(&email)
        .await?
        .filter(|u| verify_password(&password, &u.password_hash))
        .ok_or_else(|| {
            tracing::debug!(email = %Masked(email.clone()), "failed sign-in");
            AppError::ValidationError("Invalid credentials".to_string())
        })?;

    let token = issue_token(&state.auth, &user)?;
    Ok(ok_with_message("Login successful", AuthPayload { token, user }))
}

async fn public_profile(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = load_user(&state, user_id).await?;

    let posts = state
        .repos
        .posts
        .find_by_owner(user.id, Some(PostStatus::Active))
        .await?;

    Ok(ok(PublicProfile {
        stats: PostStats::from_posts(&posts),
        user,
        posts,
    }))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(firstname) = required(update.firstname) {
        user.firstname = firstname;
    }
    if let Some(lastname) = required(update.lastname) {
        user.lastname = lastname;
    }
    if let Some(description) = update.description {
        user.description = description;
    }
    if let Some(place) = update.location {
        user.location.get_or_insert_with(UserLocation::default).place = place;
    }
    user.updated_at = Utc::now();

    state.repos.users.update(&user).await?;
    Ok(ok_with_message("Profile updated successfully", user))
}

async fn update_location(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    ApiJson(req): ApiJson<LocationUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let location = UserLocation::pinned(req.latitude, req.longitude, req.address, req.place, now)?;
    user.location = Some(location);
    user.updated_at = now;
    state.repos.users.update(&user).await?;

    tracing::info!(user_id = %user.id, "location updated");

    Ok(ok_with_message(
        "Location updated successfully",
        LocationPayload {
            user_id: user.id,
            role: user.role,
            name: None,
            location: user.location,
        },
    ))
}

async fn get_location(AuthUser(user): AuthUser) -> impl IntoResponse {
    ok(LocationPayload {
        user_id: user.id,
        role: user.role,
        name: Some(user.full_name()),
        location: user.location,
    })
}

async fn get_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(load_user(&state, id).await?))
}

pub(crate) async fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .repos
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))
}
