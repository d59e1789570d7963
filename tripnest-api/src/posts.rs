use std::collections::BTreeMap;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tripnest_core::post::{PostDraft, Reaction, ReactionAction};
use tripnest_core::{Post, PostType, User, UserSummary};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::response::{created, ok, ok_with_message};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/{id}", get(get_post))
        .route("/{id}/react", put(react_to_post))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewPost {
    post_type: Option<PostType>,
    #[serde(flatten)]
    draft: PostDraft,
}

/// A post with its author resolved.
#[derive(Debug, Serialize)]
pub(crate) struct PostDetails {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<UserSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReactionBody {
    emoji: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReactionOutcome {
    pub action: ReactionAction,
    pub reactions: Vec<Reaction>,
    pub reaction_counts: BTreeMap<String, usize>,
    pub total_reactions: usize,
    pub user_reaction: Option<String>,
}

async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<NewPost>,
) -> Result<impl IntoResponse, AppError> {
    let post_type = req.post_type.unwrap_or(PostType::Plan);
    if post_type != PostType::Plan && !user.role.can_host() {
        return Err(AppError::AuthorizationError(format!(
            "Only hosts can create {} posts",
            post_type
        )));
    }

    let post = Post::create(&user, post_type, req.draft)?;
    state.repos.posts.insert(&post).await?;
    tracing::info!(post_id = %post.id, post_type = %post.post_type, owner = %user.id, "post created");

    Ok(created(
        "Post created successfully",
        PostDetails {
            post,
            author: Some(user.summary()),
        },
    ))
}

async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, id, "Post not found").await?;
    Ok(ok(with_author(&state, post).await?))
}

async fn react_to_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ReactionBody>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, id, "Post not found").await?;
    let outcome = toggle_reaction(&state, post, &user, body).await?;
    Ok(ok_with_message(reaction_message(outcome.action), outcome))
}

pub(crate) async fn load_post(state: &AppState, id: Uuid, missing: &str) -> Result<Post, AppError> {
    state
        .repos
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(missing.to_string()))
}

pub(crate) async fn with_author(state: &AppState, post: Post) -> Result<PostDetails, AppError> {
    let author = state
        .repos
        .users
        .find_by_id(post.owner_id)
        .await?
        .map(|u| u.summary());
    Ok(PostDetails { post, author })
}

/// Same emoji again removes the caller's reaction, a different one replaces it.
/// Only the reaction list is written, so concurrent edits to the post survive.
pub(crate) async fn toggle_reaction(
    state: &AppState,
    mut post: Post,
    user: &User,
    body: ReactionBody,
) -> Result<ReactionOutcome, AppError> {
    let emoji = body
        .emoji
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::ValidationError("Emoji is required".to_string()))?;

    let (action, reactions) = state
        .repos
        .posts
        .toggle_reaction(post.id, user.id, user.full_name(), &emoji, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFoundError("Post not found".to_string()))?;
    post.reactions = reactions;

    tracing::debug!(post_id = %post.id, user_id = %user.id, action = action.as_str(), "reaction toggled");

    Ok(ReactionOutcome {
        action,
        reaction_counts: post.reaction_counts(),
        total_reactions: post.reactions.len(),
        user_reaction: post.reaction_of(user.id).map(str::to_string),
        reactions: post.reactions,
    })
}

pub(crate) fn reaction_message(action: ReactionAction) -> String {
    format!("Reaction {} successfully", action.as_str())
}
