//! Itineraries are posts of type `plan`.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tripnest_core::post::{PostDraft, PostUpdate};
use tripnest_core::repository::{PostFilter, PostSort};
use tripnest_core::search::split_list;
use tripnest_core::{Post, PostStatus, PostType};
use tripnest_shared::{PageMeta, PageRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::posts::{load_post, reaction_message, toggle_reaction, with_author, ReactionBody};
use crate::response::{created, message, ok, ok_with_message};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_itineraries).post(create_itinerary))
        .route("/my/itineraries", get(my_itineraries))
        .route("/user/{user_id}", get(user_itineraries))
        .route(
            "/{id}",
            get(get_itinerary).put(update_itinerary).delete(delete_itinerary),
        )
        .route("/{id}/react", put(react))
        .route("/{id}/reactions", get(reactions))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItineraryQuery {
    page: Option<u32>,
    limit: Option<u32>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    tags: Option<String>,
    categories: Option<String>,
    difficulty: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    sort_by: Option<String>,
    sort_order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ItineraryPage {
    itineraries: Vec<Post>,
    pagination: PageMeta,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ItineraryQuery {
    fn filter(self) -> PostFilter {
        PostFilter {
            post_types: vec![PostType::Plan],
            status: Some(PostStatus::Active),
            city: non_blank(self.city),
            state: non_blank(self.state),
            country: non_blank(self.country),
            tags: split_list(self.tags.as_deref()),
            categories: split_list(self.categories.as_deref()),
            difficulty: non_blank(self.difficulty),
            min_price: self.min_price,
            max_price: self.max_price,
            ..Default::default()
        }
    }
}

async fn search_page(
    state: &AppState,
    filter: PostFilter,
    sort: PostSort,
    page: PageRequest,
) -> Result<ItineraryPage, AppError> {
    let (itineraries, total) = state.repos.posts.search(&filter, sort, page).await?;
    Ok(ItineraryPage {
        itineraries,
        pagination: PageMeta::new(page, total),
    })
}

/// Loads a post through the itinerary routes; other post types are refused.
async fn load_itinerary(state: &AppState, id: Uuid) -> Result<Post, AppError> {
    let post = load_post(state, id, "Itinerary not found").await?;
    if post.post_type != PostType::Plan {
        return Err(AppError::ValidationError("This is not an itinerary".to_string()));
    }
    Ok(post)
}

fn ensure_owner(post: &Post, caller: &AuthUser, verb: &str) -> Result<(), AppError> {
    if post.owner_id != caller.id() {
        return Err(AppError::AuthorizationError(format!(
            "You are not authorized to {} this itinerary",
            verb
        )));
    }
    Ok(())
}

async fn create_itinerary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(draft): ApiJson<PostDraft>,
) -> Result<impl IntoResponse, AppError> {
    let post = Post::create(&user, PostType::Plan, draft)?;
    state.repos.posts.insert(&post).await?;
    tracing::info!(post_id = %post.id, owner = %user.id, "itinerary created");
    Ok(created("Itinerary created successfully", post))
}

async fn list_itineraries(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ItineraryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let sort = PostSort::parse(query.sort_by.as_deref(), query.sort_order.as_deref());
    Ok(ok(search_page(&state, query.filter(), sort, page).await?))
}

async fn user_itineraries(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = PostFilter {
        post_types: vec![PostType::Plan],
        status: Some(PostStatus::Active),
        owner: Some(user_id),
        ..Default::default()
    };
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    Ok(ok(search_page(&state, filter, PostSort::default(), page).await?))
}

async fn my_itineraries(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = PostFilter {
        post_types: vec![PostType::Plan],
        owner: Some(caller.id()),
        ..Default::default()
    };
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    Ok(ok(search_page(&state, filter, PostSort::default(), page).await?))
}

async fn get_itinerary(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_itinerary(&state, id).await?;
    Ok(ok(with_author(&state, post).await?))
}

async fn update_itinerary(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<PostUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let mut post = load_itinerary(&state, id).await?;
    ensure_owner(&post, &caller, "update")?;

    post.apply(update);
    state.repos.posts.update(&post).await?;
    Ok(ok_with_message("Itinerary updated successfully", post))
}

async fn delete_itinerary(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_itinerary(&state, id).await?;
    ensure_owner(&post, &caller, "delete")?;

    if !state.repos.posts.delete(post.id).await? {
        return Err(AppError::NotFoundError("Itinerary not found".to_string()));
    }
    tracing::info!(post_id = %post.id, "itinerary deleted");
    Ok(message("Itinerary deleted successfully"))
}

async fn react(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ReactionBody>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_itinerary(&state, id).await?;
    let outcome = toggle_reaction(&state, post, &user, body).await?;
    Ok(ok_with_message(reaction_message(outcome.action), outcome))
}

async fn reactions(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_itinerary(&state, id).await?;
    let user_reaction = caller.and_then(|c| post.reaction_of(c.id()).map(str::to_string));

    Ok(ok(json!({
        "reactions": post.reaction_stats(),
        "totalReactions": post.reactions.len(),
        "userReaction": user_reaction,
    })))
}
