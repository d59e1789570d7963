use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::{Deserialize, Serialize};
use tripnest_core::repository::{PostFilter, PostSort};
use tripnest_core::search::{split_list, SearchType, Suggestion};
use tripnest_core::{Post, PostStatus, PostType};
use tripnest_shared::{PageMeta, PageRequest};

use crate::error::AppError;
use crate::extract::ApiQuery;
use crate::response::{ok, ok_with_message};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_SUGGESTIONS: u32 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(search))
        .route("/suggestions", get(suggestions))
        .route("/by-location", get(by_location))
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    q: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    location: Option<String>,
    difficulty: Option<String>,
    category: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    #[serde(skip_serializing)]
    page: Option<u32>,
    #[serde(skip_serializing)]
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationQuery {
    location: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct LocationSummary {
    total: u64,
    itineraries: usize,
    experiences: usize,
}

#[derive(Debug, Serialize)]
struct GroupedResults {
    all: Vec<Post>,
    itineraries: Vec<Post>,
    experiences: Vec<Post>,
}

#[derive(Debug, Serialize)]
struct LocationResults {
    location: String,
    summary: LocationSummary,
    results: GroupedResults,
    pagination: SearchPagination,
}

#[derive(Debug, Deserialize)]
struct SuggestionQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchPagination {
    current_page: u32,
    total_pages: u64,
    total_results: u64,
    results_per_page: u32,
    has_next_page: bool,
    has_prev_page: bool,
}

impl From<PageMeta> for SearchPagination {
    fn from(meta: PageMeta) -> Self {
        Self {
            current_page: meta.page,
            total_pages: meta.total_pages,
            total_results: meta.total,
            results_per_page: meta.limit,
            has_next_page: meta.has_next_page(),
            has_prev_page: meta.has_prev_page(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchResults {
    results: Vec<Post>,
    pagination: SearchPagination,
    filters: SearchQuery,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let kind: SearchType = match non_blank(query.kind.as_deref()) {
        Some(raw) => raw.parse()?,
        None => SearchType::default(),
    };

    let filter = PostFilter {
        post_types: kind.post_types(),
        status: Some(PostStatus::Active),
        text: non_blank(query.q.as_deref()),
        location: non_blank(query.location.as_deref()),
        difficulty: non_blank(query.difficulty.as_deref()),
        categories: split_list(query.category.as_deref()),
        min_price: query.min_price,
        max_price: query.max_price,
        ..Default::default()
    };
    let sort = PostSort::parse(query.sort_by.as_deref(), query.sort_order.as_deref());
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);

    let (results, total) = state.repos.posts.search(&filter, sort, page).await?;
    tracing::debug!(total, kind = ?kind, "search served");

    Ok(ok(SearchResults {
        results,
        pagination: PageMeta::new(page, total).into(),
        filters: query,
    }))
}

async fn suggestions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SuggestionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let needle = non_blank(query.q.as_deref())
        .ok_or_else(|| AppError::ValidationError("Search query is required".to_string()))?;

    let filter = PostFilter {
        post_types: vec![PostType::Plan, PostType::Experience],
        status: Some(PostStatus::Active),
        title_or_city: Some(needle),
        ..Default::default()
    };
    let page = PageRequest::new(None, Some(MAX_SUGGESTIONS), MAX_SUGGESTIONS);
    let (matches, _) = state.repos.posts.search(&filter, PostSort::default(), page).await?;

    let suggestions: Vec<Suggestion> = matches.iter().map(Suggestion::from_post).collect();

    Ok(ok(suggestions))
}

async fn by_location(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LocationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let location = non_blank(query.location.as_deref())
        .ok_or_else(|| AppError::ValidationError("Location parameter is required".to_string()))?;
    let kind: SearchType = match non_blank(query.kind.as_deref()) {
        Some(raw) => raw.parse()?,
        None => SearchType::default(),
    };

    let filter = PostFilter {
        post_types: kind.location_post_types()?,
        status: Some(PostStatus::Active),
        location: Some(location.clone()),
        ..Default::default()
    };
    let sort = PostSort::parse(query.sort_by.as_deref(), query.sort_order.as_deref());
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);

    let (all, total) = state.repos.posts.search(&filter, sort, page).await?;
    let of_type = |t: PostType| -> Vec<Post> { all.iter().filter(|p| p.post_type == t).cloned().collect() };
    let itineraries = of_type(PostType::Plan);
    let experiences = of_type(PostType::Experience);

    Ok(ok_with_message(
        format!("Found {} results for location: {}", total, location),
        LocationResults {
            summary: LocationSummary {
                total,
                itineraries: itineraries.len(),
                experiences: experiences.len(),
            },
            results: GroupedResults {
                all,
                itineraries,
                experiences,
            },
            pagination: PageMeta::new(page, total).into(),
            location,
        },
    ))
}
