use axum::{
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod extract;
pub mod itineraries;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod response;
pub mod search;
pub mod state;

pub use state::{AppState, AuthConfig};

/// Build the HTTP application. `allowed_origins` feeds the CORS layer; an
/// empty list allows any origin without credentials.
pub fn app(state: AppState, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .nest("/api/bookings", bookings::routes())
        .nest("/api/notifications", notifications::routes())
        .nest("/api/users", auth::routes())
        .nest("/api/users/admin", admin::routes())
        .nest("/api/auth", auth::routes())
        .nest("/api/posts", posts::routes())
        .nest("/api/itineraries", itineraries::routes())
        .nest("/api/search", search::routes());

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(state.clone(), error::error_details))
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "TripNest API is running",
        "data": { "status": "ok", "timestamp": Utc::now() },
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    let message = if uri.path().starts_with("/api") {
        "API route not found"
    } else {
        "Route not found"
    };
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": message })),
    )
}
