use axum::{
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use tripnest_core::booking::CreateBookingRequest;
use tripnest_core::{BookingStatus, HostDecision};
use tripnest_shared::PageRequest;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{optional_body, ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::response::{created, ok, ok_with_message};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking))
        .route("/host/requests", get(host_requests))
        .route("/guest/my-bookings", get(guest_bookings))
        .route("/{id}", get(get_booking))
        .route("/{id}/accept", patch(accept_booking))
        .route("/{id}/decline", patch(decline_booking))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingListQuery {
    status: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl BookingListQuery {
    fn status(&self) -> Result<Option<BookingStatus>, AppError> {
        match self.status.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(raw.parse()?)),
        }
    }

    fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostReply {
    host_response: Option<String>,
}

async fn create_booking(
    State(state): State<AppState>,
    guest: AuthUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.bookings.create(guest.id(), req).await?;
    Ok(created("Booking request created successfully", view))
}

async fn host_requests(
    State(state): State<AppState>,
    host: AuthUser,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .bookings
        .list_for_host(host.id(), query.status()?, query.page())
        .await?;
    Ok(ok(page))
}

async fn guest_bookings(
    State(state): State<AppState>,
    guest: AuthUser,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .bookings
        .list_for_guest(guest.id(), query.status()?, query.page())
        .await?;
    Ok(ok(page))
}

async fn get_booking(
    State(state): State<AppState>,
    viewer: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.bookings.get(id, viewer.id()).await?))
}

async fn accept_booking(
    State(state): State<AppState>,
    host: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    respond(state, host, id, HostDecision::Accept, &body).await
}

async fn decline_booking(
    State(state): State<AppState>,
    host: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    respond(state, host, id, HostDecision::Decline, &body).await
}

async fn respond(
    state: AppState,
    host: AuthUser,
    id: Uuid,
    decision: HostDecision,
    body: &[u8],
) -> Result<impl IntoResponse, AppError> {
    let reply: HostReply = optional_body(body)?;
    let view = state
        .bookings
        .respond(id, host.id(), decision, reply.host_response)
        .await?;

    let message = match decision {
        HostDecision::Accept => "Booking accepted successfully",
        HostDecision::Decline => "Booking declined successfully",
    };
    Ok(ok_with_message(message, view))
}
