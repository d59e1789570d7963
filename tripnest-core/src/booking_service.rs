use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tripnest_shared::{PageMeta, PageRequest};
use uuid::Uuid;

use crate::booking::{
    already_responded, Booking, BookingStatus, BookingView, CreateBookingRequest, HostDecision,
    StatusSummary,
};
use crate::notifier::NotificationEmitter;
use crate::post::PostSummary;
use crate::repository::{BookingParty, BookingQuery, BookingRepository, PostRepository, UserRepository};
use crate::user::UserSummary;
use crate::{CoreError, CoreResult};

/// One page of bookings for a guest or a host dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct BookingPage {
    pub bookings: Vec<BookingView>,
    pub pagination: PageMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StatusSummary>,
}

/// Booking creation, host responses and booking reads.
///
/// Booking writes and the notifications they raise are separate writes.
/// A failed notification is logged and does not undo or fail the booking.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
    notifier: NotificationEmitter,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
        notifier: NotificationEmitter,
    ) -> Self {
        Self {
            bookings,
            posts,
            users,
            notifier,
        }
    }

    pub async fn create(&self, guest_id: Uuid, req: CreateBookingRequest) -> CoreResult<BookingView> {
        let req = req.validate()?;

        let post = self
            .posts
            .find_by_id(req.post_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Post not found".to_string()))?;

        if !post.is_bookable() {
            return Err(CoreError::ValidationError(
                "This trip is not available for booking".to_string(),
            ));
        }

        if post.owner_id == guest_id {
            return Err(CoreError::ValidationError(
                "You cannot book your own trip".to_string(),
            ));
        }

        if let Some(max) = post.capacity.max_people {
            if req.number_of_people > max {
                return Err(CoreError::ValidationError(format!(
                    "This trip allows at most {} people",
                    max
                )));
            }
        }

        let guest = self
            .users
            .find_by_id(guest_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("User not found".to_string()))?;

        let booking = Booking::new_pending(guest_id, &post, req, Utc::now());
        self.bookings.insert(&booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            post_id = %post.id,
            people = booking.number_of_people,
            total = booking.total_amount,
            "booking requested"
        );

        if let Err(e) = self.notifier.booking_requested(&booking, &guest).await {
            tracing::error!(booking_id = %booking.id, "failed to notify host: {}", e);
        }

        Ok(BookingView {
            booking,
            guest: Some(guest.summary()),
            host: None,
            post: Some(post.summary()),
        })
    }

    /// Accept or decline a pending booking on behalf of its host.
    pub async fn respond(
        &self,
        booking_id: Uuid,
        responder: Uuid,
        decision: HostDecision,
        host_response: Option<String>,
    ) -> CoreResult<BookingView> {
        let mut booking = self.load(booking_id).await?;

        booking.respond(responder, decision, host_response, Utc::now())?;

        if !self.bookings.apply_response(&booking).await? {
            // Lost a race with a concurrent response; report what won.
            let current = self.load(booking_id).await?;
            let status = if current.status == BookingStatus::Pending {
                decision.target_status()
            } else {
                current.status
            };
            return Err(already_responded(decision, status));
        }

        tracing::info!(booking_id = %booking.id, status = %booking.status, "booking answered");

        if let Err(e) = self.notifier.booking_responded(&booking).await {
            tracing::error!(booking_id = %booking.id, "failed to notify guest: {}", e);
        }

        let mut views = self.populate(vec![booking], true, false).await?;
        views
            .pop()
            .ok_or_else(|| CoreError::InternalError("booking vanished while populating".to_string()))
    }

    /// Read a booking; only its guest or host may see it.
    pub async fn get(&self, booking_id: Uuid, viewer: Uuid) -> CoreResult<BookingView> {
        let booking = self.load(booking_id).await?;

        if !booking.is_participant(viewer) {
            return Err(CoreError::Forbidden(
                "You are not authorized to view this booking".to_string(),
            ));
        }

        let mut views = self.populate(vec![booking], true, true).await?;
        views
            .pop()
            .ok_or_else(|| CoreError::InternalError("booking vanished while populating".to_string()))
    }

    pub async fn list_for_host(
        &self,
        host_id: Uuid,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> CoreResult<BookingPage> {
        let query = BookingQuery {
            party: BookingParty::Host(host_id),
            status,
        };
        let (bookings, total) = self.bookings.list(&query, page).await?;
        let summary = self.bookings.count_by_status(host_id).await?;

        Ok(BookingPage {
            bookings: self.populate(bookings, true, false).await?,
            pagination: PageMeta::new(page, total),
            summary: Some(summary),
        })
    }

    pub async fn list_for_guest(
        &self,
        guest_id: Uuid,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> CoreResult<BookingPage> {
        let query = BookingQuery {
            party: BookingParty::Guest(guest_id),
            status,
        };
        let (bookings, total) = self.bookings.list(&query, page).await?;

        Ok(BookingPage {
            bookings: self.populate(bookings, false, true).await?,
            pagination: PageMeta::new(page, total),
            summary: None,
        })
    }

    async fn load(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found".to_string()))
    }

    /// Resolve guest/host/post references with one batched lookup per collection.
    async fn populate(
        &self,
        bookings: Vec<Booking>,
        with_guest: bool,
        with_host: bool,
    ) -> CoreResult<Vec<BookingView>> {
        let mut user_ids: Vec<Uuid> = Vec::new();
        for b in &bookings {
            if with_guest {
                user_ids.push(b.guest_id);
            }
            if with_host {
                user_ids.push(b.host_id);
            }
        }
        user_ids.sort();
        user_ids.dedup();

        let mut post_ids: Vec<Uuid> = bookings.iter().map(|b| b.post_id).collect();
        post_ids.sort();
        post_ids.dedup();

        let users: HashMap<Uuid, UserSummary> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            self.users
                .find_many(&user_ids)
                .await?
                .into_iter()
                .map(|u| (u.id, u.summary()))
                .collect()
        };

        let posts: HashMap<Uuid, PostSummary> = if post_ids.is_empty() {
            HashMap::new()
        } else {
            self.posts
                .find_many(&post_ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p.summary()))
                .collect()
        };

        Ok(bookings
            .into_iter()
            .map(|booking| BookingView {
                guest: with_guest.then(|| users.get(&booking.guest_id).cloned()).flatten(),
                host: with_host.then(|| users.get(&booking.host_id).cloned()).flatten(),
                post: posts.get(&booking.post_id).cloned(),
                booking,
            })
            .collect())
    }
}
