use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::booking::{Booking, BookingStatus};
use crate::notification::{NewNotification, Notification, NotificationKind};
use crate::repository::NotificationRepository;
use crate::user::User;
use crate::CoreResult;

/// Create-only sink for user notifications raised by the booking lifecycle.
#[derive(Clone)]
pub struct NotificationEmitter {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationEmitter {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    pub async fn emit(&self, new: NewNotification) -> CoreResult<Notification> {
        let notification = Notification::from_new(new, Utc::now());
        self.repo.insert(&notification).await?;
        tracing::debug!(
            notification_id = %notification.id,
            recipient = %notification.recipient_id,
            kind = %notification.kind,
            "notification stored"
        );
        Ok(notification)
    }

    /// Tell the host a guest asked to book one of their posts.
    pub async fn booking_requested(&self, booking: &Booking, guest: &User) -> CoreResult<Notification> {
        self.emit(NewNotification {
            recipient_id: booking.host_id,
            sender_id: Some(guest.id),
            title: "New Booking Request".to_string(),
            message: format!(
                "{} has requested to book \"{}\"",
                guest.full_name(),
                booking.post_title
            ),
            kind: NotificationKind::Info,
            link: Some(booking_link(booking)),
            metadata: json!({ "postId": booking.post_id, "bookingId": booking.id }),
        })
        .await
    }

    /// Tell the guest how the host answered. Pending bookings raise nothing.
    pub async fn booking_responded(&self, booking: &Booking) -> CoreResult<Option<Notification>> {
        let (title, message, kind) = match booking.status {
            BookingStatus::Accepted => (
                "Booking Accepted",
                format!("Your booking request for \"{}\" has been accepted!", booking.post_title),
                NotificationKind::Success,
            ),
            BookingStatus::Declined => (
                "Booking Declined",
                format!("Your booking request for \"{}\" has been declined", booking.post_title),
                NotificationKind::Warning,
            ),
            BookingStatus::Pending => return Ok(None),
        };

        self.emit(NewNotification {
            recipient_id: booking.guest_id,
            sender_id: Some(booking.host_id),
            title: title.to_string(),
            message,
            kind,
            link: Some(booking_link(booking)),
            metadata: json!({ "postId": booking.post_id, "bookingId": booking.id }),
        })
        .await
        .map(Some)
    }
}

fn booking_link(booking: &Booking) -> String {
    format!("/bookings/{}", booking.id)
}
