use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::post::{Post, PostSummary, PostType};
use crate::user::UserSummary;
use crate::{CoreError, CoreResult};

/// Party sizes are stored as a signed 32-bit column.
pub const MAX_PEOPLE: u32 = i32::MAX as u32;

/// Booking status in the lifecycle. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Declined,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "accepted" => Ok(BookingStatus::Accepted),
            "declined" => Ok(BookingStatus::Declined),
            other => Err(CoreError::ValidationError(format!(
                "Invalid booking status '{}'. Must be 'pending', 'accepted', or 'declined'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDecision {
    Accept,
    Decline,
}

impl HostDecision {
    pub fn target_status(&self) -> BookingStatus {
        match self {
            HostDecision::Accept => BookingStatus::Accepted,
            HostDecision::Decline => BookingStatus::Declined,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            HostDecision::Accept => "accept",
            HostDecision::Decline => "decline",
        }
    }
}

/// A guest's reservation request against a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub post_id: Uuid,
    pub post_type: PostType,
    pub post_title: String,
    pub number_of_people: u32,
    pub total_amount: f64,
    pub booking_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub guest_message: String,
    pub status: BookingStatus,
    pub host_response: String,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw booking request as it arrives from a client. Every field is optional
/// so that missing values surface as a single validation message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub post_id: Option<Uuid>,
    pub number_of_people: Option<u32>,
    #[serde(default, deserialize_with = "tripnest_shared::dates::deserialize_optional")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "tripnest_shared::dates::deserialize_optional")]
    pub end_date: Option<DateTime<Utc>>,
    pub guest_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidBookingRequest {
    pub post_id: Uuid,
    pub number_of_people: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub guest_message: String,
}

impl CreateBookingRequest {
    pub fn validate(self) -> CoreResult<ValidBookingRequest> {
        let (post_id, number_of_people, start_date) =
            match (self.post_id, self.number_of_people.filter(|n| *n > 0), self.start_date) {
                (Some(p), Some(n), Some(s)) => (p, n, s),
                _ => {
                    return Err(CoreError::ValidationError(
                        "Post ID, number of people, and start date are required".to_string(),
                    ))
                }
            };

        if number_of_people > MAX_PEOPLE {
            return Err(CoreError::ValidationError(format!(
                "Number of people cannot exceed {}",
                MAX_PEOPLE
            )));
        }

        if let Some(end) = self.end_date {
            if end < start_date {
                return Err(CoreError::ValidationError(
                    "End date cannot be before start date".to_string(),
                ));
            }
        }

        Ok(ValidBookingRequest {
            post_id,
            number_of_people,
            start_date,
            end_date: self.end_date,
            guest_message: self.guest_message.unwrap_or_default(),
        })
    }
}

impl Booking {
    /// A fresh `pending` booking priced from the post.
    pub fn new_pending(guest_id: Uuid, post: &Post, req: ValidBookingRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            guest_id,
            host_id: post.owner_id,
            post_id: post.id,
            post_type: post.post_type,
            post_title: post.title.clone(),
            number_of_people: req.number_of_people,
            total_amount: post.price.quote(req.number_of_people),
            booking_date: now,
            start_date: req.start_date,
            end_date: req.end_date,
            guest_message: req.guest_message,
            status: BookingStatus::Pending,
            host_response: String::new(),
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user: Uuid) -> bool {
        self.guest_id == user || self.host_id == user
    }

    /// Transition: Pending → Accepted | Declined, only by the host, only once.
    pub fn respond(
        &mut self,
        responder: Uuid,
        decision: HostDecision,
        host_response: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if responder != self.host_id {
            return Err(CoreError::Forbidden(format!(
                "You are not authorized to {} this booking",
                decision.verb()
            )));
        }

        if self.status != BookingStatus::Pending {
            return Err(already_responded(decision, self.status));
        }

        self.status = decision.target_status();
        self.host_response = host_response.unwrap_or_default();
        self.responded_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

pub(crate) fn already_responded(decision: HostDecision, current: BookingStatus) -> CoreError {
    CoreError::Conflict(format!(
        "Cannot {} a booking that is already {}",
        decision.verb(),
        current
    ))
}

/// Per-status counts for a host's dashboard.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub pending: u64,
    pub accepted: u64,
    pub declined: u64,
    pub total: u64,
}

impl StatusSummary {
    pub fn new(pending: u64, accepted: u64, declined: u64) -> Self {
        Self {
            pending,
            accepted,
            declined,
            total: pending + accepted + declined,
        }
    }
}

/// A booking with its guest, host and post references resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<PostSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{PostDraft, Price};
    use crate::user::{Role, User};

    fn priced_post(price: Price) -> Post {
        let owner = User::new("Host".into(), "One".into(), "h@example.com".into(), String::new(), Role::Host);
        Post::create(
            &owner,
            PostType::Experience,
            PostDraft {
                title: Some("Backwater kayak".into()),
                description: Some("Sunrise paddle".into()),
                price,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn request(post: &Post, people: u32) -> ValidBookingRequest {
        CreateBookingRequest {
            post_id: Some(post.id),
            number_of_people: Some(people),
            start_date: Some(Utc::now()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_per_person_pricing() {
        let post = priced_post(Price { per_person: Some(50.0), ..Default::default() });
        let booking = Booking::new_pending(Uuid::new_v4(), &post, request(&post, 3), Utc::now());
        assert_eq!(booking.total_amount, 150.0);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.host_id, post.owner_id);
        assert_eq!(booking.post_title, "Backwater kayak");
    }

    #[test]
    fn test_oversized_party_rejected() {
        let err = CreateBookingRequest {
            post_id: Some(Uuid::new_v4()),
            number_of_people: Some(MAX_PEOPLE + 1),
            start_date: Some(Utc::now()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let post = priced_post(Price::default());
        assert_eq!(request(&post, MAX_PEOPLE).number_of_people, MAX_PEOPLE);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = CreateBookingRequest {
            post_id: Some(Uuid::new_v4()),
            number_of_people: Some(0),
            start_date: Some(Utc::now()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.to_string(), "Post ID, number of people, and start date are required");

        assert!(CreateBookingRequest::default().validate().is_err());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let start = Utc::now();
        let err = CreateBookingRequest {
            post_id: Some(Uuid::new_v4()),
            number_of_people: Some(2),
            start_date: Some(start),
            end_date: Some(start - chrono::Duration::days(1)),
            guest_message: None,
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn test_booking_lifecycle() {
        let post = priced_post(Price { total: Some(200.0), ..Default::default() });
        let mut booking = Booking::new_pending(Uuid::new_v4(), &post, request(&post, 2), Utc::now());

        booking
            .respond(post.owner_id, HostDecision::Accept, Some("See you there".into()), Utc::now())
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Accepted);
        assert_eq!(booking.host_response, "See you there");
        assert!(booking.responded_at.is_some());
    }

    #[test]
    fn test_only_host_may_respond() {
        let post = priced_post(Price::default());
        let guest = Uuid::new_v4();
        let mut booking = Booking::new_pending(guest, &post, request(&post, 1), Utc::now());

        let err = booking.respond(guest, HostDecision::Accept, None, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_second_response_rejected() {
        let post = priced_post(Price::default());
        let mut booking = Booking::new_pending(Uuid::new_v4(), &post, request(&post, 1), Utc::now());

        booking.respond(post.owner_id, HostDecision::Decline, None, Utc::now()).unwrap();
        let err = booking
            .respond(post.owner_id, HostDecision::Accept, None, Utc::now())
            .unwrap_err();

        assert!(matches!(err, CoreError::Conflict(_)));
        assert!(err.to_string().contains("already declined"));
        assert_eq!(booking.status, BookingStatus::Declined);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let post = priced_post(Price { per_person: Some(10.0), ..Default::default() });
        let booking = Booking::new_pending(Uuid::new_v4(), &post, request(&post, 2), Utc::now());
        let view = BookingView { booking, guest: None, host: None, post: Some(post.summary()) };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["numberOfPeople"], 2);
        assert_eq!(json["totalAmount"], 20.0);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["post"]["title"], "Backwater kayak");
        assert!(json.get("guest").is_none());
    }

    #[test]
    fn test_status_summary_total() {
        let summary = StatusSummary::new(2, 3, 1);
        assert_eq!(summary.total, 6);
    }
}
