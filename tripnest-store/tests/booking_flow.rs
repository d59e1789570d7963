use chrono::{TimeZone, Utc};
use tripnest_core::booking::CreateBookingRequest;
use tripnest_core::post::{Capacity, Location, PostDraft, Price};
use tripnest_core::{
    BookingService, BookingStatus, CoreError, HostDecision, NotificationEmitter, Post, PostStatus,
    PostType, Role, User,
};
use tripnest_shared::PageRequest;
use tripnest_store::Repositories;
use uuid::Uuid;

struct Fixture {
    repos: Repositories,
    service: BookingService,
    host: User,
    guest: User,
    post: Post,
}

async fn fixture(price: Price) -> Fixture {
    let repos = Repositories::in_memory();
    let service = BookingService::new(
        repos.bookings.clone(),
        repos.posts.clone(),
        repos.users.clone(),
        NotificationEmitter::new(repos.notifications.clone()),
    );

    let host = User::new("Hema".into(), "Rao".into(), "hema@example.com".into(), String::new(), Role::Host);
    let guest = User::new("Gil".into(), "Park".into(), "gil@example.com".into(), String::new(), Role::Guest);
    repos.users.insert(&host).await.unwrap();
    repos.users.insert(&guest).await.unwrap();

    let post = Post::create(
        &host,
        PostType::Experience,
        PostDraft {
            title: Some("Backwater kayaking".into()),
            description: Some("Half day on the canals".into()),
            location: Location { city: Some("Alleppey".into()), state: Some("Kerala".into()), country: Some("India".into()) },
            price,
            capacity: Capacity { max_people: Some(6) },
            ..Default::default()
        },
    )
    .unwrap();
    repos.posts.insert(&post).await.unwrap();

    Fixture { repos, service, host, guest, post }
}

fn request(post_id: Uuid, people: u32) -> CreateBookingRequest {
    CreateBookingRequest {
        post_id: Some(post_id),
        number_of_people: Some(people),
        start_date: Some(Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap()),
        end_date: None,
        guest_message: Some("Vegetarian meals please".into()),
    }
}

#[tokio::test]
async fn test_create_prices_per_person_and_notifies_host() {
    let f = fixture(Price { per_person: Some(50.0), total: Some(999.0), amount: None }).await;

    let view = f.service.create(f.guest.id, request(f.post.id, 3)).await.unwrap();
    assert_eq!(view.booking.status, BookingStatus::Pending);
    assert_eq!(view.booking.total_amount, 150.0);
    assert_eq!(view.booking.host_id, f.host.id);
    assert_eq!(view.guest.as_ref().map(|g| g.id), Some(f.guest.id));

    let (inbox, total) = f
        .repos
        .notifications
        .list(f.host.id, true, PageRequest::new(None, None, 20))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(inbox[0].title, "New Booking Request");
    assert_eq!(inbox[0].message, "Gil Park has requested to book \"Backwater kayaking\"");
    assert_eq!(inbox[0].sender_id, Some(f.guest.id));
}

#[tokio::test]
async fn test_create_falls_back_to_total_then_zero() {
    let f = fixture(Price { per_person: None, total: Some(400.0), amount: Some(10.0) }).await;
    let view = f.service.create(f.guest.id, request(f.post.id, 2)).await.unwrap();
    assert_eq!(view.booking.total_amount, 400.0);

    let free = fixture(Price::default()).await;
    let view = free.service.create(free.guest.id, request(free.post.id, 2)).await.unwrap();
    assert_eq!(view.booking.total_amount, 0.0);
}

#[tokio::test]
async fn test_create_rejections() {
    let mut f = fixture(Price::default()).await;

    let own = f.service.create(f.host.id, request(f.post.id, 1)).await.unwrap_err();
    assert!(matches!(own, CoreError::ValidationError(ref m) if m == "You cannot book your own trip"));

    let missing = f.service.create(f.guest.id, request(Uuid::new_v4(), 1)).await.unwrap_err();
    assert!(matches!(missing, CoreError::NotFound(_)));

    let crowd = f.service.create(f.guest.id, request(f.post.id, 7)).await.unwrap_err();
    assert!(matches!(crowd, CoreError::ValidationError(_)));

    let incomplete = CreateBookingRequest { post_id: Some(f.post.id), ..Default::default() };
    let err = f.service.create(f.guest.id, incomplete).await.unwrap_err();
    assert_eq!(err.to_string(), "Post ID, number of people, and start date are required");

    f.post.status = PostStatus::Inactive;
    f.repos.posts.update(&f.post).await.unwrap();
    let closed = f.service.create(f.guest.id, request(f.post.id, 1)).await.unwrap_err();
    assert_eq!(closed.to_string(), "This trip is not available for booking");
}

#[tokio::test]
async fn test_only_host_may_respond() {
    let f = fixture(Price::default()).await;
    let booking = f.service.create(f.guest.id, request(f.post.id, 1)).await.unwrap().booking;

    let err = f
        .service
        .respond(booking.id, f.guest.id, HostDecision::Accept, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(err.to_string(), "You are not authorized to accept this booking");

    let stored = f.repos.bookings.find_by_id(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_second_response_conflicts() {
    let f = fixture(Price::default()).await;
    let booking = f.service.create(f.guest.id, request(f.post.id, 2)).await.unwrap().booking;

    let declined = f
        .service
        .respond(booking.id, f.host.id, HostDecision::Decline, Some("Fully booked".into()))
        .await
        .unwrap();
    assert_eq!(declined.booking.status, BookingStatus::Declined);
    assert_eq!(declined.booking.host_response, "Fully booked");
    assert!(declined.booking.responded_at.is_some());

    let err = f
        .service
        .respond(booking.id, f.host.id, HostDecision::Accept, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(err.to_string(), "Cannot accept a booking that is already declined");

    let (inbox, _) = f
        .repos
        .notifications
        .list(f.guest.id, false, PageRequest::new(None, None, 20))
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Booking Declined");
}

#[tokio::test]
async fn test_concurrent_responses_have_one_winner() {
    let f = fixture(Price::default()).await;
    let booking = f.service.create(f.guest.id, request(f.post.id, 2)).await.unwrap().booking;

    let (accept, decline) = tokio::join!(
        f.service.respond(booking.id, f.host.id, HostDecision::Accept, None),
        f.service.respond(booking.id, f.host.id, HostDecision::Decline, None),
    );

    let (winner, loser) = match (accept, decline) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        (a, d) => panic!("expected exactly one success, got {:?} and {:?}", a.is_ok(), d.is_ok()),
    };
    assert!(matches!(loser, CoreError::Conflict(_)), "{}", loser);

    let stored = f.repos.bookings.find_by_id(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, winner.booking.status);

    let (inbox, _) = f
        .repos
        .notifications
        .list(f.guest.id, false, PageRequest::new(None, None, 20))
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);
}

#[tokio::test]
async fn test_party_at_capacity_is_accepted() {
    let f = fixture(Price { per_person: Some(10.0), ..Default::default() }).await;
    let view = f.service.create(f.guest.id, request(f.post.id, 6)).await.unwrap();
    assert_eq!(view.booking.number_of_people, 6);
    assert_eq!(view.booking.total_amount, 60.0);
}

#[tokio::test]
async fn test_get_is_limited_to_participants() {
    let f = fixture(Price::default()).await;
    let booking = f.service.create(f.guest.id, request(f.post.id, 1)).await.unwrap().booking;

    let seen = f.service.get(booking.id, f.host.id).await.unwrap();
    assert_eq!(seen.host.as_ref().map(|h| h.id), Some(f.host.id));

    let err = f.service.get(booking.id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = f.service.get(Uuid::new_v4(), f.host.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Booking not found");
}

#[tokio::test]
async fn test_host_listing_carries_summary() {
    let f = fixture(Price { per_person: Some(20.0), ..Default::default() }).await;
    let first = f.service.create(f.guest.id, request(f.post.id, 1)).await.unwrap().booking;
    f.service.create(f.guest.id, request(f.post.id, 2)).await.unwrap();
    f.service.create(f.guest.id, request(f.post.id, 3)).await.unwrap();
    f.service
        .respond(first.id, f.host.id, HostDecision::Accept, None)
        .await
        .unwrap();

    let page = f
        .service
        .list_for_host(f.host.id, Some(BookingStatus::Pending), PageRequest::new(Some(1), Some(1), 10))
        .await
        .unwrap();
    assert_eq!(page.bookings.len(), 1);
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.pagination.total_pages, 2);

    let summary = page.summary.unwrap();
    assert_eq!((summary.pending, summary.accepted, summary.declined, summary.total), (2, 1, 0, 3));

    let mine = f
        .service
        .list_for_guest(f.guest.id, None, PageRequest::new(None, None, 10))
        .await
        .unwrap();
    assert_eq!(mine.pagination.total, 3);
    assert!(mine.summary.is_none());
    assert!(mine.bookings.iter().all(|b| b.host.is_some() && b.guest.is_none()));
}
