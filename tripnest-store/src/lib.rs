pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod memory;
pub mod notification_repo;
pub mod post_repo;
pub mod user_repo;

use std::sync::Arc;

use tripnest_core::repository::{
    BookingRepository, NotificationRepository, PostRepository, UserRepository,
};

pub use database::DbClient;
pub use memory::MemoryStore;

/// The four collections the API works against, behind trait objects so the
/// backend is picked once at startup.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            posts: store.clone(),
            bookings: store.clone(),
            notifications: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        Self {
            users: Arc::new(user_repo::PgUserRepository::new(db.pool.clone())),
            posts: Arc::new(post_repo::PgPostRepository::new(db.pool.clone())),
            bookings: Arc::new(booking_repo::PgBookingRepository::new(db.pool.clone())),
            notifications: Arc::new(notification_repo::PgNotificationRepository::new(db.pool.clone())),
        }
    }
}
