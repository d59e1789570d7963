use std::sync::Arc;

use tripnest_core::{BookingService, NotificationEmitter};
use tripnest_store::Repositories;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub bookings: Arc<BookingService>,
    pub notifier: NotificationEmitter,
    pub auth: AuthConfig,
    /// Include internal error text in 500 responses.
    pub expose_errors: bool,
}

impl AppState {
    pub fn new(repos: Repositories, auth: AuthConfig, expose_errors: bool) -> Self {
        let notifier = NotificationEmitter::new(repos.notifications.clone());
        let bookings = Arc::new(BookingService::new(
            repos.bookings.clone(),
            repos.posts.clone(),
            repos.users.clone(),
            notifier.clone(),
        ));
        Self {
            repos,
            bookings,
            notifier,
            auth,
            expose_errors,
        }
    }
}
