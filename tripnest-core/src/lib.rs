pub mod booking;
pub mod booking_service;
pub mod credentials;
pub mod notification;
pub mod notifier;
pub mod post;
pub mod repository;
pub mod search;
pub mod user;

pub use booking::{Booking, BookingStatus, BookingView, HostDecision, StatusSummary};
pub use booking_service::{BookingPage, BookingService};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use notifier::NotificationEmitter;
pub use post::{Post, PostStatus, PostType};
pub use user::{Role, User, UserLocation, UserSummary};

/// Error type shared by repositories. Backends box whatever their driver returns.
pub type RepoError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Storage failure: {0}")]
    StorageError(#[from] RepoError),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
