pub mod auth;

pub use auth::{issue_token, AdminUser, AuthUser, Claims};
