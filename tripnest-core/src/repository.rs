use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tripnest_shared::PageRequest;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus, StatusSummary};
use crate::notification::Notification;
use crate::post::{Post, PostStatus, PostType, Reaction, ReactionAction};
use crate::user::User;
use crate::RepoError;

pub type RepoResult<T> = Result<T, RepoError>;

/// A unique key (such as an account email) is already taken.
#[derive(Debug, thiserror::Error)]
#[error("{0} already exists")]
pub struct AlreadyExists(pub String);

pub fn is_already_exists(err: &RepoError) -> bool {
    err.downcast_ref::<AlreadyExists>().is_some()
}

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`AlreadyExists`] when the email is taken.
    async fn insert(&self, user: &User) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<User>>;

    async fn update(&self, user: &User) -> RepoResult<()>;

    /// Newest first.
    async fn list_all(&self) -> RepoResult<Vec<User>>;

    /// Removes the account with its posts, bookings and notifications.
    /// Returns false when no user had that id.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

/// Repository trait for posts (itineraries, experiences, treks, services)
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: &Post) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Post>>;

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<Post>>;

    /// Writes every field except reactions, which only change through `toggle_reaction`.
    async fn update(&self, post: &Post) -> RepoResult<()>;

    /// Returns false when no post had that id.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;

    /// Every post of one owner, newest first.
    async fn find_by_owner(&self, owner: Uuid, status: Option<PostStatus>) -> RepoResult<Vec<Post>>;

    /// Toggle one user's reaction without touching the rest of the post.
    /// `None` when the post does not exist.
    async fn toggle_reaction(
        &self,
        id: Uuid,
        user: Uuid,
        name: String,
        emoji: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<(ReactionAction, Vec<Reaction>)>>;

    /// One page of matching posts plus the total match count.
    async fn search(
        &self,
        filter: &PostFilter,
        sort: PostSort,
        page: PageRequest,
    ) -> RepoResult<(Vec<Post>, u64)>;
}

/// Repository trait for bookings
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    /// Persist a host response, but only if the stored booking is still pending.
    /// Returns false when another response got there first.
    async fn apply_response(&self, booking: &Booking) -> RepoResult<bool>;

    /// Newest first.
    async fn list(&self, query: &BookingQuery, page: PageRequest) -> RepoResult<(Vec<Booking>, u64)>;

    async fn count_by_status(&self, host_id: Uuid) -> RepoResult<StatusSummary>;
}

/// Repository trait for notifications. Mutations are scoped to the recipient.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> RepoResult<()>;

    /// Newest first.
    async fn list(
        &self,
        recipient: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> RepoResult<(Vec<Notification>, u64)>;

    async fn count_unread(&self, recipient: Uuid) -> RepoResult<u64>;

    async fn mark_read(&self, id: Uuid, recipient: Uuid) -> RepoResult<Option<Notification>>;

    async fn mark_all_read(&self, recipient: Uuid) -> RepoResult<u64>;

    async fn delete(&self, id: Uuid, recipient: Uuid) -> RepoResult<bool>;

    async fn clear(&self, recipient: Uuid) -> RepoResult<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingParty {
    Host(Uuid),
    Guest(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingQuery {
    pub party: BookingParty,
    pub status: Option<BookingStatus>,
}

impl BookingQuery {
    pub fn matches(&self, booking: &Booking) -> bool {
        let party = match self.party {
            BookingParty::Host(id) => booking.host_id == id,
            BookingParty::Guest(id) => booking.guest_id == id,
        };
        party && self.status.map_or(true, |s| booking.status == s)
    }
}

/// Filters over posts. Empty vectors and `None` mean "no constraint".
/// Text fields match case-insensitively as substrings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub post_types: Vec<PostType>,
    pub status: Option<PostStatus>,
    pub owner: Option<Uuid>,
    /// Free text over title, subtitle, description, city and country.
    pub text: Option<String>,
    /// Title or city only.
    pub title_or_city: Option<String>,
    /// Any of city, state or country.
    pub location: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Match any of these tags.
    pub tags: Vec<String>,
    /// Match any of these categories.
    pub categories: Vec<String>,
    pub difficulty: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        if !self.post_types.is_empty() && !self.post_types.contains(&post.post_type) {
            return false;
        }
        if self.status.is_some_and(|s| post.status != s) {
            return false;
        }
        if self.owner.is_some_and(|o| post.owner_id != o) {
            return false;
        }
        if let Some(text) = &self.text {
            let loc = &post.location;
            let hit = contains_ci(Some(&post.title), text)
                || contains_ci(post.subtitle.as_deref(), text)
                || contains_ci(Some(&post.description), text)
                || contains_ci(loc.city.as_deref(), text)
                || contains_ci(loc.country.as_deref(), text);
            if !hit {
                return false;
            }
        }
        if let Some(needle) = &self.title_or_city {
            if !contains_ci(Some(&post.title), needle) && !contains_ci(post.location.city.as_deref(), needle) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !post.location.mentions(location) {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if !contains_ci(post.location.city.as_deref(), city) {
                return false;
            }
        }
        if let Some(state) = &self.state {
            if !contains_ci(post.location.state.as_deref(), state) {
                return false;
            }
        }
        if let Some(country) = &self.country {
            if !contains_ci(post.location.country.as_deref(), country) {
                return false;
            }
        }
        if !self.tags.is_empty() && !post.tags.iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        if !self.categories.is_empty() && !post.categories.iter().any(|c| self.categories.contains(c)) {
            return false;
        }
        if let Some(difficulty) = &self.difficulty {
            if post.difficulty.as_deref() != Some(difficulty.as_str()) {
                return false;
            }
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            let Some(rate) = post.price.per_person else {
                return false;
            };
            if self.min_price.is_some_and(|min| rate < min) || self.max_price.is_some_and(|max| rate > max) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Rating,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for PostSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl PostSort {
    /// Unknown fields fall back to creation time; anything but `asc` sorts descending.
    pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        let field = match sort_by {
            Some("rating") => SortField::Rating,
            Some("price") => SortField::Price,
            _ => SortField::CreatedAt,
        };
        Self {
            field,
            descending: sort_order != Some("asc"),
        }
    }

    /// Posts without a per-person price sort as the lowest.
    pub fn compare(&self, a: &Post, b: &Post) -> Ordering {
        let ord = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Rating => a.rating_average.total_cmp(&b.rating_average),
            SortField::Price => {
                let pa = a.price.per_person.unwrap_or(f64::MIN);
                let pb = b.price.per_person.unwrap_or(f64::MIN);
                pa.total_cmp(&pb)
            }
        };
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{Location, PostDraft, Price};
    use crate::user::{Role, User};

    fn post(title: &str, city: &str, per_person: Option<f64>, tags: &[&str]) -> Post {
        let owner = User::new("H".into(), "O".into(), "h@o.com".into(), String::new(), Role::Host);
        Post::create(
            &owner,
            PostType::Plan,
            PostDraft {
                title: Some(title.into()),
                description: Some("desc".into()),
                location: Location { city: Some(city.into()), state: None, country: Some("India".into()) },
                price: Price { per_person, ..Default::default() },
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_filter_text_and_location() {
        let p = post("Spiti winter drive", "Kaza", Some(120.0), &["snow"]);
        let by_text = PostFilter { text: Some("WINTER".into()), ..Default::default() };
        assert!(by_text.matches(&p));

        let by_city = PostFilter { city: Some("kaz".into()), ..Default::default() };
        assert!(by_city.matches(&p));

        let elsewhere = PostFilter { location: Some("Goa".into()), ..Default::default() };
        assert!(!elsewhere.matches(&p));
    }

    #[test]
    fn test_title_or_city_ignores_description() {
        let p = post("Spiti winter drive", "Kaza", None, &[]);
        let by_city = PostFilter { title_or_city: Some("KAZA".into()), ..Default::default() };
        assert!(by_city.matches(&p));

        // "desc" only appears in the description.
        let by_description = PostFilter { title_or_city: Some("desc".into()), ..Default::default() };
        assert!(!by_description.matches(&p));
        let by_text = PostFilter { text: Some("desc".into()), ..Default::default() };
        assert!(by_text.matches(&p));
    }

    #[test]
    fn test_already_exists_survives_boxing() {
        let err: RepoError = Box::new(AlreadyExists("email".into()));
        assert!(is_already_exists(&err));
        let other: RepoError = "connection reset".into();
        assert!(!is_already_exists(&other));
    }

    #[test]
    fn test_filter_price_range_and_tags() {
        let p = post("Rishikesh rafting", "Rishikesh", Some(80.0), &["water", "adventure"]);
        let in_range = PostFilter { min_price: Some(50.0), max_price: Some(100.0), ..Default::default() };
        assert!(in_range.matches(&p));

        let too_cheap = PostFilter { max_price: Some(60.0), ..Default::default() };
        assert!(!too_cheap.matches(&p));

        let unpriced = post("Free walk", "Pune", None, &[]);
        assert!(!in_range.matches(&unpriced));

        let tags = PostFilter { tags: vec!["snow".into(), "adventure".into()], ..Default::default() };
        assert!(tags.matches(&p));
        assert!(!tags.matches(&unpriced));
    }

    #[test]
    fn test_sort_by_price() {
        let cheap = post("a", "x", Some(10.0), &[]);
        let pricey = post("b", "x", Some(90.0), &[]);

        let asc = PostSort::parse(Some("price"), Some("asc"));
        assert_eq!(asc.compare(&cheap, &pricey), Ordering::Less);

        let desc = PostSort::parse(Some("price"), None);
        assert_eq!(desc.compare(&cheap, &pricey), Ordering::Greater);

        assert_eq!(PostSort::parse(Some("bogus"), Some("asc")).field, SortField::CreatedAt);
    }
}
