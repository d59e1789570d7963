//! In-process backend used for local runs and tests.
//!
//! Each collection sits behind its own lock. The booking response guard is
//! checked under the write lock so it behaves like the conditional UPDATE in
//! the Postgres backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tripnest_core::post::{toggle_reaction, Reaction, ReactionAction};
use tripnest_core::repository::{
    AlreadyExists, BookingQuery, BookingRepository, NotificationRepository, PostFilter, PostRepository,
    PostSort, RepoResult, UserRepository,
};
use tripnest_core::{Booking, BookingStatus, Notification, Post, PostStatus, StatusSummary, User};
use tripnest_shared::PageRequest;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    posts: RwLock<HashMap<Uuid, Post>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    notifications: RwLock<HashMap<Uuid, Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let rows = items
        .into_iter()
        .skip(offset)
        .take(page.limit as usize)
        .collect();
    (rows, total)
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &User) -> RepoResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AlreadyExists(format!("email for user {}", user.id)).into());
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn update(&self, user: &User) -> RepoResult<()> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_all(&self) -> RepoResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        if self.users.write().await.remove(&id).is_none() {
            return Ok(false);
        }
        // Same cascade as the foreign keys in the Postgres schema.
        self.posts.write().await.retain(|_, p| p.owner_id != id);
        self.bookings
            .write()
            .await
            .retain(|_, b| b.guest_id != id && b.host_id != id);
        let mut notifications = self.notifications.write().await;
        notifications.retain(|_, n| n.recipient_id != id);
        for n in notifications.values_mut() {
            if n.sender_id == Some(id) {
                n.sender_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert(&self, post: &Post) -> RepoResult<()> {
        self.posts.write().await.insert(post.id, post.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Post>> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<Post>> {
        let posts = self.posts.read().await;
        Ok(ids.iter().filter_map(|id| posts.get(id).cloned()).collect())
    }

    async fn update(&self, post: &Post) -> RepoResult<()> {
        let mut posts = self.posts.write().await;
        let mut updated = post.clone();
        if let Some(stored) = posts.get(&post.id) {
            updated.reactions = stored.reactions.clone();
        }
        posts.insert(post.id, updated);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.posts.write().await.remove(&id).is_some())
    }

    async fn find_by_owner(&self, owner: Uuid, status: Option<PostStatus>) -> RepoResult<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .posts
            .read()
            .await
            .values()
            .filter(|p| p.owner_id == owner && status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(posts)
    }

    async fn toggle_reaction(
        &self,
        id: Uuid,
        user: Uuid,
        name: String,
        emoji: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<(ReactionAction, Vec<Reaction>)>> {
        let mut posts = self.posts.write().await;
        Ok(posts.get_mut(&id).map(|post| {
            let action = post.toggle_reaction(user, name, emoji, now);
            (action, post.reactions.clone())
        }))
    }

    async fn search(
        &self,
        filter: &PostFilter,
        sort: PostSort,
        page: PageRequest,
    ) -> RepoResult<(Vec<Post>, u64)> {
        let mut matched: Vec<Post> = self
            .posts
            .read()
            .await
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            sort.compare(a, b)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paginate(matched, page))
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert(&self, booking: &Booking) -> RepoResult<()> {
        self.bookings.write().await.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn apply_response(&self, booking: &Booking) -> RepoResult<bool> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&booking.id) {
            Some(stored) if stored.status == BookingStatus::Pending => {
                stored.status = booking.status;
                stored.host_response = booking.host_response.clone();
                stored.responded_at = booking.responded_at;
                stored.updated_at = booking.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, query: &BookingQuery, page: PageRequest) -> RepoResult<(Vec<Booking>, u64)> {
        let mut matched: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(matched, page))
    }

    async fn count_by_status(&self, host_id: Uuid) -> RepoResult<StatusSummary> {
        let bookings = self.bookings.read().await;
        let count = |status: BookingStatus| {
            bookings
                .values()
                .filter(|b| b.host_id == host_id && b.status == status)
                .count() as u64
        };
        Ok(StatusSummary::new(
            count(BookingStatus::Pending),
            count(BookingStatus::Accepted),
            count(BookingStatus::Declined),
        ))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: &Notification) -> RepoResult<()> {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list(
        &self,
        recipient: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> RepoResult<(Vec<Notification>, u64)> {
        let mut matched: Vec<Notification> = self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| n.recipient_id == recipient && !(unread_only && n.read))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(matched, page))
    }

    async fn count_unread(&self, recipient: Uuid) -> RepoResult<u64> {
        Ok(self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| n.recipient_id == recipient && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, id: Uuid, recipient: Uuid) -> RepoResult<Option<Notification>> {
        let mut notifications = self.notifications.write().await;
        Ok(notifications
            .get_mut(&id)
            .filter(|n| n.recipient_id == recipient)
            .map(|n| {
                n.read = true;
                n.clone()
            }))
    }

    async fn mark_all_read(&self, recipient: Uuid) -> RepoResult<u64> {
        let mut changed = 0;
        for n in self.notifications.write().await.values_mut() {
            if n.recipient_id == recipient && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, id: Uuid, recipient: Uuid) -> RepoResult<bool> {
        let mut notifications = self.notifications.write().await;
        if notifications.get(&id).is_some_and(|n| n.recipient_id == recipient) {
            notifications.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn clear(&self, recipient: Uuid) -> RepoResult<u64> {
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|_, n| n.recipient_id != recipient);
        Ok((before - notifications.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tripnest_core::{NewNotification, NotificationKind};

    fn note(recipient: Uuid, offset_secs: i64) -> Notification {
        let mut n = Notification::from_new(
            NewNotification {
                recipient_id: recipient,
                sender_id: None,
                title: "t".into(),
                message: "m".into(),
                kind: NotificationKind::Info,
                link: None,
                metadata: serde_json::json!({}),
            },
            Utc::now(),
        );
        n.created_at += Duration::seconds(offset_secs);
        n
    }

    #[tokio::test]
    async fn test_notifications_are_scoped_to_recipient() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let older = note(alice, 0);
        let newer = note(alice, 10);
        let other = note(bob, 5);
        for n in [&older, &newer, &other] {
            NotificationRepository::insert(&store, n).await.unwrap();
        }

        let (page, total) = NotificationRepository::list(&store, alice, false, PageRequest::new(None, None, 20))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id, newer.id);

        assert!(store.mark_read(other.id, alice).await.unwrap().is_none());
        assert!(!NotificationRepository::delete(&store, other.id, alice).await.unwrap());

        assert!(store.mark_read(older.id, alice).await.unwrap().unwrap().read);
        assert_eq!(store.count_unread(alice).await.unwrap(), 1);
        assert_eq!(store.mark_all_read(alice).await.unwrap(), 1);
        assert_eq!(store.clear(alice).await.unwrap(), 2);
        assert_eq!(store.count_unread(bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let first = User::new("A".into(), "B".into(), "dup@example.com".into(), String::new(), tripnest_core::Role::Guest);
        let second = User::new("C".into(), "D".into(), "DUP@example.com".into(), String::new(), tripnest_core::Role::Guest);
        UserRepository::insert(&store, &first).await.unwrap();
        let err = UserRepository::insert(&store, &second).await.unwrap_err();
        assert!(tripnest_core::repository::is_already_exists(&err));
        let found = store.find_by_email("Dup@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_reaction_toggle_keeps_concurrent_edits() {
        use tripnest_core::post::PostDraft;
        use tripnest_core::PostType;

        let store = MemoryStore::new();
        let owner = User::new("H".into(), "O".into(), "h@o.com".into(), String::new(), tripnest_core::Role::Host);
        let post = Post::create(
            &owner,
            PostType::Plan,
            PostDraft {
                title: Some("Old title".into()),
                description: Some("d".into()),
                ..Default::default()
            },
        )
        .unwrap();
        PostRepository::insert(&store, &post).await.unwrap();

        // An edit lands between a reader loading the post and its reaction.
        let mut edited = post.clone();
        edited.title = "New title".into();
        PostRepository::update(&store, &edited).await.unwrap();

        let reader = Uuid::new_v4();
        let (action, reactions) = store
            .toggle_reaction(post.id, reader, "R".into(), "🔥", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(action, ReactionAction::Added);
        assert_eq!(reactions.len(), 1);

        let stored = PostRepository::find_by_id(&store, post.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "New title");
        assert_eq!(stored.reactions.len(), 1);

        // A stale copy saved afterwards does not drop the reaction.
        PostRepository::update(&store, &edited).await.unwrap();
        let stored = PostRepository::find_by_id(&store, post.id).await.unwrap().unwrap();
        assert_eq!(stored.reactions.len(), 1);

        assert!(store
            .toggle_reaction(Uuid::new_v4(), reader, "R".into(), "🔥", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() {
        let store = MemoryStore::new();
        let gone = User::new("G".into(), "O".into(), "gone@example.com".into(), String::new(), tripnest_core::Role::Guest);
        let stays = User::new("S".into(), "T".into(), "stays@example.com".into(), String::new(), tripnest_core::Role::Guest);
        UserRepository::insert(&store, &gone).await.unwrap();
        UserRepository::insert(&store, &stays).await.unwrap();
        NotificationRepository::insert(&store, &note(gone.id, 0)).await.unwrap();
        let mut from_gone = note(stays.id, 0);
        from_gone.sender_id = Some(gone.id);
        NotificationRepository::insert(&store, &from_gone).await.unwrap();

        assert!(UserRepository::delete(&store, gone.id).await.unwrap());
        assert!(!UserRepository::delete(&store, gone.id).await.unwrap());
        assert_eq!(store.count_unread(gone.id).await.unwrap(), 0);

        let (left, _) = NotificationRepository::list(&store, stays.id, false, PageRequest::new(None, None, 20))
            .await
            .unwrap();
        assert_eq!(left[0].sender_id, None);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
