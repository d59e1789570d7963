use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::{Role, User};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Plan,
    Experience,
    Trek,
    Service,
}

impl PostType {
    pub const ALL: [PostType; 4] = [PostType::Plan, PostType::Experience, PostType::Trek, PostType::Service];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Plan => "plan",
            PostType::Experience => "experience",
            PostType::Trek => "trek",
            PostType::Service => "service",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(PostType::Plan),
            "experience" => Ok(PostType::Experience),
            "trek" => Ok(PostType::Trek),
            "service" => Ok(PostType::Service),
            other => Err(CoreError::ValidationError(format!("Invalid post type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Active,
    Inactive,
    Draft,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Inactive => "inactive",
            PostStatus::Draft => "draft",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PostStatus::Active),
            "inactive" => Ok(PostStatus::Inactive),
            "draft" => Ok(PostStatus::Draft),
            other => Err(CoreError::ValidationError(format!("Invalid post status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Location {
    /// Overlay the fields present in `other`.
    pub fn merge(&mut self, other: Location) {
        if other.city.is_some() {
            self.city = other.city;
        }
        if other.state.is_some() {
            self.state = other.state;
        }
        if other.country.is_some() {
            self.country = other.country;
        }
    }

    /// Case-insensitive substring match on city, state or country.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.city, &self.state, &self.country]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub per_person: Option<f64>,
    pub total: Option<f64>,
    pub amount: Option<f64>,
}

impl Price {
    /// Amount owed for `people` travellers: per-person rate times head count,
    /// else the fixed total, else the flat amount, else zero. Non-positive
    /// components are treated as unset.
    pub fn quote(&self, people: u32) -> f64 {
        fn set(v: Option<f64>) -> Option<f64> {
            v.filter(|x| *x > 0.0)
        }

        set(self.per_person)
            .map(|rate| rate * f64::from(people))
            .or_else(|| set(self.total))
            .or_else(|| set(self.amount))
            .unwrap_or(0.0)
    }

    pub fn merge(&mut self, other: Price) {
        if other.per_person.is_some() {
            self.per_person = other.per_person;
        }
        if other.total.is_some() {
            self.total = other.total;
        }
        if other.amount.is_some() {
            self.amount = other.amount;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub max_people: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TripDuration {
    pub days: Option<u32>,
    pub nights: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    pub user: Uuid,
    pub name: String,
    pub emoji: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Added,
    Updated,
    Removed,
}

impl ReactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionAction::Added => "added",
            ReactionAction::Updated => "updated",
            ReactionAction::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUser {
    pub user_id: Uuid,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmojiStats {
    pub count: usize,
    pub users: Vec<ReactionUser>,
}

/// Apply one user's reaction to a reaction list. Backends call this inside
/// their own lock or transaction.
pub fn toggle_reaction(
    reactions: &mut Vec<Reaction>,
    user: Uuid,
    name: String,
    emoji: &str,
    now: DateTime<Utc>,
) -> ReactionAction {
    match reactions.iter().position(|r| r.user == user) {
        Some(idx) if reactions[idx].emoji == emoji => {
            reactions.remove(idx);
            ReactionAction::Removed
        }
        Some(idx) => {
            let existing = &mut reactions[idx];
            existing.emoji = emoji.to_string();
            existing.name = name;
            existing.timestamp = now;
            ReactionAction::Updated
        }
        None => {
            reactions.push(Reaction {
                user,
                name,
                emoji: emoji.to_string(),
                timestamp: now,
            });
            ReactionAction::Added
        }
    }
}

/// A bookable listing: itinerary (`plan`), experience, trek or service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub owner_id: Uuid,
    #[serde(rename = "userRole")]
    pub owner_role: Role,
    pub post_type: PostType,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: String,
    pub location: Location,
    pub price: Price,
    pub capacity: Capacity,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub amenities: Vec<String>,
    pub difficulty: Option<String>,
    pub duration: Option<TripDuration>,
    pub plan_name: Option<String>,
    pub status: PostStatus,
    pub rating_average: f64,
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new post. Title and description are required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub capacity: Capacity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub difficulty: Option<String>,
    pub duration: Option<TripDuration>,
    pub plan_name: Option<String>,
    pub status: Option<PostStatus>,
}

/// Partial update. Absent fields are left untouched; location and price are merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub price: Option<Price>,
    pub capacity: Option<Capacity>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub difficulty: Option<String>,
    pub duration: Option<TripDuration>,
    pub plan_name: Option<String>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub post_type: PostType,
    pub location: Location,
    pub price: Price,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Post {
    pub fn create(owner: &User, post_type: PostType, draft: PostDraft) -> CoreResult<Self> {
        let (title, description) = match (non_blank(draft.title), non_blank(draft.description)) {
            (Some(t), Some(d)) => (t, d),
            _ => {
                return Err(CoreError::ValidationError(
                    "Title and description are required".to_string(),
                ))
            }
        };

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            owner_role: owner.role,
            post_type,
            title,
            subtitle: non_blank(draft.subtitle),
            description,
            location: draft.location,
            price: draft.price,
            capacity: draft.capacity,
            tags: draft.tags,
            categories: draft.categories,
            amenities: draft.amenities,
            difficulty: draft.difficulty,
            duration: draft.duration,
            plan_name: non_blank(draft.plan_name),
            status: draft.status.unwrap_or_default(),
            rating_average: 0.0,
            reactions: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, update: PostUpdate) {
        if let Some(title) = non_blank(update.title) {
            self.title = title;
        }
        if let Some(subtitle) = non_blank(update.subtitle) {
            self.subtitle = Some(subtitle);
        }
        if let Some(description) = non_blank(update.description) {
            self.description = description;
        }
        if let Some(location) = update.location {
            self.location.merge(location);
        }
        if let Some(price) = update.price {
            self.price.merge(price);
        }
        if let Some(capacity) = update.capacity {
            if capacity.max_people.is_some() {
                self.capacity = capacity;
            }
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(categories) = update.categories {
            self.categories = categories;
        }
        if let Some(amenities) = update.amenities {
            self.amenities = amenities;
        }
        if update.difficulty.is_some() {
            self.difficulty = update.difficulty;
        }
        if update.duration.is_some() {
            self.duration = update.duration;
        }
        if let Some(plan_name) = non_blank(update.plan_name) {
            self.plan_name = Some(plan_name);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }

    pub fn is_bookable(&self) -> bool {
        self.status == PostStatus::Active
    }

    /// One reaction per user: the same emoji again removes it, a different one replaces it.
    pub fn toggle_reaction(
        &mut self,
        user: Uuid,
        name: String,
        emoji: &str,
        now: DateTime<Utc>,
    ) -> ReactionAction {
        self.updated_at = now;
        toggle_reaction(&mut self.reactions, user, name, emoji, now)
    }

    pub fn reaction_of(&self, user: Uuid) -> Option<&str> {
        self.reactions
            .iter()
            .find(|r| r.user == user)
            .map(|r| r.emoji.as_str())
    }

    pub fn reaction_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for reaction in &self.reactions {
            *counts.entry(reaction.emoji.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn reaction_stats(&self) -> BTreeMap<String, EmojiStats> {
        let mut stats: BTreeMap<String, EmojiStats> = BTreeMap::new();
        for reaction in &self.reactions {
            let entry = stats.entry(reaction.emoji.clone()).or_insert(EmojiStats {
                count: 0,
                users: Vec::new(),
            });
            entry.count += 1;
            entry.users.push(ReactionUser {
                user_id: reaction.user,
                name: reaction.name.clone(),
                timestamp: reaction.timestamp,
            });
        }
        stats
    }

    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            title: self.title.clone(),
            post_type: self.post_type,
            location: self.location.clone(),
            price: self.price.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> User {
        User::new(
            "Meera".into(),
            "Iyer".into(),
            "meera@example.com".into(),
            String::new(),
            Role::Host,
        )
    }

    fn draft() -> PostDraft {
        PostDraft {
            title: Some("Coorg coffee trail".into()),
            description: Some("Three days between estates".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_price_quote_order() {
        let per_person = Price { per_person: Some(50.0), total: Some(999.0), amount: Some(1.0) };
        assert_eq!(per_person.quote(3), 150.0);

        let total = Price { per_person: None, total: Some(400.0), amount: Some(10.0) };
        assert_eq!(total.quote(3), 400.0);

        let amount = Price { per_person: Some(0.0), total: None, amount: Some(75.0) };
        assert_eq!(amount.quote(2), 75.0);

        assert_eq!(Price::default().quote(4), 0.0);
    }

    #[test]
    fn test_create_requires_title_and_description() {
        let owner = host();
        let err = Post::create(
            &owner,
            PostType::Plan,
            PostDraft { title: Some("  ".into()), ..draft() },
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let post = Post::create(&owner, PostType::Plan, draft()).unwrap();
        assert_eq!(post.owner_id, owner.id);
        assert_eq!(post.status, PostStatus::Active);
        assert!(post.is_bookable());
    }

    #[test]
    fn test_toggle_reaction() {
        let mut post = Post::create(&host(), PostType::Plan, draft()).unwrap();
        let fan = Uuid::new_v4();
        let now = Utc::now();

        assert_eq!(post.toggle_reaction(fan, "Ravi K".into(), "🔥", now), ReactionAction::Added);
        assert_eq!(post.reaction_of(fan), Some("🔥"));

        assert_eq!(post.toggle_reaction(fan, "Ravi K".into(), "😍", now), ReactionAction::Updated);
        assert_eq!(post.reactions.len(), 1);
        assert_eq!(post.reaction_of(fan), Some("😍"));

        assert_eq!(post.toggle_reaction(fan, "Ravi K".into(), "😍", now), ReactionAction::Removed);
        assert!(post.reactions.is_empty());
        assert_eq!(post.reaction_of(fan), None);
    }

    #[test]
    fn test_reaction_stats() {
        let mut post = Post::create(&host(), PostType::Plan, draft()).unwrap();
        let now = Utc::now();
        post.toggle_reaction(Uuid::new_v4(), "A".into(), "🔥", now);
        post.toggle_reaction(Uuid::new_v4(), "B".into(), "🔥", now);
        post.toggle_reaction(Uuid::new_v4(), "C".into(), "👍", now);

        let counts = post.reaction_counts();
        assert_eq!(counts["🔥"], 2);
        assert_eq!(counts["👍"], 1);

        let stats = post.reaction_stats();
        assert_eq!(stats["🔥"].users.len(), 2);
    }

    #[test]
    fn test_apply_merges_location_and_price() {
        let mut post = Post::create(
            &host(),
            PostType::Plan,
            PostDraft {
                location: Location { city: Some("Madikeri".into()), state: Some("Karnataka".into()), country: None },
                price: Price { per_person: Some(40.0), ..Default::default() },
                ..draft()
            },
        )
        .unwrap();

        post.apply(PostUpdate {
            location: Some(Location { country: Some("India".into()), ..Default::default() }),
            price: Some(Price { total: Some(300.0), ..Default::default() }),
            status: Some(PostStatus::Inactive),
            ..Default::default()
        });

        assert_eq!(post.location.city.as_deref(), Some("Madikeri"));
        assert_eq!(post.location.country.as_deref(), Some("India"));
        assert_eq!(post.price.per_person, Some(40.0));
        assert_eq!(post.price.total, Some(300.0));
        assert!(!post.is_bookable());
    }

    #[test]
    fn test_location_mentions() {
        let loc = Location { city: Some("Manali".into()), state: Some("Himachal Pradesh".into()), country: Some("India".into()) };
        assert!(loc.mentions("manali"));
        assert!(loc.mentions("HIMACHAL"));
        assert!(!loc.mentions("goa"));
    }
}
