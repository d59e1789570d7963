use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tripnest_core::post::{toggle_reaction, Capacity, Location, Price, Reaction, ReactionAction, TripDuration};
use tripnest_core::repository::{PostFilter, PostRepository, PostSort, RepoResult, SortField};
use tripnest_core::{Post, PostStatus, RepoError};
use tripnest_shared::PageRequest;
use uuid::Uuid;

use crate::database::like_pattern;

pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, owner_id, owner_role, post_type, title, subtitle, description, \
     city, state, country, price_per_person, price_total, price_amount, max_people, \
     tags, categories, amenities, difficulty, duration, plan_name, status, rating_average, \
     reactions, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    owner_id: Uuid,
    owner_role: String,
    post_type: String,
    title: String,
    subtitle: Option<String>,
    description: String,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    price_per_person: Option<f64>,
    price_total: Option<f64>,
    price_amount: Option<f64>,
    max_people: Option<i32>,
    tags: Vec<String>,
    categories: Vec<String>,
    amenities: Vec<String>,
    difficulty: Option<String>,
    duration: Option<Json<TripDuration>>,
    plan_name: Option<String>,
    status: String,
    rating_average: f64,
    reactions: Json<Vec<Reaction>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Post {
            id: row.id,
            owner_id: row.owner_id,
            owner_role: row.owner_role.parse()?,
            post_type: row.post_type.parse()?,
            title: row.title,
            subtitle: row.subtitle,
            description: row.description,
            location: Location {
                city: row.city,
                state: row.state,
                country: row.country,
            },
            price: Price {
                per_person: row.price_per_person,
                total: row.price_total,
                amount: row.price_amount,
            },
            capacity: Capacity {
                max_people: row.max_people.map(u32::try_from).transpose()?,
            },
            tags: row.tags,
            categories: row.categories,
            amenities: row.amenities,
            difficulty: row.difficulty,
            duration: row.duration.map(|d| d.0),
            plan_name: row.plan_name,
            status: row.status.parse()?,
            rating_average: row.rating_average,
            reactions: row.reactions.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn max_people(post: &Post) -> Result<Option<i32>, RepoError> {
    Ok(post.capacity.max_people.map(i32::try_from).transpose()?)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    qb.push(" WHERE TRUE");

    if !filter.post_types.is_empty() {
        let types: Vec<String> = filter.post_types.iter().map(|t| t.as_str().to_string()).collect();
        qb.push(" AND post_type = ANY(").push_bind(types).push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(owner) = filter.owner {
        qb.push(" AND owner_id = ").push_bind(owner);
    }
    if let Some(text) = &filter.text {
        let p = like_pattern(text);
        qb.push(" AND (title ILIKE ").push_bind(p.clone());
        qb.push(" OR subtitle ILIKE ").push_bind(p.clone());
        qb.push(" OR description ILIKE ").push_bind(p.clone());
        qb.push(" OR city ILIKE ").push_bind(p.clone());
        qb.push(" OR country ILIKE ").push_bind(p);
        qb.push(")");
    }
    if let Some(needle) = &filter.title_or_city {
        let p = like_pattern(needle);
        qb.push(" AND (title ILIKE ").push_bind(p.clone());
        qb.push(" OR city ILIKE ").push_bind(p);
        qb.push(")");
    }
    if let Some(location) = &filter.location {
        let p = like_pattern(location);
        qb.push(" AND (city ILIKE ").push_bind(p.clone());
        qb.push(" OR state ILIKE ").push_bind(p.clone());
        qb.push(" OR country ILIKE ").push_bind(p);
        qb.push(")");
    }
    if let Some(city) = &filter.city {
        qb.push(" AND city ILIKE ").push_bind(like_pattern(city));
    }
    if let Some(state) = &filter.state {
        qb.push(" AND state ILIKE ").push_bind(like_pattern(state));
    }
    if let Some(country) = &filter.country {
        qb.push(" AND country ILIKE ").push_bind(like_pattern(country));
    }
    if !filter.tags.is_empty() {
        qb.push(" AND tags && ").push_bind(filter.tags.clone());
    }
    if !filter.categories.is_empty() {
        qb.push(" AND categories && ").push_bind(filter.categories.clone());
    }
    if let Some(difficulty) = &filter.difficulty {
        qb.push(" AND difficulty = ").push_bind(difficulty.clone());
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND price_per_person >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND price_per_person <= ").push_bind(max);
    }
}

fn order_clause(sort: PostSort) -> &'static str {
    // Unpriced posts rank lowest in both directions.
    match (sort.field, sort.descending) {
        (SortField::CreatedAt, true) => " ORDER BY created_at DESC, id",
        (SortField::CreatedAt, false) => " ORDER BY created_at ASC, id",
        (SortField::Rating, true) => " ORDER BY rating_average DESC, created_at DESC",
        (SortField::Rating, false) => " ORDER BY rating_average ASC, created_at DESC",
        (SortField::Price, true) => " ORDER BY price_per_person DESC NULLS LAST, created_at DESC",
        (SortField::Price, false) => " ORDER BY price_per_person ASC NULLS FIRST, created_at DESC",
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn insert(&self, post: &Post) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, owner_id, owner_role, post_type, title, subtitle, description,
                city, state, country, price_per_person, price_total, price_amount, max_people,
                tags, categories, amenities, difficulty, duration, plan_name, status, rating_average,
                reactions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25)
            "#,
        )
        .bind(post.id)
        .bind(post.owner_id)
        .bind(post.owner_role.as_str())
        .bind(post.post_type.as_str())
        .bind(&post.title)
        .bind(&post.subtitle)
        .bind(&post.description)
        .bind(&post.location.city)
        .bind(&post.location.state)
        .bind(&post.location.country)
        .bind(post.price.per_person)
        .bind(post.price.total)
        .bind(post.price.amount)
        .bind(max_people(post)?)
        .bind(&post.tags)
        .bind(&post.categories)
        .bind(&post.amenities)
        .bind(&post.difficulty)
        .bind(post.duration.clone().map(Json))
        .bind(&post.plan_name)
        .bind(post.status.as_str())
        .bind(post.rating_average)
        .bind(Json(&post.reactions))
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Post>> {
        let row: Option<PostRow> =
            sqlx::query_as(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Post::try_from).transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<Post>> {
        let rows: Vec<PostRow> =
            sqlx::query_as(&format!("SELECT {} FROM posts WHERE id = ANY($1)", POST_COLUMNS))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    async fn update(&self, post: &Post) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, subtitle = $3, description = $4, city = $5, state = $6, country = $7,
                price_per_person = $8, price_total = $9, price_amount = $10, max_people = $11,
                tags = $12, categories = $13, amenities = $14, difficulty = $15, duration = $16,
                plan_name = $17, status = $18, rating_average = $19, updated_at = $20
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.subtitle)
        .bind(&post.description)
        .bind(&post.location.city)
        .bind(&post.location.state)
        .bind(&post.location.country)
        .bind(post.price.per_person)
        .bind(post.price.total)
        .bind(post.price.amount)
        .bind(max_people(post)?)
        .bind(&post.tags)
        .bind(&post.categories)
        .bind(&post.amenities)
        .bind(&post.difficulty)
        .bind(post.duration.clone().map(Json))
        .bind(&post.plan_name)
        .bind(post.status.as_str())
        .bind(post.rating_average)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_owner(&self, owner: Uuid, status: Option<PostStatus>) -> RepoResult<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {} FROM posts WHERE owner_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id",
            POST_COLUMNS
        ))
        .bind(owner)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    async fn toggle_reaction(
        &self,
        id: Uuid,
        user: Uuid,
        name: String,
        emoji: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<(ReactionAction, Vec<Reaction>)>> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Json<Vec<Reaction>>,)> =
            sqlx::query_as("SELECT reactions FROM posts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((Json(mut reactions),)) = current else {
            return Ok(None);
        };

        let action = toggle_reaction(&mut reactions, user, name, emoji, now);

        sqlx::query("UPDATE posts SET reactions = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(&reactions))
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((action, reactions)))
    }

    async fn search(
        &self,
        filter: &PostFilter,
        sort: PostSort,
        page: PageRequest,
    ) -> RepoResult<(Vec<Post>, u64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM posts");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM posts", POST_COLUMNS));
        push_filters(&mut qb, filter);
        qb.push(order_clause(sort));
        qb.push(" LIMIT ").push_bind(i64::from(page.limit));
        qb.push(" OFFSET ").push_bind(i64::try_from(page.offset())?);

        let rows: Vec<PostRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let posts = rows.into_iter().map(Post::try_from).collect::<RepoResult<Vec<_>>>()?;

        Ok((posts, u64::try_from(total)?))
    }
}
