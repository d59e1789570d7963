use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tripnest_core::repository::{BookingParty, BookingQuery, BookingRepository, RepoResult};
use tripnest_core::{Booking, BookingStatus, RepoError, StatusSummary};
use tripnest_shared::PageRequest;
use uuid::Uuid;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, guest_id, host_id, post_id, post_type, post_title, number_of_people, \
     total_amount, booking_date, start_date, end_date, guest_message, status, host_response, \
     responded_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    guest_id: Uuid,
    host_id: Uuid,
    post_id: Uuid,
    post_type: String,
    post_title: String,
    number_of_people: i32,
    total_amount: f64,
    booking_date: DateTime<Utc>,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    guest_message: String,
    status: String,
    host_response: String,
    responded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepoError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            guest_id: row.guest_id,
            host_id: row.host_id,
            post_id: row.post_id,
            post_type: row.post_type.parse()?,
            post_title: row.post_title,
            number_of_people: u32::try_from(row.number_of_people)?,
            total_amount: row.total_amount,
            booking_date: row.booking_date,
            start_date: row.start_date,
            end_date: row.end_date,
            guest_message: row.guest_message,
            status: row.status.parse()?,
            host_response: row.host_response,
            responded_at: row.responded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_query(qb: &mut QueryBuilder<'_, Postgres>, query: &BookingQuery) {
    match query.party {
        BookingParty::Host(id) => qb.push(" WHERE host_id = ").push_bind(id),
        BookingParty::Guest(id) => qb.push(" WHERE guest_id = ").push_bind(id),
    };
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, guest_id, host_id, post_id, post_type, post_title, number_of_people,
                total_amount, booking_date, start_date, end_date, guest_message, status, host_response,
                responded_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(booking.id)
        .bind(booking.guest_id)
        .bind(booking.host_id)
        .bind(booking.post_id)
        .bind(booking.post_type.as_str())
        .bind(&booking.post_title)
        .bind(i32::try_from(booking.number_of_people)?)
        .bind(booking.total_amount)
        .bind(booking.booking_date)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(&booking.guest_message)
        .bind(booking.status.as_str())
        .bind(&booking.host_response)
        .bind(booking.responded_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn apply_response(&self, booking: &Booking) -> RepoResult<bool> {
        // The status guard makes concurrent accept/decline calls race on the row, not in memory.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, host_response = $3, responded_at = $4, updated_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(&booking.host_response)
        .bind(booking.responded_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, query: &BookingQuery, page: PageRequest) -> RepoResult<(Vec<Booking>, u64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM bookings");
        push_query(&mut count_qb, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM bookings", BOOKING_COLUMNS));
        push_query(&mut qb, query);
        qb.push(" ORDER BY created_at DESC, id");
        qb.push(" LIMIT ").push_bind(i64::from(page.limit));
        qb.push(" OFFSET ").push_bind(i64::try_from(page.offset())?);

        let rows: Vec<BookingRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let bookings = rows
            .into_iter()
            .map(Booking::try_from)
            .collect::<RepoResult<Vec<_>>>()?;

        Ok((bookings, u64::try_from(total)?))
    }

    async fn count_by_status(&self, host_id: Uuid) -> RepoResult<StatusSummary> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM bookings WHERE host_id = $1 GROUP BY status",
        )
        .bind(host_id)
        .fetch_all(&self.pool)
        .await?;

        let (mut pending, mut accepted, mut declined) = (0u64, 0u64, 0u64);
        for (status, count) in rows {
            let count = u64::try_from(count)?;
            match status.parse::<BookingStatus>()? {
                BookingStatus::Pending => pending = count,
                BookingStatus::Accepted => accepted = count,
                BookingStatus::Declined => declined = count,
            }
        }

        Ok(StatusSummary::new(pending, accepted, declined))
    }
}
