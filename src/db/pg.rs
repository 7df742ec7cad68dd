use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    ActivityKind, ActivityRecord, DurationBucket, Identity, PlaceAggregate, TRENDING_WINDOW_DAYS,
};

use super::store::{ActivityStore, CatalogOrder, PlaceCatalog};

/// Postgres-backed store for activity records and place aggregates.
///
/// Both tables live in the same database, which is what lets
/// `commit_interaction` give the tracker an atomic unit of work.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn kind_to_str(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Search => "search",
        ActivityKind::View => "view",
        ActivityKind::Favorite => "favorite",
        ActivityKind::AddToItinerary => "add_to_itinerary",
        ActivityKind::Share => "share",
    }
}

fn kind_from_str(s: &str) -> ActivityKind {
    match s {
        "view" => ActivityKind::View,
        "favorite" => ActivityKind::Favorite,
        "add_to_itinerary" => ActivityKind::AddToItinerary,
        "share" => ActivityKind::Share,
        _ => ActivityKind::Search,
    }
}

fn duration_from_str(s: &str) -> Option<DurationBucket> {
    match s {
        "<2h" => Some(DurationBucket::Short),
        "2-4h" => Some(DurationBucket::Medium),
        ">4h" => Some(DurationBucket::Long),
        _ => None,
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Option<Uuid>,
    session_id: Option<String>,
    kind: String,
    city: Option<String>,
    place_name: Option<String>,
    place_id: Option<String>,
    categories: Vec<String>,
    duration: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityRecord {
    fn from(row: ActivityRow) -> Self {
        ActivityRecord {
            id: row.id,
            user_id: row.user_id,
            session_id: row.session_id,
            kind: kind_from_str(&row.kind),
            city: row.city,
            place_name: row.place_name,
            place_id: row.place_id,
            categories: row.categories,
            duration: row.duration.as_deref().and_then(duration_from_str),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PlaceRow {
    place_id: String,
    name: String,
    city: String,
    total_views: i64,
    total_favorites: i64,
    total_itinerary_adds: i64,
    total_shares: i64,
    popularity_score: i64,
    trending_score: i64,
    last_updated: DateTime<Utc>,
}

impl From<PlaceRow> for PlaceAggregate {
    fn from(row: PlaceRow) -> Self {
        PlaceAggregate {
            place_id: row.place_id,
            name: row.name,
            city: row.city,
            total_views: row.total_views,
            total_favorites: row.total_favorites,
            total_itinerary_adds: row.total_itinerary_adds,
            total_shares: row.total_shares,
            popularity_score: row.popularity_score,
            trending_score: row.trending_score,
            last_updated: row.last_updated,
        }
    }
}

const PLACE_COLUMNS: &str =
    "place_id, name, city, total_views, total_favorites, total_itinerary_adds, \
     total_shares, popularity_score, trending_score, last_updated";

async fn insert_activity<'e, E>(executor: E, record: &ActivityRecord) -> AppResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO activities \
         (id, user_id, session_id, kind, city, place_name, place_id, categories, duration, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(record.session_id.as_deref())
    .bind(kind_to_str(record.kind))
    .bind(record.city.as_deref())
    .bind(record.place_name.as_deref())
    .bind(record.place_id.as_deref())
    .bind(&record.categories)
    .bind(record.duration.map(|d| d.label()))
    .bind(record.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Which counter one interaction kind bumps
fn counter_deltas(kind: ActivityKind) -> (i64, i64, i64, i64) {
    match kind {
        ActivityKind::View => (1, 0, 0, 0),
        ActivityKind::Favorite => (0, 1, 0, 0),
        ActivityKind::AddToItinerary => (0, 0, 1, 0),
        ActivityKind::Share => (0, 0, 0, 1),
        ActivityKind::Search => (0, 0, 0, 0),
    }
}

#[async_trait::async_trait]
impl ActivityStore for PgStore {
    async fn append(&self, record: ActivityRecord) -> AppResult<()> {
        insert_activity(&self.pool, &record).await
    }

    async fn commit_interaction(
        &self,
        record: ActivityRecord,
        template: PlaceAggregate,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_activity(&mut *tx, &record).await?;

        // Increment in place; the row lock serializes concurrent
        // interactions on the same place until commit
        let (views, favorites, itinerary_adds, shares) = counter_deltas(record.kind);
        let row: PlaceRow = sqlx::query_as(&format!(
            "INSERT INTO places \
             (place_id, name, city, total_views, total_favorites, total_itinerary_adds, \
              total_shares, popularity_score, trending_score, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8) \
             ON CONFLICT (place_id) DO UPDATE SET \
               total_views = places.total_views + EXCLUDED.total_views, \
               total_favorites = places.total_favorites + EXCLUDED.total_favorites, \
               total_itinerary_adds = places.total_itinerary_adds + EXCLUDED.total_itinerary_adds, \
               total_shares = places.total_shares + EXCLUDED.total_shares, \
               last_updated = EXCLUDED.last_updated \
             RETURNING {PLACE_COLUMNS}"
        ))
        .bind(&template.place_id)
        .bind(&template.name)
        .bind(&template.city)
        .bind(views)
        .bind(favorites)
        .bind(itinerary_adds)
        .bind(shares)
        .bind(record.created_at)
        .fetch_one(&mut *tx)
        .await?;

        // Scores come from the post-increment row; the record inserted
        // above is visible to the window counts
        let mut place = PlaceAggregate::from(row);
        place.recompute_popularity();

        let window_start = record.created_at - Duration::days(TRENDING_WINDOW_DAYS);
        let recent_total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM activities WHERE place_id = $1 AND created_at >= $2",
        )
        .bind(&place.place_id)
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;
        let recent_high_value: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM activities \
             WHERE place_id = $1 AND created_at >= $2 \
               AND kind IN ('favorite', 'add_to_itinerary')",
        )
        .bind(&place.place_id)
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;
        place.recompute_trending(recent_total.0, recent_high_value.0);

        sqlx::query(
            "UPDATE places SET popularity_score = $1, trending_score = $2 WHERE place_id = $3",
        )
        .bind(place.popularity_score)
        .bind(place.trending_score)
        .bind(&place.place_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn for_identity(
        &self,
        identity: &Identity,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<ActivityRecord>> {
        let rows: Vec<ActivityRow> = match identity {
            Identity::User { user_id, session_id } => {
                sqlx::query_as(
                    "SELECT id, user_id, session_id, kind, city, place_name, place_id, \
                            categories, duration, created_at \
                     FROM activities \
                     WHERE created_at >= $1 \
                       AND (user_id = $2 OR (user_id IS NULL AND session_id = $3)) \
                     ORDER BY created_at DESC",
                )
                .bind(since)
                .bind(user_id)
                .bind(session_id.as_deref())
                .fetch_all(&self.pool)
                .await?
            }
            Identity::Anonymous { session_id } => {
                sqlx::query_as(
                    "SELECT id, user_id, session_id, kind, city, place_name, place_id, \
                            categories, duration, created_at \
                     FROM activities \
                     WHERE created_at >= $1 AND user_id IS NULL AND session_id = $2 \
                     ORDER BY created_at DESC",
                )
                .bind(since)
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(ActivityRecord::from).collect())
    }

    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists.0)
    }

    async fn adopt_session(&self, session_id: &str, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE activities SET user_id = $1, session_id = NULL \
             WHERE user_id IS NULL AND session_id = $2",
        )
        .bind(user_id)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl PlaceCatalog for PgStore {
    async fn count_places(&self) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM places")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn find(&self, place_id: &str) -> AppResult<Option<PlaceAggregate>> {
        let row: Option<PlaceRow> =
            sqlx::query_as(&format!("SELECT {PLACE_COLUMNS} FROM places WHERE place_id = $1"))
                .bind(place_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(PlaceAggregate::from))
    }

    async fn top_by_trending(&self, limit: i64) -> AppResult<Vec<PlaceAggregate>> {
        let rows: Vec<PlaceRow> = sqlx::query_as(&format!(
            "SELECT {PLACE_COLUMNS} FROM places ORDER BY trending_score DESC, random() LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PlaceAggregate::from).collect())
    }

    async fn top_by_popularity(&self, limit: i64) -> AppResult<Vec<PlaceAggregate>> {
        let rows: Vec<PlaceRow> = sqlx::query_as(&format!(
            "SELECT {PLACE_COLUMNS} FROM places ORDER BY popularity_score DESC, random() LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PlaceAggregate::from).collect())
    }

    async fn in_cities(
        &self,
        cities: &[String],
        order: CatalogOrder,
        limit: i64,
    ) -> AppResult<Vec<PlaceAggregate>> {
        let order_column = match order {
            CatalogOrder::Trending => "trending_score",
            CatalogOrder::Favorites => "total_favorites",
        };

        let rows: Vec<PlaceRow> = sqlx::query_as(&format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE city = ANY($1) \
             ORDER BY {order_column} DESC, random() LIMIT $2"
        ))
        .bind(cities)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PlaceAggregate::from).collect())
    }

    async fn outside_cities(
        &self,
        cities: &[String],
        limit: i64,
    ) -> AppResult<Vec<PlaceAggregate>> {
        let rows: Vec<PlaceRow> = sqlx::query_as(&format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE NOT (city = ANY($1)) \
             ORDER BY trending_score DESC, random() LIMIT $2"
        ))
        .bind(cities)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PlaceAggregate::from).collect())
    }
}
