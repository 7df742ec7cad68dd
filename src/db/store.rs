use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ActivityRecord, Identity, PlaceAggregate};

/// How a city-scoped catalog query ranks its rows before the engine samples
/// them down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOrder {
    Trending,
    Favorites,
}

/// Persisted log of tracked user actions.
///
/// Append-only from the engine's perspective; the atomic interaction commit
/// also lands the matching catalog update because both tables share one
/// database.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ActivityStore: Send + Sync {
    /// Appends one record
    async fn append(&self, record: ActivityRecord) -> AppResult<()>;

    /// Appends the record and applies its interaction to the place
    /// aggregate in one unit of work: the counter bump and the score
    /// recomputes run against the currently stored row, so concurrent
    /// interactions on one place never lose counts. `template` seeds the
    /// row on a place's first interaction and is ignored afterwards.
    async fn commit_interaction(
        &self,
        record: ActivityRecord,
        template: PlaceAggregate,
    ) -> AppResult<()>;

    /// All records owned by the identity since `since`, newest first.
    ///
    /// For authenticated identities this includes anonymous records sharing
    /// the same session id, so pre-login history still shapes the profile.
    async fn for_identity(
        &self,
        identity: &Identity,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<ActivityRecord>>;

    /// Whether the user id resolves to a known account
    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool>;

    /// Stamps a user id onto the session's anonymous records, called when
    /// an anonymous session authenticates
    async fn adopt_session(&self, session_id: &str, user_id: Uuid) -> AppResult<u64>;
}

/// Read surface over accumulated place stats.
///
/// Every query supports over-fetching with randomized tie-breaking so the
/// scorers can sample a varied subset instead of pinning the same top-N.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaceCatalog: Send + Sync {
    /// Total number of known places
    async fn count_places(&self) -> AppResult<i64>;

    /// Looks up one aggregate by id
    async fn find(&self, place_id: &str) -> AppResult<Option<PlaceAggregate>>;

    /// Top places globally by trending score, ties randomized
    async fn top_by_trending(&self, limit: i64) -> AppResult<Vec<PlaceAggregate>>;

    /// Top places globally by popularity score, ties randomized
    async fn top_by_popularity(&self, limit: i64) -> AppResult<Vec<PlaceAggregate>>;

    /// Places within the given cities, ranked by `order`, ties randomized
    async fn in_cities(
        &self,
        cities: &[String],
        order: CatalogOrder,
        limit: i64,
    ) -> AppResult<Vec<PlaceAggregate>>;

    /// Places outside all of the given cities, ranked by trending score,
    /// ties randomized
    async fn outside_cities(&self, cities: &[String], limit: i64)
        -> AppResult<Vec<PlaceAggregate>>;
}
