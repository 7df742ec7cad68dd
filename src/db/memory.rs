use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ActivityRecord, Identity, PlaceAggregate, TRENDING_WINDOW_DAYS};

use super::store::{ActivityStore, CatalogOrder, PlaceCatalog};

/// In-memory store backing tests and local development.
///
/// Same contract as the Postgres store, including randomized tie-breaking
/// on the catalog queries, over a lock-protected map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    activities: Vec<ActivityRecord>,
    places: HashMap<String, PlaceAggregate>,
    known_users: HashSet<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user id so identity resolution treats it as known
    pub async fn register_user(&self, user_id: Uuid) {
        self.inner.write().await.known_users.insert(user_id);
    }

    /// Seeds a place aggregate directly, bypassing the tracking path
    pub async fn seed_place(&self, place: PlaceAggregate) {
        self.inner
            .write()
            .await
            .places
            .insert(place.place_id.clone(), place);
    }

    /// Seeds an activity record directly, bypassing the tracking path
    pub async fn seed_activity(&self, record: ActivityRecord) {
        self.inner.write().await.activities.push(record);
    }
}

/// Sorts descending by `key`, breaking ties randomly, and truncates
fn ranked_sample<F>(mut places: Vec<PlaceAggregate>, limit: i64, key: F) -> Vec<PlaceAggregate>
where
    F: Fn(&PlaceAggregate) -> i64,
{
    let mut rng = rand::thread_rng();
    let mut keyed: Vec<(i64, u32, PlaceAggregate)> = places
        .drain(..)
        .map(|p| (key(&p), rng.gen::<u32>(), p))
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    keyed
        .into_iter()
        .take(limit.max(0) as usize)
        .map(|(_, _, p)| p)
        .collect()
}

#[async_trait::async_trait]
impl ActivityStore for MemoryStore {
    async fn append(&self, record: ActivityRecord) -> AppResult<()> {
        self.inner.write().await.activities.push(record);
        Ok(())
    }

    async fn commit_interaction(
        &self,
        record: ActivityRecord,
        template: PlaceAggregate,
    ) -> AppResult<()> {
        // Single lock scope stands in for the database transaction; the
        // bump and the recomputes see every previously committed write
        let mut inner = self.inner.write().await;
        let kind = record.kind;
        let now = record.created_at;
        let place_id = template.place_id.clone();
        let window_start = now - Duration::days(TRENDING_WINDOW_DAYS);

        inner.activities.push(record);
        let recent_total = inner
            .activities
            .iter()
            .filter(|r| r.place_id.as_deref() == Some(place_id.as_str()) && r.created_at >= window_start)
            .count() as i64;
        let recent_high_value = inner
            .activities
            .iter()
            .filter(|r| r.place_id.as_deref() == Some(place_id.as_str()) && r.created_at >= window_start)
            .filter(|r| r.kind.is_high_value())
            .count() as i64;

        let place = inner.places.entry(place_id).or_insert(template);
        place.record_interaction(kind);
        place.recompute_popularity();
        place.recompute_trending(recent_total, recent_high_value);
        place.last_updated = now;
        Ok(())
    }

    async fn for_identity(
        &self,
        identity: &Identity,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<ActivityRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<ActivityRecord> = inner
            .activities
            .iter()
            .filter(|r| r.created_at >= since)
            .filter(|r| match identity {
                Identity::User { user_id, session_id } => {
                    r.user_id == Some(*user_id)
                        || (r.user_id.is_none()
                            && session_id.is_some()
                            && r.session_id.as_deref() == session_id.as_deref())
                }
                Identity::Anonymous { session_id } => {
                    r.user_id.is_none() && r.session_id.as_deref() == Some(session_id)
                }
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.inner.read().await.known_users.contains(&user_id))
    }

    async fn adopt_session(&self, session_id: &str, user_id: Uuid) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let mut adopted = 0;
        for record in inner.activities.iter_mut() {
            if record.user_id.is_none() && record.session_id.as_deref() == Some(session_id) {
                record.user_id = Some(user_id);
                record.session_id = None;
                adopted += 1;
            }
        }
        Ok(adopted)
    }
}

#[async_trait::async_trait]
impl PlaceCatalog for MemoryStore {
    async fn count_places(&self) -> AppResult<i64> {
        Ok(self.inner.read().await.places.len() as i64)
    }

    async fn find(&self, place_id: &str) -> AppResult<Option<PlaceAggregate>> {
        Ok(self.inner.read().await.places.get(place_id).cloned())
    }

    async fn top_by_trending(&self, limit: i64) -> AppResult<Vec<PlaceAggregate>> {
        let places: Vec<_> = self.inner.read().await.places.values().cloned().collect();
        Ok(ranked_sample(places, limit, |p| p.trending_score))
    }

    async fn top_by_popularity(&self, limit: i64) -> AppResult<Vec<PlaceAggregate>> {
        let places: Vec<_> = self.inner.read().await.places.values().cloned().collect();
        Ok(ranked_sample(places, limit, |p| p.popularity_score))
    }

    async fn in_cities(
        &self,
        cities: &[String],
        order: CatalogOrder,
        limit: i64,
    ) -> AppResult<Vec<PlaceAggregate>> {
        let places: Vec<_> = self
            .inner
            .read()
            .await
            .places
            .values()
            .filter(|p| cities.contains(&p.city))
            .cloned()
            .collect();

        Ok(match order {
            CatalogOrder::Trending => ranked_sample(places, limit, |p| p.trending_score),
            CatalogOrder::Favorites => ranked_sample(places, limit, |p| p.total_favorites),
        })
    }

    async fn outside_cities(
        &self,
        cities: &[String],
        limit: i64,
    ) -> AppResult<Vec<PlaceAggregate>> {
        let places: Vec<_> = self
            .inner
            .read()
            .await
            .places
            .values()
            .filter(|p| !cities.contains(&p.city))
            .cloned()
            .collect();
        Ok(ranked_sample(places, limit, |p| p.trending_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityKind;

    fn place(id: &str, city: &str, trending: i64) -> PlaceAggregate {
        let mut p = PlaceAggregate::new(
            id.to_string(),
            id.to_string(),
            city.to_string(),
            Utc::now(),
        );
        p.trending_score = trending;
        p
    }

    #[tokio::test]
    async fn test_for_identity_merges_pre_login_session() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let session = Identity::Anonymous {
            session_id: "s1".to_string(),
        };
        let user = Identity::User {
            user_id,
            session_id: Some("s1".to_string()),
        };

        store
            .append(ActivityRecord::new(&session, ActivityKind::Search, Utc::now()))
            .await
            .unwrap();
        store
            .append(ActivityRecord::new(&user, ActivityKind::View, Utc::now()))
            .await
            .unwrap();

        let since = Utc::now() - chrono::Duration::days(30);
        let merged = store.for_identity(&user, since).await.unwrap();
        assert_eq!(merged.len(), 2);

        // A different session sees only its own records
        let other = Identity::Anonymous {
            session_id: "s2".to_string(),
        };
        assert!(store.for_identity(&other, since).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adopt_session_attaches_user_id() {
        let store = MemoryStore::new();
        let session = Identity::Anonymous {
            session_id: "s1".to_string(),
        };
        store
            .append(ActivityRecord::new(&session, ActivityKind::Search, Utc::now()))
            .await
            .unwrap();

        let user_id = Uuid::new_v4();
        let adopted = store.adopt_session("s1", user_id).await.unwrap();
        assert_eq!(adopted, 1);

        let since = Utc::now() - chrono::Duration::days(30);
        let identity = Identity::User {
            user_id,
            session_id: None,
        };
        let records = store.for_identity(&identity, since).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, None);
    }

    #[tokio::test]
    async fn test_commit_interaction_increments_the_stored_row() {
        // The committed delta lands on top of whatever the row already
        // holds; the template must not overwrite existing counters
        let store = MemoryStore::new();
        let mut existing = place("louvre-paris", "Paris", 0);
        existing.total_favorites = 3;
        store.seed_place(existing).await;

        let identity = Identity::Anonymous {
            session_id: "s1".to_string(),
        };
        let record = ActivityRecord::new(&identity, ActivityKind::Favorite, Utc::now())
            .with_place("Louvre", "louvre-paris");
        let template = PlaceAggregate::new(
            "louvre-paris".to_string(),
            "Louvre".to_string(),
            "Paris".to_string(),
            Utc::now(),
        );
        store.commit_interaction(record, template).await.unwrap();

        let updated = store.find("louvre-paris").await.unwrap().unwrap();
        assert_eq!(updated.total_favorites, 4);
        // 4 favorites * 5 + one active type * 10
        assert_eq!(updated.popularity_score, 30);
        // One window record, high value
        assert_eq!(updated.trending_score, 15 + 25);
    }

    #[tokio::test]
    async fn test_city_queries_partition_the_catalog() {
        let store = MemoryStore::new();
        store.seed_place(place("a", "Paris", 10)).await;
        store.seed_place(place("b", "Rome", 20)).await;
        store.seed_place(place("c", "Tokyo", 30)).await;

        let cities = vec!["Paris".to_string()];
        let inside = store
            .in_cities(&cities, CatalogOrder::Trending, 10)
            .await
            .unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].city, "Paris");

        let outside = store.outside_cities(&cities, 10).await.unwrap();
        assert_eq!(outside.len(), 2);
        assert!(outside.iter().all(|p| p.city != "Paris"));
        // Ranked by trending score
        assert_eq!(outside[0].city, "Tokyo");
    }

}
