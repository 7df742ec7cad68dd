use crate::db::{CatalogOrder, PlaceCatalog};
use crate::error::AppResult;
use crate::models::{PreferenceProfile, RecommendationSource, ScoredPlace};
use crate::services::search_context::SearchContext;

use super::{sample_down, scored, CandidateScorer, OVERFETCH_FACTOR};

const REASON: &str = "loved by travelers like you";

/// Approximates "travelers with similar taste" without a user-user model:
/// within the identity's affinity cities, the most-favorited places stand
/// in for what similar profiles loved. With no affinity cities it falls
/// back to sampling globally popular places.
pub struct CollaborativeScorer;

#[async_trait::async_trait]
impl CandidateScorer for CollaborativeScorer {
    fn source(&self) -> RecommendationSource {
        RecommendationSource::Collaborative
    }

    async fn score(
        &self,
        catalog: &dyn PlaceCatalog,
        profile: &PreferenceProfile,
        context: Option<&SearchContext>,
        limit: usize,
    ) -> AppResult<Vec<ScoredPlace>> {
        let context_city = context.map(|c| c.city.as_str());
        let cities: Vec<String> = profile
            .affinity_cities()
            .into_iter()
            .filter(|city| Some(city.as_str()) != context_city)
            .collect();

        let pool = if cities.is_empty() {
            catalog
                .top_by_popularity(limit as i64 * OVERFETCH_FACTOR)
                .await?
        } else {
            catalog
                .in_cities(&cities, CatalogOrder::Favorites, limit as i64 * OVERFETCH_FACTOR)
                .await?
        };

        let candidates = pool
            .into_iter()
            .map(|place| {
                let score = place.total_favorites as f64;
                scored(
                    place,
                    score,
                    RecommendationSource::Collaborative,
                    REASON.to_string(),
                )
            })
            .collect();

        Ok(sample_down(candidates, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{Affinity, PlaceAggregate};
    use chrono::Utc;

    async fn store_with(places: &[(&str, &str, i64, i64)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (id, city, favorites, popularity) in places {
            let mut place = PlaceAggregate::new(
                id.to_string(),
                id.to_string(),
                city.to_string(),
                Utc::now(),
            );
            place.total_favorites = *favorites;
            place.popularity_score = *popularity;
            store.seed_place(place).await;
        }
        store
    }

    #[tokio::test]
    async fn test_ranks_affinity_cities_by_favorites() {
        let store = store_with(&[("a", "Rome", 9, 0), ("b", "Rome", 1, 0), ("c", "Oslo", 50, 0)]).await;

        let mut profile = PreferenceProfile::new_user(10);
        profile.is_new_user = false;
        profile.city_affinities = vec![Affinity {
            name: "Rome".to_string(),
            score: 100.0,
        }];

        let results = CollaborativeScorer.score(&store, &profile, None, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|c| c.place.city == "Rome"));
        assert_eq!(results[0].place.place_id, "a");
        assert_eq!(results[0].reason, REASON);
    }

    #[tokio::test]
    async fn test_falls_back_to_global_popularity() {
        let store = store_with(&[("a", "Rome", 0, 80), ("b", "Oslo", 0, 20)]).await;
        let profile = PreferenceProfile::new_user(0);

        let results = CollaborativeScorer.score(&store, &profile, None, 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
