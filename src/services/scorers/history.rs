use rand::seq::SliceRandom;

use crate::db::{CatalogOrder, PlaceCatalog};
use crate::error::AppResult;
use crate::models::{PreferenceProfile, RecommendationSource, ScoredPlace};
use crate::services::search_context::SearchContext;

use super::{sample_down, scored, CandidateScorer, OVERFETCH_FACTOR};

/// At most this many affinity cities feed one request, so a long history
/// does not crowd out the other scorers
const MAX_HISTORY_CITIES: usize = 2;

/// Scores places in the cities the identity has shown affinity for.
///
/// The context city is excluded so this scorer never just repeats what the
/// context scorer already surfaced.
pub struct HistoryScorer;

#[async_trait::async_trait]
impl CandidateScorer for HistoryScorer {
    fn source(&self) -> RecommendationSource {
        RecommendationSource::UserHistory
    }

    async fn score(
        &self,
        catalog: &dyn PlaceCatalog,
        profile: &PreferenceProfile,
        context: Option<&SearchContext>,
        limit: usize,
    ) -> AppResult<Vec<ScoredPlace>> {
        let context_city = context.map(|c| c.city.as_str());
        let mut cities: Vec<String> = profile
            .affinity_cities()
            .into_iter()
            .filter(|city| Some(city.as_str()) != context_city)
            .collect();

        if cities.is_empty() {
            return Ok(Vec::new());
        }

        cities.shuffle(&mut rand::thread_rng());
        cities.truncate(MAX_HISTORY_CITIES);

        let pool = catalog
            .in_cities(&cities, CatalogOrder::Trending, limit as i64 * OVERFETCH_FACTOR)
            .await?;

        let reason = format!("based on your love for {}", cities.join(", "));
        let candidates = pool
            .into_iter()
            .map(|place| {
                let score = place.trending_score as f64;
                scored(place, score, RecommendationSource::UserHistory, reason.clone())
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

    fn profile_with_cities(cities: &[&str]) -> PreferenceProfile {
        let mut profile = PreferenceProfile::new_user(10);
        profile.is_new_user = false;
        profile.city_affinities = cities
            .iter()
            .map(|city| Affinity {
                name: city.to_string(),
                score: 100.0,
            })
            .collect();
        profile
    }

    #[tokio::test]
    async fn test_no_affinities_means_no_candidates() {
        let store = MemoryStore::new();
        let profile = PreferenceProfile::new_user(0);
        let results = HistoryScorer.score(&store, &profile, None, 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_context_city_is_excluded() {
        let store = MemoryStore::new();
        for (id, city) in [("a", "Paris"), ("b", "Rome")] {
            store
                .seed_place(PlaceAggregate::new(
                    id.to_string(),
                    id.to_string(),
                    city.to_string(),
                    Utc::now(),
                ))
                .await;
        }

        let profile = profile_with_cities(&["Paris", "Rome"]);
        let ctx = SearchContext {
            session_id: "s1".to_string(),
            city: "Paris".to_string(),
            categories: vec![],
            duration: None,
            created_at: Utc::now(),
        };

        let results = HistoryScorer
            .score(&store, &profile, Some(&ctx), 5)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|c| c.place.city == "Rome"));
        assert_eq!(results[0].reason, "based on your love for Rome");
    }

    #[tokio::test]
    async fn test_at_most_two_cities_feed_the_query() {
        let store = MemoryStore::new();
        for city in ["Paris", "Rome", "Tokyo", "Lima"] {
            store
                .seed_place(PlaceAggregate::new(
                    city.to_lowercase(),
                    format!("{city} spot"),
                    city.to_string(),
                    Utc::now(),
                ))
                .await;
        }

        let profile = profile_with_cities(&["Paris", "Rome", "Tokyo", "Lima"]);
        let results = HistoryScorer.score(&store, &profile, None, 10).await.unwrap();

        let cities: std::collections::HashSet<&str> =
            results.iter().map(|c| c.place.city.as_str()).collect();
        assert!(cities.len() <= 2);
    }
}
