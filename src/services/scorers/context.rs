use crate::db::{CatalogOrder, PlaceCatalog};
use crate::error::AppResult;
use crate::models::{PreferenceProfile, RecommendationSource, ScoredPlace};
use crate::services::search_context::SearchContext;

use super::{sample_down, scored, CandidateScorer, OVERFETCH_FACTOR};

/// Scores places in the city the session just searched for.
///
/// Only active while a fresh SearchContext exists; the strongest signal the
/// engine has, so the blender gives it the largest share.
pub struct ContextScorer;

#[async_trait::async_trait]
impl CandidateScorer for ContextScorer {
    fn source(&self) -> RecommendationSource {
        RecommendationSource::SearchContext
    }

    async fn score(
        &self,
        catalog: &dyn PlaceCatalog,
        _profile: &PreferenceProfile,
        context: Option<&SearchContext>,
        limit: usize,
    ) -> AppResult<Vec<ScoredPlace>> {
        let Some(context) = context else {
            return Ok(Vec::new());
        };

        let cities = vec![context.city.clone()];
        let pool = catalog
            .in_cities(&cities, CatalogOrder::Trending, limit as i64 * OVERFETCH_FACTOR)
            .await?;

        let reason = format!("matches your search in {}", context.city);
        let candidates = pool
            .into_iter()
            .map(|place| {
                let score = place.trending_score as f64;
                scored(place, score, RecommendationSource::SearchContext, reason.clone())
            })
            .collect();

        Ok(sample_down(candidates, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{PlaceAggregate, PreferenceProfile};
    use chrono::Utc;

    fn context(city: &str) -> SearchContext {
        SearchContext {
            session_id: "s1".to_string(),
            city: city.to_string(),
            categories: vec![],
            duration: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, city) in [("a", "Paris"), ("b", "Paris"), ("c", "Rome")] {
            store
                .seed_place(PlaceAggregate::new(
                    id.to_string(),
                    id.to_string(),
                    city.to_string(),
                    Utc::now(),
                ))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_inactive_without_context() {
        let store = seeded_store().await;
        let profile = PreferenceProfile::new_user(0);
        let results = ContextScorer.score(&store, &profile, None, 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_only_context_city_places_surface() {
        let store = seeded_store().await;
        let profile = PreferenceProfile::new_user(0);
        let ctx = context("Paris");
        let results = ContextScorer
            .score(&store, &profile, Some(&ctx), 5)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        for candidate in &results {
            assert_eq!(candidate.place.city, "Paris");
            assert_eq!(candidate.source, RecommendationSource::SearchContext);
            assert_eq!(candidate.reason, "matches your search in Paris");
        }
    }
}
