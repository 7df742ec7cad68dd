use std::collections::HashSet;

use crate::db::PlaceCatalog;
use crate::error::AppResult;
use crate::models::{PreferenceProfile, RecommendationSource, ScoredPlace};
use crate::services::search_context::SearchContext;

use super::{scored, CandidateScorer, OVERFETCH_FACTOR};

const REASON: &str = "discover something completely new";

/// Scores trending places in cities the identity has never engaged with.
///
/// The anti-filter-bubble scorer and the variety fallback: it excludes
/// every affinity city plus the context city, and as long as the catalog
/// holds anything outside that set it will return candidates. Its own
/// output is already capped at one place per city.
pub struct DiscoveryScorer;

#[async_trait::async_trait]
impl CandidateScorer for DiscoveryScorer {
    fn source(&self) -> RecommendationSource {
        RecommendationSource::Discovery
    }

    async fn score(
        &self,
        catalog: &dyn PlaceCatalog,
        profile: &PreferenceProfile,
        context: Option<&SearchContext>,
        limit: usize,
    ) -> AppResult<Vec<ScoredPlace>> {
        let mut excluded = profile.affinity_cities();
        if let Some(context) = context {
            excluded.push(context.city.clone());
        }

        let pool = catalog
            .outside_cities(&excluded, limit as i64 * OVERFETCH_FACTOR)
            .await?;

        // The pool arrives trending-ranked with randomized ties; keep the
        // first place seen per city
        let mut seen_cities: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();
        for place in pool {
            if candidates.len() >= limit {
                break;
            }
            if seen_cities.insert(place.city.clone()) {
                let score = place.trending_score as f64;
                candidates.push(scored(
                    place,
                    score,
                    RecommendationSource::Discovery,
                    REASON.to_string(),
                ));
            }
        }

        Ok(candidates)
    }
}
