use rand::seq::SliceRandom;

use crate::db::PlaceCatalog;
use crate::error::AppResult;
use crate::models::{PlaceAggregate, PreferenceProfile, RecommendationSource, ScoredPlace};

use super::search_context::SearchContext;

mod collaborative;
mod context;
mod discovery;
mod history;

pub use collaborative::CollaborativeScorer;
pub use context::ContextScorer;
pub use discovery::DiscoveryScorer;
pub use history::HistoryScorer;

/// How many candidates to pull per requested slot before sampling down.
/// Deterministic top-N made every repeat visit identical; sampling from an
/// oversized pool keeps ranking dominant while varying the faces shown.
pub const OVERFETCH_FACTOR: i64 = 3;

/// One candidate-scoring strategy.
///
/// Scorers read the catalog and the request-scoped profile/context and
/// never mutate shared state, so the engine can run them concurrently.
#[async_trait::async_trait]
pub trait CandidateScorer: Send + Sync {
    fn source(&self) -> RecommendationSource;

    async fn score(
        &self,
        catalog: &dyn PlaceCatalog,
        profile: &PreferenceProfile,
        context: Option<&SearchContext>,
        limit: usize,
    ) -> AppResult<Vec<ScoredPlace>>;
}

/// Randomly samples `limit` entries from an over-fetched pool, then orders
/// the survivors by score so the strongest still lead
pub(crate) fn sample_down(mut pool: Vec<ScoredPlace>, limit: usize) -> Vec<ScoredPlace> {
    let mut rng = rand::thread_rng();
    pool.shuffle(&mut rng);
    pool.truncate(limit);
    pool.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    pool
}

pub(crate) fn scored(
    place: PlaceAggregate,
    score: f64,
    source: RecommendationSource,
    reason: String,
) -> ScoredPlace {
    ScoredPlace {
        place,
        score,
        source,
        reason,
    }
}
