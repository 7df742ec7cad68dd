use std::sync::Arc;
use std::time::Duration;

use crate::db::{ActivityStore, PlaceCatalog, PopularitySignal};
use crate::services::{InteractionTracker, RecommendationEngine, SearchContextStore};

/// Shared application state: the engine and the tracker over one store
/// pair, plus the session-scoped search contexts they both consult
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub tracker: Arc<InteractionTracker>,
}

impl AppState {
    /// Wires the engine and tracker over the given collaborators
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        catalog: Arc<dyn PlaceCatalog>,
        signal: PopularitySignal,
        profile_lookback_days: i64,
        scorer_timeout: Duration,
    ) -> Self {
        let contexts = SearchContextStore::new();

        let engine = RecommendationEngine::new(
            activities.clone(),
            catalog.clone(),
            contexts.clone(),
            profile_lookback_days,
            scorer_timeout,
        );
        let tracker = InteractionTracker::new(activities, catalog, contexts, signal);

        Self {
            engine: Arc::new(engine),
            tracker: Arc::new(tracker),
        }
    }
}
