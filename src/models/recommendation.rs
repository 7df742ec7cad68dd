use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Affinity, DurationBucket, EngagementLevel, PlaceAggregate, TimeOfDay};

/// Which scoring strategy surfaced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    SearchContext,
    UserHistory,
    Collaborative,
    Discovery,
    Trending,
}

/// Which top-level path produced the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPath {
    /// Catalog is empty; nothing to recommend
    NoData,
    /// New identity with no search context: discovery-only
    Discovery,
    /// New identity whose fresh search context drives the results
    ContextAwareSession,
    /// Established profile blended with a fresh search context
    ContextAwarePersonalized,
    /// Established profile, no search context
    Personalized,
}

/// A candidate emitted by one scorer, before blending
#[derive(Debug, Clone)]
pub struct ScoredPlace {
    pub place: PlaceAggregate,
    pub score: f64,
    pub source: RecommendationSource,
    pub reason: String,
}

/// Identity fields as they arrive on the wire; at least one must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Inline search-context override on a recommendation request, for callers
/// that did not go through the tracking endpoint first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchContextOverride {
    pub city: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub duration: Option<DurationBucket>,
}

fn default_limit() -> usize {
    8
}

/// A recommendation request as the engine sees it
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub identity: IdentityRequest,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub search_context_override: Option<SearchContextOverride>,
}

/// One entry of the final ranked list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub place_id: String,
    pub name: String,
    pub city: String,
    /// Display rating derived from the blended scores, always in 3.0–5.0
    pub rating: f64,
    pub recommendation_reason: String,
    pub recommendation_source: RecommendationSource,
    pub category: String,
    pub duration: String,
}

impl Recommendation {
    /// Maps a scored candidate to its response shape.
    ///
    /// The rating is a deterministic function of popularity, squeezed into
    /// the 3.0–5.0 band the clients render as stars.
    pub fn from_scored(scored: &ScoredPlace) -> Self {
        let popularity = (scored.place.popularity_score as f64).clamp(0.0, 100.0);
        let rating = ((3.0 + 2.0 * popularity / 100.0) * 10.0).round() / 10.0;

        Self {
            place_id: scored.place.place_id.clone(),
            name: scored.place.name.clone(),
            city: scored.place.city.clone(),
            rating,
            recommendation_reason: scored.reason.clone(),
            recommendation_source: scored.source,
            category: "Experience".to_string(),
            duration: "2-4h".to_string(),
        }
    }
}

/// Profile summary echoed back with each recommendation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInsights {
    pub favorite_cities: Vec<Affinity>,
    pub favorite_categories: Vec<Affinity>,
    pub preferred_time_of_day: Option<TimeOfDay>,
    pub profile_strength: f64,
}

/// The engine's full answer to a recommendation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub main_recommendations: Vec<Recommendation>,
    pub recommendation_type: RecommendationPath,
    pub personalization_level: EngagementLevel,
    pub user_insights: UserInsights,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
