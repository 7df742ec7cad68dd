pub mod activity;
pub mod place;
pub mod profile;
pub mod recommendation;

pub use activity::{ActivityKind, ActivityRecord, DurationBucket, Identity};
pub use place::{derive_place_id, PlaceAggregate, TRENDING_WINDOW_DAYS};
pub use profile::{Affinity, EngagementLevel, PreferenceProfile, TemporalPattern, TimeOfDay};
pub use recommendation::{
    IdentityRequest, Recommendation, RecommendationPath, RecommendationRequest,
    RecommendationResponse, RecommendationSource, ScoredPlace, SearchContextOverride,
    UserInsights,
};
