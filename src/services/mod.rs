pub mod blender;
pub mod engine;
pub mod profile;
pub mod scorers;
pub mod search_context;
pub mod tracker;

pub use engine::RecommendationEngine;
pub use profile::PreferenceProfileBuilder;
pub use search_context::{SearchContext, SearchContextStore, CONTEXT_TTL_MINUTES};
pub use tracker::InteractionTracker;
