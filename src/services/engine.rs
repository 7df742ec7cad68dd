use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::db::{ActivityStore, PlaceCatalog};
use crate::error::{AppError, AppResult};
use crate::models::{
    Identity, PreferenceProfile, Recommendation, RecommendationPath, RecommendationRequest,
    RecommendationResponse, RecommendationSource, ScoredPlace, UserInsights,
};

use super::blender::{blend, ScorerLimits};
use super::profile::PreferenceProfileBuilder;
use super::scorers::{
    CandidateScorer, CollaborativeScorer, ContextScorer, DiscoveryScorer, HistoryScorer,
    OVERFETCH_FACTOR,
};
use super::search_context::{SearchContext, SearchContextStore};

const TRENDING_REASON: &str = "trending with travelers right now";

/// The recommendation request path: profile, concurrent scorers, blend.
///
/// Stateless across requests apart from the search-context store; every
/// profile is rebuilt from the activity log on the way in.
pub struct RecommendationEngine {
    catalog: Arc<dyn PlaceCatalog>,
    contexts: SearchContextStore,
    profiles: PreferenceProfileBuilder,
    scorer_timeout: Duration,
}

impl RecommendationEngine {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        catalog: Arc<dyn PlaceCatalog>,
        contexts: SearchContextStore,
        profile_lookback_days: i64,
        scorer_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            contexts,
            profiles: PreferenceProfileBuilder::new(activities, profile_lookback_days),
            scorer_timeout,
        }
    }

    /// Produces the ranked recommendation list for one request
    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> AppResult<RecommendationResponse> {
        let identity = resolve_request_identity(request)?;
        let limit = request.limit.clamp(1, 50);
        let now = Utc::now();

        // Empty catalog is a first-class outcome, not an error
        if self.catalog.count_places().await? == 0 {
            return Ok(no_data_response());
        }

        let profile = self.profiles.build(&identity, now).await?;

        let context = match &request.search_context_override {
            Some(o) => Some(SearchContext {
                session_id: identity.session_id().unwrap_or_default().to_string(),
                city: o.city.clone(),
                categories: o.categories.clone(),
                duration: o.duration,
                created_at: now,
            }),
            None => match identity.session_id() {
                Some(session_id) => self.contexts.get(session_id).await,
                None => None,
            },
        };

        let path = match (profile.is_new_user, context.is_some()) {
            (true, false) => RecommendationPath::Discovery,
            (true, true) => RecommendationPath::ContextAwareSession,
            (false, true) => RecommendationPath::ContextAwarePersonalized,
            (false, false) => RecommendationPath::Personalized,
        };

        let mut limits = ScorerLimits::for_request(limit, context.is_some());
        match path {
            RecommendationPath::Discovery => {
                // New identity, nothing to personalize on: variety only
                limits = ScorerLimits {
                    context: 0,
                    history: 0,
                    collaborative: 0,
                    discovery: limit,
                };
            }
            RecommendationPath::ContextAwareSession => {
                // The fresh search is the only signal worth following
                limits.history = 0;
                limits.collaborative = 0;
            }
            _ => {}
        }

        // The four scorers are independent; run them concurrently and let
        // any failure or timeout degrade to zero candidates
        let context_ref = context.as_ref();
        let (from_context, from_history, from_collaborative, from_discovery) = tokio::join!(
            self.run_scorer(&ContextScorer, &profile, context_ref, limits.context),
            self.run_scorer(&HistoryScorer, &profile, context_ref, limits.history),
            self.run_scorer(&CollaborativeScorer, &profile, context_ref, limits.collaborative),
            self.run_scorer(&DiscoveryScorer, &profile, context_ref, limits.discovery),
        );

        // Priority order: strongest signal first, trending fill last
        let mut candidates = from_context;
        candidates.extend(from_history);
        candidates.extend(from_collaborative);
        candidates.extend(from_discovery);

        // Blend once, and only reach for the trending fallback if the
        // de-duplicated result actually comes up short
        let mut blended = blend(candidates.clone(), limit);
        if blended.len() < limit {
            match self.trending_fill(limit).await {
                Ok(fill) => {
                    candidates.extend(fill);
                    blended = blend(candidates, limit);
                }
                Err(e) => {
                    // Everything else may still carry the response
                    tracing::warn!(error = %e, "Trending fallback failed");
                    if blended.is_empty() {
                        return Err(AppError::Internal(
                            "all scorers and the trending fallback failed".to_string(),
                        ));
                    }
                }
            }
        }
        tracing::info!(
            path = ?path,
            engagement = ?profile.engagement_level,
            results = blended.len(),
            "Recommendations assembled"
        );

        Ok(RecommendationResponse {
            main_recommendations: blended.iter().map(Recommendation::from_scored).collect(),
            recommendation_type: path,
            personalization_level: profile.engagement_level,
            user_insights: insights_from(&profile),
            message: None,
        })
    }

    /// Runs one scorer under its own timeout; failures and timeouts are
    /// logged and degrade to zero candidates
    async fn run_scorer<S: CandidateScorer>(
        &self,
        scorer: &S,
        profile: &PreferenceProfile,
        context: Option<&SearchContext>,
        limit: usize,
    ) -> Vec<ScoredPlace> {
        if limit == 0 {
            return Vec::new();
        }

        let outcome = tokio::time::timeout(
            self.scorer_timeout,
            scorer.score(self.catalog.as_ref(), profile, context, limit),
        )
        .await;

        match outcome {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                tracing::warn!(source = ?scorer.source(), error = %e, "Scorer failed, degrading to empty");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(source = ?scorer.source(), "Scorer timed out, degrading to empty");
                Vec::new()
            }
        }
    }

    /// Globally top-trending places, randomized, used to pad short blends
    async fn trending_fill(&self, limit: usize) -> AppResult<Vec<ScoredPlace>> {
        let pool = self
            .catalog
            .top_by_trending(limit as i64 * OVERFETCH_FACTOR)
            .await?;

        Ok(pool
            .into_iter()
            .map(|place| {
                let score = place.trending_score as f64;
                ScoredPlace {
                    place,
                    score,
                    source: RecommendationSource::Trending,
                    reason: TRENDING_REASON.to_string(),
                }
            })
            .collect())
    }
}

fn resolve_request_identity(request: &RecommendationRequest) -> AppResult<Identity> {
    match (&request.identity.user_id, &request.identity.session_id) {
        (Some(user_id), session_id) => Ok(Identity::User {
            user_id: *user_id,
            session_id: session_id.clone(),
        }),
        (None, Some(session_id)) => Ok(Identity::Anonymous {
            session_id: session_id.clone(),
        }),
        (None, None) => Err(AppError::InvalidInput(
            "a user_id or session_id is required".to_string(),
        )),
    }
}

fn insights_from(profile: &PreferenceProfile) -> UserInsights {
    UserInsights {
        favorite_cities: profile.city_affinities.clone(),
        favorite_categories: profile.category_affinities.clone(),
        preferred_time_of_day: profile.temporal_pattern.preferred_time_of_day,
        profile_strength: profile.profile_strength,
    }
}

fn no_data_response() -> RecommendationResponse {
    let profile = PreferenceProfile::new_user(0);
    RecommendationResponse {
        main_recommendations: Vec::new(),
        recommendation_type: RecommendationPath::NoData,
        personalization_level: profile.engagement_level,
        user_insights: insights_from(&profile),
        message: Some(
            "No places are known yet; recommendations will appear once travelers start exploring"
                .to_string(),
        ),
    }
}
