use std::sync::Arc;

use chrono::Utc;

use crate::db::{ActivityStore, PlaceCatalog, PopularitySignal};
use crate::error::{AppError, AppResult};
use crate::models::{
    derive_place_id, ActivityKind, ActivityRecord, DurationBucket, Identity, IdentityRequest,
    PlaceAggregate,
};

use super::search_context::SearchContextStore;

/// The write path: records tracked actions and keeps place aggregates
/// current.
///
/// The raw activity record is the primary contract; derived signals (the
/// redis city-popularity bump) may fail without failing the call, but a
/// failed primary write always surfaces so the caller can retry.
pub struct InteractionTracker {
    activities: Arc<dyn ActivityStore>,
    catalog: Arc<dyn PlaceCatalog>,
    contexts: SearchContextStore,
    signal: PopularitySignal,
}

impl InteractionTracker {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        catalog: Arc<dyn PlaceCatalog>,
        contexts: SearchContextStore,
        signal: PopularitySignal,
    ) -> Self {
        Self {
            activities,
            catalog,
            contexts,
            signal,
        }
    }

    /// Records a search and arms the session's search context.
    ///
    /// The context write happens before the activity append returns, since
    /// the very next recommendation call may depend on it.
    pub async fn track_search(
        &self,
        identity: &IdentityRequest,
        city: &str,
        categories: Vec<String>,
        duration: Option<DurationBucket>,
    ) -> AppResult<()> {
        let identity = self.resolve_identity(identity).await?;
        let session_id = identity.session_id().ok_or_else(|| {
            AppError::InvalidInput("a session_id is required to track a search".to_string())
        })?;

        self.contexts
            .put(session_id, city.to_string(), categories.clone(), duration)
            .await;

        let record = ActivityRecord::new(&identity, ActivityKind::Search, Utc::now())
            .with_city(city)
            .with_search_terms(categories, duration);

        self.activities
            .append(record)
            .await
            .map_err(|e| AppError::Tracking(format!("failed to record search: {e}")))?;

        // Advisory only; a redis outage must not fail the tracking call
        self.signal.bump_city_search(city);

        tracing::debug!(city = %city, "Search tracked");
        Ok(())
    }

    /// Records a place interaction and updates the place's aggregate.
    ///
    /// The counter bump and score recomputes happen inside the store's
    /// atomic commit, against the row as it stands there; the tracker only
    /// resolves the place's canonical name and city up front.
    pub async fn track_interaction(
        &self,
        identity: &IdentityRequest,
        kind: ActivityKind,
        place_name: &str,
        place_id: Option<String>,
        city: Option<String>,
    ) -> AppResult<()> {
        if kind == ActivityKind::Search {
            return Err(AppError::InvalidInput(
                "searches are tracked through the search endpoint".to_string(),
            ));
        }

        let identity = self.resolve_identity(identity).await?;
        let now = Utc::now();

        let place_id = place_id
            .unwrap_or_else(|| derive_place_id(place_name, city.as_deref().unwrap_or_default()));

        let (name, city) = match self.catalog.find(&place_id).await? {
            Some(existing) => (existing.name, existing.city),
            None => (place_name.to_string(), city.unwrap_or_default()),
        };

        let record = ActivityRecord::new(&identity, kind, now)
            .with_place(name.clone(), place_id.clone())
            .with_city(city.clone());
        let template = PlaceAggregate::new(place_id.clone(), name, city, now);

        self.activities
            .commit_interaction(record, template)
            .await
            .map_err(|e| AppError::Tracking(format!("failed to record interaction: {e}")))?;

        tracing::debug!(place_id = %place_id, kind = ?kind, "Interaction tracked");
        Ok(())
    }

    /// Maps the wire identity to an effective one.
    ///
    /// An unknown user id degrades silently to the anonymous session: the
    /// action still gets recorded, only the attribution weakens.
    async fn resolve_identity(&self, request: &IdentityRequest) -> AppResult<Identity> {
        if let Some(user_id) = request.user_id {
            if self.activities.user_exists(user_id).await? {
                return Ok(Identity::User {
                    user_id,
                    session_id: request.session_id.clone(),
                });
            }
            tracing::warn!(user_id = %user_id, "Unknown user id on tracking call, degrading to anonymous");
        }

        match &request.session_id {
            Some(session_id) => Ok(Identity::Anonymous {
                session_id: session_id.clone(),
            }),
            None => Err(AppError::InvalidInput(
                "a known user_id or a session_id is required".to_string(),
            )),
        }
    }
}
