use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::models::DurationBucket;

/// How long a tracked search keeps biasing recommendations
pub const CONTEXT_TTL_MINUTES: i64 = 10;

/// The most recent search a session performed
#[derive(Debug, Clone, PartialEq)]
pub struct SearchContext {
    pub session_id: String,
    pub city: String,
    pub categories: Vec<String>,
    pub duration: Option<DurationBucket>,
    pub created_at: DateTime<Utc>,
}

impl SearchContext {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::minutes(CONTEXT_TTL_MINUTES)
    }
}

/// Short-lived per-session memory of the latest search.
///
/// The only shared mutable state with a lifetime beyond one request. Losing
/// it degrades personalization, never correctness, so a process-local map
/// is enough; entries expire after ten minutes and `get` already treats
/// stale ones as absent.
#[derive(Clone, Default)]
pub struct SearchContextStore {
    contexts: Arc<RwLock<HashMap<String, SearchContext>>>,
}

impl SearchContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the session's latest search, replacing any prior context
    pub async fn put(
        &self,
        session_id: &str,
        city: String,
        categories: Vec<String>,
        duration: Option<DurationBucket>,
    ) {
        self.put_at(session_id, city, categories, duration, Utc::now())
            .await;
    }

    /// As `put`, with an explicit timestamp
    pub async fn put_at(
        &self,
        session_id: &str,
        city: String,
        categories: Vec<String>,
        duration: Option<DurationBucket>,
        created_at: DateTime<Utc>,
    ) {
        let context = SearchContext {
            session_id: session_id.to_string(),
            city,
            categories,
            duration,
            created_at,
        };
        self.contexts
            .write()
            .await
            .insert(session_id.to_string(), context);
    }

    /// Returns the session's context if one exists and is still fresh.
    ///
    /// Expired entries are dropped on the way out.
    pub async fn get(&self, session_id: &str) -> Option<SearchContext> {
        let now = Utc::now();
        {
            let contexts = self.contexts.read().await;
            match contexts.get(session_id) {
                Some(context) if context.is_fresh(now) => return Some(context.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Stale entry: evict lazily
        self.contexts.write().await.remove(session_id);
        None
    }

    /// Removes the session's context, fresh or not
    pub async fn clear(&self, session_id: &str) {
        self.contexts.write().await.remove(session_id);
    }
}
