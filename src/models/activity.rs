use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of user action being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Search,
    View,
    Favorite,
    AddToItinerary,
    Share,
}

impl ActivityKind {
    /// Relative weight of this interaction kind when building preference
    /// profiles. Favoriting a place says much more about taste than
    /// searching for a city.
    pub fn weight(self) -> f64 {
        match self {
            ActivityKind::Search => 1.0,
            ActivityKind::View => 2.0,
            ActivityKind::Favorite => 5.0,
            ActivityKind::AddToItinerary => 4.0,
            ActivityKind::Share => 3.0,
        }
    }

    /// High-value interactions get an extra boost in trending scores
    pub fn is_high_value(self) -> bool {
        matches!(self, ActivityKind::Favorite | ActivityKind::AddToItinerary)
    }
}

/// Requested visit-duration bucket on a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationBucket {
    #[serde(rename = "<2h")]
    Short,
    #[serde(rename = "2-4h")]
    Medium,
    #[serde(rename = ">4h")]
    Long,
}

impl DurationBucket {
    pub fn label(self) -> &'static str {
        match self {
            DurationBucket::Short => "<2h",
            DurationBucket::Medium => "2-4h",
            DurationBucket::Long => ">4h",
        }
    }
}

/// Who performed an action: a known account, or an anonymous session.
///
/// Authenticated callers may still carry the session id they browsed with
/// before logging in, so their pre-login history can be folded into the
/// profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    User {
        user_id: Uuid,
        session_id: Option<String>,
    },
    Anonymous {
        session_id: String,
    },
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::User { user_id, .. } => Some(*user_id),
            Identity::Anonymous { .. } => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Identity::User { session_id, .. } => session_id.as_deref(),
            Identity::Anonymous { session_id } => Some(session_id),
        }
    }
}

/// One tracked user action, append-only.
///
/// A record is either owned by a persistent user or anonymous under a
/// session id, never both; anonymous records can later be adopted by a user
/// when the session authenticates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub kind: ActivityKind,
    pub city: Option<String>,
    pub place_name: Option<String>,
    pub place_id: Option<String>,
    /// Requested activity categories; populated only for `Search` records
    pub categories: Vec<String>,
    /// Requested duration; populated only for `Search` records
    pub duration: Option<DurationBucket>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// Creates a record owned by the given identity at `now`.
    ///
    /// Enforces the ownership invariant: a user-owned record carries no
    /// session id, an anonymous record carries only one.
    pub fn new(identity: &Identity, kind: ActivityKind, created_at: DateTime<Utc>) -> Self {
        let (user_id, session_id) = match identity {
            Identity::User { user_id, .. } => (Some(*user_id), None),
            Identity::Anonymous { session_id } => (None, Some(session_id.clone())),
        };

        Self {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            kind,
            city: None,
            place_name: None,
            place_id: None,
            categories: Vec::new(),
            duration: None,
            created_at,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_place(mut self, name: impl Into<String>, place_id: impl Into<String>) -> Self {
        self.place_name = Some(name.into());
        self.place_id = Some(place_id.into());
        self
    }

    pub fn with_search_terms(
        mut self,
        categories: Vec<String>,
        duration: Option<DurationBucket>,
    ) -> Self {
        self.categories = categories;
        self.duration = duration;
        self
    }

    /// Age-based decay factor: recent actions dominate the profile while
    /// old ones fade to a floor rather than vanishing.
    pub fn time_decay(&self, now: DateTime<Utc>) -> f64 {
        let age_days = (now - self.created_at).num_days();
        if age_days <= 7 {
            1.0
        } else if age_days <= 30 {
            0.7
        } else if age_days <= 90 {
            0.3
        } else {
            0.1
        }
    }

    /// Final profile weight: time decay times interaction-kind weight
    pub fn final_weight(&self, now: DateTime<Utc>) -> f64 {
        self.time_decay(now) * self.kind.weight()
    }
}
