use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActivityKind;

/// Weight of each counter type in the popularity score
const VIEW_WEIGHT: i64 = 1;
const FAVORITE_WEIGHT: i64 = 5;
const ITINERARY_WEIGHT: i64 = 4;
const SHARE_WEIGHT: i64 = 3;
/// Bonus per distinct interaction type a place has received
const DIVERSITY_BONUS: i64 = 10;

/// Trending weights over the recent activity window
const RECENT_ACTIVITY_WEIGHT: i64 = 15;
const RECENT_HIGH_VALUE_WEIGHT: i64 = 25;

/// How far back "recent" reaches for trending purposes
pub const TRENDING_WINDOW_DAYS: i64 = 7;

/// Derives a stable place id from its name and city.
///
/// Used when the upstream travel API supplies no id of its own; the same
/// name+city pair always maps to the same id so counters accumulate on one
/// row.
pub fn derive_place_id(name: &str, city: &str) -> String {
    let slug = |s: &str| {
        s.trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    };
    format!("{}-{}", slug(name), slug(city))
}

/// Accumulated interaction stats for one physical place.
///
/// Scores are always recomputed from the counters, never adjusted
/// incrementally, so interleaved updates cannot drift them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceAggregate {
    pub place_id: String,
    pub name: String,
    pub city: String,
    pub total_views: i64,
    pub total_favorites: i64,
    pub total_itinerary_adds: i64,
    pub total_shares: i64,
    pub popularity_score: i64,
    pub trending_score: i64,
    pub last_updated: DateTime<Utc>,
}

impl PlaceAggregate {
    /// A fresh aggregate with zeroed counters, created on first interaction
    pub fn new(place_id: String, name: String, city: String, now: DateTime<Utc>) -> Self {
        Self {
            place_id,
            name,
            city,
            total_views: 0,
            total_favorites: 0,
            total_itinerary_adds: 0,
            total_shares: 0,
            popularity_score: 0,
            trending_score: 0,
            last_updated: now,
        }
    }

    /// Bumps the counter matching the interaction kind.
    ///
    /// `Search` interactions target cities rather than places and leave the
    /// counters untouched.
    pub fn record_interaction(&mut self, kind: ActivityKind) {
        match kind {
            ActivityKind::View => self.total_views += 1,
            ActivityKind::Favorite => self.total_favorites += 1,
            ActivityKind::AddToItinerary => self.total_itinerary_adds += 1,
            ActivityKind::Share => self.total_shares += 1,
            ActivityKind::Search => {}
        }
    }

    /// Recomputes the popularity score from the current counters.
    ///
    /// Pure function of the four counters: a weighted sum plus a bonus for
    /// each distinct interaction type the place has attracted.
    pub fn recompute_popularity(&mut self) {
        let active_types = [
            self.total_views,
            self.total_favorites,
            self.total_itinerary_adds,
            self.total_shares,
        ]
        .iter()
        .filter(|&&n| n > 0)
        .count() as i64;

        self.popularity_score = self.total_views * VIEW_WEIGHT
            + self.total_favorites * FAVORITE_WEIGHT
            + self.total_itinerary_adds * ITINERARY_WEIGHT
            + self.total_shares * SHARE_WEIGHT
            + active_types * DIVERSITY_BONUS;
    }

    /// Recomputes the trending score from recent-window activity counts.
    ///
    /// `recent_total` is the number of activity records touching this place
    /// in the trending window; `recent_high_value` the subset that were
    /// favorites or itinerary adds.
    pub fn recompute_trending(&mut self, recent_total: i64, recent_high_value: i64) {
        self.trending_score =
            recent_total * RECENT_ACTIVITY_WEIGHT + recent_high_value * RECENT_HIGH_VALUE_WEIGHT;
    }
}
