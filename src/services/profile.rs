use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::db::ActivityStore;
use crate::error::AppResult;
use crate::models::{
    ActivityKind, ActivityRecord, Affinity, EngagementLevel, Identity, PreferenceProfile,
    TemporalPattern, TimeOfDay,
};

/// Fewer qualifying records than this always yields the "new user" profile
const MIN_QUALIFYING_ACTIVITIES: usize = 2;
/// City affinities are capped to the strongest few
const MAX_CITY_AFFINITIES: usize = 5;

/// Builds normalized, time-decayed preference profiles from raw activity.
///
/// Profiles are rebuilt from scratch per request; the builder holds no
/// state beyond its store handle and lookback window.
pub struct PreferenceProfileBuilder {
    activities: Arc<dyn ActivityStore>,
    lookback_days: i64,
}

impl PreferenceProfileBuilder {
    pub fn new(activities: Arc<dyn ActivityStore>, lookback_days: i64) -> Self {
        Self {
            activities,
            lookback_days,
        }
    }

    /// Fetches the identity's recent history and derives its profile
    pub async fn build(&self, identity: &Identity, now: DateTime<Utc>) -> AppResult<PreferenceProfile> {
        let since = now - Duration::days(self.lookback_days);
        let records = self.activities.for_identity(identity, since).await?;

        let profile = build_from_records(&records, now);
        tracing::debug!(
            activity_count = profile.activity_count,
            engagement = ?profile.engagement_level,
            cities = profile.city_affinities.len(),
            "Built preference profile"
        );
        Ok(profile)
    }
}

/// Pure profile derivation over an already-fetched activity window
pub fn build_from_records(records: &[ActivityRecord], now: DateTime<Utc>) -> PreferenceProfile {
    if records.len() < MIN_QUALIFYING_ACTIVITIES {
        return PreferenceProfile::new_user(records.len());
    }

    let mut city_weights: HashMap<String, f64> = HashMap::new();
    let mut category_weights: HashMap<String, f64> = HashMap::new();
    let mut time_weights: HashMap<TimeOfDay, f64> = HashMap::new();
    let mut weekday_weight = 0.0;
    let mut weekend_weight = 0.0;
    let mut total_weight = 0.0;
    let mut recent_count = 0usize;

    for record in records {
        let weight = record.final_weight(now);
        total_weight += weight;

        if (now - record.created_at).num_days() <= 7 {
            recent_count += 1;
        }

        if let Some(city) = &record.city {
            *city_weights.entry(city.clone()).or_default() += weight;
        }

        // Only searches carry explicit category intent; one search can
        // strengthen several categories at once
        if record.kind == ActivityKind::Search {
            for category in &record.categories {
                *category_weights.entry(category.clone()).or_default() += weight;
            }
        }

        let bucket = TimeOfDay::from_hour(record.created_at.hour());
        *time_weights.entry(bucket).or_default() += weight;

        // chrono: Saturday/Sunday are weekend
        let weekday = record.created_at.weekday().number_from_monday();
        if weekday >= 6 {
            weekend_weight += weight;
        } else {
            weekday_weight += weight;
        }
    }

    let distinct_cities = city_weights.len();

    let mut city_affinities = normalize(city_weights);
    city_affinities.truncate(MAX_CITY_AFFINITIES);
    let category_affinities = normalize(category_weights);

    let preferred_time_of_day = time_weights
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(bucket, _)| *bucket);

    let engagement_score = (total_weight
        + 5.0 * recent_count as f64
        + 10.0 * distinct_cities as f64)
        .min(100.0);

    PreferenceProfile {
        activity_count: records.len(),
        is_new_user: false,
        engagement_score,
        engagement_level: EngagementLevel::from_score(engagement_score),
        city_affinities,
        category_affinities,
        temporal_pattern: TemporalPattern {
            preferred_time_of_day,
            weekday_weight,
            weekend_weight,
        },
        profile_strength: (records.len() as f64 * 5.0).min(100.0),
    }
}

/// Scales weights to 0–100 relative to the strongest entry, rounded to the
/// nearest integer, strongest first
fn normalize(weights: HashMap<String, f64>) -> Vec<Affinity> {
    let max = weights.values().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut affinities: Vec<Affinity> = weights
        .into_iter()
        .map(|(name, weight)| Affinity {
            name,
            score: (weight / max * 100.0).round(),
        })
        .collect();
    affinities.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    affinities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DurationBucket;

    fn anon() -> Identity {
        Identity::Anonymous {
            session_id: "s1".to_string(),
        }
    }

    fn record(kind: ActivityKind, city: &str, age_days: i64, now: DateTime<Utc>) -> ActivityRecord {
        let mut r = ActivityRecord::new(&anon(), kind, now - Duration::days(age_days));
        r.city = Some(city.to_string());
        r
    }

    #[test]
    fn test_single_record_yields_new_user() {
        // Fewer than two qualifying records, no matter how strong
        let now = Utc::now();
        let records = vec![record(ActivityKind::Favorite, "Rome", 0, now)];
        let profile = build_from_records(&records, now);
        assert!(profile.is_new_user);
        assert!(profile.city_affinities.is_empty());
        assert!(profile.category_affinities.is_empty());
        assert_eq!(profile.engagement_level, EngagementLevel::New);
    }

    #[test]
    fn test_empty_history_yields_new_user() {
        let profile = build_from_records(&[], Utc::now());
        assert!(profile.is_new_user);
        assert_eq!(profile.activity_count, 0);
    }

    #[test]
    fn test_affinity_normalization_bounds() {
        // All values in [0, 100], top entry exactly 100
        let now = Utc::now();
        let mut records = Vec::new();
        for _ in 0..6 {
            records.push(record(ActivityKind::View, "Rome", 1, now));
        }
        for _ in 0..3 {
            records.push(record(ActivityKind::View, "Tokyo", 1, now));
        }
        records.push(record(ActivityKind::Search, "Lisbon", 40, now));

        let profile = build_from_records(&records, now);
        assert!(!profile.city_affinities.is_empty());
        for affinity in &profile.city_affinities {
            assert!(affinity.score >= 0.0 && affinity.score <= 100.0);
        }
        assert_eq!(profile.city_affinities[0].score, 100.0);
    }

    #[test]
    fn test_sixty_forty_split_normalizes_to_100_and_67() {
        // 60% Rome / 40% Tokyo, same kind and age
        let now = Utc::now();
        let mut records = Vec::new();
        for _ in 0..12 {
            records.push(record(ActivityKind::View, "Rome", 1, now));
        }
        for _ in 0..8 {
            records.push(record(ActivityKind::View, "Tokyo", 1, now));
        }

        let profile = build_from_records(&records, now);
        assert_eq!(profile.city_affinities[0].name, "Rome");
        assert_eq!(profile.city_affinities[0].score, 100.0);
        assert_eq!(profile.city_affinities[1].name, "Tokyo");
        assert_eq!(profile.city_affinities[1].score, 67.0);
    }

    #[test]
    fn test_city_affinities_capped_at_five() {
        let now = Utc::now();
        let cities = ["Rome", "Tokyo", "Paris", "Lima", "Oslo", "Cairo", "Porto"];
        let mut records = Vec::new();
        for (i, city) in cities.iter().enumerate() {
            for _ in 0..(cities.len() - i) {
                records.push(record(ActivityKind::View, city, 1, now));
            }
        }

        let profile = build_from_records(&records, now);
        assert_eq!(profile.city_affinities.len(), 5);
        assert_eq!(profile.city_affinities[0].name, "Rome");
    }

    #[test]
    fn test_categories_come_from_search_records_only() {
        let now = Utc::now();
        let mut search = ActivityRecord::new(&anon(), ActivityKind::Search, now)
            .with_search_terms(
                vec!["Cultural".to_string(), "Outdoor".to_string()],
                Some(DurationBucket::Medium),
            );
        search.city = Some("Paris".to_string());

        // A view record with categories attached must not count
        let mut view = record(ActivityKind::View, "Paris", 0, now);
        view.categories = vec!["Gastronomy".to_string()];

        let profile = build_from_records(&[search, view], now);
        let names: Vec<&str> = profile
            .category_affinities
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert!(names.contains(&"Cultural"));
        assert!(names.contains(&"Outdoor"));
        assert!(!names.contains(&"Gastronomy"));
    }

    #[test]
    fn test_older_records_weigh_less_in_affinity() {
        // Decay carried through aggregation: equal counts, fresher city wins
        let now = Utc::now();
        let mut records = Vec::new();
        for _ in 0..4 {
            records.push(record(ActivityKind::View, "Rome", 1, now));
            records.push(record(ActivityKind::View, "Tokyo", 45, now));
        }

        let profile = build_from_records(&records, now);
        assert_eq!(profile.city_affinities[0].name, "Rome");
        assert!(profile.city_affinities[1].score < 100.0);
    }

    #[test]
    fn test_engagement_grows_with_volume() {
        let now = Utc::now();
        let few = vec![
            record(ActivityKind::Search, "Rome", 1, now),
            record(ActivityKind::Search, "Rome", 2, now),
        ];
        let sparse = build_from_records(&few, now);

        let mut many = Vec::new();
        for i in 0..12 {
            many.push(record(ActivityKind::Favorite, ["Rome", "Tokyo", "Paris"][i % 3], 1, now));
        }
        let dense = build_from_records(&many, now);

        assert!(dense.engagement_score > sparse.engagement_score);
        assert_eq!(dense.engagement_level, EngagementLevel::High);
    }

    #[test]
    fn test_temporal_pattern_tracks_dominant_bucket() {
        let now = Utc::now();
        let at_hour = |hour: u32| {
            let mut r = record(ActivityKind::View, "Rome", 0, now);
            r.created_at = r
                .created_at
                .date_naive()
                .and_hms_opt(hour, 0, 0)
                .unwrap()
                .and_utc();
            r
        };

        let records = vec![at_hour(19), at_hour(19), at_hour(19), at_hour(8)];
        let profile = build_from_records(&records, now);
        assert_eq!(
            profile.temporal_pattern.preferred_time_of_day,
            Some(TimeOfDay::Evening)
        );
    }
}
