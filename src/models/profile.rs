use serde::{Deserialize, Serialize};

/// How engaged an identity is, derived from its weighted activity volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    New,
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    /// Classifies a numeric engagement score (0–100)
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            EngagementLevel::High
        } else if score >= 35.0 {
            EngagementLevel::Medium
        } else if score >= 10.0 {
            EngagementLevel::Low
        } else {
            EngagementLevel::New
        }
    }
}

/// Coarse time-of-day buckets for activity patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Buckets an hour of day: morning 6–12, afternoon 12–17, evening
    /// 17–21, the rest is night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

/// A city or category with its normalized affinity score (0–100, relative
/// to the identity's strongest signal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affinity {
    pub name: String,
    pub score: f64,
}

/// When the identity tends to be active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalPattern {
    pub preferred_time_of_day: Option<TimeOfDay>,
    pub weekday_weight: f64,
    pub weekend_weight: f64,
}

impl Default for TemporalPattern {
    fn default() -> Self {
        Self {
            preferred_time_of_day: None,
            weekday_weight: 0.0,
            weekend_weight: 0.0,
        }
    }
}

/// A normalized, time-decayed preference profile for one identity.
///
/// Rebuilt from raw activity on every recommendation request; nothing here
/// is persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub activity_count: usize,
    pub is_new_user: bool,
    pub engagement_score: f64,
    pub engagement_level: EngagementLevel,
    /// Top cities by weighted interaction, strongest first, at most five
    pub city_affinities: Vec<Affinity>,
    /// Activity categories by weighted interest, strongest first
    pub category_affinities: Vec<Affinity>,
    pub temporal_pattern: TemporalPattern,
    /// Reporting metric only, never a scoring input
    pub profile_strength: f64,
}

impl PreferenceProfile {
    /// The profile returned for identities with too little history to
    /// personalize: empty affinities, engagement "new".
    pub fn new_user(activity_count: usize) -> Self {
        Self {
            activity_count,
            is_new_user: true,
            engagement_score: 0.0,
            engagement_level: EngagementLevel::New,
            city_affinities: Vec::new(),
            category_affinities: Vec::new(),
            temporal_pattern: TemporalPattern::default(),
            profile_strength: (activity_count as f64 * 5.0).min(100.0),
        }
    }

    /// Cities present in the affinity map, strongest first
    pub fn affinity_cities(&self) -> Vec<String> {
        self.city_affinities.iter().map(|a| a.name.clone()).collect()
    }
}
