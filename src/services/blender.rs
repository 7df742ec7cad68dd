use std::collections::HashSet;

use rand::Rng;

use crate::models::{RecommendationSource, ScoredPlace};

/// Per-scorer share of the requested limit when a search context is
/// present; without one, the context share is redistributed.
const CONTEXT_SHARE: f64 = 0.50;
const HISTORY_SHARE: f64 = 0.25;
const COLLABORATIVE_SHARE: f64 = 0.15;
const DISCOVERY_SHARE: f64 = 0.10;

/// How many candidates each scorer is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorerLimits {
    pub context: usize,
    pub history: usize,
    pub collaborative: usize,
    pub discovery: usize,
}

impl ScorerLimits {
    /// Splits the requested limit across the scorers.
    ///
    /// Shares are rounded up and floored at one so every available signal
    /// contributes at least one candidate; the blender trims the excess.
    pub fn for_request(limit: usize, has_context: bool) -> Self {
        let share = |fraction: f64| ((limit as f64 * fraction).ceil() as usize).max(1);

        if has_context {
            Self {
                context: share(CONTEXT_SHARE),
                history: share(HISTORY_SHARE),
                collaborative: share(COLLABORATIVE_SHARE),
                discovery: share(DISCOVERY_SHARE),
            }
        } else {
            // No context signal: its share is absorbed by the rest
            let scale = 1.0 - CONTEXT_SHARE;
            Self {
                context: 0,
                history: share(HISTORY_SHARE / scale),
                collaborative: share(COLLABORATIVE_SHARE / scale),
                discovery: share(DISCOVERY_SHARE / scale),
            }
        }
    }
}

fn normalized_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Priority rank of a source when city slots are contested
fn source_rank(source: RecommendationSource) -> u8 {
    match source {
        RecommendationSource::SearchContext => 0,
        RecommendationSource::UserHistory => 1,
        RecommendationSource::Collaborative => 2,
        RecommendationSource::Discovery => 3,
        RecommendationSource::Trending => 4,
    }
}

/// Merges scorer outputs into the final ranked list.
///
/// `candidates` must already be concatenated in priority order (context,
/// history, collaborative, discovery, trending fill). The blend removes
/// name duplicates (first occurrence wins), then enforces at most one place
/// per city, relaxing that cap only when the pool cannot otherwise fill
/// `limit`. Selection under the cap is randomized so repeat requests vary;
/// the selected entries come back in priority order.
pub fn blend(candidates: Vec<ScoredPlace>, limit: usize) -> Vec<ScoredPlace> {
    if limit == 0 {
        return Vec::new();
    }

    // Drop duplicate place names, first occurrence wins
    let mut seen_names: HashSet<String> = HashSet::new();
    let deduped: Vec<ScoredPlace> = candidates
        .into_iter()
        .filter(|c| seen_names.insert(normalized_name(&c.place.name)))
        .collect();

    // A shuffled pass decides who survives the one-per-city cap. The
    // shuffle is scoped within each source tier so randomness varies which
    // of a scorer's candidates win a contested city, while a weaker signal
    // can never displace a stronger one from its city slot.
    let mut rng = rand::thread_rng();
    let mut order: Vec<(u8, u32, usize)> = deduped
        .iter()
        .enumerate()
        .map(|(index, c)| (source_rank(c.source), rng.gen::<u32>(), index))
        .collect();
    order.sort_unstable();
    let order: Vec<usize> = order.into_iter().map(|(_, _, index)| index).collect();

    let mut seen_cities: HashSet<String> = HashSet::new();
    let mut selected: HashSet<usize> = HashSet::new();
    for &index in &order {
        if selected.len() >= limit {
            break;
        }
        if seen_cities.insert(deduped[index].place.city.clone()) {
            selected.insert(index);
        }
    }

    // Scarcity: not enough distinct cities, relax the cap and top up in
    // priority order (still no name duplicates)
    if selected.len() < limit {
        for index in 0..deduped.len() {
            if selected.len() >= limit {
                break;
            }
            selected.insert(index);
        }
    }

    // Emit in priority order so the strongest signal leads the list
    deduped
        .into_iter()
        .enumerate()
        .filter(|(index, _)| selected.contains(index))
        .map(|(_, candidate)| candidate)
        .collect()
}
