//! Pure scoring functions for candidate ranking
//!
//! These functions contain NO side effects - they implement the business
//! logic for how well a responder fits a need. The assigner queries the geo
//! index for nearby candidates, then ranks them with these functions.

use std::collections::BTreeSet;

use crate::common::Capability;

/// Default weight for capability coverage (weighted highest).
pub const DEFAULT_WEIGHT_CAPABILITY: f64 = 1.0;
/// Default weight for normalized distance.
pub const DEFAULT_WEIGHT_DISTANCE: f64 = 0.5;
/// Default weight for current load fraction.
pub const DEFAULT_WEIGHT_LOAD: f64 = 0.25;

/// Weights for the composite ranking score. Policy, not physics: these are
/// surfaced through `MatcherConfig` so operators can tune them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub capability: f64,
    pub distance: f64,
    pub load: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            capability: DEFAULT_WEIGHT_CAPABILITY,
            distance: DEFAULT_WEIGHT_DISTANCE,
            load: DEFAULT_WEIGHT_LOAD,
        }
    }
}

/// Fraction of a need's required capabilities the responder covers, in [0, 1].
///
/// An empty required set scores 1.0 — any responder qualifies.
///
/// Partial coverage is deliberate policy: a responder offering only `water`
/// against `{water, medical}` still scores 0.5 and remains a candidate,
/// because a need should not go completely unserved for lack of one minor
/// capability. Full coverage outranks partial via the composite score.
pub fn capability_score(required: &BTreeSet<Capability>, offered: &BTreeSet<Capability>) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let covered = required.intersection(offered).count();
    covered as f64 / required.len() as f64
}

/// A responder is a candidate only if it covers at least one required
/// capability (score > 0).
pub fn is_candidate(required: &BTreeSet<Capability>, offered: &BTreeSet<Capability>) -> bool {
    capability_score(required, offered) > 0.0
}

/// Composite ranking score: higher is better.
///
/// `capability * w_c - (distance / max_radius) * w_d - load_fraction * w_l`
///
/// Distance is normalized by the configured search ceiling so the weights
/// stay comparable across deployments. Deterministic: equal inputs always
/// produce equal scores; the assigner breaks remaining ties by responder id.
pub fn composite_score(
    capability: f64,
    distance_km: f64,
    max_radius_km: f64,
    load_fraction: f64,
    weights: &RankingWeights,
) -> f64 {
    let normalized_distance = if max_radius_km > 0.0 {
        (distance_km / max_radius_km).min(1.0)
    } else {
        1.0
    };

    capability * weights.capability
        - normalized_distance * weights.distance
        - load_fraction * weights.load
}
