//! Cost models for scoring candidate routes.
//!
//! Every model maps `(path, time_budget_hours)` to a scalar where larger is
//! worse. Models are stateless and safe to evaluate concurrently; the
//! optimizer binds the time budget and passes a single-argument closure to
//! its perturbation strategies.

use crate::path::Path;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared, thread-safe cost model.
pub type CostModel = Arc<dyn Fn(&Path, f64) -> f64 + Send + Sync>;

/// Metabolic running-energy model (RE3).
///
/// Splits the time budget evenly across segments and charges for time,
/// distance, pace, and a grade-dependent climbing term. A path with one
/// segment or fewer costs nothing.
pub fn running_energy(path: &Path, time_hours: f64) -> f64 {
    let seg_count = path.len().saturating_sub(1);
    if seg_count == 0 {
        return 0.0;
    }

    let mut seg_time = time_hours * 3600.0 / seg_count as f64;
    if seg_time == 0.0 {
        seg_time = 1e-9;
    }

    let mut dist_sum = 0.0;
    let mut pace_sum = 0.0;
    let mut climb_sum = 0.0;
    for seg in path.segments() {
        let dist = seg.distance;
        let rise = seg.dz;
        dist_sum += dist;
        pace_sum += dist * dist / seg_time;
        // Grade term; zero-length segments flow through IEEE arithmetic and
        // surface as non-finite cost, which the solver rejects.
        let grade_exp = rise / dist + 0.43;
        let inner = 1.0 - 1.056_f64.powf(grade_exp);
        climb_sum += rise * (1.0 - 1.133_f64.powf(inner));
    }

    4.43 * time_hours + 1.39 * dist_sum + 0.185 * pace_sum + 30.43 * climb_sum
}

/// Walking-energy model (ACSM).
///
/// Charges for distance, raw elevation delta, and the time budget. Paths
/// with one segment or fewer cost nothing (guards the per-segment time
/// division).
pub fn walking_energy(path: &Path, time_hours: f64) -> f64 {
    let seg_count = path.len().saturating_sub(1);
    if seg_count == 0 {
        return 0.0;
    }

    let mut dist_sum = 0.0;
    let mut rise_sum = 0.0;
    for seg in path.segments() {
        dist_sum += seg.distance;
        rise_sum += seg.dz;
    }

    0.1 * dist_sum + 1.8 * rise_sum + 0.0583 * time_hours
}

/// Climb-avoidance heuristic: total climb plus a small distance term.
pub fn climb_aversion(path: &Path, _time_hours: f64) -> f64 {
    let mut dist_sum = 0.0;
    let mut climb_sum = 0.0;
    for seg in path.segments() {
        dist_sum += seg.distance;
        if seg.dz > 0.0 {
            climb_sum += seg.dz;
        }
    }
    climb_sum + dist_sum / 300.0
}

/// Registry mapping a stable key and display label to a cost model.
///
/// Constructed once by the host and passed by reference wherever cost models
/// are selected; there is no global registry.
#[derive(Clone, Default)]
pub struct CostRegistry {
    entries: BTreeMap<String, (String, CostModel)>,
}

impl CostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the three reference models.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("re3", "Running energy (RE3)", Arc::new(running_energy));
        registry.register("acsm", "Walking energy (ACSM)", Arc::new(walking_energy));
        registry.register("climb", "Climb aversion", Arc::new(climb_aversion));
        registry
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        label: impl Into<String>,
        model: CostModel,
    ) {
        self.entries.insert(key.into(), (label.into(), model));
    }

    /// Look up a model by key.
    pub fn get(&self, key: &str) -> Option<CostModel> {
        self.entries.get(key).map(|(_, model)| model.clone())
    }

    /// Registered `(key, label)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, (label, _))| (key.as_str(), label.as_str()))
    }
}
