//! Threshold-acceptance local search over candidate routes.

use crate::path::Path;
use crate::perturb::Perturber;
use crate::resegment::resegment;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-shot cooperative cancellation flag.
///
/// Clone the token, hand one copy to the search and keep the other; `cancel`
/// from anywhere, the loop polls `is_cancelled` at its checkpoints. Checking
/// never fails and never blocks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Tuning for the optimization loop.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Iteration budget before the search stops.
    pub max_iterations: usize,
    /// A candidate is accepted when its cost rises by no more than this.
    ///
    /// This is a fixed absolute threshold, deliberately independent of the
    /// cost model's scale; it is not an annealing schedule.
    pub accept_tolerance: f64,
    /// No candidate segment may exceed this fraction of total path length;
    /// candidates below the implied density are resegmented.
    pub max_segment_fraction: f64,
    /// Progress callback cadence in iterations.
    pub progress_interval: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            accept_tolerance: 1.0,
            max_segment_fraction: 0.05,
            progress_interval: 10,
        }
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub best_path: Path,
    pub best_cost: f64,
    pub iterations: usize,
}

/// A candidate whose cost evaluates to NaN can never win a comparison;
/// surface it as infinitely bad so the accept rule rejects it explicitly.
fn sanitize(cost: f64) -> f64 {
    if cost.is_nan() {
        f64::INFINITY
    } else {
        cost
    }
}

/// Run the search with default tuning. See [`optimize_with_config`].
pub fn optimize(
    path: &Path,
    cost: impl Fn(&Path) -> f64,
    strategies: &mut [Box<dyn Perturber>],
    progress: Option<&mut dyn FnMut(&Path, f64, usize)>,
    cancel: Option<&CancelToken>,
) -> SolveOutcome {
    optimize_with_config(path, cost, strategies, &SolverConfig::default(), progress, cancel)
}

/// Iteratively improve `path` under `cost` using the given strategies.
///
/// Each iteration draws one strategy at random, asks it for a candidate,
/// densifies the candidate up to the configured minimum point density, and
/// accepts it when the cost delta stays within the tolerance. The strategy
/// that produced the move is told whether it was accepted so it can maintain
/// its propagation plan. The best path and cost ever observed are returned;
/// the input path is never modified.
pub fn optimize_with_config(
    path: &Path,
    cost: impl Fn(&Path) -> f64,
    strategies: &mut [Box<dyn Perturber>],
    config: &SolverConfig,
    mut progress: Option<&mut dyn FnMut(&Path, f64, usize)>,
    cancel: Option<&CancelToken>,
) -> SolveOutcome {
    let mut current = path.clone();
    let mut current_cost = sanitize(cost(&current));
    let mut best = current.clone();
    let mut best_cost = current_cost;
    let mut iterations = 0usize;

    if strategies.is_empty() {
        tracing::warn!("no perturbation strategies configured, returning input path");
        return SolveOutcome {
            best_path: best,
            best_cost,
            iterations,
        };
    }

    // The candidate point floor never drops below the input's point count.
    let target_points = path.len();
    let progress_interval = config.progress_interval.max(1);
    let cost_ref: &dyn Fn(&Path) -> f64 = &cost;
    let mut rng = rand::rng();

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            tracing::debug!(iterations, "search cancelled");
            break;
        }

        let pick = rng.random_range(0..strategies.len());
        let mut candidate = strategies[pick].perturb(&current, Some(cost_ref), cancel);

        let total_length = candidate.total_distance();
        if total_length > 0.0 {
            let max_segment = (total_length * config.max_segment_fraction).max(1e-12);
            let desired_segments = (total_length / max_segment).ceil() as usize;
            let desired_points = target_points.max(desired_segments + 1);
            if desired_points > candidate.len() {
                if let Some(densified) = resegment(&candidate, desired_points) {
                    candidate = densified;
                }
            }
        }

        if cancel.is_some_and(CancelToken::is_cancelled) {
            tracing::debug!(iterations, "search cancelled");
            break;
        }

        let candidate_cost = sanitize(cost(&candidate));
        let delta = candidate_cost - current_cost;

        if delta <= config.accept_tolerance {
            let previous = std::mem::replace(&mut current, candidate);
            current_cost = candidate_cost;
            strategies[pick].on_move_accepted(&previous, &current);
            if current_cost < best_cost {
                best = current.clone();
                best_cost = current_cost;
            }
            tracing::debug!(
                iteration = iterations,
                strategy = strategies[pick].name(),
                delta,
                cost = current_cost,
                "accepted move"
            );
        } else {
            strategies[pick].on_move_rejected();
            tracing::debug!(
                iteration = iterations,
                strategy = strategies[pick].name(),
                delta,
                "rejected move"
            );
        }

        iterations += 1;
        if iterations % progress_interval == 0 {
            if let Some(callback) = progress.as_mut() {
                callback(&best, best_cost, iterations);
            }
        }

        if iterations >= config.max_iterations {
            break;
        }
    }

    SolveOutcome {
        best_path: best,
        best_cost,
        iterations,
    }
}
