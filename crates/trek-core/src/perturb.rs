//! Perturbation strategies: candidate-generating moves for the local search.

use crate::path::{Path, Point};
use crate::solver::CancelToken;
use rand::Rng;

/// A strategy that proposes one modified path per call.
///
/// Strategies own their cross-iteration state (e.g. a propagation plan) and
/// must not be shared across concurrent optimization runs. The optimizer
/// reports the fate of each proposed move through `on_move_accepted` /
/// `on_move_rejected`.
pub trait Perturber {
    fn name(&self) -> &'static str;

    /// Produce a candidate derived from `path`. The cost function, when
    /// given, guides the strategy's internal sampling; the cancel token is
    /// polled before each evaluation and short-circuits with the best
    /// candidate found so far.
    fn perturb(
        &mut self,
        path: &Path,
        cost: Option<&dyn Fn(&Path) -> f64>,
        cancel: Option<&CancelToken>,
    ) -> Path;

    /// The optimizer accepted the move this strategy produced last.
    fn on_move_accepted(&mut self, old: &Path, new: &Path);

    /// The optimizer rejected the move this strategy produced last.
    fn on_move_rejected(&mut self);
}

/// A center-point displacement re-applied in part to the center's neighbors
/// over a bounded number of subsequent accepted iterations.
#[derive(Debug, Clone, Copy)]
struct PropagationPlan {
    center: usize,
    dx: f64,
    dy: f64,
    neighbor_fraction: f64,
    steps_remaining: u32,
}

#[derive(Debug, Clone, Copy)]
struct RecordedMove {
    index: usize,
    dx: f64,
    dy: f64,
}

const PROPAGATION_NEIGHBOR_FRACTION: f64 = 0.5;
const PROPAGATION_STEPS: u32 = 3;

/// Relocates one random interior vertex by circular-neighborhood sampling
/// followed by a shrinking-radius refinement, keeping the best strict
/// improvement. After an accepted move it plans a short sequence of
/// correlated neighbor nudges.
#[derive(Debug)]
pub struct SinglePointMover {
    samples: usize,
    max_refine_rounds: usize,
    propagation: Option<PropagationPlan>,
    last_move: Option<RecordedMove>,
}

impl Default for SinglePointMover {
    fn default() -> Self {
        Self::new()
    }
}

impl SinglePointMover {
    pub fn new() -> Self {
        Self::with_params(16, 6)
    }

    /// `samples` candidate offsets per coarse pass, at most
    /// `max_refine_rounds` halved-radius refinement rounds.
    pub fn with_params(samples: usize, max_refine_rounds: usize) -> Self {
        Self {
            samples,
            max_refine_rounds,
            propagation: None,
            last_move: None,
        }
    }

    fn movement_radius(path: &Path) -> f64 {
        let segments = path.segments();
        if segments.is_empty() {
            return 5.0;
        }
        let mean = segments.iter().map(|seg| seg.distance).sum::<f64>() / segments.len() as f64;
        (0.25 * mean).max(1.0)
    }

    /// Build a candidate with the point at `index` displaced by `(dx, dy)`
    /// and all elevations re-sampled tolerantly.
    fn build_candidate(base: &Path, points: &[Point], index: usize, dx: f64, dy: f64) -> Path {
        let mut moved = points.to_vec();
        moved[index].x += dx;
        moved[index].y += dy;
        let mut candidate = Path::from_points(base.source().cloned(), moved, base.locked);
        if candidate.source().is_some() {
            // With a source present the resample is infallible; out-of-bounds
            // points keep their previous z.
            let _ = candidate.update_all_z();
        }
        candidate
    }

    fn propagated_candidate(&mut self, path: &Path, plan: PropagationPlan) -> Path {
        let mut points = path.points().to_vec();
        for (i, point) in points.iter_mut().enumerate() {
            if i == plan.center {
                point.x += plan.dx;
                point.y += plan.dy;
            } else if i + 1 == plan.center || i == plan.center + 1 {
                point.x += plan.dx * plan.neighbor_fraction;
                point.y += plan.dy * plan.neighbor_fraction;
            }
        }
        let mut candidate = Path::from_points(path.source().cloned(), points, path.locked);
        if candidate.source().is_some() {
            let _ = candidate.update_all_z();
        }
        self.last_move = Some(RecordedMove {
            index: plan.center,
            dx: plan.dx,
            dy: plan.dy,
        });
        tracing::trace!(
            center = plan.center,
            steps_remaining = plan.steps_remaining,
            "propagating accepted displacement to neighbors"
        );
        candidate
    }
}

fn cancelled(cancel: Option<&CancelToken>) -> bool {
    cancel.is_some_and(CancelToken::is_cancelled)
}

impl Perturber for SinglePointMover {
    fn name(&self) -> &'static str {
        "relocate-point"
    }

    fn perturb(
        &mut self,
        path: &Path,
        cost: Option<&dyn Fn(&Path) -> f64>,
        cancel: Option<&CancelToken>,
    ) -> Path {
        if path.len() < 3 {
            return path.clone();
        }

        // An active plan takes priority: emit the correlated neighbor nudge
        // and let the optimizer evaluate it.
        if let Some(plan) = self.propagation.filter(|plan| plan.steps_remaining > 0) {
            return self.propagated_candidate(path, plan);
        }

        let mut rng = rand::rng();
        let index = rng.random_range(1..path.len() - 1);
        let radius = Self::movement_radius(path);

        let baseline = cost.map_or(f64::INFINITY, |f| f(path));
        let original = path.points().to_vec();
        let mut best: Option<Path> = None;
        let mut best_cost = baseline;

        // Coarse sampling around the chosen vertex.
        for _ in 0..self.samples {
            if cancelled(cancel) {
                return best.unwrap_or_else(|| path.clone());
            }
            let angle = rng.random_range(0.0..std::f64::consts::TAU);
            let r = rng.random_range(0.0..=radius);
            let candidate =
                Self::build_candidate(path, &original, index, r * angle.cos(), r * angle.sin());

            if cancelled(cancel) {
                return best.unwrap_or_else(|| path.clone());
            }
            let candidate_cost = cost.map_or(0.0, |f| f(&candidate));
            if candidate_cost < best_cost {
                best_cost = candidate_cost;
                let moved = candidate.points()[index];
                self.last_move = Some(RecordedMove {
                    index,
                    dx: moved.x - original[index].x,
                    dy: moved.y - original[index].y,
                });
                tracing::debug!(
                    index,
                    delta = best_cost - baseline,
                    "relocation improved candidate"
                );
                best = Some(candidate);
            }
        }

        // Shrinking-radius refinement around the running best; displacements
        // accumulate on the candidate, the recorded move stays relative to
        // the original position.
        for round in 0..self.max_refine_rounds {
            let mut improved = false;
            let round_radius = radius * 0.5_f64.powi(round as i32 + 1);
            for _ in 0..(self.samples / 2).max(8) {
                if cancelled(cancel) {
                    return best.unwrap_or_else(|| path.clone());
                }
                let angle = rng.random_range(0.0..std::f64::consts::TAU);
                let r = rng.random_range(0.0..=round_radius);
                let base_points = best.as_ref().unwrap_or(path).points().to_vec();
                let candidate = Self::build_candidate(
                    path,
                    &base_points,
                    index,
                    r * angle.cos(),
                    r * angle.sin(),
                );

                if cancelled(cancel) {
                    return best.unwrap_or_else(|| path.clone());
                }
                let candidate_cost = cost.map_or(0.0, |f| f(&candidate));
                if candidate_cost < best_cost {
                    best_cost = candidate_cost;
                    let moved = candidate.points()[index];
                    self.last_move = Some(RecordedMove {
                        index,
                        dx: moved.x - original[index].x,
                        dy: moved.y - original[index].y,
                    });
                    tracing::debug!(
                        index,
                        round,
                        delta = best_cost - baseline,
                        "refinement improved candidate"
                    );
                    best = Some(candidate);
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }

        match best {
            Some(candidate) => candidate,
            None => {
                self.last_move = None;
                path.clone()
            }
        }
    }

    fn on_move_accepted(&mut self, _old: &Path, _new: &Path) {
        let Some(last) = self.last_move else {
            return;
        };

        if let Some(plan) = self.propagation.as_mut() {
            if plan.center == last.index {
                // The center is still drifting: adopt the latest displacement
                // and consume one propagation step.
                plan.dx = last.dx;
                plan.dy = last.dy;
                plan.steps_remaining = plan.steps_remaining.saturating_sub(1);
                if plan.steps_remaining == 0 {
                    self.propagation = None;
                }
                return;
            }
        }

        self.propagation = Some(PropagationPlan {
            center: last.index,
            dx: last.dx,
            dy: last.dy,
            neighbor_fraction: PROPAGATION_NEIGHBOR_FRACTION,
            steps_remaining: PROPAGATION_STEPS,
        });
    }

    fn on_move_rejected(&mut self) {
        self.propagation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::walking_energy;

    fn zigzag_path() -> Path {
        let mut path = Path::new();
        path.add_point_with_z(0.0, 0.0, 0.0);
        path.add_point_with_z(10.0, 40.0, 0.0);
        path.add_point_with_z(20.0, 0.0, 0.0);
        path
    }

    #[test]
    fn short_paths_are_returned_unchanged() {
        let mut mover = SinglePointMover::new();
        let mut path = Path::new();
        path.add_point_with_z(0.0, 0.0, 0.0);
        path.add_point_with_z(10.0, 0.0, 0.0);

        let result = mover.perturb(&path, None, None);
        assert_eq!(result.points(), path.points());
    }

    #[test]
    fn perturb_never_returns_a_worse_candidate() {
        let cost = |p: &Path| walking_energy(p, 1.0);
        let mut mover = SinglePointMover::new();
        let path = zigzag_path();
        let baseline = cost(&path);

        for _ in 0..5 {
            let candidate = mover.perturb(&path, Some(&cost), None);
            assert!(cost(&candidate) <= baseline);
            assert_eq!(candidate.len(), path.len());
        }
    }

    #[test]
    fn perturb_moves_only_the_interior() {
        let cost = |p: &Path| walking_energy(p, 1.0);
        let mut mover = SinglePointMover::new();
        let path = zigzag_path();

        let candidate = mover.perturb(&path, Some(&cost), None);
        assert_eq!(candidate.points()[0], path.points()[0]);
        assert_eq!(candidate.points()[2], path.points()[2]);
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let cost = |p: &Path| walking_energy(p, 1.0);
        let token = CancelToken::new();
        token.cancel();

        let mut mover = SinglePointMover::new();
        let path = zigzag_path();
        let result = mover.perturb(&path, Some(&cost), Some(&token));
        assert_eq!(result.points(), path.points());
    }

    #[test]
    fn accepted_move_seeds_a_propagation_plan() {
        let mut mover = SinglePointMover::new();
        mover.last_move = Some(RecordedMove {
            index: 2,
            dx: 4.0,
            dy: -2.0,
        });

        let path = zigzag_path();
        mover.on_move_accepted(&path, &path);

        let plan = mover.propagation.expect("plan seeded");
        assert_eq!(plan.center, 2);
        assert_eq!(plan.steps_remaining, PROPAGATION_STEPS);
        assert_eq!(plan.neighbor_fraction, PROPAGATION_NEIGHBOR_FRACTION);
    }

    #[test]
    fn repeated_acceptance_consumes_and_expires_the_plan() {
        let mut mover = SinglePointMover::new();
        let path = zigzag_path();

        mover.last_move = Some(RecordedMove {
            index: 1,
            dx: 1.0,
            dy: 0.0,
        });
        mover.on_move_accepted(&path, &path);
        assert_eq!(mover.propagation.unwrap().steps_remaining, 3);

        // Same center: each acceptance refreshes the displacement and
        // consumes one step.
        mover.last_move = Some(RecordedMove {
            index: 1,
            dx: 2.0,
            dy: 0.5,
        });
        mover.on_move_accepted(&path, &path);
        let plan = mover.propagation.unwrap();
        assert_eq!(plan.steps_remaining, 2);
        assert_eq!(plan.dx, 2.0);

        mover.on_move_accepted(&path, &path);
        mover.on_move_accepted(&path, &path);
        assert!(mover.propagation.is_none());
    }

    #[test]
    fn rejection_drops_the_plan() {
        let mut mover = SinglePointMover::new();
        mover.last_move = Some(RecordedMove {
            index: 1,
            dx: 1.0,
            dy: 1.0,
        });
        mover.on_move_accepted(&zigzag_path(), &zigzag_path());
        assert!(mover.propagation.is_some());

        mover.on_move_rejected();
        assert!(mover.propagation.is_none());
    }

    #[test]
    fn active_plan_produces_the_correlated_nudge() {
        let mut path = Path::new();
        for i in 0..5 {
            path.add_point_with_z(i as f64 * 10.0, 0.0, 0.0);
        }

        let mut mover = SinglePointMover::new();
        mover.propagation = Some(PropagationPlan {
            center: 2,
            dx: 6.0,
            dy: 4.0,
            neighbor_fraction: 0.5,
            steps_remaining: 2,
        });

        let candidate = mover.perturb(&path, None, None);
        let delta: Vec<(f64, f64)> = candidate
            .points()
            .iter()
            .zip(path.points())
            .map(|(c, p)| (c.x - p.x, c.y - p.y))
            .collect();

        assert_eq!(delta[0], (0.0, 0.0));
        assert_eq!(delta[1], (3.0, 2.0));
        assert_eq!(delta[2], (6.0, 4.0));
        assert_eq!(delta[3], (3.0, 2.0));
        assert_eq!(delta[4], (0.0, 0.0));
    }

    #[test]
    fn no_improvement_leaves_no_recorded_move() {
        // Constant cost: nothing beats the baseline strictly, so no move is
        // recorded and a later acceptance cannot seed a plan.
        let cost = |_: &Path| 1.0;
        let mut mover = SinglePointMover::new();
        let path = zigzag_path();

        let result = mover.perturb(&path, Some(&cost), None);
        assert_eq!(result.points(), path.points());
        assert!(mover.last_move.is_none());

        mover.on_move_accepted(&path, &result);
        assert!(mover.propagation.is_none());
    }
}
