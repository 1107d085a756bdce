//! Core logic for terrain-aware route optimization.
//!
//! A route is a [`Path`] of (x, y, z) points over a raster elevation surface.
//! The engine improves a route against a cost model by repeated local
//! perturbation with a fixed-tolerance acceptance rule, keeping point density
//! well-formed through resegmentation.

pub mod cost;
pub mod elevation;
pub mod error;
pub mod path;
pub mod perturb;
pub mod resegment;
pub mod solver;

pub use cost::{climb_aversion, running_energy, walking_energy, CostModel, CostRegistry};
pub use elevation::{ElevationSource, SharedElevation};
pub use error::PathError;
pub use path::{Path, Point, Segment};
pub use perturb::{Perturber, SinglePointMover};
pub use resegment::{resegment, simplify};
pub use solver::{
    optimize, optimize_with_config, CancelToken, SolveOutcome, SolverConfig,
};
