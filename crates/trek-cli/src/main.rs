//! trek - terrain-aware route optimizer CLI.

mod terrain;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::terrain::GridTerrain;
use trek_core::{
    optimize_with_config, simplify, CancelToken, CostRegistry, Path, Perturber, SharedElevation,
    SinglePointMover, SolverConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Terrain-aware route optimizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimize a route against a cost model
    Optimize(OptimizeArgs),
    /// List the registered cost models
    Costs,
}

#[derive(Args, Debug)]
struct OptimizeArgs {
    /// Route waypoints as JSON: [[x, y], ...] in raster coordinates
    #[arg(long)]
    route: PathBuf,

    /// ESRI ASCII elevation grid; a synthetic surface is used when omitted
    #[arg(long)]
    terrain: Option<PathBuf>,

    /// Cost model key (see `trek costs`)
    #[arg(long, default_value = "acsm")]
    cost: String,

    /// Time budget in hours passed to the cost model
    #[arg(long, default_value_t = 1.0)]
    hours: f64,

    /// Iteration budget for the search
    #[arg(long, default_value_t = 1000)]
    iterations: usize,

    /// Merge consecutive waypoints closer than this before optimizing
    #[arg(long)]
    merge_below: Option<f64>,

    /// Drop near-collinear points from the result with this tolerance
    #[arg(long)]
    simplify_tolerance: Option<f64>,

    /// Wall-clock limit in seconds; the search is cancelled cooperatively
    #[arg(long)]
    time_limit: Option<f64>,

    /// Write the optimized route as JSON [[x, y, z], ...]
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trek_cli=info".parse()?)
                .add_directive("trek_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Optimize(args) => run_optimize(args),
        Command::Costs => {
            list_costs();
            Ok(())
        }
    }
}

fn run_optimize(args: OptimizeArgs) -> Result<()> {
    let registry = CostRegistry::with_builtins();
    let model = registry
        .get(&args.cost)
        .with_context(|| format!("unknown cost model {:?}, see `trek costs`", args.cost))?;
    let label = registry
        .entries()
        .find(|(key, _)| *key == args.cost)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| args.cost.clone());

    let waypoints = load_route(&args.route)?;
    if waypoints.len() < 2 {
        bail!("route needs at least 2 waypoints");
    }

    let grid = match &args.terrain {
        Some(path) => GridTerrain::from_ascii_grid(path)?,
        None => {
            let (cols, rows) = synthetic_extent(&waypoints);
            tracing::info!(cols, rows, "no terrain grid given, using a synthetic surface");
            GridTerrain::synthetic(cols, rows)
        }
    };
    let source: SharedElevation = Arc::new(grid);

    let mut path = Path::with_source(source);
    for [x, y] in &waypoints {
        path.add_point(*x, *y)
            .with_context(|| format!("waypoint ({x}, {y}) is outside the terrain grid"))?;
    }
    path.locked = true;

    if let Some(threshold) = args.merge_below {
        let before = path.len();
        path.consolidate_consecutive_clusters(threshold);
        if path.len() != before {
            tracing::info!(before, after = path.len(), "merged close waypoints");
        }
    }

    let hours = args.hours;
    let initial_cost = (*model)(&path, hours);
    let started_at = Utc::now();
    let start = Instant::now();
    let token = CancelToken::new();
    let config = SolverConfig {
        max_iterations: args.iterations,
        ..SolverConfig::default()
    };

    // The search runs on its own thread so a wall-clock limit can cancel it
    // cooperatively from here.
    let handle = {
        let token = token.clone();
        let path = path.clone();
        let model = model.clone();
        std::thread::spawn(move || {
            let cost = move |p: &Path| (*model)(p, hours);
            let mut strategies: Vec<Box<dyn Perturber>> =
                vec![Box::new(SinglePointMover::new())];
            let mut progress = |_: &Path, best_cost: f64, iteration: usize| {
                if iteration % 100 == 0 {
                    tracing::info!(iteration, best_cost, "search progress");
                }
            };
            optimize_with_config(
                &path,
                cost,
                &mut strategies,
                &config,
                Some(&mut progress),
                Some(&token),
            )
        })
    };

    if let Some(limit) = args.time_limit {
        let limit = if limit.is_finite() { limit.max(0.0) } else { 0.0 };
        let deadline = Duration::from_secs_f64(limit);
        while !handle.is_finished() && start.elapsed() < deadline {
            std::thread::sleep(Duration::from_millis(25));
        }
        if !handle.is_finished() {
            tracing::warn!(limit, "time limit reached, cancelling search");
            token.cancel();
        }
    }

    let outcome = match handle.join() {
        Ok(outcome) => outcome,
        Err(_) => bail!("search thread panicked"),
    };

    let mut best = outcome.best_path;
    if let Some(tolerance) = args.simplify_tolerance {
        let before = best.len();
        best = simplify(&best, tolerance);
        tracing::info!(before, after = best.len(), "simplified optimized route");
    }

    let distance = best.total_distance();
    let (gain, loss) = best.elevation_gain_loss();

    println!("Route optimization finished ({label})");
    println!("  started:     {}", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  elapsed:     {:.2} s", start.elapsed().as_secs_f64());
    println!("  iterations:  {}", outcome.iterations);
    println!("  cost:        {initial_cost:.4} -> {:.4}", outcome.best_cost);
    println!("  points:      {} -> {}", waypoints.len(), best.len());
    println!("  distance:    {distance:.2}");
    println!("  gain/loss:   +{gain:.1} / -{loss:.1}");

    if let Some(out) = &args.out {
        write_route(out, &best)?;
        println!("  written to:  {}", out.display());
    }

    Ok(())
}

fn list_costs() {
    let registry = CostRegistry::with_builtins();
    println!("Available cost models:");
    for (key, label) in registry.entries() {
        println!("  {key:<8} {label}");
    }
}

fn load_route(path: &std::path::Path) -> Result<Vec<[f64; 2]>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading route {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing route {}", path.display()))
}

fn write_route(path: &std::path::Path, route: &Path) -> Result<()> {
    let points: Vec<[f64; 3]> = route.points().iter().map(|p| [p.x, p.y, p.z]).collect();
    let text = serde_json::to_string_pretty(&points)?;
    std::fs::write(path, text).with_context(|| format!("writing route {}", path.display()))
}

/// Synthetic surface extent: the route's bounding box plus working margin.
fn synthetic_extent(waypoints: &[[f64; 2]]) -> (usize, usize) {
    let mut max_x: f64 = 0.0;
    let mut max_y: f64 = 0.0;
    for [x, y] in waypoints {
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }
    let cols = (max_x.ceil() as usize + 64).max(256);
    let rows = (max_y.ceil() as usize + 64).max(256);
    (cols, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_extent_covers_route_with_margin() {
        let extent = synthetic_extent(&[[10.0, 20.0], [300.0, 150.0]]);
        assert_eq!(extent, (364, 256));
    }

    #[test]
    fn route_files_round_trip() {
        let dir = std::env::temp_dir();
        let out = dir.join(format!("trek-route-test-{}.json", std::process::id()));

        let mut route = Path::new();
        route.add_point_with_z(1.0, 2.0, 3.0);
        route.add_point_with_z(4.0, 5.0, 6.0);
        write_route(&out, &route).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let points: Vec<[f64; 3]> = serde_json::from_str(&text).unwrap();
        assert_eq!(points, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        std::fs::remove_file(&out).ok();
    }
}
