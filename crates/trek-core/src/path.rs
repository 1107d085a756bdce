//! Route paths in raster/elevation space.

use crate::elevation::SharedElevation;
use crate::error::PathError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single route vertex. `x` and `y` are raster coordinates, `z` is the
/// elevation at that location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Span between two consecutive path points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// 3-D Euclidean length of the span.
    pub distance: f64,
}

/// An ordered, mutable sequence of route points.
///
/// The point order is the route order; the first and last point are the
/// route's endpoints. When `locked` is set, the endpoints cannot be deleted,
/// shifted, or merged away. Cloning a path copies the points and shares the
/// read-only elevation source handle.
#[derive(Clone, Default)]
pub struct Path {
    points: Vec<Point>,
    source: Option<SharedElevation>,
    /// Protects the first and last point from mutation when true.
    pub locked: bool,
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("points", &self.points)
            .field("locked", &self.locked)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl Path {
    /// Create an empty path with no elevation source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty path backed by an elevation source.
    pub fn with_source(source: SharedElevation) -> Self {
        Self {
            points: Vec::new(),
            source: Some(source),
            locked: false,
        }
    }

    /// Assemble a path directly from points, bypassing per-point sampling.
    ///
    /// Used by perturbation strategies and the resegmenter to build candidate
    /// paths wholesale; lock checks do not apply here because the caller is
    /// constructing a fresh value, not mutating an existing route.
    pub fn from_points(source: Option<SharedElevation>, points: Vec<Point>, locked: bool) -> Self {
        Self {
            points,
            source,
            locked,
        }
    }

    /// Set or replace the elevation source.
    pub fn set_source(&mut self, source: SharedElevation) {
        self.source = Some(source);
    }

    /// The shared elevation source handle, if one is configured.
    pub fn source(&self) -> Option<&SharedElevation> {
        self.source.as_ref()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points in route order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Copy of the point at `index`.
    pub fn point(&self, index: usize) -> Result<Point, PathError> {
        self.points
            .get(index)
            .copied()
            .ok_or(PathError::OutOfRange {
                index,
                len: self.points.len(),
            })
    }

    /// Remove all points. The lock flag and source are kept.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Whether `index` addresses an endpoint (first or last point).
    pub fn is_protected(&self, index: usize) -> bool {
        if self.points.is_empty() {
            return false;
        }
        index == 0 || index == self.points.len() - 1
    }

    fn sample(&self, x: f64, y: f64) -> Result<f64, PathError> {
        let source = self.source.as_ref().ok_or(PathError::MissingElevation)?;
        // Raster lookups truncate toward zero, matching integer cell addressing.
        let (cx, cy) = (x as i32, y as i32);
        source
            .elevation(cx, cy)
            .ok_or(PathError::Sample { x: cx, y: cy })
    }

    fn check_mutable(&self, index: usize) -> Result<(), PathError> {
        if index >= self.points.len() {
            return Err(PathError::OutOfRange {
                index,
                len: self.points.len(),
            });
        }
        if self.locked && (index == 0 || index == self.points.len() - 1) {
            return Err(PathError::LockedEndpoint(index));
        }
        Ok(())
    }

    /// Append a point, sampling its elevation from the source.
    pub fn add_point(&mut self, x: f64, y: f64) -> Result<(), PathError> {
        let z = self.sample(x, y)?;
        self.points.push(Point::new(x, y, z));
        Ok(())
    }

    /// Append a point with an explicit elevation; no sampling occurs.
    pub fn add_point_with_z(&mut self, x: f64, y: f64, z: f64) {
        self.points.push(Point::new(x, y, z));
    }

    /// Delete the point at `index`.
    ///
    /// Fails when the index is out of range, or when it addresses an endpoint
    /// while the path is locked.
    pub fn delete_point(&mut self, index: usize) -> Result<(), PathError> {
        self.check_mutable(index)?;
        self.points.remove(index);
        Ok(())
    }

    /// Shift a point by `(dx, dy)`, optionally re-sampling its elevation at
    /// the new location. Same range and locking rules as [`delete_point`].
    ///
    /// [`delete_point`]: Path::delete_point
    pub fn shift_point(
        &mut self,
        index: usize,
        dx: f64,
        dy: f64,
        resample_z: bool,
    ) -> Result<(), PathError> {
        self.check_mutable(index)?;
        let new_x = self.points[index].x + dx;
        let new_y = self.points[index].y + dy;
        if resample_z {
            let z = self.sample(new_x, new_y)?;
            self.points[index] = Point::new(new_x, new_y, z);
        } else {
            self.points[index].x = new_x;
            self.points[index].y = new_y;
        }
        Ok(())
    }

    /// Re-sample every point's elevation at its current location.
    ///
    /// Points whose location falls outside the raster keep their current z.
    /// Fails only when no elevation source is configured.
    pub fn update_all_z(&mut self) -> Result<(), PathError> {
        let source = self.source.as_ref().ok_or(PathError::MissingElevation)?;
        for point in &mut self.points {
            if let Some(z) = source.elevation(point.x as i32, point.y as i32) {
                point.z = z;
            }
        }
        Ok(())
    }

    /// Per-segment deltas and 3-D lengths between consecutive points.
    ///
    /// A path with fewer than 2 points has no segments.
    pub fn segments(&self) -> Vec<Segment> {
        self.points
            .windows(2)
            .map(|pair| {
                let dx = pair[1].x - pair[0].x;
                let dy = pair[1].y - pair[0].y;
                let dz = pair[1].z - pair[0].z;
                Segment {
                    dx,
                    dy,
                    dz,
                    distance: (dx * dx + dy * dy + dz * dz).sqrt(),
                }
            })
            .collect()
    }

    /// Total 3-D distance along the path.
    pub fn total_distance(&self) -> f64 {
        self.segments().iter().map(|seg| seg.distance).sum()
    }

    /// Total elevation gain and loss along the path, both non-negative.
    pub fn elevation_gain_loss(&self) -> (f64, f64) {
        let mut gain = 0.0;
        let mut loss = 0.0;
        for seg in self.segments() {
            if seg.dz > 0.0 {
                gain += seg.dz;
            } else {
                loss -= seg.dz;
            }
        }
        (gain, loss)
    }

    /// Merge maximal runs of consecutive points whose pairwise planar
    /// distance is at most `max_distance` into a single point at the mean
    /// x,y. The merged elevation is re-sampled at the truncated mean
    /// location, falling back to the mean z when the sample is unavailable.
    /// A run touching a locked endpoint is copied through unmerged.
    pub fn consolidate_consecutive_clusters(&mut self, max_distance: f64) {
        let n = self.points.len();
        if n < 2 {
            return;
        }

        fn planar(a: &Point, b: &Point) -> f64 {
            (a.x - b.x).hypot(a.y - b.y)
        }

        let mut merged: Vec<Point> = Vec::with_capacity(n);
        let mut i = 0;
        while i < n {
            if i < n - 1 && planar(&self.points[i], &self.points[i + 1]) <= max_distance {
                let mut j = i;
                while j < n - 1 && planar(&self.points[j], &self.points[j + 1]) <= max_distance {
                    j += 1;
                }

                // Runs that reach a protected endpoint stay as-is.
                if self.locked && (i == 0 || j == n - 1) {
                    merged.extend_from_slice(&self.points[i..=j]);
                    i = j + 1;
                    continue;
                }

                let run = &self.points[i..=j];
                let count = run.len() as f64;
                let mean_x = run.iter().map(|p| p.x).sum::<f64>() / count;
                let mean_y = run.iter().map(|p| p.y).sum::<f64>() / count;
                let mean_z = run.iter().map(|p| p.z).sum::<f64>() / count;
                let z = self
                    .source
                    .as_ref()
                    .and_then(|src| src.elevation(mean_x as i32, mean_y as i32))
                    .unwrap_or(mean_z);

                merged.push(Point::new(mean_x, mean_y, z));
                i = j + 1;
            } else {
                merged.push(self.points[i]);
                i += 1;
            }
        }

        self.points = merged;
    }
}
