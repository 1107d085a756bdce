//! Elevation lookup seam consumed by the route engine.

/// Read-only access to a raster elevation surface.
///
/// Implementations back this with whatever storage the host uses (a DEM file,
/// a fetched grid, a synthetic surface). The engine only needs point lookups
/// and the declared raster bounds; `None` means the coordinate falls outside
/// the raster.
pub trait ElevationSource {
    /// Elevation at integer raster coordinates, or `None` when out of bounds.
    fn elevation(&self, x: i32, y: i32) -> Option<f64>;

    /// Raster width in cells.
    fn width(&self) -> usize;

    /// Raster height in cells.
    fn height(&self) -> usize;
}

/// Shared handle to an elevation source. Paths clone this handle freely while
/// the underlying raster stays read-only.
pub type SharedElevation = std::sync::Arc<dyn ElevationSource + Send + Sync>;
