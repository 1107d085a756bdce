//! Terrain grids backing the CLI's elevation lookups.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path as FsPath;
use trek_core::ElevationSource;

/// Row-major in-memory elevation raster.
///
/// Cells holding NaN are treated as missing data and report out-of-bounds.
#[derive(Debug, Clone)]
pub struct GridTerrain {
    rows: usize,
    cols: usize,
    elevations: Vec<f64>,
}

impl GridTerrain {
    /// Load an ESRI ASCII grid (`ncols`/`nrows` header followed by row-major
    /// cell values). `NODATA_value` cells become missing data.
    pub fn from_ascii_grid(path: &FsPath) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading terrain grid {}", path.display()))?;

        let mut cols: Option<usize> = None;
        let mut rows: Option<usize> = None;
        let mut nodata: Option<f64> = None;
        let mut values: Vec<f64> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let first = parts.next().unwrap_or_default();
            match first.to_ascii_lowercase().as_str() {
                "ncols" => cols = parts.next().and_then(|v| v.parse().ok()),
                "nrows" => rows = parts.next().and_then(|v| v.parse().ok()),
                "nodata_value" => nodata = parts.next().and_then(|v| v.parse().ok()),
                // Georeferencing is irrelevant here; the engine works in
                // raster coordinates.
                "xllcorner" | "yllcorner" | "cellsize" => {}
                _ => {
                    for token in line.split_whitespace() {
                        let value: f64 = token
                            .parse()
                            .with_context(|| format!("bad cell value {token:?}"))?;
                        values.push(value);
                    }
                }
            }
        }

        let cols = cols.context("grid header missing ncols")?;
        let rows = rows.context("grid header missing nrows")?;
        if values.len() != rows * cols {
            bail!(
                "grid has {} cells, expected {} ({} x {})",
                values.len(),
                rows * cols,
                rows,
                cols
            );
        }
        if let Some(nodata) = nodata {
            for value in &mut values {
                if *value == nodata {
                    *value = f64::NAN;
                }
            }
        }

        Ok(Self {
            rows,
            cols,
            elevations: values,
        })
    }

    /// Synthetic rolling-hills surface for smoke runs without a grid file.
    pub fn synthetic(cols: usize, rows: usize) -> Self {
        let mut elevations = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let x = col as f64;
                let y = row as f64;
                let z = 120.0 + 35.0 * (x / 40.0).sin() * (y / 55.0).cos() + 0.02 * x;
                elevations.push(z);
            }
        }
        Self {
            rows,
            cols,
            elevations,
        }
    }

    fn value_at(&self, row: usize, col: usize) -> f64 {
        self.elevations[row * self.cols + col]
    }
}

impl ElevationSource for GridTerrain {
    fn elevation(&self, x: i32, y: i32) -> Option<f64> {
        if x < 0 || y < 0 {
            return None;
        }
        let (col, row) = (x as usize, y as usize);
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let value = self.value_at(row, col);
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }

    fn width(&self) -> usize {
        self.cols
    }

    fn height(&self) -> usize {
        self.rows
    }
}
