//! Terrain and land-cover raster grids.
//!
//! The world is backed by two aligned ESRI ASCII grid rasters: an elevation
//! map and a land-cover classification map. Both are loaded once at setup and
//! read-only afterwards. Misaligned rasters are a fatal configuration error.

use anyhow::Context;
use std::path::Path;

/// A single raster grid in world coordinates.
///
/// Cell values are stored row-major with the first row at the northern edge,
/// matching the ASC file layout. Lookups take easting/northing world
/// coordinates and resolve to the containing cell.
#[derive(Debug, Clone)]
pub struct GridMap {
    pub n_cols: usize,
    pub n_rows: usize,
    /// Easting of the lower-left corner, in meters.
    pub x_llcorner: f64,
    /// Northing of the lower-left corner, in meters.
    pub y_llcorner: f64,
    /// Cell edge length, in meters.
    pub resolution: f64,
    pub nodata: f64,
    cells: Vec<f64>,
}

impl GridMap {
    /// Build a grid directly from parts. Used by tests and synthetic worlds.
    pub fn from_cells(n_cols: usize, n_rows: usize, x_llcorner: f64, y_llcorner: f64, resolution: f64, cells: Vec<f64>) -> Result<Self, String> {
        if cells.len() != n_cols * n_rows {
            return Err(format!("Grid needs {} cells, got {}", n_cols * n_rows, cells.len()));
        }
        if resolution <= 0.0 {
            return Err("Grid resolution must be positive".to_string());
        }
        Ok(GridMap {
            n_cols,
            n_rows,
            x_llcorner,
            y_llcorner,
            resolution,
            nodata: -9999.0,
            cells,
        })
    }

    /// Load a raster from an ESRI ASCII grid file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path).with_context(|| format!("Failed to read raster file: {}", path.display()))?;
        parse_asc(&data).map_err(|e| anyhow::anyhow!("Invalid raster {}: {}", path.display(), e))
    }

    /// Easting extent covered by the grid, in meters.
    pub fn x_range(&self) -> f64 {
        self.n_cols as f64 * self.resolution
    }

    /// Northing extent covered by the grid, in meters.
    pub fn y_range(&self) -> f64 {
        self.n_rows as f64 * self.resolution
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_llcorner && x < self.x_llcorner + self.x_range() && y >= self.y_llcorner && y < self.y_llcorner + self.y_range()
    }

    /// Cell value at world coordinates, or `None` outside the grid.
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        if !self.contains(x, y) {
            return None;
        }
        let col = ((x - self.x_llcorner) / self.resolution) as usize;
        // Row 0 is the northern edge
        let row_from_south = ((y - self.y_llcorner) / self.resolution) as usize;
        let row = self.n_rows - 1 - row_from_south;
        Some(self.cells[row * self.n_cols + col])
    }

    /// See if two rasters describe the same grid: identical corner, resolution
    /// and dimensions. Terrain and land cover must alias cell-for-cell.
    pub fn is_aligned(&self, other: &GridMap) -> bool {
        self.x_llcorner == other.x_llcorner
            && self.y_llcorner == other.y_llcorner
            && self.resolution == other.resolution
            && self.n_cols == other.n_cols
            && self.n_rows == other.n_rows
    }
}

/// Parse the ESRI ASCII grid format: six header lines
/// (`ncols`, `nrows`, `xllcorner`, `yllcorner`, `cellsize`, `NODATA_value`)
/// followed by whitespace-separated cell values, north row first.
pub fn parse_asc(data: &str) -> Result<GridMap, String> {
    let mut n_cols = None;
    let mut n_rows = None;
    let mut x_llcorner = None;
    let mut y_llcorner = None;
    let mut resolution = None;
    let mut nodata = -9999.0;
    let mut cells: Vec<f64> = Vec::new();

    for line in data.lines() {
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else { continue };
        match first.to_ascii_lowercase().as_str() {
            "ncols" => n_cols = Some(parse_header_value(first, tokens.next())? as usize),
            "nrows" => n_rows = Some(parse_header_value(first, tokens.next())? as usize),
            "xllcorner" => x_llcorner = Some(parse_header_value(first, tokens.next())?),
            "yllcorner" => y_llcorner = Some(parse_header_value(first, tokens.next())?),
            "cellsize" => resolution = Some(parse_header_value(first, tokens.next())?),
            "nodata_value" => nodata = parse_header_value(first, tokens.next())?,
            _ => {
                // Data row: the first token is itself a value
                let v: f64 = first.parse().map_err(|_| format!("Invalid cell value: {}", first))?;
                cells.push(v);
                for token in tokens {
                    cells.push(token.parse().map_err(|_| format!("Invalid cell value: {}", token))?);
                }
            }
        }
    }

    let n_cols = n_cols.ok_or("Missing ncols header")?;
    let n_rows = n_rows.ok_or("Missing nrows header")?;
    let x_llcorner = x_llcorner.ok_or("Missing xllcorner header")?;
    let y_llcorner = y_llcorner.ok_or("Missing yllcorner header")?;
    let resolution = resolution.ok_or("Missing cellsize header")?;

    let mut grid = GridMap::from_cells(n_cols, n_rows, x_llcorner, y_llcorner, resolution, cells)?;
    grid.nodata = nodata;
    Ok(grid)
}

fn parse_header_value(name: &str, token: Option<&str>) -> Result<f64, String> {
    token
        .ok_or_else(|| format!("Missing value for header {}", name))?
        .parse()
        .map_err(|_| format!("Invalid value for header {}", name))
}
