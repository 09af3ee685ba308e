use crate::algorithms::nearest_index;

/// Latitude and longitude axes of a regular lat/lon lattice. Row `r` of every
/// gridded array lies at `lats[r]` and column `c` at `lons[c]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridAxes {
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl GridAxes {
    pub const UTRACK_ROWS: usize = 360;
    pub const UTRACK_COLUMNS: usize = 720;

    pub fn new(lats: Vec<f64>, lons: Vec<f64>) -> GridAxes {
        GridAxes { lats, lons }
    }

    /// Evenly spaced axes starting at the given corner.
    pub fn regular(
        lat_start: f64,
        lat_step: f64,
        rows: usize,
        lon_start: f64,
        lon_step: f64,
        columns: usize,
    ) -> GridAxes {
        GridAxes {
            lats: (0..rows).map(|i| lat_start + lat_step * i as f64).collect(),
            lons: (0..columns).map(|j| lon_start + lon_step * j as f64).collect(),
        }
    }

    /// The 0.5 degree global lattice of the UTrack climatology: latitudes 90
    /// to -89.5 and longitudes 0 to 359.5.
    pub fn utrack() -> GridAxes {
        GridAxes::regular(90.0, -0.5, Self::UTRACK_ROWS, 0.0, 0.5, Self::UTRACK_COLUMNS)
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn rows(&self) -> usize {
        self.lats.len()
    }

    pub fn columns(&self) -> usize {
        self.lons.len()
    }

    pub fn num_cells(&self) -> usize {
        self.rows() * self.columns()
    }

    pub fn nearest_row(&self, lat: f64) -> usize {
        nearest_index(&self.lats, lat)
    }

    pub fn nearest_column(&self, lon: f64) -> usize {
        nearest_index(&self.lons, lon)
    }

    /// Absolute spacing between the first two latitudes (0 for a single row).
    pub fn lat_spacing(&self) -> f64 {
        if self.lats.len() < 2 {
            return 0.0;
        }
        (self.lats[1] - self.lats[0]).abs()
    }

    pub fn lon_spacing(&self) -> f64 {
        if self.lons.len() < 2 {
            return 0.0;
        }
        (self.lons[1] - self.lons[0]).abs()
    }

    pub fn lats_ascending(&self) -> bool {
        self.lats.len() < 2 || self.lats[1] > self.lats[0]
    }

    /// True when both axes have the same length and agree within `tolerance`.
    pub fn matches(&self, other: &GridAxes, tolerance: f64) -> bool {
        fn same(a: &[f64], b: &[f64], tolerance: f64) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance)
        }
        same(&self.lats, &other.lats, tolerance) && same(&self.lons, &other.lons, tolerance)
    }
}
