//! Single-cell, single-month moisture footprints.
//!
//! The raw kernel value `v` is turned into a transport weight `exp(-0.1 v)`.
//! A weight of exactly 1 comes from `v == 0` and means no tracked transport,
//! so it is set to 0. Weights are then normalized to a probability field and
//! scaled by the volume of moisture the cell evaporates (forward) or receives
//! as precipitation (backward).

use super::climatology::FluxClimatology;
use super::kernel::{KernelMonth, Month, TransportKernel};
use crate::errors::TrackingError;
use moisture_common::structures::GridAxes;
use serde_derive::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Where moisture evaporated at a cell precipitates.
    Forward,
    /// Where moisture precipitating on a cell evaporated.
    Backward,
}

impl Direction {
    pub fn both() -> [Direction; 2] {
        [Direction::Forward, Direction::Backward]
    }

    pub fn variable_name(&self) -> &'static str {
        match self {
            Direction::Forward => "fw_evap_footprint_monthly",
            Direction::Backward => "bw_evap_footprint_monthly",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Direction::Forward => "Forward Monthly Evaporation Footprint",
            Direction::Backward => "Backward Monthly Evaporation Footprint",
        }
    }

    /// File name stem, `forward` or `backward`.
    pub fn stem(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }

    /// Watershed prefix: an evaporationshed is derived from a forward
    /// footprint, a precipitationshed from a backward one.
    pub fn shed_prefix(&self) -> &'static str {
        match self {
            Direction::Forward => "eshed",
            Direction::Backward => "pshed",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.stem())
    }
}

/// Moisture volume per destination (forward) or source (backward) cell for
/// one tracked cell and month, row-major. `None` marks cells whose kernel
/// entry was unresolved.
#[derive(Clone, Debug, PartialEq)]
pub struct Footprint {
    pub direction: Direction,
    pub month: Month,
    pub values: Vec<Option<f64>>,
}

impl Footprint {
    /// Sum of the resolved values.
    pub fn total(&self) -> f64 {
        self.values.iter().flatten().sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FootprintPair {
    pub forward: Footprint,
    pub backward: Footprint,
}

pub fn transport_weight(raw: f64) -> f64 {
    let w = (-0.1 * raw).exp();
    if w == 1.0 {
        0.0
    } else {
        w
    }
}

/// Divides every resolved value by the sum of the resolved values. When that
/// sum is zero the cell has no resolvable transport and the whole field is
/// defined as zero.
pub fn normalize(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let sum: f64 = values.iter().flatten().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![Some(0.0); values.len()];
    }
    values.into_iter().map(|v| v.map(|x| x / sum)).collect()
}

/// Probability of moisture leaving a cell arriving at each destination.
pub fn forward_distribution(outgoing: &[Option<f64>]) -> Vec<Option<f64>> {
    normalize(outgoing.iter().map(|v| v.map(transport_weight)).collect())
}

/// Probability of moisture arriving at a cell coming from each source, with
/// sources weighted by how much they evaporate.
pub fn backward_distribution(incoming: &[Option<f64>], evaporation: &[f64]) -> Vec<Option<f64>> {
    normalize(
        incoming
            .iter()
            .zip(evaporation)
            .map(|(v, e)| v.map(|x| transport_weight(x) * e))
            .collect(),
    )
}

pub struct FootprintEngine<'a> {
    kernel: &'a dyn TransportKernel,
    climatology: &'a FluxClimatology,
    axes: &'a GridAxes,
}

impl<'a> FootprintEngine<'a> {
    pub fn new(
        kernel: &'a dyn TransportKernel,
        climatology: &'a FluxClimatology,
        axes: &'a GridAxes,
    ) -> Result<FootprintEngine<'a>, TrackingError> {
        let grid = (axes.rows(), axes.columns());
        if kernel.shape() != grid || climatology.shape() != grid {
            return Err(TrackingError::mismatch(
                "tracking grid",
                format!(
                    "kernel {:?} and climatology {:?} must both match the {:?} lattice",
                    kernel.shape(),
                    climatology.shape(),
                    grid
                ),
            ));
        }
        Ok(FootprintEngine {
            kernel,
            climatology,
            axes,
        })
    }

    pub fn axes(&self) -> &GridAxes {
        self.axes
    }

    /// Grid cell nearest to a coordinate. Coordinates beyond the lattice
    /// clamp to its edge.
    pub fn locate(&self, lat: f64, lon: f64) -> (usize, usize) {
        (self.axes.nearest_row(lat), self.axes.nearest_column(lon))
    }

    pub fn open_month(&self, month: Month) -> Result<Box<dyn KernelMonth + 'a>, TrackingError> {
        self.kernel.open_month(month)
    }

    /// Footprints of the cell nearest `(lat, lon)` for the month `kernel`
    /// was opened for.
    pub fn track(&self, kernel: &dyn KernelMonth, lat: f64, lon: f64) -> Result<FootprintPair, TrackingError> {
        let month = kernel.month();
        let (row, column) = self.locate(lat, lon);
        let slices = kernel.slices(row, column)?;
        let area = self.climatology.area_at(row, column);

        let evaporated = self.climatology.evaporation_at(month, row, column) * area;
        let forward = forward_distribution(&slices.outgoing)
            .into_iter()
            .map(|v| v.map(|x| x * evaporated))
            .collect();

        let precipitated = self.climatology.precipitation_at(month, row, column) * area;
        let backward = backward_distribution(&slices.incoming, self.climatology.evaporation_month(month))
            .into_iter()
            .map(|v| v.map(|x| x * precipitated))
            .collect();

        Ok(FootprintPair {
            forward: Footprint {
                direction: Direction::Forward,
                month,
                values: forward,
            },
            backward: Footprint {
                direction: Direction::Backward,
                month,
                values: backward,
            },
        })
    }
}
