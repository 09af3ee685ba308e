use super::kernel::Month;
use crate::config::{Correction, RunConfig};
use crate::errors::TrackingError;
use crate::netcdf_io;
use log::debug;
use moisture_common::structures::{Array2D, Array3D, GridAxes};
use std::path::Path;

/// Monthly evaporation and precipitation depths plus the static cell area
/// used to turn depths into volumes.
///
/// Negative and missing flux values are stored as 0, so every value read
/// back out of a `FluxClimatology` is finite and non-negative.
#[derive(Clone, Debug)]
pub struct FluxClimatology {
    evaporation: Array3D<f64>,
    precipitation: Array3D<f64>,
    cell_area: Array2D<f64>,
}

impl FluxClimatology {
    pub fn new(
        evaporation: Array3D<f64>,
        precipitation: Array3D<f64>,
        cell_area: Array2D<f64>,
    ) -> Result<FluxClimatology, TrackingError> {
        let (rows, columns) = (cell_area.rows as usize, cell_area.columns as usize);
        for (name, grid) in [("evaporation", &evaporation), ("precipitation", &precipitation)] {
            if grid.shape() != (12, rows, columns) {
                return Err(TrackingError::mismatch(
                    "climatology",
                    format!(
                        "{} grid has shape {:?}, expected (12, {}, {})",
                        name,
                        grid.shape(),
                        rows,
                        columns
                    ),
                ));
            }
        }
        let mut climatology = FluxClimatology {
            evaporation,
            precipitation,
            cell_area,
        };
        for v in climatology
            .evaporation
            .as_mut_slice()
            .iter_mut()
            .chain(climatology.precipitation.as_mut_slice().iter_mut())
        {
            if !(*v > 0.0) {
                *v = 0.0;
            }
        }
        for v in climatology.cell_area.as_mut_slice() {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        Ok(climatology)
    }

    /// Loads the three grids named by `config` and applies its correction.
    pub fn load(config: &RunConfig) -> Result<FluxClimatology, TrackingError> {
        let axes = &config.axes;
        let evaporation = read_monthly(&config.evap_path, &config.variables.evaporation, "evaporation climatology", axes)?;
        let precipitation = read_monthly(&config.precip_path, &config.variables.precipitation, "precipitation climatology", axes)?;

        let path = &config.area_path;
        let file = netcdf_io::open(path, "cell area grid")?;
        check_axes(&file, path, axes)?;
        let values = netcdf_io::read_f64(&file, &config.variables.cell_area)?;
        if values.len() != axes.num_cells() {
            return Err(TrackingError::mismatch(
                "climatology",
                format!(
                    "'{}' in {} holds {} values, expected {}",
                    config.variables.cell_area,
                    path.display(),
                    values.len(),
                    axes.num_cells()
                ),
            ));
        }
        let cell_area = Array2D::from_vec(axes.rows() as isize, axes.columns() as isize, values, f64::NAN)?;
        debug!("loaded climatology on a {} x {} grid", axes.rows(), axes.columns());

        Ok(FluxClimatology::new(evaporation, precipitation, cell_area)?.corrected(&config.correction))
    }

    /// Scales both fluxes by their correction factors when correction is on.
    pub fn corrected(mut self, correction: &Correction) -> FluxClimatology {
        if correction.apply {
            for v in self.evaporation.as_mut_slice() {
                *v *= correction.alpha_evap;
            }
            for v in self.precipitation.as_mut_slice() {
                *v *= correction.alpha_precip;
            }
        }
        self
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.cell_area.rows as usize, self.cell_area.columns as usize)
    }

    /// The evaporation grid of one month, row-major.
    pub fn evaporation_month(&self, month: Month) -> &[f64] {
        self.evaporation.layer(month.index())
    }

    pub fn evaporation_at(&self, month: Month, row: usize, column: usize) -> f64 {
        self.evaporation.get_value(month.index(), row, column)
    }

    pub fn precipitation_at(&self, month: Month, row: usize, column: usize) -> f64 {
        self.precipitation.get_value(month.index(), row, column)
    }

    pub fn area_at(&self, row: usize, column: usize) -> f64 {
        self.cell_area.get_value(row as isize, column as isize)
    }
}

fn read_monthly(path: &Path, variable: &str, what: &'static str, axes: &GridAxes) -> Result<Array3D<f64>, TrackingError> {
    let file = netcdf_io::open(path, what)?;
    check_axes(&file, path, axes)?;
    let shape = netcdf_io::shape(&netcdf_io::variable(&file, variable)?);
    if shape.len() != 3 || shape[0] != 12 || shape[1] != axes.rows() || shape[2] != axes.columns() {
        return Err(TrackingError::mismatch(
            "climatology",
            format!(
                "'{}' in {} has shape {:?}, expected [12, {}, {}]",
                variable,
                path.display(),
                shape,
                axes.rows(),
                axes.columns()
            ),
        ));
    }
    let values = netcdf_io::read_f64(&file, variable)?;
    Ok(Array3D::from_vec(12, axes.rows(), axes.columns(), values)?)
}

fn check_axes(file: &netcdf::File, path: &Path, axes: &GridAxes) -> Result<(), TrackingError> {
    if let Some(found) = netcdf_io::read_axes(file)? {
        if !found.matches(axes, 1e-6) {
            return Err(TrackingError::mismatch(
                "climatology",
                format!("lat/lon axes of {} differ from the tracking grid", path.display()),
            ));
        }
    }
    Ok(())
}
