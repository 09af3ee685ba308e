mod assemble_runs;
mod run_shards;
mod track_footprints;

pub use self::assemble_runs::AssembleRuns;
pub use self::run_shards::RunShards;
pub use self::track_footprints::TrackFootprints;

use crate::config::RunConfig;
use crate::netcdf_io;
use crate::tracking::{FluxClimatology, NetcdfKernel};
use log::debug;
use std::io::Error;

/// Opens the monthly kernel set and loads the corrected flux climatology
/// named by `config`. The tracking lattice is taken from the coordinates of
/// the cell area grid when it has them.
pub(crate) fn tracking_inputs(config: &mut RunConfig) -> Result<(NetcdfKernel, FluxClimatology), Error> {
    if config.area_path.is_file() {
        let file = netcdf_io::open(&config.area_path, "cell area grid")?;
        if let Some(axes) = netcdf_io::read_axes(&file)? {
            debug!("tracking lattice of {} x {} cells from {}", axes.rows(), axes.columns(), config.area_path.display());
            config.axes = axes;
        }
    }
    let kernel = NetcdfKernel::new(
        &config.kernel_dir,
        &config.variables.kernel_file_prefix,
        &config.variables.kernel,
        config.axes.rows(),
        config.axes.columns(),
    );
    let climatology = FluxClimatology::load(config)?;
    Ok((kernel, climatology))
}
