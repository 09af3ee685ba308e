//! Percentile atmospheric watersheds derived from assembled footprints.
//!
//! A backward footprint yields a precipitationshed (`pshed`), a forward one an
//! evaporationshed (`eshed`).

mod output;
mod percentile;
mod vectorize;

pub use self::output::{variable_stem, write_geojson, write_gridded};
pub use self::percentile::{delineate, shed_threshold, validate_percent, ShedThreshold, Watershed};
pub use self::vectorize::vectorize;

use crate::config::{format_percent, OutputFormat, RunConfig};
use crate::errors::TrackingError;
use crate::pool::{RunSummary, UnitStatus, WorkerPool};
use crate::tables::ZoneId;
use crate::tracking::{read_footprint, region_path, Direction};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// `{watersheds_dir}/{psheds|esheds}_{format}/{pshed|eshed}{p}_{zone}.{ext}`
pub fn watershed_path(
    watersheds_dir: &Path,
    direction: Direction,
    format: OutputFormat,
    percent: f64,
    zone: ZoneId,
) -> PathBuf {
    let prefix = direction.shed_prefix();
    watersheds_dir
        .join(format!("{}s_{}", prefix, format))
        .join(format!("{}{}_{}.{}", prefix, format_percent(percent), zone, format.extension()))
}

pub struct WatershedDelineator {
    footprints_dir: PathBuf,
    watersheds_dir: PathBuf,
    percent: f64,
    format: OutputFormat,
    normalize: bool,
    producer: String,
}

impl WatershedDelineator {
    pub fn new(config: &RunConfig) -> Result<WatershedDelineator, TrackingError> {
        validate_percent(config.percentile)?;
        Ok(WatershedDelineator {
            footprints_dir: config.footprints_dir.clone(),
            watersheds_dir: config.watersheds_dir.clone(),
            percent: config.percentile,
            format: config.output_format,
            normalize: config.normalize_for_output(),
            producer: format!("moisture_tools {}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Reads the assembled footprint of one direction and delineates it.
    pub fn delineate_zone(&self, zone: ZoneId, direction: Direction) -> Result<Watershed, TrackingError> {
        let stored = read_footprint(&region_path(&self.footprints_dir, direction, zone), direction)?;
        let annual = stored.annual()?;
        let shed = delineate(&annual, &stored.axes, direction, self.percent)?;
        Ok(if self.normalize { shed.normalized() } else { shed })
    }

    /// Writes the watersheds of both directions for one zone. A missing
    /// direction or an empty polygon skips only that output.
    pub fn process_zone(&self, zone: ZoneId) -> Result<UnitStatus, TrackingError> {
        let mut written = 0;
        let mut reasons = vec![];
        for direction in Direction::both() {
            let shed = match self.delineate_zone(zone, direction) {
                Ok(shed) => shed,
                Err(e) if e.is_skip() => {
                    warn!("zone {} {}: {}", zone, direction, e);
                    reasons.push(e.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            };
            let path = watershed_path(&self.watersheds_dir, direction, self.format, self.percent, zone);
            match self.format {
                OutputFormat::Netcdf => write_gridded(&path, &shed, &self.producer)?,
                OutputFormat::GeoJson => {
                    if !write_geojson(&path, &shed, zone)? {
                        warn!("zone {} {}: no geometry, nothing written", zone, direction);
                        reasons.push(format!("no {} geometry", direction.shed_prefix()));
                        continue;
                    }
                }
            }
            info!(
                "zone {} {}: {} cells in the {}% {}",
                zone,
                direction,
                shed.cell_count(),
                format_percent(self.percent),
                direction.shed_prefix()
            );
            written += 1;
        }
        if written == 0 {
            return Ok(UnitStatus::Skipped(reasons.join("; ")));
        }
        Ok(UnitStatus::Succeeded)
    }

    pub fn run(&self, pool: &WorkerPool, zones: &[ZoneId]) -> RunSummary {
        pool.run(zones, |zone| self.process_zone(*zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watershed_path() {
        let path = watershed_path(Path::new("/ws"), Direction::Backward, OutputFormat::GeoJson, 99.0, ZoneId(4));
        assert_eq!(path, Path::new("/ws/psheds_geojson/pshed99_4.geojson"));
        let path = watershed_path(Path::new("/ws"), Direction::Forward, OutputFormat::Netcdf, 90.0, ZoneId(4));
        assert_eq!(path, Path::new("/ws/esheds_netcdf/eshed90_4.nc"));
    }

    #[test]
    fn test_missing_footprints_skip_the_zone() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            footprints_dir: dir.path().join("fp"),
            watersheds_dir: dir.path().join("ws"),
            ..RunConfig::default()
        };
        let delineator = WatershedDelineator::new(&config).unwrap();
        assert!(matches!(delineator.process_zone(ZoneId(1)).unwrap(), UnitStatus::Skipped(_)));
    }
}
