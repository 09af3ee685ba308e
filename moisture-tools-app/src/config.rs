//! Run configuration. A `RunConfig` is built once, from the environment and
//! then from tool flags, and passed by reference to every component.

use crate::errors::TrackingError;
use moisture_common::structures::GridAxes;
use serde_derive::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// ERA5 2008-2017 water-balance correction for evaporation.
pub const DEFAULT_ALPHA_EVAP: f64 = 1.0028752465214772;
/// ERA5 2008-2017 water-balance correction for precipitation.
pub const DEFAULT_ALPHA_PRECIP: f64 = 0.9971611782286123;
pub const DEFAULT_PERCENTILE: f64 = 99.0;
pub const DEFAULT_SHARD_SIZE: usize = 200;

/// Watershed artifact type. The two are mutually exclusive per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OutputFormat {
    /// Value and mask grids per cell.
    Netcdf,
    /// One merged polygon, values discarded.
    GeoJson,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Netcdf => "nc",
            OutputFormat::GeoJson => "geojson",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<OutputFormat, TrackingError> {
        match s.trim().to_lowercase().as_str() {
            "netcdf" | "nc" => Ok(OutputFormat::Netcdf),
            "geojson" | "json" => Ok(OutputFormat::GeoJson),
            other => Err(TrackingError::Configuration(format!(
                "unknown output format '{}' (expected 'netcdf' or 'geojson')",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputFormat::Netcdf => write!(f, "netcdf"),
            OutputFormat::GeoJson => write!(f, "geojson"),
        }
    }
}

/// Scalar bias correction applied to the flux climatologies before tracking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Correction {
    pub apply: bool,
    pub alpha_evap: f64,
    pub alpha_precip: f64,
}

impl Default for Correction {
    fn default() -> Correction {
        Correction {
            apply: true,
            alpha_evap: DEFAULT_ALPHA_EVAP,
            alpha_precip: DEFAULT_ALPHA_PRECIP,
        }
    }
}

/// Names of the variables read from input files.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableNames {
    pub kernel: String,
    pub kernel_file_prefix: String,
    pub evaporation: String,
    pub precipitation: String,
    pub cell_area: String,
    pub zones: String,
}

impl Default for VariableNames {
    fn default() -> VariableNames {
        VariableNames {
            kernel: "moisture_flow".to_string(),
            kernel_file_prefix: "utrack_climatology_0.5_".to_string(),
            evaporation: "e".to_string(),
            precipitation: "tp".to_string(),
            cell_area: "cell_area".to_string(),
            zones: "Band1".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub kernel_dir: PathBuf,
    pub evap_path: PathBuf,
    pub precip_path: PathBuf,
    pub area_path: PathBuf,
    pub target_cells_dir: PathBuf,
    pub footprints_dir: PathBuf,
    pub watersheds_dir: PathBuf,
    pub variables: VariableNames,
    pub correction: Correction,
    pub percentile: f64,
    pub output_format: OutputFormat,
    /// Remap watershed grids to [-180, 180) longitudes and south-to-north
    /// latitudes. `None` picks the per-format default.
    pub normalize_coordinates: Option<bool>,
    pub max_workers: usize,
    pub shard_size: usize,
    pub unit_timeout: Option<Duration>,
    pub axes: GridAxes,
}

impl Default for RunConfig {
    fn default() -> RunConfig {
        RunConfig {
            kernel_dir: PathBuf::from("."),
            evap_path: PathBuf::from("evaporation.nc"),
            precip_path: PathBuf::from("precipitation.nc"),
            area_path: PathBuf::from("grid_area.nc"),
            target_cells_dir: PathBuf::from("target_cells"),
            footprints_dir: PathBuf::from("moisture_footprints"),
            watersheds_dir: PathBuf::from("watershed_processing"),
            variables: VariableNames::default(),
            correction: Correction::default(),
            percentile: DEFAULT_PERCENTILE,
            output_format: OutputFormat::GeoJson,
            normalize_coordinates: None,
            max_workers: num_cpus::get(),
            shard_size: DEFAULT_SHARD_SIZE,
            unit_timeout: None,
            axes: GridAxes::utrack(),
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Result<RunConfig, TrackingError> {
        RunConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `MOISTURE_*` keys resolved by `lookup`.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<RunConfig, TrackingError> {
        let mut config = RunConfig::default();
        let path = |key: &str| lookup(key).map(PathBuf::from);
        if let Some(p) = path("MOISTURE_KERNEL_DIR") {
            config.kernel_dir = p;
        }
        if let Some(p) = path("MOISTURE_EVAP_PATH") {
            config.evap_path = p;
        }
        if let Some(p) = path("MOISTURE_PRECIP_PATH") {
            config.precip_path = p;
        }
        if let Some(p) = path("MOISTURE_AREA_PATH") {
            config.area_path = p;
        }
        if let Some(p) = path("MOISTURE_TARGET_CELLS_DIR") {
            config.target_cells_dir = p;
        }
        if let Some(p) = path("MOISTURE_FOOTPRINTS_DIR") {
            config.footprints_dir = p;
        }
        if let Some(p) = path("MOISTURE_WATERSHEDS_DIR") {
            config.watersheds_dir = p;
        }
        if let Some(v) = lookup("MOISTURE_APPLY_CORRECTION") {
            config.correction.apply = parse_bool("MOISTURE_APPLY_CORRECTION", &v)?;
        }
        if let Some(v) = lookup("MOISTURE_ALPHA_EVAP") {
            config.correction.alpha_evap = parse_value("MOISTURE_ALPHA_EVAP", &v)?;
        }
        if let Some(v) = lookup("MOISTURE_ALPHA_PRECIP") {
            config.correction.alpha_precip = parse_value("MOISTURE_ALPHA_PRECIP", &v)?;
        }
        if let Some(v) = lookup("MOISTURE_PERCENTILE") {
            config.percentile = parse_value("MOISTURE_PERCENTILE", &v)?;
        }
        if let Some(v) = lookup("MOISTURE_OUTPUT_FORMAT") {
            config.output_format = v.parse()?;
        }
        if let Some(v) = lookup("MOISTURE_MAX_WORKERS") {
            config.max_workers = parse_value("MOISTURE_MAX_WORKERS", &v)?;
        }
        if let Some(v) = lookup("MOISTURE_SHARD_SIZE") {
            config.shard_size = parse_value("MOISTURE_SHARD_SIZE", &v)?;
        }
        if let Some(v) = lookup("MOISTURE_UNIT_TIMEOUT_SECS") {
            let secs: f64 = parse_value("MOISTURE_UNIT_TIMEOUT_SECS", &v)?;
            config.unit_timeout = timeout_from_secs(secs)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrackingError> {
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(TrackingError::Configuration(format!(
                "percentile must lie in (0, 100], got {}",
                self.percentile
            )));
        }
        if self.max_workers == 0 {
            return Err(TrackingError::Configuration(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        if self.shard_size == 0 {
            return Err(TrackingError::Configuration(
                "shard size must be at least 1".to_string(),
            ));
        }
        for (name, alpha) in [
            ("alpha_evap", self.correction.alpha_evap),
            ("alpha_precip", self.correction.alpha_precip),
        ] {
            if !alpha.is_finite() || alpha < 0.0 {
                return Err(TrackingError::Configuration(format!(
                    "{} must be a finite non-negative factor, got {}",
                    name, alpha
                )));
            }
        }
        if self.axes.rows() == 0 || self.axes.columns() == 0 {
            return Err(TrackingError::Configuration("grid axes are empty".to_string()));
        }
        Ok(())
    }

    /// Gridded output is normalized by default, vector output is not.
    pub fn normalize_for_output(&self) -> bool {
        self.normalize_coordinates
            .unwrap_or(self.output_format == OutputFormat::Netcdf)
    }
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool, TrackingError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(TrackingError::Configuration(format!(
            "{} expects a boolean, got '{}'",
            key, other
        ))),
    }
}

pub fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, TrackingError> {
    value.trim().parse::<T>().map_err(|_| {
        TrackingError::Configuration(format!("{} has an invalid value '{}'", key, value))
    })
}

/// Zero disables the timeout.
pub fn timeout_from_secs(secs: f64) -> Result<Option<Duration>, TrackingError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(TrackingError::Configuration(format!(
            "timeout must be a non-negative number of seconds, got {}",
            secs
        )));
    }
    Ok(if secs == 0.0 {
        None
    } else {
        Some(Duration::from_secs_f64(secs))
    })
}

/// Formats a percentile for file and variable names: `99`, `99.5`.
pub fn format_percent(percent: f64) -> String {
    if percent.fract() == 0.0 {
        format!("{}", percent as i64)
    } else {
        format!("{}", percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.correction.apply);
        assert_eq!(config.correction.alpha_evap, DEFAULT_ALPHA_EVAP);
        assert_eq!(config.percentile, 99.0);
        assert_eq!(config.output_format, OutputFormat::GeoJson);
        assert_eq!(config.shard_size, 200);
        assert!(config.max_workers >= 1);
        assert!(!config.normalize_for_output());
    }

    #[test]
    fn test_environment_overrides() {
        let config = RunConfig::from_lookup(lookup_from(&[
            ("MOISTURE_APPLY_CORRECTION", "false"),
            ("MOISTURE_PERCENTILE", "90"),
            ("MOISTURE_OUTPUT_FORMAT", "netcdf"),
            ("MOISTURE_MAX_WORKERS", "3"),
            ("MOISTURE_UNIT_TIMEOUT_SECS", "30"),
            ("MOISTURE_FOOTPRINTS_DIR", "/tmp/fp"),
        ]))
        .unwrap();
        assert!(!config.correction.apply);
        assert_eq!(config.percentile, 90.0);
        assert_eq!(config.output_format, OutputFormat::Netcdf);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.unit_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.footprints_dir, PathBuf::from("/tmp/fp"));
        assert!(config.normalize_for_output());
    }

    #[test]
    fn test_rejects_bad_settings() {
        for (key, value) in [
            ("MOISTURE_PERCENTILE", "0"),
            ("MOISTURE_PERCENTILE", "100.5"),
            ("MOISTURE_OUTPUT_FORMAT", "shapefile"),
            ("MOISTURE_MAX_WORKERS", "0"),
            ("MOISTURE_APPLY_CORRECTION", "maybe"),
            ("MOISTURE_ALPHA_EVAP", "-1"),
        ] {
            let result = RunConfig::from_lookup(lookup_from(&[(key, value)]));
            assert!(
                matches!(result, Err(TrackingError::Configuration(_))),
                "Expected a configuration error for {}={}",
                key,
                value
            );
        }
        assert!(RunConfig::from_lookup(lookup_from(&[("MOISTURE_PERCENTILE", "100")])).is_ok());
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(99.0), "99");
        assert_eq!(format_percent(99.5), "99.5");
    }
}
