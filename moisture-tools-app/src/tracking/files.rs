//! Footprint files: layout on disk, writing and reading.
//!
//! ```text
//! {footprints_dir}/forward/forward_footprint_{zone}_{start}_{stop}.nc
//! {footprints_dir}/backward/backward_footprint_{zone}_{start}_{stop}.nc
//! {footprints_dir}/forward_complete/forward_footprint_{zone}.nc
//! {footprints_dir}/backward_complete/backward_footprint_{zone}.nc
//! ```

use super::aggregate::{AggregateFootprint, FOOTPRINT_UNITS};
use super::footprint::Direction;
use crate::errors::TrackingError;
use crate::netcdf_io;
use crate::tables::{ensure_parent, ShardKey, ZoneId};
use moisture_common::structures::{Array2D, Array3D, GridAxes};
use std::fs;
use std::path::{Path, PathBuf};

pub fn shard_dir(footprints_dir: &Path, direction: Direction) -> PathBuf {
    footprints_dir.join(direction.stem())
}

pub fn shard_path(footprints_dir: &Path, direction: Direction, key: &ShardKey) -> PathBuf {
    shard_dir(footprints_dir, direction).join(format!(
        "{}_footprint_{}_{}_{}.nc",
        direction.stem(),
        key.zone,
        key.start,
        key.stop
    ))
}

/// Parses `{stem}_footprint_{zone}_{start}_{stop}.nc` back into its key.
pub fn parse_shard_file_name(direction: Direction, name: &str) -> Option<ShardKey> {
    let rest = name
        .strip_prefix(direction.stem())?
        .strip_prefix("_footprint_")?
        .strip_suffix(".nc")?;
    let mut parts = rest.split('_');
    let zone = parts.next()?.parse::<i64>().ok()?;
    let start = parts.next()?.parse::<usize>().ok()?;
    let stop = parts.next()?.parse::<usize>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ShardKey::new(ZoneId(zone), start, stop))
}

pub fn region_path(footprints_dir: &Path, direction: Direction, zone: ZoneId) -> PathBuf {
    footprints_dir
        .join(format!("{}_complete", direction.stem()))
        .join(format!("{}_footprint_{}.nc", direction.stem(), zone))
}

/// Writes an aggregate footprint. The file appears under its final name only
/// once it is complete.
pub fn write_footprint(path: &Path, footprint: &AggregateFootprint, producer: &str) -> Result<(), TrackingError> {
    let (months, _, _) = footprint.grid.shape();
    write_atomically(path, |part| {
        let mut file = netcdf::create(part)?;
        file.add_attribute("history", history(producer))?;
        file.add_dimension("month", months)?;
        {
            let mut month = file.add_variable::<i32>("month", &["month"])?;
            month.put_values(&(1..=months as i32).collect::<Vec<i32>>(), ..)?;
        }
        netcdf_io::put_axes(&mut file, &footprint.axes)?;
        netcdf_io::put_f64(
            &mut file,
            footprint.direction.variable_name(),
            &["month", "lat", "lon"],
            footprint.grid.as_slice(),
            &[("description", footprint.description()), ("units", FOOTPRINT_UNITS)],
        )
    })
}

pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), TrackingError>
where
    F: FnOnce(&Path) -> Result<(), TrackingError>,
{
    ensure_parent(path)?;
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);
    if let Err(e) = write(&part) {
        let _ = fs::remove_file(&part);
        return Err(e);
    }
    fs::rename(&part, path)?;
    Ok(())
}

pub(crate) fn history(producer: &str) -> String {
    format!("{} created by {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"), producer)
}

/// A footprint as read back from disk. Fill values are `None`.
#[derive(Clone, Debug)]
pub struct StoredFootprint {
    pub direction: Direction,
    pub axes: GridAxes,
    pub months: Vec<f64>,
    pub grid: Array3D<Option<f64>>,
}

impl StoredFootprint {
    /// Replaces missing values with 0.
    pub fn into_aggregate(self, zone: &str) -> Result<AggregateFootprint, TrackingError> {
        if self.grid.layers != 12 {
            return Err(TrackingError::mismatch(
                zone,
                format!("footprint has {} months, expected 12", self.grid.layers),
            ));
        }
        let (layers, rows, columns) = self.grid.shape();
        let values = self.grid.as_slice().iter().map(|v| v.unwrap_or(0.0)).collect();
        Ok(AggregateFootprint {
            direction: self.direction,
            grid: Array3D::from_vec(layers, rows, columns, values)?,
            axes: self.axes,
        })
    }

    /// Sum over months, skipping missing values.
    pub fn annual(&self) -> Result<Array2D<f64>, TrackingError> {
        let (layers, rows, columns) = self.grid.shape();
        let mut sums = vec![0f64; rows * columns];
        for layer in 0..layers {
            for (sum, v) in sums.iter_mut().zip(self.grid.layer(layer)) {
                if let Some(x) = v {
                    if x.is_finite() {
                        *sum += x;
                    }
                }
            }
        }
        Ok(Array2D::from_vec(rows as isize, columns as isize, sums, f64::NAN)?)
    }
}

pub fn read_footprint(path: &Path, direction: Direction) -> Result<StoredFootprint, TrackingError> {
    if !path.is_file() {
        return Err(TrackingError::missing("footprint file", path));
    }
    let file = netcdf_io::open(path, "footprint file")?;
    let name = direction.variable_name();
    let shape = netcdf_io::shape(&netcdf_io::variable(&file, name)?);
    let context = path.display().to_string();
    if shape.len() != 3 {
        return Err(TrackingError::mismatch(
            &context,
            format!("'{}' has {} dimensions, expected 3", name, shape.len()),
        ));
    }
    let axes = netcdf_io::read_axes(&file)?
        .ok_or_else(|| TrackingError::mismatch(&context, "no lat/lon coordinate variables"))?;
    if axes.rows() != shape[1] || axes.columns() != shape[2] {
        return Err(TrackingError::mismatch(
            &context,
            format!("coordinate axes do not match the shape {:?} of '{}'", shape, name),
        ));
    }
    let months = if netcdf_io::has_variable(&file, "month") {
        netcdf_io::read_f64(&file, "month")?
    } else {
        (1..=shape[0]).map(|m| m as f64).collect()
    };
    let values = netcdf_io::read_f64(&file, name)?
        .into_iter()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .collect();
    Ok(StoredFootprint {
        direction,
        axes,
        months,
        grid: Array3D::from_vec(shape[0], shape[1], shape[2], values)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_and_names() {
        let dir = Path::new("/data/fp");
        let key = ShardKey::new(ZoneId(12), 200, 400);
        let path = shard_path(dir, Direction::Backward, &key);
        assert_eq!(path, Path::new("/data/fp/backward/backward_footprint_12_200_400.nc"));
        assert_eq!(
            parse_shard_file_name(Direction::Backward, "backward_footprint_12_200_400.nc"),
            Some(key)
        );
        assert_eq!(parse_shard_file_name(Direction::Forward, "backward_footprint_12_200_400.nc"), None);
        assert_eq!(parse_shard_file_name(Direction::Forward, "forward_footprint_12.nc"), None);
        assert_eq!(parse_shard_file_name(Direction::Forward, "forward_footprint_1_0_5.nc.part"), None);
        assert_eq!(
            region_path(dir, Direction::Forward, ZoneId(12)),
            Path::new("/data/fp/forward_complete/forward_footprint_12.nc")
        );
    }

    #[test]
    fn test_write_then_read_footprint() {
        let dir = tempfile::tempdir().unwrap();
        let axes = GridAxes::regular(0.5, -0.5, 2, 10.0, 0.5, 3);
        let mut footprint = AggregateFootprint::zeros(Direction::Forward, &axes);
        footprint.grid.set_value(0, 1, 2, 4.0);
        footprint.grid.set_value(11, 1, 2, 6.0);
        footprint.grid.set_value(5, 0, 0, 1.5);

        let path = dir.path().join("forward").join("forward_footprint_3_0_2.nc");
        write_footprint(&path, &footprint, "TrackFootprints").unwrap();
        assert!(path.is_file());
        assert!(!dir.path().join("forward").join("forward_footprint_3_0_2.nc.part").exists());

        {
            let file = netcdf::open(&path).unwrap();
            let var = file.variable("fw_evap_footprint_monthly").unwrap();
            assert_eq!(netcdf_io::attribute_text(&var, "units").as_deref(), Some("l/month"));
            assert_eq!(
                netcdf_io::attribute_text(&var, "description").as_deref(),
                Some("Forward Monthly Evaporation Footprint")
            );
            assert!(file.attribute("history").is_some());
            assert_eq!(netcdf_io::read_f64(&file, "month").unwrap().len(), 12);
        }

        let stored = read_footprint(&path, Direction::Forward).unwrap();
        assert_eq!(stored.axes, axes);
        let annual = stored.annual().unwrap();
        assert_eq!(annual.get_value(1, 2), 10.0);
        assert_eq!(annual.get_value(0, 0), 1.5);
        let back = stored.into_aggregate("3").unwrap();
        assert_eq!(back, footprint);

        assert!(matches!(
            read_footprint(&path, Direction::Backward),
            Err(TrackingError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_missing_footprint_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_footprint(&dir.path().join("nope.nc"), Direction::Forward);
        assert!(matches!(result, Err(TrackingError::MissingInput { .. })));
    }
}
