//! NetCDF access for the tracking tools, on top of the `netcdf` crate.
//!
//! Values are always read as `f64` with CF packing (`scale_factor`,
//! `add_offset`) applied and `_FillValue`/`missing_value` turned into NaN.

use crate::errors::TrackingError;
use moisture_common::structures::GridAxes;
use netcdf::{AttributeValue as AttrValue, File, FileMut, Variable};
use std::ops::Range;
use std::path::Path;

/// Opens an existing file; a file that is not there is a missing input.
pub fn open(path: &Path, what: &'static str) -> Result<File, TrackingError> {
    if !path.is_file() {
        return Err(TrackingError::missing(what, path));
    }
    Ok(netcdf::open(path)?)
}

pub fn variable<'f>(file: &'f File, name: &str) -> Result<Variable<'f>, TrackingError> {
    file.variable(name)
        .ok_or_else(|| TrackingError::UnknownVariable(name.to_string()))
}

pub fn has_variable(file: &File, name: &str) -> bool {
    file.variable(name).is_some()
}

pub fn shape(var: &Variable) -> Vec<usize> {
    var.dimensions().iter().map(|d| d.len()).collect()
}

pub fn read_f64(file: &File, name: &str) -> Result<Vec<f64>, TrackingError> {
    let var = variable(file, name)?;
    let raw = var.get_values::<f64, _>(..)?;
    Ok(unpack(&var, raw))
}

/// Reads `count[i]` values from `start[i]` along every dimension.
pub fn read_slab_f64(var: &Variable, start: &[usize], count: &[usize]) -> Result<Vec<f64>, TrackingError> {
    let shape = shape(var);
    let fits = start.len() == shape.len()
        && count.len() == shape.len()
        && start.iter().zip(count).zip(&shape).all(|((s, c), n)| s + c <= *n);
    if !fits {
        return Err(TrackingError::mismatch(
            var.name(),
            format!("hyperslab start {:?} count {:?} exceeds shape {:?}", start, count, shape),
        ));
    }
    let extents: Vec<Range<usize>> = start.iter().zip(count).map(|(s, c)| *s..s + c).collect();
    let raw = var.get_values::<f64, _>(extents.as_slice())?;
    Ok(unpack(var, raw))
}

fn unpack(var: &Variable, raw: Vec<f64>) -> Vec<f64> {
    let scale = attribute_f64(var, "scale_factor").unwrap_or(1.0);
    let offset = attribute_f64(var, "add_offset").unwrap_or(0.0);
    let fill = attribute_f64(var, "_FillValue");
    let missing = attribute_f64(var, "missing_value");
    raw.into_iter()
        .map(|v| {
            if v.is_nan() || Some(v) == fill || Some(v) == missing {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect()
}

/// First value of a numeric attribute.
pub fn attribute_f64(var: &Variable, name: &str) -> Option<f64> {
    let value = match var.attribute(name)?.value().ok()? {
        AttrValue::Uchar(v) => v as f64,
        AttrValue::Schar(v) => v as f64,
        AttrValue::Ushort(v) => v as f64,
        AttrValue::Short(v) => v as f64,
        AttrValue::Uint(v) => v as f64,
        AttrValue::Int(v) => v as f64,
        AttrValue::Ulonglong(v) => v as f64,
        AttrValue::Longlong(v) => v as f64,
        AttrValue::Float(v) => v as f64,
        AttrValue::Double(v) => v,
        AttrValue::Shorts(v) => *v.first()? as f64,
        AttrValue::Ints(v) => *v.first()? as f64,
        AttrValue::Floats(v) => *v.first()? as f64,
        AttrValue::Doubles(v) => *v.first()?,
        _ => return None,
    };
    Some(value)
}

pub fn attribute_text(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttrValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Reads `lat`/`lon` (or `latitude`/`longitude`) coordinate variables, if the
/// file has them.
pub fn read_axes(file: &File) -> Result<Option<GridAxes>, TrackingError> {
    let lat = ["lat", "latitude"].into_iter().find(|n| has_variable(file, n));
    let lon = ["lon", "longitude"].into_iter().find(|n| has_variable(file, n));
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Some(GridAxes::new(read_f64(file, lat)?, read_f64(file, lon)?))),
        _ => Ok(None),
    }
}

/// Adds `lat` and `lon` dimensions with their coordinate variables.
pub fn put_axes(file: &mut FileMut, axes: &GridAxes) -> Result<(), TrackingError> {
    file.add_dimension("lat", axes.rows())?;
    file.add_dimension("lon", axes.columns())?;
    put_f64(file, "lat", &["lat"], axes.lats(), &[("units", "degrees_north")])?;
    put_f64(file, "lon", &["lon"], axes.lons(), &[("units", "degrees_east")])?;
    Ok(())
}

/// Adds a double variable with text attributes and writes all its values.
pub fn put_f64(
    file: &mut FileMut,
    name: &str,
    dims: &[&str],
    values: &[f64],
    attributes: &[(&str, &str)],
) -> Result<(), TrackingError> {
    let mut var = file.add_variable::<f64>(name, dims)?;
    for (key, value) in attributes {
        var.put_attribute(key, *value)?;
    }
    var.put_values(values, ..)?;
    Ok(())
}
