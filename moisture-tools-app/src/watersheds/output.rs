use super::percentile::Watershed;
use super::vectorize::vectorize;
use crate::config::format_percent;
use crate::errors::TrackingError;
use crate::netcdf_io;
use crate::tables::ZoneId;
use crate::tracking::{history, write_atomically, Direction};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::fs;
use std::path::Path;

const EPSG_4326_WKT: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433],AUTHORITY[\"EPSG\",\"4326\"]]";

fn kind(direction: Direction) -> &'static str {
    match direction {
        Direction::Forward => "Evaporationshed",
        Direction::Backward => "Precipitationshed",
    }
}

/// `{p}%_pshed` or `{p}%_eshed`.
pub fn variable_stem(direction: Direction, percent: f64) -> String {
    format!("{}%_{}", format_percent(percent), direction.shed_prefix())
}

/// Writes the value and mask grids of a watershed. Cells outside the
/// watershed hold NaN in both.
pub fn write_gridded(path: &Path, shed: &Watershed, producer: &str) -> Result<(), TrackingError> {
    let stem = variable_stem(shed.direction, shed.percent);
    let values: Vec<f64> = shed
        .values
        .as_slice()
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    let mask: Vec<f64> = shed
        .mask
        .as_slice()
        .iter()
        .map(|m| if *m { 1.0 } else { f64::NAN })
        .collect();

    let values_name = format!("{}_values", stem);
    let mask_name = format!("{}_mask", stem);
    let values_description = format!("Values of Percentile {}", kind(shed.direction));
    let mask_description = format!("Mask of Percentile {}", kind(shed.direction));
    let mut values_attributes = vec![("description", values_description.as_str()), ("units", "l/year")];
    let mut mask_attributes = vec![("description", mask_description.as_str()), ("units", "[0-1]")];
    if shed.normalized {
        values_attributes.push(("grid_mapping", "spatial_ref"));
        mask_attributes.push(("grid_mapping", "spatial_ref"));
    }

    write_atomically(path, |part| {
        let mut file = netcdf::create(part)?;
        file.add_attribute("history", history(producer))?;
        netcdf_io::put_axes(&mut file, &shed.axes)?;
        netcdf_io::put_f64(&mut file, &values_name, &["lat", "lon"], &values, &values_attributes)?;
        netcdf_io::put_f64(&mut file, &mask_name, &["lat", "lon"], &mask, &mask_attributes)?;
        if shed.normalized {
            let mut crs = file.add_variable::<i32>("spatial_ref", &[])?;
            crs.put_attribute("crs_wkt", EPSG_4326_WKT)?;
            crs.put_attribute("spatial_ref", EPSG_4326_WKT)?;
            crs.put_attribute("grid_mapping_name", "latitude_longitude")?;
        }
        Ok(())
    })
}

/// Writes the dissolved watershed polygon as a one-feature collection.
/// Returns `false`, writing nothing, when the watershed has no positive cell.
pub fn write_geojson(path: &Path, shed: &Watershed, zone: ZoneId) -> Result<bool, TrackingError> {
    let geometry = match vectorize(shed) {
        Some(g) => g,
        None => return Ok(false),
    };

    let mut properties: JsonMap<String, JsonValue> = JsonMap::new();
    properties.insert("zone".to_string(), json!(zone.0));
    properties.insert("direction".to_string(), json!(shed.direction.stem()));
    properties.insert("percent".to_string(), json!(shed.percent));

    let feature = Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };

    let mut crs_map = JsonMap::new();
    crs_map.insert("type".to_string(), json!("name"));
    crs_map.insert(
        "properties".to_string(),
        json!({"name": format!("urn:ogc:def:crs:EPSG::{}", 4326)}),
    );
    let mut members = JsonMap::new();
    members.insert("crs".to_string(), JsonValue::Object(crs_map));

    let feature_collection = FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: Some(members),
    };
    let text = GeoJson::FeatureCollection(feature_collection).to_string();
    write_atomically(path, |part| Ok(fs::write(part, text)?))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watersheds::percentile::delineate;
    use moisture_common::structures::{Array2D, GridAxes};

    fn shed() -> Watershed {
        let axes = GridAxes::regular(0.5, -0.5, 2, 179.5, 0.5, 2);
        let annual = Array2D::from_vec(2, 2, vec![8.0, 1.0, 0.0, 4.0], f64::NAN).unwrap();
        delineate(&annual, &axes, Direction::Backward, 90.0).unwrap()
    }

    #[test]
    fn test_variable_stem() {
        assert_eq!(variable_stem(Direction::Backward, 99.0), "99%_pshed");
        assert_eq!(variable_stem(Direction::Forward, 99.5), "99.5%_eshed");
    }

    #[test]
    fn test_gridded_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pshed90_3.nc");
        let normal = shed().normalized();
        write_gridded(&path, &normal, "test").unwrap();

        let file = netcdf::open(&path).unwrap();
        assert_eq!(netcdf_io::read_f64(&file, "lon").unwrap(), vec![-180.0, 179.5]);
        assert_eq!(netcdf_io::read_f64(&file, "lat").unwrap(), vec![0.0, 0.5]);
        let values = netcdf_io::read_f64(&file, "90%_pshed_values").unwrap();
        let mask = netcdf_io::read_f64(&file, "90%_pshed_mask").unwrap();
        // rows: lat 0 then lat 0.5; columns: lon -180 (was 180) then 179.5
        assert_eq!(values[0], 4.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan(), "1.0 lies below the 90% boundary");
        assert_eq!(values[3], 8.0);
        assert_eq!(mask[0], 1.0);
        assert!(mask[1].is_nan());
        assert_eq!(mask[3], 1.0);
        let mask_var = file.variable("90%_pshed_mask").unwrap();
        assert_eq!(
            netcdf_io::attribute_text(&mask_var, "grid_mapping").as_deref(),
            Some("spatial_ref")
        );
        assert!(netcdf_io::has_variable(&file, "spatial_ref"));
        assert!(!dir.path().join("pshed90_3.nc.part").exists());
    }

    #[test]
    fn test_geojson_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pshed90_3.geojson");
        assert!(write_geojson(&path, &shed(), ZoneId(3)).unwrap());
        let text = fs::read_to_string(&path).unwrap();
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "FeatureCollection");
        assert_eq!(parsed["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");
        assert_eq!(parsed["features"][0]["properties"]["zone"], 3);
        assert_eq!(parsed["features"][0]["geometry"]["type"], "MultiPolygon");
        assert!(!dir.path().join("pshed90_3.geojson.part").exists());

        let axes = GridAxes::regular(0.5, -0.5, 2, 0.0, 0.5, 2);
        let empty = Array2D::new(2, 2, 0.0, f64::NAN).unwrap();
        let none = delineate(&empty, &axes, Direction::Forward, 90.0).unwrap();
        let skipped = dir.path().join("eshed90_3.geojson");
        assert!(!write_geojson(&skipped, &none, ZoneId(3)).unwrap());
        assert!(!skipped.exists());
    }
}
