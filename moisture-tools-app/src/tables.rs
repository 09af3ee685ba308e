//! Coordinate tables and shard descriptor tables.
//!
//! Both are small CSV files in the layout written by pandas: a leading
//! unnamed index column followed by named columns.

use crate::errors::TrackingError;
use serde::de::DeserializeOwned;
use serde::Serialize as SerializeRow;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Identifier of a zone in the categorical zone raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ZoneId(pub i64);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ZoneId {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<ZoneId, TrackingError> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(ZoneId(id));
        }
        // zone rasters are often float-typed, so "12.0" is accepted
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(ZoneId(v as i64)),
            _ => Err(TrackingError::Configuration(format!("invalid zone id '{}'", s))),
        }
    }
}

/// Geographic position of a grid cell, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// An ordered list of cell coordinates belonging to one zone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoordinateTable {
    pub cells: Vec<Coordinate>,
}

impl CoordinateTable {
    pub fn new(cells: Vec<Coordinate>) -> CoordinateTable {
        CoordinateTable { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Rows `start..stop`, clamped to the table length.
    pub fn slice(&self, start: usize, stop: usize) -> &[Coordinate] {
        let stop = stop.min(self.cells.len());
        let start = start.min(stop);
        &self.cells[start..stop]
    }

    pub fn read(path: &Path) -> Result<CoordinateTable, TrackingError> {
        let rows: Vec<(usize, CoordinateRow)> = read_rows(path, "coordinate table")?;
        let cells = rows
            .into_iter()
            .map(|(_, row)| Coordinate {
                lat: row.lat,
                lon: row.lon,
            })
            .collect();
        Ok(CoordinateTable { cells })
    }

    pub fn write(&self, path: &Path) -> Result<(), TrackingError> {
        write_rows(
            path,
            self.cells.iter().enumerate().map(|(index, c)| CoordinateRow {
                index,
                lat: c.lat,
                lon: c.lon,
            }),
        )
    }
}

#[derive(Deserialize, Serialize)]
struct CoordinateRow {
    #[serde(rename = "", skip_deserializing)]
    index: usize,
    #[serde(rename = "Lat")]
    lat: f64,
    #[serde(rename = "Lon")]
    lon: f64,
}

#[derive(Deserialize, Serialize)]
struct ShardRow {
    #[serde(rename = "", skip_deserializing)]
    index: usize,
    zone: String,
    start: usize,
    stop: usize,
}

/// Location of a zone's coordinate table inside `dir`.
pub fn target_cells_path(dir: &Path, zone: ZoneId) -> PathBuf {
    dir.join(format!("target_cells_{}.csv", zone))
}

/// One unit of sharded tracking work: rows `start..stop` of a zone's
/// coordinate table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ShardKey {
    pub zone: ZoneId,
    pub start: usize,
    pub stop: usize,
}

impl ShardKey {
    pub fn new(zone: ZoneId, start: usize, stop: usize) -> ShardKey {
        ShardKey { zone, start, stop }
    }

    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}-{}", self.zone, self.start, self.stop)
    }
}

pub fn read_shard_table(path: &Path) -> Result<Vec<ShardKey>, TrackingError> {
    let rows: Vec<(usize, ShardRow)> = read_rows(path, "shard descriptor table")?;
    let mut shards = vec![];
    for (line, row) in rows {
        let zone = row
            .zone
            .parse::<ZoneId>()
            .map_err(|_| table_error(path, line, &format!("invalid zone '{}'", row.zone)))?;
        if row.stop < row.start {
            return Err(table_error(path, line, "stop precedes start"));
        }
        shards.push(ShardKey::new(zone, row.start, row.stop));
    }
    Ok(shards)
}

pub fn write_shard_table(path: &Path, shards: &[ShardKey]) -> Result<(), TrackingError> {
    write_rows(
        path,
        shards.iter().enumerate().map(|(index, shard)| ShardRow {
            index,
            zone: shard.zone.to_string(),
            start: shard.start,
            stop: shard.stop,
        }),
    )
}

/// Distinct zone ids of a shard plan, in first-seen order.
pub fn distinct_zones(shards: &[ShardKey]) -> Vec<ZoneId> {
    let mut zones: Vec<ZoneId> = vec![];
    for shard in shards {
        if !zones.contains(&shard.zone) {
            zones.push(shard.zone);
        }
    }
    zones
}

/// Parses a comma- or semicolon-separated id list such as `1,4,7`.
pub fn parse_zone_list(s: &str) -> Result<Vec<ZoneId>, TrackingError> {
    s.split(|c| c == ',' || c == ';')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<ZoneId>())
        .collect()
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), TrackingError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Rows of a headed CSV file with the line each row starts on. Columns the
/// row type does not name, such as the index column, are ignored.
fn read_rows<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<Vec<(usize, T)>, TrackingError> {
    if !path.is_file() {
        return Err(TrackingError::missing(what, path));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let mut rows = vec![];
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let row = record
            .deserialize(Some(&headers))
            .map_err(|e| table_error(path, line, &e.to_string()))?;
        rows.push((line, row));
    }
    Ok(rows)
}

fn write_rows<T, I>(path: &Path, rows: I) -> Result<(), TrackingError>
where
    T: SerializeRow,
    I: IntoIterator<Item = T>,
{
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(std::io::Error::from)?;
    for row in rows {
        writer.serialize(row).map_err(std::io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(path: &Path, e: csv::Error) -> TrackingError {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    table_error(path, line, &e.to_string())
}

fn table_error(path: &Path, line: usize, message: &str) -> TrackingError {
    TrackingError::Table {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    }
}
