use super::aggregate::AggregateFootprint;
use super::files::{parse_shard_file_name, read_footprint, region_path, shard_dir, shard_path, write_footprint};
use super::footprint::Direction;
use crate::config::RunConfig;
use crate::errors::TrackingError;
use crate::pool::{RunSummary, UnitStatus, WorkerPool};
use crate::tables::{target_cells_path, CoordinateTable, ShardKey, ZoneId};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq)]
pub enum AssemblyOutcome {
    Assembled {
        zone: ZoneId,
        shard_count: usize,
        /// Row ranges of the coordinate table no shard covered.
        gaps: Vec<(usize, usize)>,
        /// Row ranges covered by more than one shard, and so summed more
        /// than once.
        overlaps: Vec<(usize, usize)>,
        /// Shards with only one of their two files.
        unpaired: Vec<ShardKey>,
    },
    /// No complete shard exists; nothing was written.
    Incomplete { zone: ZoneId },
}

/// Merges the shard files of a zone into one footprint per direction.
pub struct RunAssembler {
    footprints_dir: PathBuf,
    target_cells_dir: Option<PathBuf>,
    producer: String,
}

impl RunAssembler {
    pub fn new(config: &RunConfig) -> RunAssembler {
        RunAssembler {
            footprints_dir: config.footprints_dir.clone(),
            target_cells_dir: Some(config.target_cells_dir.clone()),
            producer: format!("moisture_tools {}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// An assembler that does not look up coordinate tables, so gaps can only
    /// be detected between shards.
    pub fn without_tables(footprints_dir: &Path) -> RunAssembler {
        RunAssembler {
            footprints_dir: footprints_dir.to_path_buf(),
            target_cells_dir: None,
            producer: format!("moisture_tools {}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Shard keys of a zone with a file in `direction`, ordered by start row.
    pub fn find_shards(&self, direction: Direction, zone: ZoneId) -> Result<Vec<ShardKey>, TrackingError> {
        let dir = shard_dir(&self.footprints_dir, direction);
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut keys = vec![];
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|n| parse_shard_file_name(direction, n))
            {
                if key.zone == zone {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn assemble(&self, zone: ZoneId) -> Result<AssemblyOutcome, TrackingError> {
        let forward = self.find_shards(Direction::Forward, zone)?;
        let backward = self.find_shards(Direction::Backward, zone)?;
        let paired: Vec<ShardKey> = forward.iter().filter(|k| backward.contains(k)).copied().collect();
        let unpaired: Vec<ShardKey> = forward
            .iter()
            .chain(backward.iter())
            .filter(|k| !paired.contains(k))
            .copied()
            .collect();
        for key in &unpaired {
            warn!("{}: only one direction was written; shard left out", key);
        }
        if paired.is_empty() {
            warn!("zone {}: no shard output found, zone is incomplete", zone);
            return Ok(AssemblyOutcome::Incomplete { zone });
        }

        let gaps = coverage_gaps(&paired, self.expected_rows(zone)?);
        for (start, stop) in &gaps {
            warn!("zone {}: rows {}..{} are not covered by any shard", zone, start, stop);
        }

        let overlaps = shard_overlaps(&paired);
        for (start, stop) in &overlaps {
            warn!("zone {}: rows {}..{} are covered by more than one shard", zone, start, stop);
        }

        // nothing is written unless both directions sum
        let forward = self.sum_shards(Direction::Forward, zone, &paired)?;
        let backward = self.sum_shards(Direction::Backward, zone, &paired)?;
        for region in [&forward, &backward] {
            write_footprint(&region_path(&self.footprints_dir, region.direction, zone), region, &self.producer)?;
        }
        info!("zone {}: assembled {} shards", zone, paired.len());
        Ok(AssemblyOutcome::Assembled {
            zone,
            shard_count: paired.len(),
            gaps,
            overlaps,
            unpaired,
        })
    }

    /// Assembles every zone on a pool. Incomplete zones are reported as
    /// skipped.
    pub fn run(&self, pool: &WorkerPool, zones: &[ZoneId]) -> RunSummary {
        pool.run(zones, |zone| match self.assemble(*zone)? {
            AssemblyOutcome::Assembled { .. } => Ok(UnitStatus::Succeeded),
            AssemblyOutcome::Incomplete { .. } => Ok(UnitStatus::Skipped("no shard output found".to_string())),
        })
    }

    fn sum_shards(&self, direction: Direction, zone: ZoneId, keys: &[ShardKey]) -> Result<AggregateFootprint, TrackingError> {
        let label = zone.to_string();
        let mut total: Option<AggregateFootprint> = None;
        for key in keys {
            let stored = read_footprint(&shard_path(&self.footprints_dir, direction, key), direction)?;
            let shard = stored.into_aggregate(&label)?;
            if let Some(acc) = total.as_mut() {
                acc.merge(&shard, &label)?;
            } else {
                total = Some(shard);
            }
        }
        total.ok_or_else(|| TrackingError::missing("footprint file", shard_dir(&self.footprints_dir, direction)))
    }

    fn expected_rows(&self, zone: ZoneId) -> Result<Option<usize>, TrackingError> {
        let dir = match &self.target_cells_dir {
            Some(dir) => dir,
            None => return Ok(None),
        };
        match CoordinateTable::read(&target_cells_path(dir, zone)) {
            Ok(table) => Ok(Some(table.len())),
            Err(e) if e.is_skip() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Row ranges in `[0, expected)` (or up to the last shard's stop) that no
/// shard covers. `keys` must be sorted.
pub fn coverage_gaps(keys: &[ShardKey], expected: Option<usize>) -> Vec<(usize, usize)> {
    let end = expected.unwrap_or_else(|| keys.iter().map(|k| k.stop).max().unwrap_or(0));
    let mut gaps = vec![];
    let mut covered = 0;
    for key in keys {
        if key.start > covered {
            gaps.push((covered, key.start.min(end)));
        }
        covered = covered.max(key.stop);
        if covered >= end {
            break;
        }
    }
    if covered < end {
        gaps.push((covered, end));
    }
    gaps.retain(|(a, b)| a < b);
    gaps
}

/// Row ranges that more than one shard covers, merged. `keys` must be
/// sorted.
pub fn shard_overlaps(keys: &[ShardKey]) -> Vec<(usize, usize)> {
    let mut overlaps: Vec<(usize, usize)> = vec![];
    let mut covered = 0;
    for key in keys {
        if key.start < covered {
            let range = (key.start, key.stop.min(covered));
            match overlaps.last_mut() {
                Some(last) if last.1 >= range.0 => last.1 = last.1.max(range.1),
                _ => overlaps.push(range),
            }
        }
        covered = covered.max(key.stop);
    }
    overlaps.retain(|(a, b)| a < b);
    overlaps
}
