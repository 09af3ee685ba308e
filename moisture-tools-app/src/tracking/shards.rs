use super::aggregate::BatchAggregator;
use super::climatology::FluxClimatology;
use super::files::{shard_path, write_footprint};
use super::footprint::{Direction, FootprintEngine};
use super::kernel::TransportKernel;
use crate::config::RunConfig;
use crate::errors::TrackingError;
use crate::pool::{Deadline, RunSummary, UnitStatus, WorkerPool};
use crate::tables::{target_cells_path, CoordinateTable, ShardKey, ZoneId};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Splits `len` table rows into consecutive shards of `size` rows. The last
/// shard takes the remainder; an empty table still yields the shard `[0, 0)`.
pub fn plan_shards(zone: ZoneId, len: usize, size: usize) -> Vec<ShardKey> {
    let size = size.max(1);
    let mut shards = vec![];
    let mut start = 0;
    while start + size < len {
        shards.push(ShardKey::new(zone, start, start + size));
        start += size;
    }
    shards.push(ShardKey::new(zone, start, len));
    shards
}

/// Plans shards for every zone from the lengths of their coordinate tables.
/// Zones without a table are left out with a warning.
pub fn plan_zones(target_cells_dir: &Path, zones: &[ZoneId], size: usize) -> Result<Vec<ShardKey>, TrackingError> {
    let mut plan = vec![];
    for zone in zones {
        match CoordinateTable::read(&target_cells_path(target_cells_dir, *zone)) {
            Ok(table) => plan.extend(plan_shards(*zone, table.len(), size)),
            Err(e) if e.is_skip() => warn!("zone {}: {}", zone, e),
            Err(e) => return Err(e),
        }
    }
    plan.sort_by_key(|k| k.zone);
    Ok(plan)
}

/// Zone ids of every `target_cells_{zone}.csv` in a directory, ascending.
pub fn discover_zones(target_cells_dir: &Path) -> Result<Vec<ZoneId>, TrackingError> {
    if !target_cells_dir.is_dir() {
        return Err(TrackingError::missing("coordinate table directory", target_cells_dir));
    }
    let mut zones = vec![];
    for entry in fs::read_dir(target_cells_dir)? {
        let name = entry?.file_name();
        let id = name
            .to_str()
            .and_then(|n| n.strip_prefix("target_cells_"))
            .and_then(|n| n.strip_suffix(".csv"))
            .and_then(|n| n.parse::<ZoneId>().ok());
        if let Some(id) = id {
            zones.push(id);
        }
    }
    zones.sort();
    zones.dedup();
    Ok(zones)
}

/// Runs every shard of a plan as an independent unit on a worker pool.
pub struct ShardOrchestrator<'a> {
    config: &'a RunConfig,
    kernel: &'a dyn TransportKernel,
    climatology: &'a FluxClimatology,
    producer: String,
}

impl<'a> ShardOrchestrator<'a> {
    pub fn new(
        config: &'a RunConfig,
        kernel: &'a dyn TransportKernel,
        climatology: &'a FluxClimatology,
    ) -> Result<ShardOrchestrator<'a>, TrackingError> {
        // lattice disagreements abort the run before any shard starts
        FootprintEngine::new(kernel, climatology, &config.axes)?;
        Ok(ShardOrchestrator {
            config,
            kernel,
            climatology,
            producer: format!("moisture_tools {}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn run(&self, pool: &WorkerPool, shards: &[ShardKey]) -> RunSummary {
        info!("tracking {} shards on {} workers", shards.len(), pool.workers());
        pool.run(shards, |key| self.run_shard(key))
    }

    /// Tracks one shard and writes its forward and backward files.
    pub fn run_shard(&self, key: &ShardKey) -> Result<UnitStatus, TrackingError> {
        let table = CoordinateTable::read(&target_cells_path(&self.config.target_cells_dir, key.zone))?;
        if key.stop > table.len() {
            warn!("{}: table has only {} rows, shard is clamped", key, table.len());
        }
        let cells = table.slice(key.start, key.stop);

        let engine = FootprintEngine::new(self.kernel, self.climatology, &self.config.axes)?;
        let output = BatchAggregator::new(engine)
            .with_deadline(self.config.unit_timeout.map(Deadline::new))
            .aggregate(cells)?;

        for direction in Direction::both() {
            let path = shard_path(&self.config.footprints_dir, direction, key);
            write_footprint(&path, output.get(direction), &self.producer)?;
        }
        info!("{}: tracked {} cells", key, cells.len());
        Ok(UnitStatus::Succeeded)
    }
}
