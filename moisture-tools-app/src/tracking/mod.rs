//! Moisture footprint tracking: single-cell footprints, their aggregation
//! over batches of cells, sharded execution and assembly of shard output.

mod aggregate;
mod assemble;
mod climatology;
mod files;
mod footprint;
mod kernel;
mod shards;

pub use self::aggregate::{AggregateFootprint, BatchAggregator, BatchOutput, FOOTPRINT_UNITS};
pub use self::assemble::{coverage_gaps, shard_overlaps, AssemblyOutcome, RunAssembler};
pub use self::climatology::FluxClimatology;
pub use self::files::{
    parse_shard_file_name, read_footprint, region_path, shard_dir, shard_path, write_footprint,
    StoredFootprint,
};
pub(crate) use self::files::{history, write_atomically};
pub use self::footprint::{
    backward_distribution, forward_distribution, normalize, transport_weight, Direction, Footprint,
    FootprintEngine, FootprintPair,
};
pub use self::kernel::{DenseKernel, KernelMonth, KernelSlices, Month, NetcdfKernel, TransportKernel};
pub use self::shards::{discover_zones, plan_shards, plan_zones, ShardOrchestrator};
