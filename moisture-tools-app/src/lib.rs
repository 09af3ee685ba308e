/*!
Moisture footprint tracking: zone screening, sharded forward and backward
footprint tracking, assembly of shard output, and percentile atmospheric
watersheds.
*/

pub mod config;
pub mod errors;
pub mod netcdf_io;
pub mod pool;
pub mod tables;
pub mod tools;
pub mod tracking;
pub mod watersheds;
pub mod zones;

pub use crate::config::RunConfig;
pub use crate::errors::TrackingError;
