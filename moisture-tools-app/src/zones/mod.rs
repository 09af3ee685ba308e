//! Zone screening: turning a categorical zone raster into per-zone coordinate
//! tables.

mod screening;

pub use self::screening::{ZoneRaster, ZoneScreener};
