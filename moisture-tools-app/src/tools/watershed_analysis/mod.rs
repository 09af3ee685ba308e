mod atmos_watersheds;

pub use self::atmos_watersheds::AtmosWatersheds;
