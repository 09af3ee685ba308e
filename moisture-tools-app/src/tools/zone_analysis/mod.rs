mod screen_zones;

pub use self::screen_zones::ScreenZones;
