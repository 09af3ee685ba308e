mod nearest_index;
mod ring_geometry;

pub use self::nearest_index::nearest_index;
pub use self::ring_geometry::{point_in_ring, ring_signed_area};
