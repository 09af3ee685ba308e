mod array2d;
mod array3d;
mod grid_axes;

pub use self::array2d::Array2D;
pub use self::array3d::Array3D;
pub use self::grid_axes::GridAxes;
