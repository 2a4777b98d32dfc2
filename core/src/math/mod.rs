pub mod geometry;
pub mod polar;

pub use geometry::{Point3, Rotation, Transform};
pub use polar::{sensor_offset, to_world};
