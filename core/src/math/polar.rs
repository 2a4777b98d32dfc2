use crate::math::geometry::Point3;

/// Sensor-frame offset of a polar return.
///
/// `z` is the raw altitude value; no range-to-height conversion is applied.
pub fn sensor_offset(depth: f64, azimuth: f64, altitude: f64) -> Point3 {
    Point3::new(depth * azimuth.cos(), depth * azimuth.sin(), altitude)
}

/// Converts a polar return into a world-frame position.
///
/// The planar offset is added to the sensor origin while `z` is taken from
/// `altitude` directly, so the result does not depend on the sensor height.
pub fn to_world(sensor_origin: Point3, depth: f64, azimuth: f64, altitude: f64) -> Point3 {
    let offset = sensor_offset(depth, azimuth, altitude);
    Point3::new(
        sensor_origin.x + offset.x,
        sensor_origin.y + offset.y,
        offset.z,
    )
}
