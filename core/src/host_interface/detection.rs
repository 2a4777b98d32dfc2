use crate::host_interface::ActorId;
use crate::math::{sensor_offset, to_world, Point3};
use crate::prelude::DetectionError;
use serde::{Deserialize, Serialize};

/// Column order of the persisted CSV; downstream training reads it by name.
pub const RECORD_HEADER: [&str; 9] = [
    "timestamp",
    "x",
    "y",
    "z",
    "velocity",
    "azimuth",
    "sensor_id",
    "vehicle_id",
    "label",
];

/// One polar return delivered by a ranging sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub depth: f64,
    pub azimuth: f64,
    pub altitude: f64,
    pub velocity: f64,
}

impl Detection {
    pub fn new(depth: f64, azimuth: f64, altitude: f64, velocity: f64) -> Self {
        Self {
            depth,
            azimuth,
            altitude,
            velocity,
        }
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        let fields = [
            ("depth", self.depth),
            ("azimuth", self.azimuth),
            ("altitude", self.altitude),
            ("velocity", self.velocity),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(DetectionError::Malformed { field, value });
            }
        }
        if self.depth < 0.0 {
            return Err(DetectionError::Malformed {
                field: "depth",
                value: self.depth,
            });
        }
        Ok(())
    }

    pub fn offset(&self) -> Point3 {
        sensor_offset(self.depth, self.azimuth, self.altitude)
    }

    pub fn world_position(&self, sensor_origin: Point3) -> Point3 {
        to_world(sensor_origin, self.depth, self.azimuth, self.altitude)
    }
}

/// Detections delivered together by one sensor callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub frame: u64,
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(frame: u64, detections: Vec<Detection>) -> Self {
        Self { frame, detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Labeled row persisted for every matched detection.
///
/// `x`/`y`/`z` are the sensor-frame offset of the return, not the world
/// position used for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub velocity: f64,
    pub azimuth: f64,
    pub sensor_id: String,
    pub vehicle_id: ActorId,
    pub label: String,
}

impl DetectionRecord {
    pub fn from_detection(
        timestamp: f64,
        detection: &Detection,
        sensor_id: &str,
        vehicle_id: ActorId,
        label: &str,
    ) -> Self {
        let offset = detection.offset();
        Self {
            timestamp,
            x: offset.x,
            y: offset.y,
            z: offset.z,
            velocity: detection.velocity,
            azimuth: detection.azimuth,
            sensor_id: sensor_id.to_string(),
            vehicle_id,
            label: label.to_string(),
        }
    }
}
