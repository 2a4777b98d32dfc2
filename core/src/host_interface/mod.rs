pub mod detection;
pub mod host;

pub use detection::{Detection, DetectionBatch, DetectionRecord, RECORD_HEADER};
pub use host::{
    ActorId, AutopilotParams, BatchListener, Blueprint, ConnectOptions, RadarSpec, SensorHandle,
    SimulationHost, TrafficSettings,
};
