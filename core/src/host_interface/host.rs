use crate::host_interface::DetectionBatch;
use crate::math::{Point3, Transform};
use crate::prelude::HostResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque actor identity, unique for the actor's lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorHandle(pub u64);

/// Catalog entry the host can instantiate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
}

impl Blueprint {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Glob-style match supporting `*` wildcards, e.g. `vehicle.*`.
    pub fn matches(&self, pattern: &str) -> bool {
        wildcard_match(pattern.as_bytes(), self.id.as_bytes())
    }
}

fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            wildcard_match(&pattern[1..], text)
                || (!text.is_empty() && wildcard_match(pattern, &text[1..]))
        }
        (Some(p), Some(t)) if p == t => wildcard_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

/// Radar attributes applied before the sensor is spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarSpec {
    pub horizontal_fov: f64,
    pub vertical_fov: f64,
    pub range: f64,
}

impl Default for RadarSpec {
    fn default() -> Self {
        Self {
            horizontal_fov: 90.0,
            vertical_fov: 20.0,
            range: 30.0,
        }
    }
}

impl RadarSpec {
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("horizontal_fov", format!("{}", self.horizontal_fov)),
            ("vertical_fov", format!("{}", self.vertical_fov)),
            ("range", format!("{}", self.range)),
        ]
    }
}

/// Per-vehicle autopilot overrides. `None` leaves the host default in place.
///
/// These values are handed to the host's traffic manager untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotParams {
    pub ignore_lights_percentage: Option<f64>,
    pub ignore_signs_percentage: Option<f64>,
    pub speed_difference_percentage: Option<f64>,
    pub distance_to_leading_vehicle: Option<f64>,
    pub auto_lane_change: Option<bool>,
}

impl AutopilotParams {
    pub fn is_host_default(&self) -> bool {
        *self == AutopilotParams::default()
    }
}

/// Global traffic manager settings applied once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSettings {
    pub global_distance_to_leading_vehicle: f64,
    pub synchronous_mode: bool,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            global_distance_to_leading_vehicle: 0.5,
            synchronous_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 2000,
            timeout: Duration::from_secs(20),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Callback invoked by the host once per detection batch, possibly from a
/// host-owned thread.
pub type BatchListener = Box<dyn FnMut(DetectionBatch) + Send + 'static>;

/// Operations the logger needs from the simulation host.
///
/// Spawning may fail with [`HostError::SpawnCollision`] or
/// [`HostError::InvalidPlacement`] at any time; callers treat those as
/// retryable.
///
/// [`HostError::SpawnCollision`]: crate::prelude::HostError::SpawnCollision
/// [`HostError::InvalidPlacement`]: crate::prelude::HostError::InvalidPlacement
pub trait SimulationHost {
    fn connect(options: &ConnectOptions) -> HostResult<Self>
    where
        Self: Sized;

    /// Cheap health probe, called once per loop tick.
    fn check_connection(&self) -> HostResult<()>;

    fn load_world(&mut self, name: &str) -> HostResult<()>;
    fn set_spectator(&mut self, transform: &Transform) -> HostResult<()>;
    fn spawn_points(&self) -> HostResult<Vec<Transform>>;
    fn project_to_road(&self, location: Point3) -> HostResult<Transform>;
    fn blueprints(&self, pattern: &str) -> HostResult<Vec<Blueprint>>;

    fn try_spawn_actor(&mut self, blueprint: &Blueprint, at: &Transform) -> HostResult<ActorId>;
    fn is_alive(&self, actor: ActorId) -> HostResult<bool>;
    fn actor_location(&self, actor: ActorId) -> HostResult<Point3>;
    fn destroy_actor(&mut self, actor: ActorId) -> HostResult<()>;

    fn configure_traffic(&mut self, settings: &TrafficSettings) -> HostResult<()>;
    fn set_autopilot(&mut self, actor: ActorId, params: &AutopilotParams) -> HostResult<()>;

    fn spawn_radar(
        &mut self,
        spec: &RadarSpec,
        at: &Transform,
        listener: BatchListener,
    ) -> HostResult<SensorHandle>;
    fn stop_sensor(&mut self, sensor: SensorHandle) -> HostResult<()>;
    fn destroy_sensor(&mut self, sensor: SensorHandle) -> HostResult<()>;
}
