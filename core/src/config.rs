use crate::host_interface::{AutopilotParams, RadarSpec, TrafficSettings};
use crate::math::{Point3, Rotation, Transform};
use crate::prelude::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Driving behavior requested from the host autopilot at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivingProfile {
    #[default]
    Safe,
    Aggressive,
}

impl DrivingProfile {
    pub fn autopilot(&self) -> AutopilotParams {
        match self {
            DrivingProfile::Safe => AutopilotParams::default(),
            DrivingProfile::Aggressive => AutopilotParams {
                ignore_lights_percentage: Some(0.0),
                ignore_signs_percentage: Some(100.0),
                speed_difference_percentage: Some(-40.0),
                distance_to_leading_vehicle: Some(0.5),
                auto_lane_change: Some(true),
            },
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            DrivingProfile::Safe => "SAFE",
            DrivingProfile::Aggressive => "UNSAFE",
        }
    }
}

/// Which start event the total runtime is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationStrategy {
    #[default]
    SinceFirstDetection,
    SinceRadarStart,
}

/// Every tunable of a logging session. Missing YAML keys take the safe preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub label: String,
    pub sensor_id: String,
    pub world: String,
    pub vehicle_filter: String,
    pub spawn_interval_seconds: f64,
    pub max_active_actors: usize,
    pub sensor_location: Point3,
    pub sensor_rotation: Rotation,
    /// `None` uses the first spawn point the host reports.
    pub spawn_location: Option<Point3>,
    pub spawn_clearance: f64,
    pub total_runtime_seconds: f64,
    pub termination: TerminationStrategy,
    pub cleanup_distance_threshold: f64,
    pub match_radius: f64,
    pub cleanup_period_seconds: f64,
    pub flush_period_seconds: f64,
    pub progress_period_seconds: f64,
    pub tick_interval_ms: u64,
    pub batch_queue_capacity: usize,
    pub profile: DrivingProfile,
    pub radar: RadarSpec,
    pub traffic: TrafficSettings,
    pub output_dir: PathBuf,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::safe()
    }
}

impl SessionConfig {
    /// Host-default driving, runtime counted from the first matched detection.
    pub fn safe() -> Self {
        Self {
            label: "safe".into(),
            sensor_id: "radar_1".into(),
            world: "Town01".into(),
            vehicle_filter: "vehicle.*".into(),
            spawn_interval_seconds: 4.0,
            max_active_actors: 15,
            sensor_location: Point3::new(84.0, 57.0, 3.0),
            sensor_rotation: Rotation::from_yaw(0.0),
            spawn_location: Some(Point3::new(148.38, 57.09, 2.5)),
            spawn_clearance: 8.0,
            total_runtime_seconds: 120.0,
            termination: TerminationStrategy::SinceFirstDetection,
            cleanup_distance_threshold: 100.0,
            match_radius: 6.0,
            cleanup_period_seconds: 10.0,
            flush_period_seconds: 5.0,
            progress_period_seconds: 10.0,
            tick_interval_ms: 100,
            batch_queue_capacity: 256,
            profile: DrivingProfile::Safe,
            radar: RadarSpec::default(),
            traffic: TrafficSettings::default(),
            output_dir: PathBuf::from("output"),
            seed: None,
        }
    }

    /// Aggressive driving with continuous spawning, runtime counted from radar start.
    pub fn reckless() -> Self {
        Self {
            label: "unsafe".into(),
            total_runtime_seconds: 240.0,
            termination: TerminationStrategy::SinceRadarStart,
            profile: DrivingProfile::Aggressive,
            ..Self::safe()
        }
    }

    pub fn sensor_transform(&self) -> Transform {
        Transform::new(self.sensor_location, self.sensor_rotation)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_radar_data.csv", self.label))
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.label.trim().is_empty() {
            return Err(SessionError::Config("label must not be empty".into()));
        }
        if self.max_active_actors == 0 {
            return Err(SessionError::Config(
                "max_active_actors must be at least 1".into(),
            ));
        }
        if self.batch_queue_capacity == 0 {
            return Err(SessionError::Config(
                "batch_queue_capacity must be at least 1".into(),
            ));
        }
        let positive = [
            ("spawn_interval_seconds", self.spawn_interval_seconds),
            ("total_runtime_seconds", self.total_runtime_seconds),
            ("match_radius", self.match_radius),
            ("cleanup_period_seconds", self.cleanup_period_seconds),
            ("flush_period_seconds", self.flush_period_seconds),
            ("progress_period_seconds", self.progress_period_seconds),
            ("cleanup_distance_threshold", self.cleanup_distance_threshold),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SessionError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
