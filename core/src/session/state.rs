use serde::{Deserialize, Serialize};

/// Counters and start events of one logging session.
///
/// Owned by the session loop; the correlator and population controller
/// receive it by `&mut`, so there is exactly one writer at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub session_start_time: f64,
    pub radar_start_time: Option<f64>,
    pub first_detection_time: Option<f64>,
    pub detection_count: usize,
    pub spawned_count: usize,
}

impl RunState {
    pub fn new(session_start_time: f64) -> Self {
        Self {
            session_start_time,
            ..Default::default()
        }
    }

    pub fn mark_radar_started(&mut self, now: f64) {
        self.radar_start_time.get_or_insert(now);
    }

    /// Counts a matched detection; returns `true` for the first of the session.
    pub fn record_detection(&mut self, now: f64) -> bool {
        self.detection_count += 1;
        if self.first_detection_time.is_none() {
            self.first_detection_time = Some(now);
            true
        } else {
            false
        }
    }

    pub fn record_spawn(&mut self) {
        self.spawned_count += 1;
    }
}
