use crate::config::TerminationStrategy;
use crate::session::state::RunState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    RuntimeElapsed,
    Interrupted,
    Fatal(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::RuntimeElapsed => write!(f, "runtime elapsed"),
            StopReason::Interrupted => write!(f, "interrupted by operator"),
            StopReason::Fatal(message) => write!(f, "fatal error: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminationPolicy {
    pub strategy: TerminationStrategy,
    pub total_runtime: f64,
}

impl TerminationPolicy {
    pub fn new(strategy: TerminationStrategy, total_runtime: f64) -> Self {
        Self {
            strategy,
            total_runtime,
        }
    }

    /// The start event runtime is measured from, if it has happened yet.
    pub fn reference_time(&self, state: &RunState) -> Option<f64> {
        match self.strategy {
            TerminationStrategy::SinceFirstDetection => state.first_detection_time,
            TerminationStrategy::SinceRadarStart => state.radar_start_time,
        }
    }

    pub fn elapsed(&self, now: f64, state: &RunState) -> Option<f64> {
        self.reference_time(state).map(|start| (now - start).max(0.0))
    }

    pub fn is_exhausted(&self, elapsed: Option<f64>) -> bool {
        elapsed.is_some_and(|elapsed| elapsed >= self.total_runtime)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub elapsed_secs: u64,
    pub total_runtime: f64,
    pub active_actors: usize,
    pub max_active: usize,
    pub spawned: usize,
    pub detections: usize,
    pub new_detections: usize,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Elapsed: {}/{}s | Active vehicles: {}/{} | Total spawned: {} | New detections: {} | Total detections: {}",
            self.elapsed_secs,
            self.total_runtime,
            self.active_actors,
            self.max_active,
            self.spawned,
            self.new_detections,
            self.detections
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub elapsed: Option<f64>,
    pub stop: bool,
    pub progress: Option<ProgressReport>,
}

/// Decides once per tick whether the session ends and whether progress is due.
///
/// Elapsed time is computed a single time per evaluation and shared by both
/// decisions.
pub struct RunController {
    policy: TerminationPolicy,
    progress_period: f64,
    reported_buckets: u64,
    detection_checkpoint: usize,
}

impl RunController {
    pub fn new(policy: TerminationPolicy, progress_period: f64) -> Self {
        Self {
            policy,
            progress_period,
            reported_buckets: 0,
            detection_checkpoint: 0,
        }
    }

    pub fn evaluate(
        &mut self,
        now: f64,
        state: &RunState,
        active_actors: usize,
        max_active: usize,
    ) -> Verdict {
        let elapsed = self.policy.elapsed(now, state);
        let stop = self.policy.is_exhausted(elapsed);

        let progress = elapsed.and_then(|elapsed| {
            let bucket = (elapsed / self.progress_period).floor() as u64;
            if stop || bucket <= self.reported_buckets {
                return None;
            }
            self.reported_buckets = bucket;
            let new_detections = state.detection_count - self.detection_checkpoint;
            self.detection_checkpoint = state.detection_count;
            Some(ProgressReport {
                elapsed_secs: elapsed as u64,
                total_runtime: self.policy.total_runtime,
                active_actors,
                max_active,
                spawned: state.spawned_count,
                detections: state.detection_count,
                new_detections,
            })
        });

        Verdict {
            elapsed,
            stop,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL_RUNTIME: f64 = 120.0;

    #[test]
    fn first_detection_strategy_waits_for_a_detection() {
        let policy = TerminationPolicy::new(TerminationStrategy::SinceFirstDetection, TOTAL_RUNTIME);
        let mut controller = RunController::new(policy, 10.0);
        let mut state = RunState::new(0.0);

        let mut stopped_at = None;
        let mut t = 0.0;
        while t <= 10.0 + TOTAL_RUNTIME + 1.0 {
            if t == 10.0 {
                state.record_detection(t);
            }
            if t < 10.0 {
                assert!(!controller.evaluate(t, &state, 0, 15).stop);
            } else if controller.evaluate(t, &state, 0, 15).stop {
                stopped_at = Some(t);
                break;
            }
            t += 1.0;
        }
        assert_eq!(stopped_at, Some(10.0 + TOTAL_RUNTIME));
    }

    #[test]
    fn first_detection_strategy_never_stops_without_detections() {
        let policy = TerminationPolicy::new(TerminationStrategy::SinceFirstDetection, 5.0);
        let mut controller = RunController::new(policy, 10.0);
        let state = RunState::new(0.0);
        let verdict = controller.evaluate(10_000.0, &state, 3, 15);
        assert!(!verdict.stop);
        assert_eq!(verdict.elapsed, None);
        assert_eq!(verdict.progress, None);
    }

    #[test]
    fn radar_start_strategy_ignores_detections() {
        let policy = TerminationPolicy::new(TerminationStrategy::SinceRadarStart, 240.0);
        let mut controller = RunController::new(policy, 10.0);
        let mut state = RunState::new(0.0);
        state.mark_radar_started(2.0);
        assert!(!controller.evaluate(241.9, &state, 0, 15).stop);
        assert!(controller.evaluate(242.0, &state, 0, 15).stop);
        assert_eq!(state.detection_count, 0);
    }

    #[test]
    fn progress_fires_once_per_period() {
        let policy = TerminationPolicy::new(TerminationStrategy::SinceRadarStart, 240.0);
        let mut controller = RunController::new(policy, 10.0);
        let mut state = RunState::new(0.0);
        state.mark_radar_started(0.0);

        let mut reports = Vec::new();
        for tick in 0..=250 {
            let now = tick as f64 * 0.1;
            if tick % 7 == 0 {
                state.record_detection(now);
            }
            if let Some(report) = controller.evaluate(now, &state, 2, 15).progress {
                reports.push(report);
            }
        }
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].elapsed_secs, 10);
        assert_eq!(reports[1].elapsed_secs, 20);
        assert_eq!(
            reports[0].new_detections + reports[1].new_detections,
            reports[1].detections
        );
    }
}
