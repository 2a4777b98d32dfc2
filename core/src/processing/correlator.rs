use crate::config::SessionConfig;
use crate::host_interface::{DetectionBatch, DetectionRecord, SimulationHost};
use crate::math::Point3;
use crate::population::registry::{ActorRegistry, LiveActor};
use crate::session::state::RunState;
use crate::sink::RecordSink;
use crate::telemetry::{LogManager, MetricsRecorder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub matched: usize,
    pub unmatched: usize,
    pub skipped: usize,
    pub sink_errors: usize,
}

/// Attributes radar returns to live vehicles and emits labeled records.
///
/// Matching is first-match in registry order: the first live actor closer
/// than `match_radius` wins even when a later one is nearer.
pub struct Correlator {
    sensor_id: String,
    origin: Point3,
    match_radius: f64,
    label: String,
    logger: LogManager,
}

impl Correlator {
    pub fn new(
        sensor_id: impl Into<String>,
        origin: Point3,
        match_radius: f64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            origin,
            match_radius,
            label: label.into(),
            logger: LogManager::new("INFO"),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.sensor_id.clone(),
            config.sensor_location,
            config.match_radius,
            config.label.clone(),
        )
    }

    pub fn first_match<'a>(&self, world: &Point3, actors: &'a [LiveActor]) -> Option<&'a LiveActor> {
        actors
            .iter()
            .find(|actor| world.distance(&actor.position) < self.match_radius)
    }

    /// Processes one batch in delivery order. Never fails: malformed
    /// detections and sink write errors are logged, counted and skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn on_detection_batch<H, S>(
        &self,
        batch: &DetectionBatch,
        registry: &ActorRegistry,
        host: &H,
        sink: &mut S,
        state: &mut RunState,
        now: f64,
        metrics: &MetricsRecorder,
    ) -> BatchReport
    where
        H: SimulationHost + ?Sized,
        S: RecordSink + ?Sized,
    {
        let mut report = BatchReport::default();
        if batch.is_empty() {
            return report;
        }

        let actors = registry.all_alive(host);
        for detection in &batch.detections {
            if let Err(err) = detection.validate() {
                self.logger
                    .warn(&format!("skipping detection in frame {}: {}", batch.frame, err));
                metrics.record_skipped();
                report.skipped += 1;
                continue;
            }

            let world = detection.world_position(self.origin);
            let Some(actor) = self.first_match(&world, &actors) else {
                metrics.record_unmatched();
                report.unmatched += 1;
                continue;
            };

            let record =
                DetectionRecord::from_detection(now, detection, &self.sensor_id, actor.id, &self.label);
            if let Err(err) = sink.append(&record) {
                self.logger
                    .error(&format!("failed to persist detection: {}", err));
                metrics.record_sink_error();
                report.sink_errors += 1;
                continue;
            }

            report.matched += 1;
            if state.record_detection(now) {
                self.logger.record("First detection timestamp recorded");
            }
            if state.detection_count % 10 == 0 {
                self.logger.record(&format!(
                    "Radar detections recorded: {}",
                    state.detection_count
                ));
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_interface::{ActorId, Blueprint, Detection};
    use crate::math::Transform;
    use crate::population::registry::SpawnRequest;
    use crate::testing::{FakeHost, MemorySink};

    struct Scene {
        host: FakeHost,
        registry: ActorRegistry,
        sink: MemorySink,
        state: RunState,
        metrics: MetricsRecorder,
        correlator: Correlator,
    }

    impl Scene {
        fn new(origin: Point3) -> Self {
            Self {
                host: FakeHost::new(),
                registry: ActorRegistry::with_capacity(8),
                sink: MemorySink::new(),
                state: RunState::new(0.0),
                metrics: MetricsRecorder::new(),
                correlator: Correlator::new("radar_1", origin, 6.0, "safe"),
            }
        }

        fn place(&mut self, position: Point3) -> ActorId {
            let blueprint = Blueprint::new("vehicle.audi.a2");
            let request = SpawnRequest {
                blueprint: &blueprint,
                transform: Transform::new(position, Default::default()),
            };
            self.registry
                .spawn(&mut self.host, &request)
                .unwrap()
                .unwrap()
        }

        fn feed(&mut self, detections: Vec<Detection>, now: f64) -> BatchReport {
            let batch = DetectionBatch::new(1, detections);
            self.correlator.on_detection_batch(
                &batch,
                &self.registry,
                &self.host,
                &mut self.sink,
                &mut self.state,
                now,
                &self.metrics,
            )
        }
    }

    #[test]
    fn detection_on_actor_emits_record_with_actor_id() {
        let mut scene = Scene::new(Point3::ORIGIN);
        let id = scene.place(Point3::new(6.0, 0.0, 0.0));
        let report = scene.feed(vec![Detection::new(6.0, 0.0, 0.0, -2.0)], 10.0);

        assert_eq!(report.matched, 1);
        let sink = scene.sink.state();
        assert_eq!(sink.records.len(), 1);
        let record = &sink.records[0];
        assert_eq!((record.x, record.y, record.z), (6.0, 0.0, 0.0));
        assert_eq!(record.vehicle_id, id);
        assert_eq!(record.sensor_id, "radar_1");
        assert_eq!(record.label, "safe");
        assert_eq!(record.timestamp, 10.0);
        assert_eq!(scene.state.first_detection_time, Some(10.0));
    }

    #[test]
    fn detection_outside_radius_is_dropped() {
        let mut scene = Scene::new(Point3::ORIGIN);
        scene.place(Point3::new(20.0, 0.0, 0.0));
        let report = scene.feed(vec![Detection::new(6.0, 0.0, 0.0, 0.0)], 1.0);

        assert_eq!(report.unmatched, 1);
        assert!(scene.sink.state().records.is_empty());
        assert_eq!(scene.state.detection_count, 0);
        assert_eq!(scene.state.first_detection_time, None);
    }

    #[test]
    fn first_registered_actor_wins_over_nearer_one() {
        let mut scene = Scene::new(Point3::ORIGIN);
        let farther = scene.place(Point3::new(10.0, 5.9, 0.0));
        let nearer = scene.place(Point3::new(10.0, -5.0, 0.0));
        scene.feed(vec![Detection::new(10.0, 0.0, 0.0, 0.0)], 1.0);

        let sink = scene.sink.state();
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.records[0].vehicle_id, farther);
        assert_ne!(sink.records[0].vehicle_id, nearer);
    }

    #[test]
    fn dead_actor_is_never_matched() {
        let mut scene = Scene::new(Point3::ORIGIN);
        let dead = scene.place(Point3::new(6.0, 0.0, 0.0));
        let alive = scene.place(Point3::new(8.0, 0.0, 0.0));
        scene.host.kill(dead);
        scene.feed(vec![Detection::new(6.0, 0.0, 0.0, 0.0)], 1.0);
        assert_eq!(scene.sink.state().records[0].vehicle_id, alive);
    }

    #[test]
    fn records_follow_delivery_order_and_skip_malformed() {
        let mut scene = Scene::new(Point3::new(84.0, 57.0, 3.0));
        scene.place(Point3::new(94.0, 57.0, 0.0));
        let report = scene.feed(
            vec![
                Detection::new(10.0, 0.0, 0.0, 1.0),
                Detection::new(f64::NAN, 0.0, 0.0, 2.0),
                Detection::new(11.0, 0.0, 0.0, 3.0),
                Detection::new(9.0, 0.0, 0.0, 4.0),
            ],
            1.0,
        );

        assert_eq!(report.matched, 3);
        assert_eq!(report.skipped, 1);
        let velocities: Vec<f64> = scene
            .sink
            .state()
            .records
            .iter()
            .map(|r| r.velocity)
            .collect();
        assert_eq!(velocities, vec![1.0, 3.0, 4.0]);
        assert_eq!(scene.metrics.snapshot().skipped_detections, 1);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut scene = Scene::new(Point3::ORIGIN);
        scene.place(Point3::new(6.0, 0.0, 0.0));
        assert_eq!(scene.feed(Vec::new(), 1.0), BatchReport::default());
        assert_eq!(scene.state.detection_count, 0);
    }

    #[test]
    fn sink_failure_skips_row_without_counting_it() {
        let mut scene = Scene::new(Point3::ORIGIN);
        scene.place(Point3::new(6.0, 0.0, 0.0));
        scene.sink.state().fail_appends = true;
        let report = scene.feed(vec![Detection::new(6.0, 0.0, 0.0, 0.0)], 1.0);
        assert_eq!(report.sink_errors, 1);
        assert_eq!(scene.state.detection_count, 0);
    }
}
