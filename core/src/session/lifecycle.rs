use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::host_interface::{DetectionBatch, SensorHandle, SimulationHost};
use crate::math::{Rotation, Transform};
use crate::population::{ActorRegistry, PopulationController, PopulationSettings};
use crate::prelude::{SessionError, SessionResult};
use crate::processing::Correlator;
use crate::session::state::RunState;
use crate::session::termination::{RunController, StopReason, TerminationPolicy};
use crate::sink::RecordSink;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished,
}

/// Final counters reported once teardown has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub label: String,
    pub stop_reason: StopReason,
    pub detections: usize,
    pub spawned: usize,
    pub destroyed_at_teardown: usize,
    pub teardown_failures: usize,
    pub elapsed_seconds: f64,
    pub metrics: MetricsSnapshot,
}

/// One logging session: owns the host connection, the sink and every actor
/// spawned through it.
///
/// Host callbacks are funneled through a bounded queue and consumed on the
/// thread calling [`Session::tick`], so run state has a single writer.
/// Teardown happens exactly once, from [`Session::finish`] or from `Drop`,
/// whichever comes first.
pub struct Session<H: SimulationHost, S: RecordSink, C: Clock> {
    config: SessionConfig,
    host: H,
    sink: S,
    clock: C,
    registry: ActorRegistry,
    correlator: Correlator,
    controller: RunController,
    population: Option<PopulationController>,
    sensor: Option<SensorHandle>,
    batches: Option<mpsc::Receiver<DetectionBatch>>,
    state: RunState,
    metrics: MetricsRecorder,
    last_flush: f64,
    stop_reason: Option<StopReason>,
    summary: Option<SessionSummary>,
    setup_log: LogManager,
    cleanup_log: LogManager,
}

impl<H: SimulationHost, S: RecordSink, C: Clock> Session<H, S, C> {
    pub fn new(config: SessionConfig, host: H, sink: S, clock: C) -> SessionResult<Self> {
        config.validate()?;
        let now = clock.now();
        let policy = TerminationPolicy::new(config.termination, config.total_runtime_seconds);
        Ok(Self {
            registry: ActorRegistry::with_capacity(config.max_active_actors),
            correlator: Correlator::from_config(&config),
            controller: RunController::new(policy, config.progress_period_seconds),
            population: None,
            sensor: None,
            batches: None,
            state: RunState::new(now),
            metrics: MetricsRecorder::new(),
            last_flush: now,
            stop_reason: None,
            summary: None,
            setup_log: LogManager::new("SETUP"),
            cleanup_log: LogManager::new("CLEANUP"),
            config,
            host,
            sink,
            clock,
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn spawn_point(&self) -> Option<Transform> {
        self.population.as_ref().map(|p| *p.spawn_point())
    }

    /// World, spectator, radar, traffic manager, spawn point and catalog, in
    /// that order. Anything acquired before a failure is released at teardown.
    pub fn prepare(&mut self) -> SessionResult<()> {
        let sensor_transform = self.config.sensor_transform();

        self.host.load_world(&self.config.world)?;
        self.setup_log
            .record(&format!("World {} loaded", self.config.world));

        if let Err(err) = self.host.set_spectator(&sensor_transform) {
            if err.is_fatal() {
                return Err(err.into());
            }
            self.setup_log
                .warn(&format!("could not position spectator: {}", err));
        }

        let (tx, rx) = mpsc::channel(self.config.batch_queue_capacity);
        let listener = Box::new(move |batch: DetectionBatch| {
            // The receiver only disappears once teardown has begun.
            let _ = tx.blocking_send(batch);
        });
        self.batches = Some(rx);
        let sensor = self
            .host
            .spawn_radar(&self.config.radar, &sensor_transform, listener)?;
        self.sensor = Some(sensor);
        self.state.mark_radar_started(self.clock.now());
        self.setup_log.record("Radar sensor created and listening");

        if let Err(err) = self.host.configure_traffic(&self.config.traffic) {
            if err.is_fatal() {
                return Err(err.into());
            }
            self.setup_log
                .warn(&format!("traffic manager rejected settings: {}", err));
        }

        let spawn_location = match self.config.spawn_location {
            Some(location) => location,
            None => self
                .host
                .spawn_points()?
                .first()
                .map(|point| point.location)
                .ok_or_else(|| SessionError::Config("host reports no spawn points".into()))?,
        };
        let spawn_point = match self.host.project_to_road(spawn_location) {
            Ok(transform) => transform,
            Err(err) if !err.is_fatal() => {
                self.setup_log.warn(&format!(
                    "mapping spawn point to road failed ({}), using raw spawn location",
                    err
                ));
                Transform::new(spawn_location, Rotation::default())
            }
            Err(err) => return Err(err.into()),
        };

        let blueprints = self.host.blueprints(&self.config.vehicle_filter)?;
        if blueprints.is_empty() {
            return Err(SessionError::Config(format!(
                "no blueprints match {}",
                self.config.vehicle_filter
            )));
        }

        let now = self.clock.now();
        self.population = Some(PopulationController::new(
            PopulationSettings::from_config(&self.config),
            self.config.profile,
            spawn_point,
            blueprints,
            self.config.seed,
            now,
        ));
        self.last_flush = now;
        self.setup_log.record(&format!(
            "Session {} ready, spawning at ({:.2}, {:.2})",
            self.config.label, spawn_point.location.x, spawn_point.location.y
        ));
        Ok(())
    }

    /// One pass of the main loop: correlate queued batches, check
    /// termination, maintain the population, flush on cadence.
    pub fn tick(&mut self) -> SessionResult<TickOutcome> {
        if self.summary.is_some() || self.population.is_none() {
            return Err(SessionError::NotPrepared);
        }
        self.host.check_connection()?;
        self.drain_batches();

        let now = self.clock.now();
        let verdict = self.controller.evaluate(
            now,
            &self.state,
            self.registry.len(),
            self.config.max_active_actors,
        );
        if let Some(progress) = verdict.progress {
            LogManager::new("PROGRESS").record(&progress.to_string());
        }
        if verdict.stop {
            self.stop_reason.get_or_insert(StopReason::RuntimeElapsed);
            LogManager::new("INFO").record(&format!(
                "Data collection complete: {} detections in {}s",
                self.state.detection_count, self.config.total_runtime_seconds
            ));
            return Ok(TickOutcome::Finished);
        }

        if let Some(population) = self.population.as_mut() {
            population.step(
                now,
                &mut self.registry,
                &mut self.host,
                &mut self.state,
                &self.metrics,
            )?;
        }

        if now - self.last_flush >= self.config.flush_period_seconds {
            if let Err(err) = self.sink.flush() {
                self.metrics.record_sink_error();
                self.cleanup_log
                    .warn(&format!("periodic flush failed: {}", err));
            }
            self.last_flush = now;
        }
        Ok(TickOutcome::Continue)
    }

    pub fn interrupt(&mut self) {
        LogManager::new("INTERRUPTED").warn("Data collection interrupted by operator");
        self.stop_reason.get_or_insert(StopReason::Interrupted);
    }

    pub fn fail(&mut self, err: &SessionError) {
        LogManager::new("ERROR").error(&format!("Fatal error: {}", err));
        self.stop_reason
            .get_or_insert_with(|| StopReason::Fatal(err.to_string()));
    }

    /// Tears the session down and reports the final counters.
    pub fn finish(mut self) -> SessionSummary {
        self.teardown()
    }

    fn drain_batches(&mut self) -> usize {
        let Some(rx) = self.batches.as_mut() else {
            return 0;
        };
        let mut drained = 0;
        while let Ok(batch) = rx.try_recv() {
            self.correlator.on_detection_batch(
                &batch,
                &self.registry,
                &self.host,
                &mut self.sink,
                &mut self.state,
                self.clock.now(),
                &self.metrics,
            );
            drained += 1;
        }
        drained
    }

    fn teardown(&mut self) -> SessionSummary {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }
        self.cleanup_log.record("=== Cleaning up resources ===");
        let mut failures = 0;

        // Drain before stopping so a host blocked on a full queue can exit.
        self.drain_batches();
        if let Some(sensor) = self.sensor.take() {
            if let Err(err) = self.host.stop_sensor(sensor) {
                failures += 1;
                self.cleanup_log
                    .warn(&format!("error stopping radar sensor: {}", err));
            }
            if let Err(err) = self.host.destroy_sensor(sensor) {
                failures += 1;
                self.cleanup_log
                    .warn(&format!("error destroying radar sensor: {}", err));
            } else {
                self.cleanup_log.record("Radar sensor destroyed");
            }
        }

        let late = self.drain_batches();
        if late > 0 {
            self.cleanup_log
                .detail(&format!("correlated {} batches queued before stop", late));
        }
        self.batches = None;

        let released = self.registry.release_all(&mut self.host);
        failures += released.failed;
        self.cleanup_log.record(&format!(
            "Destroyed {} active vehicles ({} already gone, {} failed)",
            released.destroyed, released.already_gone, released.failed
        ));

        match self.sink.close() {
            Ok(()) => self.cleanup_log.record("Output file closed"),
            Err(err) => {
                failures += 1;
                self.metrics.record_sink_error();
                self.cleanup_log
                    .error(&format!("error closing output: {}", err));
            }
        }

        let summary = SessionSummary {
            label: self.config.label.clone(),
            stop_reason: self
                .stop_reason
                .clone()
                .unwrap_or_else(|| StopReason::Fatal("session ended before completion".into())),
            detections: self.state.detection_count,
            spawned: self.state.spawned_count,
            destroyed_at_teardown: released.destroyed,
            teardown_failures: failures,
            elapsed_seconds: self.clock.now() - self.state.session_start_time,
            metrics: self.metrics.snapshot(),
        };
        LogManager::new("DONE").record(&format!(
            "{} session stopped ({}): {} detections, {} vehicles spawned",
            summary.label, summary.stop_reason, summary.detections, summary.spawned
        ));
        self.summary = Some(summary.clone());
        summary
    }
}

impl<H: SimulationHost, S: RecordSink, C: Clock> Drop for Session<H, S, C> {
    fn drop(&mut self) {
        if self.summary.is_none() {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::TerminationStrategy;
    use crate::host_interface::Detection;
    use crate::math::Point3;
    use crate::testing::{FakeHost, MemorySink};
    use std::panic::{self, AssertUnwindSafe};

    fn config() -> SessionConfig {
        SessionConfig {
            sensor_location: Point3::ORIGIN,
            spawn_location: Some(Point3::new(6.0, 0.0, 0.0)),
            spawn_interval_seconds: 1.0,
            total_runtime_seconds: 20.0,
            termination: TerminationStrategy::SinceFirstDetection,
            seed: Some(1),
            ..SessionConfig::safe()
        }
    }

    type TestSession = Session<FakeHost, MemorySink, ManualClock>;

    fn prepared(config: SessionConfig) -> (TestSession, FakeHost, MemorySink, ManualClock) {
        let host = FakeHost::new();
        let sink = MemorySink::new();
        let clock = ManualClock::starting_at(1_000.0);
        let mut session = Session::new(config, host.clone(), sink.clone(), clock.clone()).unwrap();
        session.prepare().unwrap();
        (session, host, sink, clock)
    }

    /// Moves every vehicle 30 m down the road so the spawn point frees up.
    fn drive_off(host: &FakeHost) {
        let ids: Vec<_> = host.state().actors.keys().copied().collect();
        for (index, id) in ids.into_iter().enumerate() {
            host.move_actor(id, Point3::new(-30.0 - index as f64, 0.0, 0.0));
        }
    }

    #[test]
    fn detection_on_spawned_vehicle_is_persisted_and_runtime_ends_session() {
        let (mut session, host, sink, clock) = prepared(config());

        clock.advance(1.0);
        assert_eq!(session.tick().unwrap(), TickOutcome::Continue);
        assert_eq!(session.state().spawned_count, 1);

        host.deliver(DetectionBatch::new(1, vec![Detection::new(6.0, 0.0, 0.0, -1.5)]));
        clock.advance(0.1);
        session.tick().unwrap();
        assert_eq!(session.state().detection_count, 1);
        let first = session.state().first_detection_time.unwrap();
        {
            let guard = sink.state();
            let records = &guard.records;
            assert_eq!((records[0].x, records[0].y, records[0].z), (6.0, 0.0, 0.0));
            assert_eq!(records[0].label, "safe");
        }

        let mut finished_at = None;
        for _ in 0..400 {
            clock.advance(0.1);
            if session.tick().unwrap() == TickOutcome::Finished {
                finished_at = Some(clock.now());
                break;
            }
        }
        let finished_at = finished_at.unwrap();
        assert!(finished_at - first >= 20.0);
        assert!(finished_at - first < 20.2);

        let summary = session.finish();
        assert_eq!(summary.stop_reason, StopReason::RuntimeElapsed);
        assert_eq!(summary.detections, 1);
        assert_eq!(host.alive_count(), 0);
        assert_eq!(sink.state().closes, 1);
        assert_eq!(host.state().sensor_stops, 1);
        assert_eq!(host.state().sensor_destroys, 1);
    }

    #[test]
    fn fault_after_three_ticks_still_tears_everything_down() {
        let (mut session, host, sink, clock) = prepared(config());
        host.state().disconnect_after_probes = Some(3);

        let mut ticks = 0;
        let err = loop {
            clock.advance(1.0);
            match session.tick() {
                Ok(_) => {
                    ticks += 1;
                    drive_off(&host);
                }
                Err(err) => break err,
            }
        };
        assert_eq!(ticks, 3);
        assert_eq!(host.alive_count(), 3);
        assert!(matches!(err, SessionError::Host(_)));

        session.fail(&err);
        let summary = session.finish();
        assert!(matches!(summary.stop_reason, StopReason::Fatal(_)));
        assert_eq!(summary.destroyed_at_teardown, 3);
        assert_eq!(host.alive_count(), 0);
        assert_eq!(sink.state().closes, 1);
        assert_eq!(host.state().sensor_destroys, 1);
    }

    #[test]
    fn panic_mid_loop_runs_teardown_once_via_drop() {
        let host = FakeHost::new();
        let sink = MemorySink::new();
        let clock = ManualClock::starting_at(0.0);
        let (h, s, c) = (host.clone(), sink.clone(), clock.clone());

        let result = panic::catch_unwind(AssertUnwindSafe(move || {
            let mut session = Session::new(config(), h, s, c.clone()).unwrap();
            session.prepare().unwrap();
            for _ in 0..3 {
                c.advance(1.0);
                session.tick().unwrap();
            }
            panic!("injected fault");
        }));

        assert!(result.is_err());
        assert_eq!(host.alive_count(), 0);
        assert_eq!(sink.state().closes, 1);
        assert_eq!(host.state().sensor_stops, 1);
    }

    #[test]
    fn finish_then_drop_closes_sink_once() {
        let (session, _host, sink, _clock) = prepared(config());
        let summary = session.finish();
        assert_eq!(sink.state().closes, 1);
        assert_eq!(summary.detections, 0);
    }

    #[test]
    fn sensor_failure_during_prepare_is_fatal_but_cleanup_tolerates_it() {
        let host = FakeHost::new();
        host.state().fail_sensor = true;
        let sink = MemorySink::new();
        let mut session =
            Session::new(config(), host.clone(), sink.clone(), ManualClock::default()).unwrap();

        let err = session.prepare().unwrap_err();
        assert!(matches!(err, SessionError::Host(ref e) if e.is_fatal()));
        assert!(matches!(session.tick(), Err(SessionError::NotPrepared)));
        session.fail(&err);

        let summary = session.finish();
        assert_eq!(summary.teardown_failures, 0);
        assert_eq!(host.state().sensor_stops, 0);
        assert_eq!(sink.state().closes, 1);
    }

    #[test]
    fn batches_queued_before_stop_are_not_lost() {
        let (mut session, host, sink, clock) = prepared(config());
        clock.advance(1.0);
        session.tick().unwrap();
        host.deliver(DetectionBatch::new(7, vec![Detection::new(6.0, 0.0, 0.0, 0.0)]));
        session.interrupt();

        let summary = session.finish();
        assert_eq!(summary.stop_reason, StopReason::Interrupted);
        assert_eq!(summary.detections, 1);
        assert_eq!(sink.state().records.len(), 1);
    }

    #[test]
    fn sink_is_flushed_every_five_seconds() {
        let (mut session, _host, sink, clock) = prepared(config());
        for _ in 0..12 {
            clock.advance(1.0);
            session.tick().unwrap();
        }
        assert_eq!(sink.state().flushes, 2);
        session.finish();
        assert_eq!(sink.state().flushes, 3);
    }

    #[test]
    fn missing_spawn_location_uses_host_spawn_point() {
        let (session, _host, _sink, _clock) = prepared(SessionConfig {
            spawn_location: None,
            ..config()
        });
        assert_eq!(
            session.spawn_point().unwrap().location,
            Point3::new(10.0, 0.0, 0.5)
        );
    }

    #[test]
    fn failed_road_projection_falls_back_to_raw_location() {
        let host = FakeHost::new();
        host.state().fail_projection = true;
        let mut session =
            Session::new(config(), host, MemorySink::new(), ManualClock::default()).unwrap();
        session.prepare().unwrap();
        assert_eq!(
            session.spawn_point().unwrap().location,
            Point3::new(6.0, 0.0, 0.0)
        );
    }

    #[test]
    fn radar_start_strategy_stops_without_detections() {
        let (mut session, _host, _sink, clock) = prepared(SessionConfig {
            termination: TerminationStrategy::SinceRadarStart,
            total_runtime_seconds: 3.0,
            ..config()
        });
        clock.advance(2.5);
        assert_eq!(session.tick().unwrap(), TickOutcome::Continue);
        clock.advance(0.5);
        assert_eq!(session.tick().unwrap(), TickOutcome::Finished);
        assert_eq!(session.state().detection_count, 0);
    }
}
