use crate::config::{DrivingProfile, SessionConfig};
use crate::host_interface::{ActorId, AutopilotParams, Blueprint, SimulationHost};
use crate::math::{Point3, Transform};
use crate::population::registry::{ActorRegistry, CleanupReport, SpawnRequest};
use crate::prelude::HostResult;
use crate::session::state::RunState;
use crate::telemetry::{LogManager, MetricsRecorder};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Timing and distance bounds for the population.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSettings {
    pub spawn_interval: f64,
    pub max_active: usize,
    pub spawn_clearance: f64,
    pub cleanup_period: f64,
    pub cleanup_threshold: f64,
    pub sensor_location: Point3,
}

impl PopulationSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            spawn_interval: config.spawn_interval_seconds,
            max_active: config.max_active_actors,
            spawn_clearance: config.spawn_clearance,
            cleanup_period: config.cleanup_period_seconds,
            cleanup_threshold: config.cleanup_distance_threshold,
            sensor_location: config.sensor_location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnOutcome {
    #[default]
    NotDue,
    Full,
    Blocked,
    Failed,
    Spawned(ActorId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub spawn: SpawnOutcome,
    pub cleanup: Option<CleanupReport>,
}

/// Keeps a bounded, continuously replenished set of vehicles near the sensor.
///
/// At most one spawn is attempted per interval: the timer restarts after
/// every attempt, successful or not.
pub struct PopulationController {
    settings: PopulationSettings,
    profile: DrivingProfile,
    autopilot: AutopilotParams,
    spawn_point: Transform,
    blueprints: Vec<Blueprint>,
    rng: StdRng,
    last_spawn: f64,
    last_cleanup: f64,
    spawn_log: LogManager,
    cleanup_log: LogManager,
}

impl PopulationController {
    pub fn new(
        settings: PopulationSettings,
        profile: DrivingProfile,
        spawn_point: Transform,
        blueprints: Vec<Blueprint>,
        seed: Option<u64>,
        now: f64,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            settings,
            profile,
            autopilot: profile.autopilot(),
            spawn_point,
            blueprints,
            rng,
            last_spawn: now,
            last_cleanup: now,
            spawn_log: LogManager::new("SPAWN"),
            cleanup_log: LogManager::new("CLEANUP"),
        }
    }

    pub fn spawn_point(&self) -> &Transform {
        &self.spawn_point
    }

    pub fn step<H: SimulationHost + ?Sized>(
        &mut self,
        now: f64,
        registry: &mut ActorRegistry,
        host: &mut H,
        state: &mut RunState,
        metrics: &MetricsRecorder,
    ) -> HostResult<StepReport> {
        let spawn = self.maybe_spawn(now, registry, host, state, metrics)?;
        let cleanup = self.maybe_cleanup(now, registry, host, metrics)?;
        Ok(StepReport { spawn, cleanup })
    }

    fn maybe_spawn<H: SimulationHost + ?Sized>(
        &mut self,
        now: f64,
        registry: &mut ActorRegistry,
        host: &mut H,
        state: &mut RunState,
        metrics: &MetricsRecorder,
    ) -> HostResult<SpawnOutcome> {
        if now - self.last_spawn < self.settings.spawn_interval {
            return Ok(SpawnOutcome::NotDue);
        }
        if registry.len() >= self.settings.max_active {
            return Ok(SpawnOutcome::Full);
        }
        self.last_spawn = now;

        if !registry.is_clear(
            host,
            &self.spawn_point.location,
            self.settings.spawn_clearance,
        ) {
            metrics.record_spawn_blocked();
            self.spawn_log
                .detail("Spawn point blocked, waiting for next interval");
            return Ok(SpawnOutcome::Blocked);
        }

        let Some(blueprint) = self.blueprints.choose(&mut self.rng) else {
            metrics.record_spawn_failure();
            return Ok(SpawnOutcome::Failed);
        };
        let request = SpawnRequest {
            blueprint,
            transform: self.spawn_point,
        };
        let Some(id) = registry.spawn(host, &request)? else {
            metrics.record_spawn_failure();
            self.spawn_log.detail("Spawn failed, retrying next interval");
            return Ok(SpawnOutcome::Failed);
        };

        if let Err(err) = host.set_autopilot(id, &self.autopilot) {
            if err.is_fatal() {
                return Err(err);
            }
            metrics.record_actor_error();
            self.spawn_log
                .warn(&format!("autopilot setup failed for vehicle {}: {}", id, err));
        }
        state.record_spawn();
        self.spawn_log.record(&format!(
            "{} vehicle #{} (active: {}/{})",
            self.profile.tag(),
            state.spawned_count,
            registry.len(),
            self.settings.max_active
        ));
        Ok(SpawnOutcome::Spawned(id))
    }

    fn maybe_cleanup<H: SimulationHost + ?Sized>(
        &mut self,
        now: f64,
        registry: &mut ActorRegistry,
        host: &mut H,
        metrics: &MetricsRecorder,
    ) -> HostResult<Option<CleanupReport>> {
        if now - self.last_cleanup < self.settings.cleanup_period {
            return Ok(None);
        }
        self.last_cleanup = now;

        let report = registry.retire_beyond(
            host,
            &self.settings.sensor_location,
            self.settings.cleanup_threshold,
        )?;
        for _ in 0..report.errors {
            metrics.record_actor_error();
        }
        if !report.removed.is_empty() {
            self.cleanup_log.record(&format!(
                "Removed {} vehicles beyond {}m",
                report.removed.len(),
                self.settings.cleanup_threshold
            ));
        }
        Ok(Some(report))
    }
}
