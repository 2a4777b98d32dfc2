//! Scripted host and in-memory sink shared by the unit tests.

use crate::host_interface::{
    ActorId, AutopilotParams, BatchListener, Blueprint, ConnectOptions, DetectionBatch,
    DetectionRecord, RadarSpec, SensorHandle, SimulationHost, TrafficSettings,
};
use crate::math::{Point3, Transform};
use crate::prelude::{HostError, HostResult, SinkError, SinkResult};
use crate::sink::RecordSink;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy)]
pub struct FakeActor {
    pub position: Point3,
    pub alive: bool,
}

#[derive(Default)]
pub struct FakeState {
    pub actors: BTreeMap<ActorId, FakeActor>,
    pub next_id: u64,
    pub spawn_attempts: usize,
    pub reject_spawns: usize,
    pub destroyed: Vec<ActorId>,
    pub failing_destroy: HashSet<ActorId>,
    pub failing_liveness: HashSet<ActorId>,
    pub autopilot: Vec<(ActorId, AutopilotParams)>,
    pub traffic: Option<TrafficSettings>,
    pub spectator: Option<Transform>,
    pub world: Option<String>,
    pub listener: Option<BatchListener>,
    pub sensors_spawned: usize,
    pub sensor_stops: usize,
    pub sensor_destroys: usize,
    pub fail_sensor: bool,
    pub fail_projection: bool,
    pub probes: usize,
    pub disconnect_after_probes: Option<usize>,
}

/// Host double whose state is shared between clones.
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn move_actor(&self, id: ActorId, position: Point3) {
        self.state().actors.get_mut(&id).unwrap().position = position;
    }

    pub fn kill(&self, id: ActorId) {
        self.state().actors.get_mut(&id).unwrap().alive = false;
    }

    pub fn alive_count(&self) -> usize {
        self.state().actors.values().filter(|a| a.alive).count()
    }

    /// Plays the host's delivery thread.
    pub fn deliver(&self, batch: DetectionBatch) {
        let mut state = self.state();
        if let Some(listener) = state.listener.as_mut() {
            listener(batch);
        }
    }
}

impl SimulationHost for FakeHost {
    fn connect(_options: &ConnectOptions) -> HostResult<Self> {
        Ok(Self::new())
    }

    fn check_connection(&self) -> HostResult<()> {
        let mut state = self.state();
        state.probes += 1;
        match state.disconnect_after_probes {
            Some(limit) if state.probes > limit => Err(HostError::Disconnected),
            _ => Ok(()),
        }
    }

    fn load_world(&mut self, name: &str) -> HostResult<()> {
        self.state().world = Some(name.to_string());
        Ok(())
    }

    fn set_spectator(&mut self, transform: &Transform) -> HostResult<()> {
        self.state().spectator = Some(*transform);
        Ok(())
    }

    fn spawn_points(&self) -> HostResult<Vec<Transform>> {
        Ok(vec![Transform::new(
            Point3::new(10.0, 0.0, 0.5),
            Default::default(),
        )])
    }

    fn project_to_road(&self, location: Point3) -> HostResult<Transform> {
        if self.state().fail_projection {
            return Err(HostError::InvalidPlacement("no road nearby".into()));
        }
        Ok(Transform::new(location, Default::default()))
    }

    fn blueprints(&self, pattern: &str) -> HostResult<Vec<Blueprint>> {
        Ok(["vehicle.audi.a2", "vehicle.tesla.model3", "sensor.other.radar"]
            .into_iter()
            .map(Blueprint::new)
            .filter(|bp| bp.matches(pattern))
            .collect())
    }

    fn try_spawn_actor(&mut self, _blueprint: &Blueprint, at: &Transform) -> HostResult<ActorId> {
        let mut state = self.state();
        state.spawn_attempts += 1;
        if state.reject_spawns > 0 {
            state.reject_spawns -= 1;
            return Err(HostError::SpawnCollision("spawn point occupied".into()));
        }
        state.next_id += 1;
        let id = ActorId(state.next_id);
        state.actors.insert(
            id,
            FakeActor {
                position: at.location,
                alive: true,
            },
        );
        Ok(id)
    }

    fn is_alive(&self, actor: ActorId) -> HostResult<bool> {
        let state = self.state();
        if state.failing_liveness.contains(&actor) {
            return Err(HostError::Rejected("liveness query timed out".into()));
        }
        Ok(state.actors.get(&actor).map(|a| a.alive).unwrap_or(false))
    }

    fn actor_location(&self, actor: ActorId) -> HostResult<Point3> {
        self.state()
            .actors
            .get(&actor)
            .filter(|a| a.alive)
            .map(|a| a.position)
            .ok_or(HostError::ActorGone(actor))
    }

    fn destroy_actor(&mut self, actor: ActorId) -> HostResult<()> {
        let mut state = self.state();
        if state.failing_destroy.contains(&actor) {
            return Err(HostError::Rejected("destroy refused".into()));
        }
        match state.actors.get_mut(&actor) {
            Some(a) if a.alive => {
                a.alive = false;
                state.destroyed.push(actor);
                Ok(())
            }
            _ => Err(HostError::ActorGone(actor)),
        }
    }

    fn configure_traffic(&mut self, settings: &TrafficSettings) -> HostResult<()> {
        self.state().traffic = Some(settings.clone());
        Ok(())
    }

    fn set_autopilot(&mut self, actor: ActorId, params: &AutopilotParams) -> HostResult<()> {
        self.state().autopilot.push((actor, params.clone()));
        Ok(())
    }

    fn spawn_radar(
        &mut self,
        _spec: &RadarSpec,
        _at: &Transform,
        listener: BatchListener,
    ) -> HostResult<SensorHandle> {
        let mut state = self.state();
        if state.fail_sensor {
            return Err(HostError::Sensor("radar blueprint unavailable".into()));
        }
        state.sensors_spawned += 1;
        state.listener = Some(listener);
        Ok(SensorHandle(state.sensors_spawned as u64))
    }

    fn stop_sensor(&mut self, _sensor: SensorHandle) -> HostResult<()> {
        let mut state = self.state();
        state.sensor_stops += 1;
        state.listener = None;
        Ok(())
    }

    fn destroy_sensor(&mut self, _sensor: SensorHandle) -> HostResult<()> {
        self.state().sensor_destroys += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryState {
    pub records: Vec<DetectionRecord>,
    pub flushes: usize,
    pub closes: usize,
    pub fail_appends: bool,
}

/// Sink double recording every call.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &DetectionRecord) -> SinkResult<()> {
        let mut state = self.state();
        if state.closes > 0 {
            return Err(SinkError::Closed);
        }
        if state.fail_appends {
            return Err(SinkError::Io(std::io::Error::other("disk full")));
        }
        state.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.state().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        let mut state = self.state();
        if state.closes == 0 {
            state.flushes += 1;
        }
        state.closes += 1;
        Ok(())
    }
}
