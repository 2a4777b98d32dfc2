use crate::generator::catalog::{self, KNOWN_WORLDS};
use radarcore::host_interface::{
    ActorId, AutopilotParams, BatchListener, Blueprint, ConnectOptions, Detection,
    DetectionBatch, RadarSpec, SensorHandle, SimulationHost, TrafficSettings,
};
use radarcore::math::{Point3, Rotation, Transform};
use radarcore::prelude::{HostError, HostResult};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Behavior of the in-process stand-in for the simulation host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    /// Autopilot cruise speed in m/s before profile adjustments.
    pub cruise_speed: f64,
    /// Direction of travel on the road, degrees.
    pub road_heading: f64,
    pub road_height: f64,
    pub collision_radius: f64,
    pub radar_rate_hz: f64,
    pub returns_per_vehicle: usize,
    /// Half-size of the box radar returns are scattered over, metres.
    pub vehicle_half_extent: f64,
    pub seed: u64,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            cruise_speed: 8.0,
            road_heading: 180.0,
            road_height: 0.3,
            collision_radius: 4.0,
            radar_rate_hz: 20.0,
            returns_per_vehicle: 3,
            vehicle_half_extent: 1.5,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct SimVehicle {
    position: Point3,
    velocity: Point3,
    heading: f64,
    alive: bool,
}

struct WorldState {
    map: Option<String>,
    vehicles: BTreeMap<ActorId, SimVehicle>,
    next_actor: u64,
    last_step: Instant,
    connected: bool,
}

impl WorldState {
    /// Moves every live vehicle by its velocity over the wall time since the
    /// previous step.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_step).as_secs_f64();
        self.last_step = now;
        for vehicle in self.vehicles.values_mut().filter(|v| v.alive) {
            vehicle.position.x += vehicle.velocity.x * dt;
            vehicle.position.y += vehicle.velocity.y * dt;
        }
    }

    fn vehicle(&self, actor: ActorId) -> HostResult<&SimVehicle> {
        self.vehicles
            .get(&actor)
            .filter(|v| v.alive)
            .ok_or(HostError::ActorGone(actor))
    }
}

struct RadarRig {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RadarRig {
    fn halt(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Kinematic stand-in for the simulator: vehicles drive along the road once
/// their autopilot is engaged and radars report them from a background thread.
pub struct SyntheticWorld {
    settings: SyntheticSettings,
    state: Arc<Mutex<WorldState>>,
    radars: HashMap<u64, RadarRig>,
    next_sensor: u64,
}

impl SyntheticWorld {
    pub fn connect_with(options: &ConnectOptions, settings: SyntheticSettings) -> HostResult<Self> {
        if options.host.trim().is_empty() || options.port == 0 {
            return Err(HostError::Connection(format!(
                "invalid endpoint {}:{}",
                options.host, options.port
            )));
        }
        if options.timeout.is_zero() {
            return Err(HostError::Connection("timeout must be non-zero".into()));
        }
        Ok(Self {
            settings,
            state: Arc::new(Mutex::new(WorldState {
                map: None,
                vehicles: BTreeMap::new(),
                next_actor: 0,
                last_step: Instant::now(),
                connected: true,
            })),
            radars: HashMap::new(),
            next_sensor: 0,
        })
    }

    /// Simulates the server going away.
    #[cfg(test)]
    pub fn disconnect(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.connected = false;
        }
    }

    fn lock(&self) -> HostResult<MutexGuard<'_, WorldState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| HostError::Connection("world state poisoned".into()))?;
        if !state.connected {
            return Err(HostError::Disconnected);
        }
        Ok(state)
    }

    fn require_world(state: &WorldState) -> HostResult<()> {
        if state.map.is_none() {
            return Err(HostError::Rejected("no world loaded".into()));
        }
        Ok(())
    }
}

impl SimulationHost for SyntheticWorld {
    fn connect(options: &ConnectOptions) -> HostResult<Self> {
        Self::connect_with(options, SyntheticSettings::default())
    }

    fn check_connection(&self) -> HostResult<()> {
        self.lock().map(|_| ())
    }

    fn load_world(&mut self, name: &str) -> HostResult<()> {
        if !KNOWN_WORLDS.contains(&name) {
            return Err(HostError::WorldLoad(format!("unknown map {}", name)));
        }
        let mut state = self.lock()?;
        state.map = Some(name.to_string());
        state.vehicles.clear();
        state.last_step = Instant::now();
        Ok(())
    }

    fn set_spectator(&mut self, transform: &Transform) -> HostResult<()> {
        self.check_connection()?;
        if !transform.location.is_finite() {
            return Err(HostError::InvalidPlacement("spectator location".into()));
        }
        Ok(())
    }

    fn spawn_points(&self) -> HostResult<Vec<Transform>> {
        let state = self.lock()?;
        Self::require_world(&state)?;
        let rotation = Rotation::from_yaw(self.settings.road_heading);
        Ok([148.38, 175.0, 210.0]
            .into_iter()
            .map(|x| Transform::new(Point3::new(x, 57.09, self.settings.road_height), rotation))
            .collect())
    }

    fn project_to_road(&self, location: Point3) -> HostResult<Transform> {
        let state = self.lock()?;
        Self::require_world(&state)?;
        if !location.is_finite() {
            return Err(HostError::InvalidPlacement("location is not finite".into()));
        }
        Ok(Transform::new(
            Point3::new(location.x, location.y, self.settings.road_height),
            Rotation::from_yaw(self.settings.road_heading),
        ))
    }

    fn blueprints(&self, pattern: &str) -> HostResult<Vec<Blueprint>> {
        self.check_connection()?;
        Ok(catalog::filter(pattern))
    }

    fn try_spawn_actor(&mut self, blueprint: &Blueprint, at: &Transform) -> HostResult<ActorId> {
        let mut state = self.lock()?;
        Self::require_world(&state)?;
        if !blueprint.matches("vehicle.*") {
            return Err(HostError::InvalidPlacement(format!(
                "{} is not a vehicle",
                blueprint.id
            )));
        }
        state.advance();
        let radius = self.settings.collision_radius;
        if state
            .vehicles
            .values()
            .any(|v| v.alive && v.position.distance(&at.location) < radius)
        {
            return Err(HostError::SpawnCollision(format!(
                "another vehicle within {}m",
                radius
            )));
        }
        state.next_actor += 1;
        let id = ActorId(state.next_actor);
        state.vehicles.insert(
            id,
            SimVehicle {
                position: at.location,
                velocity: Point3::ORIGIN,
                heading: at.rotation.yaw.to_radians(),
                alive: true,
            },
        );
        Ok(id)
    }

    fn is_alive(&self, actor: ActorId) -> HostResult<bool> {
        let state = self.lock()?;
        Ok(state.vehicles.get(&actor).is_some_and(|v| v.alive))
    }

    fn actor_location(&self, actor: ActorId) -> HostResult<Point3> {
        let mut state = self.lock()?;
        state.advance();
        state.vehicle(actor).map(|v| v.position)
    }

    fn destroy_actor(&mut self, actor: ActorId) -> HostResult<()> {
        let mut state = self.lock()?;
        match state.vehicles.get_mut(&actor) {
            Some(vehicle) if vehicle.alive => {
                vehicle.alive = false;
                Ok(())
            }
            _ => Err(HostError::ActorGone(actor)),
        }
    }

    fn configure_traffic(&mut self, settings: &TrafficSettings) -> HostResult<()> {
        self.check_connection()?;
        if settings.synchronous_mode {
            return Err(HostError::Rejected(
                "synchronous mode is not supported".into(),
            ));
        }
        if settings.global_distance_to_leading_vehicle < 0.0 {
            return Err(HostError::Rejected("negative leading distance".into()));
        }
        Ok(())
    }

    fn set_autopilot(&mut self, actor: ActorId, params: &AutopilotParams) -> HostResult<()> {
        let mut state = self.lock()?;
        state.advance();
        let factor = 1.0 - params.speed_difference_percentage.unwrap_or(0.0) / 100.0;
        let speed = self.settings.cruise_speed * factor.max(0.0);
        let vehicle = state
            .vehicles
            .get_mut(&actor)
            .filter(|v| v.alive)
            .ok_or(HostError::ActorGone(actor))?;
        vehicle.velocity = Point3::new(
            speed * vehicle.heading.cos(),
            speed * vehicle.heading.sin(),
            0.0,
        );
        Ok(())
    }

    fn spawn_radar(
        &mut self,
        spec: &RadarSpec,
        at: &Transform,
        mut listener: BatchListener,
    ) -> HostResult<SensorHandle> {
        {
            let state = self.lock()?;
            Self::require_world(&state).map_err(|err| HostError::Sensor(err.to_string()))?;
        }
        if !(spec.range > 0.0 && self.settings.radar_rate_hz > 0.0) {
            return Err(HostError::Sensor(format!(
                "invalid radar attributes {:?}",
                spec.attributes()
            )));
        }

        self.next_sensor += 1;
        let handle = SensorHandle(self.next_sensor);
        let stop = Arc::new(AtomicBool::new(false));
        let scanner = RadarScanner {
            spec: spec.clone(),
            mount: *at,
            settings: self.settings.clone(),
            rng: StdRng::seed_from_u64(self.settings.seed ^ handle.0),
        };
        let state = Arc::clone(&self.state);
        let stop_flag = Arc::clone(&stop);
        let period = Duration::from_secs_f64(1.0 / self.settings.radar_rate_hz);

        let thread = thread::Builder::new()
            .name(format!("radar-{}", handle.0))
            .spawn(move || {
                let mut scanner = scanner;
                let mut frame = 0u64;
                while !stop_flag.load(Ordering::SeqCst) {
                    thread::sleep(period);
                    let detections = match state.lock() {
                        Ok(mut world) if world.connected => {
                            world.advance();
                            scanner.scan(&world)
                        }
                        _ => break,
                    };
                    frame += 1;
                    listener(DetectionBatch::new(frame, detections));
                }
            })
            .map_err(|err| HostError::Sensor(err.to_string()))?;

        self.radars.insert(
            handle.0,
            RadarRig {
                stop,
                thread: Some(thread),
            },
        );
        Ok(handle)
    }

    fn stop_sensor(&mut self, sensor: SensorHandle) -> HostResult<()> {
        let rig = self
            .radars
            .get_mut(&sensor.0)
            .ok_or_else(|| HostError::Sensor(format!("unknown sensor {}", sensor.0)))?;
        rig.halt();
        Ok(())
    }

    fn destroy_sensor(&mut self, sensor: SensorHandle) -> HostResult<()> {
        let mut rig = self
            .radars
            .remove(&sensor.0)
            .ok_or_else(|| HostError::Sensor(format!("unknown sensor {}", sensor.0)))?;
        rig.halt();
        Ok(())
    }
}

impl Drop for SyntheticWorld {
    fn drop(&mut self) {
        for rig in self.radars.values_mut() {
            rig.halt();
        }
    }
}

/// Turns vehicle positions into polar radar returns.
struct RadarScanner {
    spec: RadarSpec,
    mount: Transform,
    settings: SyntheticSettings,
    rng: StdRng,
}

impl RadarScanner {
    fn scan(&mut self, world: &WorldState) -> Vec<Detection> {
        let yaw = self.mount.rotation.yaw.to_radians();
        let half_h = self.spec.horizontal_fov.to_radians() / 2.0;
        let half_v = self.spec.vertical_fov.to_radians() / 2.0;
        let extent = self.settings.vehicle_half_extent;
        let mut detections = Vec::new();

        for vehicle in world.vehicles.values().filter(|v| v.alive) {
            for _ in 0..self.settings.returns_per_vehicle {
                let jitter = if extent > 0.0 {
                    Point3::new(
                        self.rng.gen_range(-extent..extent),
                        self.rng.gen_range(-extent..extent),
                        0.0,
                    )
                } else {
                    Point3::ORIGIN
                };
                let rel = vehicle.position + jitter - self.mount.location;
                let local_x = rel.x * yaw.cos() + rel.y * yaw.sin();
                let local_y = -rel.x * yaw.sin() + rel.y * yaw.cos();
                let depth = local_x.hypot(local_y);
                if depth == 0.0 || depth > self.spec.range {
                    continue;
                }
                let azimuth = local_y.atan2(local_x);
                let altitude = rel.z.atan2(depth);
                if azimuth.abs() > half_h || altitude.abs() > half_v {
                    continue;
                }
                let radial = (vehicle.velocity.x * rel.x + vehicle.velocity.y * rel.y) / depth;
                detections.push(Detection::new(depth, azimuth, altitude, radial));
            }
        }
        detections
    }
}
