use crate::host_interface::{ActorId, Blueprint, SimulationHost};
use crate::math::{Point3, Transform};
use crate::prelude::{HostError, HostResult};
use crate::telemetry::log::LogManager;

/// Snapshot of an actor that passed the liveness gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveActor {
    pub id: ActorId,
    pub position: Point3,
}

#[derive(Debug, Clone)]
pub struct SpawnRequest<'a> {
    pub blueprint: &'a Blueprint,
    pub transform: Transform,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub removed: Vec<ActorId>,
    pub dropped_dead: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub destroyed: usize,
    pub already_gone: usize,
    pub failed: usize,
}

/// Bounded set of spawned vehicles, kept in spawn order.
///
/// Liveness is always checked with the host before an actor's geometry is
/// read; handles the host reports dead are never handed out.
pub struct ActorRegistry {
    actors: Vec<ActorId>,
    max_active: usize,
    logger: LogManager,
}

impl ActorRegistry {
    pub fn with_capacity(max_active: usize) -> Self {
        Self {
            actors: Vec::with_capacity(max_active),
            max_active,
            logger: LogManager::new("REGISTRY"),
        }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.actors.len() >= self.max_active
    }

    pub fn ids(&self) -> &[ActorId] {
        &self.actors
    }

    /// Spawns at the requested transform. Collisions and invalid placements
    /// yield `Ok(None)`; only fatal host errors are returned.
    pub fn spawn<H: SimulationHost + ?Sized>(
        &mut self,
        host: &mut H,
        request: &SpawnRequest<'_>,
    ) -> HostResult<Option<ActorId>> {
        if self.is_full() {
            return Ok(None);
        }
        match host.try_spawn_actor(request.blueprint, &request.transform) {
            Ok(id) => {
                self.actors.push(id);
                Ok(Some(id))
            }
            Err(err) if !err.is_fatal() => {
                self.logger
                    .detail(&format!("spawn of {} refused: {}", request.blueprint.id, err));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Drops the actor from the set and destroys it if the host still has it.
    pub fn retire<H: SimulationHost + ?Sized>(&mut self, host: &mut H, actor: ActorId) -> bool {
        let Some(index) = self.actors.iter().position(|&id| id == actor) else {
            return false;
        };
        self.actors.remove(index);
        destroy_if_alive(host, actor).unwrap_or(false)
    }

    pub fn all_alive<H: SimulationHost + ?Sized>(&self, host: &H) -> Vec<LiveActor> {
        self.actors
            .iter()
            .filter_map(|&id| match live_position(host, id) {
                Ok(position) => position.map(|position| LiveActor { id, position }),
                Err(err) => {
                    self.logger
                        .detail(&format!("liveness check for {} failed: {}", id, err));
                    None
                }
            })
            .collect()
    }

    /// `false` when any live actor lies strictly within `min_distance` of `point`.
    pub fn is_clear<H: SimulationHost + ?Sized>(
        &self,
        host: &H,
        point: &Point3,
        min_distance: f64,
    ) -> bool {
        self.all_alive(host)
            .iter()
            .all(|actor| actor.position.distance(point) >= min_distance)
    }

    /// Destroys every live actor farther than `threshold` from `center` and
    /// forgets actors the host already dropped.
    ///
    /// Actors whose state cannot be read stay registered so teardown still
    /// reaches them.
    pub fn retire_beyond<H: SimulationHost + ?Sized>(
        &mut self,
        host: &mut H,
        center: &Point3,
        threshold: f64,
    ) -> HostResult<CleanupReport> {
        let mut report = CleanupReport::default();
        let mut remaining = Vec::with_capacity(self.actors.len());

        for &id in &self.actors {
            let position = match live_position(host, id) {
                Ok(Some(position)) => position,
                Ok(None) => {
                    report.dropped_dead += 1;
                    continue;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.logger
                        .warn(&format!("could not inspect vehicle {}: {}", id, err));
                    report.errors += 1;
                    remaining.push(id);
                    continue;
                }
            };

            let distance = position.distance(center);
            if distance <= threshold {
                remaining.push(id);
                continue;
            }

            match host.destroy_actor(id) {
                Ok(()) | Err(HostError::ActorGone(_)) => {
                    self.logger.record(&format!(
                        "Removing vehicle {} (distance: {:.1}m)",
                        id, distance
                    ));
                    report.removed.push(id);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.logger
                        .warn(&format!("could not destroy vehicle {}: {}", id, err));
                    report.errors += 1;
                    remaining.push(id);
                }
            }
        }

        self.actors = remaining;
        Ok(report)
    }

    /// Destroys everything still alive. A failure on one actor never stops
    /// the rest.
    pub fn release_all<H: SimulationHost + ?Sized>(&mut self, host: &mut H) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        for id in self.actors.drain(..) {
            match destroy_if_alive(host, id) {
                Ok(true) => report.destroyed += 1,
                Ok(false) => report.already_gone += 1,
                Err(err) => {
                    self.logger
                        .warn(&format!("failed to destroy vehicle {}: {}", id, err));
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn live_position<H: SimulationHost + ?Sized>(host: &H, id: ActorId) -> HostResult<Option<Point3>> {
    if !host.is_alive(id)? {
        return Ok(None);
    }
    match host.actor_location(id) {
        Ok(position) => Ok(Some(position)),
        Err(HostError::ActorGone(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

fn destroy_if_alive<H: SimulationHost + ?Sized>(host: &mut H, id: ActorId) -> HostResult<bool> {
    if !host.is_alive(id)? {
        return Ok(false);
    }
    match host.destroy_actor(id) {
        Ok(()) => Ok(true),
        Err(HostError::ActorGone(_)) => Ok(false),
        Err(err) => Err(err),
    }
}
