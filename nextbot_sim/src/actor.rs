// Actor facade: the bot entity as seen by locomotion and path following.
//
// Locomotion reads and writes the actor's position, velocity and ground
// entity, and reports physical happenings (contact, leaving and landing on
// the ground, becoming stuck) through `on_event`. The path follower reports
// arrival and failure through `on_move_to_success` / `on_move_to_failure`.
// The success callback receives the path so a behavior can queue a new
// route in place; the follower only invalidates the path afterward if it
// was not just rebuilt.
//
// `ActorState` is the concrete actor used by the sim. It records every event
// in order so the sim can drain them into `SimEvent`s after each bot update.
//
// See also: `locomotion.rs`, `path_follower.rs`, `sim.rs`.

use crate::geometry::Vec3;
use crate::path::Path;
use crate::types::{EntityHandle, Team};
use serde::{Deserialize, Serialize};

/// Why a move-to request ended without arriving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveToFailure {
    NoPathExists,
    Stuck,
    FellOff,
}

/// Physical and navigational events delivered to an actor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActorEvent {
    Contact {
        entity: Option<EntityHandle>,
        normal: Vec3,
    },
    LeaveGround {
        entity: Option<EntityHandle>,
    },
    LandOnGround {
        entity: Option<EntityHandle>,
    },
    Stuck,
    UnStuck,
    MoveToSuccess,
    MoveToFailure(MoveToFailure),
}

pub trait Actor {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, pos: Vec3);
    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);
    fn ground_entity(&self) -> Option<EntityHandle>;
    fn set_ground_entity(&mut self, entity: Option<EntityHandle>);
    fn team(&self) -> Team;

    fn on_event(&mut self, event: ActorEvent);

    /// Called when the follower reaches the end of `path`. The actor may
    /// rebuild `path` here to chain another move.
    fn on_move_to_success(&mut self, _path: &mut Path, _now: f32) {
        self.on_event(ActorEvent::MoveToSuccess);
    }

    fn on_move_to_failure(&mut self, _path: &mut Path, reason: MoveToFailure) {
        self.on_event(ActorEvent::MoveToFailure(reason));
    }

    /// Veto hook for a resolved move. Positions refused here are not applied.
    fn is_position_allowed(&self, _pos: Vec3) -> bool {
        true
    }
}

/// Concrete actor that records its events.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActorState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub ground_entity: Option<EntityHandle>,
    pub team: Team,
    pub events: Vec<ActorEvent>,
}

impl ActorState {
    pub fn new(position: Vec3, team: Team) -> Self {
        Self {
            position,
            team,
            ..Self::default()
        }
    }

    /// Take all events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<ActorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_on_ground(&self) -> bool {
        self.ground_entity.is_some()
    }
}

impl Actor for ActorState {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, pos: Vec3) {
        self.position = pos;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn ground_entity(&self) -> Option<EntityHandle> {
        self.ground_entity
    }

    fn set_ground_entity(&mut self, entity: Option<EntityHandle>) {
        self.ground_entity = entity;
    }

    fn team(&self) -> Team {
        self.team
    }

    fn on_event(&mut self, event: ActorEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_drain_in_order() {
        let mut actor = ActorState::new(Vec3::ZERO, Team::Id(0));
        actor.on_event(ActorEvent::Stuck);
        actor.on_event(ActorEvent::UnStuck);
        assert_eq!(actor.drain_events(), vec![ActorEvent::Stuck, ActorEvent::UnStuck]);
        assert!(actor.events.is_empty());
    }

    #[test]
    fn default_success_callback_records_event() {
        let mut actor = ActorState::default();
        let mut path = Path::new();
        actor.on_move_to_success(&mut path, 0.0);
        actor.on_move_to_failure(&mut path, MoveToFailure::Stuck);
        assert_eq!(
            actor.events,
            vec![
                ActorEvent::MoveToSuccess,
                ActorEvent::MoveToFailure(MoveToFailure::Stuck)
            ]
        );
    }
}
