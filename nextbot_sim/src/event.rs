// Events the sim reports to its caller.
//
// Each bot's actor records `ActorEvent`s while it is updated; after the
// update the sim drains them and wraps each in a `SimEvent` stamped with the
// tick and the bot. Path computation outcomes and spawns are reported the
// same way. The stream is ordered by tick, then by bot update order within a
// tick.
//
// See also: `actor.rs` (`ActorEvent`), `sim.rs` (`StepResult`).

use crate::actor::{ActorEvent, MoveToFailure};
use crate::geometry::Vec3;
use crate::path::ComputeResult;
use crate::types::{BotId, EntityHandle};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    BotSpawned {
        bot: BotId,
        position: Vec3,
    },
    PathComputed {
        bot: BotId,
        result: ComputeResult,
        length: f32,
    },
    MoveToSuccess {
        bot: BotId,
    },
    MoveToFailure {
        bot: BotId,
        reason: MoveToFailure,
    },
    LandedOnGround {
        bot: BotId,
        entity: Option<EntityHandle>,
    },
    LeftGround {
        bot: BotId,
        entity: Option<EntityHandle>,
    },
    Contact {
        bot: BotId,
        entity: Option<EntityHandle>,
        normal: Vec3,
    },
    Stuck {
        bot: BotId,
    },
    UnStuck {
        bot: BotId,
    },
}

impl SimEventKind {
    pub fn from_actor_event(bot: BotId, event: ActorEvent) -> Self {
        match event {
            ActorEvent::Contact { entity, normal } => SimEventKind::Contact { bot, entity, normal },
            ActorEvent::LeaveGround { entity } => SimEventKind::LeftGround { bot, entity },
            ActorEvent::LandOnGround { entity } => SimEventKind::LandedOnGround { bot, entity },
            ActorEvent::Stuck => SimEventKind::Stuck { bot },
            ActorEvent::UnStuck => SimEventKind::UnStuck { bot },
            ActorEvent::MoveToSuccess => SimEventKind::MoveToSuccess { bot },
            ActorEvent::MoveToFailure(reason) => SimEventKind::MoveToFailure { bot, reason },
        }
    }

    /// The bot this event concerns.
    pub fn bot(&self) -> BotId {
        match *self {
            SimEventKind::BotSpawned { bot, .. }
            | SimEventKind::PathComputed { bot, .. }
            | SimEventKind::MoveToSuccess { bot }
            | SimEventKind::MoveToFailure { bot, .. }
            | SimEventKind::LandedOnGround { bot, .. }
            | SimEventKind::LeftGround { bot, .. }
            | SimEventKind::Contact { bot, .. }
            | SimEventKind::Stuck { bot }
            | SimEventKind::UnStuck { bot } => bot,
        }
    }
}
