// Commands: the only way outside code changes sim state.
//
// A `SimCommand` targets a tick and carries a `SimAction`. `SimContext::step`
// applies every command whose tick has been reached before updating bots on
// that tick. Commands naming a bot that does not exist are dropped.
//
// Actions:
// - `SpawnBot`: create a bot at a position, snapped to the ground below.
//   Bot ids are assigned in spawn order starting at 0.
// - `MoveTo`: plan a path to a goal and start following it.
// - `Jump`: jump in place if grounded.
// - `Stop`: drop the current path.
// - `SetTeam`: change the bot's team for pathing and ladder permissions.
//
// See also: `sim.rs` (`apply_command`), `event.rs`.

use crate::geometry::Vec3;
use crate::types::{BotId, Team};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimCommand {
    pub tick: u64,
    pub action: SimAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimAction {
    SpawnBot { position: Vec3, team: Team },
    MoveTo { bot: BotId, goal: Vec3 },
    Jump { bot: BotId },
    Stop { bot: BotId },
    SetTeam { bot: BotId, team: Team },
}

impl SimCommand {
    pub fn new(tick: u64, action: SimAction) -> Self {
        Self { tick, action }
    }
}
