// Core identifier types shared across the simulation.
//
// Areas and ladders live in generation-checked arenas owned by `NavMesh`
// (see `nav_mesh.rs`). Their ids pair a slot index with the slot's
// generation at insertion time, so an id that outlives its area resolves to
// "not found" instead of aliasing whatever reuses the slot.
//
// Bots and world entities use plain sequential integers: bots are owned by
// `SimContext` in a `BTreeMap`, world entities by whatever `CollisionWorld`
// implementation the sim is running against.
//
// See also: `nav_mesh.rs` for the arenas, `sim.rs` for bot ownership,
// `trace.rs` for entity handles returned from hull traces.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Arena ids
// ---------------------------------------------------------------------------

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            pub index: u32,
            pub generation: u32,
        }

        impl $name {
            pub const fn new(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            /// Slot index as a `usize`, for indexing arena storage and
            /// per-search scratch arrays.
            pub fn slot(self) -> usize {
                self.index as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}v{})", stringify!($name), self.index, self.generation)
            }
        }
    };
}

arena_id!(/// Handle to a `NavArea` in the mesh arena.
AreaId);
arena_id!(/// Handle to a `NavLadder` in the mesh arena.
LadderId);

// ---------------------------------------------------------------------------
// Sequential ids
// ---------------------------------------------------------------------------

/// Identifier for a bot owned by the simulation context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BotId(pub u32);

/// Opaque handle to a world entity (floor brush, prop, breakable, ladder
/// entity). `EntityHandle::WORLD` is the static world geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(pub u32);

impl EntityHandle {
    pub const WORLD: EntityHandle = EntityHandle(0);
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BotId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// A team selector for per-team nav state (blocked flags, danger, player
/// counts).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Matches every team. Queries answer "for any team"; mutations apply to
    /// all team slots.
    Any,
    Id(u8),
}

impl Team {
    /// Map onto a per-team array slot. Team numbers wrap modulo
    /// `max_teams`, so every concrete team lands in `[0, max_teams)`.
    /// Returns `None` for `Team::Any`.
    pub fn slot(self, max_teams: usize) -> Option<usize> {
        match self {
            Team::Any => None,
            Team::Id(id) => Some(id as usize % max_teams.max(1)),
        }
    }
}

impl Default for Team {
    fn default() -> Self {
        Team::Id(0)
    }
}
