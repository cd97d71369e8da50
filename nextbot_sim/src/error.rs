// Error kinds for nav-mesh mutation and locomotion intents.
//
// Nothing in the navigation core panics on bad input from the behavior
// layer. Mutations on the mesh that reference a destroyed area or ladder, and
// locomotion intents whose preconditions do not hold, return one of these
// instead and leave state untouched. Callers that only care whether the
// action took effect can use `.is_ok()`.
//
// See also: `nav_mesh.rs` (returns `NavError`), `locomotion.rs` (returns
// `LocomotionError`).

use crate::types::{AreaId, LadderId};
use thiserror::Error;

/// Failures from nav-mesh mutation and snapshot relinking.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("area {0} no longer exists")]
    StaleArea(AreaId),
    #[error("ladder {0} no longer exists")]
    StaleLadder(LadderId),
    #[error("area {0} cannot connect to itself")]
    SelfConnection(AreaId),
    #[error("area quad is degenerate (north-west corner is not north-west of south-east corner)")]
    DegenerateArea,
    #[error("snapshot references unknown persistent id {0}")]
    UnknownPersistentId(u32),
    #[error("snapshot contains persistent id {0} more than once")]
    DuplicatePersistentId(u32),
}

/// Reasons a locomotion intent was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LocomotionError {
    #[error("bot is not on the ground")]
    NotGrounded,
    #[error("body has no activity available for this action")]
    NoActivitySlot,
    #[error("a conflicting movement action is already in progress")]
    AlreadyActive,
    #[error("bot is not using a ladder")]
    NotOnLadder,
}
