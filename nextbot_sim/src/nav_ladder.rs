// Ladders — vertical connectors between nav areas.
//
// A `NavLadder` links one bottom area to up to four top areas. The top slot
// an area occupies records how a climber leaves the ladder at the top:
// straight ahead over the lip (`TopForward`), sideways (`TopLeft` /
// `TopRight`), or back the way the ladder faces (`TopBehind`, mostly useful
// for descending). Slots are classified from geometry when an area is
// connected; see `NavLadder::classify`.
//
// `dir` is the side of the wall the climbable face points toward, i.e. the
// direction a climber stands relative to the ladder. A climber faces
// `dir.opposite()`.
//
// The ladder's slots and each area's ladder lists are kept consistent by
// `NavMesh::connect_ladder` / `disconnect_ladder` / `destroy_ladder`.
//
// See also: `nav_area.rs` (`LadderConnection`, the area-side lists),
// `nav_mesh.rs`, `locomotion.rs` for ladder traversal.

use crate::geometry::{Direction, LadderDirection, Vec3, xy};
use crate::nav_area::{LadderConnection, NUM_LADDER_CONNECTIONS, NavArea};
use crate::trace::CollisionWorld;
use crate::types::{AreaId, EntityHandle, Team};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavLadder {
    /// Persistent id, stable across snapshot save/load.
    pub(crate) id: u32,
    pub top: Vec3,
    pub bottom: Vec3,
    pub width: f32,
    pub dir: Direction,
    /// Entity governing who may use the ladder. `None` once the entity is
    /// gone, which leaves the ladder open to everyone.
    pub entity: Option<EntityHandle>,
    areas: [Option<AreaId>; NUM_LADDER_CONNECTIONS],
}

impl NavLadder {
    pub fn new(id: u32, top: Vec3, bottom: Vec3, width: f32, dir: Direction) -> Self {
        Self {
            id,
            top,
            bottom,
            width,
            dir,
            entity: None,
            areas: [None; NUM_LADDER_CONNECTIONS],
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn length(&self) -> f32 {
        self.top.z - self.bottom.z
    }

    /// Outward normal of the climbable face.
    pub fn normal(&self) -> Vec3 {
        self.dir.to_vector_2d().extend(0.0)
    }

    pub fn area(&self, slot: LadderConnection) -> Option<AreaId> {
        self.areas[slot.index()]
    }

    pub fn bottom_area(&self) -> Option<AreaId> {
        self.areas[LadderConnection::Bottom.index()]
    }

    /// Connected top areas in slot order.
    pub fn top_areas(&self) -> impl Iterator<Item = AreaId> + '_ {
        LadderConnection::ALL
            .into_iter()
            .filter(|slot| slot.is_top())
            .filter_map(move |slot| self.areas[slot.index()])
    }

    /// Which slot `area` would occupy if connected. Areas whose center is
    /// above the ladder's midpoint are top areas; their slot is the side of
    /// the ladder top they lie on, relative to a climber facing the ladder.
    pub fn classify(&self, area: &NavArea) -> LadderConnection {
        let mid_z = (self.top.z + self.bottom.z) / 2.0;
        if area.center().z <= mid_z {
            return LadderConnection::Bottom;
        }

        let facing = self.dir.opposite();
        let side = Direction::from_delta(xy(area.center()) - xy(self.top));
        if side == facing {
            LadderConnection::TopForward
        } else if side == self.dir {
            LadderConnection::TopBehind
        } else if side == facing.left() {
            LadderConnection::TopLeft
        } else {
            LadderConnection::TopRight
        }
    }

    pub(crate) fn set_area(&mut self, slot: LadderConnection, area: Option<AreaId>) {
        self.areas[slot.index()] = area;
    }

    /// Clear every slot holding `area`. Returns true if any did.
    pub(crate) fn clear_area(&mut self, area: AreaId) -> bool {
        let mut found = false;
        for slot in &mut self.areas {
            if *slot == Some(area) {
                *slot = None;
                found = true;
            }
        }
        found
    }

    /// True if `area` is reachable by travelling the ladder in `dir`:
    /// the bottom area going down, any top area going up.
    pub fn is_connected(&self, area: AreaId, dir: LadderDirection) -> bool {
        match dir {
            LadderDirection::Down => self.bottom_area() == Some(area),
            LadderDirection::Up => self.top_areas().any(|a| a == area),
        }
    }

    pub fn is_connected_any(&self, area: AreaId) -> bool {
        self.areas.contains(&Some(area))
    }

    /// Point on the ladder at world height `height`, clamped to the ends.
    pub fn pos_at_height(&self, height: f32) -> Vec3 {
        if height < self.bottom.z {
            return self.bottom;
        }
        if height > self.top.z || self.top.z == self.bottom.z {
            return self.top;
        }
        let percent = (height - self.bottom.z) / (self.top.z - self.bottom.z);
        self.top * percent + self.bottom * (1.0 - percent)
    }

    /// Permission check through the ladder's entity. A ladder without an
    /// entity, or whose entity no longer exists, is usable by every team.
    pub fn is_usable_by_team<W: CollisionWorld + ?Sized>(&self, team: Team, world: &W) -> bool {
        match self.entity {
            None => true,
            Some(entity) if !world.entity_exists(entity) => true,
            Some(entity) => world.is_usable_by_team(entity, team),
        }
    }
}
