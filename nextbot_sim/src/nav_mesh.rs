// The navigation mesh: arena owner of all areas and ladders.
//
// Areas and ladders live in generation-checked slot arenas. An `AreaId` or
// `LadderId` names a slot plus the generation it was issued under; destroying
// an area frees the slot and bumps its generation, so every outstanding id
// for it resolves to `None` from then on, even after the slot is reused.
//
// Every operation that touches more than one area goes through here so the
// cross-references stay consistent:
// - `connect` adds the forward edge and the target's incoming entry.
// - `disconnect` removes one direction only; `disconnect_mutual` both.
// - `destroy_area` scrubs adjacency, incoming lists, visibility lists and
//   ladder slots in one pass over the arena.
// - Ladder connect/disconnect keeps the ladder's slot and the area's ladder
//   list in step.
//
// Persistence is a plain serde snapshot keyed by persistent `u32` ids (not
// the arena ids, which depend on allocation history). Loading is two-phase:
// create every area and ladder first, then relink adjacency through an
// id -> arena-id table.
//
// See also: `nav_area.rs`, `nav_ladder.rs`, `pathfinding.rs` which searches
// this mesh, `sim.rs` which owns it.

use crate::config::NavConfig;
use crate::error::NavError;
use crate::geometry::{Corner, Direction, Extent, Vec3};
use crate::nav_area::{LadderConnection, NavArea, NavAttributes, NavConnect};
use crate::nav_ladder::NavLadder;
use crate::types::{AreaId, EntityHandle, LadderId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Height a walker can step up without jumping, as assumed by mesh queries.
pub const NAV_STEP_HEIGHT: f32 = 18.0;

/// Snapshot format version written by `to_snapshot`.
pub const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Clone, Debug)]
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    fn insert(&mut self, value: T) -> (u32, u32) {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return (index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        (index, 0)
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_mut())
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.value.as_ref().map(|v| (i as u32, s.generation, v)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|s| s.value.as_mut())
    }
}

// ---------------------------------------------------------------------------
// NavMesh
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct NavMesh {
    areas: Arena<NavArea>,
    ladders: Arena<NavLadder>,
    next_area_id: u32,
    next_ladder_id: u32,
    next_debug_id: u32,
    max_teams: usize,
    generation_step_size: f32,
}

impl NavMesh {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            areas: Arena::default(),
            ladders: Arena::default(),
            next_area_id: 1,
            next_ladder_id: 1,
            next_debug_id: 0,
            max_teams: config.max_nav_teams.max(1),
            generation_step_size: config.generation_step_size,
        }
    }

    pub fn max_teams(&self) -> usize {
        self.max_teams
    }

    // -----------------------------------------------------------------------
    // Areas
    // -----------------------------------------------------------------------

    /// Add an area from its corners. Degenerate quads are rejected.
    pub fn add_area(&mut self, nw: Vec3, se: Vec3, ne_z: f32, sw_z: f32) -> Result<AreaId, NavError> {
        let area = NavArea::new(self.next_area_id, nw, se, ne_z, sw_z, self.max_teams);
        if area.is_degenerate() {
            return Err(NavError::DegenerateArea);
        }
        self.next_area_id += 1;
        Ok(self.insert_area(area))
    }

    /// Add a level, planar area covering `[x0, x1] x [y0, y1]` at height `z`.
    pub fn add_flat_area(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, z: f32) -> Result<AreaId, NavError> {
        self.add_area(Vec3::new(x0, y0, z), Vec3::new(x1, y1, z), z, z)
    }

    fn insert_area(&mut self, mut area: NavArea) -> AreaId {
        area.debug_id = self.next_debug_id;
        self.next_debug_id += 1;
        let (index, generation) = self.areas.insert(area);
        AreaId::new(index, generation)
    }

    pub fn area(&self, id: AreaId) -> Option<&NavArea> {
        self.areas.get(id.index, id.generation)
    }

    pub fn area_mut(&mut self, id: AreaId) -> Option<&mut NavArea> {
        self.areas.get_mut(id.index, id.generation)
    }

    fn area_or_err(&self, id: AreaId) -> Result<&NavArea, NavError> {
        self.area(id).ok_or(NavError::StaleArea(id))
    }

    fn area_mut_or_err(&mut self, id: AreaId) -> Result<&mut NavArea, NavError> {
        self.area_mut(id).ok_or(NavError::StaleArea(id))
    }

    /// Live areas in slot order.
    pub fn areas(&self) -> impl Iterator<Item = (AreaId, &NavArea)> {
        self.areas
            .iter()
            .map(|(index, generation, area)| (AreaId::new(index, generation), area))
    }

    pub fn area_count(&self) -> usize {
        self.areas.len
    }

    /// Number of area slots, live or free. Per-search scratch arrays are
    /// sized to this.
    pub fn area_slot_count(&self) -> usize {
        self.areas.slots.len()
    }

    pub fn area_by_persistent_id(&self, id: u32) -> Option<AreaId> {
        self.areas().find(|(_, a)| a.id == id).map(|(area_id, _)| area_id)
    }

    /// Remove an area and every reference to it.
    pub fn destroy_area(&mut self, id: AreaId) -> Result<NavArea, NavError> {
        let area = self
            .areas
            .remove(id.index, id.generation)
            .ok_or(NavError::StaleArea(id))?;

        for other in self.areas.iter_mut() {
            other.scrub_area(id);
        }
        for ladder in self.ladders.iter_mut() {
            ladder.clear_area(id);
        }

        debug!(area = %id, persistent_id = area.id, "destroyed nav area");
        Ok(area)
    }

    /// Bounding box of every area, or `None` for an empty mesh.
    pub fn extent(&self) -> Option<Extent> {
        let mut areas = self.areas();
        let (_, first) = areas.next()?;
        let mut extent = first.extent();
        for (_, area) in areas {
            extent.encompass(&area.extent());
        }
        Some(extent)
    }

    // -----------------------------------------------------------------------
    // Adjacency
    // -----------------------------------------------------------------------

    /// Add a directed edge from `from` leaving through side `dir` to `to`.
    /// Connecting twice is a no-op.
    pub fn connect(&mut self, from: AreaId, to: AreaId, dir: Direction) -> Result<(), NavError> {
        if from == to {
            return Err(NavError::SelfConnection(from));
        }
        let length = (self.area_or_err(to)?.center() - self.area_or_err(from)?.center()).length();
        self.link(from, to, dir, length)
    }

    /// Connect both ways: `a` to `b` through `dir`, `b` to `a` through the
    /// opposite side.
    pub fn connect_mutual(&mut self, a: AreaId, b: AreaId, dir: Direction) -> Result<(), NavError> {
        self.connect(a, b, dir)?;
        self.connect(b, a, dir.opposite())
    }

    fn link(&mut self, from: AreaId, to: AreaId, dir: Direction, length: f32) -> Result<(), NavError> {
        self.area_or_err(to)?;
        let added = self
            .area_mut_or_err(from)?
            .push_connection(dir, NavConnect { area: to, length });
        if added {
            self.area_mut_or_err(to)?.push_incoming(dir.opposite(), from);
            trace!(from = %from, to = %to, ?dir, length, "connected nav areas");
        }
        Ok(())
    }

    /// Remove every edge from `from` to `to`. The reverse edges, if any,
    /// remain. `to` may already be destroyed.
    pub fn disconnect(&mut self, from: AreaId, to: AreaId) -> Result<(), NavError> {
        let removed = self.area_mut_or_err(from)?.remove_connections_to(to);
        if let Some(target) = self.area_mut(to) {
            for dir in removed {
                target.remove_incoming(dir.opposite(), from);
            }
        }
        Ok(())
    }

    pub fn disconnect_mutual(&mut self, a: AreaId, b: AreaId) -> Result<(), NavError> {
        self.disconnect(a, b)?;
        if self.area(b).is_some() {
            self.disconnect(b, a)?;
        }
        Ok(())
    }

    pub fn is_connected(&self, from: AreaId, to: AreaId, dir: Direction) -> bool {
        self.area(from).is_some_and(|a| a.is_connected(to, dir))
    }

    /// True if `to` is reachable from `from` through any side or ladder.
    pub fn is_connected_any(&self, from: AreaId, to: AreaId) -> bool {
        let Some(area) = self.area(from) else {
            return false;
        };
        if area.connection_direction(to).is_some() {
            return true;
        }
        LadderConnection::ALL.into_iter().any(|slot| {
            area.ladders(slot)
                .iter()
                .filter_map(|l| self.ladder(*l))
                .any(|ladder| ladder.is_connected_any(to))
        })
    }

    /// True if no neighbor through `dir` connects back through the opposite
    /// side.
    pub fn is_edge(&self, id: AreaId, dir: Direction) -> bool {
        let Some(area) = self.area(id) else {
            return true;
        };
        !area
            .adjacent_areas(dir)
            .iter()
            .any(|c| self.is_connected(c.area, id, dir.opposite()))
    }

    pub fn adjacent_area(&self, id: AreaId, dir: Direction, i: usize) -> Option<AreaId> {
        self.area(id)?.adjacent_area(dir, i)
    }

    pub fn adjacent_count(&self, id: AreaId, dir: Direction) -> usize {
        self.area(id).map_or(0, |a| a.adjacent_count(dir))
    }

    pub fn incoming_connections(&self, id: AreaId, dir: Direction) -> &[AreaId] {
        match self.area(id) {
            Some(area) => area.incoming_connections(dir),
            None => &[],
        }
    }

    /// Height change across the shared portal from `from` into `to`, or
    /// `f32::MAX` if they are not directly connected.
    pub fn compute_adjacent_connection_height_change(&self, from: AreaId, to: AreaId) -> f32 {
        let (Some(a), Some(b)) = (self.area(from), self.area(to)) else {
            return f32::MAX;
        };
        let Some(dir) = a.connection_direction(to) else {
            return f32::MAX;
        };
        let (my_edge, _) = a.compute_portal(b, dir);
        let (other_edge, _) = b.compute_portal(a, dir.opposite());
        other_edge.z - my_edge.z
    }

    /// Point on the portal from `from` into `to` closest to `from_pos`,
    /// keeping `generation_step_size` away from portal ends that border the
    /// mesh boundary of `to`.
    pub fn closest_point_in_portal(&self, from: AreaId, to: AreaId, dir: Direction, from_pos: Vec3) -> Option<Vec3> {
        let a = self.area(from)?;
        let b = self.area(to)?;
        let (low_side, high_side) = match dir {
            Direction::North | Direction::South => (Direction::West, Direction::East),
            Direction::East | Direction::West => (Direction::North, Direction::South),
        };
        let margin = |side| {
            if self.is_edge(to, side) {
                self.generation_step_size
            } else {
                0.0
            }
        };
        Some(a.closest_point_in_portal(b, dir, from_pos, margin(low_side), margin(high_side)))
    }

    // -----------------------------------------------------------------------
    // Ladders
    // -----------------------------------------------------------------------

    pub fn add_ladder(&mut self, top: Vec3, bottom: Vec3, width: f32, dir: Direction) -> LadderId {
        let ladder = NavLadder::new(self.next_ladder_id, top, bottom, width, dir);
        self.next_ladder_id += 1;
        let (index, generation) = self.ladders.insert(ladder);
        LadderId::new(index, generation)
    }

    pub fn ladder(&self, id: LadderId) -> Option<&NavLadder> {
        self.ladders.get(id.index, id.generation)
    }

    pub fn ladder_mut(&mut self, id: LadderId) -> Option<&mut NavLadder> {
        self.ladders.get_mut(id.index, id.generation)
    }

    pub fn ladders(&self) -> impl Iterator<Item = (LadderId, &NavLadder)> {
        self.ladders
            .iter()
            .map(|(index, generation, ladder)| (LadderId::new(index, generation), ladder))
    }

    /// Attach `area` to the ladder slot its geometry implies. An area
    /// previously in that slot is detached.
    pub fn connect_ladder(&mut self, ladder_id: LadderId, area_id: AreaId) -> Result<LadderConnection, NavError> {
        let slot = {
            let area = self.area_or_err(area_id)?;
            let ladder = self.ladder(ladder_id).ok_or(NavError::StaleLadder(ladder_id))?;
            ladder.classify(area)
        };
        self.attach_ladder(ladder_id, area_id, slot)?;
        debug!(ladder = %ladder_id, area = %area_id, ?slot, "connected ladder");
        Ok(slot)
    }

    fn attach_ladder(&mut self, ladder_id: LadderId, area_id: AreaId, slot: LadderConnection) -> Result<(), NavError> {
        let ladder = self.ladder_mut(ladder_id).ok_or(NavError::StaleLadder(ladder_id))?;
        let previous = ladder.area(slot);
        ladder.set_area(slot, Some(area_id));

        if let Some(previous) = previous.filter(|p| *p != area_id) {
            let still_linked = self.ladder(ladder_id).is_some_and(|l| l.is_connected_any(previous));
            if !still_linked {
                if let Some(area) = self.area_mut(previous) {
                    area.remove_ladder(ladder_id);
                }
            }
        }
        self.area_mut_or_err(area_id)?.add_ladder(slot, ladder_id);
        Ok(())
    }

    pub fn disconnect_ladder(&mut self, ladder_id: LadderId, area_id: AreaId) -> Result<(), NavError> {
        self.ladder_mut(ladder_id)
            .ok_or(NavError::StaleLadder(ladder_id))?
            .clear_area(area_id);
        if let Some(area) = self.area_mut(area_id) {
            area.remove_ladder(ladder_id);
        }
        Ok(())
    }

    pub fn destroy_ladder(&mut self, id: LadderId) -> Result<NavLadder, NavError> {
        let ladder = self
            .ladders
            .remove(id.index, id.generation)
            .ok_or(NavError::StaleLadder(id))?;
        for area in self.areas.iter_mut() {
            area.remove_ladder(id);
        }
        debug!(ladder = %id, "destroyed ladder");
        Ok(ladder)
    }

    // -----------------------------------------------------------------------
    // Spatial queries
    // -----------------------------------------------------------------------

    /// The highest area under `pos` whose surface is no more than a step
    /// above it and no more than `beneath_limit` below it.
    pub fn nav_area_at(&self, pos: Vec3, beneath_limit: f32) -> Option<AreaId> {
        let mut best: Option<(AreaId, f32)> = None;
        for (id, area) in self.areas() {
            if !area.is_overlapping_point(pos, 0.0) {
                continue;
            }
            let z = area.get_z_at(pos);
            if z > pos.z + NAV_STEP_HEIGHT || z < pos.z - beneath_limit {
                continue;
            }
            if best.is_none_or(|(_, best_z)| z > best_z) {
                best = Some((id, z));
            }
        }
        best.map(|(id, _)| id)
    }

    /// The area under `pos`, or else the area whose surface is nearest to
    /// it within `max_distance`.
    pub fn nearest_nav_area(&self, pos: Vec3, max_distance: f32) -> Option<AreaId> {
        if let Some(id) = self.nav_area_at(pos, NAV_STEP_HEIGHT * 6.0) {
            return Some(id);
        }
        let limit = max_distance * max_distance;
        let mut best: Option<(AreaId, f32)> = None;
        for (id, area) in self.areas() {
            let d = area.distance_squared_to_point(pos);
            if d <= limit && best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    // -----------------------------------------------------------------------
    // Snapshot persistence
    // -----------------------------------------------------------------------

    pub fn to_snapshot(&self) -> NavMeshSnapshot {
        let persistent = |id: AreaId| self.area(id).map(|a| a.id);

        let areas = self
            .areas()
            .map(|(_, area)| AreaRecord {
                id: area.id,
                nw_corner: area.nw_corner(),
                se_corner: area.se_corner(),
                ne_z: area.corner(Corner::NorthEast).z,
                sw_z: area.corner(Corner::SouthWest).z,
                attributes: area.attributes,
                is_underwater: area.is_underwater,
                connections: area
                    .all_connections()
                    .filter_map(|(dir, c)| {
                        persistent(c.area).map(|to| ConnectionRecord {
                            dir,
                            to,
                            length: c.length,
                        })
                    })
                    .collect(),
                potentially_visible: area
                    .potentially_visible()
                    .iter()
                    .filter_map(|v| persistent(*v))
                    .collect(),
            })
            .collect();

        let ladders = self
            .ladders()
            .map(|(_, ladder)| LadderRecord {
                id: ladder.id,
                top: ladder.top,
                bottom: ladder.bottom,
                width: ladder.width,
                dir: ladder.dir,
                entity: ladder.entity,
                areas: LadderConnection::ALL.map(|slot| ladder.area(slot).and_then(persistent)),
            })
            .collect();

        NavMeshSnapshot {
            version: SNAPSHOT_VERSION,
            areas,
            ladders,
        }
    }

    /// Rebuild a mesh from a snapshot: create all areas and ladders, then
    /// relink adjacency through the persistent ids.
    pub fn from_snapshot(snapshot: &NavMeshSnapshot, config: &NavConfig) -> Result<Self, NavError> {
        let mut mesh = NavMesh::new(config);
        let mut area_ids: FxHashMap<u32, AreaId> = FxHashMap::default();

        for record in &snapshot.areas {
            let mut area = NavArea::new(
                record.id,
                record.nw_corner,
                record.se_corner,
                record.ne_z,
                record.sw_z,
                mesh.max_teams,
            );
            area.attributes = record.attributes;
            area.is_underwater = record.is_underwater;
            let id = mesh.insert_area(area);
            if area_ids.insert(record.id, id).is_some() {
                return Err(NavError::DuplicatePersistentId(record.id));
            }
            mesh.next_area_id = mesh.next_area_id.max(record.id.saturating_add(1));
        }

        let lookup = |id: u32| area_ids.get(&id).copied().ok_or(NavError::UnknownPersistentId(id));

        for record in &snapshot.areas {
            let from = lookup(record.id)?;
            for c in &record.connections {
                mesh.link(from, lookup(c.to)?, c.dir, c.length)?;
            }
            for visible in &record.potentially_visible {
                let visible = lookup(*visible)?;
                mesh.area_mut_or_err(from)?.add_potentially_visible(visible);
            }
        }

        let mut seen_ladders: FxHashMap<u32, LadderId> = FxHashMap::default();
        for record in &snapshot.ladders {
            let mut ladder = NavLadder::new(record.id, record.top, record.bottom, record.width, record.dir);
            ladder.entity = record.entity;
            let (index, generation) = mesh.ladders.insert(ladder);
            let ladder_id = LadderId::new(index, generation);
            if seen_ladders.insert(record.id, ladder_id).is_some() {
                return Err(NavError::DuplicatePersistentId(record.id));
            }
            mesh.next_ladder_id = mesh.next_ladder_id.max(record.id.saturating_add(1));

            for (slot, area) in LadderConnection::ALL.into_iter().zip(record.areas) {
                if let Some(area) = area {
                    mesh.attach_ladder(ladder_id, lookup(area)?, slot)?;
                }
            }
        }

        debug!(
            areas = mesh.area_count(),
            ladders = seen_ladders.len(),
            version = snapshot.version,
            "relinked nav mesh snapshot"
        );
        Ok(mesh)
    }
}

// ---------------------------------------------------------------------------
// Snapshot records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavMeshSnapshot {
    pub version: u32,
    pub areas: Vec<AreaRecord>,
    pub ladders: Vec<LadderRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub id: u32,
    pub nw_corner: Vec3,
    pub se_corner: Vec3,
    pub ne_z: f32,
    pub sw_z: f32,
    pub attributes: NavAttributes,
    pub is_underwater: bool,
    pub connections: Vec<ConnectionRecord>,
    pub potentially_visible: Vec<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub dir: Direction,
    pub to: u32,
    pub length: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LadderRecord {
    pub id: u32,
    pub top: Vec3,
    pub bottom: Vec3,
    pub width: f32,
    pub dir: Direction,
    pub entity: Option<EntityHandle>,
    pub areas: [Option<u32>; 5],
}
