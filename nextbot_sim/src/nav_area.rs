// Navigation areas — the nodes of the navigation graph.
//
// A `NavArea` is a convex, axis-aligned quadrilateral of walkable space. The
// quad's footprint is the XY rectangle between its north-west and south-east
// corners; heights are stored per corner (`nw_corner.z`, `ne_z`,
// `se_corner.z`, `sw_z`) so the surface may be non-planar. `get_z()`
// bilinearly interpolates across it.
//
// Adjacency is directed and stored per side: `connect[dir]` lists the areas
// reachable by leaving through that side, with the center-to-center length.
// `incoming_connect[dir]` is the reverse index: every area with an edge into
// this one that arrives through side `dir`. Keeping both lets one-way
// connections be discovered from either end. Both lists hold arena ids; the
// area never owns its neighbors.
//
// The node carries only structural data (geometry, adjacency, attributes,
// per-team state). A* bookkeeping lives in a per-search `SearchContext`
// (see `pathfinding.rs`) so any number of searches can run against the same
// mesh.
//
// Mutations that touch two areas (connect, disconnect, destroy) go through
// `NavMesh`, which keeps the forward and reverse lists consistent. This file
// only exposes the single-area halves of those operations as `pub(crate)`.
//
// See also: `nav_mesh.rs` for the arena and cross-area operations,
// `nav_ladder.rs` for ladders, `geometry.rs` for `Direction`/`Extent`.

use crate::geometry::{Corner, Direction, Extent, LadderDirection, NUM_DIRECTIONS, Vec3};
use crate::types::{AreaId, LadderId, Team};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

bitflags! {
    /// Semantic flags painted onto an area.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NavAttributes: u32 {
        /// Must crouch to use this area.
        const CROUCH = 0x0001;
        /// Must jump to traverse this area.
        const JUMP = 0x0002;
        /// Do not adjust for obstacles; move along the path exactly.
        const PRECISE = 0x0004;
        /// Inhibit discontinuity jumping.
        const NO_JUMP = 0x0008;
        /// Must stop when entering this area.
        const STOP = 0x0010;
        const RUN = 0x0020;
        const WALK = 0x0040;
        /// Avoid this area unless no alternatives exist.
        const AVOID = 0x0080;
        /// Area may become blocked and should be periodically re-checked.
        const TRANSIENT = 0x0100;
        const DONT_HIDE = 0x0200;
        const STAND = 0x0400;
        const NO_HOSTAGES = 0x0800;
        const STAIRS = 0x1000;
        const NO_MERGE = 0x2000;
        const OBSTACLE_TOP = 0x4000;
        /// Sits on a ledge edge with a large drop beyond.
        const CLIFF = 0x8000;
    }
}

/// A directed edge out of an area.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavConnect {
    pub area: AreaId,
    /// Center-to-center distance at connection time.
    pub length: f32,
}

/// Which slot of a ladder an area occupies. The four top slots describe how
/// a bot leaving the ladder top faces relative to the ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LadderConnection {
    TopForward = 0,
    TopLeft = 1,
    TopRight = 2,
    TopBehind = 3,
    Bottom = 4,
}

pub const NUM_LADDER_CONNECTIONS: usize = 5;

impl LadderConnection {
    pub const ALL: [LadderConnection; NUM_LADDER_CONNECTIONS] = [
        LadderConnection::TopForward,
        LadderConnection::TopLeft,
        LadderConnection::TopRight,
        LadderConnection::TopBehind,
        LadderConnection::Bottom,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_top(self) -> bool {
        self != LadderConnection::Bottom
    }
}

/// Per-team mutable state on an area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    pub blocked: bool,
    pub player_count: u8,
    /// Danger level as of `danger_timestamp`; decays linearly afterward.
    pub danger: f32,
    pub danger_timestamp: f32,
}

/// A walkable quad in the navigation mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavArea {
    /// Persistent id, stable across snapshot save/load.
    pub(crate) id: u32,
    /// Creation sequence number; never reused within a mesh.
    pub(crate) debug_id: u32,

    nw_corner: Vec3,
    se_corner: Vec3,
    ne_z: f32,
    sw_z: f32,
    center: Vec3,
    inv_dx_corners: f32,
    inv_dy_corners: f32,

    pub attributes: NavAttributes,

    connect: [SmallVec<[NavConnect; 4]>; NUM_DIRECTIONS],
    incoming_connect: [SmallVec<[AreaId; 4]>; NUM_DIRECTIONS],
    ladders: [SmallVec<[LadderId; 2]>; NUM_LADDER_CONNECTIONS],
    potentially_visible: Vec<AreaId>,

    teams: SmallVec<[TeamState; 2]>,
    pub is_underwater: bool,
    /// When set, overrides per-team blocked state for every team.
    pub blocked_override: Option<bool>,
}

impl NavArea {
    /// Build an area from its north-west and south-east corners and the
    /// heights of the two remaining corners.
    pub fn new(
        id: u32,
        nw_corner: Vec3,
        se_corner: Vec3,
        ne_z: f32,
        sw_z: f32,
        max_teams: usize,
    ) -> Self {
        let center = Vec3::new(
            (nw_corner.x + se_corner.x) / 2.0,
            (nw_corner.y + se_corner.y) / 2.0,
            (nw_corner.z + se_corner.z) / 2.0,
        );

        let dx = se_corner.x - nw_corner.x;
        let dy = se_corner.y - nw_corner.y;
        let (inv_dx_corners, inv_dy_corners) = if dx > 0.0 && dy > 0.0 {
            (1.0 / dx, 1.0 / dy)
        } else {
            (0.0, 0.0)
        };

        Self {
            id,
            debug_id: 0,
            nw_corner,
            se_corner,
            ne_z,
            sw_z,
            center,
            inv_dx_corners,
            inv_dy_corners,
            attributes: NavAttributes::empty(),
            connect: Default::default(),
            incoming_connect: Default::default(),
            ladders: Default::default(),
            potentially_visible: Vec::new(),
            teams: SmallVec::from_elem(TeamState::default(), max_teams.max(1)),
            is_underwater: false,
            blocked_override: None,
        }
    }

    /// A planar, level area covering `[x0, x1] x [y0, y1]` at height `z`.
    pub fn flat(id: u32, x0: f32, y0: f32, x1: f32, y1: f32, z: f32, max_teams: usize) -> Self {
        Self::new(
            id,
            Vec3::new(x0, y0, z),
            Vec3::new(x1, y1, z),
            z,
            z,
            max_teams,
        )
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn debug_id(&self) -> u32 {
        self.debug_id
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn nw_corner(&self) -> Vec3 {
        self.nw_corner
    }

    pub fn se_corner(&self) -> Vec3 {
        self.se_corner
    }

    pub fn corner(&self, corner: Corner) -> Vec3 {
        match corner {
            Corner::NorthWest => self.nw_corner,
            Corner::NorthEast => Vec3::new(self.se_corner.x, self.nw_corner.y, self.ne_z),
            Corner::SouthEast => self.se_corner,
            Corner::SouthWest => Vec3::new(self.nw_corner.x, self.se_corner.y, self.sw_z),
        }
    }

    pub fn size_x(&self) -> f32 {
        self.se_corner.x - self.nw_corner.x
    }

    pub fn size_y(&self) -> f32 {
        self.se_corner.y - self.nw_corner.y
    }

    /// Bounding box over all four corners.
    pub fn extent(&self) -> Extent {
        let mut extent = Extent::from_point(self.nw_corner);
        for corner in Corner::ALL {
            extent.encompass_point(self.corner(corner));
        }
        extent
    }

    /// True if the quad has no positive footprint.
    pub fn is_degenerate(&self) -> bool {
        self.nw_corner.x >= self.se_corner.x || self.nw_corner.y >= self.se_corner.y
    }

    // -----------------------------------------------------------------------
    // Height and containment
    // -----------------------------------------------------------------------

    /// Height of the surface at `(x, y)`, bilinearly interpolated from the
    /// four corner heights. Points outside the footprint are clamped onto it.
    pub fn get_z(&self, x: f32, y: f32) -> f32 {
        if self.inv_dx_corners == 0.0 || self.inv_dy_corners == 0.0 {
            return self.ne_z;
        }

        let u = ((x - self.nw_corner.x) * self.inv_dx_corners).clamp(0.0, 1.0);
        let v = ((y - self.nw_corner.y) * self.inv_dy_corners).clamp(0.0, 1.0);

        let north_z = self.nw_corner.z + u * (self.ne_z - self.nw_corner.z);
        let south_z = self.sw_z + u * (self.se_corner.z - self.sw_z);

        north_z + v * (south_z - north_z)
    }

    pub fn get_z_at(&self, pos: Vec3) -> f32 {
        self.get_z(pos.x, pos.y)
    }

    /// True if `pos` lies within the footprint expanded by `tolerance`.
    pub fn is_overlapping_point(&self, pos: Vec3, tolerance: f32) -> bool {
        pos.x + tolerance >= self.nw_corner.x
            && pos.x - tolerance <= self.se_corner.x
            && pos.y + tolerance >= self.nw_corner.y
            && pos.y - tolerance <= self.se_corner.y
    }

    /// True if the two footprints share interior.
    pub fn is_overlapping_area(&self, other: &NavArea) -> bool {
        other.nw_corner.x < self.se_corner.x
            && other.se_corner.x > self.nw_corner.x
            && other.nw_corner.y < self.se_corner.y
            && other.se_corner.y > self.nw_corner.y
    }

    pub fn is_overlapping_x(&self, other: &NavArea) -> bool {
        other.nw_corner.x < self.se_corner.x && other.se_corner.x > self.nw_corner.x
    }

    pub fn is_overlapping_y(&self, other: &NavArea) -> bool {
        other.nw_corner.y < self.se_corner.y && other.se_corner.y > self.nw_corner.y
    }

    /// True if `pos` is over the footprint and no more than `step_height`
    /// below the surface.
    pub fn contains_point(&self, pos: Vec3, step_height: f32) -> bool {
        if !self.is_overlapping_point(pos, 0.0) {
            return false;
        }
        self.get_z_at(pos) - step_height <= pos.z
    }

    /// The point on the surface nearest to `pos` in XY.
    pub fn closest_point_on_area(&self, pos: Vec3) -> Vec3 {
        let x = pos.x.clamp(self.nw_corner.x, self.se_corner.x);
        let y = pos.y.clamp(self.nw_corner.y, self.se_corner.y);
        Vec3::new(x, y, self.get_z(x, y))
    }

    pub fn distance_squared_to_point(&self, pos: Vec3) -> f32 {
        (self.closest_point_on_area(pos) - pos).length_squared()
    }

    /// Surface normal from the north-west triangle, or from the south-east
    /// triangle when `alternate` is set.
    pub fn compute_normal(&self, alternate: bool) -> Vec3 {
        let (u, v) = if alternate {
            (
                Vec3::new(
                    self.nw_corner.x - self.se_corner.x,
                    0.0,
                    self.sw_z - self.se_corner.z,
                ),
                Vec3::new(
                    0.0,
                    self.nw_corner.y - self.se_corner.y,
                    self.ne_z - self.se_corner.z,
                ),
            )
        } else {
            (
                Vec3::new(
                    self.se_corner.x - self.nw_corner.x,
                    0.0,
                    self.ne_z - self.nw_corner.z,
                ),
                Vec3::new(
                    0.0,
                    self.se_corner.y - self.nw_corner.y,
                    self.sw_z - self.nw_corner.z,
                ),
            )
        };
        u.cross(v).normalize_or_zero()
    }

    /// True if both triangles of the quad are coplanar within `tolerance`
    /// (dot product of their normals).
    pub fn is_flat(&self, tolerance: f32) -> bool {
        self.compute_normal(false).dot(self.compute_normal(true)) > tolerance
    }

    /// Height change from this area's center surface to `other`'s.
    pub fn compute_height_change(&self, other: &NavArea) -> f32 {
        other.get_z_at(other.center) - self.get_z_at(self.center)
    }

    // -----------------------------------------------------------------------
    // Portals
    // -----------------------------------------------------------------------

    /// Center and half-width of the shared edge when leaving through `dir`
    /// toward `other`. The portal is clamped to this area's side, so disjoint
    /// areas yield a zero-width portal at the nearest corner.
    pub fn compute_portal(&self, other: &NavArea, dir: Direction) -> (Vec3, f32) {
        let mut center = Vec3::ZERO;
        let half_width;

        match dir {
            Direction::North | Direction::South => {
                center.y = if dir == Direction::North {
                    self.nw_corner.y
                } else {
                    self.se_corner.y
                };
                let left = other
                    .nw_corner
                    .x
                    .max(self.nw_corner.x)
                    .clamp(self.nw_corner.x, self.se_corner.x);
                let right = other
                    .se_corner
                    .x
                    .min(self.se_corner.x)
                    .clamp(self.nw_corner.x, self.se_corner.x);
                center.x = (left + right) / 2.0;
                half_width = (right - left) / 2.0;
            }
            Direction::East | Direction::West => {
                center.x = if dir == Direction::West {
                    self.nw_corner.x
                } else {
                    self.se_corner.x
                };
                let top = other
                    .nw_corner
                    .y
                    .max(self.nw_corner.y)
                    .clamp(self.nw_corner.y, self.se_corner.y);
                let bottom = other
                    .se_corner
                    .y
                    .min(self.se_corner.y)
                    .clamp(self.nw_corner.y, self.se_corner.y);
                center.y = (top + bottom) / 2.0;
                half_width = (bottom - top) / 2.0;
            }
        }

        center.z = self.get_z(center.x, center.y);
        (center, half_width)
    }

    /// Point on the portal toward `other` nearest to `from_pos`.
    ///
    /// `low_margin`/`high_margin` pull the usable span in from the low (west
    /// or north) and high (east or south) ends of the portal; `NavMesh` sets
    /// them when the destination area has no neighbor on that side, so bots
    /// do not hug ledges.
    pub fn closest_point_in_portal(
        &self,
        other: &NavArea,
        dir: Direction,
        from_pos: Vec3,
        low_margin: f32,
        high_margin: f32,
    ) -> Vec3 {
        let mut close = Vec3::ZERO;

        match dir {
            Direction::North | Direction::South => {
                close.y = if dir == Direction::North {
                    self.nw_corner.y
                } else {
                    self.se_corner.y
                };
                let left = self.nw_corner.x.max(other.nw_corner.x);
                let right = self.se_corner.x.min(other.se_corner.x);
                let (lo, hi) = shrink_span(left, right, low_margin, high_margin);
                close.x = from_pos.x.clamp(lo, hi);
            }
            Direction::East | Direction::West => {
                close.x = if dir == Direction::West {
                    self.nw_corner.x
                } else {
                    self.se_corner.x
                };
                let top = self.nw_corner.y.max(other.nw_corner.y);
                let bottom = self.se_corner.y.min(other.se_corner.y);
                let (lo, hi) = shrink_span(top, bottom, low_margin, high_margin);
                close.y = from_pos.y.clamp(lo, hi);
            }
        }

        close.z = self.get_z(close.x, close.y);
        close
    }

    // -----------------------------------------------------------------------
    // Adjacency (read side)
    // -----------------------------------------------------------------------

    pub fn adjacent_count(&self, dir: Direction) -> usize {
        self.connect[dir.index()].len()
    }

    /// The `i`th neighbor through side `dir`, or `None` if out of range.
    pub fn adjacent_area(&self, dir: Direction, i: usize) -> Option<AreaId> {
        self.connect[dir.index()].get(i).map(|c| c.area)
    }

    pub fn adjacent_areas(&self, dir: Direction) -> &[NavConnect] {
        &self.connect[dir.index()]
    }

    /// Every outgoing edge, tagged with the side it leaves through.
    pub fn all_connections(&self) -> impl Iterator<Item = (Direction, NavConnect)> + '_ {
        Direction::ALL
            .into_iter()
            .flat_map(move |dir| self.connect[dir.index()].iter().map(move |c| (dir, *c)))
    }

    pub fn is_connected(&self, area: AreaId, dir: Direction) -> bool {
        self.connect[dir.index()].iter().any(|c| c.area == area)
    }

    /// The side through which `area` is reachable, if any.
    pub fn connection_direction(&self, area: AreaId) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|&dir| self.is_connected(area, dir))
    }

    /// Areas with an edge into this one arriving through side `dir`.
    pub fn incoming_connections(&self, dir: Direction) -> &[AreaId] {
        &self.incoming_connect[dir.index()]
    }

    /// Ladders for which this area fills `slot`.
    pub fn ladders(&self, slot: LadderConnection) -> &[LadderId] {
        &self.ladders[slot.index()]
    }

    /// Ladders usable from this area in the given travel direction: going up
    /// from a bottom area, going down from any top area.
    pub fn ladders_in_direction(&self, dir: LadderDirection) -> impl Iterator<Item = LadderId> + '_ {
        LadderConnection::ALL
            .into_iter()
            .filter(move |slot| match dir {
                LadderDirection::Up => !slot.is_top(),
                LadderDirection::Down => slot.is_top(),
            })
            .flat_map(move |slot| self.ladders[slot.index()].iter().copied())
    }

    pub fn is_potentially_visible(&self, area: AreaId) -> bool {
        self.potentially_visible.contains(&area)
    }

    pub fn potentially_visible(&self) -> &[AreaId] {
        &self.potentially_visible
    }

    pub fn add_potentially_visible(&mut self, area: AreaId) {
        if !self.potentially_visible.contains(&area) {
            self.potentially_visible.push(area);
        }
    }

    // -----------------------------------------------------------------------
    // Adjacency (single-area halves, driven by NavMesh)
    // -----------------------------------------------------------------------

    /// Returns `false` if the edge already existed.
    pub(crate) fn push_connection(&mut self, dir: Direction, connect: NavConnect) -> bool {
        if self.is_connected(connect.area, dir) {
            return false;
        }
        self.connect[dir.index()].push(connect);
        true
    }

    /// Remove the outgoing edge to `area` from every side. Returns the sides
    /// that had one.
    pub(crate) fn remove_connections_to(&mut self, area: AreaId) -> SmallVec<[Direction; 4]> {
        let mut removed = SmallVec::new();
        for dir in Direction::ALL {
            let list = &mut self.connect[dir.index()];
            let before = list.len();
            list.retain(|c| c.area != area);
            if list.len() != before {
                removed.push(dir);
            }
        }
        removed
    }

    pub(crate) fn push_incoming(&mut self, dir: Direction, area: AreaId) {
        let list = &mut self.incoming_connect[dir.index()];
        if !list.contains(&area) {
            list.push(area);
        }
    }

    pub(crate) fn remove_incoming(&mut self, dir: Direction, area: AreaId) {
        self.incoming_connect[dir.index()].retain(|a| *a != area);
    }

    pub(crate) fn add_ladder(&mut self, slot: LadderConnection, ladder: LadderId) {
        let list = &mut self.ladders[slot.index()];
        if !list.contains(&ladder) {
            list.push(ladder);
        }
    }

    pub(crate) fn remove_ladder(&mut self, ladder: LadderId) {
        for list in &mut self.ladders {
            list.retain(|l| *l != ladder);
        }
    }

    /// Drop every reference to a destroyed area.
    pub(crate) fn scrub_area(&mut self, area: AreaId) {
        self.remove_connections_to(area);
        for list in &mut self.incoming_connect {
            list.retain(|a| *a != area);
        }
        self.potentially_visible.retain(|a| *a != area);
    }

    // -----------------------------------------------------------------------
    // Per-team state
    // -----------------------------------------------------------------------

    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    /// Blocked for `team`, or for any team with `Team::Any`.
    pub fn is_blocked(&self, team: Team) -> bool {
        if let Some(blocked) = self.blocked_override {
            return blocked;
        }
        match team.slot(self.teams.len()) {
            Some(i) => self.teams[i].blocked,
            None => self.teams.iter().any(|t| t.blocked),
        }
    }

    pub fn mark_as_blocked(&mut self, team: Team) {
        self.for_each_team_mut(team, |t| t.blocked = true);
    }

    pub fn unblock(&mut self, team: Team) {
        self.for_each_team_mut(team, |t| t.blocked = false);
    }

    /// Player count for `team`, or the total with `Team::Any`.
    pub fn player_count(&self, team: Team) -> u32 {
        match team.slot(self.teams.len()) {
            Some(i) => self.teams[i].player_count as u32,
            None => self.teams.iter().map(|t| t.player_count as u32).sum(),
        }
    }

    pub fn increment_player_count(&mut self, team: Team) {
        self.for_each_team_mut(team, |t| t.player_count = t.player_count.saturating_add(1));
    }

    pub fn decrement_player_count(&mut self, team: Team) {
        self.for_each_team_mut(team, |t| t.player_count = t.player_count.saturating_sub(1));
    }

    pub fn clear_player_count(&mut self) {
        self.for_each_team_mut(Team::Any, |t| t.player_count = 0);
    }

    /// Current danger for `team` after linear decay; the maximum over teams
    /// with `Team::Any`.
    pub fn danger(&self, team: Team, now: f32, decay_rate: f32) -> f32 {
        let decayed = |t: &TeamState| {
            (t.danger - (now - t.danger_timestamp).max(0.0) * decay_rate).max(0.0)
        };
        match team.slot(self.teams.len()) {
            Some(i) => decayed(&self.teams[i]),
            None => self.teams.iter().map(decayed).fold(0.0, f32::max),
        }
    }

    /// Add danger on top of the current decayed level.
    pub fn increase_danger(&mut self, team: Team, amount: f32, now: f32, decay_rate: f32) {
        self.for_each_team_mut(team, |t| {
            let current = (t.danger - (now - t.danger_timestamp).max(0.0) * decay_rate).max(0.0);
            t.danger = current + amount;
            t.danger_timestamp = now;
        });
    }

    fn for_each_team_mut(&mut self, team: Team, mut f: impl FnMut(&mut TeamState)) {
        match team.slot(self.teams.len()) {
            Some(i) => f(&mut self.teams[i]),
            None => self.teams.iter_mut().for_each(f),
        }
    }
}

/// Pull both ends of `[lo, hi]` inward by the given margins. Collapses to the
/// midpoint if the margins cross.
fn shrink_span(lo: f32, hi: f32, low_margin: f32, high_margin: f32) -> (f32, f32) {
    let a = lo + low_margin;
    let b = hi - high_margin;
    if a > b {
        let mid = (lo + hi) / 2.0;
        (mid, mid)
    } else {
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sloped() -> NavArea {
        NavArea::new(
            1,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 100.0, 40.0),
            10.0,
            30.0,
            2,
        )
    }

    #[test]
    fn planar_area_has_constant_height() {
        let area = NavArea::flat(1, -50.0, -50.0, 50.0, 50.0, 12.5, 2);
        for &(x, y) in &[(0.0, 0.0), (-50.0, -50.0), (49.0, -20.0), (10.0, 50.0)] {
            assert_eq!(area.get_z(x, y), 12.5);
        }
    }

    #[test]
    fn corner_heights_are_exact() {
        let area = sloped();
        let ne = area.corner(Corner::NorthEast);
        let sw = area.corner(Corner::SouthWest);
        assert_eq!(area.get_z(ne.x, ne.y), 10.0);
        assert_eq!(area.get_z(sw.x, sw.y), 30.0);
        assert_eq!(area.get_z(0.0, 0.0), 0.0);
        assert_eq!(area.get_z(100.0, 100.0), 40.0);
        // Center is the average of all four corners for a bilinear patch.
        assert!((area.get_z(50.0, 50.0) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_area_reports_ne_height() {
        let area = NavArea::new(1, Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0), 7.0, 0.0, 2);
        assert!(area.is_degenerate());
        assert_eq!(area.get_z(0.0, 5.0), 7.0);
    }

    #[test]
    fn contains_point_allows_step_below_surface() {
        let area = NavArea::flat(1, 0.0, 0.0, 100.0, 100.0, 20.0, 2);
        assert!(area.contains_point(Vec3::new(50.0, 50.0, 20.0), 18.0));
        assert!(area.contains_point(Vec3::new(50.0, 50.0, 5.0), 18.0));
        assert!(!area.contains_point(Vec3::new(50.0, 50.0, 1.0), 18.0));
        assert!(!area.contains_point(Vec3::new(150.0, 50.0, 20.0), 18.0));
    }

    #[test]
    fn overlap_tests() {
        let a = NavArea::flat(1, 0.0, 0.0, 100.0, 100.0, 0.0, 2);
        let b = NavArea::flat(2, 50.0, 50.0, 150.0, 150.0, 0.0, 2);
        let c = NavArea::flat(3, 100.0, 0.0, 200.0, 100.0, 0.0, 2);
        assert!(a.is_overlapping_area(&b));
        // Sharing an edge is not overlap.
        assert!(!a.is_overlapping_area(&c));
        assert!(a.is_overlapping_y(&c));
        assert!(!a.is_overlapping_x(&c));
        assert!(a.is_overlapping_point(Vec3::new(101.0, 50.0, 0.0), 2.0));
    }

    #[test]
    fn portal_between_offset_neighbors() {
        let a = NavArea::flat(1, 0.0, 0.0, 100.0, 100.0, 0.0, 2);
        let b = NavArea::flat(2, 100.0, 50.0, 200.0, 250.0, 0.0, 2);
        let (center, half_width) = a.compute_portal(&b, Direction::East);
        assert_eq!(center, Vec3::new(100.0, 75.0, 0.0));
        assert_eq!(half_width, 25.0);
    }

    #[test]
    fn closest_point_in_portal_respects_margins() {
        let a = NavArea::flat(1, 0.0, 0.0, 100.0, 100.0, 0.0, 2);
        let b = NavArea::flat(2, 100.0, 0.0, 200.0, 100.0, 0.0, 2);
        let p = a.closest_point_in_portal(&b, Direction::East, Vec3::new(50.0, 2.0, 0.0), 25.0, 0.0);
        assert_eq!(p, Vec3::new(100.0, 25.0, 0.0));
        let p = a.closest_point_in_portal(&b, Direction::East, Vec3::new(50.0, 60.0, 0.0), 0.0, 0.0);
        assert_eq!(p, Vec3::new(100.0, 60.0, 0.0));
        // Margins wider than the portal collapse to its midpoint.
        let p = a.closest_point_in_portal(&b, Direction::East, Vec3::ZERO, 80.0, 80.0);
        assert_eq!(p.y, 50.0);
    }

    #[test]
    fn normal_points_up_and_flatness() {
        let flat = NavArea::flat(1, 0.0, 0.0, 10.0, 10.0, 0.0, 2);
        assert!((flat.compute_normal(false) - Vec3::Z).length() < 1e-5);
        assert!((flat.compute_normal(true) - Vec3::Z).length() < 1e-5);
        assert!(flat.is_flat(0.99));

        let twisted = NavArea::new(2, Vec3::ZERO, Vec3::new(10.0, 10.0, 0.0), 10.0, 10.0, 2);
        assert!(!twisted.is_flat(0.99));
    }

    #[test]
    fn closest_point_on_area_clamps() {
        let area = NavArea::flat(1, 0.0, 0.0, 100.0, 100.0, 5.0, 2);
        let p = area.closest_point_on_area(Vec3::new(-20.0, 40.0, 50.0));
        assert_eq!(p, Vec3::new(0.0, 40.0, 5.0));
        assert_eq!(area.distance_squared_to_point(Vec3::new(50.0, 50.0, 8.0)), 9.0);
    }

    #[test]
    fn team_state_is_per_team_with_any_aggregate() {
        let mut area = NavArea::flat(1, 0.0, 0.0, 10.0, 10.0, 0.0, 2);
        area.mark_as_blocked(Team::Id(1));
        assert!(area.is_blocked(Team::Id(1)));
        assert!(!area.is_blocked(Team::Id(0)));
        assert!(area.is_blocked(Team::Any));
        // Team 3 wraps onto slot 1.
        assert!(area.is_blocked(Team::Id(3)));
        area.unblock(Team::Any);
        assert!(!area.is_blocked(Team::Any));

        area.blocked_override = Some(true);
        assert!(area.is_blocked(Team::Id(0)));
    }

    #[test]
    fn player_count_saturates() {
        let mut area = NavArea::flat(1, 0.0, 0.0, 10.0, 10.0, 0.0, 2);
        area.decrement_player_count(Team::Id(0));
        assert_eq!(area.player_count(Team::Id(0)), 0);
        area.increment_player_count(Team::Id(0));
        area.increment_player_count(Team::Id(1));
        area.increment_player_count(Team::Id(1));
        assert_eq!(area.player_count(Team::Id(1)), 2);
        assert_eq!(area.player_count(Team::Any), 3);
        area.clear_player_count();
        assert_eq!(area.player_count(Team::Any), 0);
    }

    #[test]
    fn danger_decays_linearly() {
        let mut area = NavArea::flat(1, 0.0, 0.0, 10.0, 10.0, 0.0, 2);
        area.increase_danger(Team::Id(0), 10.0, 0.0, 1.0);
        assert_eq!(area.danger(Team::Id(0), 4.0, 1.0), 6.0);
        assert_eq!(area.danger(Team::Id(0), 20.0, 1.0), 0.0);
        area.increase_danger(Team::Id(0), 5.0, 4.0, 1.0);
        assert_eq!(area.danger(Team::Id(0), 4.0, 1.0), 11.0);
        assert_eq!(area.danger(Team::Any, 4.0, 1.0), 11.0);
        assert_eq!(area.danger(Team::Id(1), 4.0, 1.0), 0.0);
    }
}
