// Collision service: the hull-trace oracle consumed by locomotion.
//
// Locomotion never inspects world geometry directly. It sweeps an
// axis-aligned hull through a `CollisionWorld` and reacts to the first hit
// (fraction travelled, end position, surface normal, hit entity). A trace
// that hits nothing reports `fraction == 1.0`.
//
// The trait also answers the few entity questions locomotion and ladders
// need: whether an entity still exists, what kind it is (breakables can be
// smashed, dynamic props can be temporarily ignored), and whether a team may
// use it. `break_entity` is the only mutation.
//
// `StaticWorld` is a small concrete implementation for tests, scenarios and
// benchmarks: infinite half-space planes plus solid boxes, each owned by an
// entity. Static geometry belongs to `EntityHandle::WORLD`; breakables and
// dynamic props get their own handles.
//
// Hits are pulled back by `DIST_EPSILON` along the sweep so the hull ends
// just outside the surface it touched. A hull resting in that gap is not in
// solid.
//
// See also: `locomotion.rs` (ground constraint and collision resolution),
// `nav_ladder.rs` (team permission checks).

use crate::geometry::{Extent, Vec3};
use crate::types::{EntityHandle, Team};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Distance traces stop short of the surface they hit.
pub const DIST_EPSILON: f32 = 1.0 / 32.0;

bitflags! {
    /// Content categories a solid belongs to and a trace can collide with.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ContentsMask: u32 {
        const SOLID = 0x1;
        const WINDOW = 0x2;
        const GRATE = 0x8;
        const MOVEABLE = 0x4000;
        const PLAYER_CLIP = 0x10000;
        const MONSTER_CLIP = 0x20000;
    }
}

impl ContentsMask {
    /// Everything that blocks a bot's hull.
    pub const NPC_SOLID: ContentsMask = ContentsMask::SOLID
        .union(ContentsMask::WINDOW)
        .union(ContentsMask::GRATE)
        .union(ContentsMask::MOVEABLE)
        .union(ContentsMask::MONSTER_CLIP);
}

/// What an entity is, as far as locomotion cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    World,
    /// Flimsy geometry a bot smashes through.
    Breakable,
    /// Physics object a bot may get stuck on.
    DynamicProp,
    /// A ladder or door style entity with no collision of its own.
    Permission,
}

/// Entities a trace passes through.
#[derive(Clone, Debug, Default)]
pub struct TraceFilter {
    pub ignore: SmallVec<[EntityHandle; 4]>,
}

impl TraceFilter {
    pub fn ignoring(entity: EntityHandle) -> Self {
        let mut filter = Self::default();
        filter.ignore.push(entity);
        filter
    }

    pub fn ignores(&self, entity: EntityHandle) -> bool {
        self.ignore.contains(&entity)
    }
}

/// Outcome of a hull sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceResult {
    /// Portion of the sweep completed, in `[0, 1]`.
    pub fraction: f32,
    pub end_pos: Vec3,
    /// Surface normal at the hit; zero when nothing was hit.
    pub normal: Vec3,
    pub entity: Option<EntityHandle>,
    /// The hull started inside a solid.
    pub start_solid: bool,
    /// The hull was inside a solid for the whole sweep.
    pub all_solid: bool,
}

impl TraceResult {
    pub fn clear(end: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_pos: end,
            normal: Vec3::ZERO,
            entity: None,
            start_solid: false,
            all_solid: false,
        }
    }

    pub fn did_hit(&self) -> bool {
        self.fraction < 1.0 || self.start_solid || self.all_solid
    }
}

pub trait CollisionWorld {
    /// Sweep the box `[mins, maxs]` (relative to the moving origin) from
    /// `from` to `to` and report the first blocking contact.
    fn trace_hull(
        &self,
        from: Vec3,
        to: Vec3,
        mins: Vec3,
        maxs: Vec3,
        mask: ContentsMask,
        filter: &TraceFilter,
    ) -> TraceResult;

    fn trace_line(&self, from: Vec3, to: Vec3, mask: ContentsMask, filter: &TraceFilter) -> TraceResult {
        self.trace_hull(from, to, Vec3::ZERO, Vec3::ZERO, mask, filter)
    }

    /// `None` if the entity does not exist.
    fn entity_kind(&self, entity: EntityHandle) -> Option<EntityKind>;

    fn entity_exists(&self, entity: EntityHandle) -> bool {
        self.entity_kind(entity).is_some()
    }

    fn is_usable_by_team(&self, _entity: EntityHandle, _team: Team) -> bool {
        true
    }

    /// Destroy a breakable. Returns true if something was broken.
    fn break_entity(&mut self, _entity: EntityHandle) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// StaticWorld
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Solid where `normal . p < dist`. `normal` is unit length.
    HalfSpace { normal: Vec3, dist: f32 },
    Box(Extent),
    /// Collision-free entity (permissions only).
    None,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Solid {
    pub entity: EntityHandle,
    pub kind: EntityKind,
    pub shape: Shape,
    pub contents: ContentsMask,
    /// Only this team may use the entity; `None` means everyone.
    pub team_only: Option<Team>,
}

/// A collision world made of planes and boxes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticWorld {
    solids: Vec<Solid>,
    next_entity: u32,
}

impl Default for StaticWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticWorld {
    pub fn new() -> Self {
        Self {
            solids: Vec::new(),
            next_entity: 1,
        }
    }

    /// Horizontal floor: solid below height `z`.
    pub fn add_floor(&mut self, z: f32) {
        self.add_plane(Vec3::Z, z);
    }

    /// Half-space solid on the side of the plane opposite `normal`. The
    /// plane passes through `normal * dist`.
    pub fn add_plane(&mut self, normal: Vec3, dist: f32) {
        self.solids.push(Solid {
            entity: EntityHandle::WORLD,
            kind: EntityKind::World,
            shape: Shape::HalfSpace {
                normal: normal.normalize_or_zero(),
                dist,
            },
            contents: ContentsMask::SOLID,
            team_only: None,
        });
    }

    pub fn add_box(&mut self, extent: Extent) {
        self.solids.push(Solid {
            entity: EntityHandle::WORLD,
            kind: EntityKind::World,
            shape: Shape::Box(extent),
            contents: ContentsMask::SOLID,
            team_only: None,
        });
    }

    pub fn add_breakable(&mut self, extent: Extent) -> EntityHandle {
        self.add_entity(EntityKind::Breakable, Shape::Box(extent), ContentsMask::SOLID)
    }

    pub fn add_dynamic_prop(&mut self, extent: Extent) -> EntityHandle {
        self.add_entity(
            EntityKind::DynamicProp,
            Shape::Box(extent),
            ContentsMask::SOLID | ContentsMask::MOVEABLE,
        )
    }

    /// A collision-free entity that restricts use to one team, such as a
    /// team-only ladder.
    pub fn add_permission_entity(&mut self, team_only: Option<Team>) -> EntityHandle {
        let entity = self.add_entity(EntityKind::Permission, Shape::None, ContentsMask::empty());
        if let Some(solid) = self.solids.iter_mut().find(|s| s.entity == entity) {
            solid.team_only = team_only;
        }
        entity
    }

    /// Remove every solid owned by `entity`. The world itself cannot be
    /// removed.
    pub fn remove_entity(&mut self, entity: EntityHandle) -> bool {
        if entity == EntityHandle::WORLD {
            return false;
        }
        let before = self.solids.len();
        self.solids.retain(|s| s.entity != entity);
        self.solids.len() != before
    }

    pub fn solids(&self) -> &[Solid] {
        &self.solids
    }

    fn add_entity(&mut self, kind: EntityKind, shape: Shape, contents: ContentsMask) -> EntityHandle {
        let entity = EntityHandle(self.next_entity);
        self.next_entity += 1;
        self.solids.push(Solid {
            entity,
            kind,
            shape,
            contents,
            team_only: None,
        });
        entity
    }
}

impl CollisionWorld for StaticWorld {
    fn trace_hull(
        &self,
        from: Vec3,
        to: Vec3,
        mins: Vec3,
        maxs: Vec3,
        mask: ContentsMask,
        filter: &TraceFilter,
    ) -> TraceResult {
        let mut best = TraceResult::clear(to);

        for solid in &self.solids {
            if !solid.contents.intersects(mask) || filter.ignores(solid.entity) {
                continue;
            }
            let hit = match solid.shape {
                Shape::HalfSpace { normal, dist } => sweep_half_space(from, to, mins, maxs, normal, dist),
                Shape::Box(extent) => sweep_box(from, to, mins, maxs, &extent),
                Shape::None => None,
            };
            let Some(hit) = hit else { continue };

            let better = if hit.start_solid != best.start_solid {
                hit.start_solid
            } else {
                hit.fraction < best.fraction
            };
            if better {
                best = TraceResult {
                    fraction: hit.fraction,
                    end_pos: from + (to - from) * hit.fraction,
                    normal: hit.normal,
                    entity: Some(solid.entity),
                    start_solid: hit.start_solid,
                    all_solid: hit.all_solid,
                };
            }
        }

        best
    }

    fn entity_kind(&self, entity: EntityHandle) -> Option<EntityKind> {
        if entity == EntityHandle::WORLD {
            return Some(EntityKind::World);
        }
        self.solids.iter().find(|s| s.entity == entity).map(|s| s.kind)
    }

    fn is_usable_by_team(&self, entity: EntityHandle, team: Team) -> bool {
        match self.solids.iter().find(|s| s.entity == entity) {
            Some(Solid {
                team_only: Some(only),
                ..
            }) => team == Team::Any || team == *only,
            _ => true,
        }
    }

    fn break_entity(&mut self, entity: EntityHandle) -> bool {
        if self.entity_kind(entity) != Some(EntityKind::Breakable) {
            return false;
        }
        self.remove_entity(entity)
    }
}

struct Hit {
    fraction: f32,
    normal: Vec3,
    start_solid: bool,
    all_solid: bool,
}

/// Swept box against the half-space `normal . p < dist`.
fn sweep_half_space(from: Vec3, to: Vec3, mins: Vec3, maxs: Vec3, normal: Vec3, dist: f32) -> Option<Hit> {
    // Lowest corner of the box along the normal.
    let support = (normal * mins).min(normal * maxs);
    let offset = support.x + support.y + support.z;

    let start = normal.dot(from) + offset - dist;
    let end = normal.dot(to) + offset - dist;

    if start < -DIST_EPSILON {
        return Some(Hit {
            fraction: 0.0,
            normal,
            start_solid: true,
            all_solid: end < 0.0,
        });
    }
    // Moving away from the plane, or along it up to rounding.
    if end >= 0.0 || start - end < 1e-4 {
        return None;
    }

    let fraction = ((start - DIST_EPSILON) / (start - end)).clamp(0.0, 1.0);
    Some(Hit {
        fraction,
        normal,
        start_solid: false,
        all_solid: false,
    })
}

/// Swept box against a solid box, via the slab method on the box expanded
/// by the hull (Minkowski sum).
fn sweep_box(from: Vec3, to: Vec3, mins: Vec3, maxs: Vec3, extent: &Extent) -> Option<Hit> {
    let lo = extent.lo - maxs;
    let hi = extent.hi - mins;
    let delta = to - from;

    let strictly_inside = |p: Vec3, margin: f32| {
        (0..3).all(|i| p[i] > lo[i] + margin && p[i] < hi[i] - margin)
    };

    if strictly_inside(from, DIST_EPSILON) {
        return Some(Hit {
            fraction: 0.0,
            normal: Vec3::ZERO,
            start_solid: true,
            all_solid: strictly_inside(to, 0.0),
        });
    }

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_axis = None;

    for i in 0..3 {
        let d = delta[i];
        if d == 0.0 {
            if from[i] <= lo[i] || from[i] >= hi[i] {
                return None;
            }
            continue;
        }
        let (near, far) = if d > 0.0 { (lo[i], hi[i]) } else { (hi[i], lo[i]) };
        let t0 = (near - from[i]) / d;
        let t1 = (far - from[i]) / d;
        if t0 > t_enter {
            t_enter = t0;
            enter_axis = Some(i);
        }
        t_exit = t_exit.min(t1);
    }

    let axis = enter_axis?;
    if t_enter >= t_exit || t_enter > 1.0 || t_exit <= 0.0 {
        return None;
    }

    let speed = delta[axis].abs();
    // Entering from inside the epsilon shell counts as touching at the start.
    if t_enter * speed < -DIST_EPSILON {
        return None;
    }

    let mut normal = Vec3::ZERO;
    normal[axis] = if delta[axis] > 0.0 { -1.0 } else { 1.0 };

    Some(Hit {
        fraction: (t_enter - DIST_EPSILON / speed).clamp(0.0, 1.0),
        normal,
        start_solid: false,
        all_solid: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINS: Vec3 = Vec3::new(-13.0, -13.0, 0.0);
    const MAXS: Vec3 = Vec3::new(13.0, 13.0, 68.0);

    fn trace(world: &StaticWorld, from: Vec3, to: Vec3) -> TraceResult {
        world.trace_hull(from, to, MINS, MAXS, ContentsMask::NPC_SOLID, &TraceFilter::default())
    }

    #[test]
    fn empty_world_never_hits() {
        let world = StaticWorld::new();
        let tr = trace(&world, Vec3::ZERO, Vec3::new(100.0, 0.0, -100.0));
        assert!(!tr.did_hit());
        assert_eq!(tr.end_pos, Vec3::new(100.0, 0.0, -100.0));
    }

    #[test]
    fn floor_stops_a_falling_hull() {
        let mut world = StaticWorld::new();
        world.add_floor(0.0);
        let tr = trace(&world, Vec3::new(0.0, 0.0, 100.0), Vec3::new(0.0, 0.0, -100.0));
        assert!(tr.did_hit());
        assert!(!tr.start_solid);
        assert_eq!(tr.normal, Vec3::Z);
        assert_eq!(tr.entity, Some(EntityHandle::WORLD));
        assert!((tr.end_pos.z - DIST_EPSILON).abs() < 1e-3);
    }

    #[test]
    fn hull_resting_on_floor_slides_freely() {
        let mut world = StaticWorld::new();
        world.add_floor(0.0);
        let start = Vec3::new(0.0, 0.0, DIST_EPSILON);
        let tr = trace(&world, start, start + Vec3::new(50.0, 20.0, 0.0));
        assert!(!tr.did_hit());
    }

    #[test]
    fn below_floor_is_start_solid() {
        let mut world = StaticWorld::new();
        world.add_floor(0.0);
        let tr = trace(&world, Vec3::new(0.0, 0.0, -10.0), Vec3::new(0.0, 0.0, -20.0));
        assert!(tr.start_solid);
        assert!(tr.all_solid);
        assert_eq!(tr.fraction, 0.0);
    }

    #[test]
    fn box_blocks_from_the_side() {
        let mut world = StaticWorld::new();
        world.add_box(Extent::new(Vec3::new(100.0, -50.0, 0.0), Vec3::new(120.0, 50.0, 100.0)));
        let tr = trace(&world, Vec3::new(0.0, 0.0, 1.0), Vec3::new(200.0, 0.0, 1.0));
        assert!(tr.did_hit());
        assert_eq!(tr.normal, Vec3::new(-1.0, 0.0, 0.0));
        // Hull front face stops just short of the box face at x = 100.
        assert!((tr.end_pos.x + 13.0 - 100.0).abs() < 0.1);
    }

    #[test]
    fn box_missed_when_passing_beside() {
        let mut world = StaticWorld::new();
        world.add_box(Extent::new(Vec3::new(100.0, 50.0, 0.0), Vec3::new(120.0, 80.0, 100.0)));
        let tr = trace(&world, Vec3::new(0.0, 0.0, 1.0), Vec3::new(200.0, 0.0, 1.0));
        assert!(!tr.did_hit());
    }

    #[test]
    fn mask_and_filter_skip_solids() {
        let mut world = StaticWorld::new();
        let prop = world.add_dynamic_prop(Extent::new(Vec3::new(50.0, -10.0, 0.0), Vec3::new(60.0, 10.0, 50.0)));
        let from = Vec3::new(0.0, 0.0, 1.0);
        let to = Vec3::new(100.0, 0.0, 1.0);
        let filter = TraceFilter::ignoring(prop);
        let tr = world.trace_hull(from, to, MINS, MAXS, ContentsMask::NPC_SOLID, &filter);
        assert!(!tr.did_hit());
        let tr = world.trace_hull(from, to, MINS, MAXS, ContentsMask::WINDOW, &TraceFilter::default());
        assert!(!tr.did_hit());
        let tr = trace(&world, from, to);
        assert_eq!(tr.entity, Some(prop));
    }

    #[test]
    fn only_breakables_break() {
        let mut world = StaticWorld::new();
        let glass = world.add_breakable(Extent::new(Vec3::ZERO, Vec3::ONE));
        let prop = world.add_dynamic_prop(Extent::new(Vec3::ZERO, Vec3::ONE));
        assert!(!world.break_entity(EntityHandle::WORLD));
        assert!(!world.break_entity(prop));
        assert!(world.break_entity(glass));
        assert!(!world.entity_exists(glass));
        assert!(world.entity_exists(prop));
    }

    #[test]
    fn team_only_entities() {
        let mut world = StaticWorld::new();
        let ladder = world.add_permission_entity(Some(Team::Id(1)));
        assert!(world.is_usable_by_team(ladder, Team::Id(1)));
        assert!(!world.is_usable_by_team(ladder, Team::Id(0)));
        let tr = trace(&world, Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        assert!(!tr.did_hit());
    }
}
