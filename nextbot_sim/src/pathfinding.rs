// A* search over the nav mesh.
//
// Search bookkeeping lives in a `SearchContext`, not on the areas. Each
// context holds its own epoch marker, open list and per-area scratch (cost so
// far, total cost, path length, parent and how the parent reached it), so any
// number of searches can run over the same `&NavMesh` at once. That is what
// lets `build_paths_parallel` hand one context to each rayon worker.
//
// Scratch is stored in `Vec`s indexed by area slot. Visited state uses an
// epoch marker: an area is "marked" iff its stamp equals the context's
// current marker, so starting a new search is O(1) instead of clearing every
// slot. An area is open iff its open stamp equals the marker; closed iff
// marked and not open.
//
// The open list is a `BinaryHeap` with lazy deletion (min-heap via reversed
// ordering, same pattern as the event queue). Updating an area's cost pushes
// a fresh entry; entries whose area is no longer open, or whose cost no
// longer matches the area's current total cost, are skipped when popped.
// Ties pop in insertion order.
//
// `build_path` follows the nav-mesh search rules: blocked areas are never
// expanded, a search never steps straight back to the parent it came from,
// a negative cost from the `PathCost` marks a dead end, and the area closest
// to the goal is tracked so callers can build a partial path when the goal
// is unreachable.
//
// See also: `nav_mesh.rs` for the graph, `path.rs` which turns a search
// result into segments, `sim.rs` which owns a reusable context.

use crate::config::{LocomotionConfig, NavConfig};
use crate::geometry::{Direction, Vec3};
use crate::nav_area::{LadderConnection, NavArea, NavAttributes};
use crate::nav_ladder::NavLadder;
use crate::nav_mesh::{NAV_STEP_HEIGHT, NavMesh};
use crate::types::{AreaId, Team};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// How a search step entered an area from its parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraverseHow {
    /// Walked across the parent's side.
    Dir(Direction),
    LadderUp,
    LadderDown,
    /// Start of a route; no parent.
    #[default]
    None,
}

// ---------------------------------------------------------------------------
// SearchContext
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default)]
struct NodeScratch {
    /// Epoch in which this scratch was last written.
    touched: u32,
    marker: u32,
    open_marker: u32,
    cost_so_far: f32,
    total_cost: f32,
    path_length: f32,
    parent: Option<AreaId>,
    how: TraverseHow,
    /// Full id of the area this scratch was last written for.
    id: Option<AreaId>,
}

/// Entry in the open list (min-heap via reversed ordering).
struct OpenEntry {
    area: AreaId,
    total_cost: f32,
    seq: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest cost, then earliest insertion, is
        // "greatest".
        other
            .total_cost
            .total_cmp(&self.total_cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Per-search A* state.
#[derive(Default)]
pub struct SearchContext {
    nodes: Vec<NodeScratch>,
    master_marker: u32,
    open: BinaryHeap<OpenEntry>,
    open_count: usize,
    next_seq: u64,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch: every area becomes unmarked and not open. Scratch
    /// storage grows to cover `slot_count` areas.
    pub fn make_new_marker(&mut self, slot_count: usize) {
        if self.nodes.len() < slot_count {
            self.nodes.resize(slot_count, NodeScratch::default());
        }
        self.master_marker = self.master_marker.wrapping_add(1);
        if self.master_marker == 0 {
            // Wrapped: stale stamps could collide with the new epoch.
            for node in &mut self.nodes {
                node.touched = 0;
                node.marker = 0;
                node.open_marker = 0;
            }
            self.master_marker = 1;
        }
    }

    /// New epoch plus an empty open list.
    pub fn clear_search_lists(&mut self, slot_count: usize) {
        self.make_new_marker(slot_count);
        self.open.clear();
        self.open_count = 0;
        self.next_seq = 0;
    }

    fn node(&self, area: AreaId) -> Option<&NodeScratch> {
        self.nodes
            .get(area.slot())
            .filter(|n| n.id == Some(area) && n.touched == self.master_marker)
    }

    fn node_mut(&mut self, area: AreaId) -> &mut NodeScratch {
        if self.nodes.len() <= area.slot() {
            self.nodes.resize(area.slot() + 1, NodeScratch::default());
        }
        let marker = self.master_marker;
        let node = &mut self.nodes[area.slot()];
        if node.id != Some(area) || node.touched != marker {
            // First touch this epoch: reset stale values.
            *node = NodeScratch {
                touched: marker,
                id: Some(area),
                ..NodeScratch::default()
            };
        }
        node
    }

    pub fn mark(&mut self, area: AreaId) {
        let marker = self.master_marker;
        self.node_mut(area).marker = marker;
    }

    pub fn is_marked(&self, area: AreaId) -> bool {
        self.node(area).is_some_and(|n| n.marker == self.master_marker)
    }

    pub fn is_open(&self, area: AreaId) -> bool {
        self.node(area).is_some_and(|n| n.open_marker == self.master_marker)
    }

    pub fn is_closed(&self, area: AreaId) -> bool {
        self.is_marked(area) && !self.is_open(area)
    }

    pub fn is_open_list_empty(&self) -> bool {
        self.open_count == 0
    }

    /// Put `area` on the open list at its current total cost. Marks it.
    pub fn add_to_open_list(&mut self, area: AreaId) {
        let was_open = self.is_open(area);
        let marker = self.master_marker;
        let node = self.node_mut(area);
        node.marker = marker;
        node.open_marker = marker;
        let total_cost = node.total_cost;
        if !was_open {
            self.open_count += 1;
        }
        self.push_entry(area, total_cost);
    }

    /// Re-sort `area` after its total cost changed.
    pub fn update_on_open_list(&mut self, area: AreaId) {
        if !self.is_open(area) {
            return;
        }
        let total_cost = self.node_mut(area).total_cost;
        self.push_entry(area, total_cost);
    }

    pub fn remove_from_open_list(&mut self, area: AreaId) {
        if self.is_open(area) {
            self.node_mut(area).open_marker = 0;
            self.open_count -= 1;
        }
    }

    /// Remove and return the open area with the smallest total cost.
    pub fn pop_open_list(&mut self) -> Option<AreaId> {
        while let Some(entry) = self.open.pop() {
            let current = self
                .node(entry.area)
                .is_some_and(|n| n.open_marker == self.master_marker && n.total_cost.total_cmp(&entry.total_cost) == Ordering::Equal);
            if current {
                self.remove_from_open_list(entry.area);
                return Some(entry.area);
            }
        }
        None
    }

    pub fn add_to_closed_list(&mut self, area: AreaId) {
        self.mark(area);
    }

    /// Unmark a closed `area` so the search treats it as unvisited. Open
    /// areas are left as they are.
    pub fn remove_from_closed_list(&mut self, area: AreaId) {
        if self.is_closed(area) {
            self.node_mut(area).marker = 0;
        }
    }

    fn push_entry(&mut self, area: AreaId, total_cost: f32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.open.push(OpenEntry { area, total_cost, seq });
    }

    pub fn cost_so_far(&self, area: AreaId) -> f32 {
        self.node(area).map_or(0.0, |n| n.cost_so_far)
    }

    pub fn set_cost_so_far(&mut self, area: AreaId, cost: f32) {
        self.node_mut(area).cost_so_far = cost;
    }

    pub fn total_cost(&self, area: AreaId) -> f32 {
        self.node(area).map_or(0.0, |n| n.total_cost)
    }

    pub fn set_total_cost(&mut self, area: AreaId, cost: f32) {
        self.node_mut(area).total_cost = cost;
    }

    pub fn path_length(&self, area: AreaId) -> f32 {
        self.node(area).map_or(0.0, |n| n.path_length)
    }

    pub fn set_path_length(&mut self, area: AreaId, length: f32) {
        self.node_mut(area).path_length = length;
    }

    pub fn parent(&self, area: AreaId) -> Option<AreaId> {
        self.node(area).and_then(|n| n.parent)
    }

    pub fn parent_how(&self, area: AreaId) -> TraverseHow {
        self.node(area).map_or(TraverseHow::None, |n| n.how)
    }

    pub fn set_parent(&mut self, area: AreaId, parent: Option<AreaId>, how: TraverseHow) {
        let node = self.node_mut(area);
        node.parent = parent;
        node.how = how;
    }

    /// The route from the search start to `end`, following parent links.
    /// Each entry is an area and how it was entered.
    pub fn route_to(&self, end: AreaId) -> Vec<(AreaId, TraverseHow)> {
        let mut route = Vec::new();
        let mut current = Some(end);
        // Parent chains cannot be longer than the number of slots.
        let limit = self.nodes.len() + 1;
        while let Some(area) = current {
            if route.len() > limit {
                break;
            }
            route.push((area, self.parent_how(area)));
            current = self.parent(area);
        }
        route.reverse();
        route
    }
}

// ---------------------------------------------------------------------------
// Path costs
// ---------------------------------------------------------------------------

/// Inputs to a path cost evaluation for entering `area`.
pub struct CostQuery<'a> {
    pub area_id: AreaId,
    pub area: &'a NavArea,
    /// The area being expanded, or `None` for the search start.
    pub from: Option<(AreaId, &'a NavArea)>,
    pub from_cost_so_far: f32,
    /// The ladder used, if the step is a ladder traversal.
    pub ladder: Option<&'a NavLadder>,
    /// Stored connection length for floor steps.
    pub length: Option<f32>,
}

impl CostQuery<'_> {
    /// Distance covered by this step.
    pub fn step_distance(&self) -> f32 {
        if let Some(ladder) = self.ladder {
            return ladder.length();
        }
        match (self.length, self.from) {
            (Some(length), _) if length > 0.0 => length,
            (_, Some((_, from))) => (self.area.center() - from.center()).length(),
            _ => 0.0,
        }
    }
}

/// Cost of reaching an area. A negative result means the area cannot be
/// entered from there.
pub trait PathCost {
    fn cost(&self, mesh: &NavMesh, query: &CostQuery<'_>) -> f32;
}

/// Plain distance with penalties for crouch and jump areas.
#[derive(Clone, Debug)]
pub struct ShortestPathCost {
    pub crouch_penalty: f32,
    pub jump_penalty: f32,
}

impl ShortestPathCost {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            crouch_penalty: config.crouch_penalty,
            jump_penalty: config.jump_penalty,
        }
    }
}

impl Default for ShortestPathCost {
    fn default() -> Self {
        Self::new(&NavConfig::default())
    }
}

impl PathCost for ShortestPathCost {
    fn cost(&self, _mesh: &NavMesh, query: &CostQuery<'_>) -> f32 {
        if query.from.is_none() {
            return 0.0;
        }
        let dist = query.step_distance();
        let mut cost = dist + query.from_cost_so_far;
        if query.area.attributes.contains(NavAttributes::CROUCH) {
            cost += self.crouch_penalty * dist;
        }
        if query.area.attributes.contains(NavAttributes::JUMP) {
            cost += self.jump_penalty * dist;
        }
        cost
    }
}

const AVOID_PENALTY: f32 = 20.0;

/// Cost for a walking bot: rejects climbs above its jump height and drops
/// beyond its survivable fall, penalizes jumps and AVOID areas.
#[derive(Clone, Debug)]
pub struct BotPathCost {
    pub step_height: f32,
    pub max_jump_height: f32,
    pub death_drop_height: f32,
    pub jump_penalty: f32,
    pub avoid_penalty: f32,
    pub team: Team,
}

impl BotPathCost {
    pub fn new(locomotion: &LocomotionConfig, nav: &NavConfig, team: Team) -> Self {
        Self {
            step_height: locomotion.step_height,
            max_jump_height: locomotion.max_jump_height,
            death_drop_height: locomotion.death_drop_height,
            jump_penalty: nav.jump_penalty,
            avoid_penalty: AVOID_PENALTY,
            team,
        }
    }
}

impl PathCost for BotPathCost {
    fn cost(&self, mesh: &NavMesh, query: &CostQuery<'_>) -> f32 {
        let Some((from_id, _)) = query.from else {
            return 0.0;
        };
        if query.area.is_blocked(self.team) {
            return -1.0;
        }

        let dist = query.step_distance();
        let mut cost = dist + query.from_cost_so_far;

        if query.ladder.is_none() {
            let delta_z = mesh.compute_adjacent_connection_height_change(from_id, query.area_id);
            if delta_z >= self.step_height {
                if delta_z >= self.max_jump_height {
                    return -1.0;
                }
                cost += self.jump_penalty * dist;
            } else if delta_z < -self.death_drop_height {
                return -1.0;
            }
        }

        if query.area.attributes.contains(NavAttributes::AVOID) {
            cost += self.avoid_penalty * dist;
        }
        cost
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Result of `build_path`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchOutcome {
    /// True if the goal area (or an area containing the goal position) was
    /// reached.
    pub reached: bool,
    /// The goal on success; otherwise the visited area nearest the goal.
    pub closest_area: Option<AreaId>,
}

struct Neighbor {
    area: AreaId,
    how: TraverseHow,
    ladder: Option<crate::types::LadderId>,
    length: Option<f32>,
}

fn neighbors(mesh: &NavMesh, area: &NavArea) -> SmallVec<[Neighbor; 16]> {
    let mut out = SmallVec::new();

    for dir in Direction::ALL {
        for connect in area.adjacent_areas(dir) {
            out.push(Neighbor {
                area: connect.area,
                how: TraverseHow::Dir(dir),
                ladder: None,
                length: Some(connect.length),
            });
        }
    }

    // Up ladders lead to the top slots, except "behind", which is very hard
    // to reach when climbing.
    for &ladder_id in area.ladders(LadderConnection::Bottom) {
        let Some(ladder) = mesh.ladder(ladder_id) else { continue };
        for slot in [
            LadderConnection::TopForward,
            LadderConnection::TopLeft,
            LadderConnection::TopRight,
        ] {
            if let Some(top) = ladder.area(slot) {
                out.push(Neighbor {
                    area: top,
                    how: TraverseHow::LadderUp,
                    ladder: Some(ladder_id),
                    length: None,
                });
            }
        }
    }

    for slot in LadderConnection::ALL.into_iter().filter(|s| s.is_top()) {
        for &ladder_id in area.ladders(slot) {
            let Some(bottom) = mesh.ladder(ladder_id).and_then(|l| l.bottom_area()) else {
                continue;
            };
            out.push(Neighbor {
                area: bottom,
                how: TraverseHow::LadderDown,
                ladder: Some(ladder_id),
                length: None,
            });
        }
    }

    out
}

/// A* from `start` toward `goal` (or toward whichever area contains
/// `goal_pos` when `goal` is `None`). `max_path_length <= 0` means
/// unlimited. On return `ctx` holds the parent links; use
/// `SearchContext::route_to` to read the route.
#[allow(clippy::too_many_arguments)]
pub fn build_path<C: PathCost + ?Sized>(
    mesh: &NavMesh,
    ctx: &mut SearchContext,
    start: AreaId,
    goal: Option<AreaId>,
    goal_pos: Option<Vec3>,
    cost: &C,
    max_path_length: f32,
    team: Team,
) -> SearchOutcome {
    let Some(start_area) = mesh.area(start) else {
        return SearchOutcome {
            reached: false,
            closest_area: None,
        };
    };
    let mut outcome = SearchOutcome {
        reached: false,
        closest_area: Some(start),
    };

    ctx.clear_search_lists(mesh.area_slot_count());
    ctx.set_parent(start, None, TraverseHow::None);

    let goal = goal.filter(|g| mesh.area(*g).is_some_and(|a| !a.is_blocked(team)));
    let actual_goal_pos = match (goal_pos, goal.and_then(|g| mesh.area(g))) {
        (Some(pos), _) => pos,
        (None, Some(goal_area)) => goal_area.center(),
        (None, None) => return outcome,
    };

    if Some(start) == goal {
        outcome.reached = true;
        return outcome;
    }

    let init_cost = cost.cost(
        mesh,
        &CostQuery {
            area_id: start,
            area: start_area,
            from: None,
            from_cost_so_far: 0.0,
            ladder: None,
            length: None,
        },
    );
    if init_cost < 0.0 {
        return outcome;
    }

    let start_estimate = (start_area.center() - actual_goal_pos).length();
    ctx.set_total_cost(start, start_estimate);
    ctx.set_cost_so_far(start, init_cost);
    ctx.set_path_length(start, 0.0);
    ctx.add_to_open_list(start);

    let mut closest_dist = start_estimate;
    let have_max_length = max_path_length > 0.0;

    while let Some(area_id) = ctx.pop_open_list() {
        let Some(area) = mesh.area(area_id) else { continue };
        if area.is_blocked(team) {
            continue;
        }

        let at_goal = match goal {
            Some(g) => area_id == g,
            None => area.contains_point(actual_goal_pos, NAV_STEP_HEIGHT),
        };
        if at_goal {
            outcome.reached = true;
            outcome.closest_area = Some(area_id);
            return outcome;
        }

        let parent = ctx.parent(area_id);
        let area_cost = ctx.cost_so_far(area_id);

        for n in neighbors(mesh, area) {
            if Some(n.area) == parent || n.area == area_id {
                continue;
            }
            let Some(new_area) = mesh.area(n.area) else { continue };
            if new_area.is_blocked(team) {
                continue;
            }

            let mut new_cost = cost.cost(
                mesh,
                &CostQuery {
                    area_id: n.area,
                    area: new_area,
                    from: Some((area_id, area)),
                    from_cost_so_far: area_cost,
                    ladder: n.ladder.and_then(|l| mesh.ladder(l)),
                    length: n.length,
                },
            );
            if new_cost.is_nan() {
                new_cost = 1e30;
            }
            if new_cost < 0.0 {
                continue;
            }
            // Every step costs something, so equal-cost cycles cannot spin.
            new_cost = new_cost.max(area_cost * 1.00001 + 0.00001);

            let visited = ctx.is_open(n.area) || ctx.is_closed(n.area);
            if visited && ctx.cost_so_far(n.area) <= new_cost {
                continue;
            }

            if have_max_length {
                let new_length = ctx.path_length(area_id) + (new_area.center() - area.center()).length();
                if new_length > max_path_length {
                    continue;
                }
                ctx.set_path_length(n.area, new_length);
            }

            let remaining = (new_area.center() - actual_goal_pos).length();
            if remaining < closest_dist {
                closest_dist = remaining;
                outcome.closest_area = Some(n.area);
            }

            ctx.set_cost_so_far(n.area, new_cost);
            ctx.set_total_cost(n.area, new_cost + remaining);
            if ctx.is_open(n.area) {
                ctx.update_on_open_list(n.area);
            } else {
                ctx.add_to_open_list(n.area);
            }
            ctx.set_parent(n.area, Some(area_id), n.how);
        }

        ctx.add_to_closed_list(area_id);
    }

    outcome
}

/// Length of the cheapest route from `start` to `goal`, summed over area
/// centers, or `None` if the goal is unreachable.
pub fn travel_distance<C: PathCost + ?Sized>(
    mesh: &NavMesh,
    ctx: &mut SearchContext,
    start: AreaId,
    goal: AreaId,
    cost: &C,
) -> Option<f32> {
    if start == goal {
        return mesh.area(start).map(|_| 0.0);
    }
    let outcome = build_path(mesh, ctx, start, Some(goal), None, cost, 0.0, Team::Any);
    if !outcome.reached {
        return None;
    }
    let route = ctx.route_to(goal);
    let distance = route
        .windows(2)
        .filter_map(|w| Some((mesh.area(w[1].0)?.center() - mesh.area(w[0].0)?.center()).length()))
        .sum();
    Some(distance)
}

/// One request for `build_paths_parallel`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteRequest {
    pub start: AreaId,
    pub goal: AreaId,
    pub team: Team,
}

/// A computed route: the search outcome and the areas from start to the
/// goal (or to the closest reachable area on failure).
#[derive(Clone, Debug, PartialEq)]
pub struct RouteResult {
    pub outcome: SearchOutcome,
    pub route: Vec<(AreaId, TraverseHow)>,
}

/// Run independent searches concurrently, one `SearchContext` per worker.
/// Results are returned in request order.
pub fn build_paths_parallel<C: PathCost + Sync + ?Sized>(
    mesh: &NavMesh,
    requests: &[RouteRequest],
    cost: &C,
) -> Vec<RouteResult> {
    requests
        .par_iter()
        .map_init(SearchContext::new, |ctx, request| {
            let outcome = build_path(mesh, ctx, request.start, Some(request.goal), None, cost, 0.0, request.team);
            let route = outcome.closest_area.map(|end| ctx.route_to(end)).unwrap_or_default();
            RouteResult { outcome, route }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavConfig;
    use proptest::prelude::*;

    /// A `w` x `h` grid of 100-unit areas, fully connected to 4-neighbors.
    fn grid(w: usize, h: usize) -> (NavMesh, Vec<AreaId>) {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let mut ids = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let (x0, y0) = (x as f32 * 100.0, y as f32 * 100.0);
                ids.push(mesh.add_flat_area(x0, y0, x0 + 100.0, y0 + 100.0, 0.0).unwrap());
            }
        }
        for y in 0..h {
            for x in 0..w {
                let id = ids[y * w + x];
                if x + 1 < w {
                    mesh.connect_mutual(id, ids[y * w + x + 1], Direction::East).unwrap();
                }
                if y + 1 < h {
                    mesh.connect_mutual(id, ids[(y + 1) * w + x], Direction::South).unwrap();
                }
            }
        }
        (mesh, ids)
    }

    #[test]
    fn straight_route_across_grid() {
        let (mesh, ids) = grid(5, 1);
        let mut ctx = SearchContext::new();
        let outcome = build_path(&mesh, &mut ctx, ids[0], Some(ids[4]), None, &ShortestPathCost::default(), 0.0, Team::Any);
        assert!(outcome.reached);
        assert_eq!(outcome.closest_area, Some(ids[4]));
        let route = ctx.route_to(ids[4]);
        let areas: Vec<_> = route.iter().map(|(a, _)| *a).collect();
        assert_eq!(areas, ids);
        assert_eq!(route[0].1, TraverseHow::None);
        assert!(route[1..].iter().all(|(_, how)| *how == TraverseHow::Dir(Direction::East)));
    }

    #[test]
    fn start_equals_goal_is_trivially_reached() {
        let (mesh, ids) = grid(2, 1);
        let mut ctx = SearchContext::new();
        let outcome = build_path(&mesh, &mut ctx, ids[0], Some(ids[0]), None, &ShortestPathCost::default(), 0.0, Team::Any);
        assert!(outcome.reached);
        assert_eq!(ctx.route_to(ids[0]), vec![(ids[0], TraverseHow::None)]);
    }

    #[test]
    fn blocked_area_forces_detour() {
        let (mut mesh, ids) = grid(3, 2);
        // Block the middle of the top row.
        mesh.area_mut(ids[1]).unwrap().mark_as_blocked(Team::Id(0));
        let mut ctx = SearchContext::new();
        let outcome = build_path(&mesh, &mut ctx, ids[0], Some(ids[2]), None, &ShortestPathCost::default(), 0.0, Team::Id(0));
        assert!(outcome.reached);
        let areas: Vec<_> = ctx.route_to(ids[2]).iter().map(|(a, _)| *a).collect();
        assert_eq!(areas, vec![ids[0], ids[3], ids[4], ids[5], ids[2]]);

        // Another team is unaffected.
        build_path(&mesh, &mut ctx, ids[0], Some(ids[2]), None, &ShortestPathCost::default(), 0.0, Team::Id(1));
        assert_eq!(ctx.route_to(ids[2]).len(), 3);
    }

    #[test]
    fn unreachable_goal_reports_closest_area() {
        let (mut mesh, ids) = grid(3, 1);
        let island = mesh.add_flat_area(1000.0, 0.0, 1100.0, 100.0, 0.0).unwrap();
        let mut ctx = SearchContext::new();
        let outcome = build_path(&mesh, &mut ctx, ids[0], Some(island), None, &ShortestPathCost::default(), 0.0, Team::Any);
        assert!(!outcome.reached);
        assert_eq!(outcome.closest_area, Some(ids[2]));
    }

    #[test]
    fn one_way_connection_is_directional() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let a = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
        let b = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 0.0).unwrap();
        mesh.connect(a, b, Direction::East).unwrap();
        let mut ctx = SearchContext::new();
        let cost = ShortestPathCost::default();
        assert!(build_path(&mesh, &mut ctx, a, Some(b), None, &cost, 0.0, Team::Any).reached);
        assert!(!build_path(&mesh, &mut ctx, b, Some(a), None, &cost, 0.0, Team::Any).reached);
    }

    #[test]
    fn goal_position_without_goal_area() {
        let (mesh, ids) = grid(4, 1);
        let mut ctx = SearchContext::new();
        let target = Vec3::new(350.0, 50.0, 0.0);
        let outcome = build_path(&mesh, &mut ctx, ids[0], None, Some(target), &ShortestPathCost::default(), 0.0, Team::Any);
        assert!(outcome.reached);
        assert_eq!(outcome.closest_area, Some(ids[3]));
    }

    #[test]
    fn max_path_length_limits_search() {
        let (mesh, ids) = grid(6, 1);
        let mut ctx = SearchContext::new();
        let outcome = build_path(&mesh, &mut ctx, ids[0], Some(ids[5]), None, &ShortestPathCost::default(), 250.0, Team::Any);
        assert!(!outcome.reached);
        assert_eq!(outcome.closest_area, Some(ids[2]));
    }

    #[test]
    fn crouch_penalty_steers_around_crouch_areas() {
        let (mut mesh, ids) = grid(3, 2);
        mesh.area_mut(ids[1]).unwrap().attributes = NavAttributes::CROUCH;
        let mut ctx = SearchContext::new();
        build_path(&mesh, &mut ctx, ids[0], Some(ids[2]), None, &ShortestPathCost::default(), 0.0, Team::Any);
        let areas: Vec<_> = ctx.route_to(ids[2]).iter().map(|(a, _)| *a).collect();
        assert!(!areas.contains(&ids[1]));
    }

    #[test]
    fn bot_cost_rejects_unclimbable_ledges() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let low = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
        let high = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 250.0).unwrap();
        let step = mesh.add_flat_area(100.0, 100.0, 200.0, 200.0, 40.0).unwrap();
        mesh.connect_mutual(low, high, Direction::East).unwrap();
        mesh.connect_mutual(low, step, Direction::East).unwrap();
        let cost = BotPathCost::new(&LocomotionConfig::default(), &NavConfig::default(), Team::Id(0));
        let mut ctx = SearchContext::new();
        // 250 up exceeds the 180 jump height.
        assert!(!build_path(&mesh, &mut ctx, low, Some(high), None, &cost, 0.0, Team::Id(0)).reached);
        // 40 up is a jump but reachable.
        assert!(build_path(&mesh, &mut ctx, low, Some(step), None, &cost, 0.0, Team::Id(0)).reached);
        // 250 down exceeds the 200 death drop.
        assert!(!build_path(&mesh, &mut ctx, high, Some(low), None, &cost, 0.0, Team::Id(0)).reached);
    }

    #[test]
    fn ladders_connect_floors() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let bottom = mesh.add_flat_area(-50.0, 0.0, 50.0, 100.0, 0.0).unwrap();
        let top = mesh.add_flat_area(-50.0, -100.0, 50.0, 0.0, 200.0).unwrap();
        let ladder = mesh.add_ladder(Vec3::new(0.0, 0.0, 200.0), Vec3::ZERO, 30.0, Direction::South);
        mesh.connect_ladder(ladder, bottom).unwrap();
        mesh.connect_ladder(ladder, top).unwrap();
        let mut ctx = SearchContext::new();
        let cost = ShortestPathCost::default();

        assert!(build_path(&mesh, &mut ctx, bottom, Some(top), None, &cost, 0.0, Team::Any).reached);
        assert_eq!(ctx.parent_how(top), TraverseHow::LadderUp);
        assert_eq!(ctx.cost_so_far(top), 200.0);

        assert!(build_path(&mesh, &mut ctx, top, Some(bottom), None, &cost, 0.0, Team::Any).reached);
        assert_eq!(ctx.parent_how(bottom), TraverseHow::LadderDown);
    }

    #[test]
    fn travel_distance_sums_center_hops() {
        let (mesh, ids) = grid(4, 1);
        let mut ctx = SearchContext::new();
        let cost = ShortestPathCost::default();
        assert_eq!(travel_distance(&mesh, &mut ctx, ids[0], ids[3], &cost), Some(300.0));
        assert_eq!(travel_distance(&mesh, &mut ctx, ids[2], ids[2], &cost), Some(0.0));
    }

    #[test]
    fn parallel_results_match_sequential() {
        let (mesh, ids) = grid(6, 6);
        let requests: Vec<_> = (0..12)
            .map(|i| RouteRequest {
                start: ids[i],
                goal: ids[35 - i],
                team: Team::Any,
            })
            .collect();
        let cost = ShortestPathCost::default();
        let parallel = build_paths_parallel(&mesh, &requests, &cost);

        let mut ctx = SearchContext::new();
        for (request, result) in requests.iter().zip(&parallel) {
            let outcome = build_path(&mesh, &mut ctx, request.start, Some(request.goal), None, &cost, 0.0, request.team);
            assert_eq!(outcome, result.outcome);
            assert_eq!(ctx.route_to(request.goal), result.route);
        }
    }

    #[test]
    fn marker_epochs_isolate_searches() {
        let (mesh, ids) = grid(2, 1);
        let mut ctx = SearchContext::new();
        ctx.clear_search_lists(mesh.area_slot_count());
        ctx.mark(ids[0]);
        assert!(ctx.is_marked(ids[0]));
        assert!(ctx.is_closed(ids[0]));
        ctx.make_new_marker(mesh.area_slot_count());
        assert!(!ctx.is_marked(ids[0]));
        assert!(!ctx.is_open(ids[0]));
    }

    #[test]
    fn removing_from_closed_list_unmarks_area() {
        let (mesh, ids) = grid(2, 1);
        let mut ctx = SearchContext::new();
        ctx.clear_search_lists(mesh.area_slot_count());
        ctx.add_to_closed_list(ids[0]);
        ctx.add_to_open_list(ids[1]);
        assert!(ctx.is_closed(ids[0]));

        ctx.remove_from_closed_list(ids[0]);
        assert!(!ctx.is_closed(ids[0]));
        assert!(!ctx.is_marked(ids[0]));

        ctx.remove_from_closed_list(ids[1]);
        assert!(ctx.is_open(ids[1]));
        assert!(ctx.is_marked(ids[1]));
    }

    #[test]
    fn open_list_membership() {
        let (mesh, ids) = grid(3, 1);
        let mut ctx = SearchContext::new();
        ctx.clear_search_lists(mesh.area_slot_count());
        assert!(ctx.is_open_list_empty());
        ctx.set_total_cost(ids[0], 5.0);
        ctx.add_to_open_list(ids[0]);
        ctx.set_total_cost(ids[1], 3.0);
        ctx.add_to_open_list(ids[1]);
        assert!(ctx.is_open(ids[0]));
        assert!(!ctx.is_closed(ids[0]));
        ctx.remove_from_open_list(ids[1]);
        assert!(ctx.is_closed(ids[1]));
        assert_eq!(ctx.pop_open_list(), Some(ids[0]));
        assert!(ctx.is_open_list_empty());
        assert_eq!(ctx.pop_open_list(), None);
    }

    #[derive(Clone, Debug)]
    enum OpenOp {
        Add(usize, f32),
        Update(usize, f32),
        Remove(usize),
    }

    fn arb_op() -> impl Strategy<Value = OpenOp> {
        prop_oneof![
            (0usize..16, 0.0f32..1000.0).prop_map(|(i, c)| OpenOp::Add(i, c)),
            (0usize..16, 0.0f32..1000.0).prop_map(|(i, c)| OpenOp::Update(i, c)),
            (0usize..16).prop_map(OpenOp::Remove),
        ]
    }

    proptest! {
        /// Whatever mix of adds, cost updates and removals precedes it, the
        /// open list drains in non-decreasing total-cost order and yields
        /// exactly the areas still open.
        #[test]
        fn pop_order_is_non_decreasing(ops in prop::collection::vec(arb_op(), 0..64)) {
            let (mesh, ids) = grid(4, 4);
            let mut ctx = SearchContext::new();
            ctx.clear_search_lists(mesh.area_slot_count());

            for op in &ops {
                match *op {
                    OpenOp::Add(i, c) => {
                        if !ctx.is_open(ids[i]) {
                            ctx.set_total_cost(ids[i], c);
                            ctx.add_to_open_list(ids[i]);
                        }
                    }
                    OpenOp::Update(i, c) => {
                        if ctx.is_open(ids[i]) {
                            ctx.set_total_cost(ids[i], c);
                            ctx.update_on_open_list(ids[i]);
                        }
                    }
                    OpenOp::Remove(i) => ctx.remove_from_open_list(ids[i]),
                }
            }

            let expected: Vec<_> = ids.iter().filter(|id| ctx.is_open(**id)).copied().collect();
            let mut popped = Vec::new();
            let mut last = f32::NEG_INFINITY;
            while let Some(area) = ctx.pop_open_list() {
                let cost = ctx.total_cost(area);
                prop_assert!(cost >= last);
                last = cost;
                popped.push(area);
            }
            prop_assert!(ctx.is_open_list_empty());
            popped.sort();
            prop_assert_eq!(popped, expected);
        }
    }
}
