// Paths: an ordered list of segments plus a distance cursor.
//
// A `Path` is built either from an A* route (`compute`), from a straight
// start/goal pair (`build_trivial_path`), or from explicit waypoints
// (`from_waypoints`). Route construction walks the area sequence and places
// one point per transition (`compute_path_details`):
//
// - floor transitions cross the portal at the point nearest the previous
//   point, stepped a few units into the next area;
// - a drop taller than a step gets a `DropDown` point at the ledge plus a
//   landing point below it;
// - a climb taller than a step gets a base point plus a `ClimbUp` point on
//   top of the ledge;
// - areas that do not touch across their portal get a launch point plus a
//   `JumpOverGap` landing point;
// - ladders get a `LadderUp`/`LadderDown` mount point plus a dismount point
//   in the destination area.
//
// `post_process` then fills in each segment's forward vector, length,
// distance from the start and signed XY curvature.
//
// The cursor is a distance along the path. `cursor_data` interpolates the
// position, forward vector and curvature at the cursor and is cached until
// the cursor moves. `move_cursor_to_closest_position` with `SeekAhead` never
// moves the cursor backward, so a bot that drifts near an earlier stretch of
// a winding path does not rewind.
//
// See also: `pathfinding.rs` (the search), `path_follower.rs` (steering),
// `nav_mesh.rs` (portals, ladders).

use crate::config::LocomotionConfig;
use crate::geometry::{Direction, Vec2, Vec3, add_direction_vector, closest_point_on_segment, xy};
use crate::nav_area::{LadderConnection, NavArea};
use crate::nav_mesh::NavMesh;
use crate::pathfinding::{PathCost, SearchContext, TraverseHow, build_path};
use crate::types::{AreaId, LadderId, Team};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Distance a floor transition point is pushed into the next area.
const STEP_IN_DISTANCE: f32 = 5.0;

/// Areas further apart than this across their portal need a jump.
const GAP_TOLERANCE: f32 = 1.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    #[default]
    OnGround,
    DropDown,
    ClimbUp,
    JumpOverGap,
    LadderUp,
    LadderDown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Area this point lies in, if the path was built on the mesh.
    pub area: Option<AreaId>,
    /// How `area` was entered.
    pub how: TraverseHow,
    pub pos: Vec3,
    pub ladder: Option<LadderId>,
    pub kind: SegmentType,
    /// Unit direction to the next point.
    pub forward: Vec3,
    /// Distance to the next point.
    pub length: f32,
    pub distance_from_start: f32,
    /// Signed turn in the XY plane arriving at this point, in [-1, 1];
    /// positive turns left.
    pub curvature: f32,
}

impl Segment {
    pub fn at(pos: Vec3) -> Self {
        Self {
            area: None,
            how: TraverseHow::None,
            pos,
            ladder: None,
            kind: SegmentType::OnGround,
            forward: Vec3::ZERO,
            length: 0.0,
            distance_from_start: 0.0,
            curvature: 0.0,
        }
    }

    fn in_area(area: AreaId, how: TraverseHow, pos: Vec3, kind: SegmentType) -> Self {
        Self {
            area: Some(area),
            how,
            kind,
            ..Self::at(pos)
        }
    }
}

/// Outcome of `Path::compute`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeResult {
    Complete,
    /// The goal is unreachable; the path ends at the closest reachable area.
    Partial,
    NoPath,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekType {
    /// Search forward from the cursor; the cursor never moves back.
    SeekAhead,
    SeekEntirePath,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveCursorType {
    Absolute,
    Relative,
}

/// Interpolated state at the cursor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorData {
    pub pos: Vec3,
    pub forward: Vec3,
    pub curvature: f32,
    /// Index of the segment whose span contains the cursor.
    pub segment_prior: Option<usize>,
}

/// Parameters for building a path on the mesh.
#[derive(Clone, Debug)]
pub struct ComputeParams {
    pub team: Team,
    /// Zero or less means unlimited.
    pub max_path_length: f32,
    pub step_height: f32,
    pub hull_width: f32,
    /// Build a path to the closest area when the goal is unreachable.
    pub allow_partial: bool,
}

impl ComputeParams {
    pub fn new(config: &LocomotionConfig, team: Team) -> Self {
        Self {
            team,
            max_path_length: 0.0,
            step_height: config.step_height,
            hull_width: config.hull_width,
            allow_partial: true,
        }
    }
}

impl Default for ComputeParams {
    fn default() -> Self {
        Self::new(&LocomotionConfig::default(), Team::Any)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Path {
    segments: Vec<Segment>,
    cursor_pos: f32,
    cursor_data: Option<CursorData>,
    timestamp: f32,
    /// Bumped on every successful build.
    generation: u64,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Search the mesh from `start` to `goal` and build the path.
    #[allow(clippy::too_many_arguments)]
    pub fn compute<C: PathCost + ?Sized>(
        &mut self,
        mesh: &NavMesh,
        ctx: &mut SearchContext,
        start: Vec3,
        goal: Vec3,
        cost: &C,
        params: &ComputeParams,
        now: f32,
    ) -> ComputeResult {
        self.invalidate();

        let Some(start_area) = mesh.nearest_nav_area(start, params.hull_width * 4.0) else {
            debug!(?start, "path start is off the mesh");
            return ComputeResult::NoPath;
        };
        let goal_area = mesh.nearest_nav_area(goal, params.hull_width * 4.0);

        if Some(start_area) == goal_area {
            self.build_trivial_path(start, goal, now);
            return ComputeResult::Complete;
        }

        let outcome = build_path(
            mesh,
            ctx,
            start_area,
            goal_area,
            Some(goal),
            cost,
            params.max_path_length,
            params.team,
        );

        let Some(end_area) = outcome.closest_area else {
            return ComputeResult::NoPath;
        };
        if !outcome.reached && (!params.allow_partial || end_area == start_area) {
            debug!(start = %start_area, ?goal, "no path to goal");
            return ComputeResult::NoPath;
        }

        let route = ctx.route_to(end_area);
        let end_pos = if outcome.reached {
            goal
        } else {
            mesh.area(end_area).map_or(goal, |a| a.center())
        };

        self.segments = route
            .iter()
            .map(|&(area, how)| Segment::in_area(area, how, Vec3::ZERO, SegmentType::OnGround))
            .collect();
        if let Some(first) = self.segments.first_mut() {
            first.pos = start;
            if let Some(area) = mesh.area(start_area) {
                first.pos.z = area.get_z_at(start);
            }
        }

        if !self.compute_path_details(mesh, params) {
            self.invalidate();
            return ComputeResult::NoPath;
        }

        // Append the end point.
        let mut end = Segment::in_area(end_area, TraverseHow::None, end_pos, SegmentType::OnGround);
        if let Some(area) = mesh.area(end_area) {
            end.pos.z = area.get_z_at(end_pos);
        }
        self.segments.push(end);

        self.post_process();
        self.timestamp = now;
        self.generation += 1;

        let result = if outcome.reached {
            ComputeResult::Complete
        } else {
            ComputeResult::Partial
        };
        debug!(
            start = %start_area,
            end = %end_area,
            segments = self.segments.len(),
            length = self.length(),
            ?result,
            "computed path"
        );
        result
    }

    /// A direct two-point path.
    pub fn build_trivial_path(&mut self, start: Vec3, goal: Vec3, now: f32) {
        self.from_waypoints(&[start, goal], now);
    }

    /// A path through the given points, all on the ground. Fewer than two
    /// points leaves the path invalid.
    pub fn from_waypoints(&mut self, points: &[Vec3], now: f32) {
        self.invalidate();
        if points.len() < 2 {
            return;
        }
        self.segments = points.iter().map(|p| Segment::at(*p)).collect();
        self.post_process();
        self.timestamp = now;
        self.generation += 1;
    }

    /// Replace the route placeholders (one per area, positions unset except
    /// the first) with placed points, inserting extra points for drops,
    /// climbs, gaps and ladders. Returns false if the route references an
    /// area or ladder that no longer exists.
    pub fn compute_path_details(&mut self, mesh: &NavMesh, params: &ComputeParams) -> bool {
        let route = std::mem::take(&mut self.segments);
        let Some(first) = route.first() else {
            return false;
        };
        let mut out = vec![first.clone()];

        for step in route.windows(2) {
            let (Some(from_id), Some(to_id)) = (step[0].area, step[1].area) else {
                return false;
            };
            let (Some(from), Some(to)) = (mesh.area(from_id), mesh.area(to_id)) else {
                return false;
            };
            let prev_pos = out.last().map_or(from.center(), |s| s.pos);

            match step[1].how {
                TraverseHow::Dir(dir) => {
                    let portal = mesh
                        .closest_point_in_portal(from_id, to_id, dir, prev_pos)
                        .unwrap_or_else(|| to.center());
                    let gap = separation(from, to, dir);

                    if gap > GAP_TOLERANCE {
                        let mut launch = from.closest_point_on_area(portal);
                        launch.z = from.get_z_at(launch);
                        let mut landing = add_direction_vector(to.closest_point_on_area(portal), dir, STEP_IN_DISTANCE);
                        landing.z = to.get_z_at(landing);
                        out.push(Segment::in_area(from_id, step[1].how, launch, SegmentType::OnGround));
                        out.push(Segment::in_area(to_id, step[1].how, landing, SegmentType::JumpOverGap));
                        continue;
                    }

                    let mut inside = add_direction_vector(portal, dir, STEP_IN_DISTANCE);
                    let edge_z = from.get_z_at(portal);
                    let beyond_z = to.get_z_at(inside);
                    let delta = beyond_z - edge_z;

                    if delta > params.step_height {
                        let mut base = portal;
                        base.z = edge_z;
                        inside.z = beyond_z;
                        out.push(Segment::in_area(from_id, step[1].how, base, SegmentType::OnGround));
                        out.push(Segment::in_area(to_id, step[1].how, inside, SegmentType::ClimbUp));
                    } else if delta < -params.step_height {
                        let mut ledge = portal;
                        ledge.z = edge_z;
                        let mut landing = add_direction_vector(portal, dir, params.hull_width);
                        landing.z = to.get_z_at(landing);
                        out.push(Segment::in_area(to_id, step[1].how, ledge, SegmentType::DropDown));
                        out.push(Segment::in_area(to_id, step[1].how, landing, SegmentType::OnGround));
                    } else {
                        inside.z = beyond_z;
                        out.push(Segment::in_area(to_id, step[1].how, inside, SegmentType::OnGround));
                    }
                }
                TraverseHow::LadderUp => {
                    let Some(ladder_id) = from
                        .ladders(LadderConnection::Bottom)
                        .iter()
                        .copied()
                        .find(|l| mesh.ladder(*l).is_some_and(|l| l.top_areas().any(|a| a == to_id)))
                    else {
                        return false;
                    };
                    let Some(ladder) = mesh.ladder(ladder_id) else {
                        return false;
                    };
                    let mut mount = ladder.bottom + ladder.normal() * params.hull_width;
                    mount.z = from.get_z_at(mount);
                    let mut dismount = to.closest_point_on_area(ladder.top - ladder.normal() * params.hull_width);
                    dismount.z = to.get_z_at(dismount);
                    let mut seg = Segment::in_area(to_id, TraverseHow::LadderUp, mount, SegmentType::LadderUp);
                    seg.ladder = Some(ladder_id);
                    out.push(seg);
                    out.push(Segment::in_area(to_id, TraverseHow::LadderUp, dismount, SegmentType::OnGround));
                }
                TraverseHow::LadderDown => {
                    let ladder_id = LadderConnection::ALL
                        .into_iter()
                        .filter(|slot| slot.is_top())
                        .flat_map(|slot| from.ladders(slot).iter().copied())
                        .find(|l| mesh.ladder(*l).is_some_and(|l| l.bottom_area() == Some(to_id)));
                    let Some(ladder) = ladder_id.and_then(|l| mesh.ladder(l)) else {
                        return false;
                    };
                    let mut mount = from.closest_point_on_area(ladder.top - ladder.normal() * params.hull_width);
                    mount.z = from.get_z_at(mount);
                    let mut dismount = ladder.bottom + ladder.normal() * params.hull_width;
                    dismount.z = to.get_z_at(dismount);
                    let mut seg = Segment::in_area(to_id, TraverseHow::LadderDown, mount, SegmentType::LadderDown);
                    seg.ladder = ladder_id;
                    out.push(seg);
                    out.push(Segment::in_area(to_id, TraverseHow::LadderDown, dismount, SegmentType::OnGround));
                }
                TraverseHow::None => {
                    let mut pos = to.center();
                    pos.z = to.get_z_at(pos);
                    out.push(Segment::in_area(to_id, TraverseHow::None, pos, SegmentType::OnGround));
                }
            }
        }

        self.segments = out;
        true
    }

    /// Fill in forward vectors, lengths, cumulative distances and curvature.
    pub fn post_process(&mut self) {
        self.cursor_data = None;
        let count = self.segments.len();
        if count == 0 {
            return;
        }

        for i in 0..count - 1 {
            let to = self.segments[i + 1].pos - self.segments[i].pos;
            let seg = &mut self.segments[i];
            seg.length = to.length();
            seg.forward = to.normalize_or_zero();
        }
        if count >= 2 {
            let forward = self.segments[count - 2].forward;
            let last = &mut self.segments[count - 1];
            last.forward = forward;
            last.length = 0.0;
        }

        let mut distance = 0.0;
        for seg in &mut self.segments {
            seg.distance_from_start = distance;
            distance += seg.length;
        }

        self.segments[0].curvature = 0.0;
        for i in 1..count {
            let from = &self.segments[i - 1];
            let to = &self.segments[i];
            let curvature = if from.kind != SegmentType::OnGround || i == count - 1 {
                0.0
            } else {
                let a = xy(from.forward).normalize_or_zero();
                let b = xy(to.forward).normalize_or_zero();
                let turn = 0.5 * (1.0 - a.dot(b));
                // Left of travel is (y, -x) with north at -y.
                let left = Vec2::new(a.y, -a.x);
                if b.dot(left) < 0.0 { -turn } else { turn }
            };
            self.segments[i].curvature = curvature;
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_valid(&self) -> bool {
        !self.segments.is_empty()
    }

    pub fn invalidate(&mut self) {
        self.segments.clear();
        self.cursor_pos = 0.0;
        self.cursor_data = None;
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn length(&self) -> f32 {
        self.segments.last().map_or(0.0, |s| s.distance_from_start)
    }

    pub fn start_position(&self) -> Option<Vec3> {
        self.segments.first().map(|s| s.pos)
    }

    pub fn end_position(&self) -> Option<Vec3> {
        self.segments.last().map(|s| s.pos)
    }

    /// Seconds since the path was built.
    pub fn age(&self, now: f32) -> f32 {
        now - self.timestamp
    }

    /// Count of successful builds over this path's lifetime. Lets a caller
    /// tell whether a callback rebuilt the path in place.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Point at `distance` along the path, clamped to the ends.
    pub fn position_at(&self, distance: f32) -> Option<Vec3> {
        Some(self.interpolate(distance)?.pos)
    }

    /// Point on the path nearest to `pos`.
    pub fn closest_position(&self, pos: Vec3) -> Option<Vec3> {
        let (_, point) = self.closest_along(pos, 0, 0.0)?;
        Some(point)
    }

    /// Distance along the path and position of the closest point to `pos`,
    /// scanning from segment `first` for at most `along_limit` (unlimited
    /// when zero or less).
    fn closest_along(&self, pos: Vec3, first: usize, along_limit: f32) -> Option<(f32, Vec3)> {
        let first_seg = self.segments.get(first)?;
        if self.segments.len() == 1 {
            return Some((0.0, first_seg.pos));
        }
        let mut best: Option<(f32, f32, Vec3)> = None;
        let start_distance = first_seg.distance_from_start;
        for i in first..self.segments.len() - 1 {
            let seg = &self.segments[i];
            if along_limit > 0.0 && seg.distance_from_start - start_distance > along_limit {
                break;
            }
            let (point, t) = closest_point_on_segment(pos, seg.pos, self.segments[i + 1].pos);
            let dist_sq = (point - pos).length_squared();
            if best.is_none_or(|(d, _, _)| dist_sq < d) {
                best = Some((dist_sq, seg.distance_from_start + t * seg.length, point));
            }
        }
        best.map(|(_, along, point)| (along, point))
    }

    fn segment_index_at(&self, distance: f32) -> Option<usize> {
        if self.segments.is_empty() {
            return None;
        }
        let last_span = self.segments.len().saturating_sub(2);
        let index = self
            .segments
            .partition_point(|s| s.distance_from_start <= distance)
            .saturating_sub(1);
        Some(index.min(last_span))
    }

    fn interpolate(&self, distance: f32) -> Option<CursorData> {
        let index = self.segment_index_at(distance)?;
        let seg = &self.segments[index];
        let Some(next) = self.segments.get(index + 1) else {
            return Some(CursorData {
                pos: seg.pos,
                forward: seg.forward,
                curvature: seg.curvature,
                segment_prior: Some(index),
            });
        };
        let t = if seg.length > 0.0 {
            ((distance - seg.distance_from_start) / seg.length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(CursorData {
            pos: seg.pos.lerp(next.pos, t),
            forward: seg.forward,
            curvature: seg.curvature + (next.curvature - seg.curvature) * t,
            segment_prior: Some(index),
        })
    }

    // -----------------------------------------------------------------------
    // Cursor
    // -----------------------------------------------------------------------

    pub fn cursor_position(&self) -> f32 {
        self.cursor_pos
    }

    pub fn move_cursor_to_start(&mut self) {
        self.set_cursor(0.0);
    }

    pub fn move_cursor_to_end(&mut self) {
        self.set_cursor(self.length());
    }

    pub fn move_cursor(&mut self, value: f32, kind: MoveCursorType) {
        let target = match kind {
            MoveCursorType::Absolute => value,
            MoveCursorType::Relative => self.cursor_pos + value,
        };
        self.set_cursor(target);
    }

    /// Put the cursor at the path point nearest `pos`. With `SeekAhead` the
    /// search starts at the cursor's segment and the cursor never moves
    /// backward. `along_limit` bounds how far along the path to search
    /// (unlimited when zero or less).
    pub fn move_cursor_to_closest_position(&mut self, pos: Vec3, seek: SeekType, along_limit: f32) {
        let first = match seek {
            SeekType::SeekEntirePath => 0,
            SeekType::SeekAhead => self.segment_index_at(self.cursor_pos).unwrap_or(0),
        };
        let Some((along, _)) = self.closest_along(pos, first, along_limit) else {
            return;
        };
        let target = match seek {
            SeekType::SeekAhead => along.max(self.cursor_pos),
            SeekType::SeekEntirePath => along,
        };
        self.set_cursor(target);
    }

    fn set_cursor(&mut self, value: f32) {
        let clamped = value.clamp(0.0, self.length());
        if clamped != self.cursor_pos {
            self.cursor_data = None;
        }
        self.cursor_pos = clamped;
    }

    /// Interpolated state at the cursor; `None` for an invalid path.
    pub fn cursor_data(&mut self) -> Option<CursorData> {
        if self.cursor_data.is_none() {
            self.cursor_data = self.interpolate(self.cursor_pos);
        }
        self.cursor_data
    }
}

/// Gap between `from` and `to` measured along `dir`; zero or negative when
/// they touch or overlap.
fn separation(from: &NavArea, to: &NavArea, dir: Direction) -> f32 {
    let (f_nw, f_se, t_nw, t_se) = (from.nw_corner(), from.se_corner(), to.nw_corner(), to.se_corner());
    match dir {
        Direction::East => t_nw.x - f_se.x,
        Direction::West => f_nw.x - t_se.x,
        Direction::South => t_nw.y - f_se.y,
        Direction::North => f_nw.y - t_se.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavConfig;
    use crate::pathfinding::ShortestPathCost;
    use proptest::prelude::*;

    fn row(count: usize) -> (NavMesh, Vec<AreaId>) {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let ids: Vec<_> = (0..count)
            .map(|i| {
                let x0 = i as f32 * 100.0;
                mesh.add_flat_area(x0, 0.0, x0 + 100.0, 100.0, 0.0).unwrap()
            })
            .collect();
        for pair in ids.windows(2) {
            mesh.connect_mutual(pair[0], pair[1], Direction::East).unwrap();
        }
        (mesh, ids)
    }

    fn compute(mesh: &NavMesh, start: Vec3, goal: Vec3) -> (Path, ComputeResult) {
        let mut path = Path::new();
        let mut ctx = SearchContext::new();
        let result = path.compute(mesh, &mut ctx, start, goal, &ShortestPathCost::default(), &ComputeParams::default(), 1.0);
        (path, result)
    }

    #[test]
    fn waypoint_path_distances() {
        let mut path = Path::new();
        path.from_waypoints(
            &[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), Vec3::new(100.0, 50.0, 0.0)],
            0.0,
        );
        assert!(path.is_valid());
        assert_eq!(path.length(), 150.0);
        let segs = path.segments();
        assert_eq!(segs[1].distance_from_start, 100.0);
        assert_eq!(segs[0].forward, Vec3::X);
        assert_eq!(segs[1].forward, Vec3::Y);
        assert_eq!(segs[2].forward, Vec3::Y);
        assert_eq!(path.position_at(125.0), Some(Vec3::new(100.0, 25.0, 0.0)));
        assert_eq!(path.position_at(1000.0), Some(Vec3::new(100.0, 50.0, 0.0)));
        assert_eq!(path.end_position(), Some(Vec3::new(100.0, 50.0, 0.0)));
    }

    #[test]
    fn curvature_sign_follows_turn_direction() {
        let mut path = Path::new();
        // East then south (+y) is a right turn with north at -y.
        path.from_waypoints(
            &[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), Vec3::new(100.0, 100.0, 0.0), Vec3::new(100.0, 200.0, 0.0)],
            0.0,
        );
        assert!((path.segments()[1].curvature + 0.5).abs() < 1e-5);

        path.from_waypoints(
            &[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), Vec3::new(100.0, -100.0, 0.0), Vec3::new(100.0, -200.0, 0.0)],
            0.0,
        );
        assert!((path.segments()[1].curvature - 0.5).abs() < 1e-5);
    }

    #[test]
    fn single_point_is_invalid() {
        let mut path = Path::new();
        path.from_waypoints(&[Vec3::ZERO], 0.0);
        assert!(!path.is_valid());
        assert_eq!(path.cursor_data(), None);
    }

    #[test]
    fn compute_across_row() {
        let (mesh, ids) = row(3);
        let (path, result) = compute(&mesh, Vec3::new(50.0, 50.0, 0.0), Vec3::new(250.0, 50.0, 0.0));
        assert_eq!(result, ComputeResult::Complete);
        let segs = path.segments();
        assert_eq!(segs.first().unwrap().pos, Vec3::new(50.0, 50.0, 0.0));
        assert_eq!(segs.last().unwrap().pos, Vec3::new(250.0, 50.0, 0.0));
        assert_eq!(segs.last().unwrap().area, Some(ids[2]));
        // Portal points stepped into the next area.
        assert_eq!(segs[1].pos, Vec3::new(105.0, 50.0, 0.0));
        assert_eq!(segs[2].pos, Vec3::new(205.0, 50.0, 0.0));
        assert!(segs.iter().all(|s| s.kind == SegmentType::OnGround));
        assert!((path.length() - 200.0).abs() < 1e-3);
        assert_eq!(path.age(1.5), 0.5);
    }

    #[test]
    fn same_area_builds_trivial_path() {
        let (mesh, _) = row(1);
        let (path, result) = compute(&mesh, Vec3::new(10.0, 10.0, 0.0), Vec3::new(90.0, 10.0, 0.0));
        assert_eq!(result, ComputeResult::Complete);
        assert_eq!(path.segments().len(), 2);
    }

    #[test]
    fn off_mesh_start_has_no_path() {
        let (mesh, _) = row(2);
        let (path, result) = compute(&mesh, Vec3::new(5000.0, 0.0, 0.0), Vec3::new(50.0, 50.0, 0.0));
        assert_eq!(result, ComputeResult::NoPath);
        assert!(!path.is_valid());
    }

    #[test]
    fn unreachable_goal_builds_partial_path() {
        let (mut mesh, ids) = row(3);
        let island = mesh.add_flat_area(1000.0, 0.0, 1100.0, 100.0, 0.0).unwrap();
        let (path, result) = compute(&mesh, Vec3::new(50.0, 50.0, 0.0), Vec3::new(1050.0, 50.0, 0.0));
        assert_eq!(result, ComputeResult::Partial);
        let end = path.segments().last().unwrap();
        assert_eq!(end.area, Some(ids[2]));
        assert_ne!(end.area, Some(island));
        assert_eq!(end.pos, Vec3::new(250.0, 50.0, 0.0));

        let mut strict = Path::new();
        let params = ComputeParams {
            allow_partial: false,
            ..ComputeParams::default()
        };
        let result = strict.compute(
            &mesh,
            &mut SearchContext::new(),
            Vec3::new(50.0, 50.0, 0.0),
            Vec3::new(1050.0, 50.0, 0.0),
            &ShortestPathCost::default(),
            &params,
            0.0,
        );
        assert_eq!(result, ComputeResult::NoPath);
    }

    #[test]
    fn drop_down_inserts_landing_point() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let high = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 100.0).unwrap();
        let low = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 0.0).unwrap();
        mesh.connect(high, low, Direction::East).unwrap();
        let (path, result) = compute(&mesh, Vec3::new(50.0, 50.0, 100.0), Vec3::new(150.0, 50.0, 0.0));
        assert_eq!(result, ComputeResult::Complete);
        let kinds: Vec<_> = path.segments().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SegmentType::OnGround, SegmentType::DropDown, SegmentType::OnGround, SegmentType::OnGround]);
        let ledge = &path.segments()[1];
        assert_eq!(ledge.pos, Vec3::new(100.0, 50.0, 100.0));
        assert_eq!(path.segments()[2].pos.z, 0.0);
    }

    #[test]
    fn climb_inserts_base_and_top() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let low = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
        let high = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 60.0).unwrap();
        mesh.connect(low, high, Direction::East).unwrap();
        let (path, _) = compute(&mesh, Vec3::new(50.0, 50.0, 0.0), Vec3::new(150.0, 50.0, 60.0));
        let segs = path.segments();
        assert_eq!(segs[1].kind, SegmentType::OnGround);
        assert_eq!(segs[1].pos, Vec3::new(100.0, 50.0, 0.0));
        assert_eq!(segs[2].kind, SegmentType::ClimbUp);
        assert_eq!(segs[2].pos, Vec3::new(105.0, 50.0, 60.0));
    }

    #[test]
    fn gap_inserts_launch_and_landing() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let a = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
        let b = mesh.add_flat_area(150.0, 0.0, 250.0, 100.0, 0.0).unwrap();
        mesh.connect(a, b, Direction::East).unwrap();
        let (path, _) = compute(&mesh, Vec3::new(50.0, 50.0, 0.0), Vec3::new(200.0, 50.0, 0.0));
        let segs = path.segments();
        assert_eq!(segs[1].pos, Vec3::new(100.0, 50.0, 0.0));
        assert_eq!(segs[2].kind, SegmentType::JumpOverGap);
        assert_eq!(segs[2].pos, Vec3::new(155.0, 50.0, 0.0));
    }

    #[test]
    fn ladder_route_has_mount_and_dismount() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let bottom = mesh.add_flat_area(-50.0, 0.0, 50.0, 100.0, 0.0).unwrap();
        let top = mesh.add_flat_area(-50.0, -100.0, 50.0, 0.0, 200.0).unwrap();
        let ladder = mesh.add_ladder(Vec3::new(0.0, 0.0, 200.0), Vec3::ZERO, 30.0, Direction::South);
        mesh.connect_ladder(ladder, bottom).unwrap();
        mesh.connect_ladder(ladder, top).unwrap();

        let (path, result) = compute(&mesh, Vec3::new(0.0, 80.0, 0.0), Vec3::new(0.0, -50.0, 200.0));
        assert_eq!(result, ComputeResult::Complete);
        let segs = path.segments();
        let mount = segs.iter().find(|s| s.kind == SegmentType::LadderUp).unwrap();
        assert_eq!(mount.ladder, Some(ladder));
        assert_eq!(mount.pos, Vec3::new(0.0, 26.0, 0.0));
        assert_eq!(segs.last().unwrap().pos.z, 200.0);

        let (down, _) = compute(&mesh, Vec3::new(0.0, -50.0, 200.0), Vec3::new(0.0, 80.0, 0.0));
        assert!(down.segments().iter().any(|s| s.kind == SegmentType::LadderDown && s.ladder == Some(ladder)));
    }

    #[test]
    fn cursor_moves_and_clamps() {
        let mut path = Path::new();
        path.from_waypoints(&[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), Vec3::new(200.0, 0.0, 0.0)], 0.0);
        path.move_cursor(150.0, MoveCursorType::Absolute);
        let data = path.cursor_data().unwrap();
        assert_eq!(data.pos, Vec3::new(150.0, 0.0, 0.0));
        assert_eq!(data.segment_prior, Some(1));
        path.move_cursor(100.0, MoveCursorType::Relative);
        assert_eq!(path.cursor_position(), 200.0);
        path.move_cursor_to_start();
        assert_eq!(path.cursor_data().unwrap().pos, Vec3::ZERO);
        path.move_cursor_to_end();
        assert_eq!(path.cursor_data().unwrap().segment_prior, Some(1));
    }

    #[test]
    fn seek_ahead_never_rewinds() {
        // A hairpin: out east, back west just south of the way out.
        let mut path = Path::new();
        path.from_waypoints(
            &[Vec3::ZERO, Vec3::new(200.0, 0.0, 0.0), Vec3::new(200.0, 20.0, 0.0), Vec3::new(0.0, 20.0, 0.0)],
            0.0,
        );
        path.move_cursor_to_closest_position(Vec3::new(50.0, 18.0, 0.0), SeekType::SeekEntirePath, 0.0);
        let on_return = path.cursor_position();
        assert!(on_return > 220.0);

        // Near the outbound leg, but seeking ahead keeps the cursor put.
        path.move_cursor_to_closest_position(Vec3::new(50.0, 0.0, 0.0), SeekType::SeekAhead, 0.0);
        assert_eq!(path.cursor_position(), on_return);

        // The entire-path seek goes back.
        path.move_cursor_to_closest_position(Vec3::new(50.0, 0.0, 0.0), SeekType::SeekEntirePath, 0.0);
        assert_eq!(path.cursor_position(), 50.0);
    }

    #[test]
    fn closest_position_projects_onto_path() {
        let mut path = Path::new();
        path.from_waypoints(&[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)], 0.0);
        assert_eq!(path.closest_position(Vec3::new(40.0, 30.0, 0.0)), Some(Vec3::new(40.0, 0.0, 0.0)));
    }

    proptest! {
        /// Advancing positions along a straight multi-waypoint path never
        /// move a seek-ahead cursor backward.
        #[test]
        fn seek_ahead_cursor_is_monotonic(
            steps in prop::collection::vec(1.0f32..40.0, 1..30),
            lateral in prop::collection::vec(-30.0f32..30.0, 30),
            count in 2usize..8,
        ) {
            let points: Vec<_> = (0..count).map(|i| Vec3::new(i as f32 * 100.0, 0.0, 0.0)).collect();
            let mut path = Path::new();
            path.from_waypoints(&points, 0.0);

            let mut x = 0.0;
            let mut last = path.cursor_position();
            for (i, step) in steps.iter().enumerate() {
                x += step;
                path.move_cursor_to_closest_position(Vec3::new(x, lateral[i], 0.0), SeekType::SeekAhead, 0.0);
                let cursor = path.cursor_position();
                prop_assert!(cursor >= last);
                last = cursor;
            }
        }
    }
}
