// Path following: steer a bot along a `Path` through its locomotion.
//
// Each update the follower:
//
// 1. Syncs the path cursor to the point nearest the bot's feet, seeking
//    ahead only.
// 2. Declares success when the grounded bot is within `goal_tolerance` of
//    the end in XY. The actor's success callback may rebuild the path in
//    place; the follower drops the path afterward unless it was rebuilt.
// 3. Starts a maneuver when the bot reaches the point where one begins:
//    mounting a ladder, jumping a gap, climbing a ledge.
//    While a jump or ledge climb is in flight it leaves the bot ballistic.
// 4. Picks a look-ahead point on the path, starting `min_look_ahead_range`
//    past the cursor and pulling back by `look_ahead_step` until the
//    straight line there is potentially traversable. Look-ahead never runs
//    past the start of the next maneuver.
// 5. Fails with `Stuck` once locomotion has been stuck longer than
//    `stuck_failure_time`, and with `FellOff` when the bot ends up far below
//    the path.
// 6. Hands the look-ahead point to `GroundLocomotion::approach`.
//
// See also: `path.rs`, `locomotion.rs`, `actor.rs` (success and failure
// callbacks), `sim.rs` (drives one follower per bot).

use crate::actor::MoveToFailure;
use crate::config::PathFollowerConfig;
use crate::geometry::{Vec3, xy};
use crate::locomotion::{GroundLocomotion, LocomotionContext};
use crate::nav_mesh::NavMesh;
use crate::path::{Path, SeekType, Segment, SegmentType};
use crate::types::LadderId;
use tracing::{debug, trace};

/// Result of one follower update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowStatus {
    /// No valid path.
    Idle,
    Moving,
    Succeeded,
    Failed(MoveToFailure),
}

#[derive(Clone, Copy, Debug)]
enum Maneuver {
    Ladder {
        ladder: LadderId,
        dismount: Vec3,
        ascending: bool,
    },
    Gap {
        landing: Vec3,
        forward: Vec3,
    },
    Ledge {
        landing: Vec3,
        forward: Vec3,
    },
}

#[derive(Clone, Debug, Default)]
pub struct PathFollower {
    path: Path,
    config: PathFollowerConfig,
}

impl PathFollower {
    pub fn new(config: PathFollowerConfig) -> Self {
        Self {
            path: Path::new(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_mut(&mut self) -> &mut Path {
        &mut self.path
    }

    /// Follow `path` from its start.
    pub fn set_path(&mut self, path: Path) {
        self.path = path;
        self.path.move_cursor_to_start();
    }

    pub fn is_valid(&self) -> bool {
        self.path.is_valid()
    }

    pub fn invalidate(&mut self) {
        self.path.invalidate();
    }

    pub fn update(
        &mut self,
        loco: &mut GroundLocomotion,
        ctx: &mut LocomotionContext<'_>,
        mesh: &NavMesh,
    ) -> FollowStatus {
        if !self.path.is_valid() {
            return FollowStatus::Idle;
        }
        if loco.is_using_ladder() {
            return FollowStatus::Moving;
        }

        let feet = ctx.actor.position();
        let now = ctx.now;
        let on_ground = ctx.actor.ground_entity().is_some();

        self.path.move_cursor_to_closest_position(feet, SeekType::SeekAhead, 0.0);

        if let Some(end) = self.path.end_position() {
            if on_ground && xy(end - feet).length() < self.config.goal_tolerance {
                let built = self.path.generation();
                ctx.actor.on_move_to_success(&mut self.path, now);
                let rebuilt = self.path.generation() != built && self.path.age(now) <= 0.0;
                if rebuilt {
                    self.path.move_cursor_to_start();
                } else {
                    self.path.invalidate();
                }
                debug!(?feet, rebuilt, "reached path goal");
                return FollowStatus::Succeeded;
            }
        }

        let Some(cursor) = self.path.cursor_data() else {
            return self.fail(ctx, MoveToFailure::Stuck);
        };
        let Some(prior) = cursor.segment_prior else {
            return self.fail(ctx, MoveToFailure::Stuck);
        };

        if on_ground && cursor.pos.z - feet.z > ctx.config.death_drop_height {
            return self.fail(ctx, MoveToFailure::FellOff);
        }

        if on_ground && !loco.is_climbing_or_jumping() {
            if let Some(maneuver) = self.pending_maneuver(prior, feet) {
                if self.start_maneuver(loco, ctx, mesh, maneuver) {
                    return FollowStatus::Moving;
                }
            }
        }

        if loco.is_stuck() && loco.stuck_duration(now) > self.config.stuck_failure_time {
            return self.fail(ctx, MoveToFailure::Stuck);
        }

        // Ballistic until landing.
        if loco.is_climbing_or_jumping() {
            return FollowStatus::Moving;
        }

        let goal = self.look_ahead(loco, ctx, prior, feet);
        loco.approach(ctx, goal, 1.0);
        FollowStatus::Moving
    }

    fn fail(&mut self, ctx: &mut LocomotionContext<'_>, reason: MoveToFailure) -> FollowStatus {
        let built = self.path.generation();
        ctx.actor.on_move_to_failure(&mut self.path, reason);
        if self.path.generation() == built {
            self.path.invalidate();
        }
        debug!(?reason, "path following failed");
        FollowStatus::Failed(reason)
    }

    /// A maneuver in the next couple of segments whose start the bot has
    /// reached.
    fn pending_maneuver(&self, prior: usize, feet: Vec3) -> Option<Maneuver> {
        let segments = self.path.segments();
        let tolerance = self.config.goal_tolerance;
        let near = |pos: Vec3| xy(pos - feet).length() < tolerance;

        for idx in prior + 1..(prior + 3).min(segments.len()) {
            let seg = &segments[idx];
            let before = &segments[idx - 1];
            match seg.kind {
                SegmentType::LadderUp | SegmentType::LadderDown if near(seg.pos) => {
                    let ladder = seg.ladder?;
                    let dismount = segments.get(idx + 1).map_or(seg.pos, |s| s.pos);
                    return Some(Maneuver::Ladder {
                        ladder,
                        dismount,
                        ascending: seg.kind == SegmentType::LadderUp,
                    });
                }
                SegmentType::JumpOverGap if near(before.pos) => {
                    return Some(Maneuver::Gap {
                        landing: seg.pos,
                        forward: before.forward,
                    });
                }
                SegmentType::ClimbUp if near(before.pos) => {
                    return Some(Maneuver::Ledge {
                        landing: seg.pos,
                        forward: before.forward,
                    });
                }
                _ => {}
            }
        }
        None
    }

    fn start_maneuver(
        &mut self,
        loco: &mut GroundLocomotion,
        ctx: &mut LocomotionContext<'_>,
        mesh: &NavMesh,
        maneuver: Maneuver,
    ) -> bool {
        let result = match maneuver {
            Maneuver::Ladder {
                ladder,
                dismount,
                ascending,
            } => {
                let Some(nav_ladder) = mesh.ladder(ladder) else {
                    trace!(%ladder, "ladder on path no longer exists");
                    return false;
                };
                if ascending {
                    loco.climb_ladder(ctx, ladder, nav_ladder, dismount)
                } else {
                    loco.descend_ladder(ctx, ladder, nav_ladder, dismount)
                }
            }
            Maneuver::Gap { landing, forward } => loco.jump_across_gap(ctx, landing, forward),
            Maneuver::Ledge { landing, forward } => loco.climb_up_to_ledge(ctx, landing, forward),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                trace!(?maneuver, %err, "maneuver refused");
                false
            }
        }
    }

    /// Path distance where the next maneuver ahead of `cursor` begins,
    /// searching past segment `prior`.
    fn maneuver_start(&self, prior: usize, cursor: f32) -> f32 {
        let segments = self.path.segments();
        for idx in prior + 1..segments.len() {
            let start = match segments[idx].kind {
                SegmentType::LadderUp | SegmentType::LadderDown => segments[idx].distance_from_start,
                SegmentType::JumpOverGap | SegmentType::ClimbUp => segments[idx - 1].distance_from_start,
                SegmentType::OnGround | SegmentType::DropDown => continue,
            };
            if start > cursor {
                return start;
            }
        }
        self.path.length()
    }

    fn look_ahead(&self, loco: &GroundLocomotion, ctx: &LocomotionContext<'_>, prior: usize, feet: Vec3) -> Vec3 {
        let cursor = self.path.cursor_position();
        let cap = self.maneuver_start(prior, cursor);
        let mut range = self.config.min_look_ahead_range;
        let step = self.config.look_ahead_step.max(1.0);

        while range > 0.0 {
            let along = (cursor + range).min(cap);
            if let Some(target) = self.path.position_at(along) {
                if loco.is_potentially_traversable(ctx, feet, target) {
                    return target;
                }
            }
            range -= step;
        }

        self.path
            .segments()
            .get(prior + 1)
            .or_else(|| self.path.segments().last())
            .map_or(feet, |s: &Segment| s.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, ActorEvent, ActorState};
    use crate::body::BotBody;
    use crate::config::{LocomotionConfig, NavConfig};
    use crate::geometry::{Direction, Extent};
    use crate::path::ComputeParams;
    use crate::pathfinding::{SearchContext, ShortestPathCost};
    use crate::trace::StaticWorld;
    use crate::types::{EntityHandle, Team};

    /// Actor that chains a second leg when it arrives.
    struct Chaining {
        state: ActorState,
        next_leg: Option<Vec3>,
    }

    impl Actor for Chaining {
        fn position(&self) -> Vec3 {
            self.state.position
        }
        fn set_position(&mut self, pos: Vec3) {
            self.state.position = pos;
        }
        fn velocity(&self) -> Vec3 {
            self.state.velocity
        }
        fn set_velocity(&mut self, velocity: Vec3) {
            self.state.velocity = velocity;
        }
        fn ground_entity(&self) -> Option<EntityHandle> {
            self.state.ground_entity
        }
        fn set_ground_entity(&mut self, entity: Option<EntityHandle>) {
            self.state.ground_entity = entity;
        }
        fn team(&self) -> Team {
            self.state.team
        }
        fn on_event(&mut self, event: ActorEvent) {
            self.state.on_event(event);
        }
        fn on_move_to_success(&mut self, path: &mut Path, now: f32) {
            self.state.on_event(ActorEvent::MoveToSuccess);
            if let Some(goal) = self.next_leg.take() {
                path.build_trivial_path(self.state.position, goal, now);
            }
        }
    }

    fn row_mesh(count: usize) -> NavMesh {
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
        mesh
    }

    fn planned(mesh: &NavMesh, start: Vec3, goal: Vec3) -> PathFollower {
        let mut path = Path::new();
        path.compute(
            mesh,
            &mut SearchContext::new(),
            start,
            goal,
            &ShortestPathCost::default(),
            &ComputeParams::default(),
            0.0,
        );
        assert!(path.is_valid());
        let mut follower = PathFollower::new(PathFollowerConfig::default());
        follower.set_path(path);
        follower
    }

    /// Run follower then locomotion for up to `ticks` ticks, stopping at
    /// the first terminal status.
    fn drive(
        follower: &mut PathFollower,
        mesh: &NavMesh,
        world: &mut StaticWorld,
        actor: &mut dyn Actor,
        ticks: usize,
    ) -> FollowStatus {
        let config = LocomotionConfig::default();
        let mut body = BotBody::new(&config);
        let mut loco = GroundLocomotion::new(&config);
        loco.reset(&config, actor.position());
        let mut status = FollowStatus::Idle;
        for tick in 0..ticks {
            let mut ctx = LocomotionContext {
                world: &mut *world,
                body: &mut body,
                actor: &mut *actor,
                config: &config,
                now: 0.1 * (tick as f32 + 1.0),
                dt: 0.1,
            };
            if tick == 0 {
                loco.update_ground_constraint(&mut ctx);
            }
            status = follower.update(&mut loco, &mut ctx, mesh);
            loco.update(&mut ctx);
            if matches!(status, FollowStatus::Succeeded | FollowStatus::Failed(_)) {
                break;
            }
        }
        status
    }

    fn floor() -> StaticWorld {
        let mut world = StaticWorld::new();
        world.add_floor(0.0);
        world
    }

    #[test]
    fn invalid_path_is_idle() {
        let mesh = row_mesh(1);
        let mut follower = PathFollower::new(PathFollowerConfig::default());
        let mut actor = ActorState::new(Vec3::new(50.0, 50.0, 0.0), Team::Id(0));
        let status = drive(&mut follower, &mesh, &mut floor(), &mut actor, 3);
        assert_eq!(status, FollowStatus::Idle);
    }

    #[test]
    fn follows_row_to_goal() {
        let mesh = row_mesh(4);
        let start = Vec3::new(50.0, 50.0, 0.0);
        let goal = Vec3::new(350.0, 50.0, 0.0);
        let mut follower = planned(&mesh, start, goal);
        let mut actor = ActorState::new(start, Team::Id(0));
        let status = drive(&mut follower, &mesh, &mut floor(), &mut actor, 60);
        assert_eq!(status, FollowStatus::Succeeded);
        assert!(xy(actor.position - goal).length() < 25.0);
        assert!(!follower.is_valid());
        assert!(actor.events.contains(&ActorEvent::MoveToSuccess));
    }

    #[test]
    fn success_callback_may_chain_a_new_leg() {
        let mesh = row_mesh(3);
        let start = Vec3::new(50.0, 50.0, 0.0);
        let mut follower = planned(&mesh, start, Vec3::new(150.0, 50.0, 0.0));
        let mut actor = Chaining {
            state: ActorState::new(start, Team::Id(0)),
            next_leg: Some(Vec3::new(250.0, 50.0, 0.0)),
        };
        let status = drive(&mut follower, &mesh, &mut floor(), &mut actor, 60);
        assert_eq!(status, FollowStatus::Succeeded);
        assert!(follower.is_valid());
        assert_eq!(follower.path().end_position().map(|p| p.x), Some(250.0));

        let status = drive(&mut follower, &mesh, &mut floor(), &mut actor, 60);
        assert_eq!(status, FollowStatus::Succeeded);
        assert!(!follower.is_valid());
        assert!(xy(actor.state.position - Vec3::new(250.0, 50.0, 0.0)).length() < 25.0);
    }

    #[test]
    fn wall_across_the_route_fails_stuck() {
        let mesh = row_mesh(3);
        let mut world = floor();
        world.add_box(Extent::new(Vec3::new(140.0, -500.0, 0.0), Vec3::new(160.0, 500.0, 300.0)));
        let start = Vec3::new(50.0, 50.0, 0.0);
        let mut follower = planned(&mesh, start, Vec3::new(250.0, 50.0, 0.0));
        let mut actor = ActorState::new(start, Team::Id(0));
        let status = drive(&mut follower, &mesh, &mut world, &mut actor, 200);
        assert_eq!(status, FollowStatus::Failed(MoveToFailure::Stuck));
        assert!(!follower.is_valid());
        assert!(actor.events.contains(&ActorEvent::Stuck));
        assert!(actor.events.contains(&ActorEvent::MoveToFailure(MoveToFailure::Stuck)));
    }

    #[test]
    fn look_ahead_stops_at_maneuver_start() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let a = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
        let b = mesh.add_flat_area(150.0, 0.0, 250.0, 100.0, 0.0).unwrap();
        mesh.connect(a, b, Direction::East).unwrap();
        let follower = planned(&mesh, Vec3::new(20.0, 50.0, 0.0), Vec3::new(200.0, 50.0, 0.0));
        let segments = follower.path().segments();
        let jump = segments
            .iter()
            .position(|s| s.kind == SegmentType::JumpOverGap)
            .unwrap();
        assert_eq!(follower.maneuver_start(0, 0.0), segments[jump - 1].distance_from_start);
        assert_eq!(
            follower.pending_maneuver(0, segments[jump - 1].pos).map(|m| matches!(m, Maneuver::Gap { .. })),
            Some(true)
        );
        assert!(follower.pending_maneuver(0, Vec3::new(20.0, 50.0, 0.0)).is_none());
    }

    #[test]
    fn jumps_a_gap_between_areas() {
        let mut mesh = NavMesh::new(&NavConfig::default());
        let a = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
        let b = mesh.add_flat_area(150.0, 0.0, 250.0, 100.0, 0.0).unwrap();
        mesh.connect(a, b, Direction::East).unwrap();
        let mut world = StaticWorld::new();
        world.add_box(Extent::new(Vec3::new(0.0, 0.0, -400.0), Vec3::new(100.0, 100.0, 0.0)));
        world.add_box(Extent::new(Vec3::new(150.0, 0.0, -400.0), Vec3::new(250.0, 100.0, 0.0)));

        let start = Vec3::new(20.0, 50.0, 0.0);
        let goal = Vec3::new(210.0, 50.0, 0.0);
        let mut follower = planned(&mesh, start, goal);
        let mut actor = ActorState::new(start, Team::Id(0));
        let status = drive(&mut follower, &mesh, &mut world, &mut actor, 60);
        assert_eq!(status, FollowStatus::Succeeded);
        assert!(actor.position.z.abs() < 1.0);
    }
}
