// Ground locomotion: turns per-tick movement intents into a resolved
// position and velocity.
//
// The behavior layer calls intents (`approach`, `drive_to`, `jump`,
// `jump_across_gap`, `climb_up_to_ledge`, `climb_ladder`, `descend_ladder`,
// `release_ladder`, `run`/`walk`/`stop`) during a tick, then `update`
// integrates once. Everything the integrator touches outside its own state
// comes in through a `LocomotionContext`: the collision world, the body, the
// actor, the config, the sim clock and the tick length.
//
// Update order:
//
// 1. Stuck monitor.
// 2. Accumulated `approach` calls are averaged into one move vector and an
//    acceleration toward it, tapered by the quartic speed governor
//    `1 - (forward_speed / max_speed)^4`.
// 3. Ladder traversal, if active, moves the bot along the ladder and ends
//    the tick.
// 4. Immobile postures zero horizontal motion; airborne bots get gravity.
// 5. Grounded bots trying to move get friction (forward friction only
//    opposes backward motion, sideways friction always opposes slip);
//    grounded bots with no intent this tick stop dead.
// 6. Euler integration, per axis group, skipped for axes the body's current
//    animation drives.
// 7. Collision resolution sweeps the hull (raised by the step height) and
//    slides along what it hits, smashing breakables, up to the recursion
//    limit. A bot found inside a solid goes back to its last valid
//    position; a physics prop it was stuck in is ignored for a while.
// 8. Velocity is re-derived from the realized displacement.
// 9. The ground constraint snaps the bot to the floor within the step
//    tolerance, or reports leaving the ground.
// 10. Grounded horizontal speed is clamped to the run speed; an airborne bot
//     that has nearly stopped is pushed along its heading at run speed.
//
// Intents that cannot apply (jumping while airborne, starting an animation
// the body lacks) return a `LocomotionError` and change nothing.
//
// See also: `path_follower.rs` (the main caller), `trace.rs` (collision
// oracle), `body.rs`, `actor.rs`, `config.rs` (`LocomotionConfig`).

use crate::actor::{Actor, ActorEvent};
use crate::body::{Activity, ActivityType, Body, Posture};
use crate::config::LocomotionConfig;
use crate::error::LocomotionError;
use crate::geometry::{Vec3, xy};
use crate::nav_area::NavArea;
use crate::nav_ladder::NavLadder;
use crate::timer::{CountdownTimer, IntervalTimer};
use crate::trace::{CollisionWorld, EntityKind, TraceFilter};
use crate::types::{EntityHandle, LadderId, Team};
use std::f32::consts::FRAC_1_SQRT_2;
use tracing::{debug, trace, warn};

/// How long after a jump the ground constraint stays off.
const JUMP_GRACE: f32 = 0.5;

/// Without an `approach` for this long, the bot is idle and cannot be stuck.
const IDLE_TIME: f32 = 0.25;

/// Interval for re-sending `Stuck` while still stuck.
const STILL_STUCK_INTERVAL: f32 = 1.0;

/// Collaborators for one locomotion call.
pub struct LocomotionContext<'a> {
    pub world: &'a mut dyn CollisionWorld,
    pub body: &'a mut dyn Body,
    pub actor: &'a mut dyn Actor,
    pub config: &'a LocomotionConfig,
    /// Sim clock, seconds.
    pub now: f32,
    /// Tick length, seconds.
    pub dt: f32,
}

#[derive(Clone, Debug)]
struct LadderTraversal {
    ladder: LadderId,
    top: Vec3,
    bottom: Vec3,
    normal: Vec3,
    dismount: Vec3,
    ascending: bool,
}

impl LadderTraversal {
    fn pos_at_height(&self, height: f32) -> Vec3 {
        let span = self.top.z - self.bottom.z;
        if span <= 0.0 {
            return self.top;
        }
        let t = ((height - self.bottom.z) / span).clamp(0.0, 1.0);
        self.bottom.lerp(self.top, t)
    }
}

#[derive(Clone, Debug)]
pub struct GroundLocomotion {
    velocity: Vec3,
    acceleration: Vec3,
    move_vector: Vec3,
    desired_speed: f32,

    accum_approach: Vec3,
    accum_weight: f32,
    move_requested: bool,
    move_request_timer: IntervalTimer,

    ground_normal: Vec3,
    is_jumping: bool,
    is_jumping_across_gap: bool,
    is_climbing_up_to_ledge: bool,
    ledge_goal: Vec3,
    jump_timer: CountdownTimer,
    recompute_posture_on_collision: bool,

    ladder: Option<LadderTraversal>,

    prior_pos: Vec3,
    last_valid_pos: Vec3,
    ignored_prop: Option<EntityHandle>,
    ignore_prop_timer: CountdownTimer,

    is_stuck: bool,
    stuck_pos: Vec3,
    stuck_timer: IntervalTimer,
    still_stuck_timer: CountdownTimer,
}

impl GroundLocomotion {
    pub fn new(config: &LocomotionConfig) -> Self {
        Self {
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            move_vector: Vec3::ZERO,
            desired_speed: config.run_speed,
            accum_approach: Vec3::ZERO,
            accum_weight: 0.0,
            move_requested: false,
            move_request_timer: IntervalTimer::default(),
            ground_normal: Vec3::Z,
            is_jumping: false,
            is_jumping_across_gap: false,
            is_climbing_up_to_ledge: false,
            ledge_goal: Vec3::ZERO,
            jump_timer: CountdownTimer::default(),
            recompute_posture_on_collision: false,
            ladder: None,
            prior_pos: Vec3::ZERO,
            last_valid_pos: Vec3::ZERO,
            ignored_prop: None,
            ignore_prop_timer: CountdownTimer::default(),
            is_stuck: false,
            stuck_pos: Vec3::ZERO,
            stuck_timer: IntervalTimer::default(),
            still_stuck_timer: CountdownTimer::default(),
        }
    }

    /// Forget all motion state and anchor at `position`.
    pub fn reset(&mut self, config: &LocomotionConfig, position: Vec3) {
        *self = Self::new(config);
        self.prior_pos = position;
        self.last_valid_pos = position;
        self.stuck_pos = position;
    }

    // -----------------------------------------------------------------------
    // Speed intents
    // -----------------------------------------------------------------------

    pub fn run(&mut self, config: &LocomotionConfig) {
        self.desired_speed = config.run_speed;
    }

    pub fn walk(&mut self, config: &LocomotionConfig) {
        self.desired_speed = config.walk_speed;
    }

    pub fn stop(&mut self) {
        self.desired_speed = 0.0;
    }

    pub fn set_desired_speed(&mut self, speed: f32) {
        self.desired_speed = speed.max(0.0);
    }

    pub fn desired_speed(&self) -> f32 {
        self.desired_speed
    }

    // -----------------------------------------------------------------------
    // Movement intents
    // -----------------------------------------------------------------------

    /// Request movement toward `goal` this tick. Multiple calls in one tick
    /// are averaged by `weight`.
    pub fn approach(&mut self, ctx: &LocomotionContext<'_>, goal: Vec3, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        self.accum_approach += (goal - ctx.actor.position()) * weight;
        self.accum_weight += weight;
        self.move_requested = true;
        self.move_request_timer.start(ctx.now);
    }

    /// Move straight to `pos` now, resolving collisions on the way.
    pub fn drive_to(&mut self, ctx: &mut LocomotionContext<'_>, pos: Vec3) {
        self.move_requested = true;
        self.move_request_timer.start(ctx.now);
        let delta = xy(pos - ctx.actor.position());
        if delta.length_squared() > 0.0 {
            self.move_vector = delta.normalize().extend(0.0);
        }
        self.update_position(ctx, pos);
    }

    pub fn jump(&mut self, ctx: &mut LocomotionContext<'_>) -> Result<(), LocomotionError> {
        self.start_jump(ctx, Activity::Jump)?;
        self.velocity.z = ctx.config.effective_jump_speed();
        ctx.actor.set_velocity(self.velocity);
        Ok(())
    }

    /// Ballistic jump landing at `landing_goal`.
    pub fn jump_across_gap(
        &mut self,
        ctx: &mut LocomotionContext<'_>,
        landing_goal: Vec3,
        landing_forward: Vec3,
    ) -> Result<(), LocomotionError> {
        self.start_jump(ctx, Activity::JumpAcrossGap)?;
        self.is_jumping_across_gap = true;
        self.velocity = ballistic_launch_velocity(ctx.actor.position(), landing_goal, ctx.config.gravity);
        if xy(landing_forward).length_squared() > 0.0 {
            self.move_vector = xy(landing_forward).normalize().extend(0.0);
        }
        ctx.actor.set_velocity(self.velocity);
        debug!(?landing_goal, velocity = ?self.velocity, "jumping across gap");
        Ok(())
    }

    /// Hop onto a ledge whose top is at `landing_goal`.
    pub fn climb_up_to_ledge(
        &mut self,
        ctx: &mut LocomotionContext<'_>,
        landing_goal: Vec3,
        landing_forward: Vec3,
    ) -> Result<(), LocomotionError> {
        self.start_jump(ctx, Activity::ClimbUpToLedge)?;
        self.is_climbing_up_to_ledge = true;
        self.ledge_goal = landing_goal;
        self.recompute_posture_on_collision = true;

        let feet = ctx.actor.position();
        let gravity = ctx.config.gravity;
        let rise = (landing_goal.z - feet.z).max(0.0) + ctx.config.step_height * 0.5;
        let vz = (2.0 * gravity * rise).sqrt();
        let time_to_apex = if gravity > 0.0 { vz / gravity } else { 1.0 };
        let horizontal = xy(landing_goal - feet) / time_to_apex.max(f32::EPSILON);
        self.velocity = horizontal.extend(vz);
        if xy(landing_forward).length_squared() > 0.0 {
            self.move_vector = xy(landing_forward).normalize().extend(0.0);
        }
        ctx.actor.set_velocity(self.velocity);
        debug!(?landing_goal, "climbing up to ledge");
        Ok(())
    }

    fn start_jump(&mut self, ctx: &mut LocomotionContext<'_>, activity: Activity) -> Result<(), LocomotionError> {
        if self.ladder.is_some() || self.is_climbing_up_to_ledge {
            return Err(LocomotionError::AlreadyActive);
        }
        let Some(ground) = ctx.actor.ground_entity() else {
            return Err(LocomotionError::NotGrounded);
        };
        if !ctx.body.start_activity(activity) {
            return Err(LocomotionError::NoActivitySlot);
        }
        self.is_jumping = true;
        self.jump_timer.start(ctx.now, JUMP_GRACE);
        ctx.actor.set_ground_entity(None);
        ctx.actor.on_event(ActorEvent::LeaveGround { entity: Some(ground) });
        Ok(())
    }

    /// Climb `ladder` from its bottom, stepping off at `dismount` on top.
    pub fn climb_ladder(
        &mut self,
        ctx: &mut LocomotionContext<'_>,
        ladder_id: LadderId,
        ladder: &NavLadder,
        dismount: Vec3,
    ) -> Result<(), LocomotionError> {
        self.mount_ladder(ctx, ladder_id, ladder, dismount, true)
    }

    /// Climb down `ladder` from its top, stepping off at `dismount` below.
    pub fn descend_ladder(
        &mut self,
        ctx: &mut LocomotionContext<'_>,
        ladder_id: LadderId,
        ladder: &NavLadder,
        dismount: Vec3,
    ) -> Result<(), LocomotionError> {
        self.mount_ladder(ctx, ladder_id, ladder, dismount, false)
    }

    /// Let go of the active ladder. The bot falls from where it is.
    pub fn release_ladder(&mut self, ctx: &mut LocomotionContext<'_>) -> Result<(), LocomotionError> {
        let Some(ladder) = self.ladder.take() else {
            return Err(LocomotionError::NotOnLadder);
        };
        self.velocity = Vec3::ZERO;
        ctx.actor.set_velocity(self.velocity);
        debug!(ladder = %ladder.ladder, "released ladder");
        Ok(())
    }

    fn mount_ladder(
        &mut self,
        ctx: &mut LocomotionContext<'_>,
        ladder_id: LadderId,
        ladder: &NavLadder,
        dismount: Vec3,
        ascending: bool,
    ) -> Result<(), LocomotionError> {
        if self.ladder.is_some() {
            return Err(LocomotionError::AlreadyActive);
        }
        if !ctx.body.start_activity(Activity::ClimbLadder) {
            return Err(LocomotionError::NoActivitySlot);
        }
        self.ladder = Some(LadderTraversal {
            ladder: ladder_id,
            top: ladder.top,
            bottom: ladder.bottom,
            normal: ladder.normal(),
            dismount,
            ascending,
        });
        self.is_jumping = false;
        self.is_jumping_across_gap = false;
        self.velocity = Vec3::ZERO;
        if let Some(ground) = ctx.actor.ground_entity() {
            ctx.actor.set_ground_entity(None);
            ctx.actor.on_event(ActorEvent::LeaveGround { entity: Some(ground) });
        }
        debug!(ladder = %ladder_id, ascending, "mounted ladder");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    pub fn update(&mut self, ctx: &mut LocomotionContext<'_>) {
        let dt = ctx.dt;
        if dt <= 0.0 {
            return;
        }

        self.stuck_monitor(ctx);
        self.apply_accumulated_approach(ctx);
        self.prior_pos = ctx.actor.position();

        if self.traverse_ladder(ctx) {
            self.end_tick(ctx);
            return;
        }

        let mobile = ctx.body.is_posture_mobile();
        if !mobile {
            self.acceleration.x = 0.0;
            self.acceleration.y = 0.0;
            self.velocity.x = 0.0;
            self.velocity.y = 0.0;
        }

        let on_ground = ctx.actor.ground_entity().is_some();
        if !on_ground {
            self.acceleration.z -= ctx.config.gravity;
        } else if self.is_attempting_to_move() && mobile {
            let forward_speed = self.velocity.dot(self.move_vector);
            let forward_velocity = self.move_vector * forward_speed;
            let side_velocity = Vec3::new(
                self.velocity.x - forward_velocity.x,
                self.velocity.y - forward_velocity.y,
                0.0,
            );
            let mut friction = if forward_speed < 0.0 {
                -ctx.config.friction_forward * forward_velocity
            } else {
                Vec3::ZERO
            };
            friction -= ctx.config.friction_sideways * side_velocity;
            self.acceleration.x += friction.x;
            self.acceleration.y += friction.y;
        } else {
            self.velocity.x = 0.0;
            self.velocity.y = 0.0;
            self.acceleration.x = 0.0;
            self.acceleration.y = 0.0;
        }

        let mut new_pos = self.prior_pos;
        if !ctx.body.has_activity_type(ActivityType::MOTION_CONTROLLED_XY) {
            self.velocity.x += self.acceleration.x * dt;
            self.velocity.y += self.acceleration.y * dt;
            new_pos.x += self.velocity.x * dt;
            new_pos.y += self.velocity.y * dt;
        }
        if !ctx.body.has_activity_type(ActivityType::MOTION_CONTROLLED_Z) {
            self.velocity.z += self.acceleration.z * dt;
            new_pos.z += self.velocity.z * dt;
        }

        self.update_position(ctx, new_pos);
        self.velocity = (ctx.actor.position() - self.prior_pos) / dt;
        self.update_ground_constraint(ctx);

        let run_speed = ctx.config.run_speed;
        if ctx.actor.ground_entity().is_some() {
            let horizontal = xy(self.velocity);
            if horizontal.length() > run_speed {
                let clamped = horizontal.normalize() * run_speed;
                self.velocity.x = clamped.x;
                self.velocity.y = clamped.y;
            }
        } else if self.velocity.length() < 1.0 {
            self.velocity.x = run_speed * self.move_vector.x;
            self.velocity.y = run_speed * self.move_vector.y;
        }

        self.end_tick(ctx);
    }

    fn end_tick(&mut self, ctx: &mut LocomotionContext<'_>) {
        ctx.actor.set_velocity(self.velocity);
        self.acceleration = Vec3::ZERO;
        self.move_requested = false;
    }

    fn apply_accumulated_approach(&mut self, ctx: &LocomotionContext<'_>) {
        if self.accum_weight <= 0.0 {
            return;
        }
        let mut delta = self.accum_approach / self.accum_weight;
        delta.z = 0.0;
        self.accum_approach = Vec3::ZERO;
        self.accum_weight = 0.0;

        let max_move = ctx.config.run_speed * ctx.dt;
        let desired_move = delta.length().min(max_move);
        if !ctx.body.is_posture_mobile() || desired_move < 0.001 {
            return;
        }
        self.move_vector = delta.normalize();

        let forward_speed = self.velocity.dot(self.move_vector);
        let max_speed = self.desired_speed.min(ctx.config.run_speed);
        let governor = if max_speed <= 0.0 {
            0.0
        } else {
            let ratio = (forward_speed / max_speed).max(0.0);
            1.0 - ratio.powi(4)
        };
        let accel = if governor >= 0.0 {
            ctx.config.max_acceleration * governor
        } else {
            ctx.config.max_deceleration * governor.max(-1.0)
        };
        self.acceleration += self.move_vector * accel;
    }

    /// Move along the active ladder. Returns false if not on a ladder.
    fn traverse_ladder(&mut self, ctx: &mut LocomotionContext<'_>) -> bool {
        let Some(ladder) = self.ladder.clone() else {
            return false;
        };
        let feet = ctx.actor.position();
        let climb = ctx.config.ladder_climb_speed * ctx.dt;
        let finished = if ladder.ascending {
            feet.z >= ladder.top.z - 0.5
        } else {
            feet.z <= ladder.bottom.z + 0.5
        };

        if finished {
            ctx.actor.set_position(ladder.dismount);
            self.last_valid_pos = ladder.dismount;
            self.velocity = Vec3::ZERO;
            self.ladder = None;
            debug!(ladder = %ladder.ladder, "dismounted ladder");
            return true;
        }

        self.move_requested = true;
        let target_z = if ladder.ascending {
            (feet.z + climb).min(ladder.top.z)
        } else {
            (feet.z - climb).max(ladder.bottom.z)
        };
        let pos = ladder.pos_at_height(target_z) + ladder.normal * (ctx.body.hull_width() / 2.0);
        ctx.actor.set_position(pos);
        self.last_valid_pos = pos;
        self.velocity = (pos - feet) / ctx.dt;
        true
    }

    fn trace_filter(&self, now: f32) -> TraceFilter {
        match self.ignored_prop {
            Some(prop) if !self.ignore_prop_timer.is_elapsed(now) => TraceFilter::ignoring(prop),
            _ => TraceFilter::default(),
        }
    }

    fn update_position(&mut self, ctx: &mut LocomotionContext<'_>, new_pos: Vec3) {
        let from = ctx.actor.position();
        if new_pos == from {
            return;
        }
        let resolved = self.resolve_collision(ctx, from, new_pos, ctx.config.collision_recursion_limit);
        if ctx.actor.is_position_allowed(resolved) {
            ctx.actor.set_position(resolved);
        }
    }

    /// Sweep the hull from `from` toward `to`, sliding along contacts and
    /// smashing breakables, at most `recursion_limit` times. Returns where
    /// the hull ended up.
    pub fn resolve_collision(
        &mut self,
        ctx: &mut LocomotionContext<'_>,
        from: Vec3,
        to: Vec3,
        recursion_limit: u32,
    ) -> Vec3 {
        if self.recompute_posture_on_collision {
            self.recompute_posture(ctx, to);
        }

        let step_height = ctx.config.step_height;
        let mins = ctx.body.hull_mins() + Vec3::new(0.0, 0.0, step_height);
        let maxs = ctx.body.hull_maxs();
        let mask = ctx.body.solid_mask();
        let filter = self.trace_filter(ctx.now);

        let mut from = from;
        let mut goal = to;
        let mut remaining = recursion_limit;

        loop {
            let hit = ctx.world.trace_hull(from, goal, mins, maxs, mask, &filter);

            if hit.start_solid {
                if let Some(entity) = hit.entity {
                    if ctx.world.entity_kind(entity) == Some(EntityKind::DynamicProp) {
                        self.ignored_prop = Some(entity);
                        self.ignore_prop_timer.start(ctx.now, ctx.config.ignore_prop_duration);
                        debug!(?entity, "stuck in physics prop, ignoring it");
                    }
                }
                return self.last_valid_pos;
            }
            if !hit.did_hit() {
                self.last_valid_pos = goal;
                return goal;
            }
            if remaining == 0 {
                warn!(?from, ?to, "collision recursion limit reached");
                self.last_valid_pos = hit.end_pos;
                return hit.end_pos;
            }
            remaining -= 1;

            if let Some(entity) = hit.entity {
                if ctx.world.entity_kind(entity) == Some(EntityKind::Breakable) && ctx.world.break_entity(entity) {
                    trace!(?entity, "smashed breakable");
                    continue;
                }
            }

            if hit.normal.z < ctx.config.traversable_slope_limit {
                ctx.actor.on_event(ActorEvent::Contact {
                    entity: hit.entity,
                    normal: hit.normal,
                });
            }

            // Never slide further into the ground.
            let mut normal = hit.normal;
            normal.z = normal.z.max(0.0);
            let normal = normal.normalize_or_zero();

            let left = goal - hit.end_pos;
            let slide = left - normal * left.dot(normal);
            from = hit.end_pos;
            goal = from + slide;
            if slide.length_squared() < 1e-6 {
                self.last_valid_pos = from;
                return from;
            }
        }
    }

    /// Choose stand or crouch by whether a standing hull fits at `pos`.
    fn recompute_posture(&mut self, ctx: &mut LocomotionContext<'_>, pos: Vec3) {
        self.recompute_posture_on_collision = false;
        if !matches!(ctx.body.posture(), Posture::Stand | Posture::Crouch) {
            return;
        }
        let half = ctx.body.hull_width() / 2.0;
        let mins = Vec3::new(-half, -half, ctx.config.step_height);
        let maxs = Vec3::new(half, half, ctx.body.stand_hull_height());
        let fits = !ctx
            .world
            .trace_hull(pos, pos, mins, maxs, ctx.body.solid_mask(), &self.trace_filter(ctx.now))
            .did_hit();
        ctx.body
            .set_desired_posture(if fits { Posture::Stand } else { Posture::Crouch });
    }

    /// Snap to the floor within the step tolerance, fire landing and
    /// leaving events, and refuse to stand on slopes steeper than the limit.
    pub fn update_ground_constraint(&mut self, ctx: &mut LocomotionContext<'_>) {
        if self.did_just_jump(ctx.now) || self.ladder.is_some() {
            return;
        }

        let feet = ctx.actor.position();
        let step_height = ctx.config.step_height;
        let half = ctx.body.hull_width() / 2.0;
        let mins = Vec3::new(-half, -half, 0.0);
        let maxs = Vec3::new(half, half, step_height);
        let tolerance = ctx.config.stick_to_ground_tolerance();

        let ground = ctx.world.trace_hull(
            feet + Vec3::new(0.0, 0.0, step_height + 0.001),
            feet - Vec3::new(0.0, 0.0, tolerance),
            mins,
            maxs,
            ctx.body.solid_mask(),
            &self.trace_filter(ctx.now),
        );

        if ground.start_solid {
            debug!(?feet, "inside ground");
            return;
        }

        if ground.fraction < 1.0 {
            self.ground_normal = ground.normal;

            let into_ground = self.velocity.dot(ground.normal);
            if into_ground < 0.0 {
                self.velocity -= ground.normal * into_ground;
            }

            if ground.normal.z < ctx.config.traversable_slope_limit {
                if xy(self.velocity).dot(xy(ground.normal)) <= 0.0 {
                    ctx.actor.on_event(ActorEvent::Contact {
                        entity: ground.entity,
                        normal: ground.normal,
                    });
                }
                if self.velocity.z > 0.0 {
                    self.velocity.z = 0.0;
                }
                if self.acceleration.z > 0.0 {
                    self.acceleration.z = 0.0;
                }
                return;
            }

            ctx.actor.set_position(ground.end_pos);
            if ctx.actor.ground_entity().is_none() {
                let entity = ground.entity.unwrap_or(EntityHandle::WORLD);
                ctx.actor.set_ground_entity(Some(entity));
                self.is_jumping = false;
                self.is_jumping_across_gap = false;
                self.is_climbing_up_to_ledge = false;
                self.recompute_posture_on_collision = false;
                ctx.actor.on_event(ActorEvent::LandOnGround { entity: Some(entity) });
            }
            self.velocity.z = 0.0;
            self.acceleration.z = 0.0;
        } else if let Some(previous) = ctx.actor.ground_entity() {
            ctx.actor.set_ground_entity(None);
            ctx.actor.on_event(ActorEvent::LeaveGround { entity: Some(previous) });
        }
    }

    // -----------------------------------------------------------------------
    // Stuck monitor
    // -----------------------------------------------------------------------

    fn stuck_monitor(&mut self, ctx: &mut LocomotionContext<'_>) {
        let now = ctx.now;
        let feet = ctx.actor.position();
        let radius = ctx.config.stuck_distance;

        if !self.move_request_timer.has_started() || self.move_request_timer.elapsed(now) > IDLE_TIME {
            self.stuck_pos = feet;
            self.stuck_timer.start(now);
            return;
        }

        if !self.stuck_timer.has_started() {
            self.stuck_pos = feet;
            self.stuck_timer.start(now);
        }

        let moved = (feet - self.stuck_pos).length() > radius;
        if self.is_stuck {
            if moved {
                self.clear_stuck_status(now, feet);
                debug!(?feet, "un-stuck");
                ctx.actor.on_event(ActorEvent::UnStuck);
            } else if self.still_stuck_timer.is_elapsed(now) {
                self.still_stuck_timer.start(now, STILL_STUCK_INTERVAL);
                ctx.actor.on_event(ActorEvent::Stuck);
            }
        } else if moved {
            self.stuck_pos = feet;
            self.stuck_timer.start(now);
        } else if self.stuck_timer.elapsed(now) > ctx.config.stuck_time {
            self.is_stuck = true;
            self.still_stuck_timer.start(now, STILL_STUCK_INTERVAL);
            debug!(?feet, "stuck");
            ctx.actor.on_event(ActorEvent::Stuck);
        }
    }

    pub fn is_stuck(&self) -> bool {
        self.is_stuck
    }

    /// Seconds since the bot became stuck, or zero.
    pub fn stuck_duration(&self, now: f32) -> f32 {
        if self.is_stuck {
            self.stuck_timer.elapsed(now)
        } else {
            0.0
        }
    }

    pub fn clear_stuck_status(&mut self, now: f32, feet: Vec3) {
        self.is_stuck = false;
        self.stuck_pos = feet;
        self.stuck_timer.start(now);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn move_vector(&self) -> Vec3 {
        self.move_vector
    }

    pub fn ground_normal(&self) -> Vec3 {
        self.ground_normal
    }

    pub fn ground_speed(&self) -> f32 {
        xy(self.velocity).length()
    }

    /// Unit horizontal direction of travel, or zero when not moving.
    pub fn ground_motion_vector(&self) -> Vec3 {
        xy(self.velocity).normalize_or_zero().extend(0.0)
    }

    pub fn is_attempting_to_move(&self) -> bool {
        self.move_requested || self.ladder.is_some()
    }

    pub fn is_climbing_or_jumping(&self) -> bool {
        self.is_jumping || self.is_jumping_across_gap || self.is_climbing_up_to_ledge
    }

    pub fn is_climbing_up_to_ledge(&self) -> bool {
        self.is_climbing_up_to_ledge
    }

    pub fn is_jumping_across_gap(&self) -> bool {
        self.is_jumping_across_gap
    }

    pub fn is_using_ladder(&self) -> bool {
        self.ladder.is_some()
    }

    pub fn is_ascending_or_descending_ladder(&self) -> bool {
        self.ladder.is_some()
    }

    pub fn ladder(&self) -> Option<LadderId> {
        self.ladder.as_ref().map(|l| l.ladder)
    }

    pub fn did_just_jump(&self, now: f32) -> bool {
        self.is_climbing_or_jumping() && self.jump_timer.has_started() && !self.jump_timer.is_elapsed(now)
    }

    /// True if a small probe hull fits along the straight line from `from`
    /// to `to`, stepping over anything under the step height.
    pub fn is_potentially_traversable(&self, ctx: &LocomotionContext<'_>, from: Vec3, to: Vec3) -> bool {
        self.traversable_fraction(ctx, from, to) >= 1.0
    }

    fn traversable_fraction(&self, ctx: &LocomotionContext<'_>, from: Vec3, to: Vec3) -> f32 {
        if to.z - from.z > ctx.config.max_jump_height + 0.1 {
            let along = (to - from).normalize_or_zero();
            if along.z > ctx.config.traversable_slope_limit {
                return 0.0;
            }
        }
        let probe = 0.25 * ctx.body.hull_width();
        let mins = Vec3::new(-probe, -probe, ctx.config.step_height);
        let maxs = Vec3::new(probe, probe, ctx.body.crouch_hull_height());
        let hit = ctx
            .world
            .trace_hull(from, to, mins, maxs, ctx.body.solid_mask(), &self.trace_filter(ctx.now));
        if hit.start_solid { 0.0 } else { hit.fraction }
    }

    /// Where along `from -> to` the first gap starts, as a fraction, or
    /// `None` if the traversable part of the line has floor throughout.
    pub fn has_potential_gap(&self, ctx: &LocomotionContext<'_>, from: Vec3, to: Vec3) -> Option<f32> {
        let reach = self.traversable_fraction(ctx, from, to);
        let end = from + (to - from) * reach;
        let forward = (end - from).normalize_or_zero();
        let length = (end - from).length();
        let step = ctx.body.hull_width() / 2.0;
        if step <= 0.0 {
            return None;
        }

        let mut t = 0.0;
        let mut pos = from;
        while t < length + step {
            if self.is_gap(ctx, pos, forward) {
                return Some(((t - step) / (length + step)).max(0.0));
            }
            pos += forward * step;
            t += step;
        }
        None
    }

    /// True if there is no floor within jump height below `pos`.
    pub fn is_gap(&self, ctx: &LocomotionContext<'_>, pos: Vec3, _forward: Vec3) -> bool {
        let mins = Vec3::new(-1.0, -1.0, 0.0);
        let maxs = Vec3::new(1.0, 1.0, ctx.body.hull_height());
        let ground = ctx.world.trace_hull(
            pos + Vec3::new(0.0, 0.0, ctx.config.step_height),
            pos - Vec3::new(0.0, 0.0, ctx.config.max_jump_height),
            mins,
            maxs,
            ctx.body.solid_mask(),
            &self.trace_filter(ctx.now),
        );
        ground.fraction >= 1.0 && !ground.start_solid
    }

    pub fn is_area_traversable(&self, area: &NavArea, team: Team) -> bool {
        !area.is_blocked(team)
    }
}

/// Launch velocity for a 45 degree jump from `from` landing at `to` under
/// `gravity`. The target height is clamped to 0.9 of the horizontal range
/// so the solve stays real.
pub fn ballistic_launch_velocity(from: Vec3, to: Vec3, gravity: f32) -> Vec3 {
    let to_goal = to - from;
    let range = xy(to_goal).length();
    if range <= f32::EPSILON {
        return Vec3::new(0.0, 0.0, (2.0 * gravity * to_goal.z.max(0.0)).sqrt());
    }
    let height = to_goal.z.min(0.9 * range);
    let speed = (range / FRAC_1_SQRT_2) / (2.0 * (range - height) / gravity).sqrt();
    let dir = xy(to_goal) / range;
    Vec3::new(
        dir.x * speed * FRAC_1_SQRT_2,
        dir.y * speed * FRAC_1_SQRT_2,
        speed * FRAC_1_SQRT_2,
    )
}
