// Data-driven simulation configuration.
//
// All tunable parameters live in `SimConfig`, loaded from JSON or built from
// `Default`. Locomotion, path following, nav-mesh bookkeeping and bot
// scheduling each get a nested group so a single bot archetype can be
// retuned without touching the others.
//
// Distances are in world units, times in seconds, speeds in units/second.
//
// See also: `locomotion.rs` (reads `LocomotionConfig`), `path_follower.rs`
// (reads `PathFollowerConfig`), `nav_area.rs`/`pathfinding.rs` (read
// `NavConfig`), `scheduler.rs` (reads `SchedulerConfig`), `sim.rs` which
// owns the `SimConfig` as part of `SimContext`.

use serde::{Deserialize, Serialize};

/// Physical movement parameters for ground locomotion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocomotionConfig {
    /// Top ground speed; approach requests and grounded velocity are clamped
    /// to it.
    pub run_speed: f32,
    /// Desired speed after `walk()`.
    pub walk_speed: f32,
    /// Peak acceleration toward the move vector, before the speed governor.
    pub max_acceleration: f32,
    pub max_deceleration: f32,
    /// Downward acceleration while airborne.
    pub gravity: f32,
    /// Tallest ledge the bot walks up without jumping. Also the ground
    /// snapping tolerance (`step_height + 0.01`).
    pub step_height: f32,
    /// Tallest ledge reachable by `climb_up_to_ledge`.
    pub max_jump_height: f32,
    /// Falls taller than this are treated as untraversable by path costs.
    pub death_drop_height: f32,
    /// Minimum ground-normal z the bot can stand on. Steeper contact planes
    /// are walls.
    pub traversable_slope_limit: f32,
    /// Friction opposing backward slide along the move vector.
    pub friction_forward: f32,
    /// Friction opposing sideways slip.
    pub friction_sideways: f32,
    /// Bound on collision slide / breakable smashing recursion.
    pub collision_recursion_limit: u32,
    /// How long a colliding dynamic prop is ignored after the bot is stuck
    /// against it.
    pub ignore_prop_duration: f32,
    pub ladder_climb_speed: f32,
    /// The bot must cover this distance within `stuck_time` or it is stuck.
    pub stuck_distance: f32,
    pub stuck_time: f32,
    pub hull_width: f32,
    pub stand_hull_height: f32,
    pub crouch_hull_height: f32,
    /// Upward launch speed for `jump()`. Zero derives it from
    /// `max_jump_height` and `gravity`.
    pub jump_speed: f32,
}

impl LocomotionConfig {
    /// Launch speed for a vertical jump.
    pub fn effective_jump_speed(&self) -> f32 {
        if self.jump_speed > 0.0 {
            self.jump_speed
        } else {
            (2.0 * self.gravity * self.max_jump_height).sqrt()
        }
    }

    /// Ground snapping tolerance.
    pub fn stick_to_ground_tolerance(&self) -> f32 {
        self.step_height + 0.01
    }
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            run_speed: 300.0,
            walk_speed: 75.0,
            max_acceleration: 500.0,
            max_deceleration: 500.0,
            gravity: 800.0,
            step_height: 18.0,
            max_jump_height: 180.0,
            death_drop_height: 200.0,
            traversable_slope_limit: 0.6,
            friction_forward: 0.0,
            friction_sideways: 3.0,
            collision_recursion_limit: 3,
            ignore_prop_duration: 1.0,
            ladder_climb_speed: 200.0,
            stuck_distance: 100.0,
            stuck_time: 3.0,
            hull_width: 26.0,
            stand_hull_height: 68.0,
            crouch_hull_height: 32.0,
            jump_speed: 0.0,
        }
    }
}

/// Steering parameters for following a computed path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathFollowerConfig {
    /// Initial lookahead distance ahead of the cursor.
    pub min_look_ahead_range: f32,
    /// Lookahead is reduced by this much each time the straight line to the
    /// lookahead point is not traversable.
    pub look_ahead_step: f32,
    /// 2D distance to the path end that counts as arrival.
    pub goal_tolerance: f32,
    /// Continuous stuck time after which following fails.
    pub stuck_failure_time: f32,
}

impl Default for PathFollowerConfig {
    fn default() -> Self {
        Self {
            min_look_ahead_range: 300.0,
            look_ahead_step: 50.0,
            goal_tolerance: 25.0,
            stuck_failure_time: 5.0,
        }
    }
}

/// Nav-mesh bookkeeping and path-cost parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavConfig {
    /// Number of per-team state slots on each area.
    pub max_nav_teams: usize,
    /// Margin kept from portal edges that border the mesh boundary.
    pub generation_step_size: f32,
    /// Danger units shed per second.
    pub danger_decay_rate: f32,
    /// Cost multiplier (per unit length) for entering a crouch area.
    pub crouch_penalty: f32,
    /// Cost multiplier (per unit length) for entering a jump area.
    pub jump_penalty: f32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            max_nav_teams: 2,
            generation_step_size: 25.0,
            danger_decay_rate: 1.0,
            crouch_penalty: 20.0,
            jump_penalty: 5.0,
        }
    }
}

/// Bot update scheduling parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Each bot gets a full update every this many ticks.
    pub update_interval_ticks: u64,
    /// Per-frame budget for full bot updates, in milliseconds.
    pub frame_budget_ms: f32,
    /// A bot deferred this many times in a row is updated regardless of
    /// budget.
    pub max_update_slides: u32,
    /// Cost charged against the frame budget for one full bot update in
    /// the sim.
    pub nominal_update_cost_ms: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_ticks: 1,
            frame_budget_ms: 10.0,
            max_update_slides: 2,
            nominal_update_cost_ms: 1.0,
        }
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// Fixed simulation timestep in seconds.
    pub tick_interval: f32,
    pub locomotion: LocomotionConfig,
    pub path_follower: PathFollowerConfig,
    pub nav: NavConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval: 0.1,
            locomotion: LocomotionConfig::default(),
            path_follower: PathFollowerConfig::default(),
            nav: NavConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON. Every field is required.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
