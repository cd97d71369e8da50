// Body/posture service consumed by locomotion.
//
// The body owns stance, hull dimensions and animation activities. Locomotion
// asks it whether the bot can move at all (`is_posture_mobile`), which hull
// to sweep (`hull_mins`/`hull_maxs`), whether an animation is currently
// driving an axis (`has_activity_type(MOTION_CONTROLLED_*)`, in which case
// the integrator leaves that axis alone), and starts activities such as the
// jump animation. A failed `start_activity` makes the requesting intent a
// no-op.
//
// `BotBody` is the concrete body used by the sim: posture follows the
// desired posture on the next `update`, and individual activities can be
// marked unavailable to model a missing animation.
//
// See also: `locomotion.rs`, `config.rs` (`LocomotionConfig` hull sizes).

use crate::config::LocomotionConfig;
use crate::geometry::Vec3;
use crate::trace::ContentsMask;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Posture {
    #[default]
    Stand,
    Crouch,
    Sit,
    Lie,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    Idle,
    Run,
    Walk,
    Jump,
    JumpAcrossGap,
    ClimbUpToLedge,
    ClimbLadder,
}

bitflags! {
    /// Properties of the activity currently playing.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ActivityType: u8 {
        /// Animation moves the bot horizontally.
        const MOTION_CONTROLLED_XY = 0x1;
        /// Animation moves the bot vertically.
        const MOTION_CONTROLLED_Z = 0x2;
    }
}

pub trait Body {
    fn posture(&self) -> Posture;
    fn desired_posture(&self) -> Posture;
    fn set_desired_posture(&mut self, posture: Posture);

    /// Standing and crouching bots can move; sitting or lying ones cannot.
    fn is_posture_mobile(&self) -> bool {
        matches!(self.posture(), Posture::Stand | Posture::Crouch)
    }

    fn has_activity_type(&self, kind: ActivityType) -> bool;

    /// Try to start an activity. Returns false if the body has no animation
    /// for it.
    fn start_activity(&mut self, activity: Activity) -> bool;

    fn hull_width(&self) -> f32;
    fn stand_hull_height(&self) -> f32;
    fn crouch_hull_height(&self) -> f32;

    fn hull_height(&self) -> f32 {
        match self.posture() {
            Posture::Crouch => self.crouch_hull_height(),
            _ => self.stand_hull_height(),
        }
    }

    fn hull_mins(&self) -> Vec3 {
        let half = self.hull_width() / 2.0;
        Vec3::new(-half, -half, 0.0)
    }

    fn hull_maxs(&self) -> Vec3 {
        let half = self.hull_width() / 2.0;
        Vec3::new(half, half, self.hull_height())
    }

    fn solid_mask(&self) -> ContentsMask {
        ContentsMask::NPC_SOLID
    }
}

/// Concrete body for simulated bots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotBody {
    posture: Posture,
    desired_posture: Posture,
    hull_width: f32,
    stand_hull_height: f32,
    crouch_hull_height: f32,
    activity: Activity,
    /// Axes driven by the current animation.
    pub motion_controlled: ActivityType,
    /// Activities this body has no animation for.
    pub unavailable: Vec<Activity>,
}

impl BotBody {
    pub fn new(config: &LocomotionConfig) -> Self {
        Self {
            posture: Posture::Stand,
            desired_posture: Posture::Stand,
            hull_width: config.hull_width,
            stand_hull_height: config.stand_hull_height,
            crouch_hull_height: config.crouch_hull_height,
            activity: Activity::Idle,
            motion_controlled: ActivityType::empty(),
            unavailable: Vec::new(),
        }
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    /// Settle posture onto the desired posture.
    pub fn update(&mut self) {
        self.posture = self.desired_posture;
    }

    /// Set the actual posture immediately.
    pub fn force_posture(&mut self, posture: Posture) {
        self.posture = posture;
        self.desired_posture = posture;
    }
}

impl Body for BotBody {
    fn posture(&self) -> Posture {
        self.posture
    }

    fn desired_posture(&self) -> Posture {
        self.desired_posture
    }

    fn set_desired_posture(&mut self, posture: Posture) {
        self.desired_posture = posture;
    }

    fn has_activity_type(&self, kind: ActivityType) -> bool {
        self.motion_controlled.intersects(kind)
    }

    fn start_activity(&mut self, activity: Activity) -> bool {
        if self.unavailable.contains(&activity) {
            return false;
        }
        self.activity = activity;
        true
    }

    fn hull_width(&self) -> f32 {
        self.hull_width
    }

    fn stand_hull_height(&self) -> f32 {
        self.stand_hull_height
    }

    fn crouch_hull_height(&self) -> f32 {
        self.crouch_hull_height
    }
}
