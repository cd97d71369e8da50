// Test-only helpers for end-to-end bot scenarios.
//
// Builds small nav meshes and matching `StaticWorld` collision geometry, and
// drives either a whole `SimContext` (command stream in, events out) or a
// single bot's path follower and locomotion directly through `Walker`. All
// movement goes through the same code paths the sim uses; the only
// scenario-specific code is the scaffolding to set the level up and run
// ticks until something happens.
//
// See also: `tests/scenarios.rs` for the scenarios themselves.

use std::sync::Once;

use glam::Vec3;
use nextbot_sim::actor::ActorState;
use nextbot_sim::body::BotBody;
use nextbot_sim::command::{SimAction, SimCommand};
use nextbot_sim::config::{LocomotionConfig, PathFollowerConfig, SimConfig};
use nextbot_sim::event::{SimEvent, SimEventKind};
use nextbot_sim::geometry::Direction;
use nextbot_sim::locomotion::{GroundLocomotion, LocomotionContext};
use nextbot_sim::nav_mesh::NavMesh;
use nextbot_sim::path::Path;
use nextbot_sim::path_follower::{FollowStatus, PathFollower};
use nextbot_sim::sim::SimContext;
use nextbot_sim::trace::StaticWorld;
use nextbot_sim::types::{AreaId, BotId, Team};
use tracing::info;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness. Honors `RUST_LOG`; quiet by
/// default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    });
}

/// Collision world with an infinite floor at height `z`.
pub fn flat_world(z: f32) -> StaticWorld {
    let mut world = StaticWorld::new();
    world.add_floor(z);
    world
}

/// `count` square areas of side `size` in a row running east from the
/// origin, connected both ways.
pub fn area_row(mesh: &mut NavMesh, count: usize, size: f32, z: f32) -> Vec<AreaId> {
    let ids: Vec<AreaId> = (0..count)
        .map(|i| {
            let x0 = i as f32 * size;
            mesh.add_flat_area(x0, 0.0, x0 + size, size, z)
                .expect("row areas are well formed")
        })
        .collect();
    for pair in ids.windows(2) {
        mesh.connect_mutual(pair[0], pair[1], Direction::East)
            .expect("row areas are live");
    }
    ids
}

/// A sim over a row of 100-unit areas on a flat floor at z = 0.
pub fn row_sim(config: SimConfig, count: usize) -> SimContext<StaticWorld> {
    let mut mesh = NavMesh::new(&config.nav);
    area_row(&mut mesh, count, 100.0, 0.0);
    SimContext::new(config, mesh, flat_world(0.0))
}

pub fn spawn(tick: u64, position: Vec3) -> SimCommand {
    SimCommand::new(
        tick,
        SimAction::SpawnBot {
            position,
            team: Team::Id(0),
        },
    )
}

pub fn move_to(tick: u64, bot: BotId, goal: Vec3) -> SimCommand {
    SimCommand::new(tick, SimAction::MoveTo { bot, goal })
}

/// Step `sim` one tick at a time, feeding each command on its tick, until
/// an event matches `pred` or `max_tick` is reached. Returns the matching
/// tick and every event seen.
pub fn run_until(
    sim: &mut SimContext<StaticWorld>,
    commands: &[SimCommand],
    max_tick: u64,
    pred: impl Fn(&SimEventKind) -> bool,
) -> (Option<u64>, Vec<SimEvent>) {
    let mut seen = Vec::new();
    while sim.tick < max_tick {
        let next = sim.tick + 1;
        let batch: Vec<SimCommand> = commands
            .iter()
            .filter(|c| c.tick == next || (next == 1 && c.tick == 0))
            .cloned()
            .collect();
        let result = sim.step(&batch, next);
        let hit = result.events.iter().find(|e| pred(&e.kind)).map(|e| e.tick);
        seen.extend(result.events);
        if hit.is_some() {
            info!(tick = ?hit, events = seen.len(), "scenario condition met");
            return (hit, seen);
        }
    }
    info!(max_tick, events = seen.len(), "scenario ran out of ticks");
    (None, seen)
}

/// One bot's locomotion and path follower, driven without a sim.
pub struct Walker {
    pub world: StaticWorld,
    pub mesh: NavMesh,
    pub body: BotBody,
    pub actor: ActorState,
    pub config: LocomotionConfig,
    pub locomotion: GroundLocomotion,
    pub follower: PathFollower,
    pub now: f32,
    pub dt: f32,
}

impl Walker {
    pub fn new(world: StaticWorld, mesh: NavMesh, config: LocomotionConfig, feet: Vec3) -> Self {
        let mut locomotion = GroundLocomotion::new(&config);
        locomotion.reset(&config, feet);
        let mut walker = Self {
            world,
            mesh,
            body: BotBody::new(&config),
            actor: ActorState::new(feet, Team::Id(0)),
            config,
            locomotion,
            follower: PathFollower::new(PathFollowerConfig::default()),
            now: 0.0,
            dt: 0.1,
        };
        walker.with(|loco, ctx| loco.update_ground_constraint(ctx));
        walker.actor.drain_events();
        walker
    }

    /// Run `f` against the walker's locomotion with a fresh context.
    pub fn with<R>(&mut self, f: impl FnOnce(&mut GroundLocomotion, &mut LocomotionContext<'_>) -> R) -> R {
        let mut ctx = LocomotionContext {
            world: &mut self.world,
            body: &mut self.body,
            actor: &mut self.actor,
            config: &self.config,
            now: self.now,
            dt: self.dt,
        };
        f(&mut self.locomotion, &mut ctx)
    }

    pub fn follow(&mut self, path: Path) {
        self.follower.set_path(path);
    }

    /// One tick: follow the path, integrate, advance the clock.
    pub fn tick(&mut self) -> FollowStatus {
        let mut ctx = LocomotionContext {
            world: &mut self.world,
            body: &mut self.body,
            actor: &mut self.actor,
            config: &self.config,
            now: self.now,
            dt: self.dt,
        };
        let status = self.follower.update(&mut self.locomotion, &mut ctx, &self.mesh);
        self.locomotion.update(&mut ctx);
        self.body.update();
        self.now += self.dt;
        status
    }

    /// Tick until the follower reports something other than `Moving`, at
    /// most `max_ticks` times. Returns the status and the ticks taken.
    pub fn tick_until_done(&mut self, max_ticks: u32) -> (FollowStatus, u32) {
        for n in 1..=max_ticks {
            let status = self.tick();
            if status != FollowStatus::Moving {
                info!(?status, ticks = n, position = ?self.actor.position, "walker finished");
                return (status, n);
            }
        }
        info!(max_ticks, position = ?self.actor.position, "walker still moving");
        (FollowStatus::Moving, max_ticks)
    }
}
