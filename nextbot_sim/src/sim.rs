// The simulation context: owns everything a population of bots needs.
//
// `SimContext` replaces process-wide singletons with one explicit value:
// config, sim tick, nav mesh, collision world, bots, the update scheduler
// and a reusable A* search context. Outside code drives it only through
// `step(commands, target_tick)`, which for every tick up to the target:
//
// 1. Applies the commands whose tick has been reached (see `command.rs`).
// 2. Runs a scheduler frame: upkeep (posture settling) for every bot, then
//    full updates (path follower, then locomotion) for the bots that are
//    due and fit the frame budget.
// 3. Drains each updated bot's actor events into `SimEvent`s.
//
// A bot that slid past one or more ticks integrates the whole elapsed time
// on its next full update.
//
// Given the same config, mesh, world and command stream, `step` produces
// the same events and end state.
//
// See also: `scheduler.rs`, `path_follower.rs`, `locomotion.rs`,
// `command.rs`, `event.rs`.

use crate::actor::{Actor, ActorState, MoveToFailure};
use crate::body::BotBody;
use crate::command::{SimAction, SimCommand};
use crate::config::{LocomotionConfig, SimConfig};
use crate::event::{SimEvent, SimEventKind};
use crate::geometry::Vec3;
use crate::locomotion::{GroundLocomotion, LocomotionContext};
use crate::nav_mesh::NavMesh;
use crate::path::{ComputeParams, ComputeResult, Path};
use crate::path_follower::{FollowStatus, PathFollower};
use crate::pathfinding::{BotPathCost, SearchContext};
use crate::scheduler::{BotScheduler, FrameReport};
use crate::trace::CollisionWorld;
use crate::types::{BotId, Team};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::debug;

/// One simulated bot: its actor, body, locomotion and path follower.
#[derive(Clone, Debug)]
pub struct Bot {
    pub id: BotId,
    pub actor: ActorState,
    pub body: BotBody,
    pub locomotion: GroundLocomotion,
    pub follower: PathFollower,
    last_update_tick: u64,
}

impl Bot {
    fn new(id: BotId, position: Vec3, team: Team, config: &SimConfig, tick: u64) -> Self {
        let mut locomotion = GroundLocomotion::new(&config.locomotion);
        locomotion.reset(&config.locomotion, position);
        Self {
            id,
            actor: ActorState::new(position, team),
            body: BotBody::new(&config.locomotion),
            locomotion,
            follower: PathFollower::new(config.path_follower.clone()),
            last_update_tick: tick,
        }
    }

    fn context<'a>(
        &'a mut self,
        world: &'a mut dyn CollisionWorld,
        config: &'a LocomotionConfig,
        now: f32,
        dt: f32,
    ) -> (&'a mut GroundLocomotion, &'a mut PathFollower, LocomotionContext<'a>) {
        let Bot {
            actor,
            body,
            locomotion,
            follower,
            ..
        } = self;
        let ctx = LocomotionContext {
            world,
            body,
            actor,
            config,
            now,
            dt,
        };
        (locomotion, follower, ctx)
    }

    /// Full update: follow the path, then integrate.
    pub fn update(
        &mut self,
        world: &mut dyn CollisionWorld,
        mesh: &NavMesh,
        config: &LocomotionConfig,
        now: f32,
        dt: f32,
    ) -> FollowStatus {
        let (locomotion, follower, mut ctx) = self.context(world, config, now, dt);
        let status = follower.update(locomotion, &mut ctx, mesh);
        locomotion.update(&mut ctx);
        status
    }

    pub fn is_on_ground(&self) -> bool {
        self.actor.is_on_ground()
    }

    pub fn position(&self) -> Vec3 {
        self.actor.position
    }
}

/// The result of processing commands and advancing the simulation.
#[derive(Clone, Debug, Default)]
pub struct StepResult {
    pub events: Vec<SimEvent>,
}

pub struct SimContext<W: CollisionWorld> {
    pub config: SimConfig,
    pub tick: u64,
    pub mesh: NavMesh,
    pub world: W,
    pub bots: BTreeMap<BotId, Bot>,
    scheduler: BotScheduler,
    search: SearchContext,
    next_bot_id: u32,
    last_frame: FrameReport,
}

impl<W: CollisionWorld> SimContext<W> {
    pub fn new(config: SimConfig, mesh: NavMesh, world: W) -> Self {
        let scheduler = BotScheduler::new(config.scheduler.clone());
        Self {
            config,
            tick: 0,
            mesh,
            world,
            bots: BTreeMap::new(),
            scheduler,
            search: SearchContext::new(),
            next_bot_id: 0,
            last_frame: FrameReport::default(),
        }
    }

    /// Sim clock in seconds.
    pub fn now(&self) -> f32 {
        self.tick as f32 * self.config.tick_interval
    }

    pub fn bot(&self, id: BotId) -> Option<&Bot> {
        self.bots.get(&id)
    }

    pub fn bot_mut(&mut self, id: BotId) -> Option<&mut Bot> {
        self.bots.get_mut(&id)
    }

    /// Scheduler report for the most recent tick.
    pub fn last_frame(&self) -> &FrameReport {
        &self.last_frame
    }

    /// Apply a batch of commands and advance the sim to `target_tick`.
    ///
    /// Commands must be sorted by tick. Commands with tick > `target_tick`
    /// are ignored.
    pub fn step(&mut self, commands: &[SimCommand], target_tick: u64) -> StepResult {
        let mut events = Vec::new();
        let mut cmd_idx = 0;

        while self.tick < target_tick {
            self.tick += 1;

            while cmd_idx < commands.len() && commands[cmd_idx].tick <= self.tick {
                let cmd = &commands[cmd_idx];
                cmd_idx += 1;
                self.apply_command(cmd, &mut events);
            }

            self.advance_bots(&mut events);
        }

        StepResult { events }
    }

    fn apply_command(&mut self, cmd: &SimCommand, events: &mut Vec<SimEvent>) {
        match cmd.action {
            SimAction::SpawnBot { position, team } => {
                self.spawn_bot(position, team, events);
            }
            SimAction::MoveTo { bot, goal } => self.move_to(bot, goal, events),
            SimAction::Jump { bot } => self.jump(bot, events),
            SimAction::Stop { bot } => {
                if let Some(bot) = self.bots.get_mut(&bot) {
                    bot.follower.invalidate();
                }
            }
            SimAction::SetTeam { bot, team } => {
                if let Some(bot) = self.bots.get_mut(&bot) {
                    bot.actor.team = team;
                }
            }
        }
    }

    fn spawn_bot(&mut self, position: Vec3, team: Team, events: &mut Vec<SimEvent>) -> BotId {
        let id = BotId(self.next_bot_id);
        self.next_bot_id += 1;
        let now = self.now();
        let dt = self.config.tick_interval;

        let mut bot = Bot::new(id, position, team, &self.config, self.tick);
        {
            let (locomotion, _, mut ctx) = bot.context(&mut self.world, &self.config.locomotion, now, dt);
            locomotion.update_ground_constraint(&mut ctx);
        }
        let position = bot.actor.position;
        debug!(bot = ?id, ?position, ?team, "spawned bot");
        events.push(SimEvent {
            tick: self.tick,
            kind: SimEventKind::BotSpawned { bot: id, position },
        });
        Self::drain_actor_events(self.tick, &mut bot, events);
        self.bots.insert(id, bot);
        id
    }

    fn move_to(&mut self, id: BotId, goal: Vec3, events: &mut Vec<SimEvent>) {
        let now = self.now();
        let Some(bot) = self.bots.get_mut(&id) else {
            debug!(bot = ?id, "move-to for unknown bot");
            return;
        };
        let team = bot.actor.team;
        let params = ComputeParams::new(&self.config.locomotion, team);
        let cost = BotPathCost::new(&self.config.locomotion, &self.config.nav, team);

        let mut path = Path::new();
        let result = path.compute(
            &self.mesh,
            &mut self.search,
            bot.actor.position,
            goal,
            &cost,
            &params,
            now,
        );
        events.push(SimEvent {
            tick: self.tick,
            kind: SimEventKind::PathComputed {
                bot: id,
                result,
                length: path.length(),
            },
        });

        if result == ComputeResult::NoPath {
            bot.follower.invalidate();
            bot.actor.on_move_to_failure(&mut path, MoveToFailure::NoPathExists);
            Self::drain_actor_events(self.tick, bot, events);
            return;
        }
        let feet = bot.actor.position;
        bot.locomotion.clear_stuck_status(now, feet);
        bot.follower.set_path(path);
    }

    fn jump(&mut self, id: BotId, events: &mut Vec<SimEvent>) {
        let now = self.now();
        let dt = self.config.tick_interval;
        let Some(bot) = self.bots.get_mut(&id) else {
            return;
        };
        {
            let (locomotion, _, mut ctx) = bot.context(&mut self.world, &self.config.locomotion, now, dt);
            if let Err(err) = locomotion.jump(&mut ctx) {
                debug!(bot = ?id, %err, "jump dropped");
            }
        }
        Self::drain_actor_events(self.tick, bot, events);
    }

    fn advance_bots(&mut self, events: &mut Vec<SimEvent>) {
        let tick = self.tick;
        let now = self.now();
        let interval = self.config.tick_interval;
        let cost_ms = self.config.scheduler.nominal_update_cost_ms;
        let ids: Vec<BotId> = self.bots.keys().copied().collect();

        let config = &self.config.locomotion;
        let mesh = &self.mesh;
        let world = &mut self.world;
        let bots = RefCell::new(&mut self.bots);

        self.last_frame = self.scheduler.run_frame(
            tick,
            &ids,
            |id| {
                if let Some(bot) = bots.borrow_mut().get_mut(&id) {
                    bot.body.update();
                }
            },
            |id| {
                let mut bots = bots.borrow_mut();
                let Some(bot) = bots.get_mut(&id) else {
                    return 0.0;
                };
                let dt = (tick - bot.last_update_tick).max(1) as f32 * interval;
                bot.last_update_tick = tick;
                bot.update(&mut *world, mesh, config, now, dt);
                Self::drain_actor_events(tick, bot, &mut *events);
                cost_ms
            },
        );
    }

    fn drain_actor_events(tick: u64, bot: &mut Bot, events: &mut Vec<SimEvent>) {
        let id = bot.id;
        events.extend(bot.actor.drain_events().into_iter().map(|event| SimEvent {
            tick,
            kind: SimEventKind::from_actor_event(id, event),
        }));
    }
}
