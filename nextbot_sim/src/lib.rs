// nextbot_sim — navigation and ground movement core for tick-driven bots.
//
// This crate contains everything a bot needs to get around a level: the
// navigation mesh, A* pathfinding over it, path construction and following,
// and the ground locomotion integrator that moves a collision hull through
// a world. It has no renderer or engine dependency; the collision world and
// the bot's body and actor are traits the host implements (test doubles
// live alongside them).
//
// Module overview:
// - `types.rs`:         Generational area/ladder ids, BotId, EntityHandle, Team.
// - `geometry.rs`:      Vec3 re-export, Direction, Corner, Extent, 2D helpers.
// - `config.rs`:        SimConfig and its locomotion/follower/nav/scheduler sections.
// - `error.rs`:         NavError and LocomotionError.
// - `timer.rs`:         CountdownTimer / IntervalTimer on the sim clock.
// - `nav_area.rs`:      NavArea geometry, attributes and per-team state.
// - `nav_ladder.rs`:    NavLadder and its four area connections.
// - `nav_mesh.rs`:      Area/ladder arenas, connections, incoming index, snapshots.
// - `pathfinding.rs`:   SearchContext, cost functions, A* and parallel batches.
// - `path.rs`:          Path segments, construction, cursor and queries.
// - `path_follower.rs`: Steering along a Path, maneuvers, success/failure.
// - `trace.rs`:         CollisionWorld trait, hull/ray traces, StaticWorld.
// - `body.rs`:          Body trait (posture, activities, hull) and BotBody.
// - `actor.rs`:         Actor trait (position, ground, callbacks) and ActorState.
// - `locomotion.rs`:    GroundLocomotion: integration, collision, jumps, ladders.
// - `scheduler.rs`:     Frame-budgeted bot update scheduling.
// - `command.rs`:       SimCommand / SimAction — inputs to the sim.
// - `event.rs`:         SimEvent / SimEventKind — outputs of the sim.
// - `sim.rs`:           SimContext, the tick loop owning all of the above.
//
// **Determinism.** Given the same config, mesh, world and commands, the sim
// produces the same events and state. No system time or OS entropy is read;
// per-bot and per-area collections that are iterated use `BTreeMap` or
// arenas with stable slot order.

pub mod actor;
pub mod body;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod locomotion;
pub mod nav_area;
pub mod nav_ladder;
pub mod nav_mesh;
pub mod path;
pub mod path_follower;
pub mod pathfinding;
pub mod scheduler;
pub mod sim;
pub mod timer;
pub mod trace;
pub mod types;
