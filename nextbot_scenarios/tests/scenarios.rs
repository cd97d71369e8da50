// End-to-end bot scenarios.
//
// Each scenario builds a small level (nav mesh plus matching collision
// geometry), then either drives a single bot's follower and locomotion
// through `Walker` or runs a whole `SimContext` from a command stream and
// checks the events that come out.

use glam::Vec3;
use nextbot_scenarios::{Walker, area_row, flat_world, init_tracing, move_to, row_sim, run_until, spawn};
use nextbot_sim::actor::MoveToFailure;
use nextbot_sim::config::{LocomotionConfig, NavConfig, SimConfig};
use nextbot_sim::error::{LocomotionError, NavError};
use nextbot_sim::event::SimEventKind;
use nextbot_sim::geometry::{Direction, Extent};
use nextbot_sim::nav_mesh::NavMesh;
use nextbot_sim::path::{ComputeResult, Path};
use nextbot_sim::path_follower::FollowStatus;
use nextbot_sim::sim::SimContext;
use nextbot_sim::types::BotId;

fn is_success(kind: &SimEventKind) -> bool {
    matches!(kind, SimEventKind::MoveToSuccess { .. })
}

// ---------------------------------------------------------------------------
// Graph scenarios
// ---------------------------------------------------------------------------

#[test]
fn one_way_connection_stays_directed() {
    let mut mesh = NavMesh::new(&NavConfig::default());
    let a = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
    let b = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 0.0).unwrap();
    mesh.connect(a, b, Direction::East).unwrap();

    assert!(mesh.is_connected(a, b, Direction::East));
    assert!(!mesh.is_connected(b, a, Direction::West));
    assert!(mesh.incoming_connections(b, Direction::West).contains(&a));
    assert!(mesh.is_edge(a, Direction::East));
}

#[test]
fn destroying_an_area_cleans_adjacency() {
    let mut mesh = NavMesh::new(&NavConfig::default());
    let a = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
    let b = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 0.0).unwrap();
    mesh.connect_mutual(a, b, Direction::East).unwrap();

    mesh.destroy_area(b).unwrap();

    assert_eq!(mesh.adjacent_count(a, Direction::East), 0);
    assert!(mesh.incoming_connections(a, Direction::West).is_empty());
    assert_eq!(mesh.adjacent_area(a, Direction::East, 0), None);
    assert!(mesh.area(b).is_none());
    assert_eq!(mesh.connect(a, b, Direction::East), Err(NavError::StaleArea(b)));

    // The freed slot is reused without the stale id aliasing the new area.
    let c = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 0.0).unwrap();
    assert_ne!(c, b);
    assert!(mesh.area(b).is_none());
    assert!(mesh.area(c).is_some());
}

// ---------------------------------------------------------------------------
// Single-bot scenarios
// ---------------------------------------------------------------------------

#[test]
fn straight_line_path_succeeds_within_seven_ticks() {
    init_tracing();
    let mut mesh = NavMesh::new(&NavConfig::default());
    let ids = area_row(&mut mesh, 3, 100.0, 0.0);
    let centers: Vec<Vec3> = ids.iter().map(|id| mesh.area(*id).unwrap().center()).collect();

    // Reach run speed within the first tick.
    let config = LocomotionConfig {
        max_acceleration: 3000.0,
        ..LocomotionConfig::default()
    };
    let mut walker = Walker::new(flat_world(0.0), mesh, config, centers[0]);
    let mut path = Path::new();
    path.from_waypoints(&centers, 0.0);
    walker.follow(path);

    let (status, ticks) = walker.tick_until_done(7);
    assert_eq!(status, FollowStatus::Succeeded);
    assert!(ticks <= 7, "took {ticks} ticks");
    assert!(!walker.follower.is_valid());
}

#[test]
fn straight_line_with_default_acceleration() {
    init_tracing();
    let mut mesh = NavMesh::new(&NavConfig::default());
    let ids = area_row(&mut mesh, 3, 100.0, 0.0);
    let centers: Vec<Vec3> = ids.iter().map(|id| mesh.area(*id).unwrap().center()).collect();

    let mut walker = Walker::new(flat_world(0.0), mesh, LocomotionConfig::default(), centers[0]);
    let mut path = Path::new();
    path.from_waypoints(&centers, 0.0);
    walker.follow(path);

    // At 500 u/s^2 the bot covers at most 140 units in 7 ticks, short of the
    // 175 it needs to come within goal tolerance; it is near run speed by
    // tick 9.
    let (status, ticks) = walker.tick_until_done(15);
    assert_eq!(status, FollowStatus::Succeeded);
    assert!((8..=15).contains(&ticks), "took {ticks} ticks");
}

#[test]
fn jump_while_airborne_leaves_vertical_velocity_alone() {
    let mesh = NavMesh::new(&NavConfig::default());
    let mut walker = Walker::new(flat_world(0.0), mesh, LocomotionConfig::default(), Vec3::ZERO);

    walker.with(|loco, ctx| loco.jump(ctx)).unwrap();
    walker.tick();
    assert!(walker.locomotion.is_climbing_or_jumping());

    let before = walker.locomotion.velocity().z;
    let result = walker.with(|loco, ctx| loco.jump(ctx));
    assert_eq!(result, Err(LocomotionError::NotGrounded));
    assert_eq!(walker.locomotion.velocity().z, before);
}

#[test]
fn follower_stops_at_a_wall_and_reports_stuck() {
    let mut mesh = NavMesh::new(&NavConfig::default());
    let ids = area_row(&mut mesh, 3, 100.0, 0.0);
    let centers: Vec<Vec3> = ids.iter().map(|id| mesh.area(*id).unwrap().center()).collect();
    let mut world = flat_world(0.0);
    world.add_box(Extent::new(Vec3::new(140.0, -500.0, 0.0), Vec3::new(160.0, 500.0, 200.0)));

    let mut walker = Walker::new(world, mesh, LocomotionConfig::default(), centers[0]);
    let mut path = Path::new();
    path.from_waypoints(&centers, 0.0);
    walker.follow(path);

    let (status, _) = walker.tick_until_done(300);
    assert_eq!(status, FollowStatus::Failed(MoveToFailure::Stuck));
    assert!(walker.actor.position.x < 140.0);
}

// ---------------------------------------------------------------------------
// Whole-sim scenarios
// ---------------------------------------------------------------------------

#[test]
fn bot_walks_the_row_and_arrives() {
    init_tracing();
    let mut sim = row_sim(SimConfig::default(), 3);
    let commands = [
        spawn(1, Vec3::new(50.0, 50.0, 5.0)),
        move_to(1, BotId(0), Vec3::new(250.0, 50.0, 0.0)),
    ];
    let (tick, events) = run_until(&mut sim, &commands, 60, is_success);
    assert!(tick.is_some());
    assert!(events.iter().any(|e| matches!(
        e.kind,
        SimEventKind::PathComputed {
            result: ComputeResult::Complete,
            ..
        }
    )));
    assert!(sim.bot(BotId(0)).unwrap().position().x > 225.0);
}

#[test]
fn unreachable_goal_walks_to_the_closest_area() {
    let config = SimConfig::default();
    let mut mesh = NavMesh::new(&config.nav);
    area_row(&mut mesh, 2, 100.0, 0.0);
    mesh.add_flat_area(1000.0, 0.0, 1100.0, 100.0, 0.0).unwrap();
    let mut sim = SimContext::new(config, mesh, flat_world(0.0));

    let commands = [
        spawn(1, Vec3::new(50.0, 50.0, 5.0)),
        move_to(1, BotId(0), Vec3::new(1050.0, 50.0, 0.0)),
    ];
    let (tick, events) = run_until(&mut sim, &commands, 60, is_success);
    assert!(events.iter().any(|e| matches!(
        e.kind,
        SimEventKind::PathComputed {
            result: ComputeResult::Partial,
            ..
        }
    )));
    assert!(tick.is_some());
    let x = sim.bot(BotId(0)).unwrap().position().x;
    assert!(x > 100.0 && x < 200.0, "stopped at x = {x}");
}

#[test]
fn bot_climbs_a_ladder_to_the_upper_floor() {
    init_tracing();
    let config = SimConfig::default();
    let mut mesh = NavMesh::new(&config.nav);
    let bottom = mesh.add_flat_area(-50.0, 0.0, 50.0, 100.0, 0.0).unwrap();
    let top = mesh.add_flat_area(-50.0, -100.0, 50.0, 0.0, 200.0).unwrap();
    let ladder = mesh.add_ladder(Vec3::new(0.0, 0.0, 200.0), Vec3::ZERO, 30.0, Direction::South);
    mesh.connect_ladder(ladder, bottom).unwrap();
    mesh.connect_ladder(ladder, top).unwrap();

    let mut world = flat_world(0.0);
    world.add_box(Extent::new(Vec3::new(-50.0, -100.0, 190.0), Vec3::new(50.0, 0.0, 200.0)));
    let mut sim = SimContext::new(config, mesh, world);

    let commands = [
        spawn(1, Vec3::new(0.0, 80.0, 5.0)),
        move_to(1, BotId(0), Vec3::new(0.0, -50.0, 200.0)),
    ];
    let (tick, _) = run_until(&mut sim, &commands, 100, is_success);
    assert!(tick.is_some());

    let bot = sim.bot(BotId(0)).unwrap();
    assert!(bot.is_on_ground());
    assert!((bot.position().z - 200.0).abs() < 0.5);
    assert!(!bot.locomotion.is_using_ladder());
}

#[test]
fn bot_drops_off_a_ledge_to_the_lower_floor() {
    let config = SimConfig::default();
    let mut mesh = NavMesh::new(&config.nav);
    let upper = mesh.add_flat_area(0.0, 0.0, 100.0, 100.0, 100.0).unwrap();
    let lower = mesh.add_flat_area(100.0, 0.0, 200.0, 100.0, 0.0).unwrap();
    mesh.connect(upper, lower, Direction::East).unwrap();

    let mut world = flat_world(0.0);
    world.add_box(Extent::new(Vec3::new(-100.0, -100.0, -10.0), Vec3::new(100.0, 200.0, 100.0)));
    let mut sim = SimContext::new(config, mesh, world);

    let commands = [
        spawn(1, Vec3::new(50.0, 50.0, 105.0)),
        move_to(1, BotId(0), Vec3::new(150.0, 50.0, 0.0)),
    ];
    let (tick, events) = run_until(&mut sim, &commands, 80, is_success);
    assert!(tick.is_some());
    assert!(events.iter().any(|e| matches!(e.kind, SimEventKind::LeftGround { .. })));
    let bot = sim.bot(BotId(0)).unwrap();
    assert!(bot.position().z.abs() < 0.5);
}

#[test]
fn config_from_json_drives_the_sim() {
    let mut value = serde_json::to_value(SimConfig::default()).unwrap();
    value["locomotion"]["run_speed"] = serde_json::json!(100.0);
    value["tick_interval"] = serde_json::json!(0.05);
    let config = SimConfig::from_json(&value.to_string()).unwrap();
    assert_eq!(config.locomotion.run_speed, 100.0);

    let mut sim = row_sim(config, 2);
    let commands = [
        spawn(1, Vec3::new(50.0, 50.0, 5.0)),
        move_to(1, BotId(0), Vec3::new(150.0, 50.0, 0.0)),
    ];
    let (tick, events) = run_until(&mut sim, &commands, 200, is_success);
    // 100 units at 100 units/s in 0.05 s ticks, less the goal tolerance.
    let tick = tick.unwrap();
    assert!(tick > 10, "arrived too early at tick {tick}");

    let json = serde_json::to_string(&events).unwrap();
    assert!(json.contains("MoveToSuccess"));
}
