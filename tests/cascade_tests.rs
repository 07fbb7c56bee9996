//! Turn resolution tests - swaps, combos, boosters and refill

mod common;

use gemfall::core::{
    find_all_matches, Grid, LevelData, ObstacleDefinition, ObstacleField, ObstacleLibrary,
    PreferredTargets,
};
use gemfall::engine::gravity::collapse;
use gemfall::engine::{Outcome, Session, SessionConfig};
use gemfall::types::{
    BoardEvent, BoosterKind, DamageRule, GemKind, Goal, GoalKind, ObstacleBehavior, SpecialKind,
    StageRule,
};

use common::{random_grid, striped};

fn session_on(grid: Grid, moves: u32) -> Session {
    let obstacles = ObstacleField::new(grid.len(), ObstacleLibrary::default());
    Session::from_parts(grid, obstacles, moves, &[], SessionConfig::default())
}

#[test]
fn test_three_in_a_row_scenario() {
    let grid = Grid::from_ascii(&["GBYPO", "BYPOG", "RRBRY"]);
    let mut session = session_on(grid, 10);
    let report = session.request_swap(12, 13).unwrap();

    assert_eq!(session.moves_left(), 9);
    assert!(report.events.contains(&BoardEvent::MovesChanged { remaining: 9 }));
    assert!(report.cleared(GemKind::Red) >= 3);
    // Columns 0..=2 shift down by one row and get a new tile on top.
    for (from, to) in [(5, 10), (0, 5), (6, 11), (1, 6), (2, 7)] {
        assert!(report.events.contains(&BoardEvent::TileMoved { from, to }));
    }
    assert_eq!(session.grid().tile_count(), 15);
}

#[test]
fn test_four_in_a_row_scenario() {
    let grid = Grid::from_ascii(&["GBYPO", "BYRPO", "RRBRG"]);
    let mut session = session_on(grid, 10);
    let report = session.request_swap(7, 12).unwrap();

    let created: Vec<_> = report
        .events
        .iter()
        .filter_map(|e| match e {
            BoardEvent::SpecialCreated { cell, kind } => Some((*cell, *kind)),
            _ => None,
        })
        .collect();
    assert_eq!(created.first(), Some(&(12, SpecialKind::LineH)));
    assert!(report.cleared(GemKind::Red) >= 3);
}

#[test]
fn test_swap_without_match_scenario() {
    let grid = striped(6, 6);
    let before = grid.to_ascii();
    let mut session = session_on(grid, 7);
    let report = session.request_swap(14, 15).unwrap();
    assert!(report.reverted);
    assert_eq!(session.grid().to_ascii(), before);
    assert_eq!(session.moves_left(), 7);
}

#[test]
fn test_pulse_core_pair_clears_5x5() {
    let mut grid = striped(9, 9);
    let anchor = grid.index(4, 4).unwrap();
    let partner = grid.index(5, 4).unwrap();
    grid.tile_mut(anchor).unwrap().promote(SpecialKind::PulseCore);
    grid.tile_mut(partner).unwrap().promote(SpecialKind::PulseCore);
    let mut session = session_on(grid, 3);

    // Dragging the partner onto (4, 4) makes (4, 4) the anchor.
    let report = session.request_swap(partner, anchor).unwrap();
    assert_eq!(report.moves_left, 2);
    let activations = report
        .events
        .iter()
        .filter(|e| matches!(e, BoardEvent::SpecialActivated { .. }))
        .count();
    assert_eq!(activations, 2);
    assert!(report.cleared_total() >= 25);
}

#[test]
fn test_line_pair_with_scripted_teleport() {
    let mut grid = striped(6, 6);
    grid.tile_mut(0).unwrap().promote(SpecialKind::LineV);
    grid.tile_mut(1).unwrap().promote(SpecialKind::PatchBot);
    let mut session = session_on(grid, 3).with_chooser(Box::new(PreferredTargets::new(vec![35])));
    // The bot is dragged onto cell 0 and fires from there.
    let report = session.request_swap(1, 0).unwrap();
    assert!(report
        .events
        .contains(&BoardEvent::PatchBotTeleported { from: 0, to: 35 }));
    // Column 5 is swept at the landing cell.
    assert!(report.cleared_total() >= 6 + 2);
}

#[test]
fn test_single_booster_on_special_only_obstacle() {
    let rule = StageRule::new(true, ObstacleBehavior::OverTileBlocker, DamageRule::SpecialOnly);
    let level = LevelData::new(6, 6, 10)
        .with_definition(ObstacleDefinition::new(8, 3, vec![rule]))
        .with_obstacle(2, 2, 8);
    let mut session = Session::new(level, SessionConfig::default().with_seed(11)).unwrap();
    session.resolve_initial();
    session.tick();

    session.activate_booster(BoosterKind::Single).unwrap();
    let report = session.apply_booster_at_cell(2, 2).unwrap();
    assert_eq!(session.obstacles().remaining_hits(14), Some(2));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BoardEvent::ObstacleStageChanged { origin: 14, .. })));
    assert_eq!(session.moves_left(), 10);
}

#[test]
fn test_obstacle_goal_wins_level() {
    let rule = StageRule::new(true, ObstacleBehavior::OverTileBlocker, DamageRule::Any);
    let level = LevelData::new(5, 5, 10)
        .with_definition(ObstacleDefinition::new(2, 1, vec![rule]))
        .with_obstacle(0, 4, 2)
        .with_goal(Goal {
            kind: GoalKind::Obstacle,
            target_id: 2,
            amount: 1,
        });
    let mut session = Session::new(level, SessionConfig::default()).unwrap();
    session.resolve_initial();
    session.tick();
    assert_eq!(session.outcome(), Outcome::InProgress);

    session.activate_booster(BoosterKind::Column).unwrap();
    session.apply_booster_at_cell(0, 0).unwrap();
    assert_eq!(session.outcome(), Outcome::Won);
    assert!(session.grid().tile(20).is_some());
}

#[test]
fn test_cascade_always_terminates() {
    for seed in 1..25 {
        let level = LevelData::new(7, 7, 10);
        let config = SessionConfig {
            gem_kinds: 2,
            ..SessionConfig::default().with_seed(seed)
        };
        let mut session = Session::new(level, config).unwrap();
        let report = session.resolve_initial();
        assert!(report.passes <= 25);
        if !report.aborted {
            let grid = session.grid();
            assert!(find_all_matches(grid)
                .iter()
                .all(|&i| grid.tile(i).map(|t| t.is_special()).unwrap_or(false)));
        }
    }
}

#[test]
fn test_collapse_never_crosses_blocked_cells() {
    for seed in 1..40 {
        let mut grid = random_grid(6, 7, 5, seed);
        // Knock out a pattern of tiles, holes and blocked cells.
        for idx in 0..grid.len() {
            match (idx as u32 * 7 + seed) % 11 {
                0 => {
                    grid.set_blocked(idx, true);
                }
                1 | 2 | 3 => {
                    grid.take(idx);
                }
                _ => {}
            }
        }
        let tiles = grid.tile_count();
        let events = collapse(&mut grid);
        assert_eq!(grid.tile_count(), tiles);

        for idx in grid.occupied() {
            assert!(!grid.is_blocked(idx) && !grid.is_hole(idx));
        }
        for event in events {
            let BoardEvent::TileMoved { from, to } = event else {
                continue;
            };
            let (fx, fy) = grid.coords(from);
            let (tx, ty) = grid.coords(to);
            assert_eq!(fx, tx);
            assert!(ty > fy);
            for y in fy..=ty {
                let cell = grid.index(fx, y).unwrap();
                assert!(!grid.is_blocked(cell), "seed {} crossed {}", seed, cell);
            }
        }
    }
}

#[test]
fn test_idle_event_after_turn() {
    let mut session = session_on(striped(5, 5), 5);
    session.request_swap(0, 1).unwrap();
    assert_eq!(session.tick(), vec![BoardEvent::BoardIdle]);
    assert!(session.tick().is_empty());
}
