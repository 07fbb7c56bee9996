//! Refill phases: collapse, spawn and diagonal slide-fill
//!
//! Columns are split into segments by blocked cells. Tiles fall to the
//! bottom of their segment, looking through mask holes, and never cross a
//! blocked cell. New tiles enter from above row 0 and reach every empty cell
//! connected to the top edge through holes. Cells only reachable diagonally
//! are filled by sliding a tile one step down-left or down-right.

use log::debug;

use crate::core::{Grid, ObstacleField, SimpleRng};
use crate::types::BoardEvent;

/// Drop tiles to the bottom of their column segment, keeping their order.
pub fn collapse(grid: &mut Grid) -> Vec<BoardEvent> {
    let mut events = Vec::new();
    let (width, height) = (grid.width() as i32, grid.height() as i32);
    for x in 0..width {
        let mut y = height - 1;
        while y >= 0 {
            // Non-hole cells of this segment, bottom first.
            let mut cells = Vec::new();
            while y >= 0 {
                let Some(idx) = grid.index(x, y) else { break };
                y -= 1;
                if grid.is_blocked(idx) {
                    break;
                }
                if !grid.is_hole(idx) {
                    cells.push(idx);
                }
            }
            let mut write = 0;
            for read in 0..cells.len() {
                let from = cells[read];
                if grid.tile(from).is_none() {
                    continue;
                }
                let to = cells[write];
                write += 1;
                if from != to {
                    let tile = grid.take(from);
                    grid.put(to, tile);
                    events.push(BoardEvent::TileMoved { from, to });
                }
            }
        }
    }
    events
}

/// Fill the empty cells reachable from the top edge with fresh random tiles.
pub fn spawn(grid: &mut Grid, rng: &mut SimpleRng, gem_kinds: u8) -> Vec<BoardEvent> {
    let mut events = Vec::new();
    for x in 0..grid.width() as i32 {
        let mut reachable = Vec::new();
        for y in 0..grid.height() as i32 {
            let Some(idx) = grid.index(x, y) else { break };
            if grid.is_hole(idx) && !grid.is_blocked(idx) {
                continue;
            }
            if !grid.is_active_empty(idx) {
                break;
            }
            reachable.push(idx);
        }
        // The first tile to enter falls furthest.
        for &idx in reachable.iter().rev() {
            let gem = rng.gem(gem_kinds);
            if grid.place(idx, gem) {
                events.push(BoardEvent::TileSpawned { cell: idx, gem });
            }
        }
    }
    events
}

fn is_hole_adjacent(grid: &Grid, idx: usize) -> bool {
    grid.neighbors4(idx).iter().any(|&n| grid.is_hole(n))
}

/// No tile in the segment above, and a hole or the board edge below
fn is_floor_pocket(grid: &Grid, idx: usize) -> bool {
    let (x, y) = grid.coords(idx);
    let floor = match grid.index(x, y + 1) {
        None => true,
        Some(below) => grid.is_hole(below),
    };
    if !floor {
        return false;
    }
    let mut above = y - 1;
    while let Some(cell) = grid.index(x, above) {
        if grid.is_blocked(cell) {
            break;
        }
        if grid.tile(cell).is_some() {
            return false;
        }
        above -= 1;
    }
    true
}

fn has_obstacle_above(grid: &Grid, obstacles: &ObstacleField, idx: usize) -> bool {
    let (x, y) = grid.coords(idx);
    grid.index(x, y - 1)
        .map(|above| obstacles.has_obstacle(above))
        .unwrap_or(false)
}

/// Empty cells that straight collapse and spawn cannot reach.
///
/// A target sits next to a mask hole and either has an obstacle directly
/// above it or is a floor pocket.
pub fn slide_targets(grid: &Grid, obstacles: &ObstacleField) -> Vec<usize> {
    (0..grid.len())
        .filter(|&i| grid.is_active_empty(i) && is_hole_adjacent(grid, i))
        .filter(|&i| has_obstacle_above(grid, obstacles, i) || is_floor_pocket(grid, i))
        .collect()
}

/// A tile may slide past a corner that is not a hole and is either open or
/// allows diagonal traversal.
fn corner_passable(grid: &Grid, obstacles: &ObstacleField, x: i32, y: i32) -> bool {
    match grid.index(x, y) {
        None => false,
        Some(c) => !grid.is_hole(c) && (!grid.is_blocked(c) || obstacles.is_diagonal_allowed_at(c)),
    }
}

/// Diagonal source for `target`: up-left before up-right, preferring a tile
/// that could not fall straight down anyway.
fn slide_source(grid: &Grid, obstacles: &ObstacleField, target: usize) -> Option<usize> {
    let (x, y) = grid.coords(target);
    let mut fallback = None;
    for sx in [x - 1, x + 1] {
        let Some(src) = grid.index(sx, y - 1) else {
            continue;
        };
        if grid.tile(src).is_none() || grid.is_blocked(src) || grid.is_hole(src) {
            continue;
        }
        if !corner_passable(grid, obstacles, x, y - 1) || !corner_passable(grid, obstacles, sx, y) {
            continue;
        }
        let stuck = grid
            .index(sx, y)
            .map(|below| !grid.is_active_empty(below))
            .unwrap_or(true);
        if stuck {
            return Some(src);
        }
        fallback.get_or_insert(src);
    }
    fallback
}

/// Diagonal slide-fill loop. Every round slides what it can, then collapses
/// and spawns again. Stops when no target is left or a round moves nothing.
pub fn slide_fill(
    grid: &mut Grid,
    obstacles: &ObstacleField,
    rng: &mut SimpleRng,
    gem_kinds: u8,
) -> Vec<BoardEvent> {
    let mut events = Vec::new();
    for round in 0..grid.len().max(1) {
        let targets = slide_targets(grid, obstacles);
        if targets.is_empty() {
            break;
        }
        let mut moved = 0;
        for target in targets {
            if !grid.is_active_empty(target) {
                continue;
            }
            if let Some(src) = slide_source(grid, obstacles, target) {
                let tile = grid.take(src);
                grid.put(target, tile);
                events.push(BoardEvent::TileMoved {
                    from: src,
                    to: target,
                });
                moved += 1;
            }
        }
        events.extend(collapse(grid));
        debug!("slide-fill round {}: {} diagonal moves", round, moved);
        if moved == 0 {
            break;
        }
        events.extend(spawn(grid, rng, gem_kinds));
    }
    events
}

/// Collapse, spawn, then slide-fill whatever is still empty.
pub fn settle(
    grid: &mut Grid,
    obstacles: &ObstacleField,
    rng: &mut SimpleRng,
    gem_kinds: u8,
) -> Vec<BoardEvent> {
    let mut events = collapse(grid);
    events.extend(spawn(grid, rng, gem_kinds));
    if grid.has_active_empty() {
        events.extend(slide_fill(grid, obstacles, rng, gem_kinds));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LevelData, ObstacleDefinition, ObstacleLibrary};
    use crate::types::{DamageRule, ObstacleBehavior, StageRule};

    fn no_obstacles(grid: &Grid) -> ObstacleField {
        ObstacleField::new(grid.len(), ObstacleLibrary::default())
    }

    fn blocker(diagonal: bool) -> ObstacleDefinition {
        ObstacleDefinition::new(
            1,
            1,
            vec![
                StageRule::new(true, ObstacleBehavior::OverTileBlocker, DamageRule::Any)
                    .with_diagonal(diagonal),
            ],
        )
    }

    #[test]
    fn test_collapse_keeps_order() {
        let mut grid = Grid::from_ascii(&["R", "G", ".", "."]);
        let events = collapse(&mut grid);
        assert_eq!(grid.to_ascii(), vec![".", ".", "R", "G"]);
        assert_eq!(
            events,
            vec![
                BoardEvent::TileMoved { from: 1, to: 3 },
                BoardEvent::TileMoved { from: 0, to: 2 },
            ]
        );
    }

    #[test]
    fn test_collapse_sees_through_holes() {
        let mut grid = Grid::from_ascii(&["R", "#", "."]);
        collapse(&mut grid);
        assert_eq!(grid.to_ascii(), vec![".", "#", "R"]);
    }

    #[test]
    fn test_collapse_stops_at_blocked() {
        let mut grid = Grid::from_ascii(&["R", ".", ".", "."]);
        grid.set_blocked(2, true);
        collapse(&mut grid);
        assert_eq!(grid.to_ascii(), vec![".", "R", "X", "."]);
    }

    #[test]
    fn test_spawn_through_holes() {
        let mut grid = Grid::from_ascii(&["#", ".", "G"]);
        let mut rng = SimpleRng::new(3);
        let events = spawn(&mut grid, &mut rng, 6);
        assert_eq!(events.len(), 1);
        assert!(grid.tile(1).is_some());
    }

    #[test]
    fn test_spawn_stops_at_blocked() {
        let mut grid = Grid::from_ascii(&[".", ".", "."]);
        grid.set_blocked(1, true);
        let mut rng = SimpleRng::new(3);
        spawn(&mut grid, &mut rng, 6);
        assert!(grid.tile(0).is_some());
        assert!(grid.tile(2).is_none());
    }

    #[test]
    fn test_slide_fill_under_diagonal_blocker() {
        let level = LevelData::new(3, 4, 10)
            .with_definition(blocker(true))
            .with_obstacle(1, 1, 1);
        let mut grid = Grid::from_ascii(&["RGB", "G.Y", "B.R", "Y#P"]);
        let mut obstacles = ObstacleField::from_level(&level);
        obstacles.sync_blocked(&mut grid);
        let mut rng = SimpleRng::new(5);

        assert_eq!(slide_targets(&grid, &obstacles), vec![7]);
        let events = settle(&mut grid, &obstacles, &mut rng, 6);
        assert!(grid.tile(7).is_some());
        assert!(events.contains(&BoardEvent::TileMoved { from: 3, to: 7 }));
        assert!(!grid.has_active_empty());
    }

    #[test]
    fn test_no_slide_past_solid_blocker() {
        let level = LevelData::new(3, 4, 10)
            .with_definition(blocker(false))
            .with_obstacle(1, 1, 1);
        let mut grid = Grid::from_ascii(&["RGB", "G.Y", "B.R", "Y#P"]);
        let mut obstacles = ObstacleField::from_level(&level);
        obstacles.sync_blocked(&mut grid);
        let mut rng = SimpleRng::new(5);

        settle(&mut grid, &obstacles, &mut rng, 6);
        assert!(grid.tile(7).is_none());
        assert_eq!(slide_targets(&grid, &obstacles), vec![7]);
    }

    #[test]
    fn test_blocker_without_hole_is_not_a_target() {
        let level = LevelData::new(3, 3, 10)
            .with_definition(blocker(true))
            .with_obstacle(1, 1, 1);
        let mut grid = Grid::from_ascii(&["RGB", "G.Y", "B.R"]);
        let mut obstacles = ObstacleField::from_level(&level);
        obstacles.sync_blocked(&mut grid);
        let mut rng = SimpleRng::new(5);

        assert!(slide_targets(&grid, &obstacles).is_empty());
        let events = settle(&mut grid, &obstacles, &mut rng, 6);
        assert!(events.is_empty());
        assert!(grid.tile(7).is_none());
    }

    #[test]
    fn test_floor_pocket_above_hole() {
        let mut grid = Grid::from_ascii(&["RGB", "G.Y", "B.R", "Y#P"]);
        grid.set_blocked(1, true);
        let obstacles = no_obstacles(&grid);
        // (1, 1) sits under a plain blocked cell with no hole beside it.
        assert_eq!(slide_targets(&grid, &obstacles), vec![7]);

        let mut rng = SimpleRng::new(1);
        let events = slide_fill(&mut grid, &obstacles, &mut rng, 6);
        assert!(events.contains(&BoardEvent::TileMoved { from: 3, to: 7 }));
        assert!(grid.tile(7).is_some());
        assert!(grid.tile(4).is_none());
    }
}
