//! Snapshot module - serializable board state for hosts
//!
//! A [`BoardSnapshot`] is a plain copy taken between turns. It owns no
//! references into the session, so hosts can keep, diff or serialize it.

use serde::Serialize;

use crate::grid::Grid;
use crate::obstacle::ObstacleField;
use crate::types::Tile;

/// One cell as a host sees it. Obstacle fields are `None` on free cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CellSnapshot {
    pub tile: Option<Tile>,
    pub hole: bool,
    pub blocked: bool,
    pub obstacle_id: Option<u32>,
    pub remaining_hits: Option<u32>,
    pub stage_index: Option<usize>,
}

/// Read-only copy of the board for presentation hosts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BoardSnapshot {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<CellSnapshot>,
    pub moves_left: u32,
    pub busy: bool,
}

impl BoardSnapshot {
    pub fn capture(grid: &Grid, obstacles: &ObstacleField, moves_left: u32, busy: bool) -> Self {
        let cells = (0..grid.len())
            .map(|i| CellSnapshot {
                tile: grid.tile(i).copied(),
                hole: grid.is_hole(i),
                blocked: grid.is_blocked(i),
                obstacle_id: obstacles.obstacle_id_at(i),
                remaining_hits: obstacles.remaining_hits(i),
                stage_index: obstacles.stage_index_at(i),
            })
            .collect();
        Self {
            width: grid.width(),
            height: grid.height(),
            cells,
            moves_left,
            busy,
        }
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&CellSnapshot> {
        if x >= self.width {
            return None;
        }
        self.cells.get(y * self.width + x)
    }

    pub fn tile_count(&self) -> usize {
        self.cells.iter().filter(|c| c.tile.is_some()).count()
    }

    /// Interactive means moves remain and no turn is resolving
    pub fn playable(&self) -> bool {
        self.moves_left > 0 && !self.busy
    }
}
