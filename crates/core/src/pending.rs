//! Deferred special promotion
//!
//! The promotion target is decided while the match set is still intact but
//! applied after the clear. By then the chosen cell may have lost its tile
//! (evicted by a re-blocking obstacle stage, for instance), so apply-time
//! pulls the nearest tile from above in the same column into the target
//! cell before promoting it.

use log::debug;

use crate::grid::Grid;
use crate::special::SpecialDecision;
use crate::types::{BoardEvent, SpecialKind};

/// One queued promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCreation {
    pub cell: usize,
    pub kind: SpecialKind,
}

impl From<SpecialDecision> for PendingCreation {
    fn from(decision: SpecialDecision) -> Self {
        Self {
            cell: decision.cell,
            kind: decision.kind,
        }
    }
}

/// Promotions waiting for the clear phase to finish
#[derive(Debug, Clone, Default)]
pub struct PendingCreations {
    entries: Vec<PendingCreation>,
}

impl PendingCreations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, decision: SpecialDecision) {
        self.entries.push(decision.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Apply every queued promotion, returning the emitted events.
    ///
    /// Entries whose column has no tile left to relocate are dropped.
    pub fn apply(&mut self, grid: &mut Grid) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        for entry in self.entries.drain(..) {
            if grid.is_hole(entry.cell) || grid.is_blocked(entry.cell) {
                debug!("pending {:?} at {} lost its cell", entry.kind, entry.cell);
                continue;
            }
            if grid.tile(entry.cell).is_none() {
                let Some(source) = nearest_above(grid, entry.cell) else {
                    debug!("pending {:?} at {} found no tile", entry.kind, entry.cell);
                    continue;
                };
                let tile = grid.take(source);
                grid.put(entry.cell, tile);
                events.push(BoardEvent::TileMoved {
                    from: source,
                    to: entry.cell,
                });
            }
            if let Some(tile) = grid.tile_mut(entry.cell) {
                tile.promote(entry.kind);
                events.push(BoardEvent::SpecialCreated {
                    cell: entry.cell,
                    kind: entry.kind,
                });
            }
        }
        events
    }
}

/// Nearest tile above `idx` in its column, looking through holes and
/// stopping at blocked cells.
fn nearest_above(grid: &Grid, idx: usize) -> Option<usize> {
    let (x, mut y) = grid.coords(idx);
    while y > 0 {
        y -= 1;
        let above = grid.index(x, y)?;
        if grid.is_blocked(above) {
            return None;
        }
        if grid.is_hole(above) {
            continue;
        }
        if grid.tile(above).is_some() {
            return Some(above);
        }
    }
    None
}
