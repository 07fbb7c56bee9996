//! Obstacle module - per-instance hit counters and stage rules
//!
//! Every obstacle instance has one origin cell holding its remaining-hit
//! counter; all other footprint cells point back to that origin and share its
//! id. The current stage is derived from the counter:
//!
//! ```text
//! stage = clamp(max_hits - remaining_hits, 0, stage_count - 1)
//! ```
//!
//! so stage 0 is undamaged and the last stage is about to break. A counter of
//! [`UNINITIALIZED_HITS`] reads as `max_hits`. Counters only decrease; at zero
//! the instance is removed from every footprint cell at once.

use arrayvec::ArrayVec;
use log::debug;

use crate::grid::Grid;
use crate::level::{LevelData, ObstacleDefinition, ObstacleLibrary};
use crate::types::{
    BoardEvent, DamageContext, ObstacleBehavior, StageRule, Tile, UNINITIALIZED_HITS,
};

/// Retry order for a rejected `Booster` hit
pub const BOOSTER_FALLBACK: [DamageContext; 2] =
    [DamageContext::SpecialActivation, DamageContext::NormalMatch];

/// Retry order for a cell force-marked by a caller
pub const FORCED_FALLBACK: [DamageContext; 4] = [
    DamageContext::SpecialActivation,
    DamageContext::Booster,
    DamageContext::NormalMatch,
    DamageContext::Scripted,
];

/// Retry order for definitions that allow cross-context fallback
pub const DEFINITION_FALLBACK: [DamageContext; 3] = [
    DamageContext::SpecialActivation,
    DamageContext::Booster,
    DamageContext::NormalMatch,
];

/// Result of one damage attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DamageOutcome {
    /// A hit was consumed
    pub hit: bool,
    /// The stage's damage rule refused the context; nothing changed
    pub rejected: bool,
    /// The instance reached zero hits and was removed
    pub destroyed: bool,
    /// Footprint cells of the instance that was touched
    pub cells: Vec<usize>,
    /// Tiles pushed off cells that the new stage blocks
    pub evicted: Vec<Tile>,
    pub events: Vec<BoardEvent>,
}

impl DamageOutcome {
    fn miss() -> Self {
        Self::default()
    }

    fn rejected(cells: Vec<usize>) -> Self {
        Self {
            rejected: true,
            cells,
            ..Self::default()
        }
    }
}

/// Pure stage resolution.
///
/// Returns `None` once the obstacle is broken (`remaining == 0`) or when there
/// are no stages at all.
pub fn stage_index(max_hits: u32, remaining: i32, stage_count: usize) -> Option<usize> {
    if stage_count == 0 {
        return None;
    }
    let remaining = if remaining == UNINITIALIZED_HITS {
        max_hits as i64
    } else {
        remaining as i64
    };
    if remaining <= 0 {
        return None;
    }
    let raw = max_hits as i64 - remaining;
    Some(raw.clamp(0, stage_count as i64 - 1) as usize)
}

/// Obstacle layer of the board
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleField {
    ids: Vec<u32>,
    origins: Vec<Option<usize>>,
    remaining: Vec<i32>,
    library: ObstacleLibrary,
}

impl ObstacleField {
    /// Empty field for a board of `len` cells
    pub fn new(len: usize, library: ObstacleLibrary) -> Self {
        Self {
            ids: vec![0; len],
            origins: vec![None; len],
            remaining: vec![UNINITIALIZED_HITS; len],
            library,
        }
    }

    /// Build from a prepared level (see [`LevelData::prepare`])
    pub fn from_level(level: &LevelData) -> Self {
        let len = level.cell_count().unwrap_or(0);
        let mut field = Self::new(len, level.library());
        for i in 0..len {
            let id = level.obstacle_ids.get(i).copied().unwrap_or(0);
            let origin = level.obstacle_origins.get(i).copied().unwrap_or(-1);
            if id == 0 || origin < 0 || origin as usize >= len || !field.library.contains(id) {
                continue;
            }
            field.ids[i] = id;
            field.origins[i] = Some(origin as usize);
        }
        field
    }

    /// Stamp an instance of `id` with its origin at `origin`, covering the
    /// definition's footprint. Cells already holding an obstacle are skipped.
    pub fn place(&mut self, grid: &Grid, origin: usize, id: u32) -> bool {
        let Some(def) = self.library.get(id) else {
            return false;
        };
        if origin >= self.ids.len() || self.ids[origin] != 0 {
            return false;
        }
        let (ox, oy) = grid.coords(origin);
        let (w, h) = (def.width as i32, def.height as i32);
        for dy in 0..h {
            for dx in 0..w {
                if let Some(cell) = grid.index(ox + dx, oy + dy) {
                    if self.ids[cell] == 0 {
                        self.ids[cell] = id;
                        self.origins[cell] = Some(origin);
                    }
                }
            }
        }
        self.remaining[origin] = UNINITIALIZED_HITS;
        true
    }

    pub fn library(&self) -> &ObstacleLibrary {
        &self.library
    }

    pub fn obstacle_id_at(&self, idx: usize) -> Option<u32> {
        match self.ids.get(idx) {
            Some(&id) if id != 0 => Some(id),
            _ => None,
        }
    }

    pub fn has_obstacle(&self, idx: usize) -> bool {
        self.obstacle_id_at(idx).is_some()
    }

    pub fn origin_of(&self, idx: usize) -> Option<usize> {
        self.obstacle_id_at(idx)?;
        self.origins.get(idx).copied().flatten()
    }

    /// Every cell pointing at `origin`, origin included
    pub fn footprint(&self, origin: usize) -> Vec<usize> {
        self.origins
            .iter()
            .enumerate()
            .filter_map(|(i, o)| (*o == Some(origin) && self.ids[i] != 0).then_some(i))
            .collect()
    }

    pub fn definition_at(&self, idx: usize) -> Option<&ObstacleDefinition> {
        self.library.get(self.obstacle_id_at(idx)?)
    }

    /// Remaining hits of the instance covering `idx`, resolving the sentinel
    pub fn remaining_hits(&self, idx: usize) -> Option<u32> {
        let origin = self.origin_of(idx)?;
        let def = self.definition_at(idx)?;
        let raw = self.remaining[origin];
        Some(if raw == UNINITIALIZED_HITS {
            def.max_hits
        } else {
            raw.max(0) as u32
        })
    }

    pub fn stage_index_at(&self, idx: usize) -> Option<usize> {
        let origin = self.origin_of(idx)?;
        let def = self.definition_at(idx)?;
        stage_index(def.max_hits, self.remaining[origin], def.stage_count())
    }

    pub fn current_stage(&self, idx: usize) -> Option<&StageRule> {
        let stage = self.stage_index_at(idx)?;
        self.definition_at(idx)?.stage(stage)
    }

    pub fn is_cell_blocked(&self, idx: usize) -> bool {
        self.current_stage(idx).map(|s| s.blocks_cells).unwrap_or(false)
    }

    pub fn is_over_tile_blocker_at(&self, idx: usize) -> bool {
        self.current_stage(idx)
            .map(|s| s.behavior == ObstacleBehavior::OverTileBlocker)
            .unwrap_or(false)
    }

    pub fn is_diagonal_allowed_at(&self, idx: usize) -> bool {
        self.current_stage(idx).map(|s| s.allow_diagonal).unwrap_or(false)
    }

    /// Push every cell's blocked flag into the grid from its current stage.
    /// Returns the tiles removed from cells that became blocked.
    pub fn sync_blocked(&self, grid: &mut Grid) -> Vec<Tile> {
        (0..grid.len().min(self.ids.len()))
            .filter_map(|i| grid.set_blocked(i, self.is_cell_blocked(i)))
            .collect()
    }

    /// One damage attempt against the obstacle covering `idx`.
    ///
    /// With `ignore_rule` false, a stage whose damage rule refuses `context`
    /// yields a rejected outcome and leaves all state untouched.
    pub fn try_damage(
        &mut self,
        grid: &mut Grid,
        idx: usize,
        context: DamageContext,
        ignore_rule: bool,
    ) -> DamageOutcome {
        let Some(origin) = self.origin_of(idx) else {
            return DamageOutcome::miss();
        };
        let Some(def) = self.library.get(self.ids[origin]) else {
            return DamageOutcome::miss();
        };
        let Some(stage) = stage_index(def.max_hits, self.remaining[origin], def.stage_count())
        else {
            return DamageOutcome::miss();
        };
        let cells = self.footprint(origin);
        if !ignore_rule && !def.stages[stage].damage_rule.accepts(context) {
            return DamageOutcome::rejected(cells);
        }

        let obstacle_id = def.id;
        let max_hits = def.max_hits as i32;
        let current = if self.remaining[origin] == UNINITIALIZED_HITS {
            max_hits
        } else {
            self.remaining[origin]
        };
        let left = current - 1;
        let mut outcome = DamageOutcome {
            hit: true,
            cells,
            ..DamageOutcome::default()
        };

        if left <= 0 {
            for &cell in &outcome.cells {
                self.ids[cell] = 0;
                self.origins[cell] = None;
                self.remaining[cell] = UNINITIALIZED_HITS;
                if grid.is_blocked(cell) {
                    grid.set_blocked(cell, false);
                    if !grid.is_hole(cell) {
                        outcome.events.push(BoardEvent::CellUnlocked { cell });
                    }
                }
            }
            outcome.destroyed = true;
            outcome.events.push(BoardEvent::ObstacleDestroyed {
                origin,
                obstacle_id,
            });
            debug!("obstacle {} at cell {} destroyed ({:?})", obstacle_id, origin, context);
            return outcome;
        }

        self.remaining[origin] = left;
        let Some(def) = self.library.get(obstacle_id) else {
            return outcome;
        };
        let new_index = stage_index(def.max_hits, left, def.stage_count()).unwrap_or(0);
        let new_stage = def.stages[new_index];
        for &cell in &outcome.cells {
            let was_blocked = grid.is_blocked(cell);
            if let Some(tile) = grid.set_blocked(cell, new_stage.blocks_cells) {
                outcome.evicted.push(tile);
            }
            if was_blocked && !new_stage.blocks_cells && !grid.is_hole(cell) {
                outcome.events.push(BoardEvent::CellUnlocked { cell });
            }
        }
        outcome.events.push(BoardEvent::ObstacleStageChanged {
            origin,
            stage_index: new_index,
            stage: new_stage,
        });
        debug!(
            "obstacle {} at cell {} now stage {} with {} hits left",
            obstacle_id, origin, new_index, left
        );
        outcome
    }

    /// Damage with the cross-context retry rules.
    ///
    /// A rejected hit is retried, first accepting context wins:
    /// - `forced` cells: [`FORCED_FALLBACK`]
    /// - `Booster` context: [`BOOSTER_FALLBACK`]
    /// - definitions with `allow_cross_context_fallback`: [`DEFINITION_FALLBACK`]
    pub fn damage_with_fallback(
        &mut self,
        grid: &mut Grid,
        idx: usize,
        context: DamageContext,
        forced: bool,
    ) -> DamageOutcome {
        let first = self.try_damage(grid, idx, context, false);
        if !first.rejected {
            return first;
        }

        let order: &[DamageContext] = if forced {
            &FORCED_FALLBACK
        } else if context == DamageContext::Booster {
            &BOOSTER_FALLBACK
        } else if self
            .definition_at(idx)
            .map(|d| d.allow_cross_context_fallback)
            .unwrap_or(false)
        {
            &DEFINITION_FALLBACK
        } else {
            return first;
        };

        for &alternate in order.iter().filter(|&&c| c != context) {
            let retry = self.try_damage(grid, idx, alternate, false);
            if retry.hit {
                debug!(
                    "cell {} accepted {:?} after {:?} was rejected",
                    idx, alternate, context
                );
                return retry;
            }
        }
        first
    }

    /// Over-tile blockers catching splash from an impact at `idx`.
    ///
    /// Orthogonal neighbours always count; diagonal neighbours only when the
    /// impacted cell's own stage allows diagonal traversal.
    pub fn splash_targets(&self, grid: &Grid, idx: usize) -> ArrayVec<usize, 8> {
        let mut out = ArrayVec::new();
        for n in grid.neighbors4(idx) {
            if self.is_over_tile_blocker_at(n) {
                out.push(n);
            }
        }
        if self.is_diagonal_allowed_at(idx) {
            for n in grid.diagonals(idx) {
                if self.is_over_tile_blocker_at(n) {
                    out.push(n);
                }
            }
        }
        out
    }
}
