//! Play session - the board state machine
//!
//! A [`Session`] owns the grid, the obstacle layer, goal progress and the
//! seeded RNG, and resolves whole turns synchronously:
//!
//! ```text
//! swap ─► validate ─► special path ─► combo/activation ─► clear ─► settle ─┐
//!                  └► plain path ───► match at both cells ─► clear ─► settle ─┤
//!                                                                          ▼
//!                cascade: find all ─► drop specials ─► promote ─► clear ─► settle ─► repeat
//! ```
//!
//! Every operation returns a [`TurnReport`] listing the events in the order
//! the state changed. Presentation hosts may register their own busy work
//! with [`Session::enter_busy`]/[`Session::leave_busy`] while they animate;
//! input is refused until the gate drains.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info, warn};

use crate::busy::BusyGate;
use crate::config::SessionConfig;
use crate::core::{
    find_all_matches, find_matches_at, find_squares_at, try_create_special, BoardSnapshot,
    DamageOutcome, EffectContext, GoalTracker, Grid, LevelData, LevelError, MatchSet,
    ObstacleField, PendingCreations, RandomChooser, SimpleRng, TargetChooser,
};
use crate::gravity;
use crate::types::{BoardEvent, BoosterKind, DamageContext, GemKind, Goal, MIN_RUN};

/// Why a swap request was refused. No state changes on refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapError {
    Busy,
    InputLocked,
    OutOfBounds,
    NotAdjacent,
    EmptyCell,
    NoMovesLeft,
}

impl SwapError {
    pub fn code(self) -> &'static str {
        match self {
            SwapError::Busy | SwapError::InputLocked => "not_accepting_input",
            SwapError::NoMovesLeft => "no_moves_left",
            SwapError::OutOfBounds | SwapError::NotAdjacent | SwapError::EmptyCell => {
                "invalid_swap"
            }
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            SwapError::Busy => "board is still resolving",
            SwapError::InputLocked => "input is locked",
            SwapError::OutOfBounds => "cell is outside the board",
            SwapError::NotAdjacent => "cells are not orthogonally adjacent",
            SwapError::EmptyCell => "both cells must hold a tile",
            SwapError::NoMovesLeft => "move budget is exhausted",
        }
    }
}

impl fmt::Display for SwapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for SwapError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoosterError {
    NoBoosterArmed,
    Busy,
    InputLocked,
    OutOfBounds,
}

impl BoosterError {
    pub fn code(self) -> &'static str {
        match self {
            BoosterError::Busy | BoosterError::InputLocked => "not_accepting_input",
            BoosterError::NoBoosterArmed => "no_booster",
            BoosterError::OutOfBounds => "invalid_target",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            BoosterError::NoBoosterArmed => "no booster selected",
            BoosterError::Busy => "board is still resolving",
            BoosterError::InputLocked => "input is locked",
            BoosterError::OutOfBounds => "target cell is outside the board",
        }
    }
}

impl fmt::Display for BoosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for BoosterError {}

/// Where the level stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    InProgress,
    Won,
    OutOfMoves,
}

/// What one turn did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub events: Vec<BoardEvent>,
    /// Cascade passes run after the initial clear
    pub passes: u32,
    /// The cascade hit the pass cap with matches left on the board
    pub aborted: bool,
    /// The swap made no match and was undone
    pub reverted: bool,
    pub moves_left: u32,
}

impl TurnReport {
    /// Tiles removed this turn, summed over gem kinds
    pub fn cleared_total(&self) -> u32 {
        self.events
            .iter()
            .map(|e| match e {
                BoardEvent::TilesCleared { count, .. } => *count,
                _ => 0,
            })
            .sum()
    }

    pub fn cleared(&self, gem: GemKind) -> u32 {
        self.events
            .iter()
            .map(|e| match e {
                BoardEvent::TilesCleared { gem: g, count } if *g == gem => *count,
                _ => 0,
            })
            .sum()
    }
}

#[derive(Default)]
struct Turn {
    events: Vec<BoardEvent>,
    cleared: BTreeMap<GemKind, u32>,
    passes: u32,
    aborted: bool,
    reverted: bool,
}

impl Turn {
    /// Keep the events of a damage attempt and count tiles its new stage
    /// pushed off the board. Returns that count.
    fn absorb(&mut self, outcome: DamageOutcome) -> u32 {
        for tile in &outcome.evicted {
            *self.cleared.entry(tile.gem).or_default() += 1;
        }
        self.events.extend(outcome.events);
        outcome.evicted.len() as u32
    }
}

pub struct Session {
    grid: Grid,
    obstacles: ObstacleField,
    goals: GoalTracker,
    rng: SimpleRng,
    chooser: Box<dyn TargetChooser>,
    config: SessionConfig,
    moves_left: u32,
    busy: BusyGate,
    input_locked: bool,
    armed_booster: Option<BoosterKind>,
    pending: PendingCreations,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("board", &self.grid.to_ascii())
            .field("moves_left", &self.moves_left)
            .field("busy", &self.busy)
            .field("input_locked", &self.input_locked)
            .field("armed_booster", &self.armed_booster)
            .finish()
    }
}

impl Session {
    /// Start a session from a level: validate, lay out obstacles, then fill
    /// the board without pre-made matches.
    pub fn new(mut level: LevelData, config: SessionConfig) -> Result<Self, LevelError> {
        level.prepare()?;
        let grid = Grid::with_mask(level.width, level.height, &level.cell_mask);
        let obstacles = ObstacleField::from_level(&level);
        let mut session = Self::from_parts(grid, obstacles, level.moves, &level.goals, config);
        session.initial_fill();
        info!(
            "session ready: {}x{} board, {} moves, {} goals, seed {}",
            level.width,
            level.height,
            level.moves,
            level.goals.len(),
            config.seed
        );
        Ok(session)
    }

    /// Assemble a session around an existing board. Blocked flags are synced
    /// from the obstacle layer; nothing is filled.
    pub fn from_parts(
        mut grid: Grid,
        obstacles: ObstacleField,
        moves: u32,
        goals: &[Goal],
        config: SessionConfig,
    ) -> Self {
        let covered = obstacles.sync_blocked(&mut grid);
        if !covered.is_empty() {
            debug!("{} tiles removed from cells under blocking obstacles", covered.len());
        }
        Self {
            grid,
            obstacles,
            goals: GoalTracker::new(goals),
            rng: SimpleRng::new(config.seed),
            chooser: Box::new(RandomChooser),
            config,
            moves_left: moves,
            busy: BusyGate::new(),
            input_locked: false,
            armed_booster: None,
            pending: PendingCreations::new(),
        }
    }

    /// Replace the teleport target chooser
    pub fn with_chooser(mut self, chooser: Box<dyn TargetChooser>) -> Self {
        self.chooser = chooser;
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn obstacles(&self) -> &ObstacleField {
        &self.obstacles
    }

    pub fn goals(&self) -> &GoalTracker {
        &self.goals
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn moves_left(&self) -> u32 {
        self.moves_left
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn armed_booster(&self) -> Option<BoosterKind> {
        self.armed_booster
    }

    pub fn set_input_locked(&mut self, locked: bool) {
        self.input_locked = locked;
    }

    /// Register outside busy work (e.g. an animation in flight)
    pub fn enter_busy(&mut self) {
        self.busy.enter();
    }

    pub fn leave_busy(&mut self) {
        self.busy.leave();
    }

    /// Advance the idle gate. Yields `BoardIdle` once per drained turn.
    pub fn tick(&mut self) -> Vec<BoardEvent> {
        if self.busy.tick() {
            vec![BoardEvent::BoardIdle]
        } else {
            Vec::new()
        }
    }

    pub fn run_after_idle(&mut self, callback: impl FnOnce() + 'static) {
        self.busy.run_after_idle(callback);
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot::capture(
            &self.grid,
            &self.obstacles,
            self.moves_left,
            self.busy.is_busy(),
        )
    }

    pub fn outcome(&self) -> Outcome {
        if self.goals.all_complete() {
            Outcome::Won
        } else if self.moves_left == 0 {
            Outcome::OutOfMoves
        } else {
            Outcome::InProgress
        }
    }

    /// Run the cascade loop over the current board (after the initial fill).
    pub fn resolve_initial(&mut self) -> TurnReport {
        self.busy.enter();
        let mut turn = Turn::default();
        self.cascade(&mut turn);
        self.busy.leave();
        self.finish(turn)
    }

    /// Swap the tiles at cells `a` and `b` and resolve the turn.
    ///
    /// A swap that makes no match is undone and costs no move; that is
    /// reported through [`TurnReport::reverted`], not as an error.
    pub fn request_swap(&mut self, a: usize, b: usize) -> Result<TurnReport, SwapError> {
        if self.busy.is_busy() {
            return Err(SwapError::Busy);
        }
        if self.input_locked {
            return Err(SwapError::InputLocked);
        }
        if a >= self.grid.len() || b >= self.grid.len() {
            return Err(SwapError::OutOfBounds);
        }
        if !self.grid.is_adjacent(a, b) {
            return Err(SwapError::NotAdjacent);
        }
        let movable = |i: usize| {
            self.grid.tile(i).is_some() && !self.grid.is_blocked(i) && !self.grid.is_hole(i)
        };
        if !movable(a) || !movable(b) {
            return Err(SwapError::EmptyCell);
        }
        if self.moves_left == 0 {
            return Err(SwapError::NoMovesLeft);
        }

        self.busy.enter();
        let mut turn = Turn::default();
        self.grid.swap(a, b);
        turn.events.push(BoardEvent::TilesSwapped { a, b });

        // The tile dragged from `a` now sits on `b`.
        let (anchor, partner) = (b, a);
        let special = [anchor, partner]
            .iter()
            .any(|&i| self.grid.tile(i).map(|t| t.is_special()).unwrap_or(false));

        if special {
            self.consume_move(&mut turn);
            let effect = self.effect_context().apply_combo_effect(anchor, partner);
            turn.events.extend(effect.events);
            self.clear_cells(
                &effect.cells,
                &effect.forced,
                DamageContext::SpecialActivation,
                false,
                &mut turn,
            );
            self.settle(&mut turn);
            self.cascade(&mut turn);
        } else {
            let mut matches = self.matches_around(&[anchor, partner]);
            if matches.is_empty() {
                self.grid.swap(a, b);
                turn.events.push(BoardEvent::SwapReverted { a, b });
                turn.reverted = true;
                debug!("swap {} <-> {} made no match", a, b);
            } else {
                self.consume_move(&mut turn);
                self.drop_specials(&mut matches);
                if let Some(decision) =
                    try_create_special(&self.grid, &mut matches, Some((anchor, partner)))
                {
                    self.pending.capture(decision);
                }
                self.clear_cells(
                    &matches,
                    &BTreeSet::new(),
                    DamageContext::NormalMatch,
                    true,
                    &mut turn,
                );
                turn.events.extend(self.pending.apply(&mut self.grid));
                self.settle(&mut turn);
                self.cascade(&mut turn);
            }
        }

        self.busy.leave();
        Ok(self.finish(turn))
    }

    /// Select a booster. The next [`Session::apply_booster_at_cell`] uses it.
    pub fn activate_booster(&mut self, kind: BoosterKind) -> Result<(), BoosterError> {
        self.check_booster_input()?;
        self.armed_booster = Some(kind);
        Ok(())
    }

    /// Fire the armed booster at (x, y). Boosters cost no move.
    pub fn apply_booster_at_cell(&mut self, x: i32, y: i32) -> Result<TurnReport, BoosterError> {
        self.check_booster_input()?;
        let kind = self.armed_booster.ok_or(BoosterError::NoBoosterArmed)?;
        let idx = self.grid.index(x, y).ok_or(BoosterError::OutOfBounds)?;
        self.armed_booster = None;

        self.busy.enter();
        let mut turn = Turn::default();
        if kind == BoosterKind::Shuffle {
            self.shuffle(&mut turn);
        } else {
            let footprint: Vec<usize> = match kind {
                BoosterKind::Row => (0..self.grid.width() as i32)
                    .filter_map(|cx| self.grid.index(cx, y))
                    .collect(),
                BoosterKind::Column => (0..self.grid.height() as i32)
                    .filter_map(|cy| self.grid.index(x, cy))
                    .collect(),
                _ => vec![idx],
            };
            let effect = self.effect_context().expand_cells(footprint);
            turn.events.extend(effect.events);
            self.clear_cells(
                &effect.cells,
                &effect.forced,
                DamageContext::Booster,
                kind == BoosterKind::Single,
                &mut turn,
            );
            self.settle(&mut turn);
        }
        self.cascade(&mut turn);
        self.busy.leave();
        info!("booster {} at ({}, {})", kind.as_str(), x, y);
        Ok(self.finish(turn))
    }

    fn check_booster_input(&self) -> Result<(), BoosterError> {
        if self.busy.is_busy() {
            return Err(BoosterError::Busy);
        }
        if self.input_locked {
            return Err(BoosterError::InputLocked);
        }
        Ok(())
    }

    fn effect_context(&mut self) -> EffectContext<'_> {
        EffectContext {
            grid: &mut self.grid,
            obstacles: &self.obstacles,
            rng: &mut self.rng,
            goals: &self.goals,
            chooser: self.chooser.as_mut(),
        }
    }

    fn consume_move(&mut self, turn: &mut Turn) {
        self.moves_left = self.moves_left.saturating_sub(1);
        turn.events.push(BoardEvent::MovesChanged {
            remaining: self.moves_left,
        });
    }

    fn matches_around(&self, cells: &[usize]) -> MatchSet {
        let mut matches = MatchSet::new();
        for &idx in cells {
            let (x, y) = self.grid.coords(idx);
            matches.extend(find_matches_at(&self.grid, x, y));
            matches.extend(find_squares_at(&self.grid, x, y));
        }
        matches
    }

    /// Specials are only ever removed by activation.
    fn drop_specials(&self, matches: &mut MatchSet) {
        matches.retain(|&i| !self.grid.tile(i).map(|t| t.is_special()).unwrap_or(false));
    }

    /// Remove the tiles on `cells` and damage what lies under them.
    ///
    /// Each obstacle instance takes at most one hit per clear, even when
    /// several of its footprint cells are in the set. With `splash`, over-tile
    /// blockers next to an impacted cell take a hit too.
    fn clear_cells(
        &mut self,
        cells: &BTreeSet<usize>,
        forced: &BTreeSet<usize>,
        context: DamageContext,
        splash: bool,
        turn: &mut Turn,
    ) {
        // Splash reach depends on the impacted stage before it takes damage.
        let splash_targets: Vec<usize> = if splash {
            cells
                .iter()
                .flat_map(|&c| self.obstacles.splash_targets(&self.grid, c))
                .filter(|t| !cells.contains(t))
                .collect()
        } else {
            Vec::new()
        };

        let mut hit_origins = BTreeSet::new();
        let mut removed = 0;
        for &cell in cells {
            if let Some(tile) = self.grid.take(cell) {
                *turn.cleared.entry(tile.gem).or_default() += 1;
                removed += 1;
            }
            let Some(origin) = self.obstacles.origin_of(cell) else {
                continue;
            };
            if !hit_origins.insert(origin) {
                continue;
            }
            let is_forced = self
                .obstacles
                .footprint(origin)
                .iter()
                .any(|c| forced.contains(c));
            let outcome =
                self.obstacles
                    .damage_with_fallback(&mut self.grid, cell, context, is_forced);
            removed += turn.absorb(outcome);
        }

        for target in splash_targets {
            let Some(origin) = self.obstacles.origin_of(target) else {
                continue;
            };
            if hit_origins.insert(origin) {
                let outcome =
                    self.obstacles
                        .damage_with_fallback(&mut self.grid, target, context, false);
                removed += turn.absorb(outcome);
            }
        }
        debug!(
            "cleared {} tiles over {} cells ({:?}), {} obstacles hit",
            removed,
            cells.len(),
            context,
            hit_origins.len()
        );
    }

    fn settle(&mut self, turn: &mut Turn) {
        let events = gravity::settle(
            &mut self.grid,
            &self.obstacles,
            &mut self.rng,
            self.config.gem_kinds,
        );
        turn.events.extend(events);
    }

    /// Resolve chain matches until the board is stable or the pass cap is hit.
    fn cascade(&mut self, turn: &mut Turn) {
        let mut pass = 0;
        loop {
            let mut matches = find_all_matches(&self.grid);
            if matches.is_empty() {
                break;
            }
            if pass >= self.config.max_cascade_passes {
                warn!(
                    "cascade still matching after {} passes; leaving {} matched cells",
                    pass,
                    matches.len()
                );
                turn.events.push(BoardEvent::CascadeAborted { passes: pass });
                turn.aborted = true;
                break;
            }
            pass += 1;

            self.drop_specials(&mut matches);
            if matches.is_empty() {
                break;
            }
            if let Some(decision) = try_create_special(&self.grid, &mut matches, None) {
                self.pending.capture(decision);
            }
            debug!("cascade pass {}: {} cells", pass, matches.len());
            self.clear_cells(
                &matches,
                &BTreeSet::new(),
                DamageContext::NormalMatch,
                true,
                turn,
            );
            turn.events.extend(self.pending.apply(&mut self.grid));
            self.settle(turn);
        }
        turn.passes += pass;
    }

    /// Permute the gems of every placed tile; specials are lost.
    fn shuffle(&mut self, turn: &mut Turn) {
        let cells: Vec<usize> = self
            .grid
            .occupied()
            .filter(|&i| !self.grid.is_hole(i))
            .collect();
        let mut gems: Vec<GemKind> = cells
            .iter()
            .filter_map(|&i| self.grid.tile(i).map(|t| t.gem))
            .collect();
        self.rng.shuffle(&mut gems);
        for (&cell, gem) in cells.iter().zip(gems) {
            if let Some(tile) = self.grid.tile_mut(cell) {
                tile.consume_special();
                tile.gem = gem;
            }
        }
        turn.events.push(BoardEvent::BoardShuffled);
    }

    /// Fill every active-empty cell, avoiding gems that would complete a
    /// run or a 2x2 square with tiles already on the board.
    fn initial_fill(&mut self) {
        for idx in 0..self.grid.len() {
            if !self.grid.is_active_empty(idx) {
                continue;
            }
            let mut gem = self.rng.gem(self.config.gem_kinds);
            let mut attempts = 1;
            while creates_match(&self.grid, idx, gem) && attempts < self.config.initial_fill_attempts
            {
                gem = self.rng.gem(self.config.gem_kinds);
                attempts += 1;
            }
            if creates_match(&self.grid, idx, gem) {
                let kinds = self.config.gem_kinds.clamp(1, GemKind::ALL.len() as u8) as usize;
                if let Some(&safe) = GemKind::ALL[..kinds]
                    .iter()
                    .find(|&&g| !creates_match(&self.grid, idx, g))
                {
                    gem = safe;
                }
            }
            self.grid.place(idx, gem);
        }
    }

    fn finish(&mut self, turn: Turn) -> TurnReport {
        let mut events = turn.events;
        events.extend(
            turn.cleared
                .into_iter()
                .map(|(gem, count)| BoardEvent::TilesCleared { gem, count }),
        );
        self.goals.observe_all(&events);
        TurnReport {
            events,
            passes: turn.passes,
            aborted: turn.aborted,
            reverted: turn.reverted,
            moves_left: self.moves_left,
        }
    }
}

/// Would `gem` at `idx` complete a run or a uniform 2x2 square?
fn creates_match(grid: &Grid, idx: usize, gem: GemKind) -> bool {
    let (x, y) = grid.coords(idx);
    let same = |cx: i32, cy: i32| grid.matchable_gem(cx, cy) == Some(gem);
    let count = |dx: i32, dy: i32| {
        (1..)
            .take_while(|&step| same(x + dx * step, y + dy * step))
            .count()
    };
    if 1 + count(-1, 0) + count(1, 0) >= MIN_RUN || 1 + count(0, -1) + count(0, 1) >= MIN_RUN {
        return true;
    }
    [(-1, -1), (0, -1), (-1, 0), (0, 0)].iter().any(|&(ox, oy)| {
        let (sx, sy) = (x + ox, y + oy);
        [(sx, sy), (sx + 1, sy), (sx, sy + 1), (sx + 1, sy + 1)]
            .iter()
            .filter(|&&(cx, cy)| (cx, cy) != (x, y))
            .all(|&(cx, cy)| same(cx, cy))
    })
}
