//! Special tile resolver - creation, activation and combos
//!
//! Effects are planned, not applied: every activation grows an [`Effect`]
//! (the set of affected cells plus cells whose obstacle must take the hit)
//! and the engine clears that set in one go. Tiles caught by an effect that
//! carry their own special are queued and activated breadth-first, each tile
//! at most once (deduplicated by tile id).
//!
//! A cell may be affected if it is not a mask hole, or if it is a hole that
//! currently hosts an obstacle.

use std::collections::{BTreeSet, HashSet, VecDeque};

use log::debug;

use crate::grid::Grid;
use crate::matcher::{decide_special_at, MatchSet};
use crate::obstacle::ObstacleField;
use crate::rng::SimpleRng;
use crate::types::{BoardEvent, GemKind, SpecialKind};

/// Read access to the goal tracker, used to rank teleport targets
pub trait GoalView {
    fn is_tile_goal_active(&self, gem: GemKind) -> bool;
    fn is_obstacle_goal_active(&self, obstacle_id: u32) -> bool;
}

/// Goal view for sessions without goals
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGoals;

impl GoalView for NoGoals {
    fn is_tile_goal_active(&self, _gem: GemKind) -> bool {
        false
    }

    fn is_obstacle_goal_active(&self, _obstacle_id: u32) -> bool {
        false
    }
}

/// Picks one teleport target out of the best non-empty priority tier
pub trait TargetChooser {
    fn choose(&mut self, candidates: &[usize], rng: &mut SimpleRng) -> Option<usize>;
}

/// Uniform pick within the tier (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomChooser;

impl TargetChooser for RandomChooser {
    fn choose(&mut self, candidates: &[usize], rng: &mut SimpleRng) -> Option<usize> {
        rng.pick(candidates)
    }
}

/// Deterministic chooser: first listed cell present in the tier, else the lowest candidate
#[derive(Debug, Clone, Default)]
pub struct PreferredTargets {
    cells: Vec<usize>,
}

impl PreferredTargets {
    pub fn new(cells: Vec<usize>) -> Self {
        Self { cells }
    }
}

impl TargetChooser for PreferredTargets {
    fn choose(&mut self, candidates: &[usize], _rng: &mut SimpleRng) -> Option<usize> {
        self.cells
            .iter()
            .find(|c| candidates.contains(c))
            .copied()
            .or_else(|| candidates.first().copied())
    }
}

/// Which tile to promote after a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialDecision {
    pub cell: usize,
    pub kind: SpecialKind,
}

fn classify(grid: &Grid, matches: &MatchSet, idx: usize) -> SpecialKind {
    if !matches.contains(&idx) {
        return SpecialKind::None;
    }
    match grid.tile(idx) {
        Some(tile) if !tile.is_special() => {
            let (x, y) = grid.coords(idx);
            decide_special_at(grid, x, y, matches)
        }
        _ => SpecialKind::None,
    }
}

/// Pick at most one matched tile to become special and drop it from `matches`.
///
/// With `swap = Some((first, second))` (first pass after a player swap) only
/// the two swapped cells compete and ties favor `first`. Otherwise every
/// matched tile competes and ties favor the lowest cell index.
pub fn try_create_special(
    grid: &Grid,
    matches: &mut MatchSet,
    swap: Option<(usize, usize)>,
) -> Option<SpecialDecision> {
    let (cell, kind) = match swap {
        Some((first, second)) => {
            let a = classify(grid, matches, first);
            let b = classify(grid, matches, second);
            if b.creation_score() > a.creation_score() {
                (second, b)
            } else {
                (first, a)
            }
        }
        None => {
            let mut best = (0usize, SpecialKind::None);
            for &idx in matches.iter() {
                let kind = classify(grid, matches, idx);
                if kind.creation_score() > best.1.creation_score() {
                    best = (idx, kind);
                }
            }
            best
        }
    };
    if !kind.is_special() {
        return None;
    }
    if grid.tile(cell).is_none() {
        return None;
    }
    matches.remove(&cell);
    Some(SpecialDecision { cell, kind })
}

/// Whether a special effect may touch `idx`
pub fn is_cell_eligible(grid: &Grid, obstacles: &ObstacleField, idx: usize) -> bool {
    idx < grid.len() && (!grid.is_hole(idx) || obstacles.has_obstacle(idx))
}

/// Affected cells accumulated by one activation and its chain reactions
#[derive(Debug, Clone, Default)]
pub struct Effect {
    pub cells: BTreeSet<usize>,
    /// Cells whose obstacle must take the hit whatever its damage rule
    pub forced: BTreeSet<usize>,
    pub events: Vec<BoardEvent>,
    processed: HashSet<u32>,
    queued: HashSet<u32>,
    queue: VecDeque<usize>,
}

impl Effect {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.cells.contains(&idx)
    }
}

#[derive(Debug, Clone, Copy)]
struct Consumed {
    cell: usize,
    kind: SpecialKind,
    gem: GemKind,
    override_gem: Option<GemKind>,
}

/// Everything an activation reads or mutates
pub struct EffectContext<'a> {
    pub grid: &'a mut Grid,
    pub obstacles: &'a ObstacleField,
    pub rng: &'a mut SimpleRng,
    pub goals: &'a dyn GoalView,
    pub chooser: &'a mut dyn TargetChooser,
}

impl<'a> EffectContext<'a> {
    fn add(&mut self, effect: &mut Effect, idx: usize) {
        if !is_cell_eligible(self.grid, self.obstacles, idx) {
            return;
        }
        effect.cells.insert(idx);
        if let Some(tile) = self.grid.tile(idx) {
            if tile.is_special()
                && !effect.processed.contains(&tile.id)
                && effect.queued.insert(tile.id)
            {
                effect.queue.push_back(idx);
            }
        }
    }

    fn add_xy(&mut self, effect: &mut Effect, x: i32, y: i32) {
        if let Some(idx) = self.grid.index(x, y) {
            self.add(effect, idx);
        }
    }

    fn add_row(&mut self, effect: &mut Effect, y: i32) {
        for x in 0..self.grid.width() as i32 {
            self.add_xy(effect, x, y);
        }
    }

    fn add_col(&mut self, effect: &mut Effect, x: i32) {
        for y in 0..self.grid.height() as i32 {
            self.add_xy(effect, x, y);
        }
    }

    fn add_box(&mut self, effect: &mut Effect, cx: i32, cy: i32, radius: i32) {
        for y in cy - radius..=cy + radius {
            for x in cx - radius..=cx + radius {
                self.add_xy(effect, x, y);
            }
        }
    }

    fn add_all(&mut self, effect: &mut Effect) {
        for idx in 0..self.grid.len() {
            self.add(effect, idx);
        }
    }

    fn add_gem(&mut self, effect: &mut Effect, gem: GemKind) {
        let cells: Vec<usize> = self
            .grid
            .occupied()
            .filter(|&i| self.grid.tile(i).map(|t| t.gem) == Some(gem))
            .collect();
        for idx in cells {
            self.add(effect, idx);
        }
    }

    /// Line effect of `kind` through (x, y)
    fn add_line(&mut self, effect: &mut Effect, kind: SpecialKind, x: i32, y: i32) {
        if kind == SpecialKind::LineV {
            self.add_col(effect, x);
        } else {
            self.add_row(effect, y);
        }
    }

    /// Choose a teleport landing cell.
    ///
    /// Tiers, best first: obstacles of an active obstacle goal, tiles of an
    /// active tile goal, any other obstacle, any other occupied cell.
    pub fn teleport_target(&mut self, exclude: &BTreeSet<usize>) -> Option<usize> {
        let mut tiers: [Vec<usize>; 4] = Default::default();
        for idx in 0..self.grid.len() {
            if exclude.contains(&idx) || !is_cell_eligible(self.grid, self.obstacles, idx) {
                continue;
            }
            let obstacle = self.obstacles.obstacle_id_at(idx);
            let tile = self.grid.tile(idx);
            if let Some(id) = obstacle {
                if self.goals.is_obstacle_goal_active(id) {
                    tiers[0].push(idx);
                    continue;
                }
            }
            if let Some(tile) = tile {
                if self.goals.is_tile_goal_active(tile.gem) {
                    tiers[1].push(idx);
                    continue;
                }
            }
            if obstacle.is_some() {
                tiers[2].push(idx);
            } else if tile.is_some() {
                tiers[3].push(idx);
            }
        }
        let tier = tiers.iter().find(|t| !t.is_empty())?;
        self.chooser.choose(tier, self.rng)
    }

    /// Teleport a PatchBot from `from` and mark its landing cell. Returns the landing cell.
    fn patch_bot_hit(&mut self, effect: &mut Effect, from: usize) -> Option<usize> {
        let mut exclude = effect.cells.clone();
        exclude.insert(from);
        let target = self.teleport_target(&exclude)?;
        effect.forced.insert(target);
        self.add(effect, target);
        effect.events.push(BoardEvent::PatchBotTeleported { from, to: target });
        debug!("patch bot {} -> {}", from, target);
        Some(target)
    }

    /// Strip the special from the tile at `idx` and mark it consumed.
    fn consume(&mut self, effect: &mut Effect, idx: usize) -> Option<Consumed> {
        let tile = self.grid.tile_mut(idx)?;
        let id = tile.id;
        let gem = tile.gem;
        let (kind, override_gem) = tile.consume_special();
        effect.processed.insert(id);
        effect.cells.insert(idx);
        if kind.is_special() {
            effect
                .events
                .push(BoardEvent::SpecialActivated { cell: idx, kind });
        }
        Some(Consumed {
            cell: idx,
            kind,
            gem,
            override_gem,
        })
    }

    fn activate_one(&mut self, effect: &mut Effect, idx: usize) {
        match self.grid.tile(idx) {
            Some(tile) if tile.is_special() && !effect.processed.contains(&tile.id) => {}
            _ => return,
        }
        let Some(consumed) = self.consume(effect, idx) else {
            return;
        };
        let (x, y) = self.grid.coords(idx);
        match consumed.kind {
            SpecialKind::LineH | SpecialKind::LineV => self.add_line(effect, consumed.kind, x, y),
            SpecialKind::PulseCore => self.add_box(effect, x, y, 1),
            SpecialKind::SystemOverride => {
                self.add_gem(effect, consumed.override_gem.unwrap_or(consumed.gem))
            }
            SpecialKind::PatchBot => {
                // With no legal target the bot only clears itself.
                self.patch_bot_hit(effect, idx);
            }
            SpecialKind::None => {}
        }
    }

    fn run_chain(&mut self, effect: &mut Effect) {
        while let Some(idx) = effect.queue.pop_front() {
            self.activate_one(effect, idx);
        }
    }

    /// Activate one special on its own, then its chain reactions.
    pub fn apply_special_activation(&mut self, idx: usize) -> Effect {
        let mut effect = Effect::default();
        self.activate_one(&mut effect, idx);
        self.run_chain(&mut effect);
        effect
    }

    /// Affect a fixed set of cells (boosters) and chain any specials caught in it.
    pub fn expand_cells(&mut self, cells: impl IntoIterator<Item = usize>) -> Effect {
        let mut effect = Effect::default();
        for idx in cells {
            self.add(&mut effect, idx);
        }
        self.run_chain(&mut effect);
        effect
    }

    /// Resolve a swap where at least one tile is special.
    ///
    /// `anchor` is the cell the dragged tile landed on, `partner` the other one.
    pub fn apply_combo_effect(&mut self, anchor: usize, partner: usize) -> Effect {
        use SpecialKind as K;

        let mut effect = Effect::default();
        let kind_at =
            |grid: &Grid, idx: usize| grid.tile(idx).map(|t| t.special).unwrap_or(K::None);
        let ka = kind_at(self.grid, anchor);
        let kb = kind_at(self.grid, partner);

        // A lone PulseCore or PatchBot has no combo rule: it simply fires.
        match (ka, kb) {
            (K::None, K::None) => return effect,
            (k, K::None) if matches!(k, K::PulseCore | K::PatchBot) => {
                self.activate_one(&mut effect, anchor);
                self.run_chain(&mut effect);
                return effect;
            }
            (K::None, k) if matches!(k, K::PulseCore | K::PatchBot) => {
                self.activate_one(&mut effect, partner);
                self.run_chain(&mut effect);
                return effect;
            }
            _ => {}
        }

        let (Some(a), Some(b)) = (
            self.consume(&mut effect, anchor),
            self.consume(&mut effect, partner),
        ) else {
            return effect;
        };
        let (ax, ay) = self.grid.coords(anchor);

        match (a.kind, b.kind) {
            (K::SystemOverride, K::SystemOverride) => self.add_all(&mut effect),
            (K::SystemOverride, _) => self.override_with(&mut effect, a, b),
            (_, K::SystemOverride) => self.override_with(&mut effect, b, a),
            (k1, k2) if k1.is_line() && k2.is_line() => {
                self.add_row(&mut effect, ay);
                self.add_col(&mut effect, ax);
            }
            (line, K::PatchBot) | (K::PatchBot, line) if line.is_line() => {
                let bot = if a.kind == K::PatchBot { a.cell } else { b.cell };
                match self.patch_bot_hit(&mut effect, bot) {
                    Some(target) => {
                        let (tx, ty) = self.grid.coords(target);
                        self.add_line(&mut effect, line, tx, ty);
                    }
                    None => self.add_line(&mut effect, line, ax, ay),
                }
            }
            (line, K::PulseCore) | (K::PulseCore, line) if line.is_line() => {
                for offset in -1..=1 {
                    self.add_row(&mut effect, ay + offset);
                    self.add_col(&mut effect, ax + offset);
                }
            }
            (K::PatchBot, K::PatchBot) => {
                self.patch_bot_hit(&mut effect, a.cell);
                self.patch_bot_hit(&mut effect, b.cell);
            }
            (K::PatchBot, K::PulseCore) | (K::PulseCore, K::PatchBot) => {
                let bot = if a.kind == K::PatchBot { a.cell } else { b.cell };
                let (cx, cy) = match self.patch_bot_hit(&mut effect, bot) {
                    Some(target) => self.grid.coords(target),
                    None => (ax, ay),
                };
                self.add_box(&mut effect, cx, cy, 1);
            }
            (K::PulseCore, K::PulseCore) => self.add_box(&mut effect, ax, ay, 2),
            (line, _) | (_, line) if line.is_line() => {
                for offset in -1..=1 {
                    if line == K::LineV {
                        self.add_col(&mut effect, ax + offset);
                    } else {
                        self.add_row(&mut effect, ay + offset);
                    }
                }
            }
            _ => {}
        }

        self.run_chain(&mut effect);
        effect
    }

    /// SystemOverride swapped with `partner`: convert every plain tile of the target gem.
    fn override_with(&mut self, effect: &mut Effect, over: Consumed, partner: Consumed) {
        let target = if partner.kind.is_special() {
            over.override_gem.unwrap_or(over.gem)
        } else {
            partner.gem
        };
        let cells: Vec<usize> = self
            .grid
            .occupied()
            .filter(|&i| i != over.cell && i != partner.cell)
            .filter(|&i| {
                self.grid
                    .tile(i)
                    .map(|t| t.gem == target && !t.is_special())
                    .unwrap_or(false)
            })
            .collect();

        for idx in cells {
            if !partner.kind.is_special() {
                self.add(effect, idx);
                continue;
            }
            if let Some(tile) = self.grid.tile_mut(idx) {
                tile.promote(partner.kind);
            }
            effect.events.push(BoardEvent::SpecialCreated {
                cell: idx,
                kind: partner.kind,
            });
            if partner.kind == SpecialKind::PatchBot {
                self.activate_one(effect, idx);
            } else {
                self.add(effect, idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::ObstacleLibrary;
    use crate::matcher::find_all_matches;

    struct Fixture {
        grid: Grid,
        obstacles: ObstacleField,
        rng: SimpleRng,
        chooser: PreferredTargets,
    }

    impl Fixture {
        fn new(rows: &[&str]) -> Self {
            let grid = Grid::from_ascii(rows);
            let obstacles = ObstacleField::new(grid.len(), ObstacleLibrary::default());
            Self {
                grid,
                obstacles,
                rng: SimpleRng::new(1),
                chooser: PreferredTargets::default(),
            }
        }

        fn special(mut self, x: i32, y: i32, kind: SpecialKind) -> Self {
            let idx = self.grid.index(x, y).unwrap();
            self.grid.tile_mut(idx).unwrap().promote(kind);
            self
        }

        fn ctx(&mut self) -> EffectContext<'_> {
            EffectContext {
                grid: &mut self.grid,
                obstacles: &self.obstacles,
                rng: &mut self.rng,
                goals: &NoGoals,
                chooser: &mut self.chooser,
            }
        }

        fn idx(&self, x: i32, y: i32) -> usize {
            self.grid.index(x, y).unwrap()
        }
    }

    const BOARD: [&str; 5] = ["RGBYP", "GBYPR", "BYPRG", "YPRGB", "PRGBY"];

    #[test]
    fn test_create_line_from_swap() {
        let grid = Grid::from_ascii(&["RRRRG", "GBGBY"]);
        let mut matches = find_all_matches(&grid);
        let decision = try_create_special(&grid, &mut matches, Some((1, 6))).unwrap();
        assert_eq!(decision.cell, 1);
        assert_eq!(decision.kind, SpecialKind::LineH);
        assert!(!matches.contains(&1));
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn test_swap_tie_favors_first() {
        let grid = Grid::from_ascii(&["RRRRG", "GBGBY"]);
        let mut matches = find_all_matches(&grid);
        let decision = try_create_special(&grid, &mut matches, Some((2, 1))).unwrap();
        assert_eq!(decision.cell, 2);
    }

    #[test]
    fn test_cascade_picks_highest_score() {
        // A run of 4 and an unrelated run of 5.
        let grid = Grid::from_ascii(&["RRRRG", "BBBBB", "GYGYG"]);
        let mut matches = find_all_matches(&grid);
        let decision = try_create_special(&grid, &mut matches, None).unwrap();
        assert_eq!(decision.kind, SpecialKind::SystemOverride);
        assert_eq!(decision.cell, 5);
    }

    #[test]
    fn test_plain_three_creates_nothing() {
        let grid = Grid::from_ascii(&["RRRG", "GBYB"]);
        let mut matches = find_all_matches(&grid);
        assert!(try_create_special(&grid, &mut matches, None).is_none());
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn test_line_h_clears_row() {
        let mut f = Fixture::new(&BOARD).special(2, 2, SpecialKind::LineH);
        let idx = f.idx(2, 2);
        let effect = f.ctx().apply_special_activation(idx);
        assert_eq!(effect.cells, (10..15).collect());
        assert!(!f.grid.tile(idx).unwrap().is_special());
    }

    #[test]
    fn test_pulse_core_clears_box() {
        let mut f = Fixture::new(&BOARD).special(0, 0, SpecialKind::PulseCore);
        let effect = f.ctx().apply_special_activation(0);
        assert_eq!(effect.cells, [0, 1, 5, 6].into_iter().collect());
    }

    #[test]
    fn test_override_clears_bound_gem() {
        let mut f = Fixture::new(&BOARD);
        f.grid.tile_mut(0).unwrap().promote(SpecialKind::SystemOverride);
        let effect = f.ctx().apply_special_activation(0);
        // Red tiles sit on one anti-diagonal.
        assert_eq!(effect.cells, [0, 9, 13, 17, 21].into_iter().collect());
    }

    #[test]
    fn test_chain_reaction_runs_once_per_tile() {
        let mut f = Fixture::new(&BOARD)
            .special(0, 0, SpecialKind::LineH)
            .special(4, 0, SpecialKind::LineV);
        let effect = f.ctx().apply_special_activation(0);
        let expected: BTreeSet<usize> = (0..5).chain([9, 14, 19, 24]).collect();
        assert_eq!(effect.cells, expected);
        let activations = effect
            .events
            .iter()
            .filter(|e| matches!(e, BoardEvent::SpecialActivated { .. }))
            .count();
        assert_eq!(activations, 2);
    }

    #[test]
    fn test_patch_bot_hits_chosen_target() {
        let mut f = Fixture::new(&BOARD).special(0, 0, SpecialKind::PatchBot);
        f.chooser = PreferredTargets::new(vec![18]);
        let effect = f.ctx().apply_special_activation(0);
        assert_eq!(effect.cells, [0, 18].into_iter().collect());
        assert!(effect.forced.contains(&18));
    }

    #[test]
    fn test_patch_bot_without_target_clears_itself() {
        let mut f = Fixture::new(&["R#"]).special(0, 0, SpecialKind::PatchBot);
        let effect = f.ctx().apply_special_activation(0);
        assert_eq!(effect.cells, [0].into_iter().collect());
        assert!(effect.forced.is_empty());
    }

    #[test]
    fn test_pulse_pulse_combo_is_5x5() {
        let mut f = Fixture::new(&[
            "RGBYPRG", "GBYPRGB", "BYPRGBY", "YPRGBYP", "PRGBYPR", "RGBYPRG", "GBYPRGB",
        ])
        .special(3, 3, SpecialKind::PulseCore)
        .special(3, 2, SpecialKind::PulseCore);
        let (anchor, partner) = (f.idx(3, 3), f.idx(3, 2));
        let effect = f.ctx().apply_combo_effect(anchor, partner);
        assert_eq!(effect.cells.len(), 25);
        for y in 1..=5 {
            for x in 1..=5 {
                assert!(effect.contains(f.idx(x, y)));
            }
        }
    }

    #[test]
    fn test_line_line_combo_is_cross() {
        let mut f = Fixture::new(&BOARD)
            .special(2, 2, SpecialKind::LineH)
            .special(2, 1, SpecialKind::LineH);
        let (anchor, partner) = (f.idx(2, 2), f.idx(2, 1));
        let effect = f.ctx().apply_combo_effect(anchor, partner);
        let expected: BTreeSet<usize> = (10..15).chain([2, 7, 17, 22]).collect();
        assert_eq!(effect.cells, expected);
    }

    #[test]
    fn test_line_pulse_combo_sweeps_three_lanes() {
        let mut f = Fixture::new(&BOARD)
            .special(2, 2, SpecialKind::LineV)
            .special(3, 2, SpecialKind::PulseCore);
        let (anchor, partner) = (f.idx(2, 2), f.idx(3, 2));
        let effect = f.ctx().apply_combo_effect(anchor, partner);
        // Rows 1..=3 and columns 1..=3 cover everything but the four corners.
        assert_eq!(effect.cells.len(), 25 - 4);
        for corner in [0, 4, 20, 24] {
            assert!(!effect.contains(corner));
        }
    }

    #[test]
    fn test_line_with_plain_partner_is_band() {
        let mut f = Fixture::new(&BOARD).special(2, 2, SpecialKind::LineH);
        let (anchor, partner) = (f.idx(2, 2), f.idx(2, 3));
        let effect = f.ctx().apply_combo_effect(anchor, partner);
        assert_eq!(effect.cells, (5..20).collect());
    }

    #[test]
    fn test_override_with_plain_partner_clears_partner_gem() {
        let mut f = Fixture::new(&BOARD).special(0, 0, SpecialKind::SystemOverride);
        // Partner at (1, 0) is green.
        let effect = f.ctx().apply_combo_effect(0, 1);
        let greens: BTreeSet<usize> = f
            .grid
            .occupied()
            .filter(|&i| f.grid.tile(i).unwrap().gem == GemKind::Green)
            .collect();
        assert!(greens.is_subset(&effect.cells));
        assert!(effect.contains(0));
    }

    #[test]
    fn test_override_with_line_promotes_and_chains() {
        let mut f = Fixture::new(&BOARD)
            .special(0, 0, SpecialKind::SystemOverride)
            .special(1, 0, SpecialKind::LineV);
        let effect = f.ctx().apply_combo_effect(0, 1);
        let created = effect
            .events
            .iter()
            .filter(|e| matches!(e, BoardEvent::SpecialCreated { kind: SpecialKind::LineV, .. }))
            .count();
        // The four other red tiles sit in columns 1..=4 and sweep them.
        assert_eq!(created, 4);
        assert_eq!(effect.cells.len(), 21);
        assert!(effect.contains(0));
        assert!(!effect.contains(5));
    }

    #[test]
    fn test_override_override_clears_board() {
        let mut f = Fixture::new(&BOARD)
            .special(0, 0, SpecialKind::SystemOverride)
            .special(1, 0, SpecialKind::SystemOverride);
        let effect = f.ctx().apply_combo_effect(0, 1);
        assert_eq!(effect.cells.len(), 25);
    }

    #[test]
    fn test_patch_patch_targets_are_distinct() {
        let mut f = Fixture::new(&BOARD)
            .special(0, 0, SpecialKind::PatchBot)
            .special(1, 0, SpecialKind::PatchBot);
        f.chooser = PreferredTargets::new(vec![24, 23]);
        let effect = f.ctx().apply_combo_effect(0, 1);
        assert_eq!(effect.cells, [0, 1, 23, 24].into_iter().collect());
        assert_eq!(effect.forced, [23, 24].into_iter().collect());
    }

    #[test]
    fn test_line_patch_applies_line_at_target() {
        let mut f = Fixture::new(&BOARD)
            .special(0, 0, SpecialKind::LineH)
            .special(1, 0, SpecialKind::PatchBot);
        f.chooser = PreferredTargets::new(vec![22]);
        let effect = f.ctx().apply_combo_effect(0, 1);
        let expected: BTreeSet<usize> = [0, 1].into_iter().chain(20..25).collect();
        assert_eq!(effect.cells, expected);
    }

    #[test]
    fn test_patch_pulse_bursts_at_target() {
        let mut f = Fixture::new(&BOARD)
            .special(0, 0, SpecialKind::PulseCore)
            .special(1, 0, SpecialKind::PatchBot);
        f.chooser = PreferredTargets::new(vec![18]);
        let effect = f.ctx().apply_combo_effect(0, 1);
        let expected: BTreeSet<usize> = [0, 1, 12, 13, 14, 17, 18, 19, 22, 23, 24]
            .into_iter()
            .collect();
        assert_eq!(effect.cells, expected);
    }

    #[test]
    fn test_lone_pulse_core_with_plain_partner_fires_alone() {
        let mut f = Fixture::new(&BOARD).special(2, 2, SpecialKind::PulseCore);
        let (anchor, partner) = (f.idx(2, 2), f.idx(2, 3));
        let effect = f.ctx().apply_combo_effect(anchor, partner);
        assert_eq!(effect.cells.len(), 9);
    }

    #[test]
    fn test_teleport_prefers_goal_tiles() {
        struct BlueGoal;
        impl GoalView for BlueGoal {
            fn is_tile_goal_active(&self, gem: GemKind) -> bool {
                gem == GemKind::Blue
            }
            fn is_obstacle_goal_active(&self, _id: u32) -> bool {
                false
            }
        }

        let mut f = Fixture::new(&["RB", "GY"]);
        let mut ctx = EffectContext {
            grid: &mut f.grid,
            obstacles: &f.obstacles,
            rng: &mut f.rng,
            goals: &BlueGoal,
            chooser: &mut f.chooser,
        };
        assert_eq!(ctx.teleport_target(&BTreeSet::new()), Some(1));
        assert_eq!(ctx.teleport_target(&BTreeSet::from([1])), Some(0));
    }

    #[test]
    fn test_hole_cells_are_not_eligible() {
        let f = Fixture::new(&["R#"]);
        assert!(is_cell_eligible(&f.grid, &f.obstacles, 0));
        assert!(!is_cell_eligible(&f.grid, &f.obstacles, 1));
        assert!(!is_cell_eligible(&f.grid, &f.obstacles, 2));
    }

    #[test]
    fn test_hole_with_obstacle_is_eligible() {
        use crate::level::ObstacleDefinition;
        use crate::types::{DamageRule, ObstacleBehavior, StageRule};

        let mut f = Fixture::new(&["R#", "G#"]);
        let library = ObstacleLibrary::new([ObstacleDefinition::new(
            4,
            1,
            vec![StageRule::new(false, ObstacleBehavior::UnderTileLayered, DamageRule::Any)],
        )]);
        f.obstacles = ObstacleField::new(f.grid.len(), library);
        assert!(f.obstacles.place(&f.grid, 1, 4));

        assert!(is_cell_eligible(&f.grid, &f.obstacles, 1));
        assert!(!is_cell_eligible(&f.grid, &f.obstacles, 3));

        let effect = f.ctx().expand_cells([0, 1, 2, 3]);
        assert_eq!(effect.cells, [0, 1, 2].into_iter().collect());
    }

    #[test]
    fn test_override_with_patch_bot_teleports_each_promoted_tile() {
        let mut f = Fixture::new(&BOARD)
            .special(0, 0, SpecialKind::SystemOverride)
            .special(1, 0, SpecialKind::PatchBot);
        let effect = f.ctx().apply_combo_effect(0, 1);

        let created: Vec<usize> = effect
            .events
            .iter()
            .filter_map(|e| match e {
                BoardEvent::SpecialCreated {
                    cell,
                    kind: SpecialKind::PatchBot,
                } => Some(*cell),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![9, 13, 17, 21]);

        // Each bot fires as soon as it is promoted and lands on the first free cell.
        let hops: Vec<(usize, usize)> = effect
            .events
            .iter()
            .filter_map(|e| match e {
                BoardEvent::PatchBotTeleported { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(hops, vec![(9, 2), (13, 3), (17, 4), (21, 5)]);
        assert_eq!(effect.forced, [2, 3, 4, 5].into_iter().collect());
        assert_eq!(
            effect.cells,
            [0, 1, 2, 3, 4, 5, 9, 13, 17, 21].into_iter().collect()
        );
    }
}
