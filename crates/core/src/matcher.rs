//! Match finder - pure queries over the grid
//!
//! Two independent match conditions exist:
//! - a run of at least [`MIN_RUN`] equal gems along a row or column
//! - a 2x2 block of four equal gems
//!
//! Runs stop at holes, blocked cells, empty cells and gem changes. Nothing
//! here mutates the grid.

use std::collections::{BTreeSet, VecDeque};

use crate::grid::Grid;
use crate::types::{GemKind, SpecialKind, MIN_RUN};

/// Set of matched cell indices
pub type MatchSet = BTreeSet<usize>;

/// Length of the equal-gem run through (x, y) stepping by (dx, dy) both ways
fn run_along(grid: &Grid, x: i32, y: i32, dx: i32, dy: i32) -> Vec<usize> {
    let Some(gem) = grid.matchable_gem(x, y) else {
        return Vec::new();
    };
    let mut start = (x, y);
    while grid.matchable_gem(start.0 - dx, start.1 - dy) == Some(gem) {
        start = (start.0 - dx, start.1 - dy);
    }
    let mut cells = Vec::new();
    let mut cur = start;
    while grid.matchable_gem(cur.0, cur.1) == Some(gem) {
        if let Some(idx) = grid.index(cur.0, cur.1) {
            cells.push(idx);
        }
        cur = (cur.0 + dx, cur.1 + dy);
    }
    cells
}

/// (horizontal, vertical) run lengths through a cell
pub fn run_lengths(grid: &Grid, x: i32, y: i32) -> (usize, usize) {
    (
        run_along(grid, x, y, 1, 0).len(),
        run_along(grid, x, y, 0, 1).len(),
    )
}

/// Runs of at least [`MIN_RUN`] through (x, y), horizontal and vertical combined
pub fn find_matches_at(grid: &Grid, x: i32, y: i32) -> MatchSet {
    let mut out = MatchSet::new();
    for (dx, dy) in [(1, 0), (0, 1)] {
        let run = run_along(grid, x, y, dx, dy);
        if run.len() >= MIN_RUN {
            out.extend(run);
        }
    }
    out
}

/// Top-left corners of uniform 2x2 blocks containing (x, y)
fn squares_containing(grid: &Grid, x: i32, y: i32) -> Vec<(i32, i32)> {
    let Some(gem) = grid.matchable_gem(x, y) else {
        return Vec::new();
    };
    [(x - 1, y - 1), (x, y - 1), (x - 1, y), (x, y)]
        .into_iter()
        .filter(|&(sx, sy)| is_uniform_square(grid, sx, sy, gem))
        .collect()
}

fn is_uniform_square(grid: &Grid, x: i32, y: i32, gem: GemKind) -> bool {
    [(0, 0), (1, 0), (0, 1), (1, 1)]
        .iter()
        .all(|&(dx, dy)| grid.matchable_gem(x + dx, y + dy) == Some(gem))
}

fn square_cells(grid: &Grid, x: i32, y: i32) -> impl Iterator<Item = usize> + '_ {
    [(0, 0), (1, 0), (0, 1), (1, 1)]
        .into_iter()
        .filter_map(move |(dx, dy)| grid.index(x + dx, y + dy))
}

/// Every cell of every uniform 2x2 block containing (x, y)
pub fn find_squares_at(grid: &Grid, x: i32, y: i32) -> MatchSet {
    squares_containing(grid, x, y)
        .into_iter()
        .flat_map(|(sx, sy)| square_cells(grid, sx, sy).collect::<Vec<_>>())
        .collect()
}

/// Whether (x, y) belongs to any uniform 2x2 block
pub fn in_square(grid: &Grid, x: i32, y: i32) -> bool {
    !squares_containing(grid, x, y).is_empty()
}

/// Visit every maximal run along rows and columns, calling `on_run` with its cells.
///
/// Returning `false` from `on_run` stops the scan early.
fn scan_runs(grid: &Grid, mut on_run: impl FnMut(&[usize]) -> bool) {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    let lines = (0..h)
        .map(|y| (0..w).map(move |x| (x, y)).collect::<Vec<_>>())
        .chain((0..w).map(|x| (0..h).map(move |y| (x, y)).collect::<Vec<_>>()));

    for line in lines {
        let mut run: Vec<usize> = Vec::new();
        let mut run_gem: Option<GemKind> = None;
        for (x, y) in line {
            let gem = grid.matchable_gem(x, y);
            if gem.is_some() && gem == run_gem {
                if let Some(idx) = grid.index(x, y) {
                    run.push(idx);
                }
                continue;
            }
            if !on_run(&run) {
                return;
            }
            run.clear();
            run_gem = gem;
            if gem.is_some() {
                if let Some(idx) = grid.index(x, y) {
                    run.push(idx);
                }
            }
        }
        if !on_run(&run) {
            return;
        }
    }
}

/// All runs of at least [`MIN_RUN`] plus all uniform 2x2 blocks
pub fn find_all_matches(grid: &Grid) -> MatchSet {
    let mut out = MatchSet::new();
    scan_runs(grid, |run| {
        if run.len() >= MIN_RUN {
            out.extend(run.iter().copied());
        }
        true
    });
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    for y in 0..h - 1 {
        for x in 0..w - 1 {
            if let Some(gem) = grid.matchable_gem(x, y) {
                if is_uniform_square(grid, x, y, gem) {
                    out.extend(square_cells(grid, x, y));
                }
            }
        }
    }
    out
}

/// Short-circuiting check for any run of at least `n`
pub fn has_any_run_at_least(grid: &Grid, n: usize) -> bool {
    let mut found = false;
    scan_runs(grid, |run| {
        if n > 0 && run.len() >= n {
            found = true;
            return false;
        }
        true
    });
    found
}

/// Size of the orthogonally connected same-gem region around `idx`, restricted to `within`
pub fn flood_size(grid: &Grid, idx: usize, within: &MatchSet) -> usize {
    if !within.contains(&idx) {
        return 0;
    }
    let Some(gem) = grid.tile(idx).map(|t| t.gem) else {
        return 0;
    };
    let mut seen = BTreeSet::from([idx]);
    let mut queue = VecDeque::from([idx]);
    while let Some(cur) = queue.pop_front() {
        for n in grid.neighbors4(cur) {
            if within.contains(&n)
                && grid.tile(n).map(|t| t.gem) == Some(gem)
                && seen.insert(n)
            {
                queue.push_back(n);
            }
        }
    }
    seen.len()
}

/// Special-creation classification for a matched cell.
///
/// Priority: run >= 5 -> `SystemOverride`; runs >= 3 on both axes or a
/// flood region of >= 5 -> `PulseCore`; run of exactly 4 -> line along the
/// longer axis (ties horizontal); member of a 2x2 block -> `PatchBot`.
pub fn decide_special_at(grid: &Grid, x: i32, y: i32, matches: &MatchSet) -> SpecialKind {
    let (h, v) = run_lengths(grid, x, y);
    if h >= 5 || v >= 5 {
        return SpecialKind::SystemOverride;
    }
    let flood = grid
        .index(x, y)
        .map(|idx| flood_size(grid, idx, matches))
        .unwrap_or(0);
    if (h >= MIN_RUN && v >= MIN_RUN) || flood >= 5 {
        return SpecialKind::PulseCore;
    }
    if h == 4 || v == 4 {
        return if h >= v {
            SpecialKind::LineH
        } else {
            SpecialKind::LineV
        };
    }
    if in_square(grid, x, y) {
        return SpecialKind::PatchBot;
    }
    SpecialKind::None
}
