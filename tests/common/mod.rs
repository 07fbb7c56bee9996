//! Shared board fixtures for integration tests

#![allow(dead_code)]

use gemfall::core::{Grid, SimpleRng};
use gemfall::types::GemKind;

/// Diagonal stripes of five gem kinds: no runs, no squares.
pub fn striped_rows(width: usize, height: usize) -> Vec<String> {
    const LETTERS: [char; 5] = ['R', 'G', 'B', 'Y', 'P'];
    (0..height)
        .map(|y| (0..width).map(|x| LETTERS[(x + 2 * y) % 5]).collect())
        .collect()
}

pub fn striped(width: usize, height: usize) -> Grid {
    let rows = striped_rows(width, height);
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    Grid::from_ascii(&refs)
}

/// Board filled from `seed` with `kinds` gem kinds (no match avoidance)
pub fn random_grid(width: usize, height: usize, kinds: u8, seed: u32) -> Grid {
    let mut rng = SimpleRng::new(seed);
    let mut grid = Grid::new(width, height);
    for idx in 0..grid.len() {
        let gem = rng.gem(kinds);
        grid.place(idx, gem);
    }
    grid
}

pub fn gem_at(grid: &Grid, x: i32, y: i32) -> Option<GemKind> {
    grid.matchable_gem(x, y)
}
