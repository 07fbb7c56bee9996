//! Grid module - owns the cell array
//!
//! The grid is a `width x height` flat array in row-major order (`y * width + x`).
//! Each cell carries an optional tile, a level-authored "mask hole" flag and an
//! obstacle-derived "blocked" flag. Coordinates: `x` grows left to right, `y`
//! grows top to bottom, and tiles enter the board from above row 0.
//!
//! Invariants kept by the rest of the crate:
//! - hole cells never hold a tile
//! - blocked cells never hold a tile

use arrayvec::ArrayVec;

use crate::types::{GemKind, Tile};

/// Board cell array plus hole/blocked flags
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    tiles: Vec<Option<Tile>>,
    holes: Vec<bool>,
    blocked: Vec<bool>,
    next_tile_id: u32,
}

impl Grid {
    /// Create an empty grid where every cell is playable
    pub fn new(width: usize, height: usize) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            tiles: vec![None; len],
            holes: vec![false; len],
            blocked: vec![false; len],
            next_tile_id: 1,
        }
    }

    /// Create an empty grid from a level cell mask (0 = hole, anything else = normal)
    pub fn with_mask(width: usize, height: usize, mask: &[u8]) -> Self {
        let mut grid = Self::new(width, height);
        for (i, hole) in grid.holes.iter_mut().enumerate() {
            *hole = mask.get(i).copied().unwrap_or(1) == 0;
        }
        grid
    }

    /// Build a grid from text rows.
    ///
    /// `R G B Y P O` place gems, `.` is an empty playable cell and `#` is a
    /// mask hole. Rows shorter than the widest row are padded with holes.
    ///
    /// ```
    /// use gemfall_core::Grid;
    ///
    /// let grid = Grid::from_ascii(&["RRG", "#.B"]);
    /// assert_eq!(grid.width(), 3);
    /// assert!(grid.is_hole(3));
    /// assert!(grid.tile(4).is_none());
    /// ```
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            let mut chars = row.chars();
            for x in 0..width {
                let idx = y * width + x;
                match chars.next() {
                    Some('.') => {}
                    Some(c) => match GemKind::from_letter(c) {
                        Some(gem) => {
                            grid.place(idx, gem);
                        }
                        None => grid.holes[idx] = true,
                    },
                    None => grid.holes[idx] = true,
                }
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Calculate flat index from (x, y) coordinates
    #[inline(always)]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Convert a flat index back to (x, y)
    #[inline(always)]
    pub fn coords(&self, idx: usize) -> (i32, i32) {
        ((idx % self.width) as i32, (idx / self.width) as i32)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn is_hole(&self, idx: usize) -> bool {
        self.holes.get(idx).copied().unwrap_or(true)
    }

    pub fn is_blocked(&self, idx: usize) -> bool {
        self.blocked.get(idx).copied().unwrap_or(false)
    }

    /// Set the obstacle-derived blocked flag. A tile caught in a newly blocked
    /// cell is removed and returned.
    pub fn set_blocked(&mut self, idx: usize, blocked: bool) -> Option<Tile> {
        if idx >= self.len() {
            return None;
        }
        self.blocked[idx] = blocked;
        if blocked {
            self.tiles[idx].take()
        } else {
            None
        }
    }

    /// Playable means not a mask hole
    pub fn is_playable(&self, idx: usize) -> bool {
        !self.is_hole(idx)
    }

    /// Playable, not blocked, and without a tile
    pub fn is_active_empty(&self, idx: usize) -> bool {
        idx < self.len() && !self.holes[idx] && !self.blocked[idx] && self.tiles[idx].is_none()
    }

    /// Any cell still waiting for a tile
    pub fn has_active_empty(&self) -> bool {
        (0..self.len()).any(|i| self.is_active_empty(i))
    }

    pub fn tile(&self, idx: usize) -> Option<&Tile> {
        self.tiles.get(idx).and_then(|t| t.as_ref())
    }

    pub fn tile_mut(&mut self, idx: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(idx).and_then(|t| t.as_mut())
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).and_then(|i| self.tile(i))
    }

    /// Gem of a tile that can take part in a match (present, not hole, not blocked)
    pub fn matchable_gem(&self, x: i32, y: i32) -> Option<GemKind> {
        let idx = self.index(x, y)?;
        if self.holes[idx] || self.blocked[idx] {
            return None;
        }
        self.tiles[idx].map(|t| t.gem)
    }

    /// Mint a fresh tile in a cell. Returns false for holes, blocked or out-of-range cells.
    pub fn place(&mut self, idx: usize, gem: GemKind) -> bool {
        if idx >= self.len() || self.holes[idx] || self.blocked[idx] {
            return false;
        }
        let id = self.next_tile_id;
        self.next_tile_id = self.next_tile_id.wrapping_add(1);
        self.tiles[idx] = Some(Tile::new(id, gem));
        true
    }

    /// Store an existing tile (or clear with `None`)
    pub fn put(&mut self, idx: usize, tile: Option<Tile>) {
        if let Some(slot) = self.tiles.get_mut(idx) {
            *slot = tile;
        }
    }

    pub fn take(&mut self, idx: usize) -> Option<Tile> {
        self.tiles.get_mut(idx).and_then(|t| t.take())
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.len() && b < self.len() {
            self.tiles.swap(a, b);
        }
    }

    /// Orthogonally adjacent cells
    pub fn is_adjacent(&self, a: usize, b: usize) -> bool {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        (ax - bx).abs() + (ay - by).abs() == 1
    }

    /// In-bounds orthogonal neighbours
    pub fn neighbors4(&self, idx: usize) -> ArrayVec<usize, 4> {
        let (x, y) = self.coords(idx);
        [(0, -1), (-1, 0), (1, 0), (0, 1)]
            .iter()
            .filter_map(|&(dx, dy)| self.index(x + dx, y + dy))
            .collect()
    }

    /// In-bounds diagonal neighbours
    pub fn diagonals(&self, idx: usize) -> ArrayVec<usize, 4> {
        let (x, y) = self.coords(idx);
        [(-1, -1), (1, -1), (-1, 1), (1, 1)]
            .iter()
            .filter_map(|&(dx, dy)| self.index(x + dx, y + dy))
            .collect()
    }

    /// Indices of every cell holding a tile
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.map(|_| i))
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_some()).count()
    }

    /// Render as text rows (same notation as [`Grid::from_ascii`], `X` for blocked)
    pub fn to_ascii(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| {
                        let idx = y * self.width + x;
                        if self.holes[idx] {
                            '#'
                        } else if self.blocked[idx] {
                            'X'
                        } else {
                            self.tiles[idx].map(|t| t.gem.letter()).unwrap_or('.')
                        }
                    })
                    .collect()
            })
            .collect()
    }
}
