//! Level module - level layout and obstacle definition table
//!
//! A level document is JSON:
//!
//! ```json
//! {
//!   "width": 7, "height": 7, "moves": 20,
//!   "goals": [{ "kind": "obstacle", "target_id": 1, "amount": 4 }],
//!   "cell_mask": [1, 1, 0, ...],
//!   "obstacle_ids": [0, 1, 0, ...],
//!   "obstacle_origins": [-1, 1, -1, ...],
//!   "obstacle_library": [
//!     { "id": 1, "max_hits": 2, "stages": [
//!         { "blocks_cells": true, "behavior": "over_tile_blocker", "damage_rule": "any" },
//!         { "blocks_cells": true, "behavior": "over_tile_blocker", "damage_rule": "special_only" }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Undersized arrays are padded with safe defaults (normal cells, no
//! obstacles). Only structurally unusable documents are rejected.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Goal, StageRule};

/// Errors produced while loading a level document
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level json is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("level dimensions {width}x{height} are not playable")]
    InvalidDimensions { width: usize, height: usize },
    #[error("obstacle definition {id} is invalid: {reason}")]
    InvalidDefinition { id: u32, reason: &'static str },
}

fn one() -> usize {
    1
}

fn one_hit() -> u32 {
    1
}

/// Largest board a level may describe
pub const MAX_CELLS: usize = 64 * 64;

/// Immutable description of an obstacle kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleDefinition {
    pub id: u32,
    #[serde(default = "one")]
    pub width: usize,
    #[serde(default = "one")]
    pub height: usize,
    #[serde(default = "one_hit")]
    pub max_hits: u32,
    /// Ordered from full health (stage 0) to about-to-break.
    pub stages: Vec<StageRule>,
    #[serde(default)]
    pub allow_cross_context_fallback: bool,
}

impl ObstacleDefinition {
    pub fn new(id: u32, max_hits: u32, stages: Vec<StageRule>) -> Self {
        Self {
            id,
            width: 1,
            height: 1,
            max_hits,
            stages,
            allow_cross_context_fallback: false,
        }
    }

    pub fn with_footprint(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_cross_context_fallback(mut self, allow: bool) -> Self {
        self.allow_cross_context_fallback = allow;
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, index: usize) -> Option<&StageRule> {
        self.stages.get(index)
    }

    fn validate(&self) -> Result<(), LevelError> {
        let invalid = |reason| LevelError::InvalidDefinition {
            id: self.id,
            reason,
        };
        if self.id == 0 {
            return Err(invalid("id 0 is reserved for empty cells"));
        }
        if self.max_hits == 0 {
            return Err(invalid("max_hits must be at least 1"));
        }
        if self.stages.is_empty() {
            return Err(invalid("at least one stage rule is required"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid("footprint must be at least 1x1"));
        }
        Ok(())
    }
}

/// Obstacle definitions keyed by id, loaded once per session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObstacleLibrary {
    defs: HashMap<u32, ObstacleDefinition>,
}

impl ObstacleLibrary {
    pub fn new(defs: impl IntoIterator<Item = ObstacleDefinition>) -> Self {
        Self {
            defs: defs.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&ObstacleDefinition> {
        self.defs.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.defs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Persisted level layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    pub width: usize,
    pub height: usize,
    pub moves: u32,
    #[serde(default)]
    pub goals: Vec<Goal>,
    /// 0 = unplayable hole, 1 = normal cell
    #[serde(default)]
    pub cell_mask: Vec<u8>,
    /// 0 = no obstacle
    #[serde(default)]
    pub obstacle_ids: Vec<u32>,
    /// -1 = none, else the origin cell index of the footprint
    #[serde(default)]
    pub obstacle_origins: Vec<i32>,
    #[serde(default)]
    pub obstacle_library: Vec<ObstacleDefinition>,
}

impl LevelData {
    /// Empty level with all cells normal and no obstacles
    pub fn new(width: usize, height: usize, moves: u32) -> Self {
        let len = width
            .checked_mul(height)
            .filter(|&n| n <= MAX_CELLS)
            .unwrap_or(0);
        Self {
            width,
            height,
            moves,
            goals: Vec::new(),
            cell_mask: vec![1; len],
            obstacle_ids: vec![0; len],
            obstacle_origins: vec![-1; len],
            obstacle_library: Vec::new(),
        }
    }

    /// Parse, validate and normalize a JSON level document
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let mut level: LevelData = serde_json::from_str(json)?;
        level.prepare()?;
        Ok(level)
    }

    /// Number of cells, or `None` when the dimensions are empty, overflow or
    /// exceed [`MAX_CELLS`].
    pub fn cell_count(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)
            .filter(|&n| n > 0 && n <= MAX_CELLS)
    }

    /// Validate and normalize in place
    pub fn prepare(&mut self) -> Result<(), LevelError> {
        if self.cell_count().is_none() {
            return Err(LevelError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        for def in &self.obstacle_library {
            def.validate()?;
        }
        self.normalize();
        self.drop_unknown_obstacles();
        self.stamp_footprints();
        Ok(())
    }

    /// Cells naming an obstacle id missing from the library become empty.
    fn drop_unknown_obstacles(&mut self) {
        let library = self.library();
        for cell in 0..self.obstacle_ids.len() {
            let id = self.obstacle_ids[cell];
            if id != 0 && !library.contains(id) {
                warn!(
                    "cell {} references unknown obstacle id {}; treating it as empty",
                    cell, id
                );
                self.obstacle_ids[cell] = 0;
                self.obstacle_origins[cell] = -1;
            }
        }
    }

    /// Resize layout arrays to `width * height`, filling with safe defaults.
    ///
    /// Returns true when anything had to be repaired.
    pub fn normalize(&mut self) -> bool {
        let Some(len) = self.cell_count() else {
            return false;
        };
        let mut repaired = false;

        if self.cell_mask.len() != len {
            warn!(
                "cell mask has {} entries, expected {}; padding with normal cells",
                self.cell_mask.len(),
                len
            );
            self.cell_mask.resize(len, 1);
            repaired = true;
        }
        if self.obstacle_ids.len() != len {
            warn!(
                "obstacle id map has {} entries, expected {}; padding with empty cells",
                self.obstacle_ids.len(),
                len
            );
            self.obstacle_ids.resize(len, 0);
            repaired = true;
        }
        if self.obstacle_origins.len() != len {
            warn!(
                "obstacle origin map has {} entries, expected {}; padding with none",
                self.obstacle_origins.len(),
                len
            );
            self.obstacle_origins.resize(len, -1);
            repaired = true;
        }

        for i in 0..len {
            if self.obstacle_ids[i] == 0 {
                self.obstacle_origins[i] = -1;
                continue;
            }
            let origin = self.obstacle_origins[i];
            let dangling = origin < 0
                || origin as usize >= len
                || self.obstacle_ids[origin as usize] != self.obstacle_ids[i];
            if dangling {
                self.obstacle_origins[i] = i as i32;
                repaired = true;
            }
        }

        repaired
    }

    /// Expand origin-only placements of multi-cell obstacles to their full footprint.
    fn stamp_footprints(&mut self) {
        let library = self.library();
        for origin in 0..self.obstacle_ids.len() {
            let id = self.obstacle_ids[origin];
            if id == 0 || self.obstacle_origins[origin] != origin as i32 {
                continue;
            }
            let Some(def) = library.get(id) else {
                continue;
            };
            let ox = origin % self.width;
            let oy = origin / self.width;
            for dy in 0..def.height {
                for dx in 0..def.width {
                    let (x, y) = (ox + dx, oy + dy);
                    if x >= self.width || y >= self.height {
                        continue;
                    }
                    let cell = y * self.width + x;
                    if self.obstacle_ids[cell] == 0 {
                        self.obstacle_ids[cell] = id;
                        self.obstacle_origins[cell] = origin as i32;
                    }
                }
            }
        }
    }

    pub fn library(&self) -> ObstacleLibrary {
        ObstacleLibrary::new(self.obstacle_library.iter().cloned())
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn with_definition(mut self, def: ObstacleDefinition) -> Self {
        self.obstacle_library.push(def);
        self
    }

    pub fn with_hole(mut self, x: usize, y: usize) -> Self {
        let idx = y * self.width + x;
        if let Some(m) = self.cell_mask.get_mut(idx) {
            *m = 0;
        }
        self
    }

    /// Place an obstacle with its origin at (x, y); the footprint is stamped on `prepare`.
    pub fn with_obstacle(mut self, x: usize, y: usize, id: u32) -> Self {
        let idx = y * self.width + x;
        if idx < self.obstacle_ids.len() {
            self.obstacle_ids[idx] = id;
            self.obstacle_origins[idx] = idx as i32;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DamageRule, GoalKind, ObstacleBehavior};

    fn crate_def() -> ObstacleDefinition {
        ObstacleDefinition::new(
            7,
            2,
            vec![StageRule::new(
                true,
                ObstacleBehavior::OverTileBlocker,
                DamageRule::Any,
            )],
        )
    }

    #[test]
    fn test_parse_minimal_document() {
        let level = LevelData::from_json(r#"{"width":3,"height":2,"moves":5}"#).unwrap();
        assert_eq!(level.cell_mask, vec![1; 6]);
        assert_eq!(level.obstacle_ids, vec![0; 6]);
        assert_eq!(level.obstacle_origins, vec![-1; 6]);
    }

    #[test]
    fn test_parse_full_document() {
        let json = r#"{
            "width": 2, "height": 2, "moves": 9,
            "goals": [{"kind": "obstacle", "target_id": 7, "amount": 1}],
            "cell_mask": [1, 1, 0, 1],
            "obstacle_ids": [7, 0, 0, 0],
            "obstacle_origins": [0, -1, -1, -1],
            "obstacle_library": [{
                "id": 7, "max_hits": 2,
                "stages": [{"blocks_cells": true, "behavior": "over_tile_blocker", "damage_rule": "special_only"}]
            }]
        }"#;
        let level = LevelData::from_json(json).unwrap();
        assert_eq!(level.goals[0].kind, GoalKind::Obstacle);
        let library = level.library();
        let def = library.get(7).unwrap();
        assert_eq!(def.max_hits, 2);
        assert_eq!(def.stages[0].damage_rule, DamageRule::SpecialOnly);
        assert!(!def.allow_cross_context_fallback);
    }

    #[test]
    fn test_undersized_arrays_are_padded() {
        let mut level = LevelData::new(3, 3, 10);
        level.cell_mask.truncate(2);
        level.obstacle_ids.clear();
        level.obstacle_origins.truncate(1);
        assert!(level.normalize());
        assert_eq!(level.cell_mask.len(), 9);
        assert_eq!(level.obstacle_ids.len(), 9);
        assert_eq!(level.obstacle_origins, vec![-1; 9]);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let err = LevelData::from_json(r#"{"width":0,"height":4,"moves":5}"#).unwrap_err();
        assert!(matches!(err, LevelError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = LevelData::from_json("{ not json").unwrap_err();
        assert!(matches!(err, LevelError::Json(_)));
    }

    #[test]
    fn test_unknown_obstacle_becomes_empty() {
        let mut level = LevelData::new(2, 2, 5).with_obstacle(1, 0, 3);
        level.prepare().unwrap();
        assert_eq!(level.obstacle_ids, vec![0; 4]);
        assert_eq!(level.obstacle_origins, vec![-1; 4]);
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let mut level = LevelData::new(usize::MAX, 2, 5);
        assert!(level.cell_mask.is_empty());
        assert!(matches!(
            level.prepare(),
            Err(LevelError::InvalidDimensions { .. })
        ));
        assert!(!level.normalize());

        let err = LevelData::from_json(r#"{"width":100000,"height":100000,"moves":5}"#)
            .unwrap_err();
        assert!(matches!(err, LevelError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let mut level = LevelData::new(2, 2, 5).with_definition(ObstacleDefinition::new(4, 0, vec![]));
        assert!(matches!(
            level.prepare(),
            Err(LevelError::InvalidDefinition { id: 4, .. })
        ));
    }

    #[test]
    fn test_missing_origin_points_to_self() {
        let mut level = LevelData::new(2, 1, 5).with_definition(crate_def());
        level.obstacle_ids[1] = 7;
        level.prepare().unwrap();
        assert_eq!(level.obstacle_origins, vec![-1, 1]);
    }

    #[test]
    fn test_footprint_is_stamped_from_origin() {
        let mut level = LevelData::new(3, 3, 5)
            .with_definition(crate_def().with_footprint(2, 2))
            .with_obstacle(1, 1, 7);
        level.prepare().unwrap();
        assert_eq!(level.obstacle_ids, vec![0, 0, 0, 0, 7, 7, 0, 7, 7]);
        assert_eq!(
            level.obstacle_origins,
            vec![-1, -1, -1, -1, 4, 4, -1, 4, 4]
        );
    }
}
