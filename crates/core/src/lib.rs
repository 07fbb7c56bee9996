//! Core rules module - pure, deterministic, and testable
//!
//! This crate holds the board rules of the match-3 engine. It performs no I/O
//! beyond parsing a level document from a string, and it never sleeps or
//! waits on presentation:
//!
//! - **Deterministic**: every random choice goes through a seeded [`SimpleRng`]
//! - **Event-driven**: mutations return the [`BoardEvent`](types::BoardEvent)s they caused
//! - **Testable**: boards are built from ASCII fixtures via [`Grid::from_ascii`]
//!
//! # Module Structure
//!
//! - [`grid`]: cell array with tiles, mask holes and obstacle-blocked flags
//! - [`level`]: level document, obstacle definitions and normalization
//! - [`obstacle`]: per-instance hit counters, stage resolution, damage rules
//! - [`matcher`]: runs, 2x2 squares and special classification
//! - [`special`]: special creation, single activations, the combo matrix
//! - [`pending`]: deferred promotion of the tile chosen to become special
//! - [`goals`]: level goal progress fed by board events
//! - [`rng`]: seeded LCG
//! - [`snapshot`]: read-only board copy for hosts
//!
//! # Example
//!
//! ```
//! use gemfall_core::{find_all_matches, Grid};
//!
//! let grid = Grid::from_ascii(&[
//!     "RRRG",
//!     "GBYB",
//! ]);
//! let matches = find_all_matches(&grid);
//! assert_eq!(matches.len(), 3);
//! ```

pub mod goals;
pub mod grid;
pub mod level;
pub mod matcher;
pub mod obstacle;
pub mod pending;
pub mod rng;
pub mod snapshot;
pub mod special;

pub use gemfall_types as types;

// Re-export commonly used types for convenience
pub use goals::{GoalProgress, GoalTracker};
pub use grid::Grid;
pub use level::{LevelData, LevelError, ObstacleDefinition, ObstacleLibrary};
pub use matcher::{
    decide_special_at, find_all_matches, find_matches_at, find_squares_at,
    has_any_run_at_least, run_lengths, MatchSet,
};
pub use obstacle::{stage_index, DamageOutcome, ObstacleField};
pub use pending::{PendingCreation, PendingCreations};
pub use rng::SimpleRng;
pub use snapshot::{BoardSnapshot, CellSnapshot};
pub use special::{
    is_cell_eligible, try_create_special, Effect, EffectContext, GoalView, NoGoals,
    PreferredTargets, RandomChooser, SpecialDecision, TargetChooser,
};
