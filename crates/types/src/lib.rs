//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types used throughout the rules engine.
//! All types are plain data with no behavior beyond small lookups, making them
//! usable in any context (core rules, engine state machine, presentation hosts).
//!
//! # Board Coordinates
//!
//! Cells are addressed either as `(x, y)` or as a row-major index
//! `y * width + x`. `y = 0` is the top row; new tiles enter from above row 0.
//!
//! # Rules Constants
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `MIN_RUN` | 3 | Shortest run that counts as a match |
//! | `MAX_CASCADE_PASSES` | 25 | Safety cap for one turn's cascade loop |
//! | `DEFAULT_GEM_KINDS` | 6 | Gem kinds in play unless configured |
//!
//! # Special Creation Scores
//!
//! When more than one tile could be promoted, the highest score wins:
//!
//! | Special | Score |
//! |---------|-------|
//! | `SystemOverride` | 60 |
//! | `PulseCore` | 50 |
//! | `LineH` / `LineV` | 30 |
//! | `PatchBot` | 20 |
//! | `None` | 0 |
//!
//! # Examples
//!
//! ```
//! use gemfall_types::{DamageContext, DamageRule, GemKind, SpecialKind};
//!
//! // Parse a gem kind (case-insensitive, full name or letter)
//! assert_eq!(GemKind::from_str("r"), Some(GemKind::Red));
//! assert_eq!(GemKind::from_str("Blue"), Some(GemKind::Blue));
//!
//! // Special scores drive promotion priority
//! assert!(SpecialKind::SystemOverride.creation_score() > SpecialKind::LineH.creation_score());
//!
//! // Damage rules gate which contexts may hurt an obstacle stage
//! assert!(DamageRule::SpecialOnly.accepts(DamageContext::SpecialActivation));
//! assert!(!DamageRule::SpecialOnly.accepts(DamageContext::NormalMatch));
//! ```

use serde::{Deserialize, Serialize};

/// Shortest run of equal gems that counts as a match
pub const MIN_RUN: usize = 3;

/// Maximum cascade passes resolved in a single turn before aborting
pub const MAX_CASCADE_PASSES: u32 = 25;

/// Number of gem kinds spawned when the level does not say otherwise
pub const DEFAULT_GEM_KINDS: u8 = 6;

/// Re-roll budget per cell when pre-seeding the initial board
pub const INITIAL_FILL_ATTEMPTS: u32 = 16;

/// Sentinel stored in a remaining-hit slot that has not been initialized yet
pub const UNINITIALIZED_HITS: i32 = -1;


/// The closed set of base gem kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemKind {
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Orange,
}

impl GemKind {
    /// All gem kinds in id order
    pub const ALL: [GemKind; 6] = [
        GemKind::Red,
        GemKind::Green,
        GemKind::Blue,
        GemKind::Yellow,
        GemKind::Purple,
        GemKind::Orange,
    ];

    /// Stable numeric id, used as the target id of tile goals
    pub fn id(self) -> u32 {
        match self {
            GemKind::Red => 0,
            GemKind::Green => 1,
            GemKind::Blue => 2,
            GemKind::Yellow => 3,
            GemKind::Purple => 4,
            GemKind::Orange => 5,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Single-letter board notation
    pub fn letter(self) -> char {
        match self {
            GemKind::Red => 'R',
            GemKind::Green => 'G',
            GemKind::Blue => 'B',
            GemKind::Yellow => 'Y',
            GemKind::Purple => 'P',
            GemKind::Orange => 'O',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'R' => Some(GemKind::Red),
            'G' => Some(GemKind::Green),
            'B' => Some(GemKind::Blue),
            'Y' => Some(GemKind::Yellow),
            'P' => Some(GemKind::Purple),
            'O' => Some(GemKind::Orange),
            _ => None,
        }
    }

    /// Parse gem kind from string (case-insensitive name or letter)
    ///
    /// # Examples
    ///
    /// ```
    /// use gemfall_types::GemKind;
    ///
    /// assert_eq!(GemKind::from_str("purple"), Some(GemKind::Purple));
    /// assert_eq!(GemKind::from_str("Y"), Some(GemKind::Yellow));
    /// assert_eq!(GemKind::from_str("teal"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        if let Some(gem) = Self::ALL.iter().find(|g| g.as_str() == lower) {
            return Some(*gem);
        }
        let mut chars = lower.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_letter(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GemKind::Red => "red",
            GemKind::Green => "green",
            GemKind::Blue => "blue",
            GemKind::Yellow => "yellow",
            GemKind::Purple => "purple",
            GemKind::Orange => "orange",
        }
    }
}

/// Special power carried by a tile
///
/// - **LineH**: clears its whole row
/// - **LineV**: clears its whole column
/// - **PatchBot**: teleports to a chosen cell and hits it
/// - **PulseCore**: clears a 3x3 box around itself
/// - **SystemOverride**: clears every tile of its bound gem kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    #[default]
    None,
    LineH,
    LineV,
    PatchBot,
    PulseCore,
    SystemOverride,
}

impl SpecialKind {
    /// Promotion priority when choosing which tile becomes special
    pub fn creation_score(self) -> u32 {
        match self {
            SpecialKind::SystemOverride => 60,
            SpecialKind::PulseCore => 50,
            SpecialKind::LineH | SpecialKind::LineV => 30,
            SpecialKind::PatchBot => 20,
            SpecialKind::None => 0,
        }
    }

    pub fn is_special(self) -> bool {
        self != SpecialKind::None
    }

    pub fn is_line(self) -> bool {
        matches!(self, SpecialKind::LineH | SpecialKind::LineV)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialKind::None => "none",
            SpecialKind::LineH => "line_h",
            SpecialKind::LineV => "line_v",
            SpecialKind::PatchBot => "patch_bot",
            SpecialKind::PulseCore => "pulse_core",
            SpecialKind::SystemOverride => "system_override",
        }
    }
}

/// A tile occupying a cell
///
/// `id` is unique per session and survives movement, so chain reactions can
/// deduplicate by identity rather than by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub id: u32,
    pub gem: GemKind,
    pub special: SpecialKind,
    /// For `SystemOverride`: the gem kind it was bound to when created.
    pub override_gem: Option<GemKind>,
}

impl Tile {
    pub fn new(id: u32, gem: GemKind) -> Self {
        Self {
            id,
            gem,
            special: SpecialKind::None,
            override_gem: None,
        }
    }

    pub fn is_special(&self) -> bool {
        self.special.is_special()
    }

    /// Turn this tile into a special, binding the override gem when needed.
    pub fn promote(&mut self, kind: SpecialKind) {
        self.special = kind;
        self.override_gem = if kind == SpecialKind::SystemOverride {
            Some(self.gem)
        } else {
            None
        };
    }

    /// Strip the special power (used when the tile is consumed by its own activation).
    pub fn consume_special(&mut self) -> (SpecialKind, Option<GemKind>) {
        let taken = (self.special, self.override_gem);
        self.special = SpecialKind::None;
        self.override_gem = None;
        taken
    }
}

/// Why a cell is being damaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageContext {
    NormalMatch,
    SpecialActivation,
    Booster,
    Scripted,
}

/// Which damage contexts an obstacle stage accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageRule {
    #[default]
    Any,
    SpecialOnly,
    NormalOnly,
    BoosterOnly,
}

impl DamageRule {
    pub fn accepts(self, context: DamageContext) -> bool {
        match self {
            DamageRule::Any => true,
            DamageRule::SpecialOnly => context == DamageContext::SpecialActivation,
            DamageRule::NormalOnly => context == DamageContext::NormalMatch,
            DamageRule::BoosterOnly => context == DamageContext::Booster,
        }
    }
}

/// How an obstacle stage relates to the tile layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleBehavior {
    /// Sits under a tile; damaged when the tile above clears.
    #[default]
    UnderTileLayered,
    /// Sits over the cell; also catches splash from neighbouring clears.
    OverTileBlocker,
    /// Hides the cell until broken.
    RevealOnBreak,
}

/// Rule bundle in effect for one obstacle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageRule {
    #[serde(default)]
    pub blocks_cells: bool,
    #[serde(default)]
    pub behavior: ObstacleBehavior,
    #[serde(default)]
    pub allow_diagonal: bool,
    #[serde(default)]
    pub damage_rule: DamageRule,
}

impl StageRule {
    pub fn new(blocks_cells: bool, behavior: ObstacleBehavior, damage_rule: DamageRule) -> Self {
        Self {
            blocks_cells,
            behavior,
            allow_diagonal: false,
            damage_rule,
        }
    }

    pub fn with_diagonal(mut self, allow: bool) -> Self {
        self.allow_diagonal = allow;
        self
    }
}

impl Default for StageRule {
    fn default() -> Self {
        Self::new(false, ObstacleBehavior::UnderTileLayered, DamageRule::Any)
    }
}

/// What a level goal counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Tile,
    Obstacle,
}

/// A level goal: clear `amount` of the target
///
/// For `GoalKind::Tile` the target id is a [`GemKind::id`]; for
/// `GoalKind::Obstacle` it is an obstacle definition id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goal {
    pub kind: GoalKind,
    pub target_id: u32,
    pub amount: u32,
}

/// Player-triggered boosters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterKind {
    Single,
    Row,
    Column,
    Shuffle,
}

impl BoosterKind {
    /// Parse booster kind from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "single" => Some(BoosterKind::Single),
            "row" => Some(BoosterKind::Row),
            "column" | "col" => Some(BoosterKind::Column),
            "shuffle" => Some(BoosterKind::Shuffle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoosterKind::Single => "single",
            BoosterKind::Row => "row",
            BoosterKind::Column => "column",
            BoosterKind::Shuffle => "shuffle",
        }
    }
}

/// Domain event emitted by the rules engine
///
/// Events are appended in the order state was mutated. Hosts replay them to
/// drive presentation and goal displays; the engine never waits on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    TilesSwapped { a: usize, b: usize },
    SwapReverted { a: usize, b: usize },
    MovesChanged { remaining: u32 },
    SpecialCreated { cell: usize, kind: SpecialKind },
    SpecialActivated { cell: usize, kind: SpecialKind },
    PatchBotTeleported { from: usize, to: usize },
    /// Aggregated per gem kind, once per turn.
    TilesCleared { gem: GemKind, count: u32 },
    TileMoved { from: usize, to: usize },
    TileSpawned { cell: usize, gem: GemKind },
    ObstacleStageChanged {
        origin: usize,
        stage_index: usize,
        stage: StageRule,
    },
    ObstacleDestroyed { origin: usize, obstacle_id: u32 },
    CellUnlocked { cell: usize },
    BoardShuffled,
    CascadeAborted { passes: u32 },
    BoardIdle,
}
