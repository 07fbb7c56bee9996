//! Engine module - turn resolution around the core rules
//!
//! The engine drives the board through whole turns. The core crate decides
//! *what* matches, activates or takes damage; this crate decides *when*:
//!
//! - [`session`]: the board state machine (swaps, boosters, cascade loop)
//! - [`gravity`]: collapse, spawn and diagonal slide-fill phases
//! - [`busy`]: reference-counted busy/idle gate with deferred callbacks
//! - [`config`]: session tuning, with environment overrides
//!
//! # Turn Lifecycle
//!
//! | Phase | Damage context | Splash |
//! |-------|----------------|--------|
//! | Swap with a special | `SpecialActivation` | no |
//! | Plain swap match | `NormalMatch` | yes |
//! | Cascade pass | `NormalMatch` | yes |
//! | Single booster | `Booster` | yes |
//! | Row / column booster | `Booster` | no |
//!
//! A cascade stops when no match is left or after
//! [`MAX_CASCADE_PASSES`](types::MAX_CASCADE_PASSES) passes (configurable).
//!
//! # Example
//!
//! ```
//! use gemfall_core::LevelData;
//! use gemfall_engine::{Session, SessionConfig};
//!
//! let level = LevelData::new(6, 6, 15);
//! let mut session = Session::new(level, SessionConfig::default().with_seed(7)).unwrap();
//! session.resolve_initial();
//!
//! // Non-adjacent swaps are refused without touching the board.
//! assert!(session.request_swap(0, 2).is_err());
//! assert_eq!(session.moves_left(), 15);
//! ```

pub mod busy;
pub mod config;
pub mod gravity;
pub mod session;

pub use gemfall_core as core;
pub use gemfall_types as types;

pub use busy::BusyGate;
pub use config::SessionConfig;
pub use session::{BoosterError, Outcome, Session, SwapError, TurnReport};
