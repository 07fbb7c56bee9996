//! Gemfall (workspace facade crate).
//!
//! Re-exports the rules engine as `gemfall::{types, core, engine}` and hosts
//! the pieces of the headless runner that are worth testing on their own:
//! logger setup and the scripted input format.

pub mod logging;
pub mod script;

pub use gemfall_core as core;
pub use gemfall_engine as engine;
pub use gemfall_types as types;
