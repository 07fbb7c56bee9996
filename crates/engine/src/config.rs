use crate::types::{DEFAULT_GEM_KINDS, INITIAL_FILL_ATTEMPTS, MAX_CASCADE_PASSES};

/// Session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Seed for spawn types, shuffles and teleport picks
    pub seed: u32,
    /// Gem kinds in play (clamped to 1..=6 when drawing)
    pub gem_kinds: u8,
    pub max_cascade_passes: u32,
    /// Re-rolls per cell while pre-seeding the board
    pub initial_fill_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            gem_kinds: DEFAULT_GEM_KINDS,
            max_cascade_passes: MAX_CASCADE_PASSES,
            initial_fill_attempts: INITIAL_FILL_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let defaults = Self::default();

        let seed = env::var("GEMFALL_SEED")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.seed);

        let gem_kinds = env::var("GEMFALL_GEM_KINDS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|&n: &u8| (1..=6).contains(&n))
            .unwrap_or(defaults.gem_kinds);

        let max_cascade_passes = env::var("GEMFALL_MAX_PASSES")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|&n: &u32| n > 0)
            .unwrap_or(defaults.max_cascade_passes);

        Self {
            seed,
            gem_kinds,
            max_cascade_passes,
            ..defaults
        }
    }
}
