//! Engine configuration.

use crate::agenda::{SalienceMode, Strategy};

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Conflict resolution strategy.
    pub strategy: Strategy,

    /// When dynamic salience expressions are evaluated.
    pub salience_mode: SalienceMode,

    /// Whether a fact equal to a live fact may be asserted again.
    ///
    /// When false, such an assert returns the existing fact's id and changes
    /// nothing.
    pub fact_duplication: bool,

    /// Seed for the random strategy.
    pub seed: u64,

    /// Hard cap on activations fired by a single `run` call.
    pub max_fires: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Depth,
            salience_mode: SalienceMode::WhenDefined,
            fact_duplication: true,
            seed: 0,
            max_fires: None,
        }
    }
}

impl EngineConfig {
    /// Builder method to set the conflict resolution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder method to set the salience evaluation mode.
    #[must_use]
    pub fn with_salience_mode(mut self, mode: SalienceMode) -> Self {
        self.salience_mode = mode;
        self
    }

    /// Builder method to allow or forbid duplicate facts.
    #[must_use]
    pub fn with_fact_duplication(mut self, allow: bool) -> Self {
        self.fact_duplication = allow;
        self
    }

    /// Builder method to set the random strategy seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to cap fires per `run` call.
    #[must_use]
    pub fn with_max_fires(mut self, max: u32) -> Self {
        self.max_fires = Some(max);
        self
    }
}
