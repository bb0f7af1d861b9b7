//! Engine configuration options.

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seed for the simulation RNG. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Log every audit event at info instead of debug.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_events: 100_000,
            verbose: false,
        }
    }
}

impl EngineConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}
