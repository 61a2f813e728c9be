//! Runtime configuration.

/// Tunables for one form runtime instance.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum nesting depth for dependency-field generation. Generators may
    /// return further dependency nodes; expansion past this depth is logged
    /// and dropped, bounding mutual recursion between dependency fields.
    pub max_generation_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_generation_depth: 16,
        }
    }
}
