//! Runtime-tunable knobs for the engine, collected into a single struct
//! so that tests and embedding applications have one place to dial in
//! fast, deterministic parameters instead of hunting for literals.

use std::env;

/// Default Barnes-Hut opening angle.
pub const DEFAULT_THETA: f32 = 1.2;
pub const DEFAULT_LAYOUT_SCALING: f32 = 0.4;
pub const DEFAULT_LAYOUT_SMOOTHING: usize = 4;
pub const DEFAULT_MAX_NODES_PER_LEAF: usize = 1;
pub const DEFAULT_MCL_PRUNE_LIMIT: usize = 1400;
pub const DEFAULT_MCL_PRUNE_RECOVER_LIMIT: usize = 1100;
pub const DEFAULT_PAGERANK_DAMPING: f64 = 0.85;
pub const DEFAULT_PAGERANK_EPSILON: f64 = 1e-6;
pub const DEFAULT_PAGERANK_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub theta: f32,
    pub layout_scaling: f32,
    pub layout_smoothing: usize,
    pub max_nodes_per_leaf: usize,
    pub mcl_prune_limit: usize,
    pub mcl_prune_recover_limit: usize,
    pub pagerank_damping: f64,
    pub pagerank_epsilon: f64,
    pub pagerank_max_iterations: usize,
    pub worker_threads: Option<usize>,
    pub debug_layout: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            theta: DEFAULT_THETA,
            layout_scaling: DEFAULT_LAYOUT_SCALING,
            layout_smoothing: DEFAULT_LAYOUT_SMOOTHING,
            max_nodes_per_leaf: DEFAULT_MAX_NODES_PER_LEAF,
            mcl_prune_limit: DEFAULT_MCL_PRUNE_LIMIT,
            mcl_prune_recover_limit: DEFAULT_MCL_PRUNE_RECOVER_LIMIT,
            pagerank_damping: DEFAULT_PAGERANK_DAMPING,
            pagerank_epsilon: DEFAULT_PAGERANK_EPSILON,
            pagerank_max_iterations: DEFAULT_PAGERANK_MAX_ITERATIONS,
            worker_threads: None,
            debug_layout: false,
        }
    }
}

impl EngineConfig {
    /// Builds a config from defaults overlaid with `LAYOUT_THREADS` and
    /// `DEBUG_LAYOUT`, the two environment knobs the external interface
    /// documents. Malformed values are logged and ignored rather than
    /// treated as a startup error.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var("LAYOUT_THREADS") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.worker_threads = Some(n),
                _ => tracing::warn!(value = %raw, "ignoring malformed LAYOUT_THREADS"),
            }
        }

        if let Ok(raw) = env::var("DEBUG_LAYOUT") {
            config.debug_layout = raw == "1";
        }

        config
    }

    pub fn worker_thread_count(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }

    /// A config tuned for fast, deterministic convergence in tests:
    /// small rings, tight thresholds, single-threaded pool.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            worker_threads: Some(1),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.mcl_prune_limit, 1400);
        assert_eq!(config.mcl_prune_recover_limit, 1100);
        assert_eq!(config.layout_smoothing, 4);
    }

    #[test]
    fn worker_thread_count_falls_back_to_available_parallelism() {
        let config = EngineConfig::default();
        assert!(config.worker_thread_count() >= 1);
    }
}
