//! Configuration for mutant generation.
//!
//! [`MutationConfig`] is plain data with a [`Default`] that matches what an
//! external test runner expects: the selector and range-marker symbols below
//! are the names a runner patches or links against.

/// Default name of the process-wide mutant selector global.
pub const DEFAULT_SELECTOR: &str = "metamut_mutant_id_selector";

/// Default name of the function that records the mutant IDs live at a site.
pub const DEFAULT_RANGE_MARKER: &str = "metamut_mutant_range_live";

/// Default name of the function weak-mutation instrumentation reports to.
pub const DEFAULT_WEAK_LOG: &str = "metamut_weak_mutation_log";

/// Default name of the symbolic-value injection call that is never mutated.
pub const DEFAULT_SYMBOLIC_FUNCTION: &str = "klee_make_symbolic";

/// Default prefix of debug-info marker calls.
pub const DEFAULT_DEBUG_PREFIX: &str = "llvm.dbg.";

/// Configuration for the mutation engine.
///
/// Controls symbol names of the generated instrumentation and which
/// constructs are filtered out before operators see a statement.
#[derive(Debug, Clone)]
pub struct MutationConfig {
    /// Name of the selector global (default: `metamut_mutant_id_selector`).
    pub selector_name: String,

    /// Name of the range-marker function (default: `metamut_mutant_range_live`).
    pub range_marker_name: String,

    /// Emit a range-marker call at every dispatch site (default: true).
    pub emit_range_marker: bool,

    /// Function called by weak-mutation instrumentation with `(i32 id, i1 differs)`
    /// (default: `metamut_weak_mutation_log`).
    pub weak_log_name: String,

    /// Statements calling this function are never mutated (default: `klee_make_symbolic`).
    pub symbolic_function: String,

    /// Calls to functions with this prefix are debug markers (default: `llvm.dbg.`).
    pub debug_prefix: String,

    /// Demote phis with non-constant incoming values to stack slots before
    /// extraction (default: true).
    ///
    /// Turning this off only makes sense for programs whose phis are already
    /// constant-only; a variable phi would otherwise tie unrelated
    /// computations of its predecessors into one statement.
    pub demote_phis: bool,

    /// Name of an instrumentation-support function that is never mutated,
    /// in addition to functions carrying
    /// [`crate::ir::FunctionAttributes::INSTRUMENTATION`].
    pub instrumentation_function: Option<String>,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            selector_name: DEFAULT_SELECTOR.to_string(),
            range_marker_name: DEFAULT_RANGE_MARKER.to_string(),
            emit_range_marker: true,
            weak_log_name: DEFAULT_WEAK_LOG.to_string(),
            symbolic_function: DEFAULT_SYMBOLIC_FUNCTION.to_string(),
            debug_prefix: DEFAULT_DEBUG_PREFIX.to_string(),
            demote_phis: true,
            instrumentation_function: None,
        }
    }
}

impl MutationConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `callee` names a debug-info marker.
    #[must_use]
    pub fn is_debug_marker(&self, callee: &str) -> bool {
        !self.debug_prefix.is_empty() && callee.starts_with(&self.debug_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_marker() {
        let config = MutationConfig::default();
        assert!(config.is_debug_marker("llvm.dbg.value"));
        assert!(!config.is_debug_marker("printf"));
        assert_eq!(config.selector_name, DEFAULT_SELECTOR);
    }
}
