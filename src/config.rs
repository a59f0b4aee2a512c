/*!
Engine configuration.

A [`Config`] is a plain value passed into compilation; nothing in the engine
reads ambient state behind the embedder's back. For embedders that want a
process-wide default there is a thin global layer ([`Config::global`],
[`Config::set_global`], [`Config::reset_global`]) which lazily initializes
to [`Config::default`] on first use and only ever hands out copies.
*/

use std::sync::{OnceLock, RwLock};

use bon::Builder;

/// Ceilings and toggles applied while compiling and matching patterns.
///
/// ```
/// use librift::Config;
///
/// let config = Config::builder()
///     .max_states(10_000)
///     .use_dfa_when_possible(false)
///     .build();
/// assert_eq!(config.max_states, 10_000);
/// ```
#[derive(Builder, Clone, Debug, PartialEq)]
pub struct Config {
    /// Compilation rejects pattern sources longer than this many bytes.
    #[builder(default = 64 * 1024)]
    pub max_pattern_length: usize,
    /// The automaton builder aborts once it would exceed this many states.
    #[builder(default = 100_000)]
    pub max_states: usize,
    /// Default backtracking-depth ceiling for the global limit config.
    #[builder(default = 10_000)]
    pub max_backtrack_depth: usize,
    /// Default wall-clock ceiling, in milliseconds, for a single match
    /// attempt.
    #[builder(default = 5_000)]
    pub default_timeout_ms: u64,
    /// Whether the post-build bytecode optimizer runs.
    #[builder(default = true)]
    pub optimize_automaton: bool,
    /// If false, patterns stay NFA-backed even when determinization would be
    /// valid.
    #[builder(default = true)]
    pub use_dfa_when_possible: bool,
    /// Gates the `r'…'` / `r"…"` raw-literal envelope. A raw prefix seen
    /// while this is off is an `unsupported-feature` error.
    #[builder(default = true)]
    pub enable_raw_literal_syntax: bool,
    /// The parser rejects patterns with more capturing groups than this.
    #[builder(default = 512)]
    pub max_capture_groups: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config::builder().build()
    }
}

/// Default transition ceiling for the global limit config. Not part of
/// [`Config`]; override it per pattern or per match through the
/// [`LimitRegistry`](crate::limits::LimitRegistry).
pub(crate) const DEFAULT_MAX_TRANSITIONS: u64 = 1_000_000;

fn global_cell() -> &'static RwLock<Config> {
    static GLOBAL: OnceLock<RwLock<Config>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(Config::default()))
}

impl Config {
    /// A copy of the process-wide configuration.
    pub fn global() -> Config {
        global_cell().read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replaces the process-wide configuration. Only affects patterns
    /// compiled afterwards.
    pub fn set_global(config: Config) {
        *global_cell().write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    /// Resets the process-wide configuration to [`Config::default`].
    pub fn reset_global() {
        Config::set_global(Config::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = Config::default();
        assert_eq!(config.max_pattern_length, 64 * 1024);
        assert!(config.optimize_automaton);
        assert!(config.enable_raw_literal_syntax);
    }

    #[test]
    fn global_roundtrip() {
        let before = Config::global();
        Config::set_global(Config::builder().max_capture_groups(7).build());
        assert_eq!(Config::global().max_capture_groups, 7);
        Config::reset_global();
        assert_eq!(Config::global().max_capture_groups, before.max_capture_groups);
    }
}
