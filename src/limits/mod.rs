/*!
Bounded-backtracking policy: the limit registry, the pattern-complexity
estimator and pluggable bailout strategies.

Limits form a three-level hierarchy (global, per-pattern, per-match); a
lower scope replaces the effective limits only when its `override_parent`
bit is set. The registry is read-mostly: effective-limit queries take a
reader lock, registrations take a writer lock.

Bailout strategies observe the live [`BacktrackState`] of a match attempt
and can abort it, prune its weakest pending branch, or ask the matcher to
finish the attempt on the DFA subset when one exists. The
[`ProgressTracking`] strategy ships with the engine; embedders can plug in
their own through [`StrategyManager::push`].
*/

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use crate::{
    config::{Config, DEFAULT_MAX_TRANSITIONS},
    syntax::ast::AstStats,
};

/// The scope a [`LimitConfig`] applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitScope {
    Global,
    Pattern,
    Match,
}

/// Resource ceilings for one scope of the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimitConfig {
    pub scope: LimitScope,
    /// When set, this config's ceilings replace the parent scope's.
    pub override_parent: bool,
    /// Maximum backtracking depth (pending alternatives).
    pub max_depth: usize,
    /// Maximum wall-clock duration of one match attempt.
    pub max_duration: Duration,
    /// Maximum transitions (VM steps) of one match attempt.
    pub max_transitions: u64,
}

impl LimitConfig {
    /// The global defaults derived from an engine [`Config`].
    pub fn global_defaults(config: &Config) -> LimitConfig {
        LimitConfig {
            scope: LimitScope::Global,
            override_parent: false,
            max_depth: config.max_backtrack_depth,
            max_duration: Duration::from_millis(config.default_timeout_ms),
            max_transitions: DEFAULT_MAX_TRANSITIONS,
        }
    }

    /// A pattern-scope config with `override_parent` set.
    pub fn for_pattern(max_depth: usize, max_duration: Duration, max_transitions: u64) -> LimitConfig {
        LimitConfig {
            scope: LimitScope::Pattern,
            override_parent: true,
            max_depth,
            max_duration,
            max_transitions,
        }
    }

    /// A match-scope config with `override_parent` set.
    pub fn for_match(max_depth: usize, max_duration: Duration, max_transitions: u64) -> LimitConfig {
        LimitConfig {
            scope: LimitScope::Match,
            override_parent: true,
            max_depth,
            max_duration,
            max_transitions,
        }
    }
}

/// The ceilings actually applied to one match attempt after resolving the
/// hierarchy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveLimits {
    pub max_depth: usize,
    pub max_duration: Duration,
    pub max_transitions: u64,
}

impl From<LimitConfig> for EffectiveLimits {
    fn from(config: LimitConfig) -> EffectiveLimits {
        EffectiveLimits {
            max_depth: config.max_depth,
            max_duration: config.max_duration,
            max_transitions: config.max_transitions,
        }
    }
}

/// Maps pattern ids and match ids to their limit configs; absent entries
/// fall through to the global scope.
#[derive(Debug)]
pub struct LimitRegistry {
    global: RwLock<LimitConfig>,
    patterns: RwLock<HashMap<u64, LimitConfig>>,
    matches: RwLock<HashMap<u64, LimitConfig>>,
}

impl LimitRegistry {
    pub fn new(global: LimitConfig) -> LimitRegistry {
        LimitRegistry {
            global: RwLock::new(global),
            patterns: RwLock::new(HashMap::new()),
            matches: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_config(config: &Config) -> LimitRegistry {
        LimitRegistry::new(LimitConfig::global_defaults(config))
    }

    pub fn set_global(&self, config: LimitConfig) {
        *self.global.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn register_pattern(&self, pattern_id: u64, config: LimitConfig) {
        trace!(
            "limit registry: pattern {} depth={} transitions={}",
            pattern_id,
            config.max_depth,
            config.max_transitions
        );
        self.patterns
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pattern_id, config);
    }

    pub fn unregister_pattern(&self, pattern_id: u64) {
        self.patterns
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&pattern_id);
    }

    pub fn register_match(&self, match_id: u64, config: LimitConfig) {
        self.matches
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(match_id, config);
    }

    pub fn unregister_match(&self, match_id: u64) {
        self.matches
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&match_id);
    }

    /// Resolves the hierarchy for a (pattern, match) pair: start from
    /// global, then substitute each lower scope that opts in via
    /// `override_parent`.
    pub fn effective(&self, pattern_id: Option<u64>, match_id: Option<u64>) -> EffectiveLimits {
        let mut effective: EffectiveLimits =
            (*self.global.read().unwrap_or_else(|e| e.into_inner())).into();
        if let Some(id) = pattern_id {
            let patterns = self.patterns.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = patterns.get(&id) {
                if config.override_parent {
                    effective = (*config).into();
                }
            }
        }
        if let Some(id) = match_id {
            let matches = self.matches.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = matches.get(&id) {
                if config.override_parent {
                    effective = (*config).into();
                }
            }
        }
        effective
    }
}

/// Deterministic scalar complexity of a compiled pattern: the state count
/// times the average out-degree, inflated by group nesting, alternations
/// and (especially nested) quantifiers, with a surcharge for raw-literal
/// patterns.
pub fn complexity(states: usize, transitions: usize, stats: &AstStats, raw_literal: bool) -> f64 {
    let states_f = states.max(1) as f64;
    let average_out_degree = transitions as f64 / states_f;
    states_f
        * average_out_degree
        * (1.0 + 0.15 * f64::from(stats.max_group_depth))
        * (1.0 + 0.10 * f64::from(stats.alternation_count))
        * (1.0
            + 0.05 * f64::from(stats.quantifier_count)
            + 0.20 * f64::from(stats.nested_quantifier_count))
        * if raw_literal { 1.25 } else { 1.0 }
}

/// Limits for a raw-literal pattern, scaled continuously down as its
/// complexity grows. The config overrides the global scope once complexity
/// passes 1.5.
pub fn raw_literal_limits(complexity: f64) -> LimitConfig {
    let depth = (2000.0 / (1.0 + 0.15 * complexity)).max(400.0) as usize;
    let time_ms = (6000.0 - 300.0 * complexity).max(1500.0) as u64;
    let transitions = (150_000.0 - 10_000.0 * complexity).max(30_000.0) as u64;
    LimitConfig {
        scope: LimitScope::Pattern,
        override_parent: complexity > 1.5,
        max_depth: depth,
        max_duration: Duration::from_millis(time_ms),
        max_transitions: transitions,
    }
}

/// Live counters for one match attempt, observed by bailout strategies.
#[derive(Clone, Debug)]
pub struct BacktrackState {
    /// Pending alternatives on the backtrack stack.
    pub depth: usize,
    /// When the current attempt run started.
    pub started_at: Instant,
    /// Transitions (VM steps) executed so far.
    pub transitions: u64,
    /// Input position at which forward progress was last observed.
    pub last_progress: usize,
    /// Backtracking steps since `last_progress` advanced.
    pub stagnation: u32,
    /// Length of the input being matched.
    pub input_len: usize,
}

impl BacktrackState {
    pub(crate) fn new(input_len: usize, start: usize) -> BacktrackState {
        BacktrackState {
            depth: 0,
            started_at: Instant::now(),
            transitions: 0,
            last_progress: start,
            stagnation: 0,
            input_len,
        }
    }

    /// Called on every backtracking step: the counter resets and the marker
    /// advances only when the resumed position is past the marker.
    pub(crate) fn note_backtrack(&mut self, at: usize) {
        if at > self.last_progress {
            self.last_progress = at;
            self.stagnation = 0;
        } else {
            self.stagnation = self.stagnation.saturating_add(1);
        }
    }
}

/// What a triggered strategy wants done with the attempt. The discriminants
/// are the wire-level action codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BailoutAction {
    /// Abort the attempt.
    Abort = 0,
    /// Drop the oldest (least preferred) pending alternative.
    PruneWeakest = 1,
    /// Finish the attempt on the DFA subset when one exists; otherwise
    /// equivalent to [`BailoutAction::Abort`].
    SwitchToDfa = 2,
}

impl BailoutAction {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A pluggable bailout policy consulted on every backtracking step.
pub trait BailoutStrategy: Send + Sync {
    /// Does the current backtracking state trigger this strategy?
    fn should_activate(&self, state: &BacktrackState) -> bool;

    /// Higher wins when several strategies activate at once.
    fn priority(&self) -> i32;

    /// The action to take; only called after `should_activate` returned
    /// true.
    fn execute(&self, state: &mut BacktrackState) -> BailoutAction;
}

/// An ordered collection of strategies; the activated strategy with the
/// highest priority decides.
pub struct StrategyManager {
    strategies: Vec<Arc<dyn BailoutStrategy>>,
}

impl Default for StrategyManager {
    /// A manager with the stock [`ProgressTracking`] strategy.
    fn default() -> StrategyManager {
        let mut manager = StrategyManager::empty();
        manager.push(Arc::new(ProgressTracking::default()));
        manager
    }
}

impl StrategyManager {
    pub fn empty() -> StrategyManager {
        StrategyManager { strategies: Vec::new() }
    }

    pub fn push(&mut self, strategy: Arc<dyn BailoutStrategy>) {
        self.strategies.push(strategy);
    }

    pub(crate) fn evaluate(&self, state: &mut BacktrackState) -> Option<BailoutAction> {
        let active = self
            .strategies
            .iter()
            .filter(|s| s.should_activate(state))
            .max_by_key(|s| s.priority())?;
        let action = active.execute(state);
        trace!("bailout strategy fired: action {}", action.code());
        Some(action)
    }
}

impl std::fmt::Debug for StrategyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyManager")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

/// Aborts attempts that keep backtracking without covering new input.
///
/// A backtracking step that resumes past the progress marker advances the
/// marker and clears the stagnation counter; any other backtracking step
/// increments it. Once the counter reaches `max_stagnation` *and* the
/// marker covers at most `threshold` of the input, the strategy fires with
/// [`BailoutAction::Abort`].
#[derive(Clone, Debug)]
pub struct ProgressTracking {
    threshold: f64,
    max_stagnation: u32,
}

impl Default for ProgressTracking {
    fn default() -> ProgressTracking {
        ProgressTracking {
            threshold: 1.0,
            max_stagnation: 4096,
        }
    }
}

impl ProgressTracking {
    /// `threshold` is clamped into `[0, 1]`.
    pub fn new(threshold: f64, max_stagnation: u32) -> ProgressTracking {
        ProgressTracking {
            threshold: threshold.clamp(0.0, 1.0),
            max_stagnation,
        }
    }
}

impl BailoutStrategy for ProgressTracking {
    fn should_activate(&self, state: &BacktrackState) -> bool {
        if state.stagnation < self.max_stagnation {
            return false;
        }
        let covered = state.last_progress as f64 / state.input_len.max(1) as f64;
        covered <= self.threshold
    }

    fn priority(&self) -> i32 {
        0
    }

    fn execute(&self, _state: &mut BacktrackState) -> BailoutAction {
        BailoutAction::Abort
    }
}
