/*!
The compiled-pattern façade.

A [`Regex`] owns one immutable compiled form (bytecode program or
automaton), the side tables matching needs (group names, prefilter,
minimized DFA when one exists), and a pool of matcher caches so the
high-level search API works from any number of threads without locking on
the hot path.

# Example

```
use librift::Regex;

let re = Regex::new(r"(?<user>\w+)@(?<host>\w+)").unwrap();
let hay = "send to alice@example today";
let m = re.find(hay).unwrap().unwrap();
assert_eq!(m.as_str(), "alice@example");

let caps = re.captures(hay).unwrap().unwrap();
assert_eq!(&hay[caps.name("user").unwrap()], "alice");
```

# Synchronization and cloning

The search methods hide the per-invocation scratch behind an internal
memory pool, so a `Regex` can be shared across threads directly. Cloning a
`Regex` does not deep-copy the compiled form but does create a fresh pool,
which can reduce pool contention when many threads hammer short searches.
*/

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bon::bon;

use crate::{
    bytecode::{compile, serialize, Program, MAX_COUNTED_REPEAT},
    config::Config,
    error::{Error, Result},
    flags::Flags,
    limits::{complexity, raw_literal_limits, LimitConfig, LimitRegistry, StrategyManager},
    matcher::{Cache, Captures, Match, Matcher},
    nfa::{self, Automaton},
    syntax::{self, ast::AstStats},
    util::pool::Pool,
};

#[cfg(feature = "perf-literal")]
use crate::syntax::ast::{Ast, GroupKind};

static NEXT_PATTERN_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_match_id() -> u64 {
    NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed)
}

/// The executable form backing a compiled pattern.
pub(crate) enum Engine {
    /// Flat bytecode for the VM.
    Program(Program),
    /// An NFA executed directly (look-behind, atomic groups).
    Automaton(Automaton),
}

/// Which engine a pattern compiled to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    Bytecode,
    Automaton,
}

/// A compiled regular expression.
pub struct Regex {
    pattern: String,
    flags: Flags,
    config: Config,
    engine: Engine,
    dfa: Option<Automaton>,
    stats: AstStats,
    names: Arc<[(String, u32)]>,
    complexity: f64,
    id: u64,
    registry: Arc<LimitRegistry>,
    strategies: Arc<StrategyManager>,
    #[cfg(feature = "perf-literal")]
    prefilter: Prefilter,
    pool: Pool<Cache>,
}

#[bon]
impl Regex {
    /// Compiles `pattern` with the default configuration.
    pub fn new(pattern: &str) -> Result<Regex> {
        Regex::builder().build(pattern)
    }

    #[builder(builder_type = Builder, finish_fn(name = build, doc {
        /// Compiles the pattern with the configured options.
        ///
        /// Group indices are assigned in opening-paren order over capturing
        /// groups; the engine (bytecode VM, automaton, optional DFA subset)
        /// is chosen from the pattern's features.
    }))]
    pub fn builder(
        #[builder(finish_fn)] pattern: &str,

        /// Compile and run flags.
        #[builder(default)]
        flags: Flags,

        /// Engine configuration. Defaults to the process-wide
        /// configuration.
        config: Option<Config>,

        /// Limit registry to register this pattern in, shared with other
        /// patterns. Defaults to a fresh registry seeded from the
        /// configuration.
        registry: Option<Arc<LimitRegistry>>,

        /// Pattern-scope limits registered at build time. Raw-literal
        /// patterns also get complexity-scaled limits automatically.
        limits: Option<LimitConfig>,

        /// Bailout strategies consulted while backtracking. Defaults to
        /// the stock progress-tracking strategy.
        strategies: Option<Arc<StrategyManager>>,
    ) -> Result<Regex> {
        let config = config.unwrap_or_else(Config::global);
        let registry = registry.unwrap_or_else(|| Arc::new(LimitRegistry::with_config(&config)));
        let strategies = strategies.unwrap_or_else(|| Arc::new(StrategyManager::default()));

        let parsed = syntax::parse(pattern, flags, &config)?;
        let stats = parsed.stats;
        let (engine, dfa) = route(&parsed.ast, &stats, pattern, flags, &config)?;

        let (states, transitions) = match &engine {
            Engine::Program(program) => (program.instruction_count(), program.edge_count()),
            Engine::Automaton(automaton) => (
                automaton.deep_state_count(),
                automaton.deep_transition_count(),
            ),
        };
        let complexity = complexity(states, transitions, &stats, parsed.raw_envelope);
        let id = NEXT_PATTERN_ID.fetch_add(1, Ordering::Relaxed);
        if parsed.raw_envelope {
            registry.register_pattern(id, raw_literal_limits(complexity));
        }
        if let Some(limits) = limits {
            registry.register_pattern(id, limits);
        }
        debug!(
            "compiled {:?}: engine {:?}, {} states, complexity {:.2}",
            pattern,
            match engine {
                Engine::Program(_) => EngineKind::Bytecode,
                Engine::Automaton(_) => EngineKind::Automaton,
            },
            states,
            complexity
        );

        Ok(Regex {
            pattern: pattern.to_string(),
            flags,
            #[cfg(feature = "perf-literal")]
            prefilter: Prefilter::from_ast(&parsed.ast),
            config,
            engine,
            dfa,
            stats,
            names: parsed.names.into(),
            complexity,
            id,
            registry,
            strategies,
            pool: Pool::new(Cache::new),
        })
    }
}

/// Picks the executable form for a parsed pattern.
fn route(
    ast: &crate::syntax::ast::Ast,
    stats: &AstStats,
    pattern: &str,
    flags: Flags,
    config: &Config,
) -> Result<(Engine, Option<Automaton>)> {
    let group_count = stats.capture_count;
    if stats.has_backref {
        // Backreferences only exist in bytecode; a pattern that combines
        // them with automaton-only features fails inside the compiler.
        let program = compile::from_ast(ast, pattern, flags, group_count, config)?;
        return Ok((Engine::Program(program), None));
    }
    if stats.has_lookbehind || stats.has_atomic {
        let automaton = nfa::build(ast, flags, config)?;
        return Ok((Engine::Automaton(automaton), None));
    }
    let wide_counted = stats.max_finite_repeat > compile::REPEAT_UNROLL_LIMIT
        && stats.max_finite_repeat <= MAX_COUNTED_REPEAT;
    if stats.has_lookahead || wide_counted {
        let program = compile::from_ast(ast, pattern, flags, group_count, config)?;
        return Ok((Engine::Program(program), None));
    }
    let automaton = nfa::build(ast, flags, config)?;
    // A DFA costs memory; under the size objective the pattern runs
    // without one.
    let want_dfa = config.use_dfa_when_possible && flags.objective() == crate::flags::Objective::Speed;
    let dfa = if want_dfa && automaton.is_determinizable() {
        match nfa::determinize(&automaton, config) {
            Ok(dfa) if config.optimize_automaton => Some(nfa::minimize(&dfa)),
            Ok(dfa) => Some(dfa),
            // The DFA is an accelerator; a pattern that blows the state
            // budget under subset construction just runs without one.
            Err(_) => None,
        }
    } else {
        None
    };
    let program = compile::from_automaton(&automaton, pattern, flags, group_count, config)?;
    Ok((Engine::Program(program), dfa))
}

impl Regex {
    /// The pattern source this regex was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Number of capturing groups, not counting the implicit group 0.
    pub fn group_count(&self) -> u32 {
        self.stats.capture_count
    }

    /// The engine this pattern compiled to.
    pub fn engine_kind(&self) -> EngineKind {
        match self.engine {
            Engine::Program(_) => EngineKind::Bytecode,
            Engine::Automaton(_) => EngineKind::Automaton,
        }
    }

    /// Instruction count (bytecode) or state count (automaton).
    pub fn size(&self) -> usize {
        match &self.engine {
            Engine::Program(program) => program.instruction_count(),
            Engine::Automaton(automaton) => automaton.deep_state_count(),
        }
    }

    /// The deterministic complexity score used for limit scaling.
    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    /// True when a minimized DFA accelerates full-match checks.
    pub fn has_dfa(&self) -> bool {
        self.dfa.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The registry resolving this pattern's effective limits.
    pub fn limit_registry(&self) -> &Arc<LimitRegistry> {
        &self.registry
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn dfa(&self) -> Option<&Automaton> {
        self.dfa.as_ref()
    }

    pub(crate) fn registry(&self) -> &LimitRegistry {
        &self.registry
    }

    pub(crate) fn strategies(&self) -> &StrategyManager {
        &self.strategies
    }

    pub(crate) fn names(&self) -> Arc<[(String, u32)]> {
        Arc::clone(&self.names)
    }

    pub(crate) fn slot_count(&self) -> usize {
        2 * (self.group_count() as usize + 1)
    }

    /// A matcher context in the `Ready` state; bind input with
    /// [`Matcher::set_input`].
    pub fn matcher<'h>(&self) -> Matcher<'_, 'h> {
        let cache = self.pool.get().expect("regex cache pool is uncapped");
        Matcher::new(self, cache)
    }

    /// True if the pattern matches anywhere in `haystack`. Resource
    /// faults count as no match.
    pub fn is_match(&self, haystack: &str) -> bool {
        matches!(self.find(haystack), Ok(Some(_)))
    }

    /// Whether the whole of `haystack` matches.
    pub fn matches<'h>(&self, haystack: &'h str) -> Result<Option<Match<'h>>> {
        let mut matcher = self.matcher();
        matcher.set_input(haystack);
        matcher.matches()
    }

    /// The leftmost match in `haystack`.
    pub fn find<'h>(&self, haystack: &'h str) -> Result<Option<Match<'h>>> {
        self.find_at(haystack, 0)
    }

    /// The leftmost match starting at or after `from`.
    pub fn find_at<'h>(&self, haystack: &'h str, from: usize) -> Result<Option<Match<'h>>> {
        let mut matcher = self.matcher();
        matcher.set_input(haystack);
        matcher.find_next(from)
    }

    /// The capture table of the leftmost match.
    pub fn captures(&self, haystack: &str) -> Result<Option<Captures>> {
        let mut matcher = self.matcher();
        matcher.set_input(haystack);
        matcher.find_captures(0)
    }

    /// Iterator over non-overlapping matches, left to right. Stops early
    /// if an attempt hits a resource bound.
    pub fn find_iter<'r, 'h>(&'r self, haystack: &'h str) -> FindIter<'r, 'h> {
        let mut matcher = self.matcher();
        matcher.set_input(haystack);
        FindIter {
            matcher,
            from: 0,
            done: false,
        }
    }

    /// Iterator over the capture tables of non-overlapping matches.
    pub fn captures_iter<'r, 'h>(&'r self, haystack: &'h str) -> CapturesIter<'r, 'h> {
        let mut matcher = self.matcher();
        matcher.set_input(haystack);
        CapturesIter {
            matcher,
            from: 0,
            done: false,
        }
    }

    /// Replaces every match with the expanded template; returns the new
    /// text and the replacement count.
    pub fn replace_all(&self, haystack: &str, template: &str) -> Result<(String, usize)> {
        let mut matcher = self.matcher();
        matcher.set_input(haystack);
        matcher.replace(template)
    }

    /// Splits `haystack` around matches into at most `max` pieces.
    pub fn split<'h>(&self, haystack: &'h str, max: usize) -> Result<Vec<&'h str>> {
        let mut matcher = self.matcher();
        matcher.set_input(haystack);
        matcher.split(max)
    }

    /// Serializes the compiled program. Automaton-backed patterns
    /// (look-behind, atomic groups) have no flat form and report
    /// `unsupported-feature`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match &self.engine {
            Engine::Program(program) => Ok(serialize::write(program)),
            Engine::Automaton(_) => Err(Error::unsupported(
                "automaton-backed patterns cannot be serialized",
            )),
        }
    }

    /// Loads a serialized program. The embedded pattern is recompiled
    /// under the embedded flags to rebuild the class and name tables, and
    /// the loaded instruction stream is validated against them before any
    /// execution.
    pub fn from_bytes(bytes: &[u8]) -> Result<Regex> {
        let raw = serialize::read(bytes)?;
        let mut re = Regex::builder()
            .flags(raw.flags)
            .build(&raw.pattern)
            .map_err(|_| Error::bytecode("embedded pattern does not recompile"))?;
        if re.group_count() != raw.group_count {
            return Err(Error::bytecode("artifact group count does not match its pattern"));
        }
        let Engine::Program(recompiled) = &re.engine else {
            return Err(Error::bytecode(
                "artifact pattern requires the automaton engine",
            ));
        };
        let program = Program::new(
            raw.insts,
            recompiled.classes().to_vec(),
            raw.group_count,
            raw.flags,
            raw.pattern,
        )?;
        re.engine = Engine::Program(program);
        Ok(re)
    }
}

impl Clone for Regex {
    fn clone(&self) -> Regex {
        Regex {
            pattern: self.pattern.clone(),
            flags: self.flags,
            config: self.config.clone(),
            engine: match &self.engine {
                Engine::Program(p) => Engine::Program(p.clone()),
                Engine::Automaton(a) => Engine::Automaton(a.clone()),
            },
            dfa: self.dfa.clone(),
            stats: self.stats,
            names: Arc::clone(&self.names),
            complexity: self.complexity,
            id: self.id,
            registry: Arc::clone(&self.registry),
            strategies: Arc::clone(&self.strategies),
            #[cfg(feature = "perf-literal")]
            prefilter: self.prefilter.clone(),
            // A fresh pool per clone keeps per-thread clones contention
            // free.
            pool: Pool::new(Cache::new),
        }
    }
}

impl std::fmt::Debug for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regex")
            .field("pattern", &self.pattern)
            .field("flags", &self.flags)
            .field("engine", &self.engine_kind())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// Compiles `pattern` without retaining the artifact: succeeds exactly
/// when [`Regex::builder`] would.
pub fn validate(pattern: &str, flags: Flags, config: &Config) -> Result<()> {
    Regex::builder()
        .flags(flags)
        .config(config.clone())
        .build(pattern)
        .map(|_| ())
}

/// Iterator over non-overlapping matches.
pub struct FindIter<'r, 'h> {
    matcher: Matcher<'r, 'h>,
    from: usize,
    done: bool,
}

impl<'h> Iterator for FindIter<'_, 'h> {
    type Item = Match<'h>;

    fn next(&mut self) -> Option<Match<'h>> {
        if self.done {
            return None;
        }
        match self.matcher.find_next(self.from) {
            Ok(Some(m)) => {
                self.from = self.matcher.position();
                Some(m)
            }
            Ok(None) | Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

impl FindIter<'_, '_> {
    /// The error that stopped iteration early, if one did.
    pub fn last_error(&self) -> Option<&Error> {
        self.matcher.last_error()
    }
}

/// Iterator over the capture tables of non-overlapping matches.
pub struct CapturesIter<'r, 'h> {
    matcher: Matcher<'r, 'h>,
    from: usize,
    done: bool,
}

impl Iterator for CapturesIter<'_, '_> {
    type Item = Captures;

    fn next(&mut self) -> Option<Captures> {
        if self.done {
            return None;
        }
        match self.matcher.find_captures(self.from) {
            Ok(Some(caps)) => {
                self.from = self.matcher.position();
                Some(caps)
            }
            Ok(None) | Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// Candidate-position filter for the scan loop, derived from literal
/// prefixes of the pattern. Purely an accelerator: it only skips
/// positions where no match can start.
#[cfg(feature = "perf-literal")]
#[derive(Clone)]
enum Prefilter {
    None,
    /// The pattern always starts with this byte.
    Byte(u8),
    /// The pattern starts with one of several literal prefixes.
    Literals(aho_corasick::AhoCorasick),
}

#[cfg(feature = "perf-literal")]
impl Prefilter {
    fn from_ast(ast: &Ast) -> Prefilter {
        let Some(prefixes) = literal_prefixes(ast) else {
            return Prefilter::None;
        };
        if prefixes.len() == 1 {
            return Prefilter::Byte(prefixes[0].as_bytes()[0]);
        }
        match aho_corasick::AhoCorasick::new(&prefixes) {
            Ok(ac) => Prefilter::Literals(ac),
            Err(_) => Prefilter::None,
        }
    }

    fn find(&self, bytes: &[u8], at: usize) -> Option<usize> {
        match self {
            Prefilter::None => Some(at),
            Prefilter::Byte(b) => memchr::memchr(*b, &bytes[at..]).map(|i| at + i),
            Prefilter::Literals(ac) => ac.find(&bytes[at..]).map(|m| at + m.start()),
        }
    }
}

/// One literal prefix per top-level alternative, when every alternative
/// has one.
#[cfg(feature = "perf-literal")]
fn literal_prefixes(ast: &Ast) -> Option<Vec<String>> {
    const MAX_BRANCHES: usize = 16;
    const MAX_PREFIX: usize = 8;

    /// Appends the leading literal run of `ast`; true when the whole node
    /// was literal, so a caller may keep extending past it.
    fn prefix_of(ast: &Ast, out: &mut String) -> bool {
        match ast {
            Ast::Empty => true,
            Ast::Literal(c) => {
                if out.len() >= MAX_PREFIX {
                    return false;
                }
                out.push(*c);
                true
            }
            Ast::Concat(children) => children.iter().all(|child| prefix_of(child, out)),
            Ast::Group(group) => match group.kind {
                GroupKind::Capturing { .. } | GroupKind::NonCapturing => {
                    prefix_of(&group.ast, out)
                }
                _ => false,
            },
            _ => false,
        }
    }

    let branches: Vec<&Ast> = match ast {
        Ast::Alternate(alts) => alts.iter().collect(),
        other => vec![other],
    };
    if branches.len() > MAX_BRANCHES {
        return None;
    }
    let mut prefixes = Vec::with_capacity(branches.len());
    for branch in branches {
        let mut prefix = String::new();
        prefix_of(branch, &mut prefix);
        if prefix.is_empty() {
            return None;
        }
        prefixes.push(prefix);
    }
    Some(prefixes)
}

#[cfg(not(feature = "perf-literal"))]
impl Regex {
    pub(crate) fn prefilter_find(&self, _bytes: &[u8], at: usize) -> Option<usize> {
        Some(at)
    }
}

#[cfg(feature = "perf-literal")]
impl Regex {
    pub(crate) fn prefilter_find(&self, bytes: &[u8], at: usize) -> Option<usize> {
        if at > bytes.len() {
            return None;
        }
        self.prefilter.find(bytes, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_succeeds_iff_validate_succeeds() {
        let config = Config::default();
        for pattern in ["a(b|c)*", "(?<x>a)\\k<x>", "(?<=a)b", "x{2,600}", "(a", "*a"] {
            let compiled = Regex::builder()
                .config(config.clone())
                .build(pattern)
                .is_ok();
            let validated = validate(pattern, Flags::empty(), &config).is_ok();
            assert_eq!(compiled, validated, "on {pattern:?}");
        }
    }

    #[test]
    fn engine_routing() {
        assert_eq!(Regex::new("a(b|c)*").unwrap().engine_kind(), EngineKind::Bytecode);
        assert_eq!(Regex::new(r"(a)\1").unwrap().engine_kind(), EngineKind::Bytecode);
        assert_eq!(Regex::new(r"a(?=b)").unwrap().engine_kind(), EngineKind::Bytecode);
        assert_eq!(Regex::new(r"(?<=a)b").unwrap().engine_kind(), EngineKind::Automaton);
        assert_eq!(Regex::new(r"(?>ab)c").unwrap().engine_kind(), EngineKind::Automaton);
    }

    #[test]
    fn dfa_built_for_plain_patterns() {
        assert!(Regex::new("a(b|c)*d").unwrap().has_dfa());
        assert!(!Regex::new(r"^a").unwrap().has_dfa());
        let re = Regex::builder()
            .config(Config::builder().use_dfa_when_possible(false).build())
            .build("a(b|c)*d")
            .unwrap();
        assert!(!re.has_dfa());
        // The size objective trades the accelerator away.
        let re = Regex::builder()
            .flags(Flags::OPTIMIZE_SIZE)
            .build("a(b|c)*d")
            .unwrap();
        assert!(!re.has_dfa());
    }

    #[test]
    fn group_count_matches_ast() {
        let re = Regex::new("(a)(?:b)(?<x>c)(?=d)").unwrap();
        assert_eq!(re.group_count(), 2);
    }

    #[test]
    fn convenience_api() {
        let re = Regex::new(r"\d+").unwrap();
        assert!(re.is_match("abc 123"));
        assert!(!re.is_match("abc"));
        let m = re.find("abc 123 456").unwrap().unwrap();
        assert_eq!(m.range(), 4..7);
        let all: Vec<_> = re.find_iter("abc 123 456").map(|m| m.range()).collect();
        assert_eq!(all, vec![4..7, 8..11]);
        let (out, n) = re.replace_all("a1b22c", "#").unwrap();
        assert_eq!((out.as_str(), n), ("a#b#c", 2));
    }

    #[test]
    fn matches_is_full_match() {
        let re = Regex::new("ab+").unwrap();
        assert!(re.matches("abbb").unwrap().is_some());
        assert!(re.matches("abbbc").unwrap().is_none());
        assert!(re.matches("xab").unwrap().is_none());
    }

    #[test]
    fn leftmost_semantics() {
        let re = Regex::new("a|ab").unwrap();
        // Leftmost wins; among leftmost, the preferred alternative.
        let m = re.find("xxab").unwrap().unwrap();
        assert_eq!(m.range(), 2..3);
    }

    #[test]
    fn serialization_roundtrip() {
        let re = Regex::new(r"(\w+)=(\d+);").unwrap();
        let bytes = re.to_bytes().unwrap();
        let loaded = Regex::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.pattern(), re.pattern());
        assert_eq!(loaded.flags(), re.flags());
        assert_eq!(loaded.group_count(), re.group_count());
        let caps = loaded.captures("k=42;").unwrap().unwrap();
        assert_eq!(caps.get(1), Some(0..1));
        assert_eq!(caps.get(2), Some(2..4));
    }

    #[test]
    fn serialization_unsupported_for_automaton_patterns() {
        let re = Regex::new(r"(?<=a)b").unwrap();
        let err = re.to_bytes().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn tampered_artifact_is_rejected() {
        let re = Regex::new(r"(a)(b)").unwrap();
        let mut bytes = re.to_bytes().unwrap();
        // Point a save instruction at a group beyond the group count.
        let insts_start = 28;
        for pc in 0.. {
            let at = insts_start + pc * 8;
            if at >= bytes.len() {
                break;
            }
            if bytes[at] == 6 {
                bytes[at + 4] = 9;
                break;
            }
        }
        let err = Regex::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidBytecode);
    }

    #[test]
    fn raw_literal_patterns_get_scaled_limits() {
        let re = Regex::builder()
            .flags(Flags::RAW_LITERAL)
            .build(r"r'\d{3}-\d{2}'")
            .unwrap();
        let effective = re.limit_registry().effective(Some(re.id()), None);
        let global = re.limit_registry().effective(None, None);
        if re.complexity() > 1.5 {
            assert!(effective.max_transitions <= 150_000);
            assert_ne!(effective, global);
        }
    }

    #[test]
    fn complexity_is_deterministic() {
        let a = Regex::new("(a+|b)*c{2,5}").unwrap();
        let b = Regex::new("(a+|b)*c{2,5}").unwrap();
        assert_eq!(a.complexity(), b.complexity());
        assert!(a.complexity() > 0.0);
    }

    #[test]
    fn clone_shares_compiled_form() {
        let re = Regex::new("a+").unwrap();
        let clone = re.clone();
        assert_eq!(clone.pattern(), re.pattern());
        assert!(clone.is_match("aaa"));
    }

    #[cfg(feature = "perf-literal")]
    #[test]
    fn prefilters() {
        let re = Regex::new("needle").unwrap();
        let hay = format!("{}needle", "x".repeat(1000));
        assert_eq!(re.find(&hay).unwrap().unwrap().start(), 1000);

        // Alternation of literal prefixes uses the multi-literal filter.
        let re = Regex::new("alpha|beta|gamma").unwrap();
        let m = re.find("xx gamma").unwrap().unwrap();
        assert_eq!(m.as_str(), "gamma");

        // No prefilter for patterns without a literal head.
        let re = Regex::new(r"\d+x").unwrap();
        assert_eq!(re.find("ab 12x").unwrap().unwrap().as_str(), "12x");
    }

    #[test]
    fn empty_pattern_matches_everywhere() {
        let re = Regex::new("").unwrap();
        let m = re.find("abc").unwrap().unwrap();
        assert_eq!(m.range(), 0..0);
        assert!(re.matches("").unwrap().is_some());
        let m = re.find_at("abc", 2).unwrap().unwrap();
        assert_eq!(m.range(), 2..2);
    }

    #[test]
    fn dot_star_on_empty_input() {
        let re = Regex::new(".*").unwrap();
        let m = re.find("").unwrap().unwrap();
        assert_eq!(m.range(), 0..0);
    }
}
