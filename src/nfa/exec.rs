/*!
Bounded-backtracking execution over the automaton, and the DFA runners.

The backtracker keeps an explicit job stack. A `Trans` job resumes a state
at a given transition index; capture writes push `RestoreSlot` jobs so that
unwinding a failed path also unwinds its saves. Visited `(state, position)`
pairs are pruned, which bounds one scan to `O(states × input)` total work
even before the policy limits kick in.

Look-around and atomic-group predicates run their sub-automaton through a
nested executor sharing the same counters, so every limit covers the whole
attempt.
*/

use std::collections::HashSet;

use crate::{
    error::{Error, Result},
    limits::{BacktrackState, BailoutAction, EffectiveLimits, StrategyManager},
    nfa::{Automaton, Label, Predicate, StateId},
    syntax::ast::Anchor,
    util::utf8,
};

/// How many steps pass between wall-clock samples. Small enough that the
/// observed timeout stays within a small multiple of the configured one.
pub(crate) const CLOCK_SAMPLE_PERIOD: u64 = 64;

/// Cap on the bitmap representation of the visited set; larger
/// state×input products fall back to a hash set.
const MAX_VISITED_BITS: usize = 1 << 25;

enum Visited {
    Bits { words: Vec<u64>, stride: usize },
    Set(HashSet<(u32, usize)>),
}

impl Visited {
    /// Marks `(state, at)`; false if it was already marked.
    fn insert(&mut self, state: u32, at: usize) -> bool {
        match self {
            Visited::Bits { words, stride } => {
                let key = state as usize * *stride + at;
                let (word, bit) = (key / 64, 1u64 << (key % 64));
                if words[word] & bit != 0 {
                    false
                } else {
                    words[word] |= bit;
                    true
                }
            }
            Visited::Set(set) => set.insert((state, at)),
        }
    }
}

enum Job {
    /// Resume `state` at input offset `at`, starting from transition
    /// `tidx`.
    Trans { state: StateId, at: usize, tidx: u32 },
    /// Undo a capture-slot write from a failed path.
    RestoreSlot { slot: u32, old: Option<usize> },
    /// Undo every slot at once (pushed after a successful look-around or
    /// atomic sub-match).
    RestoreCaps { snapshot: Box<[Option<usize>]> },
}

/// Reusable scratch for the automaton backtracker.
pub(crate) struct NfaCache {
    jobs: Vec<Job>,
    visited: Visited,
}

impl NfaCache {
    pub(crate) fn new() -> NfaCache {
        NfaCache {
            jobs: Vec::new(),
            visited: Visited::Set(HashSet::new()),
        }
    }

    /// Prepares the cache for one scan over `input_len` bytes. The visited
    /// set is keyed by `(state, position)` and so is shared by every
    /// attempt of the scan.
    pub(crate) fn reset(&mut self, state_count: usize, input_len: usize) {
        self.jobs.clear();
        let stride = input_len + 1;
        match state_count.checked_mul(stride) {
            Some(bits) if bits <= MAX_VISITED_BITS => {
                let len = bits / 64 + 1;
                match &mut self.visited {
                    Visited::Bits { words, stride: s } => {
                        words.clear();
                        words.resize(len, 0);
                        *s = stride;
                    }
                    visited => {
                        *visited = Visited::Bits {
                            words: vec![0; len],
                            stride,
                        }
                    }
                }
            }
            _ => match &mut self.visited {
                Visited::Set(set) => set.clear(),
                visited => *visited = Visited::Set(HashSet::new()),
            },
        }
    }

    fn for_sub(state_count: usize, input_len: usize) -> NfaCache {
        let mut cache = NfaCache::new();
        cache.reset(state_count, input_len);
        cache
    }
}

/// One configured execution of an automaton over one haystack.
pub(crate) struct AutomatonExec<'a> {
    pub(crate) aut: &'a Automaton,
    pub(crate) bytes: &'a [u8],
    pub(crate) limits: &'a EffectiveLimits,
    pub(crate) strategies: &'a StrategyManager,
}

impl AutomatonExec<'_> {
    /// Runs one anchored attempt from `start`. With `require_end`, only an
    /// accept at exactly that offset counts. Returns the match end on
    /// success; resource faults surface as `limit-exceeded` / `timeout`
    /// errors.
    pub(crate) fn exec(
        &self,
        cache: &mut NfaCache,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        start: usize,
        require_end: Option<usize>,
    ) -> Result<Option<usize>> {
        cache.jobs.clear();
        self.push_job(
            cache,
            bstate,
            Job::Trans {
                state: self.aut.start,
                at: start,
                tidx: 0,
            },
        )?;
        while let Some(job) = cache.jobs.pop() {
            bstate.depth = cache.jobs.len();
            match job {
                Job::RestoreSlot { slot, old } => caps[slot as usize] = old,
                Job::RestoreCaps { snapshot } => caps.copy_from_slice(&snapshot),
                Job::Trans { state, at, tidx } => {
                    if tidx > 0 {
                        bstate.note_backtrack(at);
                        if let Some(action) = self.strategies.evaluate(bstate) {
                            match action {
                                // No DFA subset exists on the automaton
                                // path (predicates block determinization).
                                BailoutAction::Abort | BailoutAction::SwitchToDfa => {
                                    return Err(Error::limit("match aborted by bailout strategy"));
                                }
                                BailoutAction::PruneWeakest => prune_weakest(&mut cache.jobs),
                            }
                        }
                    }
                    if let Some(end) =
                        self.step(cache, bstate, caps, state, at, tidx, require_end)?
                    {
                        return Ok(Some(end));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Follows one path inline until it matches, dies, or forks everything
    /// else onto the job stack.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        cache: &mut NfaCache,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        mut sid: StateId,
        mut at: usize,
        mut tidx: u32,
        require_end: Option<usize>,
    ) -> Result<Option<usize>> {
        loop {
            self.count_step(bstate)?;
            if tidx == 0 {
                let state = self.aut.state(sid);
                if state.accept && require_end.map_or(true, |end| at == end) {
                    return Ok(Some(at));
                }
                if !cache.visited.insert(sid.0, at) {
                    return Ok(None);
                }
            }
            let state = self.aut.state(sid);
            let Some(transition) = state.transitions.get(tidx as usize) else {
                return Ok(None);
            };
            if (tidx as usize) + 1 < state.transitions.len() {
                self.push_job(
                    cache,
                    bstate,
                    Job::Trans {
                        state: sid,
                        at,
                        tidx: tidx + 1,
                    },
                )?;
            }
            match &transition.label {
                Label::Epsilon => {
                    sid = transition.to;
                    tidx = 0;
                }
                Label::Save { slot } => {
                    let index = *slot as usize;
                    if index < caps.len() {
                        self.push_job(
                            cache,
                            bstate,
                            Job::RestoreSlot {
                                slot: *slot,
                                old: caps[index],
                            },
                        )?;
                        caps[index] = Some(at);
                    }
                    sid = transition.to;
                    tidx = 0;
                }
                Label::Class(class) => match utf8::decode(self.bytes, at) {
                    Some((c, width)) if class.contains(c) => {
                        at += width;
                        sid = transition.to;
                        tidx = 0;
                    }
                    _ => return Ok(None),
                },
                Label::Assert(predicate) => {
                    match self.eval_predicate(cache, bstate, caps, predicate, at)? {
                        Some(next_at) => {
                            at = next_at;
                            sid = transition.to;
                            tidx = 0;
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Evaluates a zero-width (or, for atomic groups, possessive)
    /// predicate at `at`. Returns the position execution continues from.
    fn eval_predicate(
        &self,
        cache: &mut NfaCache,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        predicate: &Predicate,
        at: usize,
    ) -> Result<Option<usize>> {
        match predicate {
            Predicate::Anchor(anchor) => Ok(self.check_anchor(*anchor, at).then_some(at)),
            Predicate::Look {
                sub,
                negated,
                behind,
                width,
            } => {
                let snapshot: Box<[Option<usize>]> = caps.to_vec().into_boxed_slice();
                let matched = match behind {
                    false => self.run_sub(*sub, bstate, caps, at, None)?.is_some(),
                    true => match at.checked_sub(*width) {
                        Some(begin) => self.run_sub(*sub, bstate, caps, begin, Some(at))?.is_some(),
                        None => false,
                    },
                };
                if matched != *negated {
                    if matched {
                        // Keep the body's captures, but let later
                        // backtracking unwind them in one go.
                        self.push_job(cache, bstate, Job::RestoreCaps { snapshot })?;
                    }
                    Ok(Some(at))
                } else {
                    if matched {
                        caps.copy_from_slice(&snapshot);
                    }
                    Ok(None)
                }
            }
            Predicate::Atomic { sub } => {
                let snapshot: Box<[Option<usize>]> = caps.to_vec().into_boxed_slice();
                match self.run_sub(*sub, bstate, caps, at, None)? {
                    Some(end) => {
                        self.push_job(cache, bstate, Job::RestoreCaps { snapshot })?;
                        Ok(Some(end))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Runs a sub-automaton anchored at `start`, sharing the attempt's
    /// counters. A failed run unwinds its own capture writes.
    fn run_sub(
        &self,
        sub: u32,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        start: usize,
        require_end: Option<usize>,
    ) -> Result<Option<usize>> {
        let sub_aut = &self.aut.subs[sub as usize];
        let child = AutomatonExec {
            aut: sub_aut,
            bytes: self.bytes,
            limits: self.limits,
            strategies: self.strategies,
        };
        let depth_before = bstate.depth;
        let mut child_cache = NfaCache::for_sub(sub_aut.state_count(), self.bytes.len());
        let result = child.exec(&mut child_cache, bstate, caps, start, require_end);
        bstate.depth = depth_before;
        result
    }

    fn check_anchor(&self, anchor: Anchor, at: usize) -> bool {
        let bytes = self.bytes;
        let mode = self.aut.flags().newline_mode();
        match anchor {
            Anchor::TextStart => at == 0,
            Anchor::TextEnd => at == bytes.len(),
            Anchor::LineStart => mode.is_line_start(bytes, at),
            Anchor::LineEnd => mode.is_line_end(bytes, at),
            Anchor::WordBoundary | Anchor::NotWordBoundary => {
                let before = utf8::decode_back(bytes, at)
                    .map(|(c, _)| utf8::is_word_char(c))
                    .unwrap_or(false);
                let after = utf8::decode(bytes, at)
                    .map(|(c, _)| utf8::is_word_char(c))
                    .unwrap_or(false);
                (before != after) == (anchor == Anchor::WordBoundary)
            }
            // `\K` lowers to a group-0 save, never to a predicate.
            Anchor::Keep => true,
        }
    }

    fn push_job(&self, cache: &mut NfaCache, bstate: &mut BacktrackState, job: Job) -> Result<()> {
        if cache.jobs.len() >= self.limits.max_depth {
            return Err(Error::limit("backtracking depth limit reached"));
        }
        cache.jobs.push(job);
        bstate.depth = cache.jobs.len();
        Ok(())
    }

    fn count_step(&self, bstate: &mut BacktrackState) -> Result<()> {
        bstate.transitions += 1;
        if bstate.transitions > self.limits.max_transitions {
            return Err(Error::limit("transition budget exhausted"));
        }
        if bstate.transitions % CLOCK_SAMPLE_PERIOD == 0
            && bstate.started_at.elapsed() >= self.limits.max_duration
        {
            return Err(Error::timeout("match attempt exceeded its time budget"));
        }
        Ok(())
    }
}

/// Drops the oldest pending alternative, the least preferred branch on the
/// stack.
fn prune_weakest(jobs: &mut Vec<Job>) {
    if let Some(pos) = jobs.iter().position(|j| matches!(j, Job::Trans { .. })) {
        jobs.remove(pos);
    }
}

/// Walks a DFA from `start` and reports the last accepting offset reached.
pub(crate) fn dfa_longest_end(dfa: &Automaton, bytes: &[u8], start: usize) -> Option<usize> {
    let mut sid = dfa.start;
    let mut at = start;
    let mut last = dfa.state(sid).accept.then_some(at);
    while let Some((c, width)) = utf8::decode(bytes, at) {
        let Some(next) = dfa_move(dfa, sid, c) else {
            break;
        };
        sid = next;
        at += width;
        if dfa.state(sid).accept {
            last = Some(at);
        }
    }
    last
}

/// True if the DFA accepts exactly the window `start..end`.
pub(crate) fn dfa_accepts_window(dfa: &Automaton, bytes: &[u8], start: usize, end: usize) -> bool {
    let mut sid = dfa.start;
    let mut at = start;
    while at < end {
        let Some((c, width)) = utf8::decode(bytes, at) else {
            return false;
        };
        if at + width > end {
            return false;
        }
        let Some(next) = dfa_move(dfa, sid, c) else {
            return false;
        };
        sid = next;
        at += width;
    }
    dfa.state(sid).accept
}

#[inline]
fn dfa_move(dfa: &Automaton, sid: StateId, c: char) -> Option<StateId> {
    dfa.state(sid).transitions.iter().find_map(|t| match &t.label {
        Label::Class(class) if class.contains(c) => Some(t.to),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{limits::LimitConfig, nfa, syntax::parse, Config, Flags};
    use std::time::Duration;

    fn exec_one(
        pattern: &str,
        input: &str,
        start: usize,
        require_end: Option<usize>,
    ) -> Result<Option<usize>> {
        exec_with_limits(pattern, input, start, require_end, generous())
    }

    fn generous() -> EffectiveLimits {
        LimitConfig::global_defaults(&Config::default()).into()
    }

    fn exec_with_limits(
        pattern: &str,
        input: &str,
        start: usize,
        require_end: Option<usize>,
        limits: EffectiveLimits,
    ) -> Result<Option<usize>> {
        let config = Config::default();
        let parsed = parse(pattern, Flags::empty(), &config).unwrap();
        let aut = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        let strategies = StrategyManager::default();
        let exec = AutomatonExec {
            aut: &aut,
            bytes: input.as_bytes(),
            limits: &limits,
            strategies: &strategies,
        };
        let mut cache = NfaCache::new();
        cache.reset(aut.state_count(), input.len());
        let mut bstate = BacktrackState::new(input.len(), start);
        let mut caps = vec![None; 2 * (parsed.stats.capture_count as usize + 1)];
        caps[0] = Some(start);
        exec.exec(&mut cache, &mut bstate, &mut caps, start, require_end)
    }

    fn caps_of(pattern: &str, input: &str) -> Vec<Option<usize>> {
        let config = Config::default();
        let parsed = parse(pattern, Flags::empty(), &config).unwrap();
        let aut = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        let strategies = StrategyManager::default();
        let limits = generous();
        let exec = AutomatonExec {
            aut: &aut,
            bytes: input.as_bytes(),
            limits: &limits,
            strategies: &strategies,
        };
        let mut cache = NfaCache::new();
        cache.reset(aut.state_count(), input.len());
        let mut bstate = BacktrackState::new(input.len(), 0);
        let mut caps = vec![None; 2 * (parsed.stats.capture_count as usize + 1)];
        caps[0] = Some(0);
        let end = exec
            .exec(&mut cache, &mut bstate, &mut caps, 0, None)
            .unwrap()
            .expect("pattern should match");
        caps[1] = Some(end);
        caps
    }

    #[test]
    fn greedy_takes_longest() {
        assert_eq!(exec_one("a*", "aaab", 0, None).unwrap(), Some(3));
        assert_eq!(exec_one("a*?", "aaab", 0, None).unwrap(), Some(0));
        assert_eq!(exec_one("a*?b", "aaab", 0, None).unwrap(), Some(4));
    }

    #[test]
    fn alternation_prefers_leftmost() {
        assert_eq!(exec_one("a|ab", "ab", 0, None).unwrap(), Some(1));
        assert_eq!(exec_one("ab|a", "ab", 0, None).unwrap(), Some(2));
    }

    #[test]
    fn require_end_forces_full_window() {
        assert_eq!(exec_one("a|ab", "ab", 0, Some(2)).unwrap(), Some(2));
        assert_eq!(exec_one("a", "ab", 0, Some(2)).unwrap(), None);
    }

    #[test]
    fn captures_unwind_on_backtrack() {
        // The first alternative writes group 1 before failing; the match
        // must come out of the second with group 1 unset.
        let caps = caps_of("(a)x|ab", "ab");
        assert_eq!(caps[2], None);
        assert_eq!(caps[3], None);
        assert_eq!(caps[1], Some(2));
    }

    #[test]
    fn repeated_group_keeps_last_iteration() {
        let caps = caps_of("(ab)+", "ababab");
        assert_eq!(caps[1], Some(6));
        assert_eq!(caps[2], Some(4));
        assert_eq!(caps[3], Some(6));
    }

    #[test]
    fn keep_resets_match_start() {
        let caps = caps_of(r"ab\Kcd", "abcd");
        assert_eq!(caps[0], Some(2));
        assert_eq!(caps[1], Some(4));
    }

    #[test]
    fn lookahead() {
        assert_eq!(exec_one("a(?=b)", "ab", 0, None).unwrap(), Some(1));
        assert_eq!(exec_one("a(?=b)", "ac", 0, None).unwrap(), None);
        assert_eq!(exec_one("a(?!b)", "ac", 0, None).unwrap(), Some(1));
        assert_eq!(exec_one("a(?!b)", "ab", 0, None).unwrap(), None);
    }

    #[test]
    fn lookbehind() {
        assert_eq!(exec_one("(?<=a)b", "ab", 1, None).unwrap(), Some(2));
        assert_eq!(exec_one("(?<=x)b", "ab", 1, None).unwrap(), None);
        assert_eq!(exec_one("(?<!x)b", "ab", 1, None).unwrap(), Some(2));
        // At offset zero there is nothing behind; a positive look-behind
        // fails and its negation holds.
        assert_eq!(exec_one("(?<=a)b", "b", 0, None).unwrap(), None);
        assert_eq!(exec_one("(?<!a)b", "b", 0, None).unwrap(), Some(1));
    }

    #[test]
    fn atomic_group_is_possessive() {
        // (?>a|ab)c: the atomic group commits to "a", so "abc" only
        // matches where a backtracking group would also have chosen "ab".
        assert_eq!(exec_one("(?>a|ab)c", "ac", 0, None).unwrap(), Some(2));
        assert_eq!(exec_one("(?>a|ab)c", "abc", 0, None).unwrap(), None);
        assert_eq!(exec_one("(a|ab)c", "abc", 0, None).unwrap(), Some(3));

        // (?>a+)a can never match: the atomic group swallows every "a".
        assert_eq!(exec_one("(?>a+)a", "aaaa", 0, None).unwrap(), None);
        assert_eq!(exec_one("(a+)a", "aaaa", 0, None).unwrap(), Some(4));
    }

    #[test]
    fn anchors() {
        assert_eq!(exec_one(r"\Aab\z", "ab", 0, None).unwrap(), Some(2));
        assert_eq!(exec_one(r"\bword\b", "word", 0, None).unwrap(), Some(4));
        assert_eq!(exec_one(r"\Bord\b", "word", 1, None).unwrap(), Some(4));
    }

    #[test]
    fn transition_limit_aborts() {
        let mut limits = generous();
        limits.max_transitions = 50;
        let err = exec_with_limits("(a*)*c", &"a".repeat(30), 0, None, limits).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LimitExceeded);
    }

    #[test]
    fn depth_limit_aborts() {
        let mut limits = generous();
        limits.max_depth = 4;
        let err = exec_with_limits("(a|b|c|d|e)(a|b|c|d|e)x", "aa", 0, None, limits).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LimitExceeded);
    }

    #[test]
    fn timeout_fires() {
        let mut limits = generous();
        limits.max_duration = Duration::ZERO;
        // Needs more than one clock-sample period of work to notice.
        let err = exec_with_limits("(a*)*(b*)*c", &"ab".repeat(40), 0, None, limits).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Timeout);
    }

    #[test]
    fn dfa_runners() {
        let config = Config::default();
        let parsed = parse("ab*c", Flags::empty(), &config).unwrap();
        let aut = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        let dfa = nfa::determinize(&aut, &config).unwrap();
        assert_eq!(dfa_longest_end(&dfa, b"abbbcx", 0), Some(5));
        assert_eq!(dfa_longest_end(&dfa, b"x", 0), None);
        assert!(dfa_accepts_window(&dfa, b"abbc", 0, 4));
        assert!(!dfa_accepts_window(&dfa, b"abbcx", 0, 5));
    }
}
