/*!
The matcher runtime: per-invocation state, the scan loop, and the public
match operations.

A [`Matcher`] borrows a compiled [`Regex`](crate::Regex) and a haystack,
owns the capture table for the current attempt, and walks the
`Ready → Bound → Running → {Accepted, Failed, Aborted}` state machine as
operations run. Resource faults (`limit-exceeded`, `timeout`) abort the
whole invocation and leave the matcher in `Aborted` with the error
recorded.
*/

use std::{ops::Range, sync::Arc};

use crate::{
    error::{Error, Result},
    flags::Flags,
    limits::{BacktrackState, EffectiveLimits, LimitConfig},
    nfa::AutomatonExec,
    regex::{Engine, Regex},
    util::utf8,
    vm::{VmCache, VmExec},
};

pub(crate) use crate::nfa::NfaCache;

/// A successful match: its span plus the haystack it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match<'h> {
    haystack: &'h str,
    start: usize,
    end: usize,
}

impl<'h> Match<'h> {
    pub(crate) fn new(haystack: &'h str, start: usize, end: usize) -> Match<'h> {
        Match { haystack, start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The matched text.
    pub fn as_str(&self) -> &'h str {
        &self.haystack[self.start..self.end]
    }
}

/// The capture table of one successful match: group 0 is the whole match,
/// groups 1… are the pattern's capturing groups in opening-paren order.
#[derive(Clone, Debug)]
pub struct Captures {
    slots: Box<[Option<usize>]>,
    names: Arc<[(String, u32)]>,
    group_count: u32,
}

impl Captures {
    pub(crate) fn new(
        slots: Box<[Option<usize>]>,
        names: Arc<[(String, u32)]>,
        group_count: u32,
    ) -> Captures {
        Captures { slots, names, group_count }
    }

    /// Number of capturing groups, not counting group 0.
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    /// The span of group `index`; `None` when the group did not
    /// participate in the match.
    pub fn get(&self, index: usize) -> Option<Range<usize>> {
        let start = *self.slots.get(2 * index)?;
        let end = *self.slots.get(2 * index + 1)?;
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Some(start..end),
            _ => None,
        }
    }

    /// The span of the named group.
    pub fn name(&self, name: &str) -> Option<Range<usize>> {
        let &(_, index) = self.names.iter().find(|(n, _)| n == name)?;
        self.get(index as usize)
    }

    /// Spans of groups `0..=group_count` in order.
    pub fn iter(&self) -> impl Iterator<Item = Option<Range<usize>>> + '_ {
        (0..=self.group_count as usize).map(|i| self.get(i))
    }
}

/// Where a matcher is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchState {
    /// No input bound yet.
    Ready,
    /// Input bound, no attempt made since.
    Bound,
    /// An operation is executing.
    Running,
    Accepted,
    Failed,
    /// The last operation hit a resource bound.
    Aborted,
}

/// Reusable per-worker scratch; pooled by the regex and the thread-safe
/// context.
pub struct Cache {
    pub(crate) vm: VmCache,
    pub(crate) nfa: NfaCache,
}

impl Cache {
    pub(crate) fn new() -> Cache {
        Cache {
            vm: VmCache::new(),
            nfa: NfaCache::new(),
        }
    }
}

/// A single-threaded matching context over one haystack.
pub struct Matcher<'r, 'h> {
    re: &'r Regex,
    cache: crate::util::pool::PoolGuard<'r, Cache>,
    input: Option<&'h str>,
    pos: usize,
    state: MatchState,
    caps: Box<[Option<usize>]>,
    last_error: Option<Error>,
    match_id: Option<u64>,
}

impl<'r, 'h> Matcher<'r, 'h> {
    pub(crate) fn new(
        re: &'r Regex,
        cache: crate::util::pool::PoolGuard<'r, Cache>,
    ) -> Matcher<'r, 'h> {
        Matcher {
            re,
            cache,
            input: None,
            pos: 0,
            state: MatchState::Ready,
            caps: vec![None; re.slot_count()].into_boxed_slice(),
            last_error: None,
            match_id: None,
        }
    }

    /// Binds (or rebinds) the haystack; position and captures reset.
    pub fn set_input(&mut self, haystack: &'h str) {
        self.input = Some(haystack);
        self.pos = 0;
        self.caps.fill(None);
        self.last_error = None;
        self.state = MatchState::Bound;
    }

    /// Back to `Bound` with the same input.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.caps.fill(None);
        self.last_error = None;
        if self.input.is_some() {
            self.state = MatchState::Bound;
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    /// The error that aborted the last operation, if one did.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Installs match-scope limits for this matcher's attempts.
    pub fn set_limits(&mut self, config: LimitConfig) {
        let id = self
            .match_id
            .get_or_insert_with(crate::regex::next_match_id);
        self.re.registry().register_match(*id, config);
    }

    fn haystack(&self) -> Result<&'h str> {
        self.input
            .ok_or_else(|| Error::invalid_parameter("matcher has no input bound"))
    }

    fn effective_limits(&self) -> EffectiveLimits {
        self.re.registry().effective(Some(self.re.id()), self.match_id)
    }

    fn fail(&mut self, error: Error) -> Error {
        self.state = MatchState::Aborted;
        self.last_error = Some(error.clone());
        error
    }

    /// The captures of the most recent successful operation.
    pub fn captures(&self) -> Option<Captures> {
        if self.state != MatchState::Accepted {
            return None;
        }
        Some(Captures::new(
            self.caps.clone(),
            self.re.names(),
            self.re.group_count(),
        ))
    }

    /// One anchored attempt at `at`, engine-dispatched. Fills the capture
    /// table on success.
    fn attempt(
        &mut self,
        bstate: &mut BacktrackState,
        limits: &EffectiveLimits,
        at: usize,
        require_end: Option<usize>,
    ) -> Result<Option<usize>> {
        let bytes = self.haystack()?.as_bytes();
        self.caps.fill(None);
        self.caps[0] = Some(at);
        let end = match self.re.engine() {
            Engine::Program(prog) => VmExec {
                prog,
                bytes,
                limits,
                strategies: self.re.strategies(),
                dfa: self.re.dfa(),
            }
            .backtrack(&mut self.cache.vm, bstate, &mut self.caps, at, require_end)?,
            Engine::Automaton(automaton) => AutomatonExec {
                aut: automaton,
                bytes,
                limits,
                strategies: self.re.strategies(),
            }
            .exec(&mut self.cache.nfa, bstate, &mut self.caps, at, require_end)?,
        };
        if let Some(end) = end {
            self.caps[1] = Some(end);
        }
        Ok(end)
    }

    /// Whether the whole input matches the pattern.
    pub fn matches(&mut self) -> Result<Option<Match<'h>>> {
        let haystack = self.haystack()?;
        let bytes = haystack.as_bytes();
        self.state = MatchState::Running;
        if let Some(dfa) = self.re.dfa() {
            if !crate::nfa::dfa_accepts_window(dfa, bytes, 0, bytes.len()) {
                self.state = MatchState::Failed;
                return Ok(None);
            }
        }
        let limits = self.effective_limits();
        let mut bstate = BacktrackState::new(bytes.len(), 0);
        let end = self
            .run_anchored(&mut bstate, &limits, bytes)
            .map_err(|e| self.fail(e))?;
        match end {
            Some(end) => {
                self.state = MatchState::Accepted;
                let start = self.caps[0].unwrap_or(0);
                Ok(Some(Match::new(haystack, start, end)))
            }
            None => {
                self.state = MatchState::Failed;
                Ok(None)
            }
        }
    }

    fn run_anchored(
        &mut self,
        bstate: &mut BacktrackState,
        limits: &EffectiveLimits,
        bytes: &[u8],
    ) -> Result<Option<usize>> {
        if let Engine::Automaton(automaton) = self.re.engine() {
            self.cache.nfa.reset(automaton.state_count(), bytes.len());
        }
        if let Engine::Program(prog) = self.re.engine() {
            if !prog.needs_backtrack() {
                self.caps.fill(None);
                return VmExec {
                    prog,
                    bytes,
                    limits,
                    strategies: self.re.strategies(),
                    dfa: self.re.dfa(),
                }
                .pike(
                    &mut self.cache.vm,
                    bstate,
                    &mut self.caps,
                    0,
                    Some(bytes.len()),
                    true,
                );
            }
        }
        self.attempt(bstate, limits, 0, Some(bytes.len()))
    }

    /// The leftmost match starting at or after `from`.
    ///
    /// Advances byte-wise between attempts, or code-point-wise when the
    /// UTF-8 flag is set. The matcher's position moves past the returned
    /// match (one scan unit past it for an empty match), so repeated calls
    /// with `self.position()` iterate non-overlapping matches.
    pub fn find_next(&mut self, from: usize) -> Result<Option<Match<'h>>> {
        let haystack = self.haystack()?;
        let bytes = haystack.as_bytes();
        if from > bytes.len() {
            self.state = MatchState::Failed;
            return Ok(None);
        }
        self.state = MatchState::Running;
        let limits = self.effective_limits();
        let mut bstate = BacktrackState::new(bytes.len(), from);
        if let Engine::Automaton(automaton) = self.re.engine() {
            self.cache.nfa.reset(automaton.state_count(), bytes.len());
        }
        let mut at = from;
        loop {
            let at_candidate = match self.re.prefilter_find(bytes, at) {
                Some(candidate) => candidate,
                None => {
                    self.state = MatchState::Failed;
                    return Ok(None);
                }
            };
            at = at_candidate;
            let end = self
                .attempt(&mut bstate, &limits, at, None)
                .map_err(|e| self.fail(e))?;
            if let Some(end) = end {
                self.state = MatchState::Accepted;
                self.pos = if end > at { end } else { self.advance(bytes, end) };
                // `\K` may have moved the reported start past the attempt
                // origin.
                let start = self.caps[0].unwrap_or(at);
                return Ok(Some(Match::new(haystack, start, end)));
            }
            if at >= bytes.len() {
                self.state = MatchState::Failed;
                return Ok(None);
            }
            at = self.advance(bytes, at);
        }
    }

    /// The scan-loop step: one byte, or one code point under the UTF-8
    /// flag.
    fn advance(&self, bytes: &[u8], at: usize) -> usize {
        if self.re.flags().contains(Flags::UTF8) {
            utf8::decode(bytes, at).map_or(at + 1, |(_, width)| at + width)
        } else {
            at + 1
        }
    }

    /// The current scan position (just past the last match).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Up to `max` non-overlapping matches, left to right.
    pub fn find_all(&mut self, max: usize) -> Result<Vec<Match<'h>>> {
        let mut out = Vec::new();
        let mut from = 0;
        while out.len() < max {
            match self.find_next(from)? {
                Some(m) => {
                    from = self.pos;
                    out.push(m);
                }
                None => break,
            }
        }
        Ok(out)
    }

    /// The leftmost match at or after `from`, with its capture table.
    pub fn find_captures(&mut self, from: usize) -> Result<Option<Captures>> {
        Ok(self.find_next(from)?.map(|_| {
            self.captures().expect("matcher accepted")
        }))
    }

    /// Replaces every match with the expanded `template`, returning the
    /// new text and the number of replacements. `$0`…`$N` and `${name}`
    /// refer to capture groups; `$$` is a literal dollar.
    pub fn replace(&mut self, template: &str) -> Result<(String, usize)> {
        let haystack = self.haystack()?;
        let mut out = String::with_capacity(haystack.len());
        let mut count = 0;
        let mut last_end = 0;
        let mut from = 0;
        loop {
            let Some(m) = self.find_next(from)? else { break };
            let caps = self.captures().expect("matcher accepted");
            out.push_str(&haystack[last_end..m.start()]);
            expand_template(template, haystack, &caps, &mut out);
            count += 1;
            last_end = m.end();
            from = self.pos;
        }
        out.push_str(&haystack[last_end..]);
        Ok((out, count))
    }

    /// Splits the input around matches into at most `max` pieces; when the
    /// cap is hit, the remainder is the final piece.
    pub fn split(&mut self, max: usize) -> Result<Vec<&'h str>> {
        let haystack = self.haystack()?;
        let mut pieces = Vec::new();
        if max == 0 {
            return Ok(pieces);
        }
        let mut last_end = 0;
        let mut from = 0;
        while pieces.len() + 1 < max {
            let Some(m) = self.find_next(from)? else { break };
            pieces.push(&haystack[last_end..m.start()]);
            last_end = m.end();
            from = self.pos;
        }
        pieces.push(&haystack[last_end..]);
        Ok(pieces)
    }
}

impl Drop for Matcher<'_, '_> {
    fn drop(&mut self) {
        if let Some(id) = self.match_id {
            self.re.registry().unregister_match(id);
        }
    }
}

/// Expands `$0`…`$N`, `${name}` and `$$` in a replacement template.
fn expand_template(template: &str, haystack: &str, caps: &Captures, out: &mut String) {
    let mut chars = template.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some(&(_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed {
                    if let Some(range) = caps.name(&name) {
                        out.push_str(&haystack[range]);
                    }
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(&(_, c)) if c.is_ascii_digit() => {
                let mut index = 0usize;
                while let Some(&(_, d)) = chars.peek() {
                    let Some(digit) = d.to_digit(10) else { break };
                    chars.next();
                    index = index * 10 + digit as usize;
                }
                if let Some(range) = caps.get(index) {
                    out.push_str(&haystack[range]);
                }
            }
            _ => out.push('$'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Regex;

    #[test]
    fn state_machine_walk() {
        let re = Regex::new("ab").unwrap();
        let mut matcher = re.matcher();
        assert_eq!(matcher.state(), MatchState::Ready);
        assert_eq!(
            matcher.find_next(0).unwrap_err().kind(),
            crate::ErrorKind::InvalidParameter
        );
        matcher.set_input("xxab");
        assert_eq!(matcher.state(), MatchState::Bound);
        let m = matcher.find_next(0).unwrap().unwrap();
        assert_eq!(matcher.state(), MatchState::Accepted);
        assert_eq!(m.range(), 2..4);
        assert!(matcher.find_next(matcher.position()).unwrap().is_none());
        assert_eq!(matcher.state(), MatchState::Failed);
        matcher.reset();
        assert_eq!(matcher.state(), MatchState::Bound);
    }

    #[test]
    fn matches_requires_full_input() {
        let re = Regex::new("a+").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("aaa");
        assert!(matcher.matches().unwrap().is_some());
        matcher.set_input("aab");
        assert!(matcher.matches().unwrap().is_none());
    }

    #[test]
    fn empty_match_advances_scan() {
        let re = Regex::new("x*").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("ab");
        let m = matcher.find_next(0).unwrap().unwrap();
        assert_eq!(m.range(), 0..0);
        let m = matcher.find_next(matcher.position()).unwrap().unwrap();
        assert_eq!(m.range(), 1..1);
    }

    #[test]
    fn find_all_is_ordered_and_non_overlapping() {
        let re = Regex::new("a+").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("aaa bbb aaa");
        let matches = matcher.find_all(10).unwrap();
        let spans: Vec<_> = matches.iter().map(|m| m.range()).collect();
        assert_eq!(spans, vec![0..3, 8..11]);
        for pair in matches.windows(2) {
            assert!(pair[1].start() > pair[0].start());
            assert!(pair[1].start() >= pair[0].end());
        }
    }

    #[test]
    fn find_all_respects_cap() {
        let re = Regex::new("a").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("aaaaa");
        assert_eq!(matcher.find_all(3).unwrap().len(), 3);
    }

    #[test]
    fn captures_by_index_and_name() {
        let re = Regex::new(r"(?<word>\w+)=(\d+)").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("count=42;");
        let caps = matcher.find_captures(0).unwrap().unwrap();
        assert_eq!(caps.group_count(), 2);
        assert_eq!(caps.get(0), Some(0..8));
        assert_eq!(caps.name("word"), Some(0..5));
        assert_eq!(caps.get(2), Some(6..8));
        assert_eq!(caps.name("nope"), None);
    }

    #[test]
    fn replace_with_template() {
        let re = Regex::new(r"(\w+)@(\w+)").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("mail a@b and c@d");
        let (out, count) = matcher.replace("$2@$1").unwrap();
        assert_eq!(out, "mail b@a and d@c");
        assert_eq!(count, 2);
    }

    #[test]
    fn replace_named_and_dollar_escape() {
        let re = Regex::new(r"(?<n>\d+)").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("pay 5 now");
        let (out, count) = matcher.replace("$$${n}.00").unwrap();
        assert_eq!(out, "pay $5.00 now");
        assert_eq!(count, 1);
    }

    #[test]
    fn split_pieces() {
        let re = Regex::new(",").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("one,two,three");
        assert_eq!(matcher.split(5).unwrap(), vec!["one", "two", "three"]);
        matcher.reset();
        assert_eq!(matcher.split(2).unwrap(), vec!["one", "two,three"]);
        matcher.reset();
        assert_eq!(matcher.split(0).unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn keep_moves_reported_start() {
        let re = Regex::new(r"\w+: \K\d+").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("port: 8080!");
        let m = matcher.find_next(0).unwrap().unwrap();
        assert_eq!(m.range(), 6..10);
        assert_eq!(m.as_str(), "8080");
    }

    #[test]
    fn utf8_flag_advances_by_code_point() {
        let re = Regex::builder().flags(Flags::UTF8).build("b").unwrap();
        let mut matcher = re.matcher();
        matcher.set_input("ééb");
        let m = matcher.find_next(0).unwrap().unwrap();
        assert_eq!(m.range(), 4..5);
    }

    #[test]
    fn abort_is_sticky_until_reset() {
        use std::time::Duration;
        let re = Regex::builder()
            .limits(LimitConfig::for_pattern(10_000, Duration::from_secs(10), 2_000))
            .build("(a+)+b")
            .unwrap();
        let input = "a".repeat(32) + "c";
        let mut matcher = re.matcher();
        matcher.set_input(&input);
        let err = matcher.find_next(0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LimitExceeded);
        assert_eq!(matcher.state(), MatchState::Aborted);
        assert_eq!(
            matcher.last_error().map(|e| e.kind()),
            Some(crate::ErrorKind::LimitExceeded)
        );
    }

    #[test]
    fn match_scope_limits_override_pattern_scope() {
        use std::time::Duration;
        let re = Regex::new("(a+)+b").unwrap();
        let input = "a".repeat(32) + "c";
        let mut matcher = re.matcher();
        matcher.set_input(&input);
        matcher.set_limits(LimitConfig::for_match(
            10_000,
            Duration::from_secs(10),
            1_000,
        ));
        let err = matcher.find_next(0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LimitExceeded);
    }
}
