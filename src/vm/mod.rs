/*!
The bytecode interpreter.

Two execution modes share the instruction set:

- a set-based mode that advances a priority-ordered list of threads one
  input position at a time, usable whenever the program has no
  backreferences, look-around or counted repeats;
- a bounded backtracking mode with an explicit job stack, capture-undo
  jobs and repeat counters, gated by the effective limits and the bailout
  strategies.

Both modes count every executed instruction against the transition budget
and sample the wall clock at a fixed period. Loop iterations that consume
no input are cut: counted repeats compare positions at `REPEAT_END`, and
backward jumps carry a per-loop progress mark.
*/

use crate::{
    bytecode::{unpack_repeat, BoundaryKind, Opcode, Program},
    error::{Error, Result},
    flags::NewlineMode,
    limits::{BacktrackState, BailoutAction, EffectiveLimits, StrategyManager},
    nfa::{dfa_accepts_window, dfa_longest_end, Automaton, CLOCK_SAMPLE_PERIOD},
    util::utf8,
};

enum VmJob {
    Thread { pc: u32, at: usize },
    RestoreSlot { slot: u32, old: Option<usize> },
    RestoreRepeat { slot: u32, old: (u32, usize) },
    RestoreMark { slot: u32, old: usize },
    RestoreCaps { snapshot: Box<[Option<usize>]> },
}

/// Reusable scratch for the VM.
pub(crate) struct VmCache {
    jobs: Vec<VmJob>,
    repeats: Vec<(u32, usize)>,
    loop_marks: Vec<usize>,
    pike: PikeScratch,
}

impl VmCache {
    pub(crate) fn new() -> VmCache {
        VmCache {
            jobs: Vec::new(),
            repeats: Vec::new(),
            loop_marks: Vec::new(),
            pike: PikeScratch::default(),
        }
    }
}

#[derive(Default)]
struct PikeScratch {
    clist: Vec<Thread>,
    nlist: Vec<Thread>,
    seen: Vec<u64>,
}

#[derive(Clone)]
struct Thread {
    pc: u32,
    slots: Box<[Option<usize>]>,
}

/// One configured execution of a program over one haystack.
pub(crate) struct VmExec<'a> {
    pub(crate) prog: &'a Program,
    pub(crate) bytes: &'a [u8],
    pub(crate) limits: &'a EffectiveLimits,
    pub(crate) strategies: &'a StrategyManager,
    /// Minimized DFA for the same pattern, when one exists; used by the
    /// switch-to-subset bailout action.
    pub(crate) dfa: Option<&'a Automaton>,
}

struct Counters<'c> {
    repeats: &'c mut Vec<(u32, usize)>,
    loop_marks: &'c mut Vec<usize>,
}

impl VmExec<'_> {
    /// One bounded-backtracking attempt anchored at `start`.
    pub(crate) fn backtrack(
        &self,
        cache: &mut VmCache,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        start: usize,
        require_end: Option<usize>,
    ) -> Result<Option<usize>> {
        cache.repeats.clear();
        cache.repeats.resize(self.prog.repeat_count() as usize, (0, 0));
        cache.loop_marks.clear();
        cache
            .loop_marks
            .resize(self.prog.loop_count() as usize, usize::MAX);
        let mut jobs = std::mem::take(&mut cache.jobs);
        jobs.clear();
        let mut counters = Counters {
            repeats: &mut cache.repeats,
            loop_marks: &mut cache.loop_marks,
        };
        let result = self.run(
            &mut jobs,
            &mut counters,
            bstate,
            caps,
            0,
            start,
            require_end,
            true,
        );
        cache.jobs = jobs;
        result
    }

    /// The backtracking driver: pops jobs until a path accepts or
    /// everything is exhausted.
    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        jobs: &mut Vec<VmJob>,
        counters: &mut Counters<'_>,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        entry: u32,
        start: usize,
        require_end: Option<usize>,
        allow_dfa: bool,
    ) -> Result<Option<usize>> {
        let base = jobs.len();
        self.push_job(jobs, bstate, VmJob::Thread { pc: entry, at: start })?;
        let mut resumed = false;
        while jobs.len() > base {
            let job = jobs.pop().expect("stack is non-empty");
            bstate.depth = jobs.len();
            match job {
                VmJob::RestoreSlot { slot, old } => caps[slot as usize] = old,
                VmJob::RestoreRepeat { slot, old } => counters.repeats[slot as usize] = old,
                VmJob::RestoreMark { slot, old } => counters.loop_marks[slot as usize] = old,
                VmJob::RestoreCaps { snapshot } => caps.copy_from_slice(&snapshot),
                VmJob::Thread { pc, at } => {
                    if resumed {
                        bstate.note_backtrack(at);
                        if let Some(action) = self.strategies.evaluate(bstate) {
                            match action {
                                BailoutAction::Abort => {
                                    return Err(Error::limit("match aborted by bailout strategy"));
                                }
                                BailoutAction::PruneWeakest => prune_weakest(jobs, base),
                                BailoutAction::SwitchToDfa => {
                                    if let (true, Some(dfa)) = (allow_dfa, self.dfa) {
                                        jobs.truncate(base);
                                        return Ok(self.finish_on_dfa(
                                            dfa,
                                            caps,
                                            start,
                                            require_end,
                                        ));
                                    }
                                    return Err(Error::limit("match aborted by bailout strategy"));
                                }
                            }
                        }
                    }
                    resumed = true;
                    if let Some(end) =
                        self.step(jobs, counters, bstate, caps, pc, at, require_end)?
                    {
                        jobs.truncate(base);
                        return Ok(Some(end));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Completes the attempt on the DFA subset: extents only, so every
    /// explicit capture group comes back unset.
    fn finish_on_dfa(
        &self,
        dfa: &Automaton,
        caps: &mut [Option<usize>],
        start: usize,
        require_end: Option<usize>,
    ) -> Option<usize> {
        trace!("bailout: finishing attempt on the DFA subset");
        let end = match require_end {
            Some(end) => dfa_accepts_window(dfa, self.bytes, start, end).then_some(end),
            None => dfa_longest_end(dfa, self.bytes, start),
        }?;
        for slot in caps.iter_mut().skip(2) {
            *slot = None;
        }
        Some(end)
    }

    /// Follows one path inline, forking alternatives onto the job stack.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        jobs: &mut Vec<VmJob>,
        counters: &mut Counters<'_>,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        mut pc: u32,
        mut at: usize,
        require_end: Option<usize>,
    ) -> Result<Option<usize>> {
        loop {
            self.count_step(bstate)?;
            let inst = self.prog.insts()[pc as usize];
            match inst.opcode {
                Opcode::Nop => pc += 1,
                Opcode::MatchChar => match utf8::decode(self.bytes, at) {
                    Some((c, width)) if c as u32 == inst.operand => {
                        at += width;
                        pc += 1;
                    }
                    _ => return Ok(None),
                },
                Opcode::MatchClass => match utf8::decode(self.bytes, at) {
                    Some((c, width)) if self.prog.class(inst.operand).contains(c) => {
                        at += width;
                        pc += 1;
                    }
                    _ => return Ok(None),
                },
                Opcode::MatchAny => match utf8::decode(self.bytes, at) {
                    Some((_, width)) => {
                        at += width;
                        pc += 1;
                    }
                    None => return Ok(None),
                },
                Opcode::Jump => {
                    let slot = self.prog.loop_slot(pc);
                    if slot != u32::MAX {
                        // Backward jump: cut the iteration if the loop has
                        // not consumed anything since last time through.
                        let old = counters.loop_marks[slot as usize];
                        if old == at {
                            return Ok(None);
                        }
                        self.push_job(jobs, bstate, VmJob::RestoreMark { slot, old })?;
                        counters.loop_marks[slot as usize] = at;
                    }
                    pc = inst.operand;
                }
                Opcode::Split => {
                    self.push_job(jobs, bstate, VmJob::Thread { pc: inst.operand, at })?;
                    pc += 1;
                }
                Opcode::SaveStart | Opcode::SaveEnd => {
                    let slot = 2 * inst.operand + u32::from(inst.opcode == Opcode::SaveEnd);
                    let index = slot as usize;
                    if index < caps.len() {
                        self.push_job(
                            jobs,
                            bstate,
                            VmJob::RestoreSlot { slot, old: caps[index] },
                        )?;
                        caps[index] = Some(at);
                    }
                    pc += 1;
                }
                Opcode::Boundary => {
                    let kind = BoundaryKind::from_u32(inst.operand)
                        .expect("validated boundary operand");
                    if check_boundary(self.bytes, at, kind, self.prog.flags().newline_mode()) {
                        pc += 1;
                    } else {
                        return Ok(None);
                    }
                }
                Opcode::Backref => {
                    let group = inst.operand as usize;
                    match (caps[2 * group], caps[2 * group + 1]) {
                        (Some(s), Some(e)) if s <= e => {
                            let needle = &self.bytes[s..e];
                            if self.bytes[at..].starts_with(needle) {
                                at += needle.len();
                                pc += 1;
                            } else {
                                return Ok(None);
                            }
                        }
                        // A group that has not captured matches the empty
                        // string.
                        _ => pc += 1,
                    }
                }
                Opcode::RepeatStart => {
                    let slot = self.prog.repeat_slot(pc);
                    self.push_job(
                        jobs,
                        bstate,
                        VmJob::RestoreRepeat { slot, old: counters.repeats[slot as usize] },
                    )?;
                    counters.repeats[slot as usize] = (0, at);
                    pc += 1;
                }
                Opcode::RepeatEnd => {
                    let head = inst.operand;
                    let (min, max, greedy) =
                        unpack_repeat(self.prog.insts()[head as usize].operand);
                    let slot = self.prog.repeat_slot(head);
                    let (count, last_at) = counters.repeats[slot as usize];
                    let n = count + 1;
                    self.push_job(
                        jobs,
                        bstate,
                        VmJob::RestoreRepeat { slot, old: (count, last_at) },
                    )?;
                    counters.repeats[slot as usize] = (n, at);
                    if n < min {
                        pc = head + 1;
                    } else if Some(n) == max || at == last_at {
                        // Exhausted, or the body stopped consuming input.
                        pc += 1;
                    } else if greedy {
                        self.push_job(jobs, bstate, VmJob::Thread { pc: pc + 1, at })?;
                        pc = head + 1;
                    } else {
                        self.push_job(jobs, bstate, VmJob::Thread { pc: head + 1, at })?;
                        pc += 1;
                    }
                }
                Opcode::Lookahead | Opcode::NegLookahead => {
                    let snapshot: Box<[Option<usize>]> = caps.to_vec().into_boxed_slice();
                    let repeats_before = counters.repeats.clone();
                    let marks_before = counters.loop_marks.clone();
                    let mut sub_jobs = Vec::new();
                    let matched = self
                        .run(&mut sub_jobs, counters, bstate, caps, pc + 1, at, None, false)?
                        .is_some();
                    // Counters have no meaning outside the sub-run.
                    *counters.repeats = repeats_before;
                    *counters.loop_marks = marks_before;
                    if matched == (inst.opcode == Opcode::Lookahead) {
                        if matched {
                            self.push_job(jobs, bstate, VmJob::RestoreCaps { snapshot })?;
                        }
                        pc = inst.operand;
                    } else {
                        if matched {
                            caps.copy_from_slice(&snapshot);
                        }
                        return Ok(None);
                    }
                }
                Opcode::Accept => {
                    if require_end.map_or(true, |end| at == end) {
                        return Ok(Some(at));
                    }
                    return Ok(None);
                }
                Opcode::Fail => return Ok(None),
            }
        }
    }

    fn push_job(
        &self,
        jobs: &mut Vec<VmJob>,
        bstate: &mut BacktrackState,
        job: VmJob,
    ) -> Result<()> {
        if jobs.len() >= self.limits.max_depth {
            return Err(Error::limit("backtracking depth limit reached"));
        }
        jobs.push(job);
        bstate.depth = jobs.len();
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

    /// Set-based execution: a priority-ordered thread list stepped one
    /// position at a time. Only valid when the program needs no
    /// backtracking. With `anchored` false, a fresh root thread joins at
    /// every position until a match is recorded.
    pub(crate) fn pike(
        &self,
        cache: &mut VmCache,
        bstate: &mut BacktrackState,
        caps: &mut [Option<usize>],
        start: usize,
        require_end: Option<usize>,
        anchored: bool,
    ) -> Result<Option<usize>> {
        debug_assert!(!self.prog.needs_backtrack());
        let slot_count = self.prog.slot_count();
        let scratch = &mut cache.pike;
        scratch.clist.clear();
        scratch.nlist.clear();
        scratch.seen.clear();
        scratch.seen.resize(self.prog.instruction_count(), 0);

        let mut matched: Option<(usize, Box<[Option<usize>]>)> = None;
        let mut at = start;
        // Threads for the current position are stamped with `generation`,
        // threads seeded for the next position with `generation + 1`.
        let mut generation: u64 = 1;
        let mut first = true;
        loop {
            if first || (!anchored && matched.is_none()) {
                let mut slots = vec![None; slot_count].into_boxed_slice();
                slots[0] = Some(at);
                add_thread(
                    self.prog,
                    self.bytes,
                    &mut scratch.clist,
                    &mut scratch.seen,
                    generation,
                    0,
                    at,
                    slots,
                );
                first = false;
            }
            let decoded = utf8::decode(self.bytes, at);
            let mut index = 0;
            while index < scratch.clist.len() {
                self.count_step(bstate)?;
                let thread = &scratch.clist[index];
                let inst = self.prog.insts()[thread.pc as usize];
                match inst.opcode {
                    Opcode::Accept => {
                        if require_end.map_or(true, |end| at == end) {
                            let mut slots = thread.slots.clone();
                            slots[1] = Some(at);
                            matched = Some((at, slots));
                            // Lower-priority threads can no longer win.
                            scratch.clist.truncate(index + 1);
                            break;
                        }
                    }
                    Opcode::MatchChar | Opcode::MatchClass | Opcode::MatchAny => {
                        if let Some((c, width)) = decoded {
                            let survives = match inst.opcode {
                                Opcode::MatchChar => c as u32 == inst.operand,
                                Opcode::MatchClass => self.prog.class(inst.operand).contains(c),
                                _ => true,
                            };
                            if survives {
                                let slots = thread.slots.clone();
                                let pc = thread.pc;
                                add_thread(
                                    self.prog,
                                    self.bytes,
                                    &mut scratch.nlist,
                                    &mut scratch.seen,
                                    generation + 1,
                                    pc + 1,
                                    at + width,
                                    slots,
                                );
                            }
                        }
                    }
                    _ => unreachable!("thread lists hold consuming and accept instructions only"),
                }
                index += 1;
            }
            std::mem::swap(&mut scratch.clist, &mut scratch.nlist);
            scratch.nlist.clear();
            generation += 1;
            match decoded {
                Some((_, width)) => at += width,
                None => break,
            }
            if scratch.clist.is_empty() && (anchored || matched.is_some()) {
                break;
            }
        }
        Ok(matched.map(|(end, slots)| {
            caps.copy_from_slice(&slots);
            end
        }))
    }
}

/// Epsilon closure for the set-based mode: follows control flow and saves
/// until it reaches consuming or accepting instructions, adding them to
/// `list` in priority order.
#[allow(clippy::too_many_arguments)]
fn add_thread(
    prog: &Program,
    bytes: &[u8],
    list: &mut Vec<Thread>,
    seen: &mut [u64],
    generation: u64,
    pc: u32,
    at: usize,
    slots: Box<[Option<usize>]>,
) {
    let mut stack = vec![(pc, slots)];
    while let Some((pc, slots)) = stack.pop() {
        let index = pc as usize;
        if seen[index] == generation {
            continue;
        }
        seen[index] = generation;
        let inst = prog.insts()[index];
        match inst.opcode {
            Opcode::Nop => stack.push((pc + 1, slots)),
            Opcode::Jump => stack.push((inst.operand, slots)),
            Opcode::Split => {
                // The fall-through branch is preferred: push it last so it
                // pops first.
                stack.push((inst.operand, slots.clone()));
                stack.push((pc + 1, slots));
            }
            Opcode::SaveStart | Opcode::SaveEnd => {
                let slot =
                    (2 * inst.operand + u32::from(inst.opcode == Opcode::SaveEnd)) as usize;
                let mut slots = slots;
                if slot < slots.len() {
                    slots[slot] = Some(at);
                }
                stack.push((pc + 1, slots));
            }
            Opcode::Boundary => {
                let kind =
                    BoundaryKind::from_u32(inst.operand).expect("validated boundary operand");
                if check_boundary(bytes, at, kind, prog.flags().newline_mode()) {
                    stack.push((pc + 1, slots));
                }
            }
            Opcode::Fail => {}
            Opcode::MatchChar | Opcode::MatchClass | Opcode::MatchAny | Opcode::Accept => {
                list.push(Thread { pc, slots })
            }
            Opcode::Backref
            | Opcode::RepeatStart
            | Opcode::RepeatEnd
            | Opcode::Lookahead
            | Opcode::NegLookahead => {
                unreachable!("program requiring backtracking ran in set-based mode")
            }
        }
    }
}

/// Drops the oldest pending alternative above `base`.
fn prune_weakest(jobs: &mut Vec<VmJob>, base: usize) {
    if let Some(pos) = jobs[base..]
        .iter()
        .position(|j| matches!(j, VmJob::Thread { .. }))
    {
        jobs.remove(base + pos);
    }
}

pub(crate) fn check_boundary(
    bytes: &[u8],
    at: usize,
    kind: BoundaryKind,
    mode: NewlineMode,
) -> bool {
    match kind {
        BoundaryKind::TextStart => at == 0,
        BoundaryKind::TextEnd => at == bytes.len(),
        BoundaryKind::LineStart => mode.is_line_start(bytes, at),
        BoundaryKind::LineEnd => mode.is_line_end(bytes, at),
        BoundaryKind::WordBoundary | BoundaryKind::NotWordBoundary => {
            let before = utf8::decode_back(bytes, at)
                .map(|(c, _)| utf8::is_word_char(c))
                .unwrap_or(false);
            let after = utf8::decode(bytes, at)
                .map(|(c, _)| utf8::is_word_char(c))
                .unwrap_or(false);
            (before != after) == (kind == BoundaryKind::WordBoundary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::compile,
        limits::LimitConfig,
        nfa,
        syntax::parse,
        Config, Flags,
    };

    fn program(pattern: &str) -> Program {
        let config = Config::default();
        let parsed = parse(pattern, Flags::empty(), &config).unwrap();
        compile::from_ast(
            &parsed.ast,
            pattern,
            Flags::empty(),
            parsed.stats.capture_count,
            &config,
        )
        .unwrap()
    }

    /// The automaton-lowered form, as the engine router produces for
    /// plain patterns.
    fn program_auto(pattern: &str) -> Program {
        let config = Config::default();
        let parsed = parse(pattern, Flags::empty(), &config).unwrap();
        let automaton = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        compile::from_automaton(
            &automaton,
            pattern,
            Flags::empty(),
            parsed.stats.capture_count,
            &config,
        )
        .unwrap()
    }

    fn generous() -> EffectiveLimits {
        LimitConfig::global_defaults(&Config::default()).into()
    }

    fn attempt(pattern: &str, input: &str, start: usize) -> Result<Option<usize>> {
        attempt_full(pattern, input, start, None).map(|r| r.map(|(end, _)| end))
    }

    fn attempt_full(
        pattern: &str,
        input: &str,
        start: usize,
        require_end: Option<usize>,
    ) -> Result<Option<(usize, Vec<Option<usize>>)>> {
        attempt_prog(&program(pattern), input, start, require_end)
    }

    fn attempt_prog(
        prog: &Program,
        input: &str,
        start: usize,
        require_end: Option<usize>,
    ) -> Result<Option<(usize, Vec<Option<usize>>)>> {
        let limits = generous();
        let strategies = StrategyManager::default();
        let exec = VmExec {
            prog,
            bytes: input.as_bytes(),
            limits: &limits,
            strategies: &strategies,
            dfa: None,
        };
        let mut cache = VmCache::new();
        let mut bstate = BacktrackState::new(input.len(), start);
        let mut caps = vec![None; prog.slot_count()];
        caps[0] = Some(start);
        let end = exec.backtrack(&mut cache, &mut bstate, &mut caps, start, require_end)?;
        Ok(end.map(|end| {
            caps[1] = Some(end);
            (end, caps)
        }))
    }

    #[test]
    fn literals_and_classes() {
        assert_eq!(attempt("abc", "abcd", 0).unwrap(), Some(3));
        assert_eq!(attempt("abc", "abx", 0).unwrap(), None);
        assert_eq!(attempt("[a-c]+", "abcx", 0).unwrap(), Some(3));
        assert_eq!(attempt(".", "é", 0).unwrap(), Some(2));
    }

    #[test]
    fn greedy_vs_reluctant() {
        assert_eq!(attempt("a*", "aaa", 0).unwrap(), Some(3));
        assert_eq!(attempt("a*?", "aaa", 0).unwrap(), Some(0));
        assert_eq!(attempt("a+?b", "aaab", 0).unwrap(), Some(4));
    }

    #[test]
    fn automaton_lowered_programs_run_too() {
        let prog = program_auto("a(b|c)*d");
        assert_eq!(
            attempt_prog(&prog, "abcbd", 0, None).unwrap().map(|r| r.0),
            Some(5)
        );
        assert!(attempt_prog(&prog, "abx", 0, None).unwrap().is_none());
    }

    #[test]
    fn nullable_loop_terminates() {
        // A loop whose body can match empty must not spin: the backward
        // jump's progress mark cuts it.
        let prog = program_auto("(a?)*b");
        let (end, _) = attempt_prog(&prog, "aab", 0, None).unwrap().unwrap();
        assert_eq!(end, 3);
        let (end, _) = attempt_prog(&prog, "b", 0, None).unwrap().unwrap();
        assert_eq!(end, 1);
        assert!(attempt_prog(&prog, "c", 0, None).unwrap().is_none());
    }

    #[test]
    fn nullable_counted_loop_terminates() {
        assert_eq!(attempt("(?:a?)*b", "aab", 0).unwrap(), Some(3));
        assert_eq!(attempt("(?:a?)*b", "b", 0).unwrap(), Some(1));
    }

    #[test]
    fn captures_across_backtracking() {
        let (end, caps) = attempt_full("(a*)(a)", "aaa", 0, None).unwrap().unwrap();
        assert_eq!(end, 3);
        // Greedy group 1 gives one back to group 2.
        assert_eq!((caps[2], caps[3]), (Some(0), Some(2)));
        assert_eq!((caps[4], caps[5]), (Some(2), Some(3)));
    }

    #[test]
    fn counted_repeat_execution() {
        assert_eq!(attempt("a{2,500}", &"a".repeat(40), 0).unwrap(), Some(40));
        assert_eq!(attempt("a{2,500}", "a", 0).unwrap(), None);
        assert_eq!(
            attempt("a{40,}b", &format!("{}b", "a".repeat(60)), 0).unwrap(),
            Some(61)
        );
        assert_eq!(attempt("a{2,40}?", "aaaa", 0).unwrap(), Some(2));
        assert_eq!(attempt("(?:a{0,500})*x", "aaax", 0).unwrap(), Some(4));
    }

    #[test]
    fn backref_execution() {
        assert_eq!(attempt(r"(a+)\1", "aaaa", 0).unwrap(), Some(4));
        assert_eq!(attempt(r"(ab)\1", "abab", 0).unwrap(), Some(4));
        assert_eq!(attempt(r"(ab)\1", "abac", 0).unwrap(), None);
        // Unset group: \1 matches the empty string.
        assert_eq!(attempt(r"(a)?\1b", "b", 0).unwrap(), Some(1));
    }

    #[test]
    fn lookahead_execution() {
        assert_eq!(attempt(r"a(?=b)", "ab", 0).unwrap(), Some(1));
        assert_eq!(attempt(r"a(?=b)", "ac", 0).unwrap(), None);
        assert_eq!(attempt(r"a(?!b)", "ac", 0).unwrap(), Some(1));
        assert_eq!(attempt(r"(?=a+b)a*", "aaab", 0).unwrap(), Some(3));
    }

    #[test]
    fn lookahead_captures_persist() {
        let (_, caps) = attempt_full(r"(?=(a+))a", "aaa", 0, None).unwrap().unwrap();
        assert_eq!((caps[2], caps[3]), (Some(0), Some(3)));
    }

    #[test]
    fn boundaries() {
        assert_eq!(attempt(r"\bfoo\b", "foo", 0).unwrap(), Some(3));
        assert_eq!(attempt(r"\Afoo\z", "foo", 0).unwrap(), Some(3));
        assert_eq!(attempt(r"foo\z", "food", 0).unwrap(), None);
    }

    #[test]
    fn require_end_restricts_accepts() {
        assert_eq!(
            attempt_full("a|ab", "ab", 0, Some(2)).unwrap().map(|r| r.0),
            Some(2)
        );
        assert!(attempt_full("a", "ab", 0, Some(2)).unwrap().is_none());
    }

    #[test]
    fn transition_budget_bounds_catastrophic_backtracking() {
        let prog = program_auto("(a+)+b");
        let mut limits = generous();
        limits.max_transitions = 10_000;
        let strategies = StrategyManager::default();
        let input = "a".repeat(34) + "c";
        let exec = VmExec {
            prog: &prog,
            bytes: input.as_bytes(),
            limits: &limits,
            strategies: &strategies,
            dfa: None,
        };
        let mut cache = VmCache::new();
        let mut bstate = BacktrackState::new(input.len(), 0);
        let mut caps = vec![None; prog.slot_count()];
        let err = exec
            .backtrack(&mut cache, &mut bstate, &mut caps, 0, None)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LimitExceeded);
        assert!(bstate.transitions <= 10_001);
    }

    fn pike_find(pattern: &str, input: &str, anchored: bool) -> Option<(usize, usize)> {
        let prog = program_auto(pattern);
        assert!(!prog.needs_backtrack());
        let limits = generous();
        let strategies = StrategyManager::default();
        let exec = VmExec {
            prog: &prog,
            bytes: input.as_bytes(),
            limits: &limits,
            strategies: &strategies,
            dfa: None,
        };
        let mut cache = VmCache::new();
        let mut bstate = BacktrackState::new(input.len(), 0);
        let mut caps = vec![None; prog.slot_count()];
        exec.pike(&mut cache, &mut bstate, &mut caps, 0, None, anchored)
            .unwrap()
            .map(|end| (caps[0].unwrap(), end))
    }

    #[test]
    fn pike_agrees_with_backtracker() {
        for (pattern, input) in [
            ("a*b", "aaab"),
            ("a|ab", "ab"),
            ("(x|y)+", "xyyx"),
            ("a*?b", "aaab"),
        ] {
            let prog = program_auto(pattern);
            let bt = attempt_prog(&prog, input, 0, None).unwrap().map(|r| r.0);
            let pk = pike_find(pattern, input, true).map(|(_, end)| end);
            assert_eq!(bt, pk, "on {pattern:?} over {input:?}");
        }
    }

    #[test]
    fn pike_unanchored_finds_leftmost() {
        assert_eq!(pike_find("b+", "aabbb", false), Some((2, 5)));
        assert_eq!(pike_find("b+", "aaa", false), None);
    }

    #[test]
    fn pike_reports_captures() {
        let prog = program_auto("(b+)c");
        let limits = generous();
        let strategies = StrategyManager::default();
        let input = "abbc";
        let exec = VmExec {
            prog: &prog,
            bytes: input.as_bytes(),
            limits: &limits,
            strategies: &strategies,
            dfa: None,
        };
        let mut cache = VmCache::new();
        let mut bstate = BacktrackState::new(input.len(), 0);
        let mut caps = vec![None; prog.slot_count()];
        let end = exec
            .pike(&mut cache, &mut bstate, &mut caps, 0, None, false)
            .unwrap();
        assert_eq!(end, Some(4));
        assert_eq!((caps[2], caps[3]), (Some(1), Some(3)));
    }
}
