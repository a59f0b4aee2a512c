/*!
Lowering to bytecode.

Two paths produce a [`Program`]:

- [`from_automaton`] turns each reachable automaton state into a labeled
  block: `Split` chains fan out over its priority-ordered transitions,
  class transitions become match instructions, accepting states become
  `Accept`, dead states become `Fail`.
- [`from_ast`] compiles the syntax tree directly, which is how
  backreferences, look-ahead and counted repeats (`REPEAT_START` /
  `REPEAT_END` scaffolding) reach the VM.

A final optimizer pass removes `Nop`s, folds jump chains, merges
equivalent terminal instructions and elides unreachable code. It never
reorders `Split` branches, so observable match semantics are unchanged.
*/

use std::collections::HashMap;

use crate::{
    bytecode::{pack_repeat, BoundaryKind, Inst, Opcode, Program, MAX_COUNTED_REPEAT},
    config::Config,
    error::{Error, Result},
    flags::Flags,
    nfa::{Automaton, Label, Predicate, StateId},
    syntax::{
        ast::{Anchor, Ast, GroupKind},
        ClassSet,
    },
};

/// Bounded repeats with a span up to this size are unrolled; larger ones
/// use counter scaffolding.
pub(crate) const REPEAT_UNROLL_LIMIT: u32 = 32;

struct Emitter<'c> {
    insts: Vec<Inst>,
    classes: Vec<ClassSet>,
    class_ids: HashMap<ClassSet, u32>,
    config: &'c Config,
}

impl<'c> Emitter<'c> {
    fn new(config: &'c Config) -> Emitter<'c> {
        Emitter {
            insts: Vec::new(),
            classes: Vec::new(),
            class_ids: HashMap::new(),
            config,
        }
    }

    fn pc(&self) -> u32 {
        self.insts.len() as u32
    }

    fn emit(&mut self, opcode: Opcode, operand: u32) -> Result<u32> {
        // Lowering emits a handful of instructions per automaton state, so
        // the pre-optimization ceiling sits a constant factor above the
        // state budget.
        if self.insts.len() >= self.config.max_states.saturating_mul(8) {
            return Err(Error::limit("program exceeds the instruction budget"));
        }
        self.insts.push(Inst::new(opcode, operand));
        Ok(self.pc() - 1)
    }

    fn patch(&mut self, pc: u32, operand: u32) {
        self.insts[pc as usize].operand = operand;
    }

    fn emit_class(&mut self, class: &ClassSet) -> Result<()> {
        if let Some(c) = class.exact_char() {
            self.emit(Opcode::MatchChar, c as u32)?;
        } else if class.is_any() {
            self.emit(Opcode::MatchAny, 0)?;
        } else {
            let id = match self.class_ids.get(class) {
                Some(&id) => id,
                None => {
                    let id = self.classes.len() as u32;
                    self.classes.push(class.clone());
                    self.class_ids.insert(class.clone(), id);
                    id
                }
            };
            self.emit(Opcode::MatchClass, id)?;
        }
        Ok(())
    }
}

fn boundary_code(anchor: Anchor) -> u32 {
    let kind = match anchor {
        Anchor::WordBoundary => BoundaryKind::WordBoundary,
        Anchor::NotWordBoundary => BoundaryKind::NotWordBoundary,
        Anchor::TextStart => BoundaryKind::TextStart,
        Anchor::TextEnd => BoundaryKind::TextEnd,
        Anchor::LineStart => BoundaryKind::LineStart,
        Anchor::LineEnd => BoundaryKind::LineEnd,
        Anchor::Keep => unreachable!("\\K lowers to a group-0 save"),
    };
    kind as u32
}

/// Lowers an automaton into bytecode. The automaton must not carry
/// look-around or atomic predicates (those stay on the automaton engine).
pub(crate) fn from_automaton(
    automaton: &Automaton,
    pattern: &str,
    flags: Flags,
    group_count: u32,
    config: &Config,
) -> Result<Program> {
    if !automaton.subs.is_empty() {
        return Err(Error::unsupported(
            "automata with sub-automata are executed directly, not lowered",
        ));
    }
    let mut emitter = Emitter::new(config);
    let mut block_of: HashMap<u32, u32> = HashMap::new();
    let mut patches: Vec<(u32, StateId)> = Vec::new();
    let mut worklist: Vec<StateId> = vec![automaton.start];

    while let Some(sid) = worklist.pop() {
        if block_of.contains_key(&sid.0) {
            continue;
        }
        block_of.insert(sid.0, emitter.pc());
        let state = automaton.state(sid);
        if state.accept {
            emitter.emit(Opcode::Accept, 0)?;
            continue;
        }
        if state.transitions.is_empty() {
            emitter.emit(Opcode::Fail, 0)?;
            continue;
        }
        let mut pending_split: Option<u32> = None;
        for (i, transition) in state.transitions.iter().enumerate() {
            if let Some(split) = pending_split.take() {
                let here = emitter.pc();
                emitter.patch(split, here);
            }
            if i + 1 < state.transitions.len() {
                pending_split = Some(emitter.emit(Opcode::Split, 0)?);
            }
            match &transition.label {
                Label::Epsilon => {}
                Label::Class(class) => emitter.emit_class(class)?,
                Label::Save { slot } => {
                    let opcode = if slot % 2 == 0 {
                        Opcode::SaveStart
                    } else {
                        Opcode::SaveEnd
                    };
                    emitter.emit(opcode, slot / 2)?;
                }
                Label::Assert(Predicate::Anchor(anchor)) => {
                    emitter.emit(Opcode::Boundary, boundary_code(*anchor))?;
                }
                Label::Assert(_) => {
                    return Err(Error::unsupported(
                        "look-around predicates cannot be lowered to bytecode",
                    ));
                }
            }
            let jump = emitter.emit(Opcode::Jump, 0)?;
            patches.push((jump, transition.to));
            worklist.push(transition.to);
        }
    }

    for (pc, target) in patches {
        emitter.patch(pc, block_of[&target.0]);
    }
    finish(emitter, pattern, flags, group_count, config)
}

/// Compiles the AST directly into bytecode.
pub(crate) fn from_ast(
    ast: &Ast,
    pattern: &str,
    flags: Flags,
    group_count: u32,
    config: &Config,
) -> Result<Program> {
    let mut compiler = AstCompiler {
        emitter: Emitter::new(config),
        flags,
    };
    compiler.compile_node(ast)?;
    compiler.emitter.emit(Opcode::Accept, 0)?;
    finish(compiler.emitter, pattern, flags, group_count, config)
}

fn finish(
    mut emitter: Emitter<'_>,
    pattern: &str,
    flags: Flags,
    group_count: u32,
    config: &Config,
) -> Result<Program> {
    if config.optimize_automaton {
        optimize(&mut emitter.insts);
    }
    debug!(
        "bytecode: {} instructions, {} classes for {:?}",
        emitter.insts.len(),
        emitter.classes.len(),
        pattern
    );
    Program::new(
        emitter.insts,
        emitter.classes,
        group_count,
        flags,
        pattern.to_string(),
    )
}

struct AstCompiler<'c> {
    emitter: Emitter<'c>,
    flags: Flags,
}

impl AstCompiler<'_> {
    /// Emits code that matches `ast` and falls through on success.
    fn compile_node(&mut self, ast: &Ast) -> Result<()> {
        match ast {
            Ast::Empty => Ok(()),
            Ast::Literal(c) => self.emitter.emit_class(&ClassSet::single(*c)),
            Ast::Class(class) => self.emitter.emit_class(class),
            Ast::Dot => self
                .emitter
                .emit_class(&ClassSet::dot(self.flags.newline_mode())),
            Ast::Anchor(Anchor::Keep) => {
                self.emitter.emit(Opcode::SaveStart, 0)?;
                Ok(())
            }
            Ast::Anchor(anchor) => {
                self.emitter.emit(Opcode::Boundary, boundary_code(*anchor))?;
                Ok(())
            }
            Ast::Backref(group) => {
                self.emitter.emit(Opcode::Backref, *group)?;
                Ok(())
            }
            Ast::Concat(children) => {
                for child in children {
                    self.compile_node(child)?;
                }
                Ok(())
            }
            Ast::Alternate(alternatives) => {
                let mut exits = Vec::new();
                for (i, alt) in alternatives.iter().enumerate() {
                    if i + 1 < alternatives.len() {
                        let split = self.emitter.emit(Opcode::Split, 0)?;
                        self.compile_node(alt)?;
                        exits.push(self.emitter.emit(Opcode::Jump, 0)?);
                        let here = self.emitter.pc();
                        self.emitter.patch(split, here);
                    } else {
                        self.compile_node(alt)?;
                    }
                }
                let here = self.emitter.pc();
                for exit in exits {
                    self.emitter.patch(exit, here);
                }
                Ok(())
            }
            Ast::Repeat { ast, min, max, greedy } => {
                self.compile_repeat(ast, *min, *max, *greedy)
            }
            Ast::Group(group) => match &group.kind {
                GroupKind::Capturing { .. } => {
                    let capture = group.capture.expect("capturing group has a capture number");
                    self.emitter.emit(Opcode::SaveStart, capture)?;
                    self.compile_node(&group.ast)?;
                    self.emitter.emit(Opcode::SaveEnd, capture)?;
                    Ok(())
                }
                GroupKind::NonCapturing => self.compile_node(&group.ast),
                GroupKind::Lookahead { negated } => {
                    let opcode = if *negated {
                        Opcode::NegLookahead
                    } else {
                        Opcode::Lookahead
                    };
                    let head = self.emitter.emit(opcode, 0)?;
                    self.compile_node(&group.ast)?;
                    self.emitter.emit(Opcode::Accept, 0)?;
                    let here = self.emitter.pc();
                    self.emitter.patch(head, here);
                    Ok(())
                }
                GroupKind::Atomic => Err(Error::unsupported(
                    "atomic groups are executed on the automaton engine",
                )),
                GroupKind::Lookbehind { .. } => Err(Error::unsupported(
                    "look-behind is executed on the automaton engine",
                )),
            },
        }
    }

    fn compile_repeat(
        &mut self,
        body: &Ast,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    ) -> Result<()> {
        if max == Some(0) {
            return Ok(());
        }
        match max {
            // Unbounded repeats always take the counter form: its
            // empty-iteration cut is what keeps nullable bodies finite.
            None => self.compile_counted(body, min, None, greedy),
            Some(max) if min > REPEAT_UNROLL_LIMIT || max - min > REPEAT_UNROLL_LIMIT => {
                self.compile_counted(body, min, Some(max), greedy)
            }
            Some(max) => {
                for _ in 0..min {
                    self.compile_node(body)?;
                }
                // Optional copies; every skip bails to the shared exit.
                let mut skips = Vec::new();
                for _ in min..max {
                    if greedy {
                        skips.push(self.emitter.emit(Opcode::Split, 0)?);
                        self.compile_node(body)?;
                    } else {
                        let split = self.emitter.emit(Opcode::Split, 0)?;
                        skips.push(self.emitter.emit(Opcode::Jump, 0)?);
                        let here = self.emitter.pc();
                        self.emitter.patch(split, here);
                        self.compile_node(body)?;
                    }
                }
                let exit = self.emitter.pc();
                for skip in skips {
                    self.emitter.patch(skip, exit);
                }
                Ok(())
            }
        }
    }

    /// `REPEAT_START` / `REPEAT_END` scaffolding. A zero minimum is
    /// expressed as an optional `{1,max}` repeat.
    fn compile_counted(
        &mut self,
        body: &Ast,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    ) -> Result<()> {
        if min > MAX_COUNTED_REPEAT || max.map_or(false, |m| m > MAX_COUNTED_REPEAT) {
            return Err(Error::limit("counted repeat bound too large"));
        }
        let skip = if min == 0 {
            if greedy {
                Some(self.emitter.emit(Opcode::Split, 0)?)
            } else {
                let split = self.emitter.emit(Opcode::Split, 0)?;
                let skip = self.emitter.emit(Opcode::Jump, 0)?;
                let here = self.emitter.pc();
                self.emitter.patch(split, here);
                Some(skip)
            }
        } else {
            None
        };
        let start = self
            .emitter
            .emit(Opcode::RepeatStart, pack_repeat(min.max(1), max, greedy))?;
        self.compile_node(body)?;
        self.emitter.emit(Opcode::RepeatEnd, start)?;
        if let Some(skip) = skip {
            let exit = self.emitter.pc();
            self.emitter.patch(skip, exit);
        }
        Ok(())
    }
}

/// Post-lowering cleanup. Preserves `Split` branch order and the relative
/// preference of every fork.
pub(crate) fn optimize(insts: &mut Vec<Inst>) {
    fold_jump_chains(insts);
    elide_unreachable(insts);
}

/// Retargets forward edges through chains of `Jump`s and replaces jumps to
/// terminal instructions with the terminal itself.
fn fold_jump_chains(insts: &mut [Inst]) {
    let resolve = |insts: &[Inst], mut target: u32| {
        let mut hops = 0;
        while hops <= insts.len() {
            match insts[target as usize] {
                Inst { opcode: Opcode::Jump, operand } => {
                    target = operand;
                    hops += 1;
                }
                _ => break,
            }
        }
        target
    };
    for pc in 0..insts.len() {
        match insts[pc].opcode {
            Opcode::Jump | Opcode::Split | Opcode::Lookahead | Opcode::NegLookahead => {
                insts[pc].operand = resolve(insts, insts[pc].operand);
            }
            _ => {}
        }
    }
    for pc in 0..insts.len() {
        if insts[pc].opcode == Opcode::Jump {
            let target = insts[pc].operand as usize;
            if matches!(insts[target].opcode, Opcode::Accept | Opcode::Fail) {
                insts[pc] = insts[target];
            }
        }
    }
}

/// Drops unreachable instructions and `Nop`s, remapping every target.
fn elide_unreachable(insts: &mut Vec<Inst>) {
    let len = insts.len();
    let mut reachable = vec![false; len];
    let mut stack = vec![0usize];
    while let Some(pc) = stack.pop() {
        if pc >= len || reachable[pc] {
            continue;
        }
        reachable[pc] = true;
        let inst = insts[pc];
        match inst.opcode {
            Opcode::Accept | Opcode::Fail => {}
            Opcode::Jump => stack.push(inst.operand as usize),
            Opcode::Split | Opcode::Lookahead | Opcode::NegLookahead => {
                stack.push(pc + 1);
                stack.push(inst.operand as usize);
            }
            Opcode::RepeatEnd => {
                stack.push(pc + 1);
                stack.push(inst.operand as usize + 1);
            }
            _ => stack.push(pc + 1),
        }
    }

    let keep: Vec<bool> = (0..len)
        .map(|pc| reachable[pc] && insts[pc].opcode != Opcode::Nop)
        .collect();
    if keep.iter().all(|&k| k) {
        return;
    }
    // A target that lands on a dropped `Nop` slides forward to the next
    // kept instruction.
    let mut forward = vec![0u32; len + 1];
    let mut next = len as u32;
    for pc in (0..len).rev() {
        if keep[pc] {
            next = pc as u32;
        }
        forward[pc] = next;
    }
    forward[len] = len as u32;
    let mut new_index = vec![0u32; len + 1];
    let mut emitted = 0u32;
    for pc in 0..len {
        new_index[pc] = emitted;
        if keep[pc] {
            emitted += 1;
        }
    }
    new_index[len] = emitted;

    let remap = |target: u32, forward: &[u32], new_index: &[u32]| {
        new_index[forward[target as usize] as usize]
    };
    let mut out = Vec::with_capacity(emitted as usize);
    for pc in 0..len {
        if !keep[pc] {
            continue;
        }
        let mut inst = insts[pc];
        match inst.opcode {
            Opcode::Jump
            | Opcode::Split
            | Opcode::Lookahead
            | Opcode::NegLookahead
            | Opcode::RepeatEnd => {
                inst.operand = remap(inst.operand, &forward, &new_index);
            }
            _ => {}
        }
        out.push(inst);
    }
    *insts = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{nfa, syntax::parse};

    fn program_from_ast(pattern: &str) -> Program {
        let config = Config::default();
        let parsed = parse(pattern, Flags::empty(), &config).unwrap();
        from_ast(
            &parsed.ast,
            pattern,
            Flags::empty(),
            parsed.stats.capture_count,
            &config,
        )
        .unwrap()
    }

    fn program_from_automaton(pattern: &str) -> Program {
        let config = Config::default();
        let parsed = parse(pattern, Flags::empty(), &config).unwrap();
        let automaton = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        from_automaton(
            &automaton,
            pattern,
            Flags::empty(),
            parsed.stats.capture_count,
            &config,
        )
        .unwrap()
    }

    fn opcodes(program: &Program) -> Vec<Opcode> {
        program.insts().iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn literal_lowering() {
        let program = program_from_ast("ab");
        assert_eq!(
            opcodes(&program),
            vec![Opcode::MatchChar, Opcode::MatchChar, Opcode::Accept]
        );
    }

    #[test]
    fn match_any_for_full_class() {
        let program = program_from_ast(r"[\s\S]");
        assert_eq!(opcodes(&program), vec![Opcode::MatchAny, Opcode::Accept]);
    }

    #[test]
    fn split_prefers_fallthrough_branch() {
        // Greedy star: fall-through enters the repeat, the branch exits.
        let program = program_from_ast("a*");
        let insts = program.insts();
        assert_eq!(insts[0].opcode, Opcode::Split);
        assert_eq!(insts[1].opcode, Opcode::RepeatStart);
        assert_eq!(insts[insts[0].operand as usize].opcode, Opcode::Accept);
    }

    #[test]
    fn reluctant_star_prefers_exit() {
        let program = program_from_ast("a*?");
        let insts = program.insts();
        assert_eq!(insts[0].opcode, Opcode::Split);
        // Fall-through reaches Accept without consuming anything.
        assert_eq!(insts[1].opcode, Opcode::Accept);
        assert_eq!(insts[insts[0].operand as usize].opcode, Opcode::RepeatStart);
    }

    #[test]
    fn class_table_is_deduped() {
        let program = program_from_ast(r"\d\d[0-9]");
        assert_eq!(program.classes().len(), 1);
    }

    #[test]
    fn counted_repeat_scaffolding() {
        let program = program_from_ast("a{2,500}");
        let ops = opcodes(&program);
        assert!(ops.contains(&Opcode::RepeatStart));
        assert!(ops.contains(&Opcode::RepeatEnd));
        assert!(program.needs_backtrack());
        let start_pc = ops.iter().position(|&o| o == Opcode::RepeatStart).unwrap();
        let (min, max, greedy) =
            crate::bytecode::unpack_repeat(program.insts()[start_pc].operand);
        assert_eq!((min, max, greedy), (2, Some(500), true));
    }

    #[test]
    fn small_repeat_unrolls() {
        let program = program_from_ast("a{2,4}");
        let ops = opcodes(&program);
        assert!(!ops.contains(&Opcode::RepeatStart));
        assert_eq!(ops.iter().filter(|&&o| o == Opcode::MatchChar).count(), 4);
    }

    #[test]
    fn oversized_repeat_bound_is_rejected() {
        let config = Config::default();
        let parsed = parse(r"(a)\1{5000}", Flags::empty(), &config).unwrap();
        let err = from_ast(&parsed.ast, "", Flags::empty(), 1, &config).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LimitExceeded);
    }

    #[test]
    fn lookahead_scaffolding() {
        let program = program_from_ast("a(?=bc)d");
        let insts = program.insts();
        let head = insts
            .iter()
            .position(|i| i.opcode == Opcode::Lookahead)
            .unwrap();
        let cont = insts[head].operand as usize;
        // The body sits between the head and the continuation and ends
        // with Accept.
        assert_eq!(insts[cont - 1].opcode, Opcode::Accept);
        assert!(cont > head + 1);
        assert_eq!(insts[cont].opcode, Opcode::MatchChar);
    }

    #[test]
    fn backref_lowering() {
        let program = program_from_ast(r"(a+)\1");
        let ops = opcodes(&program);
        assert!(ops.contains(&Opcode::Backref));
        assert!(program.needs_backtrack());
    }

    #[test]
    fn automaton_lowering_runs_same_shape() {
        let program = program_from_automaton("a(b|c)*d");
        let ops = opcodes(&program);
        assert!(ops.contains(&Opcode::Split));
        assert!(ops.contains(&Opcode::Accept));
        assert!(!program.needs_backtrack());
        // Saves for group 1 survived lowering.
        assert!(ops.contains(&Opcode::SaveStart));
        assert!(ops.contains(&Opcode::SaveEnd));
    }

    #[test]
    fn automaton_lowering_elides_unreachable() {
        let config = Config::builder().optimize_automaton(true).build();
        let parsed = parse("ab", Flags::empty(), &config).unwrap();
        let automaton = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        let optimized = from_automaton(&automaton, "ab", Flags::empty(), 0, &config).unwrap();

        let relaxed = Config::builder().optimize_automaton(false).build();
        let raw = from_automaton(&automaton, "ab", Flags::empty(), 0, &relaxed).unwrap();
        assert!(optimized.instruction_count() <= raw.instruction_count());
    }

    #[test]
    fn optimizer_folds_jump_chains() {
        let mut insts = vec![
            Inst::new(Opcode::Split, 2),
            Inst::new(Opcode::Jump, 3),
            Inst::new(Opcode::Jump, 4),
            Inst::new(Opcode::Jump, 4),
            Inst::new(Opcode::Accept, 0),
        ];
        optimize(&mut insts);
        // The split now targets the terminal directly and jumps to Accept
        // collapse into Accept.
        assert_eq!(insts[0].opcode, Opcode::Split);
        assert_eq!(insts[insts[0].operand as usize].opcode, Opcode::Accept);
        assert!(insts.iter().all(|i| i.opcode != Opcode::Nop));
    }

    #[test]
    fn optimizer_drops_unreachable_code() {
        let mut insts = vec![
            Inst::new(Opcode::Jump, 3),
            Inst::new(Opcode::MatchChar, 'x' as u32),
            Inst::new(Opcode::MatchChar, 'y' as u32),
            Inst::new(Opcode::Accept, 0),
        ];
        optimize(&mut insts);
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].opcode, Opcode::Accept);
    }
}
