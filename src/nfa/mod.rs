/*!
The automaton: arena-allocated states and transitions, Thompson
construction from the AST, subset construction to a DFA and DFA
minimization.

States and transitions live in contiguous vectors and refer to each other
through dense integer ids, so cloning an automaton is a plain vector copy
and there are no reference cycles to manage. Zero-width work (capture
saves, anchors, look-around) rides on transition labels; look-around and
atomic-group bodies compile into sub-automata stored beside the main one.
*/

use crate::{
    config::Config,
    error::{Error, Result},
    flags::Flags,
    syntax::{
        ast::{Anchor, Ast, GroupKind},
        ClassSet,
    },
};

mod determinize;
mod exec;
mod minimize;

pub(crate) use determinize::determinize;
pub(crate) use exec::{
    dfa_accepts_window, dfa_longest_end, AutomatonExec, NfaCache, CLOCK_SAMPLE_PERIOD,
};
pub(crate) use minimize::minimize;

/// Whether an automaton is non-deterministic or the result of subset
/// construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutomatonKind {
    Nfa,
    Dfa,
}

/// A dense state identifier, valid within one automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) u32);

impl StateId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A zero-width condition tested by the runtime without consuming input.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Predicate {
    Anchor(Anchor),
    /// Look-around: run `subs[sub]` at (or ending at) the current position.
    Look {
        sub: u32,
        negated: bool,
        behind: bool,
        /// Fixed byte width of the body; only meaningful when `behind`.
        width: usize,
    },
    /// Possessive sub-match: run `subs[sub]` at the current position, take
    /// its preferred match, and never backtrack into it.
    Atomic { sub: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Label {
    Epsilon,
    /// Consume one character in the class.
    Class(ClassSet),
    /// Record the current position into a capture slot.
    Save { slot: u32 },
    Assert(Predicate),
}

#[derive(Clone, Debug)]
pub(crate) struct Transition {
    pub to: StateId,
    pub label: Label,
    /// Higher priority is explored first; encodes greediness.
    pub priority: i32,
}

#[derive(Clone, Debug, Default)]
pub struct State {
    pub(crate) transitions: Vec<Transition>,
    pub(crate) accept: bool,
}

/// An automaton over character classes with priority-ordered transitions.
#[derive(Clone, Debug)]
pub struct Automaton {
    kind: AutomatonKind,
    flags: Flags,
    pub(crate) states: Vec<State>,
    pub(crate) start: StateId,
    /// Look-around and atomic-group bodies.
    pub(crate) subs: Vec<Automaton>,
}

impl Automaton {
    pub fn kind(&self) -> AutomatonKind {
        self.kind
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }

    /// Total states including sub-automata, for limit accounting.
    pub(crate) fn deep_state_count(&self) -> usize {
        self.state_count() + self.subs.iter().map(Automaton::deep_state_count).sum::<usize>()
    }

    /// Total transitions including sub-automata.
    pub(crate) fn deep_transition_count(&self) -> usize {
        self.transition_count()
            + self
                .subs
                .iter()
                .map(Automaton::deep_transition_count)
                .sum::<usize>()
    }

    pub(crate) fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    /// True if no state carries a zero-width predicate, i.e. the automaton
    /// is eligible for subset construction.
    pub(crate) fn is_determinizable(&self) -> bool {
        self.kind == AutomatonKind::Nfa
            && self.states.iter().all(|s| {
                s.transitions
                    .iter()
                    .all(|t| !matches!(t.label, Label::Assert(_)))
            })
    }
}

/// Lowers an AST into an NFA by Thompson's construction.
pub(crate) fn build(ast: &Ast, flags: Flags, config: &Config) -> Result<Automaton> {
    let mut builder = Builder::new(flags, config);
    let frag = builder.build_fragment(ast)?;
    builder.states[frag.exit.index()].accept = true;
    let mut automaton = Automaton {
        kind: AutomatonKind::Nfa,
        flags,
        states: builder.states,
        start: frag.entry,
        subs: builder.subs,
    };
    sort_by_priority(&mut automaton);
    debug!(
        "thompson build: {} states, {} transitions, {} sub-automata",
        automaton.state_count(),
        automaton.transition_count(),
        automaton.subs.len()
    );
    Ok(automaton)
}

/// Transitions are explored in vector order at run time, so order them by
/// descending priority once here (stable, so construction order breaks
/// ties).
fn sort_by_priority(automaton: &mut Automaton) {
    for state in &mut automaton.states {
        state.transitions.sort_by_key(|t| std::cmp::Reverse(t.priority));
    }
    for sub in &mut automaton.subs {
        sort_by_priority(sub);
    }
}

struct Fragment {
    entry: StateId,
    exit: StateId,
}

struct Builder<'c> {
    flags: Flags,
    config: &'c Config,
    states: Vec<State>,
    subs: Vec<Automaton>,
}

impl<'c> Builder<'c> {
    fn new(flags: Flags, config: &'c Config) -> Builder<'c> {
        Builder {
            flags,
            config,
            states: Vec::new(),
            subs: Vec::new(),
        }
    }

    fn new_state(&mut self) -> Result<StateId> {
        if self.states.len() >= self.config.max_states {
            return Err(Error::limit("automaton exceeds max_states"));
        }
        self.states.push(State::default());
        Ok(StateId((self.states.len() - 1) as u32))
    }

    fn connect(&mut self, from: StateId, to: StateId, label: Label, priority: i32) {
        self.states[from.index()]
            .transitions
            .push(Transition { to, label, priority });
    }

    fn leaf(&mut self, label: Label) -> Result<Fragment> {
        let entry = self.new_state()?;
        let exit = self.new_state()?;
        self.connect(entry, exit, label, 0);
        Ok(Fragment { entry, exit })
    }

    fn build_fragment(&mut self, ast: &Ast) -> Result<Fragment> {
        match ast {
            Ast::Empty => self.leaf(Label::Epsilon),
            Ast::Literal(c) => self.leaf(Label::Class(ClassSet::single(*c))),
            Ast::Class(set) => self.leaf(Label::Class(set.clone())),
            Ast::Dot => self.leaf(Label::Class(ClassSet::dot(self.flags.newline_mode()))),
            Ast::Anchor(Anchor::Keep) => self.leaf(Label::Save { slot: 0 }),
            Ast::Anchor(anchor) => self.leaf(Label::Assert(Predicate::Anchor(*anchor))),
            Ast::Backref(_) => Err(Error::unsupported(
                "backreferences require the bytecode engine",
            )),
            Ast::Concat(children) => {
                let mut frags = Vec::with_capacity(children.len());
                for child in children {
                    frags.push(self.build_fragment(child)?);
                }
                let mut iter = frags.into_iter();
                let first = iter.next().expect("concat is non-empty");
                let mut exit = first.exit;
                for next in iter {
                    self.connect(exit, next.entry, Label::Epsilon, 0);
                    exit = next.exit;
                }
                Ok(Fragment { entry: first.entry, exit })
            }
            Ast::Alternate(alternatives) => {
                let entry = self.new_state()?;
                let exit = self.new_state()?;
                let n = alternatives.len() as i32;
                for (i, alt) in alternatives.iter().enumerate() {
                    let frag = self.build_fragment(alt)?;
                    // Leftmost alternative carries the highest priority.
                    self.connect(entry, frag.entry, Label::Epsilon, n - i as i32);
                    self.connect(frag.exit, exit, Label::Epsilon, 0);
                }
                Ok(Fragment { entry, exit })
            }
            Ast::Repeat { ast, min, max, greedy } => self.build_repeat(ast, *min, *max, *greedy),
            Ast::Group(group) => self.build_group(group),
        }
    }

    fn build_repeat(
        &mut self,
        body: &Ast,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    ) -> Result<Fragment> {
        let entry = self.new_state()?;
        let mut tail = entry;
        for _ in 0..min {
            let frag = self.build_fragment(body)?;
            self.connect(tail, frag.entry, Label::Epsilon, 0);
            tail = frag.exit;
        }
        let (more, out) = if greedy { (1, 0) } else { (0, 1) };
        match max {
            None => {
                // Loop head: prefer another iteration when greedy.
                let head = self.new_state()?;
                let exit = self.new_state()?;
                self.connect(tail, head, Label::Epsilon, 0);
                let frag = self.build_fragment(body)?;
                self.connect(head, frag.entry, Label::Epsilon, more);
                self.connect(head, exit, Label::Epsilon, out);
                self.connect(frag.exit, head, Label::Epsilon, 0);
                Ok(Fragment { entry, exit })
            }
            Some(max) => {
                // `min` mandatory copies then `max - min` optional ones;
                // every skip edge bails straight to the exit.
                let exit = self.new_state()?;
                for _ in min..max {
                    let frag = self.build_fragment(body)?;
                    let fork = self.new_state()?;
                    self.connect(tail, fork, Label::Epsilon, 0);
                    self.connect(fork, frag.entry, Label::Epsilon, more);
                    self.connect(fork, exit, Label::Epsilon, out);
                    tail = frag.exit;
                }
                self.connect(tail, exit, Label::Epsilon, 0);
                Ok(Fragment { entry, exit })
            }
        }
    }

    fn build_group(&mut self, group: &crate::syntax::ast::Group) -> Result<Fragment> {
        match &group.kind {
            GroupKind::Capturing { .. } => {
                let capture = group.capture.expect("capturing group has a capture number");
                let frag = self.build_fragment(&group.ast)?;
                let entry = self.new_state()?;
                let exit = self.new_state()?;
                self.connect(entry, frag.entry, Label::Save { slot: 2 * capture }, 0);
                self.connect(frag.exit, exit, Label::Save { slot: 2 * capture + 1 }, 0);
                Ok(Fragment { entry, exit })
            }
            GroupKind::NonCapturing => {
                let frag = self.build_fragment(&group.ast)?;
                let entry = self.new_state()?;
                let exit = self.new_state()?;
                self.connect(entry, frag.entry, Label::Epsilon, 0);
                self.connect(frag.exit, exit, Label::Epsilon, 0);
                Ok(Fragment { entry, exit })
            }
            GroupKind::Atomic => {
                let sub = self.build_sub(&group.ast)?;
                self.leaf(Label::Assert(Predicate::Atomic { sub }))
            }
            GroupKind::Lookahead { negated } => {
                let sub = self.build_sub(&group.ast)?;
                self.leaf(Label::Assert(Predicate::Look {
                    sub,
                    negated: *negated,
                    behind: false,
                    width: 0,
                }))
            }
            GroupKind::Lookbehind { negated } => {
                let Some(width) = group.ast.fixed_utf8_width() else {
                    return Err(Error::unsupported(
                        "variable-width look-behind is not supported",
                    ));
                };
                let sub = self.build_sub(&group.ast)?;
                self.leaf(Label::Assert(Predicate::Look {
                    sub,
                    negated: *negated,
                    behind: true,
                    width,
                }))
            }
        }
    }

    /// Compiles a group body into its own automaton; capture slots keep
    /// their pattern-global numbering.
    fn build_sub(&mut self, ast: &Ast) -> Result<u32> {
        let sub = build(ast, self.flags, self.config)?;
        self.subs.push(sub);
        Ok((self.subs.len() - 1) as u32)
    }
}
