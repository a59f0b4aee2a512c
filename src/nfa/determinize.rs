/*!
Subset construction.

Each DFA state corresponds to an epsilon-closed set of NFA states.
Capture-save labels are treated as epsilon (a DFA answers extent questions,
not capture questions), and any automaton carrying zero-width predicates is
rejected up front by the caller via [`Automaton::is_determinizable`].

The alphabet is the set of atomic input classes derived from every class
transition in the NFA: within one atomic class, all transitions agree, so a
single witness character per class decides every move.
*/

use std::collections::HashMap;

use itertools::Itertools;

use crate::{
    config::Config,
    error::{Error, Result},
    nfa::{Automaton, AutomatonKind, Label, State, StateId, Transition},
    syntax::ClassSet,
};

/// Converts an NFA into an equivalent DFA by subset construction.
pub(crate) fn determinize(nfa: &Automaton, config: &Config) -> Result<Automaton> {
    if !nfa.is_determinizable() {
        return Err(Error::unsupported(
            "automaton carries zero-width predicates; subset construction skipped",
        ));
    }
    let alphabet = input_classes(nfa);
    let mut closures: HashMap<u32, Vec<u32>> = HashMap::new();

    let mut dfa_states: Vec<State> = Vec::new();
    let mut set_ids: HashMap<Vec<u32>, u32> = HashMap::new();
    let mut worklist: Vec<Vec<u32>> = Vec::new();

    let start_set = closure_of(nfa, &mut closures, &[nfa.start.0]);
    set_ids.insert(start_set.clone(), 0);
    dfa_states.push(State {
        transitions: Vec::new(),
        accept: accepts(nfa, &start_set),
    });
    worklist.push(start_set);

    while let Some(set) = worklist.pop() {
        let from = set_ids[&set];
        for &(lo, hi) in &alphabet {
            let mut moved: Vec<u32> = Vec::new();
            for &id in &set {
                for t in &nfa.states[id as usize].transitions {
                    if let Label::Class(class) = &t.label {
                        if class.contains(lo) {
                            moved.push(t.to.0);
                        }
                    }
                }
            }
            if moved.is_empty() {
                continue;
            }
            let target_set = closure_of(nfa, &mut closures, &moved);
            let to = match set_ids.get(&target_set) {
                Some(&id) => id,
                None => {
                    if dfa_states.len() >= config.max_states {
                        return Err(Error::limit("subset construction exceeds max_states"));
                    }
                    let id = dfa_states.len() as u32;
                    set_ids.insert(target_set.clone(), id);
                    dfa_states.push(State {
                        transitions: Vec::new(),
                        accept: accepts(nfa, &target_set),
                    });
                    worklist.push(target_set);
                    id
                }
            };
            dfa_states[from as usize].transitions.push(Transition {
                to: StateId(to),
                label: Label::Class(ClassSet::from_ranges([(lo, hi)])),
                priority: 0,
            });
        }
    }

    debug!(
        "subset construction: {} NFA states -> {} DFA states",
        nfa.state_count(),
        dfa_states.len()
    );
    Ok(Automaton {
        kind: AutomatonKind::Dfa,
        flags: nfa.flags(),
        states: dfa_states,
        start: StateId(0),
        subs: Vec::new(),
    })
}

/// The epsilon closure of `seed`, sorted and deduplicated. Per-state
/// closures are cached across the whole construction.
fn closure_of(nfa: &Automaton, cache: &mut HashMap<u32, Vec<u32>>, seed: &[u32]) -> Vec<u32> {
    let mut out: Vec<u32> = Vec::new();
    for &id in seed {
        if !cache.contains_key(&id) {
            let mut closure = Vec::new();
            let mut stack = vec![id];
            while let Some(s) = stack.pop() {
                if closure.contains(&s) {
                    continue;
                }
                closure.push(s);
                for t in &nfa.states[s as usize].transitions {
                    if matches!(t.label, Label::Epsilon | Label::Save { .. }) {
                        stack.push(t.to.0);
                    }
                }
            }
            cache.insert(id, closure);
        }
        out.extend_from_slice(&cache[&id]);
    }
    out.sort_unstable();
    out.dedup();
    out
}

fn accepts(nfa: &Automaton, set: &[u32]) -> bool {
    set.iter().any(|&id| nfa.states[id as usize].accept)
}

/// Splits the character space into atomic intervals: within one interval,
/// every class transition in the automaton either matches all of it or none
/// of it.
pub(crate) fn input_classes(automaton: &Automaton) -> Vec<(char, char)> {
    let mut boundaries: Vec<u32> = Vec::new();
    let mut covered: Vec<(u32, u32)> = Vec::new();
    for state in &automaton.states {
        for t in &state.transitions {
            if let Label::Class(class) = &t.label {
                for (lo, hi) in class.materialize() {
                    boundaries.push(lo as u32);
                    boundaries.push(hi as u32 + 1);
                    covered.push((lo as u32, hi as u32));
                }
            }
        }
    }
    let mut classes = Vec::new();
    for (start, end) in boundaries.into_iter().sorted_unstable().dedup().tuple_windows() {
        let (lo, hi) = (start, end - 1);
        if !covered.iter().any(|&(clo, chi)| clo <= lo && hi <= chi) {
            continue;
        }
        // Interval endpoints came from valid scalars, but the interior may
        // straddle the surrogate gap; clamp around it.
        if lo < 0xd800 && hi > 0xdfff {
            classes.push((char_of(lo), char_of(0xd7ff)));
            classes.push((char_of(0xe000), char_of(hi)));
        } else if (0xd800..=0xdfff).contains(&lo) {
            continue;
        } else {
            classes.push((char_of(lo), char_of(hi)));
        }
    }
    classes
}

fn char_of(scalar: u32) -> char {
    char::from_u32(scalar).expect("interval endpoint is a scalar value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{nfa, syntax::parse, Flags};

    fn dfa(pattern: &str) -> Automaton {
        let config = Config::default();
        let parsed = parse(pattern, Flags::empty(), &config).unwrap();
        let nfa = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        determinize(&nfa, &config).unwrap()
    }

    fn run(dfa: &Automaton, input: &str) -> bool {
        crate::nfa::dfa_accepts_window(dfa, input.as_bytes(), 0, input.len())
    }

    #[test]
    fn no_epsilon_transitions() {
        let dfa = dfa("a*b|c");
        for state in &dfa.states {
            for t in &state.transitions {
                assert!(matches!(t.label, Label::Class(_)));
            }
        }
    }

    #[test]
    fn deterministic_on_each_symbol() {
        let dfa = dfa("(ab|ac)*");
        for state in &dfa.states {
            for (i, a) in state.transitions.iter().enumerate() {
                for b in &state.transitions[i + 1..] {
                    let (Label::Class(ca), Label::Class(cb)) = (&a.label, &b.label) else {
                        unreachable!();
                    };
                    let (alo, ahi) = ca.ranges()[0];
                    let (blo, bhi) = cb.ranges()[0];
                    assert!(ahi < blo || bhi < alo, "overlapping symbol classes");
                }
            }
        }
    }

    #[test]
    fn accepts_same_strings() {
        let dfa = dfa("a*b|c");
        assert!(run(&dfa, "b"));
        assert!(run(&dfa, "aaab"));
        assert!(run(&dfa, "c"));
        assert!(!run(&dfa, "a"));
        assert!(!run(&dfa, "cb"));
        assert!(!run(&dfa, ""));
    }

    #[test]
    fn empty_pattern_accepts_empty() {
        let dfa = dfa("");
        assert!(run(&dfa, ""));
        assert!(!run(&dfa, "x"));
    }

    #[test]
    fn predicates_are_rejected() {
        let config = Config::default();
        let parsed = parse("^a", Flags::empty(), &config).unwrap();
        let nfa = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        assert!(determinize(&nfa, &config).is_err());
    }

    #[test]
    fn atomic_input_classes() {
        let config = Config::default();
        let parsed = parse("[a-m]|[g-z]", Flags::empty(), &config).unwrap();
        let nfa = nfa::build(&parsed.ast, Flags::empty(), &config).unwrap();
        let classes = input_classes(&nfa);
        assert!(classes.contains(&('a', 'f')));
        assert!(classes.contains(&('g', 'm')));
        assert!(classes.contains(&('n', 'z')));
    }
}
