/*!
DFA minimization by partition refinement.

The initial partition separates accepting from non-accepting states. Each
round splits blocks whose members disagree on the block reached over some
input class; two states end up equivalent exactly when they agree on accept
status and on the target block for every input class. The result is the
unique minimal DFA for the language.
*/

use std::collections::HashMap;

use crate::{
    nfa::{determinize::input_classes, Automaton, AutomatonKind, Label, State, StateId, Transition},
    syntax::ClassSet,
};

/// Minimizes a DFA produced by subset construction. NFAs are returned
/// unchanged.
pub(crate) fn minimize(dfa: &Automaton) -> Automaton {
    if dfa.kind() != AutomatonKind::Dfa || dfa.states.is_empty() {
        return dfa.clone();
    }
    let alphabet = input_classes(dfa);
    let n = dfa.states.len();

    // block[s] is the current block id of state s.
    let mut block: Vec<u32> = dfa
        .states
        .iter()
        .map(|s| if s.accept { 1 } else { 0 })
        .collect();
    let mut block_count = if dfa.states.iter().any(|s| s.accept)
        && dfa.states.iter().any(|s| !s.accept)
    {
        2
    } else {
        1
    };
    if block_count == 1 {
        // All states agree on acceptance; normalize ids to a single block 0.
        block.iter_mut().for_each(|b| *b = 0);
    }

    loop {
        // Signature: own block plus the target block per input class (None
        // for the dead move).
        let mut next_ids: HashMap<(u32, Vec<Option<u32>>), u32> = HashMap::new();
        let mut next_block = vec![0u32; n];
        for (s, state) in dfa.states.iter().enumerate() {
            let targets: Vec<Option<u32>> = alphabet
                .iter()
                .map(|&(lo, _)| move_of(state, lo).map(|t| block[t.index()]))
                .collect();
            let key = (block[s], targets);
            let id = match next_ids.get(&key) {
                Some(&id) => id,
                None => {
                    let id = next_ids.len() as u32;
                    next_ids.insert(key, id);
                    id
                }
            };
            next_block[s] = id;
        }
        let next_count = next_ids.len() as u32;
        block = next_block;
        if next_count == block_count {
            break;
        }
        block_count = next_count;
    }

    // One state per block; the representative's transitions are relabeled
    // to block targets and merged per target where the intervals allow.
    let mut states: Vec<State> = (0..block_count)
        .map(|_| State::default())
        .collect();
    let mut seen = vec![false; block_count as usize];
    for (s, state) in dfa.states.iter().enumerate() {
        let b = block[s] as usize;
        if seen[b] {
            continue;
        }
        seen[b] = true;
        states[b].accept = state.accept;
        for &(lo, hi) in &alphabet {
            if let Some(t) = move_of(state, lo) {
                states[b].transitions.push(Transition {
                    to: StateId(block[t.index()]),
                    label: Label::Class(ClassSet::from_ranges([(lo, hi)])),
                    priority: 0,
                });
            }
        }
    }

    let start = StateId(block[dfa.start.index()]);
    debug!("minimization: {} -> {} DFA states", n, block_count);
    Automaton {
        kind: AutomatonKind::Dfa,
        flags: dfa.flags(),
        states,
        start,
        subs: Vec::new(),
    }
}

fn move_of(state: &State, witness: char) -> Option<StateId> {
    state.transitions.iter().find_map(|t| match &t.label {
        Label::Class(class) if class.contains(witness) => Some(t.to),
        _ => None,
    })
}
