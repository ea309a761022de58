//! Hopcroft minimization of the lexical DFA.

use super::dfa::{ClassID, Dfa, DfaState, DfaStateID};
use crate::{
    grammar::TerminalID,
    types::{Map, Queue},
};

/// Merge the states of `dfa` that accept the same token and move into
/// equivalent states on every byte class.
///
/// Missing transitions lead to an implicit dead state. The start state keeps
/// the id 0, and the remaining states are numbered by their smallest member.
#[tracing::instrument(skip_all)]
pub fn minimize(dfa: &Dfa) -> Dfa {
    let n = dfa.states.len();
    if n <= 1 {
        return dfa.clone();
    }

    // inverse[target][class] = predecessors of `target` on `class`
    let mut inverse: Vec<Map<ClassID, Vec<usize>>> = vec![Map::default(); n];
    for (i, state) in dfa.states.iter().enumerate() {
        for (class, target) in &state.transitions {
            inverse[target.index()].entry(*class).or_default().push(i);
        }
    }

    let mut initial = Map::<Option<TerminalID>, Vec<usize>>::default();
    for (i, state) in dfa.states.iter().enumerate() {
        initial.entry(state.accept).or_default().push(i);
    }
    let mut blocks: Vec<Vec<usize>> = initial.into_values().collect();
    let mut block_of = vec![0; n];
    for (b, block) in blocks.iter().enumerate() {
        for &s in block {
            block_of[s] = b;
        }
    }

    let mut splitters: Queue<(usize, ClassID)> = (0..blocks.len())
        .flat_map(|b| dfa.classes.iter().map(move |c| (b, c)))
        .collect();

    let mut marked = vec![false; n];
    while let Some((splitter, class)) = splitters.pop() {
        let mut touched: Vec<usize> = vec![];
        for &target in &blocks[splitter] {
            let Some(preds) = inverse[target].get(&class) else {
                continue;
            };
            for &pred in preds {
                if !marked[pred] {
                    marked[pred] = true;
                    touched.push(block_of[pred]);
                }
            }
        }
        touched.sort_unstable();
        touched.dedup();

        for b in touched {
            let (inside, outside): (Vec<usize>, Vec<usize>) =
                blocks[b].iter().copied().partition(|&s| marked[s]);
            if outside.is_empty() {
                continue;
            }
            let new_block = blocks.len();
            for &s in &inside {
                block_of[s] = new_block;
            }
            blocks[b] = outside;
            blocks.push(inside);
            for c in dfa.classes.iter() {
                splitters.push((b, c));
                splitters.push((new_block, c));
            }
        }

        for m in marked.iter_mut() {
            *m = false;
        }
    }

    // Renumber by the smallest member state, which keeps the start at 0.
    let mut order: Vec<usize> = (0..blocks.len()).filter(|&b| !blocks[b].is_empty()).collect();
    order.sort_by_key(|&b| blocks[b].iter().min().copied());
    let mut renumber = vec![DfaStateID::START; blocks.len()];
    for (new_id, &b) in order.iter().enumerate() {
        renumber[b] = DfaStateID::from_raw(new_id as u32);
    }

    let states: Vec<DfaState> = order
        .iter()
        .map(|&b| {
            let members = &blocks[b];
            let representative = &dfa.states[members.iter().copied().min().unwrap_or_default()];
            let mut nfa_states: Vec<_> = members
                .iter()
                .flat_map(|&s| dfa.states[s].nfa_states.iter().copied())
                .collect();
            nfa_states.sort_unstable();
            nfa_states.dedup();
            DfaState {
                nfa_states,
                transitions: representative
                    .transitions
                    .iter()
                    .map(|(class, target)| (*class, renumber[block_of[target.index()]]))
                    .collect(),
                accept: representative.accept,
            }
        })
        .collect();
    tracing::trace!("minimized {} DFA states into {}", n, states.len());

    Dfa {
        classes: dfa.classes.clone(),
        states,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::TokenDef,
        lexer::{dfa::to_dfa, nfa::Nfa, pattern},
    };

    fn dfa_of(patterns: &[(u16, &str)]) -> Dfa {
        let mut nfa = Nfa::new();
        for (priority, (terminal, source)) in patterns.iter().enumerate() {
            let def = TokenDef {
                terminal: TerminalID::from_raw(*terminal),
                pattern: source.to_string(),
                priority: priority as u32,
            };
            pattern::compile(&mut nfa, &def).unwrap();
        }
        to_dfa(&nfa)
    }

    #[test]
    fn merges_equivalent_states() {
        // `a|b` then `c`: the states after `a` and after `b` are equivalent.
        let dfa = dfa_of(&[(3, "(a|b)c")]);
        let minimized = minimize(&dfa);
        assert!(minimized.states.len() < dfa.states.len());
        assert_eq!(minimized.states.len(), 3);
    }

    #[test]
    fn preserves_language() {
        let dfa = dfa_of(&[
            (3, "if"),
            (4, "[a-z][a-z0-9]*"),
            (5, "[0-9]+"),
            (6, "[0-9]+\\.[0-9]+"),
            (7, "\\+|-"),
        ]);
        let minimized = minimize(&dfa);
        assert!(minimized.states.len() <= dfa.states.len());

        let inputs: &[&[u8]] = &[
            b"if", b"iff", b"i", b"x1y2", b"123", b"12.5", b"12.", b"+", b"-x", b"", b"?",
            b"if+",
        ];
        for input in inputs {
            assert_eq!(
                dfa.longest_match(input),
                minimized.longest_match(input),
                "input {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn start_state_stays_first() {
        let dfa = dfa_of(&[(3, "a+"), (4, "b+")]);
        let minimized = minimize(&dfa);
        assert_eq!(minimized.states[0].accept, None);
        assert_eq!(
            minimized.longest_match(b"aaa"),
            Some((TerminalID::from_raw(3), 3))
        );
        assert_eq!(
            minimized.longest_match(b"bb"),
            Some((TerminalID::from_raw(4), 2))
        );
    }

    #[test]
    fn overlapping_patterns_keep_both_accepts() {
        let dfa = dfa_of(&[(3, "ab"), (4, "a*b")]);
        let minimized = minimize(&dfa);

        for terminal in [3, 4] {
            assert!(minimized
                .states
                .iter()
                .any(|s| s.accept == Some(TerminalID::from_raw(terminal))));
        }
        assert_eq!(
            minimized.longest_match(b"ab"),
            Some((TerminalID::from_raw(3), 2))
        );
        let inputs: &[&[u8]] = &[b"ab", b"b", b"aab", b"a"];
        for input in inputs {
            assert_eq!(
                dfa.longest_match(input),
                minimized.longest_match(input),
                "input {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn keeps_distinct_accepts_apart() {
        let dfa = dfa_of(&[(3, "a"), (4, "b")]);
        let minimized = minimize(&dfa);
        assert_eq!(minimized.states.len(), 3);
    }
}
