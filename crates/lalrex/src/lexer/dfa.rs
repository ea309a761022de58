//! Subset construction of the lexical DFA.

use super::nfa::{Nfa, NfaStateID};
use crate::{
    grammar::{Grammar, TerminalID},
    types::{Map, Queue},
    util::display_fn,
};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassID(u16);
impl ClassID {
    pub const fn into_raw(self) -> u16 {
        self.0
    }
}

/// A partition of the byte alphabet into classes of bytes that no NFA edge
/// can tell apart.
#[derive(Debug, Clone)]
pub struct ByteClasses {
    classes: Vec<ClassID>,
    len: usize,
}

impl ByteClasses {
    /// Group bytes by the set of edges whose label contains them.
    /// Classes are numbered in the order of their smallest byte.
    pub fn compute(nfa: &Nfa) -> Self {
        let labels: Vec<_> = nfa
            .states
            .iter()
            .flat_map(|state| state.edges.iter().map(|(label, _)| label))
            .collect();

        let mut signatures = Map::<Vec<usize>, ClassID>::default();
        let mut classes = Vec::with_capacity(256);
        for byte in 0..=u8::MAX {
            let signature: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, label)| label.contains(byte))
                .map(|(i, _)| i)
                .collect();
            let next = ClassID(signatures.len() as u16);
            classes.push(*signatures.entry(signature).or_insert(next));
        }

        Self {
            classes,
            len: signatures.len(),
        }
    }

    #[inline]
    pub fn get(&self, byte: u8) -> ClassID {
        self.classes[byte as usize]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ClassID> {
        (0..self.len as u16).map(ClassID)
    }

    pub fn bytes(&self, class: ClassID) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |b| self.get(*b) == class)
    }

    /// The smallest byte in `class`.
    pub fn representative(&self, class: ClassID) -> Option<u8> {
        self.bytes(class).next()
    }

    /// The class of every byte value, indexed by byte.
    pub fn as_slice(&self) -> &[ClassID] {
        &self.classes[..]
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DfaStateID(u32);
impl fmt::Debug for DfaStateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D#{:03}", self.0)
    }
}
impl DfaStateID {
    pub const START: Self = Self(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfaState {
    /// The NFA states represented by this state, in ascending order.
    pub nfa_states: Vec<NfaStateID>,
    pub transitions: Map<ClassID, DfaStateID>,
    pub accept: Option<TerminalID>,
}

/// A deterministic automaton recognizing the union of the token patterns.
/// State 0 is the start state.
#[derive(Debug, Clone)]
pub struct Dfa {
    pub classes: ByteClasses,
    pub states: Vec<DfaState>,
}

impl Dfa {
    pub fn state(&self, id: DfaStateID) -> &DfaState {
        &self.states[id.index()]
    }

    pub fn next(&self, current: DfaStateID, byte: u8) -> Option<DfaStateID> {
        self.state(current)
            .transitions
            .get(&self.classes.get(byte))
            .copied()
    }

    /// Run the automaton from the start of `input` and return the token of
    /// the longest non-empty accepted prefix together with its length.
    pub fn longest_match(&self, input: &[u8]) -> Option<(TerminalID, usize)> {
        if self.states.is_empty() {
            return None;
        }
        let mut current = DfaStateID::START;
        let mut last = None;
        for (i, &byte) in input.iter().enumerate() {
            match self.next(current, byte) {
                Some(next) => current = next,
                None => break,
            }
            if let Some(terminal) = self.state(current).accept {
                last = Some((terminal, i + 1));
            }
        }
        last
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            writeln!(f, "## classes:")?;
            for class in self.classes.iter() {
                write!(f, "- {:?} =", class)?;
                for byte in self.classes.bytes(class).take(16) {
                    write!(f, " {}", std::ascii::escape_default(byte))?;
                }
                if self.classes.bytes(class).nth(16).is_some() {
                    f.write_str(" ...")?;
                }
                writeln!(f)?;
            }

            for (i, state) in self.states.iter().enumerate() {
                write!(f, "\n#### State {:?}", DfaStateID(i as u32))?;
                if let Some(terminal) = state.accept {
                    write!(f, " (accept {})", g.terminals[&terminal])?;
                }
                writeln!(f)?;
                for (class, to) in &state.transitions {
                    writeln!(f, "- {:?} => {:?}", class, to)?;
                }
            }
            Ok(())
        })
    }
}

/// Convert `nfa` into an equivalent DFA by subset construction.
///
/// A DFA state accepts the token of its accepting NFA member with the lowest
/// declaration order.
#[tracing::instrument(skip_all)]
pub fn to_dfa(nfa: &Nfa) -> Dfa {
    let classes = ByteClasses::compute(nfa);

    let mut states: Vec<DfaState> = vec![];
    let mut state_map = Map::<Vec<NfaStateID>, DfaStateID>::default();
    let mut intern = |subset: Vec<NfaStateID>, states: &mut Vec<DfaState>| {
        if let Some(&id) = state_map.get(&subset) {
            return (id, false);
        }
        let id = DfaStateID(states.len() as u32);
        states.push(DfaState {
            accept: nfa.resolve_accept(&subset).map(|accept| accept.terminal),
            nfa_states: subset.clone(),
            transitions: Map::default(),
        });
        state_map.insert(subset, id);
        (id, true)
    };

    let (start, _) = intern(nfa.epsilon_closure(nfa.starts.iter().copied()), &mut states);
    let mut queue: Queue<DfaStateID> = Some(start).into_iter().collect();
    while let Some(current) = queue.pop() {
        for class in classes.iter() {
            let Some(byte) = classes.representative(class) else {
                continue;
            };
            let moved = nfa.step(&states[current.index()].nfa_states, byte);
            if moved.is_empty() {
                continue;
            }
            let (next, inserted) = intern(nfa.epsilon_closure(moved), &mut states);
            if inserted {
                queue.push(next);
            }
            states[current.index()].transitions.insert(class, next);
        }
    }
    tracing::trace!("{} DFA states, {} byte classes", states.len(), classes.len());

    Dfa { classes, states }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::TokenDef, lexer::pattern};

    pub(crate) fn nfa_of(patterns: &[(u16, &str)]) -> Nfa {
        let mut nfa = Nfa::new();
        for (priority, (terminal, source)) in patterns.iter().enumerate() {
            let def = TokenDef {
                terminal: TerminalID::from_raw(*terminal),
                pattern: source.to_string(),
                priority: priority as u32,
            };
            pattern::compile(&mut nfa, &def).unwrap();
        }
        nfa
    }

    #[test]
    fn deterministic_and_distinct_accepts() {
        let t_ab = TerminalID::from_raw(3);
        let t_astar_b = TerminalID::from_raw(4);
        let nfa = nfa_of(&[(3, "ab"), (4, "a*b")]);
        let dfa = to_dfa(&nfa);

        // At most one transition per state and class.
        for state in &dfa.states {
            let mut seen = std::collections::HashSet::new();
            for class in state.transitions.keys() {
                assert!(seen.insert(*class));
            }
        }

        assert_eq!(dfa.longest_match(b"ab"), Some((t_ab, 2)));
        assert_eq!(dfa.longest_match(b"b"), Some((t_astar_b, 1)));
        assert_eq!(dfa.longest_match(b"aab"), Some((t_astar_b, 3)));
        assert_eq!(dfa.longest_match(b"aa"), None);
        assert_eq!(dfa.longest_match(b"abab"), Some((t_ab, 2)));
    }

    #[test]
    fn earlier_declaration_wins_on_equal_length() {
        let kw = TerminalID::from_raw(3);
        let ident = TerminalID::from_raw(4);
        let dfa = to_dfa(&nfa_of(&[(3, "if"), (4, "[a-z]+")]));
        assert_eq!(dfa.longest_match(b"if"), Some((kw, 2)));
        assert_eq!(dfa.longest_match(b"iffy"), Some((ident, 4)));
        assert_eq!(dfa.longest_match(b"i"), Some((ident, 1)));
    }

    #[test]
    fn byte_classes_follow_edge_labels() {
        let nfa = nfa_of(&[(3, "[a-z]+"), (4, "[0-9]"), (5, "x")]);
        let classes = ByteClasses::compute(&nfa);
        // {others}, {0-9}, {a-w, y-z}, {x}
        assert_eq!(classes.len(), 4);
        assert_eq!(classes.get(b'a'), classes.get(b'q'));
        assert_ne!(classes.get(b'a'), classes.get(b'x'));
        assert_eq!(classes.get(b'0'), classes.get(b'9'));
        assert_eq!(classes.get(0), classes.get(b'~'));
        assert_eq!(classes.representative(classes.get(b'q')), Some(b'a'));
    }

    #[test]
    fn empty_nfa_yields_single_dead_state() {
        let dfa = to_dfa(&Nfa::new());
        assert_eq!(dfa.states.len(), 1);
        assert!(dfa.states[0].transitions.is_empty());
        assert_eq!(dfa.longest_match(b"abc"), None);
    }
}
