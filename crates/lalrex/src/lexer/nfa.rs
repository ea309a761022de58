//! Nondeterministic automaton over bytes.

use crate::{
    grammar::{Grammar, TerminalID},
    util::display_fn,
};
use bit_vec::BitVec;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NfaStateID(u32);
impl fmt::Debug for NfaStateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N#{:03}", self.0)
    }
}
impl NfaStateID {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A set of input bytes labelling a transition.
#[derive(Clone, Default)]
pub struct ByteSet {
    inner: bit_set::BitSet,
}

impl PartialEq for ByteSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}
impl Eq for ByteSet {}

impl ByteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(byte: u8) -> Self {
        let mut set = Self::new();
        set.insert(byte);
        set
    }

    pub fn range(lo: u8, hi: u8) -> Self {
        let mut set = Self::new();
        set.insert_range(lo, hi);
        set
    }

    pub fn insert(&mut self, byte: u8) -> bool {
        self.inner.insert(byte.into())
    }

    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for byte in lo..=hi {
            self.insert(byte);
        }
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.inner.contains(byte.into())
    }

    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner);
    }

    /// The bytes not in this set.
    pub fn complement(&self) -> Self {
        (0..=u8::MAX).filter(|b| !self.contains(*b)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.inner.iter().filter_map(|b| u8::try_from(b).ok())
    }
}

impl FromIterator<u8> for ByteSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = Self::new();
        for byte in iter {
            set.insert(byte);
        }
        set
    }
}

// `[a-z0-9_]`
impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        let bytes: Vec<u8> = self.iter().collect();
        let mut i = 0;
        while i < bytes.len() {
            let lo = bytes[i];
            let mut hi = lo;
            while i + 1 < bytes.len() && bytes[i + 1] == hi.wrapping_add(1) {
                hi = bytes[i + 1];
                i += 1;
            }
            write!(f, "{}", std::ascii::escape_default(lo))?;
            if hi > lo {
                write!(f, "-{}", std::ascii::escape_default(hi))?;
            }
            i += 1;
        }
        f.write_str("]")
    }
}

/// The token produced when an NFA state is reached at the end of a match.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TokenAccept {
    pub terminal: TerminalID,
    /// Declaration order of the pattern. Lower wins.
    pub priority: u32,
}

#[derive(Debug, Clone, Default)]
pub struct NfaState {
    pub edges: Vec<(ByteSet, NfaStateID)>,
    pub epsilons: Vec<NfaStateID>,
    pub accept: Option<TokenAccept>,
}

/// The entry and exit of a partially built automaton.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NfaFragment {
    pub start: NfaStateID,
    pub accept: NfaStateID,
}

/// The union of all token automata. Each token contributes one fragment
/// whose start is listed in `starts`.
#[derive(Debug, Clone, Default)]
pub struct Nfa {
    pub states: Vec<NfaState>,
    pub starts: Vec<NfaStateID>,
}

impl Nfa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self) -> NfaStateID {
        let id = NfaStateID(self.states.len() as u32);
        self.states.push(NfaState::default());
        id
    }

    pub fn add_edge(&mut self, from: NfaStateID, label: ByteSet, to: NfaStateID) {
        self.states[from.index()].edges.push((label, to));
    }

    pub fn add_epsilon(&mut self, from: NfaStateID, to: NfaStateID) {
        self.states[from.index()].epsilons.push(to);
    }

    pub fn state(&self, id: NfaStateID) -> &NfaState {
        &self.states[id.index()]
    }

    /// Register a finished token fragment.
    pub fn add_token(&mut self, fragment: NfaFragment, accept: TokenAccept) {
        self.states[fragment.accept.index()].accept = Some(accept);
        self.starts.push(fragment.start);
    }

    /// All states reachable from `seeds` through epsilon edges, in ascending order.
    pub fn epsilon_closure<I>(&self, seeds: I) -> Vec<NfaStateID>
    where
        I: IntoIterator<Item = NfaStateID>,
    {
        let mut visited = BitVec::from_elem(self.states.len(), false);
        let mut stack: Vec<NfaStateID> = vec![];
        for seed in seeds {
            if !visited[seed.index()] {
                visited.set(seed.index(), true);
                stack.push(seed);
            }
        }
        while let Some(id) = stack.pop() {
            for &next in &self.state(id).epsilons {
                if !visited[next.index()] {
                    visited.set(next.index(), true);
                    stack.push(next);
                }
            }
        }
        visited
            .iter()
            .enumerate()
            .filter(|(_, v)| *v)
            .map(|(i, _)| NfaStateID(i as u32))
            .collect()
    }

    /// The states reached from `states` by reading `byte`, before closure.
    pub fn step(&self, states: &[NfaStateID], byte: u8) -> Vec<NfaStateID> {
        let mut next = vec![];
        for &id in states {
            for (label, to) in &self.state(id).edges {
                if label.contains(byte) {
                    next.push(*to);
                }
            }
        }
        next.sort_unstable();
        next.dedup();
        next
    }

    /// The accepting token among `states`: the one declared first.
    pub fn resolve_accept(&self, states: &[NfaStateID]) -> Option<TokenAccept> {
        states
            .iter()
            .filter_map(|id| self.state(*id).accept)
            .min_by_key(|accept| accept.priority)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "## starts:")?;
            for start in &self.starts {
                write!(f, " {:?}", start)?;
            }
            writeln!(f)?;

            for (i, state) in self.states.iter().enumerate() {
                write!(f, "\n#### State {:?}", NfaStateID(i as u32))?;
                if let Some(accept) = state.accept {
                    write!(f, " (accept {})", g.terminals[&accept.terminal])?;
                }
                writeln!(f)?;
                for (label, to) in &state.edges {
                    writeln!(f, "- {:?} => {:?}", label, to)?;
                }
                for to in &state.epsilons {
                    writeln!(f, "- (eps) => {:?}", to)?;
                }
            }
            Ok(())
        })
    }
}
