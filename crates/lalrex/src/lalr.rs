//! Construction of the LALR(1) automaton.
//!
//! States are interned by their kernel cores, so two LR(1) item sets with
//! the same cores always end up as one state whose lookaheads are the union
//! of both. Whenever the lookaheads of a kernel grow, the state is queued
//! again and the growth is propagated to its successors until nothing
//! changes.

use crate::{
    first_sets::FirstSets,
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    types::{Map, Queue, TerminalSet},
    util::display_fn,
};
use indexmap::map::Entry;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u16);
impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}
impl StateID {
    pub const INITIAL: Self = Self(0);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u16 {
        self.0
    }

    fn from_index(index: usize) -> Result<Self, TooManyStates> {
        u16::try_from(index).map(Self).map_err(|_| TooManyStates)
    }
}

/// The automaton needs more states than a `StateID` can number.
#[derive(Debug, thiserror::Error)]
#[error("the automaton needs more than {} states", u16::MAX as usize + 1)]
pub struct TooManyStates;

/// An LR item without its lookaheads: a production and the marker position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LRItemCore {
    pub rule: RuleID,
    pub marker: u16,
}
impl LRItemCore {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let rule = &g.rules[&self.rule];
            write!(f, "{} -> [", g.nonterminals[&rule.left()])?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == self.marker as usize {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if rule.right().len() == self.marker as usize {
                f.write_str(" .")?;
            }
            f.write_str(" ]")
        })
    }

    /// The symbol right after the marker, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.rules[&self.rule]
            .right()
            .get(self.marker as usize)
            .copied()
    }
}

#[derive(Debug, Clone)]
pub struct LalrState {
    pub id: StateID,
    /// Kernel cores in ascending order.
    pub kernels: Vec<LRItemCore>,
    /// Kernel and closure items with their lookaheads.
    pub items: Map<LRItemCore, TerminalSet>,
    pub shifts: Map<TerminalID, StateID>,
    pub gotos: Map<NonterminalID, StateID>,
}

impl LalrState {
    /// The completed items of this state with their lookaheads.
    pub fn reduces<'a>(
        &'a self,
        g: &'a Grammar,
    ) -> impl Iterator<Item = (RuleID, &'a TerminalSet)> + 'a {
        self.items
            .iter()
            .filter(move |(core, _)| core.next_symbol(g).is_none())
            .map(|(core, lookaheads)| (core.rule, lookaheads))
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            writeln!(f, "## items:")?;
            for (core, lookaheads) in &self.items {
                let kernel = if self.kernels.contains(core) { "*" } else { "-" };
                write!(f, "{} {} [", kernel, core.display(g))?;
                for (i, t) in lookaheads.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {}", g.terminals[&t])?;
                }
                writeln!(f, " ]")?;
            }
            if !self.shifts.is_empty() {
                writeln!(f, "## shifts:")?;
                for (t, to) in &self.shifts {
                    writeln!(f, "- {} => {:?}", g.terminals[t], to)?;
                }
            }
            if !self.gotos.is_empty() {
                writeln!(f, "## gotos:")?;
                for (n, to) in &self.gotos {
                    writeln!(f, "- {} => {:?}", g.nonterminals[n], to)?;
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct Automaton {
    pub states: Map<StateID, LalrState>,
}

impl Automaton {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (id, state)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:?}", id)?;
                write!(f, "{}", state.display(g))?;
            }
            Ok(())
        })
    }
}

type Kernel = Map<LRItemCore, TerminalSet>;

/// Build the LALR(1) automaton of `g`.
///
/// The grammar must have a start symbol; otherwise the automaton is empty.
#[tracing::instrument(skip_all)]
pub fn build(g: &Grammar, first_sets: &FirstSets) -> Result<Automaton, TooManyStates> {
    if g.accept_rule().is_none() {
        return Ok(Automaton {
            states: Map::default(),
        });
    }

    let mut kernels: Vec<Kernel> = vec![];
    let mut transitions: Vec<Map<SymbolID, StateID>> = vec![];
    let mut isocores = Map::<Vec<LRItemCore>, StateID>::default();

    let initial = LRItemCore {
        rule: RuleID::ACCEPT,
        marker: 0,
    };
    let mut initial_kernel = Kernel::default();
    initial_kernel.insert(initial, Some(TerminalID::EOI).into_iter().collect());
    isocores.insert(vec![initial], StateID::INITIAL);
    kernels.push(initial_kernel);
    transitions.push(Map::default());

    let mut queue: Queue<StateID> = Some(StateID::INITIAL).into_iter().collect();
    let mut num_visits = 0usize;
    while let Some(current) = queue.pop() {
        num_visits += 1;
        let items = closure(g, first_sets, &kernels[current.0 as usize]);

        // Group the advanced items by the symbol after the marker.
        let mut successors = Map::<SymbolID, Kernel>::default();
        for (core, lookaheads) in &items {
            let Some(symbol) = core.next_symbol(g) else {
                continue;
            };
            let advanced = LRItemCore {
                rule: core.rule,
                marker: core.marker + 1,
            };
            successors
                .entry(symbol)
                .or_default()
                .entry(advanced)
                .or_default()
                .union_with(lookaheads);
        }

        let mut edges = Map::default();
        for (symbol, mut kernel) in successors {
            kernel.sort_keys();
            let cores: Vec<LRItemCore> = kernel.keys().copied().collect();
            let next = match isocores.get(&cores) {
                Some(&id) => {
                    // Merge lookaheads into the existing state.
                    let target = &mut kernels[id.0 as usize];
                    let mut changed = false;
                    for (core, lookaheads) in &kernel {
                        changed |= target[core].union_with(lookaheads);
                    }
                    if changed {
                        tracing::trace!("lookaheads of {:?} grew, requeued", id);
                        queue.push(id);
                    }
                    id
                }
                None => {
                    let id = StateID::from_index(kernels.len())?;
                    isocores.insert(cores, id);
                    kernels.push(kernel);
                    transitions.push(Map::default());
                    queue.push(id);
                    id
                }
            };
            edges.insert(symbol, next);
        }
        transitions[current.0 as usize] = edges;
    }
    tracing::trace!("{} states, {} state visits", kernels.len(), num_visits);

    let mut states = Map::default();
    for (i, (kernel, edges)) in kernels.iter().zip(transitions).enumerate() {
        let id = StateID::from_index(i)?;
        let items = closure(g, first_sets, kernel);
        let mut shifts = Map::default();
        let mut gotos = Map::default();
        for (symbol, next) in edges {
            match symbol {
                SymbolID::T(t) => {
                    shifts.insert(t, next);
                }
                SymbolID::N(n) => {
                    gotos.insert(n, next);
                }
            }
        }
        states.insert(
            id,
            LalrState {
                id,
                kernels: kernel.keys().copied().collect(),
                items,
                shifts,
                gotos,
            },
        );
    }

    Ok(Automaton { states })
}

/// Expand the kernel items into the full LR(1) item set.
///
/// For `[A := α . B β, L]`, the items `[B := . γ, First(β L)]` are added for
/// every production of `B`. An item is processed again whenever its
/// lookaheads grow.
fn closure(g: &Grammar, first_sets: &FirstSets, kernel: &Kernel) -> Map<LRItemCore, TerminalSet> {
    let mut items = kernel.clone();
    let mut queue: Queue<LRItemCore> = kernel.keys().copied().collect();
    while let Some(core) = queue.pop() {
        let rule = &g.rules[&core.rule];
        let marker = core.marker as usize;
        let Some(SymbolID::N(n)) = rule.right().get(marker) else {
            continue;
        };
        let lookaheads = first_sets.first_of_sequence(&rule.right()[marker + 1..], &items[&core]);
        for production in g.rules_of(*n) {
            let item = LRItemCore {
                rule: production.id(),
                marker: 0,
            };
            let changed = match items.entry(item) {
                Entry::Occupied(mut entry) => entry.get_mut().union_with(&lookaheads),
                Entry::Vacant(entry) => {
                    entry.insert(lookaheads.clone());
                    true
                }
            };
            if changed {
                queue.push(item);
            }
        }
    }
    items
}
