//! Calculation of nullable symbols and FIRST sets.

use crate::{
    grammar::{Grammar, NonterminalID, RuleID, SymbolID},
    types::{Map, Queue, Set, TerminalSet},
    util::display_fn,
};
use std::fmt;

#[derive(Debug)]
pub struct FirstSets {
    nulls: Set<NonterminalID>,
    first_sets: Map<NonterminalID, TerminalSet>,
}

impl FirstSets {
    pub fn is_nullable(&self, n: NonterminalID) -> bool {
        self.nulls.contains(&n)
    }

    /// `First(n)`
    pub fn first(&self, n: NonterminalID) -> &TerminalSet {
        &self.first_sets[&n]
    }

    /// `First(symbol)`. A terminal is its own FIRST set.
    pub fn first_of(&self, symbol: SymbolID) -> TerminalSet {
        match symbol {
            SymbolID::T(t) => Some(t).into_iter().collect(),
            SymbolID::N(n) => self.first(n).clone(),
        }
    }

    /// `First(seq lookaheads)`
    pub fn first_of_sequence(&self, seq: &[SymbolID], lookaheads: &TerminalSet) -> TerminalSet {
        let mut res = TerminalSet::default();
        for symbol in seq {
            match symbol {
                SymbolID::T(t) => {
                    res.insert(*t);
                    return res;
                }
                SymbolID::N(n) => {
                    res.union_with(self.first(*n));
                    if !self.is_nullable(*n) {
                        return res;
                    }
                }
            }
        }
        res.union_with(lookaheads);
        res
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (n, first) in &self.first_sets {
                write!(f, "First({}) = {{", g.nonterminals[n])?;
                for (i, t) in first.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {}", g.terminals[&t])?;
                }
                f.write_str(" }")?;
                if self.is_nullable(*n) {
                    f.write_str(" (nullable)")?;
                }
                writeln!(f)?;
            }
            Ok(())
        })
    }
}

#[tracing::instrument(skip_all)]
pub fn compute_first(g: &Grammar) -> FirstSets {
    let nulls = nulls_set(g);
    let first_sets = first_sets(g, &nulls);
    FirstSets { nulls, first_sets }
}

/// Calculate the set of nullable nonterminals.
///
/// Every rule keeps the number of right-hand side occurrences not yet known
/// to be nullable. Rules containing a terminal never reach zero.
fn nulls_set(g: &Grammar) -> Set<NonterminalID> {
    let mut remaining: Map<RuleID, usize> = Map::default();
    let mut occurrences: Map<NonterminalID, Vec<RuleID>> = Map::default();
    let mut nulls = Set::default();
    let mut queue = Queue::default();

    for rule in g.rules.values() {
        if rule.right().iter().any(|s| matches!(s, SymbolID::T(..))) {
            continue;
        }
        for symbol in rule.right() {
            if let SymbolID::N(n) = symbol {
                occurrences.entry(*n).or_default().push(rule.id());
            }
        }
        remaining.insert(rule.id(), rule.right().len());
        if rule.right().is_empty() && nulls.insert(rule.left()) {
            queue.push(rule.left());
        }
    }

    while let Some(n) = queue.pop() {
        let Some(rules) = occurrences.get(&n) else {
            continue;
        };
        for rule in rules {
            let count = &mut remaining[rule];
            *count -= 1;
            if *count == 0 {
                let left = g.rules[rule].left();
                if nulls.insert(left) {
                    tracing::trace!("nullable: {}", g.nonterminals[&left]);
                    queue.push(left);
                }
            }
        }
    }

    nulls
}

/// Solve the constraints `First(X) ⊇ First(Yi)` for every rule
/// `X := Y1 ... Yn` where `Y1 ... Y(i-1)` are nullable.
fn first_sets(g: &Grammar, nulls: &Set<NonterminalID>) -> Map<NonterminalID, TerminalSet> {
    let mut first_sets: Map<NonterminalID, TerminalSet> = g
        .nonterminals
        .keys()
        .map(|n| (*n, TerminalSet::default()))
        .collect();

    // edges[Y] = { X | First(X) ⊇ First(Y) }
    let mut edges: Map<NonterminalID, Set<NonterminalID>> = Map::default();
    for rule in g.rules.values() {
        for symbol in rule.right() {
            match symbol {
                SymbolID::T(t) => {
                    first_sets[&rule.left()].insert(*t);
                    break;
                }
                SymbolID::N(n) => {
                    if *n != rule.left() {
                        edges.entry(*n).or_default().insert(rule.left());
                    }
                    if !nulls.contains(n) {
                        break;
                    }
                }
            }
        }
    }

    let mut queue: Queue<NonterminalID> = first_sets
        .iter()
        .filter(|(_, first)| !first.is_empty())
        .map(|(n, _)| *n)
        .collect();
    while let Some(sub) = queue.pop() {
        let Some(sups) = edges.get(&sub) else {
            continue;
        };
        let subset = first_sets[&sub].clone();
        for sup in sups {
            if first_sets[sup].union_with(&subset) {
                queue.push(*sup);
            }
        }
    }

    first_sets
}
