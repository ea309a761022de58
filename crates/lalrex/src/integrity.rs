//! Grammar integrity checks.
//!
//! None of these checks stop at the first problem; every finding is
//! appended to the diagnostics list.

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, Diagnostics},
    grammar::{Grammar, NonterminalID, RuleID, SymbolID},
    table::ParseTable,
    types::{Queue, Set},
};

/// Report a missing start symbol or a start symbol without productions.
pub fn check_start(g: &Grammar, diags: &mut Diagnostics) {
    match g.start_symbol {
        None => diags.push(Diagnostic::new(
            DiagnosticKind::MalformedGrammar,
            "the grammar has no start symbol",
        )),
        Some(start) if g.rules_of(start).next().is_none() => diags.push(
            Diagnostic::new(
                DiagnosticKind::MalformedGrammar,
                format!(
                    "the start symbol `{}' has no production rules",
                    g.nonterminals[&start]
                ),
            )
            .with_symbol(start),
        ),
        Some(..) => (),
    }
}

/// Report every nonterminal that is referenced in a production but has no
/// production of its own. Each symbol is reported once.
#[tracing::instrument(skip_all)]
pub fn check_undefined(g: &Grammar, diags: &mut Diagnostics) {
    let defined: Set<NonterminalID> = g.rules.values().map(|rule| rule.left()).collect();

    let mut reported = Set::default();
    for rule in g.rules.values() {
        if rule.id() == RuleID::ACCEPT {
            continue;
        }
        for symbol in rule.right() {
            let SymbolID::N(n) = symbol else {
                continue;
            };
            if defined.contains(n) || !reported.insert(*n) {
                continue;
            }
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::UndefinedSymbol,
                    format!(
                        "the nonterminal `{}' is used in `{}' but never defined",
                        g.nonterminals[n],
                        rule.display(g)
                    ),
                )
                .with_symbol(*n)
                .with_rule(rule.id()),
            );
        }
    }
}

/// Report every nonterminal that cannot be derived from the start symbol.
#[tracing::instrument(skip_all)]
pub fn check_unreachable(g: &Grammar, diags: &mut Diagnostics) {
    let Some(start) = g.start_symbol else {
        return;
    };

    let mut reachable = Set::default();
    reachable.insert(NonterminalID::START);
    reachable.insert(start);
    let mut queue: Queue<NonterminalID> = Some(start).into_iter().collect();
    while let Some(n) = queue.pop() {
        for rule in g.rules_of(n) {
            for symbol in rule.right() {
                if let SymbolID::N(next) = symbol {
                    if reachable.insert(*next) {
                        queue.push(*next);
                    }
                }
            }
        }
    }

    for n in g.nonterminals.keys() {
        if reachable.contains(n) {
            continue;
        }
        diags.push(
            Diagnostic::new(
                DiagnosticKind::UnreachableSymbol,
                format!(
                    "the nonterminal `{}' is unreachable from the start symbol",
                    g.nonterminals[n]
                ),
            )
            .with_symbol(*n),
        );
    }
}

/// Report every parser state that has neither actions nor gotos.
pub fn check_empty_states(table: &ParseTable, diags: &mut Diagnostics) {
    for (id, row) in &table.states {
        if row.actions.is_empty() && row.gotos.is_empty() {
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::EmptyState,
                    format!("the state {:?} has no actions", id),
                )
                .with_state(*id),
            );
        }
    }
}
