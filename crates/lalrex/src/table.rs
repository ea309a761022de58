//! Calculation of the LALR(1) parse table with conflict resolution.

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, Diagnostics},
    grammar::{Assoc, Grammar, NonterminalID, Precedence, RuleID, TerminalID},
    lalr::{Automaton, StateID},
    types::Map,
    util::display_fn,
};
use std::{cmp::Ordering, fmt};

#[derive(Debug)]
pub struct ParseTable {
    pub states: Map<StateID, ParseTableRow>,
    /// Every cell that had more than one candidate action.
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug)]
#[non_exhaustive]
pub struct ParseTableRow {
    pub actions: Map<TerminalID, Action>,
    pub gotos: Map<NonterminalID, StateID>,
    /// The reduction that owns most of the cells in this row.
    pub default_reduce: Option<RuleID>,
}

/// The action that the LR automaton in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(RuleID),

    Accept,

    /// Reject the specified lookahead symbol.
    ///
    /// Only inserted by resolving a shift/reduce conflict between
    /// non-associative operators.
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Decided by the precedence and associativity of both sides.
    Precedence,
    /// No precedence on one of the sides. The shift wins.
    PreferShift,
    /// Several reductions. The rule declared first wins.
    EarliestRule,
}

#[derive(Debug, Clone)]
pub struct Conflict {
    pub state: StateID,
    pub lookahead: TerminalID,
    pub shift: Option<StateID>,
    /// The competing reductions in ascending order.
    pub reduces: Vec<RuleID>,
    pub resolved: Action,
    pub resolution: Resolution,
}

impl Conflict {
    /// Whether this conflict was settled by user-declared precedences alone.
    pub fn is_silent(&self) -> bool {
        self.resolution == Resolution::Precedence && self.reduces.len() == 1
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let kind = match (self.shift, self.reduces.len()) {
                (Some(..), 1) => "shift/reduce",
                (Some(..), _) => "shift/reduce/reduce",
                (None, _) => "reduce/reduce",
            };
            write!(
                f,
                "{} conflict in state {:?} on `{}':",
                kind, self.state, g.terminals[&self.lookahead]
            )?;
            if let Some(next) = self.shift {
                write!(f, " shift({:?}),", next)?;
            }
            for (i, reduce) in self.reduces.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, " reduce({})", g.rules[reduce].display(g))?;
            }
            write!(f, "; resolved as {}", display_action(g, &self.resolved))
        })
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub states: usize,
    pub shifts: usize,
    pub reduces: usize,
    pub gotos: usize,
    pub conflicts: usize,
}

impl ParseTable {
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            states: self.states.len(),
            conflicts: self.conflicts.len(),
            ..Default::default()
        };
        for row in self.states.values() {
            for action in row.actions.values() {
                match action {
                    Action::Shift(..) => stats.shifts += 1,
                    Action::Reduce(..) | Action::Accept => stats.reduces += 1,
                    Action::Error => (),
                }
            }
            stats.gotos += row.gotos.len();
        }
        stats
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (i, (id, row)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }

                writeln!(f, "#### State {:?}", id)?;
                writeln!(f, "## actions")?;
                for (token, action) in &row.actions {
                    writeln!(f, "- {} => {}", g.terminals[token], display_action(g, action))?;
                }
                if let Some(reduce) = row.default_reduce {
                    writeln!(f, "- (default) => reduce({})", g.rules[&reduce].display(g))?;
                }

                writeln!(f, "## gotos")?;
                for (symbol, goto) in &row.gotos {
                    writeln!(f, "- {} => goto({:?})", g.nonterminals[symbol], goto)?;
                }
            }

            if !self.conflicts.is_empty() {
                writeln!(f, "\n#### Conflicts")?;
                for conflict in &self.conflicts {
                    writeln!(f, "- {}", conflict.display(g))?;
                }
            }
            Ok(())
        })
    }
}

fn display_action<'g>(g: &'g Grammar, action: &'g Action) -> impl fmt::Display + 'g {
    display_fn(move |f| match action {
        Action::Shift(n) => write!(f, "shift({:?})", n),
        Action::Reduce(reduce) => write!(f, "reduce({})", g.rules[reduce].display(g)),
        Action::Accept => f.write_str("accept"),
        Action::Error => f.write_str("error"),
    })
}

/// Fill the parse table from the automaton.
///
/// Conflicts that were not settled by precedence alone are reported as
/// warnings.
#[tracing::instrument(skip_all)]
pub fn generate(g: &Grammar, automaton: &Automaton, diags: &mut Diagnostics) -> ParseTable {
    let mut states = Map::default();
    let mut conflicts = vec![];
    for (&id, state) in &automaton.states {
        #[derive(Default)]
        struct PendingAction {
            shift: Option<StateID>,
            reduces: Vec<RuleID>,
        }
        let mut pending_actions = Map::<TerminalID, PendingAction>::default();
        for (&t, &next) in &state.shifts {
            pending_actions.entry(t).or_default().shift.replace(next);
        }
        for (reduce, lookaheads) in state.reduces(g) {
            for t in lookaheads.iter() {
                pending_actions.entry(t).or_default().reduces.push(reduce);
            }
        }

        let mut actions: Map<TerminalID, Action> = Map::default();
        for (symbol, mut action) in pending_actions {
            action.reduces.sort();
            action.reduces.dedup();
            let (resolved, resolution) = resolve_conflict(g, symbol, action.shift, &action.reduces);
            if let Some(resolution) = resolution {
                conflicts.push(Conflict {
                    state: id,
                    lookahead: symbol,
                    shift: action.shift,
                    reduces: action.reduces,
                    resolved,
                    resolution,
                });
            }
            actions.insert(symbol, resolved);
        }
        actions.sort_keys();

        let default_reduce = default_reduce(&actions);
        let gotos = state.gotos.clone();
        states.insert(
            id,
            ParseTableRow {
                actions,
                gotos,
                default_reduce,
            },
        );
    }

    for conflict in conflicts.iter().filter(|c| !c.is_silent()) {
        diags.push(
            Diagnostic::new(
                DiagnosticKind::GrammarConflict,
                conflict.display(g).to_string(),
            )
            .with_symbol(conflict.lookahead)
            .with_state(conflict.state),
        );
    }

    ParseTable { states, conflicts }
}

/// Pick a single action for a table cell.
///
/// Returns the resolution used when there was more than one candidate.
fn resolve_conflict(
    g: &Grammar,
    symbol: TerminalID,
    shift: Option<StateID>,
    reduces: &[RuleID],
) -> (Action, Option<Resolution>) {
    let reduce_action = |reduce: RuleID| match reduce {
        RuleID::ACCEPT => Action::Accept,
        reduce => Action::Reduce(reduce),
    };

    match (shift, reduces) {
        (Some(next), []) => (Action::Shift(next), None),
        (None, [reduce]) => (reduce_action(*reduce), None),

        // reduce/reduce conflict(s)
        (None, [first, ..]) => (reduce_action(*first), Some(Resolution::EarliestRule)),

        // shift/reduce conflict, possibly after picking the earliest reduction.
        (Some(next), [first, rest @ ..]) => {
            let shift_prec = g.terminals[&symbol].precedence();
            let reduce_prec = g.rules[first].precedence(g);
            let (action, resolution) = match compare_precs(shift_prec, reduce_prec) {
                Some(PrecDiff::Left) => (Action::Shift(next), Resolution::Precedence),
                Some(PrecDiff::Right) => (reduce_action(*first), Resolution::Precedence),
                Some(PrecDiff::Neither) => (Action::Error, Resolution::Precedence),
                None => (Action::Shift(next), Resolution::PreferShift),
            };
            match action {
                Action::Reduce(..) | Action::Accept if !rest.is_empty() => {
                    (action, Some(Resolution::EarliestRule))
                }
                action => (action, Some(resolution)),
            }
        }

        (None, []) => unreachable!("a pending action always has a candidate"),
    }
}

#[derive(Copy, Clone)]
enum PrecDiff {
    Left,
    Right,
    Neither,
}
fn compare_precs(
    shift_prec: Option<Precedence>,
    reduce_prec: Option<Precedence>,
) -> Option<PrecDiff> {
    match (shift_prec, reduce_prec) {
        (Some(p1), Some(p2)) => match Ord::cmp(&p1.priority, &p2.priority) {
            Ordering::Greater => Some(PrecDiff::Left),
            Ordering::Less => Some(PrecDiff::Right),
            Ordering::Equal => match p1.assoc {
                Assoc::Left => Some(PrecDiff::Right),
                Assoc::Right => Some(PrecDiff::Left),
                Assoc::Nonassoc => Some(PrecDiff::Neither),
            },
        },
        _ => None,
    }
}

/// The reduction occupying the most cells of a row. Ties go to the lowest rule.
fn default_reduce(actions: &Map<TerminalID, Action>) -> Option<RuleID> {
    let mut counts = Map::<RuleID, usize>::default();
    for action in actions.values() {
        if let Action::Reduce(reduce) = action {
            *counts.entry(*reduce).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(r1, c1), (r2, c2)| c1.cmp(c2).then_with(|| r2.cmp(r1)))
        .map(|(reduce, _)| reduce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{first_sets::compute_first, grammar::SymbolID::*, lalr};

    fn generate_table(g: &Grammar) -> (ParseTable, Diagnostics) {
        let automaton = lalr::build(g, &compute_first(g)).unwrap();
        let mut diags = Diagnostics::default();
        let table = generate(g, &automaton, &mut diags);
        (table, diags)
    }

    fn ambiguous_sum(prec: Option<Precedence>) -> (Grammar, TerminalID) {
        // E := E PLUS E | NUM
        let mut plus_id = None;
        let g = Grammar::define(|def| {
            let plus = def.terminal("PLUS", prec)?;
            let num = def.terminal("NUM", None)?;
            let e = def.nonterminal("E")?;
            def.rule(e, [N(e), T(plus), N(e)], None)?;
            def.rule(e, [T(num)], None)?;
            plus_id = Some(plus);
            Ok(())
        })
        .unwrap();
        (g, plus_id.unwrap())
    }

    #[test]
    fn shift_reduce_prefers_shift_and_warns() {
        let (g, plus) = ambiguous_sum(None);
        let (table, diags) = generate_table(&g);

        assert_eq!(table.conflicts.len(), 1);
        let conflict = &table.conflicts[0];
        assert_eq!(conflict.lookahead, plus);
        assert_eq!(conflict.resolution, Resolution::PreferShift);
        assert!(matches!(conflict.resolved, Action::Shift(..)));
        assert_eq!(
            table.states[&conflict.state].actions[&plus],
            conflict.resolved
        );

        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.error_count(), 0);
        let warning = diags.iter().next().unwrap();
        assert_eq!(warning.kind, DiagnosticKind::GrammarConflict);
        assert_eq!(warning.state, Some(conflict.state));
        assert_eq!(warning.symbol, Some(T(plus)));
    }

    #[test]
    fn precedence_resolves_silently() {
        let (g, plus) = ambiguous_sum(Some(Precedence::new(0, Assoc::Left)));
        let (table, diags) = generate_table(&g);

        assert_eq!(table.conflicts.len(), 1);
        let conflict = &table.conflicts[0];
        assert_eq!(conflict.resolution, Resolution::Precedence);
        assert_eq!(conflict.resolved, Action::Reduce(conflict.reduces[0]));
        assert!(diags.is_empty());
        assert_eq!(
            table.states[&conflict.state].actions[&plus],
            conflict.resolved
        );
    }

    #[test]
    fn right_assoc_shifts_and_nonassoc_errors() {
        let (g, _) = ambiguous_sum(Some(Precedence::new(0, Assoc::Right)));
        let (table, diags) = generate_table(&g);
        assert!(matches!(table.conflicts[0].resolved, Action::Shift(..)));
        assert!(diags.is_empty());

        let (g, plus) = ambiguous_sum(Some(Precedence::new(0, Assoc::Nonassoc)));
        let (table, _) = generate_table(&g);
        let conflict = &table.conflicts[0];
        assert_eq!(conflict.resolved, Action::Error);
        assert_eq!(
            table.states[&conflict.state].actions[&plus],
            Action::Error
        );
    }

    #[test]
    fn reduce_reduce_picks_earliest_rule() {
        // S := A | B ; A := x ; B := x
        let mut ids = None;
        let g = Grammar::define(|def| {
            let x = def.terminal("x", None)?;
            let s = def.nonterminal("S")?;
            let a = def.nonterminal("A")?;
            let b = def.nonterminal("B")?;
            def.rule(s, [N(a)], None)?;
            def.rule(s, [N(b)], None)?;
            let ra = def.rule(a, [T(x)], None)?;
            let rb = def.rule(b, [T(x)], None)?;
            ids = Some((ra, rb));
            Ok(())
        })
        .unwrap();
        let (ra, rb) = ids.unwrap();

        let (table, diags) = generate_table(&g);
        assert_eq!(table.conflicts.len(), 1);
        let conflict = &table.conflicts[0];
        assert_eq!(conflict.lookahead, TerminalID::EOI);
        assert_eq!(conflict.reduces, [ra, rb]);
        assert_eq!(conflict.resolved, Action::Reduce(ra));
        assert_eq!(conflict.resolution, Resolution::EarliestRule);
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn shift_beats_several_reduces() {
        // S := A t | B t | a t t ; A := a ; B := a
        let mut ids = None;
        let g = Grammar::define(|def| {
            let a = def.terminal("a", None)?;
            let t = def.terminal("t", None)?;
            let s = def.nonterminal("S")?;
            let na = def.nonterminal("A")?;
            let nb = def.nonterminal("B")?;
            def.rule(s, [N(na), T(t)], None)?;
            def.rule(s, [N(nb), T(t)], None)?;
            def.rule(s, [T(a), T(t), T(t)], None)?;
            let ra = def.rule(na, [T(a)], None)?;
            let rb = def.rule(nb, [T(a)], None)?;
            ids = Some((t, ra, rb));
            Ok(())
        })
        .unwrap();
        let (t, ra, rb) = ids.unwrap();

        let (table, diags) = generate_table(&g);
        assert_eq!(table.conflicts.len(), 1);
        let conflict = &table.conflicts[0];
        assert_eq!(conflict.lookahead, t);
        assert!(conflict.shift.is_some());
        assert_eq!(conflict.reduces, [ra, rb]);
        assert!(matches!(conflict.resolved, Action::Shift(..)));
        assert_eq!(conflict.resolution, Resolution::PreferShift);
        assert_eq!(
            table.states[&conflict.state].actions[&t],
            conflict.resolved
        );
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn accept_and_default_reduce() {
        // E := E PLUS NUM | NUM
        let g = Grammar::define(|def| {
            let plus = def.terminal("PLUS", None)?;
            let num = def.terminal("NUM", None)?;
            let e = def.nonterminal("E")?;
            def.rule(e, [N(e), T(plus), T(num)], None)?;
            def.rule(e, [T(num)], None)?;
            Ok(())
        })
        .unwrap();
        let (table, diags) = generate_table(&g);
        assert!(diags.is_empty());
        assert!(table.conflicts.is_empty());

        let accepting: Vec<_> = table
            .states
            .values()
            .filter(|row| row.actions.get(&TerminalID::EOI) == Some(&Action::Accept))
            .collect();
        assert_eq!(accepting.len(), 1);

        for row in table.states.values() {
            let reduces: Vec<_> = row
                .actions
                .values()
                .filter_map(|a| match a {
                    Action::Reduce(r) => Some(*r),
                    _ => None,
                })
                .collect();
            assert_eq!(row.default_reduce, reduces.first().copied());
        }

        let stats = table.stats();
        assert_eq!(stats.states, table.states.len());
        assert_eq!(stats.gotos, 1);
        assert_eq!(stats.shifts, 3);
    }
}
