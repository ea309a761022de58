//! One generation run, from a grammar to its parse table and lexer DFA.
//!
//! Stages run in a fixed order. After the integrity checks and after each
//! stage that can report errors, the run stops if any error has been recorded
//! so far; the outputs of the skipped stages stay `None`. Warnings never stop
//! a run.

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, Diagnostics},
    first_sets::{compute_first, FirstSets},
    grammar::Grammar,
    integrity, lalr,
    lalr::Automaton,
    lexer::{self, Dfa, Nfa},
    table::{self, ParseTable},
};

#[derive(Debug, Clone)]
pub struct Config {
    minimize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self { minimize: true }
    }

    /// Whether the lexer DFA is minimized. Enabled by default.
    pub fn minimize(&mut self, enabled: bool) -> &mut Self {
        self.minimize = enabled;
        self
    }

    /// Run every stage on `g`.
    #[tracing::instrument(skip_all)]
    pub fn generate(&self, g: &Grammar) -> Output {
        let mut out = Output::default();
        let diags = &mut out.diagnostics;

        let first_sets = compute_first(g);

        integrity::check_start(g, diags);
        integrity::check_undefined(g, diags);
        integrity::check_unreachable(g, diags);
        if diags.has_errors() {
            out.first_sets = Some(first_sets);
            return out;
        }

        let automaton = match lalr::build(g, &first_sets) {
            Ok(automaton) => automaton,
            Err(err) => {
                diags.push(Diagnostic::new(
                    DiagnosticKind::MalformedGrammar,
                    err.to_string(),
                ));
                out.first_sets = Some(first_sets);
                return out;
            }
        };
        let table = table::generate(g, &automaton, diags);
        integrity::check_empty_states(&table, diags);
        let stats = table.stats();
        tracing::info!(
            "LALR(1): {} states, {} shifts, {} reduces, {} gotos, {} conflicts",
            stats.states,
            stats.shifts,
            stats.reduces,
            stats.gotos,
            stats.conflicts,
        );
        out.first_sets = Some(first_sets);
        out.automaton = Some(automaton);
        out.table = Some(table);
        if out.diagnostics.has_errors() {
            return out;
        }

        let nfa = lexer::build_nfa(g, &mut out.diagnostics);
        if out.diagnostics.has_errors() {
            out.nfa = Some(nfa);
            return out;
        }

        let raw_dfa = lexer::to_dfa(&nfa);
        let dfa = if self.minimize {
            lexer::minimize(&raw_dfa)
        } else {
            raw_dfa.clone()
        };
        tracing::info!(
            "lexer: {} NFA states, {} DFA states ({} after minimization), {} byte classes",
            nfa.states.len(),
            raw_dfa.states.len(),
            dfa.states.len(),
            dfa.classes.len(),
        );
        out.nfa = Some(nfa);
        out.raw_dfa = Some(raw_dfa);
        out.dfa = Some(dfa);

        out
    }
}

/// Everything a run produced. A stage output is `None` when an earlier
/// error stopped the run before that stage.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Output {
    pub diagnostics: Diagnostics,
    pub first_sets: Option<FirstSets>,
    pub automaton: Option<Automaton>,
    pub table: Option<ParseTable>,
    pub nfa: Option<Nfa>,
    /// The DFA straight from subset construction.
    pub raw_dfa: Option<Dfa>,
    /// The DFA handed to code generation.
    pub dfa: Option<Dfa>,
}

impl Output {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Run every stage on `g` with the default configuration.
pub fn generate(g: &Grammar) -> Output {
    Config::new().generate(g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::DiagnosticKind,
        grammar::{Grammar, SymbolID::*},
    };

    fn arithmetic() -> Grammar {
        Grammar::define(|g| {
            let plus = g.terminal("PLUS", None)?;
            let star = g.terminal("STAR", None)?;
            let lparen = g.terminal("LPAREN", None)?;
            let rparen = g.terminal("RPAREN", None)?;
            let num = g.terminal("NUM", None)?;
            g.token(plus, "\\+")?;
            g.token(star, "\\*")?;
            g.token(lparen, "\\(")?;
            g.token(rparen, "\\)")?;
            g.token(num, "[0-9]+")?;
            g.whitespace("[ \\t\\n]+")?;

            let expr = g.nonterminal("expr")?;
            let term = g.nonterminal("term")?;
            let factor = g.nonterminal("factor")?;
            g.rule(expr, [N(expr), T(plus), N(term)], None)?;
            g.rule(expr, [N(term)], None)?;
            g.rule(term, [N(term), T(star), N(factor)], None)?;
            g.rule(term, [N(factor)], None)?;
            g.rule(factor, [T(lparen), N(expr), T(rparen)], None)?;
            g.rule(factor, [T(num)], None)?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn runs_every_stage() {
        let g = arithmetic();
        let out = generate(&g);
        assert!(out.is_success());
        assert!(out.diagnostics.is_empty());
        assert!(out.first_sets.is_some());
        assert_eq!(out.table.as_ref().map(|t| t.conflicts.len()), Some(0));
        let dfa = out.dfa.as_ref().unwrap();
        let raw = out.raw_dfa.as_ref().unwrap();
        assert!(dfa.states.len() <= raw.states.len());
        assert_eq!(
            dfa.longest_match(b"123 + 4"),
            Some((g.tokens[4].terminal, 3))
        );
    }

    #[test]
    fn round_trip_is_identical() {
        let g = arithmetic();
        let a = generate(&g);
        let b = generate(&g);

        let (ta, tb) = (a.table.unwrap(), b.table.unwrap());
        assert_eq!(ta.states.len(), tb.states.len());
        for (ra, rb) in ta.states.values().zip(tb.states.values()) {
            assert_eq!(ra.actions, rb.actions);
            assert_eq!(ra.gotos, rb.gotos);
            assert_eq!(ra.default_reduce, rb.default_reduce);
        }

        let (da, db) = (a.dfa.unwrap(), b.dfa.unwrap());
        assert_eq!(da.states, db.states);
        assert_eq!(da.classes.as_slice(), db.classes.as_slice());
    }

    #[test]
    fn undefined_symbol_stops_before_tables() {
        let g = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let s = g.nonterminal("S")?;
            let x = g.nonterminal("x")?;
            g.rule(s, [T(a), N(x)], None)?;
            Ok(())
        })
        .unwrap();

        let out = generate(&g);
        assert!(!out.is_success());
        assert_eq!(
            out.diagnostics
                .of_kind(DiagnosticKind::UndefinedSymbol)
                .count(),
            1
        );
        assert!(out.first_sets.is_some());
        assert!(out.automaton.is_none());
        assert!(out.table.is_none());
        assert!(out.dfa.is_none());
    }

    #[test]
    fn warnings_do_not_stop_the_run() {
        let g = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            g.token(a, "a")?;
            let s = g.nonterminal("S")?;
            let z = g.nonterminal("Z")?;
            g.rule(s, [T(a)], None)?;
            g.rule(z, [T(a)], None)?;
            Ok(())
        })
        .unwrap();

        let out = generate(&g);
        assert!(out.is_success());
        assert_eq!(out.diagnostics.warning_count(), 1);
        assert!(out.dfa.is_some());
    }

    #[test]
    fn invalid_pattern_stops_before_dfa() {
        let g = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            g.token(a, "[a")?;
            let s = g.nonterminal("S")?;
            g.rule(s, [T(a)], None)?;
            Ok(())
        })
        .unwrap();

        let out = generate(&g);
        assert!(!out.is_success());
        assert!(out.table.is_some());
        assert!(out.nfa.is_some());
        assert!(out.raw_dfa.is_none());
    }

    #[test]
    fn minimization_can_be_disabled() {
        let g = arithmetic();
        let out = Config::new().minimize(false).generate(&g);
        let (raw, dfa) = (out.raw_dfa.unwrap(), out.dfa.unwrap());
        assert_eq!(raw.states, dfa.states);
    }
}
