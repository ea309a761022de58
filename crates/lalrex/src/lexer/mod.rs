//! Lexical analysis: token patterns are compiled into a single NFA, which is
//! then determinized and minimized.

pub mod dfa;
pub mod minimize;
pub mod nfa;
pub mod pattern;

pub use self::{
    dfa::{to_dfa, Dfa},
    minimize::minimize,
    nfa::Nfa,
};

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, Diagnostics},
    grammar::Grammar,
};

/// Compile every token pattern of `g` into one NFA.
///
/// A pattern that fails to parse is reported as an `InvalidPattern` error
/// and left out of the automaton.
#[tracing::instrument(skip_all)]
pub fn build_nfa(g: &Grammar, diags: &mut Diagnostics) -> Nfa {
    let mut nfa = Nfa::new();
    for token in &g.tokens {
        if let Err(err) = pattern::compile(&mut nfa, token) {
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::InvalidPattern,
                    format!(
                        "token `{}': pattern \"{}\": {}",
                        g.terminals[&token.terminal], token.pattern, err
                    ),
                )
                .with_symbol(token.terminal),
            );
        }
    }
    tracing::trace!("{} NFA states from {} patterns", nfa.states.len(), g.tokens.len());
    nfa
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_patterns_are_reported() {
        let g = Grammar::define(|def| {
            let num = def.terminal("NUM", None)?;
            let bad = def.terminal("BAD", None)?;
            def.token(num, "[0-9]+")?;
            def.token(bad, "(a")?;
            let expr = def.nonterminal("expr")?;
            def.rule(expr, [num], None)?;
            Ok(())
        })
        .unwrap();

        let mut diags = Diagnostics::default();
        let nfa = build_nfa(&g, &mut diags);
        assert_eq!(nfa.starts.len(), 1);
        assert_eq!(diags.of_kind(DiagnosticKind::InvalidPattern).count(), 1);
        assert!(diags.has_errors());

        let dump = nfa.display(&g).to_string();
        assert!(dump.starts_with("## starts: N#"), "{}", dump);
        assert!(dump.contains("(accept NUM)"), "{}", dump);
        assert!(dump.contains("- [0-9] => N#"), "{}", dump);
        assert!(!dump.contains("BAD"), "{}", dump);
    }
}
