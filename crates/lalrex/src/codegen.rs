//! Rendering of the parse table and the lexer DFA into a driver template.

use crate::{
    grammar::{Grammar, TerminalID},
    lexer::Dfa,
    table::{Action, ParseTable},
    util::{display_fn, write_separated},
};
use std::fmt;

/// The Rust driver used when no template is given.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/driver.rs.in");

pub struct Codegen<'g> {
    grammar: &'g Grammar,
    table: &'g ParseTable,
    dfa: &'g Dfa,
}

impl fmt::Display for Codegen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DEFAULT_TEMPLATE))
    }
}

impl<'g> Codegen<'g> {
    pub fn new(grammar: &'g Grammar, table: &'g ParseTable, dfa: &'g Dfa) -> Self {
        Self {
            grammar,
            table,
            dfa,
        }
    }

    /// Replace every `##NAME##` placeholder of `template`.
    ///
    /// The template is scanned once, so placeholders appearing inside the
    /// substituted code are left alone. Names match regardless of case, and
    /// unknown placeholders are kept as is.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() * 2);
        let mut rest = template;
        while let Some(begin) = rest.find("##") {
            out.push_str(&rest[..begin]);
            let after = &rest[begin + 2..];
            let name_len = after
                .find("##")
                .filter(|&len| after[..len].bytes().all(|b| b.is_ascii_alphabetic() || b == b'_'));
            match name_len.and_then(|len| self.expand(&after[..len]).map(|s| (len, s))) {
                Some((len, expanded)) => {
                    out.push_str(&expanded);
                    rest = &after[len + 2..];
                }
                None => {
                    out.push_str("##");
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn expand(&self, name: &str) -> Option<String> {
        let expanded = match &*name.to_ascii_uppercase() {
            "HEADER" => match &self.grammar.header {
                Some(code) => code.clone(),
                None => "pub type Value = ();".to_owned(),
            },
            "FOOTER" => self.grammar.footer.clone().unwrap_or_default(),
            "TABLES" => self.tables().to_string(),
            "DFA" => self.dfa_tables().to_string(),
            "LABELS" => self.labels().to_string(),
            "TERMINAL_ACTIONS" => self.terminal_actions().to_string(),
            "ACTIONS" => self.rule_actions().to_string(),
            "ERROR_TOKEN" => TerminalID::ERROR.into_raw().to_string(),
            "EOF" => TerminalID::EOI.into_raw().to_string(),
            "WHITESPACE" => TerminalID::WHITESPACE.into_raw().to_string(),
            _ => return None,
        };
        Some(expanded)
    }

    fn tables(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            writeln!(f, "static ACTIONS: &[&[(u16, Action)]] = &[")?;
            for (id, row) in &self.table.states {
                let mut actions: Vec<_> = row.actions.iter().collect();
                actions.sort_by_key(|(t, _)| **t);
                write!(f, "    /* {:?} */ &[", id)?;
                write_separated(
                    f,
                    actions.iter().map(|(t, action)| {
                        display_fn(move |f| {
                            write!(f, "({}, ", t.into_raw())?;
                            match action {
                                Action::Shift(to) => write!(f, "Action::Shift({}))", to.into_raw()),
                                Action::Reduce(r) => write!(f, "Action::Reduce({}))", r.into_raw()),
                                Action::Accept => f.write_str("Action::Accept)"),
                                Action::Error => f.write_str("Action::Error)"),
                            }
                        })
                    }),
                    ", ",
                )?;
                writeln!(f, "],")?;
            }
            writeln!(f, "];")?;

            writeln!(f, "static GOTOS: &[&[(u16, u16)]] = &[")?;
            for (id, row) in &self.table.states {
                let mut gotos: Vec<_> = row
                    .gotos
                    .iter()
                    .map(|(n, to)| (n.into_raw(), to.into_raw()))
                    .collect();
                gotos.sort_unstable();
                write!(f, "    /* {:?} */ &[", id)?;
                write_separated(
                    f,
                    gotos
                        .iter()
                        .map(|(n, to)| display_fn(move |f| write!(f, "({}, {})", n, to))),
                    ", ",
                )?;
                writeln!(f, "],")?;
            }
            writeln!(f, "];")?;

            write!(f, "static DEFAULT_REDUCE: &[Option<u16>] = &[")?;
            write_separated(
                f,
                self.table.states.values().map(|row| {
                    display_fn(move |f| match row.default_reduce {
                        Some(r) => write!(f, "Some({})", r.into_raw()),
                        None => f.write_str("None"),
                    })
                }),
                ", ",
            )?;
            writeln!(f, "];")?;

            writeln!(f, "/// `(left-hand side, length of right-hand side)` of each rule.")?;
            write!(f, "static RULES: &[(u16, usize)] = &[")?;
            write_separated(
                f,
                self.grammar.rules.values().map(|rule| {
                    display_fn(move |f| {
                        write!(f, "({}, {})", rule.left().into_raw(), rule.right().len())
                    })
                }),
                ", ",
            )?;
            writeln!(f, "];")
        })
    }

    fn dfa_tables(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            write!(f, "static BYTE_CLASSES: [u16; 256] = [")?;
            write_separated(
                f,
                self.dfa.classes.as_slice().iter().map(|c| c.into_raw()),
                ", ",
            )?;
            writeln!(f, "];")?;

            writeln!(f, "static DFA_TRANSITIONS: &[&[(u16, u32)]] = &[")?;
            for state in &self.dfa.states {
                let mut transitions: Vec<_> = state
                    .transitions
                    .iter()
                    .map(|(c, to)| (c.into_raw(), to.index()))
                    .collect();
                transitions.sort_unstable();
                f.write_str("    &[")?;
                write_separated(
                    f,
                    transitions
                        .iter()
                        .map(|(c, to)| display_fn(move |f| write!(f, "({}, {})", c, to))),
                    ", ",
                )?;
                writeln!(f, "],")?;
            }
            writeln!(f, "];")?;

            write!(f, "static DFA_ACCEPT: &[Option<u16>] = &[")?;
            write_separated(
                f,
                self.dfa.states.iter().map(|state| {
                    display_fn(move |f| match state.accept {
                        Some(t) => write!(f, "Some({})", t.into_raw()),
                        None => f.write_str("None"),
                    })
                }),
                ", ",
            )?;
            writeln!(f, "];")
        })
    }

    fn labels(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            write!(f, "static TERMINAL_LABELS: &[&str] = &[")?;
            write_separated(
                f,
                self.grammar
                    .terminals
                    .values()
                    .map(|t| format!("{:?}", t.to_string())),
                ", ",
            )?;
            writeln!(f, "];")?;

            write!(f, "static NONTERMINAL_LABELS: &[&str] = &[")?;
            write_separated(
                f,
                self.grammar
                    .nonterminals
                    .values()
                    .map(|n| format!("{:?}", n.to_string())),
                ", ",
            )?;
            writeln!(f, "];")
        })
    }

    fn terminal_actions(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            for terminal in self.grammar.terminals.values() {
                if let Some(code) = terminal.action() {
                    writeln!(f, "// {}", terminal)?;
                    writeln!(f, "{} => {{ {} }}", terminal.id().into_raw(), code.trim())?;
                }
            }
            Ok(())
        })
    }

    fn rule_actions(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            for rule in self.grammar.rules.values() {
                if let Some(code) = rule.action() {
                    writeln!(f, "// {}", rule.display(self.grammar))?;
                    writeln!(f, "{} => {{ {} }}", rule.id().into_raw(), code.trim())?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::SymbolID::*, pipeline};

    fn grammar() -> Grammar {
        Grammar::define(|g| {
            let num = g.terminal("NUM", None)?;
            let plus = g.terminal("PLUS", None)?;
            g.token(num, "[0-9]+")?;
            g.token(plus, "\\+")?;
            g.whitespace(" +")?;
            g.terminal_action(num, "text.parse().unwrap_or(0)")?;

            let expr = g.nonterminal("expr")?;
            let add = g.rule(expr, [N(expr), T(plus), T(num)], None)?;
            g.rule(expr, [T(num)], None)?;
            g.action(add, "args[0] + args[2]")?;
            g.header("pub type Value = i64;");
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn default_template_is_fully_expanded() {
        let g = grammar();
        let out = pipeline::generate(&g);
        let (table, dfa) = (out.table.unwrap(), out.dfa.unwrap());
        let code = Codegen::new(&g, &table, &dfa).to_string();

        assert!(!code.contains("##"), "{}", code);
        assert!(code.contains("pub type Value = i64;"));
        assert!(code.contains("const ERROR_TOKEN: u16 = 1;"));
        assert!(code.contains("const EOF: u16 = 0;"));
        assert!(code.contains("const WHITESPACE: u16 = 2;"));
        assert!(code.contains("text.parse().unwrap_or(0)"));
        assert!(code.contains("args[0] + args[2]"));
        assert!(code.contains("\"NUM\""));
    }

    #[test]
    fn render_custom_template() {
        let g = grammar();
        let out = pipeline::generate(&g);
        let (table, dfa) = (out.table.unwrap(), out.dfa.unwrap());
        let codegen = Codegen::new(&g, &table, &dfa);

        assert_eq!(
            codegen.render("eof=##EOF##, error=##ERROR_TOKEN##, ws=##WHITESPACE##"),
            "eof=0, error=1, ws=2"
        );
        assert_eq!(codegen.render("a ## b ##UNKNOWN## c"), "a ## b ##UNKNOWN## c");
        assert_eq!(codegen.render("##FOOTER##"), "");
        assert_eq!(codegen.render("##eof##/##Error_Token##"), "0/1");
    }
}
