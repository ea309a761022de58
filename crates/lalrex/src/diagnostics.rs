//! Diagnostics accumulated while generating the automata.

use crate::{
    grammar::{RuleID, SymbolID},
    lalr::StateID,
};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiagnosticKind {
    /// A symbol referenced in a production has no definition.
    UndefinedSymbol,
    /// A nonterminal cannot be derived from the start symbol.
    UnreachableSymbol,
    /// An automaton state has neither actions nor gotos.
    EmptyState,
    /// A parse table cell had more than one candidate action.
    GrammarConflict,
    /// The grammar as a whole cannot produce a parser.
    MalformedGrammar,
    /// A token pattern could not be compiled.
    InvalidPattern,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::UnreachableSymbol | Self::GrammarConflict => Severity::Warning,
            Self::UndefinedSymbol
            | Self::EmptyState
            | Self::MalformedGrammar
            | Self::InvalidPattern => Severity::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub symbol: Option<SymbolID>,
    pub rule: Option<RuleID>,
    pub state: Option<StateID>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            symbol: None,
            rule: None,
            state: None,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<SymbolID>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_rule(mut self, rule: RuleID) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_state(mut self, state: StateID) -> Self {
        self.state = Some(state);
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity(), self.message)
    }
}

/// An append-only list of diagnostics. Stages never abort on their own;
/// the caller inspects [`Diagnostics::error_count`] between stages.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Error => tracing::debug!("{}", diagnostic),
            Severity::Warning => tracing::trace!("{}", diagnostic),
        }
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn count(&self, severity: Severity) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity() == severity)
            .count()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
