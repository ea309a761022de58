//! Grammar types.

use crate::{
    syntax::{self as s, SyntaxError},
    types::Map,
    util::display_fn,
};
use std::{fmt, fs, io, marker::PhantomData, path::Path};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}
impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(0);

    /// Reserved symbol used as an error token.
    pub const ERROR: Self = Self::new(1);

    /// Reserved symbol produced by whitespace patterns. The generated
    /// driver discards it instead of passing it to the parser.
    pub const WHITESPACE: Self = Self::new(2);

    const OFFSET: u16 = 3;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self::new(raw)
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    export_name: Option<String>,
    precedence: Option<Precedence>,
    action: Option<String>,
}
impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }

    pub fn export_name(&self) -> Option<&str> {
        self.export_name.as_deref()
    }

    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }

    /// The code executed by the driver when this token is matched.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }
}
impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            TerminalID::EOI => f.write_str("$eoi"),
            TerminalID::ERROR => f.write_str("$error"),
            TerminalID::WHITESPACE => f.write_str("$whitespace"),
            _ => f.write_str(self.export_name().unwrap_or("<unknown>")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}
impl NonterminalID {
    /// The augmented start symbol, `$start`.
    pub const START: Self = Self::new(0);
    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    export_name: Option<String>,
}
impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }
    pub fn export_name(&self) -> Option<&str> {
        self.export_name.as_deref()
    }
}
impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            NonterminalID::START => f.write_str("$start"),
            _ => f.write_str(self.export_name().unwrap_or("<unknown>")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}
impl From<TerminalID> for SymbolID {
    fn from(t: TerminalID) -> Self {
        Self::T(t)
    }
}
impl From<NonterminalID> for SymbolID {
    fn from(n: NonterminalID) -> Self {
        Self::N(n)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}

impl RuleID {
    /// The augmented rule `$start := S`.
    pub const ACCEPT: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Rule {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
    precedence: Option<Precedence>,
    action: Option<String>,
}
impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    /// The semantic action attached to this production.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// The effective precedence: the explicit one if given, otherwise
    /// the precedence of the rightmost terminal.
    pub fn precedence(&self, g: &Grammar) -> Option<Precedence> {
        match self.precedence {
            Some(prec) => Some(prec),
            None => {
                for symbol in self.right.iter().rev() {
                    if let SymbolID::T(t) = symbol {
                        return g.terminals[t].precedence();
                    }
                }
                None
            }
        }
    }

    // `"LHS := R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} :=", g.nonterminals[&self.left()])?;
            if self.right.is_empty() {
                return write!(f, " @empty");
            }
            for symbol in self.right() {
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct Precedence {
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Nonassoc => write!(f, "nonassoc"),
        }
    }
}

/// A lexical pattern producing a terminal symbol.
#[derive(Debug, Clone)]
pub struct TokenDef {
    pub terminal: TerminalID,
    pub pattern: String,
    /// Declaration order. On equal match length the lowest value wins.
    pub priority: u32,
}

/// The grammar definition used to derive the parser tables.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub rules: Map<RuleID, Rule>,
    pub start_symbol: Option<NonterminalID>,
    pub tokens: Vec<TokenDef>,
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            write!(f, "{}", terminal)?;
            if let Some(prec) = terminal.precedence() {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if Some(nonterminal.id()) == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            write!(f, "{}", rule.display(self))?;
            if let Some(prec) = &rule.precedence {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        if !self.tokens.is_empty() {
            writeln!(f, "\n## tokens:")?;
            for token in &self.tokens {
                writeln!(
                    f,
                    "{} = \"{}\"",
                    self.terminals[&token.terminal], token.pattern
                )?;
            }
        }

        Ok(())
    }
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarDefError> {
        let source = fs::read_to_string(path).map_err(GrammarDefError::IO)?;
        Self::from_str(&source)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(source: &str) -> Result<Grammar, GrammarDefError> {
        let grammar = s::parse(source)?;
        Grammar::define(|g| define_grammar_from_syntax(g, grammar))
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: Map::default(),
            tokens: vec![],
            start: None,
            header: None,
            footer: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
            next_rule_id: RuleID::OFFSET,
            _marker: PhantomData,
        };

        for id in [TerminalID::EOI, TerminalID::ERROR, TerminalID::WHITESPACE] {
            def.terminals.insert(
                id,
                Terminal {
                    id,
                    export_name: None,
                    precedence: None,
                    action: None,
                },
            );
        }

        def.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                export_name: None,
            },
        );

        f(&mut def)?;

        Ok(def.end())
    }

    /// Iterate over the production rules whose left-hand side is `n`.
    pub fn rules_of(&self, n: NonterminalID) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.values().filter(move |rule| rule.left == n)
    }

    /// The rule `$start := S`, if a start symbol is known.
    pub fn accept_rule(&self) -> Option<&Rule> {
        self.rules.get(&RuleID::ACCEPT)
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &dyn fmt::Display {
        match symbol {
            SymbolID::T(t) => &self.terminals[&t],
            SymbolID::N(n) => &self.nonterminals[&n],
        }
    }
}

fn define_grammar_from_syntax(
    g: &mut GrammarDef<'_>,
    mut grammar: s::ast::Grammar,
) -> Result<(), GrammarDefError> {
    // Symbols must be known before the rules referring to them.
    // The sort is stable, so token priorities follow the file order.
    grammar.stmts.sort_by_key(|stmt| match stmt {
        s::ast::Stmt::PrecDesc(..) => 0,
        s::ast::Stmt::TerminalDesc(..) | s::ast::Stmt::WhitespaceDesc(..) => 1,
        s::ast::Stmt::NonterminalDesc(..) => 2,
        s::ast::Stmt::RuleDesc(..) => 3,
        s::ast::Stmt::StartDesc(..) => 4,
        s::ast::Stmt::CodeDesc(..) => 5,
    });

    let mut precedences = Map::default();
    let mut next_priority = 0;
    let mut terminals = Map::default();
    let mut nonterminals = Map::default();

    for desc in grammar.stmts {
        match desc {
            s::ast::Stmt::PrecDesc(s::ast::PrecDesc { configs, ident }) => {
                let mut assoc = None;
                for config in &configs {
                    match (&*config.key, &*config.value) {
                        ("assoc", "left") => assoc = Some(Assoc::Left),
                        ("assoc", "right") => assoc = Some(Assoc::Right),
                        ("assoc", "none" | "nonassoc") => assoc = Some(Assoc::Nonassoc),
                        _ => return Err("unexpected config in @prec desc".into()),
                    }
                }
                let assoc = assoc.unwrap_or(Assoc::Nonassoc);
                precedences.insert(ident, Precedence::new(next_priority, assoc));
                next_priority += 1;
            }

            s::ast::Stmt::TerminalDesc(s::ast::TerminalDesc { configs, defs }) => {
                let mut prec = None;
                for config in &configs {
                    match &*config.key {
                        "prec" => prec = Some(config.value.clone()),
                        _ => return Err("unexpected config in @terminal desc".into()),
                    }
                }
                let prec = match prec {
                    Some(prec) => Some(
                        precedences
                            .get(&prec)
                            .copied()
                            .ok_or_else(|| format!("missing precedence name: `{}'", prec))?,
                    ),
                    None => None,
                };
                for def in defs {
                    let symbol = g.terminal(&def.name, prec)?;
                    if let Some(pattern) = &def.pattern {
                        g.token(symbol, pattern)?;
                    }
                    if let Some(code) = def.action {
                        g.terminal_action(symbol, code)?;
                    }
                    terminals.insert(def.name, symbol);
                }
            }

            s::ast::Stmt::WhitespaceDesc(s::ast::WhitespaceDesc { patterns }) => {
                for pattern in &patterns {
                    g.whitespace(pattern)?;
                }
            }

            s::ast::Stmt::NonterminalDesc(s::ast::NonterminalDesc { idents }) => {
                for name in idents {
                    let symbol = g.nonterminal(&name)?;
                    nonterminals.insert(name, symbol);
                }
            }

            s::ast::Stmt::StartDesc(s::ast::StartDesc { name }) => {
                let start_symbol = nonterminals
                    .get(&name)
                    .copied()
                    .ok_or_else(|| format!("unknown start symbol: `{}'", name))?;
                g.start_symbol(start_symbol)?;
            }

            s::ast::Stmt::RuleDesc(s::ast::RuleDesc { left, productions }) => {
                let left = match nonterminals.get(&left) {
                    Some(s) => *s,
                    None => {
                        if terminals.contains_key(&left) {
                            return Err(format!(
                                "the terminal `{}' cannot be the left-hand side of a rule",
                                left
                            )
                            .into());
                        }
                        let id = g.nonterminal(&left)?;
                        nonterminals.insert(left, id);
                        id
                    }
                };

                for production in productions {
                    let mut prec = None;
                    for config in &production.configs {
                        match &*config.key {
                            "prec" => {
                                prec = Some(precedences.get(&config.value).copied().ok_or_else(
                                    || format!("unknown precedence name: `{}'", config.value),
                                )?);
                            }
                            _ => return Err("unexpected config in production".into()),
                        }
                    }

                    let mut right = vec![];
                    for symbol in production.elems {
                        use s::ast::ProductionElem::*;
                        let symbol = match symbol {
                            Ident(symbol) => {
                                let s = terminals
                                    .get(&symbol)
                                    .map(|t| SymbolID::T(*t))
                                    .or_else(|| nonterminals.get(&symbol).map(|n| SymbolID::N(*n)));
                                match s {
                                    Some(s) => s,
                                    None => {
                                        // Unknown names are nonterminals. A missing
                                        // definition is reported by the integrity checks.
                                        let id = g.nonterminal(&symbol)?;
                                        nonterminals.insert(symbol, id);
                                        SymbolID::N(id)
                                    }
                                }
                            }
                            ErrorToken => SymbolID::T(TerminalID::ERROR),
                        };
                        right.push(symbol);
                    }

                    let rule = g.rule(left, right, prec)?;
                    if let Some(code) = production.action {
                        g.action(rule, code)?;
                    }
                }
            }

            s::ast::Stmt::CodeDesc(s::ast::CodeDesc { kind, code }) => match kind {
                s::ast::CodeKind::Header => g.header(code),
                s::ast::CodeKind::Footer => g.footer(code),
            },
        }
    }

    Ok(())
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef<'def> {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule>,
    tokens: Vec<TokenDef>,
    start: Option<NonterminalID>,
    header: Option<String>,
    footer: Option<String>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_rule_id: u16,
    _marker: PhantomData<&'def mut ()>,
}

impl<'def> GrammarDef<'def> {
    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(
        &mut self,
        export_name: &str,
        precedence: Option<Precedence>,
    ) -> Result<TerminalID, GrammarDefError> {
        if !verify_ident(export_name) {
            return Err(GrammarDefError::Other {
                msg: format!("incorrect token name: `{}'", export_name),
            });
        }

        if self.is_exported(export_name) {
            return Err(GrammarDefError::Other {
                msg: format!("The symbol `{}' has already been exported", export_name),
            });
        }

        let id = TerminalID::new(self.next_terminal_id);
        self.next_terminal_id += 1;

        self.terminals.insert(
            id,
            Terminal {
                id,
                export_name: Some(export_name.to_owned()),
                precedence,
                action: None,
            },
        );

        Ok(id)
    }

    /// Associate a lexical pattern with a terminal symbol.
    ///
    /// Patterns are ordered by the call sequence: when two patterns match
    /// the same longest input, the one registered first wins.
    pub fn token(&mut self, terminal: TerminalID, pattern: &str) -> Result<(), GrammarDefError> {
        if !self.terminals.contains_key(&terminal) || terminal == TerminalID::EOI {
            return Err("a pattern must be attached to a declared terminal".into());
        }
        let priority = self.tokens.len() as u32;
        self.tokens.push(TokenDef {
            terminal,
            pattern: pattern.to_owned(),
            priority,
        });
        Ok(())
    }

    /// Register a pattern whose matches are skipped by the generated lexer.
    pub fn whitespace(&mut self, pattern: &str) -> Result<(), GrammarDefError> {
        self.token(TerminalID::WHITESPACE, pattern)
    }

    /// Attach code executed by the generated lexer when `terminal` is matched.
    pub fn terminal_action(
        &mut self,
        terminal: TerminalID,
        code: impl Into<String>,
    ) -> Result<(), GrammarDefError> {
        let terminal = self
            .terminals
            .get_mut(&terminal)
            .ok_or("unknown terminal symbol")?;
        terminal.action = Some(code.into());
        Ok(())
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, export_name: &str) -> Result<NonterminalID, GrammarDefError> {
        if !verify_ident(export_name) {
            return Err(GrammarDefError::Other {
                msg: format!("incorrect symbol name: `{}'", export_name),
            });
        }

        if self.is_exported(export_name) {
            return Err(GrammarDefError::Other {
                msg: format!("The symbol `{}' has already been exported", export_name),
            });
        }

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id += 1;

        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                export_name: Some(export_name.to_owned()),
            },
        );

        Ok(id)
    }

    /// Specify a production rule into this grammer.
    pub fn rule<I>(
        &mut self,
        left: NonterminalID,
        right: I,
        precedence: Option<Precedence>,
    ) -> Result<RuleID, GrammarDefError>
    where
        I: IntoIterator,
        I::Item: Into<SymbolID>,
    {
        if left == NonterminalID::START || !self.nonterminals.contains_key(&left) {
            return Err("invalid left-hand side of production rule".into());
        }

        let right_: Vec<SymbolID> = right.into_iter().map(Into::into).collect();
        for symbol in &right_ {
            let known = match symbol {
                SymbolID::T(t) => *t != TerminalID::EOI && self.terminals.contains_key(t),
                SymbolID::N(n) => *n != NonterminalID::START && self.nonterminals.contains_key(n),
            };
            if !known {
                return Err("invalid symbol in the right-hand side of production rule".into());
            }
        }

        for rule in self.rules.values() {
            if rule.left == left && rule.right == right_ {
                return Err(GrammarDefError::Other {
                    msg: "Duplicate production rule detected".into(),
                });
            }
        }

        let id = RuleID::new(self.next_rule_id);
        self.next_rule_id += 1;
        self.rules.insert(
            id,
            Rule {
                id,
                left,
                right: right_,
                precedence,
                action: None,
            },
        );

        Ok(id)
    }

    /// Attach a semantic action to a production rule.
    pub fn action(&mut self, rule: RuleID, code: impl Into<String>) -> Result<(), GrammarDefError> {
        let rule = self.rules.get_mut(&rule).ok_or("unknown production rule")?;
        rule.action = Some(code.into());
        Ok(())
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarDefError> {
        if symbol == NonterminalID::START || !self.nonterminals.contains_key(&symbol) {
            return Err("invalid start symbol".into());
        }
        self.start.replace(symbol);
        Ok(())
    }

    /// Code emitted before the generated tables.
    pub fn header(&mut self, code: impl Into<String>) {
        self.header = Some(code.into());
    }

    /// Code emitted after the generated tables.
    pub fn footer(&mut self, code: impl Into<String>) {
        self.footer = Some(code.into());
    }

    fn is_exported(&self, name: &str) -> bool {
        self.terminals
            .values()
            .any(|t| t.export_name() == Some(name))
            || self
                .nonterminals
                .values()
                .any(|n| n.export_name() == Some(name))
    }

    fn end(mut self) -> Grammar {
        // Without an explicit start symbol, the left-hand side of the first
        // rule is used. A grammar without either has no accepting rule and
        // is rejected by the integrity checks.
        let start = self
            .start
            .take()
            .or_else(|| self.rules.values().next().map(|rule| rule.left));

        let mut rules = Map::default();
        if let Some(start) = start {
            rules.insert(
                RuleID::ACCEPT,
                Rule {
                    id: RuleID::ACCEPT,
                    left: NonterminalID::START,
                    right: vec![SymbolID::N(start)],
                    precedence: None,
                    action: None,
                },
            );
        }
        rules.extend(self.rules);

        Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules,
            start_symbol: start,
            tokens: self.tokens,
            header: self.header,
            footer: self.footer,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("IO error: {}", _0)]
    IO(io::Error),

    #[error("Syntax error: {}", _0)]
    Syntax(#[from] SyntaxError),

    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for GrammarDefError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for GrammarDefError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

/// Symbol names are emitted as Rust identifiers by the code generator.
fn verify_ident(mut s: &str) -> bool {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        // Also rejects the empty string.
        return false;
    }

    if let Some(raw) = s.strip_prefix("r#") {
        s = raw;
        if matches!(s, "crate" | "self" | "super" | "Self") {
            return false;
        }
    } else if is_strict_keyword(s) || is_reserved(s) {
        return false;
    }

    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => chars.all(is_ident_continue),
        _ => false,
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || unicode_ident::is_xid_start(ch)
}

fn is_ident_continue(ch: char) -> bool {
    unicode_ident::is_xid_continue(ch)
}

fn is_strict_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "break" | "const" | "continue" | "crate" | "else" | "enum" | "extern"
        | "false" | "fn" | "for" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod"
        | "move" | "mut" | "pub" | "ref" | "return" | "self" | "Self" | "static" | "struct"
        | "super" | "trait" | "true" | "type" | "unsafe" | "use" | "where" | "while"
        | "async" | "await" | "dyn"
    )
}

fn is_reserved(s: &str) -> bool {
    matches!(
        s,
        "abstract" | "become" | "box" | "do" | "final" | "macro" | "override" | "priv"
        | "typeof" | "unsized" | "virtual" | "yield" | "try"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use SymbolID::*;

    #[test]
    fn start_symbol_defaults_to_first_rule() {
        let g = Grammar::define(|def| {
            let a = def.terminal("a", None)?;
            let x = def.nonterminal("X")?;
            let s = def.nonterminal("S")?;
            def.rule(s, [N(x)], None)?;
            def.rule(x, [T(a)], None)?;
            Ok(())
        })
        .unwrap();

        let start = g.start_symbol.unwrap();
        assert_eq!(g.nonterminals[&start].export_name(), Some("S"));
        let accept = g.accept_rule().unwrap();
        assert_eq!(accept.left(), NonterminalID::START);
        assert_eq!(accept.right(), &[N(start)]);
        assert_eq!(g.rules.keys().next(), Some(&RuleID::ACCEPT));
    }

    #[test]
    fn grammar_without_rules_has_no_start() {
        let g = Grammar::define(|def| {
            def.terminal("a", None)?;
            Ok(())
        })
        .unwrap();
        assert!(g.start_symbol.is_none());
        assert!(g.accept_rule().is_none());
    }

    #[test]
    fn rejects_invalid_definitions() {
        let res = Grammar::define(|def| {
            def.terminal("fn", None)?;
            Ok(())
        });
        assert!(res.is_err());

        let res = Grammar::define(|def| {
            def.terminal("A", None)?;
            def.nonterminal("A")?;
            Ok(())
        });
        assert!(res.is_err());

        let res = Grammar::define(|def| {
            let a = def.terminal("a", None)?;
            let s = def.nonterminal("S")?;
            def.rule(s, [a], None)?;
            def.rule(s, [a], None)?;
            Ok(())
        });
        assert!(res.is_err());
    }

    #[test]
    fn token_priorities_follow_declaration_order() {
        let g = Grammar::define(|def| {
            let kw = def.terminal("IF", None)?;
            let ident = def.terminal("IDENT", None)?;
            def.token(kw, "if")?;
            def.token(ident, "[a-z]+")?;
            def.whitespace("[ \\t]+")?;
            Ok(())
        })
        .unwrap();
        let priorities: Vec<_> = g.tokens.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, [0, 1, 2]);
        assert_eq!(g.tokens[2].terminal, TerminalID::WHITESPACE);
    }

    #[test]
    fn rule_precedence_falls_back_to_rightmost_terminal() {
        let low = Precedence::new(0, Assoc::Left);
        let high = Precedence::new(1, Assoc::Left);
        let mut rules = vec![];
        let g = Grammar::define(|def| {
            let plus = def.terminal("PLUS", Some(low))?;
            let star = def.terminal("STAR", Some(high))?;
            let num = def.terminal("NUM", None)?;
            let e = def.nonterminal("E")?;
            rules.push(def.rule(e, [N(e), T(plus), N(e)], None)?);
            rules.push(def.rule(e, [N(e), T(star), N(e)], Some(low))?);
            rules.push(def.rule(e, [T(num)], None)?);
            Ok(())
        })
        .unwrap();
        assert_eq!(g.rules[&rules[0]].precedence(&g), Some(low));
        assert_eq!(g.rules[&rules[1]].precedence(&g), Some(low));
        assert_eq!(g.rules[&rules[2]].precedence(&g), None);
        assert_eq!(g.rules[&rules[0]].display(&g).to_string(), "E := E PLUS E");
    }

    #[test]
    fn from_str_lowers_declarations() {
        let g = Grammar::from_str(
            r#"
            @prec { assoc = left } ADD;
            @terminal { prec = ADD } PLUS = "\+";
            @terminal NUM = "[0-9]+" [* println!("num"); *];
            @whitespace " +";
            @rule Expr := Expr PLUS Expr [* a + b *] | NUM | Missing;
            "#,
        )
        .unwrap();

        let plus = g
            .terminals
            .values()
            .find(|t| t.export_name() == Some("PLUS"))
            .unwrap();
        assert_eq!(plus.precedence().map(|p| p.assoc), Some(Assoc::Left));

        let num = g
            .terminals
            .values()
            .find(|t| t.export_name() == Some("NUM"))
            .unwrap();
        assert_eq!(num.action(), Some("println!(\"num\");"));

        assert_eq!(g.tokens.len(), 3);
        assert_eq!(g.tokens[0].pattern, "\\+");
        assert_eq!(g.tokens[2].terminal, TerminalID::WHITESPACE);

        // `Missing` becomes a nonterminal without productions.
        let missing = g
            .nonterminals
            .values()
            .find(|n| n.export_name() == Some("Missing"))
            .unwrap();
        assert_eq!(g.rules_of(missing.id()).count(), 0);

        let actions: Vec<_> = g.rules.values().filter_map(|r| r.action()).collect();
        assert_eq!(actions, ["a + b"]);
    }
}
