//! Syntax support for grammar files.

pub mod ast;
pub mod lexer;

use self::lexer::{Keyword, Lexer, Spanned, Token};
use std::fmt;

#[derive(Debug, thiserror::Error)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
    pub message: String,
}

impl SyntaxError {
    fn at(loc: lexgen_util::Loc, message: impl Into<String>) -> Self {
        Self {
            line: loc.line + 1,
            column: loc.col + 1,
            message: message.into(),
        }
    }
}

/// Parse the source of a grammar file.
pub fn parse(source: &str) -> Result<ast::Grammar, SyntaxError> {
    let span = tracing::trace_span!("parse");
    let _entered = span.enter();

    let tokens = Lexer::new(source)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| SyntaxError::at(err.location, "invalid token"))?;
    tracing::trace!("{} tokens", tokens.len());

    Parser { tokens, pos: 0 }.grammar()
}

struct Parser<'input> {
    tokens: Vec<Spanned<'input>>,
    pos: usize,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LBracket => f.write_str("`{'"),
            Token::RBracket => f.write_str("`}'"),
            Token::AtLBracket => f.write_str("`@{'"),
            Token::ColonEq => f.write_str("`:='"),
            Token::Eq => f.write_str("`='"),
            Token::Comma => f.write_str("`,'"),
            Token::Semicolon => f.write_str("`;'"),
            Token::VertBar => f.write_str("`|'"),
            Token::Kw(kw) => write!(f, "keyword `@{}'", format!("{:?}", kw).to_lowercase()),
            Token::Ident(ident) => write!(f, "identifier `{}'", ident),
            Token::Pattern(..) => f.write_str("pattern"),
            Token::Code(..) => f.write_str("code block"),
        }
    }
}

impl<'input> Parser<'input> {
    fn peek(&self) -> Option<Token<'input>> {
        self.tokens.get(self.pos).map(|(_, t, _)| *t)
    }

    fn bump(&mut self) -> Option<Token<'input>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, expected: Token<'_>) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &str) -> SyntaxError {
        match self.tokens.get(self.pos) {
            Some((loc, token, _)) => {
                SyntaxError::at(*loc, format!("expected {}, found {}", expected, token))
            }
            None => {
                let loc = self.tokens.last().map(|(_, _, end)| *end).unwrap_or(
                    lexgen_util::Loc {
                        line: 0,
                        col: 0,
                        byte_idx: 0,
                    },
                );
                SyntaxError::at(loc, format!("expected {}, found end of input", expected))
            }
        }
    }

    fn expect(&mut self, expected: Token<'_>) -> Result<(), SyntaxError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&expected.to_string()))
        }
    }

    fn ident(&mut self) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(Token::Ident(ident)) => {
                self.pos += 1;
                Ok(ident.to_owned())
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn pattern(&mut self) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(Token::Pattern(pattern)) => {
                self.pos += 1;
                Ok(pattern.to_owned())
            }
            _ => Err(self.error("pattern")),
        }
    }

    fn code(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Code(code)) => {
                self.pos += 1;
                Some(code.to_owned())
            }
            _ => None,
        }
    }

    fn grammar(&mut self) -> Result<ast::Grammar, SyntaxError> {
        let mut stmts = vec![];
        while self.peek().is_some() {
            stmts.push(self.stmt()?);
            self.expect(Token::Semicolon)?;
        }
        Ok(ast::Grammar { stmts })
    }

    fn stmt(&mut self) -> Result<ast::Stmt, SyntaxError> {
        let stmt = match self.bump() {
            Some(Token::Kw(Keyword::Prec)) => {
                let configs = self.configs()?;
                let ident = self.ident()?;
                ast::Stmt::PrecDesc(ast::PrecDesc { configs, ident })
            }

            Some(Token::Kw(Keyword::Terminal)) => {
                let configs = self.configs()?;
                let mut defs = vec![self.terminal_def()?];
                while self.eat(Token::Comma) {
                    defs.push(self.terminal_def()?);
                }
                ast::Stmt::TerminalDesc(ast::TerminalDesc { configs, defs })
            }

            Some(Token::Kw(Keyword::Whitespace)) => {
                let mut patterns = vec![self.pattern()?];
                while self.eat(Token::Comma) {
                    patterns.push(self.pattern()?);
                }
                ast::Stmt::WhitespaceDesc(ast::WhitespaceDesc { patterns })
            }

            Some(Token::Kw(Keyword::Nonterminal)) => {
                let mut idents = vec![self.ident()?];
                while self.eat(Token::Comma) {
                    idents.push(self.ident()?);
                }
                ast::Stmt::NonterminalDesc(ast::NonterminalDesc { idents })
            }

            Some(Token::Kw(Keyword::Start)) => {
                let name = self.ident()?;
                ast::Stmt::StartDesc(ast::StartDesc { name })
            }

            Some(Token::Kw(Keyword::Rule)) => {
                let left = self.ident()?;
                self.expect(Token::ColonEq)?;
                self.eat(Token::VertBar);
                let mut productions = vec![self.production()?];
                while self.eat(Token::VertBar) {
                    productions.push(self.production()?);
                }
                ast::Stmt::RuleDesc(ast::RuleDesc { left, productions })
            }

            Some(Token::Kw(kw @ (Keyword::Header | Keyword::Footer))) => {
                let kind = match kw {
                    Keyword::Header => ast::CodeKind::Header,
                    _ => ast::CodeKind::Footer,
                };
                let code = self.code().ok_or_else(|| self.error("code block"))?;
                ast::Stmt::CodeDesc(ast::CodeDesc { kind, code })
            }

            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.error("declaration"));
            }
        };
        Ok(stmt)
    }

    fn terminal_def(&mut self) -> Result<ast::TerminalDef, SyntaxError> {
        let name = self.ident()?;
        let pattern = if self.eat(Token::Eq) {
            Some(self.pattern()?)
        } else {
            None
        };
        let action = self.code();
        Ok(ast::TerminalDef {
            name,
            pattern,
            action,
        })
    }

    /// `{ key = value, ... }`, or nothing.
    fn configs(&mut self) -> Result<Vec<ast::Config>, SyntaxError> {
        if !self.eat(Token::LBracket) {
            return Ok(vec![]);
        }
        self.configs_body()
    }

    // Everything after the opening bracket.
    fn configs_body(&mut self) -> Result<Vec<ast::Config>, SyntaxError> {
        let mut configs = vec![];
        loop {
            if self.eat(Token::RBracket) {
                return Ok(configs);
            }
            let key = self.ident()?;
            self.expect(Token::Eq)?;
            let value = self.ident()?;
            configs.push(ast::Config { key, value });
            if !self.eat(Token::Comma) {
                self.expect(Token::RBracket)?;
                return Ok(configs);
            }
        }
    }

    fn production(&mut self) -> Result<ast::Production, SyntaxError> {
        let configs = if self.eat(Token::AtLBracket) {
            self.configs_body()?
        } else {
            vec![]
        };

        let mut elems = vec![];
        if !self.eat(Token::Kw(Keyword::Empty)) {
            loop {
                match self.peek() {
                    Some(Token::Ident(ident)) => {
                        self.pos += 1;
                        elems.push(ast::ProductionElem::Ident(ident.to_owned()));
                    }
                    Some(Token::Kw(Keyword::Error)) => {
                        self.pos += 1;
                        elems.push(ast::ProductionElem::ErrorToken);
                    }
                    _ => break,
                }
            }
            if elems.is_empty() {
                return Err(self.error("symbol or `@empty'"));
            }
        }

        let action = self.code();
        Ok(ast::Production {
            configs,
            elems,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_declarations() {
        let grammar = parse(
            r#"
            @header [* use std::fmt; *];
            @prec { assoc = right } POW;
            @terminal { prec = POW } CARET = "\^";
            @terminal NUM = "[0-9]+" [* value = lexeme.parse(); *], LPAREN = "\(", RPAREN;
            @whitespace " ", "\t";
            @nonterminal Expr;
            @start Expr;
            @rule Expr :=
                | @{ prec = POW } Expr CARET Expr [* a.pow(b) *]
                | LPAREN Expr RPAREN
                | @error
                | NUM;
            @footer [* fn main() {} *];
            "#,
        )
        .unwrap();

        assert_eq!(grammar.stmts.len(), 9);
        match &grammar.stmts[3] {
            ast::Stmt::TerminalDesc(desc) => {
                assert!(desc.configs.is_empty());
                assert_eq!(desc.defs.len(), 3);
                assert_eq!(desc.defs[0].pattern.as_deref(), Some("[0-9]+"));
                assert_eq!(
                    desc.defs[0].action.as_deref(),
                    Some("value = lexeme.parse();")
                );
                assert_eq!(desc.defs[2].pattern, None);
            }
            stmt => panic!("unexpected statement: {:?}", stmt),
        }
        match &grammar.stmts[7] {
            ast::Stmt::RuleDesc(desc) => {
                assert_eq!(desc.left, "Expr");
                assert_eq!(desc.productions.len(), 4);
                assert_eq!(desc.productions[0].configs[0].value, "POW");
                assert_eq!(desc.productions[0].action.as_deref(), Some("a.pow(b)"));
                assert_eq!(
                    desc.productions[2].elems,
                    [ast::ProductionElem::ErrorToken]
                );
            }
            stmt => panic!("unexpected statement: {:?}", stmt),
        }
    }

    #[test]
    fn empty_production() {
        let grammar = parse("@rule A := @empty | a;").unwrap();
        match &grammar.stmts[0] {
            ast::Stmt::RuleDesc(desc) => {
                assert!(desc.productions[0].elems.is_empty());
                assert_eq!(desc.productions[1].elems.len(), 1);
            }
            stmt => panic!("unexpected statement: {:?}", stmt),
        }
    }

    #[test]
    fn reports_position_of_unexpected_token() {
        let first = parse("@rule A = b;").unwrap_err();
        let second = parse("@nonterminal A;\n@rule A = b;").unwrap_err();
        assert_eq!(second.line, first.line + 1);
        assert_eq!(second.column, first.column);
        assert!(second.message.contains("`:='"), "{}", second.message);

        let err = parse("@rule A := ;").unwrap_err();
        assert!(err.message.contains("`@empty'"), "{}", err.message);

        let err = parse("@start S").unwrap_err();
        assert!(err.message.contains("end of input"), "{}", err.message);
    }
}
