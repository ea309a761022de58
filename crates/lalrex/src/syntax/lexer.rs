//! Lexer implementation.

use lexgen_util::Loc;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Token<'input> {
    LBracket,
    RBracket,
    AtLBracket,
    ColonEq,
    Eq,
    Comma,
    Semicolon,
    VertBar,
    Kw(Keyword),
    Ident(&'input str),
    /// The contents of a double-quoted pattern, escapes left untouched.
    Pattern(&'input str),
    /// The contents of a `[* ... *]` code block, with surrounding blanks trimmed.
    Code(&'input str),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Keyword {
    Terminal,
    Whitespace,
    Nonterminal,
    Start,
    Rule,
    Prec,
    Empty,
    Error,
    Header,
    Footer,
}

pub type Spanned<'input> = (Loc, Token<'input>, Loc);

#[derive(Debug, Default)]
pub struct LexerState {
    comment_depth: usize,
}

lexgen::lexer! {
    pub Lexer(LexerState) -> Token<'input>;

    let whitespace = [' ' '\t' '\r' '\n'];
    let newline = '\r'* '\n' | '\r';
    let ident = $$XID_Start $$XID_Continue* | '_' $$XID_Continue*;

    rule Init {
        $whitespace+,
        "//" => |lexer| {
            lexer.switch(LexerRule::LineComment)
        },
        "/*" => |lexer| {
            lexer.state().comment_depth += 1;
            lexer.switch(LexerRule::BlockComment)
        },
        '"' => |lexer| {
            lexer.switch(LexerRule::Pattern)
        },
        "[*" => |lexer| {
            lexer.switch(LexerRule::Code)
        },
        "{" = Token::LBracket,
        "}" = Token::RBracket,
        "@{" = Token::AtLBracket,
        ":=" = Token::ColonEq,
        "=" = Token::Eq,
        "," = Token::Comma,
        ";" = Token::Semicolon,
        "|" = Token::VertBar,
        "@terminal" = Token::Kw(Keyword::Terminal),
        "@whitespace" = Token::Kw(Keyword::Whitespace),
        "@nonterminal" = Token::Kw(Keyword::Nonterminal),
        "@start" = Token::Kw(Keyword::Start),
        "@rule" = Token::Kw(Keyword::Rule),
        "@prec" = Token::Kw(Keyword::Prec),
        "@empty" = Token::Kw(Keyword::Empty),
        "@error" = Token::Kw(Keyword::Error),
        "@header" = Token::Kw(Keyword::Header),
        "@footer" = Token::Kw(Keyword::Footer),
        $ident => |lexer| {
            let token = Token::Ident(lexer.match_());
            lexer.return_(token)
        },
    }

    rule Pattern {
        '"' => |lexer| {
            let matched = lexer.match_();
            let token = Token::Pattern(&matched[1..matched.len() - 1]);
            lexer.switch_and_return(LexerRule::Init, token)
        },
        '\\' _ => |lexer| lexer.continue_(),
        _ => |lexer| lexer.continue_(),
    }

    rule Code {
        "*]" => |lexer| {
            let matched = lexer.match_();
            let token = Token::Code(matched[2..matched.len() - 2].trim());
            lexer.switch_and_return(LexerRule::Init, token)
        },
        _ => |lexer| lexer.continue_(),
    }

    rule LineComment {
        $newline => |lexer| {
            lexer.reset_match();
            lexer.switch(LexerRule::Init)
        },
        _,
    }

    rule BlockComment {
        "/*" => |lexer| {
            lexer.state().comment_depth += 1;
            lexer.continue_()
        },
        "*/" => |lexer| {
            let depth = &mut lexer.state().comment_depth;
            if *depth == 1 {
                *depth = 0;
                lexer.reset_match();
                lexer.switch(LexerRule::Init)
            } else {
                *depth -= 1;
                lexer.continue_()
            }
        },
        _,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Keyword::*;
    use Token::*;

    fn tokenize(input: &str) -> Vec<Token<'_>> {
        Lexer::new(input)
            .map(|res| res.map(|(_, t, _)| t))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn smoketest() {
        let input = "\
@prec { assoc = left } prec1; // precedences /* block-comment in line-comment */
@terminal FOO = \"foo\", BAR; /* block comment /* nested */ */
@whitespace \"[ \\t]+\";
@nonterminal Expr, ｔｒｕｅ;
@rule Expr :=
    | FOO BAR @error [* return 1; *]
    | @{ prec = prec1 } Expr FOO
    | @empty
    ;
";
        let tokens = tokenize(input);
        assert!(matches!(
            dbg!(&tokens[..]),
            [
                // @prec ... ;
                Kw(Prec),
                LBracket,
                Ident("assoc"),
                Eq,
                Ident("left"),
                RBracket,
                Ident("prec1"),
                Semicolon,
                // @terminal ... ;
                Kw(Terminal),
                Ident("FOO"),
                Eq,
                Pattern("foo"),
                Comma,
                Ident("BAR"),
                Semicolon,
                // @whitespace ... ;
                Kw(Whitespace),
                Pattern("[ \\t]+"),
                Semicolon,
                // @nonterminal ... ;
                Kw(Nonterminal),
                Ident("Expr"),
                Comma,
                Ident("ｔｒｕｅ"),
                Semicolon,
                // @rule ... ;
                Kw(Rule),
                Ident("Expr"),
                ColonEq,
                VertBar,
                Ident("FOO"),
                Ident("BAR"),
                Kw(Error),
                Code("return 1;"),
                VertBar,
                AtLBracket,
                Ident("prec"),
                Eq,
                Ident("prec1"),
                RBracket,
                Ident("Expr"),
                Ident("FOO"),
                VertBar,
                Kw(Empty),
                Semicolon,
            ]
        ));
    }

    #[test]
    fn escaped_quote_stays_in_pattern() {
        let tokens = tokenize(r#"@terminal STR = "\"[^\"]*\"";"#);
        assert_eq!(
            tokens,
            [
                Kw(Terminal),
                Ident("STR"),
                Eq,
                Pattern(r#"\"[^\"]*\""#),
                Semicolon
            ]
        );
    }

    #[test]
    fn code_block_may_contain_brackets() {
        let tokens = tokenize("@header [* let v = [1, 2]; let p = *v; *];");
        assert_eq!(
            tokens,
            [Kw(Header), Code("let v = [1, 2]; let p = *v;"), Semicolon]
        );
    }
}
