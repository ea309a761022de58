//! Token patterns and their Thompson construction.
//!
//! Supported syntax: literals, `.`, bracket classes with ranges and `^`
//! negation, groups, alternation, the `* + ?` repetitions and the escapes
//! `\n \r \t \0 \xHH \d \D \w \W \s \S`. Any other escaped character stands
//! for itself. Non-ASCII literals match their UTF-8 encoding.

use super::nfa::{ByteSet, Nfa, NfaFragment, TokenAccept};
use crate::grammar::TokenDef;

#[derive(Debug, thiserror::Error)]
#[error("invalid pattern at offset {position}: {message}")]
pub struct PatternError {
    /// Byte offset in the pattern source.
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bytes(ByteSet),
    Concat(Vec<Node>),
    Alt(Vec<Node>),
    Star(Box<Node>),
    Plus(Box<Node>),
    Optional(Box<Node>),
}

/// Compile `def` into `nfa` and register it as a token.
pub fn compile(nfa: &mut Nfa, def: &TokenDef) -> Result<NfaFragment, PatternError> {
    let node = parse(&def.pattern)?;
    let fragment = build(nfa, &node);
    nfa.add_token(
        fragment,
        TokenAccept {
            terminal: def.terminal,
            priority: def.priority,
        },
    );
    Ok(fragment)
}

pub fn parse(source: &str) -> Result<Node, PatternError> {
    let mut parser = Parser {
        chars: source.char_indices().collect(),
        pos: 0,
        len: source.len(),
    };
    if parser.chars.is_empty() {
        return Err(parser.error("empty pattern"));
    }
    let node = parser.alt()?;
    match parser.peek() {
        None => Ok(node),
        Some(')') => Err(parser.error("unbalanced `)'")),
        Some(ch) => Err(parser.error(format!("unexpected `{}'", ch))),
    }
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, ch)| *ch)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.len, |(i, _)| *i)
    }

    fn error(&self, message: impl Into<String>) -> PatternError {
        PatternError {
            position: self.offset(),
            message: message.into(),
        }
    }

    fn alt(&mut self) -> Result<Node, PatternError> {
        let mut branches = vec![self.concat()?];
        while self.peek() == Some('|') {
            self.pos += 1;
            branches.push(self.concat()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Node::Alt(branches)
        })
    }

    fn concat(&mut self) -> Result<Node, PatternError> {
        let mut items = vec![];
        while let Some(ch) = self.peek() {
            if ch == '|' || ch == ')' {
                break;
            }
            items.push(self.repeat()?);
        }
        match items.len() {
            0 => Err(self.error("empty alternative")),
            1 => Ok(items.remove(0)),
            _ => Ok(Node::Concat(items)),
        }
    }

    fn repeat(&mut self) -> Result<Node, PatternError> {
        let mut node = self.atom()?;
        loop {
            node = match self.peek() {
                Some('*') => Node::Star(Box::new(node)),
                Some('+') => Node::Plus(Box::new(node)),
                Some('?') => Node::Optional(Box::new(node)),
                _ => return Ok(node),
            };
            self.pos += 1;
        }
    }

    fn atom(&mut self) -> Result<Node, PatternError> {
        let start = self.offset();
        match self.bump() {
            Some('(') => {
                let node = self.alt()?;
                if self.bump() != Some(')') {
                    return Err(PatternError {
                        position: start,
                        message: "unclosed group".into(),
                    });
                }
                Ok(node)
            }
            Some('[') => self.class(start),
            Some('.') => Ok(Node::Bytes(ByteSet::single(b'\n').complement())),
            Some('\\') => match self.escape()? {
                Escaped::Byte(b) => Ok(Node::Bytes(ByteSet::single(b))),
                Escaped::Set(set) => Ok(Node::Bytes(set)),
                Escaped::Char(ch) => Ok(literal(ch)),
            },
            Some(ch @ ('*' | '+' | '?')) => Err(PatternError {
                position: start,
                message: format!("`{}' follows nothing", ch),
            }),
            Some(ch) => Ok(literal(ch)),
            None => Err(self.error("unexpected end of pattern")),
        }
    }

    fn escape(&mut self) -> Result<Escaped, PatternError> {
        let escaped = match self.bump() {
            Some('n') => Escaped::Byte(b'\n'),
            Some('r') => Escaped::Byte(b'\r'),
            Some('t') => Escaped::Byte(b'\t'),
            Some('0') => Escaped::Byte(0),
            Some('x') => {
                let position = self.offset();
                let mut value = 0u8;
                for _ in 0..2 {
                    let digit = self
                        .bump()
                        .and_then(|ch| ch.to_digit(16))
                        .ok_or_else(|| PatternError {
                            position,
                            message: "`\\x' requires two hex digits".into(),
                        })?;
                    value = value * 16 + digit as u8;
                }
                Escaped::Byte(value)
            }
            Some('d') => Escaped::Set(digits()),
            Some('D') => Escaped::Set(digits().complement()),
            Some('w') => Escaped::Set(word()),
            Some('W') => Escaped::Set(word().complement()),
            Some('s') => Escaped::Set(spaces()),
            Some('S') => Escaped::Set(spaces().complement()),
            Some(ch) => Escaped::Char(ch),
            None => return Err(self.error("trailing backslash")),
        };
        Ok(escaped)
    }

    // `[...]`, after the opening bracket.
    fn class(&mut self, start: usize) -> Result<Node, PatternError> {
        let negated = if self.peek() == Some('^') {
            self.pos += 1;
            true
        } else {
            false
        };

        let mut set = ByteSet::new();
        loop {
            let lo = match self.bump() {
                Some(']') => break,
                Some('\\') => match self.escape()? {
                    Escaped::Set(s) => {
                        set.union_with(&s);
                        continue;
                    }
                    Escaped::Byte(b) => b,
                    Escaped::Char(ch) => self.class_byte(ch)?,
                },
                Some(ch) => self.class_byte(ch)?,
                None => {
                    return Err(PatternError {
                        position: start,
                        message: "unclosed character class".into(),
                    })
                }
            };

            let is_range = self.peek() == Some('-')
                && !matches!(self.chars.get(self.pos + 1), Some((_, ']')) | None);
            if !is_range {
                set.insert(lo);
                continue;
            }
            self.pos += 1;
            let hi = match self.bump() {
                Some('\\') => match self.escape()? {
                    Escaped::Byte(b) => b,
                    Escaped::Char(ch) => self.class_byte(ch)?,
                    Escaped::Set(..) => return Err(self.error("invalid range bound")),
                },
                Some(ch) => self.class_byte(ch)?,
                None => return Err(self.error("unclosed character class")),
            };
            if hi < lo {
                return Err(self.error("range out of order"));
            }
            set.insert_range(lo, hi);
        }

        if negated {
            set = set.complement();
        }
        if set.is_empty() {
            return Err(PatternError {
                position: start,
                message: "empty character class".into(),
            });
        }
        Ok(Node::Bytes(set))
    }

    fn class_byte(&self, ch: char) -> Result<u8, PatternError> {
        u8::try_from(ch)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| self.error("non-ASCII character in class"))
    }
}

enum Escaped {
    Byte(u8),
    Set(ByteSet),
    Char(char),
}

fn literal(ch: char) -> Node {
    let mut buf = [0u8; 4];
    let mut bytes: Vec<Node> = ch
        .encode_utf8(&mut buf)
        .bytes()
        .map(|b| Node::Bytes(ByteSet::single(b)))
        .collect();
    if bytes.len() == 1 {
        bytes.remove(0)
    } else {
        Node::Concat(bytes)
    }
}

fn digits() -> ByteSet {
    ByteSet::range(b'0', b'9')
}

fn word() -> ByteSet {
    let mut set = ByteSet::range(b'a', b'z');
    set.insert_range(b'A', b'Z');
    set.insert_range(b'0', b'9');
    set.insert(b'_');
    set
}

fn spaces() -> ByteSet {
    [b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c].into_iter().collect()
}

/// Thompson construction of `node` inside `nfa`.
pub fn build(nfa: &mut Nfa, node: &Node) -> NfaFragment {
    match node {
        Node::Bytes(set) => {
            let start = nfa.add_state();
            let accept = nfa.add_state();
            nfa.add_edge(start, set.clone(), accept);
            NfaFragment { start, accept }
        }
        Node::Concat(items) => {
            let fragments: Vec<_> = items.iter().map(|item| build(nfa, item)).collect();
            for pair in fragments.windows(2) {
                nfa.add_epsilon(pair[0].accept, pair[1].start);
            }
            match (fragments.first(), fragments.last()) {
                (Some(first), Some(last)) => NfaFragment {
                    start: first.start,
                    accept: last.accept,
                },
                _ => {
                    let start = nfa.add_state();
                    let accept = nfa.add_state();
                    nfa.add_epsilon(start, accept);
                    NfaFragment { start, accept }
                }
            }
        }
        Node::Alt(branches) => {
            let start = nfa.add_state();
            let accept = nfa.add_state();
            for branch in branches {
                let f = build(nfa, branch);
                nfa.add_epsilon(start, f.start);
                nfa.add_epsilon(f.accept, accept);
            }
            NfaFragment { start, accept }
        }
        Node::Star(inner) => {
            let start = nfa.add_state();
            let accept = nfa.add_state();
            let f = build(nfa, inner);
            nfa.add_epsilon(start, f.start);
            nfa.add_epsilon(start, accept);
            nfa.add_epsilon(f.accept, f.start);
            nfa.add_epsilon(f.accept, accept);
            NfaFragment { start, accept }
        }
        Node::Plus(inner) => {
            let start = nfa.add_state();
            let accept = nfa.add_state();
            let f = build(nfa, inner);
            nfa.add_epsilon(start, f.start);
            nfa.add_epsilon(f.accept, f.start);
            nfa.add_epsilon(f.accept, accept);
            NfaFragment { start, accept }
        }
        Node::Optional(inner) => {
            let start = nfa.add_state();
            let accept = nfa.add_state();
            let f = build(nfa, inner);
            nfa.add_epsilon(start, f.start);
            nfa.add_epsilon(start, accept);
            nfa.add_epsilon(f.accept, accept);
            NfaFragment { start, accept }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(set: &[u8]) -> Node {
        Node::Bytes(set.iter().copied().collect())
    }

    #[test]
    fn parses_operators() {
        assert_eq!(
            parse("ab|c*").unwrap(),
            Node::Alt(vec![
                Node::Concat(vec![bytes(b"a"), bytes(b"b")]),
                Node::Star(Box::new(bytes(b"c"))),
            ])
        );
        assert_eq!(
            parse("(a)+?").unwrap(),
            Node::Optional(Box::new(Node::Plus(Box::new(bytes(b"a")))))
        );
    }

    #[test]
    fn parses_classes_and_escapes() {
        assert_eq!(parse("[a-c_]").unwrap(), bytes(b"abc_"));
        assert_eq!(parse("[-+]").unwrap(), bytes(b"-+"));
        assert_eq!(parse(r"\+").unwrap(), bytes(b"+"));
        assert_eq!(parse(r#"\""#).unwrap(), bytes(b"\""));
        assert_eq!(parse(r"\x41").unwrap(), bytes(b"A"));
        assert_eq!(parse(r"[\d]").unwrap(), parse(r"\d").unwrap());

        match parse("[^\"]").unwrap() {
            Node::Bytes(set) => {
                assert_eq!(set.len(), 255);
                assert!(!set.contains(b'"'));
            }
            node => panic!("unexpected node: {:?}", node),
        }
    }

    #[test]
    fn non_ascii_literal_is_utf8_sequence() {
        assert_eq!(
            parse("é").unwrap(),
            Node::Concat(vec![bytes(&[0xc3]), bytes(&[0xa9])])
        );
    }

    #[test]
    fn reports_errors_with_position() {
        let err = parse("ab(c").unwrap_err();
        assert_eq!(err.position, 2);
        let err = parse("a|").unwrap_err();
        assert_eq!(err.position, 2);
        let err = parse("*a").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(parse("").is_err());
        assert!(parse("[z-a]").is_err());
        assert!(parse("[abc").is_err());
        assert!(parse("a)").is_err());
        assert!(parse("\\").is_err());
    }
}
