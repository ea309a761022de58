#[derive(Debug)]
pub struct Grammar {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub enum Stmt {
    TerminalDesc(TerminalDesc),
    WhitespaceDesc(WhitespaceDesc),
    NonterminalDesc(NonterminalDesc),
    RuleDesc(RuleDesc),
    PrecDesc(PrecDesc),
    StartDesc(StartDesc),
    CodeDesc(CodeDesc),
}

#[derive(Debug)]
pub struct TerminalDesc {
    pub configs: Vec<Config>,
    pub defs: Vec<TerminalDef>,
}

#[derive(Debug)]
pub struct TerminalDef {
    pub name: String,
    pub pattern: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug)]
pub struct WhitespaceDesc {
    pub patterns: Vec<String>,
}

#[derive(Debug)]
pub struct NonterminalDesc {
    pub idents: Vec<String>,
}

#[derive(Debug)]
pub struct RuleDesc {
    pub left: String,
    pub productions: Vec<Production>,
}

#[derive(Debug)]
pub struct PrecDesc {
    pub configs: Vec<Config>,
    pub ident: String,
}

#[derive(Debug)]
pub struct StartDesc {
    pub name: String,
}

#[derive(Debug)]
pub struct CodeDesc {
    pub kind: CodeKind,
    pub code: String,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CodeKind {
    Header,
    Footer,
}

#[derive(Debug)]
pub struct Production {
    pub configs: Vec<Config>,
    pub elems: Vec<ProductionElem>,
    pub action: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum ProductionElem {
    Ident(String),
    ErrorToken,
}

#[derive(Debug)]
pub struct Config {
    pub key: String,
    pub value: String,
}
