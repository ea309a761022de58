//! A LALR(1) parser and lexical automaton generator.

pub mod codegen;
pub mod diagnostics;
pub mod first_sets;
pub mod grammar;
pub mod integrity;
pub mod lalr;
pub mod lexer;
pub mod pipeline;
pub mod syntax;
pub mod table;
pub mod types;
pub mod util;
