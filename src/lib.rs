pub use crate::parser::{parse, parse_with_symbols, Parser, MAX_PARSE_DEPTH};
pub use crate::parser_diagnostics::ParseError;

pub mod ast;
pub mod layout;
pub mod lexing;
pub mod parser;
pub mod parser_diagnostics;
pub mod pos;
pub mod sexp;
pub mod symbols;
pub mod token;
