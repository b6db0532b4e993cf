pub mod parser;
#[cfg(test)]
mod tests;
pub mod tokenizer;
pub mod types;

pub use parser::{ASTNode, ASTNodeType, ParseError, Parser, ReferenceType, Span, parse};
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};
pub use types::{Associativity, BinaryOp, UnaryOp};

pub use sheetcalc_common::{ErrorKind, Value};
