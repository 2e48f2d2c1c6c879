pub mod parser;
pub mod tokenizer;
pub mod types;

pub use parser::{ParserError, parse};
pub use tokenizer::{Token, TokenType, Tokenizer, TokenizerError};
pub use types::ExprNode;

// Re-export common types
pub use stodex_common::{BigDecimal, EngineError, OmegaDecimal, Variable};
