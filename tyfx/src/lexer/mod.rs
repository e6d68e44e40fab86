//! Lexer implementation using logos

mod token;

pub use token::Token;
pub(crate) use token::unescape;

use crate::ast::Span;
use crate::error::{LoadError, Result};
use logos::Logos;

/// Tokenize descriptor source
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                return Err(LoadError::lexer(
                    format!("unexpected input: {:?}", lexer.slice()),
                    span,
                ));
            }
        }
    }

    Ok(tokens)
}
