//! Recursive-descent parser for descriptor sources

use crate::ast::{Field, Module, Span, Spanned, TypeAlias, TypeExpr};
use crate::error::{LoadError, Result};
use crate::lexer::Token;


/// Deepest type nesting accepted in a source
const MAX_NESTING: usize = 256;

/// Parse tokens into a module
pub fn parse(_filename: &str, source: &str, tokens: Vec<(Token, Span)>) -> Result<Module> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        eof: Span::new(source.len(), source.len()),
    };
    parser.module()
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// Open type nesting levels
    depth: usize,
    eof: Span,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map_or(self.eof, |(_, s)| *s)
    }

    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(self.eof, |(_, s)| *s)
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span> {
        if self.eat(expected) {
            Ok(self.prev_span())
        } else {
            Err(self.unexpected(&format!("`{expected}`")))
        }
    }

    fn unexpected(&self, wanted: &str) -> LoadError {
        match self.peek() {
            Some(tok) => LoadError::parser(format!("expected {wanted}, found `{tok}`"), self.span()),
            None => LoadError::parser(format!("expected {wanted}, found end of file"), self.eof),
        }
    }

    fn nest(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(LoadError::parser(
                format!("type nesting exceeds {MAX_NESTING} levels"),
                self.span(),
            ));
        }
        Ok(())
    }

    fn ident(&mut self) -> Result<Spanned<String>> {
        if let Some((Token::Ident(name), span)) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            return Ok(Spanned::new(name, span));
        }
        Err(self.unexpected("identifier"))
    }

    fn module(&mut self) -> Result<Module> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            items.push(self.alias()?);
        }
        Ok(Module { items })
    }

    fn alias(&mut self) -> Result<TypeAlias> {
        let start = self.span();
        let exported = self.eat(&Token::Export);
        self.expect(&Token::Type)?;
        let name = self.ident()?;

        let mut params = Vec::new();
        if self.eat(&Token::Lt) {
            while !self.eat(&Token::Gt) {
                params.push(self.ident()?);
                if !self.eat(&Token::Comma) {
                    self.expect(&Token::Gt)?;
                    break;
                }
            }
        }

        self.expect(&Token::Eq)?;
        let body = self.ty()?;
        self.eat(&Token::Semi);

        Ok(TypeAlias {
            exported,
            name,
            params,
            body,
            span: start.merge(self.prev_span()),
        })
    }

    fn ty(&mut self) -> Result<Spanned<TypeExpr>> {
        self.nest()?;
        let ty = self.intersection();
        self.depth -= 1;
        ty
    }

    fn intersection(&mut self) -> Result<Spanned<TypeExpr>> {
        let first = self.postfix()?;
        if self.peek() != Some(&Token::Amp) {
            return Ok(first);
        }
        let mut span = first.span;
        let mut parts = vec![first];
        while self.eat(&Token::Amp) {
            let part = self.postfix()?;
            span = span.merge(part.span);
            parts.push(part);
        }
        Ok(Spanned::new(TypeExpr::Intersect(parts), span))
    }

    fn postfix(&mut self) -> Result<Spanned<TypeExpr>> {
        let mut expr = self.primary()?;
        let base = self.depth;
        while self.eat(&Token::LBracket) {
            self.nest()?;
            let key = self.ty()?;
            let end = self.expect(&Token::RBracket)?;
            let span = expr.span.merge(end);
            expr = Spanned::new(
                TypeExpr::Index {
                    object: Box::new(expr),
                    key: Box::new(key),
                },
                span,
            );
        }
        self.depth = base;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Spanned<TypeExpr>> {
        let Some((tok, span)) = self.bump() else {
            return Err(self.unexpected("a type"));
        };
        let node = match tok {
            Token::StringLit(s) => TypeExpr::Str(s),
            Token::NumLit(n) => TypeExpr::Num(n),
            Token::Minus => match self.bump() {
                Some((Token::NumLit(n), end)) => {
                    return Ok(Spanned::new(TypeExpr::Num(-n), span.merge(end)));
                }
                _ => return Err(LoadError::parser("expected a number after `-`", span)),
            },
            Token::True => TypeExpr::Bool(true),
            Token::False => TypeExpr::Bool(false),
            Token::Null => TypeExpr::Null,
            Token::Undefined => TypeExpr::Undefined,
            Token::Unknown => TypeExpr::Unknown,
            Token::This => TypeExpr::This,
            Token::Ident(name) => {
                let name = Spanned::new(name, span);
                let mut args = Vec::new();
                if self.eat(&Token::Lt) {
                    args = self.list(&Token::Gt)?;
                }
                let span = span.merge(self.prev_span());
                return Ok(Spanned::new(TypeExpr::Ref { name, args }, span));
            }
            Token::LBracket => {
                let items = self.list(&Token::RBracket)?;
                return Ok(Spanned::new(TypeExpr::Tuple(items), span.merge(self.prev_span())));
            }
            Token::LBrace => {
                let fields = self.fields()?;
                return Ok(Spanned::new(TypeExpr::Record(fields), span.merge(self.prev_span())));
            }
            Token::LParen => {
                let inner = self.ty()?;
                let end = self.expect(&Token::RParen)?;
                return Ok(Spanned::new(inner.node, span.merge(end)));
            }
            other => {
                return Err(LoadError::parser(format!("expected a type, found `{other}`"), span));
            }
        };
        Ok(Spanned::new(node, span))
    }

    /// Comma separated types up to `close`, trailing comma allowed
    fn list(&mut self, close: &Token) -> Result<Vec<Spanned<TypeExpr>>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.ty()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn fields(&mut self) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        while !self.eat(&Token::RBrace) {
            let name = match self.tokens.get(self.pos).cloned() {
                Some((Token::Ident(name) | Token::StringLit(name), span)) => Spanned::new(name, span),
                // keywords are valid member names
                Some((
                    tok @ (Token::Type
                    | Token::Export
                    | Token::True
                    | Token::False
                    | Token::Null
                    | Token::Undefined
                    | Token::Unknown),
                    span,
                )) => Spanned::new(tok.to_string(), span),
                _ => return Err(self.unexpected("a member name")),
            };
            self.pos += 1;
            self.expect(&Token::Colon)?;
            let ty = self.ty()?;
            fields.push(Field { name, ty });
            if !self.eat(&Token::Semi) && !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(fields)
    }
}
