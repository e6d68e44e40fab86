//! Handler script syntax tree and parser

use super::ScriptError;
use super::token::ScriptToken;
use logos::Logos;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Value),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Index(Box<Expr>, Box<Expr>),
    Member(Box<Expr>, String),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Deepest expression nesting accepted in a script
const MAX_NESTING: usize = 256;

/// An arrow function: parameter names and body
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Expr,
}

fn lex(source: &str) -> Result<Vec<ScriptToken>, ScriptError> {
    let mut lexer = ScriptToken::lexer(source);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next() {
        match tok {
            Ok(tok) => tokens.push(tok),
            Err(_) => {
                return Err(ScriptError::syntax(format!(
                    "unexpected input {:?} at offset {}",
                    lexer.slice(),
                    lexer.span().start
                )));
            }
        }
    }
    Ok(tokens)
}

/// Parse a standalone expression
pub fn parse_expression(source: &str) -> Result<Expr, ScriptError> {
    let mut parser = ScriptParser {
        tokens: lex(source)?,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse `(a, b) => expr`, `a => expr` or `() => expr`
pub fn parse_lambda(source: &str) -> Result<Lambda, ScriptError> {
    let mut parser = ScriptParser {
        tokens: lex(source)?,
        pos: 0,
        depth: 0,
    };
    let params = parser.params()?;
    if !parser.eat(&ScriptToken::Arrow) {
        return Err(ScriptError::syntax("handler must be an arrow function"));
    }
    let body = parser.expr()?;
    parser.finish()?;
    Ok(Lambda { params, body })
}

struct ScriptParser {
    tokens: Vec<ScriptToken>,
    pos: usize,
    depth: usize,
}

impl ScriptParser {
    fn peek(&self) -> Option<&ScriptToken> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<ScriptToken> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += usize::from(tok.is_some());
        tok
    }

    fn eat(&mut self, tok: &ScriptToken) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &ScriptToken) -> Result<(), ScriptError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(ScriptError::syntax(format!("expected {tok:?}, found {:?}", self.peek())))
        }
    }

    fn nest(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ScriptError::syntax(format!("expression nesting exceeds {MAX_NESTING} levels")));
        }
        Ok(())
    }

    fn finish(&self) -> Result<(), ScriptError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(ScriptError::syntax(format!("unexpected trailing {tok:?}"))),
        }
    }

    fn params(&mut self) -> Result<Vec<String>, ScriptError> {
        match self.bump() {
            Some(ScriptToken::Ident(name)) => Ok(vec![name]),
            Some(ScriptToken::LParen) => {
                let mut params = Vec::new();
                while !self.eat(&ScriptToken::RParen) {
                    match self.bump() {
                        Some(ScriptToken::Ident(name)) => params.push(name),
                        other => {
                            return Err(ScriptError::syntax(format!("expected parameter name, found {other:?}")));
                        }
                    }
                    if !self.eat(&ScriptToken::Comma) {
                        self.expect(&ScriptToken::RParen)?;
                        break;
                    }
                }
                Ok(params)
            }
            _ => Err(ScriptError::syntax("handler must be an arrow function")),
        }
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.nest()?;
        let expr = self.conditional();
        self.depth -= 1;
        expr
    }

    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let cond = self.binary(0)?;
        if !self.eat(&ScriptToken::Question) {
            return Ok(cond);
        }
        let then = self.expr()?;
        self.expect(&ScriptToken::Colon)?;
        let otherwise = self.expr()?;
        Ok(Expr::Cond(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    /// Precedence climbing over the binary operator table
    fn binary(&mut self, min_prec: u8) -> Result<Expr, ScriptError> {
        let mut lhs = self.unary()?;
        let base = self.depth;
        while let Some((op, prec)) = self.peek().and_then(binary_op) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            self.nest()?;
            let rhs = self.binary(prec + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = if self.eat(&ScriptToken::Bang) {
            UnOp::Not
        } else if self.eat(&ScriptToken::Minus) {
            UnOp::Neg
        } else {
            return self.postfix();
        };
        self.nest()?;
        let operand = self.unary();
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand?)))
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        let base = self.depth;
        loop {
            if matches!(
                self.peek(),
                Some(ScriptToken::LBracket | ScriptToken::Dot | ScriptToken::LParen)
            ) {
                self.nest()?;
            }
            if self.eat(&ScriptToken::LBracket) {
                let key = self.expr()?;
                self.expect(&ScriptToken::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(key));
            } else if self.eat(&ScriptToken::Dot) {
                match self.bump() {
                    Some(ScriptToken::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    other => return Err(ScriptError::syntax(format!("expected member name, found {other:?}"))),
                }
            } else if self.eat(&ScriptToken::LParen) {
                let args = self.list(&ScriptToken::RParen)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.bump() {
            Some(ScriptToken::Num(n)) => Ok(Expr::Lit(crate::oracle::number_to_json(n).unwrap_or(Value::Null))),
            Some(ScriptToken::Str(s)) => Ok(Expr::Lit(Value::String(s))),
            Some(ScriptToken::True) => Ok(Expr::Lit(Value::Bool(true))),
            Some(ScriptToken::False) => Ok(Expr::Lit(Value::Bool(false))),
            Some(ScriptToken::Null | ScriptToken::Undefined) => Ok(Expr::Lit(Value::Null)),
            Some(ScriptToken::Ident(name)) => Ok(Expr::Ident(name)),
            Some(ScriptToken::LParen) => {
                let inner = self.expr()?;
                self.expect(&ScriptToken::RParen)?;
                Ok(inner)
            }
            Some(ScriptToken::LBracket) => Ok(Expr::Array(self.list(&ScriptToken::RBracket)?)),
            Some(ScriptToken::LBrace) => {
                let mut fields = Vec::new();
                while !self.eat(&ScriptToken::RBrace) {
                    let key = match self.bump() {
                        Some(ScriptToken::Ident(k) | ScriptToken::Str(k)) => k,
                        other => return Err(ScriptError::syntax(format!("expected object key, found {other:?}"))),
                    };
                    self.expect(&ScriptToken::Colon)?;
                    fields.push((key, self.expr()?));
                    if !self.eat(&ScriptToken::Comma) {
                        self.expect(&ScriptToken::RBrace)?;
                        break;
                    }
                }
                Ok(Expr::Object(fields))
            }
            other => Err(ScriptError::syntax(format!("expected expression, found {other:?}"))),
        }
    }

    fn list(&mut self, close: &ScriptToken) -> Result<Vec<Expr>, ScriptError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expr()?);
            if !self.eat(&ScriptToken::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }
}

fn binary_op(tok: &ScriptToken) -> Option<(BinOp, u8)> {
    Some(match tok {
        ScriptToken::OrOr => (BinOp::Or, 1),
        ScriptToken::AndAnd => (BinOp::And, 2),
        ScriptToken::EqEq => (BinOp::Eq, 3),
        ScriptToken::NotEq => (BinOp::NotEq, 3),
        ScriptToken::Lt => (BinOp::Lt, 4),
        ScriptToken::LtEq => (BinOp::LtEq, 4),
        ScriptToken::Gt => (BinOp::Gt, 4),
        ScriptToken::GtEq => (BinOp::GtEq, 4),
        ScriptToken::Plus => (BinOp::Add, 5),
        ScriptToken::Minus => (BinOp::Sub, 5),
        ScriptToken::Star => (BinOp::Mul, 6),
        ScriptToken::Slash => (BinOp::Div, 6),
        ScriptToken::Percent => (BinOp::Rem, 6),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_lambda_forms() {
        assert_eq!(parse_lambda("(args, ctx) => 1").unwrap().params, vec!["args", "ctx"]);
        assert_eq!(parse_lambda("x => x").unwrap().params, vec!["x"]);
        assert!(parse_lambda("() => 1").unwrap().params.is_empty());
    }

    #[test]
    fn test_lambda_requires_arrow() {
        assert!(parse_lambda("args[0] + 1").is_err());
        assert!(parse_lambda("(a) 1").is_err());
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Lit(json!(1))),
                Box::new(Expr::Binary(
                    BinOp::Mul,
                    Box::new(Expr::Lit(json!(2))),
                    Box::new(Expr::Lit(json!(3)))
                ))
            )
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse_expression("5 - 2 - 1").unwrap();
        match expr {
            Expr::Binary(BinOp::Sub, lhs, _) => assert!(matches!(*lhs, Expr::Binary(BinOp::Sub, ..))),
            other => panic!("expected subtraction, got {other:?}"),
        }
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse_expression("a[0].trim()").unwrap();
        match expr {
            Expr::Call { callee, args } => {
                assert!(args.is_empty());
                assert!(matches!(*callee, Expr::Member(_, ref m) if m == "trim"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_object_and_array_literals() {
        let expr = parse_expression("{ a: [1, 2,], 'b': null }").unwrap();
        match expr {
            Expr::Object(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1].0, "b");
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_tokens_fail() {
        assert!(parse_expression("1 2").is_err());
        assert!(parse_expression("#").is_err());
    }
}
