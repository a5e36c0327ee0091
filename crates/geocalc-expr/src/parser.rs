//! Precedence-climbing parser: tokens → `Expr`.

use geocalc_core::{Error, Result};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::token::{tokenize, Spanned, Token};

/// Parse an expression string into an AST.
///
/// Failures wrap the underlying syntax error with an explanatory prefix; the
/// message keeps position/context so non-programmer authors can localize the
/// mistake.
pub fn parse(expression: &str) -> Result<Expr> {
    let tokens = tokenize(expression)
        .map_err(|e| Error::Parse(format!("failed to parse expression: {e}")))?;
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
        expression,
    };
    let expr = parser
        .expression(0)
        .map_err(|e| Error::Parse(format!("failed to parse expression: {e}")))?;
    if let Some(extra) = parser.peek() {
        return Err(Error::Parse(format!(
            "failed to parse expression: unexpected trailing input at position {}",
            extra.pos
        )));
    }
    Ok(expr)
}

/// Deepest nesting (parentheses, unary chains, call arguments) the parser
/// accepts before rejecting the expression instead of recursing further.
const MAX_PARSE_DEPTH: usize = 64;

struct Parser<'a> {
    tokens: Vec<Spanned>,
    index: usize,
    depth: usize,
    expression: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        match self.advance() {
            Some(spanned) if spanned.token == expected => Ok(()),
            Some(spanned) => Err(Error::Parse(format!(
                "expected {what} at position {}",
                spanned.pos
            ))),
            None => Err(Error::Parse(format!(
                "expected {what} but expression ended: '{}'",
                self.expression
            ))),
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Expr> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            return Err(Error::Parse(format!(
                "expression nesting exceeds {MAX_PARSE_DEPTH} levels"
            )));
        }
        let result = self.expression_at(min_precedence);
        self.depth -= 1;
        result
    }

    fn expression_at(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut lhs = self.prefix()?;

        while let Some(op) = self.peek().and_then(|s| binary_op(&s.token)) {
            let precedence = op_precedence(op);
            if precedence < min_precedence {
                break;
            }
            self.advance();
            // All operators are left-associative.
            let rhs = self.expression(precedence + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr> {
        let Some(spanned) = self.advance() else {
            return Err(Error::Parse(format!(
                "expression ended unexpectedly: '{}'",
                self.expression
            )));
        };
        match spanned.token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Bool(b) => Ok(Expr::Bool(b)),
            Token::Not => Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.expression(UNARY_PRECEDENCE)?),
            }),
            Token::Minus => Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(self.expression(UNARY_PRECEDENCE)?),
            }),
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek().map(|s| &s.token) == Some(&Token::LParen) {
                    self.advance();
                    let args = self.arguments()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Reference(name))
                }
            }
            other => Err(Error::Parse(format!(
                "unexpected token {other:?} at position {}",
                spanned.pos
            ))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek().map(|s| &s.token) == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression(0)?);
            match self.advance() {
                Some(Spanned {
                    token: Token::Comma,
                    ..
                }) => continue,
                Some(Spanned {
                    token: Token::RParen,
                    ..
                }) => return Ok(args),
                Some(spanned) => {
                    return Err(Error::Parse(format!(
                        "expected ',' or ')' at position {}",
                        spanned.pos
                    )))
                }
                None => {
                    return Err(Error::Parse(format!(
                        "unclosed argument list: '{}'",
                        self.expression
                    )))
                }
            }
        }
    }
}

const UNARY_PRECEDENCE: u8 = 6;

fn op_precedence(op: BinaryOp) -> u8 {
    use BinaryOp::*;
    match op {
        Or => 1,
        And => 2,
        Eq | Ne | Lt | Le | Gt | Ge => 3,
        Add | Sub => 4,
        Mul | Div | Mod => 5,
    }
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Percent => BinaryOp::Mod,
        Token::Eq => BinaryOp::Eq,
        Token::Ne => BinaryOp::Ne,
        Token::Lt => BinaryOp::Lt,
        Token::Le => BinaryOp::Le,
        Token::Gt => BinaryOp::Gt,
        Token::Ge => BinaryOp::Ge,
        Token::And => BinaryOp::And,
        Token::Or => BinaryOp::Or,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        let expr = parse("a + b * c").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Add, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = parse("(a + b) * c").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_function_call_with_arguments() {
        let expr = parse("first(a, b, 0)").unwrap();
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name, "first");
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_nested_calls() {
        let expr = parse("slope(first(a, b)) > 1.5").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Gt, .. }));
    }

    #[test]
    fn test_unary_minus() {
        let expr = parse("-a + 1").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Add, lhs, .. } => {
                assert!(matches!(*lhs, Expr::Unary { op: UnaryOp::Neg, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_logical_precedence() {
        let expr = parse("a > 1 && b < 2 || c == 3").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let err = parse("a + b c").unwrap_err();
        assert!(err.to_string().contains("failed to parse expression"));
    }

    #[test]
    fn test_unclosed_paren_is_rejected() {
        assert!(parse("slope(a").is_err());
        assert!(parse("(a + b").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected_not_overflowed() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let err = parse(&deep).unwrap_err();
        assert!(err.to_string().contains("nesting"), "got: {err}");

        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse(&shallow).is_ok());
    }
}
