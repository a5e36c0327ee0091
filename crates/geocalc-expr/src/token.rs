//! Tokenizer for calculator expressions.
//!
//! Expressions are authored by end users through a UI, so every failure
//! carries the byte position and surrounding text.

use geocalc_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Bool(bool),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    LParen,
    RParen,
    Comma,
}

/// A token plus the byte offset where it started.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(expression: &str) -> Result<Vec<Spanned>> {
    let bytes = expression.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let pos = i;
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
                continue;
            }
            '(' => push(&mut tokens, Token::LParen, pos, &mut i, 1),
            ')' => push(&mut tokens, Token::RParen, pos, &mut i, 1),
            ',' => push(&mut tokens, Token::Comma, pos, &mut i, 1),
            '+' => push(&mut tokens, Token::Plus, pos, &mut i, 1),
            '-' => push(&mut tokens, Token::Minus, pos, &mut i, 1),
            '*' => push(&mut tokens, Token::Star, pos, &mut i, 1),
            '/' => push(&mut tokens, Token::Slash, pos, &mut i, 1),
            '%' => push(&mut tokens, Token::Percent, pos, &mut i, 1),
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(&mut tokens, Token::Eq, pos, &mut i, 2);
                } else {
                    return Err(syntax_error(expression, pos, "expected '=='"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(&mut tokens, Token::Ne, pos, &mut i, 2);
                } else {
                    push(&mut tokens, Token::Not, pos, &mut i, 1);
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(&mut tokens, Token::Le, pos, &mut i, 2);
                } else {
                    push(&mut tokens, Token::Lt, pos, &mut i, 1);
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(&mut tokens, Token::Ge, pos, &mut i, 2);
                } else {
                    push(&mut tokens, Token::Gt, pos, &mut i, 1);
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    push(&mut tokens, Token::And, pos, &mut i, 2);
                } else {
                    return Err(syntax_error(expression, pos, "expected '&&'"));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    push(&mut tokens, Token::Or, pos, &mut i, 2);
                } else {
                    return Err(syntax_error(expression, pos, "expected '||'"));
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(syntax_error(expression, pos, "unterminated string literal"));
                }
                tokens.push(Spanned {
                    token: Token::Str(expression[i + 1..j].to_string()),
                    pos,
                });
                i = j + 1;
            }
            '0'..='9' | '.' => {
                let mut j = i;
                while j < bytes.len() && matches!(bytes[j] as char, '0'..='9' | '.') {
                    j += 1;
                }
                // Scientific notation tail.
                if j < bytes.len() && matches!(bytes[j] as char, 'e' | 'E') {
                    let mut k = j + 1;
                    if k < bytes.len() && matches!(bytes[k] as char, '+' | '-') {
                        k += 1;
                    }
                    if k < bytes.len() && (bytes[k] as char).is_ascii_digit() {
                        j = k;
                        while j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                            j += 1;
                        }
                    }
                }
                let text = &expression[i..j];
                let number = text.parse::<f64>().map_err(|_| {
                    syntax_error(expression, pos, &format!("malformed number '{text}'"))
                })?;
                tokens.push(Spanned {
                    token: Token::Number(number),
                    pos,
                });
                i = j;
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut j = i;
                while j < bytes.len()
                    && matches!(bytes[j] as char, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
                {
                    j += 1;
                }
                let ident = &expression[i..j];
                let token = match ident {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(ident.to_string()),
                };
                tokens.push(Spanned { token, pos });
                i = j;
            }
            _ => {
                // Report the full character, not its leading byte.
                let c = expression[pos..].chars().next().unwrap_or(c);
                return Err(syntax_error(
                    expression,
                    pos,
                    &format!("unexpected character '{c}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn push(tokens: &mut Vec<Spanned>, token: Token, pos: usize, i: &mut usize, width: usize) {
    tokens.push(Spanned { token, pos });
    *i += width;
}

pub(crate) fn syntax_error(expression: &str, pos: usize, message: &str) -> Error {
    let mut end = (pos + 16).min(expression.len());
    while !expression.is_char_boundary(end) {
        end -= 1;
    }
    Error::Parse(format!(
        "{message} at position {pos} near '{}'",
        &expression[pos..end]
    ))
}
