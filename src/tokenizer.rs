use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::Diagnostics;
use crate::grammar::{Literal, Token, TokenKind};

/// Splits `source` into one token list per physical line.
///
/// Every line gets a bucket, blank ones included, so that the index of a
/// bucket is the zero-based source line. Bad characters are reported and
/// skipped; scanning carries on so that one pass reports all of them.
pub fn tokenize(source: &str, diagnostics: &mut Diagnostics) -> Vec<Vec<Token>> {
    let mut lines: Vec<Vec<Token>> = vec![Vec::new()];
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let line = lines.len() - 1;
        let single = |kind| Token {
            kind,
            start,
            end: start + c.len_utf8(),
            literal: None,
        };

        let token = match c {
            '\n' => {
                lines.push(Vec::new());
                continue;
            }
            ' ' | '\t' | '\r' => continue,

            '0'..='9' => {
                let end = take_while(&mut chars, start + 1, |ch| ch.is_ascii_digit());
                match source[start..end].parse::<i32>() {
                    Ok(n) => Token {
                        kind: TokenKind::Number,
                        start,
                        end,
                        literal: Some(Literal::Int(n)),
                    },
                    Err(_) => {
                        diagnostics.report(line, format!("Integer literal {} is too large", &source[start..end]));
                        continue;
                    }
                }
            }

            c if c.is_alphabetic() || c == '_' => {
                let end = take_while(&mut chars, start + c.len_utf8(), |ch| ch.is_alphanumeric() || ch == '_');
                Token {
                    kind: identifier_kind(&source[start..end]),
                    start,
                    end,
                    literal: None,
                }
            }

            '"' => {
                let mut end = None;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    chars.next();
                    if ch == '"' {
                        end = Some(i);
                        break;
                    }
                }
                match end {
                    Some(close) => Token {
                        kind: TokenKind::String,
                        start,
                        end: close + 1,
                        literal: Some(Literal::Str(source[start + 1..close].to_string())),
                    },
                    None => {
                        diagnostics.report(line, "Unterminated string");
                        continue;
                    }
                }
            }

            '/' => {
                if let Some((_, '/')) = chars.peek() {
                    while let Some(&(_, ch)) = chars.peek() {
                        if ch == '\n' {
                            break;
                        }
                        chars.next();
                    }
                    continue;
                }
                single(TokenKind::Slash)
            }

            '(' => single(TokenKind::LeftParen),
            ')' => single(TokenKind::RightParen),
            '[' => single(TokenKind::LeftSquare),
            ']' => single(TokenKind::RightSquare),
            ',' => single(TokenKind::Comma),
            '.' => single(TokenKind::Dot),
            '-' => single(TokenKind::Minus),
            '+' => single(TokenKind::Plus),
            '*' => single(TokenKind::Star),
            ':' => single(TokenKind::Colon),
            ';' => single(TokenKind::Semicolon),

            '!' | '=' | '<' | '>' => {
                let (one, two) = match c {
                    '!' => (TokenKind::Bang, TokenKind::BangEqual),
                    '=' => (TokenKind::Equal, TokenKind::EqualEqual),
                    '<' => (TokenKind::Less, TokenKind::LessEqual),
                    _ => (TokenKind::Greater, TokenKind::GreaterEqual),
                };
                if let Some((_, '=')) = chars.peek() {
                    chars.next();
                    Token {
                        kind: two,
                        start,
                        end: start + 2,
                        literal: None,
                    }
                } else {
                    single(one)
                }
            }

            other => {
                diagnostics.report(line, format!("Unexpected character '{other}'"));
                continue;
            }
        };

        if let Some(bucket) = lines.last_mut() {
            bucket.push(token);
        }
    }

    tracing::debug!(lines = lines.len(), "tokenized");
    lines
}

/// Consumes characters while `pred` holds and returns the end offset of the run.
fn take_while(chars: &mut Peekable<CharIndices<'_>>, mut end: usize, pred: impl Fn(char) -> bool) -> usize {
    while let Some(&(i, ch)) = chars.peek() {
        if !pred(ch) {
            break;
        }
        end = i + ch.len_utf8();
        chars.next();
    }
    end
}

/// Keywords are upper case and must match exactly; anything else is an identifier.
fn identifier_kind(word: &str) -> TokenKind {
    let keyword: &[(&str, TokenKind)] = match word.as_bytes()[0] {
        b'A' => &[("AND", TokenKind::And)],
        b'E' => &[("ELSE", TokenKind::Else), ("ENDIF", TokenKind::Endif)],
        b'F' => &[("FALSE", TokenKind::False)],
        b'I' => &[("IF", TokenKind::If)],
        b'N' => &[("NOP", TokenKind::Nop)],
        b'O' => &[("OR", TokenKind::Or)],
        b'P' => &[("PRINT", TokenKind::Print)],
        b'R' => &[("RETURN", TokenKind::Return)],
        b'S' => &[("SET", TokenKind::Set)],
        b'T' => &[("TRUE", TokenKind::True)],
        _ => &[],
    };
    keyword
        .iter()
        .find(|(text, _)| *text == word)
        .map_or(TokenKind::Identifier, |(_, kind)| *kind)
}
