//! Lexer for the Orion++ front-end source language: a small C-like surface
//! with `int`/`char`/`void` declarations, the usual control-flow keywords,
//! and C-style operators, string/char literals, and comments.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
use std::{borrow::Cow, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{borrow::Cow, string::String, vec::Vec};

use orion_core::{OrionError, OrionResult, Pos, SourceId, Span, Spanned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A lexical token kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TokenKind {
    /// An identifier that is not a reserved keyword.
    Ident(String),
    /// A decimal integer literal.
    IntLiteral(i64),
    /// A double-quoted string literal, already unescaped.
    StringLiteral(String),
    /// A single-quoted character literal, already unescaped.
    CharLiteral(char),
    /// `int`
    KwInt,
    /// `char`
    KwChar,
    /// `void`
    KwVoid,
    /// `if`
    KwIf,
    /// `else`
    KwElse,
    /// `while`
    KwWhile,
    /// `for`
    KwFor,
    /// `return`
    KwReturn,
    /// `const`
    KwConst,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// End of input.
    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<Self> {
        Some(match word {
            "int" => Self::KwInt,
            "char" => Self::KwChar,
            "void" => Self::KwVoid,
            "if" => Self::KwIf,
            "else" => Self::KwElse,
            "while" => Self::KwWhile,
            "for" => Self::KwFor,
            "return" => Self::KwReturn,
            "const" => Self::KwConst,
            _ => return None,
        })
    }
}

/// A token together with its source location.
pub type Token = Spanned<TokenKind>;

fn parse_error(message: impl Into<Cow<'static, str>>) -> OrionError {
    OrionError::ParseError { message: message.into() }
}

/// Lexes `source` into a token stream, terminated by a single [`TokenKind::Eof`].
pub fn tokenize(source_id: SourceId, source: &str) -> OrionResult<Vec<Token>> {
    Lexer::new(source_id, source).run()
}

struct Lexer<'a> {
    source_id: SourceId,
    bytes: &'a [u8],
    pos: u32,
}

impl<'a> Lexer<'a> {
    fn new(source_id: SourceId, source: &'a str) -> Self {
        Self { source_id, bytes: source.as_bytes(), pos: 0 }
    }

    fn run(mut self) -> OrionResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Spanned::new(TokenKind::Eof, self.span_from(start)));
                break;
            };
            let kind = if c.is_ascii_digit() {
                self.lex_number()?
            } else if is_ident_start(c) {
                self.lex_ident_or_keyword()
            } else if c == b'"' {
                self.lex_string()?
            } else if c == b'\'' {
                self.lex_char()?
            } else {
                self.lex_operator()?
            };
            tokens.push(Spanned::new(kind, self.span_from(start)));
        }
        Ok(tokens)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(self.source_id, Pos(start), Pos(self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos as usize).copied()
    }

    fn peek_at(&self, offset: u32) -> Option<u8> {
        self.bytes.get((self.pos + offset) as usize).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_trivia(&mut self) -> OrionResult<()> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(parse_error("unterminated block comment")),
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_number(&mut self) -> OrionResult<TokenKind> {
        let start = self.pos as usize;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let text = core::str::from_utf8(&self.bytes[start..self.pos as usize])
            .map_err(|_| parse_error("invalid utf-8 in numeric literal"))?;
        let value: i64 = text.parse().map_err(|_| parse_error("numeric literal out of range"))?;
        Ok(TokenKind::IntLiteral(value))
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos as usize;
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }
        let text = core::str::from_utf8(&self.bytes[start..self.pos as usize]).unwrap_or_default();
        TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Ident(text.into()))
    }

    fn lex_string(&mut self) -> OrionResult<TokenKind> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(parse_error("unterminated string literal")),
                Some(b'"') => break,
                Some(b'\\') => out.push(self.lex_escape()?),
                Some(c) => out.push(c as char),
            }
        }
        Ok(TokenKind::StringLiteral(out))
    }

    fn lex_char(&mut self) -> OrionResult<TokenKind> {
        self.advance();
        let value = match self.advance() {
            None => return Err(parse_error("unterminated character literal")),
            Some(b'\\') => self.lex_escape()?,
            Some(c) => c as char,
        };
        if self.advance() != Some(b'\'') {
            return Err(parse_error("character literal must contain exactly one character"));
        }
        Ok(TokenKind::CharLiteral(value))
    }

    fn lex_escape(&mut self) -> OrionResult<char> {
        Ok(match self.advance() {
            Some(b'n') => '\n',
            Some(b't') => '\t',
            Some(b'r') => '\r',
            Some(b'0') => '\0',
            Some(b'\\') => '\\',
            Some(b'\'') => '\'',
            Some(b'"') => '"',
            _ => return Err(parse_error("invalid escape sequence")),
        })
    }

    fn lex_operator(&mut self) -> OrionResult<TokenKind> {
        let c = self.advance().expect("peeked non-empty");
        let kind = match c {
            b'+' if self.peek() == Some(b'+') => {
                self.advance();
                TokenKind::PlusPlus
            }
            b'-' if self.peek() == Some(b'-') => {
                self.advance();
                TokenKind::MinusMinus
            }
            b'=' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::EqEq
            }
            b'!' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::NotEq
            }
            b'>' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::Ge
            }
            b'<' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::Le
            }
            b'&' if self.peek() == Some(b'&') => {
                self.advance();
                TokenKind::AndAnd
            }
            b'|' if self.peek() == Some(b'|') => {
                self.advance();
                TokenKind::OrOr
            }
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'=' => TokenKind::Assign,
            b'>' => TokenKind::Gt,
            b'<' => TokenKind::Lt,
            b'!' => TokenKind::Bang,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            other => return Err(parse_error(byte_to_hex_message(other))),
        };
        Ok(kind)
    }
}

fn byte_to_hex_message(byte: u8) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut msg = String::from("unexpected byte 0x");
    msg.push(HEX[(byte >> 4) as usize] as char);
    msg.push(HEX[(byte & 0x0F) as usize] as char);
    msg
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(SourceId(0), src).unwrap().into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("int main"),
            vec![TokenKind::KwInt, TokenKind::Ident("main".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_multi_char_operators_greedily() {
        assert_eq!(
            kinds("a++ == b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::PlusPlus,
                TokenKind::EqEq,
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(
            kinds("int /* skip */ x; // trailing\n"),
            vec![TokenKind::KwInt, TokenKind::Ident("x".into()), TokenKind::Semicolon, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_string_and_char_literals_with_escapes() {
        assert_eq!(
            kinds(r#" "a\nb" 'x' "#),
            vec![
                TokenKind::StringLiteral("a\nb".into()),
                TokenKind::CharLiteral('x'),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string_is_parse_error() {
        assert!(tokenize(SourceId(0), "\"abc").is_err());
    }

    #[test]
    fn token_spans_cover_the_lexeme() {
        let tokens = tokenize(SourceId(0), "int").unwrap();
        assert_eq!(tokens[0].span, Span::new(SourceId(0), Pos(0), Pos(3)));
    }
}
