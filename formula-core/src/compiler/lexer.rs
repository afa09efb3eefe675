//! Tokenizer for formula text.
//!
//! Positions are byte offsets into the source so that error messages can
//! point at the offending character even when the text contains the
//! non-ASCII operator spellings (`×`, `÷`, `−`).

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{FormulaError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    /// Byte offset of the next unread character.
    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(pos, _)| pos)
            .unwrap_or(self.source.len())
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let position = self.offset();
        let Some(&(_, c)) = self.chars.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position,
            });
        };

        let kind = match c {
            '+' => self.single(TokenKind::Plus),
            '-' | '−' => self.single(TokenKind::Minus),
            '*' | '×' => self.single(TokenKind::Star),
            '/' | '÷' => self.single(TokenKind::Slash),
            '^' => self.single(TokenKind::Caret),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            c if c.is_ascii_digit() || c == '.' => self.read_number(position)?,
            c if c.is_ascii_alphabetic() || c == '_' => TokenKind::Identifier(self.read_identifier()),
            other => {
                return Err(FormulaError::syntax(
                    format!("unexpected character '{other}'"),
                    position,
                ))
            }
        };

        Ok(Token { kind, position })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.chars.next();
        kind
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
    }

    fn take_digits(&mut self) -> usize {
        let mut count = 0;
        while self.chars.next_if(|&(_, c)| c.is_ascii_digit()).is_some() {
            count += 1;
        }
        count
    }

    fn read_number(&mut self, start: usize) -> Result<TokenKind> {
        let mut digits = self.take_digits();
        if self.chars.next_if(|&(_, c)| c == '.').is_some() {
            digits += self.take_digits();
        }
        if digits == 0 {
            return Err(FormulaError::syntax("expected digits", start));
        }

        // Exponent, e.g. 1e10 or 1.5e-3
        if self.chars.next_if(|&(_, c)| c == 'e' || c == 'E').is_some() {
            self.chars.next_if(|&(_, c)| c == '+' || c == '-');
            if self.take_digits() == 0 {
                let position = self.offset();
                return Err(FormulaError::syntax("expected exponent digits", position));
            }
        }

        let end = self.offset();
        let text = &self.source[start..end];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| FormulaError::syntax(format!("invalid number '{text}'"), start))
    }

    fn read_identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_')
        {
            name.push(c);
        }
        name
    }
}
