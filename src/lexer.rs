//! Tokenizer for the arkconf language.
//!
//! Whitespace separates tokens and is otherwise ignored. The punctuation
//! characters `, = ; [ ] { } ( ) $` each form a token of their own, as does
//! the arrow `->`. A bare run of any other characters is a word, except the
//! single word `o` which denotes function composition. A word may also be
//! quoted with `"`, in which case punctuation and whitespace are taken
//! verbatim and `\` escapes the next character.

use std::fmt;

use logos::Logos;

use crate::error::{ArkError, Result};

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
pub enum Token {
    #[regex(r"[^\s\x22,=;\[\]{}()$\-]+", |lex| lex.slice().to_string())]
    Word(String),

    #[regex(r#""([^"\\]|\\[\s\S])*""#, unescape)]
    Quoted(String),

    #[token(",")]
    Comma,

    #[token("=")]
    Equals,

    #[token(";")]
    Semicolon,

    #[token("o", priority = 3)]
    Compose,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("$")]
    Dollar,

    #[token("->")]
    Arrow,

    #[regex(r"\s+", logos::skip)]
    Whitespace,

    Eof,
}

// strips the enclosing quotes and resolves escapes
fn unescape(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    let mut text = String::with_capacity(slice.len());
    let mut chars = slice[1..slice.len() - 1].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some(escaped) => text.push(escaped),
                None => (),
            },
            other => text.push(other),
        }
    }
    text
}

impl Token {
    /// The text of a word, quoted or not.
    pub fn text(&self) -> Option<&str> {
        match self {
            Token::Word(text) | Token::Quoted(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Word(text) => write!(f, "{}", text),
            Token::Quoted(text) => write!(f, "\"{}\"", text),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Semicolon => write!(f, ";"),
            Token::Compose => write!(f, "o"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Dollar => write!(f, "$"),
            Token::Arrow => write!(f, "->"),
            Token::Whitespace => write!(f, " "),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// A token together with the (1-based) position of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

pub struct Lexer<'a> {
    tokens: logos::Lexer<'a, Token>,
    line: usize,
    line_start: usize,
    scanned: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            tokens: Token::lexer(source),
            line: 1,
            line_start: 0,
            scanned: 0,
        }
    }

    // line and column of a byte offset, scanning forward from the last one
    fn position(&mut self, offset: usize) -> (usize, usize) {
        let source = self.tokens.source();
        for (i, c) in source[self.scanned..offset].char_indices() {
            if c == '\n' {
                self.line += 1;
                self.line_start = self.scanned + i + 1;
            }
        }
        self.scanned = offset;
        (self.line, source[self.line_start..offset].chars().count() + 1)
    }

    pub fn next_token(&mut self) -> Result<Spanned> {
        let Some(lexed) = self.tokens.next() else {
            let end = self.tokens.source().len();
            let (line, col) = self.position(end);
            return Ok(Spanned {
                token: Token::Eof,
                line,
                col,
            });
        };
        let start = self.tokens.span().start;
        let (line, col) = self.position(start);
        match lexed {
            Ok(token) => Ok(Spanned { token, line, col }),
            Err(()) => {
                let message = match self.tokens.slice().chars().next() {
                    Some('"') => "end of input inside quoted string".to_string(),
                    Some('-') => "dangling '-' (expected '->')".to_string(),
                    Some(other) => format!("unexpected character '{}'", other),
                    None => "unexpected end of input".to_string(),
                };
                Err(ArkError::Lexical { message, line, col })
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned>;
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Spanned { token: Token::Eof, .. }) => None,
            other => Some(other),
        }
    }
}

/// Tokenizes a whole text, stopping at the first lexical error.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    Lexer::new(text)
        .map(|spanned| spanned.map(|s| s.token))
        .collect()
}
