//! Recursive-descent parser from tokens to [`Obj`] terms.
//!
//! ```text
//! statements := (WORD* WORD "=" value ";")*
//! parameters := (param ("," param)*)?
//! param      := (WORD "=")? value
//! value      := primary ("o" primary)*
//! primary    := WORD ("(" parameters ")" ("{" statements "}")?)?
//!             | "$" "{" WORD "}"
//!             | "[" WORD "]"                      capture (bare word only)
//!             | "[" (value ("," value)*)? "]"     array
//!             | "(" value ")" ("->" "(" value ")")?
//! ```
//!
//! The words before `=` in a statement are, from the right, its name, its
//! type and any number of modifiers.

use std::io::Read;

use tracing::trace;

use crate::error::{ArkError, Result};
use crate::lexer::{Lexer, Spanned, Token};
use crate::obj::{Assignment, AssignmentList, Function, Obj};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Spanned>,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lexer: Lexer::new(text),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<&Spanned> {
        let spanned = match self.peeked.take() {
            Some(spanned) => spanned,
            None => self.lexer.next_token()?,
        };
        Ok(self.peeked.insert(spanned))
    }
    fn peek_token(&mut self) -> Result<&Token> {
        Ok(&self.peek()?.token)
    }
    fn next(&mut self) -> Result<Spanned> {
        match self.peeked.take() {
            Some(spanned) => Ok(spanned),
            None => self.lexer.next_token(),
        }
    }
    fn error_at(spanned: &Spanned, message: impl Into<String>) -> ArkError {
        ArkError::Parse {
            message: message.into(),
            line: spanned.line,
            col: spanned.col,
        }
    }
    fn expect(&mut self, expected: Token) -> Result<Spanned> {
        let spanned = self.next()?;
        if spanned.token == expected {
            Ok(spanned)
        } else {
            Err(Self::error_at(
                &spanned,
                format!("expected '{}' but found '{}'", expected, spanned.token),
            ))
        }
    }
    fn expect_word(&mut self, what: &str) -> Result<String> {
        let spanned = self.next()?;
        match spanned.token {
            Token::Word(text) | Token::Quoted(text) => Ok(text),
            ref other => Err(Self::error_at(
                &spanned,
                format!("expected {} but found '{}'", what, other),
            )),
        }
    }
    pub fn expect_end(&mut self) -> Result<()> {
        let spanned = self.next()?;
        match spanned.token {
            Token::Eof => Ok(()),
            ref other => Err(Self::error_at(
                &spanned,
                format!("unexpected '{}' after the end of input", other),
            )),
        }
    }

    /// Typed statements up to the end of input or a closing `}` (not consumed).
    pub fn parse_statements(&mut self) -> Result<AssignmentList> {
        let mut list = AssignmentList::statements();
        loop {
            if matches!(self.peek_token()?, Token::Eof | Token::RightBrace) {
                return Ok(list);
            }
            let mut words = Vec::new();
            loop {
                let spanned = self.next()?;
                match spanned.token {
                    Token::Word(text) | Token::Quoted(text) => words.push(text),
                    Token::Equals if !words.is_empty() => break,
                    ref other => {
                        return Err(Self::error_at(
                            &spanned,
                            format!("expected a statement name or '=' but found '{}'", other),
                        ));
                    }
                }
            }
            let value = self.parse_value()?;
            let assignment = match (words.pop(), words.pop()) {
                (Some(name), Some(type_tag)) => Assignment::typed(type_tag, name, value).with_modifiers(words),
                (Some(name), None) => Assignment::named(name, value),
                (None, _) => unreachable!("'=' is only accepted after a word"),
            };
            trace!(statement = %assignment, "parsed statement");
            list.push(assignment);
            let spanned = self.peek()?.clone();
            match spanned.token {
                Token::Semicolon => {
                    self.next()?;
                }
                Token::Eof | Token::RightBrace => (),
                ref other => {
                    return Err(Self::error_at(
                        &spanned,
                        format!("expected ';' but found '{}'", other),
                    ));
                }
            }
        }
    }

    /// Comma separated parameters up to a closing `)` (not consumed).
    pub fn parse_parameters(&mut self) -> Result<AssignmentList> {
        let mut list = AssignmentList::new();
        if matches!(self.peek_token()?, Token::RightParen | Token::Eof) {
            return Ok(list);
        }
        loop {
            let start = self.peek()?.clone();
            let first = self.parse_value()?;
            let assignment = if matches!(self.peek_token()?, Token::Equals) {
                self.next()?;
                let name = match first.as_plain() {
                    Some(name) => name.to_string(),
                    _ => {
                        return Err(Self::error_at(
                            &start,
                            format!("a parameter name must be a word, not a {}", first.kind_name()),
                        ));
                    }
                };
                Assignment::named(name, self.parse_value()?)
            } else {
                Assignment::positional(first)
            };
            if !list.push(assignment) {
                return Err(Self::error_at(
                    &start,
                    "named and positional parameters cannot be mixed",
                ));
            }
            if matches!(self.peek_token()?, Token::Comma) {
                self.next()?;
            } else {
                return Ok(list);
            }
        }
    }

    /// A value, including a chain of compositions `f o g o ...`.
    pub fn parse_value(&mut self) -> Result<Obj> {
        let first = self.parse_primary()?;
        self.parse_composition(first)
    }

    fn parse_composition(&mut self, first: Obj) -> Result<Obj> {
        let mut operands = Vec::new();
        while matches!(self.peek_token()?, Token::Compose) {
            self.next()?;
            operands.push(self.parse_primary()?);
        }
        // right-nested: f o g o h == f o (g o h)
        let composed = operands
            .into_iter()
            .rev()
            .reduce(|g, f| Obj::function(Function::composite(f, g)));
        Ok(match composed {
            Some(rest) => Obj::function(Function::composite(first, rest)),
            None => first,
        })
    }

    fn parse_primary(&mut self) -> Result<Obj> {
        let spanned = self.next()?;
        match spanned.token {
            Token::Word(text) | Token::Quoted(text) => self.parse_word(text),
            Token::Dollar => {
                self.expect(Token::LeftBrace)?;
                let name = self.expect_word("a reference name")?;
                self.expect(Token::RightBrace)?;
                Ok(Obj::reference(name))
            }
            Token::LeftBracket => self.parse_bracketed(),
            Token::LeftParen => {
                let inner = self.parse_value()?;
                self.expect(Token::RightParen)?;
                if matches!(self.peek_token()?, Token::Arrow) {
                    self.next()?;
                    self.expect(Token::LeftParen)?;
                    let target = self.parse_value()?;
                    self.expect(Token::RightParen)?;
                    Ok(Obj::rule(inner, target))
                } else {
                    Ok(inner)
                }
            }
            ref other => Err(Self::error_at(
                &spanned,
                format!("expected a value but found '{}'", other),
            )),
        }
    }

    /// A word that has already been consumed: a plain value or a function call.
    fn parse_word(&mut self, text: String) -> Result<Obj> {
        if !matches!(self.peek_token()?, Token::LeftParen) {
            return Ok(Obj::plain(text));
        }
        self.next()?;
        let parameters = self.parse_parameters()?;
        self.expect(Token::RightParen)?;
        let mut function = Function::new(text, parameters);
        if matches!(self.peek_token()?, Token::LeftBrace) {
            self.next()?;
            let internal = self.parse_statements()?;
            self.expect(Token::RightBrace)?;
            function = function.with_internal(internal);
        }
        Ok(Obj::function(function))
    }

    /// Everything after an opening `[`: a capture or an array.
    fn parse_bracketed(&mut self) -> Result<Obj> {
        if matches!(self.peek_token()?, Token::RightBracket) {
            self.next()?;
            return Ok(Obj::Array(Vec::new()));
        }
        let mut items = Vec::new();
        if let Token::Word(_) = self.peek_token()? {
            let text = match self.next()?.token {
                Token::Word(text) => text,
                _ => unreachable!("peeked a string token"),
            };
            if matches!(self.peek_token()?, Token::RightBracket) {
                self.next()?;
                return Ok(Obj::capture(text));
            }
            let first = self.parse_word(text)?;
            items.push(self.parse_composition(first)?);
        } else {
            items.push(self.parse_value()?);
        }
        loop {
            let spanned = self.next()?;
            match spanned.token {
                Token::Comma => items.push(self.parse_value()?),
                Token::RightBracket => return Ok(Obj::Array(items)),
                ref other => {
                    return Err(Self::error_at(
                        &spanned,
                        format!("expected ',' or ']' but found '{}'", other),
                    ));
                }
            }
        }
    }
}

/// Parses a single value, e.g. `Head()` or `(${str} o ${head})`.
pub fn parse_value(text: &str) -> Result<Obj> {
    let mut parser = Parser::new(text);
    let obj = parser.parse_value()?;
    parser.expect_end()?;
    Ok(obj)
}

/// Parses a sequence of statements, e.g. `ts_fn head=Head(); value n="2";`.
pub fn parse_statements(text: &str) -> Result<AssignmentList> {
    let mut parser = Parser::new(text);
    let list = parser.parse_statements()?;
    parser.expect_end()?;
    Ok(list)
}

/// Parses a bare parameter list, e.g. `n="2", noHead="true"`.
pub fn parse_parameters(text: &str) -> Result<AssignmentList> {
    let mut parser = Parser::new(text);
    let list = parser.parse_parameters()?;
    parser.expect_end()?;
    Ok(list)
}

/// Reads statements from an already-open reader.
pub fn parse_reader<R: Read>(mut reader: R) -> Result<AssignmentList> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_statements(&text)
}
