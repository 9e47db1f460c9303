//! Renders terms back to canonical text.
//!
//! The output of [`serialize`] parses back into a structurally equal term.
//! Plain values are always quoted; names, types and generic names are quoted
//! only when they would not lex as a single bare string.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::obj::{Assignment, AssignmentList, Function, Obj, Rule, Value, ValueKind};

lazy_static! {
    static ref BARE: Regex = Regex::new(r#"^[^\s,=;\[\]{}()$"\-]+$"#).unwrap();
}

pub fn serialize(obj: &Obj) -> String {
    obj.to_string()
}

/// Renders a string so that it lexes back as exactly one string token.
pub fn quoted(text: &str) -> String {
    let mut s = String::with_capacity(text.len() + 2);
    s.push('"');
    for c in text.chars() {
        match c {
            '"' => s.push_str("\\\""),
            '\\' => s.push_str("\\\\"),
            '\n' => s.push_str("\\n"),
            '\t' => s.push_str("\\t"),
            other => s.push(other),
        }
    }
    s.push('"');
    s
}

/// Like [`quoted`], but leaves strings that are already a bare token alone.
pub fn word(text: &str) -> String {
    if text != "o" && BARE.is_match(text) {
        text.to_string()
    } else {
        quoted(text)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ValueKind::Plain => write!(f, "{}", quoted(self.text())),
            ValueKind::CurlyBraced => write!(f, "${{{}}}", word(self.text())),
            ValueKind::SquareBracketed => write!(f, "[{}]", self.text()),
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for modifier in self.modifiers() {
            write!(f, "{} ", word(modifier))?;
        }
        if let Some(type_tag) = self.type_tag() {
            write!(f, "{} ", word(type_tag))?;
        }
        if let Some(name) = self.name() {
            write!(f, "{}=", word(name))?;
        }
        write!(f, "{}", self.value())
    }
}

impl AssignmentList {
    /// Statement form: every entry terminated by `;`, entries joined by `separator`.
    fn fmt_statements(&self, f: &mut fmt::Formatter, separator: &str) -> fmt::Result {
        for (i, assignment) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            write!(f, "{};", assignment)?;
        }
        Ok(())
    }
    fn fmt_parameters(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, assignment) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", assignment)?;
        }
        Ok(())
    }
}

impl fmt::Display for AssignmentList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_statements() {
            self.fmt_statements(f, "\n")?;
            if !self.is_empty() {
                f.write_str("\n")?;
            }
            Ok(())
        } else {
            self.fmt_parameters(f)
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some((first, rest)) = self.composition() {
            // the right spine of a composition is flattened into one chain
            write!(f, "({}", first)?;
            let mut next = rest;
            loop {
                match next.as_function().and_then(Function::composition) {
                    Some((head, tail)) => {
                        write!(f, " o {}", head)?;
                        next = tail;
                    }
                    None => {
                        write!(f, " o {})", next)?;
                        return Ok(());
                    }
                }
            }
        }
        write!(f, "{}(", word(self.generic_name()))?;
        self.parameters().fmt_parameters(f)?;
        f.write_str(")")?;
        if let Some(internal) = self.internal() {
            f.write_str(" {")?;
            if !internal.is_empty() {
                f.write_str(" ")?;
                internal.fmt_statements(f, " ")?;
            }
            f.write_str(" }")?;
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}) -> ({})", self.source(), self.target())
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Obj::Value(value) => write!(f, "{}", value),
            Obj::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Obj::AssignmentList(list) => write!(f, "{}", list),
            Obj::Function(function) => write!(f, "{}", function),
            Obj::Rule(rule) => write!(f, "{}", rule),
        }
    }
}
