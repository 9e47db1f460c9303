//! Structural matching of a pattern term against a candidate term.
//!
//! A successful match yields a [`Binding`] that always holds the whole
//! candidate under the reserved empty-string key, plus one entry per capture
//! or reference encountered. An empty binding means "no match".

use core::hash::BuildHasher;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use seahash::SeaHasher;
use tracing::trace;

use crate::error::{ArkError, Result};
use crate::obj::{AssignmentList, Obj, Value, ValueKind};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// Resolves reference names to the terms they stand for.
pub trait Storage {
    fn resolve(&self, name: &str) -> Option<Obj>;
}

/// Storage with nothing in it.
pub struct NoStorage;

impl Storage for NoStorage {
    fn resolve(&self, _name: &str) -> Option<Obj> {
        None
    }
}

impl<H: BuildHasher> Storage for HashMap<String, Obj, H> {
    fn resolve(&self, name: &str) -> Option<Obj> {
        self.get(name).cloned()
    }
}

// ------------- Binding -------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    bound: HashMap<String, Obj, OtherHasher>,
}

impl Binding {
    /// The reserved key under which a match records the whole candidate.
    pub const WHOLE: &'static str = "";

    pub fn new() -> Self {
        Self::default()
    }
    pub fn is_match(&self) -> bool {
        !self.bound.is_empty()
    }
    pub fn whole(&self) -> Option<&Obj> {
        self.bound.get(Self::WHOLE)
    }
    pub fn get(&self, name: &str) -> Option<&Obj> {
        self.bound.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.bound.contains_key(name)
    }
    pub fn insert(&mut self, name: impl Into<String>, obj: Obj) -> Option<Obj> {
        self.bound.insert(name.into(), obj)
    }
    /// Adds the entries of `other` whose names are not bound yet.
    pub fn union(&mut self, other: &Binding) {
        for (name, obj) in &other.bound {
            self.bound.entry(name.clone()).or_insert_with(|| obj.clone());
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Obj)> {
        self.bound.iter()
    }
    pub fn len(&self) -> usize {
        self.bound.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
    /// Records what a reference matched; the first occurrence wins.
    fn note(&mut self, name: &str, obj: &Obj) -> bool {
        self.bound
            .entry(name.to_string())
            .or_insert_with(|| obj.clone());
        true
    }
    /// Binds `name` unless it is already bound to something different.
    fn bind(&mut self, name: &str, obj: &Obj) -> bool {
        match self.bound.get(name) {
            Some(existing) => existing == obj,
            None => {
                self.bound.insert(name.to_string(), obj.clone());
                true
            }
        }
    }
}

impl Storage for Binding {
    fn resolve(&self, name: &str) -> Option<Obj> {
        self.bound.get(name).cloned()
    }
}

impl<S: Into<String>> FromIterator<(S, Obj)> for Binding {
    fn from_iter<T: IntoIterator<Item = (S, Obj)>>(iter: T) -> Self {
        Self {
            bound: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ------------- Matching -------------
/// Matches `pattern` against `candidate`.
///
/// References in the pattern are looked up in `storage`; a reference that
/// cannot be resolved is an error rather than a failed match.
pub fn match_obj(pattern: &Obj, candidate: &Obj, storage: &dyn Storage) -> Result<Binding> {
    let mut binding = Binding::new();
    if match_into(pattern, candidate, storage, &mut binding)? {
        binding.insert(Binding::WHOLE, candidate.clone());
        trace!(%pattern, %candidate, captures = binding.len() - 1, "matched");
        Ok(binding)
    } else {
        Ok(Binding::new())
    }
}

fn match_into(
    pattern: &Obj,
    candidate: &Obj,
    storage: &dyn Storage,
    binding: &mut Binding,
) -> Result<bool> {
    if let Obj::Value(value) = pattern {
        match value.kind() {
            ValueKind::SquareBracketed => return Ok(binding.bind(value.text(), candidate)),
            ValueKind::CurlyBraced => return match_reference(value, candidate, storage, binding),
            ValueKind::Plain => (),
        }
    }
    // a reference on the candidate side stands for whatever it resolves to
    if let Some(name) = candidate.as_reference() {
        return match storage.resolve(name) {
            Some(resolved) => match_into(pattern, &resolved, storage, binding),
            None => Ok(false),
        };
    }
    match (pattern, candidate) {
        (Obj::Value(p), Obj::Value(c)) => Ok(c.is_plain() && p.text() == c.text()),
        (Obj::Array(p), Obj::Array(c)) => {
            // trailing candidate elements are only ignored by patterns that capture
            if p.len() > c.len() || (p.len() < c.len() && !pattern.contains_capture()) {
                return Ok(false);
            }
            for (p, c) in p.iter().zip(c) {
                if !match_into(p, c, storage, binding)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Obj::AssignmentList(p), Obj::AssignmentList(c)) => match_assignments(p, c, storage, binding),
        (Obj::Function(p), Obj::Function(c)) => {
            if p.generic_name() != c.generic_name() {
                return Ok(false);
            }
            match_assignments(p.parameters(), c.parameters(), storage, binding)
        }
        (Obj::Rule(p), Obj::Rule(c)) => Ok(match_into(p.source(), c.source(), storage, binding)?
            && match_into(p.target(), c.target(), storage, binding)?),
        _ => Ok(false),
    }
}

fn match_reference(
    reference: &Value,
    candidate: &Obj,
    storage: &dyn Storage,
    binding: &mut Binding,
) -> Result<bool> {
    let name = reference.text();
    if candidate.as_reference() == Some(name) {
        return Ok(binding.note(name, candidate));
    }
    let stored = storage
        .resolve(name)
        .ok_or_else(|| ArkError::Unresolved(name.to_string()))?;
    if match_into(&stored, candidate, storage, binding)? {
        Ok(binding.note(name, candidate))
    } else {
        Ok(false)
    }
}

fn match_assignments(
    pattern: &AssignmentList,
    candidate: &AssignmentList,
    storage: &dyn Storage,
    binding: &mut Binding,
) -> Result<bool> {
    if pattern.len() > candidate.len() {
        return Ok(false);
    }
    if pattern.is_empty() {
        return Ok(true);
    }
    if pattern.is_named() != candidate.is_named() {
        return Ok(false);
    }
    if pattern.is_named() {
        for assignment in pattern {
            let name = assignment.name().unwrap_or_default();
            let matched = match candidate.get(name) {
                Some(value) => match_into(assignment.value(), value, storage, binding)?,
                None => false,
            };
            if !matched {
                return Ok(false);
            }
        }
    } else {
        for (p, c) in pattern.iter().zip(candidate) {
            if !match_into(p.value(), c.value(), storage, binding)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}
