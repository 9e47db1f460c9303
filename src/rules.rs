//! Rule sets: term rewriting by pattern match, binding and substitution.
//!
//! ```text
//! rs rules=RuleSet() {
//!   rule sentInc=(Feature(fn=NGram(n=[n]))) -> (Feature(fn=NGram(n=${n++})));
//! };
//! ```
//!
//! A rule applies to a term when its source matches it. The captures of the
//! match, the caller's extra bindings and an `n++` binding for every capture
//! `n` bound to a decimal number are then substituted into a copy of the
//! target.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::context::{Context, Namespace};
use crate::error::{ArkError, Result};
use crate::matcher::{Binding, match_obj};
use crate::obj::{Assignment, AssignmentList, Function, Obj, Rule, Value, ValueKind};

lazy_static! {
    static ref DECIMAL: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<(String, Rule)>,
}

impl RuleSet {
    pub const GENERIC_NAME: &'static str = "RuleSet";
    pub const RULE_TYPE: &'static str = "rule";

    pub fn new() -> Self {
        Self::default()
    }
    pub fn add(&mut self, name: impl Into<String>, rule: Rule) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ArkError::DuplicateName {
                namespace: Self::RULE_TYPE.to_string(),
                name,
            });
        }
        self.rules.push((name, rule));
        Ok(())
    }
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rule)| rule)
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }
    pub fn len(&self) -> usize {
        self.rules.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Reads `RuleSet() { rule NAME=(source) -> (target); ... }`.
    pub fn from_obj(obj: &Obj) -> Result<Self> {
        let function = obj
            .as_function()
            .filter(|function| function.generic_name() == Self::GENERIC_NAME)
            .ok_or_else(|| {
                ArkError::Structure(format!("a rule set must be written {}() {{ ... }}", Self::GENERIC_NAME))
            })?;
        if !function.parameters().is_empty() {
            return Err(ArkError::Structure(format!(
                "{} takes no parameters",
                Self::GENERIC_NAME
            )));
        }
        let mut rule_set = Self::new();
        for assignment in function.internal().into_iter().flatten() {
            if assignment.type_tag() != Some(Self::RULE_TYPE) {
                return Err(ArkError::Structure(format!(
                    "a rule set holds only '{}' statements, not '{}'",
                    Self::RULE_TYPE,
                    assignment
                )));
            }
            let name = assignment.name().unwrap_or_default();
            let rule = assignment.value().as_rule().ok_or_else(|| {
                ArkError::Structure(format!(
                    "rule {} must be written (source) -> (target)",
                    name
                ))
            })?;
            rule_set.add(name, rule.clone())?;
        }
        Ok(rule_set)
    }

    pub fn to_obj(&self) -> Obj {
        let rules = self
            .rules
            .iter()
            .map(|(name, rule)| Assignment::typed(Self::RULE_TYPE, name.as_str(), Obj::Rule(Box::new(rule.clone()))))
            .collect();
        Obj::function(
            Function::new(Self::GENERIC_NAME, AssignmentList::new())
                .with_internal(AssignmentList::from_entries(rules)),
        )
    }

    /// Rules carry no labels of their own, so the binary counterpart is a copy.
    pub fn make_binary(&self, _label_indicator: &str) -> RuleSet {
        self.clone()
    }

    /// Applies every rule whose source matches `source`.
    ///
    /// A rule that fails to match is skipped silently; a rule that matches
    /// but cannot be instantiated is reported through the Context's sink and
    /// skipped, without affecting the others.
    pub fn apply_rules(&self, context: &Context, source: &Obj, extra: &Binding) -> BTreeMap<String, Obj> {
        let mut derived = BTreeMap::new();
        for (name, rule) in &self.rules {
            match apply(rule, context, source, extra) {
                Ok(Some(target)) => {
                    debug!(rule = %name, %target, "rule applied");
                    derived.insert(name.clone(), target);
                }
                Ok(None) => trace!(rule = %name, "rule does not apply"),
                Err(error) => context.report(&error),
            }
        }
        derived
    }

    /// Applies a single rule by name; `Ok(None)` if its source does not match.
    pub fn apply_rule(&self, name: &str, context: &Context, source: &Obj, extra: &Binding) -> Result<Option<Obj>> {
        let rule = self.get(name).ok_or_else(|| ArkError::Unresolved(name.to_string()))?;
        let applied = apply(rule, context, source, extra);
        if let Err(error) = &applied {
            context.report(error);
        }
        applied
    }
}

fn apply(rule: &Rule, context: &Context, source: &Obj, extra: &Binding) -> Result<Option<Obj>> {
    let mut binding = match_obj(rule.source(), source, context)?;
    if !binding.is_match() {
        return Ok(None);
    }
    binding.union(extra);
    bind_increments(&mut binding);
    substitute(rule.target(), &binding, context).map(Some)
}

/// Binds `name++` to the successor of every decimal value bound to `name`.
fn bind_increments(binding: &mut Binding) {
    let increments: Vec<(String, Obj)> = binding
        .iter()
        .filter(|(name, _)| name.as_str() != Binding::WHOLE)
        .filter_map(|(name, obj)| {
            let text = obj.as_plain().filter(|text| DECIMAL.is_match(text))?;
            let next = text.parse::<u64>().ok()?.checked_add(1)?;
            Some((format!("{}++", name), Obj::plain(next.to_string())))
        })
        .collect();
    for (name, obj) in increments {
        if !binding.contains(&name) {
            binding.insert(name, obj);
        }
    }
}

fn substitute(template: &Obj, binding: &Binding, context: &Context) -> Result<Obj> {
    match template {
        Obj::Value(value) => match value.kind() {
            ValueKind::Plain => Ok(template.clone()),
            ValueKind::CurlyBraced => lookup(value, binding, context),
            ValueKind::SquareBracketed => Err(ArkError::Structure(format!(
                "the capture {} can only appear in a rule source",
                template
            ))),
        },
        Obj::Array(items) => items
            .iter()
            .map(|item| substitute(item, binding, context))
            .collect::<Result<Vec<_>>>()
            .map(Obj::Array),
        Obj::AssignmentList(list) => substitute_list(list, binding, context).map(Obj::AssignmentList),
        Obj::Function(function) => {
            let parameters = substitute_list(function.parameters(), binding, context)?;
            let mut substituted = Function::new(function.generic_name(), parameters);
            if let Some(internal) = function.internal() {
                substituted = substituted.with_internal(substitute_list(internal, binding, context)?);
            }
            Ok(Obj::function(substituted))
        }
        Obj::Rule(rule) => Ok(Obj::rule(
            substitute(rule.source(), binding, context)?,
            substitute(rule.target(), binding, context)?,
        )),
    }
}

fn substitute_list(list: &AssignmentList, binding: &Binding, context: &Context) -> Result<AssignmentList> {
    let mut substituted = Vec::with_capacity(list.len());
    for assignment in list {
        let value = substitute(assignment.value(), binding, context)?;
        let entry = match (assignment.type_tag(), assignment.name()) {
            (Some(type_tag), Some(name)) => {
                Assignment::typed(type_tag, name, value).with_modifiers(assignment.modifiers().to_vec())
            }
            (None, Some(name)) => Assignment::named(name, value),
            (_, None) => Assignment::positional(value),
        };
        substituted.push(entry);
    }
    let rebuilt = AssignmentList::from_entries(substituted);
    Ok(if list.is_statements() { rebuilt.into_statements() } else { rebuilt })
}

/// A reference in a target: the binding first, then the Context's values and arrays.
fn lookup(reference: &Value, binding: &Binding, context: &Context) -> Result<Obj> {
    let name = reference.text();
    if let Some(bound) = binding.get(name) {
        return Ok(bound.clone());
    }
    [Namespace::Value, Namespace::Array]
        .into_iter()
        .find_map(|namespace| context.get(namespace, name))
        .map(|handle| handle.to_obj())
        .ok_or_else(|| ArkError::Unresolved(name.to_string()))
}
