//! The term model produced by the parser.
//!
//! Every construct of the language is an [`Obj`]: a value, an array, an
//! assignment list, a function or a rule. Terms are plain owned trees that
//! are never mutated once parsed; consumers clone before they change
//! anything.

// ------------- Value -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// a literal string
    Plain,
    /// `${name}`, a reference
    CurlyBraced,
    /// `[name]`, a capture in a rule source
    SquareBracketed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    kind: ValueKind,
    text: String,
}

impl Value {
    pub fn new(kind: ValueKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn is_plain(&self) -> bool {
        self.kind == ValueKind::Plain
    }
    pub fn is_reference(&self) -> bool {
        self.kind == ValueKind::CurlyBraced
    }
    pub fn is_capture(&self) -> bool {
        self.kind == ValueKind::SquareBracketed
    }
}

// ------------- Assignment -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    name: Option<String>,
    value: Obj,
    type_tag: Option<String>,
    modifiers: Vec<String>,
}

impl Assignment {
    pub fn positional(value: Obj) -> Self {
        Self {
            name: None,
            value,
            type_tag: None,
            modifiers: Vec::new(),
        }
    }
    pub fn named(name: impl Into<String>, value: Obj) -> Self {
        Self {
            name: Some(name.into()),
            value,
            type_tag: None,
            modifiers: Vec::new(),
        }
    }
    pub fn typed(type_tag: impl Into<String>, name: impl Into<String>, value: Obj) -> Self {
        Self {
            name: Some(name.into()),
            value,
            type_tag: Some(type_tag.into()),
            modifiers: Vec::new(),
        }
    }
    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.modifiers = modifiers;
        self
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn value(&self) -> &Obj {
        &self.value
    }
    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }
    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }
    pub fn into_value(self) -> Obj {
        self.value
    }
}

// ------------- AssignmentList -------------
/// An ordered list of assignments that are either all named or all positional.
///
/// A list is in statement form (`a=1; b=2;`) or parameter form (`a=1, b=2`).
/// Lists holding typed entries and internal lists are always statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AssignmentList {
    entries: Vec<Assignment>,
    statements: bool,
}

impl AssignmentList {
    pub fn new() -> Self {
        Self::default()
    }
    /// An empty list in statement form.
    pub fn statements() -> Self {
        Self {
            entries: Vec::new(),
            statements: true,
        }
    }
    pub fn into_statements(mut self) -> Self {
        self.statements = true;
        self
    }
    /// Panics when named and positional entries are mixed; the parser checks
    /// this before it gets here.
    pub fn from_entries(entries: Vec<Assignment>) -> Self {
        let named = entries.iter().filter(|a| a.name.is_some()).count();
        assert!(
            named == 0 || named == entries.len(),
            "assignment list mixes named and positional entries"
        );
        let statements = entries.iter().any(|a| a.type_tag.is_some());
        Self { entries, statements }
    }
    /// Appends an entry, refusing one that would mix named and positional entries.
    pub fn push(&mut self, assignment: Assignment) -> bool {
        if let Some(first) = self.entries.first() {
            if first.name.is_some() != assignment.name.is_some() {
                return false;
            }
        }
        self.statements |= assignment.type_tag.is_some();
        self.entries.push(assignment);
        true
    }
    pub fn entries(&self) -> &[Assignment] {
        &self.entries
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Assignment> {
        self.entries.iter()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// True for a non-empty list of named entries.
    pub fn is_named(&self) -> bool {
        self.entries.first().is_some_and(|a| a.name.is_some())
    }
    /// True for a non-empty list of positional entries.
    pub fn is_positional(&self) -> bool {
        self.entries.first().is_some_and(|a| a.name.is_none())
    }
    /// True when at least one entry carries a type tag.
    pub fn is_typed(&self) -> bool {
        self.entries.iter().any(|a| a.type_tag.is_some())
    }
    pub fn is_statements(&self) -> bool {
        self.statements
    }
    pub fn get(&self, name: &str) -> Option<&Obj> {
        self.entries
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .map(|a| &a.value)
    }
}

impl<'a> IntoIterator for &'a AssignmentList {
    type Item = &'a Assignment;
    type IntoIter = std::slice::Iter<'a, Assignment>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ------------- Function -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Function {
    generic_name: String,
    parameters: AssignmentList,
    internal: Option<AssignmentList>,
}

impl Function {
    pub const COMPOSITE: &'static str = "Composite";

    pub fn new(generic_name: impl Into<String>, parameters: AssignmentList) -> Self {
        Self {
            generic_name: generic_name.into(),
            parameters,
            internal: None,
        }
    }
    pub fn with_internal(mut self, internal: AssignmentList) -> Self {
        self.internal = Some(internal.into_statements());
        self
    }
    /// `f o g`, composition of two functions.
    pub fn composite(f: Obj, g: Obj) -> Self {
        Self::new(
            Self::COMPOSITE,
            AssignmentList::from_entries(vec![
                Assignment::named("f", f),
                Assignment::named("g", g),
            ]),
        )
    }
    pub fn generic_name(&self) -> &str {
        &self.generic_name
    }
    pub fn parameters(&self) -> &AssignmentList {
        &self.parameters
    }
    pub fn internal(&self) -> Option<&AssignmentList> {
        self.internal.as_ref()
    }
    /// The operands of a composition written with `o`, if this is one.
    pub fn composition(&self) -> Option<(&Obj, &Obj)> {
        if self.generic_name != Self::COMPOSITE || self.internal.is_some() {
            return None;
        }
        match self.parameters.entries() {
            [f, g] if f.name() == Some("f") && g.name() == Some("g") => Some((f.value(), g.value())),
            _ => None,
        }
    }
    pub fn is_composite(&self) -> bool {
        self.composition().is_some()
    }
}

// ------------- Rule -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    source: Obj,
    target: Obj,
}

impl Rule {
    pub fn new(source: Obj, target: Obj) -> Self {
        Self { source, target }
    }
    pub fn source(&self) -> &Obj {
        &self.source
    }
    pub fn target(&self) -> &Obj {
        &self.target
    }
}

// ------------- Obj -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Obj {
    Value(Value),
    Array(Vec<Obj>),
    AssignmentList(AssignmentList),
    Function(Box<Function>),
    Rule(Box<Rule>),
}

impl Obj {
    pub fn plain(text: impl Into<String>) -> Self {
        Obj::Value(Value::new(ValueKind::Plain, text))
    }
    pub fn reference(name: impl Into<String>) -> Self {
        Obj::Value(Value::new(ValueKind::CurlyBraced, name))
    }
    pub fn capture(name: impl Into<String>) -> Self {
        Obj::Value(Value::new(ValueKind::SquareBracketed, name))
    }
    pub fn array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Obj::Array(items.into_iter().map(Obj::plain).collect())
    }
    pub fn function(function: Function) -> Self {
        Obj::Function(Box::new(function))
    }
    pub fn rule(source: Obj, target: Obj) -> Self {
        Obj::Rule(Box::new(Rule::new(source, target)))
    }
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Obj::Value(value) => Some(value),
            _ => None,
        }
    }
    pub fn as_plain(&self) -> Option<&str> {
        self.as_value().filter(|v| v.is_plain()).map(Value::text)
    }
    pub fn as_reference(&self) -> Option<&str> {
        self.as_value().filter(|v| v.is_reference()).map(Value::text)
    }
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Obj::Function(function) => Some(function.as_ref()),
            _ => None,
        }
    }
    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            Obj::Rule(rule) => Some(rule.as_ref()),
            _ => None,
        }
    }
    pub fn kind_name(&self) -> &'static str {
        match self {
            Obj::Value(v) => match v.kind() {
                ValueKind::Plain => "value",
                ValueKind::CurlyBraced => "reference",
                ValueKind::SquareBracketed => "capture",
            },
            Obj::Array(_) => "array",
            Obj::AssignmentList(_) => "assignment list",
            Obj::Function(_) => "function",
            Obj::Rule(_) => "rule",
        }
    }
    /// True if a `[name]` capture occurs anywhere in this term.
    pub fn contains_capture(&self) -> bool {
        match self {
            Obj::Value(v) => v.is_capture(),
            Obj::Array(items) => items.iter().any(Obj::contains_capture),
            Obj::AssignmentList(list) => list.iter().any(|a| a.value().contains_capture()),
            Obj::Function(function) => {
                function.parameters().iter().any(|a| a.value().contains_capture())
                    || function
                        .internal()
                        .is_some_and(|i| i.iter().any(|a| a.value().contains_capture()))
            }
            Obj::Rule(rule) => rule.source().contains_capture() || rule.target().contains_capture(),
        }
    }
}

impl From<Function> for Obj {
    fn from(function: Function) -> Self {
        Obj::function(function)
    }
}

impl From<AssignmentList> for Obj {
    fn from(list: AssignmentList) -> Self {
        Obj::AssignmentList(list)
    }
}
