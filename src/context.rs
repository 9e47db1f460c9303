//! The Context: ten namespaces of named, live objects and the order in which
//! they were declared.
//!
//! Entries are kept the way a keeper keeps things: the first definition under
//! a name wins and is shared through an `Arc` from then on. Entries are never
//! removed; a Context is discarded whole, or a derived copy is built from it.
//! All insertion paths go through one coarse lock around the registry, so a
//! Context can be shared by worker threads that resolve definitions in
//! parallel.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::component::{Component, Factories, ParamKind, ParamValue, Resolved};
use crate::error::{ArkError, DiagnosticSink, Result, TracingSink};
use crate::matcher::{OtherHasher, Storage, match_obj};
use crate::obj::{Assignment, AssignmentList, Function, Obj};
use crate::parser;
use crate::rules::RuleSet;

// ------------- Namespace -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Model,
    Feature,
    GridSearch,
    Evaluation,
    RuleSet,
    TokenSpanFn,
    StrFn,
    TokenSpanStrFn,
    Array,
    Value,
}

impl Namespace {
    pub const ALL: [Namespace; 10] = [
        Namespace::Model,
        Namespace::Feature,
        Namespace::GridSearch,
        Namespace::Evaluation,
        Namespace::RuleSet,
        Namespace::TokenSpanFn,
        Namespace::StrFn,
        Namespace::TokenSpanStrFn,
        Namespace::Array,
        Namespace::Value,
    ];
    pub const FUNCTIONS: [Namespace; 3] = [
        Namespace::TokenSpanFn,
        Namespace::StrFn,
        Namespace::TokenSpanStrFn,
    ];
    /// Where a reference is looked up when its use site does not fix a namespace.
    const RESOLUTION_ORDER: [Namespace; 10] = [
        Namespace::Value,
        Namespace::Array,
        Namespace::TokenSpanFn,
        Namespace::StrFn,
        Namespace::TokenSpanStrFn,
        Namespace::Feature,
        Namespace::Model,
        Namespace::Evaluation,
        Namespace::GridSearch,
        Namespace::RuleSet,
    ];

    /// The declaration keyword, e.g. `ts_fn`.
    pub fn type_tag(self) -> &'static str {
        match self {
            Namespace::Model => "model",
            Namespace::Feature => "feature",
            Namespace::GridSearch => "gs",
            Namespace::Evaluation => "evaluation",
            Namespace::RuleSet => "rs",
            Namespace::TokenSpanFn => "ts_fn",
            Namespace::StrFn => "str_fn",
            Namespace::TokenSpanStrFn => "ts_str_fn",
            Namespace::Array => "array",
            Namespace::Value => "value",
        }
    }
    pub fn is_function(self) -> bool {
        Self::FUNCTIONS.contains(&self)
    }
    /// The family of `f o g`, if a function of family `f` can follow one of family `g`.
    pub fn compose(f: Namespace, g: Namespace) -> Option<Namespace> {
        use Namespace::*;
        match (f, g) {
            (TokenSpanFn, TokenSpanFn) => Some(TokenSpanFn),
            (StrFn, StrFn) => Some(StrFn),
            (StrFn, TokenSpanStrFn) => Some(TokenSpanStrFn),
            (TokenSpanStrFn, TokenSpanFn) => Some(TokenSpanStrFn),
            _ => None,
        }
    }
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

impl FromStr for Namespace {
    type Err = ArkError;
    fn from_str(s: &str) -> Result<Self> {
        Namespace::ALL
            .into_iter()
            .find(|namespace| namespace.type_tag() == s)
            .ok_or_else(|| ArkError::Structure(format!("unknown declaration type '{}'", s)))
    }
}

// ------------- Kept -------------
/// A live object held by a Context.
#[derive(Debug, Clone)]
pub enum Kept {
    Component(Arc<dyn Component>),
    RuleSet(Arc<RuleSet>),
    Array(Arc<Vec<String>>),
    Value(Arc<String>),
}

impl Kept {
    pub fn to_obj(&self) -> Obj {
        match self {
            Kept::Component(component) => component.to_obj(),
            Kept::RuleSet(rule_set) => rule_set.to_obj(),
            Kept::Array(items) => Obj::array(items.iter().cloned()),
            Kept::Value(text) => Obj::plain(text.as_str()),
        }
    }
    /// True if both are the very same live object.
    pub fn ptr_eq(&self, other: &Kept) -> bool {
        match (self, other) {
            (Kept::Component(a), Kept::Component(b)) => Arc::ptr_eq(a, b),
            (Kept::RuleSet(a), Kept::RuleSet(b)) => Arc::ptr_eq(a, b),
            (Kept::Array(a), Kept::Array(b)) => Arc::ptr_eq(a, b),
            (Kept::Value(a), Kept::Value(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ------------- Handle -------------
#[derive(Debug, Clone)]
pub struct Handle {
    namespace: Namespace,
    name: String,
    kept: Kept,
}

impl Handle {
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kept(&self) -> &Kept {
        &self.kept
    }
    pub fn to_obj(&self) -> Obj {
        self.kept.to_obj()
    }
    pub fn component(&self) -> Option<&Arc<dyn Component>> {
        match &self.kept {
            Kept::Component(component) => Some(component),
            _ => None,
        }
    }
    pub fn rule_set(&self) -> Option<&Arc<RuleSet>> {
        match &self.kept {
            Kept::RuleSet(rule_set) => Some(rule_set),
            _ => None,
        }
    }
    pub fn array(&self) -> Option<&[String]> {
        match &self.kept {
            Kept::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }
    pub fn value(&self) -> Option<&str> {
        match &self.kept {
            Kept::Value(text) => Some(text.as_str()),
            _ => None,
        }
    }
    /// True if both handles denote the same entry of the same Context.
    pub fn same(&self, other: &Handle) -> bool {
        self.namespace == other.namespace && self.name == other.name && self.kept.ptr_eq(&other.kept)
    }
}

// ------------- Keeper -------------
#[derive(Debug, Default)]
struct Keeper {
    kept: HashMap<String, Kept, OtherHasher>,
    names: Vec<String>, // in the order they were kept
}

impl Keeper {
    fn keep(&mut self, name: &str, kept: Kept) -> (Kept, bool) {
        match self.kept.entry(name.to_string()) {
            Entry::Occupied(e) => (e.get().clone(), true),
            Entry::Vacant(e) => {
                self.names.push(name.to_string());
                (e.insert(kept).clone(), false)
            }
        }
    }
    fn get(&self, name: &str) -> Option<&Kept> {
        self.kept.get(name)
    }
    fn forget(&mut self, name: &str) -> bool {
        let forgotten = self.kept.remove(name).is_some();
        if forgotten {
            self.names.retain(|kept_name| kept_name != name);
        }
        forgotten
    }
    fn contains(&self, name: &str) -> bool {
        self.kept.contains_key(name)
    }
    fn iter(&self) -> impl Iterator<Item = (&String, &Kept)> {
        self.names
            .iter()
            .filter_map(|name| self.kept.get(name).map(|kept| (name, kept)))
    }
}

// ------------- Registry -------------
/// Everything behind the Context lock.
#[derive(Debug, Default)]
struct Registry {
    keepers: [Keeper; 10],
    order: Vec<(Namespace, String)>,
    counter: u64,
}

impl Registry {
    fn keeper(&self, namespace: Namespace) -> &Keeper {
        &self.keepers[namespace.index()]
    }
    fn lookup(&self, namespace: Namespace, name: &str) -> Option<Handle> {
        self.keeper(namespace).get(name).map(|kept| Handle {
            namespace,
            name: name.to_string(),
            kept: kept.clone(),
        })
    }
    fn keep(&mut self, namespace: Namespace, name: &str, kept: Kept) -> (Handle, bool) {
        let (kept, previously_kept) = self.keepers[namespace.index()].keep(name, kept);
        if !previously_kept {
            self.order.push((namespace, name.to_string()));
        }
        debug!(%namespace, name, previously_kept, "keep");
        let handle = Handle {
            namespace,
            name: name.to_string(),
            kept,
        };
        (handle, previously_kept)
    }
    fn keep_new(&mut self, namespace: Namespace, name: &str, kept: Kept) -> Result<Handle> {
        match self.keep(namespace, name, kept) {
            (handle, false) => Ok(handle),
            (_, true) => Err(ArkError::DuplicateName {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }
    fn forget(&mut self, namespace: Namespace, name: &str) {
        if self.keepers[namespace.index()].forget(name) {
            self.order
                .retain(|(kept_namespace, kept_name)| !(*kept_namespace == namespace && kept_name == name));
            debug!(%namespace, name, "forget");
        }
    }
    /// The next synthetic name that is free in the namespace.
    fn mint(&mut self, namespace: Namespace) -> String {
        loop {
            let name = self.counter.to_string();
            self.counter += 1;
            if !self.keeper(namespace).contains(&name) {
                return name;
            }
        }
    }
    fn single_match(&self, namespace: Namespace, pattern: &Obj) -> Result<Option<Handle>> {
        let mut found = Vec::new();
        for (name, kept) in self.keeper(namespace).iter() {
            if match_obj(pattern, &kept.to_obj(), self)?.is_match() {
                found.push(Handle {
                    namespace,
                    name: name.clone(),
                    kept: kept.clone(),
                });
            }
        }
        if found.len() > 1 {
            // an entry the pattern also matches the other way round is an exact hit
            let exact: Vec<&Handle> = found
                .iter()
                .filter(|handle| matches!(match_obj(&handle.kept.to_obj(), pattern, self), Ok(binding) if binding.is_match()))
                .collect();
            if let [handle] = exact.as_slice() {
                return Ok(Some((*handle).clone()));
            }
            return Err(ArkError::Ambiguous {
                namespace: namespace.to_string(),
                candidates: found.into_iter().map(|handle| handle.name).collect(),
            });
        }
        Ok(found.pop())
    }
}

impl Storage for Registry {
    fn resolve(&self, name: &str) -> Option<Obj> {
        Namespace::RESOLUTION_ORDER
            .into_iter()
            .find_map(|namespace| self.keeper(namespace).get(name))
            .map(Kept::to_obj)
    }
}

// ------------- Journal -------------
/// Entries kept while one outer definition is being built.
#[derive(Debug, Default)]
struct Journal {
    kept: Vec<(Namespace, String)>,
}

impl Journal {
    fn record(&mut self, handle: &Handle) {
        self.kept.push((handle.namespace, handle.name.clone()));
    }
}

// ------------- Context -------------
pub struct Context {
    registry: Mutex<Registry>,
    factories: Arc<Factories>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Context {
    /// An empty Context reporting to `tracing`.
    pub fn new(factories: Factories) -> Self {
        Self::with_sink(factories, Arc::new(TracingSink))
    }
    pub fn with_sink(factories: Factories, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            factories: Arc::new(factories),
            sink,
        }
    }
    pub fn from_text(text: &str, factories: Factories, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let context = Self::with_sink(factories, sink);
        context.deserialize(text)?;
        Ok(context)
    }
    pub fn from_reader<R: Read>(reader: R, factories: Factories, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let context = Self::with_sink(factories, sink);
        let statements = context.reported(parser::parse_reader(reader))?;
        context.deserialize_statements(&statements)?;
        Ok(context)
    }
    /// An empty Context with the same factories and sink.
    fn sibling(&self) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            factories: Arc::clone(&self.factories),
            sink: Arc::clone(&self.sink),
        }
    }
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn factories(&self) -> &Factories {
        &self.factories
    }
    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }
    pub fn report(&self, error: &ArkError) {
        self.sink.report(error);
    }
    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            self.sink.report(error);
        }
        result
    }

    // ------------- queries -------------
    pub fn get(&self, namespace: Namespace, name: &str) -> Option<Handle> {
        self.registry().lookup(namespace, name)
    }
    pub fn rule_set(&self, name: &str) -> Option<Arc<RuleSet>> {
        self.get(Namespace::RuleSet, name)
            .and_then(|handle| handle.rule_set().cloned())
    }
    /// The single stored entry of the namespace that `pattern` matches, if any.
    pub fn get_match(&self, namespace: Namespace, pattern: &Obj) -> Result<Option<Handle>> {
        let found = self.registry().single_match(namespace, pattern);
        self.reported(found)
    }
    pub fn names(&self, namespace: Namespace) -> Vec<String> {
        self.registry().keeper(namespace).names.clone()
    }
    pub fn declaration_order(&self) -> Vec<(Namespace, String)> {
        self.registry().order.clone()
    }
    pub fn len(&self) -> usize {
        self.registry().order.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The counter synthetic names are minted from.
    pub fn reference_counter(&self) -> u64 {
        self.registry().counter
    }

    // ------------- construction -------------
    /// Builds `obj` into a new entry of the namespace, named `name` or a synthetic name.
    pub fn construct_from_parse(&self, namespace: Namespace, name: Option<&str>, obj: &Obj) -> Result<Handle> {
        let constructed = self.atomically(|context, journal| context.construct(namespace, name, obj, journal));
        self.reported(constructed)
    }

    /// Returns the entry `obj` refers to or structurally matches, constructing
    /// an anonymous one when nothing matches.
    pub fn get_or_construct(&self, namespace: Namespace, obj: &Obj) -> Result<Handle> {
        let found = self.atomically(|context, journal| context.find_or_construct(namespace, obj, journal));
        self.reported(found)
    }

    /// Runs one construction; if it fails, every entry it kept along the way is forgotten again.
    fn atomically<T>(&self, build: impl FnOnce(&Self, &mut Journal) -> Result<T>) -> Result<T> {
        let mut journal = Journal::default();
        let built = build(self, &mut journal);
        if built.is_err() {
            self.undo(&mut journal, 0);
        }
        built
    }

    /// Forgets the entries journaled after `mark`.
    fn undo(&self, journal: &mut Journal, mark: usize) {
        if journal.kept.len() <= mark {
            return;
        }
        let mut registry = self.registry();
        for (namespace, name) in journal.kept.drain(mark..).rev() {
            registry.forget(namespace, &name);
        }
    }

    fn construct(&self, namespace: Namespace, name: Option<&str>, obj: &Obj, journal: &mut Journal) -> Result<Handle> {
        let name = match name {
            Some(name) => {
                if self.registry().keeper(namespace).contains(name) {
                    return Err(ArkError::DuplicateName {
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => self.registry().mint(namespace),
        };
        let kept = self.realize(namespace, obj, journal)?;
        let handle = self.registry().keep_new(namespace, &name, kept)?;
        journal.record(&handle);
        Ok(handle)
    }

    fn find_or_construct(&self, namespace: Namespace, obj: &Obj, journal: &mut Journal) -> Result<Handle> {
        if let Some(name) = obj.as_reference() {
            return self
                .get(namespace, name)
                .ok_or_else(|| ArkError::Unresolved(name.to_string()));
        }
        if let Some(found) = self.registry().single_match(namespace, obj)? {
            trace!(%namespace, name = found.name(), "reused");
            return Ok(found);
        }
        let name = self.registry().mint(namespace);
        let kept = self.realize(namespace, obj, journal)?;
        let mut registry = self.registry();
        // another worker may have kept the same definition in the meantime
        if let Some(found) = registry.single_match(namespace, obj)? {
            return Ok(found);
        }
        let handle = registry.keep_new(namespace, &name, kept)?;
        journal.record(&handle);
        Ok(handle)
    }

    fn realize(&self, namespace: Namespace, obj: &Obj, journal: &mut Journal) -> Result<Kept> {
        match namespace {
            Namespace::Array => Ok(Kept::Array(Arc::new(self.realize_array(obj)?))),
            Namespace::Value => Ok(Kept::Value(Arc::new(self.realize_text(obj)?))),
            Namespace::RuleSet => Ok(Kept::RuleSet(Arc::new(RuleSet::from_obj(obj)?))),
            _ => Ok(Kept::Component(Arc::from(self.realize_component(namespace, obj, journal)?))),
        }
    }

    fn realize_array(&self, obj: &Obj) -> Result<Vec<String>> {
        match obj {
            Obj::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_plain().map(str::to_string).ok_or_else(|| {
                        ArkError::Structure(format!("array items must be values, not a {}", item.kind_name()))
                    })
                })
                .collect(),
            _ => match obj.as_reference() {
                Some(name) => self
                    .get(Namespace::Array, name)
                    .and_then(|handle| handle.array().map(<[String]>::to_vec))
                    .ok_or_else(|| ArkError::Unresolved(name.to_string())),
                None => Err(ArkError::Structure(format!(
                    "expected an array but found a {}",
                    obj.kind_name()
                ))),
            },
        }
    }

    fn realize_text(&self, obj: &Obj) -> Result<String> {
        if let Some(text) = obj.as_plain() {
            return Ok(text.to_string());
        }
        match obj.as_reference() {
            Some(name) => self
                .get(Namespace::Value, name)
                .and_then(|handle| handle.value().map(str::to_string))
                .ok_or_else(|| ArkError::Unresolved(name.to_string())),
            None => Err(ArkError::Structure(format!(
                "expected a value but found a {}",
                obj.kind_name()
            ))),
        }
    }

    fn realize_component(&self, namespace: Namespace, obj: &Obj, journal: &mut Journal) -> Result<Box<dyn Component>> {
        let function = obj.as_function().ok_or_else(|| {
            ArkError::Structure(format!(
                "a {} declaration needs a function but found a {}",
                namespace,
                obj.kind_name()
            ))
        })?;
        if namespace.is_function() && function.is_composite() {
            let inferred = self.infer_fn_namespace(obj)?;
            if inferred != namespace {
                return Err(ArkError::Structure(format!(
                    "{} is a {} and cannot be declared as a {}",
                    obj, inferred, namespace
                )));
            }
        }
        let prototypes = self.factories.prototypes(namespace, function.generic_name());
        let mut failure = ArkError::Construction(format!(
            "no {} factory knows '{}'",
            namespace,
            function.generic_name()
        ));
        for prototype in prototypes {
            let mut component = prototype.instantiate();
            let mark = journal.kept.len();
            match self.populate(component.as_mut(), function, journal) {
                Ok(()) => return Ok(component),
                Err(error) => {
                    trace!(?prototype, %error, "prototype rejected");
                    self.undo(journal, mark);
                    failure = error;
                }
            }
        }
        Err(failure)
    }

    fn populate(&self, component: &mut dyn Component, function: &Function, journal: &mut Journal) -> Result<()> {
        let names = component.parameter_names();
        for (index, assignment) in function.parameters().iter().enumerate() {
            let name = match assignment.name() {
                Some(name) => name.to_string(),
                None => names.get(index).cloned().ok_or_else(|| {
                    ArkError::Construction(format!(
                        "{} takes no parameter at position {}",
                        function.generic_name(),
                        index + 1
                    ))
                })?,
            };
            let kind = component.parameter_kind(&name).ok_or_else(|| {
                ArkError::Construction(format!(
                    "{} has no parameter '{}'",
                    function.generic_name(),
                    name
                ))
            })?;
            let value = self.resolve_parameter(kind, assignment.value(), journal)?;
            component.set_parameter(&name, value)?;
        }
        if let Some(internal) = function.internal() {
            component.set_internal(internal)?;
        }
        Ok(())
    }

    fn resolve_parameter(&self, kind: ParamKind, obj: &Obj, journal: &mut Journal) -> Result<ParamValue> {
        let resolved = match kind {
            ParamKind::Value => Resolved::Literal(Obj::plain(self.realize_text(obj)?)),
            ParamKind::Array => Resolved::Literal(Obj::array(self.realize_array(obj)?)),
            ParamKind::Entry(namespace) => Resolved::Entry(self.find_or_construct(namespace, obj, journal)?),
            ParamKind::AnyFn => {
                let namespace = self.infer_fn_namespace(obj)?;
                Resolved::Entry(self.find_or_construct(namespace, obj, journal)?)
            }
            ParamKind::Any => self.resolve_by_shape(obj, journal)?,
        };
        Ok(ParamValue::new(obj.clone(), resolved))
    }

    fn resolve_by_shape(&self, obj: &Obj, journal: &mut Journal) -> Result<Resolved> {
        match obj {
            Obj::Value(value) if value.is_reference() => {
                let found = {
                    let registry = self.registry();
                    Namespace::RESOLUTION_ORDER
                        .into_iter()
                        .find_map(|namespace| registry.lookup(namespace, value.text()))
                };
                match found {
                    Some(handle) if matches!(handle.kept(), Kept::Value(_) | Kept::Array(_)) => {
                        Ok(Resolved::Literal(handle.to_obj()))
                    }
                    Some(handle) => Ok(Resolved::Entry(handle)),
                    None => Err(ArkError::Unresolved(value.text().to_string())),
                }
            }
            Obj::Value(value) if value.is_capture() => Err(ArkError::Structure(format!(
                "the capture {} can only appear in a rule source",
                obj
            ))),
            Obj::Function(function) => match self.infer_fn_namespace(obj) {
                Ok(namespace) => Ok(Resolved::Entry(self.find_or_construct(namespace, obj, journal)?)),
                Err(error) if function.is_composite() => Err(error),
                Err(_) => Ok(Resolved::Literal(obj.clone())),
            },
            _ => Ok(Resolved::Literal(obj.clone())),
        }
    }

    /// The function namespace a function term belongs in.
    pub fn infer_fn_namespace(&self, obj: &Obj) -> Result<Namespace> {
        if let Some(name) = obj.as_reference() {
            let registry = self.registry();
            return Namespace::FUNCTIONS
                .into_iter()
                .find(|namespace| registry.keeper(*namespace).contains(name))
                .ok_or_else(|| ArkError::Unresolved(name.to_string()));
        }
        let function = obj.as_function().ok_or_else(|| {
            ArkError::Structure(format!("expected a function but found a {}", obj.kind_name()))
        })?;
        if let Some((f, g)) = function.composition() {
            let (f_family, g_family) = (self.infer_fn_namespace(f)?, self.infer_fn_namespace(g)?);
            return Namespace::compose(f_family, g_family).ok_or_else(|| {
                ArkError::Structure(format!(
                    "a {} cannot be composed with a {} in {}",
                    f_family, g_family, obj
                ))
            });
        }
        let generic_name = function.generic_name();
        let known: Vec<Namespace> = Namespace::FUNCTIONS
            .into_iter()
            .filter(|namespace| self.factories.knows(*namespace, generic_name))
            .collect();
        let candidates = if known.is_empty() {
            Namespace::FUNCTIONS
                .into_iter()
                .filter(|namespace| self.factories.has_fallback(*namespace))
                .collect()
        } else {
            known
        };
        match candidates.as_slice() {
            [namespace] => Ok(*namespace),
            [] => Err(ArkError::Construction(format!(
                "no function factory knows '{}'",
                generic_name
            ))),
            _ => Err(ArkError::Structure(format!(
                "'{}' is known to several function families ({})",
                generic_name,
                candidates
                    .iter()
                    .map(|namespace| namespace.type_tag())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    // ------------- (de)serialization -------------
    /// Appends the declarations in `text`, stopping at the first one that fails.
    pub fn deserialize(&self, text: &str) -> Result<()> {
        let statements = self.reported(parser::parse_statements(text))?;
        self.deserialize_statements(&statements)
    }

    pub fn deserialize_statements(&self, statements: &AssignmentList) -> Result<()> {
        for statement in statements {
            let declared = self.declare(statement);
            self.reported(declared)?;
        }
        Ok(())
    }

    fn declare(&self, statement: &Assignment) -> Result<Handle> {
        let namespace: Namespace = statement
            .type_tag()
            .ok_or_else(|| ArkError::Structure(format!("'{}' has no declaration type", statement)))?
            .parse()?;
        self.atomically(|context, journal| context.construct(namespace, statement.name(), statement.value(), journal))
    }

    /// Every entry as a typed statement, in declaration order.
    pub fn to_statements(&self) -> AssignmentList {
        let registry = self.registry();
        let statements = registry
            .order
            .iter()
            .filter_map(|(namespace, name)| {
                registry
                    .keeper(*namespace)
                    .get(name)
                    .map(|kept| Assignment::typed(namespace.type_tag(), name.as_str(), kept.to_obj()))
            })
            .collect();
        AssignmentList::from_entries(statements)
    }

    pub fn serialize(&self) -> String {
        self.to_string()
    }

    // ------------- derived contexts -------------
    /// An independent Context rebuilt from this one's serialized form.
    pub fn try_clone(&self) -> Result<Context> {
        let clone = self.sibling();
        clone.deserialize(&self.serialize())?;
        let counter = self.reference_counter();
        let mut registry = clone.registry();
        registry.counter = registry.counter.max(counter);
        drop(registry);
        Ok(clone)
    }

    /// A Context for a binary labeling: functions, arrays and values are
    /// shared, everything else is asked for its binary counterpart.
    pub fn make_binary(&self, label_indicator: &str) -> Result<Context> {
        let binary = self.binary(label_indicator);
        self.reported(binary)
    }

    fn binary(&self, label_indicator: &str) -> Result<Context> {
        let binary = self.sibling();
        let (order, counter) = {
            let registry = self.registry();
            (registry.order.clone(), registry.counter)
        };
        for (namespace, name) in order {
            let Some(handle) = self.get(namespace, &name) else {
                continue;
            };
            let kept = match (namespace, handle.kept) {
                (
                    Namespace::Model | Namespace::Feature | Namespace::GridSearch | Namespace::Evaluation,
                    Kept::Component(component),
                ) => Kept::Component(Arc::from(component.make_binary(label_indicator, &binary)?)),
                (Namespace::RuleSet, Kept::RuleSet(rule_set)) => {
                    Kept::RuleSet(Arc::new(rule_set.make_binary(label_indicator)))
                }
                (_, kept) => kept,
            };
            binary.registry().keep_new(namespace, &name, kept)?;
        }
        binary.registry().counter = counter;
        Ok(binary)
    }

    /// The feature entries alone, in their declaration order.
    pub fn only_features(&self) -> Context {
        let projected = self.sibling();
        {
            let source = self.registry();
            let mut target = projected.registry();
            for (namespace, name) in source.order.iter() {
                if *namespace != Namespace::Feature {
                    continue;
                }
                if let Some(kept) = source.keeper(*namespace).get(name) {
                    target.keep(*namespace, name, kept.clone());
                }
            }
            target.counter = source.counter;
        }
        projected
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Factories::new())
    }
}

impl Storage for Context {
    fn resolve(&self, name: &str) -> Option<Obj> {
        self.registry().resolve(name)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_statements())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let registry = self.registry();
        f.debug_struct("Context")
            .field("declarations", &registry.order.len())
            .field("counter", &registry.counter)
            .finish()
    }
}
