//! The protocol between the [`Context`] and the components it realizes.
//!
//! Concrete models, features, evaluations and functions live outside this
//! crate. They reach the Context through [`Factories`], a registry from
//! generic name to [`Prototype`]s, and are populated through the parameter
//! get/set protocol of the [`Component`] trait.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::{Context, Handle, Namespace};
use crate::error::{ArkError, Result};
use crate::matcher::OtherHasher;
use crate::obj::{Assignment, AssignmentList, Function, Obj};

// ------------- Parameters -------------
/// How the Context resolves a parameter value before handing it over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// a scalar literal, or a reference into the `value` namespace
    Value,
    /// an array literal, or a reference into the `array` namespace
    Array,
    /// a definition or reference resolved by get-or-construct in a namespace
    Entry(Namespace),
    /// a function from any of the three function namespaces
    AnyFn,
    /// decided by the shape of the value itself
    Any,
}

#[derive(Debug, Clone)]
pub enum Resolved {
    Literal(Obj),
    Entry(Handle),
}

/// A parameter value as written, together with what it resolved to.
#[derive(Debug, Clone)]
pub struct ParamValue {
    obj: Obj,
    resolved: Resolved,
}

impl ParamValue {
    pub fn new(obj: Obj, resolved: Resolved) -> Self {
        Self { obj, resolved }
    }
    pub fn literal(obj: Obj) -> Self {
        Self {
            resolved: Resolved::Literal(obj.clone()),
            obj,
        }
    }
    pub fn obj(&self) -> &Obj {
        &self.obj
    }
    pub fn resolved(&self) -> &Resolved {
        &self.resolved
    }
    pub fn handle(&self) -> Option<&Handle> {
        match &self.resolved {
            Resolved::Entry(handle) => Some(handle),
            Resolved::Literal(_) => None,
        }
    }
    /// The resolved text of a scalar parameter.
    pub fn text(&self) -> Option<&str> {
        match &self.resolved {
            Resolved::Literal(obj) => obj.as_plain(),
            Resolved::Entry(_) => None,
        }
    }
}

// ------------- Component -------------
pub trait Component: Send + Sync + fmt::Debug {
    fn generic_name(&self) -> &str;
    /// Parameter names in their canonical order, also used for positional parameters.
    fn parameter_names(&self) -> Vec<String>;
    /// `None` for a parameter the component does not have.
    fn parameter_kind(&self, name: &str) -> Option<ParamKind>;
    fn get_parameter(&self, name: &str) -> Option<Obj>;
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<()>;
    fn internal(&self) -> Option<AssignmentList> {
        None
    }
    fn set_internal(&mut self, _internal: &AssignmentList) -> Result<()> {
        Ok(())
    }
    /// The counterpart of this component for a binary labeling, resolved
    /// against the binary context under construction.
    fn make_binary(&self, label_indicator: &str, context: &Context) -> Result<Box<dyn Component>>;
    fn as_any(&self) -> &dyn Any;

    fn to_obj(&self) -> Obj {
        let mut parameters = AssignmentList::new();
        for name in self.parameter_names() {
            if let Some(value) = self.get_parameter(&name) {
                parameters.push(Assignment::named(name, value));
            }
        }
        let function = Function::new(self.generic_name(), parameters);
        match self.internal() {
            Some(internal) => Obj::function(function.with_internal(internal)),
            None => Obj::function(function),
        }
    }
}

// ------------- Prototype -------------
type Build = dyn Fn() -> Box<dyn Component> + Send + Sync;

/// Builds fresh instances of one generic name in one family.
#[derive(Clone)]
pub struct Prototype {
    family: Namespace,
    generic_name: String,
    build: Arc<Build>,
}

impl Prototype {
    pub fn new<F>(family: Namespace, generic_name: impl Into<String>, build: F) -> Self
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        Self {
            family,
            generic_name: generic_name.into(),
            build: Arc::new(build),
        }
    }
    pub fn family(&self) -> Namespace {
        self.family
    }
    pub fn generic_name(&self) -> &str {
        &self.generic_name
    }
    pub fn instantiate(&self) -> Box<dyn Component> {
        (self.build)()
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Prototype({} {})", self.family, self.generic_name)
    }
}

// ------------- Factories -------------
#[derive(Debug, Clone, Default)]
pub struct Factories {
    registered: HashMap<(Namespace, String), Vec<Prototype>, OtherHasher>,
    fallback: Vec<Namespace>,
}

impl Factories {
    /// A registry that already knows function composition in every function family.
    pub fn new() -> Self {
        let mut factories = Self::empty();
        for family in Namespace::FUNCTIONS {
            factories.register(GenericComponent::composite_prototype(family));
        }
        factories
    }
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn register(&mut self, prototype: Prototype) {
        self.registered
            .entry((prototype.family, prototype.generic_name.clone()))
            .or_default()
            .push(prototype);
    }
    /// Registers a permissive component that accepts any named parameter.
    pub fn register_generic(&mut self, family: Namespace, generic_name: &str) {
        self.register(GenericComponent::permissive_prototype(family, generic_name));
    }
    /// Registers a component with a fixed parameter schema.
    pub fn register_schema(&mut self, family: Namespace, generic_name: &str, schema: Vec<Parameter>) {
        self.register(GenericComponent::schema_prototype(family, generic_name, schema));
    }
    /// Lets a family realize any generic name it has no registration for.
    pub fn with_fallback(mut self, family: Namespace) -> Self {
        if !self.fallback.contains(&family) {
            self.fallback.push(family);
        }
        self
    }
    pub fn has_fallback(&self, family: Namespace) -> bool {
        self.fallback.contains(&family)
    }
    /// True if the family has an explicit registration for the generic name.
    pub fn knows(&self, family: Namespace, generic_name: &str) -> bool {
        self.registered
            .contains_key(&(family, generic_name.to_string()))
    }
    /// Every prototype that may realize the generic name, in registration order.
    pub fn prototypes(&self, family: Namespace, generic_name: &str) -> Vec<Prototype> {
        match self.registered.get(&(family, generic_name.to_string())) {
            Some(prototypes) => prototypes.clone(),
            None if self.has_fallback(family) => {
                vec![GenericComponent::permissive_prototype(family, generic_name)]
            }
            None => Vec::new(),
        }
    }
}

// ------------- GenericComponent -------------
/// One declared parameter of a schema-driven component.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    kind: ParamKind,
    default: Option<Obj>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }
    pub fn with_default(mut self, default: Obj) -> Self {
        self.default = Some(default);
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> ParamKind {
        self.kind
    }
}

/// A component that only records its parameters.
///
/// With a schema it accepts exactly the declared parameters; without one it
/// is permissive and accepts any named parameter, resolved by shape.
#[derive(Debug, Clone)]
pub struct GenericComponent {
    generic_name: String,
    schema: Option<Arc<Vec<Parameter>>>,
    values: Vec<(String, ParamValue)>,
    internal: Option<AssignmentList>,
    label_indicator: Option<String>,
}

impl GenericComponent {
    pub fn permissive(generic_name: impl Into<String>) -> Self {
        Self {
            generic_name: generic_name.into(),
            schema: None,
            values: Vec::new(),
            internal: None,
            label_indicator: None,
        }
    }
    pub fn with_schema(generic_name: impl Into<String>, schema: Vec<Parameter>) -> Self {
        Self {
            schema: Some(Arc::new(schema)),
            ..Self::permissive(generic_name)
        }
    }
    pub fn permissive_prototype(family: Namespace, generic_name: &str) -> Prototype {
        let name = generic_name.to_string();
        Prototype::new(family, generic_name, move || {
            Box::new(GenericComponent::permissive(name.clone()))
        })
    }
    pub fn schema_prototype(family: Namespace, generic_name: &str, schema: Vec<Parameter>) -> Prototype {
        let name = generic_name.to_string();
        let schema = Arc::new(schema);
        Prototype::new(family, generic_name, move || {
            Box::new(GenericComponent {
                schema: Some(Arc::clone(&schema)),
                ..GenericComponent::permissive(name.clone())
            })
        })
    }
    pub fn composite_prototype(family: Namespace) -> Prototype {
        Self::schema_prototype(
            family,
            Function::COMPOSITE,
            vec![
                Parameter::new("f", ParamKind::AnyFn),
                Parameter::new("g", ParamKind::AnyFn),
            ],
        )
    }
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
    pub fn label_indicator(&self) -> Option<&str> {
        self.label_indicator.as_deref()
    }
    fn declared(&self, name: &str) -> Option<&Parameter> {
        self.schema
            .as_ref()
            .and_then(|schema| schema.iter().find(|p| p.name == name))
    }
}

impl Component for GenericComponent {
    fn generic_name(&self) -> &str {
        &self.generic_name
    }
    fn parameter_names(&self) -> Vec<String> {
        match &self.schema {
            Some(schema) => schema.iter().map(|p| p.name.clone()).collect(),
            None => self.values.iter().map(|(name, _)| name.clone()).collect(),
        }
    }
    fn parameter_kind(&self, name: &str) -> Option<ParamKind> {
        match &self.schema {
            Some(_) => self.declared(name).map(Parameter::kind),
            None => Some(ParamKind::Any),
        }
    }
    fn get_parameter(&self, name: &str) -> Option<Obj> {
        match self.parameter(name) {
            Some(value) => Some(value.obj().clone()),
            None => self.declared(name).and_then(|p| p.default.clone()),
        }
    }
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let kind = self.parameter_kind(name).ok_or_else(|| {
            ArkError::Construction(format!("{} has no parameter '{}'", self.generic_name, name))
        })?;
        let accepted = match (kind, value.resolved()) {
            (ParamKind::Value, Resolved::Literal(obj)) => obj.as_plain().is_some(),
            (ParamKind::Array, Resolved::Literal(obj)) => matches!(obj, Obj::Array(_)),
            (ParamKind::Entry(namespace), Resolved::Entry(handle)) => handle.namespace() == namespace,
            (ParamKind::AnyFn, Resolved::Entry(handle)) => handle.namespace().is_function(),
            (ParamKind::Any, _) => true,
            _ => false,
        };
        if !accepted {
            return Err(ArkError::Construction(format!(
                "{} rejects {} as its '{}' parameter",
                self.generic_name,
                value.obj(),
                name
            )));
        }
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((name.to_string(), value)),
        }
        Ok(())
    }
    fn internal(&self) -> Option<AssignmentList> {
        self.internal.clone()
    }
    fn set_internal(&mut self, internal: &AssignmentList) -> Result<()> {
        self.internal = Some(internal.clone());
        Ok(())
    }
    fn make_binary(&self, label_indicator: &str, context: &Context) -> Result<Box<dyn Component>> {
        let mut binary = self.clone();
        binary.label_indicator = Some(label_indicator.to_string());
        // entries this component refers to are re-pointed at the binary context
        for (_, value) in binary.values.iter_mut() {
            let counterpart = value
                .handle()
                .and_then(|handle| context.get(handle.namespace(), handle.name()));
            if let Some(handle) = counterpart {
                value.resolved = Resolved::Entry(handle);
            }
        }
        Ok(Box::new(binary))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ------------- FnCache -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    None,
    /// one cached result per caller-supplied id
    PerCallId,
    /// a single cached result regardless of id
    Singleton,
}

/// A result cache owned by a function instance.
#[derive(Debug, Default)]
pub struct FnCache<V> {
    mode: CacheMode,
    entries: Mutex<HashMap<String, V, OtherHasher>>,
}

impl<V: Clone> FnCache<V> {
    pub fn new(mode: CacheMode) -> Self {
        Self {
            mode,
            entries: Mutex::new(HashMap::default()),
        }
    }
    pub fn mode(&self) -> CacheMode {
        self.mode
    }
    pub fn get_or_compute<F: FnOnce() -> V>(&self, id: &str, compute: F) -> V {
        let key = match self.mode {
            CacheMode::None => return compute(),
            CacheMode::PerCallId => id,
            CacheMode::Singleton => "",
        };
        if let Some(cached) = self.lock().get(key) {
            return cached.clone();
        }
        let computed = compute();
        self.lock()
            .entry(key.to_string())
            .or_insert(computed)
            .clone()
    }
    pub fn clear(&self) {
        self.lock().clear();
    }
    pub fn len(&self) -> usize {
        self.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, V, OtherHasher>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
