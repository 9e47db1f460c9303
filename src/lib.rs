//! Arkconf – a declarative configuration language and object-resolution engine.
//!
//! Experiments are described as a short text of typed declarations:
//!
//! ```text
//! ts_fn head=Head();
//! ts_str_fn headDoc=(${str} o ${head} o ${doc});
//! feature fsent=TokenSpanFnDataVocab(scale=NORMALIZED_TFIDF, fn=(${filter} o ${str} o ${sent}));
//! ```
//!
//! and are assembled into a graph of named, live components without
//! recompiling the programs that consume them.
//!
//! ## Modules
//! * [`lexer`] and [`parser`] – text to [`obj::Obj`] terms.
//! * [`obj`] – the term model: values, arrays, assignment lists, functions and rules.
//! * [`serialize`] – terms back to canonical text; parsing the output gives the same term.
//! * [`matcher`] – structural matching producing a [`matcher::Binding`].
//! * [`component`] – the parameter protocol and the factory registry through
//!   which the components themselves are plugged in.
//! * [`context`] – the [`context::Context`], ten namespaces of kept entries with
//!   get-or-construct deduplication and declaration order.
//! * [`rules`] – rule sets that derive new terms from existing ones.
//!
//! ## Keepers
//! A Context keeps its entries the way a keeper does: every definition is
//! owned once and shared through an `Arc`, and asking for a definition that
//! matches an existing entry hands back that entry instead of a new one.
//!
//! ## Quick Start
//! ```
//! use arkconf::component::Factories;
//! use arkconf::context::{Context, Namespace};
//!
//! let mut factories = Factories::new();
//! factories.register_generic(Namespace::TokenSpanFn, "Head");
//! let context = Context::new(factories);
//! context.deserialize(r#"ts_fn head=Head(); value n="2";"#).unwrap();
//! assert_eq!(context.len(), 2);
//! assert_eq!(context.to_string(), "ts_fn head=Head();\nvalue n=\"2\";\n");
//! ```

pub mod component;
pub mod context;
pub mod error;
pub mod lexer;
pub mod matcher;
pub mod obj;
pub mod parser;
pub mod rules;
pub mod serialize;

pub use error::{ArkError, Result};
