//! The `arkconf` command line tool.
//!
//! Loads a context file and prints it back in canonical form, or applies a
//! rule set to one of its features and prints what the rules derive.
//!
//! ```text
//! arkconf demos/sentence_features.ctx
//! arkconf demos/sentence_features.ctx --rules rules --source fsent1 --bind FEATURE_STR=some --json
//! ```
//!
//! Settings come from `arkconf.toml` (or the file named by `--settings` or
//! `ARKCONF_SETTINGS`), then `ARKCONF_*` environment variables, then the
//! command line.

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use config::{Config, Environment, File as SettingsFile};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use arkconf::component::Factories;
use arkconf::context::{Context, Namespace};
use arkconf::error::{ArkError, Result, TracingSink};
use arkconf::matcher::{Binding, Storage};
use arkconf::obj::Obj;

const DEFAULT_SETTINGS: &str = "arkconf.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Format {
    #[default]
    Text,
    Json,
}

/// Generic names the permissive function factories accept, per family.
#[derive(Debug, Default, Deserialize)]
struct Families {
    #[serde(default)]
    ts_fn: Vec<String>,
    #[serde(default)]
    str_fn: Vec<String>,
    #[serde(default)]
    ts_str_fn: Vec<String>,
}

impl Families {
    fn factories(&self) -> Factories {
        let mut factories = Factories::new();
        for (family, names) in [
            (Namespace::TokenSpanFn, &self.ts_fn),
            (Namespace::StrFn, &self.str_fn),
            (Namespace::TokenSpanStrFn, &self.ts_str_fn),
        ] {
            for name in names {
                factories.register_generic(family, name);
            }
        }
        [
            Namespace::Model,
            Namespace::Feature,
            Namespace::GridSearch,
            Namespace::Evaluation,
        ]
        .into_iter()
        .fold(factories, Factories::with_fallback)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
struct Settings {
    context: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    rule_set: Option<String>,
    source: Option<String>,
    #[serde(default)]
    bindings: Vec<String>,
    #[serde(default)]
    format: Format,
    #[serde(default)]
    families: Families,
}

/// Load a context and print it, or apply one of its rule sets to a source.
#[derive(Debug, Parser)]
#[command(name = "arkconf", version, about, long_about = None)]
struct Arguments {
    /// Context file to load (overrides `context` in the settings)
    context: Option<String>,

    /// Settings file
    #[arg(long, env = "ARKCONF_SETTINGS", default_value = DEFAULT_SETTINGS)]
    settings: String,

    /// Rule set to apply, by name
    #[arg(long = "rules", value_name = "RULE_SET", requires = "source")]
    rule_set: Option<String>,

    /// Entry the rules are applied to, by name
    #[arg(long, requires = "rule_set")]
    source: Option<String>,

    /// Extra binding for the rules, as NAME=VALUE (repeatable)
    #[arg(long = "bind", value_name = "NAME=VALUE")]
    bindings: Vec<String>,

    /// Print JSON instead of statements
    #[arg(long)]
    json: bool,
}

fn load_settings(arguments: &Arguments) -> Result<Settings> {
    let mut builder = Config::builder()
        .add_source(SettingsFile::with_name(&arguments.settings).required(false))
        .add_source(
            Environment::with_prefix("ARKCONF")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("bindings"),
        )
        .set_override_option("context", arguments.context.clone())?
        .set_override_option("rule_set", arguments.rule_set.clone())?
        .set_override_option("source", arguments.source.clone())?;
    if !arguments.bindings.is_empty() {
        builder = builder.set_override("bindings", arguments.bindings.clone())?;
    }
    if arguments.json {
        builder = builder.set_override("format", "json")?;
    }
    Ok(builder.build()?.try_deserialize()?)
}

fn extra_bindings(bindings: &[String]) -> Result<Binding> {
    bindings
        .iter()
        .map(|binding| match binding.split_once('=') {
            Some((name, value)) => Ok((name.trim(), Obj::plain(value.trim()))),
            None => Err(ArkError::Config(format!(
                "binding '{}' is not of the form NAME=VALUE",
                binding
            ))),
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct Declaration {
    #[serde(rename = "type")]
    type_tag: String,
    name: String,
    value: String,
}

fn print_context(context: &Context, format: Format) -> Result<()> {
    match format {
        Format::Text => print!("{}", context),
        Format::Json => {
            let declarations: Vec<Declaration> = context
                .declaration_order()
                .into_iter()
                .filter_map(|(namespace, name)| {
                    context.get(namespace, &name).map(|handle| Declaration {
                        type_tag: namespace.type_tag().to_string(),
                        value: handle.to_obj().to_string(),
                        name,
                    })
                })
                .collect();
            println!("{}", to_json(&declarations)?);
        }
    }
    Ok(())
}

fn apply_rule_set(context: &Context, settings: &Settings, rule_set: &str, source: &str) -> Result<()> {
    let rules = context
        .rule_set(rule_set)
        .ok_or_else(|| ArkError::Unresolved(rule_set.to_string()))?;
    let source_obj = context
        .resolve(source)
        .ok_or_else(|| ArkError::Unresolved(source.to_string()))?;
    let extra = extra_bindings(&settings.bindings)?;
    debug!(rule_set, source, bindings = extra.len(), "applying rules");
    let derived = rules.apply_rules(context, &source_obj, &extra);
    info!(derived = derived.len(), "rules applied");
    match settings.format {
        Format::Text => {
            for (name, obj) in &derived {
                println!("{}={};", name, obj);
            }
        }
        Format::Json => {
            let derived: Vec<(String, String)> = derived
                .into_iter()
                .map(|(name, obj)| (name, obj.to_string()))
                .collect();
            println!("{}", to_json(&derived)?);
        }
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| ArkError::Io(e.to_string()))
}

fn run() -> Result<()> {
    let arguments = Arguments::parse();
    let settings = load_settings(&arguments)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = settings
        .context
        .as_deref()
        .ok_or_else(|| ArkError::Config("no context file given".to_string()))?;
    let file = File::open(path)?;
    let context = Context::from_reader(BufReader::new(file), settings.families.factories(), Arc::new(TracingSink))?;
    info!(path, declarations = context.len(), "context loaded");

    match (settings.rule_set.as_deref(), settings.source.as_deref()) {
        (Some(rule_set), Some(source)) => apply_rule_set(&context, &settings, rule_set, source),
        (None, None) => print_context(&context, settings.format),
        _ => Err(ArkError::Config(
            "a rule set and a source are given together or not at all".to_string(),
        )),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
