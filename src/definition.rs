#![allow(clippy::module_name_repetitions)]
//! Declarative instrument definitions in TOML.
//!
//! One file per instrument model. Parsing converts every declared type into
//! a validated codec, so a definition that loads is a definition whose
//! static parameters are sound. Placeholders are only expanded at
//! [`instantiate`](InstrumentDefinition::instantiate) time, when parameter
//! values are known.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::command::{ActionSpec, CommandSpec, Payload, WireSpec};
use crate::command_config::CommandConfig;
use crate::composite::{Composite, Width};
use crate::error::InstrumentError;
use crate::instrument::{ChildSpec, Instrument};
use crate::mapping::Mapping;
use crate::register::{Radix, Register};
use crate::toml_helpers::parse_error;
use crate::transport::{Connection, LoopbackTransport};
use crate::types::TypeCodec;
use crate::value::Value;

// ---- raw TOML shape ----

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionToml {
    instrument: HeaderToml,
    #[serde(default)]
    parameters: BTreeMap<String, ScalarToml>,
    #[serde(default)]
    config: CommandConfig,
    #[serde(default, rename = "command")]
    commands: Vec<CommandToml>,
    #[serde(default, rename = "child")]
    children: Vec<ChildToml>,
    #[serde(default, rename = "action")]
    actions: Vec<ActionToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeaderToml {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandToml {
    name: String,
    query: Option<String>,
    write: Option<String>,
    #[serde(rename = "type")]
    ty: Option<PayloadToml>,
    query_type: Option<PayloadToml>,
    write_type: Option<PayloadToml>,
    #[serde(default)]
    config: CommandConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChildToml {
    name: String,
    indices: IndicesToml,
    #[serde(default)]
    config: CommandConfig,
    #[serde(default, rename = "command")]
    commands: Vec<CommandToml>,
    #[serde(default, rename = "action")]
    actions: Vec<ActionToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActionToml {
    name: String,
    template: String,
    #[serde(rename = "type")]
    ty: Option<TypeToml>,
    #[serde(default)]
    config: CommandConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndicesToml {
    List(Vec<i64>),
    Range { start: i64, end: i64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScalarToml {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarToml {
    fn into_value(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Integer(i) => Value::Integer(i),
            Self::Float(f) => Value::Float(f),
            Self::Text(s) => Value::Text(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PayloadToml {
    Multi(Vec<TypeToml>),
    Single(TypeToml),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TypeToml {
    Name(String),
    Table(TypeTable),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TypeTable {
    Float(FloatToml),
    Integer(IntegerToml),
    Boolean(BooleanToml),
    String(StringToml),
    Set(Vec<String>),
    Enum(EnumToml),
    Mapping(Vec<MappingEntryToml>),
    Register(RegisterToml),
    Composite(Vec<FieldToml>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FloatToml {
    min: Option<f64>,
    max: Option<f64>,
    precision: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct IntegerToml {
    min: Option<i64>,
    max: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct BooleanToml {
    on: String,
    off: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StringToml {
    max_len: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumToml {
    labels: Vec<String>,
    #[serde(default)]
    start: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingEntryToml {
    value: ScalarToml,
    token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterToml {
    width: usize,
    #[serde(default)]
    radix: Radix,
    #[serde(default)]
    bits: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldToml {
    width: WidthToml,
    #[serde(rename = "type")]
    ty: TypeToml,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WidthToml {
    Fixed(usize),
    Named(String),
}

// ---- conversion into codecs ----

fn type_codec(raw: &TypeToml) -> Result<TypeCodec, InstrumentError> {
    match raw {
        TypeToml::Name(name) => match name.as_str() {
            "float" => Ok(TypeCodec::float()),
            "integer" => Ok(TypeCodec::integer()),
            "boolean" => Ok(TypeCodec::boolean()),
            "string" => Ok(TypeCodec::text()),
            other => Err(InstrumentError::configuration(format!(
                "unknown type name '{other}'"
            ))),
        },
        TypeToml::Table(table) => table_codec(table),
    }
}

fn table_codec(table: &TypeTable) -> Result<TypeCodec, InstrumentError> {
    let codec = match table {
        TypeTable::Float(f) => TypeCodec::Float {
            min: f.min,
            max: f.max,
            precision: f.precision,
        },
        TypeTable::Integer(i) => TypeCodec::Integer {
            min: i.min,
            max: i.max,
        },
        TypeTable::Boolean(b) => TypeCodec::Boolean {
            on: b.on.clone(),
            off: b.off.clone(),
        },
        TypeTable::String(s) => TypeCodec::Text { max_len: s.max_len },
        TypeTable::Set(tokens) => TypeCodec::Set(tokens.clone()),
        TypeTable::Enum(e) => TypeCodec::Enum {
            labels: e.labels.clone(),
            start: e.start,
        },
        TypeTable::Mapping(entries) => Mapping::new(
            entries
                .iter()
                .map(|e| (e.value.clone().into_value(), e.token.clone())),
        )?
        .into(),
        TypeTable::Register(r) => {
            let bits = r
                .bits
                .iter()
                .map(|(k, label)| {
                    k.parse::<u32>()
                        .map(|bit| (bit, label.clone()))
                        .map_err(|_| {
                            InstrumentError::configuration(format!(
                                "register bit key '{k}' is not a bit position"
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Register::new(r.width, r.radix, bits)?.into()
        }
        TypeTable::Composite(fields) => {
            let fields = fields
                .iter()
                .map(|f| {
                    let width = match &f.width {
                        WidthToml::Fixed(n) => Width::Fixed(*n),
                        WidthToml::Named(s) if s == "rest" => Width::Rest,
                        WidthToml::Named(s) => {
                            return Err(InstrumentError::configuration(format!(
                                "composite width '{s}' must be a number or \"rest\""
                            )))
                        }
                    };
                    Ok((width, type_codec(&f.ty)?))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Composite::new(fields)?.into()
        }
    };
    codec.validate()?;
    Ok(codec)
}

fn payload(raw: &PayloadToml) -> Result<Payload, InstrumentError> {
    match raw {
        PayloadToml::Single(t) => Ok(Payload::Single(type_codec(t)?)),
        PayloadToml::Multi(ts) => Ok(Payload::Multi(
            ts.iter().map(type_codec).collect::<Result<Vec<_>, _>>()?,
        )),
    }
}

fn command_spec(raw: &CommandToml) -> Result<CommandSpec, InstrumentError> {
    let ctx = |e: InstrumentError| match e {
        InstrumentError::Configuration(m) => {
            InstrumentError::Configuration(format!("command '{}': {m}", raw.name))
        }
        other => other,
    };
    let direction = |template: &Option<String>,
                     specific: &Option<PayloadToml>,
                     which: &str|
     -> Result<Option<WireSpec>, InstrumentError> {
        match (template, specific.as_ref().or(raw.ty.as_ref())) {
            (Some(t), Some(p)) => Ok(Some(WireSpec::new(t.clone(), payload(p)?))),
            (Some(_), None) => Err(InstrumentError::configuration(format!(
                "{which} template has no type"
            ))),
            (None, _) if specific.is_some() => Err(InstrumentError::configuration(format!(
                "{which}_type given without a {which} template"
            ))),
            (None, _) => Ok(None),
        }
    };
    let query = direction(&raw.query, &raw.query_type, "query").map_err(ctx)?;
    let write = direction(&raw.write, &raw.write_type, "write").map_err(ctx)?;
    Ok(CommandSpec::new(query, write)
        .map_err(ctx)?
        .with_config(raw.config.clone()))
}

fn action_spec(raw: &ActionToml) -> Result<ActionSpec, InstrumentError> {
    let mut spec = ActionSpec::new(raw.template.clone()).with_config(raw.config.clone());
    if let Some(t) = &raw.ty {
        spec = spec.with_argument(type_codec(t).map_err(|e| match e {
            InstrumentError::Configuration(m) => {
                InstrumentError::Configuration(format!("action '{}': {m}", raw.name))
            }
            other => other,
        })?);
    }
    Ok(spec)
}

fn child_spec(raw: &ChildToml) -> Result<ChildSpec, InstrumentError> {
    let indices: Vec<i64> = match &raw.indices {
        IndicesToml::List(v) => v.clone(),
        IndicesToml::Range { start, end } => (*start..=*end).collect(),
    };
    let mut spec = ChildSpec::new(indices)
        .map_err(|e| InstrumentError::configuration(format!("child '{}': {e}", raw.name)))?
        .with_config(raw.config.clone());
    for c in &raw.commands {
        spec = spec.with_command(c.name.clone(), command_spec(c)?);
    }
    for a in &raw.actions {
        spec = spec.with_action(a.name.clone(), action_spec(a)?);
    }
    Ok(spec)
}

/// A parsed and validated instrument model.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentDefinition {
    name: String,
    description: String,
    parameters: BTreeMap<String, String>,
    config: CommandConfig,
    commands: Vec<(String, CommandSpec)>,
    children: Vec<(String, ChildSpec)>,
    actions: Vec<(String, ActionSpec)>,
}

impl InstrumentDefinition {
    /// Parse a TOML string. The `FromStr` impl delegates here.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InstrumentError> {
        let raw: DefinitionToml = toml::from_str(s).map_err(|e| parse_error("definition", &e))?;
        Self::from_raw(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, InstrumentError> {
        let s = fs::read_to_string(path)?;
        log::debug!("loading instrument definition from {}", path.display());
        Self::from_str(&s).map_err(|e| match e {
            InstrumentError::Configuration(m) => {
                InstrumentError::Configuration(format!("{}: {m}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and fully instantiate with default parameters on a throwaway
    /// loopback, which surfaces placeholder errors without any I/O.
    pub fn validate_str(s: &str) -> Result<(), InstrumentError> {
        let def = Self::from_str(s)?;
        def.instantiate(Connection::new(LoopbackTransport::new()), &HashMap::new())?;
        Ok(())
    }

    fn from_raw(raw: DefinitionToml) -> Result<Self, InstrumentError> {
        let parameters = raw
            .parameters
            .into_iter()
            .map(|(k, v)| {
                let s = match v {
                    ScalarToml::Text(s) => s,
                    other => other.into_value().to_string(),
                };
                (k, s)
            })
            .collect();
        let commands = raw
            .commands
            .iter()
            .map(|c| Ok((c.name.clone(), command_spec(c)?)))
            .collect::<Result<Vec<_>, InstrumentError>>()?;
        let children = raw
            .children
            .iter()
            .map(|c| Ok((c.name.clone(), child_spec(c)?)))
            .collect::<Result<Vec<_>, InstrumentError>>()?;
        let actions = raw
            .actions
            .iter()
            .map(|a| Ok((a.name.clone(), action_spec(a)?)))
            .collect::<Result<Vec<_>, InstrumentError>>()?;
        Ok(Self {
            name: raw.instrument.name,
            description: raw.instrument.description,
            parameters,
            config: raw.config,
            commands,
            children,
            actions,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared parameters with their default values.
    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Build an instrument on `connection`. `params` override declared
    /// defaults; naming an undeclared parameter is a configuration error.
    pub fn instantiate(
        &self,
        connection: Connection,
        params: &HashMap<String, String>,
    ) -> Result<Instrument, InstrumentError> {
        if let Some(unknown) = params.keys().find(|k| !self.parameters.contains_key(*k)) {
            return Err(InstrumentError::configuration(format!(
                "{}: undeclared parameter '{unknown}'",
                self.name
            )));
        }
        let mut builder = Instrument::builder(self.name.clone(), connection).config(self.config.clone());
        for (k, default) in &self.parameters {
            let v = params.get(k).unwrap_or(default);
            builder = builder.parameter(k.clone(), v.clone());
        }
        for (name, spec) in &self.commands {
            builder = builder.command(name.clone(), spec.clone());
        }
        for (name, spec) in &self.children {
            builder = builder.child(name.clone(), spec.clone());
        }
        for (name, spec) in &self.actions {
            builder = builder.action(name.clone(), spec.clone());
        }
        builder.build()
    }
}

impl std::str::FromStr for InstrumentDefinition {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Instrument {
    /// Build an instrument from a parsed definition.
    pub fn from_definition(
        definition: &InstrumentDefinition,
        connection: Connection,
        params: &HashMap<String, String>,
    ) -> Result<Self, InstrumentError> {
        definition.instantiate(connection, params)
    }
}
