#![allow(clippy::module_name_repetitions)]
//! Commands: one instrument property bound to its wire templates, codecs and
//! resolved framing.
//!
//! A [`CommandSpec`] is the immutable declaration; binding it to a
//! connection and a configuration layer yields a [`Command`] that performs
//! exactly one transport round trip per `read` and one send per `write`.

use std::collections::HashMap;

use crate::command_config::{substitute, CommandConfig, ResolvedConfig};
use crate::config::config as global_config;
use crate::error::InstrumentError;
use crate::transport::Connection;
use crate::types::{kind_mismatch, TypeCodec};
use crate::value::Value;

/// Codec(s) applied to one direction of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(TypeCodec),
    /// Several independent values separated by the data separator
    /// (e.g. value and unit).
    Multi(Vec<TypeCodec>),
}

impl Payload {
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(codecs) => codecs.len(),
        }
    }

    fn encode(&self, value: &Value, separator: &str) -> Result<String, InstrumentError> {
        match self {
            Self::Single(codec) => codec.encode(value),
            Self::Multi(codecs) => {
                let items = value
                    .as_tuple()
                    .ok_or_else(|| kind_mismatch("tuple", value))?;
                if items.len() != codecs.len() {
                    return Err(InstrumentError::validation(format!(
                        "expected {} values, got {}",
                        codecs.len(),
                        items.len()
                    )));
                }
                let tokens = codecs
                    .iter()
                    .zip(items)
                    .map(|(c, v)| c.encode(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tokens.join(separator))
            }
        }
    }

    fn decode(&self, payload: &str, config: &ResolvedConfig) -> Result<Value, InstrumentError> {
        match self {
            Self::Single(codec) => codec.decode(payload),
            Self::Multi(codecs) => {
                let parts = config.split_payload(payload, codecs.len())?;
                codecs
                    .iter()
                    .zip(parts)
                    .map(|(c, p)| c.decode(p))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Tuple)
            }
        }
    }
}

impl From<TypeCodec> for Payload {
    fn from(codec: TypeCodec) -> Self {
        Self::Single(codec)
    }
}

impl From<Vec<TypeCodec>> for Payload {
    fn from(codecs: Vec<TypeCodec>) -> Self {
        Self::Multi(codecs)
    }
}

/// Template plus payload codec for one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct WireSpec {
    pub template: String,
    pub payload: Payload,
}

impl WireSpec {
    pub fn new(template: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            template: template.into(),
            payload: payload.into(),
        }
    }
}

/// Immutable declaration of one property.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    query: Option<WireSpec>,
    write: Option<WireSpec>,
    config: CommandConfig,
}

impl CommandSpec {
    /// At least one direction must be present.
    pub fn new(query: Option<WireSpec>, write: Option<WireSpec>) -> Result<Self, InstrumentError> {
        if query.is_none() && write.is_none() {
            return Err(InstrumentError::configuration(
                "command declares neither a query nor a write template",
            ));
        }
        check_arity("query", query.as_ref())?;
        check_arity("write", write.as_ref())?;
        Ok(Self {
            query,
            write,
            config: CommandConfig::default(),
        })
    }

    pub fn read_only(template: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            query: Some(WireSpec::new(template, payload)),
            write: None,
            config: CommandConfig::default(),
        }
    }

    pub fn write_only(template: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            query: None,
            write: Some(WireSpec::new(template, payload)),
            config: CommandConfig::default(),
        }
    }

    /// Read/write command sharing one codec in both directions.
    pub fn read_write(
        query_template: impl Into<String>,
        write_template: impl Into<String>,
        codec: TypeCodec,
    ) -> Self {
        Self {
            query: Some(WireSpec::new(query_template, codec.clone())),
            write: Some(WireSpec::new(write_template, codec)),
            config: CommandConfig::default(),
        }
    }

    /// Per-command overrides, applied on top of the instrument's layers.
    #[must_use]
    pub fn with_config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn query(&self) -> Option<&WireSpec> {
        self.query.as_ref()
    }

    #[must_use]
    pub const fn write(&self) -> Option<&WireSpec> {
        self.write.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Resolve framing and placeholders once and attach the connection.
    pub fn bind(
        &self,
        owner: &str,
        name: &str,
        connection: Connection,
        base: &CommandConfig,
        vars: &HashMap<String, String>,
    ) -> Result<Command, InstrumentError> {
        let expand = |spec: &Option<WireSpec>| -> Result<Option<WireSpec>, InstrumentError> {
            spec.as_ref()
                .map(|w| {
                    Ok(WireSpec {
                        template: substitute(&w.template, vars)?,
                        payload: w.payload.clone(),
                    })
                })
                .transpose()
        };
        check_arity("query", self.query.as_ref())
            .and_then(|()| check_arity("write", self.write.as_ref()))
            .map_err(|e| match e {
                InstrumentError::Configuration(m) => {
                    InstrumentError::Configuration(format!("command '{name}': {m}"))
                }
                other => other,
            })?;
        let config = base.merged(&self.config).substitute(vars)?.resolve();
        let query = expand(&self.query)?;
        let write = expand(&self.write)?;
        let multi = query
            .iter()
            .chain(write.iter())
            .any(|w| matches!(w.payload, Payload::Multi(_)));
        if multi
            && (config.response_data_separator.is_empty()
                || config.program_data_separator.is_empty())
        {
            return Err(InstrumentError::configuration(format!(
                "command '{name}' has a multi-value payload but an empty data separator"
            )));
        }
        Ok(Command {
            owner: owner.to_string(),
            name: name.to_string(),
            query,
            write,
            config,
            connection,
        })
    }
}

// A multi-value payload splits a reply into at least two values.
fn check_arity(direction: &str, spec: Option<&WireSpec>) -> Result<(), InstrumentError> {
    match spec.map(|w| &w.payload) {
        Some(Payload::Multi(codecs)) if codecs.len() < 2 => Err(InstrumentError::configuration(
            format!("multi-value {direction} needs at least two codecs, got {}", codecs.len()),
        )),
        _ => Ok(()),
    }
}

/// A bound, ready-to-use command.
#[derive(Debug, Clone)]
pub struct Command {
    owner: String,
    name: String,
    query: Option<WireSpec>,
    write: Option<WireSpec>,
    config: ResolvedConfig,
    connection: Connection,
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.query.is_some()
    }

    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.write.is_some()
    }

    fn query_spec(&self) -> Result<&WireSpec, InstrumentError> {
        self.query
            .as_ref()
            .ok_or_else(|| InstrumentError::NotReadable(self.name.clone()))
    }

    fn write_spec(&self) -> Result<&WireSpec, InstrumentError> {
        self.write
            .as_ref()
            .ok_or_else(|| InstrumentError::NotWritable(self.name.clone()))
    }

    /// The exact string `read` sends.
    pub fn query_string(&self) -> Result<String, InstrumentError> {
        Ok(self.config.query_string(&self.query_spec()?.template))
    }

    /// Encode `value` and build the exact string `write` sends.
    pub fn write_string(&self, value: &Value) -> Result<String, InstrumentError> {
        let spec = self.write_spec()?;
        let token = spec
            .payload
            .encode(value, &self.config.program_data_separator)?;
        Ok(self.config.write_string(&spec.template, &token))
    }

    /// Strip framing from a raw reply and decode the payload.
    pub fn parse_reply(&self, reply: &str) -> Result<Value, InstrumentError> {
        let spec = self.query_spec()?;
        let payload = self.config.strip_reply(reply)?;
        spec.payload.decode(payload, &self.config)
    }

    /// One query, one reply, decoded.
    pub fn read(&self) -> Result<Value, InstrumentError> {
        let message = self.query_string()?;
        tracing::debug!(instrument = %self.owner, command = %self.name, "read");
        let reply = self.connection.query(&message)?;
        self.parse_reply(&reply).map_err(|e| {
            if e.is_reply_error() && global_config().dump_on_error {
                tracing::warn!(
                    instrument = %self.owner,
                    command = %self.name,
                    wire = %reply.escape_debug(),
                    error = %e,
                    "reply rejected"
                );
            }
            e
        })
    }

    /// Fire-and-forget write; no reply is awaited.
    pub fn write(&self, value: &Value) -> Result<(), InstrumentError> {
        let message = self.write_string(value)?;
        tracing::debug!(instrument = %self.owner, command = %self.name, %value, "write");
        self.connection.send(&message)
    }
}

/// Imperative fire-and-forget action, optionally taking one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    template: String,
    argument: Option<TypeCodec>,
    config: CommandConfig,
}

impl ActionSpec {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            argument: None,
            config: CommandConfig::default(),
        }
    }

    #[must_use]
    pub fn with_argument(mut self, codec: TypeCodec) -> Self {
        self.argument = Some(codec);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(
        &self,
        owner: &str,
        name: &str,
        connection: Connection,
        base: &CommandConfig,
        vars: &HashMap<String, String>,
    ) -> Result<Action, InstrumentError> {
        Ok(Action {
            owner: owner.to_string(),
            name: name.to_string(),
            template: substitute(&self.template, vars)?,
            argument: self.argument.clone(),
            config: base.merged(&self.config).substitute(vars)?.resolve(),
            connection,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Action {
    owner: String,
    name: String,
    template: String,
    argument: Option<TypeCodec>,
    config: ResolvedConfig,
    connection: Connection,
}

impl Action {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn takes_argument(&self) -> bool {
        self.argument.is_some()
    }

    /// Build the exact string `run` sends.
    pub fn message(&self, argument: Option<&Value>) -> Result<String, InstrumentError> {
        let token = match (&self.argument, argument) {
            (None, None) => String::new(),
            (Some(codec), Some(v)) => codec.encode(v)?,
            (Some(_), None) => {
                return Err(InstrumentError::validation(format!(
                    "action '{}' requires an argument",
                    self.name
                )))
            }
            (None, Some(_)) => {
                return Err(InstrumentError::validation(format!(
                    "action '{}' takes no argument",
                    self.name
                )))
            }
        };
        Ok(self.config.write_string(&self.template, &token))
    }

    pub fn run(&self, argument: Option<&Value>) -> Result<(), InstrumentError> {
        let message = self.message(argument)?;
        tracing::debug!(instrument = %self.owner, action = %self.name, "action");
        self.connection.send(&message)
    }
}
