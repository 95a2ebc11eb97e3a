//! Per-command formatting rules: addressing and header/separator framing.
//!
//! A [`CommandConfig`] is a set of optional overrides. Layers are merged
//! field by field (later layer wins) and then resolved once into a
//! [`ResolvedConfig`] where every field has a concrete value.

use std::collections::HashMap;

use serde::Deserialize;
use strfmt::strfmt;

use crate::error::InstrumentError;

pub const DEFAULT_DATA_SEPARATOR: &str = ",";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    /// Multi-drop address token prepended to every query and write.
    pub address: Option<String>,
    pub program_header_prefix: Option<String>,
    /// Terminates both query and write strings.
    pub program_header_separator: Option<String>,
    /// Joins the encoded values of a multi-value write.
    pub program_data_separator: Option<String>,
    pub response_header_prefix: Option<String>,
    pub response_header: Option<String>,
    pub response_header_separator: Option<String>,
    pub response_data_separator: Option<String>,
}

macro_rules! builder {
    ($($method:ident => $field:ident),* $(,)?) => {
        $(
            #[must_use]
            pub fn $method(mut self, v: impl Into<String>) -> Self {
                self.$field = Some(v.into());
                self
            }
        )*
    };
}

impl CommandConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    builder! {
        with_address => address,
        with_program_header_prefix => program_header_prefix,
        with_program_header_separator => program_header_separator,
        with_program_data_separator => program_data_separator,
        with_response_header_prefix => response_header_prefix,
        with_response_header => response_header,
        with_response_header_separator => response_header_separator,
        with_response_data_separator => response_data_separator,
    }

    /// Overlay `overrides` on top of `self`: every field set in `overrides`
    /// replaces the one here, unset fields inherit.
    #[must_use]
    pub fn merged(&self, overrides: &Self) -> Self {
        fn pick(base: &Option<String>, over: &Option<String>) -> Option<String> {
            over.clone().or_else(|| base.clone())
        }
        Self {
            address: pick(&self.address, &overrides.address),
            program_header_prefix: pick(&self.program_header_prefix, &overrides.program_header_prefix),
            program_header_separator: pick(
                &self.program_header_separator,
                &overrides.program_header_separator,
            ),
            program_data_separator: pick(
                &self.program_data_separator,
                &overrides.program_data_separator,
            ),
            response_header_prefix: pick(
                &self.response_header_prefix,
                &overrides.response_header_prefix,
            ),
            response_header: pick(&self.response_header, &overrides.response_header),
            response_header_separator: pick(
                &self.response_header_separator,
                &overrides.response_header_separator,
            ),
            response_data_separator: pick(
                &self.response_data_separator,
                &overrides.response_data_separator,
            ),
        }
    }

    /// Substitute `{name}` placeholders in every set field.
    pub fn substitute(&self, vars: &HashMap<String, String>) -> Result<Self, InstrumentError> {
        let sub = |f: &Option<String>| -> Result<Option<String>, InstrumentError> {
            f.as_deref().map(|s| substitute(s, vars)).transpose()
        };
        Ok(Self {
            address: sub(&self.address)?,
            program_header_prefix: sub(&self.program_header_prefix)?,
            program_header_separator: sub(&self.program_header_separator)?,
            program_data_separator: sub(&self.program_data_separator)?,
            response_header_prefix: sub(&self.response_header_prefix)?,
            response_header: sub(&self.response_header)?,
            response_header_separator: sub(&self.response_header_separator)?,
            response_data_separator: sub(&self.response_data_separator)?,
        })
    }

    /// Fill unset fields with their defaults: empty string, except the two
    /// data separators which default to `,`.
    #[must_use]
    pub fn resolve(&self) -> ResolvedConfig {
        let or_empty = |f: &Option<String>| f.clone().unwrap_or_default();
        let or_comma = |f: &Option<String>| {
            f.clone()
                .unwrap_or_else(|| DEFAULT_DATA_SEPARATOR.to_string())
        };
        ResolvedConfig {
            address: or_empty(&self.address),
            program_header_prefix: or_empty(&self.program_header_prefix),
            program_header_separator: or_empty(&self.program_header_separator),
            program_data_separator: or_comma(&self.program_data_separator),
            response_header_prefix: or_empty(&self.response_header_prefix),
            response_header: or_empty(&self.response_header),
            response_header_separator: or_empty(&self.response_header_separator),
            response_data_separator: or_comma(&self.response_data_separator),
        }
    }
}

/// Fully resolved framing of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub address: String,
    pub program_header_prefix: String,
    pub program_header_separator: String,
    pub program_data_separator: String,
    pub response_header_prefix: String,
    pub response_header: String,
    pub response_header_separator: String,
    pub response_data_separator: String,
}

impl ResolvedConfig {
    #[must_use]
    pub fn query_string(&self, template: &str) -> String {
        format!(
            "{}{}{}{}",
            self.address, self.program_header_prefix, template, self.program_header_separator
        )
    }

    #[must_use]
    pub fn write_string(&self, template: &str, token: &str) -> String {
        format!(
            "{}{}{}{}{}",
            self.address, self.program_header_prefix, template, token, self.program_header_separator
        )
    }

    /// Expected reply header: prefix, header and separator concatenated.
    #[must_use]
    pub fn reply_header(&self) -> String {
        format!(
            "{}{}{}",
            self.response_header_prefix, self.response_header, self.response_header_separator
        )
    }

    /// Strip line termination and the configured header framing from `reply`.
    pub fn strip_reply<'a>(&self, reply: &'a str) -> Result<&'a str, InstrumentError> {
        let line = reply.trim_end_matches(['\r', '\n']);
        let header = self.reply_header();
        line.strip_prefix(header.as_str()).ok_or_else(|| {
            InstrumentError::Protocol(format!(
                "reply {line:?} does not start with expected header {header:?}"
            ))
        })
    }

    /// Split a multi-value payload into exactly `count` tokens.
    pub fn split_payload<'a>(
        &self,
        payload: &'a str,
        count: usize,
    ) -> Result<Vec<&'a str>, InstrumentError> {
        let parts: Vec<&str> = payload.split(self.response_data_separator.as_str()).collect();
        if parts.len() != count {
            return Err(InstrumentError::decode(format!(
                "expected {count} values separated by {:?}, got {} in {payload:?}",
                self.response_data_separator,
                parts.len()
            )));
        }
        Ok(parts)
    }
}

/// Substitute `{name}` placeholders; an unknown name is a configuration
/// error.
pub fn substitute(template: &str, vars: &HashMap<String, String>) -> Result<String, InstrumentError> {
    if !template.contains('{') && !template.contains('}') {
        return Ok(template.to_string());
    }
    strfmt(template, vars).map_err(|e| {
        InstrumentError::configuration(format!("cannot expand placeholders in {template:?}: {e}"))
    })
}
