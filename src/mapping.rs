use std::collections::HashSet;

use crate::error::InstrumentError;
use crate::value::Value;

/// Bidirectional value <-> token table.
///
/// The table is authored in the queried direction (one entry per wire token)
/// and checked once at construction to be a bijection: no token and no value
/// may appear twice. Decoding an unmapped token fails instead of falling
/// back to a default.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    entries: Vec<(Value, String)>,
}

impl Mapping {
    pub fn new<I, V, T>(entries: I) -> Result<Self, InstrumentError>
    where
        I: IntoIterator<Item = (V, T)>,
        V: Into<Value>,
        T: Into<String>,
    {
        let entries: Vec<(Value, String)> = entries
            .into_iter()
            .map(|(v, t)| (v.into(), t.into()))
            .collect();
        if entries.is_empty() {
            return Err(InstrumentError::configuration("mapping table is empty"));
        }
        let mut tokens = HashSet::new();
        for (i, (value, token)) in entries.iter().enumerate() {
            if token.is_empty() {
                return Err(InstrumentError::configuration(format!(
                    "mapping value {value} has an empty token"
                )));
            }
            if !tokens.insert(token.as_str()) {
                return Err(InstrumentError::configuration(format!(
                    "mapping token '{token}' is declared twice"
                )));
            }
            if entries[..i].iter().any(|(v, _)| v == value) {
                return Err(InstrumentError::configuration(format!(
                    "mapping value {value} is declared twice"
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn encode(&self, value: &Value) -> Result<String, InstrumentError> {
        self.entries
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| InstrumentError::validation(format!("value {value} is not mapped")))
    }

    pub fn decode(&self, token: &str) -> Result<Value, InstrumentError> {
        let t = token.trim();
        self.entries
            .iter()
            .find(|(_, tok)| tok == t)
            .map(|(v, _)| v.clone())
            .ok_or_else(|| InstrumentError::decode(format!("unmapped token '{token}'")))
    }

    #[must_use]
    pub fn entries(&self) -> &[(Value, String)] {
        &self.entries
    }

    pub(crate) fn fixed_width(&self) -> Option<usize> {
        let first = self.entries.first()?.1.len();
        self.entries
            .iter()
            .all(|(_, t)| t.len() == first)
            .then_some(first)
    }
}
