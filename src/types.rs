//! Type codecs: converters between a typed [`Value`] and its wire token.
//!
//! Every codec is stateless. `encode` validates the value against the codec's
//! legal domain and fails with [`InstrumentError::Validation`]; `decode`
//! trusts numeric replies (no bounds re-check) but fails with
//! [`InstrumentError::Decode`] on anything it cannot map back.

use crate::composite::Composite;
use crate::error::InstrumentError;
use crate::mapping::Mapping;
use crate::register::Register;
use crate::value::Value;

pub const DEFAULT_ON_TOKEN: &str = "ON";
pub const DEFAULT_OFF_TOKEN: &str = "OFF";

#[derive(Debug, Clone, PartialEq)]
pub enum TypeCodec {
    /// Floating point literal. Either bound may be absent (unbounded).
    /// `precision` fixes the number of decimals written on encode.
    Float {
        min: Option<f64>,
        max: Option<f64>,
        precision: Option<usize>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Boolean with a declared token pair (`ON`/`OFF` by default).
    Boolean { on: String, off: String },
    /// Raw string passed through verbatim.
    Text { max_len: Option<usize> },
    /// Fixed finite set of legal tokens; the value is the token itself.
    Set(Vec<String>),
    /// Ordered labels written as their position plus `start`.
    Enum { labels: Vec<String>, start: i64 },
    Mapping(Mapping),
    Register(Register),
    Composite(Composite),
}

impl TypeCodec {
    #[must_use]
    pub const fn float() -> Self {
        Self::Float {
            min: None,
            max: None,
            precision: None,
        }
    }

    /// Bounded float. Fails when `min > max`.
    pub fn bounded_float(min: Option<f64>, max: Option<f64>) -> Result<Self, InstrumentError> {
        let codec = Self::Float {
            min,
            max,
            precision: None,
        };
        codec.validate()?;
        Ok(codec)
    }

    #[must_use]
    pub const fn integer() -> Self {
        Self::Integer {
            min: None,
            max: None,
        }
    }

    pub fn bounded_integer(min: Option<i64>, max: Option<i64>) -> Result<Self, InstrumentError> {
        let codec = Self::Integer { min, max };
        codec.validate()?;
        Ok(codec)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::Boolean {
            on: DEFAULT_ON_TOKEN.to_string(),
            off: DEFAULT_OFF_TOKEN.to_string(),
        }
    }

    pub fn boolean_tokens(
        on: impl Into<String>,
        off: impl Into<String>,
    ) -> Result<Self, InstrumentError> {
        let codec = Self::Boolean {
            on: on.into(),
            off: off.into(),
        };
        codec.validate()?;
        Ok(codec)
    }

    #[must_use]
    pub const fn text() -> Self {
        Self::Text { max_len: None }
    }

    pub fn choice<I, S>(tokens: I) -> Result<Self, InstrumentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codec = Self::Set(tokens.into_iter().map(Into::into).collect());
        codec.validate()?;
        Ok(codec)
    }

    pub fn enumeration<I, S>(labels: I, start: i64) -> Result<Self, InstrumentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codec = Self::Enum {
            labels: labels.into_iter().map(Into::into).collect(),
            start,
        };
        codec.validate()?;
        Ok(codec)
    }

    /// Check the static invariants of this codec. Mapping, register and
    /// composite codecs are checked by their own constructors.
    pub fn validate(&self) -> Result<(), InstrumentError> {
        match self {
            Self::Float { min, max, .. } => {
                if let (Some(lo), Some(hi)) = (min, max) {
                    if !(lo <= hi) {
                        return Err(InstrumentError::configuration(format!(
                            "float bounds inverted: min {lo} > max {hi}"
                        )));
                    }
                }
            }
            Self::Integer { min, max } => {
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(InstrumentError::configuration(format!(
                            "integer bounds inverted: min {lo} > max {hi}"
                        )));
                    }
                }
            }
            Self::Boolean { on, off } => {
                if on == off {
                    return Err(InstrumentError::configuration(format!(
                        "boolean tokens must differ (both '{on}')"
                    )));
                }
            }
            Self::Set(tokens) => check_labels("choice set", tokens)?,
            Self::Enum { labels, .. } => check_labels("enum", labels)?,
            Self::Text { .. } | Self::Mapping(_) | Self::Register(_) | Self::Composite(_) => {}
        }
        Ok(())
    }

    /// Encode `value` into its wire token.
    pub fn encode(&self, value: &Value) -> Result<String, InstrumentError> {
        match self {
            Self::Float {
                min,
                max,
                precision,
            } => encode_float(value, *min, *max, *precision),
            Self::Integer { min, max } => encode_integer(value, *min, *max),
            Self::Boolean { on, off } => match value {
                Value::Bool(true) => Ok(on.clone()),
                Value::Bool(false) => Ok(off.clone()),
                other => Err(kind_mismatch("bool", other)),
            },
            Self::Text { max_len } => {
                let s = value.as_str().ok_or_else(|| kind_mismatch("text", value))?;
                if let Some(limit) = max_len {
                    let n = s.chars().count();
                    if n > *limit {
                        return Err(InstrumentError::validation(format!(
                            "text of {n} characters exceeds limit of {limit}"
                        )));
                    }
                }
                Ok(s.to_string())
            }
            Self::Set(tokens) => {
                let s = value.as_str().ok_or_else(|| kind_mismatch("text", value))?;
                if tokens.iter().any(|t| t == s) {
                    Ok(s.to_string())
                } else {
                    Err(InstrumentError::validation(format!(
                        "'{s}' is not one of {tokens:?}"
                    )))
                }
            }
            Self::Enum { labels, start } => {
                let s = value.as_str().ok_or_else(|| kind_mismatch("text", value))?;
                let pos = labels.iter().position(|l| l == s).ok_or_else(|| {
                    InstrumentError::validation(format!("'{s}' is not one of {labels:?}"))
                })?;
                i64::try_from(pos)
                    .ok()
                    .and_then(|p| start.checked_add(p))
                    .map(|n| n.to_string())
                    .ok_or_else(|| {
                        InstrumentError::validation(format!(
                            "'{s}' at position {pos} overflows enum start {start}"
                        ))
                    })
            }
            Self::Mapping(m) => m.encode(value),
            Self::Register(r) => r.encode(value),
            Self::Composite(c) => c.encode(value),
        }
    }

    /// Decode a wire token into a typed value.
    pub fn decode(&self, token: &str) -> Result<Value, InstrumentError> {
        match self {
            Self::Float { .. } => token
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| InstrumentError::decode(format!("invalid float '{token}': {e}"))),
            Self::Integer { .. } => token
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| InstrumentError::decode(format!("invalid integer '{token}': {e}"))),
            Self::Boolean { on, off } => {
                let t = token.trim();
                if t == on {
                    Ok(Value::Bool(true))
                } else if t == off {
                    Ok(Value::Bool(false))
                } else {
                    Err(InstrumentError::decode(format!(
                        "unknown boolean token '{token}' (expected '{on}' or '{off}')"
                    )))
                }
            }
            Self::Text { .. } => Ok(Value::Text(token.to_string())),
            Self::Set(tokens) => {
                let t = token.trim();
                if tokens.iter().any(|x| x == t) {
                    Ok(Value::Text(t.to_string()))
                } else {
                    Err(InstrumentError::decode(format!(
                        "token '{token}' is not one of {tokens:?}"
                    )))
                }
            }
            Self::Enum { labels, start } => {
                let n: i64 = token.trim().parse().map_err(|e| {
                    InstrumentError::decode(format!("invalid enum index '{token}': {e}"))
                })?;
                n.checked_sub(*start)
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| labels.get(i))
                    .map(|l| Value::Text(l.clone()))
                    .ok_or_else(|| {
                        InstrumentError::decode(format!("enum index {n} out of range"))
                    })
            }
            Self::Mapping(m) => m.decode(token),
            Self::Register(r) => r.decode(token),
            Self::Composite(c) => c.decode(token),
        }
    }

    /// Width in characters of every token this codec produces, when that
    /// width is fixed.
    #[must_use]
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Boolean { on, off } => uniform_len([on.as_str(), off.as_str()]),
            Self::Set(tokens) => uniform_len(tokens.iter().map(String::as_str)),
            Self::Mapping(m) => m.fixed_width(),
            Self::Register(r) => Some(r.width()),
            Self::Composite(c) => c.fixed_width(),
            Self::Float { .. } | Self::Integer { .. } | Self::Text { .. } | Self::Enum { .. } => {
                None
            }
        }
    }
}

impl From<Mapping> for TypeCodec {
    fn from(m: Mapping) -> Self {
        Self::Mapping(m)
    }
}

impl From<Register> for TypeCodec {
    fn from(r: Register) -> Self {
        Self::Register(r)
    }
}

impl From<Composite> for TypeCodec {
    fn from(c: Composite) -> Self {
        Self::Composite(c)
    }
}

fn encode_float(
    value: &Value,
    min: Option<f64>,
    max: Option<f64>,
    precision: Option<usize>,
) -> Result<String, InstrumentError> {
    let v = match value {
        Value::Float(_) | Value::Integer(_) => value.as_f64().unwrap_or(f64::NAN),
        other => return Err(kind_mismatch("float", other)),
    };
    if !v.is_finite() {
        return Err(InstrumentError::validation(format!(
            "{v} is not a finite number"
        )));
    }
    if let Some(lo) = min {
        if v < lo {
            return Err(InstrumentError::validation(format!(
                "{v} is below minimum {lo}"
            )));
        }
    }
    if let Some(hi) = max {
        if v > hi {
            return Err(InstrumentError::validation(format!(
                "{v} is above maximum {hi}"
            )));
        }
    }
    Ok(match precision {
        Some(p) => format!("{v:.p$}"),
        None => v.to_string(),
    })
}

fn encode_integer(
    value: &Value,
    min: Option<i64>,
    max: Option<i64>,
) -> Result<String, InstrumentError> {
    let v = value
        .as_i64()
        .ok_or_else(|| kind_mismatch("integer", value))?;
    if min.is_some_and(|lo| v < lo) || max.is_some_and(|hi| v > hi) {
        return Err(InstrumentError::validation(format!(
            "{v} is outside {}..={}",
            min.map_or_else(String::new, |x| x.to_string()),
            max.map_or_else(String::new, |x| x.to_string()),
        )));
    }
    Ok(v.to_string())
}

pub(crate) fn kind_mismatch(expected: &str, got: &Value) -> InstrumentError {
    InstrumentError::validation(format!("expected {expected} value, got {}", got.kind()))
}

fn check_labels(what: &str, labels: &[String]) -> Result<(), InstrumentError> {
    if labels.is_empty() {
        return Err(InstrumentError::configuration(format!("{what} is empty")));
    }
    let mut seen = std::collections::HashSet::new();
    for l in labels {
        if !seen.insert(l.as_str()) {
            return Err(InstrumentError::configuration(format!(
                "duplicate {what} entry '{l}'"
            )));
        }
    }
    Ok(())
}

fn uniform_len<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Option<usize> {
    let mut it = tokens.into_iter().map(str::len);
    let first = it.next()?;
    it.all(|n| n == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_float_accepts_bounds_and_rejects_outside() {
        let c = TypeCodec::bounded_float(Some(0.0), Some(10.0)).expect("codec");
        assert_eq!(c.encode(&Value::Float(0.0)).expect("min"), "0");
        assert_eq!(c.encode(&Value::Float(10.0)).expect("max"), "10");
        assert!(matches!(
            c.encode(&Value::Float(10.5)),
            Err(InstrumentError::Validation(_))
        ));
        assert!(matches!(
            c.encode(&Value::Float(-0.1)),
            Err(InstrumentError::Validation(_))
        ));
    }

    #[test]
    fn decode_does_not_recheck_bounds() {
        let c = TypeCodec::bounded_float(Some(0.0), Some(10.0)).expect("codec");
        assert_eq!(c.decode("12.8").expect("decode"), Value::Float(12.8));
    }

    #[test]
    fn float_rejects_non_finite_and_wrong_kind() {
        let c = TypeCodec::float();
        assert!(c.encode(&Value::Float(f64::NAN)).is_err());
        assert!(matches!(
            c.encode(&Value::from("1.0")),
            Err(InstrumentError::Validation(_))
        ));
        assert_eq!(c.encode(&Value::Integer(3)).expect("int widens"), "3");
    }

    #[test]
    fn float_precision_pads_decimals() {
        let c = TypeCodec::Float {
            min: None,
            max: None,
            precision: Some(3),
        };
        assert_eq!(c.encode(&Value::Float(1.5)).expect("encode"), "1.500");
    }

    #[test]
    fn float_decode_handles_sign_and_whitespace() {
        let c = TypeCodec::float();
        assert_eq!(c.decode(" +1.25 ").expect("decode"), Value::Float(1.25));
        assert_eq!(c.decode("-1E-3").expect("decode"), Value::Float(-0.001));
        assert!(matches!(c.decode("abc"), Err(InstrumentError::Decode(_))));
    }

    #[test]
    fn integer_bounds() {
        let c = TypeCodec::bounded_integer(Some(1), Some(3)).expect("codec");
        assert_eq!(c.encode(&Value::Integer(2)).expect("encode"), "2");
        assert!(c.encode(&Value::Integer(4)).is_err());
        assert!(c.encode(&Value::Float(2.0)).is_err());
        assert_eq!(c.decode("7").expect("decode"), Value::Integer(7));
    }

    #[test]
    fn boolean_default_tokens() {
        let c = TypeCodec::boolean();
        assert_eq!(c.encode(&Value::Bool(true)).expect("encode"), "ON");
        assert_eq!(c.decode("OFF").expect("decode"), Value::Bool(false));
        assert!(matches!(c.decode("MAYBE"), Err(InstrumentError::Decode(_))));
    }

    #[test]
    fn boolean_tokens_must_differ() {
        assert!(matches!(
            TypeCodec::boolean_tokens("1", "1"),
            Err(InstrumentError::Configuration(_))
        ));
    }

    #[test]
    fn text_passes_through_and_limits_length() {
        let c = TypeCodec::Text { max_len: Some(4) };
        assert_eq!(c.decode(" coil ").expect("decode"), Value::from(" coil "));
        assert_eq!(c.encode(&Value::from("abcd")).expect("encode"), "abcd");
        assert!(c.encode(&Value::from("abcde")).is_err());
    }

    #[test]
    fn choice_set_validates_membership() {
        let c = TypeCodec::choice(["A", "G"]).expect("codec");
        assert_eq!(c.encode(&Value::from("G")).expect("encode"), "G");
        assert!(matches!(
            c.encode(&Value::from("T")),
            Err(InstrumentError::Validation(_))
        ));
        assert!(matches!(c.decode("T"), Err(InstrumentError::Decode(_))));
        assert!(TypeCodec::choice(Vec::<String>::new()).is_err());
    }

    #[test]
    fn enum_uses_position_and_start() {
        let c = TypeCodec::enumeration(["low", "mid", "high"], 1).expect("codec");
        assert_eq!(c.encode(&Value::from("mid")).expect("encode"), "2");
        assert_eq!(c.decode("3").expect("decode"), Value::from("high"));
        assert!(matches!(c.decode("0"), Err(InstrumentError::Decode(_))));
        assert!(matches!(c.decode("4"), Err(InstrumentError::Decode(_))));
    }

    #[test]
    fn enum_index_overflow_is_a_validation_error() {
        let c = TypeCodec::enumeration(["a", "b"], i64::MAX).expect("codec");
        assert_eq!(c.encode(&Value::from("a")).expect("first"), i64::MAX.to_string());
        assert!(matches!(
            c.encode(&Value::from("b")),
            Err(InstrumentError::Validation(_))
        ));
    }

    #[test]
    fn fixed_width_of_token_pairs() {
        let c = TypeCodec::boolean_tokens("1", "0").expect("codec");
        assert_eq!(c.fixed_width(), Some(1));
        assert_eq!(TypeCodec::boolean().fixed_width(), None);
        assert_eq!(TypeCodec::float().fixed_width(), None);
    }
}
