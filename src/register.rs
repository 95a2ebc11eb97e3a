use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::InstrumentError;
use crate::types::kind_mismatch;
use crate::value::Value;

/// Digit system of a register token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Radix {
    #[default]
    Hex,
    Binary,
    Decimal,
}

impl Radix {
    const fn base(self) -> u32 {
        match self {
            Self::Hex => 16,
            Self::Binary => 2,
            Self::Decimal => 10,
        }
    }

    // Longest token that still fits into a u64 mask.
    const fn max_width(self) -> usize {
        match self {
            Self::Hex => 16,
            Self::Binary => 64,
            Self::Decimal => 19,
        }
    }
}

/// Fixed-width bitmask register. Each bit position maps to one condition
/// label; decoding yields the set of labels whose bits are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    width: usize,
    radix: Radix,
    bits: BTreeMap<u32, String>,
}

impl Register {
    pub fn new<I, S>(width: usize, radix: Radix, bits: I) -> Result<Self, InstrumentError>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        if width == 0 || width > radix.max_width() {
            return Err(InstrumentError::configuration(format!(
                "register width {width} not supported for {radix:?} (1..={})",
                radix.max_width()
            )));
        }
        let capacity = capacity_bits(width, radix);
        let mut table = BTreeMap::new();
        let mut labels = BTreeSet::new();
        for (bit, label) in bits {
            let label = label.into();
            if bit >= capacity {
                return Err(InstrumentError::configuration(format!(
                    "register bit {bit} ('{label}') does not fit {width} {radix:?} digits"
                )));
            }
            if !labels.insert(label.clone()) {
                return Err(InstrumentError::configuration(format!(
                    "register label '{label}' is declared twice"
                )));
            }
            if table.insert(bit, label).is_some() {
                return Err(InstrumentError::configuration(format!(
                    "register bit {bit} is declared twice"
                )));
            }
        }
        Ok(Self {
            width,
            radix,
            bits: table,
        })
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn radix(&self) -> Radix {
        self.radix
    }

    #[must_use]
    pub fn label(&self, bit: u32) -> Option<&str> {
        self.bits.get(&bit).map(String::as_str)
    }

    pub fn decode(&self, token: &str) -> Result<Value, InstrumentError> {
        if token.len() != self.width {
            return Err(InstrumentError::decode(format!(
                "register token '{token}' has {} characters, expected {}",
                token.len(),
                self.width
            )));
        }
        let base = self.radix.base();
        if !token.chars().all(|c| c.is_digit(base)) {
            return Err(InstrumentError::decode(format!(
                "register token '{token}' is not a {:?} number",
                self.radix
            )));
        }
        let mask = u64::from_str_radix(token, base).map_err(|e| {
            InstrumentError::decode(format!("register token '{token}': {e}"))
        })?;
        let mut active = BTreeSet::new();
        for bit in 0..u64::BITS {
            if mask & (1u64 << bit) == 0 {
                continue;
            }
            let label = self.bits.get(&bit).ok_or_else(|| {
                InstrumentError::decode(format!(
                    "register token '{token}' sets unmapped bit {bit}"
                ))
            })?;
            active.insert(label.clone());
        }
        Ok(Value::Set(active))
    }

    pub fn encode(&self, value: &Value) -> Result<String, InstrumentError> {
        let labels = value.as_set().ok_or_else(|| kind_mismatch("set", value))?;
        let mut mask = 0u64;
        for label in labels {
            let bit = self
                .bits
                .iter()
                .find(|(_, l)| *l == label)
                .map(|(b, _)| *b)
                .ok_or_else(|| {
                    InstrumentError::validation(format!("unknown register label '{label}'"))
                })?;
            mask |= 1u64 << bit;
        }
        let w = self.width;
        let token = match self.radix {
            Radix::Hex => format!("{mask:0w$X}"),
            Radix::Binary => format!("{mask:0w$b}"),
            Radix::Decimal => format!("{mask:0w$}"),
        };
        if token.len() > w {
            return Err(InstrumentError::validation(format!(
                "register mask {mask} does not fit {w} digits"
            )));
        }
        Ok(token)
    }
}

fn capacity_bits(width: usize, radix: Radix) -> u32 {
    // width is bounded by Radix::max_width, so the conversions cannot fail
    let w = u32::try_from(width).unwrap_or(u32::MAX);
    match radix {
        Radix::Hex => (4 * w).min(u64::BITS),
        Radix::Binary => w.min(u64::BITS),
        Radix::Decimal => {
            let max = 10u64.checked_pow(w).map_or(u64::MAX, |p| p - 1);
            u64::BITS - max.leading_zeros()
        }
    }
}
