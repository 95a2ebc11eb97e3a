use crate::error::InstrumentError;
use crate::types::{kind_mismatch, TypeCodec};
use crate::value::Value;

/// Width of one composite field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Fixed(usize),
    /// Consumes the remainder of the token. Only legal on the last field.
    Rest,
}

/// Sequence of fixed-width fields concatenated into a single token, each
/// field decoded by its own codec.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    fields: Vec<(Width, TypeCodec)>,
}

impl Composite {
    pub fn new(fields: Vec<(Width, TypeCodec)>) -> Result<Self, InstrumentError> {
        if fields.len() < 2 {
            return Err(InstrumentError::configuration(
                "composite needs at least two fields",
            ));
        }
        let last = fields.len() - 1;
        for (i, (width, codec)) in fields.iter().enumerate() {
            match *width {
                Width::Rest if i != last => {
                    return Err(InstrumentError::configuration(format!(
                        "composite field {i}: only the last field may take the rest"
                    )));
                }
                Width::Fixed(0) => {
                    return Err(InstrumentError::configuration(format!(
                        "composite field {i}: width must be positive"
                    )));
                }
                Width::Fixed(n) => {
                    if let Some(w) = codec.fixed_width() {
                        if w != n {
                            return Err(InstrumentError::configuration(format!(
                                "composite field {i}: declared width {n} but codec tokens are {w} wide"
                            )));
                        }
                    }
                }
                Width::Rest => {}
            }
            codec.validate()?;
        }
        Ok(Self { fields })
    }

    #[must_use]
    pub fn fields(&self) -> &[(Width, TypeCodec)] {
        &self.fields
    }

    pub(crate) fn fixed_width(&self) -> Option<usize> {
        self.fields.iter().try_fold(0, |acc, (w, _)| match w {
            Width::Fixed(n) => Some(acc + n),
            Width::Rest => None,
        })
    }

    pub fn decode(&self, token: &str) -> Result<Value, InstrumentError> {
        if let Some(total) = self.fixed_width() {
            if token.len() != total {
                return Err(InstrumentError::decode(format!(
                    "composite token '{token}' has {} characters, expected {total}",
                    token.len()
                )));
            }
        }
        let mut out = Vec::with_capacity(self.fields.len());
        let mut pos = 0;
        for (i, (width, codec)) in self.fields.iter().enumerate() {
            let end = match width {
                Width::Fixed(n) => pos + n,
                Width::Rest => token.len(),
            };
            let piece = token.get(pos..end).ok_or_else(|| {
                InstrumentError::decode(format!(
                    "composite token '{token}' too short for field {i}"
                ))
            })?;
            out.push(codec.decode(piece)?);
            pos = end;
        }
        Ok(Value::Tuple(out))
    }

    pub fn encode(&self, value: &Value) -> Result<String, InstrumentError> {
        let items = value
            .as_tuple()
            .ok_or_else(|| kind_mismatch("tuple", value))?;
        if items.len() != self.fields.len() {
            return Err(InstrumentError::validation(format!(
                "composite expects {} values, got {}",
                self.fields.len(),
                items.len()
            )));
        }
        let mut token = String::new();
        for (i, ((width, codec), item)) in self.fields.iter().zip(items).enumerate() {
            let piece = codec.encode(item)?;
            if let Width::Fixed(n) = width {
                if piece.len() != *n {
                    return Err(InstrumentError::validation(format!(
                        "composite field {i}: '{piece}' is not {n} characters wide"
                    )));
                }
            }
            token.push_str(&piece);
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Mapping;
    use crate::register::{Radix, Register};

    fn controller_state() -> Composite {
        let errors = Register::new(
            4,
            Radix::Hex,
            [(0, "at negative end-of-run"), (1, "at positive end-of-run")],
        )
        .expect("register");
        let states = Mapping::new([("in MOVING", "28"), ("in READY from MOVING", "33")])
            .expect("mapping");
        Composite::new(vec![
            (Width::Fixed(4), errors.into()),
            (Width::Fixed(2), states.into()),
        ])
        .expect("composite")
    }

    #[test]
    fn splits_fields_by_width() {
        let c = controller_state();
        assert_eq!(
            c.decode("000028").expect("decode"),
            Value::Tuple(vec![Value::set(Vec::<String>::new()), Value::from("in MOVING")])
        );
        assert_eq!(
            c.decode("000133").expect("decode"),
            Value::Tuple(vec![
                Value::set(["at negative end-of-run"]),
                Value::from("in READY from MOVING")
            ])
        );
    }

    #[test]
    fn length_mismatch_and_unknown_field_fail() {
        let c = controller_state();
        assert!(matches!(c.decode("00028"), Err(InstrumentError::Decode(_))));
        assert!(matches!(c.decode("000099"), Err(InstrumentError::Decode(_))));
    }

    #[test]
    fn encodes_by_concatenation() {
        let c = controller_state();
        let v = Value::Tuple(vec![
            Value::set(["at positive end-of-run"]),
            Value::from("in MOVING"),
        ]);
        assert_eq!(c.encode(&v).expect("encode"), "000228");
        assert!(c.encode(&Value::Tuple(vec![Value::from("in MOVING")])).is_err());
    }

    #[test]
    fn rest_field_takes_remainder() {
        let c = Composite::new(vec![
            (Width::Fixed(1), TypeCodec::boolean_tokens("1", "0").expect("bool")),
            (Width::Rest, TypeCodec::text()),
        ])
        .expect("composite");
        assert_eq!(
            c.decode("1coil A").expect("decode"),
            Value::Tuple(vec![Value::Bool(true), Value::from("coil A")])
        );
    }

    #[test]
    fn construction_rules() {
        assert!(Composite::new(vec![(Width::Fixed(2), TypeCodec::float())]).is_err());
        assert!(Composite::new(vec![
            (Width::Rest, TypeCodec::text()),
            (Width::Fixed(1), TypeCodec::text()),
        ])
        .is_err());
        assert!(Composite::new(vec![
            (Width::Fixed(3), TypeCodec::boolean_tokens("1", "0").expect("bool")),
            (Width::Fixed(1), TypeCodec::text()),
        ])
        .is_err());
    }
}
