//! Cryomagnetics 4G magnet power supply.
//!
//! Keyword commands separated from their arguments by spaces; queries end
//! with `?`. Quantities with a unit are answered as `"<value> <unit>"`.

use serde::{Deserialize, Serialize};

use crate::{parse_number, Simulator};

pub const RANGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mps4gState {
    pub unit: String,
    pub output_current: f64,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub name: String,
    pub switch_heater: bool,
    pub voltage_limit: f64,
    pub magnet_voltage: f64,
    pub output_voltage: f64,
    pub error_mode: bool,
    pub range_limits: [f64; RANGES],
    pub range_rates: [f64; RANGES],
    pub remote: bool,
    pub locked: bool,
    pub quench: bool,
}

impl Default for Mps4gState {
    fn default() -> Self {
        Self {
            unit: "A".to_string(),
            output_current: 0.0,
            lower_limit: 0.0,
            upper_limit: 0.0,
            name: String::new(),
            switch_heater: false,
            voltage_limit: 10.0,
            magnet_voltage: 0.0,
            output_voltage: 0.0,
            error_mode: false,
            range_limits: [10.0, 20.0, 30.0, 40.0, 50.0],
            range_rates: [0.1; RANGES],
            remote: false,
            locked: false,
            quench: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mps4gSimulator {
    state: Mps4gState,
}

impl Mps4gSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_state(state: Mps4gState) -> Self {
        Self { state }
    }

    pub const fn state(&self) -> &Mps4gState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Mps4gState {
        &mut self.state
    }

    fn range_index(arg: Option<&str>) -> Option<usize> {
        arg?.parse::<usize>().ok().filter(|i| *i < RANGES)
    }
}

fn with_unit(value: f64, unit: &str) -> Option<String> {
    Some(format!("{value} {unit}"))
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

impl Simulator for Mps4gSimulator {
    fn handle(&mut self, message: &str) -> Option<String> {
        let message = message.trim_end_matches(['\r', '\n']);
        let mut words = message.split_whitespace();
        let keyword = words.next()?;
        let first = words.next();
        let second = words.next();
        tracing::debug!(keyword, ?first, ?second, "mps4g");
        let s = &mut self.state;
        match keyword {
            "ERROR?" => Some(u8::from(s.error_mode).to_string()),
            "ERROR" => {
                match first {
                    Some("1") => s.error_mode = true,
                    Some("0") => s.error_mode = false,
                    _ => {}
                }
                None
            }
            "IOUT?" => with_unit(s.output_current, &s.unit),
            "LLIM?" => with_unit(s.lower_limit, &s.unit),
            "ULIM?" => with_unit(s.upper_limit, &s.unit),
            "LLIM" => {
                if let Some(v) = first.and_then(parse_number) {
                    s.lower_limit = v;
                }
                None
            }
            "ULIM" => {
                if let Some(v) = first.and_then(parse_number) {
                    s.upper_limit = v;
                }
                None
            }
            "NAME?" => Some(s.name.clone()),
            "NAME" => {
                // the name may contain spaces
                s.name = message["NAME".len()..].trim_start().to_string();
                None
            }
            "PSHTR?" => Some(on_off(s.switch_heater).to_string()),
            "PSHTR" => {
                match first {
                    Some("ON") => s.switch_heater = true,
                    Some("OFF") => s.switch_heater = false,
                    _ => {}
                }
                None
            }
            "UNITS?" => Some(s.unit.clone()),
            "UNITS" => {
                if let Some(u @ ("A" | "G")) = first {
                    s.unit = u.to_string();
                }
                None
            }
            "VLIM?" => Some(s.voltage_limit.to_string()),
            "VLIM" => {
                if let Some(v) = first.and_then(parse_number).filter(|v| (0.0..=10.0).contains(v)) {
                    s.voltage_limit = v;
                }
                None
            }
            "VMAG?" => Some(s.magnet_voltage.to_string()),
            "VOUT?" => Some(s.output_voltage.to_string()),
            "RANGE?" => Self::range_index(first).map(|i| s.range_limits[i].to_string()),
            "RATE?" => Self::range_index(first).map(|i| s.range_rates[i].to_string()),
            "RANGE" => {
                if let (Some(i), Some(v)) = (Self::range_index(first), second.and_then(parse_number)) {
                    s.range_limits[i] = v;
                }
                None
            }
            "RATE" => {
                if let (Some(i), Some(v)) = (Self::range_index(first), second.and_then(parse_number)) {
                    s.range_rates[i] = v;
                }
                None
            }
            "*CLS" => {
                s.error_mode = false;
                None
            }
            "LOCAL" => {
                s.remote = false;
                s.locked = false;
                None
            }
            "REMOTE" => {
                s.remote = true;
                s.locked = false;
                None
            }
            "RWLOCK" => {
                s.remote = true;
                s.locked = true;
                None
            }
            "QRESET" => {
                s.quench = false;
                None
            }
            _ => None,
        }
    }
}
