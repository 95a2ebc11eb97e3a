//! Newport SMC100 single-axis controller.
//!
//! Replies echo the controller address and the two-letter mnemonic. Motion
//! is simulated in one step: the first status poll after a move reports the
//! transient state (MOVING/HOMING), and the move completes right after.

use serde::{Deserialize, Serialize};

use crate::{parse_number, Simulator};

pub const NOT_REFERENCED_FROM_RESET: &str = "0A";
pub const NOT_REFERENCED_FROM_HOMING: &str = "0B";
pub const NOT_REFERENCED_FROM_CONFIGURATION: &str = "0C";
pub const CONFIGURATION: &str = "14";
pub const HOMING: &str = "1E";
pub const MOVING: &str = "28";
pub const READY_FROM_HOMING: &str = "32";
pub const READY_FROM_MOVING: &str = "33";
pub const READY_FROM_DISABLE: &str = "34";
pub const DISABLE_FROM_READY: &str = "3C";

/// Error codes reported by `TE`.
pub const NO_ERROR: char = '@';
pub const UNKNOWN_COMMAND: char = 'A';
pub const PARAMETER_OUT_OF_RANGE: char = 'C';
pub const NOT_ALLOWED_IN_STATE: char = 'D';

/// Bit 0 of the positioner error register.
const NEGATIVE_END_OF_RUN: u16 = 1 << 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Motion {
    Move { target: f64 },
    Home,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smc100State {
    pub position: f64,
    pub set_point: f64,
    /// Two-hex-digit controller state code.
    pub state: String,
    /// Positioner error register.
    pub errors: u16,
    pub last_error: char,
    pub esp_store: Option<u8>,
    pub motion: Option<Motion>,
}

impl Default for Smc100State {
    fn default() -> Self {
        Self {
            position: 0.0,
            set_point: 0.0,
            state: NOT_REFERENCED_FROM_RESET.to_string(),
            errors: 0,
            last_error: NO_ERROR,
            esp_store: None,
            motion: None,
        }
    }
}

impl Smc100State {
    fn is_ready(&self) -> bool {
        matches!(
            self.state.as_str(),
            READY_FROM_HOMING | READY_FROM_MOVING | READY_FROM_DISABLE | "35"
        )
    }

    fn is_disabled(&self) -> bool {
        matches!(self.state.as_str(), DISABLE_FROM_READY | "3D" | "3E")
    }

    fn is_not_referenced(&self) -> bool {
        matches!(
            self.state.as_str(),
            "0A" | "0B" | "0C" | "0D" | "0E" | "0F" | "10" | "11"
        )
    }
}

#[derive(Debug, Clone)]
pub struct Smc100Simulator {
    address: u8,
    state: Smc100State,
}

impl Smc100Simulator {
    pub fn new(address: u8) -> Self {
        Self::with_state(address, Smc100State::default())
    }

    pub const fn with_state(address: u8, state: Smc100State) -> Self {
        Self { address, state }
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    pub const fn state(&self) -> &Smc100State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Smc100State {
        &mut self.state
    }

    /// Split `"<address><mnemonic><argument>"`.
    fn split<'a>(&self, message: &'a str) -> Option<(&'a str, &'a str)> {
        let digits = message.find(|c: char| !c.is_ascii_digit())?;
        let address: u8 = message[..digits].parse().ok()?;
        if address != self.address {
            return None;
        }
        let rest = &message[digits..];
        let mnemonic = rest.get(..2)?;
        Some((mnemonic, rest[2..].trim_end_matches(['\r', '\n'])))
    }

    fn reply(&self, mnemonic: &str, payload: impl std::fmt::Display) -> Option<String> {
        Some(format!("{}{mnemonic}{payload}", self.address))
    }

    fn fail(&mut self, code: char) -> Option<String> {
        self.state.last_error = code;
        None
    }

    fn finish_motion(&mut self) {
        match self.state.motion.take() {
            Some(Motion::Move { target }) => {
                self.state.position = target;
                self.state.state = READY_FROM_MOVING.to_string();
            }
            Some(Motion::Home) => {
                self.state.position = 0.0;
                self.state.state = READY_FROM_HOMING.to_string();
            }
            None => {}
        }
    }

    fn start_move(&mut self, target: f64) -> Option<String> {
        if !self.state.is_ready() {
            return self.fail(NOT_ALLOWED_IN_STATE);
        }
        if target < 0.0 {
            self.state.errors |= NEGATIVE_END_OF_RUN;
            return self.fail(PARAMETER_OUT_OF_RANGE);
        }
        self.state.set_point = target;
        self.state.state = MOVING.to_string();
        self.state.motion = Some(Motion::Move { target });
        None
    }
}

impl Simulator for Smc100Simulator {
    fn accepts(&self, message: &str) -> bool {
        self.split(message).is_some()
    }

    fn handle(&mut self, message: &str) -> Option<String> {
        let (mnemonic, arg) = self.split(message)?;
        tracing::debug!(address = self.address, mnemonic, arg, "smc100");
        match (mnemonic, arg.is_empty()) {
            ("TP", true) => {
                self.finish_motion();
                self.reply("TP", self.state.position)
            }
            ("TS", true) => {
                let reply = self.reply(
                    "TS",
                    format_args!("{:04X}{}", self.state.errors, self.state.state),
                );
                self.finish_motion();
                reply
            }
            ("TE", true) => {
                let code = std::mem::replace(&mut self.state.last_error, NO_ERROR);
                self.reply("TE", code)
            }
            ("PH", true) => self.reply("PH", self.state.set_point),
            ("MM", true) => self.reply("MM", u8::from(!self.state.is_disabled())),
            ("MM", false) => match arg {
                "0" if self.state.is_ready() => {
                    self.state.state = DISABLE_FROM_READY.to_string();
                    None
                }
                "1" if self.state.is_disabled() => {
                    self.state.state = READY_FROM_DISABLE.to_string();
                    None
                }
                "0" | "1" => self.fail(NOT_ALLOWED_IN_STATE),
                _ => self.fail(PARAMETER_OUT_OF_RANGE),
            },
            ("PA", false) => match parse_number(arg) {
                Some(target) => self.start_move(target),
                None => self.fail(PARAMETER_OUT_OF_RANGE),
            },
            ("PR", false) => match parse_number(arg) {
                Some(delta) => self.start_move(self.state.position + delta),
                None => self.fail(PARAMETER_OUT_OF_RANGE),
            },
            ("OR", true) => {
                if !self.state.is_not_referenced() {
                    return self.fail(NOT_ALLOWED_IN_STATE);
                }
                self.state.errors = 0;
                self.state.state = HOMING.to_string();
                self.state.motion = Some(Motion::Home);
                None
            }
            ("ST", true) => {
                match self.state.motion.take() {
                    Some(Motion::Move { .. }) => {
                        self.state.state = READY_FROM_MOVING.to_string();
                    }
                    Some(Motion::Home) => {
                        self.state.state = NOT_REFERENCED_FROM_HOMING.to_string();
                    }
                    None => {}
                }
                None
            }
            ("PW", false) => match arg {
                "1" if self.state.is_not_referenced() => {
                    self.state.state = CONFIGURATION.to_string();
                    None
                }
                "0" if self.state.state == CONFIGURATION => {
                    self.state.state = NOT_REFERENCED_FROM_CONFIGURATION.to_string();
                    None
                }
                "0" | "1" => self.fail(NOT_ALLOWED_IN_STATE),
                _ => self.fail(PARAMETER_OUT_OF_RANGE),
            },
            ("ZX", false) => match arg.parse::<u8>() {
                Ok(store @ 1..=3) => {
                    self.state.esp_store = Some(store);
                    None
                }
                _ => self.fail(PARAMETER_OUT_OF_RANGE),
            },
            ("RS", true) => {
                self.state = Smc100State {
                    esp_store: self.state.esp_store,
                    ..Smc100State::default()
                };
                None
            }
            _ => self.fail(UNKNOWN_COMMAND),
        }
    }
}
