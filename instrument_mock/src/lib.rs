//! instrument_codec_mock
//!
//! In-process simulators of the instruments in the `instrument_codec`
//! catalog. A [`SimLink`] wraps any [`Simulator`] and implements the
//! [`Transport`] contract, so drivers can be exercised without hardware:
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//! use instrument_codec::{catalog, Connection};
//! use instrument_codec_mock::{SimLink, Smc100Simulator};
//!
//! let link = Rc::new(RefCell::new(SimLink::new(Smc100Simulator::new(1))));
//! let axis = catalog::smc100(Connection::shared(link.clone()), 1).unwrap();
//! axis.action("reference").unwrap();
//! assert_eq!(axis.get("position").unwrap().as_f64(), Some(0.0));
//! ```

use std::collections::VecDeque;
use std::io;

use instrument_codec::Transport;

pub mod bus;
pub mod mps4g;
pub mod smc100;

pub use bus::MultiDropBus;
pub use mps4g::{Mps4gSimulator, Mps4gState};
pub use smc100::{Smc100Simulator, Smc100State};

/// A simulated instrument: consumes one message, optionally produces one
/// reply line.
pub trait Simulator {
    /// Handle one message. `None` means the instrument stays silent (writes,
    /// actions, malformed input).
    fn handle(&mut self, message: &str) -> Option<String>;

    /// Whether the message is addressed to this instrument. Instruments
    /// without multi-drop addressing accept everything.
    fn accepts(&self, _message: &str) -> bool {
        true
    }
}

/// Transport backed by a simulator. Replies are queued on `send` and
/// returned by `receive`; an empty queue times out like a silent
/// instrument would.
#[derive(Debug)]
pub struct SimLink<S> {
    simulator: S,
    sent: Vec<String>,
    replies: VecDeque<String>,
}

impl<S: Simulator> SimLink<S> {
    pub fn new(simulator: S) -> Self {
        Self {
            simulator,
            sent: Vec::new(),
            replies: VecDeque::new(),
        }
    }

    pub const fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    /// Every message received so far, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Pop a queued reply without going through the transport contract.
    pub fn next_reply(&mut self) -> Option<String> {
        self.replies.pop_front()
    }
}

impl<S: Simulator> Transport for SimLink<S> {
    fn send(&mut self, message: &str) -> io::Result<()> {
        self.sent.push(message.to_string());
        match self.simulator.handle(message) {
            Some(reply) => {
                tracing::trace!(%message, %reply, "simulated reply");
                self.replies.push_back(reply);
            }
            None => tracing::trace!(%message, "no reply"),
        }
        Ok(())
    }

    fn receive(&mut self) -> io::Result<String> {
        self.replies
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "instrument did not reply"))
    }
}

/// Parse a simulator argument, tolerating surrounding whitespace.
pub(crate) fn parse_number(arg: &str) -> Option<f64> {
    arg.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
