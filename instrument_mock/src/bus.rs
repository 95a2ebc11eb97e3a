//! Several addressed controllers sharing one serial port over RS-485.

use crate::smc100::Smc100Simulator;
use crate::Simulator;

/// Routes each message to the first controller whose address matches.
/// Messages nobody claims get no reply, as on a real bus.
#[derive(Debug, Clone, Default)]
pub struct MultiDropBus {
    controllers: Vec<Smc100Simulator>,
}

impl MultiDropBus {
    pub fn new<I: IntoIterator<Item = u8>>(addresses: I) -> Self {
        Self {
            controllers: addresses.into_iter().map(Smc100Simulator::new).collect(),
        }
    }

    #[must_use]
    pub fn with_controller(mut self, controller: Smc100Simulator) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn controller(&self, address: u8) -> Option<&Smc100Simulator> {
        self.controllers.iter().find(|c| c.address() == address)
    }

    pub fn controller_mut(&mut self, address: u8) -> Option<&mut Smc100Simulator> {
        self.controllers.iter_mut().find(|c| c.address() == address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = u8> + '_ {
        self.controllers.iter().map(Smc100Simulator::address)
    }
}

impl Simulator for MultiDropBus {
    fn accepts(&self, message: &str) -> bool {
        self.controllers.iter().any(|c| c.accepts(message))
    }

    fn handle(&mut self, message: &str) -> Option<String> {
        match self.controllers.iter_mut().find(|c| c.accepts(message)) {
            Some(c) => c.handle(message),
            None => {
                tracing::debug!(%message, "no controller on the bus claims this message");
                None
            }
        }
    }
}
