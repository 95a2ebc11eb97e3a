//! Transport contract and the shared connection handle.
//!
//! The core never opens or closes a physical link. A [`Transport`] is any
//! line-oriented text channel; a [`Connection`] is a cheap clonable handle to
//! one transport, shared by every instrument on the same multi-drop link.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::config::config as global_config;
use crate::error::InstrumentError;

/// Line-oriented text channel to one or more instruments.
///
/// `receive` blocks until one full reply is available. Line termination and
/// timeouts are the implementation's responsibility; a timeout should surface
/// as [`io::ErrorKind::TimedOut`].
pub trait Transport {
    fn send(&mut self, message: &str) -> io::Result<()>;
    fn receive(&mut self) -> io::Result<String>;
}

/// Shared handle to a transport. Clones refer to the same link.
#[derive(Clone)]
pub struct Connection {
    inner: Rc<RefCell<dyn Transport>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("links", &Rc::strong_count(&self.inner))
            .finish()
    }
}

impl Connection {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(transport)),
        }
    }

    /// Wrap a transport the caller keeps its own handle to (e.g. to inspect
    /// a loopback in tests).
    pub fn shared<T: Transport + 'static>(transport: Rc<RefCell<T>>) -> Self {
        Self { inner: transport }
    }

    /// True when both handles refer to the same transport.
    #[must_use]
    pub fn same_link(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Send one message without waiting for a reply.
    pub fn send(&self, message: &str) -> Result<(), InstrumentError> {
        let mut t = self
            .inner
            .try_borrow_mut()
            .map_err(|_| InstrumentError::TransportBusy)?;
        if global_config().log_wire {
            tracing::debug!(wire = %message.escape_debug(), "send");
        }
        t.send(message)?;
        Ok(())
    }

    /// Send one message and block for exactly one reply.
    pub fn query(&self, message: &str) -> Result<String, InstrumentError> {
        let mut t = self
            .inner
            .try_borrow_mut()
            .map_err(|_| InstrumentError::TransportBusy)?;
        if global_config().log_wire {
            tracing::debug!(wire = %message.escape_debug(), "send");
        }
        t.send(message)?;
        let reply = t.receive()?;
        if global_config().log_wire {
            tracing::debug!(wire = %reply.escape_debug(), "receive");
        }
        Ok(reply)
    }
}

/// In-memory transport: records every sent message and answers with queued
/// replies in order. Receiving with an empty queue times out.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    sent: Vec<String>,
    replies: VecDeque<String>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Vec::new(),
            replies: replies.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push_reply(&mut self, reply: impl Into<String>) {
        self.replies.push_back(reply.into());
    }

    #[must_use]
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sent)
    }

    #[must_use]
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, message: &str) -> io::Result<()> {
        self.sent.push(message.to_string());
        Ok(())
    }

    fn receive(&mut self) -> io::Result<String> {
        self.replies
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no reply queued"))
    }
}
