use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("decode error: {0}")]
    Decode(String),

    #[error("unknown {kind}: {name}")]
    UnknownName { kind: &'static str, name: String },
    #[error("command '{0}' is write-only")]
    NotReadable(String),
    #[error("command '{0}' is read-only")]
    NotWritable(String),
    #[error("connection is already in use")]
    TransportBusy,
    #[error("already registered")]
    AlreadyRegistered,
}

impl InstrumentError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// True for the two failure kinds caused by an unexpected instrument reply.
    #[must_use]
    pub const fn is_reply_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Decode(_))
    }
}
