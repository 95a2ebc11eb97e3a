#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::too_long_first_doc_paragraph
)]

//! instrument_codec
//!
//! Command/response codec layer for laboratory instruments driven over a
//! character-oriented serial link (magnet power supplies, motion
//! controllers).
//!
//! Main pieces:
//! - type codecs between typed [`Value`]s and wire tokens, including bitmask
//!   registers, value/token mappings and fixed-width composites
//! - [`Command`]s binding a property to its query/write templates and the
//!   per-command framing ([`CommandConfig`])
//! - the [`Instrument`] container with indexed children and actions
//! - declarative TOML instrument definitions and a built-in catalog
//!   (Newport SMC100, Cryomagnetics MPS4G)
//!
//! The physical link is abstract ([`Transport`]); simulated instruments for
//! tests live in the separate `instrument_codec_mock` crate.
//!
//! ```no_run
//! use instrument_codec::{catalog, Connection, LoopbackTransport};
//! let link = Connection::new(LoopbackTransport::new());
//! let axis = catalog::smc100(link, 1)?;
//! let position = axis.get("position")?;
//! # Ok::<(), instrument_codec::InstrumentError>(())
//! ```

pub mod catalog;
pub mod command;
pub mod command_config;
pub mod composite;
pub mod config;
pub mod definition;
pub mod error;
pub mod instrument;
pub mod mapping;
pub mod register;
pub mod toml_helpers;
pub mod transport;
pub mod types;
pub mod value;

pub use command::{Action, ActionSpec, Command, CommandSpec, Payload, WireSpec};
pub use command_config::{CommandConfig, ResolvedConfig};
pub use composite::{Composite, Width};
pub use definition::InstrumentDefinition;
pub use error::InstrumentError;
pub use instrument::{ChildSpec, Instrument, InstrumentBuilder};
pub use mapping::Mapping;
pub use register::{Radix, Register};
pub use transport::{Connection, LoopbackTransport, Transport};
pub use types::TypeCodec;
pub use value::Value;

/// Register the compiled-in instrument definitions in the global catalog.
///
/// Idempotent: when the registry is already set, the built-ins are merged
/// into it.
///
/// # Errors
///
/// Returns `Err(InstrumentError)` when an embedded definition fails to parse.
pub fn init_defaults() -> Result<(), InstrumentError> {
    catalog::DefinitionRegistry::builtins()?.register_or_merge()
}
