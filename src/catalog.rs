#![allow(clippy::significant_drop_tightening)]
//! Built-in instrument definitions and the global definition registry.
//!
//! Lookup order for a model name (case-insensitive):
//! 1. definitions registered at runtime ([`DefinitionRegistry`]),
//! 2. `<name>.toml` in the configured define directory,
//! 3. the definitions compiled into the crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use once_cell::sync::OnceCell;

use crate::config::config as global_config;
use crate::definition::InstrumentDefinition;
use crate::error::InstrumentError;
use crate::instrument::Instrument;
use crate::transport::Connection;

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("smc100", include_str!("instruments/smc100.toml")),
    ("mps4g", include_str!("instruments/mps4g.toml")),
];

static DEFINITION_REGISTRY: OnceCell<RwLock<HashMap<String, InstrumentDefinition>>> =
    OnceCell::new();

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Names of the compiled-in definitions.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_SOURCES.iter().map(|(n, _)| *n)
}

/// Parse one of the compiled-in definitions.
pub fn builtin(name: &str) -> Result<InstrumentDefinition, InstrumentError> {
    let k = key(name);
    let (_, src) = BUILTIN_SOURCES
        .iter()
        .find(|(n, _)| *n == k)
        .ok_or_else(|| InstrumentError::UnknownName {
            kind: "instrument",
            name: name.to_string(),
        })?;
    InstrumentDefinition::from_str(src)
}

/// A set of definitions to be placed into the global registry.
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: Vec<InstrumentDefinition>,
}

impl DefinitionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All compiled-in definitions.
    pub fn builtins() -> Result<Self, InstrumentError> {
        let definitions = builtin_names()
            .map(builtin)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { definitions })
    }

    /// Every `*.toml` file in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, InstrumentError> {
        let mut definitions = Vec::new();
        let mut paths = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|x| x == "toml"))
            .collect::<Vec<_>>();
        paths.sort();
        for p in paths {
            definitions.push(InstrumentDefinition::from_path(&p)?);
        }
        Ok(Self { definitions })
    }

    #[must_use]
    pub fn with(mut self, definition: InstrumentDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    fn to_map(&self) -> HashMap<String, InstrumentDefinition> {
        self.definitions
            .iter()
            .map(|d| (key(d.name()), d.clone()))
            .collect()
    }

    /// Install into the global registry. Fails with `AlreadyRegistered` when
    /// the registry is already set.
    pub fn register(&self) -> Result<(), InstrumentError> {
        DEFINITION_REGISTRY
            .set(RwLock::new(self.to_map()))
            .map_err(|_| InstrumentError::AlreadyRegistered)
    }

    /// Install into the global registry, or add to it when already set.
    /// Existing entries with the same name are replaced.
    pub fn register_or_merge(&self) -> Result<(), InstrumentError> {
        if DEFINITION_REGISTRY.set(RwLock::new(self.to_map())).is_ok() {
            return Ok(());
        }
        let cell = DEFINITION_REGISTRY
            .get()
            .ok_or_else(|| InstrumentError::configuration("definition registry inconsistent state"))?;
        let mut w = cell
            .write()
            .map_err(|_| InstrumentError::configuration("definition registry poisoned"))?;
        for d in &self.definitions {
            log::debug!("registering instrument definition '{}'", d.name());
            w.insert(key(d.name()), d.clone());
        }
        Ok(())
    }
}

/// A definition registered at runtime, if any.
pub fn registered(name: &str) -> Option<InstrumentDefinition> {
    let cell = DEFINITION_REGISTRY.get()?;
    let r = cell.read().ok()?;
    r.get(&key(name)).cloned()
}

/// Resolve a model name through the registry, the define directory and
/// the built-ins, in that order.
pub fn lookup(name: &str) -> Result<InstrumentDefinition, InstrumentError> {
    if let Some(def) = registered(name) {
        return Ok(def);
    }
    if let Some(dir) = &global_config().define_dir {
        for file in [format!("{name}.toml"), format!("{}.toml", key(name))] {
            let p = dir.join(file);
            if p.is_file() {
                log::info!("using instrument definition {}", p.display());
                return InstrumentDefinition::from_path(&p);
            }
        }
    }
    builtin(name)
}

/// SMC100 controller at `address` on the shared RS-485 link.
pub fn smc100(connection: Connection, address: u8) -> Result<Instrument, InstrumentError> {
    let params = HashMap::from([("address".to_string(), address.to_string())]);
    lookup("smc100")?.instantiate(connection, &params)
}

/// MPS4G magnet power supply.
pub fn mps4g(connection: Connection) -> Result<Instrument, InstrumentError> {
    lookup("mps4g")?.instantiate(connection, &HashMap::new())
}
