//! Instrument container: a named table of bound commands, sub-addressable
//! children and fire-and-forget actions sharing one connection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::command::{Action, ActionSpec, Command, CommandSpec};
use crate::command_config::CommandConfig;
use crate::error::InstrumentError;
use crate::transport::Connection;
use crate::value::Value;

/// Template of a sub-addressable child (e.g. a current range scoped to an
/// index). Every command and action template may use `{index}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSpec {
    indices: BTreeSet<i64>,
    config: CommandConfig,
    commands: BTreeMap<String, CommandSpec>,
    actions: BTreeMap<String, ActionSpec>,
}

impl ChildSpec {
    pub fn new<I: IntoIterator<Item = i64>>(indices: I) -> Result<Self, InstrumentError> {
        let indices: BTreeSet<i64> = indices.into_iter().collect();
        if indices.is_empty() {
            return Err(InstrumentError::configuration(
                "child declares no valid index",
            ));
        }
        Ok(Self {
            indices,
            config: CommandConfig::default(),
            commands: BTreeMap::new(),
            actions: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_command(mut self, name: impl Into<String>, spec: CommandSpec) -> Self {
        self.commands.insert(name.into(), spec);
        self
    }

    #[must_use]
    pub fn with_action(mut self, name: impl Into<String>, spec: ActionSpec) -> Self {
        self.actions.insert(name.into(), spec);
        self
    }

    #[must_use]
    pub const fn indices(&self) -> &BTreeSet<i64> {
        &self.indices
    }

    /// Build the child for one index. An index outside the declared set
    /// fails before any transport interaction.
    pub fn instantiate(
        &self,
        owner: &str,
        connection: Connection,
        parent_config: &CommandConfig,
        parent_vars: &HashMap<String, String>,
        index: i64,
    ) -> Result<Instrument, InstrumentError> {
        if !self.indices.contains(&index) {
            return Err(InstrumentError::configuration(format!(
                "{owner}: index {index} is not one of {:?}",
                self.indices
            )));
        }
        let mut vars = parent_vars.clone();
        vars.insert("index".to_string(), index.to_string());
        let base = parent_config.merged(&self.config);
        let mut commands = BTreeMap::new();
        for (name, spec) in &self.commands {
            commands.insert(
                name.clone(),
                spec.bind(owner, name, connection.clone(), &base, &vars)?,
            );
        }
        let mut actions = BTreeMap::new();
        for (name, spec) in &self.actions {
            actions.insert(
                name.clone(),
                spec.bind(owner, name, connection.clone(), &base, &vars)?,
            );
        }
        Ok(Instrument {
            name: owner.to_string(),
            connection,
            commands,
            children: BTreeMap::new(),
            actions,
        })
    }
}

/// Collects declarations and binds them all at once in [`build`](Self::build).
#[derive(Debug)]
pub struct InstrumentBuilder {
    name: String,
    connection: Connection,
    config: CommandConfig,
    vars: HashMap<String, String>,
    commands: Vec<(String, CommandSpec)>,
    children: Vec<(String, ChildSpec)>,
    actions: Vec<(String, ActionSpec)>,
}

impl InstrumentBuilder {
    #[must_use]
    pub fn config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    /// Value for a `{name}` placeholder in templates and config fields.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn command(mut self, name: impl Into<String>, spec: CommandSpec) -> Self {
        self.commands.push((name.into(), spec));
        self
    }

    #[must_use]
    pub fn child(mut self, name: impl Into<String>, spec: ChildSpec) -> Self {
        self.children.push((name.into(), spec));
        self
    }

    #[must_use]
    pub fn action(mut self, name: impl Into<String>, spec: ActionSpec) -> Self {
        self.actions.push((name.into(), spec));
        self
    }

    pub fn build(self) -> Result<Instrument, InstrumentError> {
        let mut seen = BTreeSet::new();
        let names = self
            .commands
            .iter()
            .map(|(n, _)| n)
            .chain(self.children.iter().map(|(n, _)| n))
            .chain(self.actions.iter().map(|(n, _)| n));
        for n in names {
            if !seen.insert(n.as_str()) {
                return Err(InstrumentError::configuration(format!(
                    "{}: name '{n}' is declared twice",
                    self.name
                )));
            }
        }

        let mut commands = BTreeMap::new();
        for (name, spec) in &self.commands {
            let cmd = spec.bind(&self.name, name, self.connection.clone(), &self.config, &self.vars)?;
            commands.insert(name.clone(), cmd);
        }
        let mut children = BTreeMap::new();
        for (name, spec) in &self.children {
            let mut by_index = BTreeMap::new();
            for &index in spec.indices() {
                let owner = format!("{}.{name}[{index}]", self.name);
                let child =
                    spec.instantiate(&owner, self.connection.clone(), &self.config, &self.vars, index)?;
                by_index.insert(index, child);
            }
            children.insert(name.clone(), by_index);
        }
        let mut actions = BTreeMap::new();
        for (name, spec) in &self.actions {
            let action =
                spec.bind(&self.name, name, self.connection.clone(), &self.config, &self.vars)?;
            actions.insert(name.clone(), action);
        }
        Ok(Instrument {
            name: self.name,
            connection: self.connection,
            commands,
            children,
            actions,
        })
    }
}

/// An addressable instrument. Holds no state beyond its tables and the
/// shared connection.
#[derive(Debug, Clone)]
pub struct Instrument {
    name: String,
    connection: Connection,
    commands: BTreeMap<String, Command>,
    children: BTreeMap<String, BTreeMap<i64, Instrument>>,
    actions: BTreeMap<String, Action>,
}

impl Instrument {
    pub fn builder(name: impl Into<String>, connection: Connection) -> InstrumentBuilder {
        InstrumentBuilder {
            name: name.into(),
            connection,
            config: CommandConfig::default(),
            vars: HashMap::new(),
            commands: Vec::new(),
            children: Vec::new(),
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn command(&self, name: &str) -> Result<&Command, InstrumentError> {
        self.commands.get(name).ok_or_else(|| InstrumentError::UnknownName {
            kind: "property",
            name: name.to_string(),
        })
    }

    /// Read a property.
    pub fn get(&self, name: &str) -> Result<Value, InstrumentError> {
        self.command(name)?.read()
    }

    /// Write a property.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), InstrumentError> {
        self.command(name)?.write(&value.into())
    }

    /// Child `name` at `index`.
    pub fn child(&self, name: &str, index: i64) -> Result<&Self, InstrumentError> {
        let by_index = self.children.get(name).ok_or_else(|| InstrumentError::UnknownName {
            kind: "child",
            name: name.to_string(),
        })?;
        by_index.get(&index).ok_or_else(|| {
            InstrumentError::configuration(format!(
                "{}: index {index} is not one of {:?}",
                self.name,
                by_index.keys().collect::<Vec<_>>()
            ))
        })
    }

    fn action_ref(&self, name: &str) -> Result<&Action, InstrumentError> {
        self.actions.get(name).ok_or_else(|| InstrumentError::UnknownName {
            kind: "action",
            name: name.to_string(),
        })
    }

    /// Run an action that takes no argument.
    pub fn action(&self, name: &str) -> Result<(), InstrumentError> {
        self.action_ref(name)?.run(None)
    }

    /// Run an action with its argument.
    pub fn action_with(&self, name: &str, argument: impl Into<Value>) -> Result<(), InstrumentError> {
        self.action_ref(name)?.run(Some(&argument.into()))
    }

    /// Property names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Child names with their valid indices.
    pub fn children(&self) -> impl Iterator<Item = (&str, Vec<i64>)> {
        self.children
            .iter()
            .map(|(n, by_index)| (n.as_str(), by_index.keys().copied().collect()))
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Read every readable property, then every child, in name order.
    /// Stops at the first failure.
    pub fn snapshot(&self) -> Result<JsonValue, InstrumentError> {
        let mut out = JsonMap::new();
        for (name, cmd) in &self.commands {
            if cmd.is_readable() {
                out.insert(name.clone(), cmd.read()?.to_json());
            }
        }
        for (name, by_index) in &self.children {
            let mut entries = JsonMap::new();
            for (index, child) in by_index {
                entries.insert(index.to_string(), child.snapshot()?);
            }
            out.insert(name.clone(), JsonValue::Object(entries));
        }
        Ok(JsonValue::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::transport::LoopbackTransport;
    use crate::types::TypeCodec;

    fn supply() -> (Rc<RefCell<LoopbackTransport>>, Instrument) {
        let t = Rc::new(RefCell::new(LoopbackTransport::new()));
        let inst = Instrument::builder("supply", Connection::shared(t.clone()))
            .command(
                "unit",
                CommandSpec::read_write(
                    "UNITS?",
                    "UNITS ",
                    TypeCodec::choice(["A", "G"]).expect("codec"),
                ),
            )
            .command("voltage", CommandSpec::read_only("VOUT?", TypeCodec::float()))
            .child(
                "range",
                ChildSpec::new(0..=4)
                    .expect("child")
                    .with_command(
                        "limit",
                        CommandSpec::read_write("RANGE? {index}", "RANGE {index} ", TypeCodec::float()),
                    ),
            )
            .action("remote", ActionSpec::new("REMOTE"))
            .build()
            .expect("build");
        (t, inst)
    }

    #[test]
    fn routes_get_and_set() {
        let (t, inst) = supply();
        t.borrow_mut().push_reply("G");
        assert_eq!(inst.get("unit").expect("get"), Value::from("G"));
        inst.set("unit", "A").expect("set");
        assert_eq!(t.borrow().sent(), ["UNITS?", "UNITS A"]);
    }

    #[test]
    fn unknown_names() {
        let (_, inst) = supply();
        assert!(matches!(
            inst.get("field"),
            Err(InstrumentError::UnknownName { kind: "property", .. })
        ));
        assert!(matches!(
            inst.action("quench"),
            Err(InstrumentError::UnknownName { kind: "action", .. })
        ));
    }

    #[test]
    fn children_differ_only_by_index() {
        let (_, inst) = supply();
        let r0 = inst.child("range", 0).expect("child 0");
        let r1 = inst.child("range", 1).expect("child 1");
        assert_eq!(r0.command("limit").and_then(Command::query_string).expect("q"), "RANGE? 0");
        assert_eq!(r1.command("limit").and_then(Command::query_string).expect("q"), "RANGE? 1");
        assert!(r0.connection().same_link(inst.connection()));
    }

    #[test]
    fn invalid_index_touches_no_transport() {
        let (t, inst) = supply();
        assert!(matches!(
            inst.child("range", 7),
            Err(InstrumentError::Configuration(_))
        ));
        let spec = ChildSpec::new(0..=4).expect("child");
        assert!(matches!(
            spec.instantiate(
                "supply.range",
                inst.connection().clone(),
                &CommandConfig::default(),
                &HashMap::new(),
                7
            ),
            Err(InstrumentError::Configuration(_))
        ));
        assert!(t.borrow().sent().is_empty());
    }

    #[test]
    fn duplicate_names_rejected() {
        let t = LoopbackTransport::new();
        let r = Instrument::builder("x", Connection::new(t))
            .command("a", CommandSpec::read_only("A?", TypeCodec::float()))
            .action("a", ActionSpec::new("A"))
            .build();
        assert!(matches!(r, Err(InstrumentError::Configuration(_))));
    }

    #[test]
    fn enumerates_declarations() {
        let (_, inst) = supply();
        assert_eq!(inst.names().collect::<Vec<_>>(), ["unit", "voltage"]);
        assert_eq!(inst.actions().collect::<Vec<_>>(), ["remote"]);
        assert_eq!(
            inst.children().collect::<Vec<_>>(),
            [("range", vec![0, 1, 2, 3, 4])]
        );
    }

    #[test]
    fn snapshot_reads_in_name_order() {
        let (t, inst) = supply();
        for r in ["A", "1.5", "10", "20", "30", "40", "50"] {
            t.borrow_mut().push_reply(r);
        }
        let snap = inst.snapshot().expect("snapshot");
        assert_eq!(snap["unit"], "A");
        assert_eq!(snap["voltage"], 1.5);
        assert_eq!(snap["range"]["4"]["limit"], 50.0);
        assert_eq!(t.borrow().sent()[0], "UNITS?");
        assert_eq!(t.borrow().sent().len(), 7);
    }

    #[test]
    fn snapshot_stops_at_first_error() {
        let (t, inst) = supply();
        t.borrow_mut().push_reply("T");
        assert!(matches!(inst.snapshot(), Err(InstrumentError::Decode(_))));
        assert_eq!(t.borrow().sent().len(), 1);
    }
}
