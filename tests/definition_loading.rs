use std::collections::HashMap;
use std::fs;

use instrument_codec::catalog::{self, DefinitionRegistry};
use instrument_codec::{Connection, InstrumentDefinition, InstrumentError, LoopbackTransport, Value};

const SENSOR: &str = r#"
[instrument]
name = "Sensor"
description = "temperature sensor"

[parameters]
channel = "A"

[config]
program_header_separator = "\n"

[[command]]
name = "temperature"
query = "KRDG? {channel}"
type = "float"

[[command]]
name = "heater"
query = "HTR?"
write = "HTR "
type = { enum = { labels = ["off", "low", "high"] } }
"#;

#[test]
fn loads_a_definition_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sensor.toml");
    fs::write(&path, SENSOR).expect("write");

    let def = InstrumentDefinition::from_path(&path).expect("load");
    assert_eq!(def.name(), "Sensor");
    assert_eq!(def.description(), "temperature sensor");

    let params: HashMap<String, String> = [("channel".to_string(), "B".to_string())].into();
    let mut t = LoopbackTransport::new();
    t.push_reply("+77.35");
    let sensor = def.instantiate(Connection::new(t), &params).expect("instantiate");
    assert_eq!(sensor.get("temperature").expect("read"), Value::Float(77.35));
    assert_eq!(
        sensor.command("heater").and_then(|c| c.write_string(&Value::from("low"))).expect("w"),
        "HTR 1\n"
    );
}

#[test]
fn errors_name_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[instrument]\nname = \"x\"\n[[command]]\nname = \n").expect("write");
    match InstrumentDefinition::from_path(&path) {
        Err(InstrumentError::Configuration(m)) => assert!(m.contains("broken.toml"), "{m}"),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert!(matches!(
        InstrumentDefinition::from_path(&dir.path().join("missing.toml")),
        Err(InstrumentError::Io(_))
    ));
}

#[test]
fn registered_definitions_are_found_by_lookup() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("sensor.toml"), SENSOR).expect("write");
    fs::write(dir.path().join("notes.txt"), "not a definition").expect("write");

    DefinitionRegistry::from_dir(dir.path())
        .expect("from_dir")
        .register_or_merge()
        .expect("register");

    let def = catalog::lookup("SENSOR").expect("lookup");
    assert_eq!(def.name(), "Sensor");
    assert!(catalog::registered("sensor").is_some());
    assert!(matches!(
        catalog::lookup("ips120"),
        Err(InstrumentError::UnknownName { kind: "instrument", .. })
    ));
}

#[test]
fn merged_definitions_replace_by_name() {
    let custom = SENSOR.replace("KRDG? {channel}", "TEMP? {channel}").replace("Sensor", "Sensor2");
    let def = InstrumentDefinition::from_str(&custom).expect("parse");
    DefinitionRegistry::new()
        .with(def)
        .register_or_merge()
        .expect("first");
    let again = InstrumentDefinition::from_str(&custom.replace("TEMP?", "T?")).expect("parse");
    DefinitionRegistry::new()
        .with(again)
        .register_or_merge()
        .expect("second");

    let sensor = catalog::lookup("sensor2")
        .expect("lookup")
        .instantiate(Connection::new(LoopbackTransport::new()), &HashMap::new())
        .expect("instantiate");
    assert_eq!(
        sensor.command("temperature").and_then(|c| c.query_string()).expect("q"),
        "T? A\n"
    );
}

#[test]
fn builtins_are_listed_and_loadable() {
    instrument_codec::init_defaults().expect("defaults");
    let names: Vec<_> = catalog::builtin_names().collect();
    assert_eq!(names, ["smc100", "mps4g"]);
    for name in names {
        let def = catalog::lookup(name).expect("lookup");
        assert!(!def.description().is_empty());
    }
    assert_eq!(
        catalog::lookup("smc100").expect("smc100").parameters().get("address").map(String::as_str),
        Some("1")
    );
}
