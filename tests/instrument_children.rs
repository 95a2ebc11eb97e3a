use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use instrument_codec::catalog;
use instrument_codec::{
    ChildSpec, CommandConfig, CommandSpec, Connection, InstrumentError, LoopbackTransport,
    TypeCodec, Value,
};

#[test]
fn range_children_differ_only_in_embedded_index() {
    let link = Rc::new(RefCell::new(LoopbackTransport::new()));
    let supply = catalog::mps4g(Connection::shared(link.clone())).expect("mps4g");
    let r0 = supply.child("range", 0).expect("range 0");
    let r1 = supply.child("range", 1).expect("range 1");

    let q0 = r0.command("limit").expect("limit").query_string().expect("q");
    let q1 = r1.command("limit").expect("limit").query_string().expect("q");
    assert_eq!(q0, "RANGE? 0");
    assert_eq!(q1, "RANGE? 1");

    r1.set("limit", 25.0).expect("write");
    link.borrow_mut().push_reply("10");
    assert_eq!(r0.get("limit").expect("read"), Value::Float(10.0));
    assert_eq!(link.borrow().sent(), ["RANGE 1 25", "RANGE? 0"]);
    assert!(r0.connection().same_link(supply.connection()));
}

#[test]
fn every_declared_index_is_reachable() {
    let supply = catalog::mps4g(Connection::new(LoopbackTransport::new())).expect("mps4g");
    let (name, indices) = supply.children().next().expect("one child");
    assert_eq!(name, "range");
    assert_eq!(indices, [0, 1, 2, 3, 4]);
    for i in indices {
        let rate = supply.child("range", i).expect("child").command("rate").expect("rate");
        assert_eq!(rate.query_string().expect("q"), format!("RATE? {i}"));
    }
}

#[test]
fn index_outside_declared_set_fails_before_any_io() {
    let link = Rc::new(RefCell::new(LoopbackTransport::new()));
    let conn = Connection::shared(link.clone());
    let supply = catalog::mps4g(conn.clone()).expect("mps4g");
    assert!(matches!(
        supply.child("range", 7),
        Err(InstrumentError::Configuration(_))
    ));

    let spec = ChildSpec::new(0..=4)
        .expect("spec")
        .with_command("limit", CommandSpec::read_only("RANGE? {index}", TypeCodec::float()));
    assert!(matches!(
        spec.instantiate("supply.range", conn, &CommandConfig::new(), &HashMap::new(), 7),
        Err(InstrumentError::Configuration(_))
    ));
    assert!(link.borrow().sent().is_empty());
}

#[test]
fn unknown_child_name() {
    let supply = catalog::mps4g(Connection::new(LoopbackTransport::new())).expect("mps4g");
    assert!(matches!(
        supply.child("axis", 0),
        Err(InstrumentError::UnknownName { kind: "child", .. })
    ));
}

#[test]
fn child_inherits_parent_framing() {
    let link = Rc::new(RefCell::new(LoopbackTransport::new()));
    let spec = ChildSpec::new([1, 2])
        .expect("spec")
        .with_config(CommandConfig::new().with_program_header_prefix("AX{index}:"))
        .with_command("pos", CommandSpec::read_only("POS?", TypeCodec::float()));
    let inst = instrument_codec::Instrument::builder("stage", Connection::shared(link))
        .config(CommandConfig::new().with_address("{address}").with_program_header_separator("\r"))
        .parameter("address", "5")
        .child("axis", spec)
        .build()
        .expect("build");
    let q = inst
        .child("axis", 2)
        .expect("axis")
        .command("pos")
        .expect("pos")
        .query_string()
        .expect("q");
    assert_eq!(q, "5AX2:POS?\r");
}
