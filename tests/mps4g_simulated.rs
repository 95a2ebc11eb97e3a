use std::cell::RefCell;
use std::rc::Rc;

use instrument_codec::catalog;
use instrument_codec::{Connection, Instrument, InstrumentError, Value};
use instrument_codec_mock::{Mps4gSimulator, Mps4gState, SimLink};

type Link = Rc<RefCell<SimLink<Mps4gSimulator>>>;

fn supply(state: Mps4gState) -> (Link, Instrument) {
    let link = Rc::new(RefCell::new(SimLink::new(Mps4gSimulator::with_state(state))));
    let inst = catalog::mps4g(Connection::shared(link.clone())).expect("mps4g");
    (link, inst)
}

#[test]
fn current_reply_carries_its_unit() {
    let (_, psu) = supply(Mps4gState {
        output_current: 12.5,
        ..Mps4gState::default()
    });
    assert_eq!(
        psu.get("output_current").expect("IOUT?"),
        Value::Tuple(vec![Value::Float(12.5), Value::from("A")])
    );
    psu.set("unit", "G").expect("UNITS G");
    assert_eq!(psu.get("unit").expect("UNITS?"), Value::from("G"));
    assert_eq!(
        psu.get("output_current").expect("IOUT?"),
        Value::Tuple(vec![Value::Float(12.5), Value::from("G")])
    );
}

#[test]
fn limits_written_as_plain_numbers() {
    let (link, psu) = supply(Mps4gState::default());
    psu.set("upper_limit", 40.5).expect("ULIM");
    psu.set("lower_limit", -3.0).expect("LLIM");
    assert_eq!(
        psu.get("upper_limit").expect("ULIM?"),
        Value::Tuple(vec![Value::Float(40.5), Value::from("A")])
    );
    let state = link.borrow().simulator().state().clone();
    assert_eq!(state.upper_limit, 40.5);
    assert_eq!(state.lower_limit, -3.0);
}

#[test]
fn switch_heater_maps_on_off() {
    let (link, psu) = supply(Mps4gState::default());
    assert_eq!(psu.get("switch_heater").expect("PSHTR?"), Value::Bool(false));
    psu.set("switch_heater", true).expect("PSHTR ON");
    assert_eq!(link.borrow().sent().last().map(String::as_str), Some("PSHTR ON"));
    assert_eq!(psu.get("switch_heater").expect("PSHTR?"), Value::Bool(true));
}

#[test]
fn name_length_and_unit_domain_checked_locally() {
    let (link, psu) = supply(Mps4gState::default());
    psu.set("name", "magnet A").expect("NAME");
    assert_eq!(psu.get("name").expect("NAME?"), Value::from("magnet A"));
    let sent = link.borrow().sent().len();

    assert!(matches!(
        psu.set("name", "a name far too long for the panel"),
        Err(InstrumentError::Validation(_))
    ));
    assert!(matches!(
        psu.set("unit", "T"),
        Err(InstrumentError::Validation(_))
    ));
    assert!(matches!(
        psu.set("voltage_limit", 10.5),
        Err(InstrumentError::Validation(_))
    ));
    assert_eq!(link.borrow().sent().len(), sent);
}

#[test]
fn read_only_properties_refuse_writes() {
    let (_, psu) = supply(Mps4gState::default());
    assert!(matches!(
        psu.set("output_voltage", 1.0),
        Err(InstrumentError::NotWritable(_))
    ));
    assert!(matches!(
        psu.set("magnet_voltage", 1.0),
        Err(InstrumentError::NotWritable(_))
    ));
}

#[test]
fn sweep_ranges_are_independent() {
    let (link, psu) = supply(Mps4gState::default());
    psu.child("range", 2)
        .expect("range 2")
        .set("rate", 0.25)
        .expect("RATE");
    psu.child("range", 4)
        .expect("range 4")
        .set("limit", 60.0)
        .expect("RANGE");
    let state = link.borrow().simulator().state().clone();
    assert_eq!(state.range_rates, [0.1, 0.1, 0.25, 0.1, 0.1]);
    assert_eq!(state.range_limits[4], 60.0);
    assert_eq!(
        psu.child("range", 0).expect("range 0").get("limit").expect("RANGE? 0"),
        Value::Float(10.0)
    );
    assert!(matches!(
        psu.child("range", 5),
        Err(InstrumentError::Configuration(_))
    ));
}

#[test]
fn front_panel_actions() {
    let (link, psu) = supply(Mps4gState {
        error_mode: true,
        quench: true,
        ..Mps4gState::default()
    });
    assert_eq!(psu.get("error").expect("ERROR?"), Value::Bool(true));
    psu.action("clear").expect("*CLS");
    assert_eq!(psu.get("error").expect("ERROR?"), Value::Bool(false));

    psu.action("lock").expect("RWLOCK");
    assert!(link.borrow().simulator().state().locked);
    psu.action("remote").expect("REMOTE");
    assert!(!link.borrow().simulator().state().locked);
    psu.action("quench_reset").expect("QRESET");
    psu.action("local").expect("LOCAL");
    let state = link.borrow().simulator().state().clone();
    assert!(!state.quench);
    assert!(!state.remote);
}

#[test]
fn snapshot_covers_properties_and_ranges() {
    let (_, psu) = supply(Mps4gState {
        name: "main".to_string(),
        output_voltage: 1.25,
        ..Mps4gState::default()
    });
    let snap = psu.snapshot().expect("snapshot");
    assert_eq!(snap["name"], "main");
    assert_eq!(snap["output_voltage"], 1.25);
    assert_eq!(snap["output_current"][1], "A");
    assert_eq!(snap["range"]["3"]["limit"], 40.0);
    assert_eq!(snap["range"]["0"]["rate"], 0.1);
}
