use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Mutex;

use instrument_codec::{catalog, config, Connection, InstrumentError, LoopbackTransport, Value};

struct Capture(Mutex<Vec<(log::Level, String, String)>>);

impl log::Log for Capture {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut records) = self.0.lock() {
            records.push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

fn captured() -> Vec<(log::Level, String, String)> {
    CAPTURE.0.lock().map(|r| r.clone()).unwrap_or_default()
}

// Single test in this binary: the runtime config is read once, on first use.
#[test]
fn wire_traffic_and_rejected_replies_reach_the_log_facade() {
    std::env::set_var("INSTRUMENT_LOG_WIRE", "1");
    std::env::set_var("INSTRUMENT_DUMP_ON_ERROR", "1");
    log::set_logger(&CAPTURE).expect("logger");
    log::set_max_level(log::LevelFilter::Trace);
    assert!(config::config().log_wire);
    assert!(config::config().dump_on_error);

    let link = Rc::new(RefCell::new(LoopbackTransport::with_replies([
        "1TP2.5", "2TP9",
    ])));
    let axis = catalog::smc100(Connection::shared(link), 1).expect("smc100");
    assert_eq!(axis.get("position").expect("read"), Value::Float(2.5));
    assert!(matches!(
        axis.get("position"),
        Err(InstrumentError::Protocol(_))
    ));

    let records = captured();
    let wire: Vec<&str> = records
        .iter()
        .filter(|(level, target, _)| {
            *level == log::Level::Debug && target.starts_with("instrument_codec")
        })
        .map(|(_, _, msg)| msg.as_str())
        .collect();
    assert!(wire.iter().any(|m| m.contains("send") && m.contains("1TP")), "{wire:?}");
    assert!(wire.iter().any(|m| m.contains("receive") && m.contains("1TP2.5")), "{wire:?}");

    let rejected: Vec<&str> = records
        .iter()
        .filter(|(level, _, _)| *level == log::Level::Warn)
        .map(|(_, _, msg)| msg.as_str())
        .collect();
    assert_eq!(rejected.len(), 1, "{records:?}");
    assert!(rejected[0].contains("reply rejected"));
    assert!(rejected[0].contains("2TP9"));
}
