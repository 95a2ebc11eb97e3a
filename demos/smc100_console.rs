use std::cell::RefCell;
use std::env;
use std::rc::Rc;

use instrument_codec::{catalog, init_defaults, Connection};
use instrument_codec_mock::{SimLink, Smc100Simulator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_defaults()?;
    // INSTRUMENT_LOG_WIRE=1 RUST_LOG=debug shows every message on the link
    env_logger::init();

    let address: u8 = env::var("SMC_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    let target: f64 = env::var("SMC_TARGET")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(12.5);

    let link = Rc::new(RefCell::new(SimLink::new(Smc100Simulator::new(address))));
    let axis = catalog::smc100(Connection::shared(link.clone()), address)?;

    println!("state: {}", axis.get("state")?);
    axis.action("reference")?;
    // first poll reports HOMING, the next one READY
    for _ in 0..2 {
        println!("state: {}", axis.get("state")?);
    }

    println!("moving to {target}");
    axis.set("position", target)?;
    println!("state: {}", axis.get("state")?);
    println!("position: {}", axis.get("position")?);
    println!("error code: {}", axis.get("errorcode")?);

    println!("{}", serde_json::to_string_pretty(&axis.snapshot()?)?);
    println!("messages sent: {:?}", link.borrow().sent());
    Ok(())
}
