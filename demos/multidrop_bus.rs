use std::cell::RefCell;
use std::rc::Rc;

use instrument_codec::{catalog, init_defaults, Connection};
use instrument_codec_mock::{MultiDropBus, SimLink};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_defaults()?;
    env_logger::init();

    let bus = MultiDropBus::new([1, 2, 3]);
    let addresses: Vec<u8> = bus.addresses().collect();
    let link = Rc::new(RefCell::new(SimLink::new(bus)));
    let conn = Connection::shared(link.clone());

    let axes = addresses
        .iter()
        .map(|a| catalog::smc100(conn.clone(), *a))
        .collect::<Result<Vec<_>, _>>()?;

    for axis in &axes {
        axis.action("reference")?;
    }
    for (axis, target) in axes.iter().zip([5.0, 10.0, 15.0]) {
        axis.get("state")?;
        axis.set("position", target)?;
    }
    for (address, axis) in addresses.iter().zip(&axes) {
        println!(
            "axis {address}: position {} state {}",
            axis.get("position")?,
            axis.get("state")?
        );
    }
    println!("{} messages on the shared port", link.borrow().sent().len());
    Ok(())
}
