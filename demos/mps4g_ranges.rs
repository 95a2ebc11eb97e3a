use std::cell::RefCell;
use std::rc::Rc;

use instrument_codec::{catalog, init_defaults, Connection};
use instrument_codec_mock::{Mps4gSimulator, SimLink};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_defaults()?;
    env_logger::init();

    let link = Rc::new(RefCell::new(SimLink::new(Mps4gSimulator::new())));
    let psu = catalog::mps4g(Connection::shared(link))?;

    psu.action("remote")?;
    psu.set("unit", "A")?;
    psu.set("upper_limit", 45.0)?;

    // sweep rates fall off as the field approaches the magnet limit
    let rates = [0.2, 0.15, 0.1, 0.05, 0.01];
    for (name, indices) in psu.children() {
        for index in indices {
            let range = psu.child(name, index)?;
            let rate = usize::try_from(index).ok().and_then(|i| rates.get(i)).copied();
            if let Some(rate) = rate {
                range.set("rate", rate)?;
            }
            println!(
                "{name}[{index}]: limit {} rate {}",
                range.get("limit")?,
                range.get("rate")?
            );
        }
    }

    println!("output current: {}", psu.get("output_current")?);
    psu.action("local")?;
    Ok(())
}
