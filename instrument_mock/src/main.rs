//! Interactive console over a simulated instrument.
//!
//! Each stdin line is either a raw wire message (sent as-is, reply printed)
//! or a typed request routed through the codec layer:
//!
//! ```text
//! :get position        :set position 12.5
//! :do reference        :do load_esp 2
//! :child range 1 get limit
//! :snapshot            :names
//! ```

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use instrument_codec::{catalog, Connection, Instrument, Transport, Value};
use instrument_codec_mock::{
    Mps4gSimulator, Mps4gState, SimLink, Simulator, Smc100Simulator, Smc100State,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    Smc100,
    Mps4g,
}

#[derive(Parser, Debug)]
#[command(name = "instrument-mock")]
#[command(about = "Console over a simulated SMC100 or MPS4G instrument")]
#[command(version)]
struct Args {
    /// Instrument model to simulate
    #[arg(long, value_enum, default_value = "smc100")]
    model: Model,

    /// SMC100 controller address on the RS-485 link
    #[arg(long, default_value_t = 1)]
    address: u8,

    /// Initial simulator state (TOML)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Print the simulator state as JSON on exit
    #[arg(long)]
    dump_state: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();
    let args = Args::parse();
    tracing::info!(?args, "starting simulator console");

    match args.model {
        Model::Smc100 => {
            let state: Smc100State = load_state(args.state.as_ref())?;
            let link = Rc::new(RefCell::new(SimLink::new(Smc100Simulator::with_state(
                args.address,
                state,
            ))));
            let inst = catalog::smc100(Connection::shared(link.clone()), args.address)?;
            run(&link, &inst)?;
            if args.dump_state {
                println!("{}", serde_json::to_string_pretty(link.borrow().simulator().state())?);
            }
        }
        Model::Mps4g => {
            let state: Mps4gState = load_state(args.state.as_ref())?;
            let link = Rc::new(RefCell::new(SimLink::new(Mps4gSimulator::with_state(state))));
            let inst = catalog::mps4g(Connection::shared(link.clone()))?;
            run(&link, &inst)?;
            if args.dump_state {
                println!("{}", serde_json::to_string_pretty(link.borrow().simulator().state())?);
            }
        }
    }
    Ok(())
}

fn load_state<T: serde::de::DeserializeOwned + Default>(path: Option<&PathBuf>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

fn run<S: Simulator>(link: &Rc<RefCell<SimLink<S>>>, inst: &Instrument) -> Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(request) = line.strip_prefix(':') {
            match typed(inst, request) {
                Ok(Some(reply)) => writeln!(out, "{reply}")?,
                Ok(None) => writeln!(out, "ok")?,
                Err(e) => writeln!(out, "error: {e:#}")?,
            }
            continue;
        }
        let mut l = link.borrow_mut();
        l.send(line)?;
        match l.next_reply() {
            Some(reply) => writeln!(out, "{reply}")?,
            None => writeln!(out, "(no reply)")?,
        }
    }
    Ok(())
}

fn typed(inst: &Instrument, request: &str) -> Result<Option<String>> {
    let words: Vec<&str> = request.split_whitespace().collect();
    match words.as_slice() {
        ["get", name] => Ok(Some(inst.get(name)?.to_string())),
        ["set", name, rest @ ..] if !rest.is_empty() => {
            inst.set(name, parse_value(&rest.join(" ")))?;
            Ok(None)
        }
        ["do", name] => {
            inst.action(name)?;
            Ok(None)
        }
        ["do", name, arg] => {
            inst.action_with(name, parse_value(arg))?;
            Ok(None)
        }
        ["child", name, index, rest @ ..] => {
            let index: i64 = index.parse().context("child index")?;
            typed(inst.child(name, index)?, &rest.join(" "))
        }
        ["snapshot"] => Ok(Some(serde_json::to_string_pretty(&inst.snapshot()?)?)),
        ["names"] => Ok(Some(inst.names().collect::<Vec<_>>().join(" "))),
        _ => bail!("unrecognised request '{request}'"),
    }
}

// Most specific interpretation first.
fn parse_value(s: &str) -> Value {
    if let Ok(b) = s.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    Value::from(s)
}
