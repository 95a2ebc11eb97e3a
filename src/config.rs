use once_cell::sync::Lazy;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Config {
    /// Log every outgoing message and every reply (`INSTRUMENT_LOG_WIRE=1`).
    pub log_wire: bool,
    /// Log the raw reply when framing or decoding fails (`INSTRUMENT_DUMP_ON_ERROR=1`).
    pub dump_on_error: bool,
    /// Directory searched for `<name>.toml` definitions (`INSTRUMENT_DEFINE_DIR`).
    pub define_dir: Option<PathBuf>,
}

impl Config {
    fn from_env() -> Self {
        let log_wire = std::env::var("INSTRUMENT_LOG_WIRE")
            .map(|v| v == "1")
            .unwrap_or(false);
        let dump_on_error = std::env::var("INSTRUMENT_DUMP_ON_ERROR")
            .map(|v| v == "1")
            .unwrap_or(false);
        let define_dir = std::env::var_os("INSTRUMENT_DEFINE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(exe_define_dir);
        Self {
            log_wire,
            dump_on_error,
            define_dir,
        }
    }
}

// `define/` next to the running executable, if present.
fn exe_define_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?.join("define");
    dir.is_dir().then_some(dir)
}

/// Global config loaded once from environment at first access.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Convenience accessor
pub fn config() -> &'static Config {
    &GLOBAL_CONFIG
}
