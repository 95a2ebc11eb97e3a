use std::fs;

const DEFINITIONS: &[&str] = &["src/instruments/smc100.toml", "src/instruments/mps4g.toml"];

fn main() {
    // The built-in definitions are embedded with include_str!; reject files
    // that are not even well-formed TOML at build time. Semantic validation
    // happens in the crate's own tests.
    for path in DEFINITIONS {
        println!("cargo:rerun-if-changed={path}");
        let src = fs::read_to_string(path).unwrap_or_else(|e| panic!("read {path}: {e}"));
        if let Err(e) = toml::from_str::<toml::Table>(&src) {
            panic!("{path} is not valid TOML: {e}");
        }
    }
}
