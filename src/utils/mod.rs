//! Small shared helpers: environment lookups with the conventions the
//! framework tools have always used, and the common logging setup.

use std::env;

/// Initialize tracing for a binary. Verbosity counts map to levels:
/// `0 → info`, `1 → debug`, anything more → trace. `RUST_LOG` overrides.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("ula_tools={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Read a string environment variable, falling back when unset.
pub fn env_string(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

/// Read a boolean environment variable.
///
/// A variable that is set but empty counts as `true`. Integer values are
/// truthy when positive. Anything else goes through `bool::from_str`, and
/// unparsable values fall back.
pub fn env_bool(key: &str, fallback: bool) -> bool {
    let value = match env::var(key) {
        Ok(v) => v,
        Err(_) => return fallback,
    };

    if value.is_empty() {
        return true;
    }

    if let Ok(n) = value.parse::<i64>() {
        return n > 0;
    }

    value.parse::<bool>().unwrap_or(fallback)
}
