//! tracing-subscriber setup for the volprobe binary.
//!
//! Driven by the `[general]` section of `HarnessConfig`. Logs go to stderr
//! so that `--output json` keeps stdout machine-readable.

use anyhow::{Context, Result, anyhow, bail};
use tracing_subscriber::EnvFilter;

use volprobe_core::config::GeneralConfig;

/// Install the global subscriber. Call once, before the first log line.
///
/// `RUST_LOG` wins over `config.log_level`. `config.log_format` is either
/// `"json"` (one object per line, for CI collectors) or `"pretty"`.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log level '{}'", config.log_level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.log_format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };
    installed.map_err(|e| anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).expect_err("xml is not a log format");
        assert!(err.to_string().contains("xml"));
    }
}
