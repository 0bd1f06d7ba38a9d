use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Crates whose events `--log-level` controls. Everything else stays at
/// `warn` unless `RUST_LOG` says otherwise.
const LOG_TARGETS: [&str; 4] = [
    "gpioprims",
    "gpioprims_client",
    "gpioprims_wire",
    "gpioprims_transport",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directives for `level` on the gpioprims crates.
pub fn directives(level: LogLevel) -> String {
    let level = level.as_str();
    let mut out = String::from("warn");
    for target in LOG_TARGETS {
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

/// Install the stderr subscriber. A valid `RUST_LOG` replaces the
/// `--log-level` directives, e.g. `RUST_LOG=gpioprims_client::notify=trace`
/// to see keepalives without the per-command traffic.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(level)));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().flatten_event(true).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_level_to_gpioprims_crates() {
        assert_eq!(
            directives(LogLevel::Debug),
            "warn,gpioprims=debug,gpioprims_client=debug,gpioprims_wire=debug,\
             gpioprims_transport=debug"
        );
    }

    #[test]
    fn directives_parse_as_env_filter() {
        for level in [LogLevel::Error, LogLevel::Trace] {
            assert!(EnvFilter::try_new(directives(level)).is_ok());
        }
    }
}
