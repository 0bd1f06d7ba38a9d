use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use gpioprims_client::{Client, ClientConfig, Edge};

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod bank;
pub mod info;
pub mod mode;
pub mod read;
pub mod script;
pub mod tick;
pub mod version;
pub mod watch;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read the level of a line.
    Read(ReadArgs),
    /// Drive a line high or low.
    Write(WriteArgs),
    /// Show or set the mode of a line.
    Mode(ModeArgs),
    /// Read, set or clear lines 0-31 at once.
    Bank(BankArgs),
    /// Print level changes on lines until interrupted.
    Watch(WatchArgs),
    /// Manage daemon scripts.
    Script(ScriptArgs),
    /// Print the daemon's current tick.
    Tick,
    /// Print daemon version and hardware revision.
    Info,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, target: &Target, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => read::run(args, target, format),
        Command::Write(args) => write::run(args, target, format),
        Command::Mode(args) => mode::run(args, target, format),
        Command::Bank(args) => bank::run(args, target, format),
        Command::Watch(args) => watch::run(args, target, format),
        Command::Script(args) => script::run(args, target, format),
        Command::Tick => tick::run(target, format),
        Command::Info => info::run(target, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to reach the daemon.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub connect_timeout: String,
}

impl Target {
    pub fn config(&self) -> CliResult<ClientConfig> {
        let mut config = ClientConfig::new(self.host.clone(), self.port);
        config.connect_timeout = Some(parse_duration(&self.connect_timeout)?);
        Ok(config)
    }

    pub fn connect(&self) -> CliResult<Client> {
        Client::connect(self.config()?).map_err(|err| client_error("connect failed", err))
    }
}

/// Close `client`, reporting teardown failures.
pub fn disconnect(client: Client) -> CliResult<()> {
    client
        .close()
        .map_err(|err| client_error("disconnect failed", err))
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Line number.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=53))]
    pub line: u8,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Line number.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=53))]
    pub line: u8,
    /// Level to drive (0 or 1).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    pub level: u8,
}

#[derive(Args, Debug)]
pub struct ModeArgs {
    /// Line number.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=53))]
    pub line: u8,
    /// New mode (input, output, alt0-alt5). Omit to show the current mode.
    pub mode: Option<String>,
}

#[derive(Args, Debug)]
pub struct BankArgs {
    #[command(subcommand)]
    pub command: BankCommand,
}

#[derive(Subcommand, Debug)]
pub enum BankCommand {
    /// Read the levels of lines 0-31.
    Read,
    /// Drive the lines in BITS high.
    Set {
        /// Line bit mask (decimal, 0x hex or 0b binary).
        #[arg(value_parser = parse_bits)]
        bits: u32,
    },
    /// Drive the lines in BITS low.
    Clear {
        /// Line bit mask (decimal, 0x hex or 0b binary).
        #[arg(value_parser = parse_bits)]
        bits: u32,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum EdgeArg {
    Rising,
    Falling,
    Either,
}

impl From<EdgeArg> for Edge {
    fn from(edge: EdgeArg) -> Self {
        match edge {
            EdgeArg::Rising => Edge::Rising,
            EdgeArg::Falling => Edge::Falling,
            EdgeArg::Either => Edge::Either,
        }
    }
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Lines to watch (comma-separated, 0-31).
    #[arg(
        required = true,
        value_delimiter = ',',
        value_parser = clap::value_parser!(u8).range(0..=31)
    )]
    pub lines: Vec<u8>,
    /// Transitions to report.
    #[arg(long, default_value = "either")]
    pub edge: EdgeArg,
    /// Drop events closer than this many milliseconds to the last reported one.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ScriptArgs {
    #[command(subcommand)]
    pub command: ScriptCommand,
}

#[derive(Subcommand, Debug)]
pub enum ScriptCommand {
    /// Store a script and print its id.
    Store {
        /// Script text.
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        text: Option<String>,
        /// Read the script text from a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Run a stored script.
    Run {
        /// Script id.
        id: u32,
        /// Up to ten script parameters.
        #[arg(num_args = 0..=10)]
        params: Vec<u32>,
    },
    /// Show run status and parameters of a script.
    Status {
        /// Script id.
        id: u32,
    },
    /// Stop a running script.
    Stop {
        /// Script id.
        id: u32,
    },
    /// Delete a stored script.
    Delete {
        /// Script id.
        id: u32,
    },
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_bits(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = if let Some(hex) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = input.strip_prefix("0b").or_else(|| input.strip_prefix("0B")) {
        u32::from_str_radix(bin, 2)
    } else {
        input.parse()
    };
    parsed.map_err(|_| format!("invalid bit mask: {input}"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_bits_accepts_radix_prefixes() {
        assert_eq!(parse_bits("48").unwrap(), 48);
        assert_eq!(parse_bits("0x30").unwrap(), 48);
        assert_eq!(parse_bits("0b110000").unwrap(), 48);
        assert!(parse_bits("0xZZ").is_err());
        assert!(parse_bits("-1").is_err());
    }

    #[test]
    fn target_builds_client_config() {
        let target = Target {
            host: "pi.local".to_string(),
            port: 8889,
            connect_timeout: "250ms".to_string(),
        };
        let config = target.config().unwrap();
        assert_eq!(config.addr(), "pi.local:8889");
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(250)));
    }
}
