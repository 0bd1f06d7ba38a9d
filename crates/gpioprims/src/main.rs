mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use gpioprims_transport::{DEFAULT_HOST, DEFAULT_PORT};

use crate::cmd::{Command, Target};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gpioprims", version, about = "Remote GPIO daemon client")]
struct Cli {
    /// Daemon host name or address.
    #[arg(long, env = "PIGPIO_ADDR", default_value = DEFAULT_HOST, global = true)]
    host: String,

    /// Daemon port.
    #[arg(long, env = "PIGPIO_PORT", default_value_t = DEFAULT_PORT, global = true)]
    port: u16,

    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION", default_value = "5s", global = true)]
    connect_timeout: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let target = Target {
        host: cli.host,
        port: cli.port,
        connect_timeout: cli.connect_timeout,
    };
    let result = cmd::run(cli.command, &target, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
