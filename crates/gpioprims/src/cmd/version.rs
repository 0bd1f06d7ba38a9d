use gpioprims_transport::{DEFAULT_HOST, DEFAULT_PORT};
use gpioprims_wire::{COMMAND_HEADER_SIZE, NOTIFICATION_SIZE, RESPONSE_SIZE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("gpioprims {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!("platform: {}/{}", std::env::consts::OS, std::env::consts::ARCH);
    println!("default daemon: {DEFAULT_HOST}:{DEFAULT_PORT}");
    println!(
        "wire: command {COMMAND_HEADER_SIZE}B, response {RESPONSE_SIZE}B, \
         notification {NOTIFICATION_SIZE}B"
    );
    println!("env: PIGPIO_ADDR, PIGPIO_PORT, RUST_LOG");

    Ok(SUCCESS)
}
