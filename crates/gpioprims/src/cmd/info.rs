use serde::Serialize;

use crate::cmd::{disconnect, Target};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    addr: String,
    daemon_version: u32,
    hardware_revision: String,
    notify_handle: u32,
    tick: u32,
}

pub fn run(target: &Target, format: OutputFormat) -> CliResult<i32> {
    let client = target.connect()?;
    let daemon_version = client
        .get_pigpio_version()
        .map_err(|err| client_error("version query failed", err))?;
    let revision = client
        .get_hardware_revision()
        .map_err(|err| client_error("revision query failed", err))?;
    let tick = client
        .get_current_tick()
        .map_err(|err| client_error("tick failed", err))?;

    let out = InfoOutput {
        addr: client.config().addr(),
        daemon_version,
        hardware_revision: format!("{revision:#x}"),
        notify_handle: client.notification_handle(),
        tick,
    };
    disconnect(client)?;

    print_record(&out, format);
    Ok(SUCCESS)
}
