use serde::Serialize;

use crate::cmd::{disconnect, Target};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct TickOutput {
    tick: u32,
}

pub fn run(target: &Target, format: OutputFormat) -> CliResult<i32> {
    let client = target.connect()?;
    let tick = client
        .get_current_tick()
        .map_err(|err| client_error("tick failed", err))?;
    disconnect(client)?;

    print_record(&TickOutput { tick }, format);
    Ok(SUCCESS)
}
