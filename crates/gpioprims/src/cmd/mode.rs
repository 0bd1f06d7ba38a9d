use gpioprims_client::Mode;
use serde::Serialize;

use crate::cmd::{disconnect, ModeArgs, Target};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct ModeOutput {
    line: u8,
    mode: String,
    code: i32,
}

pub fn run(args: ModeArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let requested = args
        .mode
        .as_deref()
        .map(str::parse::<Mode>)
        .transpose()
        .map_err(|err| CliError::new(USAGE, err.to_string()))?;

    let client = target.connect()?;
    let code = match requested {
        Some(mode) => {
            client
                .set_mode(args.line, mode)
                .map_err(|err| client_error("set mode failed", err))?;
            mode.code() as i32
        }
        None => client
            .get_mode(args.line)
            .map_err(|err| client_error("get mode failed", err))?,
    };
    disconnect(client)?;

    let mode = Mode::from_code(code)
        .map(|mode| mode.as_str().to_string())
        .unwrap_or_else(|| format!("unknown({code})"));
    print_record(
        &ModeOutput {
            line: args.line,
            mode,
            code,
        },
        format,
    );
    Ok(SUCCESS)
}
