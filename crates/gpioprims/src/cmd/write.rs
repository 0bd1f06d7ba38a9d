use serde::Serialize;

use crate::cmd::{disconnect, Target, WriteArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct WriteOutput {
    line: u8,
    level: u8,
}

pub fn run(args: WriteArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let client = target.connect()?;
    client
        .write(args.line, args.level == 1)
        .map_err(|err| client_error("write failed", err))?;
    disconnect(client)?;

    print_record(
        &WriteOutput {
            line: args.line,
            level: args.level,
        },
        format,
    );
    Ok(SUCCESS)
}
