use serde::Serialize;

use crate::cmd::{disconnect, ReadArgs, Target};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct ReadOutput {
    line: u8,
    level: i32,
}

pub fn run(args: ReadArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let client = target.connect()?;
    let level = client
        .read(args.line)
        .map_err(|err| client_error("read failed", err))?;
    disconnect(client)?;

    print_record(
        &ReadOutput {
            line: args.line,
            level,
        },
        format,
    );
    Ok(SUCCESS)
}
