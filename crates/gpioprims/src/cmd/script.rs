use std::fs;
use std::path::Path;

use gpioprims_client::ScriptState;
use serde::Serialize;

use crate::cmd::{disconnect, ScriptArgs, ScriptCommand, Target};
use crate::exit::{client_error, io_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct ScriptOutput {
    op: &'static str,
    id: i32,
}

#[derive(Serialize)]
struct StatusOutput {
    id: u32,
    status: String,
    code: i32,
    params: Vec<i32>,
}

impl StatusOutput {
    fn new(id: u32, state: ScriptState) -> Self {
        let status = state
            .status()
            .map(|status| status.as_str().to_string())
            .unwrap_or_else(|| format!("unknown({})", state.code));
        Self {
            id,
            status,
            code: state.code,
            params: state.params,
        }
    }
}

pub fn run(args: ScriptArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let text = match &args.command {
        ScriptCommand::Store { text, file } => {
            Some(resolve_text(text.as_deref(), file.as_deref())?)
        }
        _ => None,
    };

    let client = target.connect()?;
    match args.command {
        ScriptCommand::Store { .. } => {
            let id = client
                .store_script(text.as_deref().unwrap_or_default())
                .map_err(|err| client_error("script store failed", err))?;
            disconnect(client)?;
            print_record(&ScriptOutput { op: "store", id }, format);
        }
        ScriptCommand::Run { id, params } => {
            client
                .run_script(id, &params)
                .map_err(|err| client_error("script run failed", err))?;
            disconnect(client)?;
            print_record(&ScriptOutput { op: "run", id: id as i32 }, format);
        }
        ScriptCommand::Status { id } => {
            let state = client
                .script_status(id)
                .map_err(|err| client_error("script status failed", err))?;
            disconnect(client)?;
            print_record(&StatusOutput::new(id, state), format);
        }
        ScriptCommand::Stop { id } => {
            client
                .stop_script(id)
                .map_err(|err| client_error("script stop failed", err))?;
            disconnect(client)?;
            print_record(&ScriptOutput { op: "stop", id: id as i32 }, format);
        }
        ScriptCommand::Delete { id } => {
            client
                .delete_script(id)
                .map_err(|err| client_error("script delete failed", err))?;
            disconnect(client)?;
            print_record(&ScriptOutput { op: "delete", id: id as i32 }, format);
        }
    }
    Ok(SUCCESS)
}

fn resolve_text(text: Option<&str>, file: Option<&Path>) -> CliResult<String> {
    if let Some(text) = text {
        return Ok(text.to_string());
    }
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        None => Ok(String::new()),
    }
}
