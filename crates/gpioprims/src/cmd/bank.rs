use serde::Serialize;

use crate::cmd::{disconnect, BankArgs, BankCommand, Target};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct BankOutput {
    op: &'static str,
    bits: String,
    high: Vec<u8>,
}

impl BankOutput {
    fn new(op: &'static str, bits: u32) -> Self {
        Self {
            op,
            bits: format!("{bits:#010x}"),
            high: (0u8..32).filter(|&line| bits & (1u32 << line) != 0).collect(),
        }
    }
}

pub fn run(args: BankArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let client = target.connect()?;
    let out = match args.command {
        BankCommand::Read => {
            let bits = client
                .read_bank_1()
                .map_err(|err| client_error("bank read failed", err))?;
            BankOutput::new("read", bits)
        }
        BankCommand::Set { bits } => {
            client
                .set_bank_1(bits)
                .map_err(|err| client_error("bank set failed", err))?;
            BankOutput::new("set", bits)
        }
        BankCommand::Clear { bits } => {
            client
                .clear_bank_1(bits)
                .map_err(|err| client_error("bank clear failed", err))?;
            BankOutput::new("clear", bits)
        }
    };
    disconnect(client)?;

    print_record(&out, format);
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_output_lists_high_lines() {
        let out = BankOutput::new("read", 0x8000_0011);
        assert_eq!(out.bits, "0x80000011");
        assert_eq!(out.high, vec![0, 4, 31]);
    }
}
