//! Typed helpers over [`Client::execute`].
//!
//! Each helper sends one command and applies the client's
//! [`ErrorMode`](crate::ErrorMode) to the result, so with
//! `ErrorMode::ReturnCode` the daemon's negative codes come back as plain
//! values.

use std::fmt;
use std::str::FromStr;

use bytes::Buf;
use gpioprims_wire::{opcode, Command, Extension, FrameError};

use crate::client::Client;
use crate::error::{ClientError, Result};

/// Most parameters a script accepts.
pub const MAX_SCRIPT_PARAMS: usize = 10;

const SCRIPT_STATUS_LEN: usize = 4 * (1 + MAX_SCRIPT_PARAMS);

/// Line function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Input = 0,
    Output = 1,
    Alt0 = 4,
    Alt1 = 5,
    Alt2 = 6,
    Alt3 = 7,
    Alt4 = 3,
    Alt5 = 2,
}

impl Mode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Mode::Input),
            1 => Some(Mode::Output),
            4 => Some(Mode::Alt0),
            5 => Some(Mode::Alt1),
            6 => Some(Mode::Alt2),
            7 => Some(Mode::Alt3),
            3 => Some(Mode::Alt4),
            2 => Some(Mode::Alt5),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Input => "input",
            Mode::Output => "output",
            Mode::Alt0 => "alt0",
            Mode::Alt1 => "alt1",
            Mode::Alt2 => "alt2",
            Mode::Alt3 => "alt3",
            Mode::Alt4 => "alt4",
            Mode::Alt5 => "alt5",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "input" | "in" => Ok(Mode::Input),
            "output" | "out" => Ok(Mode::Output),
            "alt0" => Ok(Mode::Alt0),
            "alt1" => Ok(Mode::Alt1),
            "alt2" => Ok(Mode::Alt2),
            "alt3" => Ok(Mode::Alt3),
            "alt4" => Ok(Mode::Alt4),
            "alt5" => Ok(Mode::Alt5),
            other => Err(ClientError::InvalidArgument(format!("unknown mode '{other}'"))),
        }
    }
}

/// Run state of a stored script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptStatus {
    Initing = 0,
    Halted = 1,
    Running = 2,
    Waiting = 3,
    Failed = 4,
}

impl ScriptStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ScriptStatus::Initing),
            1 => Some(ScriptStatus::Halted),
            2 => Some(ScriptStatus::Running),
            3 => Some(ScriptStatus::Waiting),
            4 => Some(ScriptStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptStatus::Initing => "initing",
            ScriptStatus::Halted => "halted",
            ScriptStatus::Running => "running",
            ScriptStatus::Waiting => "waiting",
            ScriptStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status word and parameters reported for a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptState {
    /// Run status, or a negative error code with `ErrorMode::ReturnCode`.
    pub code: i32,
    /// Current values of parameters 0-9; empty on error.
    pub params: Vec<i32>,
}

impl ScriptState {
    pub fn status(&self) -> Option<ScriptStatus> {
        ScriptStatus::from_code(self.code)
    }
}

impl Client {
    /// Set the mode of `line`.
    pub fn set_mode(&self, line: u8, mode: Mode) -> Result<i32> {
        self.simple(opcode::MODES, u32::from(line), mode.code())
    }

    /// Current mode code of `line`; see [`Mode::from_code`].
    pub fn get_mode(&self, line: u8) -> Result<i32> {
        self.simple(opcode::MODEG, u32::from(line), 0)
    }

    /// Level of `line` (0 or 1).
    pub fn read(&self, line: u8) -> Result<i32> {
        self.simple(opcode::READ, u32::from(line), 0)
    }

    /// Drive `line` high or low.
    pub fn write(&self, line: u8, high: bool) -> Result<i32> {
        self.simple(opcode::WRITE, u32::from(line), u32::from(high))
    }

    /// Levels of lines 0-31, one bit per line.
    pub fn read_bank_1(&self) -> Result<u32> {
        Ok(self.execute(&Command::new(opcode::BR1, 0, 0))?.result_bits())
    }

    /// Drive the lines in `bits` low.
    pub fn clear_bank_1(&self, bits: u32) -> Result<i32> {
        self.simple(opcode::BC1, bits, 0)
    }

    /// Drive the lines in `bits` high.
    pub fn set_bank_1(&self, bits: u32) -> Result<i32> {
        self.simple(opcode::BS1, bits, 0)
    }

    /// Daemon microsecond tick; wraps at 2^32.
    pub fn get_current_tick(&self) -> Result<u32> {
        Ok(self.execute(&Command::new(opcode::TICK, 0, 0))?.result_bits())
    }

    pub fn get_hardware_revision(&self) -> Result<u32> {
        Ok(self.execute(&Command::new(opcode::HWVER, 0, 0))?.result_bits())
    }

    pub fn get_pigpio_version(&self) -> Result<u32> {
        Ok(self.execute(&Command::new(opcode::PIGPV, 0, 0))?.result_bits())
    }

    /// Store `script` on the daemon and return its id.
    ///
    /// An empty script is not sent; the result is 0.
    pub fn store_script(&self, script: &str) -> Result<i32> {
        if script.is_empty() {
            return Ok(0);
        }
        let text = Extension::new()
            .text(script)
            .map_err(|err| ClientError::InvalidArgument(err.to_string()))?;
        let response = self.execute(&Command::extended(opcode::PROC, 0, 0, text))?;
        self.check(response.result)
    }

    /// Start script `id` with up to ten parameters.
    pub fn run_script(&self, id: u32, params: &[u32]) -> Result<i32> {
        if params.len() > MAX_SCRIPT_PARAMS {
            return Err(ClientError::InvalidArgument(format!(
                "{} script parameters, at most {MAX_SCRIPT_PARAMS} allowed",
                params.len()
            )));
        }
        let ext = params
            .iter()
            .fold(Extension::new(), |ext, param| ext.u32(*param));
        let response = self.execute(&Command::extended(opcode::PROCR, id, 0, ext))?;
        self.check(response.result)
    }

    /// Run status and parameters of script `id`.
    pub fn script_status(&self, id: u32) -> Result<ScriptState> {
        let response = self.execute_with_payload(&Command::new(opcode::PROCP, id, 0))?;
        let code = self.check(response.result)?;
        if code <= 0 {
            return Ok(ScriptState {
                code,
                params: Vec::new(),
            });
        }

        let mut payload = response.payload;
        if payload.len() != SCRIPT_STATUS_LEN {
            return Err(ClientError::Protocol(FrameError::InvalidLength {
                what: "script status",
                expected: SCRIPT_STATUS_LEN,
                actual: payload.len(),
            }));
        }
        let code = payload.get_i32_le();
        let params = (0..MAX_SCRIPT_PARAMS)
            .map(|_| payload.get_i32_le())
            .collect();
        Ok(ScriptState { code, params })
    }

    pub fn stop_script(&self, id: u32) -> Result<i32> {
        self.simple(opcode::PROCS, id, 0)
    }

    pub fn delete_script(&self, id: u32) -> Result<i32> {
        self.simple(opcode::PROCD, id, 0)
    }

    fn simple(&self, op: u32, p1: u32, p2: u32) -> Result<i32> {
        let response = self.execute(&Command::new(op, p1, p2))?;
        self.check(response.result)
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::config::{ClientConfig, ErrorMode};
    use crate::testing::{FakeDaemon, Reply};

    fn connect(daemon: &FakeDaemon) -> Client {
        Client::connect(ClientConfig::new("127.0.0.1", daemon.port()))
            .expect("client should connect")
    }

    #[test]
    fn mode_codes_match_the_daemon() {
        for code in 0..8 {
            let mode = Mode::from_code(code).expect("codes 0-7 are modes");
            assert_eq!(mode.code() as i32, code);
            assert_eq!(mode.as_str().parse::<Mode>().expect("name should parse"), mode);
        }
        assert_eq!(Mode::Alt4.code(), 3);
        assert_eq!(Mode::Alt5.code(), 2);
        assert!(Mode::from_code(8).is_none());
        assert!("pwm".parse::<Mode>().is_err());
    }

    #[test]
    fn line_helpers_send_expected_commands() {
        let daemon = FakeDaemon::with_responder(|cmd| match cmd.header.opcode {
            opcode::READ => Some(Reply::Result(1)),
            opcode::MODEG => Some(Reply::Result(Mode::Alt0.code() as i32)),
            _ => None,
        });
        let client = connect(&daemon);

        assert_eq!(client.set_mode(18, Mode::Output).expect("set_mode"), 0);
        assert_eq!(client.get_mode(18).expect("get_mode"), 4);
        assert_eq!(client.write(18, true).expect("write"), 0);
        assert_eq!(client.read(18).expect("read"), 1);

        let modes = daemon.commands_with(opcode::MODES);
        assert_eq!((modes[0].header.p1, modes[0].header.p2), (18, 1));
        let writes = daemon.commands_with(opcode::WRITE);
        assert_eq!((writes[0].header.p1, writes[0].header.p2), (18, 1));
    }

    #[test]
    fn bank_read_keeps_high_bit() {
        let daemon = FakeDaemon::with_responder(|cmd| {
            (cmd.header.opcode == opcode::BR1).then_some(Reply::Result(i32::MIN | 0b101))
        });
        let client = connect(&daemon);

        assert_eq!(client.read_bank_1().expect("read_bank_1"), 0x8000_0005);
        client.set_bank_1(0b11).expect("set_bank_1");
        client.clear_bank_1(0b10).expect("clear_bank_1");
        assert_eq!(daemon.commands_with(opcode::BS1)[0].header.p1, 0b11);
        assert_eq!(daemon.commands_with(opcode::BC1)[0].header.p1, 0b10);
    }

    #[test]
    fn error_mode_controls_negative_results() {
        let daemon = FakeDaemon::with_responder(|cmd| {
            (cmd.header.opcode == opcode::WRITE).then_some(Reply::Result(-2))
        });

        let client = connect(&daemon);
        let err = client.write(40, true).expect_err("raise mode should fail");
        assert_eq!(err.daemon_code(), Some(-2));
        assert_eq!(
            client
                .check_with(-2, ErrorMode::ReturnCode)
                .expect("override should pass"),
            -2
        );

        let mut config = ClientConfig::new("127.0.0.1", daemon.port());
        config.error_mode = ErrorMode::ReturnCode;
        let client = Client::connect(config).expect("client should connect");
        assert_eq!(client.write(40, true).expect("return mode should pass"), -2);
    }

    #[test]
    fn scripts_round_trip_through_extensions() {
        let mut status = BytesMut::new();
        status.put_i32_le(ScriptStatus::Running as i32);
        for param in 0..10 {
            status.put_i32_le(param * 2 - 1);
        }
        let status = status.to_vec();

        let daemon = FakeDaemon::with_responder(move |cmd| match cmd.header.opcode {
            opcode::PROC => Some(Reply::Result(6)),
            opcode::PROCP => Some(Reply::Payload(status.clone())),
            _ => None,
        });
        let client = connect(&daemon);

        let id = client
            .store_script("tag 0 w 22 1 mils 100 w 22 0 mils 100 dcr p0 jp 0")
            .expect("store_script");
        assert_eq!(id, 6);
        client.run_script(6, &[100, 7]).expect("run_script");

        let state = client.script_status(6).expect("script_status");
        assert_eq!(state.status(), Some(ScriptStatus::Running));
        assert_eq!(state.params.len(), 10);
        assert_eq!(state.params[0], -1);
        assert_eq!(state.params[9], 17);

        client.stop_script(6).expect("stop_script");
        client.delete_script(6).expect("delete_script");

        let stored = daemon.commands_with(opcode::PROC);
        assert_eq!(stored[0].header.p3 as usize, stored[0].extension.len());
        assert!(stored[0].extension.starts_with(b"tag 0 w 22"));

        let run = daemon.commands_with(opcode::PROCR);
        assert_eq!(run[0].header.p1, 6);
        assert_eq!(run[0].header.p3, 8);
        assert_eq!(run[0].extension, [100, 0, 0, 0, 7, 0, 0, 0]);
        assert_eq!(daemon.commands_with(opcode::PROCS)[0].header.p1, 6);
        assert_eq!(daemon.commands_with(opcode::PROCD)[0].header.p1, 6);
    }

    #[test]
    fn empty_script_is_not_sent() {
        let daemon = FakeDaemon::start();
        let client = connect(&daemon);

        assert_eq!(client.store_script("").expect("store_script"), 0);
        assert!(daemon.commands_with(opcode::PROC).is_empty());
    }

    #[test]
    fn too_many_script_params_are_rejected() {
        let daemon = FakeDaemon::start();
        let client = connect(&daemon);

        let err = client
            .run_script(1, &[0; 11])
            .expect_err("eleven params should fail");
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert!(daemon.commands_with(opcode::PROCR).is_empty());
    }

    #[test]
    fn script_status_error_has_no_params() {
        let daemon = FakeDaemon::with_responder(|cmd| {
            (cmd.header.opcode == opcode::PROCP).then_some(Reply::Result(-48))
        });
        let mut config = ClientConfig::new("127.0.0.1", daemon.port());
        config.error_mode = ErrorMode::ReturnCode;
        let client = Client::connect(config).expect("client should connect");

        let state = client.script_status(99).expect("return mode should pass");
        assert_eq!(state.code, -48);
        assert!(state.params.is_empty());
        assert!(state.status().is_none());
    }

    #[test]
    fn short_script_status_is_a_protocol_error() {
        let daemon = FakeDaemon::with_responder(|cmd| {
            (cmd.header.opcode == opcode::PROCP).then(|| Reply::Payload(vec![0u8; 8]))
        });
        let client = connect(&daemon);

        let err = client.script_status(1).expect_err("short payload should fail");
        assert!(err.is_protocol_error());
    }
}
