#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::BytesMut;
use gpioprims_wire::{
    decode_command_header, encode_notification, encode_response, opcode, CommandHeader,
    NotificationRecord, COMMAND_HEADER_SIZE,
};

const PIPE_HANDLE: i32 = 0;

type Responder = dyn Fn(&CommandHeader) -> Option<i32> + Send + Sync;

/// Minimal daemon: answers every command, parks the notification pipe, and
/// writes `on_mask` records to the pipe after each NOTIFY-BEGIN.
struct Daemon {
    port: u16,
}

impl Daemon {
    fn start<F>(responder: F, on_mask: Vec<NotificationRecord>) -> Self
    where
        F: Fn(&CommandHeader) -> Option<i32> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("daemon should bind");
        let port = listener.local_addr().expect("daemon should have an address").port();
        let responder: Arc<Responder> = Arc::new(responder);
        let pipe = Arc::new(Mutex::new(None::<TcpStream>));
        let on_mask = Arc::new(on_mask);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let responder = Arc::clone(&responder);
                let pipe = Arc::clone(&pipe);
                let on_mask = Arc::clone(&on_mask);
                thread::spawn(move || serve(stream, &*responder, &pipe, &on_mask));
            }
        });

        Self { port }
    }

    fn idle() -> Self {
        Self::start(|_| None, Vec::new())
    }
}

fn serve(
    mut stream: TcpStream,
    responder: &Responder,
    pipe: &Mutex<Option<TcpStream>>,
    on_mask: &[NotificationRecord],
) {
    loop {
        let mut header = [0u8; COMMAND_HEADER_SIZE];
        if stream.read_exact(&mut header).is_err() {
            return;
        }
        let header = decode_command_header(&header).expect("header should decode");
        let mut extension = vec![0u8; header.p3 as usize];
        if stream.read_exact(&mut extension).is_err() {
            return;
        }

        let result = responder(&header).unwrap_or(match header.opcode {
            opcode::NOIB => PIPE_HANDLE,
            _ => 0,
        });
        if header.opcode == opcode::NOIB {
            let parked = stream.try_clone().expect("pipe should clone");
            *pipe.lock().expect("pipe lock should not be poisoned") = Some(parked);
        }

        let mut out = BytesMut::new();
        encode_response(&header, result, &mut out);
        if stream.write_all(&out).is_err() {
            return;
        }

        if header.opcode == opcode::NB {
            let mut records = BytesMut::new();
            for record in on_mask {
                encode_notification(record, &mut records);
            }
            if let Some(pipe) = pipe
                .lock()
                .expect("pipe lock should not be poisoned")
                .as_mut()
            {
                let _ = pipe.write_all(&records);
            }
        }
    }
}

fn gpioprims(port: u16, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gpioprims"))
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--connect-timeout")
        .arg("2s")
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .args(args)
        .output()
        .expect("gpioprims should run")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

#[test]
fn read_prints_line_level() {
    let daemon = Daemon::start(
        |header| (header.opcode == opcode::READ && header.p1 == 17).then_some(1),
        Vec::new(),
    );

    let output = gpioprims(daemon.port, &["read", "17"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let records = json_lines(&output);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["line"], 17);
    assert_eq!(records[0]["level"], 1);
}

#[test]
fn daemon_error_exits_with_daemon_code() {
    let daemon = Daemon::start(
        |header| (header.opcode == opcode::WRITE).then_some(-3),
        Vec::new(),
    );

    let output = gpioprims(daemon.port, &["write", "17", "1"]);
    assert_eq!(output.status.code(), Some(70));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gpio not 0-53 (-3)"), "stderr: {stderr}");
}

#[test]
fn unreachable_daemon_exits_with_connection_code() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let port = listener.local_addr().expect("address should resolve").port();
    drop(listener);

    let output = gpioprims(port, &["tick"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn bank_read_lists_high_lines() {
    let daemon = Daemon::start(
        |header| (header.opcode == opcode::BR1).then_some(0x0000_0011),
        Vec::new(),
    );

    let output = gpioprims(daemon.port, &["bank", "read"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let records = json_lines(&output);
    assert_eq!(records[0]["bits"], "0x00000011");
    assert_eq!(records[0]["high"], serde_json::json!([0, 4]));
}

#[test]
fn mode_set_reports_new_mode() {
    let daemon = Daemon::idle();

    let output = gpioprims(daemon.port, &["mode", "4", "output"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let records = json_lines(&output);
    assert_eq!(records[0]["mode"], "output");
    assert_eq!(records[0]["code"], 1);
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let daemon = Daemon::idle();

    let output = gpioprims(daemon.port, &["mode", "4", "sideways"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn watch_prints_level_changes_until_count() {
    let records = vec![
        NotificationRecord {
            sequence: 0,
            flags: 0,
            tick: 100,
            level: 1 << 4,
        },
        NotificationRecord {
            sequence: 1,
            flags: 0,
            tick: 200,
            level: 0,
        },
    ];
    let daemon = Daemon::start(|_| None, records);

    let output = gpioprims(daemon.port, &["watch", "4", "--count", "2"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let events = json_lines(&output);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["line"], 4);
    assert_eq!(events[0]["level"], "high");
    assert_eq!(events[0]["tick"], 100);
    assert_eq!(events[1]["level"], "low");
    assert_eq!(events[1]["tick"], 200);
}

#[test]
fn version_does_not_need_a_daemon() {
    let output = Command::new(env!("CARGO_BIN_EXE_gpioprims"))
        .arg("version")
        .output()
        .expect("gpioprims should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("gpioprims "), "stdout: {stdout}");
}

#[test]
fn extended_version_names_default_daemon() {
    let output = Command::new(env!("CARGO_BIN_EXE_gpioprims"))
        .args(["version", "--extended"])
        .output()
        .expect("gpioprims should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("default daemon: localhost:8888"), "stdout: {stdout}");
}
