//! Loopback fake daemon used by the unit tests.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use gpioprims_wire::{
    decode_command_header, encode_notification, encode_response, opcode, CommandHeader,
    NotificationRecord, COMMAND_HEADER_SIZE,
};

/// Handle the fake daemon hands out for notification pipes.
pub(crate) const PIPE_HANDLE: i32 = 3;

const WAIT: Duration = Duration::from_secs(5);

/// A command as the fake daemon received it.
#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub header: CommandHeader,
    pub extension: Vec<u8>,
}

/// What the fake daemon does with a command.
pub(crate) enum Reply {
    /// Answer with a plain result.
    Result(i32),
    /// Answer with the payload length as result, then the payload.
    Payload(Vec<u8>),
    /// Never answer; keep the connection open.
    Hang,
    /// Drop the connection without answering.
    Disconnect,
}

type Responder = dyn Fn(&Received) -> Option<Reply> + Send + Sync;

#[derive(Default)]
struct Shared {
    commands: Mutex<Vec<Received>>,
    pipes: Mutex<Vec<TcpStream>>,
    pipe_opened: Condvar,
    pipe_closed: AtomicBool,
}

pub(crate) struct FakeDaemon {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl FakeDaemon {
    /// Answers every command with 0 and opens notification pipes.
    pub fn start() -> Self {
        Self::with_responder(|_| None)
    }

    /// `responder` decides the reply; `None` falls back to the default.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Received) -> Option<Reply> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("fake daemon should bind");
        let addr = listener.local_addr().expect("fake daemon should have an address");
        let shared = Arc::new(Shared::default());
        let responder: Arc<Responder> = Arc::new(responder);

        let accept_shared = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let shared = Arc::clone(&accept_shared);
                let responder = Arc::clone(&responder);
                thread::spawn(move || serve(stream, &shared, responder.as_ref()));
            }
        });

        Self { addr, shared }
    }

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn commands(&self) -> Vec<Received> {
        self.shared
            .commands
            .lock()
            .expect("commands lock should not be poisoned")
            .clone()
    }

    pub fn commands_with(&self, op: u32) -> Vec<Received> {
        self.commands()
            .into_iter()
            .filter(|cmd| cmd.header.opcode == op)
            .collect()
    }

    /// Poll until `count` commands with opcode `op` arrived.
    pub fn wait_for(&self, op: u32, count: usize) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.commands_with(op).len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Poll until the client side of the notification pipe hung up.
    pub fn wait_pipe_closed(&self) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.shared.pipe_closed.load(Ordering::Acquire) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Send a record on every open notification pipe, waiting for one to exist.
    pub fn notify(&self, record: NotificationRecord) {
        let mut buf = BytesMut::new();
        encode_notification(&record, &mut buf);

        let pipes = self
            .shared
            .pipes
            .lock()
            .expect("pipes lock should not be poisoned");
        let (mut pipes, _) = self
            .shared
            .pipe_opened
            .wait_timeout_while(pipes, WAIT, |pipes| pipes.is_empty())
            .expect("pipes lock should not be poisoned");
        assert!(!pipes.is_empty(), "no notification pipe was opened");
        for pipe in pipes.iter_mut() {
            let _ = pipe.write_all(&buf);
        }
    }

    /// Hang up every notification pipe from the daemon side.
    pub fn close_pipes(&self) {
        let pipes = self
            .shared
            .pipes
            .lock()
            .expect("pipes lock should not be poisoned");
        for pipe in pipes.iter() {
            let _ = pipe.shutdown(Shutdown::Both);
        }
    }

    /// Send a level change record.
    pub fn levels(&self, sequence: u16, tick: u32, level: u32) {
        self.notify(NotificationRecord {
            sequence,
            flags: 0,
            tick,
            level,
        });
    }
}

fn serve(mut stream: TcpStream, shared: &Shared, responder: &Responder) {
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

        let received = Received { header, extension };
        shared
            .commands
            .lock()
            .expect("commands lock should not be poisoned")
            .push(received.clone());

        let reply = responder(&received).unwrap_or_else(|| default_reply(&header));
        let opens_pipe =
            header.opcode == opcode::NOIB && matches!(reply, Reply::Result(handle) if handle >= 0);
        let mut out = BytesMut::new();
        match reply {
            Reply::Result(result) => encode_response(&header, result, &mut out),
            Reply::Payload(payload) => {
                encode_response(&header, payload.len() as i32, &mut out);
                out.extend_from_slice(&payload);
            }
            Reply::Hang => {
                drain_until_eof(&mut stream);
                return;
            }
            Reply::Disconnect => return,
        }
        if stream.write_all(&out).is_err() {
            return;
        }

        if opens_pipe {
            let pipe = stream.try_clone().expect("pipe stream should clone");
            shared
                .pipes
                .lock()
                .expect("pipes lock should not be poisoned")
                .push(pipe);
            shared.pipe_opened.notify_all();
            drain_until_eof(&mut stream);
            shared.pipe_closed.store(true, Ordering::Release);
            return;
        }
    }
}

fn default_reply(header: &CommandHeader) -> Reply {
    match header.opcode {
        opcode::NOIB => Reply::Result(PIPE_HANDLE),
        _ => Reply::Result(0),
    }
}

fn drain_until_eof(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(_) => return,
        }
    }
}
