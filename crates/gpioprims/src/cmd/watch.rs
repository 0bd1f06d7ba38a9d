use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use gpioprims_client::{Client, Debounce, Edge, HandlerResult, LineEvent, LoopState};
use tracing::debug;

use crate::cmd::{disconnect, Target, WatchArgs};
use crate::exit::{client_error, CliError, CliResult, CONNECTION_ERROR, INTERNAL, SUCCESS};
use crate::output::{print_event, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: WatchArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let client = target.connect()?;
    let (tx, rx) = mpsc::channel();
    let edge = Edge::from(args.edge);
    for &line in &args.lines {
        subscribe(&client, line, edge, args.debounce_ms, tx.clone())?;
    }
    drop(tx);
    debug!(lines = ?args.lines, ?edge, "watching lines");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let event = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                if client.notification_state() == LoopState::Closed {
                    return Err(CliError::new(
                        CONNECTION_ERROR,
                        "notification connection closed by daemon",
                    ));
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        print_event(&event, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    disconnect(client)?;
    Ok(SUCCESS)
}

fn subscribe(
    client: &Client,
    line: u8,
    edge: Edge,
    debounce_ms: Option<u64>,
    tx: Sender<LineEvent>,
) -> CliResult<()> {
    let forward = move |event: LineEvent| -> HandlerResult {
        tx.send(event)?;
        Ok(())
    };
    let added = match debounce_ms {
        Some(ms) => client.add_callback(
            line,
            edge,
            Debounce::with_threshold(forward, Duration::from_millis(ms)),
        ),
        None => client.add_callback(line, edge, forward),
    };
    added
        .map(|_| ())
        .map_err(|err| client_error(&format!("watch line {line} failed"), err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
