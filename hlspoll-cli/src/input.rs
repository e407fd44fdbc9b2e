use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    terminal,
};
use hlspoll_engine::StopHandle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Blocking key listener; run it on the blocking pool.
///
/// Raw mode swallows the terminal's Ctrl-C signal, so both `q` and Ctrl-C
/// are read as key presses here and request a stop. Returns once either key
/// is pressed or `done` is cancelled.
pub fn input_handler(stop: StopHandle, done: CancellationToken) {
    if terminal::enable_raw_mode().is_err() {
        info!("Failed to enable raw mode. Input handling will be disabled.");
        return;
    }

    while !done.is_cancelled() {
        let Ok(true) = event::poll(Duration::from_millis(100)) else {
            continue;
        };
        if let Ok(Event::Key(KeyEvent {
            code, modifiers, ..
        })) = event::read()
        {
            let quit = matches!(code, KeyCode::Char('q')) && modifiers == KeyModifiers::NONE;
            let interrupt =
                matches!(code, KeyCode::Char('c')) && modifiers.contains(KeyModifiers::CONTROL);
            if quit || interrupt {
                info!("Stop requested, finishing the current iteration");
                stop.stop();
                break;
            }
        }
    }

    if terminal::disable_raw_mode().is_err() {
        info!("Failed to disable raw mode.");
    }
}

/// Waits for the listener spawned around [`input_handler`] to exit.
///
/// Returns `false` when the task panicked or was aborted. Raw mode is then
/// switched off here, since the listener never reached its own cleanup.
pub async fn join_input_task(task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Key listener task failed");
            let _ = terminal::disable_raw_mode();
            false
        }
    }
}
