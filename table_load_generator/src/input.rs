use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::console::RawModeGuard;

const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    QuitKey,
    Interrupt,
}

/// Keyboard and Ctrl-C merged into one stream of shutdown requests.
pub struct OperatorSignals {
    receiver: UnboundedReceiver<ShutdownSignal>,
    keyboard: Option<JoinHandle<()>>,
}

impl OperatorSignals {
    /// Waits for the keyboard thread so the terminal mode is restored before exit.
    ///
    /// The thread notices `stop` within one poll interval.
    pub async fn close(mut self) {
        if let Some(keyboard) = self.keyboard.take() {
            let _ = tokio::task::spawn_blocking(move || keyboard.join()).await;
        }
    }
}

impl Stream for OperatorSignals {
    type Item = ShutdownSignal;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

/// Starts watching the keyboard and Ctrl-C. The keyboard thread exits once `stop` is cancelled.
pub fn operator_signals(stop: CancellationToken) -> OperatorSignals {
    let (tx, receiver) = unbounded();

    let keyboard_tx = tx.clone();
    let keyboard = match std::thread::Builder::new()
        .name(String::from("keyboard"))
        .spawn(move || watch_keyboard(keyboard_tx, stop))
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Unable to watch the keyboard: {e}");
            None
        }
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.unbounded_send(ShutdownSignal::Interrupt);
        }
    });

    OperatorSignals { receiver, keyboard }
}

fn watch_keyboard(tx: UnboundedSender<ShutdownSignal>, stop: CancellationToken) {
    let _raw_mode = RawModeGuard::enter();
    while !stop.is_cancelled() {
        match event::poll(KEY_POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if let Some(signal) = classify(key) {
                        let _ = tx.unbounded_send(signal);
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Keyboard input unavailable: {e}");
                    return;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!("Keyboard input unavailable: {e}");
                return;
            }
        }
    }
    debug!("keyboard watcher stopped");
}

/// Raw mode delivers Ctrl-C as a key rather than a signal, so it is mapped here as well.
fn classify(key: KeyEvent) -> Option<ShutdownSignal> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q' | 'Q') => Some(ShutdownSignal::QuitKey),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ShutdownSignal::Interrupt)
        }
        _ => None,
    }
}
