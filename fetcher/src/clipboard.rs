//! Background watcher that reports new clipboard text to the main loop.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use log::{debug, info, warn};

/// Remembers the last seen text and reports only changes.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<String>,
}

impl ChangeDetector {
    /// Returns the text if it differs from the previously observed one.
    /// Missing or empty text is ignored and does not reset the memory.
    pub fn observe(&mut self, text: Option<String>) -> Option<String> {
        let text = text.filter(|t| !t.is_empty())?;
        if self.last.as_deref() == Some(text.as_str()) {
            return None;
        }
        self.last = Some(text.clone());
        Some(text)
    }
}

/// Polls a text source on a worker thread and sends every new text over a channel.
///
/// The worker stops when the watcher is dropped.
pub struct ClipboardWatcher {
    receiver: Receiver<String>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ClipboardWatcher {
    /// Watches the system clipboard.
    pub fn spawn(poll_interval: Duration) -> Self {
        Self::spawn_with(poll_interval, || {
            let mut clipboard = match arboard::Clipboard::new() {
                Ok(clipboard) => Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable, not watching it: {}", e);
                    None
                }
            };
            move || {
                let clipboard = clipboard.as_mut()?;
                match clipboard.get_text() {
                    Ok(text) => Some(text),
                    Err(e) => {
                        debug!("Failed to read clipboard: {}", e);
                        None
                    }
                }
            }
        })
    }

    /// Watches an arbitrary source. `init` runs on the worker thread and builds the source,
    /// so the source itself does not need to be [Send].
    pub fn spawn_with<I, S>(poll_interval: Duration, init: I) -> Self
    where
        I: FnOnce() -> S + Send + 'static,
        S: FnMut() -> Option<String>,
    {
        let (sender, receiver) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();

        let handle = thread::spawn(move || {
            let mut source = init();
            let mut detector = ChangeDetector::default();
            while !worker_stop.load(Ordering::Relaxed) {
                if let Some(text) = detector.observe(source()) {
                    debug!("Clipboard changed ({} bytes).", text.len());
                    if sender.send(text).is_err() {
                        break;
                    }
                }
                thread::sleep(poll_interval);
            }
            debug!("Clipboard watcher stopped.");
        });
        info!("Watching clipboard every {:?}.", poll_interval);

        Self {
            receiver,
            stop,
            handle: Some(handle),
        }
    }

    /// Takes every text received since the last call, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<String> {
        self.receiver.try_iter().collect()
    }
}

impl Debug for ClipboardWatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClipboardWatcher(stopped: {})", self.stop.load(Ordering::Relaxed))
    }
}

impl Drop for ClipboardWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Clipboard watcher panicked.");
            }
        }
    }
}
