//! Gesture-event emission: a stdout JSON line plus a fire-and-forget HTTP
//! POST to the coordination server, dispatched off a bounded channel so a
//! slow or unreachable server never stalls the capture loop.

use crate::gesture::detectors::GestureEvent;
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, warn};
use std::time::Duration;

const POST_TIMEOUT: Duration = Duration::from_millis(500);
const QUEUE_CAPACITY: usize = 16;

pub struct GestureEmitter {
    tx: Sender<GestureEvent>,
    _worker: std::thread::JoinHandle<()>,
}

impl GestureEmitter {
    /// Spawns the background worker that POSTs to `endpoint`. Events print
    /// to stdout synchronously on [`emit`] regardless of whether the POST
    /// ever succeeds.
    pub fn new(endpoint: String) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<GestureEvent>(QUEUE_CAPACITY);
        let worker = std::thread::spawn(move || {
            let client = match reqwest::blocking::Client::builder().timeout(POST_TIMEOUT).build() {
                Ok(c) => c,
                Err(e) => {
                    warn!("failed to build gesture-post client: {e}");
                    return;
                }
            };
            for event in rx.iter() {
                match client.post(&endpoint).json(&event).send() {
                    Ok(resp) if resp.status().is_success() => {
                        debug!("posted gesture {:?}", event.gesture);
                    }
                    Ok(resp) => warn!("gesture post rejected: {}", resp.status()),
                    Err(e) => warn!("gesture post failed: {e}"),
                }
            }
        });
        Self { tx, _worker: worker }
    }

    /// Prints the event as a JSON line on stdout, then queues it for
    /// best-effort delivery. If the queue is full the event is dropped
    /// (frame drops are preferable to blocking the capture loop).
    pub fn emit(&self, event: GestureEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("failed to serialize gesture event: {e}"),
        }
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            warn!("gesture post queue full, dropping event");
        }
    }
}
