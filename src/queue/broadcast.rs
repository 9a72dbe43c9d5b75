//! Rate-limited publisher for queue snapshots

use crate::types::{Event, LogEntry, QueueSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const NEVER: u64 = u64::MAX;

/// Event channel with a throttle on unforced snapshot publishes
///
/// Unforced publishes are dropped while the last successful one is younger
/// than `interval`. Forced publishes (status transitions) always go out.
/// Sends with no subscribers do not count as successful.
pub(crate) struct Broadcaster {
    tx: broadcast::Sender<Event>,
    interval: Duration,
    epoch: Instant,
    last_publish_ms: AtomicU64,
}

impl Broadcaster {
    pub(crate) fn new(capacity: usize, interval: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            interval,
            epoch: Instant::now(),
            last_publish_ms: AtomicU64::new(NEVER),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Whether a snapshot publish would currently go out
    pub(crate) fn should_publish(&self, force: bool) -> bool {
        if self.tx.receiver_count() == 0 {
            return false;
        }
        if force {
            return true;
        }
        match self.last_publish_ms.load(Ordering::Acquire) {
            NEVER => true,
            last => self.now_ms().saturating_sub(last) >= self.interval.as_millis() as u64,
        }
    }

    /// Send a snapshot, recording the time on success
    pub(crate) fn send_snapshot(&self, snapshot: QueueSnapshot) -> bool {
        let sent = self.tx.send(Event::Queue(snapshot)).is_ok();
        if sent {
            self.last_publish_ms.store(self.now_ms(), Ordering::Release);
        }
        sent
    }

    /// Log entries are never throttled
    pub(crate) fn send_log(&self, entry: LogEntry) {
        self.tx.send(Event::Log(entry)).ok();
    }

    pub(crate) fn send(&self, event: Event) {
        self.tx.send(event).ok();
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
