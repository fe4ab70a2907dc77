use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Single-shot timer that posts an event after `delay` of quiet.
///
/// Every [`Debouncer::reset`] aborts the pending timer and starts a new one.
/// Events carry a generation number; a timer that already fired before it was
/// reset is recognised as stale by [`Debouncer::finish`].
#[derive(Debug)]
pub struct Debouncer<E> {
    delay: Duration,
    tx: mpsc::UnboundedSender<E>,
    pending: Option<JoinHandle<()>>,
    generation: u64,
}

impl<E: Send + 'static> Debouncer<E> {
    pub fn new(delay: Duration, tx: mpsc::UnboundedSender<E>) -> Self {
        Self {
            delay,
            tx,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn reset<F>(&mut self, make_event: F) -> u64
    where
        F: FnOnce(u64) -> E + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let delay = self.delay;
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the owner shut down.
            let _ = tx.send(make_event(generation));
        }));
        generation
    }

    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accepts an elapsed event. Returns `false` for a stale generation.
    pub fn finish(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            return false;
        }
        self.pending = None;
        true
    }
}

impl<E> Drop for Debouncer<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
