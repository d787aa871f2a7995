//! Round countdown timer.
//!
//! A background task decrements the remaining units once per tick. Reaching
//! zero fires a one-shot expiry signal. Ticks and `cancel` serialize on the
//! same lock, so a cancel issued before the final decrement always wins and
//! the signal is never delivered twice.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Countdown {
    remaining: u32,
    running: bool,
    expire_tx: Option<oneshot::Sender<()>>,
}

impl Countdown {
    fn idle(remaining: u32) -> Self {
        Self {
            remaining,
            running: false,
            expire_tx: None,
        }
    }

    /// Stop and consume the expiry sender, firing it if asked to
    fn finish(&mut self, fire: bool) {
        self.running = false;
        if let Some(tx) = self.expire_tx.take() {
            if fire {
                // Receiver may already be gone; nobody is waiting then
                let _ = tx.send(());
            }
        }
    }
}

fn lock(countdown: &Mutex<Countdown>) -> MutexGuard<'_, Countdown> {
    countdown.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to the expiry signal of one `start` call
#[derive(Debug)]
pub struct Expiry(oneshot::Receiver<()>);

impl Expiry {
    /// Wait for the countdown to reach zero.
    ///
    /// Returns `false` if the timer was cancelled or restarted first.
    pub async fn wait(self) -> bool {
        self.0.await.is_ok()
    }
}

pub struct RoundTimer {
    tick: Duration,
    countdown: Arc<Mutex<Countdown>>,
    task: Option<JoinHandle<()>>,
}

impl RoundTimer {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            countdown: Arc::new(Mutex::new(Countdown::idle(0))),
            task: None,
        }
    }

    /// Begin counting down from `units`. A running countdown is cancelled
    /// first. Must be called from within a tokio runtime.
    pub fn start(&mut self, units: u32) -> Expiry {
        self.cancel();

        let (tx, rx) = oneshot::channel();
        // Fresh shared state per start: a stale task can never touch it
        self.countdown = Arc::new(Mutex::new(Countdown {
            remaining: units,
            running: true,
            expire_tx: Some(tx),
        }));

        if units == 0 {
            lock(&self.countdown).finish(true);
            return Expiry(rx);
        }

        let countdown = self.countdown.clone();
        let tick = self.tick;
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
            loop {
                interval.tick().await;
                let mut c = lock(&countdown);
                if !c.running {
                    return;
                }
                c.remaining = c.remaining.saturating_sub(1);
                if c.remaining == 0 {
                    c.finish(true);
                    return;
                }
            }
        }));

        Expiry(rx)
    }

    /// Stop ticking. Idempotent; a no-op on a stopped or expired timer.
    pub fn cancel(&mut self) {
        lock(&self.countdown).finish(false);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn remaining(&self) -> u32 {
        lock(&self.countdown).remaining
    }

    pub fn is_running(&self) -> bool {
        lock(&self.countdown).running
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
