use log::*;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

struct PendingTimer {
    ticket: u64,
    handle: JoinHandle<()>,
}

/// Owns the single delayed-retry timer of a channel.
///
/// Fixed delay, no attempt cap, no jitter. At most one timer is pending at a
/// time; scheduling while one is pending is a no-op.
pub struct ReconnectSupervisor {
    delay: Duration,
    next_ticket: u64,
    pending: Option<PendingTimer>,
}

impl ReconnectSupervisor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_ticket: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts the retry timer unless one is already pending.
    ///
    /// When the delay elapses `fire` is called with the timer's ticket; the
    /// callee must pass it to [`complete`](Self::complete) before acting so a
    /// timer cancelled in the meantime is ignored. Returns `false` if a timer
    /// was already pending.
    pub fn schedule<F>(&mut self, fire: F) -> bool
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if self.pending.is_some() {
            debug!("Reconnect already pending, not scheduling another.");
            return false;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let delay = self.delay;
        warn!("Disconnected. Retrying in {} ms...", delay.as_millis());
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            fire(ticket);
        });
        self.pending = Some(PendingTimer { ticket, handle });
        true
    }

    /// Clears the pending marker if `ticket` is still the pending timer.
    pub fn complete(&mut self, ticket: u64) -> bool {
        match &self.pending {
            Some(timer) if timer.ticket == ticket => {
                self.pending = None;
                true
            }
            _ => {
                debug!("Ignoring stale reconnect timer #{}.", ticket);
                false
            }
        }
    }

    /// Aborts the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(timer) => {
                timer.handle.abort();
                info!("Cancelled pending reconnect timer #{}.", timer.ticket);
                true
            }
            None => false,
        }
    }
}

impl Drop for ReconnectSupervisor {
    fn drop(&mut self) {
        self.cancel();
    }
}
