use crate::types::PushMessage;
use log::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Callback invoked once per inbound message.
pub type Listener = Arc<dyn Fn(&PushMessage) -> anyhow::Result<()> + Send + Sync + 'static>;

/// What happened when one listener was handed one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Insertion-ordered set of listeners. Duplicates are kept and nothing is pruned.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Listener) {
        self.lock().push(listener);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hands `message` to every listener in registration order.
    ///
    /// A listener that returns an error or panics is recorded as
    /// [`DeliveryOutcome::Failed`] and the remaining listeners still run.
    /// The list is snapshotted first, so a listener may subscribe others
    /// without deadlocking; those take effect from the next message.
    pub fn publish(&self, message: &PushMessage) -> Vec<DeliveryOutcome> {
        let snapshot: Vec<Listener> = self.lock().clone();
        snapshot
            .iter()
            .enumerate()
            .map(|(index, listener)| {
                let outcome = match catch_unwind(AssertUnwindSafe(|| listener(message))) {
                    Ok(Ok(())) => DeliveryOutcome::Delivered,
                    Ok(Err(e)) => DeliveryOutcome::Failed(e.to_string()),
                    Err(panic) => DeliveryOutcome::Failed(format!(
                        "listener panicked: {}",
                        panic_message(panic.as_ref())
                    )),
                };
                if let DeliveryOutcome::Failed(reason) = &outcome {
                    warn!("Listener #{} failed to handle {:?}: {}", index, message.message_type(), reason);
                }
                outcome
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        // Listeners never run under this lock, so a poisoned guard still holds a valid list.
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
