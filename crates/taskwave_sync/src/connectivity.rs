//! Connectivity monitoring.
//!
//! The monitor is an explicitly constructed service, injected where it
//! is needed. It emits discrete connectivity-changed events to
//! subscribers; nothing observes the flag implicitly.

use tokio::sync::watch;

/// Publishes the process-wide "is connected" signal.
///
/// Platform integrations call [`set_online`](Self::set_online) when the
/// network path changes. Subscribers (the sync coordinator) receive one
/// event per transition; setting the same value twice does not notify.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    /// Records a connectivity change, notifying subscribers on
    /// transitions only.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Returns the current connectivity state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribes to connectivity transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
