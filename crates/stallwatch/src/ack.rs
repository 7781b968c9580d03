//! Single-slot acknowledgment between the probe thread and the main context.
//!
//! The probe thread owns an [`AckSignal`] and hands one [`AckToken`] to each
//! posted probe. The token reports `Delivered` when the probe runs, or
//! `Abandoned` if the main queue drops the probe without running it. Only one
//! token is ever outstanding, so the one-slot channel never fills.

use crossbeam::channel::{self, Receiver, Sender};

/// Outcome of one posted probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ack {
    /// The main context ran the probe.
    Delivered,
    /// The probe was dropped before it could run.
    Abandoned,
}

pub(crate) struct AckSignal {
    tx: Sender<Ack>,
    rx: Receiver<Ack>,
}

impl AckSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel::bounded(1);
        Self { tx, rx }
    }

    /// Arm the signal for the next probe.
    pub(crate) fn token(&self) -> AckToken {
        AckToken {
            tx: Some(self.tx.clone()),
        }
    }

    /// Take the outstanding token's outcome if it has already resolved.
    pub(crate) fn try_wait(&self) -> Option<Ack> {
        self.rx.try_recv().ok()
    }

    /// Block until the outstanding token resolves.
    pub(crate) fn wait(&self) -> Ack {
        // The signal keeps its own sender alive, so disconnection cannot happen.
        self.rx.recv().unwrap_or(Ack::Abandoned)
    }
}

pub(crate) struct AckToken {
    tx: Option<Sender<Ack>>,
}

impl AckToken {
    /// Report that the probe ran.
    pub(crate) fn signal(mut self) {
        self.resolve(Ack::Delivered);
    }

    fn resolve(&mut self, ack: Ack) {
        if let Some(tx) = self.tx.take()
            && tx.try_send(ack).is_err()
        {
            tracing::trace!(?ack, "acknowledgment slot already filled");
        }
    }
}

impl Drop for AckToken {
    fn drop(&mut self) {
        self.resolve(Ack::Abandoned);
    }
}
