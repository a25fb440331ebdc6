//! Hub-facing identity of one connection.
//!
//! A [`Registration`] pairs a [`ClientId`] with the sending half of that
//! connection's bounded outbound queue. Once joined, the hub's control loop
//! is the only writer to the queue and the connection's write pump is the
//! only reader.
//!
//! Dropping a registration also fires its [`ReleaseSignal`], so a
//! connection whose write pump is stuck on the transport still learns that
//! the hub let it go.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{ClientId, Envelope};

/// Receiving half of an outbound queue, drained by a write pump.
pub type OutboundReceiver = mpsc::Receiver<Arc<Envelope>>;

/// Resolves (with an error) once the hub drops the matching registration.
pub type ReleaseSignal = oneshot::Receiver<()>;

/// Result of offering one envelope to a registration's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The envelope was enqueued.
    Queued,
    /// The queue was full; the envelope was dropped for this recipient.
    Full,
    /// The write pump is gone; the registration has no live outbound path.
    Closed,
}

/// One admitted (or about to be admitted) connection.
#[derive(Debug)]
pub struct Registration {
    id: ClientId,
    name: String,
    queue: mpsc::Sender<Arc<Envelope>>,
    _release: oneshot::Sender<()>,
}

impl Registration {
    /// Creates a registration for `id` with a bounded outbound queue of
    /// `capacity` slots (at least one). Returns the queue's receiving half
    /// and the signal fired when the hub drops the registration.
    #[must_use]
    pub fn new(
        id: ClientId,
        name: impl Into<String>,
        capacity: usize,
    ) -> (Self, OutboundReceiver, ReleaseSignal) {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        let (release, released) = oneshot::channel();
        let registration = Self {
            id,
            name: name.into(),
            queue,
            _release: release,
        };
        (registration, rx, released)
    }

    /// Creates a registration with a fresh id, ignoring its release signal.
    #[must_use]
    pub fn with_queue(name: impl Into<String>, capacity: usize) -> (Self, OutboundReceiver) {
        let (registration, rx, _) = Self::new(ClientId::new(), name, capacity);
        (registration, rx)
    }

    /// Returns the registration's identity.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the display name of the connection.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offers `envelope` without waiting. A full queue drops the newest
    /// envelope; already queued ones are kept.
    pub(crate) fn offer(&self, envelope: &Arc<Envelope>) -> Delivery {
        match self.queue.try_send(Arc::clone(envelope)) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
