//! Channel API through which connections talk to the hub.
//!
//! [`HubHandle`] is cheap to clone; every adapter owns one. All methods
//! only send on channels. The client set itself never leaves the control
//! loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::Registration;
use crate::domain::{ClientId, Envelope};
use crate::error::HubError;

/// Admission request, acknowledged once the registration is in the set.
#[derive(Debug)]
pub(crate) struct JoinRequest {
    pub(crate) registration: Registration,
    pub(crate) ack: oneshot::Sender<()>,
}

/// Removal request, acknowledged with whether the id was a member.
#[derive(Debug)]
pub(crate) struct LeaveRequest {
    pub(crate) id: ClientId,
    pub(crate) ack: oneshot::Sender<bool>,
}

/// Out-of-band requests to the control loop.
#[derive(Debug)]
pub(crate) enum Control {
    ClientCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Receiving ends owned by the control loop.
#[derive(Debug)]
pub(crate) struct Inbox {
    pub(crate) forward: mpsc::Receiver<Arc<Envelope>>,
    pub(crate) join: mpsc::Receiver<JoinRequest>,
    pub(crate) leave: mpsc::Receiver<LeaveRequest>,
    pub(crate) control: mpsc::Receiver<Control>,
}

/// Sending side of the hub's forward, join, leave and control channels.
#[derive(Debug, Clone)]
pub struct HubHandle {
    forward_tx: mpsc::Sender<Arc<Envelope>>,
    join_tx: mpsc::Sender<JoinRequest>,
    leave_tx: mpsc::Sender<LeaveRequest>,
    control_tx: mpsc::Sender<Control>,
}

impl HubHandle {
    /// Creates a connected handle/inbox pair whose channels each hold
    /// `capacity` pending requests.
    pub(crate) fn channel(capacity: usize) -> (Self, Inbox) {
        let capacity = capacity.max(1);
        let (forward_tx, forward) = mpsc::channel(capacity);
        let (join_tx, join) = mpsc::channel(capacity);
        let (leave_tx, leave) = mpsc::channel(capacity);
        let (control_tx, control) = mpsc::channel(capacity);
        (
            Self {
                forward_tx,
                join_tx,
                leave_tx,
                control_tx,
            },
            Inbox {
                forward,
                join,
                leave,
                control,
            },
        )
    }

    /// Submits `envelope` for fan-out to every registration admitted when
    /// the loop processes it.
    ///
    /// Waits only while the forward channel is full. Ordering is FIFO per
    /// caller. There is no ordering relative to a concurrent
    /// [`join`](Self::join) issued from another task.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub has shut down; the
    /// envelope is dropped and the caller should treat this as terminal.
    pub async fn forward(&self, envelope: Arc<Envelope>) -> Result<(), HubError> {
        self.forward_tx
            .send(envelope)
            .await
            .map_err(|_| HubError::HubClosed)
    }

    /// Requests admission of `registration` and waits until the loop has
    /// inserted it. Any envelope forwarded after this returns is delivered
    /// to the new registration.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub shut down before the
    /// registration was admitted. The registration's queue is closed.
    pub async fn join(&self, registration: Registration) -> Result<(), HubError> {
        let (ack, admitted) = oneshot::channel();
        self.join_tx
            .send(JoinRequest { registration, ack })
            .await
            .map_err(|_| HubError::HubClosed)?;
        admitted.await.map_err(|_| HubError::HubClosed)
    }

    /// Requests removal of `id` and waits for the loop to process it.
    ///
    /// Idempotent: returns `true` only for the call that actually removed
    /// a member. Unknown ids, repeated calls and calls after shutdown all
    /// return `false`.
    pub async fn leave(&self, id: ClientId) -> bool {
        let (ack, removed) = oneshot::channel();
        if self.leave_tx.send(LeaveRequest { id, ack }).await.is_err() {
            return false;
        }
        removed.await.unwrap_or(false)
    }

    /// Returns the current size of the client set, as seen by the loop.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub has shut down.
    pub async fn client_count(&self) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(Control::ClientCount(tx))
            .await
            .map_err(|_| HubError::HubClosed)?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    /// Asks the loop to release every registration and stop. A no-op if it
    /// already stopped.
    pub async fn shutdown(&self) {
        let _ = self.control_tx.send(Control::Shutdown).await;
    }

    /// Returns `true` once the control loop has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.control_tx.is_closed()
    }
}
