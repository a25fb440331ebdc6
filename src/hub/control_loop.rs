//! The hub's single control loop.
//!
//! [`Hub::run`] is the only code that reads or writes the client set. Each
//! iteration services exactly one ready request (join, leave, forward or
//! control), so membership and fan-out decisions are strictly serialized
//! without a lock. No channel is prioritized over another.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::handle::{Control, HubHandle, Inbox};
use super::room::Room;
use crate::domain::Tracer;

/// Tuning knobs for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    /// Pending requests each hub channel can buffer.
    pub channel_capacity: usize,
    /// Whether a message is also delivered back to its sender.
    pub deliver_to_sender: bool,
    /// Consecutive full-queue drops after which a registration is evicted.
    /// `0` disables eviction.
    pub max_consecutive_drops: u32,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            deliver_to_sender: true,
            max_consecutive_drops: 0,
        }
    }
}

/// Coordinator owning the client set.
#[derive(Debug)]
pub struct Hub {
    inbox: Inbox,
    room: Room,
}

impl Hub {
    /// Creates a hub and the handle used to reach it. Nothing is processed
    /// until [`run`](Self::run) is polled.
    #[must_use]
    pub fn new(settings: HubSettings, tracer: Arc<dyn Tracer>) -> (Self, HubHandle) {
        let (handle, inbox) = HubHandle::channel(settings.channel_capacity);
        let room = Room::new(settings, tracer);
        (Self { inbox, room }, handle)
    }

    /// Creates a hub and spawns its loop on the current Tokio runtime.
    #[must_use]
    pub fn spawn(settings: HubSettings, tracer: Arc<dyn Tracer>) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(settings, tracer);
        (handle, tokio::spawn(hub.run()))
    }

    /// Runs the control loop until [`HubHandle::shutdown`] is called or
    /// every handle has been dropped. On exit all registrations are
    /// released, which closes their outbound queues.
    pub async fn run(self) {
        let Self {
            mut inbox,
            mut room,
        } = self;
        tracing::debug!("hub loop started");

        loop {
            tokio::select! {
                Some(req) = inbox.join.recv() => {
                    room.admit(req.registration);
                    let _ = req.ack.send(());
                }
                Some(req) = inbox.leave.recv() => {
                    let removed = room.remove(req.id);
                    let _ = req.ack.send(removed);
                }
                Some(envelope) = inbox.forward.recv() => {
                    let stats = room.fan_out(&envelope);
                    tracing::trace!(
                        queued = stats.queued,
                        dropped = stats.dropped,
                        evicted = stats.evicted,
                        "fan-out complete"
                    );
                }
                control = inbox.control.recv() => match control {
                    Some(Control::ClientCount(reply)) => {
                        let _ = reply.send(room.len());
                    }
                    Some(Control::Shutdown) | None => break,
                },
            }
        }

        room.clear();
        tracing::debug!("hub loop stopped");
    }
}
