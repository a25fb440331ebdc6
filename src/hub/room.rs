//! The client set and the fan-out algorithm.
//!
//! [`Room`] is owned by the hub control loop and never crosses a task
//! boundary, so it needs no lock. Every mutation here happens on the
//! loop's single task.

use std::collections::HashMap;
use std::sync::Arc;

use super::HubSettings;
use super::registration::{Delivery, Registration};
use crate::domain::{ClientId, Envelope, Tracer};

/// A joined registration plus the bookkeeping only the hub needs.
#[derive(Debug)]
struct Member {
    registration: Registration,
    consecutive_drops: u32,
}

/// Per-fan-out delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FanOut {
    pub(crate) queued: usize,
    pub(crate) dropped: usize,
    pub(crate) evicted: usize,
}

/// Authoritative set of admitted registrations.
#[derive(Debug)]
pub(crate) struct Room {
    clients: HashMap<ClientId, Member>,
    settings: HubSettings,
    tracer: Arc<dyn Tracer>,
}

impl Room {
    pub(crate) fn new(settings: HubSettings, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            clients: HashMap::new(),
            settings,
            tracer,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }

    /// Inserts `registration`. Re-joining with a known id replaces the
    /// old queue, which closes it.
    pub(crate) fn admit(&mut self, registration: Registration) {
        let id = registration.id();
        self.tracer
            .trace(&format!("New client joined: {} ({id})", registration.name()));
        self.clients.insert(
            id,
            Member {
                registration,
                consecutive_drops: 0,
            },
        );
        tracing::debug!(client_id = %id, total = self.clients.len(), "client admitted");
    }

    /// Removes `id` and drops its queue sender. Returns `false` when `id`
    /// was not a member.
    pub(crate) fn remove(&mut self, id: ClientId) -> bool {
        let Some(member) = self.clients.remove(&id) else {
            return false;
        };
        self.tracer
            .trace(&format!("Client left: {} ({id})", member.registration.name()));
        tracing::debug!(client_id = %id, total = self.clients.len(), "client removed");
        true
    }

    /// Offers `envelope` to every member without ever waiting on a queue.
    pub(crate) fn fan_out(&mut self, envelope: &Arc<Envelope>) -> FanOut {
        self.tracer.trace(&format!(
            "Message received: {} (from {})",
            envelope.message.body, envelope.message.name
        ));

        let mut stats = FanOut::default();
        let mut evict = Vec::new();
        let max_drops = self.settings.max_consecutive_drops;

        for (id, member) in &mut self.clients {
            if !self.settings.deliver_to_sender && *id == envelope.sender {
                continue;
            }
            match member.registration.offer(envelope) {
                Delivery::Queued => {
                    member.consecutive_drops = 0;
                    stats.queued += 1;
                    self.tracer.trace(&format!(" -- sent to client {id}"));
                }
                Delivery::Full => {
                    member.consecutive_drops = member.consecutive_drops.saturating_add(1);
                    stats.dropped += 1;
                    self.tracer.trace(&format!(" -- queue full, dropped for {id}"));
                    if max_drops > 0 && member.consecutive_drops >= max_drops {
                        evict.push(*id);
                    }
                }
                Delivery::Closed => evict.push(*id),
            }
        }

        for id in evict {
            if self.clients.remove(&id).is_some() {
                stats.evicted += 1;
                self.tracer.trace(&format!("Client evicted: {id}"));
                tracing::warn!(client_id = %id, "evicted client with dead or stalled queue");
            }
        }
        stats
    }

    /// Drops every registration, closing all outbound queues.
    pub(crate) fn clear(&mut self) {
        let count = self.clients.len();
        self.clients.clear();
        if count > 0 {
            self.tracer.trace(&format!("Hub closed, released {count} client(s)"));
        }
    }
}
