//! Broadcast hub: the control loop, its channel API and the client set.
//!
//! ```text
//! adapters ──forward/join/leave──▶ Hub::run ──try_send──▶ per-client queues
//! ```

pub mod control_loop;
pub mod handle;
pub mod registration;
mod room;

pub use control_loop::{Hub, HubSettings};
pub use handle::HubHandle;
pub use registration::{Delivery, OutboundReceiver, Registration, ReleaseSignal};
