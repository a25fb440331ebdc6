//! # chat-hub
//!
//! Real-time, in-process message broadcast hub for WebSocket clients.
//!
//! A single control loop owns the set of connected clients and serializes
//! every join, leave and fan-out decision. Each connection runs a read
//! pump and a write pump that talk to the loop only through channels, so
//! the client set needs no lock.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)
//!     │
//!     ├── GET /room (api/)            registration entry point
//!     │
//!     ├── Adapter (connection/)       read pump ─▶ forward
//!     │                               write pump ◀─ outbound queue
//!     │
//!     ├── Hub (hub/)                  control loop over join/leave/forward
//!     │
//!     └── Tracer (domain/)            lifecycle side channel
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod hub;
