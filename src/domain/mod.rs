//! Domain layer: client identity, routed messages, and the event tracer.
//!
//! These types are shared by the hub control loop and the connection
//! adapters. None of them hold mutable shared state.

pub mod client_id;
pub mod message;
pub mod tracer;

pub use client_id::ClientId;
pub use message::{ChatMessage, Envelope, InboundMessage};
pub use tracer::{LogTracer, NoopTracer, TraceMode, Tracer, WriterTracer};
