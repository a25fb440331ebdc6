//! Connection layer: the transport contract and the per-connection adapter
//! that pumps frames between a transport and the hub.

pub mod adapter;
pub mod transport;

pub use adapter::{Adapter, AdapterSettings, ConnectionState, Disconnect};
pub use transport::{Frame, FrameSink, FrameSource, TransportError};
