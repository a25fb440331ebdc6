//! Transport contract for connection adapters.
//!
//! A transport is any duplex channel of discrete frames, split into a
//! receiving half ([`FrameSource`], a [`Stream`]) and a sending half
//! ([`FrameSink`], a [`Sink`] whose `close` releases the connection).
//! Adapters are generic over both, so the hub core does not care whether
//! frames travel over WebSocket or anything else.

use axum::extract::ws::{Message, WebSocket};
use futures_util::future;
use futures_util::{Sink, SinkExt, Stream, StreamExt};

/// One discrete unit received from or sent to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// The peer is closing, or we are.
    Close,
}

impl Frame {
    /// Returns the data carried by a text or binary frame.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Binary(bytes) => Some(bytes),
            Self::Close => None,
        }
    }
}

/// Failure of the underlying connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Error reported by the WebSocket layer.
    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),

    /// The other half of the transport is gone.
    #[error("transport closed")]
    Closed,
}

/// Receiving half of a transport.
pub trait FrameSource: Stream<Item = Result<Frame, TransportError>> + Unpin + Send + 'static {}

impl<T> FrameSource for T where
    T: Stream<Item = Result<Frame, TransportError>> + Unpin + Send + 'static
{
}

/// Sending half of a transport.
pub trait FrameSink: Sink<Frame, Error = TransportError> + Unpin + Send + 'static {}

impl<T> FrameSink for T where T: Sink<Frame, Error = TransportError> + Unpin + Send + 'static {}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::text(text),
            Frame::Binary(bytes) => Message::binary(bytes),
            Frame::Close => Message::Close(None),
        }
    }
}

/// Maps one WebSocket message to a frame. Ping and pong are answered by
/// the WebSocket layer and never surface.
fn frame_from_ws(msg: Result<Message, axum::Error>) -> Option<Result<Frame, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
        Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
        Ok(Message::Ping(_) | Message::Pong(_)) => None,
        Err(e) => Some(Err(TransportError::from(e))),
    }
}

/// Splits an upgraded WebSocket into the adapter's transport halves.
pub fn websocket(socket: WebSocket) -> (impl FrameSink, impl FrameSource) {
    let (ws_tx, ws_rx) = socket.split();
    let sink = ws_tx
        .with(|frame: Frame| future::ready(Ok::<Message, axum::Error>(Message::from(frame))))
        .sink_map_err(TransportError::from);
    let source = ws_rx.filter_map(|msg| future::ready(frame_from_ws(msg)));
    (sink, source)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn payload_of_each_frame() {
        assert_eq!(Frame::Text("hi".into()).payload(), Some(&b"hi"[..]));
        assert_eq!(Frame::Binary(vec![1, 2]).payload(), Some(&[1u8, 2][..]));
        assert_eq!(Frame::Close.payload(), None);
    }

    #[test]
    fn ws_control_frames_are_filtered() {
        assert!(frame_from_ws(Ok(Message::Ping(Default::default()))).is_none());
        assert!(frame_from_ws(Ok(Message::Pong(Default::default()))).is_none());
        let Some(Ok(Frame::Close)) = frame_from_ws(Ok(Message::Close(None))) else {
            panic!("close should map to Frame::Close");
        };
    }

    #[test]
    fn ws_text_maps_to_text_frame() {
        let Some(Ok(frame)) = frame_from_ws(Ok(Message::text("hello".to_string()))) else {
            panic!("text should map");
        };
        assert_eq!(frame, Frame::Text("hello".to_string()));
    }

    #[test]
    fn frame_to_ws_message() {
        assert!(matches!(Message::from(Frame::Close), Message::Close(None)));
        let Message::Text(text) = Message::from(Frame::Text("x".into())) else {
            panic!("expected text message");
        };
        assert_eq!(text.as_str(), "x");
    }
}
