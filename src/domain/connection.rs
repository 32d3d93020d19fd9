//! Connection identity and the registry-side connection handle.
//!
//! A WebSocket session owns its socket exclusively; the registry only ever
//! holds a [`ConnectionHandle`], a cheap clone carrying the outbound queue
//! sender and a cancellation token. Dropping a handle never closes the
//! connection; eviction pairs [`ConnectionHandle::close`] with registry
//! removal.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::StoreId;

/// Unique identifier for an accepted connection.
///
/// Wraps a UUID v4. Generated once when the upgrade succeeds and immutable
/// thereafter. Used as the per-store set key in [`super::StoreRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(uuid::Uuid);

impl ConnId {
    /// Creates a new random `ConnId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queued outbound payload, tagged with its WebSocket frame kind so the
/// session can forward it verbatim: a relayed binary frame stays binary
/// even when its bytes happen to be valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame. Constructed only from known-valid UTF-8.
    Text(Bytes),
    /// Binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Classifies an opaque payload with no frame-kind provenance: text
    /// when valid UTF-8 (the common case for JSON stream events), binary
    /// otherwise.
    #[must_use]
    pub fn classify(payload: Bytes) -> Self {
        match std::str::from_utf8(&payload) {
            Ok(_) => Self::Text(payload),
            Err(_) => Self::Binary(payload),
        }
    }

    /// Returns the raw payload bytes regardless of frame kind.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        match self {
            Self::Text(bytes) | Self::Binary(bytes) => bytes,
        }
    }
}

/// Error returned by [`ConnectionHandle::send`] when a payload cannot be
/// queued for the connection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendError {
    /// The outbound queue is full; the client is not draining fast enough.
    #[error("outbound queue full")]
    QueueFull,
    /// The owning session has terminated and dropped its receiver.
    #[error("connection closed")]
    Closed,
}

/// Non-owning handle to a live connection, held by the registry.
///
/// Cloning is cheap (the sender and token are reference-counted). The
/// handle never blocks: [`ConnectionHandle::send`] is a `try_send` into a
/// bounded queue drained by the session's writer half.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection identity, unique per accepted socket.
    pub id: ConnId,
    /// Store this connection is registered under.
    pub store_id: StoreId,
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Creates a handle together with the receiving half of its outbound
    /// queue. The session keeps the receiver and drains it into the socket.
    #[must_use]
    pub fn new(store_id: StoreId, queue_capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let handle = Self {
            id: ConnId::new(),
            store_id,
            tx,
            cancel: CancellationToken::new(),
        };
        (handle, rx)
    }

    /// Queues a frame for delivery without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::QueueFull`] when the bounded queue is full and
    /// [`SendError::Closed`] when the session has already terminated. Both
    /// count as write failures for eviction purposes.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Signals the owning session to terminate and run its cleanup path.
    ///
    /// Idempotent. Does not touch the registry; callers that evict must
    /// also unregister the handle.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once [`ConnectionHandle::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token the owning session selects on to observe eviction.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn store() -> StoreId {
        let Some(id) = StoreId::new("store-1") else {
            panic!("valid store id");
        };
        id
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ConnId::new(), ConnId::new());
    }

    #[tokio::test]
    async fn send_queues_frame() {
        let (handle, mut rx) = ConnectionHandle::new(store(), 4);
        let frame = Frame::Text(Bytes::from_static(b"hello"));
        assert!(handle.send(frame.clone()).is_ok());
        assert_eq!(rx.recv().await, Some(frame));
    }

    #[test]
    fn send_to_dropped_session_fails_closed() {
        let (handle, rx) = ConnectionHandle::new(store(), 4);
        drop(rx);
        assert_eq!(
            handle.send(Frame::Text(Bytes::from_static(b"x"))),
            Err(SendError::Closed)
        );
    }

    #[test]
    fn full_queue_fails_without_blocking() {
        let (handle, _rx) = ConnectionHandle::new(store(), 1);
        assert!(handle.send(Frame::Text(Bytes::from_static(b"a"))).is_ok());
        assert_eq!(
            handle.send(Frame::Text(Bytes::from_static(b"b"))),
            Err(SendError::QueueFull)
        );
    }

    #[test]
    fn classify_prefers_text_for_utf8() {
        let frame = Frame::classify(Bytes::from_static(b"{\"evt\":\"sale\"}"));
        assert!(matches!(frame, Frame::Text(_)));
    }

    #[test]
    fn classify_falls_back_to_binary() {
        let frame = Frame::classify(Bytes::from_static(&[0xff, 0xfe, 0x00]));
        assert!(matches!(frame, Frame::Binary(_)));
    }

    #[test]
    fn payload_is_kind_agnostic() {
        let bytes = Bytes::from_static(b"raw");
        assert_eq!(Frame::Text(bytes.clone()).payload(), &bytes);
        assert_eq!(Frame::Binary(bytes.clone()).payload(), &bytes);
    }

    #[test]
    fn close_is_idempotent_and_observable() {
        let (handle, _rx) = ConnectionHandle::new(store(), 1);
        assert!(!handle.is_closed());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert!(handle.cancel_token().is_cancelled());
    }
}
