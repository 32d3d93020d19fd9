//! Per-connection session: registration, the read loop, and cleanup.
//!
//! A session owns its socket end-to-end. The registry only holds a
//! [`ConnectionHandle`] pointing at the session's bounded outbound queue;
//! the session drains that queue into the socket's writer half.
//!
//! Delivery ordering: the ingestion loop and a concurrent peer relay both
//! feed the same outbound queue, so the order in which a client observes
//! the two sources is unspecified.

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};

use crate::app_state::AppState;
use crate::domain::{ConnectionHandle, Frame, StoreId};

/// Runs the session for one accepted connection.
///
/// Registers the connection, then loops over inbound frames, the outbound
/// queue, the per-connection cancel token (broadcaster eviction), and the
/// process shutdown token. Every exit path converges on the single cleanup
/// block at the end, so unregistration runs exactly once per connection.
pub async fn run_session(socket: WebSocket, store_id: StoreId, state: AppState) {
    let (handle, mut outbound) =
        ConnectionHandle::new(store_id.clone(), state.config.session_queue_capacity);
    let conn_id = handle.id;
    let cancel = handle.cancel_token();
    state.registry.register(handle).await;
    tracing::info!(store_id = %store_id, conn_id = %conn_id, "connection registered");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Inbound frame from the client
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let frame = Frame::Text(Bytes::copy_from_slice(text.as_bytes()));
                        relay(&state, &store_id, frame).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        relay(&state, &store_id, Frame::Binary(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong, handled by axum
                    Some(Err(err)) => {
                        tracing::debug!(conn_id = %conn_id, error = %err, "read error");
                        break;
                    }
                }
            }
            // Payload queued by the broadcaster (stream event or peer relay)
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(to_message(frame)).await.is_err() {
                    break;
                }
            }
            // Evicted by the broadcaster after a write failure
            () = cancel.cancelled() => break,
            // Process shutdown
            () = state.shutdown.cancelled() => break,
        }
    }

    // Single mandatory cleanup path. Close notifications, read errors,
    // eviction, and shutdown all land here; unregister is idempotent.
    state.registry.unregister(&store_id, conn_id).await;
    tracing::info!(store_id = %store_id, conn_id = %conn_id, "connection closed");
}

/// Relays a client message verbatim to every connection in the same store,
/// preserving the frame kind it arrived with.
///
/// The sender is included: its own queue receives the frame like any
/// other member of the store's set.
async fn relay(state: &AppState, store_id: &StoreId, frame: Frame) {
    let delivered = state.broadcaster.broadcast_store(store_id, &frame).await;
    tracing::debug!(store_id = %store_id, delivered, "relayed peer message");
}

/// Converts a queued frame into its WebSocket message. The kind travels
/// with the frame, so a relayed binary payload stays binary even when its
/// bytes are valid UTF-8.
fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(bytes) => Message::text(String::from_utf8_lossy(&bytes).into_owned()),
        Frame::Binary(bytes) => Message::Binary(bytes),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn text_frame_stays_text() {
        let msg = to_message(Frame::Text(Bytes::from_static(b"{\"evt\":\"sale\"}")));
        assert!(matches!(msg, Message::Text(_)));
    }

    #[test]
    fn binary_frame_stays_binary_even_when_utf8() {
        let msg = to_message(Frame::Binary(Bytes::from_static(b"valid utf-8 bytes")));
        assert!(matches!(msg, Message::Binary(_)));
    }

    #[test]
    fn binary_frame_payload_is_untouched() {
        let bytes = Bytes::from_static(&[0xff, 0xfe, 0x00]);
        let msg = to_message(Frame::Binary(bytes.clone()));
        let Message::Binary(out) = msg else {
            panic!("expected binary frame");
        };
        assert_eq!(out, bytes);
    }
}
