//! Fan-out of server events to the WebSocket connections of a room.
//!
//! Delivery is best-effort: every connection owns an unbounded writer queue, a send
//! never blocks, and a send to a closed connection is dropped without retry.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dto::ws::ServerMessage;

/// Handle used to push frames to one connected client.
#[derive(Debug, Clone)]
pub struct Connection {
    tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Wrap the sending half of a connection's writer queue.
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// Serialize `message` and queue it; returns `false` when nothing was queued.
    pub fn send(&self, message: &ServerMessage) -> bool {
        match encode(message) {
            Some(frame) => self.send_frame(frame),
            None => false,
        }
    }

    /// Queue an already encoded frame.
    pub fn send_frame(&self, frame: Message) -> bool {
        self.tx.send(frame).is_ok()
    }

    /// Ask the writer to close the socket once pending frames are flushed.
    pub fn close(&self) {
        let _ = self.tx.send(Message::Close(None));
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Serialize a server event into a text frame.
///
/// Serialization failure is a bug in the event types, so it is logged and the event
/// is dropped rather than retried.
pub fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}

/// Send `message` to every connection, returning how many accepted it.
pub fn fan_out<'a, I>(targets: I, message: &ServerMessage) -> usize
where
    I: IntoIterator<Item = &'a Connection>,
{
    let Some(frame) = encode(message) else {
        return 0;
    };

    let mut delivered = 0;
    let mut skipped = 0;
    for connection in targets {
        if connection.send_frame(frame.clone()) {
            delivered += 1;
        } else {
            skipped += 1;
        }
    }
    debug!(delivered, skipped, "broadcast event");
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (Connection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    #[test]
    fn fan_out_skips_closed_connections() {
        let (open, mut open_rx) = connection();
        let (closed, closed_rx) = connection();
        drop(closed_rx);

        let delivered = fan_out([&open, &closed], &ServerMessage::Pong);
        assert_eq!(delivered, 1);
        assert!(closed.is_closed());

        match open_rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"event":"pong"}"#),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn close_queues_a_close_frame() {
        let (conn, mut rx) = connection();
        conn.close();
        assert!(matches!(rx.try_recv().unwrap(), Message::Close(None)));
    }
}
