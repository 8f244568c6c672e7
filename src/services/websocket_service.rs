//! Player WebSocket lifecycle: handshake, inbound dispatch, and departure.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        validation::validate_player_name,
        ws::{ClientMessage, ServerMessage, StatusFieldsError},
    },
    state::{
        SharedState,
        broadcast::Connection,
        player::PlayerId,
        room::{Room, SessionError, StatusUpdate},
    },
};

/// Reasons an inbound frame could not be applied.
///
/// Each one is reported to the sender as an `error` event; the connection stays open.
#[derive(Debug, Error)]
enum ClientError {
    /// The frame is not a valid envelope.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The envelope names an event this server does not handle.
    #[error("unknown event")]
    UnknownEvent,
    /// `player_init` sent after the handshake.
    #[error("already joined this room")]
    AlreadyJoined,
    /// Binary frames carry no protocol meaning.
    #[error("binary frames are not supported")]
    Binary,
    /// `update_status` fields do not form a submission.
    #[error(transparent)]
    Status(#[from] StatusFieldsError),
    /// The room refused the request in its current state.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Reasons a connection is turned away before joining a room.
#[derive(Debug, Error)]
enum JoinError {
    #[error("room `{0}` not found")]
    UnknownRoom(String),
    #[error("expected a player_init message")]
    NotInit,
    #[error("timed out waiting for player_init")]
    Timeout,
    #[error("playerName is required")]
    MissingName,
    #[error("{0}")]
    InvalidName(String),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Handle the full lifecycle of one player's WebSocket connection to room `code`.
pub async fn handle_socket(state: SharedState, code: String, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });
    let connection = Connection::new(outbound_tx.clone());

    let Some(room) = state.rooms().get(&code) else {
        reject(&connection, JoinError::UnknownRoom(code));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let first = tokio::time::timeout(state.config().handshake_timeout, receiver.next()).await;
    let init_text = match first {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            reject(&connection, JoinError::NotInit);
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(room = %room.code(), error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(_) => {
            reject(&connection, JoinError::Timeout);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let (name, claimed_id) = match parse_player_init(&state, init_text.as_str()) {
        Ok(init) => init,
        Err(err) => {
            reject(&connection, err);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_id = room.lock().await.join(name, claimed_id, connection.clone());

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(room = %room.code(), player_id = %player_id, payload = %text, "received player message");
                if let Err(err) = handle_text(&room, player_id, &connection, text.as_str()).await {
                    warn!(room = %room.code(), player_id = %player_id, error = %err, "rejected player message");
                    connection.send(&ServerMessage::error(err.to_string()));
                }
            }
            Ok(Message::Binary(_)) => {
                connection.send(&ServerMessage::error(ClientError::Binary.to_string()));
            }
            Ok(Message::Ping(payload)) => {
                connection.send_frame(Message::Pong(payload));
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                connection.send_frame(Message::Close(frame));
                break;
            }
            Err(err) => {
                warn!(room = %room.code(), player_id = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room.lock().await.leave(player_id);
    info!(room = %room.code(), player_id = %player_id, "player connection closed");

    finalize(writer_task, outbound_tx).await;
}

/// Extract the name and the reconnect id from the handshake frame.
fn parse_player_init(
    state: &SharedState,
    text: &str,
) -> Result<(String, Option<PlayerId>), JoinError> {
    let ClientMessage::PlayerInit {
        player_name,
        player_id,
    } = ClientMessage::from_json_str(text)?
    else {
        return Err(JoinError::NotInit);
    };

    let name = player_name.ok_or(JoinError::MissingName)?;
    validate_player_name(&name, &state.config().banned_names).map_err(|err| {
        JoinError::InvalidName(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| err.code.into_owned()),
        )
    })?;

    // An id that does not parse simply cannot match a remembered player.
    let claimed_id = player_id.and_then(|id| Uuid::parse_str(&id).ok());
    Ok((name, claimed_id))
}

/// Apply one inbound envelope from a joined player.
async fn handle_text(
    room: &Arc<Room>,
    player_id: PlayerId,
    connection: &Connection,
    text: &str,
) -> Result<(), ClientError> {
    match ClientMessage::from_json_str(text)? {
        ClientMessage::UpdateStatus {
            status,
            song_name,
            song_artist,
        } => {
            let update = StatusUpdate::from_fields(status, song_name, song_artist)?;
            room.lock().await.submit_status(player_id, update)?;
        }
        ClientMessage::UpdateIdle { player_idle } => {
            room.lock().await.set_idle(player_id, player_idle)?;
        }
        ClientMessage::PlayerReady => {
            room.lock().await.vote_ready(player_id)?;
        }
        ClientMessage::UpdateGenres { song_genres } => {
            room.lock()
                .await
                .update_genres(player_id, song_genres.as_slice())?;
        }
        ClientMessage::Ping => {
            connection.send(&ServerMessage::Pong);
        }
        ClientMessage::PlayerInit { .. } => return Err(ClientError::AlreadyJoined),
        ClientMessage::Unknown => return Err(ClientError::UnknownEvent),
    }
    Ok(())
}

/// Report a join failure and ask the writer to close the socket.
fn reject(connection: &Connection, err: JoinError) {
    warn!(error = %err, "rejected websocket connection");
    connection.send(&ServerMessage::error(err.to_string()));
    connection.close();
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::{
        catalog::GenreFilter,
        config::AppConfig,
        state::{
            AppState,
            testing::{StubCatalog, TestClient, context, named, song},
        },
    };

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), StubCatalog::new(&["s1", "s2"]))
    }

    async fn joined_room() -> (Arc<Room>, PlayerId, Connection, TestClient) {
        let room = Room::new("ABCDE".into(), song("s1"), GenreFilter::all(), context(&["s1"]));
        let (connection, mut client) = TestClient::new();
        let id = room
            .lock()
            .await
            .join("alice".into(), None, connection.clone());
        client.drain();
        (room, id, connection, client)
    }

    fn last_error(events: &[Value]) -> String {
        named(events, "error")
            .last()
            .and_then(|event| event["message"].as_str())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn handshake_requires_a_valid_player_init() {
        let state = state();

        let (name, id) = parse_player_init(
            &state,
            r#"{"event": "player_init", "playerName": "alice", "playerId": "not-a-uuid"}"#,
        )
        .unwrap();
        assert_eq!(name, "alice");
        assert_eq!(id, None);

        let known = Uuid::new_v4();
        let text = format!(r#"{{"event": "player_init", "playerName": "bob", "playerId": "{known}"}}"#);
        assert_eq!(parse_player_init(&state, &text).unwrap().1, Some(known));

        assert!(matches!(
            parse_player_init(&state, r#"{"event": "ping"}"#),
            Err(JoinError::NotInit)
        ));
        assert!(matches!(
            parse_player_init(&state, r#"{"event": "player_init"}"#),
            Err(JoinError::MissingName)
        ));
        assert!(matches!(
            parse_player_init(&state, r#"{"event": "player_init", "playerName": "superadmin"}"#),
            Err(JoinError::InvalidName(_))
        ));
        assert!(matches!(
            parse_player_init(&state, "{"),
            Err(JoinError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn protocol_errors_keep_the_player_in_the_room() {
        let (room, id, connection, _client) = joined_room().await;

        for text in [
            "garbage",
            r#"{"songName": "x"}"#,
            r#"{"event": "dance"}"#,
            r#"{"event": "player_init", "playerName": "alice"}"#,
            r#"{"event": "update_status", "songName": "only a name"}"#,
        ] {
            assert!(handle_text(&room, id, &connection, text).await.is_err());
        }
        assert!(room.lock().await.roster().contains(&id));
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (room, id, connection, mut client) = joined_room().await;
        handle_text(&room, id, &connection, r#"{"event": "ping"}"#)
            .await
            .unwrap();
        assert_eq!(client.drain_names(), vec!["pong"]);
    }

    #[tokio::test]
    async fn state_errors_do_not_mutate_the_room() {
        let (room, id, connection, mut client) = joined_room().await;

        handle_text(&room, id, &connection, r#"{"event": "update_status", "status": "skip"}"#)
            .await
            .unwrap();
        client.drain();

        let err = handle_text(&room, id, &connection, r#"{"event": "player_ready"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Session(SessionError::NotInReadyCheck)));

        let err = handle_text(
            &room,
            id,
            &connection,
            r#"{"event": "update_genres", "songGenres": []}"#,
        )
        .await
        .unwrap_err();
        connection.send(&ServerMessage::error(err.to_string()));
        assert!(last_error(&client.drain()).starts_with("invalid genre selection"));
        assert_eq!(room.lock().await.genre_filter(), &GenreFilter::all());
    }

    #[tokio::test]
    async fn rejected_join_sends_error_then_close() {
        let (connection, mut client) = TestClient::new();
        reject(&connection, JoinError::UnknownRoom("ZZZZZ".into()));

        let events = client.drain();
        assert_eq!(last_error(&events), "room `ZZZZZ` not found");
        assert!(client.saw_close());
    }
}
