use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::room::{CreateRoomRequest, CreateRoomResponse},
    error::AppError,
    services::{room_service, websocket_service},
    state::SharedState,
};

/// Routes creating rooms and opening their real-time channel.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/room", post(create_room))
        .route("/api/v1/room/{code}", get(ws_handler))
}

/// Create a room and fetch the song of its first game.
#[utoipa::path(
    post,
    path = "/api/v1/room",
    tag = "room",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = CreateRoomResponse),
        (status = 400, description = "Invalid genre selection"),
        (status = 503, description = "The song catalog could not provide a song")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    payload: Option<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    request.validate()?;
    let response = room_service::create_room(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/room/{code}",
    tag = "room",
    params(("code" = String, Path, description = "Five-character room code")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a player WebSocket session for room `code`.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, code, socket))
}
