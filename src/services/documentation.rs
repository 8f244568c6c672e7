use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the room server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::create_room,
        crate::routes::room::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::CreateRoomResponse,
            crate::dto::ws::ServerMessage,
            crate::catalog::Genre,
            crate::state::player::PlayerStatus,
            crate::state::phase::RoomPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "room", description = "Room creation and the player WebSocket channel"),
    )
)]
pub struct ApiDoc;
