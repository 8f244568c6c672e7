//! Room lifecycle outside of the real-time channel: creation and reaping.

use std::collections::HashSet;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{
    catalog::GenreFilter,
    dto::room::{CreateRoomRequest, CreateRoomResponse},
    error::ServiceError,
    state::SharedState,
};

/// Create a room playing a freshly fetched song and return its join code.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<CreateRoomResponse, ServiceError> {
    let genres = match request.genres {
        Some(genres) => GenreFilter::from_genres(&genres)
            .map_err(|err| ServiceError::InvalidInput(err.to_string()))?,
        None => GenreFilter::all(),
    };

    let song = state
        .catalog()
        .fetch_random_song(HashSet::new(), genres.clone())
        .await
        .inspect_err(|err| warn!(error = %err, "failed to fetch the first song of a room"))?;

    let room = state.rooms().create(song, genres, state.room_context());
    info!(room = %room.code(), rooms = state.rooms().len(), "room created");

    Ok(CreateRoomResponse {
        room_code: room.code().to_string(),
    })
}

/// Periodically drop rooms that stayed empty for longer than the configured TTL.
pub async fn run_room_reaper(state: SharedState) {
    let retention = state.config().retention;
    let mut ticker = interval(retention.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = state.rooms().sweep_abandoned(retention.empty_room_ttl);
        if removed > 0 {
            info!(removed, remaining = state.rooms().len(), "reaped abandoned rooms");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        catalog::Genre,
        config::AppConfig,
        state::{AppState, testing::StubCatalog},
    };

    #[tokio::test]
    async fn created_room_is_registered_under_its_code() {
        let catalog = StubCatalog::new(&["s1"]);
        let state = AppState::new(AppConfig::default(), catalog.clone());

        let response = create_room(
            &state,
            CreateRoomRequest {
                genres: Some(vec![Genre::Pop]),
            },
        )
        .await
        .unwrap();

        let room = state.rooms().get(&response.room_code).unwrap();
        let session = room.lock().await;
        assert_eq!(session.current_song().id, "s1");
        assert_eq!(session.genre_filter().to_vec(), vec![Genre::Pop]);
        assert!(catalog.requests()[0].0.is_empty());
    }

    #[tokio::test]
    async fn catalog_failure_creates_nothing() {
        let catalog = StubCatalog::new(&["s1"]);
        catalog.set_failing(true);
        let state = AppState::new(AppConfig::default(), catalog);

        let err = create_room(&state, CreateRoomRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
        assert!(state.rooms().is_empty());
    }

    #[tokio::test]
    async fn duplicate_genres_are_invalid_input() {
        let state = AppState::new(AppConfig::default(), StubCatalog::new(&["s1"]));
        let err = create_room(
            &state,
            CreateRoomRequest {
                genres: Some(vec![Genre::Pop, Genre::Pop]),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_removes_rooms_nobody_joined() {
        let mut config = AppConfig::default();
        config.retention.empty_room_ttl = Duration::from_secs(30);
        config.retention.sweep_interval = Duration::from_secs(10);
        let state = AppState::new(config, StubCatalog::new(&["s1"]));
        create_room(&state, CreateRoomRequest::default())
            .await
            .unwrap();

        let reaper = tokio::spawn(run_room_reaper(state.clone()));
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(state.rooms().len(), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(state.rooms().is_empty());
        reaper.abort();
    }
}
