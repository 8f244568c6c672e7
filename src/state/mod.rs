//! Shared application state and the per-room session model.

pub mod broadcast;
pub mod judge;
pub mod phase;
pub mod player;
pub mod registry;
pub mod room;
pub mod scoring;
#[cfg(test)]
pub(crate) mod testing;
pub mod timer;

use std::sync::Arc;

use crate::{catalog::SongCatalog, config::AppConfig};

use self::{registry::RoomRegistry, room::RoomContext};

pub type SharedState = Arc<AppState>;

/// Central application state: the live rooms and the collaborators they share.
pub struct AppState {
    rooms: RoomRegistry,
    config: Arc<AppConfig>,
    catalog: Arc<dyn SongCatalog>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, catalog: Arc<dyn SongCatalog>) -> SharedState {
        Arc::new(Self {
            rooms: RoomRegistry::new(),
            config: Arc::new(config),
            catalog,
        })
    }

    /// Loaded application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Song provider used for new rooms and next-song fetches.
    pub fn catalog(&self) -> Arc<dyn SongCatalog> {
        self.catalog.clone()
    }

    /// Registry of live rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Collaborators handed to every room created from now on.
    pub fn room_context(&self) -> RoomContext {
        RoomContext {
            catalog: self.catalog.clone(),
            rules: self.config.rules,
            retention: self.config.retention,
        }
    }
}
