//! DTO definitions used by the room REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog::Genre;

/// Optional settings for a new room.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Genres the room starts with; every genre when omitted.
    #[serde(default)]
    #[validate(length(min = 1, max = 4))]
    pub genres: Option<Vec<Genre>>,
}

/// Code of the freshly created room.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoomResponse {
    #[serde(rename = "roomCode")]
    pub room_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genres_are_optional_but_never_empty() {
        let request: CreateRoomRequest = serde_json::from_str("{}").unwrap();
        assert!(request.validate().is_ok());

        let request: CreateRoomRequest =
            serde_json::from_str(r#"{"genres": ["Pop", "HipHop"]}"#).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.genres, Some(vec![Genre::Pop, Genre::HipHop]));

        let request: CreateRoomRequest = serde_json::from_str(r#"{"genres": []}"#).unwrap();
        assert!(request.validate().is_err());

        assert!(serde_json::from_str::<CreateRoomRequest>(r#"{"genres": ["Polka"]}"#).is_err());
    }
}
