//! Validation helpers for DTOs.

use validator::ValidationError;

/// Shortest accepted player name.
pub const MIN_NAME_LEN: usize = 3;
/// Longest accepted player name.
pub const MAX_NAME_LEN: usize = 20;

/// Validates a player name: 3 to 20 ASCII alphanumerics, containing no banned word.
///
/// Banned words match case-insensitively anywhere in the name.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("alice", &[]) // Ok
/// validate_player_name("al", &[])    // Err - too short
/// validate_player_name("MrHost", &["host".into()]) // Err - banned
/// ```
pub fn validate_player_name(name: &str, banned: &[String]) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters (got {len})")
                .into(),
        );
        return Err(err);
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("player_name_charset");
        err.message = Some("Name must contain only letters and digits".into());
        return Err(err);
    }

    let lowered = name.to_ascii_lowercase();
    if banned
        .iter()
        .map(|word| word.to_ascii_lowercase())
        .any(|word| !word.is_empty() && lowered.contains(&word))
    {
        let mut err = ValidationError::new("player_name_banned");
        err.message = Some("This name is not allowed".into());
        return Err(err);
    }

    Ok(())
}
