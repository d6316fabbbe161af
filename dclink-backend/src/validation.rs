/// Input validation functions for all backend routes
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Player name cannot be empty")]
    PlayerNameEmpty,

    #[error("Player name too long (max 16 characters, got {0})")]
    PlayerNameTooLong(usize),

    #[error("Player name contains invalid characters (only alphanumeric and underscore allowed)")]
    PlayerNameInvalidChars,

    #[error("Malformed account UUID (expected dashed 36-char form)")]
    UuidMalformed,

    #[error("World day out of range")]
    WorldDayOutOfRange,

    #[error("World time out of range (0..24000 ticks)")]
    WorldTimeOutOfRange,
}

/// Validates a Minecraft player name
///
/// Rules:
/// - Cannot be empty
/// - Max 16 characters (Minecraft username limit)
/// - Only alphanumeric characters and underscores
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::PlayerNameEmpty);
    }

    if name.len() > 16 {
        return Err(ValidationError::PlayerNameTooLong(name.len()));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ValidationError::PlayerNameInvalidChars);
    }

    Ok(())
}

/// Validates a dashed Minecraft account UUID
/// (8-4-4-4-12 hex groups, as stored in the link table)
pub fn validate_uuid(uuid: &str) -> Result<(), ValidationError> {
    let dash_positions = [8, 13, 18, 23];
    if uuid.len() != 36 {
        return Err(ValidationError::UuidMalformed);
    }

    for (i, c) in uuid.chars().enumerate() {
        if dash_positions.contains(&i) {
            if c != '-' {
                return Err(ValidationError::UuidMalformed);
            }
        } else if !c.is_ascii_hexdigit() {
            return Err(ValidationError::UuidMalformed);
        }
    }

    Ok(())
}

/// Validates a pushed world status
///
/// Rules:
/// - Day must be non-negative
/// - Time of day is a tick count within a single Minecraft day
pub fn validate_world_status(day: i64, time: i64) -> Result<(), ValidationError> {
    if day < 0 {
        return Err(ValidationError::WorldDayOutOfRange);
    }

    if !(0..24000).contains(&time) {
        return Err(ValidationError::WorldTimeOutOfRange);
    }

    Ok(())
}
