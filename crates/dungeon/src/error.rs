use thiserror::Error;

/// Errors surfaced by the progression core.
///
/// Configuration problems are fatal at load time. Once a registry validates,
/// the only runtime error left is an out-of-range room lookup, which callers
/// should surface instead of silently skipping.
#[derive(Debug, Error)]
pub enum DungeonError {
    #[error("invalid dungeon configuration: {0}")]
    Configuration(String),

    #[error("room index {index} out of range (registry holds {len} rooms)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("a transition to room {target} is already in progress")]
    TransitionInProgress { target: usize },

    #[error("failed to read dungeon config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse dungeon config: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DungeonError>;
