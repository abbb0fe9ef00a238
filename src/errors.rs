use std::fmt;

use thiserror::Error;

pub type BotResult<T> = Result<T, BotError>;

/// What a gate mutation or lookup resolved a name to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Command,
    Module,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Command => write!(f, "command"),
            EntityKind::Module => write!(f, "module"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("The queue is currently full. Please retry again after a few seconds.")]
    QueueFull,
    #[error("This **{0}** is already disabled.")]
    AlreadyDisabled(EntityKind),
    #[error("This **{0}** is not disabled.")]
    AlreadyEnabled(EntityKind),
    #[error("This module cannot be disabled.")]
    ProtectedEntity,
    #[error("This {0} is currently disabled.")]
    EntityDisabled(EntityKind),
    #[error("No command or module called `{0}` exists.")]
    UnknownEntity(String),
    #[error("{0}")]
    ValidationFailed(String),
    #[error("{0}")]
    Rejected(String),
    #[error("This interaction has already ended.")]
    SessionEnded,
    #[error("Timed out before a decision was made.")]
    Timeout,
    #[error("Upstream call failed: {0}")]
    ExternalCallFailed(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),
}

impl BotError {
    /// Whether the message can be shown to the user as is.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, BotError::Database(_) | BotError::Pool(_) | BotError::Discord(_) | BotError::ExternalCallFailed(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            BotError::ExternalCallFailed(_) => "Something went wrong while contacting the upstream service. Please try again later.".to_string(),
            e if e.is_user_facing() => e.to_string(),
            _ => "Something went wrong on my side. The error has been logged.".to_string(),
        }
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::ExternalCallFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_errors_name_the_entity_kind() {
        assert_eq!(BotError::AlreadyDisabled(EntityKind::Command).to_string(), "This **command** is already disabled.");
        assert_eq!(BotError::AlreadyEnabled(EntityKind::Module).to_string(), "This **module** is not disabled.");
        assert_eq!(BotError::EntityDisabled(EntityKind::Module).to_string(), "This module is currently disabled.");
    }

    #[test]
    fn infrastructure_errors_are_masked() {
        let err = BotError::Database(rusqlite::Error::QueryReturnedNoRows);
        assert!(!err.is_user_facing());
        assert!(err.user_message().contains("logged"));

        let err = BotError::ExternalCallFailed("502 bad gateway".to_string());
        assert!(!err.user_message().contains("502"));

        let err = BotError::ValidationFailed("Input must be an integer.".to_string());
        assert_eq!(err.user_message(), "Input must be an integer.");
    }
}
