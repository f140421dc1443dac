use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use relaybot_core::errors::StoreError;

pub mod poker;
pub mod settings;
pub mod vacation;

pub use poker::SqlPokerRepository;
pub use settings::SqlSettingsRepository;
pub use vacation::SqlVacationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Storage(error.to_string())
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}
