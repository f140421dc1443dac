use relaybot_core::errors::StoreError;
use thiserror::Error;

use crate::reply::ReplyError;

/// Failure raised while a robot handles one command.
///
/// The router renders it back to the channel as an error reply.
#[derive(Debug, Error)]
pub enum RobotError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Reply(#[from] ReplyError),
    #[error("missing arguments, expected: {usage}")]
    MissingArguments { usage: String },
    #[error("{0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use relaybot_core::errors::StoreError;

    use super::RobotError;

    #[test]
    fn store_errors_render_unchanged() {
        let error = RobotError::from(StoreError::Storage("disk full".to_owned()));
        assert_eq!(error.to_string(), "storage failure: disk full");
    }

    #[test]
    fn missing_arguments_show_usage() {
        let error = RobotError::MissingArguments { usage: "<vote>".to_owned() };
        assert_eq!(error.to_string(), "missing arguments, expected: <vote>");
    }
}
