use thiserror::Error;

/// Failure raised by a persistence port.
///
/// Callers propagate it unchanged; only the command router renders it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("invalid numeric value for {field}: `{value}`")]
    InvalidNumber { field: &'static str, value: String },
}

impl StoreError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidNumber { .. })
    }
}

/// Coerces user-supplied numeric text (`"3"`, `"2.5"`) the way the storage layer does.
pub fn parse_number(field: &'static str, raw: &str) -> Result<f64, StoreError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| StoreError::InvalidNumber { field, value: raw.to_owned() })
}

#[cfg(test)]
mod tests {
    use crate::errors::{parse_number, StoreError};

    #[test]
    fn parses_integer_and_fractional_hours() {
        assert_eq!(parse_number("vote", "3"), Ok(3.0));
        assert_eq!(parse_number("estimation", " 2.5 "), Ok(2.5));
    }

    #[test]
    fn rejects_non_numeric_text() {
        let error = parse_number("vote", "lots").expect_err("must fail");
        assert!(error.is_invalid_input());
        assert_eq!(error.to_string(), "invalid numeric value for vote: `lots`");
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(matches!(parse_number("vote", "NaN"), Err(StoreError::InvalidNumber { .. })));
        assert!(matches!(parse_number("vote", "inf"), Err(StoreError::InvalidNumber { .. })));
    }

    #[test]
    fn storage_failures_keep_their_message() {
        let error = StoreError::Storage("database is locked".to_owned());
        assert_eq!(error.to_string(), "storage failure: database is locked");
        assert!(!error.is_invalid_input());
    }
}
