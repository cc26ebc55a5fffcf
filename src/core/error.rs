use crate::core::editor::Direction;
use thiserror::Error;

/// Core error types for fwedit
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An editor action addressed a rule slot that does not exist
    #[error("{direction} rule index {index} is out of range (have {len} rules)")]
    IndexOutOfRange {
        direction: Direction,
        index: usize,
        len: usize,
    },

    /// Configuration could not be used
    #[error("Configuration error: {0}")]
    Config(String),

    /// A prepared payload exceeds the API limit
    #[error("Rule set has {count} rules, the limit is {limit}")]
    TooManyRules { count: usize, limit: usize },
}

impl Error {
    pub(crate) fn out_of_range(direction: Direction, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange {
            direction,
            index,
            len,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_range_message() {
        let err = Error::out_of_range(Direction::Inbound, 4, 2);
        assert_eq!(
            err.to_string(),
            "inbound rule index 4 is out of range (have 2 rules)"
        );
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }
}
