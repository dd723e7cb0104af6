//! Error taxonomy for the recommender.
//!
//! Unknown IDs are a designed failure: the engine performs no cold-start
//! fallback, so a user or item absent from the training transactions
//! surfaces as a lookup error rather than a guessed recommendation.

pub type Result<T> = std::result::Result<T, RecsError>;

#[derive(Debug, thiserror::Error)]
pub enum RecsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("user {0} not present in training data")]
    UserNotFound(u64),

    #[error("item {0} not present in training data")]
    ItemNotFound(u64),

    #[error("index {index} out of range ({len} trained)")]
    InvalidIndex { index: usize, len: usize },

    #[error("degenerate model: {0}")]
    DegenerateModel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecsError::UserNotFound(42);
        assert_eq!(err.to_string(), "user 42 not present in training data");

        let err = RecsError::InvalidIndex { index: 9, len: 3 };
        assert_eq!(err.to_string(), "index 9 out of range (3 trained)");
    }
}
