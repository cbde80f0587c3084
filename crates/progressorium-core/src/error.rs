//! Error types for the progression engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Unknown lesson id: {0}")]
    UnknownLesson(u32),

    #[error("Unknown lesson slug: {0}")]
    UnknownSlug(String),

    #[error("XP award must be non-negative, got {0}")]
    NegativeXp(i64),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProgressError {
    pub fn code(&self) -> i32 {
        match self {
            ProgressError::UnknownLesson(_) => 1001,
            ProgressError::UnknownSlug(_) => 1002,
            ProgressError::NegativeXp(_) => 1003,
            ProgressError::InvalidCatalog(_) => 2001,
            ProgressError::InvalidConfig(_) => 2002,
            ProgressError::Io(_) => 3001,
            ProgressError::Json(_) => 3002,
            ProgressError::Toml(_) => 3003,
        }
    }

    /// Rejected completion events, as opposed to environment failures.
    pub fn is_invalid_event(&self) -> bool {
        matches!(
            self,
            ProgressError::UnknownLesson(_)
                | ProgressError::UnknownSlug(_)
                | ProgressError::NegativeXp(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProgressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            ProgressError::UnknownLesson(99),
            ProgressError::UnknownSlug("nope".to_string()),
            ProgressError::NegativeXp(-5),
            ProgressError::InvalidCatalog("x".to_string()),
            ProgressError::InvalidConfig("x".to_string()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_invalid_event_classification() {
        assert!(ProgressError::NegativeXp(-1).is_invalid_event());
        assert!(ProgressError::UnknownLesson(42).is_invalid_event());
        assert!(!ProgressError::InvalidConfig("step".to_string()).is_invalid_event());
    }

    #[test]
    fn test_display() {
        let err = ProgressError::NegativeXp(-10);
        assert_eq!(err.to_string(), "XP award must be non-negative, got -10");
    }
}
