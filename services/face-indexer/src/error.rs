use std::fmt;
use thiserror::Error;

/// Pipeline stage a notification can be abandoned at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Detect,
    Index,
    Search,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Detect => "detect",
            Stage::Index => "index",
            Stage::Search => "search",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the external collaborators, one kind per pipeline stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("Error occurred while reading image from S3: {0}")]
    Fetch(String),

    #[error("Error occurred while detecting faces: {0}")]
    Detection(String),

    #[error("Error occurred while indexing faces: {0}")]
    Indexing(String),

    #[error("Error occurred while searching faces: {0}")]
    Search(String),

    #[error("Error occurred while storing face: {0}")]
    Persist(String),
}

impl StageError {
    /// The stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Fetch(_) => Stage::Fetch,
            StageError::Detection(_) => Stage::Detect,
            StageError::Indexing(_) => Stage::Index,
            StageError::Search(_) => Stage::Search,
            StageError::Persist(_) => Stage::Persist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage() {
        assert_eq!(StageError::Fetch("eof".into()).stage(), Stage::Fetch);
        assert_eq!(StageError::Search("throttled".into()).stage(), Stage::Search);
        assert_eq!(Stage::Index.to_string(), "index");
    }

    #[test]
    fn test_error_message_names_stage() {
        let err = StageError::Detection("InvalidImageFormatException".into());
        assert_eq!(
            err.to_string(),
            "Error occurred while detecting faces: InvalidImageFormatException"
        );
    }
}
