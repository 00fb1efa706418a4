//! Error types for hierarchical text chunking

/// Error types for hierarchical chunking operations
///
/// Only collaborator failures abort a run. Overlap problems degrade to "no
/// overlap" and structural defects are reported by the integrity validator.
#[derive(thiserror::Error, Debug)]
pub enum ChunkingError {
    #[error("Sentence boundary detection failed: {0}")]
    SentenceDetection(String),

    #[error("Invalid sentence span {start}..{end} for text of {text_len} bytes")]
    InvalidSentenceSpan {
        start: usize,
        end: usize,
        text_len: usize,
    },

    #[error("Environment configuration error: {0}")]
    Environment(#[from] envy::Error),
}

/// Result type for chunking operations
pub type Result<T> = std::result::Result<T, ChunkingError>;

/// Trait for converting collaborator errors into chunking errors
pub trait IntoChunkingError<T> {
    fn into_chunking_error(self) -> Result<T>;
}

impl<T, E> IntoChunkingError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_chunking_error(self) -> Result<T> {
        self.map_err(|e| ChunkingError::SentenceDetection(e.to_string()))
    }
}

impl ChunkingError {
    pub fn sentence_detection<S: Into<String>>(msg: S) -> Self {
        Self::SentenceDetection(msg.into())
    }

    pub fn invalid_sentence_span(start: usize, end: usize, text_len: usize) -> Self {
        Self::InvalidSentenceSpan {
            start,
            end,
            text_len,
        }
    }

    /// Check if retrying with different input or collaborators may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            // detector may be transient (remote tokenizer, model load)
            Self::SentenceDetection(_) => true,
            Self::InvalidSentenceSpan { .. } => false,
            Self::Environment(_) => false,
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self {
            Self::SentenceDetection(_) => "sentence_detection",
            Self::InvalidSentenceSpan { .. } => "invalid_sentence_span",
            Self::Environment(_) => "environment",
        }
    }
}
