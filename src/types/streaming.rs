//! Types for streaming responses.

use serde::{Deserialize, Serialize};

/// An incremental fragment of generated text.
///
/// Every connector reduces its native stream to a sequence of these. The
/// last one is marked `is_final`; it may carry no text at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_final: bool,
}

impl Chunk {
    /// A non-terminal chunk carrying `content`.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_final: false,
        }
    }

    /// The terminal chunk, optionally with trailing content.
    pub fn terminal(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_final: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
