//! Documents and queued edits

use serde::{Deserialize, Serialize};

/// A named document. Edits replace the whole document, never patch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    name: String,
    content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// An accepted edit waiting to be applied to the document table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub name: String,
    pub content: String,
}

impl PendingEdit {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

impl From<PendingEdit> for Document {
    fn from(edit: PendingEdit) -> Self {
        Document::new(edit.name, edit.content)
    }
}
