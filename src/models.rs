//! Core data models used throughout Corpus QA.
//!
//! These types represent the document hierarchy persisted in SQLite, the
//! chunks stored in the vector index, and the answer rows produced by the
//! synthesis pipeline.

use serde::{Deserialize, Serialize};

/// Detected document kind, derived from the source filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Text,
}

impl DocumentKind {
    /// Map a filename extension to a kind. `jpg`/`jpeg`/`png` are images,
    /// `pdf` is a PDF, `txt` is plain text. Anything else is unsupported.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "image" => Some(Self::Image),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document record stored in SQLite. Content fields are stable once
/// extraction completes; only pages and paragraphs hang off it.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub kind: String,
    pub original_path: String,
    pub processed_path: String,
    pub created_at: i64,
}

/// A single page of extracted text, 1-based within its document.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: String,
    pub document_id: String,
    pub page_number: i64,
    pub content: String,
}

/// A trimmed paragraph within a page. Numbering comes from the position in
/// the pre-filter blank-line split, so numbers may have gaps.
#[derive(Debug, Clone)]
pub struct Paragraph {
    pub id: String,
    pub page_id: String,
    pub paragraph_number: i64,
    pub content: String,
}

/// Location metadata carried with every vector-index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub page: i64,
    pub chunk_index: i64,
}

impl ChunkMetadata {
    /// Stable identity key for the vector index.
    pub fn key(&self) -> String {
        format!("{}_page{}_chunk{}", self.doc_id, self.page, self.chunk_index)
    }
}

/// A ranked match returned from the vector index, nearest first.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f64,
}

/// One row of the synthesized answer/theme table. All fields are strings;
/// empty `page`/`paragraph` mean "not applicable" (answer and theme rows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRow {
    pub source_label: String,
    pub content: String,
    pub page: String,
    pub paragraph: String,
}

impl AnswerRow {
    pub fn new(
        source_label: impl Into<String>,
        content: impl Into<String>,
        page: impl Into<String>,
        paragraph: impl Into<String>,
    ) -> Self {
        Self {
            source_label: source_label.into(),
            content: content.into(),
            page: page.into(),
            paragraph: paragraph.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("a.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::from_filename("scan.jpeg"),
            Some(DocumentKind::Image)
        );
        assert_eq!(
            DocumentKind::from_filename("notes.txt"),
            Some(DocumentKind::Text)
        );
        assert_eq!(DocumentKind::from_filename("sheet.xlsx"), None);
        assert_eq!(DocumentKind::from_filename("noext"), None);
    }

    #[test]
    fn chunk_key_format() {
        let meta = ChunkMetadata {
            doc_id: "d1".into(),
            page: 3,
            chunk_index: 0,
        };
        assert_eq!(meta.key(), "d1_page3_chunk0");
    }
}
