//! JSON artifacts describing a processed document.
//!
//! One artifact is written per ingested document so the extracted hierarchy
//! can be inspected or consumed without the database.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::Path;

use crate::error::PipelineError;
use crate::store;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentExport {
    pub document_id: String,
    pub filename: String,
    pub kind: String,
    pub created_at: i64,
    pub pages: Vec<PageExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageExport {
    pub page_number: i64,
    pub content: String,
    pub paragraphs: Vec<ParagraphExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParagraphExport {
    pub paragraph_number: i64,
    pub content: String,
}

/// Build the export view of a document from the database.
pub async fn build_export(
    pool: &SqlitePool,
    doc_id: &str,
) -> Result<Option<DocumentExport>, PipelineError> {
    let tree = match store::get_document_tree(pool, doc_id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    Ok(Some(DocumentExport {
        document_id: tree.document.id,
        filename: tree.document.filename,
        kind: tree.document.kind,
        created_at: tree.document.created_at,
        pages: tree
            .pages
            .into_iter()
            .map(|(page, paragraphs)| PageExport {
                page_number: page.page_number,
                content: page.content,
                paragraphs: paragraphs
                    .into_iter()
                    .map(|p| ParagraphExport {
                        paragraph_number: p.paragraph_number,
                        content: p.content,
                    })
                    .collect(),
            })
            .collect(),
    }))
}

pub fn write_export(export: &DocumentExport, path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(export)
        .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn read_export(path: &Path) -> Result<DocumentExport, PipelineError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| PipelineError::Io(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentExport {
        DocumentExport {
            document_id: "d1".into(),
            filename: "notes.txt".into(),
            kind: "text".into(),
            created_at: 1_700_000_000,
            pages: vec![PageExport {
                page_number: 1,
                content: "Alpha\n\nBeta".into(),
                paragraphs: vec![
                    ParagraphExport {
                        paragraph_number: 1,
                        content: "Alpha".into(),
                    },
                    ParagraphExport {
                        paragraph_number: 2,
                        content: "Beta".into(),
                    },
                ],
            }],
        }
    }

    #[test]
    fn export_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("d1.json");
        let export = sample();
        write_export(&export, &path).unwrap();
        assert_eq!(read_export(&path).unwrap(), export);
    }
}
