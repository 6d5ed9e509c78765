//! Relational persistence for the document hierarchy.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::index::VectorIndex;
use crate::models::{Document, Page, Paragraph};

/// Page content with its paragraphs, as assembled for answer synthesis.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub doc_id: String,
    pub page: i64,
    pub content: String,
    pub paragraphs: Vec<(i64, String)>,
}

/// Split page text into numbered paragraphs. Numbering is 1-based over the
/// raw blank-line split, so filtered-out empty sections leave gaps.
pub fn paragraph_candidates(text: &str) -> Vec<(i64, String)> {
    text.split("\n\n")
        .enumerate()
        .filter_map(|(i, para)| {
            let trimmed = para.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some((i as i64 + 1, trimmed.to_string()))
            }
        })
        .collect()
}

pub async fn insert_document(pool: &SqlitePool, doc: &Document) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, filename, kind, original_path, processed_path, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.filename)
    .bind(&doc.kind)
    .bind(&doc.original_path)
    .bind(&doc.processed_path)
    .bind(doc.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a page and its paragraphs, returning the page id.
pub async fn insert_page(
    pool: &SqlitePool,
    document_id: &str,
    page_number: i64,
    content: &str,
) -> Result<String, PipelineError> {
    let page_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO pages (id, document_id, page_number, content) VALUES (?, ?, ?, ?)",
    )
    .bind(&page_id)
    .bind(document_id)
    .bind(page_number)
    .bind(content)
    .execute(pool)
    .await?;

    for (number, para) in paragraph_candidates(content) {
        sqlx::query(
            "INSERT INTO paragraphs (id, page_id, paragraph_number, content) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&page_id)
        .bind(number)
        .bind(para)
        .execute(pool)
        .await?;
    }

    Ok(page_id)
}

pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>, PipelineError> {
    let rows = sqlx::query(
        "SELECT id, filename, kind, original_path, processed_path, created_at \
         FROM documents ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(document_from_row).collect())
}

pub async fn get_document(
    pool: &SqlitePool,
    doc_id: &str,
) -> Result<Option<Document>, PipelineError> {
    let row = sqlx::query(
        "SELECT id, filename, kind, original_path, processed_path, created_at \
         FROM documents WHERE id = ?",
    )
    .bind(doc_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(document_from_row))
}

fn document_from_row(row: sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        filename: row.get("filename"),
        kind: row.get("kind"),
        original_path: row.get("original_path"),
        processed_path: row.get("processed_path"),
        created_at: row.get("created_at"),
    }
}

/// A document with its full page and paragraph hierarchy.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    pub document: Document,
    pub pages: Vec<(Page, Vec<Paragraph>)>,
}

pub async fn get_document_tree(
    pool: &SqlitePool,
    doc_id: &str,
) -> Result<Option<DocumentTree>, PipelineError> {
    let document = match get_document(pool, doc_id).await? {
        Some(d) => d,
        None => return Ok(None),
    };

    let page_rows = sqlx::query(
        "SELECT id, document_id, page_number, content FROM pages \
         WHERE document_id = ? ORDER BY page_number",
    )
    .bind(doc_id)
    .fetch_all(pool)
    .await?;

    let mut pages = Vec::with_capacity(page_rows.len());
    for row in page_rows {
        let page = Page {
            id: row.get("id"),
            document_id: row.get("document_id"),
            page_number: row.get("page_number"),
            content: row.get("content"),
        };

        let para_rows = sqlx::query(
            "SELECT id, page_id, paragraph_number, content FROM paragraphs \
             WHERE page_id = ? ORDER BY paragraph_number",
        )
        .bind(&page.id)
        .fetch_all(pool)
        .await?;

        let paragraphs = para_rows
            .into_iter()
            .map(|r| Paragraph {
                id: r.get("id"),
                page_id: r.get("page_id"),
                paragraph_number: r.get("paragraph_number"),
                content: r.get("content"),
            })
            .collect();

        pages.push((page, paragraphs));
    }

    Ok(Some(DocumentTree { document, pages }))
}

/// Fetch every page of every document with paragraphs attached, ordered by
/// document then page number.
pub async fn corpus_content(pool: &SqlitePool) -> Result<Vec<PageContent>, PipelineError> {
    let rows = sqlx::query(
        "SELECT p.id, p.document_id, p.page_number, p.content FROM pages p \
         JOIN documents d ON d.id = p.document_id \
         ORDER BY d.created_at, d.id, p.page_number",
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let page_id: String = row.get("id");
        let para_rows = sqlx::query(
            "SELECT paragraph_number, content FROM paragraphs \
             WHERE page_id = ? ORDER BY paragraph_number",
        )
        .bind(&page_id)
        .fetch_all(pool)
        .await?;

        out.push(PageContent {
            doc_id: row.get("document_id"),
            page: row.get("page_number"),
            content: row.get("content"),
            paragraphs: para_rows
                .into_iter()
                .map(|r| (r.get("paragraph_number"), r.get("content")))
                .collect(),
        });
    }

    Ok(out)
}

pub async fn count_documents(pool: &SqlitePool) -> Result<i64, PipelineError> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM documents")
        .fetch_one(pool)
        .await?;
    Ok(row.get("n"))
}

/// Delete a document everywhere. Vector entries go first so a failure
/// part-way never leaves dangling vectors for a missing document.
pub async fn delete_document(
    pool: &SqlitePool,
    index: &dyn VectorIndex,
    doc_id: &str,
) -> Result<bool, PipelineError> {
    if get_document(pool, doc_id).await?.is_none() {
        return Ok(false);
    }

    index.delete_document(doc_id).await?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        "DELETE FROM paragraphs WHERE page_id IN (SELECT id FROM pages WHERE document_id = ?)",
    )
    .bind(doc_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM pages WHERE document_id = ?")
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(true)
}

/// Remove every document, page, paragraph, and vector entry.
pub async fn clear_all(pool: &SqlitePool, index: &dyn VectorIndex) -> Result<(), PipelineError> {
    index.clear().await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM paragraphs").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM pages").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(())
}
