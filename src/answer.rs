//! Answer synthesis.
//!
//! Retrieved chunks and the full corpus are assembled into a grounded
//! prompt; the model's reply is expected to end with a `Citations:` block
//! naming the paragraphs it relied on. The reply is turned into a table of
//! rows: the answer itself, the retrieved chunks, and every corpus
//! paragraph the citations block references.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::embedding::EmbeddingClient;
use crate::error::PipelineError;
use crate::generative::GenerativeClient;
use crate::index::VectorIndex;
use crate::models::{AnswerRow, RetrievedChunk};
use crate::retrieve::retrieve_chunks;
use crate::store::{self, PageContent};

pub const EMPTY_CORPUS_MESSAGE: &str =
    "No documents have been processed yet. Please upload some documents first.";

/// Answer a question against the ingested corpus.
///
/// With no documents ingested this short-circuits before any model call.
pub async fn answer_question(
    pool: &SqlitePool,
    embedder: &Arc<dyn EmbeddingClient>,
    index: &dyn VectorIndex,
    generator: &Arc<dyn GenerativeClient>,
    question: &str,
    k: usize,
) -> Result<Vec<AnswerRow>, PipelineError> {
    if store::count_documents(pool).await? == 0 {
        return Ok(vec![AnswerRow::new("Answer", EMPTY_CORPUS_MESSAGE, "", "")]);
    }

    let chunks = retrieve_chunks(embedder, index, question, k).await?;
    let corpus = store::corpus_content(pool).await?;

    let context = format_context(&chunks, &corpus);
    let prompt = build_qa_prompt(question, &context);

    let reply = generator
        .generate(&prompt)
        .await
        .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

    Ok(parse_answer_rows(&reply, &chunks, &corpus))
}

/// Assemble the context block: retrieved chunks first, then the complete
/// per-page content with numbered paragraphs for citation.
pub fn format_context(chunks: &[RetrievedChunk], corpus: &[PageContent]) -> String {
    let mut sections = Vec::new();

    for chunk in chunks {
        sections.push(format!(
            "[Doc ID: {}, Page: {}, Chunk: {}]\n{}",
            chunk.metadata.doc_id, chunk.metadata.page, chunk.metadata.chunk_index, chunk.text
        ));
    }

    for page in corpus {
        let mut section = format!(
            "[Doc ID: {}, Page: {}]\nContent: {}",
            page.doc_id, page.page, page.content
        );
        for (number, text) in &page.paragraphs {
            section.push_str(&format!("\n[Paragraph {}]: {}", number, text));
        }
        sections.push(section);
    }

    sections.join("\n\n")
}

pub fn build_qa_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a document analysis assistant. Answer the question using only the \
         provided context. Be concise and factual.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         After your answer, add a final line containing exactly \"Citations:\" followed by \
         one line per source you used, each in the form \
         [Doc ID: <doc id>, Page: <page number>, Paragraph: <paragraph number>]. \
         Cite only paragraphs that support your answer.",
        context, question
    )
}

/// Split the model reply into an answer row plus citation rows.
///
/// When the reply carries a non-empty citations block, every retrieved
/// chunk becomes a row, followed by a row per corpus paragraph whose
/// `[Doc ID: .., Page: .., Paragraph: ..]` tag appears in the block.
pub fn parse_answer_rows(
    reply: &str,
    chunks: &[RetrievedChunk],
    corpus: &[PageContent],
) -> Vec<AnswerRow> {
    let (answer_part, citations_block) = match reply.split_once("Citations:") {
        Some((a, c)) => (a, c),
        None => (reply, ""),
    };

    let mut rows = vec![AnswerRow::new("Answer", answer_part.trim(), "", "")];

    if citations_block.trim().is_empty() {
        return rows;
    }

    for chunk in chunks {
        rows.push(AnswerRow::new(
            chunk.metadata.doc_id.clone(),
            chunk.text.clone(),
            chunk.metadata.page.to_string(),
            chunk.metadata.chunk_index.to_string(),
        ));
    }

    for page in corpus {
        for (number, text) in &page.paragraphs {
            let tag = format!(
                "[Doc ID: {}, Page: {}, Paragraph: {}]",
                page.doc_id, page.page, number
            );
            if citations_block.contains(&tag) {
                rows.push(AnswerRow::new(
                    page.doc_id.clone(),
                    text.clone(),
                    page.page.to_string(),
                    number.to_string(),
                ));
            }
        }
    }

    rows
}
