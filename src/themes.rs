//! Theme synthesis across answer rows.
//!
//! Takes the citation rows produced by answer synthesis and asks the model
//! to identify common themes, then parses the structured reply back into
//! rows: one per theme, followed by one per supporting citation.

use std::sync::Arc;

use crate::error::PipelineError;
use crate::generative::GenerativeClient;
use crate::models::AnswerRow;

pub const NO_EVIDENCE_MESSAGE: &str = "No document answers available for theme analysis.";

/// Identify common themes across the document evidence in `rows`.
///
/// Only a fully empty row set short-circuits; an answer row with no
/// document evidence still prompts the model, whose zero-theme reply then
/// parses to zero rows.
pub async fn synthesize_themes(
    generator: &Arc<dyn GenerativeClient>,
    rows: &[AnswerRow],
) -> Result<Vec<AnswerRow>, PipelineError> {
    if rows.is_empty() {
        return Ok(vec![AnswerRow::new(
            "Theme Analysis",
            NO_EVIDENCE_MESSAGE,
            "",
            "",
        )]);
    }

    let evidence: Vec<&AnswerRow> = rows.iter().filter(|r| r.source_label != "Answer").collect();
    let prompt = build_theme_prompt(&evidence);
    let reply = generator
        .generate(&prompt)
        .await
        .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

    Ok(parse_theme_rows(&reply))
}

fn build_theme_prompt(evidence: &[&AnswerRow]) -> String {
    let body = evidence
        .iter()
        .map(|r| {
            format!(
                "Document {} (Page {}, Paragraph {}):\n{}",
                r.source_label, r.page, r.paragraph, r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Identify the common themes across the following document excerpts. \
         For each theme, output a block in exactly this format, with blocks \
         separated by a blank line:\n\n\
         Theme <short name>\n\
         Summary: <one or two sentences>\n\
         Supported by: [Doc ID: <doc id>, Page: <page>, Paragraph: <paragraph>] \
         (repeat the bracketed citation for each supporting excerpt)\n\n\
         Excerpts:\n\n{}",
        body
    )
}

/// Parse the theme reply. Each blank-line-separated section becomes a theme
/// row; its `Supported by:` citations become one evidence row each.
pub fn parse_theme_rows(reply: &str) -> Vec<AnswerRow> {
    let mut rows = Vec::new();

    for section in reply.split("\n\n") {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }

        let mut lines = section.lines();
        let name = match lines.next() {
            Some(first) => {
                // Strip one leading "Theme " label, keep the rest verbatim.
                let first = first.trim();
                first.strip_prefix("Theme ").unwrap_or(first).trim().to_string()
            }
            None => continue,
        };

        let mut summary = String::new();
        let mut citations = String::new();
        for line in lines {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("Summary:") {
                summary = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("Supported by:") {
                citations = rest.trim().to_string();
            }
        }

        rows.push(AnswerRow::new(format!("Theme {}", name), summary, "", ""));

        for fragment in citations.split(']') {
            let fragment = fragment.trim().trim_matches(|c| c == '[' || c == ']').trim();
            if fragment.is_empty() {
                continue;
            }
            let fields: Vec<&str> = fragment.splitn(3, ", ").collect();
            if fields.len() < 3 {
                continue;
            }
            rows.push(AnswerRow::new(
                fields[0].trim_start_matches("Doc ID:").trim(),
                "Supporting evidence",
                fields[1].trim_start_matches("Page:").trim(),
                fields[2].trim_start_matches("Paragraph:").trim(),
            ));
        }
    }

    rows
}
