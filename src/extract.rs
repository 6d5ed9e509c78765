//! Text extraction for the supported document kinds.
//!
//! PDFs get direct text extraction first; pages that come back empty are
//! assumed to be scans and fall back to per-page OCR. Images always go
//! through OCR. Plain text files are read as a single page.

use std::path::Path;

use tracing::info;

use crate::error::PipelineError;
use crate::models::DocumentKind;
use crate::ocr::{OcrEngine, ScratchDir};

/// Whether a directly-extracted PDF page needs the OCR fallback.
pub fn page_needs_ocr(text: &str) -> bool {
    text.trim().is_empty()
}

/// Extract per-page text from `path`. Always returns one string per page;
/// text files and images count as a single page.
pub fn extract(
    path: &Path,
    kind: DocumentKind,
    ocr: &dyn OcrEngine,
) -> Result<Vec<String>, PipelineError> {
    match kind {
        DocumentKind::Text => {
            let content = std::fs::read_to_string(path)?;
            Ok(vec![content])
        }
        DocumentKind::Image => {
            let content = ocr.image_to_text(path)?;
            Ok(vec![content])
        }
        DocumentKind::Pdf => extract_pdf(path, ocr),
    }
}

fn extract_pdf(path: &Path, ocr: &dyn OcrEngine) -> Result<Vec<String>, PipelineError> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| PipelineError::Extraction(format!("{}: {}", path.display(), e)))?;

    let mut out = Vec::with_capacity(pages.len());
    let mut scratch: Option<ScratchDir> = None;

    for (idx, text) in pages.into_iter().enumerate() {
        let page_number = idx + 1;
        if !page_needs_ocr(&text) {
            out.push(text);
            continue;
        }

        // Empty direct extraction usually means a scanned page.
        info!(pdf = %path.display(), page = page_number, "no embedded text, using OCR");
        if scratch.is_none() {
            scratch = Some(ScratchDir::create()?);
        }
        let dir = scratch.as_ref().ok_or_else(|| {
            PipelineError::Extraction("scratch dir unavailable".to_string())
        })?;

        let img = ocr.rasterize_pdf_page(path, page_number, dir.path())?;
        let recognized = ocr.image_to_text(&img)?;
        out.push(recognized);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeOcr {
        text: String,
        calls: AtomicUsize,
    }

    impl FakeOcr {
        fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl OcrEngine for FakeOcr {
        fn image_to_text(&self, _image: &Path) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }

        fn rasterize_pdf_page(
            &self,
            _pdf: &Path,
            _page: usize,
            out_dir: &Path,
        ) -> Result<PathBuf, PipelineError> {
            Ok(out_dir.join("fake.png"))
        }
    }

    // One page per entry; None produces a page with no drawable text.
    fn build_pdf(path: &Path, pages: &[Option<&str>]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for maybe_text in pages {
            let operations = match maybe_text {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![],
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn ocr_fallback_triggers_on_blank_text() {
        assert!(page_needs_ocr(""));
        assert!(page_needs_ocr("   \n\t  "));
        assert!(!page_needs_ocr("actual words"));
    }

    #[test]
    fn text_file_is_a_single_page() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "line one\n\nline two").unwrap();

        let ocr = FakeOcr::new("");
        let pages = extract(&path, DocumentKind::Text, &ocr).unwrap();
        assert_eq!(pages, vec!["line one\n\nline two".to_string()]);
    }

    #[test]
    fn missing_text_file_is_io_error() {
        let ocr = FakeOcr::new("");
        let err = extract(Path::new("/no/such/file.txt"), DocumentKind::Text, &ocr).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn image_goes_through_ocr() {
        let ocr = FakeOcr::new("scanned words");
        let pages = extract(Path::new("scan.png"), DocumentKind::Image, &ocr).unwrap();
        assert_eq!(pages, vec!["scanned words".to_string()]);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pdf_pages_with_embedded_text_skip_ocr() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("clean.pdf");
        build_pdf(&path, &[Some("First page words"), Some("Second page words")]);

        let ocr = FakeOcr::new("should not appear");
        let pages = extract(&path, DocumentKind::Pdf, &ocr).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("First page words"));
        assert!(pages[1].contains("Second page words"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mixed_pdf_falls_back_per_page_and_keeps_alignment() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mixed.pdf");
        build_pdf(&path, &[Some("Typed page"), None, Some("Another typed page")]);

        let ocr = FakeOcr::new("recognized scan text");
        let pages = extract(&path, DocumentKind::Pdf, &ocr).unwrap();
        // One output page per input page, only the blank one OCRed.
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("Typed page"));
        assert_eq!(pages[1], "recognized scan text");
        assert!(pages[2].contains("Another typed page"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }
}
