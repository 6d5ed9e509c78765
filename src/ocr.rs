//! OCR support via external tools.
//!
//! Scanned PDF pages and images are run through `tesseract`; PDF pages are
//! first rasterized with `pdftoppm` (poppler-utils). Both tools are invoked
//! as subprocesses so the crate carries no native OCR dependencies.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::OcrConfig;
use crate::error::PipelineError;

/// Recognizes text in raster images and rasterizes PDF pages for OCR.
///
/// Extraction takes this as a trait object so tests can substitute a fake
/// engine without the external tools installed.
pub trait OcrEngine: Send + Sync {
    /// Run OCR over a single image file, returning the recognized text.
    fn image_to_text(&self, image: &Path) -> Result<String, PipelineError>;

    /// Rasterize one page (1-based) of a PDF to a PNG under `out_dir` and
    /// return the image path.
    fn rasterize_pdf_page(
        &self,
        pdf: &Path,
        page: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, PipelineError>;
}

/// OCR engine backed by the `tesseract` and `pdftoppm` executables.
pub struct TesseractOcr {
    cfg: OcrConfig,
}

impl TesseractOcr {
    pub fn new(cfg: OcrConfig) -> Self {
        Self { cfg }
    }

    /// Check whether the configured tesseract binary is callable.
    pub fn has_tesseract(&self) -> bool {
        Command::new(&self.cfg.tesseract_cmd)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Check whether the configured pdftoppm binary is callable.
    pub fn has_pdftoppm(&self) -> bool {
        Command::new(&self.cfg.pdftoppm_cmd)
            .arg("-v")
            .output()
            .map(|o| o.status.success() || o.status.code() == Some(99))
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractOcr {
    fn image_to_text(&self, image: &Path) -> Result<String, PipelineError> {
        debug!(image = %image.display(), "running tesseract");

        let output = Command::new(&self.cfg.tesseract_cmd)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.cfg.lang)
            .output()
            .map_err(|e| {
                PipelineError::Extraction(format!(
                    "failed to launch {}: {}",
                    self.cfg.tesseract_cmd, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(image = %image.display(), "tesseract failed: {}", stderr.trim());
            return Err(PipelineError::Extraction(format!(
                "tesseract failed on {}: {}",
                image.display(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn rasterize_pdf_page(
        &self,
        pdf: &Path,
        page: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        std::fs::create_dir_all(out_dir)?;
        let prefix = out_dir.join(format!("page-{}", Uuid::new_v4()));

        debug!(pdf = %pdf.display(), page, "rasterizing pdf page");

        let output = Command::new(&self.cfg.pdftoppm_cmd)
            .arg("-png")
            .arg("-r")
            .arg(self.cfg.dpi.to_string())
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                PipelineError::Extraction(format!(
                    "failed to launch {}: {}",
                    self.cfg.pdftoppm_cmd, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Extraction(format!(
                "pdftoppm failed on {} page {}: {}",
                pdf.display(),
                page,
                stderr.trim()
            )));
        }

        // pdftoppm appends the page number to the prefix; find what it wrote.
        let stem = prefix
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut produced: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&stem))
                    .unwrap_or(false)
            })
            .collect();
        produced.sort();

        produced.into_iter().next().ok_or_else(|| {
            PipelineError::Extraction(format!(
                "pdftoppm produced no image for {} page {}",
                pdf.display(),
                page
            ))
        })
    }
}

/// A scratch directory for rasterized pages, removed on drop.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create() -> Result<Self, PipelineError> {
        let path = std::env::temp_dir().join(format!("cqa-ocr-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(dir = %self.path.display(), "failed to remove scratch dir: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_dir_removed_on_drop() {
        let kept;
        {
            let scratch = ScratchDir::create().unwrap();
            kept = scratch.path().to_path_buf();
            assert!(kept.is_dir());
        }
        assert!(!kept.exists());
    }

    #[test]
    fn missing_binary_reports_extraction_error() {
        let engine = TesseractOcr::new(OcrConfig {
            tesseract_cmd: "definitely-not-a-real-binary".into(),
            pdftoppm_cmd: "also-not-real".into(),
            lang: "eng".into(),
            dpi: 150,
        });
        let err = engine.image_to_text(Path::new("x.png")).unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
        assert!(!engine.has_tesseract());
    }
}
