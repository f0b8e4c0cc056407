use std::path::Path;

use thiserror::Error;

use crate::types::TextRegion;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available, build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations read the image stored at `image_path` and return the
/// detected text regions top to bottom.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_path: &Path) -> Result<Vec<TextRegion>, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-set lines; used to exercise the parsing pipeline
/// without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub lines: Vec<String>,
}

impl MockRecognizer {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_path: &Path) -> Result<Vec<TextRegion>, OcrError> {
        Ok(self.lines.iter().map(|l| TextRegion::new(l.clone(), 1.0)).collect())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use crate::types::TextRegion;
    use leptess::LepTess;
    use std::path::Path;
    use std::sync::Mutex;

    /// Owns one Tesseract instance for its whole life. Tesseract is not
    /// reentrant, so concurrent receipts take turns on the lock.
    pub struct TesseractRecognizer {
        engine: Mutex<LepTess>,
    }

    impl TesseractRecognizer {
        /// Loads the language pack; a missing `traineddata` fails here rather
        /// than on the first receipt.
        pub fn new(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
            let engine = LepTess::new(data_path, lang).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(Self { engine: Mutex::new(engine) })
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_path: &Path) -> Result<Vec<TextRegion>, OcrError> {
            let mut lt = self
                .engine
                .lock()
                .map_err(|_| OcrError::Engine("Tesseract engine lock poisoned".to_string()))?;
            lt.set_image(image_path)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let text = lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))?;
            let confidence = lt.mean_text_conf() as f32 / 100.0;
            Ok(text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| TextRegion::new(l, confidence))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(regions: Vec<TextRegion>) -> Vec<String> {
        regions.into_iter().map(|r| r.text).collect()
    }

    #[test]
    fn mock_returns_preset_lines_in_order() {
        let r = MockRecognizer::new(["Phở bò x2 90.000", "Tổng cộng 90.000"]);
        let out = r.recognize(Path::new("ignored.png")).unwrap();
        assert_eq!(texts(out), vec!["Phở bò x2 90.000", "Tổng cộng 90.000"]);
    }

    #[test]
    fn mock_with_no_lines_returns_nothing() {
        let r = MockRecognizer::new(Vec::<String>::new());
        assert!(r.recognize(Path::new("x.png")).unwrap().is_empty());
    }
}
