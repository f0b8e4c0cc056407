pub mod api;
pub mod config;

pub use api::{router, AppState};
pub use config::{ConfigError, LogFormat, OcrSettings, ServerConfig};

use splitbill_ocr::OcrEngine;

/// OCR capability as configured. Nothing is built until the first receipt.
pub fn build_engine(settings: &OcrSettings) -> OcrEngine {
    if !settings.enabled {
        tracing::info!("OCR disabled by configuration; receipts will use synthetic data");
        return OcrEngine::unavailable();
    }
    tesseract_engine(settings)
}

#[cfg(feature = "tesseract")]
fn tesseract_engine(settings: &OcrSettings) -> OcrEngine {
    let data_path = settings.data_path.clone();
    let language = settings.language.clone();
    OcrEngine::lazy(move || splitbill_ocr::TesseractRecognizer::new(data_path.as_deref(), &language))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_engine(_settings: &OcrSettings) -> OcrEngine {
    OcrEngine::lazy(|| Err::<splitbill_ocr::MockRecognizer, _>(splitbill_ocr::OcrError::NotAvailable))
}
