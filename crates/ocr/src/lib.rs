pub mod classify;
pub mod config;
pub mod engine;
pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod synthetic;
pub mod types;

pub use classify::LineClassifier;
pub use config::{ConfigError, ParserConfig};
pub use engine::OcrEngine;
pub use extract::Extractor;
pub use hash::{image_extension, ContentHash};
pub use pipeline::ReceiptPipeline;
pub use preprocess::{decode_image_payload, prepare_for_ocr_from_bytes, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError};
pub use synthetic::{generate_synthetic_receipt, generate_synthetic_receipt_with};
pub use types::{
    FallbackReason, ParseOutcome, ParsedReceipt, ReceiptItem, ReceiptSource, TextRegion,
};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
