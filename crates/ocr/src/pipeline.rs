use crate::config::ParserConfig;
use crate::engine::OcrEngine;
use crate::extract::Extractor;
use crate::preprocess;
use crate::recognizer::OcrBackend;
use crate::synthetic::generate_synthetic_receipt;
use crate::types::{FallbackReason, ParseOutcome, ReceiptSource};

/// Orchestrates: engine check → decode → preprocess → OCR → classify → total.
///
/// Every dead end lands on a synthetic receipt, so parsing never fails.
#[derive(Debug)]
pub struct ReceiptPipeline {
    engine: OcrEngine,
    extractor: Extractor,
}

impl ReceiptPipeline {
    pub fn new(engine: OcrEngine, config: ParserConfig) -> Self {
        Self { engine, extractor: Extractor::new(config) }
    }

    /// Parse a base64 image as received from a client.
    pub fn parse_base64(&self, payload: &str) -> ParseOutcome {
        let Some(backend) = self.engine.backend() else {
            return fallback(FallbackReason::EngineUnavailable);
        };
        match preprocess::decode_image_payload(payload) {
            Ok(data) => self.run(backend.as_ref(), &data),
            Err(e) => {
                tracing::warn!("Receipt payload rejected: {e}");
                fallback(FallbackReason::UndecodableImage)
            }
        }
    }

    /// Parse raw image bytes (JPEG / PNG / …).
    pub fn parse_image_bytes(&self, data: &[u8]) -> ParseOutcome {
        match self.engine.backend() {
            Some(backend) => self.run(backend.as_ref(), data),
            None => fallback(FallbackReason::EngineUnavailable),
        }
    }

    /// Parse lines that were already recognized.
    pub fn parse_lines<S: AsRef<str>>(&self, lines: &[S]) -> ParseOutcome {
        if lines.is_empty() {
            return fallback(FallbackReason::NoLinesExtracted);
        }
        let receipt = self.extractor.extract(lines);
        if receipt.is_empty() {
            return fallback(FallbackReason::NoItemsFound);
        }
        tracing::info!(
            items = receipt.items().len(),
            total = %receipt.total(),
            "Receipt parsed from {} OCR lines",
            lines.len()
        );
        ParseOutcome { receipt, source: ReceiptSource::Extracted }
    }

    fn run(&self, backend: &dyn OcrBackend, data: &[u8]) -> ParseOutcome {
        match recognize_lines(backend, data) {
            Ok(lines) => self.parse_lines(&lines),
            Err(reason) => fallback(reason),
        }
    }
}

/// Preprocess, stage in a scratch file, and OCR. The scratch file is dropped,
/// and with it deleted, before this returns.
fn recognize_lines(backend: &dyn OcrBackend, data: &[u8]) -> Result<Vec<String>, FallbackReason> {
    let png = preprocess::prepare_for_ocr_from_bytes(data).map_err(|e| {
        tracing::warn!("Receipt image could not be decoded: {e}");
        FallbackReason::UndecodableImage
    })?;
    let scratch = preprocess::write_scratch_image(&png).map_err(|e| {
        tracing::warn!("Receipt image could not be staged: {e}");
        FallbackReason::RecognitionFailed
    })?;
    let regions = backend.recognize(scratch.path()).map_err(|e| {
        tracing::warn!("OCR recognition failed: {e}");
        FallbackReason::RecognitionFailed
    })?;

    Ok(regions
        .into_iter()
        .map(|r| r.text)
        .filter(|t| !t.trim().is_empty())
        .collect())
}

fn fallback(reason: FallbackReason) -> ParseOutcome {
    tracing::warn!(%reason, "Using synthetic receipt");
    ParseOutcome {
        receipt: generate_synthetic_receipt(),
        source: ReceiptSource::Synthetic(reason),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
