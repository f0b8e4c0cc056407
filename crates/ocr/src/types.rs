use serde::{Deserialize, Serialize};
use splitbill_core::Vnd;

/// One detected text region, in the order the OCR backend emitted it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextRegion {
    pub text: String,
    /// Recognition confidence (0.0 = guessed, 1.0 = certain).
    pub confidence: f32,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptItem {
    pub name: String,
    /// Unit price.
    pub price: Vnd,
    pub quantity: u32,
}

impl ReceiptItem {
    pub fn new(name: impl Into<String>, price: Vnd, quantity: u32) -> Self {
        Self { name: name.into(), price, quantity }
    }

    pub fn line_total(&self) -> Vnd {
        self.price.times(self.quantity)
    }
}

/// Items plus the receipt total. Never reports a zero total while it has items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "ReceiptParts")]
pub struct ParsedReceipt {
    items: Vec<ReceiptItem>,
    total: Vnd,
}

#[derive(Deserialize)]
struct ReceiptParts {
    items: Vec<ReceiptItem>,
    #[serde(default)]
    total: Vnd,
}

impl From<ReceiptParts> for ParsedReceipt {
    fn from(parts: ReceiptParts) -> Self {
        ParsedReceipt::reconciled(parts.items, parts.total)
    }
}

impl ParsedReceipt {
    /// Build a receipt from classified items and the total declared on the
    /// receipt. A zero declared total is replaced by the item sum.
    pub fn reconciled(items: Vec<ReceiptItem>, declared_total: Vnd) -> Self {
        let total = if declared_total.is_zero() {
            items.iter().map(ReceiptItem::line_total).sum()
        } else {
            declared_total
        };
        Self { items, total }
    }

    pub fn items(&self) -> &[ReceiptItem] {
        &self.items
    }

    pub fn total(&self) -> Vnd {
        self.total
    }

    pub fn items_sum(&self) -> Vnd {
        self.items.iter().map(ReceiptItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_parts(self) -> (Vec<ReceiptItem>, Vnd) {
        (self.items, self.total)
    }
}

/// Why the pipeline gave up on the photographed receipt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    EngineUnavailable,
    UndecodableImage,
    RecognitionFailed,
    NoLinesExtracted,
    NoItemsFound,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::EngineUnavailable => write!(f, "engine_unavailable"),
            FallbackReason::UndecodableImage => write!(f, "undecodable_image"),
            FallbackReason::RecognitionFailed => write!(f, "recognition_failed"),
            FallbackReason::NoLinesExtracted => write!(f, "no_lines_extracted"),
            FallbackReason::NoItemsFound => write!(f, "no_items_found"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ReceiptSource {
    Extracted,
    Synthetic(FallbackReason),
}

impl ReceiptSource {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, ReceiptSource::Synthetic(_))
    }
}

impl std::fmt::Display for ReceiptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiptSource::Extracted => write!(f, "extracted"),
            ReceiptSource::Synthetic(reason) => write!(f, "synthetic:{reason}"),
        }
    }
}

impl std::str::FromStr for ReceiptSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reason = match s {
            "extracted" => return Ok(ReceiptSource::Extracted),
            "synthetic:engine_unavailable" => FallbackReason::EngineUnavailable,
            "synthetic:undecodable_image" => FallbackReason::UndecodableImage,
            "synthetic:recognition_failed" => FallbackReason::RecognitionFailed,
            "synthetic:no_lines_extracted" => FallbackReason::NoLinesExtracted,
            "synthetic:no_items_found" => FallbackReason::NoItemsFound,
            other => return Err(format!("Unknown receipt source: '{other}'")),
        };
        Ok(ReceiptSource::Synthetic(reason))
    }
}

/// What a parse call hands back: the receipt and where it came from.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub receipt: ParsedReceipt,
    pub source: ReceiptSource,
}
