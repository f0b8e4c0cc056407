use serde::{Deserialize, Serialize};
use splitbill_core::Vnd;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Locale-tuned knobs of the line classifier and total extractor.
///
/// The defaults target Vietnamese receipts. Keywords are compared against the
/// lower-cased line, so they must be written in lower case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Trailing-amount lines below this price are treated as noise
    /// (timestamps, table numbers, counters).
    pub simple_line_min_price: Vnd,
    /// Lines whose name contains one of these are summary lines, never items.
    pub skip_keywords: Vec<String>,
    /// Lines containing one of these state the receipt total.
    pub total_keywords: Vec<String>,
}

const DEFAULT_SKIP_KEYWORDS: &[&str] = &[
    "tổng",
    "total",
    "thành tiền",
    "thanh toán",
    "tiền thừa",
    "tiền nhận",
    "vat",
    "thuế",
    // OCR regularly loses the diacritics.
    "tong cong",
    "tong tien",
    "thanh tien",
    "thanh toan",
    "tien thua",
    "tien nhan",
    "thue",
];

const DEFAULT_TOTAL_KEYWORDS: &[&str] = &[
    "tổng cộng",
    "tổng tiền",
    "total",
    "thành tiền",
    "thanh toán",
    "tong cong",
    "tong tien",
    "thanh tien",
    "thanh toan",
];

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            simple_line_min_price: Vnd::new(1_000),
            skip_keywords: DEFAULT_SKIP_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            total_keywords: DEFAULT_TOTAL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ParserConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ParserConfig = toml::from_str(toml_content)?;
        Ok(config.normalized())
    }

    /// Lower-case every keyword. Needed whenever the config was deserialized
    /// as part of a larger document rather than through `from_toml`.
    pub fn normalized(mut self) -> Self {
        for kw in self.skip_keywords.iter_mut().chain(self.total_keywords.iter_mut()) {
            *kw = kw.to_lowercase();
        }
        self
    }

    /// Whether `lowered` (already lower-cased) contains a skip keyword.
    pub fn mentions_skip_keyword(&self, lowered: &str) -> bool {
        self.skip_keywords.iter().any(|kw| lowered.contains(kw.as_str()))
    }

    /// Whether `lowered` is exactly a skip keyword.
    pub fn is_skip_keyword(&self, lowered: &str) -> bool {
        self.skip_keywords.iter().any(|kw| kw == lowered)
    }

    pub fn mentions_total_keyword(&self, lowered: &str) -> bool {
        self.total_keywords.iter().any(|kw| lowered.contains(kw.as_str()))
    }
}
