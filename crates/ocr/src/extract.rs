use std::sync::OnceLock;

use regex::Regex;
use splitbill_core::Vnd;

use crate::classify::LineClassifier;
use crate::config::ParserConfig;
use crate::types::{ParsedReceipt, ReceiptItem};

fn re_first_amount() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"[0-9][0-9.,]*").expect("invalid regex"))
}

// ── Public extraction API ─────────────────────────────────────────────────────

/// Turns the ordered OCR lines of one receipt into items and a total.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    classifier: LineClassifier,
}

impl Extractor {
    pub fn new(config: ParserConfig) -> Self {
        Self { classifier: LineClassifier::new(config) }
    }

    pub fn config(&self) -> &ParserConfig {
        self.classifier.config()
    }

    /// Classify every line and reconcile the total. The result may have no
    /// items; deciding what to do about that is the caller's business.
    pub fn extract<S: AsRef<str>>(&self, lines: &[S]) -> ParsedReceipt {
        let items = self.extract_items(lines);
        let declared_total = self.extract_total(lines);
        ParsedReceipt::reconciled(items, declared_total)
    }

    pub fn extract_items<S: AsRef<str>>(&self, lines: &[S]) -> Vec<ReceiptItem> {
        lines
            .iter()
            .filter_map(|line| self.classifier.classify(line.as_ref()))
            .collect()
    }

    // ── Total ────────────────────────────────────────────────────────────────

    /// Largest amount found on any line carrying a total keyword, or zero.
    ///
    /// Only the first number on a keyword line counts, so a trailing change
    /// figure ("thanh toán 50.000 trả lại 10.000") is ignored. Taking the max
    /// across lines absorbs duplicated or partially read total lines.
    pub fn extract_total<S: AsRef<str>>(&self, lines: &[S]) -> Vnd {
        lines
            .iter()
            .map(|line| AsRef::<str>::as_ref(line))
            .filter(|line| self.config().mentions_total_keyword(&line.to_lowercase()))
            .filter_map(|line| re_first_amount().find(line))
            .map(|m| Vnd::parse_lenient(m.as_str()))
            .max()
            .unwrap_or_default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
