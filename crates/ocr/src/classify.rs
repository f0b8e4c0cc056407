use std::sync::OnceLock;

use regex::{Captures, Regex};
use splitbill_core::Vnd;

use crate::config::ParserConfig;
use crate::types::ReceiptItem;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// `Phở bò x2 90.000đ`, `Cà phê x 1 = 25,000`
re!(re_name_times_qty,
    r"(?i)(.+?)\s*[x×]\s*(\d+)\s*[:\s=]*([0-9.,]+)");
// `Bia Tiger 3 x 18.000`
re!(re_name_qty_times,
    r"(?i)(.+?)\s+(\d+)\s*[x×]\s*([0-9.,]+)");
// `2 x Bánh mì thịt 20.000`
re!(re_qty_times_name,
    r"(?i)(\d+)\s*[x×]\s*(.+?)\s*[:\s=]*([0-9.,]+)");
// `Trà đá 5.000đ`
re!(re_trailing_amount,
    r"(.+?)\s+([0-9.,]+)\s*(?:đ|Đ|d|VND|vnd)?$");

/// A raw regex hit, one variant per capture layout.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineMatch<'a> {
    /// `name × quantity ... price`
    NameTimesQuantity { name: &'a str, quantity: &'a str, price: &'a str },
    /// `name quantity × price`
    NameQuantityTimes { name: &'a str, quantity: &'a str, price: &'a str },
    /// `quantity × name ... price`
    QuantityTimesName { quantity: &'a str, name: &'a str, price: &'a str },
    /// `name <amount> [currency]`, quantity implied to be one.
    TrailingAmount { name: &'a str, price: &'a str },
}

fn group<'a>(c: &Captures<'a>, i: usize) -> Option<&'a str> {
    c.get(i).map(|m| m.as_str())
}

fn name_times_quantity(line: &str) -> Option<LineMatch<'_>> {
    let c = re_name_times_qty().captures(line)?;
    Some(LineMatch::NameTimesQuantity {
        name: group(&c, 1)?,
        quantity: group(&c, 2)?,
        price: group(&c, 3)?,
    })
}

fn name_quantity_times(line: &str) -> Option<LineMatch<'_>> {
    let c = re_name_qty_times().captures(line)?;
    Some(LineMatch::NameQuantityTimes {
        name: group(&c, 1)?,
        quantity: group(&c, 2)?,
        price: group(&c, 3)?,
    })
}

fn quantity_times_name(line: &str) -> Option<LineMatch<'_>> {
    let c = re_qty_times_name().captures(line)?;
    Some(LineMatch::QuantityTimesName {
        quantity: group(&c, 1)?,
        name: group(&c, 2)?,
        price: group(&c, 3)?,
    })
}

fn trailing_amount(line: &str) -> Option<LineMatch<'_>> {
    let c = re_trailing_amount().captures(line)?;
    Some(LineMatch::TrailingAmount {
        name: group(&c, 1)?,
        price: group(&c, 2)?,
    })
}

/// Quantity-bearing layouts, most specific first.
const QUANTITY_PATTERNS: [for<'a> fn(&'a str) -> Option<LineMatch<'a>>; 3] =
    [name_times_quantity, name_quantity_times, quantity_times_name];

impl<'a> LineMatch<'a> {
    fn fields(&self) -> (&'a str, Option<u32>, Vnd) {
        match *self {
            LineMatch::NameTimesQuantity { name, quantity, price }
            | LineMatch::NameQuantityTimes { name, quantity, price }
            | LineMatch::QuantityTimesName { quantity, name, price } => {
                (name.trim(), quantity.parse().ok(), Vnd::parse_lenient(price))
            }
            LineMatch::TrailingAmount { name, price } => {
                (name.trim(), Some(1), Vnd::parse_lenient(price))
            }
        }
    }
}

/// Rule-based extraction of one item from one OCR line.
#[derive(Debug, Clone, Default)]
pub struct LineClassifier {
    config: ParserConfig,
}

impl LineClassifier {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Try each quantity pattern, most specific first, then the trailing-amount
    /// fallback. A pattern that matches but yields an unusable item hands over
    /// to the next one.
    pub fn classify(&self, line: &str) -> Option<ReceiptItem> {
        let line = line.trim_end();
        QUANTITY_PATTERNS
            .iter()
            .filter_map(|pattern| pattern(line))
            .find_map(|m| self.accept_quantity_line(&m))
            .or_else(|| trailing_amount(line).and_then(|m| self.accept_trailing_amount(&m)))
    }

    fn accept_quantity_line(&self, m: &LineMatch<'_>) -> Option<ReceiptItem> {
        let (name, quantity, price) = m.fields();
        let quantity = quantity.filter(|q| *q > 0)?;
        if name.is_empty() || price.is_zero() || self.config.is_skip_keyword(&name.to_lowercase()) {
            return None;
        }
        Some(ReceiptItem::new(name, price, quantity))
    }

    fn accept_trailing_amount(&self, m: &LineMatch<'_>) -> Option<ReceiptItem> {
        let (name, _, price) = m.fields();
        if name.is_empty() || price < self.config.simple_line_min_price {
            return None;
        }
        if self.config.mentions_skip_keyword(&name.to_lowercase()) {
            return None;
        }
        Some(ReceiptItem::new(name, price, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(line: &str) -> Option<ReceiptItem> {
        LineClassifier::default().classify(line)
    }

    #[test]
    fn name_times_quantity_wins_over_trailing_amount() {
        let item = classify("Phở bò x2 90.000đ").unwrap();
        assert_eq!(item, ReceiptItem::new("Phở bò", Vnd::new(90_000), 2));
    }

    #[test]
    fn name_times_quantity_with_separators() {
        let item = classify("Cà phê sữa × 3 = 25,000").unwrap();
        assert_eq!(item, ReceiptItem::new("Cà phê sữa", Vnd::new(25_000), 3));

        let item = classify("Nước cam X2: 30.000").unwrap();
        assert_eq!(item, ReceiptItem::new("Nước cam", Vnd::new(30_000), 2));
    }

    #[test]
    fn name_quantity_times_price() {
        let item = classify("Xúc xích 2 x 15.000").unwrap();
        assert_eq!(item, ReceiptItem::new("Xúc xích", Vnd::new(15_000), 2));
    }

    #[test]
    fn quantity_times_name_price() {
        let item = classify("2 x Bánh mì thịt 20.000").unwrap();
        assert_eq!(item, ReceiptItem::new("Bánh mì thịt", Vnd::new(20_000), 2));
    }

    #[test]
    fn compact_leading_quantity() {
        let item = classify("3x Trà sữa 35.000").unwrap();
        assert_eq!(item, ReceiptItem::new("Trà sữa", Vnd::new(35_000), 3));
    }

    #[test]
    fn trailing_amount_defaults_quantity_to_one() {
        let item = classify("Trà đá 5.000").unwrap();
        assert_eq!(item, ReceiptItem::new("Trà đá", Vnd::new(5_000), 1));

        let item = classify("Cơm gà xối mỡ 55.000 VND").unwrap();
        assert_eq!(item, ReceiptItem::new("Cơm gà xối mỡ", Vnd::new(55_000), 1));
    }

    #[test]
    fn trailing_amount_below_floor_is_noise() {
        assert_eq!(classify("Bàn 12"), None);
        assert_eq!(classify("Giờ vào 12:30"), None);
    }

    #[test]
    fn summary_lines_never_become_items() {
        assert_eq!(classify("Tổng cộng 95.000"), None);
        assert_eq!(classify("Tổng cộng: 95,000"), None);
        assert_eq!(classify("Tiền thừa 10.000"), None);
        assert_eq!(classify("VAT 8.000"), None);
        assert_eq!(classify("Thanh toan 120.000"), None);
    }

    #[test]
    fn quantity_line_named_after_skip_keyword_is_rejected() {
        assert_eq!(classify("VAT x1 8.000"), None);
        assert_eq!(classify("Total x 1 = 50.000"), None);
        assert_eq!(classify("Tổng x2 40.000"), None);
    }

    #[test]
    fn quantity_line_only_rejects_exact_skip_keyword() {
        let item = classify("Bia total x2 20.000").unwrap();
        assert_eq!(item, ReceiptItem::new("Bia total", Vnd::new(20_000), 2));
    }

    #[test]
    fn zero_quantity_or_price_is_rejected() {
        assert_eq!(classify("Phở x0 500"), None);
        assert_eq!(classify("Phở x2 ..."), None);
    }

    #[test]
    fn lines_without_amounts_do_not_match() {
        assert_eq!(classify("QUÁN PHỞ HÀ NỘI"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("   "), None);
    }

    #[test]
    fn floor_is_configurable() {
        let classifier = LineClassifier::new(ParserConfig {
            simple_line_min_price: Vnd::new(10),
            ..ParserConfig::default()
        });
        let item = classifier.classify("Kẹo 500").unwrap();
        assert_eq!(item.price, Vnd::new(500));
    }
}
