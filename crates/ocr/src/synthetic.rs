use rand::seq::SliceRandom;
use rand::Rng;
use splitbill_core::Vnd;

use crate::types::{ParsedReceipt, ReceiptItem};

/// Menu the stand-in receipts are drawn from.
const CATALOG: &[(&str, u64)] = &[
    ("Phở bò tái", 45_000),
    ("Cơm gà xối mỡ", 55_000),
    ("Trà đá", 5_000),
    ("Nước cam ép", 25_000),
    ("Bánh mì thịt", 20_000),
];

/// A plausible receipt of 2 to 4 catalog items, each ordered 1 to 3 times,
/// whose total is exactly the item sum.
pub fn generate_synthetic_receipt() -> ParsedReceipt {
    generate_synthetic_receipt_with(&mut rand::thread_rng())
}

pub fn generate_synthetic_receipt_with<R: Rng>(rng: &mut R) -> ParsedReceipt {
    let count = rng.gen_range(2..=4);
    let items: Vec<ReceiptItem> = CATALOG
        .choose_multiple(rng, count)
        .map(|&(name, price)| ReceiptItem::new(name, Vnd::new(price), rng.gen_range(1..=3)))
        .collect();
    ParsedReceipt::reconciled(items, Vnd::zero())
}
