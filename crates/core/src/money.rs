use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// A whole-dong amount. The currency has no subdivision, so `.` and `,` on a
/// receipt are always thousands separators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vnd(u64);

impl Vnd {
    pub const fn new(dong: u64) -> Self {
        Vnd(dong)
    }

    pub const fn zero() -> Self {
        Vnd(0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn dong(self) -> u64 {
        self.0
    }

    /// Normalize a decorated fragment such as `"90,000đ"` or `"1.250.000 VND"`.
    ///
    /// Every non-digit is dropped and the remaining digits are read as one
    /// integer. Fragments with no digits, or with more digits than fit in a
    /// `u64`, come back as zero.
    pub fn parse_lenient(fragment: &str) -> Self {
        let digits: String = fragment.chars().filter(char::is_ascii_digit).collect();
        Vnd(digits.parse().unwrap_or(0))
    }

    /// Price of `quantity` units at this unit price.
    pub fn times(self, quantity: u32) -> Self {
        Vnd(self.0.saturating_mul(u64::from(quantity)))
    }
}

impl fmt::Display for Vnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.0.to_string();
        let mut grouped = String::with_capacity(raw.len() + raw.len() / 3);
        for (i, c) in raw.chars().enumerate() {
            if i > 0 && (raw.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        write!(f, "{grouped}đ")
    }
}

impl Add for Vnd {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Vnd(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Vnd {
    fn sum<I: Iterator<Item = Vnd>>(iter: I) -> Self {
        iter.fold(Vnd::zero(), |a, b| a + b)
    }
}

impl From<u64> for Vnd {
    fn from(dong: u64) -> Self {
        Vnd(dong)
    }
}
