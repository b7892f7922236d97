use crate::input::parse_integer;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DECIMALS: u32 = 6;
/// Largest digit count accepted for fixed-point formatting.
pub const MAX_DECIMALS: u32 = 100;
/// Enough fractional digits to print any finite `f64` exactly.
const EXACT_DIGITS: usize = 1100;

/// Number of decimal digits used to display values and, for Newton's method,
/// to round intermediate results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precision {
    decimals: u32,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
        }
    }
}

impl Precision {
    pub fn new(decimals: u32) -> Self {
        Self {
            decimals: decimals.min(MAX_DECIMALS),
        }
    }

    /// Reads the decimals field of a form. Text that is not an integer, or is
    /// negative, falls back to `DEFAULT_DECIMALS`.
    pub fn parse(text: &str) -> Self {
        match parse_integer(text) {
            Some(d) if d >= 0 => Self::new(u32::try_from(d).unwrap_or(MAX_DECIMALS)),
            _ => Self::default(),
        }
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Fixed-point text with `decimals` digits; non-finite values render as `NaN`.
    ///
    /// Rounding works on the exact decimal expansion of `value` and sends
    /// halfway cases away from zero, so `0.125` at two digits is `"0.13"`
    /// while `2.675` (stored just below the tie) is `"2.67"`.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return "NaN".to_string();
        }
        let decimals = self.decimals as usize;
        let exact = format!("{:.*}", EXACT_DIGITS, value.abs());
        let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));

        let mut digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes().take(decimals))
            .collect();
        let mut int_len = int_part.len();
        if matches!(frac_part.as_bytes().get(decimals), Some(d) if *d >= b'5') {
            let mut carry = true;
            for digit in digits.iter_mut().rev() {
                if *digit == b'9' {
                    *digit = b'0';
                } else {
                    *digit += 1;
                    carry = false;
                    break;
                }
            }
            if carry {
                digits.insert(0, b'1');
                int_len += 1;
            }
        }

        let mut text = String::with_capacity(digits.len() + 2);
        // Negative zero prints without a sign.
        if value < 0.0 {
            text.push('-');
        }
        text.extend(digits[..int_len].iter().map(|&d| d as char));
        if decimals > 0 {
            text.push('.');
            text.extend(digits[int_len..].iter().map(|&d| d as char));
        }
        text
    }

    /// Rounds to `decimals` digits: scale by 10^decimals, round half away from
    /// zero, scale back. Values too large to scale are returned unchanged.
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.decimals as i32);
        let scaled = value * factor;
        if !scaled.is_finite() {
            return value;
        }
        scaled.round() / factor
    }
}
