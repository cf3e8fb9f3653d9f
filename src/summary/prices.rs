//! Price panel parsing and derived totals.
//!
//! The summary page exposes a handful of label/value rows. Five inputs are
//! resolved by case-insensitive substring match on the label, parsed out
//! of currency-noise strings, and two subtotals are derived from them.
//! Absent or unparseable values default to zero; the columns are emitted
//! either way.

use crate::records::PriceFields;

/// The five resolved inputs, as exact decimal amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceBreakdown {
    pub base: f64,
    pub options: f64,
    pub vat: f64,
    pub otr_fee: f64,
    pub otr_price: f64,
}

impl PriceBreakdown {
    /// Resolve the five inputs from raw label/value rows.
    pub fn from_rows(rows: &[(String, String)]) -> Self {
        let find = |accept: &dyn Fn(&str) -> bool| -> f64 {
            rows.iter()
                .find(|(label, _)| accept(&label.to_lowercase()))
                .map(|(_, value)| parse_amount(value))
                .unwrap_or(0.0)
        };

        Self {
            base: find(&|l| {
                l.contains("basic price")
                    || l.contains("price before")
                    || (l.contains("base") && l.contains("price"))
            }),
            options: find(&|l| l.contains("option")),
            vat: find(&|l| {
                l.contains("vat")
                    && !l.contains("before")
                    && !l.contains("incl")
                    && !l.contains("otr")
            }),
            otr_fee: find(&|l| l.contains("on the road") || l.contains("on-the-road")),
            otr_price: find(&|l| l.contains("otr")),
        }
    }

    pub fn subtotal_ex_vat(&self) -> f64 {
        self.base + self.options
    }

    pub fn subtotal_incl_vat(&self) -> f64 {
        self.subtotal_ex_vat() + self.vat
    }

    /// All seven output columns, formatted as zero-decimal currency.
    pub fn to_fields(&self) -> PriceFields {
        PriceFields {
            price_before_vat: format_currency(self.base),
            selected_options_price: format_currency(self.options),
            subtotal_ex_vat: format_currency(self.subtotal_ex_vat()),
            vat_amount: format_currency(self.vat),
            subtotal_incl_vat: format_currency(self.subtotal_incl_vat()),
            on_the_road_fee: format_currency(self.otr_fee),
            otr_price: format_currency(self.otr_price),
        }
    }
}

/// Parse a currency string by keeping digits, the decimal point and a
/// leading minus; anything unparseable is zero.
pub fn parse_amount(raw: &str) -> f64 {
    let mut cleaned = String::with_capacity(raw.len());
    let mut negative = false;
    for c in raw.chars() {
        match c {
            '0'..='9' | '.' => cleaned.push(c),
            '-' if cleaned.is_empty() => negative = true,
            _ => {}
        }
    }
    let amount: f64 = cleaned.parse().unwrap_or(0.0);
    if negative {
        -amount
    } else {
        amount
    }
}

/// Localized zero-decimal currency: "£54,985".
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let rounded = amount.abs().round() as u64;
    let digits = rounded.to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if negative {
        format!("-£{grouped}")
    } else {
        format!("£{grouped}")
    }
}
