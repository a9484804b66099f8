//! Placeholder field lookup and value formatting.

use std::collections::BTreeMap;

use crate::config::CatalogOptions;
use crate::sheet::FieldValue;

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Column header a placeholder field reads from.
///
/// An alias wins over the field name; headers match exactly first, then
/// with all whitespace removed (headers often contain line breaks).
pub(crate) fn resolve_column<'c>(
    field: &str,
    columns: &'c [String],
    aliases: &BTreeMap<String, String>,
) -> Option<&'c str> {
    let wanted = aliases.get(field).map(String::as_str).unwrap_or(field);
    if let Some(exact) = columns.iter().find(|c| c.as_str() == wanted) {
        return Some(exact);
    }
    let wanted = strip_whitespace(wanted);
    columns
        .iter()
        .find(|c| strip_whitespace(c) == wanted)
        .map(String::as_str)
}

/// Text for a field of an occupied slot.
pub(crate) fn format_field(value: Option<&FieldValue>, field: &str, options: &CatalogOptions) -> String {
    let Some(value) = value.filter(|v| !v.to_string().trim().is_empty()) else {
        return options
            .field_missing_values
            .get(field)
            .unwrap_or(&options.missing_value)
            .clone();
    };
    if options.price_fields.iter().any(|f| f == field) {
        let price = format_price(value, &options.currency_symbol);
        return match options.price_suffixes.get(field) {
            Some(suffix) => format!("{price}{suffix}"),
            None => price,
        };
    }
    value.to_string()
}

/// `¥1,234,567` style price. The fraction is truncated; values that are not
/// numbers pass through unchanged.
pub fn format_price(value: &FieldValue, currency_symbol: &str) -> String {
    let Some(number) = value.as_number().filter(|n| n.is_finite()) else {
        return value.to_string();
    };
    let whole = number.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if whole < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{currency_symbol}{grouped}")
}
