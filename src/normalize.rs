//! Identifier canonicalization.
//!
//! Spreadsheet sources store the same code as an integer, a float (`12345.0`)
//! or text with stray whitespace. Every identifier column goes through here at
//! load time so that all later comparisons are plain string equality.

use polars::prelude::*;

use crate::error::Result;

/// Normalize a textual identifier.
///
/// Trims whitespace, drops a `.000` tail on integral values and maps empty or
/// all-zero values to the empty string.
pub fn normalize_str(raw: &str) -> String {
    let trimmed = raw.trim();
    let integral = strip_integral_suffix(trimmed);
    let unsigned = integral.strip_prefix('-').unwrap_or(integral);
    if unsigned.bytes().all(|b| b == b'0') {
        // covers "" as well
        return String::new();
    }
    integral.to_string()
}

/// Normalize a single cell of any dtype.
pub fn normalize(raw: &AnyValue<'_>) -> String {
    match raw {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => normalize_str(s),
        AnyValue::StringOwned(s) => normalize_str(s.as_str()),
        AnyValue::Int8(v) => normalize_int(i64::from(*v)),
        AnyValue::Int16(v) => normalize_int(i64::from(*v)),
        AnyValue::Int32(v) => normalize_int(i64::from(*v)),
        AnyValue::Int64(v) => normalize_int(*v),
        AnyValue::UInt8(v) => normalize_int(i64::from(*v)),
        AnyValue::UInt16(v) => normalize_int(i64::from(*v)),
        AnyValue::UInt32(v) => normalize_int(i64::from(*v)),
        AnyValue::UInt64(v) => normalize_str(&v.to_string()),
        AnyValue::Float32(v) => normalize_float(f64::from(*v)),
        AnyValue::Float64(v) => normalize_float(*v),
        other => normalize_str(&other.to_string()),
    }
}

fn normalize_int(v: i64) -> String {
    if v == 0 {
        String::new()
    } else {
        v.to_string()
    }
}

fn normalize_float(v: f64) -> String {
    if !v.is_finite() || v == 0.0 {
        return String::new();
    }
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        normalize_int(v as i64)
    } else {
        normalize_str(&v.to_string())
    }
}

/// `"12345.000"` -> `"12345"`, `"-4.0"` -> `"-4"`. Anything that is not an
/// optionally signed integer followed by a zero-only fraction is returned as is.
fn strip_integral_suffix(s: &str) -> &str {
    if let Some((int, frac)) = s.split_once('.') {
        let digits = int.strip_prefix('-').unwrap_or(int);
        if !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && frac.bytes().all(|b| b == b'0')
        {
            return int;
        }
    }
    s
}

/// Rewrite `column` of `df` in place with normalized identifier strings.
pub fn normalize_column(df: &mut DataFrame, column: &str) -> Result<()> {
    let as_text = df.column(column)?.cast(&DataType::String)?;
    let values: Vec<String> = as_text
        .str()?
        .into_iter()
        .map(|v| v.map(normalize_str).unwrap_or_default())
        .collect();
    df.with_column(Column::new(column.into(), &values))?;
    Ok(())
}

/// True when `code` is a non-empty, digits-only identifier of at most 9 digits.
pub fn is_numeric_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= 9 && code.bytes().all(|b| b.is_ascii_digit())
}
