//! Single-field validation and canonicalization.
//!
//! Pure functions with no I/O. Phone rules, in order:
//!
//! - Anything mentioning `DSN` is accepted and stored verbatim (trimmed).
//! - Numbers starting with a recognized international calling code are
//!   accepted regardless of length; only parentheses are removed.
//! - Everything else is a domestic number and must have exactly 10 digits.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Marker that exempts a phone number from format checks.
pub const DSN_MARKER: &str = "DSN";

/// Calling-code prefixes accepted without a digit-count check
/// (France, United Kingdom, Germany, Australia, New Zealand).
pub const INTERNATIONAL_PREFIXES: &[&str] = &[
    "+33", "33", "+44", "44", "+49", "49", "+61", "61", "+64", "64",
];

/// Digit count of a domestic (North American) number.
pub const DOMESTIC_DIGITS: usize = 10;

/// Digit count of a local number without area code.
pub const LOCAL_DIGITS: usize = 7;

const EMAIL_PATTERN: &str = r"(?i)^[A-Za-z0-9._%+-]+@(?:[A-Za-z0-9-]+\.)+[A-Za-z]{2,63}$";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

/// Check that `text` has the `local@domain.tld` shape.
///
/// The final label must be 2-63 letters. No DNS or MX lookup is performed.
pub fn validate_email(text: &str) -> bool {
    EMAIL_RE.is_match(text)
}

// ---------------------------------------------------------------------------
// Phone
// ---------------------------------------------------------------------------

fn contains_dsn(text: &str) -> bool {
    text.to_uppercase().contains(DSN_MARKER)
}

fn strip_parentheses(text: &str) -> String {
    text.chars().filter(|c| *c != '(' && *c != ')').collect()
}

fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Whether the digits-and-plus projection of `text` starts with one of
/// [`INTERNATIONAL_PREFIXES`].
pub fn has_international_prefix(text: &str) -> bool {
    let projected: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    INTERNATIONAL_PREFIXES
        .iter()
        .any(|prefix| projected.starts_with(prefix))
}

/// Validate a phone number.
///
/// Empty text is invalid. DSN numbers and recognized international numbers
/// are always valid; anything else needs exactly [`DOMESTIC_DIGITS`] digits.
pub fn validate_phone(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if contains_dsn(trimmed) {
        return true;
    }

    let unwrapped = strip_parentheses(trimmed);
    if has_international_prefix(&unwrapped) {
        return true;
    }

    digits_only(&unwrapped).len() == DOMESTIC_DIGITS
}

/// Canonicalize a phone number for storage.
///
/// - DSN: returned trimmed, otherwise untouched.
/// - International: parentheses removed, spaces and dashes kept.
/// - Domestic: 10 digits become `XXX-XXX-XXXX`, 7 digits `XXX-XXXX`, any
///   other count the bare digit string.
pub fn normalize_phone(text: &str) -> String {
    let trimmed = text.trim();
    if contains_dsn(trimmed) {
        return trimmed.to_string();
    }

    let unwrapped = strip_parentheses(trimmed);
    if has_international_prefix(&unwrapped) {
        return unwrapped;
    }

    let digits = digits_only(&unwrapped);
    match digits.len() {
        DOMESTIC_DIGITS => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        LOCAL_DIGITS => format!("{}-{}", &digits[..3], &digits[3..]),
        _ => digits,
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Target kind for [`coerce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
}

/// A value converted to a [`FieldKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Coerced {
    /// The zero-equivalent of a kind: empty text or numeric zero.
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Text(String::new()),
            FieldKind::Integer => Self::Integer(0),
            FieldKind::Float => Self::Float(0.0),
        }
    }

    /// Consume into text, rendering numbers with their display form.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

/// Convert a raw cell to `kind`. Never fails.
///
/// Missing or null values, and values that cannot be converted, yield the
/// kind's zero value. Integral floats render as text without a fractional
/// part so spreadsheet phone numbers survive (`7035551212.0` ->
/// `"7035551212"`).
pub fn coerce(value: Option<&Value>, kind: FieldKind) -> Coerced {
    let Some(value) = value else {
        return Coerced::zero(kind);
    };
    let converted = match kind {
        FieldKind::Text => value_to_text(value).map(Coerced::Text),
        FieldKind::Integer => value_to_integer(value).map(Coerced::Integer),
        FieldKind::Float => value_to_float(value).map(Coerced::Float),
    };
    converted.unwrap_or_else(|| Coerced::zero(kind))
}

/// Shorthand for `coerce(value, FieldKind::Text)`.
pub fn coerce_text(value: Option<&Value>) -> String {
    coerce(value, FieldKind::Text).into_text()
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| f.to_string())
            }
        }
    }
}

fn value_to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn value_to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
