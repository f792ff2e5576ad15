use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns `true` if `s` reads as a decimal integer literal.
///
/// Surrounding ASCII whitespace and a single leading `+` or `-` are accepted,
/// matching how the legacy service coerced identifiers. Such identifiers are
/// the marker of an old defect that stored numeric ids, and are cleaned up by
/// deletion during migration.
pub fn is_integer_literal(s: &str) -> bool {
    let trimmed = s.trim_matches(|c: char| c.is_ascii_whitespace());
    let digits = trimmed
        .strip_prefix('+')
        .or_else(|| trimmed.strip_prefix('-'))
        .unwrap_or(trimmed);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// An identifier field as found in the store.
///
/// Workspace and object identifiers are strings in the current schema, but
/// older writers sometimes stored them as JSON numbers. Every shape must be
/// readable so that the numeric ones can be found and removed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Integer(i64),
    /// Any other JSON number, such as `42.0` or a value beyond `i64`.
    Number(serde_json::Number),
    Text(String),
}

impl RawId {
    /// The identifier as text. Integers are rendered in decimal.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s),
            Self::Integer(n) => Cow::Owned(n.to_string()),
            Self::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    /// Returns `true` for JSON numbers and for strings that read as an
    /// integer. The legacy service coerced any numeric id to an integer.
    pub fn is_integer(&self) -> bool {
        match self {
            Self::Integer(_) | Self::Number(_) => true,
            Self::Text(s) => is_integer_literal(s),
        }
    }

    /// The identifier as the JSON value it is stored as.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Number(n) => Value::Number(n.clone()),
        }
    }

    /// Returns `true` if this is a string equal to `other`.
    pub fn is_text(&self, other: &str) -> bool {
        matches!(self, Self::Text(s) if s == other)
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RawId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RawId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for RawId {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_digits_are_integers() {
        assert!(is_integer_literal("42"));
        assert!(is_integer_literal("0"));
        assert!(is_integer_literal("007"));
    }

    #[test]
    fn signs_and_whitespace_are_accepted() {
        assert!(is_integer_literal("-3"));
        assert!(is_integer_literal("+3"));
        assert!(is_integer_literal("  12\t"));
    }

    #[test]
    fn non_integers_are_rejected() {
        assert!(!is_integer_literal(""));
        assert!(!is_integer_literal("-"));
        assert!(!is_integer_literal("4.2"));
        assert!(!is_integer_literal("1e3"));
        assert!(!is_integer_literal("abc"));
        assert!(!is_integer_literal("12a"));
        assert!(!is_integer_literal("--1"));
        assert!(!is_integer_literal("1 2"));
    }

    #[test]
    fn raw_id_deserializes_both_shapes() {
        let n: RawId = serde_json::from_str("42").unwrap();
        assert_eq!(n, RawId::Integer(42));
        assert!(n.is_integer());

        let s: RawId = serde_json::from_str("\"ws.one\"").unwrap();
        assert_eq!(s, RawId::Text("ws.one".into()));
        assert!(!s.is_integer());
    }

    #[test]
    fn raw_id_serializes_back_unchanged() {
        assert_eq!(serde_json::to_string(&RawId::Integer(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&RawId::from("x")).unwrap(), "\"x\"");
    }

    #[test]
    fn text_that_reads_as_integer_is_integer() {
        assert!(RawId::from("42").is_integer());
        assert_eq!(RawId::Integer(-5).as_text(), "-5");
    }

    #[test]
    fn to_value_keeps_the_stored_shape() {
        assert_eq!(RawId::Integer(42).to_value(), serde_json::json!(42));
        assert_eq!(RawId::from("42").to_value(), serde_json::json!("42"));
    }

    #[test]
    fn floats_and_wide_integers_are_numeric_ids() {
        let float: RawId = serde_json::from_str("42.0").unwrap();
        assert!(matches!(float, RawId::Number(_)));
        assert!(float.is_integer());
        assert_eq!(float.to_value(), serde_json::json!(42.0));

        let wide: RawId = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(wide, RawId::Number(_)));
        assert!(wide.is_integer());
        assert_eq!(wide.as_text(), "18446744073709551615");
        assert_eq!(wide.to_value(), serde_json::json!(u64::MAX));
    }

    proptest! {
        #[test]
        fn every_i64_rendering_is_an_integer_literal(n in any::<i64>()) {
            prop_assert!(is_integer_literal(&n.to_string()));
        }

        #[test]
        fn strings_with_a_letter_are_never_integers(s in "[0-9]{0,4}[a-zA-Z_.][0-9]{0,4}") {
            prop_assert!(!is_integer_literal(&s));
        }
    }
}
