//! Query filters and projections understood by every store backend.

use serde_json::Value;
use wsm_types::{Document, KEY_FIELD};

/// A predicate over the top-level fields of a document.
///
/// Only the handful of operators the migration needs are modelled. `Ne`
/// matches documents where the field is missing, as the service database
/// does.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
    Ne(String, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    /// Conjunction with another filter.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::All => other,
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Returns `true` if `doc` satisfies this filter.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => doc.get(field) == Some(value),
            Self::Ne(field, value) => doc.get(field) != Some(value),
            Self::And(parts) => parts.iter().all(|f| f.matches(doc)),
        }
    }
}

/// The subset of top-level fields a scan should return.
///
/// The primary key is always kept so that a projected document can still be
/// addressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn apply(&self, doc: &Document) -> Document {
        doc.iter()
            .filter(|(k, _)| k.as_str() == KEY_FIELD || self.fields.iter().any(|f| f == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn eq_matches_exact_value() {
        let d = doc(json!({"owner": "public", "id": "w1"}));
        assert!(Filter::eq("owner", "public").matches(&d));
        assert!(!Filter::eq("owner", "alice").matches(&d));
        assert!(!Filter::eq("missing", "x").matches(&d));
    }

    #[test]
    fn ne_matches_missing_field() {
        let d = doc(json!({"id": "bob"}));
        assert!(Filter::ne("id", "public").matches(&d));
        assert!(!Filter::ne("id", "bob").matches(&d));
        assert!(Filter::ne("other", "x").matches(&d));
    }

    #[test]
    fn integers_and_strings_are_distinct() {
        let d = doc(json!({"id": 42}));
        assert!(Filter::eq("id", 42).matches(&d));
        assert!(!Filter::eq("id", "42").matches(&d));
    }

    #[test]
    fn and_requires_all_parts() {
        let d = doc(json!({"workspace": "w", "id": "o", "instance": 2}));
        let f = Filter::eq("workspace", "w")
            .and(Filter::eq("id", "o"))
            .and(Filter::eq("instance", 2));
        assert!(f.matches(&d));
        let miss = Filter::eq("workspace", "w").and(Filter::eq("instance", 3));
        assert!(!miss.matches(&d));
    }

    #[test]
    fn and_on_all_collapses() {
        assert_eq!(Filter::All.and(Filter::eq("a", 1)), Filter::eq("a", 1));
    }

    #[test]
    fn projection_keeps_key_and_listed_fields() {
        let d = doc(json!({"_id": "k", "type": "T", "id": "o", "uuid": "u"}));
        let p = Projection::fields(["type"]).apply(&d);
        assert_eq!(p.len(), 2);
        assert_eq!(p["_id"], json!("k"));
        assert_eq!(p["type"], json!("T"));
    }
}
