//! Identifier canonicalization.
//!
//! Canonical identifiers use a restricted character set that depends on the
//! kind of identifier:
//!
//! - Type names: `[A-Za-z0-9_]`
//! - Object ids: `[A-Za-z0-9_|.-]`
//!
//! Every character outside the set is replaced by a single `_`. The mapping
//! is not injective on its own; callers that need uniqueness detect
//! collisions themselves (types abort, object ids are suffixed).

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Storage escape for `.` inside object index keys, which the database does
/// not allow in field names.
pub const DOT_ESCAPE: &str = "_DOT_";

static TYPE_NAME_ILLEGAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid type name pattern"));

static OBJECT_ID_ILLEGAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_|.\-]").expect("valid object id pattern"));

/// Which identifier alphabet applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharClass {
    TypeName,
    ObjectId,
}

impl CharClass {
    fn illegal(self) -> &'static Regex {
        match self {
            Self::TypeName => &TYPE_NAME_ILLEGAL,
            Self::ObjectId => &OBJECT_ID_ILLEGAL,
        }
    }
}

/// Replace every character outside `class` with `_`.
pub fn sanitize(raw: &str, class: CharClass) -> String {
    class.illegal().replace_all(raw, "_").into_owned()
}

/// Returns `true` if `raw` has at least one character outside `class`.
pub fn needs_sanitizing(raw: &str, class: CharClass) -> bool {
    class.illegal().is_match(raw)
}

/// Undo the legacy `_DOT_` escape in a stored object index key.
pub fn unescape_object_id(stored: &str) -> Cow<'_, str> {
    if stored.contains(DOT_ESCAPE) {
        Cow::Owned(stored.replace(DOT_ESCAPE, "."))
    } else {
        Cow::Borrowed(stored)
    }
}

/// Escape `.` for use as an object index key.
pub fn escape_object_id(id: &str) -> Cow<'_, str> {
    if id.contains('.') {
        Cow::Owned(id.replace('.', DOT_ESCAPE))
    } else {
        Cow::Borrowed(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn type_names_keep_word_characters_only() {
        assert_eq!(sanitize("Ty#pe", CharClass::TypeName), "Ty_pe");
        assert_eq!(sanitize("a.b", CharClass::TypeName), "a_b");
        assert_eq!(sanitize("Genome-1", CharClass::TypeName), "Genome_1");
        assert_eq!(sanitize("Plain_Type9", CharClass::TypeName), "Plain_Type9");
    }

    #[test]
    fn object_ids_allow_pipe_dot_and_dash() {
        assert_eq!(sanitize("x|y.z-1", CharClass::ObjectId), "x|y.z-1");
        assert_eq!(sanitize("x#y", CharClass::ObjectId), "x_y");
        assert_eq!(sanitize("a b/c", CharClass::ObjectId), "a_b_c");
    }

    #[test]
    fn each_illegal_character_becomes_one_underscore() {
        assert_eq!(sanitize("a  b", CharClass::TypeName), "a__b");
        assert_eq!(sanitize("né", CharClass::ObjectId), "n_");
        assert_eq!(sanitize("日本", CharClass::TypeName), "__");
    }

    #[test]
    fn needs_sanitizing_agrees_with_sanitize() {
        assert!(needs_sanitizing("x#y", CharClass::ObjectId));
        assert!(!needs_sanitizing("x.y", CharClass::ObjectId));
        assert!(needs_sanitizing("x.y", CharClass::TypeName));
        assert!(!needs_sanitizing("", CharClass::TypeName));
    }

    #[test]
    fn dot_escape_roundtrip() {
        assert_eq!(unescape_object_id("a_DOT_b_DOT_c"), "a.b.c");
        assert_eq!(escape_object_id("a.b.c"), "a_DOT_b_DOT_c");
        assert!(matches!(unescape_object_id("plain"), Cow::Borrowed(_)));
        assert!(matches!(escape_object_id("plain"), Cow::Borrowed(_)));
    }

    proptest! {
        #[test]
        fn sanitizing_is_idempotent(raw in "\\PC{0,24}") {
            for class in [CharClass::TypeName, CharClass::ObjectId] {
                let once = sanitize(&raw, class);
                prop_assert_eq!(sanitize(&once, class), once.clone());
                prop_assert!(!needs_sanitizing(&once, class));
            }
        }

        #[test]
        fn canonical_input_is_left_alone(raw in "[A-Za-z0-9_]{0,24}") {
            prop_assert_eq!(sanitize(&raw, CharClass::TypeName), raw.clone());
            prop_assert_eq!(sanitize(&raw, CharClass::ObjectId), raw);
        }

        #[test]
        fn sanitizing_preserves_character_count(raw in "\\PC{0,24}") {
            let out = sanitize(&raw, CharClass::ObjectId);
            prop_assert_eq!(out.chars().count(), raw.chars().count());
        }
    }
}
