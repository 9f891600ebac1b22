//! Sort specifications for connection fields.
//!
//! The `sort` argument is an ordered list of camelCase field names,
//! optionally prefixed with `-` for descending order. `["abc", "-xyz"]`
//! orders by `abc` ascending, then `xyz` descending.

use crate::lookup::to_snake_case;

/// A single ordering key in query-layer naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

impl OrderKey {
    /// Parse one sort entry, e.g. `-createdAt` -> descending `created_at`.
    pub fn parse(entry: &str) -> Self {
        let (descending, name) = match entry.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, entry),
        };
        Self {
            field: to_snake_case(name),
            descending,
        }
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            write!(f, "{}", self.field)
        }
    }
}

/// An ordered multi-key sort specification.
///
/// Left-to-right precedence: the first key is the primary sort. Field names
/// are passed through to the query source as-is after case conversion;
/// unknown fields fail in the query layer with whatever error it raises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<OrderKey>,
}

impl SortSpec {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        Self {
            keys: entries.iter().map(|e| OrderKey::parse(e.as_ref())).collect(),
        }
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ascending() {
        let key = OrderKey::parse("createdAt");
        assert_eq!(key.field, "created_at");
        assert!(!key.descending);
    }

    #[test]
    fn test_parse_descending() {
        let key = OrderKey::parse("-createdAt");
        assert_eq!(key.field, "created_at");
        assert!(key.descending);
    }

    #[test]
    fn test_multi_key_order_is_preserved() {
        let spec = SortSpec::parse(&["abc", "-xyz"]);
        assert_eq!(
            spec.keys(),
            &[
                OrderKey { field: "abc".to_string(), descending: false },
                OrderKey { field: "xyz".to_string(), descending: true },
            ]
        );
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(OrderKey::parse("-dueDate").to_string(), "-due_date");
        assert_eq!(OrderKey::parse("name").to_string(), "name");
    }
}
