//! camelCase field-name translation to query-layer lookup paths.
//!
//! GraphQL clients send filter arguments like `reportName_Icontains`; the
//! query layer wants `report_name__icontains`. The translation splits on the
//! last underscore, checks the tail against a fixed registry of lookup
//! suffixes, and snake-cases the pieces.

/// Separator between a field path and its lookup suffix.
pub const LOOKUP_SEP: &str = "__";

/// Registered lookup suffixes understood by the query layer.
pub const FIELD_LOOKUPS: &[&str] = &[
    "exact",
    "iexact",
    "contains",
    "icontains",
    "in",
    "gt",
    "gte",
    "lt",
    "lte",
    "startswith",
    "istartswith",
    "endswith",
    "iendswith",
    "range",
    "isnull",
    "regex",
    "iregex",
];

/// Returns true if `suffix` names a registered lookup (case-insensitive).
pub fn is_lookup(suffix: &str) -> bool {
    FIELD_LOOKUPS
        .iter()
        .any(|lookup| suffix.eq_ignore_ascii_case(lookup))
}

/// Convert a camelCase identifier to snake_case.
///
/// Word boundaries are inserted both before an uppercase letter that follows
/// a lowercase letter or digit, and before an uppercase letter that starts a
/// capitalized word. An existing `_` followed by a capitalized word therefore
/// produces a double underscore: `partner_OutreachTags` becomes
/// `partner__outreach_tags`, which is exactly the relational lookup path the
/// query layer expects.
pub fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars
                .get(i + 1)
                .map(|n| n.is_ascii_lowercase())
                .unwrap_or(false);
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() || next_is_lower {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Convert a snake_case identifier back to the camelCase form exposed to
/// GraphQL clients.
///
/// Components after the first are capitalized; empty components (from a
/// double underscore) are preserved as a literal `_`, so
/// `report_name__icontains` round-trips to `reportName_Icontains`.
pub fn to_camel_case(input: &str) -> String {
    let mut components = input.split('_');
    let mut out = String::with_capacity(input.len());
    if let Some(first) = components.next() {
        out.push_str(first);
    }
    for component in components {
        if component.is_empty() {
            out.push('_');
        } else {
            let mut chars = component.chars();
            if let Some(head) = chars.next() {
                out.extend(head.to_uppercase());
                out.extend(chars.flat_map(|c| c.to_lowercase()));
            }
        }
    }
    out
}

/// Convert a camel-cased filter argument to a query-layer field lookup.
///
/// The tail after the last `_` wins the lookup interpretation whenever it
/// matches a registered lookup, even if a real field happens to share the
/// name. That priority rule is fixed and occasionally surprising; callers
/// with a field literally named `in` or `contains` cannot filter on it
/// through this path.
///
/// Examples:
///
/// ```rust
/// use quill_graphql_helpers::lookup::convert_field_lookup;
///
/// assert_eq!(convert_field_lookup("reportName_Icontains"), "report_name__icontains");
/// assert_eq!(convert_field_lookup("prefab"), "prefab");
/// assert_eq!(convert_field_lookup("partner_OutreachTags"), "partner__outreach_tags");
/// ```
pub fn convert_field_lookup(field_lookup: &str) -> String {
    match field_lookup.rsplit_once('_') {
        None => to_snake_case(field_lookup),
        Some((head, tail)) => {
            if is_lookup(tail) {
                let snake_head = to_snake_case(head);
                let snake_tail = to_snake_case(tail);
                format!("{}{}{}", snake_head, LOOKUP_SEP, snake_tail)
            } else {
                // Not a recognized lookup, assume an exact filter.
                to_snake_case(field_lookup)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(to_snake_case("reportName"), "report_name");
        assert_eq!(to_snake_case("prefab"), "prefab");
        assert_eq!(to_snake_case("partner_OutreachTags"), "partner__outreach_tags");
        assert_eq!(to_snake_case("ABTest"), "ab_test");
        assert_eq!(to_snake_case("HTTPResponse"), "http_response");
    }

    #[test]
    fn test_camel_case_conversion() {
        assert_eq!(to_camel_case("report_name"), "reportName");
        assert_eq!(to_camel_case("name__icontains"), "name_Icontains");
        assert_eq!(to_camel_case("enabled"), "enabled");
    }

    #[test]
    fn test_simple_lookups() {
        let cases = [
            ("reportName_Icontains", "report_name__icontains"),
            ("prefab", "prefab"),
        ];
        for (input, expected) in cases {
            assert_eq!(convert_field_lookup(input), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_related_lookups() {
        let cases = [
            ("partner_Name_Icontains", "partner__name__icontains"),
            ("partner_Name", "partner__name"),
            ("partner_OutreachTags", "partner__outreach_tags"),
        ];
        for (input, expected) in cases {
            assert_eq!(convert_field_lookup(input), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_lookup_suffix_is_case_insensitive() {
        assert_eq!(convert_field_lookup("age_Gte"), "age__gte");
        assert_eq!(convert_field_lookup("age_gte"), "age__gte");
    }

    #[test]
    fn test_unregistered_suffix_is_one_field() {
        assert_eq!(convert_field_lookup("partner_Tags"), "partner__tags");
        assert_eq!(convert_field_lookup("created_at"), "created_at");
    }
}
