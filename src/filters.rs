//! Dynamic filter extraction for connection fields.
//!
//! A connection field accepts a single JSON `filters` argument so clients can
//! filter without enumerating top-level arguments:
//!
//! ```graphql
//! {
//!     getData(first: 10, filters: "{\"name_Icontains\": \"bob\", \"enabled\": true}")
//! }
//! ```
//!
//! Each key is translated to a lookup path and validated against the set of
//! filters the field actually supports.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::lookup::{convert_field_lookup, to_camel_case};
use crate::{GraphQLError, Result};

/// The set of lookup paths a connection field accepts as filters.
///
/// Populated once per field from whatever filter layer the service uses;
/// immutable for the lifetime of a request.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    names: Vec<String>,
}

impl FilterSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    pub fn contains(&self, lookup_path: &str) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(lookup_path)).is_ok()
    }

    /// Valid lookup paths, sorted.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Valid filter names in the camelCase form shown to clients.
    pub fn client_names(&self) -> Vec<String> {
        self.names.iter().map(|n| to_camel_case(n)).collect()
    }
}

/// Translate and validate the contents of a `filters` argument.
///
/// Every key is converted with [`convert_field_lookup`]; a key that does not
/// resolve to a member of `valid` fails with a validation error naming the
/// offending field and listing the accepted client-facing names. Values pass
/// through untouched.
pub fn extract_filter_args(
    raw_filters: &Map<String, Value>,
    valid: &FilterSet,
) -> Result<BTreeMap<String, Value>> {
    let mut dynamic_filters = BTreeMap::new();

    for (field_lookup, lookup_value) in raw_filters {
        let parsed = convert_field_lookup(field_lookup);
        if !valid.contains(&parsed) {
            return Err(GraphQLError::Validation(format!(
                "Invalid filter field lookup '{original}' (parsed to '{field}') \
                 encountered. Valid field lookups are: {lookups}",
                original = field_lookup,
                field = parsed,
                lookups = valid.client_names().join(", "),
            )));
        }
        dynamic_filters.insert(parsed, lookup_value.clone());
    }

    Ok(dynamic_filters)
}
