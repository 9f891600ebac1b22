//! Test utilities shipped with the crate.
//!
//! Downstream services use these in their own test suites, so they live in
//! the library proper rather than behind `#[cfg(test)]`:
//!
//! - [`Records`]: an in-memory [`QuerySource`] over JSON rows, for exercising
//!   connection resolution without a database.
//! - [`StaticPermissions`]: canned [`PermissionsApi`] responses, replacing
//!   HTTP calls to user-management.
//! - Response assertions for schema-level tests.

use async_graphql::Response;
use async_trait::async_trait;
use serde_json::Value;

use crate::auth::{PermissionsApi, UserPermissions};
use crate::connection::QuerySource;
use crate::lookup::is_lookup;
use crate::sort::OrderKey;
use crate::{GraphQLError, Result};

/// In-memory result set over JSON objects.
///
/// Lookup paths behave like the query layer's: `partner__name__icontains`
/// traverses the nested `partner` object and applies `icontains` to its
/// `name`. Filtering preserves row order; ordering replaces any previous
/// ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Records {
    rows: Vec<Value>,
}

impl Records {
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }
}

impl QuerySource for Records {
    type Node = Value;

    fn apply_filter(self, lookup_path: &str, value: &Value) -> Result<Self> {
        let (path, op) = split_lookup(lookup_path);
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            if matches(&field_value(&row, path), op, value)? {
                rows.push(row);
            }
        }
        Ok(Self { rows })
    }

    fn apply_order(mut self, keys: &[OrderKey]) -> Self {
        self.rows.sort_by(|a, b| {
            for key in keys {
                let ordering = cmp_values(&field_value(a, &key.field), &field_value(b, &key.field));
                let ordering = if key.descending { ordering.reverse() } else { ordering };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        self
    }

    fn count(&self) -> usize {
        self.rows.len()
    }

    fn nodes(&self, start: usize, end: usize) -> Vec<Value> {
        self.rows
            .get(start..end.min(self.rows.len()))
            .unwrap_or_default()
            .to_vec()
    }
}

/// Split a lookup path into a field path and an operator. A trailing
/// registered lookup is the operator; otherwise the whole path is an exact
/// match.
fn split_lookup(lookup_path: &str) -> (&str, &str) {
    match lookup_path.rsplit_once("__") {
        Some((path, tail)) if is_lookup(tail) => (path, tail),
        _ => (lookup_path, "exact"),
    }
}

/// Walk a `__`-separated path through nested JSON objects. Missing fields
/// resolve to null.
fn field_value(row: &Value, path: &str) -> Value {
    let mut current = row;
    for segment in path.split("__") {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn matches(actual: &Value, op: &str, expected: &Value) -> Result<bool> {
    let result = match op {
        "exact" => actual == expected,
        "iexact" => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(e)) => a.eq_ignore_ascii_case(e),
            _ => false,
        },
        "contains" => str_op(actual, expected, |a, e| a.contains(e)),
        "icontains" => {
            str_op(actual, expected, |a, e| a.to_lowercase().contains(&e.to_lowercase()))
        }
        "startswith" => str_op(actual, expected, |a, e| a.starts_with(e)),
        "istartswith" => str_op(actual, expected, |a, e| {
            a.to_lowercase().starts_with(&e.to_lowercase())
        }),
        "endswith" => str_op(actual, expected, |a, e| a.ends_with(e)),
        "iendswith" => str_op(actual, expected, |a, e| {
            a.to_lowercase().ends_with(&e.to_lowercase())
        }),
        "gt" => cmp_values(actual, expected) == std::cmp::Ordering::Greater,
        "gte" => cmp_values(actual, expected) != std::cmp::Ordering::Less,
        "lt" => cmp_values(actual, expected) == std::cmp::Ordering::Less,
        "lte" => cmp_values(actual, expected) != std::cmp::Ordering::Greater,
        "in" => expected
            .as_array()
            .map(|options| options.contains(actual))
            .unwrap_or(false),
        "range" => match expected.as_array() {
            Some(bounds) if bounds.len() == 2 => {
                cmp_values(actual, &bounds[0]) != std::cmp::Ordering::Less
                    && cmp_values(actual, &bounds[1]) != std::cmp::Ordering::Greater
            }
            _ => false,
        },
        "isnull" => expected.as_bool().unwrap_or(false) == actual.is_null(),
        other => {
            return Err(GraphQLError::Validation(format!(
                "Unsupported lookup '{}' for in-memory records",
                other
            )))
        }
    };
    Ok(result)
}

fn str_op(actual: &Value, expected: &Value, op: impl Fn(&str, &str) -> bool) -> bool {
    match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(e)) => op(a, e),
        _ => false,
    }
}

/// Total order over JSON values: null first, then booleans, numbers,
/// strings; everything else compares by its serialized form.
fn cmp_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Canned permission responses for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    authenticated: bool,
    permissions: UserPermissions,
    failing: bool,
}

impl StaticPermissions {
    /// A session that is not logged in.
    pub fn logged_out() -> Self {
        Self::default()
    }

    /// A logged-in session with the given activities.
    pub fn with_activities<I, S>(activities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authenticated: true,
            permissions: UserPermissions {
                activities: activities.into_iter().map(Into::into).collect(),
                ..Default::default()
            },
            failing: false,
        }
    }

    /// A user-management service that is down.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Mark the session's user as staff.
    pub fn staff(mut self) -> Self {
        self.permissions.is_staff = true;
        self
    }

    /// Mark the session's user as a superuser.
    pub fn superuser(mut self) -> Self {
        self.permissions.is_superuser = true;
        self
    }
}

#[async_trait]
impl PermissionsApi for StaticPermissions {
    async fn is_authenticated(&self, _cookies: &str) -> Result<bool> {
        if self.failing {
            return Err(GraphQLError::Upstream("user-management unavailable".to_string()));
        }
        Ok(self.authenticated)
    }

    async fn user_permissions(&self, _cookies: &str) -> Result<UserPermissions> {
        if self.failing {
            return Err(GraphQLError::Upstream("user-management unavailable".to_string()));
        }
        Ok(self.permissions.clone())
    }
}

/// Assert that a GraphQL response completed without errors, displaying the
/// errors on failure.
pub fn assert_no_errors(response: &Response) {
    assert!(
        response.errors.is_empty(),
        "expected no errors, got: {:?}",
        response.errors
    );
}

/// Assert that a GraphQL response reported at least one error.
pub fn assert_has_errors(response: &Response) {
    assert!(
        !response.errors.is_empty(),
        "expected errors, got a clean response: {:?}",
        response.data
    );
}
