//! Connection resolution over an externally-owned query source.
//!
//! [`resolve_connection`] is the single entry point a connection field's
//! resolver calls: it translates `jump_to_page` into a cursor, applies the
//! sort specification (wrapping any bespoke field resolver so ordering is
//! never dropped), extracts and applies dynamic filters, and slices the
//! result per the relay array-connection algorithm.

use serde_json::Value;

use crate::filters::{extract_filter_args, FilterSet};
use crate::pagination::{slice_bounds, Connection, ConnectionArgs};
use crate::sort::{OrderKey, SortSpec};
use crate::Result;

/// The result-set abstraction a connection field resolves against.
///
/// Implementations are owned by the host service (a SQL query builder, a
/// search index, [`crate::testing::Records`] in tests). All methods are
/// synchronous transformations; any I/O belongs to `nodes()`.
pub trait QuerySource: Sized {
    type Node;

    /// Restrict the result set by one lookup path (e.g. `name__icontains`).
    ///
    /// Unknown lookup paths fail with whatever error the implementation
    /// raises; this layer does not second-guess them.
    fn apply_filter(self, lookup_path: &str, value: &Value) -> Result<Self>;

    /// Order the result set by the given keys, left-to-right precedence.
    ///
    /// Must REPLACE any previously applied ordering, not append to it, so
    /// applying the same specification twice is idempotent.
    fn apply_order(self, keys: &[OrderKey]) -> Self;

    /// Number of records in the result set.
    fn count(&self) -> usize;

    /// Materialize the records in `[start, end)`.
    fn nodes(&self, start: usize, end: usize) -> Vec<Self::Node>;
}

/// Resolve a connection field.
///
/// `field_name` names the field for error messages. `field_resolver` is the
/// bespoke resolver, if the field has one: when it returns `None` the ordered
/// default source is used, and when it returns a source of its own the same
/// ordering is re-applied to it, so a custom resolver can never silently
/// discard the requested sort.
pub fn resolve_connection<Q, F>(
    field_name: &str,
    args: &ConnectionArgs,
    filter_set: &FilterSet,
    default_source: Q,
    field_resolver: Option<F>,
) -> Result<Connection<Q::Node>>
where
    Q: QuerySource,
    F: FnOnce() -> Option<Q>,
{
    args.validate()?;

    let after = args.effective_after(field_name)?;

    let sort = SortSpec::parse(args.sort.as_deref().unwrap_or_default());
    let mut source = apply_sort(&sort, default_source, field_resolver);

    if let Some(raw_filters) = args.parsed_filters()? {
        let dynamic_filters = extract_filter_args(&raw_filters, filter_set)?;
        for (lookup_path, value) in &dynamic_filters {
            source = source.apply_filter(lookup_path, value)?;
        }
    }

    let count = source.count();
    let bounds = slice_bounds(
        count,
        args.first,
        args.last,
        after.as_deref(),
        args.before.as_deref(),
    )?;
    let nodes = source.nodes(bounds.start, bounds.end);

    Ok(Connection::from_slice(
        nodes,
        bounds.start,
        bounds.has_previous,
        bounds.has_next,
        count,
    ))
}

/// Apply a sort specification, honoring a bespoke field resolver.
///
/// Mirrors the connection-resolver wrapping contract: the default source is
/// ordered up front; a resolver that yields nothing falls back to it, and a
/// resolver that yields its own source gets the ordering re-applied.
pub fn apply_sort<Q, F>(sort: &SortSpec, default_source: Q, field_resolver: Option<F>) -> Q
where
    Q: QuerySource,
    F: FnOnce() -> Option<Q>,
{
    if sort.is_empty() {
        return match field_resolver {
            Some(resolver) => resolver().unwrap_or(default_source),
            None => default_source,
        };
    }

    let ordered_default = default_source.apply_order(sort.keys());
    match field_resolver {
        Some(resolver) => match resolver() {
            Some(source) => source.apply_order(sort.keys()),
            None => ordered_default,
        },
        None => ordered_default,
    }
}
