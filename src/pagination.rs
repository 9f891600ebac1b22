//! Relay-style cursor pagination with `sort`, `filters`, and `jumpToPage`.
//!
//! Cursors are array-connection offsets (`arrayconnection:<offset>`,
//! base64-encoded), so an arbitrary page can be reached by computing an
//! offset and encoding it as an `after` cursor.

use async_graphql::{InputObject, Object, SimpleObject};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Value};

use crate::{GraphQLError, Result};

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Page information
#[derive(SimpleObject, Debug, Clone)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Edge in a connection
#[derive(Debug, Clone)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
}

#[Object]
impl<T: async_graphql::OutputType> Edge<T> {
    async fn cursor(&self) -> &str {
        &self.cursor
    }

    async fn node(&self) -> &T {
        &self.node
    }
}

/// Connection (paginated result)
#[derive(Debug, Clone)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
    pub total_count: usize,
}

#[Object]
impl<T: async_graphql::OutputType> Connection<T> {
    async fn edges(&self) -> &[Edge<T>] {
        &self.edges
    }

    async fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    /// Total number of records matching the query, ignoring pagination.
    async fn total_count(&self) -> usize {
        self.total_count
    }
}

impl<T> Connection<T> {
    /// Build a connection from a slice of nodes starting at `start_offset`
    /// within the full result set.
    pub fn from_slice(
        nodes: Vec<T>,
        start_offset: usize,
        has_previous: bool,
        has_next: bool,
        total_count: usize,
    ) -> Self {
        let edges: Vec<Edge<T>> = nodes
            .into_iter()
            .enumerate()
            .map(|(idx, node)| Edge {
                cursor: CursorCodec::offset_to_cursor((start_offset + idx) as i64),
                node,
            })
            .collect();

        let start_cursor = edges.first().map(|e| e.cursor.clone());
        let end_cursor = edges.last().map(|e| e.cursor.clone());

        Self {
            edges,
            page_info: PageInfo {
                has_next_page: has_next,
                has_previous_page: has_previous,
                start_cursor,
                end_cursor,
            },
            total_count,
        }
    }

    /// Create empty connection
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo {
                has_next_page: false,
                has_previous_page: false,
                start_cursor: None,
                end_cursor: None,
            },
            total_count: 0,
        }
    }
}

/// Cursor encoding/decoding
pub struct CursorCodec;

impl CursorCodec {
    /// Encode cursor to base64
    pub fn encode(value: &str) -> String {
        BASE64.encode(value.as_bytes())
    }

    /// Decode cursor from base64
    pub fn decode(cursor: &str) -> Result<String> {
        let bytes = BASE64
            .decode(cursor.as_bytes())
            .map_err(|e| GraphQLError::InvalidCursor(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| GraphQLError::InvalidCursor(e.to_string()))
    }

    /// Encode an array-connection offset as an opaque cursor.
    ///
    /// Offsets may be negative; `-1` denotes "before the first record" and
    /// is how page 1 of a page jump stays identical to no cursor at all.
    pub fn offset_to_cursor(offset: i64) -> String {
        Self::encode(&format!("{}{}", CURSOR_PREFIX, offset))
    }

    /// Decode an array-connection cursor back to its offset.
    pub fn cursor_to_offset(cursor: &str) -> Result<i64> {
        let decoded = Self::decode(cursor)?;
        let offset = decoded
            .strip_prefix(CURSOR_PREFIX)
            .ok_or_else(|| GraphQLError::InvalidCursor(decoded.clone()))?;
        offset
            .parse::<i64>()
            .map_err(|e| GraphQLError::InvalidCursor(e.to_string()))
    }
}

/// Arguments accepted by a connection field.
///
/// The standard relay arguments plus three platform extensions:
///
/// - `sort`: order the results by one or more fields; prefix a field name
///   with `-` to sort descending.
/// - `filters`: JSON object (as a string) of filter arguments for querying
///   the results.
/// - `jump_to_page`: the index (1-based) of the page to display; page size
///   is defined by `first` or `last`.
#[derive(InputObject, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Number of items to return (forward pagination)
    pub first: Option<i32>,

    /// Cursor to start from (forward pagination)
    pub after: Option<String>,

    /// Number of items to return (backward pagination)
    pub last: Option<i32>,

    /// Cursor to start from (backward pagination)
    pub before: Option<String>,

    /// Order the results by one or more fields. Prefix field name with "`-`"
    /// to sort descending.
    pub sort: Option<Vec<String>>,

    /// Object containing filter arguments for querying the results.
    pub filters: Option<String>,

    /// The index (1-based) of the page to display. Page size is defined by
    /// `first`.
    pub jump_to_page: Option<i32>,
}

impl ConnectionArgs {
    /// Validate pagination input
    pub fn validate(&self) -> Result<()> {
        if let Some(first) = self.first {
            if first < 0 {
                return Err(GraphQLError::Pagination(
                    "'first' must be non-negative".to_string(),
                ));
            }
        }

        if let Some(last) = self.last {
            if last < 0 {
                return Err(GraphQLError::Pagination(
                    "'last' must be non-negative".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Compute the `after` cursor implied by `jump_to_page`, if present.
    ///
    /// `field_name` is the connection field being resolved; it appears in
    /// the error raised when no page size was supplied. Page 1 resolves to
    /// offset `-1`, equivalent to no cursor.
    pub fn page_jump_cursor(&self, field_name: &str) -> Result<Option<String>> {
        let jump_to_page = match self.jump_to_page {
            Some(page) => page,
            None => return Ok(None),
        };

        let page_size = match self.first.or(self.last) {
            Some(size) => size as i64,
            None => {
                return Err(GraphQLError::Pagination(format!(
                    "You must provide a `first` or `last` value to properly \
                     paginate the `{}` connection.",
                    field_name
                )))
            }
        };

        let offset = page_size * (jump_to_page as i64 - 1) - 1;
        Ok(Some(CursorCodec::offset_to_cursor(offset)))
    }

    /// The `after` cursor to use: `jump_to_page` wins over an explicit
    /// `after`.
    pub fn effective_after(&self, field_name: &str) -> Result<Option<String>> {
        match self.page_jump_cursor(field_name)? {
            Some(cursor) => Ok(Some(cursor)),
            None => Ok(self.after.clone()),
        }
    }

    /// Parse the `filters` argument into a JSON object.
    pub fn parsed_filters(&self) -> Result<Option<Map<String, Value>>> {
        let raw = match &self.filters {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| GraphQLError::BadRequest(format!("Invalid `filters` value: {}", e)))?;
        match value {
            Value::Object(map) => Ok(Some(map)),
            other => Err(GraphQLError::BadRequest(format!(
                "Invalid `filters` value: expected a JSON object, got {}",
                other
            ))),
        }
    }
}

/// Half-open range of a result set selected by relay pagination arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceBounds {
    pub start: usize,
    pub end: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Apply the relay array-connection algorithm to a result set of `count`
/// records: `after`/`before` clamp the window, then `first`/`last` shrink it
/// from the respective end.
pub fn slice_bounds(
    count: usize,
    first: Option<i32>,
    last: Option<i32>,
    after: Option<&str>,
    before: Option<&str>,
) -> Result<SliceBounds> {
    let lower = match after {
        Some(cursor) => {
            let offset = CursorCodec::cursor_to_offset(cursor)?;
            (offset + 1).max(0).min(count as i64) as usize
        }
        None => 0,
    };
    let upper = match before {
        Some(cursor) => {
            let offset = CursorCodec::cursor_to_offset(cursor)?;
            offset.max(0).min(count as i64) as usize
        }
        None => count,
    };

    let mut start = lower;
    let mut end = upper.max(lower);

    if let Some(first) = first {
        end = end.min(start + first as usize);
    }
    if let Some(last) = last {
        start = start.max(end.saturating_sub(last as usize));
    }

    Ok(SliceBounds {
        start,
        end,
        has_previous: start > lower,
        has_next: end < upper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cursor_codec() {
        let original = "test-cursor";
        let encoded = CursorCodec::encode(original);
        let decoded = CursorCodec::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_offset_cursor_round_trip() {
        for offset in [-1, 0, 19, 1000] {
            let cursor = CursorCodec::offset_to_cursor(offset);
            assert_eq!(CursorCodec::cursor_to_offset(&cursor).unwrap(), offset);
        }
    }

    #[test]
    fn test_garbage_cursor_is_rejected() {
        assert!(CursorCodec::cursor_to_offset("not base64!").is_err());
        let wrong_prefix = CursorCodec::encode("somethingelse:3");
        assert!(CursorCodec::cursor_to_offset(&wrong_prefix).is_err());
    }

    #[test]
    fn test_page_jump_offset() {
        let args = ConnectionArgs {
            first: Some(10),
            jump_to_page: Some(3),
            ..Default::default()
        };
        let cursor = args.page_jump_cursor("getData").unwrap().unwrap();
        assert_eq!(CursorCodec::cursor_to_offset(&cursor).unwrap(), 19);
    }

    #[test]
    fn test_page_one_matches_no_cursor() {
        let args = ConnectionArgs {
            first: Some(10),
            jump_to_page: Some(1),
            ..Default::default()
        };
        let cursor = args.page_jump_cursor("getData").unwrap().unwrap();
        let jumped = slice_bounds(25, Some(10), None, Some(&cursor), None).unwrap();
        let plain = slice_bounds(25, Some(10), None, None, None).unwrap();
        assert_eq!(jumped.start, plain.start);
        assert_eq!(jumped.end, plain.end);
    }

    #[test]
    fn test_page_jump_requires_page_size() {
        let args = ConnectionArgs {
            jump_to_page: Some(3),
            ..Default::default()
        };
        let err = args.page_jump_cursor("getData").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`first` or `last`"), "{}", message);
        assert!(message.contains("`getData`"), "{}", message);
    }

    #[test]
    fn test_slice_bounds_first() {
        let bounds = slice_bounds(25, Some(10), None, None, None).unwrap();
        assert_eq!(
            bounds,
            SliceBounds { start: 0, end: 10, has_previous: false, has_next: true }
        );
    }

    #[test]
    fn test_slice_bounds_last() {
        let bounds = slice_bounds(25, None, Some(5), None, None).unwrap();
        assert_eq!(
            bounds,
            SliceBounds { start: 20, end: 25, has_previous: true, has_next: false }
        );
    }

    #[test]
    fn test_slice_bounds_after() {
        let after = CursorCodec::offset_to_cursor(9);
        let bounds = slice_bounds(25, Some(10), None, Some(&after), None).unwrap();
        assert_eq!(
            bounds,
            SliceBounds { start: 10, end: 20, has_previous: false, has_next: true }
        );
    }

    #[test]
    fn test_slice_bounds_past_the_end() {
        let after = CursorCodec::offset_to_cursor(100);
        let bounds = slice_bounds(25, Some(10), None, Some(&after), None).unwrap();
        assert_eq!(bounds.start, 25);
        assert_eq!(bounds.end, 25);
        assert!(!bounds.has_next);
    }

    #[test]
    fn test_validate_rejects_negative_sizes() {
        let args = ConnectionArgs { first: Some(-1), ..Default::default() };
        assert!(args.validate().is_err());
        let args = ConnectionArgs { last: Some(-1), ..Default::default() };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parsed_filters() {
        let args = ConnectionArgs {
            filters: Some(r#"{"status": "open"}"#.to_string()),
            ..Default::default()
        };
        let map = args.parsed_filters().unwrap().unwrap();
        assert_eq!(map["status"], serde_json::json!("open"));

        let args = ConnectionArgs {
            filters: Some("[1, 2]".to_string()),
            ..Default::default()
        };
        assert!(args.parsed_filters().is_err());
    }

    #[test]
    fn test_connection_from_slice() {
        let conn = Connection::from_slice(vec!["a", "b"], 10, true, false, 12);
        assert_eq!(conn.edges.len(), 2);
        assert_eq!(
            CursorCodec::cursor_to_offset(&conn.edges[0].cursor).unwrap(),
            10
        );
        assert_eq!(
            CursorCodec::cursor_to_offset(&conn.edges[1].cursor).unwrap(),
            11
        );
        assert!(conn.page_info.has_previous_page);
        assert!(!conn.page_info.has_next_page);
        assert_eq!(conn.page_info.start_cursor, Some(conn.edges[0].cursor.clone()));
    }
}
