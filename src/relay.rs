//! Relay global-ID helpers.
//!
//! Global IDs are base64 of `"<TypeName>:<id>"`, matching what relay-style
//! clients and the other platform services produce.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::{GraphQLError, Result};

/// Encode a type name and database id as a global ID.
pub fn to_global_id(type_name: &str, id: i64) -> String {
    BASE64.encode(format!("{}:{}", type_name, id))
}

/// Decode a global ID into its `(type_name, raw_id)` parts.
pub fn from_global_id(global_id: &str) -> Result<(String, String)> {
    let decoded = BASE64
        .decode(global_id.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| invalid(global_id))?;
    let (type_name, id) = decoded.split_once(':').ok_or_else(|| invalid(global_id))?;
    Ok((type_name.to_string(), id.to_string()))
}

/// Decode a global ID to a numeric database id, or fail with a validation
/// error naming `field_name` so the client knows which input was bad.
pub fn id_or_raise(global_id: &str, field_name: &str) -> Result<i64> {
    from_global_id(global_id)
        .ok()
        .and_then(|(_, id)| id.parse::<i64>().ok())
        .ok_or_else(|| {
            GraphQLError::Validation(format!(
                "{}: Invalid global ID '{}'",
                field_name, global_id
            ))
        })
}

fn invalid(global_id: &str) -> GraphQLError {
    GraphQLError::BadRequest(format!("Invalid global ID '{}'", global_id))
}
