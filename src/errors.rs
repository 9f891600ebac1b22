//! GraphQL error objects, codes, and response masking.
//!
//! Two levels of errors exist in our GraphQL responses:
//!
//! 1. Application-level errors: rendered inside the schema as a list of
//!    [`ErrorObject`]s with a code, a user-friendly message, and the field
//!    that caused them.
//! 2. Server errors: the top-level `errors` list parallel to `data`. These
//!    are unhandled resolver failures; they may be unsafe to show and are
//!    masked by [`mask_response_errors`] after being logged.

use std::collections::BTreeMap;

use async_graphql::{ErrorExtensions, Response, SimpleObject};

use crate::GraphQLError;

pub const ERROR_BAD_REQUEST: &str = "bad_request";
pub const ERROR_PERMISSION_DENIED: &str = "permission_denied";
pub const ERROR_CSRF_FAILURE: &str = "csrf_detected";
pub const ERROR_NOT_FOUND: &str = "not_found";
pub const ERROR_SERVER_FAILURE: &str = "error";
pub const ERROR_VALIDATION: &str = "validation_error";

/// Message substituted for masked internal errors.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong.";

/// Application-level error rendered inside a payload.
#[derive(SimpleObject, Debug, Clone, PartialEq, Eq)]
pub struct ErrorObject {
    /// Which field in a concrete node caused this error.
    pub field: String,
    /// A user friendly message explaining the error.
    pub message: String,
    /// A short string for the error, see the `ERROR_*` constants.
    pub code: String,
}

impl ErrorObject {
    pub fn new(
        code: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Per-field validation messages, ordered by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Fan a set of field validation messages out into [`ErrorObject`]s.
pub fn field_errors_to_objects(field_errors: &FieldErrors) -> Vec<ErrorObject> {
    field_errors
        .iter()
        .flat_map(|(field, messages)| {
            messages
                .iter()
                .map(|message| ErrorObject::new(ERROR_VALIDATION, field.clone(), message.clone()))
        })
        .collect()
}

/// Return new field errors with a prefix added to every field name.
///
/// Used when validating nested input so errors point at
/// `contact.emailAddress` rather than a bare `emailAddress`.
pub fn prefix_field_errors(prefix: &str, field_errors: FieldErrors) -> FieldErrors {
    field_errors
        .into_iter()
        .map(|(field, messages)| (format!("{}{}", prefix, field), messages))
        .collect()
}

impl ErrorExtensions for GraphQLError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", code))
    }
}

/// Configuration for masking server errors before they leave the process.
#[derive(Debug, Clone, Default)]
pub struct ErrorMaskConfig {
    /// When set, original messages are kept (local development only).
    pub debug: bool,
    /// Messages approved to be shown to users verbatim even when the error
    /// carries no code.
    pub user_facing_messages: Vec<String>,
}

impl ErrorMaskConfig {
    fn is_user_facing(&self, message: &str) -> bool {
        self.user_facing_messages.iter().any(|m| m == message)
    }
}

/// Mask unhandled server errors in a GraphQL response.
///
/// Errors that carry a `code` extension were raised deliberately through
/// [`GraphQLError`] and pass through untouched. Anything else is logged and
/// replaced with [`GENERIC_ERROR_MESSAGE`], unless the message is on the
/// approved user-facing allowlist or `debug` is set.
pub fn mask_response_errors(mut response: Response, config: &ErrorMaskConfig) -> Response {
    for error in &mut response.errors {
        let has_code = error
            .extensions
            .as_ref()
            .and_then(|ext| serde_json::to_value(ext).ok())
            .map(|value| value.get("code").is_some())
            .unwrap_or(false);
        if has_code {
            continue;
        }

        let path: Vec<String> = error
            .path
            .iter()
            .map(|seg| match seg {
                async_graphql::PathSegment::Field(name) => name.clone(),
                async_graphql::PathSegment::Index(idx) => idx.to_string(),
            })
            .collect();
        tracing::error!(
            message = %error.message,
            path = %path.join("."),
            "Unhandled error in graphql resolver"
        );

        if !config.debug && !config.is_user_facing(&error.message) {
            error.message = GENERIC_ERROR_MESSAGE.to_string();
        }

        let extensions = error.extensions.get_or_insert_with(Default::default);
        extensions.set("code", ERROR_SERVER_FAILURE);
    }
    response
}
