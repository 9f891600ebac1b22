//! # quill-graphql-helpers
//!
//! Shared GraphQL utilities for Quill platform services.
//!
//! ## Features
//!
//! - **Connection Pagination** - Relay-style connections with `sort`,
//!   `filters`, and `jumpToPage` arguments
//! - **Dynamic Filters** - camelCase filter arguments translated to
//!   double-underscore lookup paths and validated against a filter set
//! - **Auth Glue** - permission checks against the user-management service
//! - **CSRF Verification** - token/referer checks for the GraphQL endpoint
//! - **Error Formatting** - coded GraphQL errors, internal-error masking
//! - **Health Checks** - `/healthz` and `/readiness` tower middleware
//!
//! ## Usage
//!
//! ```rust
//! use quill_graphql_helpers::lookup::convert_field_lookup;
//!
//! assert_eq!(convert_field_lookup("reportName_Icontains"), "report_name__icontains");
//! ```

pub mod auth;
pub mod client;
pub mod connection;
pub mod csrf;
pub mod errors;
pub mod filters;
pub mod handler;
pub mod healthcheck;
pub mod lookup;
pub mod pagination;
pub mod relay;
pub mod sort;
pub mod testing;

pub use auth::{
    extract_company_id, extract_user_id, ActivityRequirement, PermissionsApi,
    UserManagementClient,
};
pub use client::GraphQLClient;
pub use connection::{resolve_connection, QuerySource};
pub use csrf::{csrf_check, CsrfConfig};
pub use filters::{extract_filter_args, FilterSet};
pub use handler::graphql_handler;
pub use healthcheck::{HealthCheckLayer, ReadinessProbe};
pub use pagination::{Connection, ConnectionArgs, CursorCodec, Edge, PageInfo};
pub use sort::{OrderKey, SortSpec};

use thiserror::Error;

/// GraphQL errors
///
/// Every variant maps to a stable error code (see [`errors`]) that services
/// surface to clients through the GraphQL error `extensions`.
#[derive(Error, Debug)]
pub enum GraphQLError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Csrf(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),
}

impl GraphQLError {
    /// Stable error code for this error, reported in GraphQL extensions.
    pub fn code(&self) -> &'static str {
        match self {
            GraphQLError::InvalidCursor(_) => errors::ERROR_BAD_REQUEST,
            GraphQLError::Pagination(_) => errors::ERROR_BAD_REQUEST,
            GraphQLError::Validation(_) => errors::ERROR_VALIDATION,
            GraphQLError::PermissionDenied(_) => errors::ERROR_PERMISSION_DENIED,
            GraphQLError::Csrf(_) => errors::ERROR_CSRF_FAILURE,
            GraphQLError::NotFound(_) => errors::ERROR_NOT_FOUND,
            GraphQLError::BadRequest(_) => errors::ERROR_BAD_REQUEST,
            GraphQLError::Upstream(_) => errors::ERROR_SERVER_FAILURE,
        }
    }
}

impl From<reqwest::Error> for GraphQLError {
    fn from(err: reqwest::Error) -> Self {
        GraphQLError::Upstream(err.to_string())
    }
}

/// Result type for GraphQL operations
pub type Result<T> = std::result::Result<T, GraphQLError>;
