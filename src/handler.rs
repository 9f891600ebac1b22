//! Axum handler for the GraphQL endpoint.
//!
//! Wraps schema execution with the platform conventions: auth context
//! injected from gateway headers, request metadata made available to
//! resolver guards, and unhandled errors masked before the response leaves
//! the process.

use async_graphql::{Context, Request, Response, Schema};
use axum::extract::Extension;
use axum::http::{HeaderMap, Method};
use axum::Json;

use crate::auth::{extract_company_id, extract_user_id};
use crate::csrf::{csrf_check, CsrfConfig};
use crate::errors::{mask_response_errors, ErrorMaskConfig};
use crate::{GraphQLError, Result};

pub const MISSING_CONTEXT_MSG: &str = "Cannot do anything without a resolver context.";

/// Request metadata injected into the GraphQL context for guard functions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub headers: HeaderMap,
    /// Whether the request arrived over HTTPS (from `x-forwarded-proto`,
    /// since TLS terminates at the ingress).
    pub secure: bool,
}

impl RequestContext {
    pub fn new(method: Method, headers: HeaderMap) -> Self {
        let secure = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .map(|proto| proto.eq_ignore_ascii_case("https"))
            .unwrap_or(false);
        Self { method, headers, secure }
    }

    /// The raw `Cookie` header, forwarded verbatim to sibling services.
    pub fn cookie_header(&self) -> &str {
        self.headers
            .get(axum::http::header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// Get the request metadata from a resolver context, or fail.
pub fn get_request_context<'a>(ctx: &'a Context<'_>) -> Result<&'a RequestContext> {
    ctx.data_opt::<RequestContext>()
        .ok_or_else(|| GraphQLError::BadRequest(MISSING_CONTEXT_MSG.to_string()))
}

/// Resolver guard: fail with a CSRF error if the request's CSRF data is bad
/// or missing.
pub fn require_csrf(ctx: &Context<'_>, config: &CsrfConfig) -> Result<()> {
    let request = get_request_context(ctx)?;
    csrf_check(config, &request.method, &request.headers, request.secure)
}

/// GraphQL handler with authentication context injection and error masking.
///
/// Extracts user and company ids from gateway headers, injects them and a
/// [`RequestContext`] into the request, executes it, and masks any unhandled
/// server errors. The mask configuration is taken from an
/// `Extension<ErrorMaskConfig>` when one is installed.
///
/// # Example
///
/// ```rust,no_run
/// use async_graphql::{EmptyMutation, EmptySubscription, Object, Schema};
/// use axum::{routing::post, Router};
/// use quill_graphql_helpers::handler::graphql_handler;
///
/// struct Query;
///
/// #[Object]
/// impl Query {
///     async fn ping(&self) -> &str {
///         "pong"
///     }
/// }
///
/// let schema = Schema::new(Query, EmptyMutation, EmptySubscription);
/// let app: Router = Router::new()
///     .route("/graphql", post(graphql_handler::<Query, EmptyMutation, EmptySubscription>))
///     .layer(axum::extract::Extension(schema));
/// ```
pub async fn graphql_handler<Query, Mutation, Subscription>(
    Extension(schema): Extension<Schema<Query, Mutation, Subscription>>,
    mask_config: Option<Extension<ErrorMaskConfig>>,
    headers: HeaderMap,
    Json(request): Json<Request>,
) -> Json<Response>
where
    Query: async_graphql::ObjectType + 'static,
    Mutation: async_graphql::ObjectType + 'static,
    Subscription: async_graphql::SubscriptionType + 'static,
{
    let mut request = request.data(RequestContext::new(Method::POST, headers.clone()));

    if let Some(user_id) = extract_user_id(&headers) {
        request = request.data(user_id);
    }
    if let Some(company_id) = extract_company_id(&headers) {
        request = request.data(company_id);
    }

    let response = schema.execute(request).await;

    let mask_config = mask_config.map(|ext| ext.0).unwrap_or_default();
    Json(mask_response_errors(response, &mask_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::get_user_id;
    use crate::csrf::REASON_NO_CSRF_COOKIE;
    use crate::errors::GENERIC_ERROR_MESSAGE;
    use async_graphql::{EmptyMutation, EmptySubscription, ErrorExtensions, Object};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct Query;

    #[Object]
    impl Query {
        async fn user_id(&self, ctx: &Context<'_>) -> Option<String> {
            get_user_id(ctx).map(|id| id.0.to_string())
        }

        async fn cookies(&self, ctx: &Context<'_>) -> async_graphql::Result<String> {
            Ok(get_request_context(ctx)?.cookie_header().to_string())
        }

        async fn broken(&self) -> async_graphql::Result<i32> {
            Err(async_graphql::Error::new("connection pool exhausted"))
        }

        async fn protected(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
            require_csrf(ctx, &CsrfConfig::default()).map_err(|e| e.extend())?;
            Ok(true)
        }
    }

    fn schema() -> Schema<Query, EmptyMutation, EmptySubscription> {
        Schema::new(Query, EmptyMutation, EmptySubscription)
    }

    #[tokio::test]
    async fn test_user_id_is_injected_from_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", id.to_string().parse().unwrap());

        let Json(response) = graphql_handler(
            Extension(schema()),
            None,
            headers,
            Json(Request::new("{ userId }")),
        )
        .await;

        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();
        assert_eq!(data["userId"], id.to_string());
    }

    #[tokio::test]
    async fn test_request_context_carries_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", "sessionid=abc".parse().unwrap());

        let Json(response) = graphql_handler(
            Extension(schema()),
            None,
            headers,
            Json(Request::new("{ cookies }")),
        )
        .await;

        let data = response.data.into_json().unwrap();
        assert_eq!(data["cookies"], "sessionid=abc");
    }

    #[tokio::test]
    async fn test_unhandled_errors_are_masked() {
        let Json(response) = graphql_handler(
            Extension(schema()),
            None,
            HeaderMap::new(),
            Json(Request::new("{ broken }")),
        )
        .await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, GENERIC_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_require_csrf_rejects_request_without_cookie() {
        let Json(response) = graphql_handler(
            Extension(schema()),
            None,
            HeaderMap::new(),
            Json(Request::new("{ protected }")),
        )
        .await;

        assert_eq!(response.errors.len(), 1);
        assert!(
            response.errors[0].message.contains(REASON_NO_CSRF_COOKIE),
            "{:?}",
            response.errors
        );
    }

    #[test]
    fn test_forwarded_proto_marks_secure() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert!(RequestContext::new(Method::POST, headers).secure);
        assert!(!RequestContext::new(Method::POST, HeaderMap::new()).secure);
    }
}
