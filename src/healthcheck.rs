//! Kubernetes-style health check middleware.
//!
//! Endpoints:
//!
//! - `GET /healthz` responds `200 OK` if the server can return a simple
//!   response.
//! - `GET /readiness` responds `200 OK` if every registered readiness probe
//!   passes, `500` with `"<name>: <reason>"` on the first failure.
//!
//! The middleware sits in front of the router so the probes answer even
//! when no route is mounted at those paths. Probes are supplied by the host
//! service; a database ping belongs there, not here.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

pub const HEALTHZ_ENDPOINT: &str = "/healthz";
pub const READINESS_ENDPOINT: &str = "/readiness";

/// One dependency the service needs before it can take traffic.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Short name used in the failure body, e.g. `db` or `cache`.
    fn name(&self) -> &str;

    /// `Err(reason)` marks the service as not ready.
    async fn check(&self) -> std::result::Result<(), String>;
}

/// Tower layer answering `/healthz` and `/readiness`.
#[derive(Clone, Default)]
pub struct HealthCheckLayer {
    probes: Arc<Vec<Box<dyn ReadinessProbe>>>,
}

impl HealthCheckLayer {
    pub fn new(probes: Vec<Box<dyn ReadinessProbe>>) -> Self {
        Self { probes: Arc::new(probes) }
    }
}

impl<S> Layer<S> for HealthCheckLayer {
    type Service = HealthCheck<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HealthCheck {
            inner,
            probes: self.probes.clone(),
        }
    }
}

/// Middleware service produced by [`HealthCheckLayer`].
#[derive(Clone)]
pub struct HealthCheck<S> {
    inner: S,
    probes: Arc<Vec<Box<dyn ReadinessProbe>>>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for HealthCheck<S>
where
    S: Service<Request<ReqBody>, Response = Response>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let path = req.uri().path();
        if req.method() != Method::GET
            || (path != HEALTHZ_ENDPOINT && path != READINESS_ENDPOINT)
        {
            return Box::pin(self.inner.call(req));
        }

        let readiness = path == READINESS_ENDPOINT;
        let probes = self.probes.clone();
        Box::pin(async move {
            if readiness {
                for probe in probes.iter() {
                    if let Err(reason) = probe.check().await {
                        tracing::error!(probe = probe.name(), %reason, "readiness probe failed");
                        let body = format!("{}: {}", probe.name(), reason);
                        return Ok((StatusCode::INTERNAL_SERVER_ERROR, body).into_response());
                    }
                }
            }
            Ok((StatusCode::OK, "OK").into_response())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::routing::get;
    use axum::Router;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    struct AlwaysReady;

    #[async_trait]
    impl ReadinessProbe for AlwaysReady {
        fn name(&self) -> &str {
            "db"
        }

        async fn check(&self) -> Result<(), String> {
            Ok(())
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl ReadinessProbe for BrokenCache {
        fn name(&self) -> &str {
            "cache"
        }

        async fn check(&self) -> Result<(), String> {
            Err("cannot connect to cache.".to_string())
        }
    }

    fn app(probes: Vec<Box<dyn ReadinessProbe>>) -> Router {
        Router::new()
            .route("/", get(|| async { "app" }))
            .layer(HealthCheckLayer::new(probes))
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_healthz_always_ok() {
        let response = app(vec![Box::new(BrokenCache)])
            .oneshot(Request::get(HEALTHZ_ENDPOINT).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn test_readiness_ok_when_probes_pass() {
        let response = app(vec![Box::new(AlwaysReady)])
            .oneshot(Request::get(READINESS_ENDPOINT).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_reports_first_failure() {
        let response = app(vec![Box::new(AlwaysReady), Box::new(BrokenCache)])
            .oneshot(Request::get(READINESS_ENDPOINT).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "cache: cannot connect to cache.");
    }

    #[tokio::test]
    async fn test_other_requests_pass_through() {
        let response = app(vec![Box::new(BrokenCache)])
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "app");
    }

    #[tokio::test]
    async fn test_post_to_health_endpoint_passes_through() {
        let response = app(vec![])
            .oneshot(Request::post(HEALTHZ_ENDPOINT).body(Body::empty()).unwrap())
            .await
            .unwrap();
        // No POST route exists, so the router answers 405/404, not the probe.
        assert_ne!(body_string(response).await, "OK");
    }
}
