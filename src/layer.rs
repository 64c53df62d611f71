//! Tower layer that runs the migration pipeline around an axum service.

use crate::interceptor::{self, content_type, is_bodiless_status, is_json_content_type};
use crate::pipeline::{MigrationPipeline, PipelineError};
use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Header listing the applied migration versions when debug headers are on.
pub const MIGRATIONS_HEADER: &str = "x-api-migrations";

/// Layer installing a [`MigrationPipeline`] in front of a service.
#[derive(Debug, Clone)]
pub struct MigrationLayer {
    pipeline: Arc<MigrationPipeline>,
}

impl MigrationLayer {
    pub fn new(pipeline: MigrationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// The pipeline shared by every service this layer produces.
    pub fn pipeline(&self) -> &MigrationPipeline {
        &self.pipeline
    }
}

impl MigrationPipeline {
    /// Wrap this pipeline in a tower layer.
    pub fn into_layer(self) -> MigrationLayer {
        MigrationLayer::new(self)
    }
}

impl<S> Layer<S> for MigrationLayer {
    type Service = MigrationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MigrationService {
            inner,
            pipeline: self.pipeline.clone(),
        }
    }
}

/// Service produced by [`MigrationLayer`].
#[derive(Debug, Clone)]
pub struct MigrationService<S> {
    inner: S,
    pipeline: Arc<MigrationPipeline>,
}

impl<S> Service<Request<Body>> for MigrationService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // The ready clone stays with us; a fresh clone takes its place
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let pipeline = self.pipeline.clone();

        Box::pin(handle(pipeline, inner, req))
    }
}

async fn handle<S>(
    pipeline: Arc<MigrationPipeline>,
    mut inner: S,
    req: Request<Body>,
) -> Result<Response, S::Error>
where
    S: Service<Request<Body>, Response = Response>,
{
    let settings = pipeline.settings();
    let declared = req
        .headers()
        .get(&settings.version_header)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let plan = pipeline.plan(req.method().as_str(), req.uri().path(), declared.as_deref());

    if plan.is_empty() {
        return inner.call(req).await;
    }

    // Request phase
    let (mut parts, body) = req.into_parts();
    let bytes = match to_bytes(body, settings.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(PipelineError::RequestBody(e.to_string()).into_response()),
    };
    let request = interceptor::request_from_parts(&parts, &bytes);
    let migrated = match pipeline.migrate_request(&plan, request).await {
        Ok(migrated) => migrated,
        Err(e) => return Ok(e.into_response()),
    };
    let body = match interceptor::apply_to_parts(&mut parts, &migrated, bytes) {
        Ok(body) => body,
        Err(e) => return Ok(e.into_response()),
    };

    let response = inner
        .call(Request::from_parts(parts, Body::from(body)))
        .await?;

    // Response phase
    if is_bodiless_status(response.status()) {
        debug!(
            status = %response.status(),
            "Bodiless response, skipping response migrations"
        );
        return Ok(with_debug_header(response, &pipeline, &plan.versions()));
    }

    if !is_json_content_type(content_type(response.headers())) {
        debug!(
            versions = ?plan.versions(),
            "Non-JSON response, skipping response migrations"
        );
        return Ok(with_debug_header(response, &pipeline, &plan.versions()));
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, settings.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(PipelineError::ResponseBody(e.to_string()).into_response()),
    };

    let response = match interceptor::migrate_response_body(&pipeline, &plan, &migrated, &bytes)
        .await
    {
        Ok(migrated_body) => {
            parts.headers.remove(TRANSFER_ENCODING);
            parts
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from(migrated_body.len()));
            Response::from_parts(parts, Body::from(migrated_body))
        }
        Err(e) => return Ok(e.into_response()),
    };

    Ok(with_debug_header(response, &pipeline, &plan.versions()))
}

fn with_debug_header(
    mut response: Response,
    pipeline: &MigrationPipeline,
    versions: &[&str],
) -> Response {
    if pipeline.settings().debug_headers {
        if let Ok(value) = HeaderValue::from_str(&versions.join(",")) {
            response.headers_mut().insert(MIGRATIONS_HEADER, value);
        }
    }
    response
}

impl PipelineError {
    /// HTTP status sent for this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        warn!(
            error = %self,
            request_phase = self.is_request_phase(),
            "Migration failed, returning error response"
        );

        let body = Json(serde_json::json!({ "error": self.client_message() }));
        (self.status(), body).into_response()
    }
}
