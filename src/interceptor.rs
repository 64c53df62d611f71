//! Conversion between HTTP messages and the migration view of a request.
//!
//! The layer buffers bodies and hands them here; everything below works on
//! `http` parts and complete byte buffers so it can be tested without a
//! running service.

use crate::context::MigrationRequest;
use crate::pipeline::{MigrationPipeline, PipelineError};
use crate::selector::MigrationPlan;
use axum::body::Bytes;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::uri::PathAndQuery;
use axum::http::{request, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde_json::Value as JsonValue;
use tracing::trace;

/// Whether a Content-Type names a JSON payload.
///
/// Matches anything containing `application/json` and any `+json`
/// structured suffix, ignoring case.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let content_type = content_type.to_ascii_lowercase();
    let essence = content_type.split(';').next().unwrap_or_default().trim();

    content_type.contains("application/json") || essence.ends_with("+json")
}

/// Content-Type of a header map, if present and readable.
pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Build the migration view of an incoming request.
///
/// The body is parsed only when it is declared JSON and is valid; otherwise
/// it stays `None` and the raw bytes are forwarded unchanged.
pub fn request_from_parts(parts: &request::Parts, body: &[u8]) -> MigrationRequest {
    let uri = parts
        .uri
        .path_and_query()
        .map(PathAndQuery::as_str)
        .unwrap_or_else(|| parts.uri.path());

    let mut request = MigrationRequest::new(parts.method.as_str(), uri);
    for (name, value) in &parts.headers {
        request
            .headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    if is_json_content_type(content_type(&parts.headers)) && !body.is_empty() {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(json) => request.body = Some(json),
            Err(e) => trace!(error = %e, "Request body is not valid JSON, forwarding as-is"),
        }
    }

    request
}

/// Write a migrated request back into HTTP parts, returning the body to send.
///
/// Headers are replaced by the migrated set; a header whose values came
/// through unchanged keeps its original bytes. A JSON body is re-serialized
/// and labelled as JSON; a non-JSON body is forwarded byte for byte.
pub fn apply_to_parts(
    parts: &mut request::Parts,
    migrated: &MigrationRequest,
    original_body: Bytes,
) -> Result<Bytes, PipelineError> {
    if parts.method.as_str() != migrated.method {
        parts.method = Method::from_bytes(migrated.method.as_bytes())
            .map_err(|e| PipelineError::RequestRebuild(format!("method: {e}")))?;
    }

    let path_and_query = match migrated.query_string {
        Some(ref query) => format!("{}?{}", migrated.path, query),
        None => migrated.path.clone(),
    };
    if parts.uri.path_and_query().map(PathAndQuery::as_str) != Some(path_and_query.as_str()) {
        let mut uri = parts.uri.clone().into_parts();
        uri.path_and_query = Some(
            PathAndQuery::try_from(path_and_query)
                .map_err(|e| PipelineError::RequestRebuild(format!("uri: {e}")))?,
        );
        parts.uri = Uri::from_parts(uri)
            .map_err(|e| PipelineError::RequestRebuild(format!("uri: {e}")))?;
    }

    let original = std::mem::take(&mut parts.headers);
    parts.headers = header_map(&original, migrated)?;

    let body = match migrated.body {
        Some(ref json) => {
            if !is_json_content_type(content_type(&parts.headers)) {
                parts
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Bytes::from(
                serde_json::to_vec(json)
                    .map_err(|e| PipelineError::RequestRebuild(format!("body: {e}")))?,
            )
        }
        None => original_body,
    };

    parts.headers.remove(TRANSFER_ENCODING);
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    Ok(body)
}

fn header_map(original: &HeaderMap, request: &MigrationRequest) -> Result<HeaderMap, PipelineError> {
    let mut headers = HeaderMap::with_capacity(request.headers.len());
    for (name, values) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| PipelineError::RequestRebuild(format!("header name {name:?}: {e}")))?;

        // Untouched headers keep their raw bytes, including non-UTF-8 ones
        let unchanged = original
            .get_all(&name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .eq(values.iter().map(String::as_str));
        if unchanged {
            for value in original.get_all(&name) {
                headers.append(name.clone(), value.clone());
            }
            continue;
        }

        for value in values {
            let value = HeaderValue::from_str(value).map_err(|e| {
                PipelineError::RequestRebuild(format!("header {}: {e}", name.as_str()))
            })?;
            headers.append(name.clone(), value);
        }
    }
    Ok(headers)
}

/// Whether a response status never carries a body.
pub fn is_bodiless_status(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Run the response phase over a buffered JSON body.
///
/// An empty body is not valid JSON and fails like any other unparsable one.
pub async fn migrate_response_body(
    pipeline: &MigrationPipeline,
    plan: &MigrationPlan,
    request: &MigrationRequest,
    body: &[u8],
) -> Result<Bytes, PipelineError> {
    let json: JsonValue =
        serde_json::from_slice(body).map_err(PipelineError::InvalidResponseBody)?;
    let migrated = pipeline.migrate_response(plan, request, json).await?;
    let bytes = serde_json::to_vec(&migrated).map_err(PipelineError::ResponseSerialize)?;

    Ok(Bytes::from(bytes))
}
