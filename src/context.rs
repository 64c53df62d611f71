//! Per-request migration context and variable interpolation.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for matching variable expressions like ${...}
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// The request as seen by migrations.
///
/// Each request migration receives the output of the previous one. The value
/// is owned by a single request's pipeline run and is never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRequest {
    /// HTTP method
    pub method: String,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query_string: Option<String>,
    /// Parsed query parameters
    pub query_params: HashMap<String, Vec<String>>,
    /// Request headers, keyed by lowercase name
    pub headers: HashMap<String, Vec<String>>,
    /// Route parameters captured by the running migration's route pattern
    pub params: HashMap<String, String>,
    /// Parsed request body, if it was JSON
    pub body: Option<JsonValue>,
}

impl MigrationRequest {
    /// Create a request from a method and a URI path (query string allowed).
    pub fn new(method: impl Into<String>, uri: &str) -> Self {
        let (path, query_string) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };
        let query_params = parse_query_string(query_string.as_deref());

        Self {
            method: method.into(),
            path,
            query_string,
            query_params,
            headers: HashMap::new(),
            params: HashMap::new(),
            body: None,
        }
    }

    /// Append a header value.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Set the JSON body.
    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a single header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    /// Replace all values of a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_lowercase(), vec![value.into()]);
    }

    /// Remove a header, returning its values.
    pub fn remove_header(&mut self, name: &str) -> Option<Vec<String>> {
        self.headers.remove(&name.to_lowercase())
    }

    /// Get a route parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }
}

/// Variables available to declarative migrations while they run.
#[derive(Debug, Clone)]
pub struct TransformContext<'a> {
    /// Request at this point of the chain
    pub request: &'a MigrationRequest,
    /// Version of the running migration
    pub version: &'a str,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<'a> TransformContext<'a> {
    /// Create a new transform context.
    pub fn new(request: &'a MigrationRequest, version: &'a str) -> Self {
        Self {
            request,
            version,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Resolve a variable expression.
    ///
    /// Supports:
    /// - `${request.method}`, `${request.path}`, `${request.query}`
    /// - `${request.header.X-Custom}` - Request header value
    /// - `${request.query_param.page}` - Query parameter value
    /// - `${params.id}` or `${id}` - Route parameter
    /// - `${body.field.subfield}` - Request body JSON path
    /// - `${migration.version}` - Version of the running migration
    /// - `${now}` - Current timestamp (RFC 3339)
    pub fn resolve(&self, expr: &str) -> Option<String> {
        let (head, rest) = match expr.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (expr, ""),
        };

        match head {
            "request" => self.resolve_request(rest),
            "params" => self.request.params.get(rest).cloned(),
            "body" => resolve_json_path(self.request.body.as_ref(), rest),
            "migration" if rest == "version" => Some(self.version.to_string()),
            "now" => Some(self.timestamp.to_rfc3339()),
            other => self.request.params.get(other).cloned(),
        }
    }

    /// Interpolate all ${...} variables in a string.
    ///
    /// Unknown variables resolve to the empty string.
    pub fn interpolate(&self, template: &str) -> String {
        VAR_REGEX
            .replace_all(template, |caps: &regex::Captures| {
                self.resolve(&caps[1]).unwrap_or_default()
            })
            .to_string()
    }

    fn resolve_request(&self, path: &str) -> Option<String> {
        let (field, rest) = match path.split_once('.') {
            Some((field, rest)) => (field, Some(rest)),
            None => (path, None),
        };

        match field {
            "method" => Some(self.request.method.clone()),
            "path" => Some(self.request.path.clone()),
            "query" => self.request.query_string.clone(),
            "header" => self.request.header(rest?).map(str::to_string),
            "query_param" => self.request.query_params.get(rest?)?.first().cloned(),
            _ => None,
        }
    }
}

/// Render the JSON value at a dotted path as a string.
fn resolve_json_path(json: Option<&JsonValue>, path: &str) -> Option<String> {
    let mut current = json?;

    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }

        // Handle array indexing like "items.0" or "items[0]"
        let (key, index) = if let Some(bracket_pos) = part.find('[') {
            let idx: usize = part[bracket_pos + 1..].trim_end_matches(']').parse().ok()?;
            (&part[..bracket_pos], Some(idx))
        } else if let Ok(idx) = part.parse::<usize>() {
            ("", Some(idx))
        } else {
            (part, None)
        };

        if !key.is_empty() {
            current = current.get(key)?;
        }
        if let Some(idx) = index {
            current = current.get(idx)?;
        }
    }

    match current {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => Some("null".to_string()),
        other => Some(other.to_string()),
    }
}

/// Parse query string into parameter map.
pub(crate) fn parse_query_string(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();

    if let Some(qs) = query {
        for part in qs.split('&') {
            if let Some((k, v)) = part.split_once('=') {
                let key = urlencoding::decode(k)
                    .unwrap_or_else(|_| k.into())
                    .to_string();
                let value = urlencoding::decode(v)
                    .unwrap_or_else(|_| v.into())
                    .to_string();
                params.entry(key).or_default().push(value);
            } else if !part.is_empty() {
                let key = urlencoding::decode(part)
                    .unwrap_or_else(|_| part.into())
                    .to_string();
                params.entry(key).or_default().push(String::new());
            }
        }
    }

    params
}
