//! Migration descriptors and the transform traits they carry.
//!
//! A migration models one historical change of an endpoint's shape. Its
//! request transform moves an old-shaped request forward past that change;
//! its response transform moves a latest-shaped body back before it.
//!
//! Transforms can be written as types implementing [`RequestMigration`] and
//! [`ResponseMigration`], or as async closures:
//!
//! ```ignore
//! let descriptor = MigrationDescriptor::new("/api/users/:id", "POST|PUT", "2023-06-15")
//!     .with_description("Rename account_type to accountType")
//!     .with_request(|mut req: MigrationRequest| async move {
//!         // ...
//!         Ok::<_, MigrationError>(req)
//!     })
//!     .with_response(|_req: &MigrationRequest, body: JsonValue| async move {
//!         Ok::<_, MigrationError>(body)
//!     });
//! ```

use crate::context::MigrationRequest;
use crate::transformer::TransformError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Request-direction transform.
#[async_trait]
pub trait RequestMigration: Send + Sync {
    /// Bring a request one change forward.
    async fn migrate_request(
        &self,
        request: MigrationRequest,
    ) -> Result<MigrationRequest, MigrationError>;
}

/// Response-direction transform.
#[async_trait]
pub trait ResponseMigration: Send + Sync {
    /// Bring a response body one change backward.
    ///
    /// `request` is the request after all request migrations ran.
    async fn migrate_response(
        &self,
        request: &MigrationRequest,
        body: JsonValue,
    ) -> Result<JsonValue, MigrationError>;
}

#[async_trait]
impl<F, Fut> RequestMigration for F
where
    F: Fn(MigrationRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<MigrationRequest, MigrationError>> + Send + 'static,
{
    async fn migrate_request(
        &self,
        request: MigrationRequest,
    ) -> Result<MigrationRequest, MigrationError> {
        self(request).await
    }
}

#[async_trait]
impl<F, Fut> ResponseMigration for F
where
    F: Fn(&MigrationRequest, JsonValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JsonValue, MigrationError>> + Send + 'static,
{
    async fn migrate_response(
        &self,
        request: &MigrationRequest,
        body: JsonValue,
    ) -> Result<JsonValue, MigrationError> {
        self(request, body).await
    }
}

/// Static definition of one migration.
///
/// Both transforms are optional here so descriptors can be assembled
/// incrementally; the registry refuses any descriptor missing one.
#[derive(Clone)]
pub struct MigrationDescriptor {
    /// Route pattern (e.g. `/api/users/:id`)
    pub route: String,
    /// Verb expression (e.g. `POST|PUT`)
    pub verbs: String,
    /// Version token
    pub version: String,
    /// Human-readable description
    pub description: String,
    /// Request transform
    pub request: Option<Arc<dyn RequestMigration>>,
    /// Response transform
    pub response: Option<Arc<dyn ResponseMigration>>,
}

impl MigrationDescriptor {
    /// Create a descriptor without transforms.
    pub fn new(
        route: impl Into<String>,
        verbs: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            route: route.into(),
            verbs: verbs.into(),
            version: version.into(),
            description: String::new(),
            request: None,
            response: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the request transform.
    pub fn with_request<M>(mut self, migration: M) -> Self
    where
        M: RequestMigration + 'static,
    {
        self.request = Some(Arc::new(migration));
        self
    }

    /// Set the response transform.
    pub fn with_response<M>(mut self, migration: M) -> Self
    where
        M: ResponseMigration + 'static,
    {
        self.response = Some(Arc::new(migration));
        self
    }

    /// Use one value for both directions.
    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: RequestMigration + ResponseMigration + 'static,
    {
        let handler = Arc::new(handler);
        self.request = Some(handler.clone());
        self.response = Some(handler);
        self
    }
}

impl fmt::Debug for MigrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDescriptor")
            .field("route", &self.route)
            .field("verbs", &self.verbs)
            .field("version", &self.version)
            .field("description", &self.description)
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

impl fmt::Debug for dyn RequestMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestMigration")
    }
}

impl fmt::Debug for dyn ResponseMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseMigration")
    }
}

/// Error returned by a migration transform.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("{0}")]
    Failed(String),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrationError {
    /// Create a failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
