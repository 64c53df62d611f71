//! Migration pipeline: request phase, response phase, and their failures.

use crate::config::{MigrationConfig, Settings};
use crate::context::MigrationRequest;
use crate::loader::{self, LoadError};
use crate::migration::{MigrationDescriptor, MigrationError};
use crate::registry::{MigrationRegistry, RegistryError};
use crate::selector::{self, MigrationPlan};
use crate::version::VersionComparator;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Client-facing message for request-phase failures.
pub const FAILED_TO_APPLY_MIGRATIONS: &str = "Internal Server Error: Failed to apply migrations";
/// Client-facing message when a JSON response body cannot be parsed.
pub const INVALID_RESPONSE_BODY: &str = "Internal Server Error: Invalid response body";
/// Client-facing message for response-phase failures.
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Runs migrations around a downstream handler.
///
/// Cheap to share: the registry and comparator sit behind `Arc`s and are
/// never mutated after construction.
#[derive(Clone)]
pub struct MigrationPipeline {
    registry: Arc<MigrationRegistry>,
    comparator: Arc<dyn VersionComparator>,
    settings: Settings,
}

impl MigrationPipeline {
    /// Build a pipeline from descriptors.
    ///
    /// The comparator comes from `settings.comparator` unless replaced with
    /// [`MigrationPipeline::with_comparator`].
    pub fn new(
        descriptors: Vec<MigrationDescriptor>,
        settings: Settings,
    ) -> Result<Self, RegistryError> {
        let registry = MigrationRegistry::new(descriptors)?;
        Ok(Self {
            registry: Arc::new(registry),
            comparator: settings.comparator.build(),
            settings,
        })
    }

    /// Build a pipeline from declarative migration files.
    pub async fn from_path(path: impl AsRef<Path>, settings: Settings) -> Result<Self, LoadError> {
        let descriptors = loader::load_migrations(path).await?;
        Ok(Self::new(descriptors, settings)?)
    }

    /// Build a pipeline from configuration.
    ///
    /// Without a `migrations_dir` the pipeline has no migrations.
    pub async fn from_config(config: &MigrationConfig) -> Result<Self, LoadError> {
        match config.migrations_dir {
            Some(ref dir) => Self::from_path(dir, config.settings.clone()).await,
            None => Ok(Self::new(Vec::new(), config.settings.clone())?),
        }
    }

    /// Replace the version comparator.
    pub fn with_comparator<C>(mut self, comparator: C) -> Self
    where
        C: VersionComparator + 'static,
    {
        self.comparator = Arc::new(comparator);
        self
    }

    /// The registry.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// The settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Select the migrations for a request.
    pub fn plan(&self, method: &str, path: &str, declared: Option<&str>) -> MigrationPlan {
        let plan = selector::select(
            &self.registry,
            self.comparator.as_ref(),
            self.settings.missing_version,
            method,
            path,
            declared,
        );

        if plan.is_empty() {
            trace!(method, path, declared, "No migrations apply");
        } else {
            debug!(
                method,
                path,
                declared,
                versions = ?plan.versions(),
                "Selected migrations"
            );
        }

        plan
    }

    /// Request phase: apply every planned migration, oldest first.
    ///
    /// Each migration sees the route parameters its own pattern captured. The
    /// first failure aborts the phase; its partial result is dropped.
    pub async fn migrate_request(
        &self,
        plan: &MigrationPlan,
        mut request: MigrationRequest,
    ) -> Result<MigrationRequest, PipelineError> {
        for step in plan.request_order() {
            debug!(version = step.version(), "Applying request migration");
            request.params = step.params.clone();
            request = step
                .migration
                .request
                .migrate_request(request)
                .await
                .map_err(|source| PipelineError::RequestMigration {
                    version: step.version().to_string(),
                    source,
                })?;
        }
        Ok(request)
    }

    /// Response phase: apply every planned migration, newest first.
    pub async fn migrate_response(
        &self,
        plan: &MigrationPlan,
        request: &MigrationRequest,
        mut body: JsonValue,
    ) -> Result<JsonValue, PipelineError> {
        let mut request = request.clone();
        for step in plan.response_order() {
            debug!(version = step.version(), "Applying response migration");
            request.params = step.params.clone();
            body = step
                .migration
                .response
                .migrate_response(&request, body)
                .await
                .map_err(|source| PipelineError::ResponseMigration {
                    version: step.version().to_string(),
                    source,
                })?;
        }
        Ok(body)
    }
}

impl std::fmt::Debug for MigrationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationPipeline")
            .field("migrations", &self.registry.len())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Failures inside the pipeline boundary.
///
/// Every variant maps to a fixed client message; the error text itself is
/// only logged.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Request migration {version} failed: {source}")]
    RequestMigration {
        version: String,
        #[source]
        source: MigrationError,
    },

    #[error("Failed to rebuild migrated request: {0}")]
    RequestRebuild(String),

    #[error("Failed to read response body: {0}")]
    ResponseBody(String),

    #[error("Invalid JSON response body: {0}")]
    InvalidResponseBody(#[source] serde_json::Error),

    #[error("Response migration {version} failed: {source}")]
    ResponseMigration {
        version: String,
        #[source]
        source: MigrationError,
    },

    #[error("Failed to serialize migrated response: {0}")]
    ResponseSerialize(#[source] serde_json::Error),
}

impl PipelineError {
    /// Fixed message sent to the client.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::RequestBody(_) | Self::RequestMigration { .. } | Self::RequestRebuild(_) => {
                FAILED_TO_APPLY_MIGRATIONS
            }
            Self::InvalidResponseBody(_) => INVALID_RESPONSE_BODY,
            Self::ResponseBody(_) | Self::ResponseMigration { .. } | Self::ResponseSerialize(_) => {
                INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the failure happened before the handler ran.
    pub fn is_request_phase(&self) -> bool {
        matches!(
            self,
            Self::RequestBody(_) | Self::RequestMigration { .. } | Self::RequestRebuild(_)
        )
    }
}
