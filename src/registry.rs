//! Migration registry: the validated, compiled set of migrations.

use crate::matcher::{CompiledMatcher, MatchResult, MatcherError};
use crate::migration::{MigrationDescriptor, RequestMigration, ResponseMigration};
use std::sync::Arc;
use tracing::{debug, info};

/// A registered migration with its compiled matcher.
#[derive(Debug)]
pub struct RegisteredMigration {
    /// Position in registration order
    pub index: usize,
    /// The descriptor as registered
    pub descriptor: MigrationDescriptor,
    /// Request transform (validated present)
    pub request: Arc<dyn RequestMigration>,
    /// Response transform (validated present)
    pub response: Arc<dyn ResponseMigration>,
    matcher: CompiledMatcher,
}

impl RegisteredMigration {
    /// Version token.
    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    /// Match a request method and path against this migration.
    pub fn matches(&self, method: &str, path: &str) -> MatchResult {
        self.matcher.matches(method, path)
    }
}

/// Read-only collection of migrations in registration order.
///
/// Storage order is never assumed to be version order; the selector sorts
/// per request.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Arc<RegisteredMigration>>,
}

impl MigrationRegistry {
    /// Validate and compile a set of descriptors.
    ///
    /// Fails on the first descriptor that is missing a transform or whose
    /// route or verb pattern does not compile.
    pub fn new(descriptors: Vec<MigrationDescriptor>) -> Result<Self, RegistryError> {
        let mut migrations = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let matcher = CompiledMatcher::compile(&descriptor.route, &descriptor.verbs)
                .map_err(|source| RegistryError::Matcher {
                    version: descriptor.version.clone(),
                    route: descriptor.route.clone(),
                    source,
                })?;

            let request = descriptor
                .request
                .clone()
                .ok_or_else(|| RegistryError::missing(&descriptor, "migrate_request"))?;
            let response = descriptor
                .response
                .clone()
                .ok_or_else(|| RegistryError::missing(&descriptor, "migrate_response"))?;

            debug!(
                version = %descriptor.version,
                route = %descriptor.route,
                verbs = %descriptor.verbs,
                "Registered migration"
            );

            migrations.push(Arc::new(RegisteredMigration {
                index,
                descriptor,
                request,
                response,
                matcher,
            }));
        }

        info!(
            migrations = migrations.len(),
            versions = ?migrations.iter().map(|m| m.version()).collect::<Vec<_>>(),
            "Migrations loaded"
        );

        Ok(Self { migrations })
    }

    /// All migrations in registration order.
    pub fn migrations(&self) -> &[Arc<RegisteredMigration>] {
        &self.migrations
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Errors raised while building the registry. All are fatal.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Migration {version} ({route}) is missing its {transform} transform")]
    MissingTransform {
        version: String,
        route: String,
        transform: &'static str,
    },

    #[error("Migration {version} ({route}) has an invalid matcher: {source}")]
    Matcher {
        version: String,
        route: String,
        #[source]
        source: MatcherError,
    },
}

impl RegistryError {
    fn missing(descriptor: &MigrationDescriptor, transform: &'static str) -> Self {
        Self::MissingTransform {
            version: descriptor.version.clone(),
            route: descriptor.route.clone(),
            transform,
        }
    }
}
