//! Loading declarative migration files from disk.

use crate::config::MigrationFile;
use crate::migration::MigrationDescriptor;
use crate::registry::RegistryError;
use crate::transformer::{DeclarativeRequest, DeclarativeResponse};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// File name suffixes recognised as migration files.
pub const MIGRATION_SUFFIXES: &[&str] = &[".migration.yaml", ".migration.yml", ".migration.json"];

/// Load every migration file under `path`.
///
/// `path` may be a directory (scanned non-recursively) or a single file.
/// Files are registered in file-name order.
pub async fn load_migrations(path: impl AsRef<Path>) -> Result<Vec<MigrationDescriptor>, LoadError> {
    let path = path.as_ref();
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| LoadError::io(path, e))?;

    let files = if metadata.is_dir() {
        migration_files(path).await?
    } else {
        vec![path.to_path_buf()]
    };

    let mut descriptors = Vec::with_capacity(files.len());
    for file in &files {
        descriptors.push(load_file(file).await?);
    }

    info!(
        path = %path.display(),
        files = files.len(),
        "Loaded migration files"
    );

    Ok(descriptors)
}

/// Load one migration file.
pub async fn load_file(path: &Path) -> Result<MigrationDescriptor, LoadError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::io(path, e))?;

    let file: MigrationFile = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };

    debug!(
        path = %path.display(),
        version = %file.version,
        route = %file.route,
        "Parsed migration file"
    );

    Ok(descriptor(file))
}

/// Turn a parsed migration file into a descriptor.
///
/// A missing section leaves the transform unset, which the registry rejects.
pub fn descriptor(file: MigrationFile) -> MigrationDescriptor {
    let mut descriptor = MigrationDescriptor::new(&file.route, &file.verbs, &file.version)
        .with_description(file.description.clone());

    if let Some(ref section) = file.request {
        descriptor.request = Some(Arc::new(DeclarativeRequest::new(&file.version, section)));
    }
    if let Some(ref section) = file.response {
        descriptor.response = Some(Arc::new(DeclarativeResponse::new(&file.version, section)));
    }

    descriptor
}

async fn migration_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LoadError::io(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| LoadError::io(dir, e))? {
        let path = entry.path();
        let is_migration = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| MIGRATION_SUFFIXES.iter().any(|s| name.ends_with(s)));

        if is_migration && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Errors raised while loading migrations.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
