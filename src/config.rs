//! Configuration types for the migration layer and declarative migration files.

use crate::version::ComparatorKind;
use serde::{Deserialize, Serialize};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Configuration version
    pub version: String,
    /// Global settings
    pub settings: Settings,
    /// Directory (or single file) holding declarative migrations
    pub migrations_dir: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: Settings::default(),
            migrations_dir: None,
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Header carrying the client's declared API version
    pub version_header: String,
    /// What to do when a client declares no version
    pub missing_version: MissingVersionPolicy,
    /// Version ordering
    pub comparator: ComparatorKind,
    /// Maximum body size to buffer for migration (bytes)
    pub max_body_size: usize,
    /// Add an X-Api-Migrations header listing applied versions
    pub debug_headers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version_header: "x-api-version".to_string(),
            missing_version: MissingVersionPolicy::default(),
            comparator: ComparatorKind::default(),
            max_body_size: 10 * 1024 * 1024, // 10MB
            debug_headers: false,
        }
    }
}

/// Policy for requests without a declared version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingVersionPolicy {
    /// The client is treated as up to date: no migrations run
    #[default]
    Latest,
    /// The client is treated as predating every migration: all matching run
    Oldest,
}

/// One declarative migration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationFile {
    /// Route pattern
    pub route: String,
    /// Verb expression
    pub verbs: String,
    /// Version token
    pub version: String,
    /// Optional description
    #[serde(default)]
    pub description: String,
    /// Request-direction transform
    #[serde(default)]
    pub request: Option<RequestSection>,
    /// Response-direction transform
    #[serde(default)]
    pub response: Option<ResponseSection>,
}

/// Request-direction transform of a migration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequestSection {
    /// Header modifications
    #[serde(default)]
    pub headers: Option<HeaderTransform>,
    /// Body operations, applied in order
    #[serde(default)]
    pub body: Vec<JsonOperation>,
}

/// Response-direction transform of a migration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseSection {
    /// Body operations, applied in order
    #[serde(default)]
    pub body: Vec<JsonOperation>,
}

/// Header transformation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeaderTransform {
    /// Headers to add (if not present)
    #[serde(default)]
    pub add: Option<Vec<HeaderValue>>,
    /// Headers to set (overwrite)
    #[serde(default)]
    pub set: Option<Vec<HeaderValue>>,
    /// Headers to remove
    #[serde(default)]
    pub remove: Option<Vec<String>>,
}

/// Header name-value pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderValue {
    /// Header name
    pub name: String,
    /// Header value (supports variable substitution)
    pub value: String,
}

/// JSON body operation.
///
/// Paths use `$.field.sub[0]` syntax; `$` is the whole body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JsonOperation {
    /// Set a value at a path
    Set {
        path: String,
        value: serde_json::Value,
    },
    /// Set a value only if the path is absent or null
    SetDefault {
        path: String,
        value: serde_json::Value,
    },
    /// Delete values at paths
    Delete { paths: Vec<String> },
    /// Rename a field
    Rename { from: String, to: String },
    /// Copy a value from one path to another
    Copy { from: String, to: String },
    /// Merge additional fields into an object
    Merge {
        path: String,
        with: serde_json::Value,
    },
    /// Split a string into several fields and remove the source
    Split {
        from: String,
        into: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Join several string fields into one and remove the sources
    Join {
        from: Vec<String>,
        into: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
}

fn default_separator() -> String {
    " ".to_string()
}
