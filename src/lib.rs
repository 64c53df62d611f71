//! Versioned request/response migrations for HTTP APIs.
//!
//! Clients declare the API version they were written against in a header.
//! Every migration newer than that version is applied to the request before
//! the handler runs (oldest first), and undone on the JSON response
//! afterwards (newest first), so old clients keep seeing the shape they
//! expect while handlers only ever deal with the latest one.
//!
//! - Route patterns with `:param` and `*wildcard` segments
//! - Verb expressions such as `POST|PUT` or `*`
//! - Pluggable version ordering (lexicographic by default)
//! - Async migrations as closures or trait objects
//! - Declarative YAML/JSON migration files
//!
//! ## Example
//!
//! ```no_run
//! use axum::{routing::post, Json, Router};
//! use serde_json::Value;
//! use zentinel_api_migrations::{
//!     MigrationDescriptor, MigrationError, MigrationPipeline, MigrationRequest, Settings,
//! };
//!
//! let split_name = MigrationDescriptor::new("/api/users/:id", "POST", "2023-06-15")
//!     .with_request(|req: MigrationRequest| async move { Ok::<_, MigrationError>(req) })
//!     .with_response(|_req: &MigrationRequest, body: Value| async move {
//!         Ok::<_, MigrationError>(body)
//!     });
//!
//! let pipeline = MigrationPipeline::new(vec![split_name], Settings::default()).unwrap();
//! let app: Router = Router::new()
//!     .route("/api/users/:id", post(|Json(body): Json<Value>| async move { Json(body) }))
//!     .layer(pipeline.into_layer());
//! ```

pub mod config;
pub mod context;
pub mod interceptor;
pub mod layer;
pub mod loader;
pub mod matcher;
pub mod migration;
pub mod pipeline;
pub mod registry;
pub mod selector;
pub mod transformer;
pub mod version;

pub use config::{MigrationConfig, MissingVersionPolicy, Settings};
pub use context::{MigrationRequest, TransformContext};
pub use layer::{MigrationLayer, MigrationService};
pub use loader::{load_migrations, LoadError};
pub use migration::{MigrationDescriptor, MigrationError, RequestMigration, ResponseMigration};
pub use pipeline::{MigrationPipeline, PipelineError};
pub use registry::{MigrationRegistry, RegistryError};
pub use selector::{select, MigrationPlan};
pub use version::{ComparatorKind, DottedNumeric, Lexicographic, VersionComparator};
