//! Declarative transforms backing file-defined migrations.

mod header;
mod json;

pub use header::HeaderTransformer;
pub use json::JsonTransformer;

use crate::config::{RequestSection, ResponseSection};
use crate::context::{MigrationRequest, TransformContext};
use crate::migration::{MigrationError, RequestMigration, ResponseMigration};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Request direction of a declarative migration.
#[derive(Debug, Clone)]
pub struct DeclarativeRequest {
    version: String,
    headers: Option<HeaderTransformer>,
    body: JsonTransformer,
}

impl DeclarativeRequest {
    /// Build from a migration file's `request` section.
    pub fn new(version: impl Into<String>, section: &RequestSection) -> Self {
        Self {
            version: version.into(),
            headers: section.headers.as_ref().map(HeaderTransformer::new),
            body: JsonTransformer::new(section.body.clone()),
        }
    }
}

#[async_trait]
impl RequestMigration for DeclarativeRequest {
    async fn migrate_request(
        &self,
        mut request: MigrationRequest,
    ) -> Result<MigrationRequest, MigrationError> {
        if let Some(ref headers) = self.headers {
            headers.apply(&mut request, &self.version);
        }

        // Body operations only apply to JSON bodies
        if !self.body.is_empty() {
            if let Some(body) = request.body.clone() {
                let ctx = TransformContext::new(&request, &self.version);
                let migrated = self.body.apply(body, &ctx)?;
                request.body = Some(migrated);
            }
        }

        Ok(request)
    }
}

/// Response direction of a declarative migration.
#[derive(Debug, Clone)]
pub struct DeclarativeResponse {
    version: String,
    body: JsonTransformer,
}

impl DeclarativeResponse {
    /// Build from a migration file's `response` section.
    pub fn new(version: impl Into<String>, section: &ResponseSection) -> Self {
        Self {
            version: version.into(),
            body: JsonTransformer::new(section.body.clone()),
        }
    }
}

#[async_trait]
impl ResponseMigration for DeclarativeResponse {
    async fn migrate_response(
        &self,
        request: &MigrationRequest,
        body: JsonValue,
    ) -> Result<JsonValue, MigrationError> {
        let ctx = TransformContext::new(request, &self.version);
        Ok(self.body.apply(body, &ctx)?)
    }
}

/// Errors that can occur while applying declarative transforms.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("JSON path error: {0}")]
    JsonPath(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeaderTransform, HeaderValue, JsonOperation};
    use serde_json::json;

    #[tokio::test]
    async fn test_declarative_request() {
        let section = RequestSection {
            headers: Some(HeaderTransform {
                add: None,
                set: Some(vec![HeaderValue {
                    name: "x-migrated".to_string(),
                    value: "${migration.version}".to_string(),
                }]),
                remove: None,
            }),
            body: vec![JsonOperation::Rename {
                from: "$.user.account_type".to_string(),
                to: "$.user.accountType".to_string(),
            }],
        };
        let migration = DeclarativeRequest::new("2023-06-15", &section);

        let request = MigrationRequest::new("POST", "/api/users/1")
            .with_body(json!({"user": {"account_type": "premium"}}));
        let migrated = migration.migrate_request(request).await.unwrap();

        assert_eq!(migrated.header("x-migrated"), Some("2023-06-15"));
        assert_eq!(
            migrated.body,
            Some(json!({"user": {"accountType": "premium"}}))
        );
    }

    #[tokio::test]
    async fn test_declarative_request_without_body() {
        let section = RequestSection {
            headers: None,
            body: vec![JsonOperation::Set {
                path: "$.a".to_string(),
                value: json!(1),
            }],
        };
        let migration = DeclarativeRequest::new("1", &section);

        let migrated = migration
            .migrate_request(MigrationRequest::new("GET", "/a"))
            .await
            .unwrap();
        assert!(migrated.body.is_none());
    }

    #[tokio::test]
    async fn test_declarative_response_error() {
        let section = ResponseSection {
            body: vec![JsonOperation::Set {
                path: "$.user.name".to_string(),
                value: json!("x"),
            }],
        };
        let migration = DeclarativeResponse::new("1", &section);
        let request = MigrationRequest::new("GET", "/a");

        let result = migration.migrate_response(&request, json!({"user": 5})).await;
        assert!(matches!(result, Err(MigrationError::Transform(_))));
    }
}
