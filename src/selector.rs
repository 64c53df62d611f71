//! Migration selection: which migrations apply to one request, in which order.

use crate::config::MissingVersionPolicy;
use crate::registry::{MigrationRegistry, RegisteredMigration};
use crate::version::VersionComparator;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// One selected migration and the route parameters it captured.
#[derive(Debug, Clone)]
pub struct PlannedMigration {
    /// The registered migration
    pub migration: Arc<RegisteredMigration>,
    /// Parameters captured by this migration's route pattern
    pub params: HashMap<String, String>,
}

impl PlannedMigration {
    /// Version token.
    pub fn version(&self) -> &str {
        self.migration.version()
    }
}

/// The applicable migration set for a request, ordered oldest first.
///
/// The request phase walks [`MigrationPlan::request_order`]; the response
/// phase walks [`MigrationPlan::response_order`], its exact reverse.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    steps: Vec<PlannedMigration>,
}

impl MigrationPlan {
    /// Whether no migration applies.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of migrations in the plan.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Ascending version order (oldest change first).
    pub fn request_order(&self) -> impl Iterator<Item = &PlannedMigration> {
        self.steps.iter()
    }

    /// Descending version order (newest change first).
    pub fn response_order(&self) -> impl Iterator<Item = &PlannedMigration> {
        self.steps.iter().rev()
    }

    /// Versions in request order.
    pub fn versions(&self) -> Vec<&str> {
        self.steps.iter().map(PlannedMigration::version).collect()
    }
}

/// Select the migrations that apply to a request.
///
/// A migration applies when its verb and route match and its version is
/// strictly newer than `declared`. An absent or empty `declared` version is
/// resolved by `policy`. Equal versions keep registration order.
pub fn select(
    registry: &MigrationRegistry,
    comparator: &dyn VersionComparator,
    policy: MissingVersionPolicy,
    method: &str,
    path: &str,
    declared: Option<&str>,
) -> MigrationPlan {
    let declared = declared.filter(|v| !v.is_empty());

    if declared.is_none() && policy == MissingVersionPolicy::Latest {
        return MigrationPlan::default();
    }

    let mut steps: Vec<PlannedMigration> = registry
        .migrations()
        .iter()
        .filter_map(|migration| {
            let result = migration.matches(method, path);
            if !result.matched {
                return None;
            }
            if let Some(declared) = declared {
                if comparator.compare(migration.version(), declared) != Ordering::Greater {
                    return None;
                }
            }
            Some(PlannedMigration {
                migration: migration.clone(),
                params: result.captures,
            })
        })
        .collect();

    // Stable sort: ties stay in registration order
    steps.sort_by(|a, b| comparator.compare(a.version(), b.version()));

    MigrationPlan { steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MigrationRequest;
    use crate::migration::{MigrationDescriptor, MigrationError};
    use crate::version::{DottedNumeric, Lexicographic};
    use serde_json::Value as JsonValue;

    fn descriptor(route: &str, verbs: &str, version: &str) -> MigrationDescriptor {
        MigrationDescriptor::new(route, verbs, version)
            .with_description(format!("{route} {version}"))
            .with_request(|req: MigrationRequest| async move { Ok::<_, MigrationError>(req) })
            .with_response(|_req: &MigrationRequest, body: JsonValue| async move {
                Ok::<_, MigrationError>(body)
            })
    }

    fn registry() -> MigrationRegistry {
        MigrationRegistry::new(vec![
            descriptor("/api/users/:id", "GET|POST", "2023-12-15"),
            descriptor("/api/users/:id", "POST|PUT", "2023-06-15"),
            descriptor("/api/orders", "GET", "2023-03-01"),
            descriptor("/api/users/:id", "POST", "2024-01-01"),
        ])
        .unwrap()
    }

    fn plan(method: &str, path: &str, declared: Option<&str>) -> Vec<String> {
        select(
            &registry(),
            &Lexicographic,
            MissingVersionPolicy::Latest,
            method,
            path,
            declared,
        )
        .versions()
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    #[test]
    fn test_sorted_ascending() {
        assert_eq!(
            plan("POST", "/api/users/1", Some("2023-01-01")),
            vec!["2023-06-15", "2023-12-15", "2024-01-01"]
        );
    }

    #[test]
    fn test_response_order_is_reverse() {
        let plan = select(
            &registry(),
            &Lexicographic,
            MissingVersionPolicy::Latest,
            "POST",
            "/api/users/1",
            Some("2023-01-01"),
        );
        let response: Vec<_> = plan.response_order().map(|m| m.version()).collect();
        assert_eq!(response, vec!["2024-01-01", "2023-12-15", "2023-06-15"]);
    }

    #[test]
    fn test_verb_and_route_filter() {
        assert_eq!(
            plan("GET", "/api/users/1", Some("2023-01-01")),
            vec!["2023-12-15"]
        );
        assert_eq!(
            plan("PUT", "/api/users/1", Some("2023-01-01")),
            vec!["2023-06-15"]
        );
        assert_eq!(
            plan("GET", "/api/orders", Some("2023-01-01")),
            vec!["2023-03-01"]
        );
        assert!(plan("DELETE", "/api/users/1", Some("2023-01-01")).is_empty());
        assert!(plan("POST", "/api/other", Some("2023-01-01")).is_empty());
    }

    #[test]
    fn test_strictly_newer_only() {
        // Equal to the declared version is excluded
        assert_eq!(
            plan("POST", "/api/users/1", Some("2023-06-15")),
            vec!["2023-12-15", "2024-01-01"]
        );
        assert_eq!(
            plan("POST", "/api/users/1", Some("2023-12-15")),
            vec!["2024-01-01"]
        );
        assert!(plan("POST", "/api/users/1", Some("2024-01-01")).is_empty());
    }

    #[test]
    fn test_missing_version_latest() {
        assert!(plan("POST", "/api/users/1", None).is_empty());
        assert!(plan("POST", "/api/users/1", Some("")).is_empty());
    }

    #[test]
    fn test_missing_version_oldest() {
        let plan = select(
            &registry(),
            &Lexicographic,
            MissingVersionPolicy::Oldest,
            "POST",
            "/api/users/1",
            None,
        );
        assert_eq!(plan.versions(), vec!["2023-06-15", "2023-12-15", "2024-01-01"]);
    }

    #[test]
    fn test_params_are_captured() {
        let plan = select(
            &registry(),
            &Lexicographic,
            MissingVersionPolicy::Latest,
            "POST",
            "/api/users/99",
            Some("2023-01-01"),
        );
        for step in plan.request_order() {
            assert_eq!(step.params.get("id"), Some(&"99".to_string()));
        }
    }

    #[test]
    fn test_equal_versions_keep_registration_order() {
        let registry = MigrationRegistry::new(vec![
            descriptor("/a", "GET", "2").with_description("first"),
            descriptor("/a", "GET", "1"),
            descriptor("/a", "GET", "2").with_description("second"),
        ])
        .unwrap();

        let plan = select(
            &registry,
            &Lexicographic,
            MissingVersionPolicy::Latest,
            "GET",
            "/a",
            Some("0"),
        );
        let request: Vec<_> = plan
            .request_order()
            .map(|m| m.migration.descriptor.description.as_str())
            .collect();
        assert_eq!(request, vec!["/a 1", "first", "second"]);

        let response: Vec<_> = plan
            .response_order()
            .map(|m| m.migration.descriptor.description.as_str())
            .collect();
        assert_eq!(response, vec!["second", "first", "/a 1"]);
    }

    #[test]
    fn test_lexicographic_sharp_edge() {
        // "10" < "9" byte-wise, so version 10 is not newer than 9
        let registry = MigrationRegistry::new(vec![
            descriptor("/a", "GET", "9"),
            descriptor("/a", "GET", "10"),
        ])
        .unwrap();

        let lexicographic = select(
            &registry,
            &Lexicographic,
            MissingVersionPolicy::Latest,
            "GET",
            "/a",
            Some("8"),
        );
        assert_eq!(lexicographic.versions(), vec!["9"]);

        let numeric = select(
            &registry,
            &DottedNumeric,
            MissingVersionPolicy::Latest,
            "GET",
            "/a",
            Some("8"),
        );
        assert_eq!(numeric.versions(), vec!["9", "10"]);
    }
}
