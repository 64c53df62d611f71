//! JSON body transformer.

use super::TransformError;
use crate::config::JsonOperation;
use crate::context::TransformContext;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Applies a list of [`JsonOperation`]s to a body.
#[derive(Debug, Clone)]
pub struct JsonTransformer {
    /// Operations to apply in order
    operations: Vec<JsonOperation>,
}

impl JsonTransformer {
    /// Create a new JSON transformer.
    pub fn new(operations: Vec<JsonOperation>) -> Self {
        Self { operations }
    }

    /// Number of configured operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operations are configured.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Apply all operations to a JSON value.
    pub fn apply(
        &self,
        mut json: JsonValue,
        ctx: &TransformContext<'_>,
    ) -> Result<JsonValue, TransformError> {
        for operation in &self.operations {
            apply_operation(&mut json, operation, ctx)?;
        }
        Ok(json)
    }
}

/// Apply a single operation to a JSON value.
fn apply_operation(
    json: &mut JsonValue,
    operation: &JsonOperation,
    ctx: &TransformContext<'_>,
) -> Result<(), TransformError> {
    match operation {
        JsonOperation::Set { path, value } => {
            set_json_value(json, path, interpolate_json_value(value, ctx))?;
        }
        JsonOperation::SetDefault { path, value } => {
            if get_json_value(json, path).map_or(true, JsonValue::is_null) {
                set_json_value(json, path, interpolate_json_value(value, ctx))?;
            }
        }
        JsonOperation::Delete { paths } => {
            for path in paths {
                delete_json_value(json, path);
            }
        }
        JsonOperation::Rename { from, to } => {
            if let Some(value) = take_json_value(json, from) {
                set_json_value(json, to, value)?;
            }
        }
        JsonOperation::Copy { from, to } => {
            if let Some(value) = get_json_value(json, from).cloned() {
                set_json_value(json, to, value)?;
            }
        }
        JsonOperation::Merge { path, with } => {
            let JsonValue::Object(merge_map) = with else {
                return Err(TransformError::JsonPath(format!(
                    "Merge value for '{}' must be an object",
                    path
                )));
            };
            match get_json_value_mut(json, path) {
                Some(JsonValue::Object(target_map)) => {
                    for (k, v) in merge_map {
                        target_map.insert(k.clone(), interpolate_json_value(v, ctx));
                    }
                }
                Some(_) => {
                    return Err(TransformError::JsonPath(format!(
                        "Cannot merge into non-object at '{}'",
                        path
                    )))
                }
                None => {}
            }
        }
        JsonOperation::Split {
            from,
            into,
            separator,
        } => {
            // Only split when the source is a string and no target exists yet
            let source = match get_json_value(json, from) {
                Some(JsonValue::String(s)) => s.clone(),
                _ => return Ok(()),
            };
            if into.iter().any(|target| get_json_value(json, target).is_some()) {
                return Ok(());
            }

            let mut parts = source.splitn(into.len().max(1), separator.as_str());
            delete_json_value(json, from);
            for target in into {
                let part = parts.next().unwrap_or_default();
                set_json_value(json, target, JsonValue::String(part.to_string()))?;
            }
        }
        JsonOperation::Join {
            from,
            into,
            separator,
        } => {
            // Only join when every source is present as a string
            let mut parts = Vec::with_capacity(from.len());
            for source in from {
                match get_json_value(json, source) {
                    Some(JsonValue::String(s)) => parts.push(s.clone()),
                    _ => return Ok(()),
                }
            }

            for source in from {
                delete_json_value(json, source);
            }
            set_json_value(json, into, JsonValue::String(parts.join(separator)))?;
        }
    }
    Ok(())
}

/// Interpolate variables in JSON string values.
fn interpolate_json_value(value: &JsonValue, ctx: &TransformContext<'_>) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(ctx.interpolate(s)),
        JsonValue::Array(arr) => {
            JsonValue::Array(arr.iter().map(|v| interpolate_json_value(v, ctx)).collect())
        }
        JsonValue::Object(obj) => JsonValue::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), interpolate_json_value(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse a JSON path into segments.
/// Supports: $.field, $.field.subfield, $.array[0], $.field[0].subfield
fn parse_path(path: &str) -> Vec<PathSegment> {
    let path = path.trim_start_matches('$');
    let mut segments = Vec::new();

    for part in path.split('.').filter(|p| !p.is_empty()) {
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            if bracket > 0 {
                segments.push(PathSegment::Key(rest[..bracket].to_string()));
            }
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(end) = stripped.find(']') else {
                    break;
                };
                if let Ok(idx) = stripped[..end].parse::<usize>() {
                    segments.push(PathSegment::Index(idx));
                }
                rest = &stripped[end + 1..];
            }
        } else {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }

    segments
}

/// Get a reference to a JSON value at a path.
fn get_json_value<'a>(json: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    parse_path(path)
        .iter()
        .try_fold(json, |current, segment| match segment {
            PathSegment::Key(key) => current.get(key),
            PathSegment::Index(idx) => current.get(*idx),
        })
}

/// Get a mutable reference to a JSON value at a path.
fn get_json_value_mut<'a>(json: &'a mut JsonValue, path: &str) -> Option<&'a mut JsonValue> {
    parse_path(path)
        .iter()
        .try_fold(json, |current, segment| match segment {
            PathSegment::Key(key) => current.get_mut(key),
            PathSegment::Index(idx) => current.get_mut(*idx),
        })
}

/// Set a JSON value at a path, creating intermediate objects as needed.
fn set_json_value(json: &mut JsonValue, path: &str, value: JsonValue) -> Result<(), TransformError> {
    let segments = parse_path(path);
    let Some((last, parents)) = segments.split_last() else {
        *json = value;
        return Ok(());
    };

    let mut current = json;
    for (i, segment) in parents.iter().enumerate() {
        current = match segment {
            PathSegment::Key(key) => {
                let JsonValue::Object(map) = current else {
                    return Err(TransformError::JsonPath(format!(
                        "Cannot descend into '{}' on non-object in '{}'",
                        key, path
                    )));
                };
                // Look ahead to create the right container
                let next = segments.get(i + 1);
                map.entry(key.clone()).or_insert_with(|| match next {
                    Some(PathSegment::Index(_)) => JsonValue::Array(vec![]),
                    _ => JsonValue::Object(serde_json::Map::new()),
                })
            }
            PathSegment::Index(idx) => current.get_mut(*idx).ok_or_else(|| {
                TransformError::JsonPath(format!("Index {} out of bounds in '{}'", idx, path))
            })?,
        };
    }

    match (last, current) {
        (PathSegment::Key(key), JsonValue::Object(map)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (PathSegment::Index(idx), JsonValue::Array(arr)) => {
            // Replace in place or append at the end; never pad
            match (*idx).cmp(&arr.len()) {
                Ordering::Less => arr[*idx] = value,
                Ordering::Equal => arr.push(value),
                Ordering::Greater => {
                    return Err(TransformError::JsonPath(format!(
                        "Index {} out of bounds in '{}'",
                        idx, path
                    )))
                }
            }
            Ok(())
        }
        (PathSegment::Key(key), _) => Err(TransformError::JsonPath(format!(
            "Cannot set key '{}' on non-object",
            key
        ))),
        (PathSegment::Index(idx), _) => Err(TransformError::JsonPath(format!(
            "Cannot set index {} on non-array",
            idx
        ))),
    }
}

/// Remove and return the JSON value at a path.
fn take_json_value(json: &mut JsonValue, path: &str) -> Option<JsonValue> {
    let segments = parse_path(path);
    let (last, parents) = segments.split_last()?;

    let parent = parents
        .iter()
        .try_fold(json, |current, segment| match segment {
            PathSegment::Key(key) => current.get_mut(key),
            PathSegment::Index(idx) => current.get_mut(*idx),
        })?;

    match (last, parent) {
        (PathSegment::Key(key), JsonValue::Object(map)) => map.remove(key),
        (PathSegment::Index(idx), JsonValue::Array(arr)) if *idx < arr.len() => {
            Some(arr.remove(*idx))
        }
        _ => None,
    }
}

/// Delete a JSON value at a path. Missing paths are ignored.
fn delete_json_value(json: &mut JsonValue, path: &str) {
    take_json_value(json, path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MigrationRequest;
    use serde_json::json;

    fn apply(operations: Vec<JsonOperation>, body: JsonValue) -> Result<JsonValue, TransformError> {
        let mut request = MigrationRequest::new("POST", "/api/users/42");
        request.params.insert("id".to_string(), "42".to_string());
        let ctx = TransformContext::new(&request, "2023-12-15");
        JsonTransformer::new(operations).apply(body, &ctx)
    }

    #[test]
    fn test_set_operation() {
        let output = apply(
            vec![JsonOperation::Set {
                path: "$.name".to_string(),
                value: json!("updated"),
            }],
            json!({"name": "original", "id": 1}),
        )
        .unwrap();

        assert_eq!(output, json!({"name": "updated", "id": 1}));
    }

    #[test]
    fn test_set_default_only_when_absent() {
        let op = JsonOperation::SetDefault {
            path: "$.user.email".to_string(),
            value: json!("user-${params.id}@example.com"),
        };

        let output = apply(vec![op.clone()], json!({"user": {}})).unwrap();
        assert_eq!(output["user"]["email"], "user-42@example.com");

        let output = apply(vec![op.clone()], json!({"user": {"email": null}})).unwrap();
        assert_eq!(output["user"]["email"], "user-42@example.com");

        let output = apply(vec![op], json!({"user": {"email": "kept@example.com"}})).unwrap();
        assert_eq!(output["user"]["email"], "kept@example.com");
    }

    #[test]
    fn test_delete_operation() {
        let output = apply(
            vec![JsonOperation::Delete {
                paths: vec![
                    "$.internal".to_string(),
                    "$.debug".to_string(),
                    "$.missing.deep".to_string(),
                ],
            }],
            json!({"name": "test", "internal": "secret", "debug": true}),
        )
        .unwrap();

        assert_eq!(output, json!({"name": "test"}));
    }

    #[test]
    fn test_rename_operation() {
        let output = apply(
            vec![JsonOperation::Rename {
                from: "$.user.account_type".to_string(),
                to: "$.user.accountType".to_string(),
            }],
            json!({"user": {"account_type": "premium"}}),
        )
        .unwrap();

        assert_eq!(output, json!({"user": {"accountType": "premium"}}));
    }

    #[test]
    fn test_rename_missing_is_noop() {
        let body = json!({"user": {"name": "x"}});
        let output = apply(
            vec![JsonOperation::Rename {
                from: "$.user.account_type".to_string(),
                to: "$.user.accountType".to_string(),
            }],
            body.clone(),
        )
        .unwrap();

        assert_eq!(output, body);
    }

    #[test]
    fn test_copy_operation() {
        let output = apply(
            vec![JsonOperation::Copy {
                from: "$.source".to_string(),
                to: "$.audit.destination".to_string(),
            }],
            json!({"source": "value"}),
        )
        .unwrap();

        assert_eq!(output["source"], "value");
        assert_eq!(output["audit"]["destination"], "value");
    }

    #[test]
    fn test_merge_operation() {
        let output = apply(
            vec![JsonOperation::Merge {
                path: "$".to_string(),
                with: json!({"added": true, "version": "${migration.version}"}),
            }],
            json!({"name": "test"}),
        )
        .unwrap();

        assert_eq!(
            output,
            json!({"name": "test", "added": true, "version": "2023-12-15"})
        );
    }

    #[test]
    fn test_merge_into_non_object_fails() {
        let result = apply(
            vec![JsonOperation::Merge {
                path: "$.items".to_string(),
                with: json!({"a": 1}),
            }],
            json!({"items": [1, 2]}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_split_operation() {
        let split = JsonOperation::Split {
            from: "$.user.name".to_string(),
            into: vec!["$.user.firstName".to_string(), "$.user.lastName".to_string()],
            separator: " ".to_string(),
        };

        let output = apply(vec![split.clone()], json!({"user": {"name": "John Doe"}})).unwrap();
        assert_eq!(
            output,
            json!({"user": {"firstName": "John", "lastName": "Doe"}})
        );

        // Remainder stays in the last field, missing parts become empty
        let output = apply(
            vec![split.clone()],
            json!({"user": {"name": "Mary Ann Smith"}}),
        )
        .unwrap();
        assert_eq!(output["user"]["lastName"], "Ann Smith");

        let output = apply(vec![split.clone()], json!({"user": {"name": "Cher"}})).unwrap();
        assert_eq!(output["user"]["firstName"], "Cher");
        assert_eq!(output["user"]["lastName"], "");

        // Already-split bodies are left alone
        let body = json!({"user": {"name": "John Doe", "firstName": "J"}});
        assert_eq!(apply(vec![split], body.clone()).unwrap(), body);
    }

    #[test]
    fn test_join_operation() {
        let join = JsonOperation::Join {
            from: vec!["$.user.firstName".to_string(), "$.user.lastName".to_string()],
            into: "$.user.name".to_string(),
            separator: " ".to_string(),
        };

        let output = apply(
            vec![join.clone()],
            json!({"user": {"firstName": "John", "lastName": "Doe", "accountType": "premium"}}),
        )
        .unwrap();
        assert_eq!(
            output,
            json!({"user": {"name": "John Doe", "accountType": "premium"}})
        );

        let body = json!({"user": {"firstName": "John"}});
        assert_eq!(apply(vec![join], body.clone()).unwrap(), body);
    }

    #[test]
    fn test_array_index() {
        let output = apply(
            vec![JsonOperation::Set {
                path: "$.items[1]".to_string(),
                value: json!("updated"),
            }],
            json!({"items": ["a", "b", "c"]}),
        )
        .unwrap();

        assert_eq!(output, json!({"items": ["a", "updated", "c"]}));

        let appended = apply(
            vec![JsonOperation::Set {
                path: "$.items[3]".to_string(),
                value: json!("d"),
            }],
            json!({"items": ["a", "b", "c"]}),
        )
        .unwrap();
        assert_eq!(appended, json!({"items": ["a", "b", "c", "d"]}));
    }

    #[test]
    fn test_array_index_past_end_fails() {
        for path in ["$.items[5]", "$.items[18446744073709551615]"] {
            let result = apply(
                vec![JsonOperation::Set {
                    path: path.to_string(),
                    value: json!("x"),
                }],
                json!({"items": ["a"]}),
            );
            assert!(matches!(result, Err(TransformError::JsonPath(_))), "{path}");
        }
    }

    #[test]
    fn test_set_on_non_object_fails() {
        let result = apply(
            vec![JsonOperation::Set {
                path: "$.name.first".to_string(),
                value: json!("x"),
            }],
            json!({"name": "scalar"}),
        );
        assert!(matches!(result, Err(TransformError::JsonPath(_))));
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("$.user.profile.name").len(), 3);
        assert_eq!(
            parse_path("$.items[0].name"),
            vec![
                PathSegment::Key("items".to_string()),
                PathSegment::Index(0),
                PathSegment::Key("name".to_string()),
            ]
        );
        assert!(parse_path("$").is_empty());
    }
}
