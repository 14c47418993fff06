//! Values handling with deep merge support

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    ///
    /// An empty document yields empty values rather than `null`.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        Self::from_yaml_value(value)
    }

    /// Wrap a decoded YAML node
    ///
    /// Scalar mapping keys such as `80` or `true` become strings.
    pub fn from_yaml_value(value: serde_yaml::Value) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_value(stringify_keys(value)?)?;
        Self::from_json_value(value)
    }

    fn from_json_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(CoreError::ValuesMerge {
                message: format!("values must be a mapping, got {}", kind_name(&other)),
            }),
        }
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Objects on both sides: recursive merge
    /// - Anything else: overlay replaces base wholesale (arrays are not appended)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Values seen by a bundled subchart
    ///
    /// The subchart's defaults are overlaid with the parent's
    /// `<subchart_name>` mapping, and the parent's `global` is carried down.
    pub fn for_subchart(defaults: Values, parent: &Values, subchart_name: &str) -> Values {
        let mut scoped = serde_json::Map::new();
        if let JsonValue::Object(parent) = &parent.0 {
            if let Some(global) = parent.get("global") {
                scoped.insert("global".to_string(), global.clone());
            }
            if let Some(JsonValue::Object(own)) = parent.get(subchart_name) {
                scoped.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        let mut values = defaults;
        values.merge(&Values(JsonValue::Object(scoped)));
        values
    }

    /// Serialize as a standalone YAML values document
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

/// Prepares the override document handed to the renderer for one chart
///
/// Layers are merged in the order they are added, later layers winning.
/// The chart's own defaults are not applied here; the renderer merges
/// the composed document on top of them.
#[derive(Debug, Default)]
pub struct ValueComposer {
    accumulator: Values,
}

impl ValueComposer {
    pub fn new() -> Self {
        Self {
            accumulator: Values::new(),
        }
    }

    /// Merge one layer of overrides onto the accumulator
    pub fn layer(mut self, overrides: &Values) -> Self {
        self.accumulator.merge(overrides);
        self
    }

    /// Finish composing
    pub fn compose(self) -> Values {
        self.accumulator
    }

    /// Compose a single override layer into a values document
    pub fn document(overrides: &Values) -> Result<String> {
        Self::new().layer(overrides).compose().to_yaml()
    }
}

fn stringify_keys(value: serde_yaml::Value) -> Result<serde_yaml::Value> {
    use serde_yaml::Value as YamlValue;

    Ok(match value {
        YamlValue::Mapping(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (key, value) in map {
                let key = match key {
                    YamlValue::String(s) => s,
                    YamlValue::Number(n) => n.to_string(),
                    YamlValue::Bool(b) => b.to_string(),
                    YamlValue::Null => "null".to_string(),
                    other => {
                        return Err(CoreError::ValuesMerge {
                            message: format!(
                                "mapping keys must be scalars, got {:?}",
                                other
                            ),
                        });
                    }
                };
                out.insert(YamlValue::String(key), stringify_keys(value)?);
            }
            YamlValue::Mapping(out)
        }
        YamlValue::Sequence(items) => YamlValue::Sequence(
            items
                .into_iter()
                .map(stringify_keys)
                .collect::<Result<Vec<_>>>()?,
        ),
        YamlValue::Tagged(tagged) => stringify_keys(tagged.value)?,
        other => other,
    })
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return Some(value);
    }

    let key = path[0];
    let remaining = &path[1..];

    match value {
        JsonValue::Object(map) => map.get(key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge() {
        let mut base = Values::from_yaml(
            r#"
image:
  repository: nginx
  tag: "1.0"
replicas: 1
"#,
        )
        .unwrap();

        let overlay = Values::from_yaml(
            r#"
image:
  tag: "2.0"
  pullPolicy: Always
replicas: 3
"#,
        )
        .unwrap();

        base.merge(&overlay);

        assert_eq!(base.get("image.repository").unwrap(), "nginx");
        assert_eq!(base.get("image.tag").unwrap(), "2.0");
        assert_eq!(base.get("image.pullPolicy").unwrap(), "Always");
        assert_eq!(base.get("replicas").unwrap(), 3);
    }

    #[test]
    fn test_nested_override_keeps_siblings() {
        let mut base = Values(json!({"a": {"b": 1, "c": 2}}));
        base.merge(&Values(json!({"a": {"b": 9}})));
        assert_eq!(base, Values(json!({"a": {"b": 9, "c": 2}})));
    }

    #[test]
    fn test_scalar_replaces_mapping_and_back() {
        let mut base = Values(json!({"a": {"b": 1}, "list": [1, 2], "s": "x"}));
        base.merge(&Values(json!({"a": "flat", "list": [3], "s": {"nested": true}})));
        assert_eq!(
            base,
            Values(json!({"a": "flat", "list": [3], "s": {"nested": true}}))
        );
    }

    #[test]
    fn test_from_yaml_empty_and_null() {
        assert!(Values::from_yaml("").unwrap().is_empty());
        assert!(Values::from_yaml("~").unwrap().is_empty());
        assert!(Values::from_yaml("- a\n- b").is_err());
    }

    #[test]
    fn test_scalar_keys_become_strings() {
        let values = Values::from_yaml("ports:\n  80: http\n  true: yes\nlist:\n  - 1: one\n").unwrap();
        assert_eq!(
            values,
            Values(json!({"ports": {"80": "http", "true": "yes"}, "list": [{"1": "one"}]}))
        );
        assert!(Values::from_yaml("? [a, b]\n: x\n").is_err());
    }

    #[test]
    fn test_for_subchart_scopes_parent_values() {
        let parent = Values(json!({
            "global": {"registry": "docker.io"},
            "redis": {"replicas": 3, "auth": {"enabled": false}},
            "web": {"replicas": 9}
        }));
        let defaults = Values(json!({"replicas": 1, "auth": {"enabled": true, "user": "default"}}));

        let scoped = Values::for_subchart(defaults, &parent, "redis");
        assert_eq!(
            scoped,
            Values(json!({
                "global": {"registry": "docker.io"},
                "replicas": 3,
                "auth": {"enabled": false, "user": "default"}
            }))
        );

        let untouched = Values::for_subchart(Values(json!({"a": 1})), &Values::new(), "redis");
        assert_eq!(untouched, Values(json!({"a": 1})));
    }

    #[test]
    fn test_composer_layers() {
        let composed = ValueComposer::new()
            .layer(&Values(json!({"a": {"b": 1, "c": 2}, "d": 1})))
            .layer(&Values(json!({"a": {"b": 9}})))
            .compose();

        assert_eq!(composed, Values(json!({"a": {"b": 9, "c": 2}, "d": 1})));
    }

    #[test]
    fn test_composer_document() {
        let doc = ValueComposer::document(&Values(json!({"value": 1}))).unwrap();
        assert_eq!(doc, "value: 1\n");

        let empty = ValueComposer::document(&Values::new()).unwrap();
        assert_eq!(empty.trim(), "{}");
    }
}
