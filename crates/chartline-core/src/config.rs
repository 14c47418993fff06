//! Charts configuration loading
//!
//! The raw document is expanded by a [`TemplateExpander`] first, since
//! directives may produce YAML structure, and only then decoded. Chart
//! declarations keep the order they have in the source document.

use serde::Deserialize;
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fmt;

use crate::error::ConfigError;
use crate::values::Values;

/// Expands templating directives embedded in the configuration text
pub trait TemplateExpander {
    fn expand(&self, source_name: &str, text: &str) -> Result<String, ConfigError>;
}

/// Release identity supplied on the command line
///
/// A non-empty value here wins over the one in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOverrides {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

/// Decoded charts configuration
#[derive(Debug, Clone, Default)]
pub struct ChartsConfiguration {
    pub api_version: String,
    pub name: String,
    pub namespace: String,
    pub charts: Vec<ChartDeclaration>,
}

impl ChartsConfiguration {
    /// Repository URLs declared inline by list-form entries, keyed by repository name
    pub fn inline_repositories(&self) -> Vec<(String, String)> {
        self.charts
            .iter()
            .filter_map(|decl| {
                let url = decl.repository.as_ref()?;
                let (repo, _) = decl.location.split_once('/')?;
                if repo.is_empty() || decl.location.matches('/').count() != 1 {
                    return None;
                }
                Some((repo.to_string(), url.clone()))
            })
            .collect()
    }
}

/// One configured chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartDeclaration {
    /// Key exactly as written in the configuration
    pub key: String,
    /// Local path or `[repo/]name`
    pub location: String,
    /// Optional version constraint
    pub constraint: Option<String>,
    /// Repository URL to register before resolving (list form only)
    pub repository: Option<String>,
    /// Override values for the chart
    pub overrides: Values,
}

impl ChartDeclaration {
    /// Build a declaration from a map-form key
    pub fn from_key(key: &str, overrides: Values) -> Self {
        let (location, constraint) = split_location_key(key);
        Self {
            key: key.to_string(),
            location,
            constraint,
            repository: None,
            overrides,
        }
    }
}

/// Loads a [`ChartsConfiguration`] from raw bytes
pub struct ConfigLoader<'a> {
    expander: &'a dyn TemplateExpander,
    overrides: ReleaseOverrides,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(expander: &'a dyn TemplateExpander) -> Self {
        Self {
            expander,
            overrides: ReleaseOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ReleaseOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Expand, decode and apply release overrides
    pub fn load(&self, source_name: &str, input: &[u8]) -> Result<ChartsConfiguration, ConfigError> {
        let text = std::str::from_utf8(input)?;
        let expanded = self.expander.expand(source_name, text)?;
        tracing::debug!(source = source_name, bytes = expanded.len(), "expanded charts config");

        let mut config = decode(source_name, &expanded)?;
        apply_override(&mut config.name, self.overrides.name.as_deref());
        apply_override(&mut config.namespace, self.overrides.namespace.as_deref());
        Ok(config)
    }
}

fn apply_override(field: &mut String, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *field = value.to_string();
    }
}

/// Decode already expanded configuration text
pub fn decode(source_name: &str, text: &str) -> Result<ChartsConfiguration, ConfigError> {
    let document: YamlValue =
        serde_yaml::from_str(text).map_err(|e| ConfigError::yaml(&e, source_name, text))?;

    let root = match document {
        YamlValue::Null => return Ok(ChartsConfiguration::default()),
        YamlValue::Mapping(map) => map,
        _ => {
            return Err(ConfigError::structure(
                "the top level of the document must be a mapping",
            ));
        }
    };

    let api_version = scalar_field(&root, "apiVersion")?;
    let name = scalar_field(&root, "name")?;
    let namespace = scalar_field(&root, "namespace")?;

    let charts = match root.get("charts") {
        None | Some(YamlValue::Null) => Vec::new(),
        Some(YamlValue::Mapping(map)) => map_form(map)?,
        Some(YamlValue::Sequence(items)) => list_form(items)?,
        Some(_) => {
            return Err(ConfigError::structure(
                "`charts` must be a mapping of chart locations or a list of single-key mappings",
            ));
        }
    };

    let mut config = ChartsConfiguration {
        api_version,
        name,
        namespace,
        charts,
    };
    restore_source_text(&mut config, text);
    Ok(config)
}

/// Put back the source spelling of `apiVersion` and list-form `version`
///
/// Decoding through [`YamlValue`] turns `1.10` into the float `1.1`. A
/// second pass reads these scalars as strings, which keeps their text.
fn restore_source_text(config: &mut ChartsConfiguration, text: &str) {
    let Ok(raw) = serde_yaml::from_str::<RawScalars>(text) else {
        return;
    };

    if let Some(SourceText(api_version)) = raw.api_version {
        config.api_version = api_version;
    }

    if let Some(RawCharts::List(versions)) = raw.charts {
        if versions.len() != config.charts.len() {
            return;
        }
        for (decl, version) in config.charts.iter_mut().zip(versions) {
            if let Some(SourceText(version)) = version {
                decl.constraint = non_empty(version);
            }
        }
    }
}

#[derive(Deserialize)]
struct RawScalars {
    #[serde(rename = "apiVersion", default)]
    api_version: Option<SourceText>,
    #[serde(default)]
    charts: Option<RawCharts>,
}

/// A scalar exactly as written in the document
struct SourceText(String);

impl<'de> Deserialize<'de> for SourceText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextVisitor;

        impl Visitor<'_> for TextVisitor {
            type Value = SourceText;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SourceText, E> {
                Ok(SourceText(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<SourceText, E> {
                Ok(SourceText(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<SourceText, E> {
                Ok(SourceText(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<SourceText, E> {
                Ok(SourceText(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<SourceText, E> {
                Ok(SourceText(v.to_string()))
            }
        }

        deserializer.deserialize_str(TextVisitor)
    }
}

/// `version` of every list-form item, in order; the map form has none
enum RawCharts {
    List(Vec<Option<SourceText>>),
    Other,
}

impl<'de> Deserialize<'de> for RawCharts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChartsVisitor;

        impl<'de> Visitor<'de> for ChartsVisitor {
            type Value = RawCharts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a charts mapping or list")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawCharts, A::Error> {
                let mut versions = Vec::new();
                while let Some(RawItem(version)) = seq.next_element()? {
                    versions.push(version);
                }
                Ok(RawCharts::List(versions))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawCharts, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(RawCharts::Other)
            }

            fn visit_unit<E: de::Error>(self) -> Result<RawCharts, E> {
                Ok(RawCharts::Other)
            }
        }

        deserializer.deserialize_any(ChartsVisitor)
    }
}

/// One list-form item: `<location>: {version, ...}`
struct RawItem(Option<SourceText>);

impl<'de> Deserialize<'de> for RawItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemVisitor;

        impl<'de> Visitor<'de> for ItemVisitor {
            type Value = RawItem;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a single-key chart mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawItem, A::Error> {
                let mut version = None;
                while map.next_key::<IgnoredAny>()?.is_some() {
                    let body: Option<RawBody> = map.next_value()?;
                    version = body.and_then(|b| b.version);
                }
                Ok(RawItem(version))
            }
        }

        deserializer.deserialize_map(ItemVisitor)
    }
}

#[derive(Deserialize)]
struct RawBody {
    #[serde(default)]
    version: Option<SourceText>,
}

fn map_form(map: &Mapping) -> Result<Vec<ChartDeclaration>, ConfigError> {
    map.iter()
        .map(|(key, value)| {
            let key = scalar_string(key, "chart location")?;
            let overrides = overrides_value(value, &key)?;
            Ok(ChartDeclaration::from_key(&key, overrides))
        })
        .collect()
}

fn list_form(items: &[YamlValue]) -> Result<Vec<ChartDeclaration>, ConfigError> {
    let mut charts = Vec::with_capacity(items.len());

    for (idx, item) in items.iter().enumerate() {
        let entry = match item {
            YamlValue::Mapping(map) if map.len() == 1 => map,
            _ => {
                return Err(ConfigError::structure(format!(
                    "chart #{} must be a mapping with exactly one chart location key",
                    idx + 1
                )));
            }
        };

        for (key, body) in entry {
            let key = scalar_string(key, "chart location")?;
            let body = match body {
                YamlValue::Null => Mapping::new(),
                YamlValue::Mapping(map) => map.clone(),
                _ => {
                    return Err(ConfigError::structure(format!(
                        "chart '{}' must map to `version`, `repo` and `values` fields",
                        key
                    )));
                }
            };

            for field in body.keys() {
                let field = scalar_string(field, "chart field")?;
                if !matches!(field.as_str(), "version" | "repo" | "values") {
                    return Err(ConfigError::structure(format!(
                        "chart '{}' has unknown field `{}` (expected version, repo or values)",
                        key, field
                    )));
                }
            }

            let constraint = non_empty(scalar_field(&body, "version")?);
            let repository = non_empty(scalar_field(&body, "repo")?);
            let overrides = match body.get("values") {
                Some(values) => overrides_value(values, &key)?,
                None => Values::new(),
            };

            charts.push(ChartDeclaration {
                location: key.trim().to_string(),
                key,
                constraint,
                repository,
                overrides,
            });
        }
    }

    Ok(charts)
}

fn overrides_value(value: &YamlValue, key: &str) -> Result<Values, ConfigError> {
    match value {
        YamlValue::Null => Ok(Values::new()),
        YamlValue::Mapping(_) => Values::from_yaml_value(value.clone())
            .map_err(|e| ConfigError::structure(format!("values for chart '{}': {}", key, e))),
        _ => Err(ConfigError::structure(format!(
            "values for chart '{}' must be a mapping",
            key
        ))),
    }
}

fn scalar_field(map: &Mapping, field: &str) -> Result<String, ConfigError> {
    match map.get(field) {
        Some(value) => scalar_string(value, field),
        None => Ok(String::new()),
    }
}

fn scalar_string(value: &YamlValue, field: &str) -> Result<String, ConfigError> {
    match value {
        YamlValue::Null => Ok(String::new()),
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::structure(format!("`{}` must be a scalar", field))),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split a map-form key into location and optional constraint
///
/// The key is split on its last `:` only when what follows looks like a
/// version: it contains no `/` and, past any operator characters,
/// whitespace and a `v` prefix, starts with a digit or a wildcard.
/// `localhost:5000/app` and `repo/app:latest` stay whole.
pub fn split_location_key(key: &str) -> (String, Option<String>) {
    let key = key.trim();

    if let Some((location, suffix)) = key.rsplit_once(':') {
        if !location.trim().is_empty() && is_version_token(suffix) {
            return (location.trim().to_string(), Some(suffix.trim().to_string()));
        }
    }

    (key.to_string(), None)
}

fn is_version_token(suffix: &str) -> bool {
    if suffix.trim().is_empty() || suffix.contains('/') {
        return false;
    }

    let rest = suffix.trim_start_matches(|c: char| "~^=<>!".contains(c) || c.is_whitespace());
    let rest = rest.strip_prefix(['v', 'V']).unwrap_or(rest);

    rest.chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '*' | 'x' | 'X'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Verbatim;

    impl TemplateExpander for Verbatim {
        fn expand(&self, _source_name: &str, text: &str) -> Result<String, ConfigError> {
            Ok(text.to_string())
        }
    }

    fn load(text: &str) -> ChartsConfiguration {
        ConfigLoader::new(&Verbatim)
            .load("charts.yml", text.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_split_location_key() {
        let cases = [
            ("stable/redis:~>1.0", "stable/redis", Some("~>1.0")),
            ("redis:1.2.3", "redis", Some("1.2.3")),
            ("redis: >= 1.0, < 2", "redis", Some(">= 1.0, < 2")),
            ("redis:v1.2", "redis", Some("v1.2")),
            ("redis:*", "redis", Some("*")),
            ("stable/redis", "stable/redis", None),
            ("repo/app:latest", "repo/app:latest", None),
            ("localhost:5000/app", "localhost:5000/app", None),
            ("./charts/web", "./charts/web", None),
            ("redis:", "redis:", None),
            (":1.0", ":1.0", None),
        ];

        for (key, location, constraint) in cases {
            let (loc, con) = split_location_key(key);
            assert_eq!(loc, location, "location of {key}");
            assert_eq!(con.as_deref(), constraint, "constraint of {key}");
        }
    }

    #[test]
    fn test_map_form_preserves_order() {
        let config = load(
            r#"
apiVersion: v1
name: demo
namespace: apps
charts:
  zeta/app:~>1.0:
    replicas: 2
  ./local:
  alpha/app:
    image:
      tag: "1.0"
"#,
        );

        let locations: Vec<&str> = config.charts.iter().map(|c| c.location.as_str()).collect();
        assert_eq!(locations, vec!["zeta/app", "./local", "alpha/app"]);
        assert_eq!(config.charts[0].constraint.as_deref(), Some("~>1.0"));
        assert_eq!(config.charts[0].overrides, Values(json!({"replicas": 2})));
        assert!(config.charts[1].overrides.is_empty());
        assert_eq!(config.api_version, "v1");
    }

    #[test]
    fn test_list_form() {
        let config = load(
            r#"
apiVersion: v1
name: demo
namespace: apps
charts:
  - acme/web:
      version: ">= 1.0"
      repo: https://charts.example.com
      values:
        port: 8080
  - ./local:
"#,
        );

        assert_eq!(config.charts.len(), 2);
        let web = &config.charts[0];
        assert_eq!(web.location, "acme/web");
        assert_eq!(web.constraint.as_deref(), Some(">= 1.0"));
        assert_eq!(web.repository.as_deref(), Some("https://charts.example.com"));
        assert_eq!(web.overrides, Values(json!({"port": 8080})));
        assert_eq!(
            config.inline_repositories(),
            vec![("acme".to_string(), "https://charts.example.com".to_string())]
        );
        assert_eq!(config.charts[1].constraint, None);
    }

    #[test]
    fn test_list_form_rejects_unknown_field() {
        let err = ConfigLoader::new(&Verbatim)
            .load("charts.yml", b"charts:\n  - web:\n      valeus: {}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Structure { .. }));
    }

    #[test]
    fn test_overrides_win_when_non_empty() {
        let config = ConfigLoader::new(&Verbatim)
            .with_overrides(ReleaseOverrides {
                name: Some("cli-name".to_string()),
                namespace: Some(String::new()),
            })
            .load("charts.yml", b"name: file-name\nnamespace: file-ns\n")
            .unwrap();

        assert_eq!(config.name, "cli-name");
        assert_eq!(config.namespace, "file-ns");
    }

    #[test]
    fn test_empty_document() {
        let config = load("");
        assert!(config.api_version.is_empty());
        assert!(config.charts.is_empty());
    }

    #[test]
    fn test_numeric_api_version_is_stringified() {
        assert_eq!(load("apiVersion: 1").api_version, "1");
        assert_eq!(load("apiVersion: 1.10").api_version, "1.10");
    }

    #[test]
    fn test_list_form_version_keeps_source_text() {
        let config = load(
            "charts:\n- stable/web:\n    version: 1.10\n- stable/db:\n    version: 1.0\n- ./local:\n- stable/cache:\n    version: 2\n    values:\n      a: 1\n",
        );

        let constraints: Vec<_> = config
            .charts
            .iter()
            .map(|c| c.constraint.as_deref())
            .collect();
        assert_eq!(constraints, vec![Some("1.10"), Some("1.0"), None, Some("2")]);
        assert_eq!(config.charts[3].overrides, Values(json!({"a": 1})));
    }

    #[test]
    fn test_overrides_with_integer_keys() {
        let config = load("charts:\n  ./web:\n    ports:\n      80: http\n      443: https\n");
        assert_eq!(
            config.charts[0].overrides,
            Values(json!({"ports": {"80": "http", "443": "https"}}))
        );
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ConfigLoader::new(&Verbatim)
            .load("charts.yml", b"charts: [unclosed")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn test_scalar_overrides_rejected() {
        let err = ConfigLoader::new(&Verbatim)
            .load("charts.yml", b"charts:\n  ./web: 3\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Structure { .. }));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = ConfigLoader::new(&Verbatim)
            .load("charts.yml", &[0xff, 0xfe])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Encoding(_)));
    }
}
