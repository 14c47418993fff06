//! Template rendering context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chart::{ChartInfo, ChartMetadata};
use crate::release::ReleaseInfo;
use crate::values::Values;

/// Context available to all chart templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    /// Chart defaults merged with the composed overrides
    pub values: JsonValue,

    /// Release information
    pub release: ReleaseInfo,

    /// Chart metadata
    pub chart: ChartInfo,

    /// Current template info
    pub template: TemplateInfo,
}

/// Current template information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    /// Template path relative to the templates directory
    pub name: String,
    pub base_path: String,
}

impl TemplateContext {
    pub fn new(values: Values, release: ReleaseInfo, metadata: &ChartMetadata) -> Self {
        Self {
            values: values.into_inner(),
            release,
            chart: ChartInfo::from(metadata),
            template: TemplateInfo::default(),
        }
    }

    pub fn with_template(mut self, name: &str, base_path: &str) -> Self {
        self.template = TemplateInfo {
            name: name.to_string(),
            base_path: base_path.to_string(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;
    use semver::Version;
    use serde_json::json;

    #[test]
    fn test_context_shape() {
        let metadata = ChartMetadata {
            api_version: "v2".to_string(),
            name: "web".to_string(),
            version: Version::new(1, 0, 0),
            description: None,
            app_version: Some("2.1".to_string()),
            kind: ChartKind::Application,
            keywords: Vec::new(),
        };

        let ctx = TemplateContext::new(
            Values(json!({"replicas": 2})),
            ReleaseInfo::new("demo", "apps"),
            &metadata,
        )
        .with_template("deployment.yaml", "web/templates");

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["values"]["replicas"], 2);
        assert_eq!(json["release"]["namespace"], "apps");
        assert_eq!(json["chart"]["appVersion"], "2.1");
        assert_eq!(json["template"]["basePath"], "web/templates");
    }
}
