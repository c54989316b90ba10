//! Stack configuration.
//!
//! A stack configuration tells the projector how to render the document for
//! one target language: path templates per artifact kind, body templates,
//! the type map, the generated-file header and the custom region markers.
//! Every key is optional in the file; omitted keys keep the TypeScript
//! defaults below.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TemplateError, TemplateResult};

/// Kinds of artifacts the projector emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Model,
    Enum,
    CustomType,
    Service,
    Endpoint,
    Test,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Enum => "enum",
            ArtifactKind::CustomType => "custom_type",
            ArtifactKind::Service => "service",
            ArtifactKind::Endpoint => "endpoint",
            ArtifactKind::Test => "test",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target stack configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Target language identifier (e.g., "typescript", "python")
    pub language: String,
    /// Target framework identifier
    pub framework: String,
    /// Extension of generated files, without the dot
    pub file_extension: String,
    /// Line comment opener used for markers and generated comments
    pub comment_prefix: String,
    /// Line comment closer, empty for line-comment languages
    pub comment_suffix: String,
    /// Generated-file header; may reference `{{generated_at}}`
    pub header: String,
    /// List type template; `{{item}}` is the element type
    pub list_type: String,
    /// Appended to the name of an `optional` field
    pub optional_marker: String,
    /// Document type name to target type name
    pub type_map: BTreeMap<String, String>,
    pub paths: PathTemplates,
    pub templates: BodyTemplates,
    pub markers: MarkerTokens,
    /// Free-form settings exposed to templates as `{{setting_<key>}}`
    pub settings: BTreeMap<String, String>,
}

/// Per artifact kind path templates. `None` disables that kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTemplates {
    pub model: Option<String>,
    #[serde(rename = "enum")]
    pub enum_def: Option<String>,
    pub custom_type: Option<String>,
    pub service: Option<String>,
    pub endpoint: Option<String>,
    pub test: Option<String>,
}

/// Body templates. Artifact templates are rendered once per element; the
/// remaining ones are rendered per item and joined into block variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyTemplates {
    pub model: String,
    #[serde(rename = "enum")]
    pub enum_def: String,
    pub custom_type: String,
    pub service: String,
    pub endpoint: String,
    pub test: String,
    pub field: String,
    pub enum_value: String,
    pub rule: String,
    pub error_case: String,
    pub default_body: String,
    pub test_case: String,
    pub binding: String,
    pub assertion: String,
}

/// Tokens that delimit custom regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerTokens {
    pub start_token: String,
    pub end_token: String,
}

impl Default for MarkerTokens {
    fn default() -> Self {
        Self {
            start_token: "HUSL-CUSTOM-BEGIN".to_string(),
            end_token: "HUSL-CUSTOM-END".to_string(),
        }
    }
}

impl Default for PathTemplates {
    fn default() -> Self {
        Self {
            model: Some("src/models/{{name_kebab}}.{{ext}}".to_string()),
            enum_def: Some("src/enums/{{name_kebab}}.{{ext}}".to_string()),
            custom_type: Some("src/types/{{name_kebab}}.{{ext}}".to_string()),
            service: Some("src/operations/{{name_kebab}}.{{ext}}".to_string()),
            endpoint: Some("src/operations/{{name_kebab}}.{{ext}}".to_string()),
            test: Some("tests/{{name_kebab}}.test.{{ext}}".to_string()),
        }
    }
}

impl PathTemplates {
    /// The path template for a kind. Empty templates count as disabled.
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        let template = match kind {
            ArtifactKind::Model => &self.model,
            ArtifactKind::Enum => &self.enum_def,
            ArtifactKind::CustomType => &self.custom_type,
            ArtifactKind::Service => &self.service,
            ArtifactKind::Endpoint => &self.endpoint,
            ArtifactKind::Test => &self.test,
        };
        template.as_deref().filter(|t| !t.trim().is_empty())
    }
}

const MODEL_TEMPLATE: &str = "\
{{custom_before}}
export interface {{name}} {
  {{body}}
  {{custom_extend}}
}
{{custom_after}}
";

const ENUM_TEMPLATE: &str = "\
export enum {{name}} {
  {{values}}
}
";

const CUSTOM_TYPE_TEMPLATE: &str = "\
{{doc}}
export type {{name}} = {{base_type}};
";

const SERVICE_TEMPLATE: &str = "\
export interface {{name}}Input {
  {{params}}
}

{{errors}}
{{concerns}}
{{doc}}
export async function {{name_camel}}(input: {{name}}Input): Promise<{{response_type}}> {
  {{custom_before}}
  {{rules}}
  {{body}}
  {{custom_after}}
}
{{custom_extend}}
";

const ENDPOINT_TEMPLATE: &str = "\
export const {{name_camel}}Route = {
  method: \"{{method}}\",
  path: \"{{path}}\",
  status: {{success_status}},
  handler: {{name_camel}},
};
";

const TEST_TEMPLATE: &str = "\
describe(\"{{name}}\", () => {
  {{cases}}
});
";

const FIELD_TEMPLATE: &str = "\
{{doc}}
{{field_name}}{{optional_marker}}: {{field_type}};";

const ENUM_VALUE_TEMPLATE: &str = "\
{{doc}}
{{value}} = \"{{value}}\",";

const RULE_TEMPLATE: &str = "\
{{doc}}
enforceRule(\"{{rule_name}}\", input);";

const ERROR_CASE_TEMPLATE: &str = "\
{{doc}}
export const {{code}} = { status: {{status}}, message: {{message_literal}} };";

const DEFAULT_BODY_TEMPLATE: &str = "throw new Error(\"{{name}} is not implemented\");";

const TEST_CASE_TEMPLATE: &str = "\
it(\"{{test_name}}\", async () => {
  {{given}}
  const result = await {{when}};
  {{assertions}}
});";

const BINDING_TEMPLATE: &str = "const {{binding}} = {{literal}};";

const ASSERTION_TEMPLATE: &str = "assertThat({{subject}}, \"{{operator}}\", {{expected}});";

impl Default for BodyTemplates {
    fn default() -> Self {
        Self {
            model: MODEL_TEMPLATE.to_string(),
            enum_def: ENUM_TEMPLATE.to_string(),
            custom_type: CUSTOM_TYPE_TEMPLATE.to_string(),
            service: SERVICE_TEMPLATE.to_string(),
            endpoint: ENDPOINT_TEMPLATE.to_string(),
            test: TEST_TEMPLATE.to_string(),
            field: FIELD_TEMPLATE.to_string(),
            enum_value: ENUM_VALUE_TEMPLATE.to_string(),
            rule: RULE_TEMPLATE.to_string(),
            error_case: ERROR_CASE_TEMPLATE.to_string(),
            default_body: DEFAULT_BODY_TEMPLATE.to_string(),
            test_case: TEST_CASE_TEMPLATE.to_string(),
            binding: BINDING_TEMPLATE.to_string(),
            assertion: ASSERTION_TEMPLATE.to_string(),
        }
    }
}

impl BodyTemplates {
    /// The artifact body template for a kind.
    pub fn artifact(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Model => &self.model,
            ArtifactKind::Enum => &self.enum_def,
            ArtifactKind::CustomType => &self.custom_type,
            ArtifactKind::Service => &self.service,
            ArtifactKind::Endpoint => &self.endpoint,
            ArtifactKind::Test => &self.test,
        }
    }
}

fn default_type_map() -> BTreeMap<String, String> {
    [
        ("String", "string"),
        ("Text", "string"),
        ("Int", "number"),
        ("Integer", "number"),
        ("Long", "number"),
        ("Float", "number"),
        ("Double", "number"),
        ("Decimal", "string"),
        ("Boolean", "boolean"),
        ("Bool", "boolean"),
        ("UUID", "string"),
        ("Date", "string"),
        ("DateTime", "string"),
        ("Timestamp", "string"),
        ("Time", "string"),
        ("Duration", "string"),
        ("Email", "string"),
        ("URL", "string"),
        ("Json", "unknown"),
        ("Binary", "Uint8Array"),
        ("Money", "string"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            language: "typescript".to_string(),
            framework: "express".to_string(),
            file_extension: "ts".to_string(),
            comment_prefix: "//".to_string(),
            comment_suffix: String::new(),
            header: "// Generated by husl at {{generated_at}}.\n// Edit only inside custom regions.".to_string(),
            list_type: "{{item}}[]".to_string(),
            optional_marker: "?".to_string(),
            type_map: default_type_map(),
            paths: PathTemplates::default(),
            templates: BodyTemplates::default(),
            markers: MarkerTokens::default(),
            settings: BTreeMap::new(),
        }
    }
}

impl StackConfig {
    /// Number of leading lines every artifact spends on the header.
    pub fn header_lines(&self) -> usize {
        let header = self.header.trim_end_matches('\n');
        if header.is_empty() {
            0
        } else {
            header.lines().count()
        }
    }

    /// Check the settings the engine relies on.
    pub fn validate(&self) -> TemplateResult<()> {
        let start = self.markers.start_token.trim();
        let end = self.markers.end_token.trim();
        if start.is_empty() || end.is_empty() {
            return Err(TemplateError::InvalidConfig(
                "marker tokens must not be empty".to_string(),
            ));
        }
        if start.contains(end) || end.contains(start) {
            return Err(TemplateError::InvalidConfig(format!(
                "marker tokens '{}' and '{}' must not contain each other",
                start, end
            )));
        }
        if start.chars().any(char::is_whitespace) || end.chars().any(char::is_whitespace) {
            return Err(TemplateError::InvalidConfig(
                "marker tokens must not contain whitespace".to_string(),
            ));
        }
        if self.header.contains(start) || self.header.contains(end) {
            return Err(TemplateError::InvalidConfig(
                "header must not contain a marker token".to_string(),
            ));
        }
        if self.file_extension.contains('/') {
            return Err(TemplateError::InvalidConfig(format!(
                "file extension '{}' must not contain a path separator",
                self.file_extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StackConfig::default();
        config.validate().unwrap();
        assert_eq!(config.header_lines(), 2);
        assert_eq!(config.paths.get(ArtifactKind::Service), config.paths.get(ArtifactKind::Endpoint));
    }

    #[test]
    fn test_null_path_disables_kind() {
        let config: StackConfig = serde_yaml::from_str("paths:\n  test: null\n").unwrap();
        assert!(config.paths.get(ArtifactKind::Test).is_none());
        // Omitted keys keep the defaults.
        assert!(config.paths.get(ArtifactKind::Model).is_some());
        assert_eq!(config.language, "typescript");
    }

    #[test]
    fn test_overlapping_markers_rejected() {
        let mut config = StackConfig::default();
        config.markers.end_token = "HUSL-CUSTOM".to_string();
        assert!(matches!(config.validate(), Err(TemplateError::InvalidConfig(_))));
    }
}
