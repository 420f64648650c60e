//! Package manifest types and the on-disk `portico.toml` document.
//!
//! A package declares its components inside a `[tool.portico.component]`
//! table. Every relative path or glob in a [`ComponentDescriptor`] is
//! resolved against the package's asset root, never anywhere else.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::component::ComponentKey;

/// File name of the manifest embedded in a component package.
pub const MANIFEST_FILE_NAME: &str = "portico.toml";

/// Opaque security requirements; consumed by the host, never interpreted here.
pub type SecurityRequirements = BTreeMap<String, serde_json::Value>;

/// One component declared by a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    /// Inline markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Literal relative path or single-level glob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    /// Literal relative path or single-level glob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
}

/// Component section of a package manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Package name; prefix of every component key.
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
    #[serde(default, alias = "security_requirements")]
    pub security: SecurityRequirements,
}

impl PackageManifest {
    /// Key under which `descriptor` is registered.
    #[must_use]
    pub fn component_key(&self, descriptor: &ComponentDescriptor) -> ComponentKey {
        ComponentKey::qualified(&self.name, &descriptor.name)
    }

    /// Structural checks that parsing alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("package name must not be empty".to_string());
        }
        if self.name.contains('.') {
            errors.push(format!("package name '{}' must not contain '.'", self.name));
        }

        let mut seen = HashSet::new();
        for descriptor in &self.components {
            if descriptor.name.trim().is_empty() {
                errors.push("component name must not be empty".to_string());
                continue;
            }
            if !seen.insert(descriptor.name.as_str()) {
                errors.push(format!("duplicate component name '{}'", descriptor.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid {
                package: self.name.clone(),
                problems: errors,
            })
        }
    }
}

/// Errors produced while reading a manifest document.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid manifest for package '{package}': {}", problems.join("; "))]
    Invalid {
        package: String,
        problems: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// On-disk document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct ProjectSection {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PorticoSection {
    #[serde(default)]
    component: Option<PackageManifest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ToolSection {
    #[serde(default)]
    portico: Option<PorticoSection>,
}

/// Parsed `portico.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestDocument {
    #[serde(default)]
    project: Option<ProjectSection>,
    #[serde(default)]
    tool: Option<ToolSection>,
}

impl ManifestDocument {
    /// Parse a manifest document.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] on TOML syntax or schema errors.
    pub fn from_toml_str(text: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(text)?)
    }

    /// Declared `[project].name`, if any.
    #[must_use]
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref()?.name.as_deref()
    }

    /// Whether the document carries the `[tool.portico.component]` marker.
    #[must_use]
    pub fn has_component_section(&self) -> bool {
        self.component().is_some()
    }

    #[must_use]
    pub fn component(&self) -> Option<&PackageManifest> {
        self.tool.as_ref()?.portico.as_ref()?.component.as_ref()
    }

    /// Take the component section, validating it.
    ///
    /// Returns `Ok(None)` for documents without the marker.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Invalid`] if the section fails validation.
    pub fn into_component_manifest(self) -> Result<Option<PackageManifest>, ManifestError> {
        let Some(manifest) = self.tool.and_then(|t| t.portico).and_then(|p| p.component) else {
            return Ok(None);
        };
        manifest.validate()?;
        Ok(Some(manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[project]
name = "acme-charts"

[tool.portico.component]
name = "acme_charts"
version = "1.2.0"
security = { network = "none", iframe = false }

[[tool.portico.component.components]]
name = "sparkline"
html = "<div class='spark'></div>"
js = "dist/index-*.js"
css = "dist/style.css"

[[tool.portico.component.components]]
name = "gauge"
js = "gauge.js"
"#;

    #[test]
    fn parses_component_section() {
        let doc = ManifestDocument::from_toml_str(SAMPLE).unwrap();
        assert_eq!(doc.project_name(), Some("acme-charts"));
        assert!(doc.has_component_section());

        let manifest = doc.into_component_manifest().unwrap().unwrap();
        assert_eq!(manifest.name, "acme_charts");
        assert_eq!(manifest.version, "1.2.0");
        assert_eq!(manifest.components.len(), 2);
        assert_eq!(manifest.components[0].js.as_deref(), Some("dist/index-*.js"));
        assert_eq!(manifest.components[1].html, None);
        assert_eq!(manifest.security["network"], serde_json::json!("none"));
        assert_eq!(manifest.security["iframe"], serde_json::json!(false));
        assert_eq!(
            manifest.component_key(&manifest.components[0]).as_str(),
            "acme_charts.sparkline"
        );
    }

    #[test]
    fn security_requirements_alias() {
        let text = r#"
[tool.portico.component]
name = "p"
version = "0.1.0"
security_requirements = { sandbox = "strict" }
"#;
        let manifest = ManifestDocument::from_toml_str(text)
            .unwrap()
            .into_component_manifest()
            .unwrap()
            .unwrap();
        assert_eq!(manifest.security["sandbox"], serde_json::json!("strict"));
        assert!(manifest.components.is_empty());
    }

    #[test]
    fn document_without_marker_is_not_a_component_package() {
        let doc = ManifestDocument::from_toml_str("[project]\nname = \"requests\"\n").unwrap();
        assert!(!doc.has_component_section());
        assert!(doc.into_component_manifest().unwrap().is_none());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = ManifestDocument::from_toml_str("[tool.portico.component\nname=").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
        assert!(err.to_string().contains("malformed manifest"));
    }

    #[test]
    fn duplicate_and_dotted_names_rejected() {
        let manifest = PackageManifest {
            name: "bad.name".into(),
            version: "1".into(),
            components: vec![
                ComponentDescriptor { name: "a".into(), html: None, css: None, js: None },
                ComponentDescriptor { name: "a".into(), html: None, css: None, js: None },
            ],
            security: SecurityRequirements::new(),
        };
        let msg = manifest.validate().unwrap_err().to_string();
        assert!(msg.contains("must not contain '.'"), "got: {msg}");
        assert!(msg.contains("duplicate component name 'a'"), "got: {msg}");
    }
}
