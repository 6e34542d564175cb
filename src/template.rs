//! Style template registry.
//!
//! A template is a global declaration block for the content container plus
//! per-selector declaration blocks. Three built-ins ship with the crate;
//! custom templates can be created, imported, exported, and deleted.
//! Built-ins are immutable and always present.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::css::Stylesheet;
use crate::error::{Error, Result};

pub const DEFAULT_TEMPLATE: &str = "minimal";

/// Style payload of a template: the container-wide declarations and the
/// per-selector declaration blocks, in definition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStyles {
    pub global: String,
    pub selectors: Vec<(String, String)>,
}

impl TemplateStyles {
    /// Build the stylesheet the cascade resolver matches against.
    pub fn stylesheet(&self) -> Stylesheet {
        Stylesheet::from_selector_styles(
            self.selectors.iter().map(|(s, d)| (s.as_str(), d.as_str())),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub styles: TemplateStyles,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub imported: bool,
}

/// Exchange format for template export/import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateExport {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub styles: TemplateStyles,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    current: String,
    next_id: u64,
    custom_templates: IndexMap<String, Template>,
}

/// Registry of built-in and user templates with a current selection.
pub struct TemplateRegistry {
    templates: IndexMap<String, Template>,
    current: String,
    next_id: u64,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    pub fn new() -> Self {
        let mut templates = IndexMap::new();
        for (key, template) in builtin_templates() {
            templates.insert(key.to_string(), template);
        }
        Self {
            templates,
            current: DEFAULT_TEMPLATE.to_string(),
            next_id: 0,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    /// Resolve a key to a template, falling back to `minimal` for unknown
    /// keys so adaptation always has styles to work with.
    pub fn resolve(&self, key: &str) -> &Template {
        self.templates
            .get(key)
            .unwrap_or_else(|| &self.templates[DEFAULT_TEMPLATE])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|k| k.as_str())
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Select the current template. Unknown keys are rejected.
    pub fn set_current(&mut self, key: &str) -> bool {
        if self.templates.contains_key(key) {
            self.current = key.to_string();
            true
        } else {
            false
        }
    }

    /// Register a custom template under a generated `custom_*` key.
    pub fn create_custom(&mut self, name: &str, styles: TemplateStyles) -> String {
        let key = format!("custom_{}", self.next_id());
        self.templates.insert(
            key.clone(),
            Template {
                name: name.to_string(),
                description: "Custom template".to_string(),
                styles,
                custom: true,
                imported: false,
            },
        );
        key
    }

    /// Import a previously exported template under an `imported_*` key.
    pub fn import(&mut self, data: TemplateExport) -> Result<String> {
        if data.name.is_empty() {
            return Err(Error::InvalidTemplate("missing template name".to_string()));
        }
        let key = format!("imported_{}", self.next_id());
        self.templates.insert(
            key.clone(),
            Template {
                name: data.name,
                description: if data.description.is_empty() {
                    "Imported template".to_string()
                } else {
                    data.description
                },
                styles: data.styles,
                custom: true,
                imported: true,
            },
        );
        Ok(key)
    }

    pub fn export(&self, key: &str) -> Option<TemplateExport> {
        let template = self.get(key)?;
        Some(TemplateExport {
            name: template.name.clone(),
            description: template.description.clone(),
            styles: template.styles.clone(),
            version: "1.0.0".to_string(),
        })
    }

    /// Delete a custom template. Built-ins cannot be deleted. If the
    /// deleted template was current, selection resets to `minimal`.
    pub fn delete(&mut self, key: &str) -> bool {
        let is_custom = self.templates.get(key).is_some_and(|t| t.custom);
        if !is_custom {
            return false;
        }
        self.templates.shift_remove(key);
        if self.current == key {
            self.current = DEFAULT_TEMPLATE.to_string();
        }
        true
    }

    /// Persist the current selection and custom templates as JSON.
    /// Built-ins are never serialized.
    pub fn serialize(&self) -> Result<String> {
        let state = PersistedState {
            current: self.current.clone(),
            next_id: self.next_id,
            custom_templates: self
                .templates
                .iter()
                .filter(|(_, t)| t.custom)
                .map(|(k, t)| (k.clone(), t.clone()))
                .collect(),
        };
        Ok(serde_json::to_string(&state)?)
    }

    /// Restore a registry from a persistence blob produced by
    /// [`serialize`](Self::serialize).
    pub fn deserialize(blob: &str) -> Result<Self> {
        let state: PersistedState = serde_json::from_str(blob)?;
        let mut registry = Self::new();
        for (key, template) in state.custom_templates {
            registry.templates.insert(key, template);
        }
        registry.next_id = state.next_id;
        if registry.templates.contains_key(&state.current) {
            registry.current = state.current;
        }
        Ok(registry)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn builtin_templates() -> Vec<(&'static str, Template)> {
    vec![
        (
            "minimal",
            Template {
                name: "Minimal".to_string(),
                description: "Clean and simple, for everyday articles".to_string(),
                styles: TemplateStyles {
                    global: "font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; font-size: 16px; line-height: 1.6; color: #333; max-width: 100%; margin: 0; padding: 20px".to_string(),
                    selectors: vec![
                        (
                            "h1, h2, h3, h4, h5, h6".to_string(),
                            "color: #2c3e50; margin: 1.2em 0 0.8em 0; font-weight: 600".to_string(),
                        ),
                        (
                            "h1".to_string(),
                            "font-size: 1.8em; border-bottom: 2px solid #3498db; padding-bottom: 0.3em".to_string(),
                        ),
                        (
                            "h2".to_string(),
                            "font-size: 1.5em; border-bottom: 1px solid #bdc3c7; padding-bottom: 0.2em".to_string(),
                        ),
                        ("h3".to_string(), "font-size: 1.3em".to_string()),
                        ("p".to_string(), "margin: 0.8em 0; line-height: 1.7".to_string()),
                        (
                            "blockquote".to_string(),
                            "border-left: 4px solid #3498db; background-color: #f8f9fa; padding: 0.8em 1.2em; margin: 1em 0; font-style: italic; color: #555".to_string(),
                        ),
                        (
                            "code".to_string(),
                            "background-color: #f1f2f6; padding: 0.2em 0.4em; border-radius: 3px; font-family: Monaco, Consolas, monospace; font-size: 0.9em; color: #e74c3c".to_string(),
                        ),
                        (
                            "pre".to_string(),
                            "background-color: #2c3e50; color: #ecf0f1; padding: 1em; border-radius: 5px; overflow-x: auto; margin: 1em 0".to_string(),
                        ),
                        (
                            "pre code".to_string(),
                            "background-color: transparent; color: inherit; padding: 0".to_string(),
                        ),
                    ],
                },
                custom: false,
                imported: false,
            },
        ),
        (
            "tech",
            Template {
                name: "Tech".to_string(),
                description: "Modern and precise, for technical writing".to_string(),
                styles: TemplateStyles {
                    global: "font-family: 'SF Pro Text', -apple-system, BlinkMacSystemFont, Roboto, sans-serif; font-size: 15px; line-height: 1.6; color: #24292e; max-width: 100%; margin: 0; padding: 20px; background-color: #ffffff".to_string(),
                    selectors: vec![
                        (
                            "h1, h2, h3, h4, h5, h6".to_string(),
                            "color: #1a202c; margin: 1.5em 0 0.8em 0; font-weight: 700".to_string(),
                        ),
                        (
                            "h1".to_string(),
                            "font-size: 2em; border-bottom: 3px solid #4299e1; padding-bottom: 0.3em".to_string(),
                        ),
                        (
                            "h2".to_string(),
                            "font-size: 1.6em; border-bottom: 2px solid #68d391; padding-bottom: 0.2em".to_string(),
                        ),
                        ("h3".to_string(), "font-size: 1.3em; color: #2d3748".to_string()),
                        ("p".to_string(), "margin: 0.9em 0; line-height: 1.8".to_string()),
                        (
                            "blockquote".to_string(),
                            "border-left: 5px solid #4299e1; background: linear-gradient(90deg, #ebf8ff 0%, #ffffff 100%); padding: 1em 1.5em; margin: 1.2em 0; position: relative".to_string(),
                        ),
                        (
                            "code".to_string(),
                            "background-color: #edf2f7; border: 1px solid #e2e8f0; padding: 0.25em 0.5em; border-radius: 4px; font-family: 'SF Mono', Monaco, Consolas, monospace; font-size: 0.875em; color: #d73a49".to_string(),
                        ),
                        (
                            "pre".to_string(),
                            "background: linear-gradient(135deg, #1a202c 0%, #2d3748 100%); color: #f7fafc; padding: 1.2em; border-radius: 8px; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1); margin: 1.2em 0; overflow-x: auto".to_string(),
                        ),
                        (
                            "pre code".to_string(),
                            "background-color: transparent; border: none; color: inherit; padding: 0".to_string(),
                        ),
                    ],
                },
                custom: false,
                imported: false,
            },
        ),
        (
            "academic",
            Template {
                name: "Academic".to_string(),
                description: "Formal serif layout, for papers and essays".to_string(),
                styles: TemplateStyles {
                    global: "font-family: 'Times New Roman', Georgia, serif; font-size: 16px; line-height: 1.8; color: #2c3e50; max-width: 100%; margin: 0; padding: 30px".to_string(),
                    selectors: vec![
                        (
                            "h1, h2, h3, h4, h5, h6".to_string(),
                            "color: #34495e; margin: 2em 0 1em 0; font-weight: 600; text-align: center".to_string(),
                        ),
                        (
                            "h1".to_string(),
                            "font-size: 2.2em; border-bottom: 3px double #8e44ad; padding-bottom: 0.5em; margin-bottom: 1.5em".to_string(),
                        ),
                        (
                            "h2".to_string(),
                            "font-size: 1.8em; border-bottom: 1px solid #9b59b6; padding-bottom: 0.3em".to_string(),
                        ),
                        ("h3".to_string(), "font-size: 1.4em; font-style: italic".to_string()),
                        (
                            "p".to_string(),
                            "margin: 1.2em 0; line-height: 2; text-align: justify; text-indent: 2em".to_string(),
                        ),
                        (
                            "blockquote".to_string(),
                            "border-left: 4px solid #9b59b6; background-color: #faf5ff; padding: 1.2em 2em; margin: 1.5em 0; font-style: italic; position: relative".to_string(),
                        ),
                        (
                            "code".to_string(),
                            "background-color: #f8f8ff; border: 1px solid #e1e1e8; padding: 0.3em 0.6em; border-radius: 4px; font-family: 'Courier New', monospace; font-size: 0.9em; color: #6f42c1".to_string(),
                        ),
                        (
                            "pre".to_string(),
                            "background-color: #f8f8ff; border: 2px solid #e1e1e8; padding: 1.5em; border-radius: 8px; margin: 1.5em 0; font-family: 'Courier New', monospace; line-height: 1.6".to_string(),
                        ),
                        ("ul, ol".to_string(), "padding-left: 2em; margin: 1em 0".to_string()),
                        ("li".to_string(), "margin: 0.5em 0; line-height: 1.8".to_string()),
                    ],
                },
                custom: false,
                imported: false,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_styles() -> TemplateStyles {
        TemplateStyles {
            global: "font-size: 14px".to_string(),
            selectors: vec![("h1".to_string(), "color: #111".to_string())],
        }
    }

    #[test]
    fn test_builtins_present() {
        let registry = TemplateRegistry::new();
        for key in ["minimal", "tech", "academic"] {
            assert!(registry.get(key).is_some(), "missing builtin {key}");
        }
        assert_eq!(registry.current(), "minimal");
    }

    #[test]
    fn test_unknown_key_resolves_to_minimal() {
        let registry = TemplateRegistry::new();
        let resolved = registry.resolve("does-not-exist");
        assert_eq!(resolved.name, "Minimal");
    }

    #[test]
    fn test_custom_lifecycle() {
        let mut registry = TemplateRegistry::new();
        let key = registry.create_custom("Mine", sample_styles());
        assert!(key.starts_with("custom_"));
        assert!(registry.set_current(&key));
        assert_eq!(registry.current(), key);

        assert!(registry.delete(&key));
        assert_eq!(registry.current(), "minimal");
        assert!(registry.get(&key).is_none());
    }

    #[test]
    fn test_builtins_immutable() {
        let mut registry = TemplateRegistry::new();
        assert!(!registry.delete("minimal"));
        assert!(registry.get("minimal").is_some());
    }

    #[test]
    fn test_generated_keys_unique() {
        let mut registry = TemplateRegistry::new();
        let a = registry.create_custom("A", sample_styles());
        let b = registry.create_custom("B", sample_styles());
        assert_ne!(a, b);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut registry = TemplateRegistry::new();
        let key = registry.create_custom("Mine", sample_styles());
        let exported = registry.export(&key).unwrap();

        let imported_key = registry.import(exported).unwrap();
        assert!(imported_key.starts_with("imported_"));
        let template = registry.get(&imported_key).unwrap();
        assert_eq!(template.name, "Mine");
        assert!(template.imported);
    }

    #[test]
    fn test_import_rejects_nameless() {
        let mut registry = TemplateRegistry::new();
        let result = registry.import(TemplateExport {
            name: String::new(),
            description: String::new(),
            styles: sample_styles(),
            version: "1.0.0".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let mut registry = TemplateRegistry::new();
        let key = registry.create_custom("Persisted", sample_styles());
        registry.set_current(&key);

        let blob = registry.serialize().unwrap();
        let restored = TemplateRegistry::deserialize(&blob).unwrap();

        assert_eq!(restored.current(), key);
        assert_eq!(restored.get(&key).unwrap().name, "Persisted");
        // Builtins come back even though they are not in the blob
        assert!(restored.get("tech").is_some());
    }

    #[test]
    fn test_stylesheet_from_template() {
        let registry = TemplateRegistry::new();
        let sheet = registry.get("minimal").unwrap().styles.stylesheet();
        assert!(!sheet.is_empty());
        assert!(sheet.rules.iter().any(|r| r.selector_text == "h1"));
    }
}
