//! Loader configuration.
//!
//! Controls which files of a directory are read as libraries, whether the
//! loaded types are resolved and validated, and how JSON Schema output is
//! identified.
//!
//! # Example YAML
//!
//! ```yaml
//! unwrap: true
//! validate: true
//! schema:
//!   id_base: "https://example.com/schemas/"
//!   include_definitions: false
//! library_extensions:
//!   - raml
//!   - yaml
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// JSON Schema output settings.
///
/// # Examples
///
/// ```
/// # use raml_shapes_loader::SchemaConfig;
/// let schema = SchemaConfig {
///     id_base: Some("https://example.com/schemas/".into()),
///     include_definitions: true,
/// };
/// assert_eq!(schema.id_for("Person").as_deref(), Some("https://example.com/schemas/Person"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Prefix of the root `$id`; the type name is appended.
    pub id_base: Option<String>,
    /// Emit every declared type under `definitions`, referenced by `$ref`.
    pub include_definitions: bool,
}

impl SchemaConfig {
    pub fn id_for(&self, type_name: &str) -> Option<String> {
        self.id_base.as_ref().map(|base| format!("{base}{type_name}"))
    }
}

/// Top-level loader configuration.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// # Examples
///
/// ```no_run
/// use raml_shapes_loader::LoaderConfig;
///
/// let config = LoaderConfig::load("raml-shapes.yml").unwrap();
/// if config.validate {
///     println!("libraries will be validated after loading");
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Resolve every declaration after loading.
    pub unwrap: bool,
    /// Run the consistency and example sweep after loading.
    pub validate: bool,
    pub schema: SchemaConfig,
    /// File extensions read when loading a directory.
    pub library_extensions: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            unwrap: true,
            validate: true,
            schema: SchemaConfig::default(),
            library_extensions: vec!["raml".into(), "yaml".into(), "yml".into(), "json".into()],
        }
    }
}

impl LoaderConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoaderError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::LoaderError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoaderError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::LoaderError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Returns `true` if `path` has one of the configured library
    /// extensions (compared case-insensitively).
    ///
    /// # Examples
    ///
    /// ```
    /// # use raml_shapes_loader::LoaderConfig;
    /// let config = LoaderConfig::default();
    /// assert!(config.is_library("types/common.raml"));
    /// assert!(config.is_library("types/COMMON.YAML"));
    /// assert!(!config.is_library("README.md"));
    /// ```
    pub fn is_library(&self, path: impl AsRef<Path>) -> bool {
        let Some(extension) = path.as_ref().extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.library_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
unwrap: false
validate: true
schema:
  id_base: "urn:types:"
  include_definitions: true
library_extensions:
  - raml
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: LoaderConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert!(!config.unwrap);
        assert!(config.validate);
        assert_eq!(config.schema.id_base.as_deref(), Some("urn:types:"));
        assert!(config.schema.include_definitions);
        assert_eq!(config.library_extensions, vec!["raml"]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: LoaderConfig = serde_yaml::from_str("validate: false\n").unwrap();
        assert!(config.unwrap);
        assert!(!config.validate);
        assert_eq!(config.schema, SchemaConfig::default());
        assert_eq!(config.library_extensions, LoaderConfig::default().library_extensions);
    }

    #[test]
    fn test_is_library() {
        let config: LoaderConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert!(config.is_library("lib.raml"));
        assert!(!config.is_library("lib.yaml"));
        assert!(!config.is_library("raml"));
    }

    #[test]
    fn test_id_for() {
        let config: LoaderConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.schema.id_for("Person").as_deref(), Some("urn:types:Person"));
        assert_eq!(SchemaConfig::default().id_for("Person"), None);
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");

        let original: LoaderConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = LoaderConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
