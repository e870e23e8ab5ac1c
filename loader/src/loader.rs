//! Type library loading from files and directories.
//!
//! Provides [`ShapeRegistry`], which reads one or more library documents
//! into a single [`TypeLibrary`], resolves and validates it, and answers
//! conversion and validation requests by type name.
//!
//! # Loading patterns
//!
//! ```no_run
//! use raml_shapes_loader::{LoaderConfig, ShapeRegistry};
//!
//! // A single library file (YAML, RAML or JSON)
//! let mut registry = ShapeRegistry::from_file("types/common.raml").unwrap();
//! registry.process(&LoaderConfig::default()).unwrap();
//!
//! // Every library file of a directory, processed per configuration
//! let config = LoaderConfig::load("raml-shapes.yml").unwrap();
//! let mut registry = ShapeRegistry::load("types/", &config).unwrap();
//! let schema = registry.to_json_schema("Person", &config.schema).unwrap();
//! ```

use std::collections::HashMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use raml_shapes_core::{Definitions, JsonSchemaConverter, Location, Schema, Shape, TypeLibrary};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{LoaderConfig, SchemaConfig};
use crate::error::{LoaderError, Result};

/// Describes where a [`ShapeRegistry`] was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub enum LibrarySource {
    /// A single library document.
    File(PathBuf),
    /// Every library document of a directory.
    Directory(PathBuf),
}

/// Declared types loaded from library documents.
///
/// Types are resolved lazily on the first request that needs them, or
/// eagerly by [`process`](Self::process).
///
/// # Examples
///
/// ```no_run
/// use raml_shapes_loader::ShapeRegistry;
/// use serde_json::json;
///
/// let mut registry = ShapeRegistry::from_file("types/common.raml").unwrap();
/// println!("Loaded {} types", registry.len());
///
/// for name in registry.types() {
///     println!("  {}", name);
/// }
/// registry.validate_value("Person", &json!({"name": "Ada"})).unwrap();
/// ```
#[derive(Debug)]
pub struct ShapeRegistry {
    library: TypeLibrary,
    definitions: Definitions,
    resolved: bool,
    source: LibrarySource,
}

impl ShapeRegistry {
    /// Loads `path`, a file or a directory, then resolves and validates it
    /// as configured.
    pub fn load(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut registry = if path.is_dir() {
            Self::from_dir(path, config)?
        } else {
            Self::from_file(path)?
        };
        registry.process(config)?;
        Ok(registry)
    }

    /// Loads a single library document.
    ///
    /// Files with a `.json` extension are parsed as JSON, everything else as
    /// YAML.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::IoError`] if the file cannot be read,
    /// [`LoaderError::JsonError`] or [`LoaderError::YamlError`] if it does not
    /// parse, [`LoaderError::InvalidDocument`] if its root is not a map, and
    /// [`LoaderError::ShapeError`] if a declaration cannot be built.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let library = read_library(path)?;
        info!(file = %path.display(), types = library.types.len(), "Loaded type library");
        Ok(Self::new(library, LibrarySource::File(path.to_path_buf())))
    }

    /// Loads every library document of a directory into one library.
    ///
    /// Only files accepted by [`LoaderConfig::is_library`] are read, in file
    /// name order.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::DuplicateType`] or
    /// [`LoaderError::DuplicateAnnotationType`] if two files declare the same
    /// type or annotation type and [`LoaderError::NoLibraries`] if no file
    /// matched, plus the
    /// errors of [`from_file`](Self::from_file).
    pub fn from_dir(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() && config.is_library(&file_path) {
                files.push(file_path);
            } else {
                debug!(file = %file_path.display(), "Skipping non-library entry");
            }
        }
        if files.is_empty() {
            return Err(LoaderError::NoLibraries(path.to_path_buf()));
        }
        files.sort();

        let mut merged = TypeLibrary::new(Location::new(path.display().to_string()));
        let mut origins: HashMap<String, PathBuf> = HashMap::new();
        let mut annotation_origins: HashMap<String, PathBuf> = HashMap::new();
        for file in files {
            let library = read_library(&file)?;
            for (name, shape) in library.types {
                if let Some(first) = origins.get(&name) {
                    return Err(LoaderError::DuplicateType {
                        name,
                        first: first.clone(),
                        second: file,
                    });
                }
                origins.insert(name, file.clone());
                merged.add_type(shape);
            }
            for (name, shape) in library.annotation_types {
                if let Some(first) = annotation_origins.get(&name) {
                    return Err(LoaderError::DuplicateAnnotationType {
                        name,
                        first: first.clone(),
                        second: file,
                    });
                }
                annotation_origins.insert(name, file.clone());
                merged.add_annotation_type(shape);
            }
        }

        info!(
            dir = %path.display(),
            types = merged.types.len(),
            annotation_types = merged.annotation_types.len(),
            "Loaded type libraries"
        );
        Ok(Self::new(merged, LibrarySource::Directory(path.to_path_buf())))
    }

    fn new(library: TypeLibrary, source: LibrarySource) -> Self {
        Self {
            library,
            definitions: Definitions::new(),
            resolved: false,
            source,
        }
    }

    /// Validates and resolves the library as `config` asks.
    ///
    /// Validation runs first, against the declarations as loaded.
    pub fn process(&mut self, config: &LoaderConfig) -> Result<()> {
        if config.validate {
            let checked = self.library.validate_shapes()?;
            debug!(shapes = checked.len(), "Validated type library");
        }
        if config.unwrap {
            self.resolve()?;
        }
        Ok(())
    }

    /// Replaces every declaration with its resolved form. Idempotent.
    pub fn resolve(&mut self) -> Result<()> {
        if !self.resolved {
            self.definitions = self.library.unwrap_all()?;
            self.resolved = true;
            debug!(definitions = self.definitions.len(), "Resolved type library");
        }
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn library(&self) -> &TypeLibrary {
        &self.library
    }

    /// Returns the resolved declaration of `name`.
    pub fn resolved_type(&mut self, name: &str) -> Result<&Shape> {
        self.resolve()?;
        self.library
            .find_type(name)
            .ok_or_else(|| LoaderError::TypeNotFound(name.to_string()))
    }

    /// Converts the declared type `name` to a JSON Schema document.
    ///
    /// With [`SchemaConfig::include_definitions`] every declared type is
    /// emitted under `definitions` and the root refers to `name` by `$ref`.
    pub fn to_json_schema(&mut self, name: &str, config: &SchemaConfig) -> Result<Schema> {
        self.resolve()?;
        let shape = self
            .library
            .find_type(name)
            .ok_or_else(|| LoaderError::TypeNotFound(name.to_string()))?;

        let mut converter = JsonSchemaConverter::new().with_definitions(&self.definitions);
        if let Some(id) = config.id_for(name) {
            converter = converter.with_id(id);
        }
        if config.include_definitions {
            for declared in self.library.types.values() {
                converter.add_definition(declared)?;
            }
        }
        Ok(converter.convert(shape)?)
    }

    /// Validates `value` against the declared type `name`.
    pub fn validate_value(&mut self, name: &str, value: &Value) -> Result<()> {
        self.resolve()?;
        let shape = self
            .library
            .find_type(name)
            .ok_or_else(|| LoaderError::TypeNotFound(name.to_string()))?;
        shape.validate_with(value, "$", &self.definitions)?;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.library.find_type(name).is_some()
    }

    /// Returns the number of declared types.
    pub fn len(&self) -> usize {
        self.library.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.library.types.is_empty()
    }

    /// Returns an iterator over declared type names, in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.library.types.keys()
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &LibrarySource {
        &self.source
    }
}

/// Reads a JSON or YAML document into a generic node.
///
/// # Errors
///
/// Returns [`LoaderError::IoError`] if the file cannot be read, or
/// [`LoaderError::JsonError`] / [`LoaderError::YamlError`] if it does not
/// parse.
pub fn read_document(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let reader = BufReader::new(std::fs::File::open(path)?);
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let document = if is_json {
        serde_json::from_reader(reader)?
    } else {
        serde_yaml::from_reader(reader)?
    };
    Ok(document)
}

fn read_library(path: &Path) -> Result<TypeLibrary> {
    let document = read_document(path)?;
    if !document.is_object() {
        return Err(LoaderError::InvalidDocument {
            path: path.to_path_buf(),
            message: "the document root must be a map".to_string(),
        });
    }
    let location = Location::new(path.display().to_string());
    Ok(TypeLibrary::from_node(&document, &location)?)
}

#[cfg(test)]
mod tests {
    use raml_shapes_core::{ShapeError, ShapeKind};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    const PEOPLE: &str = r#"#%RAML 1.0 Library
types:
  Name:
    type: string
    minLength: 1
  Person:
    properties:
      name: Name
      age?:
        type: integer
        minimum: 0
"#;

    fn write(dir: &TempDir, file: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(file);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "people.raml", PEOPLE);

        let registry = ShapeRegistry::from_file(&path).unwrap();
        assert_eq!(registry.types().collect::<Vec<_>>(), vec!["Name", "Person"]);
        assert_eq!(registry.source(), &LibrarySource::File(path));
        assert!(!registry.is_resolved());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "ids.json", r#"{"types": {"Id": {"type": "integer"}}}"#);

        let mut registry = ShapeRegistry::from_file(&path).unwrap();
        assert_eq!(registry.resolved_type("Id").unwrap().kind(), ShapeKind::Integer);
    }

    #[test]
    fn test_non_map_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "list.yaml", "- a\n- b\n");
        assert!(matches!(
            ShapeRegistry::from_file(&path),
            Err(LoaderError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_from_dir_filters_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "people.raml", PEOPLE);
        write(&dir, "ids.json", r#"{"types": {"Id": "integer"}}"#);
        write(&dir, "notes.txt", "not a library");

        let registry = ShapeRegistry::from_dir(dir.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("Id"));
        assert!(registry.contains("Person"));
    }

    #[test]
    fn test_from_dir_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "a.yaml", "types:\n  Id: integer\n");
        write(&dir, "b.yaml", "types:\n  Id: string\n");

        let err = ShapeRegistry::from_dir(dir.path(), &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateType { ref name, .. } if name == "Id"));
    }

    #[test]
    fn test_from_dir_rejects_duplicate_annotation_types() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(&dir, "a.yaml", "annotationTypes:\n  deprecated: boolean\n");
        let second = write(&dir, "b.yaml", "annotationTypes:\n  deprecated: string\ntypes:\n  deprecated: string\n");

        let err = ShapeRegistry::from_dir(dir.path(), &LoaderConfig::default()).unwrap_err();
        let LoaderError::DuplicateAnnotationType { name, first: a, second: b } = err else {
            panic!("expected a duplicate annotation type, got {err:?}");
        };
        assert_eq!(name, "deprecated");
        assert_eq!((a, b), (first, second));
    }

    #[test]
    fn test_from_dir_without_libraries() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "notes.txt", "nothing here");
        assert!(matches!(
            ShapeRegistry::from_dir(dir.path(), &LoaderConfig::default()),
            Err(LoaderError::NoLibraries(_))
        ));
    }

    #[test]
    fn test_load_validates_examples() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "bad.yaml",
            "types:\n  Port:\n    type: integer\n    maximum: 10\n    example: 99\n",
        );

        let err = ShapeRegistry::load(&path, &LoaderConfig::default()).unwrap_err();
        let LoaderError::ShapeError(err) = err else {
            panic!("expected a shape error, got {err:?}");
        };
        assert!(matches!(err.root(), ShapeError::ValueValidationFailure { .. }));

        let lenient = LoaderConfig {
            validate: false,
            ..Default::default()
        };
        let registry = ShapeRegistry::load(&path, &lenient).unwrap();
        assert!(registry.is_resolved());
    }

    #[test]
    fn test_validate_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "people.raml", PEOPLE);
        let mut registry = ShapeRegistry::from_file(&path).unwrap();

        registry.validate_value("Person", &json!({"name": "Ada", "age": 36})).unwrap();
        assert!(registry.validate_value("Person", &json!({"name": ""})).is_err());
        assert!(matches!(
            registry.validate_value("Robot", &json!({})),
            Err(LoaderError::TypeNotFound(_))
        ));
    }

    #[test]
    fn test_to_json_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "people.raml", PEOPLE);
        let mut registry = ShapeRegistry::from_file(&path).unwrap();

        let config = SchemaConfig {
            id_base: Some("urn:people:".into()),
            include_definitions: false,
        };
        let schema = serde_json::to_value(registry.to_json_schema("Person", &config).unwrap()).unwrap();
        assert_eq!(schema["$id"], json!("urn:people:Person"));
        assert_eq!(schema["properties"]["name"]["minLength"], json!(1));
        assert_eq!(schema["required"], json!(["name"]));
        assert!(schema.get("definitions").is_none());

        let config = SchemaConfig {
            include_definitions: true,
            ..config
        };
        let schema = serde_json::to_value(registry.to_json_schema("Person", &config).unwrap()).unwrap();
        assert_eq!(schema["$ref"], json!("#/definitions/Person"));
        assert_eq!(
            schema["definitions"]["Person"]["properties"]["name"],
            json!({"$ref": "#/definitions/Name"})
        );
    }
}
