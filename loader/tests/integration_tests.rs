use std::path::{Path, PathBuf};

use raml_shapes_core::ShapeError;
use raml_shapes_loader::{LoaderConfig, LoaderError, SchemaConfig, ShapeRegistry, read_document};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write(dir: &Path, file: &str, contents: &str) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, contents).unwrap();
    path
}

const SHAPES: &str = r#"#%RAML 1.0 Library
types:
  Shape:
    properties:
      kind: string
    discriminator: kind
  Circle:
    type: Shape
    properties:
      radius:
        type: number
        minimum: 0
  Tree:
    properties:
      label: string
      children?: Tree[]
"#;

// ---------------------------------------------------------------------------
// Directory loading
// ---------------------------------------------------------------------------

#[test]
fn test_directory_loading_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let types = dir.path().join("types");
    std::fs::create_dir_all(&types).unwrap();
    write(&types, "shapes.raml", SHAPES);
    write(&types, "ignored.json", r#"{"types": {"Ignored": "string"}}"#);

    let config_path = write(
        dir.path(),
        "raml-shapes.yml",
        "library_extensions: [raml]\nschema:\n  id_base: \"urn:shapes:\"\n",
    );
    let config = LoaderConfig::load(&config_path).unwrap();

    let mut registry = ShapeRegistry::load(&types, &config).unwrap();
    assert!(registry.is_resolved());
    assert_eq!(registry.types().collect::<Vec<_>>(), vec!["Shape", "Circle", "Tree"]);
    assert!(!registry.contains("Ignored"));

    registry
        .validate_value("Circle", &json!({"kind": "Circle", "radius": 2.5}))
        .unwrap();
    let err = registry
        .validate_value("Circle", &json!({"kind": "Circle", "radius": -1}))
        .unwrap_err();
    assert!(matches!(
        err,
        LoaderError::ShapeError(ref e) if matches!(e.root(), ShapeError::ValueValidationFailure { .. })
    ));
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

#[test]
fn test_recursive_library_type_converts() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "shapes.yaml", SHAPES);

    let mut registry = ShapeRegistry::load(&path, &LoaderConfig::default()).unwrap();
    let schema = registry.to_json_schema("Tree", &SchemaConfig::default()).unwrap();
    let schema = serde_json::to_value(schema).unwrap();

    assert_eq!(schema["$ref"], json!("#/definitions/Tree"));
    assert_eq!(
        schema["definitions"]["Tree"]["properties"]["children"]["items"],
        json!({"$ref": "#/definitions/Tree"})
    );

    registry
        .validate_value("Tree", &json!({"label": "root", "children": [{"label": "leaf"}]}))
        .unwrap();
    assert!(registry
        .validate_value("Tree", &json!({"label": "root", "children": [{"name": "leaf"}]}))
        .is_err());
}

#[test]
fn test_value_documents() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = write(dir.path(), "value.yaml", "label: root\nchildren: []\n");
    let json = write(dir.path(), "value.json", r#"{"label": "root"}"#);

    assert_eq!(read_document(&yaml).unwrap(), json!({"label": "root", "children": []}));
    assert_eq!(read_document(&json).unwrap(), json!({"label": "root"}));
    assert!(matches!(
        read_document(dir.path().join("missing.json")),
        Err(LoaderError::IoError(_))
    ));
}
