//! Manifest document parsing
//!
//! The manifest declares which tables to export, in which seed order, and
//! the variables available to custom extraction queries:
//!
//! ```yaml
//! vars:
//!   min_id: 100
//! tables:
//!   - table: users
//!     query: SELECT * FROM users WHERE id > ${min_id}
//!     post_actions:
//!       - SELECT setval('users_id_seq', (SELECT max(id) FROM users))
//!   - table: orders
//!     columns: [id, user_id, total]
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::table::TableSpec;

/// Variables for query templating (immutable after load)
pub type ManifestVariables = BTreeMap<String, String>;

/// Declarative description of the export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Template variables
    #[serde(default, deserialize_with = "deserialize_vars")]
    pub vars: ManifestVariables,

    /// Tables in document order (duplicates allowed)
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

impl Manifest {
    /// Load manifest from file
    ///
    /// The format is picked from the extension: `.json` and `.toml` are
    /// parsed as such, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        let manifest = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents)?,
            Some("toml") => Self::from_toml(&contents)?,
            _ => Self::from_yaml(&contents)?,
        };

        tracing::debug!(
            file = %path.display(),
            tables = manifest.tables.len(),
            vars = manifest.vars.len(),
            "loaded manifest"
        );

        Ok(manifest)
    }

    /// Parse manifest from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ManifestError> {
        // An empty document is an empty manifest
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let manifest: Manifest = serde_yaml::from_str(yaml)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse manifest from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse manifest from a TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(toml)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check constraints serde cannot express
    fn validate(&self) -> Result<(), ManifestError> {
        for (index, table) in self.tables.iter().enumerate() {
            if table.name.trim().is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "table entry #{} has an empty name",
                    index + 1
                )));
            }
        }
        Ok(())
    }

    /// Table names in document order, duplicates included
    pub fn seed_order(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Table specs keyed by name; later entries replace earlier ones
    pub fn registered(&self) -> HashMap<String, TableSpec> {
        let mut specs = HashMap::with_capacity(self.tables.len());
        for table in &self.tables {
            if specs.insert(table.name.clone(), table.clone()).is_some() {
                tracing::debug!(table = %table.name, "duplicate manifest entry, last one wins");
            }
        }
        specs
    }
}

/// Scalar accepted as a variable value
#[derive(Deserialize)]
#[serde(untagged)]
enum VarValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl From<VarValue> for String {
    fn from(value: VarValue) -> Self {
        match value {
            VarValue::String(s) => s,
            VarValue::Bool(b) => b.to_string(),
            VarValue::Int(i) => i.to_string(),
            VarValue::Float(f) => f.to_string(),
        }
    }
}

fn deserialize_vars<'de, D>(deserializer: D) -> Result<ManifestVariables, D::Error>
where
    D: Deserializer<'de>,
{
    // A null value (`key: ~` or `key:`) is an empty string
    let raw: Option<BTreeMap<String, Option<VarValue>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.map(String::from).unwrap_or_default()))
        .collect())
}

/// Manifest loading errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest: {0}")]
    ParseError(String),

    #[error("Invalid manifest: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
vars:
  schema: public
  min_id: 100
  enabled: true
tables:
  - table: users
    query: SELECT * FROM ${schema}.users WHERE id > ${min_id}
    post_actions:
      - SELECT setval('users_id_seq', 1000)
  - table: orders
    columns: [id, user_id, total]
"#;

    #[test]
    fn parse_yaml_manifest() {
        let manifest = Manifest::from_yaml(SAMPLE).unwrap();

        assert_eq!(manifest.vars["schema"], "public");
        assert_eq!(manifest.vars["min_id"], "100");
        assert_eq!(manifest.vars["enabled"], "true");

        assert_eq!(manifest.seed_order(), vec!["users", "orders"]);

        let users = &manifest.tables[0];
        assert_eq!(
            users.extraction_query(),
            Some("SELECT * FROM ${schema}.users WHERE id > ${min_id}")
        );
        assert_eq!(users.post_actions.len(), 1);
        assert!(users.columns.is_empty());

        let orders = &manifest.tables[1];
        assert_eq!(orders.columns, vec!["id", "user_id", "total"]);
        assert!(orders.extraction_query().is_none());
    }

    #[test]
    fn duplicate_tables_last_write_wins() {
        let yaml = r#"
tables:
  - table: users
    query: SELECT 1
  - table: orders
  - table: users
    query: SELECT 2
"#;
        let manifest = Manifest::from_yaml(yaml).unwrap();

        assert_eq!(manifest.seed_order(), vec!["users", "orders", "users"]);

        let registered = manifest.registered();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered["users"].query, "SELECT 2");
    }

    #[test]
    fn empty_document_is_empty_manifest() {
        let manifest = Manifest::from_yaml("").unwrap();
        assert!(manifest.tables.is_empty());
        assert!(manifest.vars.is_empty());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let yaml = r#"
tables:
  - table: users
    qurey: SELECT 1
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ManifestError::ParseError(_)));
    }

    #[test]
    fn blank_table_name_is_rejected() {
        let yaml = r#"
tables:
  - table: "  "
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn null_vars_are_empty_strings() {
        let yaml = r#"
vars:
  tilde: ~
  blank:
  set: x
"#;
        let manifest = Manifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.vars["tilde"], "");
        assert_eq!(manifest.vars["blank"], "");
        assert_eq!(manifest.vars["set"], "x");
    }

    #[test]
    fn nested_var_is_rejected() {
        let yaml = r#"
vars:
  nested:
    a: b
"#;
        assert!(Manifest::from_yaml(yaml).is_err());
    }

    #[test]
    fn parse_json_and_toml() {
        let json = r#"{"vars": {"t": "orders"}, "tables": [{"table": "orders", "columns": ["id"]}]}"#;
        let manifest = Manifest::from_json(json).unwrap();
        assert_eq!(manifest.vars["t"], "orders");
        assert_eq!(manifest.tables[0].columns, vec!["id"]);

        let toml = r#"
[vars]
t = "orders"

[[tables]]
table = "orders"
post_actions = ["ANALYZE orders"]
"#;
        let manifest = Manifest::from_toml(toml).unwrap();
        assert_eq!(manifest.tables[0].post_actions, vec!["ANALYZE orders"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Manifest::from_file(Path::new("/nonexistent/manifest.yaml")).unwrap_err();
        assert!(matches!(err, ManifestError::IoError(_, _)));
    }

    #[test]
    fn load_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("manifest.yaml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(SAMPLE.as_bytes())
            .unwrap();
        let manifest = Manifest::from_file(&path).unwrap();
        assert_eq!(manifest.tables.len(), 2);

        let path = dir.path().join("manifest.json");
        std::fs::write(&path, r#"{"tables": [{"table": "a"}]}"#).unwrap();
        let manifest = Manifest::from_file(&path).unwrap();
        assert_eq!(manifest.seed_order(), vec!["a"]);
    }
}
