//! Per-table export configuration

use serde::{Deserialize, Serialize};

/// Export configuration for a single table
///
/// Tables listed in the manifest carry whatever the document says. Tables
/// discovered only as a foreign-key dependency are synthesized with
/// [`TableSpec::new`] and have everything but the name empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    /// Relation name, optionally schema-qualified (e.g. "public.users")
    #[serde(rename = "table")]
    pub name: String,

    /// Custom extraction query; empty means the whole table
    #[serde(default)]
    pub query: String,

    /// Explicit column list; resolved from the live schema when empty
    #[serde(default)]
    pub columns: Vec<String>,

    /// Raw statements emitted right after the table's data block
    #[serde(default)]
    pub post_actions: Vec<String>,
}

impl TableSpec {
    /// Create a spec with only a name (used for implicitly discovered tables)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the extraction query
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Set an explicit column list
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append a post action
    pub fn with_post_action(mut self, action: impl Into<String>) -> Self {
        self.post_actions.push(action.into());
        self
    }

    /// The extraction query, if one is configured
    pub fn extraction_query(&self) -> Option<&str> {
        if self.query.trim().is_empty() {
            None
        } else {
            Some(&self.query)
        }
    }

    /// Whether the column list still has to be looked up
    pub fn needs_columns(&self) -> bool {
        self.columns.is_empty()
    }
}
