//! Query rendering
//!
//! Turns a table's extraction query into the source expression handed to
//! `COPY ... TO STDOUT`: either the bare table name, or the rendered query
//! wrapped in parentheses.

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use pgdd_manifest::{ManifestVariables, TableSpec};
use serde::{Deserialize, Serialize};

use crate::placeholder::substitute;

/// What to do with a placeholder whose variable is not defined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedPolicy {
    /// Render as an empty string
    #[default]
    Lenient,

    /// Fail with `TemplateError::UndefinedVariable`
    Strict,
}

/// Error during query rendering
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Template syntax error: {0}")]
    Syntax(String),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Template render error: {0}")]
    Render(String),
}

impl From<minijinja::Error> for TemplateError {
    fn from(error: minijinja::Error) -> Self {
        match error.kind() {
            ErrorKind::SyntaxError | ErrorKind::BadEscape => TemplateError::Syntax(error.to_string()),
            ErrorKind::UndefinedError => TemplateError::UndefinedVariable(error.to_string()),
            _ => TemplateError::Render(error.to_string()),
        }
    }
}

/// Template language used for extraction queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSyntax {
    /// `$name` / `${name}` placeholders
    #[default]
    Placeholder,

    /// Jinja expressions (`{{ name }}`), rendered with minijinja
    Jinja,
}

/// Renders extraction queries against the manifest variables
///
/// A query is parsed in exactly one syntax. Variable values are inserted
/// as plain text and never parsed again.
pub struct QueryRenderer {
    env: Environment<'static>,
    vars: ManifestVariables,
    policy: UndefinedPolicy,
    syntax: TemplateSyntax,
}

impl QueryRenderer {
    /// Create a renderer with the lenient undefined-variable policy
    pub fn new(vars: ManifestVariables) -> Self {
        Self::with_policy(vars, UndefinedPolicy::Lenient)
    }

    /// Create a renderer with an explicit undefined-variable policy
    pub fn with_policy(vars: ManifestVariables, policy: UndefinedPolicy) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(match policy {
            UndefinedPolicy::Lenient => UndefinedBehavior::Lenient,
            UndefinedPolicy::Strict => UndefinedBehavior::Strict,
        });

        Self {
            env,
            vars,
            policy,
            syntax: TemplateSyntax::default(),
        }
    }

    /// Switch the template language
    pub fn with_syntax(mut self, syntax: TemplateSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// Render a query template to plain SQL
    pub fn render(&self, query: &str) -> Result<String, TemplateError> {
        match self.syntax {
            TemplateSyntax::Placeholder => substitute(query, &self.vars, self.policy),
            TemplateSyntax::Jinja => Ok(self.env.render_str(query, &self.vars)?),
        }
    }

    /// Resolve the `COPY` source for a table
    ///
    /// Returns the bare table name, or the rendered query wrapped in
    /// parentheses when the table has an extraction query.
    pub fn copy_source(&self, table: &TableSpec) -> Result<String, TemplateError> {
        match table.extraction_query() {
            None => Ok(table.name.clone()),
            Some(query) => {
                let rendered = self.render(query)?;
                tracing::debug!(table = %table.name, query = %rendered, "rendered extraction query");
                Ok(format!("({})", rendered))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(pairs: &[(&str, &str)]) -> QueryRenderer {
        QueryRenderer::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn bare_table_name_without_query() {
        let r = renderer(&[]);
        let source = r.copy_source(&TableSpec::new("public.users")).unwrap();
        assert_eq!(source, "public.users");
    }

    #[test]
    fn query_is_rendered_and_wrapped() {
        let r = renderer(&[("t", "orders")]);
        let table = TableSpec::new("orders").with_query("SELECT * FROM $t WHERE id > 0");
        assert_eq!(r.copy_source(&table).unwrap(), "(SELECT * FROM orders WHERE id > 0)");
    }

    fn jinja_renderer(pairs: &[(&str, &str)]) -> QueryRenderer {
        renderer(pairs).with_syntax(TemplateSyntax::Jinja)
    }

    #[test]
    fn braces_in_sql_pass_through() {
        let r = renderer(&[]);
        let table = TableSpec::new("m").with_query("SELECT * FROM m WHERE grid = '{{1,2},{3,4}}'");
        assert_eq!(
            r.copy_source(&table).unwrap(),
            "(SELECT * FROM m WHERE grid = '{{1,2},{3,4}}')"
        );
    }

    #[test]
    fn substituted_values_are_not_reparsed() {
        let r = renderer(&[("p", "{#"), ("q", "{{ p }}")]);
        let out = r.render("SELECT * FROM m WHERE a LIKE '${p}%' AND b = '$q'").unwrap();
        assert_eq!(out, "SELECT * FROM m WHERE a LIKE '{#%' AND b = '{{ p }}'");
    }

    #[test]
    fn jinja_expressions_are_rendered() {
        let r = jinja_renderer(&[("t", "orders"), ("limit", "5")]);
        let out = r.render("SELECT * FROM {{ t }} LIMIT {{ limit }}").unwrap();
        assert_eq!(out, "SELECT * FROM orders LIMIT 5");
    }

    #[test]
    fn jinja_leaves_dollar_placeholders_alone() {
        let r = jinja_renderer(&[("t", "orders")]);
        let out = r.render("SELECT $t, $1 FROM {{ t }}").unwrap();
        assert_eq!(out, "SELECT $t, $1 FROM orders");
    }

    #[test]
    fn jinja_values_are_not_reparsed() {
        let r = jinja_renderer(&[("p", "{{ q }}{#")]);
        assert_eq!(r.render("SELECT '{{ p }}'").unwrap(), "SELECT '{{ q }}{#'");
    }

    #[test]
    fn jinja_undefined_is_lenient_by_default() {
        let r = jinja_renderer(&[]);
        assert_eq!(r.render("SELECT {{ missing }}1").unwrap(), "SELECT 1");
    }

    #[test]
    fn jinja_undefined_strict_fails() {
        let r = QueryRenderer::with_policy(Default::default(), UndefinedPolicy::Strict)
            .with_syntax(TemplateSyntax::Jinja);
        let err = r.render("SELECT {{ missing }}").unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedVariable(_)));
    }

    #[test]
    fn jinja_syntax_error() {
        let r = jinja_renderer(&[]);
        let err = r.render("SELECT {{ t ").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax(_)));
    }
}
