//! Dependency-ordered table traversal
//!
//! The navigator yields manifest tables so that every table referenced by
//! a foreign key comes out before the tables referencing it. Instead of
//! building the whole graph up front it asks the database for one table's
//! dependencies at a time and pushes unresolved ones back onto the front
//! of the work queue, ahead of the table that needs them.
//!
//! Tables referenced by a foreign key but absent from the manifest are
//! discovered on the way and exported with default settings.

use pgdd_catalog::DatabaseAdapter;
use pgdd_manifest::{Manifest, TableSpec};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::DumpError;

/// Where a known table is in the traversal
///
/// Tables the navigator has never heard of have no entry.
#[derive(Debug)]
enum TableState {
    /// Waiting to be emitted
    Pending {
        spec: TableSpec,

        /// Pushed back behind its own unresolved dependencies
        deferred: bool,
    },

    /// Already emitted
    Completed,
}

/// Pull iterator over the tables of a manifest in dependency order
pub struct Navigator<'a> {
    db: &'a dyn DatabaseAdapter,
    states: HashMap<String, TableState>,
    frontier: VecDeque<String>,
    explicit: HashSet<String>,
}

impl<'a> Navigator<'a> {
    /// Seed the traversal with the manifest tables in document order
    pub fn new(db: &'a dyn DatabaseAdapter, manifest: &Manifest) -> Self {
        let registered = manifest.registered();
        let explicit = registered.keys().cloned().collect();

        let states = registered
            .into_iter()
            .map(|(name, spec)| (name, TableState::Pending { spec, deferred: false }))
            .collect();

        Self {
            db,
            states,
            frontier: manifest.seed_order().into(),
            explicit,
        }
    }

    /// Whether the work queue still has entries
    ///
    /// The remaining entries may all be tables that were already emitted,
    /// in which case the following [`next`](Self::next) returns `None`.
    pub fn has_next(&self) -> bool {
        !self.frontier.is_empty()
    }

    /// Whether `table` was discovered as a dependency rather than listed in the manifest
    pub fn is_implicit(&self, table: &str) -> bool {
        !self.explicit.contains(table)
    }

    /// Produce the next table whose dependencies have all been emitted
    ///
    /// The returned spec always has its column list filled in. Returns
    /// `None` once the work queue is exhausted.
    pub async fn next(&mut self) -> Result<Option<TableSpec>, DumpError> {
        while let Some(name) = self.frontier.pop_front() {
            if !self.is_pending(&name) {
                tracing::debug!(table = %name, "skipping completed table");
                continue;
            }

            let dependencies = self.db.list_dependencies(&name).await.map_err(|source| {
                tracing::error!(table = %name, error = %source, "failed to get table dependencies");
                DumpError::DependencyLookup {
                    table: name.clone(),
                    source,
                }
            })?;

            let unresolved = self.register_dependencies(&name, &dependencies)?;

            if !unresolved.is_empty() {
                tracing::debug!(
                    table = %name,
                    unresolved = %unresolved.join(","),
                    "deferring table until its dependencies are dumped"
                );
                self.defer(&name);
                for dependency in unresolved.into_iter().rev() {
                    self.frontier.push_front(dependency);
                }
                continue;
            }

            return self.complete(name).await.map(Some);
        }

        Ok(None)
    }

    fn is_pending(&self, name: &str) -> bool {
        matches!(self.states.get(name), Some(TableState::Pending { .. }))
    }

    /// Register unseen dependencies and return the ones still pending, in lookup order
    fn register_dependencies(
        &mut self,
        table: &str,
        dependencies: &[String],
    ) -> Result<Vec<String>, DumpError> {
        let mut unresolved: Vec<String> = Vec::new();

        for dependency in dependencies {
            if dependency == table || unresolved.contains(dependency) {
                continue;
            }

            let state = self.states.entry(dependency.clone()).or_insert_with(|| {
                tracing::debug!(table = %dependency, referenced_by = %table, "discovered table outside the manifest");
                TableState::Pending {
                    spec: TableSpec::new(dependency.clone()),
                    deferred: false,
                }
            });

            match state {
                TableState::Completed => {}
                TableState::Pending { deferred: true, .. } => {
                    // Only tables on the current chain of deferrals are
                    // deferred, so reaching one again closes a loop.
                    tracing::error!(table, dependency = %dependency, "cyclic foreign key dependency");
                    return Err(DumpError::CyclicDependency {
                        table: table.to_string(),
                        dependency: dependency.clone(),
                    });
                }
                TableState::Pending { deferred: false, .. } => unresolved.push(dependency.clone()),
            }
        }

        Ok(unresolved)
    }

    /// Mark a table as waiting and queue it right behind its dependencies
    fn defer(&mut self, name: &str) {
        if let Some(TableState::Pending { deferred, .. }) = self.states.get_mut(name) {
            *deferred = true;
        }
        self.frontier.push_front(name.to_string());
    }

    async fn complete(&mut self, name: String) -> Result<TableSpec, DumpError> {
        let mut spec = match self.states.insert(name.clone(), TableState::Completed) {
            Some(TableState::Pending { spec, .. }) => spec,
            _ => TableSpec::new(name.clone()),
        };

        if spec.needs_columns() {
            spec.columns = self.db.list_columns(&name).await.map_err(|source| {
                tracing::error!(table = %name, error = %source, "failed to get table columns");
                DumpError::ColumnLookup {
                    table: name.clone(),
                    source,
                }
            })?;
        }

        tracing::debug!(table = %name, columns = spec.columns.len(), "table ready for dump");

        Ok(spec)
    }
}
