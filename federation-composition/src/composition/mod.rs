use serde::Deserialize;
use tracing::debug;
use tracing::instrument;

use crate::error::FederationError;
use crate::merger::merge_subgraphs;
use crate::satisfiability::validate_satisfiability;
use crate::subgraph::Subgraph;
use crate::subgraph::builder::build_subgraph_state;
use crate::subgraph::graph_ids;
use crate::supergraph::Supergraph;
use crate::supergraph::build_supergraph_document;

/// Knobs of a composition run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositionOptions {
    /// Upper bound on the states the satisfiability check explores. Exceeding it fails the
    /// composition with `MAX_VALIDATION_SUBGRAPH_PATHS_EXCEEDED`.
    ///
    /// Defaults to no bound.
    pub max_validation_subgraph_paths: Option<usize>,

    /// Whether merged types, fields, enum values, union members and implemented interfaces are
    /// printed sorted by name rather than in the order the subgraphs declare them.
    ///
    /// Defaults to true.
    pub sort_output: bool,
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            max_validation_subgraph_paths: None,
            sort_output: true,
        }
    }
}

/// Composes `subgraphs` into a supergraph with the default options.
pub fn compose(subgraphs: &[Subgraph]) -> Result<Supergraph, FederationError> {
    compose_with_options(subgraphs, &CompositionOptions::default())
}

/// Composes `subgraphs` into a supergraph.
///
/// The subgraph order matters: "first wins" merge rules and the `join__Graph` enum follow it.
/// Every user-facing problem found is returned at once in [`FederationError::Composition`]; the
/// satisfiability check only runs once the subgraphs merged without errors.
#[instrument(skip_all, fields(subgraphs = subgraphs.len()))]
pub fn compose_with_options(
    subgraphs: &[Subgraph],
    options: &CompositionOptions,
) -> Result<Supergraph, FederationError> {
    let mut errors = Vec::new();
    let ids = graph_ids(subgraphs, &mut errors)?;
    let states = subgraphs
        .iter()
        .zip(ids)
        .map(|(subgraph, id)| build_subgraph_state(subgraph, id, &mut errors))
        .collect::<Result<Vec<_>, _>>()?;
    if !errors.is_empty() {
        debug!(errors = errors.len(), "invalid subgraphs");
        return Err(FederationError::Composition { errors });
    }

    let mut hints = Vec::new();
    let supergraph = merge_subgraphs(&states, &mut errors, &mut hints)?;
    if !errors.is_empty() {
        debug!(errors = errors.len(), "merge failed");
        return Err(FederationError::Composition { errors });
    }

    let errors = validate_satisfiability(&supergraph, options.max_validation_subgraph_paths)?;
    if !errors.is_empty() {
        return Err(FederationError::Composition { errors });
    }

    let document = build_supergraph_document(&supergraph, options.sort_output)?;
    debug!(
        definitions = document.definitions.len(),
        hints = hints.len(),
        "composed supergraph"
    );
    Ok(Supergraph::new(document, hints))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn options_default_when_absent() {
        let options: CompositionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompositionOptions::default());
        assert!(options.sort_output);
        assert_eq!(options.max_validation_subgraph_paths, None);
    }

    #[test]
    fn options_deserialize() {
        let options: CompositionOptions =
            serde_json::from_str(r#"{ "max_validation_subgraph_paths": 100, "sort_output": false }"#)
                .unwrap();
        assert_eq!(
            options,
            CompositionOptions {
                max_validation_subgraph_paths: Some(100),
                sort_output: false,
            }
        );
        assert!(serde_json::from_str::<CompositionOptions>(r#"{ "sort": true }"#).is_err());
    }
}
