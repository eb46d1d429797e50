use std::collections::HashSet;

use apollo_compiler::Name;
use apollo_compiler::ast::Document;

use crate::error::CompositionError;
use crate::error::FederationError;
use crate::internal_error;

pub mod builder;
pub mod field_set;
pub mod state;
mod validate;

/// One input of a composition: a named subgraph schema.
#[derive(Debug, Clone)]
pub struct Subgraph {
    pub name: String,
    pub url: Option<String>,
    pub document: Document,
}

impl Subgraph {
    pub fn new(name: &str, url: Option<&str>, document: Document) -> Self {
        Self {
            name: name.to_string(),
            url: url.map(|url| url.to_string()),
            document,
        }
    }

    /// Parses the SDL of a subgraph. Syntax errors are reported as `INVALID_GRAPHQL`.
    pub fn parse(name: &str, url: Option<&str>, sdl: &str) -> Result<Self, FederationError> {
        let document = Document::parse(sdl, format!("{name}.graphql")).map_err(|invalid| {
            FederationError::from(CompositionError::InvalidGraphQL {
                message: format!("[{name}] {}", invalid.errors),
            })
        })?;
        Ok(Self::new(name, url, document))
    }
}

/// Checks subgraph names and derives their `join__Graph` enum values, in input order.
///
/// Names are upper-cased, characters that cannot appear in a GraphQL name become `_`, a leading
/// digit gets a `_` prefix, and colliding results get `_1`, `_2`, ... suffixes.
pub(crate) fn graph_ids(
    subgraphs: &[Subgraph],
    errors: &mut Vec<CompositionError>,
) -> Result<Vec<Name>, FederationError> {
    let mut seen_names = HashSet::new();
    for subgraph in subgraphs {
        if subgraph.name.trim().is_empty() {
            errors.push(CompositionError::InvalidSubgraphName {
                message: "A subgraph name must not be empty".to_string(),
            });
        } else if !seen_names.insert(subgraph.name.as_str()) {
            errors.push(CompositionError::InvalidSubgraphName {
                message: format!(
                    "A subgraph named \"{}\" already exists: subgraph names must be unique",
                    subgraph.name
                ),
            });
        }
    }

    let mut used = HashSet::new();
    subgraphs
        .iter()
        .map(|subgraph| {
            let mut base = subgraph
                .name
                .to_uppercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>();
            if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
                base.insert(0, '_');
            }
            let mut candidate = base.clone();
            let mut suffix = 0;
            while !used.insert(candidate.clone()) {
                suffix += 1;
                candidate = format!("{base}_{suffix}");
            }
            Name::new(&candidate)
                .map_err(|_| internal_error!("derived graph id \"{candidate}\" is not a valid name"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;

    fn subgraph(name: &str) -> Subgraph {
        Subgraph::parse(name, None, "type Query { a: Int }").unwrap()
    }

    #[test]
    fn graph_ids_are_sanitized_and_unique() {
        let subgraphs = ["accounts", "my-reviews", "my_reviews", "1products"]
            .map(subgraph)
            .to_vec();
        let mut errors = Vec::new();
        let ids = graph_ids(&subgraphs, &mut errors).unwrap();
        assert!(errors.is_empty());
        assert_eq!(
            ids.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            vec!["ACCOUNTS", "MY_REVIEWS", "MY_REVIEWS_1", "_1PRODUCTS"]
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let subgraphs = vec![subgraph("a"), subgraph("a")];
        let mut errors = Vec::new();
        graph_ids(&subgraphs, &mut errors).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), ErrorCode::InvalidSubgraphName);
    }

    #[test]
    fn syntax_errors_are_invalid_graphql() {
        let error = Subgraph::parse("broken", None, "type Query {").unwrap_err();
        assert_eq!(
            error.composition_errors()[0].code(),
            ErrorCode::InvalidGraphQL
        );
        assert!(error.to_string().starts_with("[broken]"));
    }
}
