//! Checks that every query the supergraph API schema accepts can be planned over the subgraphs.
//!
//! The check walks the API schema from each root operation type and, for every field and type
//! condition along the way, tracks all the ways subgraph fetches could be at that point: a
//! subgraph resolving the field itself, a subgraph reached by fetching an entity through one of
//! its keys, or the runtime types of an interface the subgraph does not declare the field on. A
//! path no combination of subgraphs can follow is reported with a witness operation.
use tracing::debug;
use tracing::instrument;

use crate::error::CompositionError;
use crate::error::FederationError;
use crate::merger::state::SupergraphState;

mod graph;
mod traversal;
mod witness;

/// Returns the satisfiability errors of a merged supergraph. Internal errors abort the check.
///
/// With `max_validation_subgraph_paths`, exploring more states than that yields a single
/// `MAX_VALIDATION_SUBGRAPH_PATHS_EXCEEDED` error instead.
#[instrument(skip_all)]
pub(crate) fn validate_satisfiability(
    supergraph: &SupergraphState,
    max_validation_subgraph_paths: Option<usize>,
) -> Result<Vec<CompositionError>, FederationError> {
    let graph = graph::build_federated_graph(supergraph)?;
    let errors =
        traversal::ValidationTraversal::new(supergraph, &graph, max_validation_subgraph_paths)
            .validate()?;
    debug!(errors = errors.len(), "validated satisfiability");
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::merger::tests::merge;

    fn validate(subgraphs: &[(&str, &str)]) -> Vec<CompositionError> {
        validate_with_limit(subgraphs, None)
    }

    fn validate_with_limit(
        subgraphs: &[(&str, &str)],
        limit: Option<usize>,
    ) -> Vec<CompositionError> {
        let (supergraph, errors, _) = merge(subgraphs);
        assert!(errors.is_empty(), "{errors:?}");
        validate_satisfiability(&supergraph, limit).unwrap()
    }

    #[test]
    fn entity_extension_is_reached_through_its_key() {
        let errors = validate(&[
            (
                "a",
                "type Query { user: User } type User @key(fields: \"id\") { id: ID! }",
            ),
            (
                "b",
                "extend type User @key(fields: \"id\") { id: ID! @external age: Int }",
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn field_of_a_type_without_key_is_unreachable() {
        let errors = validate(&[
            ("a", "type Query { user: User } type User { name: String }"),
            ("b", "extend type User { age: Int }"),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), ErrorCode::SatisfiabilityError);
        assert_eq!(errors[0].query(), Some("{\n  user {\n    age\n  }\n}"));
        assert_snapshot!(errors[0].to_string(), @r###"
        The following supergraph API query:
        {
          user {
            age
          }
        }
        cannot be satisfied by the subgraphs because:
        - from subgraph "a":
          - cannot find field "User.age".
          - cannot move to subgraph "b", which has field "User.age", because type "User" has no @key defined in subgraph "b".
        "###);
    }

    #[test]
    fn key_fields_must_be_resolvable_from_the_origin() {
        let errors = validate(&[
            ("a", "type Query { t: T } type T { x: Int }"),
            ("b", "type T @key(fields: \"id\") { id: ID! y: Int }"),
        ]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].query(), Some("{\n  t {\n    id\n  }\n}"));
        assert_snapshot!(errors[1].to_string(), @r###"
        The following supergraph API query:
        {
          t {
            y
          }
        }
        cannot be satisfied by the subgraphs because:
        - from subgraph "a":
          - cannot find field "T.y".
          - cannot move to subgraph "b" using @key(fields: "id") of "T", the key field(s) cannot be resolved from subgraph "a".
        "###);
    }

    #[test]
    fn requires_is_satisfied_from_another_subgraph() {
        let errors = validate(&[
            (
                "a",
                "type Query { product: Product } type Product @key(fields: \"id\") { id: ID! price: Int }",
            ),
            (
                "b",
                "type Product @key(fields: \"id\") { id: ID! price: Int @external tax: Int @requires(fields: \"price\") }",
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn requires_without_a_way_back_is_unsatisfiable() {
        let errors = validate(&[
            (
                "a",
                "type Query { product: Product } type Product @key(fields: \"id\", resolvable: false) { id: ID! weight: Int }",
            ),
            (
                "b",
                "type Product @key(fields: \"id\") { id: ID! weight: Int @external shipping: Int @requires(fields: \"weight\") }",
            ),
        ]);
        assert_eq!(errors.len(), 1);
        assert_snapshot!(errors[0].to_string(), @r###"
        The following supergraph API query:
        {
          product {
            shipping
          }
        }
        cannot be satisfied by the subgraphs because:
        - from subgraph "a": cannot find field "Product.shipping".
        - from subgraph "b": cannot satisfy @require conditions on field "Product.shipping".
        "###);
    }

    #[test]
    fn provides_makes_external_fields_resolvable() {
        let errors = validate(&[
            (
                "a",
                r#"
                type Query { reviews: [Review] }
                type Review {
                  body: String
                  author: User @provides(fields: "name")
                  editor: User
                }
                type User @key(fields: "id") { id: ID! name: String @external }
                "#,
            ),
            (
                "b",
                "type User @key(fields: \"id\", resolvable: false) { id: ID! name: String }",
            ),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].query(),
            Some("{\n  reviews {\n    editor {\n      name\n    }\n  }\n}")
        );
        assert!(
            errors[0]
                .to_string()
                .contains("field \"User.name\" is not resolvable because marked @external"),
        );
    }

    #[test]
    fn interface_object_fields_are_reached_from_implementations() {
        let errors = validate(&[
            (
                "a",
                r#"
                type Query { node: Node }
                interface Node @key(fields: "id") { id: ID! }
                type User implements Node @key(fields: "id") { id: ID! name: String }
                "#,
            ),
            (
                "b",
                "type Node @key(fields: \"id\") @interfaceObject { id: ID! lastSeen: String }",
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn abstract_types_are_checked_per_runtime_type() {
        let errors = validate(&[
            (
                "a",
                "type Query { media: Media } union Media = Book | Movie type Book { title: String } type Movie { title: String }",
            ),
            ("b", "type Movie { director: String }"),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].query(),
            Some("{\n  media {\n    ... on Movie {\n      director\n    }\n  }\n}")
        );
    }

    #[test]
    fn exploration_can_be_bounded() {
        let errors = validate_with_limit(
            &[
                (
                    "a",
                    "type Query { user: User } type User @key(fields: \"id\") { id: ID! }",
                ),
                ("b", "type User @key(fields: \"id\") { id: ID! age: Int }"),
            ],
            Some(1),
        );
        assert_eq!(
            errors.iter().map(|error| error.code()).collect::<Vec<_>>(),
            [ErrorCode::MaxValidationSubgraphPathsExceeded]
        );
    }
}
