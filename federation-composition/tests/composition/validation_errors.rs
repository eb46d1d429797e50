use federation_composition::ErrorCode;
use federation_composition::FederationError;
use federation_composition::Subgraph;
use federation_composition::compose;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::error_codes;

#[test]
fn syntax_errors_are_reported_per_subgraph() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { a: Int",
    };
    let errors = compose_as_fed2_subgraphs(&[a]).unwrap_err();
    assert_eq!(error_codes(&errors), ["INVALID_GRAPHQL"]);
    assert!(errors[0].to_string().starts_with("[a] "), "{}", errors[0]);
}

#[test]
fn merge_errors_are_all_collected() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { a: User } type User @key(fields: "id") { id: ID! name: String age: Int @shareable }"#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"type User @key(fields: "id") { id: ID! name: String age: String @shareable }"#,
    };
    let errors = compose_as_fed2_subgraphs(&[a, b]).unwrap_err();
    let codes = error_codes(&errors);
    assert_eq!(codes.len(), 2, "{errors:?}");
    assert!(codes.contains(&"INVALID_FIELD_SHARING"), "{codes:?}");
    assert!(codes.contains(&"FIELD_TYPE_MISMATCH"), "{codes:?}");
}

#[test]
fn invalid_keys_stop_composition_before_merging() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { t: T } type T @key(fields: "id(") { id: ID }"#,
    };
    let errors = compose_as_fed2_subgraphs(&[a]).unwrap_err();
    assert_eq!(error_codes(&errors), ["KEY_INVALID_FIELDS"]);
}

#[test]
fn type_kinds_must_agree() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { a: Thing } type Thing { id: ID }",
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: "type Query { b: Int } interface Thing { id: ID }",
    };
    let errors = compose_as_fed2_subgraphs(&[a, b]).unwrap_err();
    assert_eq!(errors[0].code(), ErrorCode::TypeKindMismatch);
}

#[test]
fn supergraph_needs_a_query_root() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type User @key(fields: "id") { id: ID! }"#,
    };
    let errors = compose_as_fed2_subgraphs(&[a]).unwrap_err();
    assert_eq!(error_codes(&errors), ["NO_QUERIES"]);
}

#[test]
fn subgraph_names_must_be_unique() {
    let sdl = r#"extend schema @link(url: "https://specs.apollo.dev/federation/v2.9") type Query { a: Int }"#;
    let subgraphs = [
        Subgraph::parse("a", None, sdl).unwrap(),
        Subgraph::parse("a", None, sdl).unwrap(),
    ];
    let Err(FederationError::Composition { errors }) = compose(&subgraphs) else {
        panic!("duplicate subgraph names must fail composition");
    };
    assert_eq!(errors[0].code(), ErrorCode::InvalidSubgraphName);
}
