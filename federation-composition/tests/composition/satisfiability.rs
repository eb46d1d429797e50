use federation_composition::CompositionOptions;
use insta::assert_snapshot;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::compose_as_fed2_subgraphs_with_options;
use super::error_codes;

#[test]
fn unreachable_field_fails_with_a_witness_query() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { user: User } type User { name: String }",
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: "extend type User { age: Int }",
    };
    let errors = compose_as_fed2_subgraphs(&[a, b]).unwrap_err();
    assert_eq!(error_codes(&errors), ["SATISFIABILITY_ERROR"]);
    assert_snapshot!(errors[0].query().unwrap(), @r###"
    {
      user {
        age
      }
    }
    "###);
}

#[test]
fn every_unsatisfiable_path_is_reported() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { t: T } type T { x: Int }",
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"type T @key(fields: "id") { id: ID! y: Int }"#,
    };
    let errors = compose_as_fed2_subgraphs(&[a, b]).unwrap_err();
    assert_eq!(
        error_codes(&errors),
        ["SATISFIABILITY_ERROR", "SATISFIABILITY_ERROR"]
    );
}

#[test]
fn mutations_are_validated_from_their_own_root() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"
            type Query { a: Int }
            type Mutation { createUser: User }
            type User { id: ID! }
        "#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: "type User { email: String }",
    };
    let errors = compose_as_fed2_subgraphs(&[a, b]).unwrap_err();
    assert_eq!(error_codes(&errors), ["SATISFIABILITY_ERROR"]);
    assert_snapshot!(errors[0].query().unwrap(), @r###"
    mutation {
      createUser {
        email
      }
    }
    "###);
}

#[test]
fn shared_root_fields_are_satisfiable_from_any_subgraph() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"
            type Query { products: [Product] @shareable }
            type Product @key(fields: "upc") { upc: String! name: String }
        "#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"
            type Query { products: [Product] @shareable }
            type Product @key(fields: "upc") { upc: String! price: Int }
        "#,
    };
    compose_as_fed2_subgraphs(&[a, b]).unwrap();
}

#[test]
fn exploration_bound_fails_large_searches() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { user: User } type User @key(fields: "id") { id: ID! }"#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"type User @key(fields: "id") { id: ID! age: Int }"#,
    };
    let options = CompositionOptions {
        max_validation_subgraph_paths: Some(1),
        ..Default::default()
    };
    let errors = compose_as_fed2_subgraphs_with_options(&[a, b], &options).unwrap_err();
    assert_eq!(error_codes(&errors), ["MAX_VALIDATION_SUBGRAPH_PATHS_EXCEEDED"]);
}

#[test]
fn entity_extensions_resolve_their_external_keys() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"
            type Query { users: [User] }
            type User @key(fields: "id") { id: ID! name: String }
        "#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"
            type Query { topUser: User }
            extend type User @key(fields: "id") { id: ID! @external reviews: Int }
        "#,
    };
    let supergraph = compose_as_fed2_subgraphs(&[a, b]).unwrap();
    let sdl = supergraph.sdl();
    assert!(!sdl.contains("external: true"), "{sdl}");
    assert!(sdl.contains("  id: ID!\n"), "{sdl}");
    assert!(sdl.contains("reviews: Int @join__field(graph: B)"), "{sdl}");
}

#[test]
fn extends_marker_keys_are_resolvable_from_the_extension() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"
            type Query { products: [Product] }
            type Product @key(fields: "upc") { upc: String! price: Int }
        "#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"
            type Query { featured: Product }
            type Product @key(fields: "upc") @extends { upc: String! @external stock: Int }
        "#,
    };
    let supergraph = compose_as_fed2_subgraphs(&[a, b]).unwrap();
    let sdl = supergraph.sdl();
    assert!(!sdl.contains("external: true"), "{sdl}");
    assert!(sdl.contains(r#"@join__type(graph: B, key: "upc", extension: true)"#), "{sdl}");
}
