use federation_composition::HintCode;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::error_codes;

#[test]
fn overridden_field_is_routed_to_the_new_owner() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { a: User } type User @key(fields: "id") { id: ID! name: String }"#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"type User @key(fields: "id") { id: ID! name: String @override(from: "a") }"#,
    };
    let supergraph = compose_as_fed2_subgraphs(&[a, b]).unwrap();
    let sdl = supergraph.sdl();
    assert!(sdl.contains(r#"name: String @join__field(graph: B, override: "a")"#), "{sdl}");
    assert!(!sdl.contains("join__field(graph: A, type"), "{sdl}");
    assert!(sdl.contains("https://specs.apollo.dev/join/v0.3"), "{sdl}");
    assert_eq!(
        supergraph.hints.iter().map(|hint| hint.code).collect::<Vec<_>>(),
        [HintCode::OverriddenFieldCanBeRemoved]
    );
}

#[test]
fn progressive_override_upgrades_join() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { a: User } type User @key(fields: "id") { id: ID! name: String }"#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"type User @key(fields: "id") { id: ID! name: String @override(from: "a", label: "percent(50)") }"#,
    };
    let sdl = compose_as_fed2_subgraphs(&[a, b]).unwrap().sdl();
    assert!(sdl.contains("https://specs.apollo.dev/join/v0.4"), "{sdl}");
    assert!(
        sdl.contains(r#"@join__field(graph: B, override: "a", overrideLabel: "percent(50)")"#),
        "{sdl}"
    );
}

#[test]
fn override_from_self_fails() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { a: Int @override(from: "a") }"#,
    };
    let errors = compose_as_fed2_subgraphs(&[a]).unwrap_err();
    assert_eq!(error_codes(&errors), ["OVERRIDE_FROM_SELF_ERROR"]);
}

#[test]
fn override_from_unknown_subgraph_is_a_hint() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { a: Int @override(from: "legacy") }"#,
    };
    let supergraph = compose_as_fed2_subgraphs(&[a]).unwrap();
    assert_eq!(supergraph.hints[0].code, HintCode::FromSubgraphDoesNotExist);
}
