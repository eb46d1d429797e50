use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::error_codes;

#[test]
fn inaccessible_elements_stay_in_the_supergraph_but_not_the_api() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"
            type Query { user: User internal: Int @inaccessible }
            type User @key(fields: "id") { id: ID! ssn: String @inaccessible }
        "#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"type User @key(fields: "id") { id: ID! name: String @tag(name: "public") }"#,
    };
    let supergraph = compose_as_fed2_subgraphs(&[a, b]).unwrap();
    let sdl = supergraph.sdl();
    assert!(sdl.contains("https://specs.apollo.dev/inaccessible/v0.2"), "{sdl}");
    assert!(sdl.contains("https://specs.apollo.dev/tag/v0.3"), "{sdl}");
    assert!(sdl.contains("@inaccessible"), "{sdl}");

    let api = supergraph.to_api_schema().unwrap().to_string();
    assert!(!api.contains("internal"), "{api}");
    assert!(!api.contains("ssn"), "{api}");
    assert!(!api.contains("join__"), "{api}");
    assert!(!api.contains("@tag"), "{api}");
    assert!(api.contains("name: String"), "{api}");
}

#[test]
fn inaccessible_fields_are_not_checked_for_satisfiability() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { user: User } type User { name: String }",
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: "extend type User { age: Int @inaccessible }",
    };
    compose_as_fed2_subgraphs(&[a, b]).unwrap();
}

#[test]
fn visible_fields_cannot_reference_inaccessible_types() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { secret: Secret } type Secret @inaccessible { value: String }",
    };
    let errors = compose_as_fed2_subgraphs(&[a]).unwrap_err();
    assert_eq!(error_codes(&errors), ["REFERENCED_INACCESSIBLE"]);
}
