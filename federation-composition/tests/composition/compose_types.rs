use std::collections::BTreeMap;

use federation_composition::CompositionOptions;
use federation_composition::HintCode;
use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::compose_as_fed2_subgraphs_with_options;

#[test]
fn entities_are_routed_to_their_subgraphs() {
    let users = ServiceDefinition {
        name: "users",
        type_defs: r#"
            type Query { me: User }
            type User @key(fields: "id") { id: ID! name: String }
        "#,
    };
    let reviews = ServiceDefinition {
        name: "reviews",
        type_defs: r#"
            type User @key(fields: "id") { id: ID! reviewCount: Int }
        "#,
    };
    let supergraph = compose_as_fed2_subgraphs(&[users, reviews]).unwrap();
    let sdl = supergraph.sdl();
    assert!(sdl.contains(r#"USERS @join__graph(name: "users", url: "http://users")"#), "{sdl}");
    assert!(sdl.contains(r#"REVIEWS @join__graph(name: "reviews", url: "http://reviews")"#), "{sdl}");
    assert!(sdl.contains(r#"@join__type(graph: USERS, key: "id")"#), "{sdl}");
    assert!(sdl.contains(r#"@join__type(graph: REVIEWS, key: "id")"#), "{sdl}");
    assert!(sdl.contains("name: String @join__field(graph: USERS)"), "{sdl}");
    assert!(sdl.contains("reviewCount: Int @join__field(graph: REVIEWS)"), "{sdl}");
    assert!(supergraph.hints.is_empty(), "{:?}", supergraph.hints);
}

#[test]
fn output_enums_keep_every_value() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { a: Status } enum Status { ACTIVE }",
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: "type Query { b: Status } enum Status { INACTIVE }",
    };
    let sdl = compose_as_fed2_subgraphs(&[a, b]).unwrap().sdl();
    assert!(sdl.contains("ACTIVE @join__enumValue(graph: A)"), "{sdl}");
    assert!(sdl.contains("INACTIVE @join__enumValue(graph: B)"), "{sdl}");
}

#[test]
fn input_enums_keep_common_values_with_hints() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { a(c: Color): Int } enum Color { RED GREEN }",
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: "type Query { b(c: Color): Int } enum Color { RED BLUE }",
    };
    let supergraph = compose_as_fed2_subgraphs(&[a, b]).unwrap();
    let sdl = supergraph.sdl();
    assert!(sdl.contains("RED @join__enumValue(graph: A) @join__enumValue(graph: B)"), "{sdl}");
    assert!(!sdl.contains("GREEN"), "{sdl}");
    assert!(!sdl.contains("BLUE"), "{sdl}");
    assert!(
        supergraph
            .hints
            .iter()
            .all(|hint| hint.code == HintCode::InconsistentEnumValueForInputEnum)
    );
    assert_eq!(supergraph.hints.len(), 2);
}

#[test]
fn output_order_follows_the_options() {
    let service = || ServiceDefinition {
        name: "a",
        type_defs: "type Query { zebra: Int apple: Int }",
    };
    let sorted = compose_as_fed2_subgraphs(&[service()]).unwrap().sdl();
    assert!(sorted.find("apple").unwrap() < sorted.find("zebra").unwrap(), "{sorted}");

    let options = CompositionOptions {
        sort_output: false,
        ..Default::default()
    };
    let unsorted = compose_as_fed2_subgraphs_with_options(&[service()], &options)
        .unwrap()
        .sdl();
    assert!(unsorted.find("zebra").unwrap() < unsorted.find("apple").unwrap(), "{unsorted}");
}

#[test]
fn interface_objects_add_fields_to_implementations() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"
            type Query { node: Node }
            interface Node @key(fields: "id") { id: ID! }
            type User implements Node @key(fields: "id") { id: ID! name: String }
        "#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"type Node @key(fields: "id") @interfaceObject { id: ID! lastSeen: String }"#,
    };
    let sdl = compose_as_fed2_subgraphs(&[a, b]).unwrap().sdl();
    assert!(sdl.contains(r#"@join__type(graph: B, key: "id", isInterfaceObject: true)"#), "{sdl}");
    assert!(sdl.contains("@join__implements(graph: A, interface: \"Node\")"), "{sdl}");
    assert_eq!(sdl.matches("lastSeen: String").count(), 2, "{sdl}");
}

/// Supergraph lines keyed by their enclosing definition, with the directives of each line sorted
/// so that only the order of subgraph contributions is ignored.
fn lines_by_definition(sdl: &str) -> BTreeMap<String, Vec<String>> {
    let mut definitions = BTreeMap::<String, Vec<String>>::new();
    let mut current = String::new();
    for line in sdl.lines().filter(|line| !line.trim().is_empty()) {
        if !line.starts_with(' ') {
            current = line.split(" @").next().unwrap_or_default().to_string();
        }
        let (body, tail) = match line.trim_end().strip_suffix(" {") {
            Some(body) => (body, " {"),
            None => (line.trim_end(), ""),
        };
        let (body, members) = body.split_once(" = ").unwrap_or((body, ""));
        let mut parts = body.split(" @").collect::<Vec<_>>();
        parts[1..].sort_unstable();
        definitions
            .entry(current.clone())
            .or_default()
            .push(format!("{}{members}{tail}", parts.join(" @")));
    }
    for lines in definitions.values_mut() {
        lines.sort();
    }
    definitions
}

#[test]
fn routing_does_not_depend_on_subgraph_order() {
    let a = || ServiceDefinition {
        name: "a",
        type_defs: r#"
            type Query { users: [User] search: [Result] }
            type User @key(fields: "id") { id: ID! name: String status: Status }
            enum Status { ACTIVE }
            union Result = User
        "#,
    };
    let b = || ServiceDefinition {
        name: "b",
        type_defs: r#"
            type Query { reviews: [Review] }
            type User @key(fields: "id") { id: ID! reviews: [Review] }
            type Review @key(fields: "id") { id: ID! body: String status: Status author: User }
            enum Status { ACTIVE ARCHIVED }
            union Result = Review
        "#,
    };
    let forward = compose_as_fed2_subgraphs(&[a(), b()]).unwrap().sdl();
    let backward = compose_as_fed2_subgraphs(&[b(), a()]).unwrap().sdl();
    assert!(forward.contains(r#"@join__unionMember(graph: B, member: "Review")"#), "{forward}");
    assert!(forward.contains("ARCHIVED @join__enumValue(graph: B)"), "{forward}");
    assert_eq!(lines_by_definition(&forward), lines_by_definition(&backward));
}

#[test]
fn entity_extensions_are_marked_in_their_join_type() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: r#"type Query { user: User } type User @key(fields: "id") { id: ID! }"#,
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: r#"extend type User @key(fields: "id") { id: ID! @external age: Int }"#,
    };
    let sdl = compose_as_fed2_subgraphs(&[a, b]).unwrap().sdl();
    assert!(sdl.contains(r#"@join__type(graph: A, key: "id")"#), "{sdl}");
    assert!(sdl.contains(r#"@join__type(graph: B, key: "id", extension: true)"#), "{sdl}");
    assert!(sdl.contains("age: Int @join__field(graph: B)"), "{sdl}");
}

#[test]
fn keyless_extensions_are_not_marked() {
    let a = ServiceDefinition {
        name: "a",
        type_defs: "type Query { user: User } type User { name: String @shareable }",
    };
    let b = ServiceDefinition {
        name: "b",
        type_defs: "extend type User { name: String @shareable }",
    };
    let sdl = compose_as_fed2_subgraphs(&[a, b]).unwrap().sdl();
    assert!(sdl.contains("@join__type(graph: B)"), "{sdl}");
    assert!(!sdl.contains("extension: true"), "{sdl}");
}
