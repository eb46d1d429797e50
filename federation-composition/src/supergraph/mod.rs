//! Synthesis of the supergraph SDL from the merged state.
use std::fmt;

use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::DirectiveList;
use apollo_compiler::ast::Document;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use itertools::Itertools;
use tracing::debug;
use tracing::instrument;

use crate::error::CompositionHint;
use crate::error::FederationError;
use crate::internal_error;
use crate::link::Purpose;
use crate::merger::state::FeatureUsage;
use crate::merger::state::SupergraphState;
use crate::subgraph::state::RootKind;

mod api_schema;
mod join;

use self::join::applied_directive;

const LINK_URL: &str = "https://specs.apollo.dev/link/v1.0";
const JOIN_URL: &str = "https://specs.apollo.dev/join/v0.3";
const JOIN_WITH_OVERRIDE_LABEL_URL: &str = "https://specs.apollo.dev/join/v0.4";

/// Definitions of the link and join specifications, as every supergraph declares them.
const CORE_DEFINITIONS: &str = r#"
directive @link(url: String, as: String, for: link__Purpose, import: [link__Import]) repeatable on SCHEMA

directive @join__enumValue(graph: join__Graph!) repeatable on ENUM_VALUE

directive @join__field(graph: join__Graph, requires: join__FieldSet, provides: join__FieldSet, type: String, external: Boolean, override: String, usedOverridden: Boolean) repeatable on FIELD_DEFINITION | INPUT_FIELD_DEFINITION

directive @join__graph(name: String!, url: String!) on ENUM_VALUE

directive @join__implements(graph: join__Graph!, interface: String!) repeatable on OBJECT | INTERFACE

directive @join__type(graph: join__Graph!, key: join__FieldSet, extension: Boolean! = false, resolvable: Boolean! = true, isInterfaceObject: Boolean! = false) repeatable on OBJECT | INTERFACE | UNION | ENUM | INPUT_OBJECT | SCALAR

directive @join__unionMember(graph: join__Graph!, member: String!) repeatable on UNION

scalar join__FieldSet

scalar link__Import

enum link__Purpose {
  """
  `SECURITY` features provide metadata necessary to securely resolve fields.
  """
  SECURITY

  """
  `EXECUTION` features provide metadata necessary for operation execution.
  """
  EXECUTION
}
"#;

/// `join` v0.4 adds the label of progressive overrides.
const JOIN_FIELD_WITH_OVERRIDE_LABEL: &str = "directive @join__field(graph: join__Graph, requires: join__FieldSet, provides: join__FieldSet, type: String, external: Boolean, override: String, usedOverridden: Boolean, overrideLabel: String) repeatable on FIELD_DEFINITION | INPUT_FIELD_DEFINITION";

const TAG_DEFINITION: &str = "directive @tag(name: String!) repeatable on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION | SCHEMA";
const INACCESSIBLE_DEFINITION: &str = "directive @inaccessible on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION";
const AUTHENTICATED_DEFINITION: &str =
    "directive @authenticated on FIELD_DEFINITION | OBJECT | INTERFACE | SCALAR | ENUM";
const REQUIRES_SCOPES_DEFINITION: &str = "directive @requiresScopes(scopes: [[requiresScopes__Scope!]!]!) on FIELD_DEFINITION | OBJECT | INTERFACE | SCALAR | ENUM\n\nscalar requiresScopes__Scope";
const POLICY_DEFINITION: &str = "directive @policy(policies: [[policy__Policy!]!]!) on FIELD_DEFINITION | OBJECT | INTERFACE | SCALAR | ENUM\n\nscalar policy__Policy";

/// A successfully composed supergraph.
#[derive(Debug, Clone)]
pub struct Supergraph {
    document: Document,
    /// Non-fatal observations made while composing.
    pub hints: Vec<CompositionHint>,
}

impl Supergraph {
    pub(crate) fn new(document: Document, hints: Vec<CompositionHint>) -> Self {
        Self { document, hints }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The supergraph SDL.
    pub fn sdl(&self) -> String {
        self.document.to_string()
    }

    /// The schema clients see: routing and composition elements removed, along with everything
    /// `@inaccessible`.
    pub fn to_api_schema(&self) -> Result<Document, FederationError> {
        api_schema::to_api_schema(&self.document)
    }
}

impl fmt::Display for Supergraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document)
    }
}

/// Builds the supergraph document. With `sort_output`, merged types, their fields, enum values,
/// union members and implemented interfaces are sorted by name.
#[instrument(skip_all)]
pub(crate) fn build_supergraph_document(
    state: &SupergraphState,
    sort_output: bool,
) -> Result<Document, FederationError> {
    let mut document = Document::new();
    document
        .definitions
        .push(schema_definition(state));

    let mut core = parse_definitions(CORE_DEFINITIONS)?;
    if state.features.override_label {
        let label_definition = parse_definitions(JOIN_FIELD_WITH_OVERRIDE_LABEL)?;
        for definition in core.iter_mut() {
            if matches!(definition, Definition::DirectiveDefinition(d) if d.name.as_str() == "join__field") {
                if let Some(replacement) = label_definition.first() {
                    *definition = replacement.clone();
                }
            }
        }
    }
    let (mut core_directives, core_types): (Vec<_>, Vec<_>) = core
        .into_iter()
        .partition(|definition| matches!(definition, Definition::DirectiveDefinition(_)));
    let mut feature_types = Vec::new();
    for (used, sdl) in [
        (state.features.tag, TAG_DEFINITION),
        (state.features.inaccessible, INACCESSIBLE_DEFINITION),
        (state.features.authenticated, AUTHENTICATED_DEFINITION),
        (state.features.requires_scopes, REQUIRES_SCOPES_DEFINITION),
        (state.features.policy, POLICY_DEFINITION),
    ] {
        if used {
            for definition in parse_definitions(sdl)? {
                match definition {
                    Definition::DirectiveDefinition(_) => core_directives.push(definition),
                    _ => feature_types.push(definition),
                }
            }
        }
    }

    document.definitions.extend(core_directives);
    document.definitions.extend(
        state
            .directives
            .values()
            .map(join::render_directive_definition),
    );
    document.definitions.extend(core_types);
    document.definitions.push(join_graph_enum(state));
    document.definitions.extend(feature_types);

    let mut types = state.types.values().map(join::render_type).collect_vec();
    if sort_output {
        sort_types(&mut types);
    }
    document.definitions.extend(types);
    debug!(
        definitions = document.definitions.len(),
        "synthesized supergraph document"
    );
    Ok(document)
}

fn parse_definitions(sdl: &str) -> Result<Vec<Definition>, FederationError> {
    Document::parse(sdl, "supergraph_definitions.graphql")
        .map(|document| document.definitions)
        .map_err(|invalid| internal_error!("invalid built-in definitions: {}", invalid.errors))
}

fn schema_definition(state: &SupergraphState) -> Definition {
    let mut directives = vec![
        applied_directive(name!("link"), vec![(name!("url"), Value::String(LINK_URL.into()))]),
        spec_link(
            if state.features.override_label {
                JOIN_WITH_OVERRIDE_LABEL_URL
            } else {
                JOIN_URL
            },
            Some(Purpose::EXECUTION),
        ),
    ];
    directives.extend(feature_links(&state.features));
    directives.extend(
        state
            .composed_links
            .iter()
            .map(|link| Node::new(link.to_directive())),
    );

    let root_operations = RootKind::ALL
        .iter()
        .filter(|kind| state.root_types.contains(*kind))
        .filter(|kind| state.types.contains_key(&kind.default_type_name()))
        .map(|kind| {
            let operation_type = match kind {
                RootKind::Query => OperationType::Query,
                RootKind::Mutation => OperationType::Mutation,
                RootKind::Subscription => OperationType::Subscription,
            };
            Node::new((operation_type, kind.default_type_name()))
        })
        .collect();

    Definition::SchemaDefinition(Node::new(ast::SchemaDefinition {
        description: None,
        directives: DirectiveList(directives),
        root_operations,
    }))
}

fn spec_link(url: &str, purpose: Option<Purpose>) -> Node<ast::Directive> {
    let mut arguments = vec![(name!("url"), Value::String(url.into()))];
    if let Some(purpose) = purpose {
        let purpose = match purpose {
            Purpose::SECURITY => name!("SECURITY"),
            Purpose::EXECUTION => name!("EXECUTION"),
        };
        arguments.push((name!("for"), Value::Enum(purpose)));
    }
    applied_directive(name!("link"), arguments)
}

fn feature_links(features: &FeatureUsage) -> Vec<Node<ast::Directive>> {
    [
        (features.tag, "https://specs.apollo.dev/tag/v0.3", None),
        (
            features.inaccessible,
            "https://specs.apollo.dev/inaccessible/v0.2",
            Some(Purpose::SECURITY),
        ),
        (
            features.authenticated,
            "https://specs.apollo.dev/authenticated/v0.1",
            Some(Purpose::SECURITY),
        ),
        (
            features.requires_scopes,
            "https://specs.apollo.dev/requiresScopes/v0.1",
            Some(Purpose::SECURITY),
        ),
        (
            features.policy,
            "https://specs.apollo.dev/policy/v0.1",
            Some(Purpose::SECURITY),
        ),
    ]
    .into_iter()
    .filter(|(used, _, _)| *used)
    .map(|(_, url, purpose)| spec_link(url, purpose))
    .collect()
}

fn join_graph_enum(state: &SupergraphState) -> Definition {
    let values = state
        .graphs
        .iter()
        .map(|graph| {
            Node::new(ast::EnumValueDefinition {
                description: None,
                value: graph.id.clone(),
                directives: DirectiveList(vec![applied_directive(
                    name!("join__graph"),
                    vec![
                        (name!("name"), Value::String(graph.name.clone())),
                        (
                            name!("url"),
                            Value::String(graph.url.clone().unwrap_or_default()),
                        ),
                    ],
                )]),
            })
        })
        .collect();
    Definition::EnumTypeDefinition(Node::new(ast::EnumTypeDefinition {
        description: None,
        name: name!("join__Graph"),
        directives: Default::default(),
        values,
    }))
}

/// Sorts type definitions by name, and the named children of each.
fn sort_types(types: &mut [Definition]) {
    types.sort_by(|a, b| {
        let name = |definition: &Definition| definition.name().map(|name| name.to_string());
        name(a).cmp(&name(b))
    });
    for definition in types.iter_mut() {
        match definition {
            Definition::ObjectTypeDefinition(object) => {
                let object = object.make_mut();
                object.fields.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
                object.implements_interfaces.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            }
            Definition::InterfaceTypeDefinition(interface) => {
                let interface = interface.make_mut();
                interface.fields.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
                interface.implements_interfaces.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            }
            Definition::InputObjectTypeDefinition(input) => {
                input.make_mut().fields.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
            }
            Definition::EnumTypeDefinition(enum_type) => {
                enum_type
                    .make_mut()
                    .values
                    .sort_by(|a, b| a.value.as_str().cmp(b.value.as_str()));
            }
            Definition::UnionTypeDefinition(union) => {
                union
                    .make_mut()
                    .members
                    .sort_by(|a, b| a.as_str().cmp(b.as_str()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::tests::merge;

    fn supergraph_sdl(subgraphs: &[(&str, &str)]) -> String {
        let (state, errors, _) = merge(subgraphs);
        assert!(errors.is_empty(), "{errors:?}");
        build_supergraph_document(&state, true).unwrap().to_string()
    }

    fn api_sdl(subgraphs: &[(&str, &str)]) -> String {
        let (state, errors, hints) = merge(subgraphs);
        assert!(errors.is_empty(), "{errors:?}");
        let document = build_supergraph_document(&state, true).unwrap();
        Supergraph::new(document, hints)
            .to_api_schema()
            .unwrap()
            .to_string()
    }

    #[test]
    fn differing_field_types_are_recorded_per_graph() {
        let sdl = supergraph_sdl(&[
            ("a", "type Query { a: User } type User @key(fields: \"id\") { id: ID! name: String @shareable }"),
            ("b", "type User @key(fields: \"id\") { id: ID! name: String! @shareable }"),
        ]);
        assert!(sdl.contains("@join__type(graph: A, key: \"id\")"), "{sdl}");
        assert!(sdl.contains("@join__type(graph: B, key: \"id\")"), "{sdl}");
        assert!(
            sdl.contains(
                "name: String @join__field(graph: A, type: \"String\") @join__field(graph: B, type: \"String!\")"
            ),
            "{sdl}"
        );
        assert!(sdl.contains("A @join__graph(name: \"a\", url: \"\")"), "{sdl}");
        assert!(sdl.contains("@link(url: \"https://specs.apollo.dev/join/v0.3\", for: EXECUTION)"), "{sdl}");
    }

    #[test]
    fn fields_resolved_everywhere_need_no_join_field() {
        let sdl = supergraph_sdl(&[("a", "type Query { hello: String }")]);
        assert!(sdl.contains("hello: String\n"), "{sdl}");
        assert!(!sdl.contains("@join__field"), "{sdl}");
    }

    #[test]
    fn feature_specifications_are_linked_when_used() {
        let sdl = supergraph_sdl(&[(
            "a",
            "type Query { a: Int @tag(name: \"public\") b: Int @authenticated }",
        )]);
        assert!(sdl.contains("@link(url: \"https://specs.apollo.dev/tag/v0.3\")"), "{sdl}");
        assert!(
            sdl.contains("@link(url: \"https://specs.apollo.dev/authenticated/v0.1\", for: SECURITY)"),
            "{sdl}"
        );
        assert!(!sdl.contains("inaccessible/v0.2"), "{sdl}");
        assert!(sdl.contains("directive @tag(name: String!) repeatable"), "{sdl}");
    }

    #[test]
    fn override_label_upgrades_join() {
        let sdl = supergraph_sdl(&[
            ("a", "type Query { a: Int }"),
            ("b", "type Query { a: Int @override(from: \"a\", label: \"percent(5)\") }"),
        ]);
        assert!(sdl.contains("https://specs.apollo.dev/join/v0.4"), "{sdl}");
        assert!(sdl.contains("overrideLabel: \"percent(5)\""), "{sdl}");
    }

    #[test]
    fn output_is_sorted() {
        let sdl = supergraph_sdl(&[("a", "type Query { b: Int a: Zebra } enum Zebra { Z Y }")]);
        let position = |needle: &str| sdl.find(needle).unwrap();
        assert!(position("type Query") < position("enum Zebra"));
        assert!(position("  a: Zebra") < position("  b: Int"));
        assert!(position("  Y @join__enumValue") < position("  Z @join__enumValue"));
    }

    #[test]
    fn api_schema_drops_routing_and_inaccessible_elements() {
        let sdl = api_sdl(&[(
            "a",
            r#"
            type Query {
              user(id: ID!, debug: Boolean @inaccessible): User
              legacy: Int @deprecated(reason: "gone")
            }
            type User @key(fields: "id") { id: ID! secret: String @inaccessible role: Role }
            enum Role { ADMIN INTERNAL @inaccessible }
            "#,
        )]);
        assert!(!sdl.contains("join__"), "{sdl}");
        assert!(!sdl.contains("link__"), "{sdl}");
        assert!(!sdl.contains("@link"), "{sdl}");
        assert!(!sdl.contains("inaccessible"), "{sdl}");
        assert!(!sdl.contains("secret"), "{sdl}");
        assert!(!sdl.contains("INTERNAL"), "{sdl}");
        assert!(!sdl.contains("debug"), "{sdl}");
        assert!(sdl.contains("user(id: ID!): User"), "{sdl}");
        assert!(sdl.contains("@deprecated(reason: \"gone\")"), "{sdl}");
    }

    #[test]
    fn api_schema_drops_inaccessible_types_from_unions_and_implementations() {
        let sdl = api_sdl(&[(
            "a",
            r#"
            type Query { result: Result node: Node }
            interface Node { id: ID! }
            interface Hidden @inaccessible { id: ID! }
            type Ok implements Node & Hidden { id: ID! }
            type Internal @inaccessible { id: ID! }
            union Result = Ok | Internal
            "#,
        )]);
        assert!(sdl.contains("union Result = Ok"), "{sdl}");
        assert!(!sdl.contains("Internal"), "{sdl}");
        assert!(sdl.contains("type Ok implements Node {"), "{sdl}");
        assert!(!sdl.contains("Hidden"), "{sdl}");
    }
}
