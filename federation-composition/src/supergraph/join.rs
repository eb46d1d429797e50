//! Renders merged types as SDL definitions carrying `join__*` routing directives.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Argument;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::DirectiveList;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use itertools::Itertools;

use crate::merger::state::CompositeTypeState;
use crate::merger::state::EnumTypeState;
use crate::merger::state::FieldState;
use crate::merger::state::InputObjectTypeState;
use crate::merger::state::ScalarTypeState;
use crate::merger::state::SupergraphType;
use crate::merger::state::UnionTypeState;
use crate::subgraph::state::Argument as InputValue;
use crate::subgraph::state::DirectiveDefinitionState;
use crate::subgraph::state::Deprecation;
use crate::subgraph::state::Metadata;

pub(super) fn applied_directive(name: Name, arguments: Vec<(Name, Value)>) -> Node<Directive> {
    Node::new(Directive {
        name,
        arguments: arguments
            .into_iter()
            .map(|(name, value)| {
                Node::new(Argument {
                    name,
                    value: Node::new(value),
                })
            })
            .collect(),
    })
}

fn string(value: impl Into<String>) -> Value {
    Value::String(value.into())
}

fn string_lists(lists: &[Vec<String>]) -> Value {
    Value::List(
        lists
            .iter()
            .map(|list| {
                Node::new(Value::List(
                    list.iter().map(|item| Node::new(string(item))).collect(),
                ))
            })
            .collect(),
    )
}

fn description(metadata: &Metadata) -> Option<Node<str>> {
    metadata.description.as_deref().map(Node::new_str)
}

/// `@join__type` for one subgraph: one application per key, or a single bare one.
fn join_type(
    graph: &Name,
    keys: &[(String, bool)],
    extension: bool,
    interface_object: bool,
) -> Vec<Node<Directive>> {
    let base = |key: Option<&(String, bool)>| {
        let mut arguments = vec![(name!("graph"), Value::Enum(graph.clone()))];
        if let Some((fields, resolvable)) = key {
            arguments.push((name!("key"), string(fields.as_str())));
            if extension {
                arguments.push((name!("extension"), Value::Boolean(true)));
            }
            if !resolvable {
                arguments.push((name!("resolvable"), Value::Boolean(false)));
            }
        }
        if interface_object {
            arguments.push((name!("isInterfaceObject"), Value::Boolean(true)));
        }
        applied_directive(name!("join__type"), arguments)
    };
    if keys.is_empty() {
        vec![base(None)]
    } else {
        keys.iter().map(|key| base(Some(key))).collect()
    }
}

fn join_type_in_graphs<'a>(graphs: impl IntoIterator<Item = &'a Name>) -> Vec<Node<Directive>> {
    graphs
        .into_iter()
        .flat_map(|graph| join_type(graph, &[], false, false))
        .collect()
}

/// Directives every element may carry: deprecation, tags and the authorization markers, then
/// the composed directives verbatim.
fn metadata_directives(
    metadata: &Metadata,
    deprecated: Option<&Deprecation>,
) -> Vec<Node<Directive>> {
    let mut directives = Vec::new();
    if let Some(deprecation) = deprecated {
        directives.push(applied_directive(
            name!("deprecated"),
            deprecation
                .reason
                .iter()
                .map(|reason| (name!("reason"), string(reason.as_str())))
                .collect(),
        ));
    }
    for tag in &metadata.tags {
        directives.push(applied_directive(
            name!("tag"),
            vec![(name!("name"), string(tag.as_str()))],
        ));
    }
    if metadata.inaccessible {
        directives.push(applied_directive(name!("inaccessible"), vec![]));
    }
    if metadata.authenticated {
        directives.push(applied_directive(name!("authenticated"), vec![]));
    }
    if !metadata.requires_scopes.is_empty() {
        directives.push(applied_directive(
            name!("requiresScopes"),
            vec![(name!("scopes"), string_lists(&metadata.requires_scopes))],
        ));
    }
    if !metadata.policies.is_empty() {
        directives.push(applied_directive(
            name!("policy"),
            vec![(name!("policies"), string_lists(&metadata.policies))],
        ));
    }
    directives.extend(metadata.composed_directives.iter().cloned());
    directives
}

fn input_value_definition(value: &InputValue) -> Node<ast::InputValueDefinition> {
    Node::new(ast::InputValueDefinition {
        description: description(&value.metadata),
        name: value.name.clone(),
        ty: Node::new(value.ty.clone()),
        default_value: value.default_value.clone(),
        directives: DirectiveList(metadata_directives(&value.metadata, value.deprecated.as_ref())),
    })
}

pub(super) fn render_type(ty: &SupergraphType) -> Definition {
    match ty {
        SupergraphType::Object(object) => {
            let (directives, fields) = render_composite(object);
            Definition::ObjectTypeDefinition(Node::new(ast::ObjectTypeDefinition {
                description: description(&object.metadata),
                name: object.name.clone(),
                implements_interfaces: object.interfaces.iter().cloned().collect(),
                directives: DirectiveList(directives),
                fields,
            }))
        }
        SupergraphType::Interface(interface) => {
            let (directives, fields) = render_composite(interface);
            Definition::InterfaceTypeDefinition(Node::new(ast::InterfaceTypeDefinition {
                description: description(&interface.metadata),
                name: interface.name.clone(),
                implements_interfaces: interface.interfaces.iter().cloned().collect(),
                directives: DirectiveList(directives),
                fields,
            }))
        }
        SupergraphType::InputObject(input) => render_input_object(input),
        SupergraphType::Union(union) => render_union(union),
        SupergraphType::Enum(enum_type) => render_enum(enum_type),
        SupergraphType::Scalar(scalar) => render_scalar(scalar),
    }
}

fn render_composite(
    ty: &CompositeTypeState,
) -> (Vec<Node<Directive>>, Vec<Node<ast::FieldDefinition>>) {
    let mut directives = Vec::new();
    for (graph, in_graph) in &ty.by_graph {
        let keys = in_graph
            .keys
            .iter()
            .map(|key| (key.field_set.as_str().to_string(), key.resolvable))
            .collect_vec();
        directives.extend(join_type(
            graph,
            &keys,
            in_graph.extension,
            in_graph.interface_object,
        ));
    }
    for (graph, in_graph) in &ty.by_graph {
        for interface in &in_graph.interfaces {
            directives.push(applied_directive(
                name!("join__implements"),
                vec![
                    (name!("graph"), Value::Enum(graph.clone())),
                    (name!("interface"), string(interface.as_str())),
                ],
            ));
        }
    }
    directives.extend(metadata_directives(&ty.metadata, None));

    let fields = ty
        .fields
        .values()
        .map(|field| {
            let mut directives = join_fields(field);
            directives.extend(metadata_directives(&field.metadata, field.deprecated.as_ref()));
            Node::new(ast::FieldDefinition {
                description: description(&field.metadata),
                name: field.name.clone(),
                arguments: field.args.values().map(input_value_definition).collect(),
                ty: field.ty.clone(),
                directives: DirectiveList(directives),
            })
        })
        .collect();
    (directives, fields)
}

/// One `@join__field` per routed subgraph, carrying only what differs from the merged field.
fn join_fields(field: &FieldState) -> Vec<Node<Directive>> {
    if !field.join_field {
        return Vec::new();
    }
    let routed = field.routed().collect_vec();
    let with_type = routed
        .iter()
        .any(|(_, contribution)| contribution.ty != field.ty);
    routed
        .into_iter()
        .map(|(graph, contribution)| {
            let mut arguments = vec![(name!("graph"), Value::Enum(graph.clone()))];
            if let Some(requires) = &contribution.requires {
                arguments.push((name!("requires"), string(requires.as_str())));
            }
            if let Some(provides) = &contribution.provides {
                arguments.push((name!("provides"), string(provides.as_str())));
            }
            if with_type {
                arguments.push((name!("type"), string(contribution.ty.to_string())));
            }
            if contribution.external {
                arguments.push((name!("external"), Value::Boolean(true)));
            }
            if let Some(from) = &contribution.override_from {
                arguments.push((name!("override"), string(from.as_str())));
            }
            if let Some(label) = &contribution.override_label {
                arguments.push((name!("overrideLabel"), string(label.as_str())));
            }
            if contribution.used_overridden {
                arguments.push((name!("usedOverridden"), Value::Boolean(true)));
            }
            applied_directive(name!("join__field"), arguments)
        })
        .collect()
}

fn render_input_object(input: &InputObjectTypeState) -> Definition {
    let mut directives = join_type_in_graphs(input.by_graph.keys());
    directives.extend(metadata_directives(&input.metadata, None));
    Definition::InputObjectTypeDefinition(Node::new(ast::InputObjectTypeDefinition {
        description: description(&input.metadata),
        name: input.name.clone(),
        directives: DirectiveList(directives),
        fields: input.fields.values().map(input_value_definition).collect(),
    }))
}

fn render_union(union: &UnionTypeState) -> Definition {
    let mut directives = join_type_in_graphs(union.by_graph.keys());
    for (graph, members) in &union.by_graph {
        for member in members {
            directives.push(applied_directive(
                name!("join__unionMember"),
                vec![
                    (name!("graph"), Value::Enum(graph.clone())),
                    (name!("member"), string(member.as_str())),
                ],
            ));
        }
    }
    directives.extend(metadata_directives(&union.metadata, None));
    Definition::UnionTypeDefinition(Node::new(ast::UnionTypeDefinition {
        description: description(&union.metadata),
        name: union.name.clone(),
        directives: DirectiveList(directives),
        members: union.members.iter().cloned().collect(),
    }))
}

fn render_enum(enum_type: &EnumTypeState) -> Definition {
    let mut directives = join_type_in_graphs(&enum_type.graphs);
    directives.extend(metadata_directives(&enum_type.metadata, None));
    let values = enum_type
        .values
        .values()
        .map(|value| {
            let mut directives = value
                .graphs
                .iter()
                .map(|graph| {
                    applied_directive(
                        name!("join__enumValue"),
                        vec![(name!("graph"), Value::Enum(graph.clone()))],
                    )
                })
                .collect_vec();
            directives.extend(metadata_directives(&value.metadata, value.deprecated.as_ref()));
            Node::new(ast::EnumValueDefinition {
                description: description(&value.metadata),
                value: value.name.clone(),
                directives: DirectiveList(directives),
            })
        })
        .collect();
    Definition::EnumTypeDefinition(Node::new(ast::EnumTypeDefinition {
        description: description(&enum_type.metadata),
        name: enum_type.name.clone(),
        directives: DirectiveList(directives),
        values,
    }))
}

fn render_scalar(scalar: &ScalarTypeState) -> Definition {
    let mut directives = join_type_in_graphs(&scalar.graphs);
    directives.extend(metadata_directives(&scalar.metadata, None));
    if let Some(url) = &scalar.specified_by {
        directives.push(applied_directive(
            name!("specifiedBy"),
            vec![(name!("url"), string(url.as_str()))],
        ));
    }
    Definition::ScalarTypeDefinition(Node::new(ast::ScalarTypeDefinition {
        description: description(&scalar.metadata),
        name: scalar.name.clone(),
        directives: DirectiveList(directives),
    }))
}

pub(super) fn render_directive_definition(definition: &DirectiveDefinitionState) -> Definition {
    Definition::DirectiveDefinition(Node::new(ast::DirectiveDefinition {
        description: definition.description.as_deref().map(Node::new_str),
        name: definition.name.clone(),
        arguments: definition.args.values().map(input_value_definition).collect(),
        repeatable: definition.repeatable,
        locations: definition.locations.clone(),
    }))
}
