//! Object and interface types, including interfaces some subgraphs declare as `@interfaceObject`.
use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use itertools::Itertools;

use super::MergeContext;
use super::fields;
use super::merge_metadata;
use super::state::CompositeTypeInGraph;
use super::state::CompositeTypeState;
use super::state::FieldInGraph;
use super::state::FieldState;
use super::state::SupergraphType;
use crate::ensure;
use crate::error::FederationError;
use crate::subgraph::state::Graph;
use crate::subgraph::state::InterfaceType;
use crate::subgraph::state::ObjectType;

pub(super) fn visit_object(
    ctx: &mut MergeContext,
    target: &mut CompositeTypeState,
    graph: &Graph,
    object: &ObjectType,
) {
    merge_metadata(ctx, &object.name, &graph.name, &mut target.metadata, &object.metadata);
    target.interfaces.extend(object.interfaces.iter().cloned());
    target.by_graph.insert(
        graph.id.clone(),
        CompositeTypeInGraph {
            keys: object.keys.clone(),
            extension: object.extension,
            interfaces: object.interfaces.clone(),
            interface_object: false,
        },
    );
    for field in object.fields.values() {
        fields::visit_field(ctx, &target.name, &mut target.fields, graph, field);
    }
}

pub(super) fn visit_interface(
    ctx: &mut MergeContext,
    target: &mut CompositeTypeState,
    graph: &Graph,
    interface: &InterfaceType,
) {
    merge_metadata(ctx, &interface.name, &graph.name, &mut target.metadata, &interface.metadata);
    target.interfaces.extend(interface.interfaces.iter().cloned());
    target.by_graph.insert(
        graph.id.clone(),
        CompositeTypeInGraph {
            keys: interface.keys.clone(),
            extension: interface.extension,
            interfaces: interface.interfaces.clone(),
            interface_object: false,
        },
    );
    for field in interface.fields.values() {
        fields::visit_field(ctx, &target.name, &mut target.fields, graph, field);
    }
}

/// An `@interfaceObject` contributes its keys and fields to the interface it stands for.
pub(super) fn visit_interface_object(
    ctx: &mut MergeContext,
    target: &mut CompositeTypeState,
    graph: &Graph,
    object: &ObjectType,
) {
    merge_metadata(ctx, &object.name, &graph.name, &mut target.metadata, &object.metadata);
    target.by_graph.insert(
        graph.id.clone(),
        CompositeTypeInGraph {
            keys: object.keys.clone(),
            extension: object.extension,
            interfaces: Default::default(),
            interface_object: true,
        },
    );
    for field in object.fields.values() {
        fields::visit_field(ctx, &target.name, &mut target.fields, graph, field);
    }
}

/// Copies the fields an `@interfaceObject` subgraph resolves onto every implementation of the
/// interface, since that subgraph resolves them for all implementations.
pub(super) fn propagate_interface_object_fields(types: &mut IndexMap<Name, SupergraphType>) {
    let mut additions: Vec<(Name, Name, FieldState, FieldInGraph)> = Vec::new();
    for ty in types.values() {
        let SupergraphType::Interface(interface) = ty else {
            continue;
        };
        let interface_object_graphs = interface
            .by_graph
            .iter()
            .filter(|(_, in_graph)| in_graph.interface_object)
            .map(|(id, _)| id)
            .collect_vec();
        if interface_object_graphs.is_empty() {
            continue;
        }
        let implementations = types
            .values()
            .filter_map(|ty| match ty {
                SupergraphType::Object(object) if object.interfaces.contains(&interface.name) => {
                    Some(object.name.clone())
                }
                _ => None,
            })
            .collect_vec();
        for graph in interface_object_graphs {
            for field in interface.fields.values() {
                let Some(contribution) = field.by_graph.get(graph) else {
                    continue;
                };
                let mut contribution = contribution.clone();
                contribution.from_interface_object = true;
                for implementation in &implementations {
                    additions.push((
                        implementation.clone(),
                        graph.clone(),
                        field.clone(),
                        contribution.clone(),
                    ));
                }
            }
        }
    }

    for (implementation, graph, field, contribution) in additions {
        let Some(SupergraphType::Object(object)) = types.get_mut(&implementation) else {
            continue;
        };
        let state = object
            .fields
            .entry(field.name.clone())
            .or_insert_with(|| FieldState {
                name: field.name.clone(),
                ty: contribution.ty.clone(),
                args: Default::default(),
                deprecated: field.deprecated.clone(),
                metadata: field.metadata.clone(),
                by_graph: Default::default(),
                join_field: false,
            });
        state.by_graph.entry(graph).or_insert(contribution);
    }
}

pub(super) fn finalize_composite(
    ctx: &mut MergeContext,
    ty: &mut CompositeTypeState,
    is_object: bool,
) -> Result<(), FederationError> {
    ensure!(
        !ty.by_graph.is_empty(),
        "type \"{}\" has no subgraph contribution",
        ty.name
    );
    let type_graphs = ty.by_graph.keys().collect::<IndexSet<_>>();
    for field in ty.fields.values_mut() {
        fields::finalize_field(ctx, &ty.name, is_object, &type_graphs, field);
    }
    Ok(())
}
