//! Checks that need the whole merged schema: root types, interface implementations and
//! `@inaccessible` consistency.
use apollo_compiler::ast::Type;
use itertools::Itertools;

use super::MergeContext;
use super::state::CompositeTypeState;
use super::state::SupergraphState;
use super::state::SupergraphType;
use crate::error::CompositionError;
use crate::subgraph::state::RootKind;
use crate::utils::human_readable::human_readable_subgraph_names;

pub(super) fn validate(ctx: &mut MergeContext, supergraph: &SupergraphState) {
    check_query_root(ctx, supergraph);
    for ty in supergraph.types.values() {
        if let SupergraphType::Interface(interface) = ty {
            check_interface_implementations(ctx, supergraph, interface);
        }
    }
    check_inaccessible(ctx, supergraph);
}

fn check_query_root(ctx: &mut MergeContext, supergraph: &SupergraphState) {
    let query = RootKind::Query.default_type_name();
    let has_query_fields = supergraph
        .composite(&query)
        .is_some_and(|query| !query.fields.is_empty());
    if !supergraph.root_types.contains(&RootKind::Query) || !has_query_fields {
        ctx.error(CompositionError::NoQueries {
            message: "No queries found in any subgraph: a supergraph must have a query root type."
                .to_string(),
        });
        return;
    }
    if supergraph
        .types
        .get(&query)
        .is_some_and(|ty| ty.metadata().inaccessible)
    {
        ctx.error(CompositionError::QueryRootTypeInaccessible {
            message: format!(
                "Type \"{query}\" is @inaccessible but is the query root type, which must be in the API schema."
            ),
        });
    }
}

/// Every field of an interface must exist on every object implementing it in the supergraph.
fn check_interface_implementations(
    ctx: &mut MergeContext,
    supergraph: &SupergraphState,
    interface: &CompositeTypeState,
) {
    for implementation in supergraph.implementations(&interface.name) {
        for field in interface.fields.values() {
            if implementation.fields.contains_key(&field.name) {
                continue;
            }
            let declared_in = field
                .by_graph
                .keys()
                .map(|id| ctx.graph_name(id))
                .collect_vec();
            let implemented_in = implementation
                .by_graph
                .iter()
                .filter(|(_, in_graph)| in_graph.interfaces.contains(&interface.name))
                .map(|(id, _)| ctx.graph_name(id))
                .collect_vec();
            ctx.error(CompositionError::InterfaceFieldNoImplem {
                message: format!(
                    "Interface field \"{}.{}\" is declared in {} but type \"{}\", which implements \"{}\" only in {} does not have field \"{}\".",
                    interface.name,
                    field.name,
                    human_readable_subgraph_names(&declared_in),
                    implementation.name,
                    interface.name,
                    human_readable_subgraph_names(&implemented_in),
                    field.name,
                ),
            });
        }
    }
}

fn check_inaccessible(ctx: &mut MergeContext, supergraph: &SupergraphState) {
    let is_hidden = |ty: &Type| {
        supergraph
            .types
            .get(ty.inner_named_type())
            .is_some_and(|ty| ty.metadata().inaccessible)
    };
    let referenced = |ty: &Type, coordinate: String| {
        is_hidden(ty).then(|| CompositionError::ReferencedInaccessible {
            message: format!(
                "Type \"{}\" is @inaccessible but is referenced by \"{coordinate}\", which is in the API schema.",
                ty.inner_named_type()
            ),
        })
    };

    let mut errors = Vec::new();
    for ty in supergraph.types.values() {
        if ty.metadata().inaccessible {
            continue;
        }
        let (children, total, visible) = match ty {
            SupergraphType::Object(composite) | SupergraphType::Interface(composite) => {
                let mut visible = 0;
                for field in composite.fields.values() {
                    if field.metadata.inaccessible {
                        continue;
                    }
                    visible += 1;
                    errors.extend(referenced(
                        &field.ty,
                        format!("{}.{}", composite.name, field.name),
                    ));
                    for arg in field.args.values().filter(|arg| !arg.metadata.inaccessible) {
                        errors.extend(referenced(
                            &arg.ty,
                            format!("{}.{}({}:)", composite.name, field.name, arg.name),
                        ));
                    }
                }
                ("fields", composite.fields.len(), visible)
            }
            SupergraphType::InputObject(input) => {
                let mut visible = 0;
                for field in input.fields.values() {
                    if field.metadata.inaccessible {
                        continue;
                    }
                    visible += 1;
                    errors.extend(referenced(&field.ty, format!("{}.{}", input.name, field.name)));
                }
                ("fields", input.fields.len(), visible)
            }
            SupergraphType::Enum(enum_type) => {
                let visible = enum_type
                    .values
                    .values()
                    .filter(|value| !value.metadata.inaccessible)
                    .count();
                ("values", enum_type.values.len(), visible)
            }
            SupergraphType::Union(union) => {
                let visible = union
                    .members
                    .iter()
                    .filter(|member| {
                        !supergraph
                            .types
                            .get(*member)
                            .is_some_and(|member| member.metadata().inaccessible)
                    })
                    .count();
                ("members", union.members.len(), visible)
            }
            SupergraphType::Scalar(_) => continue,
        };
        if total > 0 && visible == 0 {
            errors.push(CompositionError::OnlyInaccessibleChildren {
                message: format!(
                    "Type \"{}\" is in the API schema but all of its {children} are @inaccessible.",
                    ty.name()
                ),
            });
        }
    }

    for error in errors {
        ctx.error(error);
    }
}
