//! Merging of output fields and of input values (arguments and input object fields).
use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use itertools::Itertools;
use tracing::trace;

use super::MergeContext;
use super::merge_metadata;
use super::merge_types;
use super::state::FieldInGraph;
use super::state::FieldState;
use crate::error::CompositionError;
use crate::error::HintCode;
use crate::subgraph::state::Argument;
use crate::subgraph::state::Field;
use crate::subgraph::state::Graph;
use crate::utils::human_readable::describe_mismatch;
use crate::utils::human_readable::human_readable_subgraph_names;

pub(super) fn visit_field(
    ctx: &mut MergeContext,
    parent: &Name,
    fields: &mut IndexMap<Name, FieldState>,
    graph: &Graph,
    field: &Field,
) {
    let state = fields
        .entry(field.name.clone())
        .or_insert_with(|| FieldState {
            name: field.name.clone(),
            ty: field.ty.clone(),
            args: Default::default(),
            deprecated: None,
            metadata: Default::default(),
            by_graph: Default::default(),
            join_field: false,
        });
    merge_metadata(
        ctx,
        &format!("{parent}.{}", field.name),
        &graph.name,
        &mut state.metadata,
        &field.metadata,
    );
    if state.deprecated.is_none() {
        state.deprecated.clone_from(&field.deprecated);
    }
    state
        .by_graph
        .insert(graph.id.clone(), field_in_graph(field, false));
}

pub(super) fn field_in_graph(field: &Field, from_interface_object: bool) -> FieldInGraph {
    FieldInGraph {
        ty: field.ty.clone(),
        args: field.args.clone(),
        external: field.external,
        shareable: field.shareable,
        used_in_key: field.used_in_key,
        provides: field.provides.clone(),
        requires: field.requires.clone(),
        override_from: field.override_from.clone(),
        override_label: field.override_label.clone(),
        overridden: false,
        progressively_overridden: false,
        used_overridden: false,
        from_interface_object,
    }
}

/// Decides everything about a field once all subgraphs have contributed to it.
///
/// `type_graphs` are the subgraphs declaring the parent type: a field needs per-subgraph routing
/// as soon as it is not resolved identically by all of them.
pub(super) fn finalize_field(
    ctx: &mut MergeContext,
    parent: &Name,
    is_object: bool,
    type_graphs: &IndexSet<&Name>,
    field: &mut FieldState,
) {
    let coordinate = format!("{parent}.{}", field.name);
    resolve_overrides(ctx, &coordinate, field);
    merge_field_type(ctx, &coordinate, field);
    if is_object {
        check_shareability(ctx, &coordinate, field);
    }
    merge_field_arguments(ctx, &coordinate, field);
    field.join_field = needs_join_field(field, type_graphs);
    trace!(field = %coordinate, ty = %field.ty, join_field = field.join_field, "merged field");
}

fn resolve_overrides(ctx: &mut MergeContext, coordinate: &str, field: &mut FieldState) {
    let overrides = field
        .by_graph
        .iter()
        .filter_map(|(id, contribution)| {
            let from = contribution.override_from.clone()?;
            Some((id.clone(), from, contribution.override_label.is_some()))
        })
        .collect_vec();

    for (target_id, from, labelled) in overrides {
        let target_name = ctx.graph_name(&target_id);
        if from == target_name {
            ctx.error(CompositionError::OverrideFromSelfError {
                message: format!(
                    "Source and destination subgraphs \"{from}\" are the same for overridden field \"{coordinate}\""
                ),
            });
            continue;
        }
        let Some(source_graph) = ctx.graph_by_name(&from) else {
            ctx.hint(
                HintCode::FromSubgraphDoesNotExist,
                format!(
                    "Source subgraph \"{from}\" for field \"{coordinate}\" on subgraph \"{target_name}\" does not exist."
                ),
            );
            continue;
        };
        let Some(source) = field.by_graph.get_mut(&source_graph.id) else {
            continue;
        };
        if source.override_from.is_some() {
            ctx.error(CompositionError::OverrideSourceHasOverride {
                message: format!(
                    "Field \"{coordinate}\" on subgraph \"{target_name}\" is also marked with directive @override in subgraph \"{from}\". Only one @override directive is allowed per field."
                ),
            });
            continue;
        }
        if labelled {
            source.progressively_overridden = true;
            continue;
        }
        source.overridden = true;
        if source.used_in_key {
            source.used_overridden = true;
        } else {
            ctx.hint(
                HintCode::OverriddenFieldCanBeRemoved,
                format!(
                    "Field \"{coordinate}\" on subgraph \"{from}\" is overridden. Consider removing it."
                ),
            );
        }
    }
}

fn merge_field_type(ctx: &mut MergeContext, coordinate: &str, field: &mut FieldState) {
    let considered = field
        .by_graph
        .iter()
        .filter(|(_, contribution)| !contribution.overridden)
        .collect_vec();
    let Some((_, first)) = considered.first() else {
        return;
    };

    let compatible = considered
        .iter()
        .all(|(_, contribution)| merge_types(&first.ty, &contribution.ty, true).is_some());
    if !compatible {
        let values = considered
            .iter()
            .map(|(id, contribution)| (ctx.graph_name(id), format!("\"{}\"", contribution.ty)))
            .collect_vec();
        ctx.error(CompositionError::FieldTypeMismatch {
            message: format!(
                "Type of field \"{coordinate}\" is incompatible across subgraphs: {}",
                describe_mismatch("type", &values)
            ),
        });
        return;
    }

    let non_external = considered
        .iter()
        .filter(|(_, contribution)| !contribution.external)
        .copied()
        .collect_vec();
    let candidates = if non_external.is_empty() {
        &considered
    } else {
        &non_external
    };
    let is_key_field = considered
        .iter()
        .any(|(_, contribution)| contribution.used_in_key);
    let merged = if is_key_field {
        candidates[0].1.ty.clone()
    } else {
        candidates
            .iter()
            .skip(1)
            .try_fold(candidates[0].1.ty.clone(), |merged, (_, contribution)| {
                merge_types(&merged, &contribution.ty, true)
            })
            .unwrap_or_else(|| candidates[0].1.ty.clone())
    };
    field.ty = merged;
}

fn check_shareability(ctx: &mut MergeContext, coordinate: &str, field: &FieldState) {
    let resolving = field
        .by_graph
        .iter()
        .filter(|(_, contribution)| contribution.resolves() && !contribution.from_interface_object)
        .collect_vec();
    if resolving.len() < 2 {
        return;
    }
    let non_shareable = resolving
        .iter()
        .filter(|(_, contribution)| !contribution.shareable && !contribution.used_in_key)
        .map(|(id, _)| ctx.graph_name(id))
        .collect_vec();
    if non_shareable.is_empty() {
        return;
    }
    let non_shareable_in = if non_shareable.len() == resolving.len() {
        "all of them".to_string()
    } else {
        human_readable_subgraph_names(&non_shareable)
    };
    ctx.error(CompositionError::InvalidFieldSharing {
        message: format!(
            "Non-shareable field \"{coordinate}\" is resolved from multiple subgraphs: it is resolved from {} and defined as non-shareable in {non_shareable_in}",
            human_readable_subgraph_names(resolving.iter().map(|(id, _)| ctx.graph_name(id))),
        ),
    });
}

fn merge_field_arguments(ctx: &mut MergeContext, coordinate: &str, field: &mut FieldState) {
    let non_external = field
        .by_graph
        .iter()
        .filter(|(_, contribution)| !contribution.external && !contribution.overridden)
        .map(|(id, contribution)| (ctx.graph_name(id), &contribution.args))
        .collect_vec();
    let sources = if non_external.is_empty() {
        field
            .by_graph
            .iter()
            .map(|(id, contribution)| (ctx.graph_name(id), &contribution.args))
            .collect_vec()
    } else {
        non_external
    };
    field.args = merge_input_values(ctx, InputValuePosition::Argument, coordinate, &sources);
}

fn needs_join_field(field: &FieldState, type_graphs: &IndexSet<&Name>) -> bool {
    let routed = field.routed().collect_vec();
    routed.len() != type_graphs.len()
        || routed.len() != field.by_graph.len()
        || routed.iter().any(|(id, contribution)| {
            !type_graphs.contains(id)
                || contribution.external
                || contribution.requires.is_some()
                || contribution.provides.is_some()
                || contribution.override_from.is_some()
                || contribution.used_overridden
                || contribution.ty != field.ty
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InputValuePosition {
    Argument,
    InputField,
}

impl InputValuePosition {
    fn coordinate(&self, parent: &str, name: &Name) -> String {
        match self {
            InputValuePosition::Argument => format!("{parent}({name}:)"),
            InputValuePosition::InputField => format!("{parent}.{name}"),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            InputValuePosition::Argument => "Argument",
            InputValuePosition::InputField => "Input object field",
        }
    }
}

/// Keeps the input values defined by every source, merging their types the restrictive way.
///
/// `sources` pairs each subgraph name with the values it defines on the element `parent`.
pub(super) fn merge_input_values(
    ctx: &mut MergeContext,
    position: InputValuePosition,
    parent: &str,
    sources: &[(&str, &IndexMap<Name, Argument>)],
) -> IndexMap<Name, Argument> {
    let names = sources
        .iter()
        .flat_map(|(_, values)| values.keys())
        .collect::<IndexSet<_>>();
    let mut merged_values = IndexMap::default();
    for name in names {
        let coordinate = position.coordinate(parent, name);
        let present = sources
            .iter()
            .filter_map(|(graph, values)| values.get(name).map(|value| (*graph, value)))
            .collect_vec();

        if present.len() < sources.len() {
            report_missing_input_value(ctx, position, &coordinate, name, sources, &present);
            continue;
        }

        let Some(ty) = present
            .iter()
            .skip(1)
            .try_fold(present[0].1.ty.clone(), |merged, (_, value)| {
                merge_types(&merged, &value.ty, false)
            })
        else {
            let values = present
                .iter()
                .map(|(graph, value)| (*graph, format!("\"{}\"", value.ty)))
                .collect_vec();
            let message = describe_mismatch("type", &values);
            ctx.error(match position {
                InputValuePosition::Argument => CompositionError::FieldArgumentTypeMismatch {
                    message: format!(
                        "Type of argument \"{coordinate}\" is incompatible across subgraphs: {message}"
                    ),
                },
                InputValuePosition::InputField => CompositionError::FieldTypeMismatch {
                    message: format!(
                        "Type of field \"{coordinate}\" is incompatible across subgraphs: {message}"
                    ),
                },
            });
            continue;
        };

        let defaults = present
            .iter()
            .filter_map(|(graph, value)| {
                value
                    .default_value
                    .as_ref()
                    .map(|default| (*graph, default))
            })
            .collect_vec();
        if let Some((_, first_default)) = defaults.first() {
            if defaults.iter().any(|(_, default)| default != first_default) {
                let values = present
                    .iter()
                    .map(|(graph, value)| {
                        let text = value
                            .default_value
                            .as_ref()
                            .map(|default| default.to_string())
                            .unwrap_or_else(|| "none".to_string());
                        (*graph, text)
                    })
                    .collect_vec();
                let message = format!(
                    "{} \"{coordinate}\" has incompatible default values across subgraphs: {}",
                    position.label(),
                    describe_mismatch("default value", &values)
                );
                ctx.error(match position {
                    InputValuePosition::Argument => {
                        CompositionError::FieldArgumentDefaultMismatch { message }
                    }
                    InputValuePosition::InputField => {
                        CompositionError::InputFieldDefaultMismatch { message }
                    }
                });
                continue;
            }
            if defaults.len() < present.len() {
                let with_default = defaults.iter().map(|(graph, _)| *graph).collect_vec();
                let without_default = present
                    .iter()
                    .map(|(graph, _)| *graph)
                    .filter(|graph| !with_default.contains(graph))
                    .collect_vec();
                ctx.hint(
                    HintCode::InconsistentDefaultValuePresence,
                    format!(
                        "{} \"{coordinate}\" has a default value in only some subgraphs: it has a default value in {} but none in {}.",
                        position.label(),
                        human_readable_subgraph_names(&with_default),
                        human_readable_subgraph_names(&without_default),
                    ),
                );
            }
        }

        let mut merged = Argument {
            name: name.clone(),
            ty,
            default_value: defaults.first().map(|(_, default)| (*default).clone()),
            deprecated: None,
            metadata: Default::default(),
        };
        for (graph, value) in &present {
            merge_metadata(ctx, &coordinate, graph, &mut merged.metadata, &value.metadata);
            if merged.deprecated.is_none() {
                merged.deprecated.clone_from(&value.deprecated);
            }
        }
        merged_values.insert(name.clone(), merged);
    }
    merged_values
}

fn report_missing_input_value(
    ctx: &mut MergeContext,
    position: InputValuePosition,
    coordinate: &str,
    name: &Name,
    sources: &[(&str, &IndexMap<Name, Argument>)],
    present: &[(&str, &Argument)],
) {
    let missing = sources
        .iter()
        .filter(|(_, values)| !values.contains_key(name))
        .map(|(graph, _)| *graph)
        .collect_vec();
    let required = present
        .iter()
        .filter(|(_, value)| value.is_required())
        .map(|(graph, _)| *graph)
        .collect_vec();
    if !required.is_empty() {
        let message = format!(
            "{} \"{coordinate}\" is required in some subgraphs but does not appear in all subgraphs: it is required in {} but does not appear in {}",
            position.label(),
            human_readable_subgraph_names(&required),
            human_readable_subgraph_names(&missing),
        );
        ctx.error(match position {
            InputValuePosition::Argument => {
                CompositionError::RequiredArgumentMissingInSomeSubgraph { message }
            }
            InputValuePosition::InputField => {
                CompositionError::RequiredInputFieldMissingInSomeSubgraph { message }
            }
        });
        return;
    }
    let (code, label) = match position {
        InputValuePosition::Argument => (HintCode::InconsistentArgumentPresence, "Optional argument"),
        InputValuePosition::InputField => {
            (HintCode::InconsistentInputObjectField, "Input object field")
        }
    };
    ctx.hint(
        code,
        format!(
            "{label} \"{coordinate}\" will not be included in the supergraph as it does not appear in all subgraphs: it is defined in {} but not in {}.",
            human_readable_subgraph_names(present.iter().map(|(graph, _)| *graph)),
            human_readable_subgraph_names(&missing),
        ),
    );
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::ErrorCode;
    use crate::error::HintCode;
    use crate::merger::state::FieldState;
    use crate::merger::state::SupergraphState;
    use crate::merger::tests::merge;

    fn field<'a>(supergraph: &'a SupergraphState, ty: &str, name: &str) -> &'a FieldState {
        &supergraph.composite(ty).unwrap().fields[name]
    }

    #[test]
    fn shareable_field_takes_the_nullable_type() {
        let (supergraph, errors, _) = merge(&[
            (
                "a",
                r#"type Query { a: User } type User @key(fields: "id") { id: ID! name: String @shareable }"#,
            ),
            (
                "b",
                r#"type Query { b: Int } type User @key(fields: "id") { id: ID! name: String! @shareable }"#,
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        let name = field(&supergraph, "User", "name");
        assert_eq!(name.ty.to_string(), "String");
        assert!(name.join_field);
        assert_eq!(name.by_graph["B"].ty.to_string(), "String!");
        assert!(!field(&supergraph, "User", "id").join_field);
    }

    #[test]
    fn key_field_keeps_the_first_type() {
        let (supergraph, errors, _) = merge(&[
            ("a", r#"type Query { a: User } type User @key(fields: "id") { id: ID! }"#),
            ("b", r#"type Query { b: Int } type User @key(fields: "id") { id: ID }"#),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(field(&supergraph, "User", "id").ty.to_string(), "ID!");
    }

    #[test]
    fn non_shareable_field_in_two_subgraphs() {
        let (_, errors, _) = merge(&[
            ("a", r#"type Query { a: User } type User @key(fields: "id") { id: ID! name: String }"#),
            ("b", r#"type Query { b: Int } type User @key(fields: "id") { id: ID! name: String }"#),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "Non-shareable field \"User.name\" is resolved from multiple subgraphs: it is resolved from subgraphs \"a\" and \"b\" and defined as non-shareable in all of them"
        );
    }

    #[test]
    fn incompatible_field_types() {
        let (_, errors, _) = merge(&[
            ("a", r#"type Query { a: User } type User @key(fields: "id") { id: ID! age: Int @shareable }"#),
            ("b", r#"type Query { b: Int } type User @key(fields: "id") { id: ID! age: String @shareable }"#),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), ErrorCode::FieldTypeMismatch);
        assert_eq!(
            errors[0].to_string(),
            "Type of field \"User.age\" is incompatible across subgraphs: it has type \"Int\" in subgraph \"a\" but type \"String\" in subgraph \"b\""
        );
    }

    #[test]
    fn override_takes_the_field_over() {
        let (supergraph, errors, hints) = merge(&[
            ("a", r#"type Query { a: User } type User @key(fields: "id") { id: ID! name: String }"#),
            (
                "b",
                r#"type Query { b: Int } type User @key(fields: "id") { id: ID! name: String @override(from: "a") }"#,
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].code, HintCode::OverriddenFieldCanBeRemoved);
        let name = field(&supergraph, "User", "name");
        assert!(name.join_field);
        assert!(name.by_graph["A"].overridden);
        assert_eq!(
            name.routed().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
            ["B"]
        );
    }

    #[test]
    fn overridden_key_field_stays_routed() {
        let (supergraph, errors, _) = merge(&[
            ("a", r#"type Query { a: User } type User @key(fields: "id") { id: ID! }"#),
            (
                "b",
                r#"type Query { b: Int } type User @key(fields: "id") { id: ID! @override(from: "a") }"#,
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        let id = field(&supergraph, "User", "id");
        assert!(id.by_graph["A"].used_overridden);
        assert_eq!(id.routed().count(), 2);
    }

    #[test]
    fn override_from_self() {
        let (_, errors, _) = merge(&[(
            "a",
            r#"type Query { a: Int @override(from: "a") }"#,
        )]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), ErrorCode::OverrideFromSelfError);
    }

    #[test]
    fn override_from_unknown_subgraph_is_a_hint() {
        let (_, errors, hints) = merge(&[(
            "a",
            r#"type Query { a: Int @override(from: "legacy") }"#,
        )]);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(hints[0].code, HintCode::FromSubgraphDoesNotExist);
    }

    #[test]
    fn arguments_are_intersected() {
        let (supergraph, errors, hints) = merge(&[
            (
                "a",
                r#"type Query { a: Int } type User @key(fields: "id") { id: ID! friends(first: Int, after: String): [User] @shareable }"#,
            ),
            (
                "b",
                r#"type Query { b: Int } type User @key(fields: "id") { id: ID! friends(first: Int!): [User] @shareable }"#,
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        let friends = field(&supergraph, "User", "friends");
        assert_eq!(friends.args.len(), 1);
        assert_eq!(friends.args["first"].ty.to_string(), "Int!");
        assert_eq!(hints[0].code, HintCode::InconsistentArgumentPresence);
    }

    #[test]
    fn required_argument_must_be_everywhere() {
        let (_, errors, _) = merge(&[
            (
                "a",
                r#"type Query { a: Int } type User @key(fields: "id") { id: ID! friends(first: Int!): [User] @shareable }"#,
            ),
            (
                "b",
                r#"type Query { b: Int } type User @key(fields: "id") { id: ID! friends: [User] @shareable }"#,
            ),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "Argument \"User.friends(first:)\" is required in some subgraphs but does not appear in all subgraphs: it is required in subgraph \"a\" but does not appear in subgraph \"b\""
        );
    }

    #[test]
    fn argument_defaults_must_agree() {
        let (_, errors, _) = merge(&[
            (
                "a",
                r#"type Query { a: Int } type User @key(fields: "id") { id: ID! friends(first: Int = 10): [User] @shareable }"#,
            ),
            (
                "b",
                r#"type Query { b: Int } type User @key(fields: "id") { id: ID! friends(first: Int = 20): [User] @shareable }"#,
            ),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), ErrorCode::FieldArgumentDefaultMismatch);
    }
}
