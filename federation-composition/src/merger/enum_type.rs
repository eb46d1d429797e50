//! Enum values merge differently depending on where the enum is used: values an input position
//! may receive must be understood by every subgraph, while any subgraph may return extra values.
use itertools::Itertools;

use super::MergeContext;
use super::merge_metadata;
use super::state::EnumTypeState;
use super::state::EnumValueState;
use crate::error::CompositionError;
use crate::error::HintCode;
use crate::subgraph::state::EnumType;
use crate::subgraph::state::Graph;
use crate::utils::human_readable::human_readable_subgraph_names;

pub(super) fn visit_enum(
    ctx: &mut MergeContext,
    target: &mut EnumTypeState,
    graph: &Graph,
    enum_type: &EnumType,
) {
    merge_metadata(ctx, &enum_type.name, &graph.name, &mut target.metadata, &enum_type.metadata);
    target.graphs.insert(graph.id.clone());
    for value in enum_type.values.values() {
        let state = target
            .values
            .entry(value.name.clone())
            .or_insert_with(|| EnumValueState {
                name: value.name.clone(),
                deprecated: None,
                metadata: Default::default(),
                graphs: Default::default(),
            });
        merge_metadata(
            ctx,
            &format!("{}.{}", enum_type.name, value.name),
            &graph.name,
            &mut state.metadata,
            &value.metadata,
        );
        if state.deprecated.is_none() {
            state.deprecated.clone_from(&value.deprecated);
        }
        state.graphs.insert(graph.id.clone());
    }
}

pub(super) fn finalize_enum(ctx: &mut MergeContext, enum_type: &mut EnumTypeState) {
    let name = enum_type.name.clone();
    let inconsistent = enum_type
        .values
        .values()
        .filter(|value| value.graphs.len() < enum_type.graphs.len())
        .map(|value| {
            let defined_in = value
                .graphs
                .iter()
                .map(|id| ctx.graph_name(id).to_owned())
                .collect_vec();
            let missing_in = enum_type
                .graphs
                .iter()
                .filter(|id| !value.graphs.contains(*id))
                .map(|id| ctx.graph_name(id).to_owned())
                .collect_vec();
            (value.name.clone(), defined_in, missing_in)
        })
        .collect_vec();

    match (enum_type.referenced_by_input, enum_type.referenced_by_output) {
        (true, true) => {
            for (value, defined_in, missing_in) in &inconsistent {
                ctx.error(CompositionError::EnumValueMismatch {
                    message: format!(
                        "Enum type \"{name}\" is used as both input type and output type, but value \"{value}\" is not defined in all the subgraphs defining \"{name}\": \"{value}\" is defined in {} but not in {}",
                        human_readable_subgraph_names(defined_in),
                        human_readable_subgraph_names(missing_in),
                    ),
                });
            }
        }
        // Output only: every value any subgraph may return is kept.
        (false, true) => {}
        (input, _) => {
            if !input {
                ctx.hint(
                    HintCode::UnusedEnumType,
                    format!(
                        "Enum type \"{name}\" is defined but unused. It will be included in the supergraph with only the values defined in all subgraphs."
                    ),
                );
            }
            for (value, defined_in, missing_in) in &inconsistent {
                if input {
                    ctx.hint(
                        HintCode::InconsistentEnumValueForInputEnum,
                        format!(
                            "Value \"{value}\" of enum type \"{name}\" will not be part of the supergraph as it is not defined in all the subgraphs defining \"{name}\": \"{value}\" is defined in {} but not in {}",
                            human_readable_subgraph_names(defined_in),
                            human_readable_subgraph_names(missing_in),
                        ),
                    );
                }
                enum_type.values.shift_remove(value);
            }
        }
    }

    if enum_type.values.is_empty() {
        ctx.error(CompositionError::EmptyMergedEnumType {
            message: format!(
                "None of the values of enum type \"{name}\" are defined consistently in all the subgraphs defining that type. As only values common to all subgraphs are merged, this would result in an empty type."
            ),
        });
    }
}
