use itertools::Itertools;

use super::MergeContext;
use super::fields::InputValuePosition;
use super::fields::merge_input_values;
use super::merge_metadata;
use super::state::InputObjectTypeState;
use crate::error::CompositionError;
use crate::subgraph::state::Graph;
use crate::subgraph::state::InputObjectType;

pub(super) fn visit_input_object(
    ctx: &mut MergeContext,
    target: &mut InputObjectTypeState,
    graph: &Graph,
    input: &InputObjectType,
) {
    merge_metadata(ctx, &input.name, &graph.name, &mut target.metadata, &input.metadata);
    target
        .by_graph
        .insert(graph.id.clone(), input.fields.clone());
}

/// Only the fields every subgraph defines make it into the supergraph.
pub(super) fn finalize_input_object(ctx: &mut MergeContext, input: &mut InputObjectTypeState) {
    let sources = input
        .by_graph
        .iter()
        .map(|(id, fields)| (ctx.graph_name(id), fields))
        .collect_vec();
    input.fields = merge_input_values(ctx, InputValuePosition::InputField, &input.name, &sources);
    if input.fields.is_empty() {
        ctx.error(CompositionError::EmptyMergedInputType {
            message: format!(
                "None of the fields of input object type \"{}\" are consistently defined in all the subgraphs defining that type. As only fields common to all subgraphs are merged, this would result in an empty type.",
                input.name
            ),
        });
    }
}
