use super::MergeContext;
use super::merge_metadata;
use super::state::ScalarTypeState;
use crate::subgraph::state::Graph;
use crate::subgraph::state::ScalarType;

pub(super) fn visit_scalar(
    ctx: &mut MergeContext,
    target: &mut ScalarTypeState,
    graph: &Graph,
    scalar: &ScalarType,
) {
    merge_metadata(ctx, &scalar.name, &graph.name, &mut target.metadata, &scalar.metadata);
    if target.specified_by.is_none() {
        target.specified_by.clone_from(&scalar.specified_by);
    }
    target.graphs.insert(graph.id.clone());
}
