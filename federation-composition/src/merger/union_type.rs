use super::MergeContext;
use super::merge_metadata;
use super::state::UnionTypeState;
use crate::subgraph::state::Graph;
use crate::subgraph::state::UnionType;

/// Union members are the union of the members of every subgraph.
pub(super) fn visit_union(
    ctx: &mut MergeContext,
    target: &mut UnionTypeState,
    graph: &Graph,
    union: &UnionType,
) {
    merge_metadata(ctx, &union.name, &graph.name, &mut target.metadata, &union.metadata);
    target.members.extend(union.members.iter().cloned());
    target
        .by_graph
        .insert(graph.id.clone(), union.members.clone());
}
