//! The federated graph the satisfiability traversal walks: one node per type and subgraph, with
//! edges for what a subgraph can do from there.
use std::collections::HashMap;
use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::graph::EdgeIndex;
use petgraph::graph::EdgeReference;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::error::FederationError;
use crate::internal_error;
use crate::merger::state::CompositeTypeState;
use crate::merger::state::SupergraphState;
use crate::merger::state::SupergraphType;
use crate::subgraph::field_set::FieldSet;
use crate::subgraph::state::RootKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Object,
    Interface,
    /// An object type standing in for the interface of the same name.
    InterfaceObject,
    Union,
    Leaf,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// The `join__Graph` id of the subgraph.
    pub(crate) graph: Name,
    pub(crate) type_name: Name,
    pub(crate) kind: NodeKind,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name, self.graph)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Transition {
    /// Resolving a field of the node type, landing on the field's base type in the same subgraph.
    Field {
        name: Name,
        /// Only usable when an enclosing `@provides` selects the field.
        external: bool,
        /// Overridden, but kept for resolving keys of the subgraph.
        conditions_only: bool,
        requires: Option<FieldSet>,
        provides: Option<FieldSet>,
    },
    /// A type condition towards a possible runtime type.
    Downcast { to: Name },
    /// A type condition on an `@interfaceObject`, which stays on the same node: the subgraph
    /// resolves the fields of every implementation through it.
    InterfaceObjectDowncast { to: Name },
    /// Moving to another subgraph by fetching the entity with one of its keys.
    Key { key: FieldSet },
    /// Moving between the same root type of two subgraphs.
    RootType,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Field { name, .. } => write!(f, "{name}"),
            Transition::Downcast { to } | Transition::InterfaceObjectDowncast { to } => {
                write!(f, "... on {to}")
            }
            Transition::Key { key } => write!(f, "key({key})"),
            Transition::RootType => write!(f, "root"),
        }
    }
}

pub(crate) struct FederatedGraph {
    graph: DiGraph<Node, Transition>,
    nodes: HashMap<(Name, Name), NodeIndex>,
    roots: IndexMap<RootKind, Vec<NodeIndex>>,
}

impl FederatedGraph {
    pub(crate) fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    pub(crate) fn edge(&self, index: EdgeIndex) -> &Transition {
        &self.graph[index]
    }

    pub(crate) fn edge_source(&self, index: EdgeIndex) -> Option<NodeIndex> {
        self.graph.edge_endpoints(index).map(|(source, _)| source)
    }

    pub(crate) fn edge_target(&self, index: EdgeIndex) -> Option<NodeIndex> {
        self.graph.edge_endpoints(index).map(|(_, target)| target)
    }

    pub(crate) fn out_edges(
        &self,
        index: NodeIndex,
    ) -> impl Iterator<Item = EdgeReference<'_, Transition>> {
        self.graph.edges_directed(index, Direction::Outgoing)
    }

    pub(crate) fn node_for(&self, graph: &Name, type_name: &Name) -> Option<NodeIndex> {
        self.nodes.get(&(graph.clone(), type_name.clone())).copied()
    }

    pub(crate) fn roots(&self, kind: RootKind) -> &[NodeIndex] {
        self.roots.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// The edge collecting field `name` from `node`, if the subgraph declares it there.
    pub(crate) fn field_edge(
        &self,
        node: NodeIndex,
        name: &str,
    ) -> Option<EdgeReference<'_, Transition>> {
        self.out_edges(node).find(|edge| {
            matches!(
                edge.weight(),
                Transition::Field { name: field, .. } if field.as_str() == name
            )
        })
    }

    /// The node a type condition on `to` leads to from `node`, if any.
    pub(crate) fn downcast(&self, node: NodeIndex, to: &str) -> Option<NodeIndex> {
        if self.node(node).type_name.as_str() == to {
            return Some(node);
        }
        self.out_edges(node).find_map(|edge| match edge.weight() {
            Transition::Downcast { to: target } | Transition::InterfaceObjectDowncast { to: target }
                if target.as_str() == to =>
            {
                Some(edge.target())
            }
            _ => None,
        })
    }

    /// Real downcasts from an abstract node, one per possible runtime type in the subgraph.
    pub(crate) fn runtime_types(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.out_edges(node)
            .filter(|edge| matches!(edge.weight(), Transition::Downcast { .. }))
            .map(|edge| edge.target())
            .collect()
    }

    /// Edges leaving the subgraph of `node`.
    pub(crate) fn moves(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = EdgeReference<'_, Transition>> {
        self.out_edges(node)
            .filter(|edge| matches!(edge.weight(), Transition::Key { .. } | Transition::RootType))
    }
}

/// Builds the federated graph of a merged supergraph.
pub(crate) fn build_federated_graph(
    supergraph: &SupergraphState,
) -> Result<FederatedGraph, FederationError> {
    let mut builder = GraphBuilder {
        supergraph,
        graph: FederatedGraph {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            roots: IndexMap::default(),
        },
    };
    builder.add_type_nodes();
    builder.add_field_edges()?;
    builder.add_downcast_edges();
    builder.add_key_edges();
    builder.add_root_edges();
    debug!(
        nodes = builder.graph.graph.node_count(),
        edges = builder.graph.graph.edge_count(),
        "built federated graph"
    );
    Ok(builder.graph)
}

struct GraphBuilder<'a> {
    supergraph: &'a SupergraphState,
    graph: FederatedGraph,
}

impl GraphBuilder<'_> {
    fn add_node(&mut self, graph: &Name, type_name: &Name, kind: NodeKind) -> NodeIndex {
        let key = (graph.clone(), type_name.clone());
        if let Some(index) = self.graph.nodes.get(&key) {
            return *index;
        }
        let index = self.graph.graph.add_node(Node {
            graph: graph.clone(),
            type_name: type_name.clone(),
            kind,
        });
        self.graph.nodes.insert(key, index);
        index
    }

    fn add_type_nodes(&mut self) {
        let supergraph = self.supergraph;
        for ty in supergraph.types.values() {
            match ty {
                SupergraphType::Object(object) => {
                    for graph in object.by_graph.keys() {
                        self.add_node(graph, &object.name, NodeKind::Object);
                    }
                }
                SupergraphType::Interface(interface) => {
                    for (graph, in_graph) in &interface.by_graph {
                        let kind = if in_graph.interface_object {
                            NodeKind::InterfaceObject
                        } else {
                            NodeKind::Interface
                        };
                        self.add_node(graph, &interface.name, kind);
                    }
                }
                SupergraphType::Union(union) => {
                    for graph in union.by_graph.keys() {
                        self.add_node(graph, &union.name, NodeKind::Union);
                    }
                }
                SupergraphType::InputObject(_)
                | SupergraphType::Enum(_)
                | SupergraphType::Scalar(_) => {}
            }
        }
        for kind in RootKind::ALL {
            if !supergraph.root_types.contains(&kind) {
                continue;
            }
            let Some(root) = supergraph.composite(&kind.default_type_name()) else {
                continue;
            };
            let roots = root
                .by_graph
                .keys()
                .filter_map(|graph| self.graph.node_for(graph, &root.name))
                .collect();
            self.graph.roots.insert(kind, roots);
        }
    }

    fn add_field_edges(&mut self) -> Result<(), FederationError> {
        let supergraph = self.supergraph;
        for ty in supergraph.types.values() {
            let (SupergraphType::Object(composite) | SupergraphType::Interface(composite)) = ty
            else {
                continue;
            };
            for field in composite.fields.values() {
                let base = field.ty.inner_named_type();
                for (graph, contribution) in &field.by_graph {
                    if contribution.overridden && !contribution.used_overridden {
                        continue;
                    }
                    let Some(source) = self.graph.node_for(graph, &composite.name) else {
                        // Fields copied from an `@interfaceObject` live on the interface node.
                        continue;
                    };
                    let target = match supergraph.types.get(base) {
                        Some(target) if target.is_composite() => {
                            self.graph.node_for(graph, base).ok_or_else(|| {
                                internal_error!(
                                    "field \"{}.{}\" returns \"{base}\", which subgraph {graph} does not declare",
                                    composite.name,
                                    field.name
                                )
                            })?
                        }
                        _ => self.add_node(graph, base, NodeKind::Leaf),
                    };
                    self.graph.graph.add_edge(
                        source,
                        target,
                        Transition::Field {
                            name: field.name.clone(),
                            external: contribution.external,
                            conditions_only: contribution.overridden,
                            requires: contribution.requires.clone(),
                            provides: contribution.provides.clone(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn add_downcast_edges(&mut self) {
        let supergraph = self.supergraph;
        for ty in supergraph.types.values() {
            match ty {
                SupergraphType::Interface(interface) => {
                    for (graph, in_graph) in &interface.by_graph {
                        let Some(source) = self.graph.node_for(graph, &interface.name) else {
                            continue;
                        };
                        if in_graph.interface_object {
                            for implementation in supergraph.implementations(&interface.name) {
                                self.graph.graph.add_edge(
                                    source,
                                    source,
                                    Transition::InterfaceObjectDowncast {
                                        to: implementation.name.clone(),
                                    },
                                );
                            }
                            continue;
                        }
                        for implementation in supergraph.implementations(&interface.name) {
                            let implements_here = implementation
                                .by_graph
                                .get(graph)
                                .is_some_and(|object| object.interfaces.contains(&interface.name));
                            if !implements_here {
                                continue;
                            }
                            if let Some(target) = self.graph.node_for(graph, &implementation.name) {
                                self.graph.graph.add_edge(
                                    source,
                                    target,
                                    Transition::Downcast {
                                        to: implementation.name.clone(),
                                    },
                                );
                            }
                        }
                    }
                }
                SupergraphType::Union(union) => {
                    for (graph, members) in &union.by_graph {
                        let Some(source) = self.graph.node_for(graph, &union.name) else {
                            continue;
                        };
                        for member in members {
                            if let Some(target) = self.graph.node_for(graph, member) {
                                self.graph.graph.add_edge(
                                    source,
                                    target,
                                    Transition::Downcast { to: member.clone() },
                                );
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Key edges go from every subgraph declaring an entity to every other subgraph with a
    /// resolvable key for it. Implementations also reach `@interfaceObject` keys of their
    /// interfaces.
    fn add_key_edges(&mut self) {
        let supergraph = self.supergraph;
        for ty in supergraph.types.values() {
            let (SupergraphType::Object(composite) | SupergraphType::Interface(composite)) = ty
            else {
                continue;
            };
            self.add_entity_key_edges(composite, composite);
            if let SupergraphType::Interface(interface) = ty {
                let has_interface_object = interface
                    .by_graph
                    .values()
                    .any(|in_graph| in_graph.interface_object);
                if has_interface_object {
                    for implementation in supergraph.implementations(&interface.name) {
                        self.add_entity_key_edges(implementation, interface);
                    }
                }
            }
        }
    }

    fn add_entity_key_edges(&mut self, from: &CompositeTypeState, to: &CompositeTypeState) {
        for (target_graph, in_graph) in &to.by_graph {
            let Some(target) = self.graph.node_for(target_graph, &to.name) else {
                continue;
            };
            if from.name != to.name && !in_graph.interface_object {
                continue;
            }
            for key in in_graph.keys.iter().filter(|key| key.resolvable) {
                for source_graph in from.by_graph.keys() {
                    if source_graph == target_graph {
                        continue;
                    }
                    let Some(source) = self.graph.node_for(source_graph, &from.name) else {
                        continue;
                    };
                    self.graph.graph.add_edge(
                        source,
                        target,
                        Transition::Key {
                            key: key.field_set.clone(),
                        },
                    );
                }
            }
        }
    }

    fn add_root_edges(&mut self) {
        for kind in RootKind::ALL {
            let roots = self.graph.roots(kind).to_vec();
            for source in &roots {
                for target in &roots {
                    if source != target {
                        self.graph.graph.add_edge(*source, *target, Transition::RootType);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::merger::tests::merge;

    fn edges_from(graph: &FederatedGraph, subgraph: &str, type_name: &str) -> Vec<String> {
        let node = graph
            .node_for(&Name::new(subgraph).unwrap(), &Name::new(type_name).unwrap())
            .unwrap();
        graph
            .out_edges(node)
            .map(|edge| format!("{} --[{}]--> {}", graph.node(node), edge.weight(), graph.node(edge.target())))
            .collect()
    }

    #[test]
    fn key_edges_connect_subgraphs_declaring_an_entity() {
        let (supergraph, errors, _) = merge(&[
            ("a", "type Query { user: User } type User @key(fields: \"id\") { id: ID! }"),
            ("b", "type User @key(fields: \"id\") { id: ID! name: String }"),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        let graph = build_federated_graph(&supergraph).unwrap();
        let mut edges = edges_from(&graph, "A", "User");
        edges.sort();
        assert_eq!(
            edges,
            ["User(A) --[id]--> ID(A)", "User(A) --[key(id)]--> User(B)"]
        );
        assert_eq!(graph.roots(RootKind::Query).len(), 1);
    }

    #[test]
    fn unresolvable_keys_are_not_move_targets() {
        let (supergraph, errors, _) = merge(&[
            (
                "a",
                "type Query { user: User } type User @key(fields: \"id\", resolvable: false) { id: ID! }",
            ),
            ("b", "type Query { b: User } type User @key(fields: \"id\") { id: ID! }"),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        let graph = build_federated_graph(&supergraph).unwrap();
        assert!(
            edges_from(&graph, "B", "User")
                .iter()
                .all(|edge| !edge.contains("key")),
        );
        assert!(
            edges_from(&graph, "A", "User")
                .iter()
                .any(|edge| edge.contains("key(id)")),
        );
    }

    #[test]
    fn abstract_types_downcast_to_their_runtime_types() {
        let (supergraph, errors, _) = merge(&[(
            "a",
            "type Query { media: Media } union Media = Book | Movie type Book { title: String } type Movie { title: String }",
        )]);
        assert!(errors.is_empty(), "{errors:?}");
        let graph = build_federated_graph(&supergraph).unwrap();
        let media = graph
            .node_for(&Name::new("A").unwrap(), &Name::new("Media").unwrap())
            .unwrap();
        assert_eq!(graph.runtime_types(media).len(), 2);
        assert!(graph.downcast(media, "Movie").is_some());
        assert!(graph.downcast(media, "Query").is_none());
    }
}
