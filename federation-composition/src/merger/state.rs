//! The merged model of a supergraph, before it is rendered as SDL.
//!
//! Every per-subgraph fact is kept in a `by_graph` map keyed by `join__Graph` id, in subgraph
//! order, because routing metadata must say which subgraph resolves what.
use apollo_compiler::Name;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;

use crate::link::Link;
use crate::subgraph::field_set::FieldSet;
use crate::subgraph::state::Argument;
use crate::subgraph::state::Deprecation;
use crate::subgraph::state::DirectiveDefinitionState;
use crate::subgraph::state::Graph;
use crate::subgraph::state::Key;
use crate::subgraph::state::Metadata;
use crate::subgraph::state::RootKind;
use crate::subgraph::state::TypeKind;

#[derive(Debug, Clone)]
pub struct SupergraphState {
    pub graphs: Vec<Graph>,
    pub root_types: IndexSet<RootKind>,
    pub types: IndexMap<Name, SupergraphType>,
    pub directives: IndexMap<Name, DirectiveDefinitionState>,
    /// Links re-exporting `@composeDirective` directives.
    pub composed_links: Vec<Link>,
    pub features: FeatureUsage,
}

impl SupergraphState {
    pub fn graph(&self, id: &str) -> Option<&Graph> {
        self.graphs.iter().find(|graph| graph.id.as_str() == id)
    }

    pub fn composite(&self, name: &str) -> Option<&CompositeTypeState> {
        match self.types.get(name) {
            Some(SupergraphType::Object(ty)) | Some(SupergraphType::Interface(ty)) => Some(ty),
            _ => None,
        }
    }

    /// Object types of the supergraph implementing `interface`.
    pub fn implementations<'a>(
        &'a self,
        interface: &'a str,
    ) -> impl Iterator<Item = &'a CompositeTypeState> + 'a {
        self.types.values().filter_map(move |ty| match ty {
            SupergraphType::Object(object)
                if object.interfaces.iter().any(|i| i.as_str() == interface) =>
            {
                Some(object)
            }
            _ => None,
        })
    }
}

/// Which optional specifications the supergraph needs to link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureUsage {
    pub tag: bool,
    pub inaccessible: bool,
    pub authenticated: bool,
    pub requires_scopes: bool,
    pub policy: bool,
    /// Progressive `@override(label:)` needs `join` v0.4.
    pub override_label: bool,
}

impl FeatureUsage {
    pub(crate) fn record(&mut self, metadata: &Metadata) {
        self.tag |= !metadata.tags.is_empty();
        self.inaccessible |= metadata.inaccessible;
        self.authenticated |= metadata.authenticated;
        self.requires_scopes |= !metadata.requires_scopes.is_empty();
        self.policy |= !metadata.policies.is_empty();
    }
}

#[derive(Debug, Clone)]
pub enum SupergraphType {
    Object(CompositeTypeState),
    Interface(CompositeTypeState),
    InputObject(InputObjectTypeState),
    Union(UnionTypeState),
    Enum(EnumTypeState),
    Scalar(ScalarTypeState),
}

impl SupergraphType {
    pub fn name(&self) -> &Name {
        match self {
            SupergraphType::Object(t) | SupergraphType::Interface(t) => &t.name,
            SupergraphType::InputObject(t) => &t.name,
            SupergraphType::Union(t) => &t.name,
            SupergraphType::Enum(t) => &t.name,
            SupergraphType::Scalar(t) => &t.name,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            SupergraphType::Object(_) => TypeKind::Object,
            SupergraphType::Interface(_) => TypeKind::Interface,
            SupergraphType::InputObject(_) => TypeKind::InputObject,
            SupergraphType::Union(_) => TypeKind::Union,
            SupergraphType::Enum(_) => TypeKind::Enum,
            SupergraphType::Scalar(_) => TypeKind::Scalar,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            SupergraphType::Object(t) | SupergraphType::Interface(t) => &t.metadata,
            SupergraphType::InputObject(t) => &t.metadata,
            SupergraphType::Union(t) => &t.metadata,
            SupergraphType::Enum(t) => &t.metadata,
            SupergraphType::Scalar(t) => &t.metadata,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            SupergraphType::Object(_) | SupergraphType::Interface(_) | SupergraphType::Union(_)
        )
    }

    /// Ids of the subgraphs declaring the type.
    pub fn graphs(&self) -> Vec<&Name> {
        match self {
            SupergraphType::Object(t) | SupergraphType::Interface(t) => t.by_graph.keys().collect(),
            SupergraphType::InputObject(t) => t.by_graph.keys().collect(),
            SupergraphType::Union(t) => t.by_graph.keys().collect(),
            SupergraphType::Enum(t) => t.graphs.iter().collect(),
            SupergraphType::Scalar(t) => t.graphs.iter().collect(),
        }
    }
}

/// An object or interface type. Both kinds merge the same way apart from shareability.
#[derive(Debug, Clone)]
pub struct CompositeTypeState {
    pub name: Name,
    pub metadata: Metadata,
    pub interfaces: IndexSet<Name>,
    pub fields: IndexMap<Name, FieldState>,
    pub by_graph: IndexMap<Name, CompositeTypeInGraph>,
}

impl CompositeTypeState {
    pub(crate) fn new(name: Name) -> Self {
        Self {
            name,
            metadata: Default::default(),
            interfaces: Default::default(),
            fields: Default::default(),
            by_graph: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompositeTypeInGraph {
    pub keys: Vec<Key>,
    pub extension: bool,
    pub interfaces: IndexSet<Name>,
    /// The subgraph declares this interface as an `@interfaceObject` object type.
    pub interface_object: bool,
}

#[derive(Debug, Clone)]
pub struct FieldState {
    pub name: Name,
    /// The merged type, decided once every subgraph has contributed.
    pub ty: Type,
    pub args: IndexMap<Name, Argument>,
    pub deprecated: Option<Deprecation>,
    pub metadata: Metadata,
    pub by_graph: IndexMap<Name, FieldInGraph>,
    /// Whether the field carries one `join__field` per routed subgraph.
    pub join_field: bool,
}

impl FieldState {
    /// Contributions that are part of routing, in subgraph order.
    pub fn routed(&self) -> impl Iterator<Item = (&Name, &FieldInGraph)> {
        self.by_graph.iter().filter(|(_, field)| field.in_routing())
    }

    /// Whether any subgraph can resolve the field itself, without `@provides`.
    pub fn resolvable_in(&self, graph: &str) -> bool {
        self.by_graph
            .get(graph)
            .is_some_and(|field| field.in_routing() && !field.external && !field.overridden)
    }
}

#[derive(Debug, Clone)]
pub struct FieldInGraph {
    pub ty: Type,
    pub args: IndexMap<Name, Argument>,
    pub external: bool,
    pub shareable: bool,
    pub used_in_key: bool,
    pub provides: Option<FieldSet>,
    pub requires: Option<FieldSet>,
    pub override_from: Option<String>,
    pub override_label: Option<String>,
    /// Another subgraph took this field over with an unlabelled `@override`.
    pub overridden: bool,
    /// Another subgraph takes this field over progressively, with `@override(label:)`.
    pub progressively_overridden: bool,
    /// Overridden, but still needed to resolve one of this subgraph's keys.
    pub used_overridden: bool,
    /// Added to an implementation from an `@interfaceObject` of its interface.
    pub from_interface_object: bool,
}

impl FieldInGraph {
    pub fn in_routing(&self) -> bool {
        !self.overridden || self.used_overridden
    }

    /// Resolves the field: neither external nor taken over by another subgraph.
    pub(crate) fn resolves(&self) -> bool {
        !self.external && !self.overridden && !self.progressively_overridden
    }
}

#[derive(Debug, Clone)]
pub struct InputObjectTypeState {
    pub name: Name,
    pub metadata: Metadata,
    /// The merged fields, decided once every subgraph has contributed.
    pub fields: IndexMap<Name, Argument>,
    /// The fields declared by each subgraph.
    pub by_graph: IndexMap<Name, IndexMap<Name, Argument>>,
}

#[derive(Debug, Clone)]
pub struct UnionTypeState {
    pub name: Name,
    pub metadata: Metadata,
    pub members: IndexSet<Name>,
    /// Members declared by each subgraph.
    pub by_graph: IndexMap<Name, IndexSet<Name>>,
}

#[derive(Debug, Clone)]
pub struct EnumTypeState {
    pub name: Name,
    pub metadata: Metadata,
    pub values: IndexMap<Name, EnumValueState>,
    pub graphs: IndexSet<Name>,
    pub referenced_by_input: bool,
    pub referenced_by_output: bool,
}

#[derive(Debug, Clone)]
pub struct EnumValueState {
    pub name: Name,
    pub deprecated: Option<Deprecation>,
    pub metadata: Metadata,
    pub graphs: IndexSet<Name>,
}

#[derive(Debug, Clone)]
pub struct ScalarTypeState {
    pub name: Name,
    pub metadata: Metadata,
    pub specified_by: Option<String>,
    pub graphs: IndexSet<Name>,
}
