//! The canonical, directive-normalized model of one subgraph.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;

use crate::link::federation_spec_definition::FederationVersion;
use crate::link::registry::LinkedSpecs;
use crate::subgraph::field_set::FieldSet;

/// Identity of a subgraph within one composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    /// The `join__Graph` enum value naming this subgraph in the supergraph.
    pub id: Name,
    pub name: String,
    pub url: Option<String>,
    pub version: FederationVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Query,
    Mutation,
    Subscription,
}

impl RootKind {
    pub const ALL: [RootKind; 3] = [RootKind::Query, RootKind::Mutation, RootKind::Subscription];

    pub fn default_type_name(&self) -> Name {
        match self {
            RootKind::Query => apollo_compiler::name!("Query"),
            RootKind::Mutation => apollo_compiler::name!("Mutation"),
            RootKind::Subscription => apollo_compiler::name!("Subscription"),
        }
    }

    pub fn operation_keyword(&self) -> &'static str {
        match self {
            RootKind::Query => "query",
            RootKind::Mutation => "mutation",
            RootKind::Subscription => "subscription",
        }
    }
}

/// Facts shared by every kind of schema element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub description: Option<String>,
    pub tags: IndexSet<String>,
    pub inaccessible: bool,
    pub authenticated: bool,
    pub requires_scopes: Vec<Vec<String>>,
    pub policies: Vec<Vec<String>>,
    /// Applications of `@composeDirective`-registered directives, kept verbatim.
    pub composed_directives: Vec<Node<Directive>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deprecation {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub field_set: FieldSet,
    pub resolvable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<Node<Value>>,
    pub deprecated: Option<Deprecation>,
    pub metadata: Metadata,
}

impl Argument {
    /// Non-null without a default value.
    pub fn is_required(&self) -> bool {
        self.ty.is_non_null() && self.default_value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Name,
    pub ty: Type,
    pub args: IndexMap<Name, Argument>,
    pub external: bool,
    pub shareable: bool,
    pub override_from: Option<String>,
    pub override_label: Option<String>,
    pub provides: Option<FieldSet>,
    pub requires: Option<FieldSet>,
    /// Selected by one of the keys of this subgraph, at any depth.
    pub used_in_key: bool,
    pub deprecated: Option<Deprecation>,
    pub metadata: Metadata,
}

impl Field {
    pub(crate) fn new(name: Name, ty: Type) -> Self {
        Field {
            name,
            ty,
            args: Default::default(),
            external: false,
            shareable: false,
            override_from: None,
            override_label: None,
            provides: None,
            requires: None,
            used_in_key: false,
            deprecated: None,
            metadata: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: Name,
    pub fields: IndexMap<Name, Field>,
    pub keys: Vec<Key>,
    pub interfaces: IndexSet<Name>,
    /// A continuation of a type owned by another subgraph.
    pub extension: bool,
    /// Every field is `@external`.
    pub external: bool,
    /// Stands in for the interface of the same name, defined in other subgraphs.
    pub interface_object: bool,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    pub name: Name,
    pub fields: IndexMap<Name, Field>,
    pub keys: Vec<Key>,
    pub interfaces: IndexSet<Name>,
    pub extension: bool,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputObjectType {
    pub name: Name,
    pub fields: IndexMap<Name, Argument>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub name: Name,
    pub members: IndexSet<Name>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: Name,
    pub deprecated: Option<Deprecation>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: Name,
    pub values: IndexMap<Name, EnumValue>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarType {
    pub name: Name,
    pub specified_by: Option<String>,
    pub metadata: Metadata,
}

/// A type of one subgraph. A name maps to exactly one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Object(ObjectType),
    Interface(InterfaceType),
    InputObject(InputObjectType),
    Union(UnionType),
    Enum(EnumType),
    Scalar(ScalarType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Interface,
    InputObject,
    Union,
    Enum,
    Scalar,
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TypeKind::Object => "Object Type",
            TypeKind::Interface => "Interface Type",
            TypeKind::InputObject => "Input Object Type",
            TypeKind::Union => "Union Type",
            TypeKind::Enum => "Enum Type",
            TypeKind::Scalar => "Scalar Type",
        })
    }
}

impl TypeDefinition {
    pub fn name(&self) -> &Name {
        match self {
            TypeDefinition::Object(t) => &t.name,
            TypeDefinition::Interface(t) => &t.name,
            TypeDefinition::InputObject(t) => &t.name,
            TypeDefinition::Union(t) => &t.name,
            TypeDefinition::Enum(t) => &t.name,
            TypeDefinition::Scalar(t) => &t.name,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            TypeDefinition::Object(_) => TypeKind::Object,
            TypeDefinition::Interface(_) => TypeKind::Interface,
            TypeDefinition::InputObject(_) => TypeKind::InputObject,
            TypeDefinition::Union(_) => TypeKind::Union,
            TypeDefinition::Enum(_) => TypeKind::Enum,
            TypeDefinition::Scalar(_) => TypeKind::Scalar,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            TypeDefinition::Object(t) => &t.metadata,
            TypeDefinition::Interface(t) => &t.metadata,
            TypeDefinition::InputObject(t) => &t.metadata,
            TypeDefinition::Union(t) => &t.metadata,
            TypeDefinition::Enum(t) => &t.metadata,
            TypeDefinition::Scalar(t) => &t.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            TypeDefinition::Object(t) => &mut t.metadata,
            TypeDefinition::Interface(t) => &mut t.metadata,
            TypeDefinition::InputObject(t) => &mut t.metadata,
            TypeDefinition::Union(t) => &mut t.metadata,
            TypeDefinition::Enum(t) => &mut t.metadata,
            TypeDefinition::Scalar(t) => &mut t.metadata,
        }
    }

    /// Output fields of objects and interfaces.
    pub fn fields(&self) -> Option<&IndexMap<Name, Field>> {
        match self {
            TypeDefinition::Object(t) => Some(&t.fields),
            TypeDefinition::Interface(t) => Some(&t.fields),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut IndexMap<Name, Field>> {
        match self {
            TypeDefinition::Object(t) => Some(&mut t.fields),
            TypeDefinition::Interface(t) => Some(&mut t.fields),
            _ => None,
        }
    }

    pub fn keys(&self) -> &[Key] {
        match self {
            TypeDefinition::Object(t) => &t.keys,
            TypeDefinition::Interface(t) => &t.keys,
            _ => &[],
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            TypeDefinition::Object(_) | TypeDefinition::Interface(_) | TypeDefinition::Union(_)
        )
    }
}

/// A directive definition kept for the supergraph: executable directives and composed ones.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveDefinitionState {
    pub name: Name,
    pub description: Option<String>,
    pub args: IndexMap<Name, Argument>,
    pub repeatable: bool,
    pub locations: Vec<DirectiveLocation>,
    pub composed: bool,
}

/// Everything composition needs to know about one subgraph, built once by
/// [`build_subgraph_state`](crate::subgraph::builder::build_subgraph_state).
#[derive(Debug, Clone)]
pub struct SubgraphState {
    pub graph: Graph,
    /// Which canonical root types exist. Root types are always stored under their default names.
    pub root_types: IndexSet<RootKind>,
    pub types: IndexMap<Name, TypeDefinition>,
    pub directives: IndexMap<Name, DirectiveDefinitionState>,
    pub links: LinkedSpecs,
}

impl SubgraphState {
    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        match self.types.get(name) {
            Some(TypeDefinition::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&Field> {
        self.types.get(type_name)?.fields()?.get(field_name)
    }

    /// Object types implementing `interface` in this subgraph.
    pub fn implementations<'a>(
        &'a self,
        interface: &'a str,
    ) -> impl Iterator<Item = &'a ObjectType> + 'a {
        self.types.values().filter_map(move |ty| match ty {
            TypeDefinition::Object(object)
                if object.interfaces.iter().any(|i| i.as_str() == interface) =>
            {
                Some(object)
            }
            _ => None,
        })
    }

    /// Concrete object types a value of `type_name` can be in this subgraph.
    pub fn possible_runtime_types(&self, type_name: &str) -> Vec<Name> {
        match self.types.get(type_name) {
            Some(TypeDefinition::Object(object)) => vec![object.name.clone()],
            Some(TypeDefinition::Interface(_)) => self
                .implementations(type_name)
                .map(|object| object.name.clone())
                .collect(),
            Some(TypeDefinition::Union(union)) => union
                .members
                .iter()
                .filter(|member| self.object(member).is_some())
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}
