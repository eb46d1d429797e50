//! Folds the states of all subgraphs into one [`SupergraphState`].
//!
//! Merging happens in two passes per type: every subgraph contribution is first visited (in
//! subgraph order, so that "first wins" rules follow the input order), then the accumulated state
//! is finalized once all contributions are known.
use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use itertools::Itertools;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use crate::error::CompositionError;
use crate::error::CompositionHint;
use crate::error::FederationError;
use crate::error::HintCode;
use crate::subgraph::state::Graph;
use crate::subgraph::state::Metadata;
use crate::subgraph::state::SubgraphState;
use crate::subgraph::state::TypeDefinition;
use crate::subgraph::state::TypeKind;
use crate::utils::human_readable::human_readable_subgraph_names;

mod directive;
mod enum_type;
mod fields;
mod input_object;
mod object;
mod post_merge;
mod scalar;
pub mod state;
mod union_type;

use self::state::CompositeTypeState;
use self::state::EnumTypeState;
use self::state::FeatureUsage;
use self::state::InputObjectTypeState;
use self::state::ScalarTypeState;
use self::state::SupergraphState;
use self::state::SupergraphType;
use self::state::UnionTypeState;

/// Where merge diagnostics go, plus the subgraphs being merged.
pub(crate) struct MergeContext<'a> {
    pub(crate) graphs: &'a [Graph],
    errors: &'a mut Vec<CompositionError>,
    hints: &'a mut Vec<CompositionHint>,
}

impl<'a> MergeContext<'a> {
    pub(crate) fn graph_name<'b>(&self, id: &'b str) -> &'b str
    where
        'a: 'b,
    {
        let graphs: &'a [Graph] = self.graphs;
        graphs
            .iter()
            .find(|graph| graph.id.as_str() == id)
            .map(|graph| graph.name.as_str())
            .unwrap_or(id)
    }

    pub(crate) fn graph_by_name(&self, name: &str) -> Option<&'a Graph> {
        let graphs: &'a [Graph] = self.graphs;
        graphs.iter().find(|graph| graph.name == name)
    }

    pub(crate) fn error(&mut self, error: CompositionError) {
        self.errors.push(error);
    }

    pub(crate) fn hint(&mut self, code: HintCode, message: String) {
        self.hints.push(CompositionHint { code, message });
    }
}

/// Merges the subgraph states. User errors are appended to `errors`, and the returned state is
/// only meaningful when none were added.
#[instrument(skip_all, fields(subgraphs = states.len()))]
pub fn merge_subgraphs(
    states: &[SubgraphState],
    errors: &mut Vec<CompositionError>,
    hints: &mut Vec<CompositionHint>,
) -> Result<SupergraphState, FederationError> {
    let graphs = states.iter().map(|state| state.graph.clone()).collect_vec();
    let errors_before = errors.len();
    let mut ctx = MergeContext {
        graphs: &graphs,
        errors,
        hints,
    };

    let kinds = check_type_kinds(&mut ctx, states);
    let enum_usage = enum_usage(states);
    let mut types = kinds
        .into_iter()
        .map(|(name, kind)| {
            let (input, output) = enum_usage.get(&name).copied().unwrap_or_default();
            let ty = new_type_state(name.clone(), kind, input, output);
            (name, ty)
        })
        .collect::<IndexMap<_, _>>();

    for state in states {
        let graph = &state.graph;
        for (name, definition) in &state.types {
            let Some(target) = types.get_mut(name) else {
                continue;
            };
            match (target, definition) {
                (SupergraphType::Object(target), TypeDefinition::Object(object)) => {
                    object::visit_object(&mut ctx, target, graph, object)
                }
                (SupergraphType::Interface(target), TypeDefinition::Interface(interface)) => {
                    object::visit_interface(&mut ctx, target, graph, interface)
                }
                (SupergraphType::Interface(target), TypeDefinition::Object(object))
                    if object.interface_object =>
                {
                    object::visit_interface_object(&mut ctx, target, graph, object)
                }
                (SupergraphType::Union(target), TypeDefinition::Union(union)) => {
                    union_type::visit_union(&mut ctx, target, graph, union)
                }
                (SupergraphType::Enum(target), TypeDefinition::Enum(enum_type)) => {
                    enum_type::visit_enum(&mut ctx, target, graph, enum_type)
                }
                (SupergraphType::InputObject(target), TypeDefinition::InputObject(input)) => {
                    input_object::visit_input_object(&mut ctx, target, graph, input)
                }
                (SupergraphType::Scalar(target), TypeDefinition::Scalar(scalar)) => {
                    scalar::visit_scalar(&mut ctx, target, graph, scalar)
                }
                // Kind mismatches were reported while checking kinds.
                _ => {}
            }
        }
    }

    object::propagate_interface_object_fields(&mut types);

    for ty in types.values_mut() {
        trace!(type_name = %ty.name(), kind = %ty.kind(), "finalizing type");
        match ty {
            SupergraphType::Object(object) => object::finalize_composite(&mut ctx, object, true)?,
            SupergraphType::Interface(interface) => {
                object::finalize_composite(&mut ctx, interface, false)?
            }
            SupergraphType::Enum(enum_type) => enum_type::finalize_enum(&mut ctx, enum_type),
            SupergraphType::InputObject(input) => {
                input_object::finalize_input_object(&mut ctx, input)
            }
            SupergraphType::Union(_) | SupergraphType::Scalar(_) => {}
        }
    }

    let directives = directive::merge_directive_definitions(&mut ctx, states);
    let composed_links = directive::composed_links(states);
    let mut supergraph = SupergraphState {
        root_types: states
            .iter()
            .flat_map(|state| state.root_types.iter().copied())
            .collect(),
        graphs: graphs.clone(),
        types,
        directives,
        composed_links,
        features: FeatureUsage::default(),
    };
    supergraph.features = feature_usage(&supergraph);

    post_merge::validate(&mut ctx, &supergraph);

    debug!(
        types = supergraph.types.len(),
        directives = supergraph.directives.len(),
        errors = ctx.errors.len() - errors_before,
        "merged subgraphs"
    );
    Ok(supergraph)
}

fn new_type_state(name: Name, kind: TypeKind, input: bool, output: bool) -> SupergraphType {
    match kind {
        TypeKind::Object => SupergraphType::Object(CompositeTypeState::new(name)),
        TypeKind::Interface => SupergraphType::Interface(CompositeTypeState::new(name)),
        TypeKind::InputObject => SupergraphType::InputObject(InputObjectTypeState {
            name,
            metadata: Default::default(),
            fields: Default::default(),
            by_graph: Default::default(),
        }),
        TypeKind::Union => SupergraphType::Union(UnionTypeState {
            name,
            metadata: Default::default(),
            members: Default::default(),
            by_graph: Default::default(),
        }),
        TypeKind::Enum => SupergraphType::Enum(EnumTypeState {
            name,
            metadata: Default::default(),
            values: Default::default(),
            graphs: Default::default(),
            referenced_by_input: input,
            referenced_by_output: output,
        }),
        TypeKind::Scalar => SupergraphType::Scalar(ScalarTypeState {
            name,
            metadata: Default::default(),
            specified_by: None,
            graphs: Default::default(),
        }),
    }
}

/// The kind a subgraph declares for a type, counting `@interfaceObject` types as interfaces.
fn effective_kind(definition: &TypeDefinition) -> TypeKind {
    match definition {
        TypeDefinition::Object(object) if object.interface_object => TypeKind::Interface,
        definition => definition.kind(),
    }
}

/// Decides the kind of every type name, reporting names declared with different kinds.
fn check_type_kinds(
    ctx: &mut MergeContext,
    states: &[SubgraphState],
) -> IndexMap<Name, TypeKind> {
    let mut declared = IndexMap::<Name, IndexMap<TypeKind, Vec<&str>>>::default();
    for state in states {
        for (name, definition) in &state.types {
            declared
                .entry(name.clone())
                .or_default()
                .entry(effective_kind(definition))
                .or_default()
                .push(&state.graph.name);
        }
    }

    let mut kinds = IndexMap::default();
    for (name, by_kind) in declared {
        let mut by_kind = by_kind.into_iter();
        let Some((kind, first_graphs)) = by_kind.next() else {
            continue;
        };
        let others = by_kind.collect_vec();
        if !others.is_empty() {
            let mut message = format!(
                "Type \"{name}\" has mismatched kind: it is defined as {kind} in {}",
                human_readable_subgraph_names(&first_graphs)
            );
            for (other_kind, graphs) in &others {
                message.push_str(&format!(
                    " but {other_kind} in {}",
                    human_readable_subgraph_names(graphs)
                ));
            }
            ctx.error(CompositionError::TypeKindMismatch { message });
        }
        kinds.insert(name, kind);
    }
    kinds
}

/// For every enum, whether it is referenced from an input position and from an output position.
fn enum_usage(states: &[SubgraphState]) -> HashMap<Name, (bool, bool)> {
    let mut usage = HashMap::<Name, (bool, bool)>::new();
    let mut mark = |ty: &Type, input: bool| {
        let entry = usage.entry(ty.inner_named_type().clone()).or_default();
        if input {
            entry.0 = true;
        } else {
            entry.1 = true;
        }
    };
    for state in states {
        for definition in state.types.values() {
            if let Some(fields) = definition.fields() {
                for field in fields.values() {
                    mark(&field.ty, false);
                    for arg in field.args.values() {
                        mark(&arg.ty, true);
                    }
                }
            }
            if let TypeDefinition::InputObject(input) = definition {
                for field in input.fields.values() {
                    mark(&field.ty, true);
                }
            }
        }
        for directive in state.directives.values() {
            for arg in directive.args.values() {
                mark(&arg.ty, true);
            }
        }
    }
    usage
}

fn feature_usage(supergraph: &SupergraphState) -> FeatureUsage {
    let mut usage = FeatureUsage::default();
    for ty in supergraph.types.values() {
        usage.record(ty.metadata());
        match ty {
            SupergraphType::Object(composite) | SupergraphType::Interface(composite) => {
                for field in composite.fields.values() {
                    usage.record(&field.metadata);
                    usage.override_label |= field
                        .by_graph
                        .values()
                        .any(|field| field.override_label.is_some());
                    for arg in field.args.values() {
                        usage.record(&arg.metadata);
                    }
                }
            }
            SupergraphType::InputObject(input) => {
                for field in input.fields.values() {
                    usage.record(&field.metadata);
                }
            }
            SupergraphType::Enum(enum_type) => {
                for value in enum_type.values.values() {
                    usage.record(&value.metadata);
                }
            }
            SupergraphType::Union(_) | SupergraphType::Scalar(_) => {}
        }
    }
    usage
}

/// Folds the metadata of one subgraph element into the merged one.
///
/// The first non-empty description wins; tags, scopes and policies accumulate; the boolean
/// markers apply as soon as one subgraph sets them.
pub(crate) fn merge_metadata(
    ctx: &mut MergeContext,
    coordinate: &str,
    graph_name: &str,
    target: &mut Metadata,
    source: &Metadata,
) {
    match (&target.description, &source.description) {
        (None, Some(description)) => target.description = Some(description.clone()),
        (Some(kept), Some(description)) if kept != description => ctx.hint(
            HintCode::InconsistentDescription,
            format!(
                "Element \"{coordinate}\" has inconsistent descriptions across subgraphs: the description in subgraph \"{graph_name}\" differs from the one kept in the supergraph."
            ),
        ),
        _ => {}
    }
    target.tags.extend(source.tags.iter().cloned());
    target.inaccessible |= source.inaccessible;
    target.authenticated |= source.authenticated;
    for scopes in &source.requires_scopes {
        if !target.requires_scopes.contains(scopes) {
            target.requires_scopes.push(scopes.clone());
        }
    }
    for policies in &source.policies {
        if !target.policies.contains(policies) {
            target.policies.push(policies.clone());
        }
    }
    for directive in &source.composed_directives {
        let text = directive.to_string();
        if !target
            .composed_directives
            .iter()
            .any(|existing| existing.to_string() == text)
        {
            target.composed_directives.push(directive.clone());
        }
    }
}

/// Joins two types that differ at most by nullability.
///
/// With `nullable_wins` (output positions) a wrapper is non-null only if both sides are; otherwise
/// (input positions) it is non-null if either side is. Returns `None` when the types have
/// different shapes or base types.
pub(crate) fn merge_types(a: &Type, b: &Type, nullable_wins: bool) -> Option<Type> {
    let non_null = if nullable_wins {
        a.is_non_null() && b.is_non_null()
    } else {
        a.is_non_null() || b.is_non_null()
    };
    match (a, b) {
        (
            Type::Named(x) | Type::NonNullNamed(x),
            Type::Named(y) | Type::NonNullNamed(y),
        ) if x == y => Some(if non_null {
            Type::NonNullNamed(x.clone())
        } else {
            Type::Named(x.clone())
        }),
        (Type::List(x) | Type::NonNullList(x), Type::List(y) | Type::NonNullList(y)) => {
            let inner = merge_types(x, y, nullable_wins)?;
            Some(if non_null {
                Type::NonNullList(Box::new(inner))
            } else {
                Type::List(Box::new(inner))
            })
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use apollo_compiler::ty;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::subgraph::Subgraph;
    use crate::subgraph::builder::build_subgraph_state;
    use crate::subgraph::graph_ids;

    const FEDERATION_LINK: &str = r#"extend schema @link(url: "https://specs.apollo.dev/federation/v2.9", import: ["@key", "@external", "@requires", "@provides", "@shareable", "@override", "@tag", "@inaccessible", "@interfaceObject", "@composeDirective", "@authenticated", "@requiresScopes", "@policy"])"#;

    /// Merges federation 2 subgraphs given as `(name, sdl)` pairs, without the satisfiability
    /// check.
    pub(crate) fn merge(
        subgraphs: &[(&str, &str)],
    ) -> (SupergraphState, Vec<CompositionError>, Vec<CompositionHint>) {
        let subgraphs = subgraphs
            .iter()
            .map(|(name, sdl)| {
                Subgraph::parse(name, None, &format!("{FEDERATION_LINK}\n{sdl}")).unwrap()
            })
            .collect_vec();
        let mut errors = Vec::new();
        let ids = graph_ids(&subgraphs, &mut errors).unwrap();
        let states = subgraphs
            .iter()
            .zip(ids)
            .map(|(subgraph, id)| build_subgraph_state(subgraph, id, &mut errors).unwrap())
            .collect_vec();
        let mut hints = Vec::new();
        let supergraph = merge_subgraphs(&states, &mut errors, &mut hints).unwrap();
        (supergraph, errors, hints)
    }

    #[rstest]
    #[case(ty!(String), ty!(String!), ty!(String))]
    #[case(ty!(String!), ty!(String!), ty!(String!))]
    #[case(ty!([Int!]!), ty!([Int]!), ty!([Int]!))]
    #[case(ty!([Int!]), ty!([Int!]!), ty!([Int!]))]
    fn output_types_take_the_nullable_side(#[case] a: Type, #[case] b: Type, #[case] merged: Type) {
        assert_eq!(merge_types(&a, &b, true), Some(merged.clone()));
        assert_eq!(merge_types(&b, &a, true), Some(merged));
    }

    #[rstest]
    #[case(ty!(String), ty!(String!), ty!(String!))]
    #[case(ty!([Int]), ty!([Int!]), ty!([Int!]))]
    fn input_types_take_the_non_null_side(#[case] a: Type, #[case] b: Type, #[case] merged: Type) {
        assert_eq!(merge_types(&a, &b, false), Some(merged.clone()));
        assert_eq!(merge_types(&b, &a, false), Some(merged));
    }

    #[test]
    fn different_shapes_do_not_merge() {
        assert_eq!(merge_types(&ty!(String), &ty!(Int), true), None);
        assert_eq!(merge_types(&ty!([String]), &ty!(String), true), None);
    }
}
