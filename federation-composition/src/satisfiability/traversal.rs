//! Walks the supergraph API schema from its roots, tracking every set of subgraph positions that
//! can serve the current path.
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use apollo_compiler::Name;
use itertools::Itertools;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::trace;

use super::graph::FederatedGraph;
use super::graph::NodeKind;
use super::graph::Transition;
use super::witness::PathStep;
use super::witness::Unadvanceable;
use super::witness::satisfiability_error;
use crate::bail;
use crate::error::CompositionError;
use crate::error::FederationError;
use crate::merger::state::CompositeTypeState;
use crate::merger::state::FieldState;
use crate::merger::state::SupergraphState;
use crate::merger::state::SupergraphType;
use crate::subgraph::field_set::FieldSelection;
use crate::subgraph::field_set::Selection;
use crate::subgraph::state::RootKind;

/// Where a subgraph fetch can be while following a supergraph path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Position {
    node: NodeIndex,
    /// What an enclosing `@provides` lets the subgraph resolve below this position.
    provided: Option<Arc<Vec<Selection>>>,
}

impl Position {
    fn new(node: NodeIndex) -> Self {
        Self {
            node,
            provided: None,
        }
    }

    fn fingerprint(&self) -> String {
        match &self.provided {
            Some(provided) => format!("{}[{}]", self.node.index(), provided.iter().join(" ")),
            None => self.node.index().to_string(),
        }
    }
}

/// Positions that must all advance together: the same supergraph field split across the runtime
/// types of an interface.
type SimultaneousPositions = Vec<Position>;

fn option_fingerprint(option: &SimultaneousPositions) -> String {
    option.iter().map(Position::fingerprint).sorted().join(",")
}

struct ValidationState {
    root: RootKind,
    /// The supergraph type the path ends on.
    type_name: Name,
    path: Vec<PathStep>,
    /// Every alternative way subgraphs can be at the end of `path`.
    options: Vec<SimultaneousPositions>,
}

enum DirectField {
    Reached(Position),
    Missing,
    External,
    UnsatisfiedRequires,
}

pub(super) struct ValidationTraversal<'a> {
    supergraph: &'a SupergraphState,
    graph: &'a FederatedGraph,
    stack: Vec<ValidationState>,
    /// Per supergraph type, the option sets it was already explored with.
    visited: HashMap<Name, Vec<BTreeSet<String>>>,
    /// Whether the conditions of a key or `@requires` edge can be met from its source.
    conditions: HashMap<EdgeIndex, bool>,
    explored: usize,
    max_paths: Option<usize>,
    errors: Vec<CompositionError>,
}

impl<'a> ValidationTraversal<'a> {
    pub(super) fn new(
        supergraph: &'a SupergraphState,
        graph: &'a FederatedGraph,
        max_paths: Option<usize>,
    ) -> Self {
        let mut traversal = Self {
            supergraph,
            graph,
            stack: Vec::new(),
            visited: HashMap::new(),
            conditions: HashMap::new(),
            explored: 0,
            max_paths,
            errors: Vec::new(),
        };
        for root in RootKind::ALL.into_iter().rev() {
            let nodes = graph.roots(root);
            if !supergraph.root_types.contains(&root) || nodes.is_empty() {
                continue;
            }
            traversal.push(ValidationState {
                root,
                type_name: root.default_type_name(),
                path: Vec::new(),
                options: nodes.iter().map(|node| vec![Position::new(*node)]).collect(),
            });
        }
        traversal
    }

    pub(super) fn validate(mut self) -> Result<Vec<CompositionError>, FederationError> {
        while let Some(state) = self.stack.pop() {
            self.explored += 1;
            if let Some(max) = self.max_paths {
                if self.explored > max {
                    return Ok(vec![CompositionError::MaxValidationSubgraphPathsExceeded {
                        message: format!(
                            "Maximum number of validation subgraph paths exceeded: {}",
                            self.explored
                        ),
                    }]);
                }
            }
            self.advance(&state)?;
        }
        Ok(self.errors)
    }

    /// Explores a state unless the same type was already reached with a subset of its options.
    fn push(&mut self, state: ValidationState) {
        let options = state
            .options
            .iter()
            .map(option_fingerprint)
            .collect::<BTreeSet<_>>();
        let seen = self.visited.entry(state.type_name.clone()).or_default();
        if seen.iter().any(|previous| previous.is_subset(&options)) {
            trace!(type_name = %state.type_name, "already explored with fewer options");
            return;
        }
        seen.push(options);
        self.stack.push(state);
    }

    fn advance(&mut self, state: &ValidationState) -> Result<(), FederationError> {
        let supergraph = self.supergraph;
        let Some(ty) = supergraph.types.get(&state.type_name) else {
            bail!("path ends on unknown type \"{}\"", state.type_name);
        };
        trace!(type_name = %state.type_name, options = state.options.len(), "advancing");

        let mut next = Vec::new();
        if let SupergraphType::Object(composite) | SupergraphType::Interface(composite) = ty {
            for field in composite.fields.values() {
                if !self.in_api_schema(field) {
                    continue;
                }
                if let Some(state) = self.advance_field(state, composite, field) {
                    next.push(state);
                }
            }
        }
        for runtime_type in self.runtime_types(ty) {
            if let Some(state) = self.advance_downcast(state, &runtime_type) {
                next.push(state);
            }
        }
        // Pushed in reverse so that fields are explored in declaration order.
        for state in next.into_iter().rev() {
            self.push(state);
        }
        Ok(())
    }

    fn in_api_schema(&self, field: &FieldState) -> bool {
        !field.metadata.inaccessible
            && !self
                .supergraph
                .types
                .get(field.ty.inner_named_type())
                .is_some_and(|ty| ty.metadata().inaccessible)
    }

    fn runtime_types(&self, ty: &SupergraphType) -> Vec<Name> {
        let visible = |name: &Name| {
            self.supergraph
                .types
                .get(name)
                .is_some_and(|ty| !ty.metadata().inaccessible)
        };
        match ty {
            SupergraphType::Interface(interface) => self
                .supergraph
                .implementations(&interface.name)
                .map(|object| object.name.clone())
                .filter(|name| visible(name))
                .collect(),
            SupergraphType::Union(union) => union
                .members
                .iter()
                .filter(|member| visible(*member))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn advance_field(
        &mut self,
        state: &ValidationState,
        parent: &CompositeTypeState,
        field: &FieldState,
    ) -> Option<ValidationState> {
        let mut path = state.path.clone();
        path.push(PathStep::Field {
            parent: parent.name.clone(),
            name: field.name.clone(),
        });

        let mut options = Vec::new();
        let mut unadvanceables = Vec::new();
        for option in &state.options {
            match self.advance_option(option, parent, field) {
                Ok(advanced) => options.extend(advanced),
                Err(reasons) => unadvanceables.extend(reasons),
            }
        }
        if options.is_empty() {
            self.errors.push(satisfiability_error(
                self.supergraph,
                state.root,
                &path,
                &unadvanceables,
            ));
            return None;
        }
        let type_name = field.ty.inner_named_type();
        let composite = self
            .supergraph
            .types
            .get(type_name)
            .is_some_and(SupergraphType::is_composite);
        // An empty option cannot return anything, so there is nothing left to check below it.
        if !composite || options.iter().any(Vec::is_empty) {
            return None;
        }
        Some(ValidationState {
            root: state.root,
            type_name: type_name.clone(),
            path,
            options: dedup_options(options),
        })
    }

    fn advance_downcast(
        &self,
        state: &ValidationState,
        runtime_type: &Name,
    ) -> Option<ValidationState> {
        let options = state
            .options
            .iter()
            .filter_map(|option| {
                let positions = option
                    .iter()
                    .filter_map(|position| {
                        let node = self.graph.downcast(position.node, runtime_type)?;
                        Some(Position {
                            node,
                            provided: downcast_provided(position.provided.as_deref(), runtime_type),
                        })
                    })
                    .collect_vec();
                (!positions.is_empty()).then_some(positions)
            })
            .collect_vec();
        // No subgraph ever returns this runtime type here.
        if options.is_empty() {
            return None;
        }
        let mut path = state.path.clone();
        path.push(PathStep::Downcast {
            to: runtime_type.clone(),
        });
        Some(ValidationState {
            root: state.root,
            type_name: runtime_type.clone(),
            path,
            options: dedup_options(options),
        })
    }

    /// Advances every position of an option; the option survives only if all of them do.
    fn advance_option(
        &mut self,
        option: &SimultaneousPositions,
        parent: &CompositeTypeState,
        field: &FieldState,
    ) -> Result<Vec<SimultaneousPositions>, Vec<Unadvanceable>> {
        let mut per_position = Vec::new();
        for position in option {
            per_position.push(self.advance_position(position, parent, field)?);
        }
        Ok(combine(per_position))
    }

    /// The alternatives for collecting `field` from `position`: directly, through the runtime
    /// types of an interface, or after moving to other subgraphs.
    fn advance_position(
        &mut self,
        position: &Position,
        parent: &CompositeTypeState,
        field: &FieldState,
    ) -> Result<Vec<SimultaneousPositions>, Vec<Unadvanceable>> {
        let graph = self.graph;
        let node = graph.node(position.node);
        let coordinate = format!("{}.{}", parent.name, field.name);
        let mut alternatives = Vec::new();
        let mut unadvanceables = Vec::new();

        match self.direct_field(position, &field.name) {
            DirectField::Reached(next) => alternatives.push(vec![next]),
            DirectField::Missing if node.kind == NodeKind::Interface => {
                match self.explode(position, parent, field) {
                    Ok(exploded) => alternatives.extend(exploded),
                    Err(reasons) => unadvanceables.extend(reasons),
                }
            }
            DirectField::Missing => unadvanceables.push(self.unadvanceable(
                &node.graph,
                format!("cannot find field \"{coordinate}\""),
            )),
            DirectField::External => unadvanceables.push(self.unadvanceable(
                &node.graph,
                format!("field \"{coordinate}\" is not resolvable because marked @external"),
            )),
            DirectField::UnsatisfiedRequires => unadvanceables.push(self.unadvanceable(
                &node.graph,
                format!("cannot satisfy @require conditions on field \"{coordinate}\""),
            )),
        }

        let mut reached = vec![position.node];
        let mut queue = VecDeque::from([position.node]);
        while let Some(current) = queue.pop_front() {
            let moves = graph
                .moves(current)
                .map(|edge| (edge.id(), edge.target()))
                .collect_vec();
            for (edge, target) in moves {
                if reached.contains(&target) || !self.edge_conditions_satisfied(edge) {
                    continue;
                }
                reached.push(target);
                queue.push_back(target);
                match self.direct_field(&Position::new(target), &field.name) {
                    DirectField::Reached(next) => alternatives.push(vec![next]),
                    DirectField::UnsatisfiedRequires => unadvanceables.push(self.unadvanceable(
                        &graph.node(target).graph,
                        format!("cannot satisfy @require conditions on field \"{coordinate}\""),
                    )),
                    DirectField::Missing | DirectField::External => {}
                }
            }
        }

        if !alternatives.is_empty() {
            return Ok(alternatives);
        }
        unadvanceables.extend(self.move_failures(position.node, field, &coordinate));
        Err(unadvanceables)
    }

    fn direct_field(&mut self, position: &Position, field_name: &Name) -> DirectField {
        let graph = self.graph;
        let Some(edge) = graph.field_edge(position.node, field_name) else {
            return DirectField::Missing;
        };
        let (edge_id, target) = (edge.id(), edge.target());
        let Transition::Field {
            external,
            conditions_only,
            requires,
            provides,
            ..
        } = edge.weight()
        else {
            return DirectField::Missing;
        };
        if *conditions_only {
            return DirectField::Missing;
        }
        let provided = position
            .provided
            .as_deref()
            .and_then(|provided| provided_field(provided, field_name));
        if *external && provided.is_none() {
            return DirectField::External;
        }
        if requires.is_some() && !self.edge_conditions_satisfied(edge_id) {
            return DirectField::UnsatisfiedRequires;
        }
        let mut below = provided
            .map(|provided| provided.selections.clone())
            .unwrap_or_default();
        if let Some(provides) = provides {
            below.extend(provides.selections.iter().cloned());
        }
        DirectField::Reached(Position {
            node: target,
            provided: (!below.is_empty()).then(|| Arc::new(below)),
        })
    }

    /// Collects an interface field the subgraph does not declare on the interface itself from
    /// each of its implementations.
    fn explode(
        &mut self,
        position: &Position,
        parent: &CompositeTypeState,
        field: &FieldState,
    ) -> Result<Vec<SimultaneousPositions>, Vec<Unadvanceable>> {
        let graph = self.graph;
        let mut per_implementation = Vec::new();
        for implementation in graph.runtime_types(position.node) {
            let implementation_type = &graph.node(implementation).type_name;
            let at_implementation = Position {
                node: implementation,
                provided: downcast_provided(position.provided.as_deref(), implementation_type),
            };
            per_implementation.push(self.advance_position(&at_implementation, parent, field)?);
        }
        Ok(combine(per_implementation))
    }

    /// Why no move out of `node` could reach a subgraph resolving the field.
    fn move_failures(
        &mut self,
        node_index: NodeIndex,
        field: &FieldState,
        coordinate: &str,
    ) -> Vec<Unadvanceable> {
        let graph = self.graph;
        let node = graph.node(node_index);
        let source_name = self.graph_name(&node.graph);
        let mut failures = Vec::new();
        for (other, contribution) in &field.by_graph {
            if *other == node.graph || !contribution.resolves() {
                continue;
            }
            let other_name = self.graph_name(other);
            let keys = graph
                .moves(node_index)
                .filter(|edge| &graph.node(edge.target()).graph == other)
                .filter_map(|edge| match edge.weight() {
                    Transition::Key { key } => Some((edge.id(), key.clone())),
                    _ => None,
                })
                .collect_vec();
            if keys.is_empty() {
                failures.push(Unadvanceable {
                    subgraph: source_name.clone(),
                    details: format!(
                        "cannot move to subgraph \"{other_name}\", which has field \"{coordinate}\", because type \"{}\" has no @key defined in subgraph \"{other_name}\"",
                        node.type_name
                    ),
                });
                continue;
            }
            for (edge, key) in keys {
                if self.edge_conditions_satisfied(edge) {
                    continue;
                }
                failures.push(Unadvanceable {
                    subgraph: source_name.clone(),
                    details: format!(
                        "cannot move to subgraph \"{other_name}\" using @key(fields: \"{key}\") of \"{}\", the key field(s) cannot be resolved from subgraph \"{source_name}\"",
                        node.type_name
                    ),
                });
            }
        }
        failures
    }

    fn unadvanceable(&self, graph: &Name, details: String) -> Unadvanceable {
        Unadvanceable {
            subgraph: self.graph_name(graph),
            details,
        }
    }

    fn graph_name(&self, id: &Name) -> String {
        self.supergraph
            .graph(id)
            .map(|graph| graph.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Whether the key fields of a key edge, or the `@requires` field set of a field edge, can be
    /// collected starting from the edge source.
    fn edge_conditions_satisfied(&mut self, edge: EdgeIndex) -> bool {
        if let Some(satisfied) = self.conditions.get(&edge) {
            return *satisfied;
        }
        let graph = self.graph;
        let Some(source) = graph.edge_source(edge) else {
            return false;
        };
        let (selections, excluded) = match graph.edge(edge) {
            Transition::Key { key } => (&key.selections, graph.edge_target(edge)),
            Transition::Field {
                requires: Some(requires),
                ..
            } => (&requires.selections, None),
            _ => return true,
        };
        // A cycle of conditions depending on themselves is never satisfied.
        self.conditions.insert(edge, false);
        let excluded = excluded.into_iter().collect_vec();
        let satisfied = self.resolve_selections(source, selections, &excluded);
        self.conditions.insert(edge, satisfied);
        satisfied
    }

    fn resolve_selections(
        &mut self,
        node: NodeIndex,
        selections: &[Selection],
        excluded: &[NodeIndex],
    ) -> bool {
        selections
            .iter()
            .all(|selection| self.resolve_selection(node, selection, excluded))
    }

    fn resolve_selection(
        &mut self,
        node: NodeIndex,
        selection: &Selection,
        excluded: &[NodeIndex],
    ) -> bool {
        let field = match selection {
            Selection::InlineFragment(fragment) => {
                return match self.graph.downcast(node, &fragment.type_condition) {
                    Some(target) => self.resolve_selections(target, &fragment.selections, excluded),
                    None => true,
                };
            }
            Selection::Field(field) => field,
        };
        if field.name.as_str() == "__typename" || self.resolve_field_here(node, field) {
            return true;
        }
        let moves = self
            .graph
            .moves(node)
            .map(|edge| (edge.id(), edge.target()))
            .filter(|(_, target)| !excluded.contains(target))
            .collect_vec();
        let mut excluded = excluded.to_vec();
        excluded.push(node);
        moves.into_iter().any(|(edge, target)| {
            self.edge_conditions_satisfied(edge)
                && self.resolve_selection(target, selection, &excluded)
        })
    }

    fn resolve_field_here(&mut self, node: NodeIndex, field: &FieldSelection) -> bool {
        let graph = self.graph;
        let Some(edge) = graph.field_edge(node, &field.name) else {
            return false;
        };
        let (edge_id, target) = (edge.id(), edge.target());
        let Transition::Field {
            external, requires, ..
        } = edge.weight()
        else {
            return false;
        };
        if *external || (requires.is_some() && !self.edge_conditions_satisfied(edge_id)) {
            return false;
        }
        field.selections.is_empty() || self.resolve_selections(target, &field.selections, &[])
    }
}

/// Every way of picking one alternative per position, each merged into one option.
fn combine(per_position: Vec<Vec<SimultaneousPositions>>) -> Vec<SimultaneousPositions> {
    if per_position.is_empty() {
        return vec![Vec::new()];
    }
    per_position
        .into_iter()
        .multi_cartesian_product()
        .map(|picked| {
            let mut positions = picked.into_iter().flatten().collect_vec();
            positions.dedup();
            positions
        })
        .collect()
}

fn dedup_options(options: Vec<SimultaneousPositions>) -> Vec<SimultaneousPositions> {
    options
        .into_iter()
        .unique_by(option_fingerprint)
        .collect()
}

fn provided_field<'s>(provided: &'s [Selection], name: &Name) -> Option<&'s FieldSelection> {
    provided.iter().find_map(|selection| match selection {
        Selection::Field(field) if field.name == *name => Some(field),
        _ => None,
    })
}

/// What stays provided after a type condition on `runtime_type`: unconditioned fields, plus the
/// content of fragments on that type.
fn downcast_provided(
    provided: Option<&Vec<Selection>>,
    runtime_type: &Name,
) -> Option<Arc<Vec<Selection>>> {
    let provided = provided?;
    let selections = provided
        .iter()
        .flat_map(|selection| match selection {
            Selection::Field(_) => vec![selection.clone()],
            Selection::InlineFragment(fragment) if fragment.type_condition == *runtime_type => {
                fragment.selections.clone()
            }
            Selection::InlineFragment(_) => Vec::new(),
        })
        .collect_vec();
    (!selections.is_empty()).then(|| Arc::new(selections))
}
