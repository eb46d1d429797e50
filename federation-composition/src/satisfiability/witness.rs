//! Builds the user-facing report of an unsatisfiable path: a witness operation reaching it and
//! the reasons every subgraph gave for not resolving it.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use itertools::Itertools;

use crate::error::CompositionError;
use crate::merger::state::SupergraphState;
use crate::merger::state::SupergraphType;
use crate::subgraph::state::RootKind;

/// One step of a path in the supergraph API schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathStep {
    Field { parent: Name, name: Name },
    Downcast { to: Name },
}

/// Why one subgraph position could not advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unadvanceable {
    /// Name of the subgraph the reason is reported for.
    pub(crate) subgraph: String,
    pub(crate) details: String,
}

pub(super) fn satisfiability_error(
    supergraph: &SupergraphState,
    root: RootKind,
    path: &[PathStep],
    unadvanceables: &[Unadvanceable],
) -> CompositionError {
    let operation = witness_operation(supergraph, root, path);
    let message = format!(
        "The following supergraph API query:\n\
         {operation}\n\
         cannot be satisfied by the subgraphs because:\n\
         {reasons}",
        reasons = display_reasons(unadvanceables),
    );
    CompositionError::SatisfiabilityError {
        message,
        query: operation,
    }
}

/// Renders the operation following `path`. A path stopping on a composite type ends with `...`,
/// marking where the query stops being satisfiable.
pub(crate) fn witness_operation(
    supergraph: &SupergraphState,
    root: RootKind,
    path: &[PathStep],
) -> String {
    let mut operation = match root {
        RootKind::Query => "{\n".to_string(),
        kind => format!("{} {{\n", kind.operation_keyword()),
    };
    let tail_is_composite = match path.last() {
        Some(PathStep::Field { parent, name }) => supergraph
            .composite(parent)
            .and_then(|parent| parent.fields.get(name))
            .and_then(|field| supergraph.types.get(field.ty.inner_named_type()))
            .is_some_and(SupergraphType::is_composite),
        Some(PathStep::Downcast { .. }) | None => true,
    };
    write_selections(&mut operation, supergraph, path, 1, tail_is_composite);
    operation.push('}');
    operation
}

fn write_selections(
    out: &mut String,
    supergraph: &SupergraphState,
    path: &[PathStep],
    depth: usize,
    tail_is_composite: bool,
) {
    let indent = "  ".repeat(depth);
    let Some((step, rest)) = path.split_first() else {
        out.push_str(&format!("{indent}...\n"));
        return;
    };
    let head = match step {
        PathStep::Field { parent, name } => format!("{name}{}", witness_arguments(supergraph, parent, name)),
        PathStep::Downcast { to } => format!("... on {to}"),
    };
    if rest.is_empty() && !tail_is_composite {
        out.push_str(&format!("{indent}{head}\n"));
        return;
    }
    out.push_str(&format!("{indent}{head} {{\n"));
    write_selections(out, supergraph, rest, depth + 1, tail_is_composite);
    out.push_str(&format!("{indent}}}\n"));
}

/// Placeholder values for the required arguments of a field.
fn witness_arguments(supergraph: &SupergraphState, parent: &Name, name: &Name) -> String {
    let Some(field) = supergraph
        .composite(parent)
        .and_then(|parent| parent.fields.get(name))
    else {
        return String::new();
    };
    let arguments = field
        .args
        .values()
        .filter(|arg| arg.is_required())
        .map(|arg| {
            let value = witness_value(supergraph, &arg.ty, &mut Vec::new());
            format!("{}: {value}", arg.name)
        })
        .collect_vec();
    if arguments.is_empty() {
        String::new()
    } else {
        format!("({})", arguments.join(", "))
    }
}

// Values are always non-null, even for nullable types. An input object already being built
// higher up is left empty.
fn witness_value(
    supergraph: &SupergraphState,
    ty: &Type,
    building: &mut Vec<Name>,
) -> Node<ast::Value> {
    let value = match ty {
        Type::List(_) | Type::NonNullList(_) => ast::Value::List(vec![]),
        Type::Named(name) | Type::NonNullNamed(name) => match supergraph.types.get(name) {
            Some(SupergraphType::Enum(enum_type)) => match enum_type.values.keys().next() {
                Some(value) => ast::Value::Enum(value.clone()),
                None => ast::Value::String("<some value>".to_string()),
            },
            Some(SupergraphType::InputObject(_)) if building.contains(name) => {
                ast::Value::Object(vec![])
            }
            Some(SupergraphType::InputObject(input)) => {
                building.push(name.clone());
                let fields = input
                    .fields
                    .values()
                    .filter(|field| field.is_required())
                    .map(|field| {
                        let value = witness_value(supergraph, &field.ty, building);
                        (field.name.clone(), value)
                    })
                    .collect();
                building.pop();
                ast::Value::Object(fields)
            }
            _ => match name.as_str() {
                "Int" => ast::Value::Int(0.into()),
                #[allow(clippy::approx_constant)]
                "Float" => ast::Value::Float((3.14).into()),
                "Boolean" => ast::Value::Boolean(true),
                "String" => ast::Value::String("A string value".to_string()),
                // Nothing says which format an ID takes at this position.
                "ID" => ast::Value::String("<any id>".to_string()),
                _ => ast::Value::String("<some value>".to_string()),
            },
        },
    };
    Node::new(value)
}

/// One line per subgraph, or a nested list when a subgraph gave several distinct reasons.
pub(crate) fn display_reasons(unadvanceables: &[Unadvanceable]) -> String {
    let mut by_subgraph = IndexMap::<&str, IndexSet<&str>>::default();
    for unadvanceable in unadvanceables {
        by_subgraph
            .entry(unadvanceable.subgraph.as_str())
            .or_default()
            .insert(unadvanceable.details.as_str());
    }
    by_subgraph
        .iter()
        .map(|(subgraph, details)| {
            if details.len() == 1 {
                format!("- from subgraph \"{subgraph}\": {}.", details[0])
            } else {
                let nested = details.iter().map(|details| format!("  - {details}.")).join("\n");
                format!("- from subgraph \"{subgraph}\":\n{nested}")
            }
        })
        .join("\n")
}
