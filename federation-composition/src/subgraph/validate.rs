//! Checks `@key`, `@requires` and `@provides` field sets against the types of their subgraph.
use std::collections::HashSet;

use apollo_compiler::Name;

use crate::error::CompositionError;
use crate::subgraph::field_set::FieldSet;
use crate::subgraph::field_set::Selection;
use crate::subgraph::state::SubgraphState;
use crate::subgraph::state::TypeDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSetUse {
    Requires,
    Provides,
}

/// Removes field sets that select things the subgraph does not define, reporting each one, and
/// marks every field reached by a remaining key as `used_in_key`.
///
/// Key fields of `extension_types` lose their `@external` marker: an entity extension resolves
/// its own keys.
pub(super) fn validate_field_sets(
    state: &mut SubgraphState,
    extension_types: &HashSet<Name>,
    errors: &mut Vec<CompositionError>,
) {
    let subgraph_name = state.graph.name.clone();
    let mut invalid_keys = Vec::new();
    let mut key_fields = HashSet::new();
    let mut extension_key_fields = HashSet::new();
    let mut invalid_field_sets = Vec::new();

    for ty in state.types.values() {
        for (index, key) in ty.keys().iter().enumerate() {
            match visit(state, ty.name(), &key.field_set) {
                Ok(visited) => {
                    if extension_types.contains(ty.name()) {
                        extension_key_fields.extend(visited.iter().cloned());
                    }
                    key_fields.extend(visited);
                }
                Err(error) => {
                    errors.push(CompositionError::KeyInvalidFields {
                        message: format!(
                            "[{subgraph_name}] On type \"{}\", for @key(fields: \"{}\"): {error}",
                            ty.name(),
                            key.field_set
                        ),
                    });
                    invalid_keys.push((ty.name().clone(), index));
                }
            }
        }

        let Some(fields) = ty.fields() else {
            continue;
        };
        for field in fields.values() {
            let coordinate = format!("{}.{}", ty.name(), field.name);
            if let Some(requires) = &field.requires {
                if let Err(error) = visit(state, ty.name(), requires) {
                    errors.push(CompositionError::RequiresInvalidFields {
                        message: format!(
                            "[{subgraph_name}] On field \"{coordinate}\", for @requires(fields: \"{requires}\"): {error}"
                        ),
                    });
                    invalid_field_sets.push((
                        ty.name().clone(),
                        field.name.clone(),
                        FieldSetUse::Requires,
                    ));
                }
            }
            let Some(provides) = &field.provides else {
                continue;
            };
            let base_type = field.ty.inner_named_type();
            let is_composite = state
                .types
                .get(base_type)
                .is_some_and(|definition| definition.is_composite());
            if !is_composite {
                errors.push(CompositionError::ProvidesOnNonObjectField {
                    message: format!(
                        "[{subgraph_name}] Invalid @provides directive on field \"{coordinate}\": field has type \"{}\" which is not a Composite Type",
                        field.ty
                    ),
                });
                invalid_field_sets.push((
                    ty.name().clone(),
                    field.name.clone(),
                    FieldSetUse::Provides,
                ));
            } else if let Err(error) = visit(state, base_type, provides) {
                errors.push(CompositionError::ProvidesInvalidFields {
                    message: format!(
                        "[{subgraph_name}] On field \"{coordinate}\", for @provides(fields: \"{provides}\"): {error}"
                    ),
                });
                invalid_field_sets.push((
                    ty.name().clone(),
                    field.name.clone(),
                    FieldSetUse::Provides,
                ));
            }
        }
    }

    // Reverse order keeps the remaining indices of a type valid while removing.
    for (type_name, index) in invalid_keys.into_iter().rev() {
        match state.types.get_mut(&type_name) {
            Some(TypeDefinition::Object(object)) => {
                object.keys.remove(index);
            }
            Some(TypeDefinition::Interface(interface)) => {
                interface.keys.remove(index);
            }
            _ => {}
        }
    }
    for (type_name, field_name, field_set_use) in invalid_field_sets {
        let Some(field) = state
            .types
            .get_mut(&type_name)
            .and_then(|ty| ty.fields_mut())
            .and_then(|fields| fields.get_mut(&field_name))
        else {
            continue;
        };
        match field_set_use {
            FieldSetUse::Requires => field.requires = None,
            FieldSetUse::Provides => field.provides = None,
        }
    }
    for (type_name, field_name) in key_fields {
        if let Some(field) = state
            .types
            .get_mut(&type_name)
            .and_then(|ty| ty.fields_mut())
            .and_then(|fields| fields.get_mut(&field_name))
        {
            field.used_in_key = true;
            if extension_key_fields.contains(&(type_name.clone(), field_name.clone())) {
                field.external = false;
            }
        }
    }
}

/// Walks a field set from `parent`, returning every `(type, field)` pair it selects.
fn visit(
    state: &SubgraphState,
    parent: &Name,
    field_set: &FieldSet,
) -> Result<Vec<(Name, Name)>, String> {
    let mut visited = Vec::new();
    visit_selections(state, parent, &field_set.selections, &mut visited)?;
    Ok(visited)
}

fn visit_selections(
    state: &SubgraphState,
    parent: &Name,
    selections: &[Selection],
    visited: &mut Vec<(Name, Name)>,
) -> Result<(), String> {
    for selection in selections {
        match selection {
            Selection::Field(selected) => {
                if selected.name.as_str() == "__typename" && selected.selections.is_empty() {
                    continue;
                }
                let Some(field) = state.field(parent, &selected.name) else {
                    return Err(format!(
                        "Cannot query field \"{}\" on type \"{parent}\" (if the field is defined in another subgraph, you need to add it to this subgraph with @external).",
                        selected.name
                    ));
                };
                visited.push((parent.clone(), field.name.clone()));
                let base_type = field.ty.inner_named_type();
                let is_composite = state
                    .types
                    .get(base_type)
                    .is_some_and(|definition| definition.is_composite());
                match (is_composite, selected.selections.is_empty()) {
                    (true, true) => {
                        return Err(format!(
                            "Field \"{parent}.{}\" is of composite type \"{}\" and must have a selection of subfields.",
                            field.name, field.ty
                        ));
                    }
                    (false, false) => {
                        return Err(format!(
                            "Field \"{parent}.{}\" is of leaf type \"{}\" and cannot have a selection of subfields.",
                            field.name, field.ty
                        ));
                    }
                    (true, false) => {
                        visit_selections(state, base_type, &selected.selections, visited)?
                    }
                    (false, true) => {}
                }
            }
            Selection::InlineFragment(fragment) => {
                let type_condition = &fragment.type_condition;
                if !state
                    .types
                    .get(type_condition)
                    .is_some_and(|definition| definition.is_composite())
                {
                    return Err(format!(
                        "Unknown composite type \"{type_condition}\" in inline fragment on \"{parent}\"."
                    ));
                }
                visit_selections(state, type_condition, &fragment.selections, visited)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;

    use crate::error::CompositionError;
    use crate::error::ErrorCode;
    use crate::subgraph::Subgraph;
    use crate::subgraph::builder::build_subgraph_state;
    use crate::subgraph::state::SubgraphState;

    fn build(sdl: &str) -> (SubgraphState, Vec<CompositionError>) {
        let sdl = format!(
            "extend schema @link(url: \"https://specs.apollo.dev/federation/v2.3\", import: [\"@key\", \"@external\", \"@requires\", \"@provides\"])\n{sdl}"
        );
        let subgraph = Subgraph::parse("A", None, &sdl).unwrap();
        let mut errors = Vec::new();
        let state = build_subgraph_state(&subgraph, name!("A"), &mut errors).unwrap();
        (state, errors)
    }

    #[test]
    fn unknown_key_field_is_removed() {
        let (state, errors) = build(
            r#"
            type Query { a: Int }
            type User @key(fields: "uuid") @key(fields: "id") { id: ID! }
            "#,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), ErrorCode::KeyInvalidFields);
        assert_eq!(
            errors[0].to_string(),
            "[A] On type \"User\", for @key(fields: \"uuid\"): Cannot query field \"uuid\" on type \"User\" (if the field is defined in another subgraph, you need to add it to this subgraph with @external)."
        );
        let user = state.object("User").unwrap();
        assert_eq!(user.keys.len(), 1);
        assert_eq!(user.keys[0].field_set.as_str(), "id");
    }

    #[test]
    fn nested_key_fields_are_marked() {
        let (state, errors) = build(
            r#"
            type Query { a: Int }
            type User @key(fields: "id organization { id }") { id: ID! organization: Org! name: String }
            type Org { id: ID! name: String }
            "#,
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert!(state.field("User", "organization").unwrap().used_in_key);
        assert!(state.field("Org", "id").unwrap().used_in_key);
        assert!(!state.field("Org", "name").unwrap().used_in_key);
        assert!(!state.field("User", "name").unwrap().used_in_key);
    }

    #[test]
    fn composite_key_field_needs_selection() {
        let (_, errors) = build(
            r#"
            type Query { a: Int }
            type User @key(fields: "organization") { organization: Org! }
            type Org { id: ID! }
            "#,
        );
        assert_eq!(errors[0].code(), ErrorCode::KeyInvalidFields);
    }

    #[test]
    fn provides_on_leaf_field() {
        let (state, errors) = build(
            r#"
            type Query { count: Int @provides(fields: "id") }
            "#,
        );
        assert_eq!(errors[0].code(), ErrorCode::ProvidesOnNonObjectField);
        assert!(state.field("Query", "count").unwrap().provides.is_none());
    }

    #[test]
    fn invalid_requires_is_cleared() {
        let (state, errors) = build(
            r#"
            type Query { a: Int }
            type Product @key(fields: "upc") {
              upc: String!
              shippingEstimate: Int @requires(fields: "weight")
            }
            "#,
        );
        assert_eq!(errors[0].code(), ErrorCode::RequiresInvalidFields);
        assert!(errors[0].to_string().starts_with(
            "[A] On field \"Product.shippingEstimate\", for @requires(fields: \"weight\"):"
        ));
        assert!(state.field("Product", "shippingEstimate").unwrap().requires.is_none());
    }

    #[test]
    fn provides_through_inline_fragment() {
        let (_, errors) = build(
            r#"
            type Query { media: [Media] @provides(fields: "... on Book { title }") }
            interface Media { id: ID! }
            type Book implements Media @key(fields: "id") { id: ID! title: String @external }
            "#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }
}
