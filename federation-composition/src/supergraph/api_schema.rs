//! API schema generation: the supergraph without the elements that only exist for composition
//! and routing, and without anything `@inaccessible`.
use std::collections::HashSet;

use apollo_compiler::Node;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::DirectiveList;
use apollo_compiler::ast::Document;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::InputValueDefinition;
use tracing::debug;

use crate::error::FederationError;
use crate::link::Link;
use crate::link::registry::schema_directives;

/// Directives that stay on the elements of the API schema.
const KEPT_DIRECTIVES: [&str; 2] = ["deprecated", "specifiedBy"];

/// Which names of the supergraph belong to its `@link`ed specifications.
struct LinkedNames {
    links: Vec<Link>,
}

impl LinkedNames {
    fn from_document(document: &Document) -> Self {
        let links = schema_directives(document)
            .filter(|directive| directive.name.as_str() == "link")
            .filter_map(|directive| Link::from_directive_application(directive).ok())
            .collect();
        Self { links }
    }

    fn is_linked_directive(&self, name: &str) -> bool {
        self.links
            .iter()
            .any(|link| link.directive_for_name_in_schema(name).is_some())
    }

    fn is_linked_type(&self, name: &str) -> bool {
        self.links.iter().any(|link| {
            let prefix = format!("{}__", link.spec_name_in_schema());
            name.starts_with(&prefix)
                || link
                    .imports
                    .iter()
                    .any(|import| !import.is_directive && import.imported_name().as_str() == name)
        })
    }
}

fn is_inaccessible(directives: &DirectiveList) -> bool {
    directives.get("inaccessible").is_some()
}

fn kept_directives(directives: &DirectiveList) -> DirectiveList {
    DirectiveList(
        directives
            .iter()
            .filter(|directive| KEPT_DIRECTIVES.contains(&directive.name.as_str()))
            .cloned()
            .collect(),
    )
}

pub(super) fn to_api_schema(supergraph: &Document) -> Result<Document, FederationError> {
    let linked = LinkedNames::from_document(supergraph);
    let removed_types = supergraph
        .definitions
        .iter()
        .filter_map(|definition| {
            let name = definition.name()?;
            let removed = match definition {
                Definition::DirectiveDefinition(_) | Definition::SchemaDefinition(_) => false,
                _ => {
                    linked.is_linked_type(name)
                        || definition.directives().get("inaccessible").is_some()
                }
            };
            removed.then(|| name.to_string())
        })
        .collect::<HashSet<_>>();
    let visible_type = |name: &str| !removed_types.contains(name);
    let visible_input_value = |value: &&Node<InputValueDefinition>| {
        !is_inaccessible(&value.directives) && visible_type(value.ty.inner_named_type())
    };
    let api_input_value = |value: &Node<InputValueDefinition>| {
        let mut value = value.clone();
        value.make_mut().directives = kept_directives(&value.directives);
        value
    };
    let api_field = |field: &Node<FieldDefinition>| {
        let mut field = field.clone();
        let arguments = field
            .arguments
            .iter()
            .filter(visible_input_value)
            .map(api_input_value)
            .collect();
        let field_mut = field.make_mut();
        field_mut.arguments = arguments;
        field_mut.directives = kept_directives(&field_mut.directives);
        field
    };
    let visible_field = |field: &&Node<FieldDefinition>| {
        !is_inaccessible(&field.directives) && visible_type(field.ty.inner_named_type())
    };

    let mut api = Document::new();
    for definition in &supergraph.definitions {
        if definition
            .name()
            .is_some_and(|name| removed_types.contains(name.as_str()))
        {
            continue;
        }
        let definition = match definition {
            Definition::SchemaDefinition(schema) => {
                let mut schema = schema.clone();
                let schema_mut = schema.make_mut();
                schema_mut.directives = DirectiveList::default();
                schema_mut
                    .root_operations
                    .retain(|operation| visible_type(&operation.1));
                Definition::SchemaDefinition(schema)
            }
            Definition::DirectiveDefinition(directive) => {
                if linked.is_linked_directive(&directive.name) {
                    continue;
                }
                Definition::DirectiveDefinition(directive.clone())
            }
            Definition::ObjectTypeDefinition(object) => {
                let mut object = object.clone();
                let object_mut = object.make_mut();
                object_mut.directives = kept_directives(&object_mut.directives);
                object_mut
                    .implements_interfaces
                    .retain(|interface| visible_type(interface));
                object_mut.fields = object_mut
                    .fields
                    .iter()
                    .filter(visible_field)
                    .map(api_field)
                    .collect();
                Definition::ObjectTypeDefinition(object)
            }
            Definition::InterfaceTypeDefinition(interface) => {
                let mut interface = interface.clone();
                let interface_mut = interface.make_mut();
                interface_mut.directives = kept_directives(&interface_mut.directives);
                interface_mut
                    .implements_interfaces
                    .retain(|interface| visible_type(interface));
                interface_mut.fields = interface_mut
                    .fields
                    .iter()
                    .filter(visible_field)
                    .map(api_field)
                    .collect();
                Definition::InterfaceTypeDefinition(interface)
            }
            Definition::InputObjectTypeDefinition(input) => {
                let mut input = input.clone();
                let input_mut = input.make_mut();
                input_mut.directives = kept_directives(&input_mut.directives);
                input_mut.fields = input_mut
                    .fields
                    .iter()
                    .filter(visible_input_value)
                    .map(api_input_value)
                    .collect();
                Definition::InputObjectTypeDefinition(input)
            }
            Definition::UnionTypeDefinition(union) => {
                let mut union = union.clone();
                let union_mut = union.make_mut();
                union_mut.directives = kept_directives(&union_mut.directives);
                union_mut.members.retain(|member| visible_type(member));
                Definition::UnionTypeDefinition(union)
            }
            Definition::EnumTypeDefinition(enum_type) => {
                let mut enum_type = enum_type.clone();
                let enum_mut = enum_type.make_mut();
                enum_mut.directives = kept_directives(&enum_mut.directives);
                enum_mut.values = enum_mut
                    .values
                    .iter()
                    .filter(|value| !is_inaccessible(&value.directives))
                    .map(|value| {
                        let mut value = value.clone();
                        value.make_mut().directives = kept_directives(&value.directives);
                        value
                    })
                    .collect();
                Definition::EnumTypeDefinition(enum_type)
            }
            Definition::ScalarTypeDefinition(scalar) => {
                let mut scalar = scalar.clone();
                let scalar_mut = scalar.make_mut();
                scalar_mut.directives = kept_directives(&scalar_mut.directives);
                Definition::ScalarTypeDefinition(scalar)
            }
            other => other.clone(),
        };
        api.definitions.push(definition);
    }
    debug!(
        removed_types = removed_types.len(),
        definitions = api.definitions.len(),
        "derived API schema"
    );
    Ok(api)
}
