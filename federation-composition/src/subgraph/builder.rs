//! Single-pass extraction of a [`SubgraphState`] from a subgraph document.
use std::collections::HashMap;
use std::collections::HashSet;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::DirectiveList;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use crate::bail;
use crate::error::CompositionError;
use crate::error::FederationError;
use crate::link::federation_spec_definition::FederationDirective;
use crate::link::federation_spec_definition::key_directive_arguments;
use crate::link::federation_spec_definition::nested_string_list_argument;
use crate::link::federation_spec_definition::override_directive_arguments;
use crate::link::federation_spec_definition::string_argument;
use crate::link::registry::LinkedSpecs;
use crate::subgraph::Subgraph;
use crate::subgraph::field_set::FieldSet;
use crate::subgraph::state::Argument;
use crate::subgraph::state::Deprecation;
use crate::subgraph::state::DirectiveDefinitionState;
use crate::subgraph::state::EnumType;
use crate::subgraph::state::EnumValue;
use crate::subgraph::state::Field;
use crate::subgraph::state::Graph;
use crate::subgraph::state::InputObjectType;
use crate::subgraph::state::InterfaceType;
use crate::subgraph::state::Key;
use crate::subgraph::state::Metadata;
use crate::subgraph::state::ObjectType;
use crate::subgraph::state::RootKind;
use crate::subgraph::state::ScalarType;
use crate::subgraph::state::SubgraphState;
use crate::subgraph::state::TypeDefinition;
use crate::subgraph::state::TypeKind;
use crate::subgraph::state::UnionType;
use crate::subgraph::validate::validate_field_sets;

const EXECUTABLE_DIRECTIVE_LOCATIONS: [DirectiveLocation; 8] = [
    DirectiveLocation::Query,
    DirectiveLocation::Mutation,
    DirectiveLocation::Subscription,
    DirectiveLocation::Field,
    DirectiveLocation::FragmentDefinition,
    DirectiveLocation::FragmentSpread,
    DirectiveLocation::InlineFragment,
    DirectiveLocation::VariableDefinition,
];

const ENTITY_ROOT_FIELDS: [&str; 2] = ["_service", "_entities"];

/// The schema element a directive is applied to.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Type(&'a Name),
    Field(&'a Name, &'a Name),
    Argument(&'a Name, &'a Name, &'a Name),
    InputField(&'a Name, &'a Name),
    EnumValue(&'a Name, &'a Name),
}

impl Target<'_> {
    fn location(&self, kind: TypeKind) -> DirectiveLocation {
        match self {
            Target::Type(_) => match kind {
                TypeKind::Object => DirectiveLocation::Object,
                TypeKind::Interface => DirectiveLocation::Interface,
                TypeKind::InputObject => DirectiveLocation::InputObject,
                TypeKind::Union => DirectiveLocation::Union,
                TypeKind::Enum => DirectiveLocation::Enum,
                TypeKind::Scalar => DirectiveLocation::Scalar,
            },
            Target::Field(..) => DirectiveLocation::FieldDefinition,
            Target::Argument(..) => DirectiveLocation::ArgumentDefinition,
            Target::InputField(..) => DirectiveLocation::InputFieldDefinition,
            Target::EnumValue(..) => DirectiveLocation::EnumValue,
        }
    }
}

/// Flags set by type-level directives that apply to the fields of the same block.
#[derive(Debug, Default, Clone, Copy)]
struct BlockFlags {
    external: bool,
    shareable: bool,
}

struct SubgraphStateBuilder<'a> {
    subgraph: &'a Subgraph,
    links: LinkedSpecs,
    root_renames: HashMap<Name, Name>,
    root_types: IndexSet<RootKind>,
    types: IndexMap<Name, TypeDefinition>,
    directives: IndexMap<Name, DirectiveDefinitionState>,
    locally_defined_directives: HashSet<Name>,
    with_definition: HashSet<Name>,
    with_extension_block: HashSet<Name>,
    with_extends: HashSet<Name>,
    keyed_in_extension_block: HashSet<Name>,
    errors: &'a mut Vec<CompositionError>,
}

/// Builds the canonical model of `subgraph`.
///
/// User mistakes are appended to `errors`; an `Err` is only returned for internal errors.
#[instrument(skip_all, fields(subgraph = %subgraph.name))]
pub fn build_subgraph_state(
    subgraph: &Subgraph,
    graph_id: Name,
    errors: &mut Vec<CompositionError>,
) -> Result<SubgraphState, FederationError> {
    let errors_before = errors.len();
    let links = LinkedSpecs::from_document(&subgraph.name, &subgraph.document, errors);
    let locally_defined_directives = subgraph
        .document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::DirectiveDefinition(def) => Some(def.name.clone()),
            _ => None,
        })
        .collect();
    let mut builder = SubgraphStateBuilder {
        subgraph,
        links,
        root_renames: HashMap::new(),
        root_types: Default::default(),
        types: Default::default(),
        directives: Default::default(),
        locally_defined_directives,
        with_definition: HashSet::new(),
        with_extension_block: HashSet::new(),
        with_extends: HashSet::new(),
        keyed_in_extension_block: HashSet::new(),
        errors,
    };
    builder.detect_root_types();
    for definition in &subgraph.document.definitions {
        builder.visit_definition(definition)?;
    }
    let extension_types = builder.extension_types();
    let mut state = builder.finish(graph_id);
    let errors_before_validation = errors.len();
    validate_field_sets(&mut state, &extension_types, errors);
    debug!(
        types = state.types.len(),
        errors = errors.len() - errors_before,
        field_set_errors = errors.len() - errors_before_validation,
        "built subgraph state"
    );
    Ok(state)
}

impl SubgraphStateBuilder<'_> {
    fn name(&self) -> &str {
        &self.subgraph.name
    }

    fn detect_root_types(&mut self) {
        let declared_types = self
            .subgraph
            .document
            .definitions
            .iter()
            .filter_map(|definition| definition.name())
            .cloned()
            .collect::<HashSet<Name>>();
        let mut explicit = IndexMap::<RootKind, Name>::default();
        for definition in &self.subgraph.document.definitions {
            let root_operations = match definition {
                Definition::SchemaDefinition(schema) => &schema.root_operations,
                Definition::SchemaExtension(schema) => &schema.root_operations,
                _ => continue,
            };
            for root_operation in root_operations {
                let (operation_type, type_name) = &**root_operation;
                let kind = match operation_type {
                    OperationType::Query => RootKind::Query,
                    OperationType::Mutation => RootKind::Mutation,
                    OperationType::Subscription => RootKind::Subscription,
                };
                explicit.insert(kind, type_name.clone());
            }
        }

        for kind in RootKind::ALL {
            let default_name = kind.default_type_name();
            let name = match explicit.get(&kind) {
                Some(name) => name.clone(),
                None if explicit.is_empty() && declared_types.contains(&default_name) => {
                    default_name.clone()
                }
                None => continue,
            };
            if name != default_name {
                if declared_types.contains(&default_name) {
                    let message = format!(
                        "[{}] The schema has a type named \"{default_name}\" but it is not set as the {} root type (\"{name}\" is instead): this is not supported by federation. If a root type does not use its default name, there should be no other type with that default name.",
                        self.name(),
                        kind.operation_keyword(),
                    );
                    self.errors.push(match kind {
                        RootKind::Query => CompositionError::RootQueryUsed { message },
                        RootKind::Mutation => CompositionError::RootMutationUsed { message },
                        RootKind::Subscription => {
                            CompositionError::RootSubscriptionUsed { message }
                        }
                    });
                    continue;
                }
                self.root_renames.insert(name.clone(), default_name);
            }
            self.root_types.insert(kind);
        }
    }

    fn rename(&self, name: &Name) -> Name {
        self.root_renames.get(name).unwrap_or(name).clone()
    }

    fn rename_type(&self, ty: &Type) -> Type {
        match ty {
            Type::Named(name) => Type::Named(self.rename(name)),
            Type::NonNullNamed(name) => Type::NonNullNamed(self.rename(name)),
            Type::List(inner) => Type::List(Box::new(self.rename_type(inner))),
            Type::NonNullList(inner) => Type::NonNullList(Box::new(self.rename_type(inner))),
        }
    }

    fn is_query_root(&self, name: &Name) -> bool {
        self.root_types.contains(&RootKind::Query) && *name == RootKind::Query.default_type_name()
    }

    fn visit_definition(&mut self, definition: &Definition) -> Result<(), FederationError> {
        if let Some(name) = definition.name() {
            if !matches!(definition, Definition::DirectiveDefinition(_))
                && self.links.is_federation_type(name)
            {
                trace!(type_name = %name, "skipping federation type");
                return Ok(());
            }
        }
        match definition {
            Definition::DirectiveDefinition(def) => self.visit_directive_definition(def),
            Definition::ObjectTypeDefinition(def) => self.visit_object(
                &def.name,
                &def.directives,
                &def.implements_interfaces,
                &def.fields,
                &def.description,
                false,
            ),
            Definition::ObjectTypeExtension(ext) => self.visit_object(
                &ext.name,
                &ext.directives,
                &ext.implements_interfaces,
                &ext.fields,
                &None,
                true,
            ),
            Definition::InterfaceTypeDefinition(def) => self.visit_interface(
                &def.name,
                &def.directives,
                &def.implements_interfaces,
                &def.fields,
                &def.description,
                false,
            ),
            Definition::InterfaceTypeExtension(ext) => self.visit_interface(
                &ext.name,
                &ext.directives,
                &ext.implements_interfaces,
                &ext.fields,
                &None,
                true,
            ),
            Definition::UnionTypeDefinition(def) => {
                self.visit_union(&def.name, &def.directives, &def.members, &def.description)
            }
            Definition::UnionTypeExtension(ext) => {
                self.visit_union(&ext.name, &ext.directives, &ext.members, &None)
            }
            Definition::EnumTypeDefinition(def) => {
                self.visit_enum(&def.name, &def.directives, &def.values, &def.description)
            }
            Definition::EnumTypeExtension(ext) => {
                self.visit_enum(&ext.name, &ext.directives, &ext.values, &None)
            }
            Definition::InputObjectTypeDefinition(def) => {
                self.visit_input_object(&def.name, &def.directives, &def.fields, &def.description)
            }
            Definition::InputObjectTypeExtension(ext) => {
                self.visit_input_object(&ext.name, &ext.directives, &ext.fields, &None)
            }
            Definition::ScalarTypeDefinition(def) => {
                self.visit_scalar(&def.name, &def.directives, &def.description)
            }
            Definition::ScalarTypeExtension(ext) => {
                self.visit_scalar(&ext.name, &ext.directives, &None)
            }
            _ => Ok(()),
        }
    }

    fn visit_directive_definition(
        &mut self,
        def: &Node<ast::DirectiveDefinition>,
    ) -> Result<(), FederationError> {
        if self.links.is_federation_directive_definition(&def.name) {
            self.links
                .validate_directive_definition(&self.subgraph.name, def, self.errors);
            return Ok(());
        }
        let composed = self.links.composed_directive(&def.name).is_some();
        let executable = !def.locations.is_empty()
            && def
                .locations
                .iter()
                .all(|location| EXECUTABLE_DIRECTIVE_LOCATIONS.contains(location));
        if !composed && !executable {
            return Ok(());
        }
        let locations = if composed {
            def.locations.clone()
        } else {
            def.locations
                .iter()
                .filter(|location| EXECUTABLE_DIRECTIVE_LOCATIONS.contains(location))
                .copied()
                .collect()
        };
        let args = def
            .arguments
            .iter()
            .map(|arg| (arg.name.clone(), self.argument(arg)))
            .collect();
        self.directives.insert(
            def.name.clone(),
            DirectiveDefinitionState {
                name: def.name.clone(),
                description: description(&def.description),
                args,
                repeatable: def.repeatable,
                locations,
                composed,
            },
        );
        Ok(())
    }

    fn argument(&self, def: &ast::InputValueDefinition) -> Argument {
        Argument {
            name: def.name.clone(),
            ty: self.rename_type(&def.ty),
            default_value: def.default_value.clone(),
            deprecated: None,
            metadata: Metadata {
                description: description(&def.description),
                ..Default::default()
            },
        }
    }

    /// Finds or creates the type `name` of the given kind.
    ///
    /// Returns `None` (after reporting it) when the name is already used by another kind.
    fn ensure_type(
        &mut self,
        name: &Name,
        kind: TypeKind,
        is_extension_block: bool,
    ) -> Option<()> {
        if let Some(existing) = self.types.get(name) {
            if existing.kind() != kind {
                self.errors.push(CompositionError::InvalidGraphQL {
                    message: format!(
                        "[{}] There can be only one type named \"{name}\": it is defined both as {} and {}",
                        self.subgraph.name,
                        existing.kind(),
                        kind,
                    ),
                });
                return None;
            }
        } else {
            let name = name.clone();
            let metadata = Metadata::default();
            let definition = match kind {
                TypeKind::Object => TypeDefinition::Object(ObjectType {
                    name: name.clone(),
                    fields: Default::default(),
                    keys: Vec::new(),
                    interfaces: Default::default(),
                    extension: false,
                    external: false,
                    interface_object: false,
                    metadata,
                }),
                TypeKind::Interface => TypeDefinition::Interface(InterfaceType {
                    name: name.clone(),
                    fields: Default::default(),
                    keys: Vec::new(),
                    interfaces: Default::default(),
                    extension: false,
                    metadata,
                }),
                TypeKind::InputObject => TypeDefinition::InputObject(InputObjectType {
                    name: name.clone(),
                    fields: Default::default(),
                    metadata,
                }),
                TypeKind::Union => TypeDefinition::Union(UnionType {
                    name: name.clone(),
                    members: Default::default(),
                    metadata,
                }),
                TypeKind::Enum => TypeDefinition::Enum(EnumType {
                    name: name.clone(),
                    values: Default::default(),
                    metadata,
                }),
                TypeKind::Scalar => TypeDefinition::Scalar(ScalarType {
                    name: name.clone(),
                    specified_by: None,
                    metadata,
                }),
            };
            self.types.insert(name, definition);
        }
        if is_extension_block {
            self.with_extension_block.insert(name.clone());
        } else {
            self.with_definition.insert(name.clone());
        }
        Some(())
    }

    fn set_description(&mut self, name: &Name, description_node: &Option<Node<str>>) {
        if let (Some(ty), Some(text)) = (self.types.get_mut(name), description(description_node)) {
            ty.metadata_mut().description.get_or_insert(text);
        }
    }

    fn visit_object(
        &mut self,
        original_name: &Name,
        directives: &DirectiveList,
        implements: &[Name],
        fields: &[Node<ast::FieldDefinition>],
        description_node: &Option<Node<str>>,
        is_extension_block: bool,
    ) -> Result<(), FederationError> {
        let name = self.rename(original_name);
        if self
            .ensure_type(&name, TypeKind::Object, is_extension_block)
            .is_none()
        {
            return Ok(());
        }
        self.set_description(&name, description_node);
        let keys_before = self.key_count(&name);
        let flags = self.apply_directives(Target::Type(&name), TypeKind::Object, directives)?;
        if is_extension_block && self.key_count(&name) > keys_before {
            self.keyed_in_extension_block.insert(name.clone());
        }
        if let Some(TypeDefinition::Object(object)) = self.types.get_mut(&name) {
            object.interfaces.extend(implements.iter().cloned());
            if flags.external {
                object.external = true;
            }
        }
        self.visit_fields(&name, TypeKind::Object, fields, flags, is_extension_block)
    }

    fn visit_interface(
        &mut self,
        name: &Name,
        directives: &DirectiveList,
        implements: &[Name],
        fields: &[Node<ast::FieldDefinition>],
        description_node: &Option<Node<str>>,
        is_extension_block: bool,
    ) -> Result<(), FederationError> {
        if self
            .ensure_type(name, TypeKind::Interface, is_extension_block)
            .is_none()
        {
            return Ok(());
        }
        self.set_description(name, description_node);
        let keys_before = self.key_count(name);
        let flags = self.apply_directives(Target::Type(name), TypeKind::Interface, directives)?;
        if is_extension_block && self.key_count(name) > keys_before {
            self.keyed_in_extension_block.insert(name.clone());
        }
        if let Some(TypeDefinition::Interface(interface)) = self.types.get_mut(name) {
            interface.interfaces.extend(implements.iter().cloned());
        }
        self.visit_fields(name, TypeKind::Interface, fields, flags, is_extension_block)
    }

    fn visit_fields(
        &mut self,
        type_name: &Name,
        kind: TypeKind,
        fields: &[Node<ast::FieldDefinition>],
        flags: BlockFlags,
        is_extension_block: bool,
    ) -> Result<(), FederationError> {
        let is_query_root = self.is_query_root(type_name);
        let implicitly_shareable = self.links.version.is_v1() && !is_extension_block;
        for field_def in fields {
            if is_query_root && ENTITY_ROOT_FIELDS.contains(&field_def.name.as_str()) {
                continue;
            }
            let mut field = Field::new(field_def.name.clone(), self.rename_type(&field_def.ty));
            field.metadata.description = description(&field_def.description);
            field.external = flags.external;
            field.shareable = flags.shareable || implicitly_shareable;
            field.args = field_def
                .arguments
                .iter()
                .map(|arg| (arg.name.clone(), self.argument(arg)))
                .collect();

            let Some(existing_fields) = self.types.get_mut(type_name).and_then(|ty| ty.fields_mut())
            else {
                bail!("type \"{type_name}\" disappeared while visiting its fields");
            };
            if existing_fields.contains_key(&field_def.name) {
                self.errors.push(CompositionError::InvalidGraphQL {
                    message: format!(
                        "[{}] Field \"{type_name}.{}\" can only be defined once.",
                        self.subgraph.name, field_def.name
                    ),
                });
                continue;
            }
            existing_fields.insert(field_def.name.clone(), field);

            for arg in &field_def.arguments {
                self.apply_directives(
                    Target::Argument(type_name, &field_def.name, &arg.name),
                    kind,
                    &arg.directives,
                )?;
            }
            self.apply_directives(
                Target::Field(type_name, &field_def.name),
                kind,
                &field_def.directives,
            )?;
        }
        Ok(())
    }

    fn visit_union(
        &mut self,
        name: &Name,
        directives: &DirectiveList,
        members: &[Name],
        description_node: &Option<Node<str>>,
    ) -> Result<(), FederationError> {
        if self.ensure_type(name, TypeKind::Union, false).is_none() {
            return Ok(());
        }
        self.set_description(name, description_node);
        self.apply_directives(Target::Type(name), TypeKind::Union, directives)?;
        let members = members.iter().map(|m| self.rename(m)).collect::<Vec<_>>();
        if let Some(TypeDefinition::Union(union)) = self.types.get_mut(name) {
            union.members.extend(members);
        }
        Ok(())
    }

    fn visit_enum(
        &mut self,
        name: &Name,
        directives: &DirectiveList,
        values: &[Node<ast::EnumValueDefinition>],
        description_node: &Option<Node<str>>,
    ) -> Result<(), FederationError> {
        if self.ensure_type(name, TypeKind::Enum, false).is_none() {
            return Ok(());
        }
        self.set_description(name, description_node);
        self.apply_directives(Target::Type(name), TypeKind::Enum, directives)?;
        for value_def in values {
            if let Some(TypeDefinition::Enum(enum_type)) = self.types.get_mut(name) {
                enum_type
                    .values
                    .entry(value_def.value.clone())
                    .or_insert_with(|| EnumValue {
                        name: value_def.value.clone(),
                        deprecated: None,
                        metadata: Metadata {
                            description: description(&value_def.description),
                            ..Default::default()
                        },
                    });
            }
            self.apply_directives(
                Target::EnumValue(name, &value_def.value),
                TypeKind::Enum,
                &value_def.directives,
            )?;
        }
        Ok(())
    }

    fn visit_input_object(
        &mut self,
        name: &Name,
        directives: &DirectiveList,
        fields: &[Node<ast::InputValueDefinition>],
        description_node: &Option<Node<str>>,
    ) -> Result<(), FederationError> {
        if self.ensure_type(name, TypeKind::InputObject, false).is_none() {
            return Ok(());
        }
        self.set_description(name, description_node);
        self.apply_directives(Target::Type(name), TypeKind::InputObject, directives)?;
        for field_def in fields {
            let field = self.argument(field_def);
            if let Some(TypeDefinition::InputObject(input)) = self.types.get_mut(name) {
                input.fields.entry(field_def.name.clone()).or_insert(field);
            }
            self.apply_directives(
                Target::InputField(name, &field_def.name),
                TypeKind::InputObject,
                &field_def.directives,
            )?;
        }
        Ok(())
    }

    fn visit_scalar(
        &mut self,
        name: &Name,
        directives: &DirectiveList,
        description_node: &Option<Node<str>>,
    ) -> Result<(), FederationError> {
        if self.ensure_type(name, TypeKind::Scalar, false).is_none() {
            return Ok(());
        }
        self.set_description(name, description_node);
        self.apply_directives(Target::Type(name), TypeKind::Scalar, directives)?;
        Ok(())
    }

    fn metadata_mut(&mut self, target: Target) -> Result<&mut Metadata, FederationError> {
        let type_name = match target {
            Target::Type(t)
            | Target::Field(t, _)
            | Target::Argument(t, _, _)
            | Target::InputField(t, _)
            | Target::EnumValue(t, _) => t,
        };
        let Some(ty) = self.types.get_mut(type_name) else {
            bail!("no type \"{type_name}\" to apply a directive to");
        };
        let metadata = match (target, ty) {
            (Target::Type(_), ty) => Some(ty.metadata_mut()),
            (Target::Field(_, f), ty) => ty
                .fields_mut()
                .and_then(|fields| fields.get_mut(f))
                .map(|field| &mut field.metadata),
            (Target::Argument(_, f, a), ty) => ty
                .fields_mut()
                .and_then(|fields| fields.get_mut(f))
                .and_then(|field| field.args.get_mut(a))
                .map(|arg| &mut arg.metadata),
            (Target::InputField(_, f), TypeDefinition::InputObject(input)) => {
                input.fields.get_mut(f).map(|field| &mut field.metadata)
            }
            (Target::EnumValue(_, v), TypeDefinition::Enum(enum_type)) => {
                enum_type.values.get_mut(v).map(|value| &mut value.metadata)
            }
            _ => None,
        };
        match metadata {
            Some(metadata) => Ok(metadata),
            None => bail!("directive target {target:?} does not exist"),
        }
    }

    fn field_mut(
        &mut self,
        type_name: &Name,
        field_name: &Name,
    ) -> Result<&mut Field, FederationError> {
        match self
            .types
            .get_mut(type_name)
            .and_then(|ty| ty.fields_mut())
            .and_then(|fields| fields.get_mut(field_name))
        {
            Some(field) => Ok(field),
            None => bail!("no field \"{type_name}.{field_name}\" to apply a directive to"),
        }
    }

    fn set_deprecation(
        &mut self,
        target: Target,
        deprecation: Deprecation,
    ) -> Result<(), FederationError> {
        let deprecated = match target {
            Target::Field(t, f) => &mut self.field_mut(t, f)?.deprecated,
            Target::Argument(t, f, a) => match self.field_mut(t, f)?.args.get_mut(a) {
                Some(arg) => &mut arg.deprecated,
                None => bail!("no argument \"{t}.{f}({a}:)\" to deprecate"),
            },
            Target::InputField(t, f) => match self.types.get_mut(t) {
                Some(TypeDefinition::InputObject(input)) => match input.fields.get_mut(f) {
                    Some(field) => &mut field.deprecated,
                    None => bail!("no input field \"{t}.{f}\" to deprecate"),
                },
                _ => bail!("no input object \"{t}\" to deprecate a field of"),
            },
            Target::EnumValue(t, v) => match self.types.get_mut(t) {
                Some(TypeDefinition::Enum(enum_type)) => match enum_type.values.get_mut(v) {
                    Some(value) => &mut value.deprecated,
                    None => bail!("no enum value \"{t}.{v}\" to deprecate"),
                },
                _ => bail!("no enum \"{t}\" to deprecate a value of"),
            },
            Target::Type(_) => return Ok(()),
        };
        *deprecated = Some(deprecation);
        Ok(())
    }

    fn misplaced(&mut self, directive: &str, location: DirectiveLocation) {
        self.errors.push(CompositionError::InvalidGraphQL {
            message: format!(
                "[{}] Directive \"@{directive}\" may not be used on {}.",
                self.subgraph.name,
                location.name()
            ),
        });
    }

    /// Interprets every directive application of one element.
    fn apply_directives(
        &mut self,
        target: Target,
        kind: TypeKind,
        directives: &DirectiveList,
    ) -> Result<BlockFlags, FederationError> {
        let mut flags = BlockFlags::default();
        for directive in directives.iter() {
            let name = directive.name.as_str();
            if let Some(federation_directive) = self.links.federation_directive(name) {
                let location = target.location(kind);
                if !federation_directive.locations().contains(&location) {
                    self.misplaced(name, location);
                    continue;
                }
                self.apply_federation_directive(
                    target,
                    federation_directive,
                    directive,
                    &mut flags,
                )?;
            } else if name == "deprecated" {
                let reason = string_argument(directive, "reason").map(|r| r.to_string());
                self.set_deprecation(target, Deprecation { reason })?;
            } else if name == "specifiedBy" {
                if let Target::Type(t) = target {
                    if let Some(TypeDefinition::Scalar(scalar)) = self.types.get_mut(t) {
                        scalar.specified_by =
                            string_argument(directive, "url").map(|u| u.to_string());
                    }
                }
            } else if self.links.composed_directive(name).is_some() {
                self.metadata_mut(target)?
                    .composed_directives
                    .push(directive.clone());
            } else if let Some(federation_directive) =
                self.links.unimported_federation_directive(name)
            {
                if !self.locally_defined_directives.contains(name) {
                    self.errors.push(CompositionError::InvalidGraphQL {
                        message: format!(
                            "[{}] Unknown directive \"@{name}\". If you meant the \"{federation_directive}\" federation 2 directive, note that this schema is a federation 2 schema but the directive has not been imported (it should be imported via @link(import: [\"{federation_directive}\"]) or used as \"@federation__{name}\")",
                            self.subgraph.name,
                        ),
                    });
                }
            }
        }
        Ok(flags)
    }

    fn apply_federation_directive(
        &mut self,
        target: Target,
        federation_directive: FederationDirective,
        directive: &Node<ast::Directive>,
        flags: &mut BlockFlags,
    ) -> Result<(), FederationError> {
        let subgraph_name = self.subgraph.name.clone();
        match (federation_directive, target) {
            (FederationDirective::Key, Target::Type(t)) => {
                let Some(arguments) = key_directive_arguments(directive) else {
                    self.errors.push(CompositionError::KeyInvalidFields {
                        message: format!(
                            "[{subgraph_name}] On type \"{t}\", the @key directive is missing its \"fields\" argument"
                        ),
                    });
                    return Ok(());
                };
                match FieldSet::parse(arguments.fields) {
                    Ok(field_set) => {
                        let key = Key {
                            field_set,
                            resolvable: arguments.resolvable,
                        };
                        match self.types.get_mut(t) {
                            Some(TypeDefinition::Object(object)) => object.keys.push(key),
                            Some(TypeDefinition::Interface(interface)) => interface.keys.push(key),
                            _ => bail!("@key target \"{t}\" is not an object or interface"),
                        }
                    }
                    Err(error) => self.errors.push(CompositionError::KeyInvalidFields {
                        message: format!(
                            "[{subgraph_name}] On type \"{t}\", for @key(fields: \"{}\"): {error}",
                            arguments.fields
                        ),
                    }),
                }
            }
            (FederationDirective::External, Target::Type(_)) => flags.external = true,
            (FederationDirective::External, Target::Field(t, f)) => {
                self.field_mut(t, f)?.external = true
            }
            (FederationDirective::Shareable, Target::Type(_)) => flags.shareable = true,
            (FederationDirective::Shareable, Target::Field(t, f)) => {
                self.field_mut(t, f)?.shareable = true
            }
            (FederationDirective::Extends, Target::Type(t)) => {
                self.with_extends.insert(t.clone());
            }
            (FederationDirective::Requires, Target::Field(t, f))
            | (FederationDirective::Provides, Target::Field(t, f)) => {
                let is_requires = federation_directive == FederationDirective::Requires;
                let fields = string_argument(directive, "fields").unwrap_or_default();
                match FieldSet::parse(fields) {
                    Ok(field_set) => {
                        let field = self.field_mut(t, f)?;
                        if is_requires {
                            field.requires = Some(field_set);
                        } else {
                            field.provides = Some(field_set);
                        }
                    }
                    Err(error) => {
                        let message = format!(
                            "[{subgraph_name}] On field \"{t}.{f}\", for {federation_directive}(fields: \"{fields}\"): {error}"
                        );
                        self.errors.push(if is_requires {
                            CompositionError::RequiresInvalidFields { message }
                        } else {
                            CompositionError::ProvidesInvalidFields { message }
                        });
                    }
                }
            }
            (FederationDirective::Override, Target::Field(t, f)) => {
                if let Some(arguments) = override_directive_arguments(directive) {
                    let from = arguments.from.to_string();
                    let label = arguments.label.map(|label| label.to_string());
                    let field = self.field_mut(t, f)?;
                    field.override_from = Some(from);
                    field.override_label = label;
                }
            }
            (FederationDirective::InterfaceObject, Target::Type(t)) => {
                if let Some(TypeDefinition::Object(object)) = self.types.get_mut(t) {
                    object.interface_object = true;
                }
            }
            (FederationDirective::Tag, _) => {
                if let Some(tag) = string_argument(directive, "name") {
                    let tag = tag.to_string();
                    self.metadata_mut(target)?.tags.insert(tag);
                }
            }
            (FederationDirective::Inaccessible, _) => {
                self.metadata_mut(target)?.inaccessible = true
            }
            (FederationDirective::Authenticated, _) => {
                self.metadata_mut(target)?.authenticated = true
            }
            (FederationDirective::RequiresScopes, _) => {
                let scopes = nested_string_list_argument(directive, "scopes");
                self.metadata_mut(target)?.requires_scopes.extend(scopes);
            }
            (FederationDirective::Policy, _) => {
                let policies = nested_string_list_argument(directive, "policies");
                self.metadata_mut(target)?.policies.extend(policies);
            }
            (directive, target) => {
                bail!("{directive} passed the location check but cannot be applied to {target:?}")
            }
        }
        Ok(())
    }

    fn key_count(&self, name: &Name) -> usize {
        self.types.get(name).map_or(0, |ty| ty.keys().len())
    }

    /// Types with `@extends`, or with a key declared on an `extend` block, whatever the federation
    /// version. Their key fields are resolvable here even when marked `@external`.
    fn extension_types(&self) -> HashSet<Name> {
        self.keyed_in_extension_block
            .union(&self.with_extends)
            .cloned()
            .collect()
    }

    fn finish(self, graph_id: Name) -> SubgraphState {
        let SubgraphStateBuilder {
            subgraph,
            links,
            root_types,
            mut types,
            directives,
            with_definition,
            with_extension_block,
            with_extends,
            ..
        } = self;
        let is_v1 = links.version.is_v1();
        for ty in types.values_mut() {
            let (name, extension) = match ty {
                TypeDefinition::Object(object) => (&object.name, &mut object.extension),
                TypeDefinition::Interface(interface) => (&interface.name, &mut interface.extension),
                _ => continue,
            };
            *extension = with_extends.contains(name)
                || (!is_v1
                    && with_extension_block.contains(name)
                    && !with_definition.contains(name));
        }
        SubgraphState {
            graph: Graph {
                id: graph_id,
                name: subgraph.name.clone(),
                url: subgraph.url.clone(),
                version: links.version,
            },
            root_types,
            types,
            directives,
            links,
        }
    }
}

fn description(node: &Option<Node<str>>) -> Option<String> {
    node.as_ref()
        .map(|description| description.trim().to_string())
        .filter(|description| !description.is_empty())
}
