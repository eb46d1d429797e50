//! Per-subgraph resolution of linked specifications.
//!
//! A subgraph references federation directives under names that depend on how it `@link`s the
//! federation specification: imported, aliased, namespaced, or (for legacy subgraphs) fixed.
//! [`LinkedSpecs`] resolves all of this once so that the state builder can look up what a
//! directive application means by its local name.
use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::DirectiveDefinition;
use apollo_compiler::ast::Document;
use apollo_compiler::collections::IndexMap;
use itertools::Itertools;
use tracing::trace;

use crate::error::CompositionError;
use crate::link::DEFAULT_LINK_NAME;
use crate::link::Link;
use crate::link::federation_spec_definition::FederationDirective;
use crate::link::federation_spec_definition::FederationVersion;
use crate::link::federation_spec_definition::string_argument;
use crate::link::spec::Identity;

/// Types defined by the federation specifications themselves, never merged.
const FEDERATION_INTERNAL_TYPES: [&str; 5] = ["_Any", "_Entity", "_Service", "FieldSet", "_FieldSet"];

/// Type names a federation 2 link may import.
const FEDERATION_IMPORTABLE_TYPES: [&str; 3] = ["FieldSet", "Scope", "Policy"];

/// A directive a subgraph asked to be kept in the supergraph through `@composeDirective`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDirective {
    /// The name the directive has in the subgraph.
    pub name_in_schema: Name,
    /// The name of the directive in its own specification.
    pub element: Name,
    /// The non-federation link the directive comes from.
    pub link: Link,
}

#[derive(Debug, Clone)]
pub struct LinkedSpecs {
    pub version: FederationVersion,
    pub links: Vec<Link>,
    federation_directives: HashMap<String, FederationDirective>,
    composed_directives: IndexMap<Name, ComposedDirective>,
}

impl LinkedSpecs {
    /// Reads every `@link` of the schema definition and extensions of `document`.
    ///
    /// Invalid links are reported and otherwise ignored, so that a single attempt reports as many
    /// problems as possible.
    pub fn from_document(
        subgraph_name: &str,
        document: &Document,
        errors: &mut Vec<CompositionError>,
    ) -> LinkedSpecs {
        let mut links = Vec::new();
        for directive in schema_directives(document).filter(|d| d.name == DEFAULT_LINK_NAME) {
            match Link::from_directive_application(directive) {
                Ok(link) => links.push(link),
                Err(error) => errors.push(error.into_composition_error(subgraph_name)),
            }
        }

        let federation_links = links
            .iter()
            .filter(|link| link.url.identity == Identity::federation_identity())
            .collect::<Vec<_>>();
        if federation_links.len() > 1 {
            errors.push(CompositionError::InvalidLinkDirectiveUsage {
                message: format!(
                    "[{subgraph_name}] Invalid use of @link in schema: the federation specification should be @link-ed at most once"
                ),
            });
        }

        let mut version = FederationVersion::V1;
        let mut federation_directives = HashMap::new();
        match federation_links.first() {
            Some(federation_link) => {
                match FederationVersion::from_link_version(&federation_link.url.version) {
                    Some(v) => version = v,
                    None => errors.push(CompositionError::UnknownFederationLinkVersion {
                        message: format!(
                            "[{subgraph_name}] Invalid version {} for the federation feature in @link directive on schema",
                            federation_link.url.version
                        ),
                    }),
                }
                for import in &federation_link.imports {
                    let known = if import.is_directive {
                        FederationDirective::from_name(&import.element)
                            .is_some_and(|directive| directive.is_available_in(version))
                    } else {
                        FEDERATION_IMPORTABLE_TYPES.contains(&import.element.as_str())
                    };
                    if !known {
                        let at = if import.is_directive { "@" } else { "" };
                        errors.push(CompositionError::InvalidLinkDirectiveUsage {
                            message: format!(
                                "[{subgraph_name}] Cannot import unknown element \"{at}{}\".",
                                import.element
                            ),
                        });
                    }
                }
                for directive in FederationDirective::available_in(version) {
                    federation_directives.insert(
                        federation_link.directive_name_in_schema(directive.name()),
                        directive,
                    );
                }
            }
            None => {
                for directive in FederationDirective::available_in(version) {
                    federation_directives.insert(directive.name().to_string(), directive);
                }
            }
        }

        // Standalone links to specifications that federation also re-exports.
        for link in links.iter().filter(|link| link.url.identity.is_apollo()) {
            let Some(directive) = FederationDirective::from_name(&link.url.identity.name) else {
                continue;
            };
            if matches!(
                directive,
                FederationDirective::Tag
                    | FederationDirective::Inaccessible
                    | FederationDirective::Authenticated
                    | FederationDirective::RequiresScopes
                    | FederationDirective::Policy
            ) {
                federation_directives
                    .entry(link.directive_name_in_schema(&link.url.identity.name))
                    .or_insert(directive);
            }
        }

        let mut specs = LinkedSpecs {
            version,
            links,
            federation_directives,
            composed_directives: Default::default(),
        };
        specs.collect_composed_directives(subgraph_name, document, errors);
        trace!(
            subgraph = subgraph_name,
            version = %specs.version,
            links = specs.links.len(),
            "resolved linked specifications"
        );
        specs
    }

    fn collect_composed_directives(
        &mut self,
        subgraph_name: &str,
        document: &Document,
        errors: &mut Vec<CompositionError>,
    ) {
        let compose_applications = schema_directives(document)
            .filter(|d| {
                self.federation_directive(&d.name) == Some(FederationDirective::ComposeDirective)
            })
            .collect::<Vec<_>>();
        for application in compose_applications {
            let Some(raw_name) = string_argument(application, "name") else {
                continue;
            };
            let Some(name_in_schema) = raw_name
                .strip_prefix('@')
                .and_then(|name| Name::new(name).ok())
            else {
                errors.push(CompositionError::DirectiveCompositionError {
                    message: format!(
                        "[{subgraph_name}] Argument to @composeDirective \"{raw_name}\" in subgraph \"{subgraph_name}\" must have a leading \"@\"."
                    ),
                });
                continue;
            };

            if self.federation_directive(&name_in_schema).is_some()
                || self.is_link_spec_directive(&name_in_schema)
            {
                errors.push(CompositionError::DirectiveCompositionError {
                    message: format!(
                        "[{subgraph_name}] Composing federation directive \"{raw_name}\" in subgraph \"{subgraph_name}\" is not supported"
                    ),
                });
                continue;
            }

            let feature = self.links.iter().find_map(|link| {
                let identity = &link.url.identity;
                if *identity == Identity::federation_identity()
                    || *identity == Identity::link_identity()
                {
                    return None;
                }
                let element = link.directive_for_name_in_schema(&name_in_schema)?;
                Some((link.clone(), element))
            });
            let Some((link, element)) = feature else {
                errors.push(CompositionError::DirectiveCompositionError {
                    message: format!(
                        "[{subgraph_name}] Directive \"{raw_name}\" in subgraph \"{subgraph_name}\" cannot be composed because it is not a member of a core feature"
                    ),
                });
                continue;
            };

            let has_definition = document.definitions.iter().any(|definition| {
                matches!(
                    definition,
                    Definition::DirectiveDefinition(def) if def.name == name_in_schema
                )
            });
            if !has_definition {
                errors.push(CompositionError::DirectiveCompositionError {
                    message: format!(
                        "[{subgraph_name}] Could not find matching directive definition for argument to @composeDirective \"{raw_name}\" in subgraph \"{subgraph_name}\"."
                    ),
                });
                continue;
            }

            let Ok(element) = Name::new(&element) else {
                continue;
            };
            self.composed_directives.insert(
                name_in_schema.clone(),
                ComposedDirective {
                    name_in_schema,
                    element,
                    link,
                },
            );
        }
    }

    /// The federation directive that `name` refers to in this subgraph.
    pub fn federation_directive(&self, name: &str) -> Option<FederationDirective> {
        self.federation_directives.get(name).copied()
    }

    /// Whether `name` is a federation directive used by its bare name without being imported.
    pub fn unimported_federation_directive(&self, name: &str) -> Option<FederationDirective> {
        if self.version.is_v1() || self.federation_directives.contains_key(name) {
            return None;
        }
        FederationDirective::from_name(name)
    }

    pub fn composed_directive(&self, name: &str) -> Option<&ComposedDirective> {
        self.composed_directives.get(name)
    }

    pub fn composed_directives(&self) -> impl Iterator<Item = &ComposedDirective> {
        self.composed_directives.values()
    }

    fn is_link_spec_directive(&self, name: &str) -> bool {
        name == DEFAULT_LINK_NAME.as_str() || name.starts_with("link__")
    }

    /// Whether a directive definition belongs to federation or link machinery.
    pub fn is_federation_directive_definition(&self, name: &str) -> bool {
        self.federation_directive(name).is_some()
            || self.is_link_spec_directive(name)
            || name.starts_with("federation__")
    }

    /// Whether a type is part of the federation or link machinery rather than user schema.
    pub fn is_federation_type(&self, name: &str) -> bool {
        if FEDERATION_INTERNAL_TYPES.contains(&name)
            || name.starts_with("link__")
            || name.starts_with("federation__")
        {
            return true;
        }
        self.links.iter().any(|link| {
            link.url.identity.is_apollo()
                && (link
                    .imports
                    .iter()
                    .any(|import| !import.is_directive && import.imported_name().as_str() == name)
                    || name
                        .strip_prefix(link.spec_name_in_schema())
                        .is_some_and(|rest| rest.starts_with("__")))
        })
    }

    /// Checks that locally redeclared federation directives are compatible with their canonical
    /// definitions: a subset of the canonical locations and only canonical arguments.
    pub fn validate_directive_definition(
        &self,
        subgraph_name: &str,
        definition: &DirectiveDefinition,
        errors: &mut Vec<CompositionError>,
    ) {
        let Some(directive) = self.federation_directive(&definition.name) else {
            return;
        };
        let canonical_locations = directive.locations();
        let unexpected_locations = definition
            .locations
            .iter()
            .filter(|location| !canonical_locations.contains(location))
            .collect::<Vec<_>>();
        if !unexpected_locations.is_empty() {
            errors.push(CompositionError::DirectiveDefinitionInvalid {
                message: format!(
                    "[{subgraph_name}] Invalid definition for directive \"@{}\": \"@{}\" should have locations {}, but found (non-subset) {}",
                    definition.name,
                    definition.name,
                    canonical_locations.iter().map(|l| l.name()).join(", "),
                    definition.locations.iter().map(|l| l.name()).join(", "),
                ),
            });
        }
        for argument in &definition.arguments {
            if !directive.argument_names().contains(&argument.name.as_str()) {
                errors.push(CompositionError::DirectiveDefinitionInvalid {
                    message: format!(
                        "[{subgraph_name}] Invalid definition for directive \"@{}\": unknown/unsupported argument \"{}\"",
                        definition.name, argument.name,
                    ),
                });
            }
        }
    }
}

/// Directive applications on the schema definition and all schema extensions.
pub(crate) fn schema_directives(document: &Document) -> impl Iterator<Item = &Node<Directive>> {
    document
        .definitions
        .iter()
        .flat_map(|definition| match definition {
            Definition::SchemaDefinition(schema) => schema.directives.iter(),
            Definition::SchemaExtension(schema) => schema.directives.iter(),
            _ => Default::default(),
        })
}
