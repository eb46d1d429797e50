use std::fmt;

use apollo_compiler::Node;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::DirectiveLocation;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use strum_macros::IntoStaticStr;

use crate::link::spec::Version;

/// The last federation 2 minor version this crate knows about.
pub const LATEST_FEDERATION_MINOR: u32 = 9;

/// Which generation of the federation specification a subgraph is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederationVersion {
    /// Subgraphs without a federation `@link`.
    V1,
    /// Subgraphs linking `https://specs.apollo.dev/federation/v2.<minor>`.
    V2 { minor: u32 },
}

impl FederationVersion {
    pub fn latest() -> Self {
        Self::V2 {
            minor: LATEST_FEDERATION_MINOR,
        }
    }

    pub fn from_link_version(version: &Version) -> Option<Self> {
        (version.major == 2 && version.minor <= LATEST_FEDERATION_MINOR)
            .then_some(Self::V2 {
                minor: version.minor,
            })
    }

    pub fn is_v1(&self) -> bool {
        matches!(self, Self::V1)
    }
}

impl fmt::Display for FederationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("1.0"),
            Self::V2 { minor } => write!(f, "2.{minor}"),
        }
    }
}

/// Every federation directive the composition understands, by its name in the specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum FederationDirective {
    Key,
    External,
    Requires,
    Provides,
    Extends,
    Shareable,
    Override,
    Tag,
    Inaccessible,
    InterfaceObject,
    ComposeDirective,
    Authenticated,
    RequiresScopes,
    Policy,
}

const ALL_AUTH_LOCATIONS: &[DirectiveLocation] = &[
    DirectiveLocation::FieldDefinition,
    DirectiveLocation::Object,
    DirectiveLocation::Interface,
    DirectiveLocation::Scalar,
    DirectiveLocation::Enum,
];

const TAG_LOCATIONS: &[DirectiveLocation] = &[
    DirectiveLocation::FieldDefinition,
    DirectiveLocation::Object,
    DirectiveLocation::Interface,
    DirectiveLocation::Union,
    DirectiveLocation::ArgumentDefinition,
    DirectiveLocation::Scalar,
    DirectiveLocation::Enum,
    DirectiveLocation::EnumValue,
    DirectiveLocation::InputObject,
    DirectiveLocation::InputFieldDefinition,
    DirectiveLocation::Schema,
];

impl FederationDirective {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Whether the directive exists in the given federation generation.
    pub fn is_available_in(&self, version: FederationVersion) -> bool {
        match version {
            FederationVersion::V1 => matches!(
                self,
                Self::Key
                    | Self::External
                    | Self::Requires
                    | Self::Provides
                    | Self::Extends
                    | Self::Tag
                    | Self::Inaccessible
            ),
            FederationVersion::V2 { minor } => minor >= self.minimum_minor_version(),
        }
    }

    fn minimum_minor_version(&self) -> u32 {
        match self {
            Self::ComposeDirective => 1,
            Self::InterfaceObject => 3,
            Self::Authenticated | Self::RequiresScopes => 5,
            Self::Policy => 6,
            _ => 0,
        }
    }

    pub fn available_in(version: FederationVersion) -> impl Iterator<Item = FederationDirective> {
        Self::iter().filter(move |directive| directive.is_available_in(version))
    }

    pub fn from_name(name: &str) -> Option<FederationDirective> {
        Self::iter().find(|directive| directive.name() == name)
    }

    /// The canonical locations, used to check local redefinitions.
    pub fn locations(&self) -> &'static [DirectiveLocation] {
        match self {
            Self::Key | Self::Extends => &[DirectiveLocation::Object, DirectiveLocation::Interface],
            Self::External | Self::Shareable => {
                &[DirectiveLocation::Object, DirectiveLocation::FieldDefinition]
            }
            Self::Requires | Self::Provides | Self::Override => {
                &[DirectiveLocation::FieldDefinition]
            }
            Self::Tag => TAG_LOCATIONS,
            Self::Inaccessible => &TAG_LOCATIONS[..TAG_LOCATIONS.len() - 1],
            Self::InterfaceObject => &[DirectiveLocation::Object],
            Self::ComposeDirective => &[DirectiveLocation::Schema],
            Self::Authenticated | Self::RequiresScopes | Self::Policy => ALL_AUTH_LOCATIONS,
        }
    }

    /// The canonical argument names, used to check local redefinitions.
    pub fn argument_names(&self) -> &'static [&'static str] {
        match self {
            Self::Key => &["fields", "resolvable"],
            Self::External => &["reason"],
            Self::Requires | Self::Provides => &["fields"],
            Self::Override => &["from", "label"],
            Self::Tag | Self::ComposeDirective => &["name"],
            Self::RequiresScopes => &["scopes"],
            Self::Policy => &["policies"],
            Self::Extends
            | Self::Shareable
            | Self::Inaccessible
            | Self::InterfaceObject
            | Self::Authenticated => &[],
        }
    }
}

impl fmt::Display for FederationDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name())
    }
}

pub(crate) struct KeyDirectiveArguments<'doc> {
    pub(crate) fields: &'doc str,
    pub(crate) resolvable: bool,
}

pub(crate) struct OverrideDirectiveArguments<'doc> {
    pub(crate) from: &'doc str,
    pub(crate) label: Option<&'doc str>,
}

pub(crate) fn string_argument<'doc>(
    directive: &'doc Node<Directive>,
    name: &str,
) -> Option<&'doc str> {
    directive
        .specified_argument_by_name(name)
        .and_then(|value| value.as_str())
}

pub(crate) fn key_directive_arguments(
    directive: &Node<Directive>,
) -> Option<KeyDirectiveArguments<'_>> {
    Some(KeyDirectiveArguments {
        fields: string_argument(directive, "fields")?,
        resolvable: directive
            .specified_argument_by_name("resolvable")
            .and_then(|value| value.to_bool())
            .unwrap_or(true),
    })
}

pub(crate) fn override_directive_arguments(
    directive: &Node<Directive>,
) -> Option<OverrideDirectiveArguments<'_>> {
    Some(OverrideDirectiveArguments {
        from: string_argument(directive, "from")?,
        label: string_argument(directive, "label"),
    })
}

/// Reads a `[[String!]!]!` argument such as `@requiresScopes(scopes:)`.
pub(crate) fn nested_string_list_argument(
    directive: &Node<Directive>,
    name: &str,
) -> Vec<Vec<String>> {
    directive
        .specified_argument_by_name(name)
        .and_then(|value| value.as_list())
        .unwrap_or(&[])
        .iter()
        .map(|inner| match inner.as_list() {
            Some(values) => values
                .iter()
                .filter_map(|value| value.as_str().map(|value| value.to_string()))
                .collect(),
            None => inner
                .as_str()
                .map(|value| vec![value.to_string()])
                .unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_names_are_camel_case() {
        assert_eq!(FederationDirective::RequiresScopes.name(), "requiresScopes");
        assert_eq!(
            FederationDirective::from_name("interfaceObject"),
            Some(FederationDirective::InterfaceObject)
        );
        assert_eq!(FederationDirective::from_name("join__field"), None);
        assert_eq!(FederationDirective::ComposeDirective.to_string(), "@composeDirective");
    }

    #[test]
    fn availability_follows_versions() {
        let v1 = FederationDirective::available_in(FederationVersion::V1).collect::<Vec<_>>();
        assert!(v1.contains(&FederationDirective::Key));
        assert!(!v1.contains(&FederationDirective::Shareable));

        let v2_3 = FederationVersion::V2 { minor: 3 };
        assert!(FederationDirective::InterfaceObject.is_available_in(v2_3));
        assert!(!FederationDirective::Policy.is_available_in(v2_3));
        assert!(FederationDirective::Policy.is_available_in(FederationVersion::latest()));
    }

    #[test]
    fn only_known_federation_versions_are_accepted() {
        assert_eq!(
            FederationVersion::from_link_version(&Version { major: 2, minor: 5 }),
            Some(FederationVersion::V2 { minor: 5 })
        );
        assert_eq!(
            FederationVersion::from_link_version(&Version { major: 3, minor: 0 }),
            None
        );
        assert_eq!(
            FederationVersion::from_link_version(&Version {
                major: 2,
                minor: LATEST_FEDERATION_MINOR + 1
            }),
            None
        );
    }
}
