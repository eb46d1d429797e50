use std::fmt;
use std::str;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use thiserror::Error;

use crate::error::CompositionError;
use crate::link::spec::Url;

pub mod federation_spec_definition;
pub mod registry;
pub mod spec;

pub const DEFAULT_LINK_NAME: Name = name!("link");

#[derive(Error, Debug, PartialEq)]
pub enum LinkError {
    #[error("Invalid use of @link in schema: {0}")]
    BootstrapError(String),
}

impl LinkError {
    pub(crate) fn into_composition_error(self, subgraph_name: &str) -> CompositionError {
        CompositionError::InvalidLinkDirectiveUsage {
            message: format!("[{subgraph_name}] {self}"),
        }
    }
}

fn parse_name(value: &str) -> Result<Name, LinkError> {
    Name::new(value)
        .map_err(|_| LinkError::BootstrapError(format!("'{value}' is not a valid GraphQL name")))
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Purpose {
    SECURITY,
    EXECUTION,
}

impl Purpose {
    pub fn from_value(value: &Value) -> Result<Purpose, LinkError> {
        if let Value::Enum(value) = value {
            value.parse::<Purpose>()
        } else {
            Err(LinkError::BootstrapError(
                "invalid `purpose` value, should be an enum".to_string(),
            ))
        }
    }
}

impl str::FromStr for Purpose {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SECURITY" => Ok(Purpose::SECURITY),
            "EXECUTION" => Ok(Purpose::EXECUTION),
            _ => Err(LinkError::BootstrapError(format!(
                "invalid/unrecognized `purpose` value '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Purpose::SECURITY => f.write_str("SECURITY"),
            Purpose::EXECUTION => f.write_str("EXECUTION"),
        }
    }
}

/// One entry of `@link(import:)`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Import {
    /// The imported element, never starting with '@'.
    pub element: Name,

    /// Whether the element is a directive (if not, it is a type).
    pub is_directive: bool,

    pub alias: Option<Name>,
}

impl Import {
    pub fn from_value(value: &Value) -> Result<Import, LinkError> {
        match value {
            Value::String(str) => match str.strip_prefix('@') {
                Some(directive_name) => Ok(Import {
                    element: parse_name(directive_name)?,
                    is_directive: true,
                    alias: None,
                }),
                None => Ok(Import {
                    element: parse_name(str)?,
                    is_directive: false,
                    alias: None,
                }),
            },
            Value::Object(fields) => {
                let mut name: Option<&str> = None;
                let mut alias: Option<&str> = None;
                for (k, v) in fields {
                    match k.as_str() {
                        "name" => {
                            name = Some(v.as_str().ok_or_else(|| {
                                LinkError::BootstrapError("invalid value for `name` field in @link(import:) argument: must be a string".to_string())
                            })?)
                        }
                        "as" => {
                            alias = Some(v.as_str().ok_or_else(|| {
                                LinkError::BootstrapError("invalid value for `as` field in @link(import:) argument: must be a string".to_string())
                            })?)
                        }
                        _ => {
                            return Err(LinkError::BootstrapError(format!(
                                "unknown field `{k}` in @link(import:) argument"
                            )));
                        }
                    }
                }
                let Some(element) = name else {
                    return Err(LinkError::BootstrapError(
                        "invalid entry in @link(import:) argument, missing mandatory `name` field"
                            .to_string(),
                    ));
                };
                match element.strip_prefix('@') {
                    Some(directive_name) => {
                        let alias = match alias {
                            Some(alias) => Some(alias.strip_prefix('@').ok_or_else(|| {
                                LinkError::BootstrapError(format!("invalid alias '{alias}' for import name '{element}': should start with '@' since the imported name does"))
                            })?),
                            None => None,
                        };
                        Ok(Import {
                            element: parse_name(directive_name)?,
                            is_directive: true,
                            alias: alias.map(parse_name).transpose()?,
                        })
                    }
                    None => {
                        if let Some(alias) = alias.filter(|alias| alias.starts_with('@')) {
                            return Err(LinkError::BootstrapError(format!(
                                "invalid alias '{alias}' for import name '{element}': should not start with '@' (or, if {element} is a directive, then the name should start with '@')"
                            )));
                        }
                        Ok(Import {
                            element: parse_name(element)?,
                            is_directive: false,
                            alias: alias.map(parse_name).transpose()?,
                        })
                    }
                }
            }
            _ => Err(LinkError::BootstrapError("invalid sub-value for @link(import:) argument: values should be either strings or input object values of the form { name: \"<importedElement>\", as: \"<alias>\" }.".to_string())),
        }
    }

    pub fn imported_name(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.element)
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = if self.is_directive { "@" } else { "" };
        match &self.alias {
            Some(alias) => write!(f, r#"{{ name: "{at}{}", as: "{at}{alias}" }}"#, self.element),
            None => write!(f, r#""{at}{}""#, self.element),
        }
    }
}

/// A parsed `@link` application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Link {
    pub url: Url,
    pub spec_alias: Option<Name>,
    pub imports: Vec<Import>,
    pub purpose: Option<Purpose>,
}

impl Link {
    pub fn spec_name_in_schema(&self) -> &str {
        self.spec_alias
            .as_ref()
            .map(|alias| alias.as_str())
            .unwrap_or(&self.url.identity.name)
    }

    /// The name under which the directive `name` of this specification appears in the schema.
    ///
    /// Imported directives use their import name, a directive named like its specification uses
    /// the specification name, and anything else is namespaced as `spec__name`.
    pub fn directive_name_in_schema(&self, name: &str) -> String {
        if let Some(import) = self
            .imports
            .iter()
            .find(|i| i.is_directive && i.element.as_str() == name)
        {
            import.imported_name().to_string()
        } else if name == self.url.identity.name {
            self.spec_name_in_schema().to_string()
        } else {
            format!("{}__{}", self.spec_name_in_schema(), name)
        }
    }

    /// Finds which directive of this specification, if any, `name_in_schema` refers to.
    pub fn directive_for_name_in_schema(&self, name_in_schema: &str) -> Option<String> {
        if let Some(import) = self
            .imports
            .iter()
            .find(|i| i.is_directive && i.imported_name().as_str() == name_in_schema)
        {
            return Some(import.element.to_string());
        }
        if name_in_schema == self.spec_name_in_schema() {
            return Some(self.url.identity.name.clone());
        }
        name_in_schema
            .strip_prefix(self.spec_name_in_schema())
            .and_then(|rest| rest.strip_prefix("__"))
            .map(|name| name.to_string())
    }

    pub fn from_directive_application(directive: &Node<Directive>) -> Result<Link, LinkError> {
        let url = directive
            .specified_argument_by_name("url")
            .ok_or_else(|| {
                LinkError::BootstrapError("the `url` argument for @link is mandatory".to_string())
            })?
            .as_str()
            .ok_or_else(|| {
                LinkError::BootstrapError(
                    "the `url` argument for @link must be a String".to_string(),
                )
            })?;
        let url: Url = url.parse::<Url>().map_err(|e| {
            LinkError::BootstrapError(format!("invalid `url` argument (reason: {e})"))
        })?;

        let spec_alias = directive
            .specified_argument_by_name("as")
            .and_then(|arg| arg.as_str())
            .map(parse_name)
            .transpose()?;
        let purpose = directive
            .specified_argument_by_name("for")
            .map(|value| Purpose::from_value(value))
            .transpose()?;

        let imports = directive
            .specified_argument_by_name("import")
            .and_then(|arg| arg.as_list())
            .unwrap_or(&[])
            .iter()
            .map(|value| Import::from_value(value))
            .collect::<Result<Vec<Import>, LinkError>>()?;

        Ok(Link {
            url,
            spec_alias,
            imports,
            purpose,
        })
    }

    /// Builds the `@link` application re-exporting this link's imports in the supergraph.
    pub fn to_directive(&self) -> Directive {
        let mut arguments = vec![Node::new(apollo_compiler::ast::Argument {
            name: name!("url"),
            value: Node::new(Value::String(self.url.to_string())),
        })];
        if let Some(alias) = &self.spec_alias {
            arguments.push(Node::new(apollo_compiler::ast::Argument {
                name: name!("as"),
                value: Node::new(Value::String(alias.to_string())),
            }));
        }
        if !self.imports.is_empty() {
            let imports = self
                .imports
                .iter()
                .map(|import| {
                    let at = if import.is_directive { "@" } else { "" };
                    let element = format!("{at}{}", import.element);
                    Node::new(match &import.alias {
                        Some(alias) => Value::Object(vec![
                            (name!("name"), Node::new(Value::String(element))),
                            (name!("as"), Node::new(Value::String(format!("{at}{alias}")))),
                        ]),
                        None => Value::String(element),
                    })
                })
                .collect();
            arguments.push(Node::new(apollo_compiler::ast::Argument {
                name: name!("import"),
                value: Node::new(Value::List(imports)),
            }));
        }
        if let Some(purpose) = self.purpose {
            arguments.push(Node::new(apollo_compiler::ast::Argument {
                name: name!("for"),
                value: Node::new(Value::Enum(match purpose {
                    Purpose::SECURITY => name!("SECURITY"),
                    Purpose::EXECUTION => name!("EXECUTION"),
                })),
            }));
        }
        Directive {
            name: DEFAULT_LINK_NAME,
            arguments,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let imports = if self.imports.is_empty() {
            String::new()
        } else {
            let imports = self
                .imports
                .iter()
                .map(|import| import.to_string())
                .collect::<Vec<_>>();
            format!(r#", import: [{}]"#, imports.join(", "))
        };
        let alias = self
            .spec_alias
            .as_ref()
            .map(|a| format!(r#", as: "{a}""#))
            .unwrap_or_default();
        let purpose = self
            .purpose
            .map(|p| format!(r#", for: {p}"#))
            .unwrap_or_default();
        write!(f, r#"@link(url: "{}"{alias}{imports}{purpose})"#, self.url)
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ast::Definition;
    use apollo_compiler::ast::Document;

    use super::*;

    fn first_link(sdl: &str) -> Result<Link, LinkError> {
        let document = Document::parse(sdl, "schema.graphql").unwrap();
        let directive = document
            .definitions
            .iter()
            .find_map(|definition| match definition {
                Definition::SchemaExtension(extension) => {
                    extension.directives.get("link").cloned()
                }
                _ => None,
            })
            .unwrap();
        Link::from_directive_application(&directive)
    }

    #[test]
    fn parses_imports_and_aliases() {
        let link = first_link(
            r#"extend schema @link(url: "https://specs.apollo.dev/federation/v2.3", import: ["@key", { name: "@shareable", as: "@share" }, "FieldSet"])"#,
        )
        .unwrap();
        assert_eq!(link.imports.len(), 3);
        assert_eq!(link.directive_name_in_schema("key"), "key");
        assert_eq!(link.directive_name_in_schema("shareable"), "share");
        assert_eq!(link.directive_name_in_schema("external"), "federation__external");
        assert_eq!(
            link.directive_for_name_in_schema("share").as_deref(),
            Some("shareable")
        );
        assert_eq!(
            link.directive_for_name_in_schema("federation__requires")
                .as_deref(),
            Some("requires")
        );
        assert!(!link.imports[2].is_directive);
    }

    #[test]
    fn spec_alias_renames_namespace() {
        let link = first_link(
            r#"extend schema @link(url: "https://specs.apollo.dev/federation/v2.0", as: "fed")"#,
        )
        .unwrap();
        assert_eq!(link.directive_name_in_schema("key"), "fed__key");
        assert_eq!(
            link.to_string(),
            r#"@link(url: "https://specs.apollo.dev/federation/v2.0", as: "fed")"#
        );
    }

    #[test]
    fn rejects_mismatched_directive_alias() {
        let error = first_link(
            r#"extend schema @link(url: "https://specs.apollo.dev/federation/v2.0", import: [{ name: "@key", as: "id" }])"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("should start with '@'"));
    }

    #[test]
    fn url_is_mandatory() {
        let error = first_link(r#"extend schema @link(as: "x")"#).unwrap_err();
        assert_eq!(
            error,
            LinkError::BootstrapError("the `url` argument for @link is mandatory".to_string())
        );
    }
}
