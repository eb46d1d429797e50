//! Identities, versions and urls of `@link`ed specifications.
use std::fmt;
use std::str;

use thiserror::Error;

pub const APOLLO_SPEC_DOMAIN: &str = "https://specs.apollo.dev";

#[derive(Error, Debug, PartialEq)]
pub enum SpecError {
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// The identity of a linked specification, independent of its version.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Identity {
    /// For instance, `"https://specs.apollo.dev"`.
    pub domain: String,

    /// For instance, `"federation"`.
    pub name: String,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.name)
    }
}

impl Identity {
    fn apollo(name: &str) -> Identity {
        Identity {
            domain: APOLLO_SPEC_DOMAIN.to_string(),
            name: name.to_string(),
        }
    }

    pub fn link_identity() -> Identity {
        Self::apollo("link")
    }

    pub fn federation_identity() -> Identity {
        Self::apollo("federation")
    }

    pub fn join_identity() -> Identity {
        Self::apollo("join")
    }

    pub fn tag_identity() -> Identity {
        Self::apollo("tag")
    }

    pub fn inaccessible_identity() -> Identity {
        Self::apollo("inaccessible")
    }

    pub fn authenticated_identity() -> Identity {
        Self::apollo("authenticated")
    }

    pub fn requires_scopes_identity() -> Identity {
        Self::apollo("requiresScopes")
    }

    pub fn policy_identity() -> Identity {
        Self::apollo("policy")
    }

    /// Whether this specification is published under the Apollo domain.
    pub fn is_apollo(&self) -> bool {
        self.domain == APOLLO_SPEC_DOMAIN
    }
}

/// A `major.minor` specification version.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl str::FromStr for Version {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').ok_or(SpecError::ParseError(
            "version number is missing a dot (.)".to_string(),
        ))?;

        let major = major.parse::<u32>().map_err(|_| {
            SpecError::ParseError(format!("invalid major version number '{major}'"))
        })?;
        let minor = minor.parse::<u32>().map_err(|_| {
            SpecError::ParseError(format!("invalid minor version number '{minor}'"))
        })?;

        Ok(Version { major, minor })
    }
}

impl Version {
    /// Whether this version can be used where `required` is expected.
    ///
    /// Pre-1.0 versions are only compatible with themselves.
    pub fn satisfies(&self, required: &Version) -> bool {
        if self.major == 0 {
            self == required
        } else {
            self.major == required.major && self.minor >= required.minor
        }
    }
}

/// A versioned specification url, e.g. `https://specs.apollo.dev/federation/v2.3`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Url {
    pub identity: Identity,
    pub version: Version,
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/v{}", self.identity, self.version)
    }
}

impl str::FromStr for Url {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s)
            .map_err(|e| SpecError::ParseError(format!("invalid specification url: {e}")))?;
        let mut segments = url.path_segments().ok_or(SpecError::ParseError(
            "invalid `@link` specification url".to_string(),
        ))?;
        let version = segments.next_back().ok_or(SpecError::ParseError(
            "invalid `@link` specification url: missing specification version".to_string(),
        ))?;
        let Some(version) = version.strip_prefix('v') else {
            return Err(SpecError::ParseError(
                "invalid `@link` specification url: the last element of the path should be the version starting with a 'v'".to_string(),
            ));
        };
        let version = version.parse::<Version>()?;
        let name = segments
            .next_back()
            .filter(|name| !name.is_empty())
            .ok_or(SpecError::ParseError(
                "invalid `@link` specification url: missing specification name".to_string(),
            ))?
            .to_string();
        let scheme = url.scheme();
        if !scheme.starts_with("http") {
            return Err(SpecError::ParseError(
                "invalid `@link` specification url: only http(s) urls are supported currently"
                    .to_string(),
            ));
        }
        let host = url.host_str().ok_or(SpecError::ParseError(
            "invalid `@link` specification url".to_string(),
        ))?;
        let path_remainder = segments.collect::<Vec<&str>>();
        let domain = if path_remainder.is_empty() {
            format!("{scheme}://{host}")
        } else {
            format!("{scheme}://{host}/{}", path_remainder.join("/"))
        };
        Ok(Url {
            identity: Identity { domain, name },
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_federation_url() {
        let url = "https://specs.apollo.dev/federation/v2.3"
            .parse::<Url>()
            .unwrap();
        assert_eq!(url.identity, Identity::federation_identity());
        assert_eq!(url.version, Version { major: 2, minor: 3 });
        assert_eq!(url.to_string(), "https://specs.apollo.dev/federation/v2.3");
    }

    #[test]
    fn keeps_nested_paths_in_domain() {
        let url = "http://example.com/specs/custom/myDirectives/v0.1"
            .parse::<Url>()
            .unwrap();
        assert_eq!(url.identity.domain, "http://example.com/specs/custom");
        assert_eq!(url.identity.name, "myDirectives");
        assert!(!url.identity.is_apollo());
    }

    #[test]
    fn rejects_urls_without_version() {
        assert!(
            "https://specs.apollo.dev/federation"
                .parse::<Url>()
                .is_err()
        );
        assert_eq!(
            "2".parse::<Version>(),
            Err(SpecError::ParseError(
                "version number is missing a dot (.)".to_string()
            ))
        );
    }

    #[test]
    fn version_compatibility() {
        let v2_3 = Version { major: 2, minor: 3 };
        assert!(v2_3.satisfies(&Version { major: 2, minor: 0 }));
        assert!(!v2_3.satisfies(&Version { major: 2, minor: 5 }));
        assert!(!Version { major: 0, minor: 2 }.satisfies(&Version { major: 0, minor: 1 }));
    }
}
