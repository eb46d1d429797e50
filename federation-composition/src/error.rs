use std::fmt::Display;
use std::fmt::Formatter;

use itertools::Itertools;
use strum_macros::Display;
use strum_macros::IntoStaticStr;
use thiserror::Error;

/// Create an internal error.
///
/// # Example
/// ```rust
/// use federation_composition::internal_error;
/// use federation_composition::error::FederationError;
/// # fn may_be_none() -> Option<()> { None }
///
/// const NAME: &str = "the thing";
/// let result: Result<(), FederationError> = may_be_none()
///     .ok_or_else(|| internal_error!("Expected {NAME} to be Some"));
/// ```
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::FederationError::internal(format!( $( $arg )+ ))
    }
}

/// Break out of the current function, returning an internal error.
///
/// # Example
/// ```rust
/// use federation_composition::bail;
/// use federation_composition::error::FederationError;
/// # fn may_be_none() -> Option<()> { None }
///
/// fn example() -> Result<(), FederationError> {
///     bail!("Something went horribly wrong");
///     unreachable!()
/// }
/// #
/// # _ = example();
/// ```
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ).into())
    }
}

/// A safe assertion: in debug mode, it panics on failure, and in production, it returns an
/// internal error.
///
/// Treat this as an assertion. It must only be used for conditions that *should never happen*
/// in normal operation.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        #[cfg(debug_assertions)]
        {
            if false {
                return Err($crate::error::FederationError::internal("ensure!() must be used in a function that returns a Result").into());
            }
            assert!($expr, $( $arg )+);
        }

        #[cfg(not(debug_assertions))]
        if !$expr {
            $crate::bail!( $( $arg )+ );
        }
    }
}

/// Stable machine-readable codes attached to every [`CompositionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[strum(serialize = "INVALID_GRAPHQL")]
    InvalidGraphQL,
    InvalidSubgraphName,
    InvalidLinkDirectiveUsage,
    UnknownFederationLinkVersion,
    TypeKindMismatch,
    RootQueryUsed,
    RootMutationUsed,
    RootSubscriptionUsed,
    KeyInvalidFields,
    ProvidesInvalidFields,
    RequiresInvalidFields,
    ProvidesOnNonObjectField,
    DirectiveDefinitionInvalid,
    DirectiveCompositionError,
    FieldTypeMismatch,
    FieldArgumentTypeMismatch,
    FieldArgumentDefaultMismatch,
    InputFieldDefaultMismatch,
    RequiredArgumentMissingInSomeSubgraph,
    RequiredInputFieldMissingInSomeSubgraph,
    InvalidFieldSharing,
    OverrideFromSelfError,
    OverrideSourceHasOverride,
    EnumValueMismatch,
    EmptyMergedEnumType,
    EmptyMergedInputType,
    InterfaceFieldNoImplem,
    NoQueries,
    ReferencedInaccessible,
    OnlyInaccessibleChildren,
    QueryRootTypeInaccessible,
    SatisfiabilityError,
    MaxValidationSubgraphPathsExceeded,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// A user-facing composition diagnostic.
///
/// Every variant maps to exactly one [`ErrorCode`]. Diagnostics are accumulated by each stage of
/// composition and returned together, so a single attempt surfaces every problem it can find.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    #[error("{message}")]
    InvalidGraphQL { message: String },
    #[error("{message}")]
    InvalidSubgraphName { message: String },
    #[error("{message}")]
    InvalidLinkDirectiveUsage { message: String },
    #[error("{message}")]
    UnknownFederationLinkVersion { message: String },
    #[error("{message}")]
    TypeKindMismatch { message: String },
    #[error("{message}")]
    RootQueryUsed { message: String },
    #[error("{message}")]
    RootMutationUsed { message: String },
    #[error("{message}")]
    RootSubscriptionUsed { message: String },
    #[error("{message}")]
    KeyInvalidFields { message: String },
    #[error("{message}")]
    ProvidesInvalidFields { message: String },
    #[error("{message}")]
    RequiresInvalidFields { message: String },
    #[error("{message}")]
    ProvidesOnNonObjectField { message: String },
    #[error("{message}")]
    DirectiveDefinitionInvalid { message: String },
    #[error("{message}")]
    DirectiveCompositionError { message: String },
    #[error("{message}")]
    FieldTypeMismatch { message: String },
    #[error("{message}")]
    FieldArgumentTypeMismatch { message: String },
    #[error("{message}")]
    FieldArgumentDefaultMismatch { message: String },
    #[error("{message}")]
    InputFieldDefaultMismatch { message: String },
    #[error("{message}")]
    RequiredArgumentMissingInSomeSubgraph { message: String },
    #[error("{message}")]
    RequiredInputFieldMissingInSomeSubgraph { message: String },
    #[error("{message}")]
    InvalidFieldSharing { message: String },
    #[error("{message}")]
    OverrideFromSelfError { message: String },
    #[error("{message}")]
    OverrideSourceHasOverride { message: String },
    #[error("{message}")]
    EnumValueMismatch { message: String },
    #[error("{message}")]
    EmptyMergedEnumType { message: String },
    #[error("{message}")]
    EmptyMergedInputType { message: String },
    #[error("{message}")]
    InterfaceFieldNoImplem { message: String },
    #[error("{message}")]
    NoQueries { message: String },
    #[error("{message}")]
    ReferencedInaccessible { message: String },
    #[error("{message}")]
    OnlyInaccessibleChildren { message: String },
    #[error("{message}")]
    QueryRootTypeInaccessible { message: String },
    /// An unsatisfiable supergraph query. `query` holds the witness operation on its own.
    #[error("{message}")]
    SatisfiabilityError { message: String, query: String },
    #[error("{message}")]
    MaxValidationSubgraphPathsExceeded { message: String },
}

impl CompositionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidGraphQL { .. } => ErrorCode::InvalidGraphQL,
            Self::InvalidSubgraphName { .. } => ErrorCode::InvalidSubgraphName,
            Self::InvalidLinkDirectiveUsage { .. } => ErrorCode::InvalidLinkDirectiveUsage,
            Self::UnknownFederationLinkVersion { .. } => ErrorCode::UnknownFederationLinkVersion,
            Self::TypeKindMismatch { .. } => ErrorCode::TypeKindMismatch,
            Self::RootQueryUsed { .. } => ErrorCode::RootQueryUsed,
            Self::RootMutationUsed { .. } => ErrorCode::RootMutationUsed,
            Self::RootSubscriptionUsed { .. } => ErrorCode::RootSubscriptionUsed,
            Self::KeyInvalidFields { .. } => ErrorCode::KeyInvalidFields,
            Self::ProvidesInvalidFields { .. } => ErrorCode::ProvidesInvalidFields,
            Self::RequiresInvalidFields { .. } => ErrorCode::RequiresInvalidFields,
            Self::ProvidesOnNonObjectField { .. } => ErrorCode::ProvidesOnNonObjectField,
            Self::DirectiveDefinitionInvalid { .. } => ErrorCode::DirectiveDefinitionInvalid,
            Self::DirectiveCompositionError { .. } => ErrorCode::DirectiveCompositionError,
            Self::FieldTypeMismatch { .. } => ErrorCode::FieldTypeMismatch,
            Self::FieldArgumentTypeMismatch { .. } => ErrorCode::FieldArgumentTypeMismatch,
            Self::FieldArgumentDefaultMismatch { .. } => ErrorCode::FieldArgumentDefaultMismatch,
            Self::InputFieldDefaultMismatch { .. } => ErrorCode::InputFieldDefaultMismatch,
            Self::RequiredArgumentMissingInSomeSubgraph { .. } => {
                ErrorCode::RequiredArgumentMissingInSomeSubgraph
            }
            Self::RequiredInputFieldMissingInSomeSubgraph { .. } => {
                ErrorCode::RequiredInputFieldMissingInSomeSubgraph
            }
            Self::InvalidFieldSharing { .. } => ErrorCode::InvalidFieldSharing,
            Self::OverrideFromSelfError { .. } => ErrorCode::OverrideFromSelfError,
            Self::OverrideSourceHasOverride { .. } => ErrorCode::OverrideSourceHasOverride,
            Self::EnumValueMismatch { .. } => ErrorCode::EnumValueMismatch,
            Self::EmptyMergedEnumType { .. } => ErrorCode::EmptyMergedEnumType,
            Self::EmptyMergedInputType { .. } => ErrorCode::EmptyMergedInputType,
            Self::InterfaceFieldNoImplem { .. } => ErrorCode::InterfaceFieldNoImplem,
            Self::NoQueries { .. } => ErrorCode::NoQueries,
            Self::ReferencedInaccessible { .. } => ErrorCode::ReferencedInaccessible,
            Self::OnlyInaccessibleChildren { .. } => ErrorCode::OnlyInaccessibleChildren,
            Self::QueryRootTypeInaccessible { .. } => ErrorCode::QueryRootTypeInaccessible,
            Self::SatisfiabilityError { .. } => ErrorCode::SatisfiabilityError,
            Self::MaxValidationSubgraphPathsExceeded { .. } => {
                ErrorCode::MaxValidationSubgraphPathsExceeded
            }
        }
    }

    /// The synthesized operation that cannot be satisfied, for satisfiability errors.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::SatisfiabilityError { query, .. } => Some(query),
            _ => None,
        }
    }
}

/// The crate-wide error type.
///
/// `Internal` errors signal a bug in composition itself (an invariant over data the crate built
/// was broken) and are never downgraded into a [`CompositionError`]. `Composition` carries the
/// user-facing diagnostics of a failed composition.
#[derive(Debug, Clone, Error)]
pub enum FederationError {
    #[error("An internal error has occurred, please report this bug to the maintainers: {message}")]
    Internal { message: String },
    #[error("{}", display_errors(.errors))]
    Composition { errors: Vec<CompositionError> },
}

fn display_errors(errors: &[CompositionError]) -> String {
    errors.iter().map(|error| error.to_string()).join("\n")
}

impl FederationError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// The composition diagnostics carried by this error; empty for internal errors.
    pub fn composition_errors(&self) -> &[CompositionError] {
        match self {
            Self::Internal { .. } => &[],
            Self::Composition { errors } => errors,
        }
    }
}

impl From<CompositionError> for FederationError {
    fn from(error: CompositionError) -> Self {
        Self::Composition {
            errors: vec![error],
        }
    }
}

impl From<Vec<CompositionError>> for FederationError {
    fn from(errors: Vec<CompositionError>) -> Self {
        Self::Composition { errors }
    }
}

/// Codes of the non-fatal [`CompositionHint`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HintCode {
    InconsistentDescription,
    InconsistentArgumentPresence,
    InconsistentDefaultValuePresence,
    InconsistentInputObjectField,
    InconsistentEnumValueForInputEnum,
    UnusedEnumType,
    FromSubgraphDoesNotExist,
    OverriddenFieldCanBeRemoved,
    InconsistentExecutableDirectivePresence,
    NoExecutableDirectiveLocationsIntersection,
}

impl HintCode {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// A non-fatal observation made while composing, returned next to a successful supergraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionHint {
    pub code: HintCode,
    pub message: String,
}

impl Display for CompositionHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_screaming_snake_case() {
        assert_eq!(ErrorCode::InvalidGraphQL.code(), "INVALID_GRAPHQL");
        assert_eq!(
            ErrorCode::InterfaceFieldNoImplem.code(),
            "INTERFACE_FIELD_NO_IMPLEM"
        );
        assert_eq!(
            ErrorCode::MaxValidationSubgraphPathsExceeded.to_string(),
            "MAX_VALIDATION_SUBGRAPH_PATHS_EXCEEDED"
        );
        assert_eq!(
            HintCode::FromSubgraphDoesNotExist.code(),
            "FROM_SUBGRAPH_DOES_NOT_EXIST"
        );
    }

    #[test]
    fn composition_errors_display_one_per_line() {
        let error = FederationError::from(vec![
            CompositionError::NoQueries {
                message: "No queries found in any subgraph".to_owned(),
            },
            CompositionError::InvalidGraphQL {
                message: "Unexpected token".to_owned(),
            },
        ]);
        assert!(!error.is_internal());
        assert_eq!(
            error.to_string(),
            "No queries found in any subgraph\nUnexpected token"
        );
        assert_eq!(error.composition_errors()[0].code(), ErrorCode::NoQueries);
    }

    #[test]
    fn internal_errors_are_not_diagnostics() {
        let error = internal_error!("node {} unexpectedly missing", 3);
        assert!(error.is_internal());
        assert!(error.composition_errors().is_empty());
        assert!(error.to_string().contains("node 3 unexpectedly missing"));
    }
}
