//! Composition of federated GraphQL subgraphs into a supergraph.
//!
//! ## Usage
//!
//! ```rust
//! use federation_composition::Subgraph;
//! use federation_composition::compose;
//!
//! let link = r#"extend schema @link(url: "https://specs.apollo.dev/federation/v2.9", import: ["@key"])"#;
//! let users = Subgraph::parse(
//!     "users",
//!     Some("http://users"),
//!     &format!("{link} type Query {{ me: User }} type User @key(fields: \"id\") {{ id: ID! }}"),
//! )?;
//! let reviews = Subgraph::parse(
//!     "reviews",
//!     Some("http://reviews"),
//!     &format!("{link} type User @key(fields: \"id\") {{ id: ID! reviewCount: Int }}"),
//! )?;
//! let supergraph = compose(&[users, reviews])?;
//! assert!(supergraph.sdl().contains("reviewCount: Int @join__field(graph: REVIEWS)"));
//! # Ok::<(), federation_composition::error::FederationError>(())
//! ```
//!
//! Composition runs in stages. Each subgraph document is first read into a
//! [`subgraph::state::SubgraphState`], then all states are merged into one supergraph state
//! recording which subgraph resolves what. A merged supergraph is checked for satisfiability: every
//! query its API schema accepts must be resolvable by some combination of subgraph fetches. Only
//! then is the supergraph document with its `join` routing directives synthesized.

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

mod composition;
pub mod error;
pub mod link;
pub mod merger;
mod satisfiability;
pub mod subgraph;
mod supergraph;
pub(crate) mod utils;

pub use crate::composition::CompositionOptions;
pub use crate::composition::compose;
pub use crate::composition::compose_with_options;
pub use crate::error::CompositionError;
pub use crate::error::CompositionHint;
pub use crate::error::ErrorCode;
pub use crate::error::FederationError;
pub use crate::error::HintCode;
pub use crate::subgraph::Subgraph;
pub use crate::supergraph::Supergraph;
