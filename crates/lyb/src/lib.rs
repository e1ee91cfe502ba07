//! LYB: compact binary encoding of schema-typed YANG data trees.
//!
//! This crate encodes and decodes data trees bound to a [`SchemaContext`]
//! into the LYB format. Documents are only readable with a context holding
//! the same modules, revisions and features they were written with.
//!
//! # Quick Start
//!
//! ```rust
//! use lyb::{DecodeOptions, EncodeOptions, SchemaContext, TreeBuilder, decode, encode_to_vec};
//! use lyb::schema::{LeafType, SchemaKind, TermSpec};
//!
//! let mut ctx = SchemaContext::new();
//! let m = ctx.add_module("system", Some("2024-03-01")).unwrap();
//! let sys = ctx.add_node(m, None, "system", SchemaKind::Container).unwrap();
//! ctx.add_node(m, Some(sys), "hostname", SchemaKind::Leaf(TermSpec::new(LeafType::String))).unwrap();
//!
//! let tree = TreeBuilder::new(&ctx)
//!     .container("system", "system", |c| c.leaf("hostname", "edge-1"))
//!     .build()
//!     .unwrap();
//!
//! // Encode to binary
//! let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();
//!
//! // Decode back
//! let decoded = decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap();
//! assert_eq!(tree, decoded);
//! ```
//!
//! # Modules
//!
//! - [`schema`]: Schema context, schema nodes and leaf value types
//! - [`data`]: Data trees and the tree builder
//! - [`codec`]: Binary encoding/decoding and sibling hash tables
//! - [`error`]: Error types
//! - [`limits`]: Wire constants and decoder limits
//!
//! # Wire Format
//!
//! ```text
//! "lyb" | version + hash algorithm | context hash (4) | sibling stream
//! ```
//!
//! A sibling stream is a sequence of nodes ended by a zero byte. Top-level
//! nodes carry their module name and revision, every other schema-bound
//! node only its hash chain.
//!
//! # Security
//!
//! The decoder handles untrusted input: lengths are checked against the
//! remaining input, nesting depth is bounded and every read is bounds
//! checked.

pub mod codec;
pub mod data;
pub mod error;
pub mod limits;
pub mod schema;
pub mod util;

// Re-export commonly used types at crate root
pub use codec::{DecodeOptions, EncodeOptions, HashAlgorithm, WithDefaults, decode, encode, encode_to_vec};
pub use data::{
    AnyValue, DataNode, DataNodeKind, DataTree, Metadatum, NodeFlags, NodeId, OpaqueFormat, OpaqueName, OpaqueNode,
    TreeBuilder,
};
pub use error::{DataError, DecodeError, EncodeError, ErrorClass, SchemaError};
pub use schema::{LeafType, ModuleId, SchemaContext, SchemaId, SchemaKind, TermSpec, Value, ValueCodec};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// LYB format version this crate reads and writes.
pub const FORMAT_VERSION: u8 = limits::FORMAT_VERSION;
