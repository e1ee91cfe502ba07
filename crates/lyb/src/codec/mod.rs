//! Binary encoding/decoding for LYB.
//!
//! Schema nodes are identified by short collision-resolved hashes instead of
//! names; see [`hash`] for how sibling tables are built.

pub mod decode;
pub mod encode;
pub mod hash;
pub mod header;
pub mod primitives;

pub use decode::{DecodeOptions, decode};
pub use encode::{EncodeOptions, WithDefaults, encode, encode_to_vec};
pub use hash::{HashAlgorithm, HashChain, HashTableCache, SiblingHashTable, node_hash};
pub use header::{Header, NodeType};
pub use primitives::{Reader, Writer};
