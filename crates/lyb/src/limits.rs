//! Wire constants and decoder limits for the LYB format.

/// Magic bytes starting every LYB document.
pub const MAGIC: &[u8; 3] = b"lyb";

/// Current LYB format version (low nibble of the header byte).
pub const FORMAT_VERSION: u8 = 0x04;

/// Version mask of the header byte.
pub const HEADER_VERSION_MASK: u8 = 0x0F;

/// Hash algorithm mask of the header byte.
pub const HEADER_HASH_MASK: u8 = 0x30;

/// Number of bits of one schema hash, also the number of collision levels.
pub const HASH_BITS: usize = 8;

/// Mask of the hash part of a collision ID 0 hash.
pub const HASH_MASK: u8 = 0x7F;

/// Collision ID marker of collision ID 0; shift right by the collision ID for others.
///
/// ```text
/// 1xxx xxxx - collision ID 0 (no collision)
/// 01xx xxxx - collision ID 1
/// 001x xxxx - collision ID 2 ...
/// ```
pub const HASH_COLLISION_ID: u8 = 0x80;

/// Number of per-node hashes a schema context can precompute.
pub const CACHED_HASH_COUNT: usize = 4;

/// Reserved metadata count ending a list or leaf-list run.
pub const METADATA_END: u8 = 0xFF;

/// Width of module, schema and metadata name length prefixes.
pub const NAME_LEN_BYTES: u8 = 2;

/// Width of value length prefixes.
pub const VALUE_LEN_BYTES: u8 = 8;

/// Width of the module revision.
pub const REVISION_BYTES: u8 = 2;

/// Width of data node flags.
pub const FLAGS_BYTES: u8 = 4;

/// Width of the context identity hash in the header.
pub const CONTEXT_HASH_BYTES: u8 = 4;

/// Module providing the `default` annotation of with-defaults tagging.
pub const WITH_DEFAULTS_MODULE: &str = "ietf-netconf-with-defaults";

/// Annotation name of with-defaults tagging.
pub const WITH_DEFAULTS_NAME: &str = "default";

/// Default maximum nesting depth accepted by the decoder.
pub const MAX_DEPTH: usize = 256;

/// Maximum length of one value, metadata value or anydata string accepted by the decoder.
pub const MAX_VALUE_LEN: u64 = u32::MAX as u64;
