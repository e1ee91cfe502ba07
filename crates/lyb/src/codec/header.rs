//! Document header and module records.
//!
//! ```text
//! magic      "lyb"
//! header     version (low nibble) | hash algorithm bits
//! identity   4-byte context identity hash, 0 for an empty document
//! ```
//!
//! A module record is a 2-byte-length name followed by the 2-byte packed
//! revision, 0 when the module has none.

use crate::codec::hash::HashAlgorithm;
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{
    CONTEXT_HASH_BYTES, FORMAT_VERSION, HEADER_HASH_MASK, HEADER_VERSION_MASK, MAGIC, NAME_LEN_BYTES,
    REVISION_BYTES,
};
use crate::schema::{Module, ModuleId, SchemaContext};

/// Node type tag starting every node of a sibling stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    /// Ends a sibling stream.
    End = 0,
    Opaque = 1,
    /// Root of an extension instance, identified by name.
    Ext = 2,
    /// Top-level node, preceded by its module record.
    Top = 3,
    Child = 4,
}

impl NodeType {
    /// Creates a NodeType from its wire representation.
    pub fn from_u8(v: u8) -> Option<NodeType> {
        match v {
            0 => Some(NodeType::End),
            1 => Some(NodeType::Opaque),
            2 => Some(NodeType::Ext),
            3 => Some(NodeType::Top),
            4 => Some(NodeType::Child),
            _ => None,
        }
    }
}

/// Decoded document header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub algorithm: HashAlgorithm,
    pub context_hash: u32,
}

/// Writes magic, header byte and context identity hash.
pub fn write_header(writer: &mut Writer, header: Header) -> Result<(), EncodeError> {
    writer.write_bytes(MAGIC)?;
    writer.write_byte(FORMAT_VERSION | header.algorithm.header_bits())?;
    writer.write_number(u64::from(header.context_hash), CONTEXT_HASH_BYTES)
}

/// Reads and checks magic and header byte, then the context identity hash.
pub fn read_header(reader: &mut Reader<'_>) -> Result<Header, DecodeError> {
    let magic = reader.read_bytes(MAGIC.len(), "magic")?;
    if magic != MAGIC {
        let mut found = [0u8; 3];
        found.copy_from_slice(magic);
        return Err(DecodeError::InvalidMagic { found });
    }

    let byte = reader.read_byte("header")?;
    let version = byte & HEADER_VERSION_MASK;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    if byte & !(HEADER_VERSION_MASK | HEADER_HASH_MASK) != 0 {
        return Err(DecodeError::ReservedBitsSet { context: "header" });
    }
    let bits = byte & HEADER_HASH_MASK;
    let algorithm = HashAlgorithm::from_header_bits(bits).ok_or(DecodeError::UnknownHashAlgorithm { bits })?;

    let context_hash = reader.read_number(CONTEXT_HASH_BYTES, "context hash")? as u32;
    Ok(Header {
        algorithm,
        context_hash,
    })
}

/// Writes the name and revision of a module.
pub fn write_module(writer: &mut Writer, module: &Module) -> Result<(), EncodeError> {
    writer.write_str(module.name(), NAME_LEN_BYTES, "module name")?;
    writer.write_number(u64::from(module.packed_revision()), REVISION_BYTES)
}

/// Reads a module record and resolves it in the context.
///
/// A record without revision matches any revision of the module.
pub fn read_module(reader: &mut Reader<'_>, ctx: &SchemaContext) -> Result<ModuleId, DecodeError> {
    let name = reader.read_str(NAME_LEN_BYTES, "module name")?;
    let revision = reader.read_number(REVISION_BYTES, "module revision")? as u16;

    let id = ctx.module_by_name(name).ok_or_else(|| DecodeError::UnknownModule {
        name: name.to_string(),
    })?;
    let expected = ctx.module(id).packed_revision();
    if revision != 0 && revision != expected {
        return Err(DecodeError::RevisionMismatch {
            name: name.to_string(),
            expected,
            found: revision,
        });
    }
    Ok(id)
}
