//! Error types for LYB encoding/decoding and tree construction.

use thiserror::Error;

use crate::schema::ValueError;

/// Error classes shared by encoder and decoder errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Memory allocation failed.
    OutOfMemory,
    /// An internal invariant was violated (hash space exhausted, a field wider
    /// than its wire width, a metadata count hitting the reserved sentinel).
    Internal,
    /// The caller passed an argument that cannot be encoded.
    InvalidArgument,
    /// The output sink failed.
    Io,
    /// The input is malformed or was produced for another schema context.
    InvalidData,
}

impl ErrorClass {
    /// Returns the short error code string (e.g., "EINT").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorClass::OutOfMemory => "EMEM",
            ErrorClass::Internal => "EINT",
            ErrorClass::InvalidArgument => "EINVAL",
            ErrorClass::Io => "EIO",
            ErrorClass::InvalidData => "EVALID",
        }
    }
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    // === EMEM ===
    #[error("[EMEM] memory allocation failed while {context}")]
    OutOfMemory { context: &'static str },

    // === EINT ===
    #[error("[EINT] no collision-free hash for \"{module}:{name}\" within {levels} collision levels")]
    HashSpaceExhausted {
        module: String,
        name: String,
        levels: u8,
    },

    #[error("[EINT] schema node \"{name}\" is missing from its sibling hash table")]
    SchemaNodeNotHashed { name: String },

    #[error("[EINT] {field} length {len} exceeds maximum {max}")]
    LengthExceedsWidth {
        field: &'static str,
        len: usize,
        max: u64,
    },

    #[error("[EINT] number {value} does not fit into {width} bytes")]
    NumberExceedsWidth { value: u64, width: u8 },

    #[error("[EINT] unsupported number width {width}")]
    InvalidWidth { width: u8 },

    #[error("[EINT] node has {count} metadata, maximum is {max}")]
    TooManyMetadata { count: usize, max: u8 },

    #[error("[EINT] {field} has {count} entries, maximum is {max}")]
    TooManyEntries {
        field: &'static str,
        count: usize,
        max: usize,
    },

    #[error("[EINT] {type_name} value printed to {actual} bytes, fixed LYB length is {expected}")]
    FixedLengthMismatch {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("[EINT] value of \"{name}\" cannot be printed: {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: ValueError,
    },

    #[error("[EINT] data node kind does not match schema node \"{name}\"")]
    KindMismatch { name: String },

    // === EINVAL ===
    #[error("[EINVAL] document root must be a top-level node, \"{name}\" is not")]
    NotTopLevel { name: String },

    #[error("[EINVAL] node {index} does not exist in the data tree")]
    UnknownNode { index: usize },

    // === EIO ===
    #[error("[EIO] output sink failed: {0}")]
    Io(String),
}

impl EncodeError {
    /// Returns the error class for this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            EncodeError::OutOfMemory { .. } => ErrorClass::OutOfMemory,
            EncodeError::NotTopLevel { .. } | EncodeError::UnknownNode { .. } => {
                ErrorClass::InvalidArgument
            }
            EncodeError::Io(_) => ErrorClass::Io,
            _ => ErrorClass::Internal,
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::OutOfMemory {
            EncodeError::OutOfMemory {
                context: "writing to the output sink",
            }
        } else {
            EncodeError::Io(err.to_string())
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("[EVALID] invalid magic bytes: expected \"lyb\", found {found:?}")]
    InvalidMagic { found: [u8; 3] },

    #[error("[EVALID] unsupported LYB version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("[EVALID] unknown hash algorithm bits: {bits:#04x}")]
    UnknownHashAlgorithm { bits: u8 },

    #[error("[EVALID] reserved bits are non-zero in {context}")]
    ReservedBitsSet { context: &'static str },

    #[error("[EVALID] data were printed with a different schema context (hash {found:#010x}, expected {expected:#010x})")]
    ContextMismatch { expected: u32, found: u32 },

    #[error("[EVALID] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("[EVALID] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: u64,
        max: u64,
    },

    #[error("[EVALID] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("[EVALID] invalid node type {tag}")]
    InvalidNodeType { tag: u8 },

    #[error("[EVALID] node type {tag} is not allowed {context}")]
    UnexpectedNodeType { tag: u8, context: &'static str },

    #[error("[EVALID] module \"{name}\" is not in the schema context")]
    UnknownModule { name: String },

    #[error("[EVALID] module \"{name}\" revision {found:#06x} does not match {expected:#06x}")]
    RevisionMismatch { name: String, expected: u16, found: u16 },

    #[error("[EVALID] invalid schema hash {hash:#04x}")]
    InvalidHash { hash: u8 },

    #[error("[EVALID] no schema node matches hash chain {hashes:02x?}")]
    UnknownSchemaHash { hashes: Vec<u8> },

    #[error("[EVALID] module \"{module}\" has no extension data node \"{name}\"")]
    UnknownSchemaName { module: String, name: String },

    #[error("[EVALID] schema node \"{name}\" cannot be instantiated")]
    NotInstantiable { name: String },

    #[error("[EVALID] invalid value of \"{name}\": {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: ValueError,
    },

    #[error("[EVALID] invalid anydata value kind {kind}")]
    InvalidAnyKind { kind: u8 },

    #[error("[EVALID] invalid opaque node format {format}")]
    InvalidFormat { format: u8 },

    #[error("[EVALID] malformed encoding: {context}")]
    MalformedEncoding { context: &'static str },

    #[error("[EVALID] nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },

    #[error("[EVALID] {len} unexpected bytes after the end of data")]
    TrailingData { len: usize },

    #[error("[EVALID] decoded nodes do not form a valid tree: {0}")]
    InvalidTree(#[from] DataError),

    #[error("[EINT] no collision-free hash for \"{module}:{name}\" within {levels} collision levels")]
    HashSpaceExhausted {
        module: String,
        name: String,
        levels: u8,
    },

    #[error("[EMEM] memory allocation failed while {context}")]
    OutOfMemory { context: &'static str },
}

impl DecodeError {
    /// Returns the error class for this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            DecodeError::HashSpaceExhausted { .. } => ErrorClass::Internal,
            DecodeError::OutOfMemory { .. } => ErrorClass::OutOfMemory,
            _ => ErrorClass::InvalidData,
        }
    }
}

/// Error while building a schema context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("module \"{name}\" already exists")]
    DuplicateModule { name: String },

    #[error("invalid revision \"{revision}\" of module \"{module}\": {message}")]
    InvalidRevision {
        module: String,
        revision: String,
        message: String,
    },

    #[error("node \"{name}\" already exists under the same parent")]
    DuplicateNode { name: String },

    #[error("{parent} \"{parent_name}\" cannot have a {child} child")]
    InvalidChild {
        parent: &'static str,
        parent_name: String,
        child: &'static str,
    },

    #[error("{kind} \"{name}\" must be placed under an rpc or action")]
    OrphanOperationPart { kind: &'static str, name: String },

    #[error("invalid type of \"{name}\": {source}")]
    InvalidType {
        name: String,
        #[source]
        source: ValueError,
    },
}

/// Error while building a data tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("schema node \"{name}\" is a {kind} and cannot be instantiated")]
    NotInstantiable { name: String, kind: &'static str },

    #[error("schema node \"{name}\" is a {expected}, node kind does not match")]
    KindMismatch { name: String, expected: &'static str },

    #[error("invalid value for \"{name}\": {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: ValueError,
    },

    #[error("\"{child}\" is not a data child of \"{parent}\"")]
    ParentMismatch { child: String, parent: String },

    #[error("opaque node \"{parent}\" can only have opaque children")]
    OpaqueParent { parent: String },

    #[error("node {index} is already linked into the tree")]
    AlreadyLinked { index: usize },

    #[error("node {index} does not exist in the data tree")]
    UnknownNode { index: usize },

    #[error("module \"{name}\" is not in the schema context")]
    UnknownModule { name: String },

    #[error("no data node \"{name}\" under \"{parent}\"")]
    UnknownSchemaNode { parent: String, name: String },
}
