//! Data tree encoding.
//!
//! A document is the header followed by one sibling stream of top-level
//! nodes. Every node starts with its [`NodeType`] tag and identity, then a
//! body depending on its category:
//!
//! ```text
//! inner      metadata, flags, children stream
//! leaf       metadata, flags, value
//! leaf-list  (metadata, flags, value)*, 0xFF
//! list       (metadata, flags, children stream)*, 0xFF
//! any        metadata, flags, kind, children stream | 8-byte-length string
//! opaque     attributes, flags, prefix, module, name, value, format, prefixes,
//!            children stream
//! ```
//!
//! The document is assembled in memory and reaches the sink only when the
//! whole tree was encoded.

use std::io::Write;

use tracing::{debug, trace, warn};

use crate::codec::decode::{DecodeOptions, decode};
use crate::codec::hash::{HashAlgorithm, HashTableCache};
use crate::codec::header::{Header, NodeType, write_header, write_module};
use crate::codec::primitives::Writer;
use crate::data::{
    AnyKind, AnyValue, DataNode, DataNodeKind, DataTree, Metadatum, NodeFlags, NodeId, OpaqueFormat,
    OpaqueNode, PrefixMapping,
};
use crate::error::EncodeError;
use crate::limits::{
    FLAGS_BYTES, METADATA_END, NAME_LEN_BYTES, VALUE_LEN_BYTES, WITH_DEFAULTS_MODULE, WITH_DEFAULTS_NAME,
};
use crate::schema::{ModuleId, SchemaContext, SchemaId, Value, ValueCodec, ValueFormat};

/// Module of the internal metadata never written to documents.
const INTERNAL_META_MODULE: &str = "yang";
/// Internal metadata holding a leaf-list ordering structure.
const INTERNAL_META_NAME: &str = "lyds_tree";

/// Maximum number of entries of a 1-byte counted table.
const MAX_TABLE_ENTRIES: usize = u8::MAX as usize;

/// How default values are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WithDefaults {
    /// Defaults are written like any other node.
    #[default]
    Explicit,
    Trim,
    All,
    /// Every default node gets the with-defaults `default` annotation.
    AllTagged,
    /// Only implicitly created default nodes get the annotation.
    ImplicitTagged,
}

/// Options for encoding.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Encode the following siblings of the root as well.
    pub with_siblings: bool,
    pub with_defaults: WithDefaults,
    /// Hash function of schema node hashes.
    pub hash_algorithm: HashAlgorithm,
    /// Read node hashes precomputed by [`SchemaContext::precompute_hashes`].
    pub cache_node_hashes: bool,
}

impl EncodeOptions {
    /// Creates default options encoding a single subtree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options encoding the root and all its following siblings.
    pub fn with_siblings() -> Self {
        Self {
            with_siblings: true,
            ..Self::default()
        }
    }

    pub fn defaults(mut self, mode: WithDefaults) -> Self {
        self.with_defaults = mode;
        self
    }

    pub fn hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    pub fn cache_node_hashes(mut self, enabled: bool) -> Self {
        self.cache_node_hashes = enabled;
        self
    }
}

/// Encodes a data tree starting at `root` into the sink.
///
/// `None` encodes an empty document. Nothing is written to the sink when
/// encoding fails.
pub fn encode<W: Write + ?Sized>(
    sink: &mut W,
    ctx: &SchemaContext,
    tree: &DataTree,
    root: Option<NodeId>,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    let writer = encode_document(ctx, tree, root, options)?;
    writer.flush_into(sink)
}

/// Encodes a data tree starting at `root` into a new buffer.
pub fn encode_to_vec(
    ctx: &SchemaContext,
    tree: &DataTree,
    root: Option<NodeId>,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    encode_document(ctx, tree, root, options).map(Writer::into_bytes)
}

fn encode_document(
    ctx: &SchemaContext,
    tree: &DataTree,
    root: Option<NodeId>,
    options: &EncodeOptions,
) -> Result<Writer, EncodeError> {
    let mut writer = Writer::with_capacity(256);

    let Some(root) = root else {
        write_header(
            &mut writer,
            Header {
                algorithm: options.hash_algorithm,
                context_hash: 0,
            },
        )?;
        return Ok(writer);
    };

    let first = check_roots(ctx, tree, root, options.with_siblings)?;
    write_header(
        &mut writer,
        Header {
            algorithm: options.hash_algorithm,
            context_hash: ctx.modules_hash(),
        },
    )?;

    let mut cache = HashTableCache::new(ctx, options.hash_algorithm, options.cache_node_hashes);
    let mut encoder = Encoder {
        ctx,
        options,
        cache: &mut cache,
        writer: &mut writer,
        with_defaults_module: ctx.module_by_name(WITH_DEFAULTS_MODULE),
    };
    encoder.write_siblings(tree, Some(first), true, !options.with_siblings)?;

    debug!(
        bytes = writer.len(),
        hash_tables = cache.len(),
        "encoded LYB document"
    );
    Ok(writer)
}

/// Checks that the document roots are top-level nodes and returns the first one.
fn check_roots(
    ctx: &SchemaContext,
    tree: &DataTree,
    root: NodeId,
    with_siblings: bool,
) -> Result<NodeId, EncodeError> {
    if tree.get(root).is_none() {
        return Err(EncodeError::UnknownNode { index: root.index() });
    }

    let first = if with_siblings {
        let mut first = root;
        while let Some(prev) = tree.node(first).prev_sibling() {
            first = prev;
        }
        first
    } else {
        root
    };

    let roots: Vec<NodeId> = if with_siblings {
        tree.siblings_from(Some(first)).collect()
    } else {
        vec![root]
    };
    for id in roots {
        check_top_level(ctx, tree, id)?;
    }
    Ok(first)
}

/// A node written with a TOP tag must have neither a data parent nor a
/// schema node below the top level.
fn check_top_level(ctx: &SchemaContext, tree: &DataTree, id: NodeId) -> Result<(), EncodeError> {
    let node = tree.node(id);
    let nested = match node.schema() {
        Some(schema) => !ctx.node(schema).is_ext_root() && ctx.data_parent(schema).is_some(),
        None => false,
    };
    if node.parent().is_some() || nested {
        return Err(EncodeError::NotTopLevel {
            name: node_name(ctx, node),
        });
    }
    Ok(())
}

fn node_name(ctx: &SchemaContext, node: &DataNode) -> String {
    match (node.kind(), node.schema()) {
        (DataNodeKind::Opaque(opaque), _) => opaque.name.name.clone(),
        (_, Some(schema)) => ctx.node(schema).name().to_string(),
        (_, None) => String::new(),
    }
}

struct Encoder<'a, 's> {
    ctx: &'s SchemaContext,
    options: &'a EncodeOptions,
    cache: &'a mut HashTableCache<'s>,
    writer: &'a mut Writer,
    with_defaults_module: Option<ModuleId>,
}

impl Encoder<'_, '_> {
    // =========================================================================
    // Sibling streams
    // =========================================================================

    /// Writes a sibling stream starting at `first`, ended by an END tag.
    fn write_siblings(
        &mut self,
        tree: &DataTree,
        first: Option<NodeId>,
        top: bool,
        single: bool,
    ) -> Result<(), EncodeError> {
        // first sibling of the group whose table is in use
        let mut current: Option<SchemaId> = None;
        let mut prev_module: Option<ModuleId> = None;
        let mut next = first;

        while let Some(id) = next {
            let node = tree.node(id);
            let module = node.schema().map(|s| self.ctx.node(s).module());
            if node.is_opaque() || self.is_ext(node) || (top && module != prev_module) {
                current = None;
            }
            prev_module = module;

            next = match node.kind() {
                DataNodeKind::List | DataNodeKind::LeafList(_) => {
                    self.write_run(tree, id, top, single, &mut current)?
                }
                _ => {
                    self.write_node(tree, id, top, &mut current)?;
                    node.next_sibling()
                }
            };
            if single {
                break;
            }
        }

        self.writer.write_byte(NodeType::End as u8)
    }

    fn is_ext(&self, node: &DataNode) -> bool {
        node.schema().is_some_and(|s| self.ctx.node(s).is_ext_root())
    }

    /// Writes the tag and identity of a node.
    fn write_node_header(
        &mut self,
        node: &DataNode,
        top: bool,
        current: &mut Option<SchemaId>,
    ) -> Result<(), EncodeError> {
        let Some(schema) = node.schema() else {
            return self.writer.write_byte(NodeType::Opaque as u8);
        };
        let snode = self.ctx.node(schema);

        if snode.is_ext_root() {
            self.writer.write_byte(NodeType::Ext as u8)?;
            write_module(self.writer, self.ctx.module(snode.module()))?;
            return self.writer.write_str(snode.name(), NAME_LEN_BYTES, "node name");
        }

        if top {
            self.writer.write_byte(NodeType::Top as u8)?;
            write_module(self.writer, self.ctx.module(snode.module()))?;
        } else {
            self.writer.write_byte(NodeType::Child as u8)?;
        }

        let table = match *current {
            Some(first) => self.cache.table(first),
            None => match self.cache.group_of(schema)? {
                Some((first, table)) => {
                    *current = Some(first);
                    Some(table)
                }
                None => None,
            },
        };
        let chain = table
            .and_then(|t| t.find(schema))
            .ok_or_else(|| EncodeError::SchemaNodeNotHashed {
                name: snode.name().to_string(),
            })?;
        for hash in chain.wire_bytes() {
            self.writer.write_byte(hash)?;
        }
        Ok(())
    }

    /// Writes one node that is not a list or leaf-list instance.
    fn write_node(
        &mut self,
        tree: &DataTree,
        id: NodeId,
        top: bool,
        current: &mut Option<SchemaId>,
    ) -> Result<(), EncodeError> {
        let node = tree.node(id);
        trace!(node = %node_name(self.ctx, node), "encoding node");
        self.write_node_header(node, top, current)?;

        match node.kind() {
            DataNodeKind::Opaque(opaque) => self.write_opaque(tree, node, opaque),
            DataNodeKind::Inner => {
                self.write_metadata(node)?;
                self.write_flags(node)?;
                self.write_siblings(tree, node.first_child(), false, false)
            }
            DataNodeKind::Term(value) => {
                self.write_metadata(node)?;
                self.write_flags(node)?;
                self.write_value(node, value)
            }
            DataNodeKind::Any(value) => {
                self.write_metadata(node)?;
                self.write_flags(node)?;
                self.write_any(value)
            }
            DataNodeKind::List | DataNodeKind::LeafList(_) => Err(EncodeError::KindMismatch {
                name: node_name(self.ctx, node),
            }),
        }
    }

    /// Writes consecutive instances of one list or leaf-list, returning the
    /// node following the run.
    fn write_run(
        &mut self,
        tree: &DataTree,
        first: NodeId,
        top: bool,
        single: bool,
        current: &mut Option<SchemaId>,
    ) -> Result<Option<NodeId>, EncodeError> {
        let node = tree.node(first);
        trace!(node = %node_name(self.ctx, node), "encoding instance run");
        self.write_node_header(node, top, current)?;

        let schema = node.schema();
        let mut next = Some(first);
        while let Some(id) = next {
            let instance = tree.node(id);
            if instance.schema() != schema {
                break;
            }
            self.write_metadata(instance)?;
            self.write_flags(instance)?;
            match instance.kind() {
                DataNodeKind::LeafList(value) => self.write_value(instance, value)?,
                DataNodeKind::List => self.write_siblings(tree, instance.first_child(), false, false)?,
                _ => {
                    return Err(EncodeError::KindMismatch {
                        name: node_name(self.ctx, instance),
                    });
                }
            }
            next = instance.next_sibling();
            if single {
                break;
            }
        }

        self.writer.write_byte(METADATA_END)?;
        Ok(next)
    }

    // =========================================================================
    // Node bodies
    // =========================================================================

    fn write_flags(&mut self, node: &DataNode) -> Result<(), EncodeError> {
        self.writer.write_number(u64::from(node.flags().bits()), FLAGS_BYTES)
    }

    /// Whether a term node gets a synthesized with-defaults annotation.
    fn tags_default(&self, node: &DataNode) -> bool {
        if self.with_defaults_module.is_none() {
            return false;
        }
        let (Some(schema), Some(value)) = (node.schema(), node.value()) else {
            return false;
        };
        let flagged = node.flags().contains(NodeFlags::DEFAULT);
        match self.options.with_defaults {
            WithDefaults::AllTagged => flagged || self.ctx.is_default_value(schema, value),
            WithDefaults::ImplicitTagged => flagged,
            WithDefaults::Explicit | WithDefaults::Trim | WithDefaults::All => false,
        }
    }

    fn is_printable(&self, meta: &Metadatum, tagged: bool) -> bool {
        let module = self.ctx.module(meta.module).name();
        if module == INTERNAL_META_MODULE && meta.name == INTERNAL_META_NAME {
            return false;
        }
        // replaced by the synthesized annotation
        !(tagged && Some(meta.module) == self.with_defaults_module && meta.name == WITH_DEFAULTS_NAME)
    }

    fn write_metadata(&mut self, node: &DataNode) -> Result<(), EncodeError> {
        let tagged = self.tags_default(node);
        let printable: Vec<&Metadatum> = node
            .metadata()
            .iter()
            .filter(|meta| self.is_printable(meta, tagged))
            .collect();

        let count = printable.len() + usize::from(tagged);
        if count >= usize::from(METADATA_END) {
            return Err(EncodeError::TooManyMetadata {
                count,
                max: METADATA_END - 1,
            });
        }
        self.writer.write_byte(count as u8)?;

        if let (true, Some(module)) = (tagged, self.with_defaults_module) {
            write_module(self.writer, self.ctx.module(module))?;
            self.writer.write_str(WITH_DEFAULTS_NAME, NAME_LEN_BYTES, "metadata name")?;
            self.writer.write_str("true", VALUE_LEN_BYTES, "metadata value")?;
        }
        for meta in printable {
            write_module(self.writer, self.ctx.module(meta.module))?;
            self.writer.write_str(&meta.name, NAME_LEN_BYTES, "metadata name")?;
            self.writer.write_str(&meta.value, VALUE_LEN_BYTES, "metadata value")?;
        }
        Ok(())
    }

    fn write_value(&mut self, node: &DataNode, value: &Value) -> Result<(), EncodeError> {
        let name = || node_name(self.ctx, node);
        let spec = node
            .schema()
            .and_then(|s| self.ctx.node(s).kind().term())
            .ok_or_else(|| EncodeError::KindMismatch { name: name() })?;

        let bytes = spec
            .ty
            .print(value, ValueFormat::Lyb)
            .map_err(|source| EncodeError::InvalidValue { name: name(), source })?;
        match spec.ty.lyb_len() {
            Some(expected) if bytes.len() != expected => Err(EncodeError::FixedLengthMismatch {
                type_name: spec.ty.type_name(),
                expected,
                actual: bytes.len(),
            }),
            Some(_) => self.writer.write_bytes(&bytes),
            None => self.writer.write_string(Some(&bytes), VALUE_LEN_BYTES, "value"),
        }
    }

    fn write_any(&mut self, value: &AnyValue) -> Result<(), EncodeError> {
        let (kind, text) = match value {
            AnyValue::DataTree(tree) => {
                for id in tree.siblings_from(tree.first_root()) {
                    check_top_level(self.ctx, tree, id)?;
                }
                self.writer.write_byte(AnyKind::DataTree as u8)?;
                return self.write_siblings(tree, tree.first_root(), true, false);
            }
            AnyValue::Lyb(bytes) => {
                self.writer.write_byte(AnyKind::DataTree as u8)?;
                return match decode(bytes, self.ctx, &DecodeOptions::default()) {
                    Ok(Some(tree)) => self.write_siblings(&tree, tree.first_root(), true, false),
                    Ok(None) => self.writer.write_byte(NodeType::End as u8),
                    Err(err) => {
                        warn!(error = %err, "failed to parse anydata LYB value, writing it empty");
                        self.writer.write_byte(NodeType::End as u8)
                    }
                };
            }
            AnyValue::String(s) => (AnyKind::String, s),
            AnyValue::Xml(s) => (AnyKind::Xml, s),
            AnyValue::Json(s) => (AnyKind::Json, s),
        };
        self.writer.write_byte(kind as u8)?;
        self.writer.write_str(text, VALUE_LEN_BYTES, "anydata value")
    }

    fn write_prefixes(&mut self, format: OpaqueFormat, prefixes: &[PrefixMapping]) -> Result<(), EncodeError> {
        if !format.has_prefixes() {
            return Ok(());
        }
        if prefixes.len() > MAX_TABLE_ENTRIES {
            return Err(EncodeError::TooManyEntries {
                field: "value prefixes",
                count: prefixes.len(),
                max: MAX_TABLE_ENTRIES,
            });
        }
        self.writer.write_byte(prefixes.len() as u8)?;
        for mapping in prefixes {
            self.writer
                .write_optional_str(mapping.prefix.as_deref(), NAME_LEN_BYTES, "prefix")?;
            self.writer
                .write_str(&mapping.namespace, NAME_LEN_BYTES, "namespace")?;
        }
        Ok(())
    }

    fn write_opaque(&mut self, tree: &DataTree, node: &DataNode, opaque: &OpaqueNode) -> Result<(), EncodeError> {
        if opaque.attrs.len() > MAX_TABLE_ENTRIES {
            return Err(EncodeError::TooManyEntries {
                field: "opaque attributes",
                count: opaque.attrs.len(),
                max: MAX_TABLE_ENTRIES,
            });
        }
        self.writer.write_byte(opaque.attrs.len() as u8)?;
        for attr in &opaque.attrs {
            self.writer
                .write_optional_str(attr.name.prefix.as_deref(), NAME_LEN_BYTES, "attribute prefix")?;
            self.writer
                .write_optional_str(attr.name.module_name.as_deref(), NAME_LEN_BYTES, "attribute module")?;
            self.writer
                .write_str(&attr.name.name, NAME_LEN_BYTES, "attribute name")?;
            self.writer.write_byte(attr.format as u8)?;
            self.write_prefixes(attr.format, &attr.prefixes)?;
            self.writer
                .write_str(&attr.value, VALUE_LEN_BYTES, "attribute value")?;
        }

        self.write_flags(node)?;
        self.writer
            .write_optional_str(opaque.name.prefix.as_deref(), NAME_LEN_BYTES, "opaque prefix")?;
        self.writer
            .write_optional_str(opaque.name.module_name.as_deref(), NAME_LEN_BYTES, "opaque module")?;
        self.writer
            .write_str(&opaque.name.name, NAME_LEN_BYTES, "opaque name")?;
        self.writer
            .write_str(&opaque.value, VALUE_LEN_BYTES, "opaque value")?;
        self.writer.write_byte(opaque.format as u8)?;
        self.write_prefixes(opaque.format, &opaque.prefixes)?;

        self.write_siblings(tree, node.first_child(), false, false)
    }
}
