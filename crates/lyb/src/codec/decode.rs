//! Data tree decoding.
//!
//! The symmetric reader of [`encode`](crate::codec::encode): nodes are
//! resolved through the same sibling hash tables and bodies are read in the
//! order they were written.

use tracing::{debug, trace};

use crate::codec::hash::{HashChain, HashTableCache};
use crate::codec::header::{NodeType, read_header, read_module};
use crate::codec::primitives::Reader;
use crate::data::{
    AnyKind, AnyValue, DataNodeKind, DataTree, Metadatum, NodeFlags, NodeId, OpaqueAttr, OpaqueFormat, OpaqueName,
    OpaqueNode, PrefixMapping,
};
use crate::error::DecodeError;
use crate::limits::{
    FLAGS_BYTES, MAX_DEPTH, MAX_VALUE_LEN, METADATA_END, NAME_LEN_BYTES, VALUE_LEN_BYTES, WITH_DEFAULTS_MODULE,
    WITH_DEFAULTS_NAME,
};
use crate::schema::{ModuleId, SchemaContext, SchemaId, SchemaKind, Value, ValueCodec, ValueFormat};

/// Options for decoding.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Resolve children of RPCs and actions in their output group.
    pub output: bool,
    /// Turn `ietf-netconf-with-defaults:default="true"` annotations into
    /// [`NodeFlags::DEFAULT`] instead of keeping them as metadata.
    pub absorb_default_metadata: bool,
    /// Maximum nesting depth of data nodes.
    pub max_depth: usize,
    /// Read node hashes precomputed by [`SchemaContext::precompute_hashes`].
    pub cache_node_hashes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            output: false,
            absorb_default_metadata: false,
            max_depth: MAX_DEPTH,
            cache_node_hashes: false,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options for decoding an RPC or action reply.
    pub fn reply() -> Self {
        Self {
            output: true,
            ..Self::default()
        }
    }

    pub fn absorb_default_metadata(mut self, enabled: bool) -> Self {
        self.absorb_default_metadata = enabled;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn cache_node_hashes(mut self, enabled: bool) -> Self {
        self.cache_node_hashes = enabled;
        self
    }
}

/// Decodes a LYB document.
///
/// Returns `None` for an empty document.
pub fn decode(bytes: &[u8], ctx: &SchemaContext, options: &DecodeOptions) -> Result<Option<DataTree>, DecodeError> {
    let mut reader = Reader::new(bytes);
    let header = read_header(&mut reader)?;

    if header.context_hash == 0 {
        if reader.is_empty() {
            return Ok(None);
        }
        let tag = reader.read_byte("node type")?;
        if tag == NodeType::End as u8 {
            return match reader.remaining_len() {
                0 => Ok(None),
                len => Err(DecodeError::TrailingData { len }),
            };
        }
    }
    let expected = ctx.modules_hash();
    if header.context_hash != expected {
        return Err(DecodeError::ContextMismatch {
            expected,
            found: header.context_hash,
        });
    }

    let mut cache = HashTableCache::new(ctx, header.algorithm, options.cache_node_hashes);
    let mut decoder = Decoder {
        ctx,
        options,
        cache: &mut cache,
        reader: &mut reader,
        with_defaults_module: ctx.module_by_name(WITH_DEFAULTS_MODULE),
    };
    let mut tree = DataTree::new();
    decoder.read_siblings(&mut tree, None, 0)?;

    if !reader.is_empty() {
        return Err(DecodeError::TrailingData {
            len: reader.remaining_len(),
        });
    }
    debug!(nodes = tree.len(), hash_tables = cache.len(), "decoded LYB document");
    Ok((!tree.is_empty()).then_some(tree))
}

struct Decoder<'a, 'd, 's> {
    ctx: &'s SchemaContext,
    options: &'a DecodeOptions,
    cache: &'a mut HashTableCache<'s>,
    reader: &'a mut Reader<'d>,
    with_defaults_module: Option<ModuleId>,
}

/// Metadata and flags read in front of a node body.
struct Preamble {
    metadata: Vec<Metadatum>,
    flags: NodeFlags,
}

impl<'d> Decoder<'_, 'd, '_> {
    // =========================================================================
    // Sibling streams
    // =========================================================================

    /// Reads a sibling stream up to its END tag, linking nodes under `parent`.
    fn read_siblings(&mut self, tree: &mut DataTree, parent: Option<NodeId>, depth: usize) -> Result<(), DecodeError> {
        if depth > self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                max: self.options.max_depth,
            });
        }
        let parent_schema = parent.and_then(|p| tree.node(p).schema());

        loop {
            let tag = self.reader.read_byte("node type")?;
            let node_type = NodeType::from_u8(tag).ok_or(DecodeError::InvalidNodeType { tag })?;

            let schema = match node_type {
                NodeType::End => return Ok(()),
                NodeType::Opaque => {
                    self.read_opaque(tree, parent, depth)?;
                    continue;
                }
                NodeType::Ext => {
                    let module = read_module(self.reader, self.ctx)?;
                    let name = self.reader.read_str(NAME_LEN_BYTES, "node name")?;
                    let module_name = self.ctx.module(module).name();
                    self.ctx
                        .find_ext(module_name, name)
                        .ok_or_else(|| DecodeError::UnknownSchemaName {
                            module: module_name.to_string(),
                            name: name.to_string(),
                        })?
                }
                NodeType::Top => {
                    if parent.is_some() {
                        return Err(DecodeError::UnexpectedNodeType {
                            tag,
                            context: "below the top level",
                        });
                    }
                    let module = read_module(self.reader, self.ctx)?;
                    self.resolve(None, module, false)?
                }
                NodeType::Child => {
                    let Some(ps) = parent_schema else {
                        return Err(DecodeError::UnexpectedNodeType {
                            tag,
                            context: "without a schema parent",
                        });
                    };
                    let output = self.ctx.children_in_output(ps, self.options.output);
                    self.resolve(Some(ps), self.ctx.node(ps).module(), output)?
                }
            };
            trace!(node = self.ctx.node(schema).name(), "decoding node");
            self.read_node(tree, parent, schema, depth)?;
        }
    }

    /// Reads a hash chain and resolves it in the group of `parent`.
    fn resolve(&mut self, parent: Option<SchemaId>, module: ModuleId, output: bool) -> Result<SchemaId, DecodeError> {
        let reader = &mut *self.reader;
        let chain = HashChain::read(|| reader.read_byte("schema hash"))?;
        let table = self.cache.group(parent, module, output)?;
        table
            .and_then(|(_, table)| table.resolve(&chain))
            .ok_or_else(|| DecodeError::UnknownSchemaHash {
                hashes: chain.wire_bytes().collect(),
            })
    }

    // =========================================================================
    // Node bodies
    // =========================================================================

    fn read_node(
        &mut self,
        tree: &mut DataTree,
        parent: Option<NodeId>,
        schema: SchemaId,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let ctx = self.ctx;
        match ctx.node(schema).kind() {
            SchemaKind::Leaf(_) => {
                let preamble = self.read_preamble()?;
                let value = self.read_value(schema)?;
                let id = tree.new_term(ctx, schema, value)?;
                self.finish(tree, id, preamble)?;
                tree.insert_child(ctx, parent, id)?;
            }
            SchemaKind::LeafList(_) | SchemaKind::List => self.read_run(tree, parent, schema, depth)?,
            SchemaKind::Container | SchemaKind::Rpc | SchemaKind::Action | SchemaKind::Notification => {
                let preamble = self.read_preamble()?;
                let id = tree.new_inner(ctx, schema)?;
                self.finish(tree, id, preamble)?;
                tree.insert_child(ctx, parent, id)?;
                self.read_siblings(tree, Some(id), depth + 1)?;
            }
            SchemaKind::AnyData | SchemaKind::AnyXml => {
                let preamble = self.read_preamble()?;
                let value = self.read_any(depth)?;
                let id = tree.new_any(ctx, schema, value)?;
                self.finish(tree, id, preamble)?;
                tree.insert_child(ctx, parent, id)?;
            }
            SchemaKind::Choice | SchemaKind::Case | SchemaKind::Input | SchemaKind::Output => {
                return Err(DecodeError::NotInstantiable {
                    name: ctx.node(schema).name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Reads instances of a list or leaf-list up to the run sentinel.
    fn read_run(
        &mut self,
        tree: &mut DataTree,
        parent: Option<NodeId>,
        schema: SchemaId,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let ctx = self.ctx;
        let mut prev: Option<NodeId> = None;
        loop {
            let count = self.reader.read_byte("metadata count")?;
            if count == METADATA_END {
                return Ok(());
            }
            let preamble = self.read_counted_preamble(count)?;

            let id = match ctx.node(schema).kind() {
                SchemaKind::LeafList(_) => {
                    let value = self.read_value(schema)?;
                    tree.new_leaf_list(ctx, schema, value)?
                }
                _ => tree.new_list(ctx, schema)?,
            };
            self.finish(tree, id, preamble)?;
            match prev {
                Some(prev) => tree.insert_sibling(ctx, prev, id)?,
                None => tree.insert_child(ctx, parent, id)?,
            }
            if matches!(tree.node(id).kind(), DataNodeKind::List) {
                self.read_siblings(tree, Some(id), depth + 1)?;
            }
            prev = Some(id);
        }
    }

    fn read_preamble(&mut self) -> Result<Preamble, DecodeError> {
        let count = self.reader.read_byte("metadata count")?;
        if count == METADATA_END {
            return Err(DecodeError::MalformedEncoding {
                context: "run sentinel in place of a metadata count",
            });
        }
        self.read_counted_preamble(count)
    }

    fn read_counted_preamble(&mut self, count: u8) -> Result<Preamble, DecodeError> {
        let mut metadata = Vec::new();
        metadata
            .try_reserve(usize::from(count))
            .map_err(|_| DecodeError::OutOfMemory {
                context: "reading metadata",
            })?;
        let mut absorbed = false;

        for _ in 0..count {
            let module = read_module(self.reader, self.ctx)?;
            let name = self.reader.read_str(NAME_LEN_BYTES, "metadata name")?;
            let value = self.read_long_str("metadata value")?;
            if self.options.absorb_default_metadata
                && Some(module) == self.with_defaults_module
                && name == WITH_DEFAULTS_NAME
                && value == "true"
            {
                absorbed = true;
                continue;
            }
            metadata.push(Metadatum::new(module, name, value));
        }

        let mut flags = self.read_flags()?;
        if absorbed {
            flags.insert(NodeFlags::DEFAULT);
        }
        Ok(Preamble { metadata, flags })
    }

    fn read_flags(&mut self) -> Result<NodeFlags, DecodeError> {
        let bits = self.reader.read_number(FLAGS_BYTES, "node flags")?;
        Ok(NodeFlags::from_bits(bits as u32))
    }

    fn finish(&mut self, tree: &mut DataTree, id: NodeId, preamble: Preamble) -> Result<(), DecodeError> {
        tree.set_flags(id, preamble.flags)?;
        for meta in preamble.metadata {
            tree.add_metadata(id, meta)?;
        }
        Ok(())
    }

    /// Reads an 8-byte length prefixed byte string.
    fn read_long_bytes(&mut self, field: &'static str) -> Result<&'d [u8], DecodeError> {
        let len = self.reader.read_number(VALUE_LEN_BYTES, field)?;
        let max = MAX_VALUE_LEN.min(self.reader.remaining_len() as u64);
        if len > max {
            return Err(DecodeError::LengthExceedsLimit { field, len, max });
        }
        self.reader.read_bytes(len as usize, field)
    }

    fn read_long_str(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let bytes = self.read_long_bytes(field)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    fn read_value(&mut self, schema: SchemaId) -> Result<Value, DecodeError> {
        let ctx = self.ctx;
        let snode = ctx.node(schema);
        let spec = snode.kind().term().ok_or_else(|| DecodeError::NotInstantiable {
            name: snode.name().to_string(),
        })?;
        let data = match spec.ty.lyb_len() {
            Some(len) => self.reader.read_bytes(len, "value")?,
            None => self.read_long_bytes("value")?,
        };
        spec.ty
            .parse(data, ValueFormat::Lyb)
            .map_err(|source| DecodeError::InvalidValue {
                name: snode.name().to_string(),
                source,
            })
    }

    fn read_any(&mut self, depth: usize) -> Result<AnyValue, DecodeError> {
        let byte = self.reader.read_byte("anydata kind")?;
        let kind = AnyKind::from_u8(byte).ok_or(DecodeError::InvalidAnyKind { kind: byte })?;
        let value = match kind {
            AnyKind::DataTree => {
                let mut nested = DataTree::new();
                self.read_siblings(&mut nested, None, depth + 1)?;
                AnyValue::DataTree(Box::new(nested))
            }
            AnyKind::String => AnyValue::String(self.read_long_str("anydata value")?),
            AnyKind::Xml => AnyValue::Xml(self.read_long_str("anydata value")?),
            AnyKind::Json => AnyValue::Json(self.read_long_str("anydata value")?),
        };
        Ok(value)
    }

    // =========================================================================
    // Opaque nodes
    // =========================================================================

    fn read_format(&mut self) -> Result<OpaqueFormat, DecodeError> {
        let format = self.reader.read_byte("opaque format")?;
        OpaqueFormat::from_u8(format).ok_or(DecodeError::InvalidFormat { format })
    }

    fn read_prefixes(&mut self, format: OpaqueFormat) -> Result<Vec<PrefixMapping>, DecodeError> {
        if !format.has_prefixes() {
            return Ok(Vec::new());
        }
        let count = self.reader.read_byte("value prefix count")?;
        let mut prefixes = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let prefix = self.reader.read_optional_string(NAME_LEN_BYTES, "prefix")?;
            let namespace = self.reader.read_str(NAME_LEN_BYTES, "namespace")?.to_string();
            prefixes.push(PrefixMapping { prefix, namespace });
        }
        Ok(prefixes)
    }

    fn read_name(&mut self, what: &'static str) -> Result<OpaqueName, DecodeError> {
        let prefix = self.reader.read_optional_string(NAME_LEN_BYTES, what)?;
        let module_name = self.reader.read_optional_string(NAME_LEN_BYTES, what)?;
        let name = self.reader.read_str(NAME_LEN_BYTES, what)?.to_string();
        Ok(OpaqueName {
            prefix,
            module_name,
            name,
        })
    }

    fn read_opaque(&mut self, tree: &mut DataTree, parent: Option<NodeId>, depth: usize) -> Result<(), DecodeError> {
        let count = self.reader.read_byte("opaque attribute count")?;
        let mut attrs = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let name = self.read_name("attribute name")?;
            let format = self.read_format()?;
            let prefixes = self.read_prefixes(format)?;
            let value = self.read_long_str("attribute value")?;
            attrs.push(OpaqueAttr {
                name,
                value,
                format,
                prefixes,
            });
        }

        let flags = self.read_flags()?;
        let name = self.read_name("opaque name")?;
        let value = self.read_long_str("opaque value")?;
        let format = self.read_format()?;
        let prefixes = self.read_prefixes(format)?;
        trace!(node = %name.name, "decoding opaque node");

        let id = tree.new_opaque(OpaqueNode {
            name,
            value,
            format,
            prefixes,
            attrs,
        });
        tree.set_flags(id, flags)?;
        tree.insert_child(self.ctx, parent, id)?;
        self.read_siblings(tree, Some(id), depth + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode::{EncodeOptions, WithDefaults, encode_to_vec};
    use crate::codec::hash::{HashAlgorithm, node_hash};
    use crate::data::TreeBuilder;
    use crate::error::ErrorClass;
    use crate::schema::{LeafType, TermSpec};

    fn sample() -> SchemaContext {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("t", Some("2020-01-01")).unwrap();
        let top = ctx.add_node(m, None, "top", SchemaKind::Container).unwrap();
        ctx.add_node(m, Some(top), "x", SchemaKind::Leaf(TermSpec::new(LeafType::String)))
            .unwrap();
        let item = ctx.add_node(m, Some(top), "item", SchemaKind::List).unwrap();
        ctx.add_node(m, Some(item), "id", SchemaKind::Leaf(TermSpec::new(LeafType::Uint32)))
            .unwrap();
        ctx
    }

    #[test]
    fn test_empty_documents() {
        let ctx = sample();
        assert_eq!(decode(b"lyb\x14\0\0\0\0", &ctx, &DecodeOptions::new()).unwrap(), None);
        assert_eq!(decode(b"lyb\x14\0\0\0\0\0", &ctx, &DecodeOptions::new()).unwrap(), None);
        assert!(matches!(
            decode(b"lyb\x14\0\0\0\0\0\0", &ctx, &DecodeOptions::new()),
            Err(DecodeError::TrailingData { len: 1 })
        ));
    }

    #[test]
    fn test_roundtrip_nested() {
        let ctx = sample();
        let tree = TreeBuilder::new(&ctx)
            .container("t", "top", |c| {
                c.leaf("x", "hello")
                    .list("item", |i| i.leaf("id", 1u32))
                    .list("item", |i| i.leaf("id", 2u32))
            })
            .build()
            .unwrap();

        let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();
        let decoded = decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_context_mismatch() {
        let ctx = sample();
        let tree = TreeBuilder::new(&ctx).container("t", "top", |c| c).build().unwrap();
        let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();

        let mut other = sample();
        other.add_module("extra", None).unwrap();
        let err = decode(&bytes, &other, &DecodeOptions::new()).unwrap_err();
        assert!(matches!(err, DecodeError::ContextMismatch { .. }));
        assert_eq!(err.class(), ErrorClass::InvalidData);
    }

    #[test]
    fn test_unknown_hash() {
        let ctx = sample();
        let mut bytes = b"lyb\x14".to_vec();
        bytes.extend_from_slice(&ctx.modules_hash().to_le_bytes());
        bytes.push(NodeType::Top as u8);
        bytes.extend_from_slice(&[1, 0, b't', 0, 0]);
        // a depth 0 hash no top-level node of "t" has
        let top_hash = node_hash(HashAlgorithm::OneAtATime, "t", "top", 0);
        bytes.push(if top_hash == 0x80 { 0x81 } else { 0x80 });

        let err = decode(&bytes, &ctx, &DecodeOptions::new()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownSchemaHash { .. }));
    }

    #[test]
    fn test_child_tag_at_top_level() {
        let ctx = sample();
        let mut bytes = b"lyb\x14".to_vec();
        bytes.extend_from_slice(&ctx.modules_hash().to_le_bytes());
        bytes.push(NodeType::Child as u8);
        assert!(matches!(
            decode(&bytes, &ctx, &DecodeOptions::new()),
            Err(DecodeError::UnexpectedNodeType { tag: 4, .. })
        ));

        let mut bytes = bytes[..8].to_vec();
        bytes.push(9);
        assert!(matches!(
            decode(&bytes, &ctx, &DecodeOptions::new()),
            Err(DecodeError::InvalidNodeType { tag: 9 })
        ));
    }

    #[test]
    fn test_truncated_document() {
        let ctx = sample();
        let tree = TreeBuilder::new(&ctx)
            .container("t", "top", |c| c.leaf("x", "value"))
            .build()
            .unwrap();
        let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();
        for len in 8..bytes.len() {
            let err = decode(&bytes[..len], &ctx, &DecodeOptions::new()).unwrap_err();
            assert_eq!(err.class(), ErrorClass::InvalidData, "prefix of {} bytes", len);
        }
    }

    #[test]
    fn test_depth_limit() {
        let ctx = sample();
        let tree = TreeBuilder::new(&ctx)
            .container("t", "top", |c| c.list("item", |i| i.leaf("id", 7u32)))
            .build()
            .unwrap();
        let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();

        assert!(decode(&bytes, &ctx, &DecodeOptions::new().max_depth(2)).is_ok());
        assert!(matches!(
            decode(&bytes, &ctx, &DecodeOptions::new().max_depth(1)),
            Err(DecodeError::DepthExceeded { max: 1 })
        ));
    }

    #[test]
    fn test_absorb_default_metadata() {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("t", None).unwrap();
        let spec = TermSpec::new(LeafType::Uint8).with_default(Value::Uint8(5));
        ctx.add_node(m, None, "x", SchemaKind::Leaf(spec)).unwrap();
        ctx.add_module(WITH_DEFAULTS_MODULE, None).unwrap();
        let tree = TreeBuilder::new(&ctx).leaf("t", "x", 5u8).build().unwrap();

        let options = EncodeOptions::new().defaults(WithDefaults::AllTagged);
        let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &options).unwrap();

        let kept = decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap();
        let node = kept.node(kept.first_root().unwrap());
        assert_eq!(node.metadata().len(), 1);
        assert_eq!(node.metadata()[0].name, "default");
        assert!(!node.flags().contains(NodeFlags::DEFAULT));

        let absorbed = decode(&bytes, &ctx, &DecodeOptions::new().absorb_default_metadata(true))
            .unwrap()
            .unwrap();
        let node = absorbed.node(absorbed.first_root().unwrap());
        assert!(node.metadata().is_empty());
        assert!(node.flags().contains(NodeFlags::DEFAULT));
    }
}
