//! End-to-end encode/decode tests against a small inventory schema.

use std::borrow::Cow;
use std::sync::Arc;

use lyb::codec::{HashTableCache, NodeType};
use lyb::data::{AnyValue, OpaqueAttr, OpaqueFormat, OpaqueName, OpaqueNode, PrefixMapping};
use lyb::schema::{BitMember, ValueError, ValueFormat};
use lyb::{
    DataNodeKind, DataTree, DecodeError, DecodeOptions, EncodeError, EncodeOptions, ErrorClass, HashAlgorithm,
    LeafType, NodeFlags, SchemaContext, SchemaKind, TermSpec, TreeBuilder, Value, ValueCodec, WithDefaults, decode,
    encode, encode_to_vec,
};

const MODULE: &str = "lyb-test";
const WITH_DEFAULTS: &str = "ietf-netconf-with-defaults";

/// Prints three bytes while claiming a fixed length of four.
#[derive(Debug)]
struct ShortCodec;

impl ValueCodec for ShortCodec {
    fn type_name(&self) -> &'static str {
        "short"
    }

    fn lyb_len(&self) -> Option<usize> {
        Some(4)
    }

    fn print<'v>(&self, _value: &'v Value, _format: ValueFormat) -> Result<Cow<'v, [u8]>, ValueError> {
        Ok(Cow::Owned(vec![1, 2, 3]))
    }

    fn parse(&self, _data: &[u8], _format: ValueFormat) -> Result<Value, ValueError> {
        Err(ValueError::new("short", "not parseable"))
    }
}

fn context() -> SchemaContext {
    let mut ctx = SchemaContext::new();
    let m = ctx.add_module(MODULE, Some("2020-01-01")).unwrap();
    ctx.add_node(m, None, "x", SchemaKind::Leaf(TermSpec::new(LeafType::String)))
        .unwrap();

    let cont = ctx.add_node(m, None, "cont", SchemaKind::Container).unwrap();
    let ll = TermSpec::new(LeafType::Uint8)
        .with_default(Value::Uint8(1))
        .with_default(Value::Uint8(2));
    ctx.add_node(m, Some(cont), "ll", SchemaKind::LeafList(ll)).unwrap();
    ctx.add_node(m, Some(cont), "name", SchemaKind::Leaf(TermSpec::new(LeafType::String)))
        .unwrap();

    let item = ctx.add_node(m, None, "item", SchemaKind::List).unwrap();
    ctx.add_node(m, Some(item), "id", SchemaKind::Leaf(TermSpec::new(LeafType::Uint32)))
        .unwrap();
    let enabled = TermSpec::new(LeafType::Boolean).with_default(Value::Bool(true));
    ctx.add_node(m, Some(item), "enabled", SchemaKind::Leaf(enabled)).unwrap();

    ctx.add_node(m, None, "any", SchemaKind::AnyData).unwrap();
    ctx.add_node(m, None, "blob", SchemaKind::Leaf(TermSpec::new(LeafType::Custom(Arc::new(ShortCodec)))))
        .unwrap();

    let reset = ctx.add_node(m, None, "reset", SchemaKind::Rpc).unwrap();
    let input = ctx.add_node(m, Some(reset), "input", SchemaKind::Input).unwrap();
    ctx.add_node(m, Some(input), "delay", SchemaKind::Leaf(TermSpec::new(LeafType::Uint32)))
        .unwrap();
    let output = ctx.add_node(m, Some(reset), "output", SchemaKind::Output).unwrap();
    ctx.add_node(m, Some(output), "status", SchemaKind::Leaf(TermSpec::new(LeafType::String)))
        .unwrap();

    let mounted = ctx.add_ext_node(m, "mounted", SchemaKind::Container).unwrap();
    ctx.add_node(m, Some(mounted), "v", SchemaKind::Leaf(TermSpec::new(LeafType::Int16)))
        .unwrap();

    let other = ctx.add_module("lyb-other", None).unwrap();
    ctx.add_node(other, None, "other", SchemaKind::Container).unwrap();

    ctx.add_module(WITH_DEFAULTS, Some("2011-06-01")).unwrap();
    ctx
}

fn roundtrip(ctx: &SchemaContext, tree: &DataTree, options: &EncodeOptions) -> DataTree {
    let bytes = encode_to_vec(ctx, tree, tree.first_root(), options).unwrap();
    decode(&bytes, ctx, &DecodeOptions::new()).unwrap().unwrap()
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[test]
fn test_empty_document() {
    let ctx = context();
    let mut sink = Vec::new();
    encode(&mut sink, &ctx, &DataTree::new(), None, &EncodeOptions::new()).unwrap();
    assert_eq!(sink, b"lyb\x14\0\0\0\0");
    assert_eq!(decode(&sink, &ctx, &DecodeOptions::new()).unwrap(), None);
}

#[test]
fn test_single_leaf_exact_bytes() {
    let mut ctx = SchemaContext::new();
    let m = ctx.add_module(MODULE, Some("2020-01-01")).unwrap();
    ctx.add_node(m, None, "x", SchemaKind::Leaf(TermSpec::new(LeafType::String)))
        .unwrap();
    let tree = TreeBuilder::new(&ctx).leaf(MODULE, "x", "x").build().unwrap();

    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();
    let mut expected = vec![b'l', b'y', b'b', 0x14, 0x76, 0x42, 0x15, 0xB6];
    expected.push(NodeType::Top as u8);
    expected.extend_from_slice(&[8, 0]);
    expected.extend_from_slice(b"lyb-test");
    expected.extend_from_slice(&[0x21, 0x28, 0x9C]);
    expected.extend_from_slice(&[0, 0, 0, 0, 0]);
    expected.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0, b'x']);
    expected.push(NodeType::End as u8);
    assert_eq!(bytes, expected);

    let decoded = decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap();
    assert_eq!(decoded, tree);
    let root = decoded.node(decoded.first_root().unwrap());
    assert_eq!(root.value(), Some(&Value::String("x".to_string())));
}

#[test]
fn test_list_defaults_all_tagged() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .list(MODULE, "item", |i| i.leaf("id", 1u32).leaf("enabled", true))
        .list(MODULE, "item", |i| i.leaf("id", 2u32).leaf("enabled", false))
        .list(MODULE, "item", |i| i.leaf("id", 3u32).leaf("enabled", true))
        .build()
        .unwrap();

    let options = EncodeOptions::new().defaults(WithDefaults::AllTagged);
    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &options).unwrap();
    assert_eq!(count(&bytes, WITH_DEFAULTS.as_bytes()), 2);
    // one run: the list header once, a single run sentinel before the END
    assert_eq!(count(&bytes, b"lyb-test"), 1);
    assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0x00]);

    let decoded = decode(&bytes, &ctx, &DecodeOptions::new().absorb_default_metadata(true))
        .unwrap()
        .unwrap();
    let items: Vec<_> = decoded.roots().collect();
    assert_eq!(items.len(), 3);
    let defaults: Vec<bool> = items
        .iter()
        .map(|&item| {
            let enabled = decoded.children(item).nth(1).unwrap();
            decoded.node(enabled).flags().contains(NodeFlags::DEFAULT)
        })
        .collect();
    assert_eq!(defaults, [true, false, true]);

    // without tagging the stream carries no annotation
    let plain = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();
    assert_eq!(count(&plain, WITH_DEFAULTS.as_bytes()), 0);
    assert!(plain.len() < bytes.len());
}

#[test]
fn test_interleaved_leaf_list_defaults() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .container(MODULE, "cont", |c| {
            c.default_leaf_list("ll", 1u8)
                .leaf_list("ll", 7u8)
                .leaf_list("ll", 2u8)
                .leaf("name", "n")
        })
        .build()
        .unwrap();

    let tagged = |mode| {
        let options = EncodeOptions::new().defaults(mode);
        let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &options).unwrap();
        let decoded = decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap();
        let cont = decoded.first_root().unwrap();
        decoded
            .children(cont)
            .filter_map(|id| {
                let node = decoded.node(id);
                match node.kind() {
                    DataNodeKind::LeafList(Value::Uint8(v)) => Some((*v, node.metadata().len())),
                    _ => None,
                }
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(tagged(WithDefaults::AllTagged), [(1, 1), (7, 0), (2, 1)]);
    assert_eq!(tagged(WithDefaults::ImplicitTagged), [(1, 1), (7, 0), (2, 0)]);
    assert_eq!(tagged(WithDefaults::Trim), [(1, 0), (7, 0), (2, 0)]);
}

#[test]
fn test_non_top_level_root_writes_nothing() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .container(MODULE, "cont", |c| c.leaf("name", "n"))
        .build()
        .unwrap();
    let name = tree.children(tree.first_root().unwrap()).next().unwrap();

    let mut sink = Vec::new();
    let err = encode(&mut sink, &ctx, &tree, Some(name), &EncodeOptions::with_siblings()).unwrap_err();
    assert!(matches!(err, EncodeError::NotTopLevel { .. }));
    assert_eq!(err.class(), ErrorClass::InvalidArgument);
    assert_eq!(err.class().code(), "EINVAL");
    assert!(sink.is_empty());
}

#[test]
fn test_fixed_length_mismatch_writes_nothing() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .leaf(MODULE, "x", "before")
        .leaf(MODULE, "blob", Value::Binary(vec![0]))
        .build()
        .unwrap();

    let mut sink = Vec::new();
    let err = encode(&mut sink, &ctx, &tree, tree.first_root(), &EncodeOptions::with_siblings()).unwrap_err();
    assert!(matches!(
        err,
        EncodeError::FixedLengthMismatch { type_name: "short", expected: 4, actual: 3 }
    ));
    assert_eq!(err.class(), ErrorClass::Internal);
    assert!(sink.is_empty());
}

#[test]
fn test_over_wide_name_writes_nothing() {
    let ctx = context();
    let long = "n".repeat(70_000);
    let tree = TreeBuilder::new(&ctx)
        .container(MODULE, "cont", |c| c.meta(MODULE, &long, "v"))
        .build()
        .unwrap();

    let mut sink = Vec::new();
    let err = encode(&mut sink, &ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap_err();
    assert!(matches!(err, EncodeError::LengthExceedsWidth { len: 70_000, max: 65_535, .. }));
    assert_eq!(err.class().code(), "EINT");
    assert!(sink.is_empty());
}

#[test]
fn test_siblings_across_modules() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .leaf(MODULE, "x", "a")
        .container("lyb-other", "other", |c| c)
        .container(MODULE, "cont", |c| c.leaf("name", "b"))
        .build()
        .unwrap();

    let decoded = roundtrip(&ctx, &tree, &EncodeOptions::with_siblings());
    assert_eq!(decoded, tree);

    // a single subtree stops after the first root
    let single = roundtrip(&ctx, &tree, &EncodeOptions::new());
    assert_eq!(single.roots().count(), 1);
}

#[test]
fn test_anydata_values() {
    let ctx = context();
    let inner = TreeBuilder::new(&ctx).leaf(MODULE, "x", "nested").build().unwrap();
    let inner_bytes = encode_to_vec(&ctx, &inner, inner.first_root(), &EncodeOptions::new()).unwrap();

    for (value, expected) in [
        (AnyValue::DataTree(Box::new(inner.clone())), AnyValue::DataTree(Box::new(inner.clone()))),
        (AnyValue::Lyb(inner_bytes), AnyValue::DataTree(Box::new(inner.clone()))),
        (AnyValue::Json("{\"a\":1}".to_string()), AnyValue::Json("{\"a\":1}".to_string())),
        (AnyValue::Xml("<a/>".to_string()), AnyValue::Xml("<a/>".to_string())),
        (AnyValue::String("text".to_string()), AnyValue::String("text".to_string())),
    ] {
        let tree = TreeBuilder::new(&ctx).any(MODULE, "any", value).build().unwrap();
        let decoded = roundtrip(&ctx, &tree, &EncodeOptions::new());
        let node = decoded.node(decoded.first_root().unwrap());
        assert_eq!(node.kind(), &DataNodeKind::Any(expected));
    }
}

#[test]
fn test_nested_tree_root_must_be_top_level() {
    let ctx = context();
    let cont = ctx.find(MODULE, &["cont"]).unwrap();
    let name = ctx.find(MODULE, &["cont", "name"]).unwrap();

    // a leaf of cont linked as a root of the nested tree
    let mut inner = DataTree::new();
    let leaf = inner.new_term(&ctx, name, "n").unwrap();
    inner.insert_child(&ctx, None, leaf).unwrap();
    let tree = TreeBuilder::new(&ctx)
        .any(MODULE, "any", AnyValue::DataTree(Box::new(inner)))
        .build()
        .unwrap();

    let mut sink = Vec::new();
    let err = encode(&mut sink, &ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap_err();
    assert!(matches!(err, EncodeError::NotTopLevel { ref name } if name == "name"));
    assert!(sink.is_empty());

    // the same leaf under its container is fine
    let mut inner = DataTree::new();
    let parent = inner.new_inner(&ctx, cont).unwrap();
    inner.insert_child(&ctx, None, parent).unwrap();
    let leaf = inner.new_term(&ctx, name, "n").unwrap();
    inner.insert_child(&ctx, Some(parent), leaf).unwrap();
    let tree = TreeBuilder::new(&ctx)
        .any(MODULE, "any", AnyValue::DataTree(Box::new(inner)))
        .build()
        .unwrap();
    assert_eq!(roundtrip(&ctx, &tree, &EncodeOptions::new()), tree);
}

fn items<'s>(builder: TreeBuilder<'s>, ids: [u32; 2]) -> TreeBuilder<'s> {
    builder
        .list(MODULE, "item", |i| i.leaf("id", ids[0]).leaf("enabled", true))
        .list(MODULE, "item", |i| i.leaf("id", ids[1]).leaf("enabled", false))
}

#[test]
fn test_hash_chains_stable_within_document() {
    let ctx = context();
    // the second run lives in a nested document of the anydata value
    let inner = items(TreeBuilder::new(&ctx), [30, 40]).build().unwrap();
    let tree = items(TreeBuilder::new(&ctx), [10, 20])
        .container(MODULE, "cont", |c| c.leaf("name", "n"))
        .any(MODULE, "any", AnyValue::DataTree(Box::new(inner)))
        .build()
        .unwrap();
    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::with_siblings()).unwrap();

    let mut cache = HashTableCache::new(&ctx, HashAlgorithm::OneAtATime, false);
    let mut header = |path: &[&str], tag: NodeType| {
        let schema = ctx.find(MODULE, path).unwrap();
        let (_, table) = cache.group_of(schema).unwrap().unwrap();
        let mut bytes = vec![tag as u8];
        bytes.extend(table.find(schema).unwrap().wire_bytes());
        bytes
    };
    let id = header(&["item", "id"], NodeType::Child);
    let enabled = header(&["item", "enabled"], NodeType::Child);
    let name = header(&["cont", "name"], NodeType::Child);
    let item = header(&["item"], NodeType::Top);

    // every instance is followed by an empty metadata block
    let with_meta = |header: &[u8]| [header, &[0u8][..]].concat();
    assert_eq!(count(&bytes, &with_meta(&id[..])), 4);
    assert_eq!(count(&bytes, &with_meta(&enabled[..])), 4);
    assert_eq!(count(&bytes, &with_meta(&name[..])), 1);
    // one TOP header per run, each with the module record before the chain
    let module_record = [&[8u8, 0][..], &b"lyb-test"[..], &[0x21u8, 0x28][..]].concat();
    let item_header = [&item[..1], &module_record[..], &item[1..]].concat();
    assert_eq!(count(&bytes, &item_header), 2);

    assert_eq!(decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap(), tree);
}

#[test]
fn test_derived_types_roundtrip() {
    let mut ctx = SchemaContext::new();
    let m = ctx.add_module("types", None).unwrap();
    let leaf = |ty| SchemaKind::Leaf(TermSpec::new(ty));
    let port = ctx.add_node(m, None, "port", SchemaKind::Container).unwrap();
    let bits = LeafType::Bits(vec![BitMember::new("up", 0), BitMember::new("lacp", 12)]);
    ctx.add_node(m, Some(port), "state", leaf(bits)).unwrap();
    ctx.add_node(m, Some(port), "kind", leaf(LeafType::IdentityRef(vec![]))).unwrap();
    ctx.add_node(m, Some(port), "peer", leaf(LeafType::InstanceIdentifier)).unwrap();
    let mtu = LeafType::Union(vec![LeafType::Uint16, LeafType::Enumeration(vec![lyb::schema::EnumMember::new("auto", 0)])]);
    ctx.add_node(m, Some(port), "mtu", leaf(mtu)).unwrap();
    ctx.add_node(m, Some(port), "index", leaf(LeafType::LeafRef(Box::new(LeafType::Uint32)))).unwrap();

    let tree = TreeBuilder::new(&ctx)
        .container("types", "port", |p| {
            p.leaf("state", Value::Bits(vec!["up".to_string(), "lacp".to_string()]))
                .leaf("kind", Value::IdentityRef("iana-if-type:ethernetCsmacd".to_string()))
                .leaf("peer", Value::InstanceIdentifier("/types:port".to_string()))
                .leaf("mtu", Value::Union("auto".to_string()))
                .leaf("index", 7u32)
        })
        .build()
        .unwrap();

    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();
    // bits 0 and 12 packed into two bytes, no length prefix
    assert_eq!(count(&bytes, &[0, 0, 0, 0, 0x01, 0x10]), 1);
    assert_eq!(decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap(), tree);
}

#[test]
fn test_opaque_roundtrip() {
    let ctx = context();
    let mut root = OpaqueNode::new(
        OpaqueName::new("config").with_prefix("c").with_module("urn:c"),
        OpaqueFormat::Xml,
    );
    root.prefixes.push(PrefixMapping {
        prefix: Some("c".to_string()),
        namespace: "urn:c".to_string(),
    });
    root.attrs.push(OpaqueAttr {
        name: OpaqueName::new("op").with_module("ietf-netconf"),
        value: "merge".to_string(),
        format: OpaqueFormat::Json,
        prefixes: Vec::new(),
    });
    let child = OpaqueNode::new(OpaqueName::new("leaf"), OpaqueFormat::Json).with_value("42");

    let tree = TreeBuilder::new(&ctx)
        .opaque(root, |o| o.opaque(child, |c| c))
        .build()
        .unwrap();
    assert_eq!(roundtrip(&ctx, &tree, &EncodeOptions::new()), tree);
}

#[test]
fn test_extension_root() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .ext(MODULE, "mounted", DataNodeKind::Inner, |m| m.leaf("v", -5i16))
        .build()
        .unwrap();

    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();
    assert_eq!(bytes[8], NodeType::Ext as u8);
    assert_eq!(count(&bytes, b"mounted"), 1);

    let decoded = decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap();
    assert_eq!(decoded, tree);
    assert!(decoded.node(decoded.first_root().unwrap()).flags().contains(NodeFlags::EXT));
}

#[test]
fn test_rpc_reply() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .container(MODULE, "reset", |r| r.leaf("status", "done"))
        .build()
        .unwrap();
    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();

    let decoded = decode(&bytes, &ctx, &DecodeOptions::reply()).unwrap().unwrap();
    assert_eq!(decoded, tree);

    // resolved against the input group the hash is unknown
    assert!(matches!(
        decode(&bytes, &ctx, &DecodeOptions::new()),
        Err(DecodeError::UnknownSchemaHash { .. })
    ));
}

#[test]
fn test_xxh3_algorithm() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .container(MODULE, "cont", |c| c.leaf_list("ll", 9u8).leaf("name", "n"))
        .build()
        .unwrap();

    let options = EncodeOptions::new().hash_algorithm(HashAlgorithm::Xxh3);
    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &options).unwrap();
    assert_eq!(bytes[3], 0x24);
    assert_eq!(decode(&bytes, &ctx, &DecodeOptions::new()).unwrap().unwrap(), tree);
}

#[test]
fn test_precomputed_hashes_match() {
    let mut ctx = context();
    let tree = TreeBuilder::new(&ctx)
        .list(MODULE, "item", |i| i.leaf("id", 10u32))
        .build()
        .unwrap();
    let plain = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();

    ctx.precompute_hashes(HashAlgorithm::OneAtATime);
    let cached = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new().cache_node_hashes(true)).unwrap();
    assert_eq!(plain, cached);
    assert_eq!(
        decode(&cached, &ctx, &DecodeOptions::new().cache_node_hashes(true)).unwrap().unwrap(),
        tree
    );
}

#[test]
fn test_context_mismatch() {
    let ctx = context();
    let tree = TreeBuilder::new(&ctx).leaf(MODULE, "x", "v").build().unwrap();
    let bytes = encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).unwrap();

    let mut other = context();
    let m = other.module_by_name(MODULE).unwrap();
    other.enable_feature(m, "extra");
    let err = decode(&bytes, &other, &DecodeOptions::new()).unwrap_err();
    assert!(matches!(err, DecodeError::ContextMismatch { .. }));
    assert_eq!(err.class().code(), "EVALID");
}
