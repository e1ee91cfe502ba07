//! In-memory data trees.
//!
//! A [`DataTree`] is an arena of [`DataNode`]s addressed by [`NodeId`]. Nodes
//! are created unlinked with the `new_*` constructors and then placed with
//! [`DataTree::insert_child`] or [`DataTree::insert_sibling`]. Instances of one
//! list or leaf-list are always kept next to each other.

pub mod builder;

pub use builder::{NodeBuilder, TreeBuilder};

use crate::error::DataError;
use crate::schema::{ModuleId, SchemaContext, SchemaId, SchemaKind, Value, ValueCodec};

/// Index of a node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Data node flags, written as 4 bytes little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeFlags(u32);

impl NodeFlags {
    /// Node was created as an implicit default.
    pub const DEFAULT: NodeFlags = NodeFlags(0x01);
    /// `when` condition evaluated to true.
    pub const WHEN_TRUE: NodeFlags = NodeFlags(0x02);
    /// Node was not validated yet.
    pub const NEW: NodeFlags = NodeFlags(0x04);
    /// Node is the root of an extension instance.
    pub const EXT: NodeFlags = NodeFlags(0x08);

    pub const fn empty() -> Self {
        NodeFlags(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        NodeFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: NodeFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: NodeFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = NodeFlags;

    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | rhs.0)
    }
}

/// An annotation attached to a data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadatum {
    pub module: ModuleId,
    pub name: String,
    /// Canonical value.
    pub value: String,
}

impl Metadatum {
    pub fn new(module: ModuleId, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            module,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Value of an anydata or anyxml node.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyValue {
    /// Structured data, a tree of top-level nodes.
    DataTree(Box<DataTree>),
    String(String),
    Xml(String),
    Json(String),
    /// An LYB document of the same context, expanded when encoding.
    Lyb(Vec<u8>),
}

/// Anydata value kinds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnyKind {
    DataTree = 0,
    String = 1,
    Xml = 2,
    Json = 3,
}

impl AnyKind {
    /// Creates an AnyKind from its wire representation.
    pub fn from_u8(v: u8) -> Option<AnyKind> {
        match v {
            0 => Some(AnyKind::DataTree),
            1 => Some(AnyKind::String),
            2 => Some(AnyKind::Xml),
            3 => Some(AnyKind::Json),
            _ => None,
        }
    }
}

/// Format an opaque node or attribute was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpaqueFormat {
    Xml = 0,
    Json = 1,
    Lyb = 2,
}

impl OpaqueFormat {
    /// Creates an OpaqueFormat from its wire representation.
    pub fn from_u8(v: u8) -> Option<OpaqueFormat> {
        match v {
            0 => Some(OpaqueFormat::Xml),
            1 => Some(OpaqueFormat::Json),
            2 => Some(OpaqueFormat::Lyb),
            _ => None,
        }
    }

    /// Only XML values reference namespaces through prefixes.
    pub fn has_prefixes(self) -> bool {
        self == OpaqueFormat::Xml
    }
}

/// Literal identity of an opaque node or attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpaqueName {
    pub prefix: Option<String>,
    /// Module name (JSON) or namespace (XML).
    pub module_name: Option<String>,
    pub name: String,
}

impl OpaqueName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            module_name: None,
            name: name.into(),
        }
    }

    pub fn with_module(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// A prefix used inside an XML value and the namespace it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMapping {
    pub prefix: Option<String>,
    pub namespace: String,
}

/// An attribute of an opaque node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueAttr {
    pub name: OpaqueName,
    pub value: String,
    pub format: OpaqueFormat,
    pub prefixes: Vec<PrefixMapping>,
}

/// A node without schema, carrying its identity literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueNode {
    pub name: OpaqueName,
    pub value: String,
    pub format: OpaqueFormat,
    pub prefixes: Vec<PrefixMapping>,
    pub attrs: Vec<OpaqueAttr>,
}

impl OpaqueNode {
    pub fn new(name: OpaqueName, format: OpaqueFormat) -> Self {
        Self {
            name,
            value: String::new(),
            format,
            prefixes: Vec::new(),
            attrs: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

/// Payload of a data node by node category.
#[derive(Debug, Clone, PartialEq)]
pub enum DataNodeKind {
    /// Container, RPC, action or notification.
    Inner,
    /// Leaf.
    Term(Value),
    /// One list instance.
    List,
    /// One leaf-list instance.
    LeafList(Value),
    /// Anydata or anyxml.
    Any(AnyValue),
    Opaque(Box<OpaqueNode>),
}

impl DataNodeKind {
    /// Term value of a leaf or leaf-list instance.
    pub fn value(&self) -> Option<&Value> {
        match self {
            DataNodeKind::Term(v) | DataNodeKind::LeafList(v) => Some(v),
            _ => None,
        }
    }
}

/// A node of a data tree.
#[derive(Debug, Clone)]
pub struct DataNode {
    schema: Option<SchemaId>,
    kind: DataNodeKind,
    flags: NodeFlags,
    metadata: Vec<Metadatum>,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    next: Option<NodeId>,
    prev: Option<NodeId>,
    linked: bool,
}

impl DataNode {
    /// Schema node, `None` for opaque nodes.
    pub fn schema(&self) -> Option<SchemaId> {
        self.schema
    }

    pub fn kind(&self) -> &DataNodeKind {
        &self.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.kind.value()
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn metadata(&self) -> &[Metadatum] {
        &self.metadata
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.kind, DataNodeKind::Opaque(_))
    }
}

/// Arena of data nodes with a list of root siblings.
#[derive(Debug, Clone, Default)]
pub struct DataTree {
    nodes: Vec<DataNode>,
    first_root: Option<NodeId>,
    last_root: Option<NodeId>,
}

impl DataTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena, linked or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &DataNode {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&DataNode> {
        self.nodes.get(id.index())
    }

    pub fn first_root(&self) -> Option<NodeId> {
        self.first_root
    }

    /// Root siblings in order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.siblings_from(self.first_root)
    }

    /// Children of a node in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.siblings_from(self.node(id).first_child)
    }

    /// A node and its following siblings.
    pub fn siblings_from(&self, first: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(first, move |&id| self.node(id).next)
    }

    // =========================================================================
    // Node creation
    // =========================================================================

    /// Creates an unlinked schema-bound node, checking its kind against the schema.
    pub fn new_node(
        &mut self,
        ctx: &SchemaContext,
        schema: SchemaId,
        kind: DataNodeKind,
    ) -> Result<NodeId, DataError> {
        let snode = ctx.node(schema);
        let name = || snode.name().to_string();

        let expected = match (snode.kind(), &kind) {
            (SchemaKind::Choice | SchemaKind::Case | SchemaKind::Input | SchemaKind::Output, _) => {
                return Err(DataError::NotInstantiable {
                    name: name(),
                    kind: snode.kind().keyword(),
                });
            }
            (
                SchemaKind::Container | SchemaKind::Rpc | SchemaKind::Action | SchemaKind::Notification,
                DataNodeKind::Inner,
            )
            | (SchemaKind::List, DataNodeKind::List)
            | (SchemaKind::AnyData | SchemaKind::AnyXml, DataNodeKind::Any(_)) => None,
            (SchemaKind::Leaf(spec), DataNodeKind::Term(value))
            | (SchemaKind::LeafList(spec), DataNodeKind::LeafList(value)) => {
                spec.ty
                    .check(value)
                    .map_err(|source| DataError::InvalidValue { name: name(), source })?;
                None
            }
            (other, _) => Some(other.keyword()),
        };
        if let Some(expected) = expected {
            return Err(DataError::KindMismatch {
                name: name(),
                expected,
            });
        }

        let mut flags = NodeFlags::empty();
        if snode.is_ext_root() {
            flags.insert(NodeFlags::EXT);
        }
        Ok(self.push(Some(schema), kind, flags))
    }

    /// Creates an unlinked container, RPC, action or notification node.
    pub fn new_inner(&mut self, ctx: &SchemaContext, schema: SchemaId) -> Result<NodeId, DataError> {
        self.new_node(ctx, schema, DataNodeKind::Inner)
    }

    /// Creates an unlinked leaf.
    pub fn new_term(
        &mut self,
        ctx: &SchemaContext,
        schema: SchemaId,
        value: impl Into<Value>,
    ) -> Result<NodeId, DataError> {
        self.new_node(ctx, schema, DataNodeKind::Term(value.into()))
    }

    /// Creates an unlinked list instance.
    pub fn new_list(&mut self, ctx: &SchemaContext, schema: SchemaId) -> Result<NodeId, DataError> {
        self.new_node(ctx, schema, DataNodeKind::List)
    }

    /// Creates an unlinked leaf-list instance.
    pub fn new_leaf_list(
        &mut self,
        ctx: &SchemaContext,
        schema: SchemaId,
        value: impl Into<Value>,
    ) -> Result<NodeId, DataError> {
        self.new_node(ctx, schema, DataNodeKind::LeafList(value.into()))
    }

    /// Creates an unlinked anydata or anyxml node.
    pub fn new_any(&mut self, ctx: &SchemaContext, schema: SchemaId, value: AnyValue) -> Result<NodeId, DataError> {
        self.new_node(ctx, schema, DataNodeKind::Any(value))
    }

    /// Creates an unlinked opaque node.
    pub fn new_opaque(&mut self, opaque: OpaqueNode) -> NodeId {
        self.push(None, DataNodeKind::Opaque(Box::new(opaque)), NodeFlags::empty())
    }

    fn push(&mut self, schema: Option<SchemaId>, kind: DataNodeKind, flags: NodeFlags) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(DataNode {
            schema,
            kind,
            flags,
            metadata: Vec::new(),
            parent: None,
            first_child: None,
            last_child: None,
            next: None,
            prev: None,
            linked: false,
        });
        id
    }

    fn check(&self, id: NodeId) -> Result<(), DataError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(DataError::UnknownNode { index: id.index() })
        }
    }

    // =========================================================================
    // Node attributes
    // =========================================================================

    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) -> Result<(), DataError> {
        self.check(id)?;
        self.nodes[id.index()].flags = flags;
        Ok(())
    }

    pub fn add_flags(&mut self, id: NodeId, flags: NodeFlags) -> Result<(), DataError> {
        self.check(id)?;
        self.nodes[id.index()].flags.insert(flags);
        Ok(())
    }

    pub fn add_metadata(&mut self, id: NodeId, meta: Metadatum) -> Result<(), DataError> {
        self.check(id)?;
        self.nodes[id.index()].metadata.push(meta);
        Ok(())
    }

    // =========================================================================
    // Linking
    // =========================================================================

    /// Appends `child` to the children of `parent`, or to the roots for `None`.
    ///
    /// A list or leaf-list instance is placed right after the last existing
    /// instance of the same schema node.
    pub fn insert_child(
        &mut self,
        ctx: &SchemaContext,
        parent: Option<NodeId>,
        child: NodeId,
    ) -> Result<(), DataError> {
        self.check(child)?;
        if self.node(child).linked {
            return Err(DataError::AlreadyLinked { index: child.index() });
        }
        if let Some(parent) = parent {
            self.check(parent)?;
            self.check_parent(ctx, parent, child)?;
        }

        let (first, last) = match parent {
            Some(p) => (self.node(p).first_child, self.node(p).last_child),
            None => (self.first_root, self.last_root),
        };
        let anchor = match (self.node(child).schema, self.node(child).kind()) {
            // appending to the run at the end needs no scan
            (Some(schema), DataNodeKind::List | DataNodeKind::LeafList(_))
                if last.is_some_and(|l| self.node(l).schema == Some(schema)) =>
            {
                last
            }
            (Some(schema), DataNodeKind::List | DataNodeKind::LeafList(_)) => self
                .siblings_from(first)
                .filter(|&id| self.node(id).schema == Some(schema))
                .last(),
            _ => None,
        };

        match anchor.or(last) {
            Some(anchor) => self.link_after(parent, anchor, child),
            None => {
                self.set_first(parent, Some(child));
                self.set_last(parent, Some(child));
                let node = &mut self.nodes[child.index()];
                node.parent = parent;
                node.linked = true;
            }
        }
        Ok(())
    }

    /// Inserts `node` right after `sibling`, under the same parent.
    pub fn insert_sibling(&mut self, ctx: &SchemaContext, sibling: NodeId, node: NodeId) -> Result<(), DataError> {
        self.check(sibling)?;
        self.check(node)?;
        if self.node(node).linked {
            return Err(DataError::AlreadyLinked { index: node.index() });
        }
        if !self.node(sibling).linked {
            return Err(DataError::UnknownNode { index: sibling.index() });
        }
        let parent = self.node(sibling).parent;
        if let Some(parent) = parent {
            self.check_parent(ctx, parent, node)?;
        }
        self.link_after(parent, sibling, node);
        Ok(())
    }

    fn check_parent(&self, ctx: &SchemaContext, parent: NodeId, child: NodeId) -> Result<(), DataError> {
        let pnode = self.node(parent);
        let cnode = self.node(child);
        let display = |n: &DataNode| match (&n.kind, n.schema) {
            (DataNodeKind::Opaque(op), _) => op.name.name.clone(),
            (_, Some(s)) => ctx.node(s).name().to_string(),
            (_, None) => String::new(),
        };

        if pnode.is_opaque() {
            if !cnode.is_opaque() {
                return Err(DataError::OpaqueParent { parent: display(pnode) });
            }
            return Ok(());
        }
        if matches!(
            pnode.kind,
            DataNodeKind::Term(_) | DataNodeKind::LeafList(_) | DataNodeKind::Any(_)
        ) {
            return Err(DataError::ParentMismatch {
                child: display(cnode),
                parent: display(pnode),
            });
        }
        match cnode.schema {
            // extension instance data may be placed anywhere
            Some(schema) if ctx.node(schema).is_ext_root() => Ok(()),
            Some(schema) if ctx.data_parent(schema) != pnode.schema => Err(DataError::ParentMismatch {
                child: display(cnode),
                parent: display(pnode),
            }),
            _ => Ok(()),
        }
    }

    fn set_first(&mut self, parent: Option<NodeId>, id: Option<NodeId>) {
        match parent {
            Some(p) => self.nodes[p.index()].first_child = id,
            None => self.first_root = id,
        }
    }

    fn set_last(&mut self, parent: Option<NodeId>, id: Option<NodeId>) {
        match parent {
            Some(p) => self.nodes[p.index()].last_child = id,
            None => self.last_root = id,
        }
    }

    fn link_after(&mut self, parent: Option<NodeId>, anchor: NodeId, node: NodeId) {
        let next = self.nodes[anchor.index()].next;
        self.nodes[anchor.index()].next = Some(node);
        {
            let n = &mut self.nodes[node.index()];
            n.prev = Some(anchor);
            n.next = next;
            n.parent = parent;
            n.linked = true;
        }
        match next {
            Some(next) => self.nodes[next.index()].prev = Some(node),
            None => self.set_last(parent, Some(node)),
        }
    }

    fn subtree_eq(&self, a: NodeId, other: &DataTree, b: NodeId) -> bool {
        let (na, nb) = (self.node(a), other.node(b));
        if na.schema != nb.schema || na.kind != nb.kind || na.flags != nb.flags || na.metadata != nb.metadata {
            return false;
        }
        let mut ca = self.children(a);
        let mut cb = other.children(b);
        loop {
            match (ca.next(), cb.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if self.subtree_eq(x, other, y) => {}
                _ => return false,
            }
        }
    }
}

/// Trees are equal when their linked content is, regardless of arena layout.
impl PartialEq for DataTree {
    fn eq(&self, other: &Self) -> bool {
        let mut ra = self.roots();
        let mut rb = other.roots();
        loop {
            match (ra.next(), rb.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if self.subtree_eq(x, other, y) => {}
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LeafType, TermSpec};

    fn schema() -> (SchemaContext, SchemaId, SchemaId, SchemaId, SchemaId) {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("t", None).unwrap();
        let top = ctx.add_node(m, None, "top", SchemaKind::Container).unwrap();
        let name = ctx
            .add_node(m, Some(top), "name", SchemaKind::Leaf(TermSpec::new(LeafType::String)))
            .unwrap();
        let tag = ctx
            .add_node(m, Some(top), "tag", SchemaKind::LeafList(TermSpec::new(LeafType::Uint8)))
            .unwrap();
        let item = ctx.add_node(m, Some(top), "item", SchemaKind::List).unwrap();
        (ctx, top, name, tag, item)
    }

    #[test]
    fn test_kind_checks() {
        let (ctx, top, name, tag, _) = schema();
        let mut tree = DataTree::new();
        assert!(matches!(
            tree.new_term(&ctx, top, "x"),
            Err(DataError::KindMismatch { expected: "container", .. })
        ));
        assert!(matches!(
            tree.new_term(&ctx, name, 5u8),
            Err(DataError::InvalidValue { .. })
        ));
        assert!(matches!(
            tree.new_term(&ctx, tag, 5u8),
            Err(DataError::KindMismatch { expected: "leaf-list", .. })
        ));
        assert!(tree.new_leaf_list(&ctx, tag, 5u8).is_ok());
    }

    #[test]
    fn test_instances_stay_contiguous() {
        let (ctx, top, name, tag, item) = schema();
        let mut tree = DataTree::new();
        let root = tree.new_inner(&ctx, top).unwrap();
        tree.insert_child(&ctx, None, root).unwrap();

        let t1 = tree.new_leaf_list(&ctx, tag, 1u8).unwrap();
        let i1 = tree.new_list(&ctx, item).unwrap();
        let t2 = tree.new_leaf_list(&ctx, tag, 2u8).unwrap();
        let n = tree.new_term(&ctx, name, "n").unwrap();
        for id in [t1, i1, t2, n] {
            tree.insert_child(&ctx, Some(root), id).unwrap();
        }

        assert_eq!(tree.children(root).collect::<Vec<_>>(), [t1, t2, i1, n]);
        assert_eq!(tree.node(n).prev_sibling(), Some(i1));
        assert_eq!(tree.node(t2).parent(), Some(root));
    }

    #[test]
    fn test_parent_checks() {
        let (ctx, top, name, _, _) = schema();
        let mut tree = DataTree::new();
        let leaf = tree.new_term(&ctx, name, "n").unwrap();
        let other = tree.new_term(&ctx, name, "m").unwrap();
        tree.insert_child(&ctx, None, leaf).unwrap();
        assert!(matches!(
            tree.insert_child(&ctx, Some(leaf), other),
            Err(DataError::ParentMismatch { .. })
        ));
        assert!(matches!(
            tree.insert_child(&ctx, None, leaf),
            Err(DataError::AlreadyLinked { .. })
        ));

        let opaque = tree.new_opaque(OpaqueNode::new(OpaqueName::new("raw"), OpaqueFormat::Json));
        tree.insert_child(&ctx, None, opaque).unwrap();
        let container = tree.new_inner(&ctx, top).unwrap();
        assert!(matches!(
            tree.insert_child(&ctx, Some(opaque), container),
            Err(DataError::OpaqueParent { .. })
        ));
    }

    #[test]
    fn test_insert_sibling() {
        let (ctx, top, _, _, _) = schema();
        let mut tree = DataTree::new();
        let a = tree.new_inner(&ctx, top).unwrap();
        let b = tree.new_opaque(OpaqueNode::new(OpaqueName::new("b"), OpaqueFormat::Xml));
        let c = tree.new_opaque(OpaqueNode::new(OpaqueName::new("c"), OpaqueFormat::Xml));
        tree.insert_child(&ctx, None, a).unwrap();
        tree.insert_child(&ctx, None, c).unwrap();
        tree.insert_sibling(&ctx, a, b).unwrap();
        assert_eq!(tree.roots().collect::<Vec<_>>(), [a, b, c]);
        assert_eq!(tree.node(c).prev_sibling(), Some(b));
    }

    #[test]
    fn test_flags() {
        let mut flags = NodeFlags::DEFAULT | NodeFlags::NEW;
        assert_eq!(flags.bits(), 0x05);
        assert!(flags.contains(NodeFlags::DEFAULT));
        flags.remove(NodeFlags::DEFAULT);
        assert!(!flags.contains(NodeFlags::DEFAULT));
    }

    #[test]
    fn test_ext_root_flag() {
        let (mut ctx, ..) = schema();
        let m = ctx.module_by_name("t").unwrap();
        let ext = ctx.add_ext_node(m, "mounted", SchemaKind::Container).unwrap();
        let mut tree = DataTree::new();
        let node = tree.new_inner(&ctx, ext).unwrap();
        assert!(tree.node(node).flags().contains(NodeFlags::EXT));
    }

    #[test]
    fn test_content_equality_ignores_layout() {
        let (ctx, top, name, _, _) = schema();
        let mut a = DataTree::new();
        let ra = a.new_inner(&ctx, top).unwrap();
        let la = a.new_term(&ctx, name, "x").unwrap();
        a.insert_child(&ctx, None, ra).unwrap();
        a.insert_child(&ctx, Some(ra), la).unwrap();

        let mut b = DataTree::new();
        let lb = b.new_term(&ctx, name, "x").unwrap();
        let rb = b.new_inner(&ctx, top).unwrap();
        b.insert_child(&ctx, None, rb).unwrap();
        b.insert_child(&ctx, Some(rb), lb).unwrap();
        assert_eq!(a, b);

        b.add_flags(lb, NodeFlags::DEFAULT).unwrap();
        assert_ne!(a, b);
    }
}
