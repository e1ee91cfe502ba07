//! Builder API for ergonomic data tree construction.
//!
//! Provides a fluent interface resolving schema nodes by name.
//!
//! # Example
//!
//! ```rust
//! use lyb::data::TreeBuilder;
//! use lyb::schema::{LeafType, SchemaContext, SchemaKind, TermSpec};
//!
//! let mut ctx = SchemaContext::new();
//! let m = ctx.add_module("inventory", None).unwrap();
//! let top = ctx.add_node(m, None, "inventory", SchemaKind::Container).unwrap();
//! let item = ctx.add_node(m, Some(top), "item", SchemaKind::List).unwrap();
//! ctx.add_node(m, Some(item), "name", SchemaKind::Leaf(TermSpec::new(LeafType::String))).unwrap();
//!
//! let tree = TreeBuilder::new(&ctx)
//!     .container("inventory", "inventory", |c| c
//!         .list("item", |i| i.leaf("name", "disk"))
//!         .list("item", |i| i.leaf("name", "fan"))
//!     )
//!     .build()
//!     .unwrap();
//! assert_eq!(tree.len(), 5);
//! ```

use crate::data::{AnyValue, DataNodeKind, DataTree, Metadatum, NodeFlags, NodeId, OpaqueNode};
use crate::error::DataError;
use crate::schema::{ModuleId, SchemaContext, SchemaId, SchemaKind, Value};

/// Builder for the root siblings of a data tree.
///
/// The first error is kept and reported by [`build`](Self::build); later
/// calls are ignored.
#[derive(Debug)]
pub struct TreeBuilder<'s> {
    ctx: &'s SchemaContext,
    tree: DataTree,
    error: Option<DataError>,
}

impl<'s> TreeBuilder<'s> {
    pub fn new(ctx: &'s SchemaContext) -> Self {
        Self {
            ctx,
            tree: DataTree::new(),
            error: None,
        }
    }

    /// Adds a top-level container, RPC, action or notification.
    pub fn container<F>(self, module: &str, name: &str, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        self.with_node(module, name, DataNodeKind::Inner, f)
    }

    /// Adds a top-level list instance.
    pub fn list<F>(self, module: &str, name: &str, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        self.with_node(module, name, DataNodeKind::List, f)
    }

    /// Adds a top-level leaf.
    pub fn leaf(self, module: &str, name: &str, value: impl Into<Value>) -> Self {
        self.with_node(module, name, DataNodeKind::Term(value.into()), |n| n)
    }

    /// Adds a top-level leaf-list instance.
    pub fn leaf_list(self, module: &str, name: &str, value: impl Into<Value>) -> Self {
        self.with_node(module, name, DataNodeKind::LeafList(value.into()), |n| n)
    }

    /// Adds a top-level anydata or anyxml node.
    pub fn any(self, module: &str, name: &str, value: AnyValue) -> Self {
        self.with_node(module, name, DataNodeKind::Any(value), |n| n)
    }

    /// Adds the root of an extension instance.
    pub fn ext<F>(mut self, module: &str, name: &str, kind: DataNodeKind, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        if self.error.is_some() {
            return self;
        }
        match self.ctx.find_ext(module, name) {
            Some(schema) => self.add(schema, kind, f),
            None => {
                self.error = Some(DataError::UnknownSchemaNode {
                    parent: module.to_string(),
                    name: name.to_string(),
                });
                self
            }
        }
    }

    /// Adds a top-level opaque node.
    pub fn opaque<F>(mut self, opaque: OpaqueNode, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        if self.error.is_some() {
            return self;
        }
        let id = self.tree.new_opaque(opaque);
        self.link(id, f)
    }

    fn with_node<F>(mut self, module: &str, name: &str, kind: DataNodeKind, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        if self.error.is_some() {
            return self;
        }
        let Some(module_id) = self.ctx.module_by_name(module) else {
            self.error = Some(DataError::UnknownModule {
                name: module.to_string(),
            });
            return self;
        };
        match resolve(self.ctx, None, module_id, name) {
            Ok(schema) => self.add(schema, kind, f),
            Err(e) => {
                self.error = Some(e);
                self
            }
        }
    }

    fn add<F>(mut self, schema: SchemaId, kind: DataNodeKind, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        match self.tree.new_node(self.ctx, schema, kind) {
            Ok(id) => self.link(id, f),
            Err(e) => {
                self.error = Some(e);
                self
            }
        }
    }

    fn link<F>(mut self, id: NodeId, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        if let Err(e) = self.tree.insert_child(self.ctx, None, id) {
            self.error = Some(e);
            return self;
        }
        let child = f(NodeBuilder {
            ctx: self.ctx,
            tree: std::mem::take(&mut self.tree),
            node: id,
            error: None,
        });
        self.tree = child.tree;
        self.error = child.error;
        self
    }

    /// Finishes the tree, returning the first error encountered.
    pub fn build(self) -> Result<DataTree, DataError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.tree),
        }
    }
}

/// Builder for the content of one data node.
#[derive(Debug)]
pub struct NodeBuilder<'s> {
    ctx: &'s SchemaContext,
    tree: DataTree,
    node: NodeId,
    error: Option<DataError>,
}

impl<'s> NodeBuilder<'s> {
    /// Node being built.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// Adds a child container, RPC, action or notification.
    pub fn container<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        self.child(name, DataNodeKind::Inner, NodeFlags::empty(), f)
    }

    /// Adds a child list instance.
    pub fn list<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        self.child(name, DataNodeKind::List, NodeFlags::empty(), f)
    }

    /// Adds a child leaf.
    pub fn leaf(self, name: &str, value: impl Into<Value>) -> Self {
        self.child(name, DataNodeKind::Term(value.into()), NodeFlags::empty(), |n| n)
    }

    /// Adds a child leaf created as an implicit default.
    pub fn default_leaf(self, name: &str, value: impl Into<Value>) -> Self {
        self.child(name, DataNodeKind::Term(value.into()), NodeFlags::DEFAULT, |n| n)
    }

    /// Adds a child leaf-list instance.
    pub fn leaf_list(self, name: &str, value: impl Into<Value>) -> Self {
        self.child(name, DataNodeKind::LeafList(value.into()), NodeFlags::empty(), |n| n)
    }

    /// Adds a child leaf-list instance created as an implicit default.
    pub fn default_leaf_list(self, name: &str, value: impl Into<Value>) -> Self {
        self.child(name, DataNodeKind::LeafList(value.into()), NodeFlags::DEFAULT, |n| n)
    }

    /// Adds a child anydata or anyxml node.
    pub fn any(self, name: &str, value: AnyValue) -> Self {
        self.child(name, DataNodeKind::Any(value), NodeFlags::empty(), |n| n)
    }

    /// Adds an opaque child.
    pub fn opaque<F>(mut self, opaque: OpaqueNode, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        if self.error.is_some() {
            return self;
        }
        let id = self.tree.new_opaque(opaque);
        self.link(id, f)
    }

    /// Adds a metadatum to the node being built.
    pub fn meta(mut self, module: &str, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        let result = match self.ctx.module_by_name(module) {
            Some(m) => self.tree.add_metadata(self.node, Metadatum::new(m, name, value)),
            None => Err(DataError::UnknownModule {
                name: module.to_string(),
            }),
        };
        self.error = result.err();
        self
    }

    /// Adds flags to the node being built.
    pub fn flags(mut self, flags: NodeFlags) -> Self {
        if self.error.is_none() {
            self.error = self.tree.add_flags(self.node, flags).err();
        }
        self
    }

    fn child<F>(mut self, name: &str, kind: DataNodeKind, flags: NodeFlags, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        if self.error.is_some() {
            return self;
        }
        let parent = self.tree.node(self.node);
        let Some(parent_schema) = parent.schema() else {
            let parent = match parent.kind() {
                DataNodeKind::Opaque(op) => op.name.name.clone(),
                _ => String::new(),
            };
            self.error = Some(DataError::OpaqueParent { parent });
            return self;
        };
        let module = self.ctx.node(parent_schema).module();
        let created = resolve(self.ctx, Some(parent_schema), module, name)
            .and_then(|schema| self.tree.new_node(self.ctx, schema, kind))
            .and_then(|id| self.tree.add_flags(id, flags).map(|_| id));
        match created {
            Ok(id) => self.link(id, f),
            Err(e) => {
                self.error = Some(e);
                self
            }
        }
    }

    fn link<F>(mut self, id: NodeId, f: F) -> Self
    where
        F: FnOnce(NodeBuilder<'s>) -> NodeBuilder<'s>,
    {
        if let Err(e) = self.tree.insert_child(self.ctx, Some(self.node), id) {
            self.error = Some(e);
            return self;
        }
        let child = f(NodeBuilder {
            ctx: self.ctx,
            tree: std::mem::take(&mut self.tree),
            node: id,
            error: None,
        });
        self.tree = child.tree;
        self.error = child.error;
        self
    }
}

fn resolve(
    ctx: &SchemaContext,
    parent: Option<SchemaId>,
    module: ModuleId,
    name: &str,
) -> Result<SchemaId, DataError> {
    // input first, then output
    let output_choices: &[bool] = match parent {
        Some(p) if matches!(ctx.node(p).kind(), SchemaKind::Rpc | SchemaKind::Action) => &[false, true],
        Some(p) => {
            if ctx.is_output(p) {
                &[true]
            } else {
                &[false]
            }
        }
        None => &[false],
    };
    output_choices
        .iter()
        .find_map(|&output| {
            ctx.data_children(parent, module, output)
                .find(|&id| ctx.node(id).name() == name)
        })
        .ok_or_else(|| DataError::UnknownSchemaNode {
            parent: parent.map_or_else(|| ctx.module(module).name().to_string(), |p| ctx.node(p).name().to_string()),
            name: name.to_string(),
        })
}
