//! In-memory schema context.
//!
//! A [`SchemaContext`] owns every loaded module and an arena of schema nodes
//! addressed by [`SchemaId`]. Parent, child and sibling links are indices into
//! the arena, so iterating a sibling group is a pure read.
//!
//! Data-level sibling iteration ("getnext") is transparent for `choice` and
//! `case` nodes and enters either the `input` or the `output` of an RPC or
//! action, which makes them two distinct sibling groups.

pub mod types;

pub use types::{BitMember, EnumMember, LeafType, Value, ValueCodec, ValueError, ValueFormat};

use crate::codec::hash::{HashAlgorithm, node_hash};
use crate::error::SchemaError;
use crate::limits::CACHED_HASH_COUNT;
use crate::util::Revision;

/// Index of a module in its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a schema node in its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u32);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A loaded YANG module.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    revision: Option<Revision>,
    features: Vec<String>,
    implemented: bool,
    first_top: Option<SchemaId>,
    last_top: Option<SchemaId>,
    ext_roots: Vec<SchemaId>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    /// Enabled features.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn is_implemented(&self) -> bool {
        self.implemented
    }

    /// Packed revision as written in module records, 0 without a revision.
    pub fn packed_revision(&self) -> u16 {
        self.revision.map_or(0, |rev| rev.packed())
    }
}

/// Leaf and leaf-list type with optional default values.
#[derive(Debug, Clone)]
pub struct TermSpec {
    pub ty: LeafType,
    pub defaults: Vec<Value>,
}

impl TermSpec {
    pub fn new(ty: LeafType) -> Self {
        Self {
            ty,
            defaults: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.defaults.push(value);
        self
    }
}

/// Schema node types.
#[derive(Debug, Clone)]
pub enum SchemaKind {
    Container,
    Leaf(TermSpec),
    LeafList(TermSpec),
    List,
    AnyData,
    AnyXml,
    Choice,
    Case,
    Rpc,
    Action,
    Notification,
    Input,
    Output,
}

impl SchemaKind {
    /// Keyword used in diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self {
            SchemaKind::Container => "container",
            SchemaKind::Leaf(_) => "leaf",
            SchemaKind::LeafList(_) => "leaf-list",
            SchemaKind::List => "list",
            SchemaKind::AnyData => "anydata",
            SchemaKind::AnyXml => "anyxml",
            SchemaKind::Choice => "choice",
            SchemaKind::Case => "case",
            SchemaKind::Rpc => "rpc",
            SchemaKind::Action => "action",
            SchemaKind::Notification => "notification",
            SchemaKind::Input => "input",
            SchemaKind::Output => "output",
        }
    }

    /// Whether data nodes can be instances of this kind.
    pub fn is_data(&self) -> bool {
        !matches!(
            self,
            SchemaKind::Choice | SchemaKind::Case | SchemaKind::Input | SchemaKind::Output
        )
    }

    /// Term type of a leaf or leaf-list.
    pub fn term(&self) -> Option<&TermSpec> {
        match self {
            SchemaKind::Leaf(spec) | SchemaKind::LeafList(spec) => Some(spec),
            _ => None,
        }
    }

    fn allows_children(&self) -> bool {
        !matches!(
            self,
            SchemaKind::Leaf(_) | SchemaKind::LeafList(_) | SchemaKind::AnyData | SchemaKind::AnyXml
        )
    }
}

/// A compiled schema node.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    module: ModuleId,
    name: String,
    kind: SchemaKind,
    parent: Option<SchemaId>,
    first_child: Option<SchemaId>,
    last_child: Option<SchemaId>,
    next: Option<SchemaId>,
    ext_root: bool,
}

impl SchemaNode {
    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    /// Schema parent, including choice, case, input and output nodes.
    pub fn parent(&self) -> Option<SchemaId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<SchemaId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<SchemaId> {
        self.next
    }

    /// Root of an extension instance, outside of every top-level group.
    pub fn is_ext_root(&self) -> bool {
        self.ext_root
    }
}

#[derive(Debug, Clone)]
struct PrecomputedHashes {
    algorithm: HashAlgorithm,
    hashes: Vec<[u8; CACHED_HASH_COUNT]>,
}

/// Set of loaded modules and their compiled schema trees.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    modules: Vec<Module>,
    nodes: Vec<SchemaNode>,
    precomputed: Option<PrecomputedHashes>,
}

impl SchemaContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Adds an implemented module with an optional `YYYY-MM-DD` revision.
    pub fn add_module(&mut self, name: &str, revision: Option<&str>) -> Result<ModuleId, SchemaError> {
        if self.module_by_name(name).is_some() {
            return Err(SchemaError::DuplicateModule {
                name: name.to_string(),
            });
        }
        let revision = revision
            .map(|rev| {
                Revision::parse(rev).map_err(|e| SchemaError::InvalidRevision {
                    module: name.to_string(),
                    revision: rev.to_string(),
                    message: e.message,
                })
            })
            .transpose()?;

        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            name: name.to_string(),
            revision,
            features: Vec::new(),
            implemented: true,
            first_top: None,
            last_top: None,
            ext_roots: Vec::new(),
        });
        Ok(id)
    }

    /// Enables a feature of a module.
    pub fn enable_feature(&mut self, module: ModuleId, feature: &str) {
        let features = &mut self.modules[module.index()].features;
        if !features.iter().any(|f| f == feature) {
            features.push(feature.to_string());
        }
    }

    /// Marks a module as implemented or only imported.
    pub fn set_implemented(&mut self, module: ModuleId, implemented: bool) {
        self.modules[module.index()].implemented = implemented;
    }

    /// Adds a schema node as the last child of `parent`, or as the last
    /// top-level node of `module`.
    pub fn add_node(
        &mut self,
        module: ModuleId,
        parent: Option<SchemaId>,
        name: &str,
        kind: SchemaKind,
    ) -> Result<SchemaId, SchemaError> {
        check_term(name, &kind)?;
        match parent {
            Some(parent_id) => {
                let parent_node = self.node(parent_id);
                let parent_kind = &parent_node.kind;
                let operation = matches!(parent_kind, SchemaKind::Rpc | SchemaKind::Action);
                let operation_part = matches!(kind, SchemaKind::Input | SchemaKind::Output);
                if !parent_kind.allows_children()
                    || operation != operation_part
                    || (matches!(parent_kind, SchemaKind::Choice) && !matches!(kind, SchemaKind::Case))
                {
                    return Err(SchemaError::InvalidChild {
                        parent: parent_kind.keyword(),
                        parent_name: parent_node.name.clone(),
                        child: kind.keyword(),
                    });
                }
                if self.children(parent_id).any(|c| self.node(c).name == name) {
                    return Err(SchemaError::DuplicateNode {
                        name: name.to_string(),
                    });
                }
            }
            None => {
                if matches!(kind, SchemaKind::Input | SchemaKind::Output) {
                    return Err(SchemaError::OrphanOperationPart {
                        kind: kind.keyword(),
                        name: name.to_string(),
                    });
                }
                let mut top = self.modules[module.index()].first_top;
                while let Some(id) = top {
                    if self.node(id).name == name {
                        return Err(SchemaError::DuplicateNode {
                            name: name.to_string(),
                        });
                    }
                    top = self.node(id).next;
                }
            }
        }
        if kind.is_data() {
            // choice and case are transparent, so the data siblings must differ too
            let data_parent = parent.and_then(|p| {
                if self.node(p).kind.is_data() {
                    Some(p)
                } else {
                    self.data_parent(p)
                }
            });
            let group_module = parent.map_or(module, |p| self.node(p).module);
            let output = parent.is_some_and(|p| self.is_output(p));
            if self
                .data_children(data_parent, group_module, output)
                .any(|c| self.node(c).name == name)
            {
                return Err(SchemaError::DuplicateNode {
                    name: name.to_string(),
                });
            }
        }

        let id = self.push_node(module, parent, name, kind, false);
        let prev_last = match parent {
            Some(parent_id) => {
                let parent_node = &mut self.nodes[parent_id.index()];
                let prev = parent_node.last_child.replace(id);
                parent_node.first_child.get_or_insert(id);
                prev
            }
            None => {
                let m = &mut self.modules[module.index()];
                let prev = m.last_top.replace(id);
                m.first_top.get_or_insert(id);
                prev
            }
        };
        if let Some(prev) = prev_last {
            self.nodes[prev.index()].next = Some(id);
        }
        Ok(id)
    }

    /// Adds the root of an extension instance (for example a yang-data or a
    /// mount point). It is not a member of any top-level sibling group.
    pub fn add_ext_node(
        &mut self,
        module: ModuleId,
        name: &str,
        kind: SchemaKind,
    ) -> Result<SchemaId, SchemaError> {
        check_term(name, &kind)?;
        if !kind.is_data() {
            return Err(SchemaError::InvalidChild {
                parent: "extension instance of",
                parent_name: self.modules[module.index()].name.clone(),
                child: kind.keyword(),
            });
        }
        if self.find_ext(self.modules[module.index()].name(), name).is_some() {
            return Err(SchemaError::DuplicateNode {
                name: name.to_string(),
            });
        }
        let id = self.push_node(module, None, name, kind, true);
        self.modules[module.index()].ext_roots.push(id);
        Ok(id)
    }

    fn push_node(
        &mut self,
        module: ModuleId,
        parent: Option<SchemaId>,
        name: &str,
        kind: SchemaKind,
        ext_root: bool,
    ) -> SchemaId {
        // any precomputed hashes no longer cover the whole arena
        self.precomputed = None;

        let id = SchemaId(self.nodes.len() as u32);
        self.nodes.push(SchemaNode {
            module,
            name: name.to_string(),
            kind,
            parent,
            first_child: None,
            last_child: None,
            next: None,
            ext_root,
        });
        id
    }

    /// Computes and stores the first [`CACHED_HASH_COUNT`] hashes of every
    /// node for one algorithm.
    pub fn precompute_hashes(&mut self, algorithm: HashAlgorithm) {
        let hashes = self
            .nodes
            .iter()
            .map(|node| {
                let module = self.modules[node.module.index()].name();
                let mut row = [0u8; CACHED_HASH_COUNT];
                for (depth, slot) in row.iter_mut().enumerate() {
                    *slot = node_hash(algorithm, module, &node.name, depth as u8);
                }
                row
            })
            .collect();
        self.precomputed = Some(PrecomputedHashes { algorithm, hashes });
    }

    /// Precomputed hash of a node, if available for this algorithm and depth.
    pub fn cached_hash(&self, id: SchemaId, algorithm: HashAlgorithm, depth: u8) -> Option<u8> {
        let cache = self.precomputed.as_ref()?;
        if cache.algorithm != algorithm {
            return None;
        }
        cache.hashes.get(id.index())?.get(usize::from(depth)).copied()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: SchemaId) -> Option<&SchemaNode> {
        self.nodes.get(id.index())
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    /// Module owning a schema node.
    pub fn module_of(&self, id: SchemaId) -> &Module {
        self.module(self.node(id).module)
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId(i as u32), m))
    }

    pub fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name == name)
            .map(|i| ModuleId(i as u32))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Finds a data node by module name and a path of data node names.
    pub fn find(&self, module: &str, path: &[&str]) -> Option<SchemaId> {
        self.find_in(module, path, false)
    }

    /// Like [`find`](Self::find) but resolves RPC and action children in
    /// their output.
    pub fn find_output(&self, module: &str, path: &[&str]) -> Option<SchemaId> {
        self.find_in(module, path, true)
    }

    fn find_in(&self, module: &str, path: &[&str], output: bool) -> Option<SchemaId> {
        let module = self.module_by_name(module)?;
        let (first, rest) = path.split_first()?;
        let mut current = self
            .data_children(None, module, output)
            .find(|&id| self.node(id).name == *first)?;
        for name in rest {
            current = self
                .data_children(Some(current), module, output)
                .find(|&id| self.node(id).name == *name)?;
        }
        Some(current)
    }

    /// Finds an extension instance root by module and name.
    pub fn find_ext(&self, module: &str, name: &str) -> Option<SchemaId> {
        let module = self.module_by_name(module)?;
        self.modules[module.index()]
            .ext_roots
            .iter()
            .copied()
            .find(|&id| self.node(id).name == name)
    }

    // =========================================================================
    // Data-level navigation
    // =========================================================================

    /// Direct schema children of a node, without any transparency.
    pub fn children(&self, id: SchemaId) -> impl Iterator<Item = SchemaId> + '_ {
        std::iter::successors(self.node(id).first_child, move |&c| self.node(c).next)
    }

    /// Data children of `parent` (top-level nodes of `module` for `None`),
    /// in getnext order.
    pub fn data_children(&self, parent: Option<SchemaId>, module: ModuleId, output: bool) -> Siblings<'_> {
        let first = match parent {
            Some(id) => self.node(id).first_child,
            None => self.modules[module.index()].first_top,
        };
        Siblings {
            ctx: self,
            stack: vec![first],
            output,
        }
    }

    /// Nearest ancestor that is a data node.
    pub fn data_parent(&self, id: SchemaId) -> Option<SchemaId> {
        let mut parent = self.node(id).parent;
        while let Some(p) = parent {
            if self.node(p).kind.is_data() {
                return Some(p);
            }
            parent = self.node(p).parent;
        }
        None
    }

    /// Whether a node lies in the output of an RPC or action.
    pub fn is_output(&self, id: SchemaId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.node(c).kind {
                SchemaKind::Output => return true,
                SchemaKind::Input | SchemaKind::Rpc | SchemaKind::Action => return false,
                _ => current = self.node(c).parent,
            }
        }
        false
    }

    /// Whether children of a data node are resolved in an output group.
    ///
    /// For RPCs and actions this is the caller's choice, deeper nodes inherit
    /// it from their own position.
    pub fn children_in_output(&self, parent: SchemaId, operation_output: bool) -> bool {
        match self.node(parent).kind {
            SchemaKind::Rpc | SchemaKind::Action => operation_output,
            _ => self.is_output(parent),
        }
    }

    /// All siblings of a data node's group in getnext order. An extension
    /// instance root is a group of its own.
    pub fn sibling_group(&self, id: SchemaId) -> Siblings<'_> {
        let node = self.node(id);
        if node.ext_root {
            return Siblings {
                ctx: self,
                stack: vec![Some(id)],
                output: false,
            };
        }
        self.data_children(self.data_parent(id), node.module, self.is_output(id))
    }

    /// First sibling of a data node's group, identifying the group.
    pub fn first_sibling(&self, id: SchemaId) -> Option<SchemaId> {
        self.sibling_group(id).next()
    }

    /// Whether a term value equals a default of its schema node.
    pub fn is_default_value(&self, id: SchemaId, value: &Value) -> bool {
        self.node(id)
            .kind
            .term()
            .is_some_and(|spec| spec.defaults.iter().any(|d| d == value))
    }

    /// Identity hash of every loaded module, written to document headers.
    ///
    /// Covers module names, revisions, enabled features of implemented
    /// modules and the implemented flag, in load order.
    pub fn modules_hash(&self) -> u32 {
        use crate::codec::hash::{hash_finish, hash_multi};

        let mut hash = 0u32;
        for module in &self.modules {
            hash = hash_multi(hash, module.name.as_bytes());
            if let Some(rev) = module.revision {
                hash = hash_multi(hash, rev.to_string().as_bytes());
            }
            if module.implemented {
                for feature in &module.features {
                    hash = hash_multi(hash, feature.as_bytes());
                }
            }
            hash = hash_multi(hash, &[u8::from(module.implemented)]);
        }
        hash_finish(hash)
    }
}

fn check_term(name: &str, kind: &SchemaKind) -> Result<(), SchemaError> {
    match kind.term() {
        Some(spec) => spec.ty.check_definition().map_err(|source| SchemaError::InvalidType {
            name: name.to_string(),
            source,
        }),
        None => Ok(()),
    }
}

/// Getnext iterator over one data sibling group.
#[derive(Debug, Clone)]
pub struct Siblings<'a> {
    ctx: &'a SchemaContext,
    stack: Vec<Option<SchemaId>>,
    output: bool,
}

impl Iterator for Siblings<'_> {
    type Item = SchemaId;

    fn next(&mut self) -> Option<SchemaId> {
        let ctx = self.ctx;
        loop {
            let slot = self.stack.last_mut()?;
            let Some(id) = *slot else {
                self.stack.pop();
                continue;
            };
            let node = ctx.node(id);
            *slot = node.next;
            match node.kind {
                SchemaKind::Choice | SchemaKind::Case => self.stack.push(node.first_child),
                SchemaKind::Input if !self.output => self.stack.push(node.first_child),
                SchemaKind::Output if self.output => self.stack.push(node.first_child),
                SchemaKind::Input | SchemaKind::Output => {}
                _ => return Some(id),
            }
        }
    }
}
