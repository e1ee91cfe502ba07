//! Schema node hashes and per-sibling-group hash tables.
//!
//! Every data node of a sibling group is identified on the wire by a short
//! hash instead of its name. A hash has 8 bits, the position of its highest
//! set bit is the collision depth it was computed for:
//!
//! ```text
//! 1xxx xxxx  depth 0
//! 01xx xxxx  depth 1
//! 001x xxxx  depth 2 ...
//! ```
//!
//! A node that cannot be told apart from an earlier sibling by its depth 0
//! hash is placed at a higher depth and its hashes of all lower depths are
//! transmitted as well.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use xxhash_rust::xxh3::Xxh3;

use crate::error::{DecodeError, EncodeError};
use crate::limits::{HASH_BITS, HASH_COLLISION_ID, HASH_MASK};
use crate::schema::{ModuleId, SchemaContext, SchemaId};

// =============================================================================
// HASH FUNCTIONS
// =============================================================================

/// Hash function used for schema node hashes, recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// Jenkins one-at-a-time over module and node name.
    #[default]
    OneAtATime,
    /// XXH3 seeded with the collision depth.
    Xxh3,
}

impl HashAlgorithm {
    /// Header byte bits of this algorithm.
    pub fn header_bits(self) -> u8 {
        match self {
            HashAlgorithm::OneAtATime => 0x10,
            HashAlgorithm::Xxh3 => 0x20,
        }
    }

    /// Creates a HashAlgorithm from its header bits.
    pub fn from_header_bits(bits: u8) -> Option<HashAlgorithm> {
        match bits {
            0x10 => Some(HashAlgorithm::OneAtATime),
            0x20 => Some(HashAlgorithm::Xxh3),
            _ => None,
        }
    }
}

/// Adds bytes to a one-at-a-time hash; an empty slice finalizes it.
pub fn hash_multi(mut hash: u32, bytes: &[u8]) -> u32 {
    if bytes.is_empty() {
        return hash_finish(hash);
    }
    for &b in bytes {
        // bytes are added as signed chars
        hash = hash.wrapping_add(b as i8 as i32 as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash
}

/// Finalizes a one-at-a-time hash.
pub fn hash_finish(mut hash: u32) -> u32 {
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

/// Computes the hash of a schema node for one collision depth.
pub fn node_hash(algorithm: HashAlgorithm, module: &str, name: &str, depth: u8) -> u8 {
    debug_assert!(usize::from(depth) < HASH_BITS);
    let full = match algorithm {
        HashAlgorithm::OneAtATime => {
            let module = module.as_bytes();
            let mut hash = hash_multi(0, module);
            hash = hash_multi(hash, name.as_bytes());
            if depth > 0 {
                // one more byte of the module name per depth, then only more bits
                let ext_len = usize::from(depth).min(module.len());
                hash = hash_multi(hash, &module[..ext_len]);
            }
            hash_finish(hash)
        }
        HashAlgorithm::Xxh3 => {
            let mut hasher = Xxh3::with_seed(u64::from(depth));
            hasher.update(module.as_bytes());
            hasher.update(&[0]);
            hasher.update(name.as_bytes());
            hasher.digest() as u32
        }
    };
    ((full as u8) & (HASH_MASK >> depth)) | (HASH_COLLISION_ID >> depth)
}

/// Computes node hashes, optionally reading them from the context's
/// precomputed cache.
#[derive(Debug, Clone, Copy)]
pub struct NodeHasher<'s> {
    ctx: &'s SchemaContext,
    algorithm: HashAlgorithm,
    use_cache: bool,
}

impl<'s> NodeHasher<'s> {
    pub fn new(ctx: &'s SchemaContext, algorithm: HashAlgorithm, use_cache: bool) -> Self {
        Self {
            ctx,
            algorithm,
            use_cache,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash of a schema node at a collision depth.
    pub fn hash(&self, id: SchemaId, depth: u8) -> u8 {
        if self.use_cache {
            if let Some(hash) = self.ctx.cached_hash(id, self.algorithm, depth) {
                return hash;
            }
        }
        let node = self.ctx.node(id);
        node_hash(self.algorithm, self.ctx.module_of(id).name(), node.name(), depth)
    }

    /// Chain of hashes of a node for depths `0..=depth`.
    pub fn chain(&self, id: SchemaId, depth: u8) -> HashChain {
        let mut hashes = [0u8; HASH_BITS];
        for (d, slot) in hashes.iter_mut().enumerate().take(usize::from(depth) + 1) {
            *slot = self.hash(id, d as u8);
        }
        HashChain { hashes, depth }
    }
}

// =============================================================================
// HASH CHAINS
// =============================================================================

/// Hashes of one node for every depth up to the depth it was placed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashChain {
    /// Indexed by depth, zero beyond `depth`.
    hashes: [u8; HASH_BITS],
    depth: u8,
}

impl HashChain {
    /// Collision depth the node was placed at.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Hashes indexed by depth.
    pub fn hashes(&self) -> &[u8] {
        &self.hashes[..=usize::from(self.depth)]
    }

    /// Bytes in wire order: the placed depth first, then every lower depth.
    pub fn wire_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.hashes().iter().rev().copied()
    }

    /// Reads a chain from its wire bytes, one byte at a time.
    pub fn read(mut next_byte: impl FnMut() -> Result<u8, DecodeError>) -> Result<HashChain, DecodeError> {
        let first = next_byte()?;
        if first == 0 {
            return Err(DecodeError::InvalidHash { hash: first });
        }
        let depth = first.leading_zeros() as u8;
        let mut hashes = [0u8; HASH_BITS];
        hashes[usize::from(depth)] = first;
        for d in (0..depth).rev() {
            let hash = next_byte()?;
            if hash.leading_zeros() as u8 != d || hash == 0 {
                return Err(DecodeError::InvalidHash { hash });
            }
            hashes[usize::from(d)] = hash;
        }
        Ok(HashChain { hashes, depth })
    }
}

// =============================================================================
// SIBLING HASH TABLES
// =============================================================================

/// Failure building a sibling hash table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Two siblings share a hash chain at every collision depth.
    Exhausted { module: String, name: String },
    OutOfMemory,
}

impl From<TableError> for EncodeError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Exhausted { module, name } => EncodeError::HashSpaceExhausted {
                module,
                name,
                levels: HASH_BITS as u8,
            },
            TableError::OutOfMemory => EncodeError::OutOfMemory {
                context: "building a sibling hash table",
            },
        }
    }
}

impl From<TableError> for DecodeError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Exhausted { module, name } => DecodeError::HashSpaceExhausted {
                module,
                name,
                levels: HASH_BITS as u8,
            },
            TableError::OutOfMemory => DecodeError::OutOfMemory {
                context: "building a sibling hash table",
            },
        }
    }
}

/// Collision-free hash chains of one sibling group.
#[derive(Debug, Clone, Default)]
pub struct SiblingHashTable {
    entries: FxHashMap<SchemaId, HashChain>,
    by_chain: FxHashMap<HashChain, SchemaId>,
}

impl SiblingHashTable {
    /// Assigns every sibling, in iteration order, the lowest depth at which no
    /// earlier sibling placed at the same or a lower depth has an identical
    /// chain.
    pub fn build(
        hasher: &NodeHasher<'_>,
        siblings: impl IntoIterator<Item = SchemaId>,
    ) -> Result<Self, TableError> {
        let siblings = siblings.into_iter();
        let mut table = SiblingHashTable::default();
        let hint = siblings.size_hint().0;
        table
            .entries
            .try_reserve(hint)
            .map_err(|_| TableError::OutOfMemory)?;
        table
            .by_chain
            .try_reserve(hint)
            .map_err(|_| TableError::OutOfMemory)?;

        // chain prefixes over 0..=i of every node placed at a depth <= i
        let mut taken: FxHashSet<HashChain> = FxHashSet::default();

        for id in siblings {
            let full = hasher.chain(id, (HASH_BITS - 1) as u8);
            let placed = (0..HASH_BITS as u8).find(|&depth| !taken.contains(&full.truncated(depth)));
            let Some(depth) = placed else {
                let ctx = hasher.ctx;
                return Err(TableError::Exhausted {
                    module: ctx.module_of(id).name().to_string(),
                    name: ctx.node(id).name().to_string(),
                });
            };

            taken
                .try_reserve(HASH_BITS)
                .map_err(|_| TableError::OutOfMemory)?;
            for d in depth..HASH_BITS as u8 {
                taken.insert(full.truncated(d));
            }
            let chain = full.truncated(depth);
            table.entries.insert(id, chain);
            table.by_chain.insert(chain, id);
        }
        Ok(table)
    }

    /// Chain assigned to a sibling.
    pub fn find(&self, id: SchemaId) -> Option<HashChain> {
        self.entries.get(&id).copied()
    }

    /// Sibling transmitted with a chain.
    pub fn resolve(&self, chain: &HashChain) -> Option<SchemaId> {
        self.by_chain.get(chain).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HashChain {
    fn truncated(&self, depth: u8) -> HashChain {
        let mut hashes = [0u8; HASH_BITS];
        let len = usize::from(depth) + 1;
        hashes[..len].copy_from_slice(&self.hashes[..len]);
        HashChain { hashes, depth }
    }
}

/// Hash tables of one encode or decode call, keyed by the first sibling of
/// each group.
///
/// Borrowing the context for the whole call keeps the tables from ever
/// outliving or mixing schema contexts.
#[derive(Debug)]
pub struct HashTableCache<'s> {
    ctx: &'s SchemaContext,
    hasher: NodeHasher<'s>,
    tables: FxHashMap<SchemaId, SiblingHashTable>,
}

impl<'s> HashTableCache<'s> {
    pub fn new(ctx: &'s SchemaContext, algorithm: HashAlgorithm, use_cached_hashes: bool) -> Self {
        Self {
            ctx,
            hasher: NodeHasher::new(ctx, algorithm, use_cached_hashes),
            tables: FxHashMap::default(),
        }
    }

    /// Table of the data children of `parent` (top-level nodes of `module`
    /// for `None`), `None` for an empty group.
    pub fn group(
        &mut self,
        parent: Option<SchemaId>,
        module: ModuleId,
        output: bool,
    ) -> Result<Option<(SchemaId, &SiblingHashTable)>, TableError> {
        let ctx = self.ctx;
        let Some(first) = ctx.data_children(parent, module, output).next() else {
            return Ok(None);
        };
        self.build_once(first, || ctx.data_children(parent, module, output))
    }

    /// Table of the group a schema node belongs to.
    pub fn group_of(&mut self, id: SchemaId) -> Result<Option<(SchemaId, &SiblingHashTable)>, TableError> {
        let ctx = self.ctx;
        let Some(first) = ctx.first_sibling(id) else {
            return Ok(None);
        };
        self.build_once(first, || ctx.sibling_group(id))
    }

    fn build_once<I>(
        &mut self,
        first: SchemaId,
        siblings: impl FnOnce() -> I,
    ) -> Result<Option<(SchemaId, &SiblingHashTable)>, TableError>
    where
        I: IntoIterator<Item = SchemaId>,
    {
        if !self.tables.contains_key(&first) {
            let table = SiblingHashTable::build(&self.hasher, siblings())?;
            debug!(
                first = self.ctx.node(first).name(),
                siblings = table.len(),
                "built sibling hash table"
            );
            self.tables
                .try_reserve(1)
                .map_err(|_| TableError::OutOfMemory)?;
            self.tables.insert(first, table);
        }
        Ok(self.tables.get(&first).map(|table| (first, table)))
    }

    /// Already built table of the group starting with `first`.
    pub fn table(&self, first: SchemaId) -> Option<&SiblingHashTable> {
        self.tables.get(&first)
    }

    /// Number of tables built so far.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LeafType, SchemaKind, TermSpec};

    fn leaf() -> SchemaKind {
        SchemaKind::Leaf(TermSpec::new(LeafType::String))
    }

    #[test]
    fn test_one_at_a_time_reference_values() {
        assert_eq!(node_hash(HashAlgorithm::OneAtATime, "a", "x", 0), 0xC2);
        assert_eq!(node_hash(HashAlgorithm::OneAtATime, "a", "x", 1), 0x74);
        assert_eq!(node_hash(HashAlgorithm::OneAtATime, "sample", "top", 0), 0xBC);
        assert_eq!(node_hash(HashAlgorithm::OneAtATime, "sample", "top", 3), 0x10);
        assert_eq!(hash_finish(hash_multi(hash_multi(0, b"a"), b"x")), 0xC61C_1EC2);
    }

    #[test]
    fn test_depth_markers() {
        for algorithm in [HashAlgorithm::OneAtATime, HashAlgorithm::Xxh3] {
            for depth in 0..HASH_BITS as u8 {
                let hash = node_hash(algorithm, "mod", "node", depth);
                assert_eq!(hash.leading_zeros() as u8, depth);
            }
        }
        // the last depth has no hash bits left
        assert_eq!(node_hash(HashAlgorithm::Xxh3, "m", "n", 7), 0x01);
    }

    #[test]
    fn test_high_bytes_are_sign_extended() {
        let signed = hash_multi(0, &[0xC3]);
        let mut expected = 0u32.wrapping_sub(0x3D);
        expected = expected.wrapping_add(expected << 10);
        expected ^= expected >> 6;
        assert_eq!(signed, expected);
    }

    #[test]
    fn test_header_bits() {
        for algorithm in [HashAlgorithm::OneAtATime, HashAlgorithm::Xxh3] {
            assert_eq!(HashAlgorithm::from_header_bits(algorithm.header_bits()), Some(algorithm));
        }
        assert_eq!(HashAlgorithm::from_header_bits(0x30), None);
    }

    #[test]
    fn test_chain_wire_order() {
        let data = [0x21u8, 0x55, 0xC0];
        let mut iter = data.iter().copied();
        let chain = HashChain::read(|| iter.next().ok_or(DecodeError::UnexpectedEof { context: "hash" })).unwrap();
        assert_eq!(chain.depth(), 2);
        assert_eq!(chain.hashes(), &[0xC0, 0x55, 0x21]);
        assert_eq!(chain.wire_bytes().collect::<Vec<_>>(), data);
    }

    #[test]
    fn test_chain_rejects_bad_markers() {
        for data in [vec![0x00], vec![0x21, 0x80, 0xC0], vec![0x40, 0x40]] {
            let mut iter = data.into_iter();
            let result = HashChain::read(|| iter.next().ok_or(DecodeError::UnexpectedEof { context: "hash" }));
            assert!(matches!(result, Err(DecodeError::InvalidHash { .. })));
        }
    }

    #[test]
    fn test_distinct_siblings_get_depth_zero() {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("sample", None).unwrap();
        let a = ctx.add_node(m, None, "alpha", leaf()).unwrap();
        let b = ctx.add_node(m, None, "beta", leaf()).unwrap();
        let hasher = NodeHasher::new(&ctx, HashAlgorithm::OneAtATime, false);
        let table = SiblingHashTable::build(&hasher, ctx.data_children(None, m, false)).unwrap();

        for id in [a, b] {
            let chain = table.find(id).unwrap();
            assert_eq!(chain.depth(), 0);
            assert_eq!(table.resolve(&chain), Some(id));
        }
    }

    #[test]
    fn test_identical_siblings_exhaust_hash_space() {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("a", None).unwrap();
        let x = ctx.add_node(m, None, "x", leaf()).unwrap();

        // a context never holds two equal data siblings, so repeat one node
        let hasher = NodeHasher::new(&ctx, HashAlgorithm::OneAtATime, false);
        let result = SiblingHashTable::build(&hasher, [x, x]);
        assert_eq!(
            result.unwrap_err(),
            TableError::Exhausted {
                module: "a".to_string(),
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_collision_moves_to_next_depth() {
        // find two names colliding at depth 0 within one module
        let names: Vec<String> = (0..512).map(|i| format!("n{}", i)).collect();
        let mut seen: FxHashMap<u8, &str> = FxHashMap::default();
        let (first, second) = names
            .iter()
            .find_map(|n| {
                let h = node_hash(HashAlgorithm::OneAtATime, "m", n, 0);
                match seen.insert(h, n.as_str()) {
                    Some(prev) => Some((prev.to_string(), n.clone())),
                    None => None,
                }
            })
            .unwrap();

        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("m", None).unwrap();
        let a = ctx.add_node(m, None, &first, leaf()).unwrap();
        let b = ctx.add_node(m, None, &second, leaf()).unwrap();
        let hasher = NodeHasher::new(&ctx, HashAlgorithm::OneAtATime, false);
        let table = SiblingHashTable::build(&hasher, ctx.data_children(None, m, false)).unwrap();

        assert_eq!(table.find(a).unwrap().depth(), 0);
        let chain_b = table.find(b).unwrap();
        assert!(chain_b.depth() >= 1);
        assert_eq!(chain_b.hashes()[0], table.find(a).unwrap().hashes()[0]);
        assert_eq!(table.resolve(&chain_b), Some(b));
    }

    #[test]
    fn test_cache_builds_each_group_once() {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("sample", None).unwrap();
        let top = ctx.add_node(m, None, "top", SchemaKind::Container).unwrap();
        let a = ctx.add_node(m, Some(top), "a", leaf()).unwrap();
        let b = ctx.add_node(m, Some(top), "b", leaf()).unwrap();

        let mut cache = HashTableCache::new(&ctx, HashAlgorithm::OneAtATime, false);
        let (first, _) = cache.group_of(a).unwrap().unwrap();
        assert_eq!(first, a);
        let (first, table) = cache.group_of(b).unwrap().unwrap();
        assert_eq!(first, a);
        assert!(table.find(b).is_some());
        cache.group_of(top).unwrap();
        assert_eq!(cache.len(), 2);
        // group() and group_of() share the table of one group
        let (first, _) = cache.group(Some(top), m, false).unwrap().unwrap();
        assert_eq!(first, a);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_ext_root_is_its_own_group() {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("sample", None).unwrap();
        ctx.add_node(m, None, "top", SchemaKind::Container).unwrap();
        let root = ctx.add_ext_node(m, "mounted", SchemaKind::Container).unwrap();

        let mut cache = HashTableCache::new(&ctx, HashAlgorithm::OneAtATime, false);
        let (first, table) = cache.group_of(root).unwrap().unwrap();
        assert_eq!(first, root);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_precomputed_hashes_match() {
        let mut ctx = SchemaContext::new();
        let m = ctx.add_module("sample", None).unwrap();
        let top = ctx.add_node(m, None, "top", SchemaKind::Container).unwrap();
        ctx.precompute_hashes(HashAlgorithm::OneAtATime);

        let cached = NodeHasher::new(&ctx, HashAlgorithm::OneAtATime, true);
        let fresh = NodeHasher::new(&ctx, HashAlgorithm::OneAtATime, false);
        for depth in 0..HASH_BITS as u8 {
            assert_eq!(cached.hash(top, depth), fresh.hash(top, depth));
        }
    }
}
