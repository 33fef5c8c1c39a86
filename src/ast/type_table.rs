use crate::{
    ast::{AstNode, BasicKind, NodeData, NodeRef},
    base::SlabRef,
};
use slab::Slab;
use std::collections::HashMap;

/// Interning key of a basic dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub kind: BasicKind,
    pub width: u32,
}

/// The netlist's global dtype pool plus a dedup cache for basic dtypes.
///
/// Between [`TypeTable::clear_cache`] and [`TypeTable::repair_cache`] the
/// cache is declared invalid; a pass may freely delete pooled dtypes in
/// that window and the repair rebuilds the cache from whatever survived.
pub struct TypeTable {
    pool: Vec<NodeRef>,
    cache: HashMap<TypeKey, NodeRef>,
    cache_valid: bool,
}

impl TypeTable {
    pub fn new() -> Self {
        Self { pool: Vec::new(), cache: HashMap::new(), cache_valid: true }
    }

    pub fn pool(&self) -> &[NodeRef] {
        &self.pool
    }
    pub fn pool_push(&mut self, d: NodeRef) {
        self.pool.push(d);
    }
    pub fn pool_contains(&self, d: NodeRef) -> bool {
        self.pool.contains(&d)
    }
    pub fn pool_remove(&mut self, d: NodeRef) -> bool {
        match self.pool.iter().position(|&p| p == d) {
            Some(pos) => {
                self.pool.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn cache_lookup(&self, key: TypeKey) -> Option<NodeRef> {
        debug_assert!(self.cache_valid, "type-table cache used while cleared");
        self.cache.get(&key).copied()
    }
    pub fn cache_insert(&mut self, key: TypeKey, d: NodeRef) {
        debug_assert!(self.cache_valid, "type-table cache used while cleared");
        self.cache.insert(key, d);
        self.pool.push(d);
    }

    /// Drop the dedup cache before a pass starts deleting dtypes.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_valid = false;
    }

    /// Forget deleted pool entries and re-intern the surviving basic
    /// dtypes.
    pub fn repair_cache(&mut self, nodes: &Slab<AstNode>) {
        self.pool.retain(|d| d.is_alive(nodes));
        self.cache.clear();
        for &d in &self.pool {
            if let NodeData::BasicDType(b) = &d.to_data(nodes).data {
                self.cache.insert(TypeKey { kind: b.kind, width: b.width }, d);
            }
        }
        self.cache_valid = true;
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Netlist;

    #[test]
    fn basic_dtypes_intern_through_the_cache() {
        let mut nl = Netlist::new("t");
        let a = nl.find_basic_dtype(BasicKind::Logic, 32);
        let b = nl.find_basic_dtype(BasicKind::Logic, 32);
        let c = nl.find_basic_dtype(BasicKind::Logic, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(nl.node(a).dtype, a); // dtype nodes self-reference
        assert_eq!(nl.types.pool().len(), 2);
    }

    #[test]
    fn repair_drops_dead_pool_entries_and_reinterns() {
        let mut nl = Netlist::new("t");
        let a = nl.find_basic_dtype(BasicKind::Logic, 32);
        let b = nl.find_basic_dtype(BasicKind::Bit, 1);

        nl.types.clear_cache();
        nl.unlink(b).unwrap();
        nl.delete_tree(b).unwrap();
        nl.repair_cache();

        assert_eq!(nl.types.pool(), &[a]);
        // the survivor is found again, the dead key re-creates
        assert_eq!(nl.find_basic_dtype(BasicKind::Logic, 32), a);
        let b2 = nl.find_basic_dtype(BasicKind::Bit, 1);
        assert!(nl.is_alive(b2));
        assert_eq!(nl.types.pool().len(), 2);
    }
}
