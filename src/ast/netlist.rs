use crate::{
    SymbolStr,
    ast::{
        AstNode, BasicDTypeData, BasicKind, ModuleData, NodeData, NodeKind, NodeRef, ScopeData,
        TypeKey, TypeTable, VarScopeData,
    },
    base::{NullableValue, SlabRef},
};
use slab::Slab;
use smallvec::SmallVec;

/// Tree-surgery failures. Steady-state passes treat all of these as fatal;
/// they indicate an upstream bug, not a recoverable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SurgeryError {
    #[error("node {0:?} is not in the arena (already deleted?)")]
    DeadNode(NodeRef),
    #[error("node {0:?} is already detached; cannot unlink it again")]
    AlreadyDetached(NodeRef),
    #[error("node {0:?} missing from the child lists of its parent {1:?}")]
    NotInParent(NodeRef, NodeRef),
    #[error("node {0:?} is still attached; unlink it before deleting")]
    StillAttached(NodeRef),
}

/// Root of the design under compilation: the node arena, the module list
/// and the type table. Nodes owned directly by the root (modules, pooled
/// dtypes) carry a null parent.
pub struct Netlist {
    pub name: SymbolStr,
    pub nodes: Slab<AstNode>,
    pub modules: Vec<NodeRef>,
    pub types: TypeTable,
    deferred: Vec<NodeRef>,
}

impl Netlist {
    pub fn new(name: &str) -> Self {
        Self {
            name: SymbolStr::new(name),
            nodes: Slab::with_capacity(64),
            modules: Vec::new(),
            types: TypeTable::new(),
            deferred: Vec::new(),
        }
    }

    // -- Node access --

    pub fn node(&self, n: NodeRef) -> &AstNode {
        n.to_data(&self.nodes)
    }
    pub fn node_mut(&mut self, n: NodeRef) -> &mut AstNode {
        n.to_data_mut(&mut self.nodes)
    }
    pub fn is_alive(&self, n: NodeRef) -> bool {
        n.is_alive(&self.nodes)
    }
    pub fn kind(&self, n: NodeRef) -> NodeKind {
        self.node(n).data.kind()
    }
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn module(&self, n: NodeRef) -> &ModuleData {
        self.node(n).data.as_module().expect("not a Module node")
    }
    pub fn scope(&self, n: NodeRef) -> &ScopeData {
        self.node(n).data.as_scope().expect("not a Scope node")
    }
    pub fn varscope(&self, n: NodeRef) -> &VarScopeData {
        self.node(n).data.as_varscope().expect("not a VarScope node")
    }

    // -- Construction --

    /// Allocate a detached node. Attach it with one of the `add_*`
    /// helpers, or leave it root-owned via [`Netlist::add_module`] /
    /// [`Netlist::add_pool_dtype`].
    pub fn new_node(&mut self, data: NodeData) -> NodeRef {
        NodeRef::from_handle(self.nodes.insert(AstNode::new(data)))
    }

    pub fn set_dtype(&mut self, n: NodeRef, dtype: NodeRef) {
        self.node_mut(n).dtype = dtype;
    }

    /// Attach `dtype` as the owned child dtype of `n`.
    pub fn set_child_dtype(&mut self, n: NodeRef, dtype: NodeRef) {
        self.node_mut(dtype).parent = n;
        self.node_mut(n).child_dtype = dtype;
    }

    /// Create a root-owned module and register it in the module list.
    pub fn add_module(&mut self, data: ModuleData) -> NodeRef {
        let m = self.new_node(NodeData::Module(data));
        self.modules.push(m);
        m
    }

    /// Move `dtype` into the type-table pool (root-owned).
    pub fn add_pool_dtype(&mut self, data: NodeData) -> NodeRef {
        debug_assert!(data.is_dtype());
        let d = self.new_node(data);
        self.types.pool_push(d);
        d
    }

    /// Intern a basic dtype through the type-table cache. The returned
    /// node's dtype edge self-loops, as all dtype nodes do.
    pub fn find_basic_dtype(&mut self, kind: BasicKind, width: u32) -> NodeRef {
        let key = TypeKey { kind, width };
        if let Some(d) = self.types.cache_lookup(key) {
            return d;
        }
        let d = self.new_node(NodeData::BasicDType(BasicDTypeData { kind, width, generic: false }));
        self.node_mut(d).dtype = d;
        self.types.cache_insert(key, d);
        d
    }

    /// Attach `child` into the statement list of a Module, CFunc or
    /// Always node.
    pub fn add_stmt(&mut self, parent: NodeRef, child: NodeRef) {
        self.node_mut(child).parent = parent;
        match &mut self.node_mut(parent).data {
            NodeData::Module(m) => m.stmts.push(child),
            NodeData::CFunc(c) => c.stmts.push(child),
            NodeData::Always(a) => a.stmts.push(child),
            other => panic!("add_stmt into {:?}", other.kind()),
        }
    }

    pub fn scope_add_varscope(&mut self, scope: NodeRef, vs: NodeRef) {
        self.node_mut(vs).parent = scope;
        match &mut self.node_mut(scope).data {
            NodeData::Scope(s) => s.varscopes.push(vs),
            other => panic!("scope_add_varscope into {:?}", other.kind()),
        }
    }
    pub fn scope_add_block(&mut self, scope: NodeRef, block: NodeRef) {
        self.node_mut(block).parent = scope;
        match &mut self.node_mut(scope).data {
            NodeData::Scope(s) => s.blocks.push(block),
            other => panic!("scope_add_block into {:?}", other.kind()),
        }
    }
    pub fn scope_add_final_clk(&mut self, scope: NodeRef, clk: NodeRef) {
        self.node_mut(clk).parent = scope;
        match &mut self.node_mut(scope).data {
            NodeData::Scope(s) => s.final_clks.push(clk),
            other => panic!("scope_add_final_clk into {:?}", other.kind()),
        }
    }
    pub fn struct_add_member(&mut self, dtype: NodeRef, member: NodeRef) {
        self.node_mut(member).parent = dtype;
        match &mut self.node_mut(dtype).data {
            NodeData::StructDType(s) => s.members.push(member),
            other => panic!("struct_add_member into {:?}", other.kind()),
        }
    }
    pub fn modport_add_var(&mut self, modport: NodeRef, var_ref: NodeRef) {
        self.node_mut(var_ref).parent = modport;
        match &mut self.node_mut(modport).data {
            NodeData::Modport(m) => m.vars.push(var_ref),
            other => panic!("modport_add_var into {:?}", other.kind()),
        }
    }
    pub fn list_add_arg(&mut self, parent: NodeRef, arg: NodeRef) {
        self.node_mut(arg).parent = parent;
        match &mut self.node_mut(parent).data {
            NodeData::FTaskRef(t) => t.args.push(arg),
            NodeData::Display(d) => d.args.push(arg),
            other => panic!("list_add_arg into {:?}", other.kind()),
        }
    }

    /// Attach the operands of an Assign / Sel / BinOp slot node.
    pub fn set_operands(&mut self, parent: NodeRef, lhs: NodeRef, rhs: NodeRef) {
        self.node_mut(lhs).parent = parent;
        self.node_mut(rhs).parent = parent;
        match &mut self.node_mut(parent).data {
            NodeData::Assign(a) => {
                a.lhs = lhs;
                a.rhs = rhs;
            }
            NodeData::Sel(s) => {
                s.from = lhs;
                s.bit = rhs;
            }
            NodeData::BinOp(b) => {
                b.lhs = lhs;
                b.rhs = rhs;
            }
            other => panic!("set_operands on {:?}", other.kind()),
        }
    }

    // -- Surgery --

    /// Detach `n` from its owner: the parent node's child lists, or the
    /// module list / type pool for root-owned nodes. Returns `n` detached.
    pub fn unlink(&mut self, n: NodeRef) -> Result<NodeRef, SurgeryError> {
        if !self.is_alive(n) {
            return Err(SurgeryError::DeadNode(n));
        }
        let parent = self.node(n).parent;
        if parent.is_null() {
            if let Some(pos) = self.modules.iter().position(|&m| m == n) {
                self.modules.remove(pos);
                return Ok(n);
            }
            if self.types.pool_remove(n) {
                return Ok(n);
            }
            return Err(SurgeryError::AlreadyDetached(n));
        }
        let pnode = self.node_mut(parent);
        if pnode.child_dtype == n {
            pnode.child_dtype = NodeRef::new_null();
        } else if !pnode.data.remove_child(n) {
            return Err(SurgeryError::NotInParent(n, parent));
        }
        self.node_mut(n).parent = NodeRef::new_null();
        Ok(n)
    }

    /// Free a detached subtree, children included.
    pub fn delete_tree(&mut self, n: NodeRef) -> Result<(), SurgeryError> {
        if !self.is_alive(n) {
            return Err(SurgeryError::DeadNode(n));
        }
        if self.node(n).parent.is_nonnull()
            || self.modules.contains(&n)
            || self.types.pool_contains(n)
        {
            return Err(SurgeryError::StillAttached(n));
        }
        let mut stack = SmallVec::<[NodeRef; 8]>::new();
        stack.push(n);
        while let Some(cur) = stack.pop() {
            self.node(cur).for_each_child(|c| stack.push(c));
            self.nodes.remove(cur.get_handle());
        }
        Ok(())
    }

    /// Queue a detached subtree for deletion at [`Netlist::flush_deletes`].
    /// Lets a traversal drop nodes out from under itself without
    /// invalidating handles it has still to visit.
    pub fn push_delete_later(&mut self, n: NodeRef) {
        debug_assert!(self.is_alive(n) && self.node(n).parent.is_null());
        self.deferred.push(n);
    }

    pub fn flush_deletes(&mut self) {
        let queue = std::mem::take(&mut self.deferred);
        for n in queue {
            self.delete_tree(n).expect("deferred delete of an attached or dead subtree");
        }
    }

    /// Rebuild the type-table cache from the nodes that survived a pass.
    pub fn repair_cache(&mut self) {
        let Netlist { nodes, types, .. } = self;
        types.repair_cache(nodes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CellData, VarData, VarFlags};

    fn small_netlist() -> (Netlist, NodeRef, NodeRef) {
        let mut nl = Netlist::new("t");
        let top = nl.add_module(ModuleData::new("top", 2));
        let v = nl.new_node(NodeData::Var(VarData::new("v", VarFlags::empty())));
        nl.add_stmt(top, v);
        (nl, top, v)
    }

    #[test]
    fn unlink_detaches_from_parent_list() {
        let (mut nl, top, v) = small_netlist();
        nl.unlink(v).unwrap();
        assert!(nl.module(top).stmts.is_empty());
        assert!(nl.node(v).parent.is_null());
        assert_eq!(nl.unlink(v), Err(SurgeryError::AlreadyDetached(v)));
    }

    #[test]
    fn unlink_removes_root_owned_module() {
        let (mut nl, top, _) = small_netlist();
        nl.unlink(top).unwrap();
        assert!(nl.modules.is_empty());
    }

    #[test]
    fn delete_refuses_attached_subtree() {
        let (mut nl, _, v) = small_netlist();
        assert_eq!(nl.delete_tree(v), Err(SurgeryError::StillAttached(v)));
        nl.unlink(v).unwrap();
        nl.delete_tree(v).unwrap();
        assert!(!nl.is_alive(v));
        assert_eq!(nl.delete_tree(v), Err(SurgeryError::DeadNode(v)));
    }

    #[test]
    fn delete_tree_frees_whole_subtree() {
        let (mut nl, top, _) = small_netlist();
        let cell = nl.new_node(NodeData::Cell(CellData { name: "c0".into(), modulep: top }));
        nl.add_stmt(top, cell);
        let before = nl.node_count();
        nl.unlink(top).unwrap();
        nl.delete_tree(top).unwrap();
        // top, its var and its cell all gone
        assert_eq!(nl.node_count(), before - 3);
    }

    #[test]
    fn deferred_deletes_flush_once() {
        let (mut nl, _, v) = small_netlist();
        nl.unlink(v).unwrap();
        nl.push_delete_later(v);
        assert!(nl.is_alive(v));
        nl.flush_deletes();
        assert!(!nl.is_alive(v));
    }

    #[test]
    fn child_dtype_is_an_owned_slot() {
        let (mut nl, top, v) = small_netlist();
        let d = nl.new_node(NodeData::BasicDType(BasicDTypeData {
            kind: BasicKind::Logic,
            width: 8,
            generic: false,
        }));
        nl.set_child_dtype(v, d);
        nl.unlink(v).unwrap();
        nl.delete_tree(v).unwrap();
        assert!(!nl.is_alive(d));
        assert_eq!(nl.modules, vec![top]);
    }
}
