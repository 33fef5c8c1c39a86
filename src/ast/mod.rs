//! Netlist abstract syntax tree.
//!
//! The tree is arena-backed: every node lives in one `Slab<AstNode>` owned
//! by the [`Netlist`] root and is addressed through a [`NodeRef`] handle.
//! Ownership edges (module statements, scope lists, expression operands)
//! carry the tree shape; pointer edges (a cell's target module, a varref's
//! variable, every `dtype`) cross-link it.

mod netlist;
mod node;
mod type_table;

pub mod writer;

pub use self::{
    netlist::{Netlist, SurgeryError},
    node::{
        AlwaysData, AssignData, AstNode, BasicDTypeData, BasicKind, BinOp, BinOpData, CFuncData,
        CellData, ConstData, DisplayData, EnumItemRefData, FTaskRefData, MemberDTypeData,
        ModportData, ModuleData, ModuleKind, NodeData, NodeKind, RefDTypeData, ScopeData, SelData,
        StructDTypeData, TypedefData, VarData, VarFlags, VarRefData, VarScopeData,
    },
    type_table::{TypeKey, TypeTable},
};

use crate::base::{NullableValue, SlabRef};
use std::fmt;

/// Handle of one AST node in the netlist arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(usize);

impl SlabRef for NodeRef {
    type Item = AstNode;

    fn from_handle(handle: usize) -> Self {
        NodeRef(handle)
    }
    fn get_handle(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() { write!(f, "NodeRef(null)") } else { write!(f, "NodeRef({})", self.0) }
    }
}
