use crate::{SymbolStr, ast::NodeRef, base::NullableValue};
use smallvec::SmallVec;
use std::fmt::{self, Debug};

/// One node of the netlist tree.
///
/// `parent` is the owning node; it is null for root-owned nodes (modules,
/// type-table dtypes) and for detached subtrees. `dtype` is a non-owning
/// type edge; dtype nodes may point at themselves. `child_dtype` is an
/// *owned* type subtree that dies with the node.
pub struct AstNode {
    pub parent: NodeRef,
    pub dtype: NodeRef,
    pub child_dtype: NodeRef,
    pub data: NodeData,
}

impl AstNode {
    pub fn new(data: NodeData) -> Self {
        Self {
            parent: NodeRef::new_null(),
            dtype: NodeRef::new_null(),
            child_dtype: NodeRef::new_null(),
            data,
        }
    }

    /// Visit every owned child in tree order, `child_dtype` first.
    pub fn for_each_child(&self, mut f: impl FnMut(NodeRef)) {
        if self.child_dtype.is_nonnull() {
            f(self.child_dtype);
        }
        self.data.for_each_child(&mut f);
    }
}

impl Debug for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AstNode({:?}", self.data.kind())?;
        if let Some(name) = self.data.name() {
            write!(f, " `{name}`")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Module,
    Cell,
    Scope,
    VarScope,
    Var,
    BasicDType,
    StructDType,
    MemberDType,
    RefDType,
    Typedef,
    Modport,
    CFunc,
    VarRef,
    FTaskRef,
    EnumItemRef,
    Assign,
    Sel,
    BinOp,
    Const,
    Display,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Plain,
    Package,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Logic,
    Bit,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VarFlags: u8 {
        /// Externally visible signal; never eliminable.
        const SIG_PUBLIC = 0b0000_0001;
        /// Port of its module.
        const IO         = 0b0000_0010;
        /// Compiler-introduced temporary.
        const TEMP       = 0b0000_0100;
        /// Elaboration parameter.
        const PARAM      = 0b0000_1000;
        /// Referenced by the trace/waveform machinery.
        const TRACE      = 0b0001_0000;
    }
}

impl Debug for VarFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("VarFlags(NONE)");
        }
        let mut parts = SmallVec::<[&str; 5]>::new();
        if self.contains(Self::SIG_PUBLIC) {
            parts.push("SIG_PUBLIC");
        }
        if self.contains(Self::IO) {
            parts.push("IO");
        }
        if self.contains(Self::TEMP) {
            parts.push("TEMP");
        }
        if self.contains(Self::PARAM) {
            parts.push("PARAM");
        }
        if self.contains(Self::TRACE) {
            parts.push("TRACE");
        }
        write!(f, "VarFlags({})", parts.join("|"))
    }
}

// -- Per-kind payloads --

#[derive(Debug, Clone)]
pub struct ModuleData {
    pub name: SymbolStr,
    pub kind: ModuleKind,
    /// 1 = wrapper, 2 = top user module, >= 3 = nested.
    pub level: u32,
    /// Compiler-internal module; never removed.
    pub internal: bool,
    pub stmts: Vec<NodeRef>,
}

impl ModuleData {
    pub fn new(name: &str, level: u32) -> Self {
        Self {
            name: SymbolStr::new(name),
            kind: ModuleKind::Plain,
            level,
            internal: false,
            stmts: Vec::new(),
        }
    }
    pub fn new_package(name: &str, level: u32) -> Self {
        Self { kind: ModuleKind::Package, ..Self::new(name, level) }
    }
    pub fn new_interface(name: &str, level: u32) -> Self {
        Self { kind: ModuleKind::Interface, ..Self::new(name, level) }
    }
    pub fn is_package(&self) -> bool {
        self.kind == ModuleKind::Package
    }
}

#[derive(Debug, Clone)]
pub struct CellData {
    pub name: SymbolStr,
    /// Target module of the instantiation (pointer edge).
    pub modulep: NodeRef,
}

#[derive(Debug, Clone)]
pub struct ScopeData {
    pub name: SymbolStr,
    /// Enclosing scope (pointer edge); null only for the top scope.
    pub above: NodeRef,
    pub varscopes: Vec<NodeRef>,
    pub blocks: Vec<NodeRef>,
    pub final_clks: Vec<NodeRef>,
    pub is_top: bool,
}

impl ScopeData {
    pub fn new(name: &str, above: NodeRef) -> Self {
        Self {
            name: SymbolStr::new(name),
            above,
            varscopes: Vec::new(),
            blocks: Vec::new(),
            final_clks: Vec::new(),
            is_top: false,
        }
    }
    pub fn new_top(name: &str) -> Self {
        Self { is_top: true, ..Self::new(name, NodeRef::new_null()) }
    }
}

#[derive(Debug, Clone)]
pub struct VarScopeData {
    pub scope: NodeRef,
    pub var: NodeRef,
}

#[derive(Debug, Clone)]
pub struct VarData {
    pub name: SymbolStr,
    pub flags: VarFlags,
}

impl VarData {
    pub fn new(name: &str, flags: VarFlags) -> Self {
        Self { name: SymbolStr::new(name), flags }
    }
}

#[derive(Debug, Clone)]
pub struct BasicDTypeData {
    pub kind: BasicKind,
    pub width: u32,
    /// Generic placeholder types are never swept.
    pub generic: bool,
}

#[derive(Debug, Clone)]
pub struct StructDTypeData {
    pub name: SymbolStr,
    pub packed: bool,
    pub members: Vec<NodeRef>,
}

#[derive(Debug, Clone)]
pub struct MemberDTypeData {
    pub name: SymbolStr,
}

#[derive(Debug, Clone)]
pub struct RefDTypeData {
    pub name: SymbolStr,
    /// Resolved referenced dtype (pointer edge).
    pub target: NodeRef,
    /// Package the name was resolved through; redundant after scoping.
    pub package: NodeRef,
}

#[derive(Debug, Clone)]
pub struct TypedefData {
    pub name: SymbolStr,
    pub attr_public: bool,
}

#[derive(Debug, Clone)]
pub struct ModportData {
    pub name: SymbolStr,
    pub vars: Vec<NodeRef>,
}

#[derive(Debug, Clone)]
pub struct CFuncData {
    pub name: SymbolStr,
    /// Scope the generated function evaluates in (pointer edge).
    pub scope: NodeRef,
    pub stmts: Vec<NodeRef>,
}

#[derive(Debug, Clone)]
pub struct VarRefData {
    pub name: SymbolStr,
    pub var: NodeRef,
    pub varscope: NodeRef,
    /// Package the name was resolved through; redundant after scoping.
    pub package: NodeRef,
    pub lvalue: bool,
}

#[derive(Debug, Clone)]
pub struct FTaskRefData {
    pub name: SymbolStr,
    pub package: NodeRef,
    pub args: Vec<NodeRef>,
}

#[derive(Debug, Clone)]
pub struct EnumItemRefData {
    pub name: SymbolStr,
    pub package: NodeRef,
}

#[derive(Debug, Clone)]
pub struct AssignData {
    pub lhs: NodeRef,
    pub rhs: NodeRef,
}

#[derive(Debug, Clone)]
pub struct SelData {
    pub from: NodeRef,
    pub bit: NodeRef,
}

#[derive(Debug, Clone)]
pub struct BinOpData {
    pub op: BinOp,
    pub lhs: NodeRef,
    pub rhs: NodeRef,
}

#[derive(Debug, Clone)]
pub struct ConstData {
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct DisplayData {
    pub text: SymbolStr,
    pub args: Vec<NodeRef>,
}

#[derive(Debug, Clone, Default)]
pub struct AlwaysData {
    pub stmts: Vec<NodeRef>,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Module(ModuleData),
    Cell(CellData),
    Scope(ScopeData),
    VarScope(VarScopeData),
    Var(VarData),
    BasicDType(BasicDTypeData),
    StructDType(StructDTypeData),
    MemberDType(MemberDTypeData),
    RefDType(RefDTypeData),
    Typedef(TypedefData),
    Modport(ModportData),
    CFunc(CFuncData),
    VarRef(VarRefData),
    FTaskRef(FTaskRefData),
    EnumItemRef(EnumItemRefData),
    Assign(AssignData),
    Sel(SelData),
    BinOp(BinOpData),
    Const(ConstData),
    Display(DisplayData),
    Always(AlwaysData),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        use NodeData::*;
        match self {
            Module(_) => NodeKind::Module,
            Cell(_) => NodeKind::Cell,
            Scope(_) => NodeKind::Scope,
            VarScope(_) => NodeKind::VarScope,
            Var(_) => NodeKind::Var,
            BasicDType(_) => NodeKind::BasicDType,
            StructDType(_) => NodeKind::StructDType,
            MemberDType(_) => NodeKind::MemberDType,
            RefDType(_) => NodeKind::RefDType,
            Typedef(_) => NodeKind::Typedef,
            Modport(_) => NodeKind::Modport,
            CFunc(_) => NodeKind::CFunc,
            VarRef(_) => NodeKind::VarRef,
            FTaskRef(_) => NodeKind::FTaskRef,
            EnumItemRef(_) => NodeKind::EnumItemRef,
            Assign(_) => NodeKind::Assign,
            Sel(_) => NodeKind::Sel,
            BinOp(_) => NodeKind::BinOp,
            Const(_) => NodeKind::Const,
            Display(_) => NodeKind::Display,
            Always(_) => NodeKind::Always,
        }
    }

    pub fn name(&self) -> Option<&str> {
        use NodeData::*;
        match self {
            Module(m) => Some(&m.name),
            Cell(c) => Some(&c.name),
            Scope(s) => Some(&s.name),
            Var(v) => Some(&v.name),
            StructDType(s) => Some(&s.name),
            MemberDType(m) => Some(&m.name),
            RefDType(r) => Some(&r.name),
            Typedef(t) => Some(&t.name),
            Modport(m) => Some(&m.name),
            CFunc(c) => Some(&c.name),
            VarRef(v) => Some(&v.name),
            FTaskRef(f) => Some(&f.name),
            EnumItemRef(e) => Some(&e.name),
            _ => None,
        }
    }

    /// Pure-arithmetic subtree roots; the dead-module count fixup skips these.
    pub fn is_math(&self) -> bool {
        use NodeData::*;
        matches!(self, Const(_) | BinOp(_) | Sel(_) | VarRef(_) | EnumItemRef(_))
    }

    /// Nodes with an externally observable effect ($display and friends).
    pub fn is_outputter(&self) -> bool {
        matches!(self, NodeData::Display(_))
    }

    pub fn is_dtype(&self) -> bool {
        use NodeData::*;
        matches!(self, BasicDType(_) | StructDType(_) | MemberDType(_) | RefDType(_))
    }

    /// The generic flag of dtype nodes; non-dtype nodes report false.
    pub fn is_generic_dtype(&self) -> bool {
        matches!(self, NodeData::BasicDType(b) if b.generic)
    }

    /// The dtype a ref-style dtype forwards to, if any.
    pub fn virt_ref_dtype(&self) -> NodeRef {
        match self {
            NodeData::RefDType(r) => r.target,
            _ => NodeRef::new_null(),
        }
    }

    /// Package back-pointer of reference nodes, if the kind carries one.
    pub fn package(&self) -> NodeRef {
        use NodeData::*;
        match self {
            RefDType(r) => r.package,
            VarRef(v) => v.package,
            FTaskRef(f) => f.package,
            EnumItemRef(e) => e.package,
            _ => NodeRef::new_null(),
        }
    }

    /// Clear the package back-pointer. Panics on kinds without one.
    pub fn clear_package(&mut self) {
        use NodeData::*;
        match self {
            RefDType(r) => r.package = NodeRef::new_null(),
            VarRef(v) => v.package = NodeRef::new_null(),
            FTaskRef(f) => f.package = NodeRef::new_null(),
            EnumItemRef(e) => e.package = NodeRef::new_null(),
            other => panic!("clear_package on {:?}", other.kind()),
        }
    }

    pub fn as_module(&self) -> Option<&ModuleData> {
        match self {
            NodeData::Module(m) => Some(m),
            _ => None,
        }
    }
    pub fn as_scope(&self) -> Option<&ScopeData> {
        match self {
            NodeData::Scope(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_var(&self) -> Option<&VarData> {
        match self {
            NodeData::Var(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_varscope(&self) -> Option<&VarScopeData> {
        match self {
            NodeData::VarScope(vs) => Some(vs),
            _ => None,
        }
    }

    fn for_each_child(&self, f: &mut impl FnMut(NodeRef)) {
        use NodeData::*;
        match self {
            Module(m) => m.stmts.iter().copied().for_each(f),
            Scope(s) => {
                s.varscopes.iter().copied().for_each(&mut *f);
                s.blocks.iter().copied().for_each(&mut *f);
                s.final_clks.iter().copied().for_each(f);
            }
            StructDType(s) => s.members.iter().copied().for_each(f),
            Modport(m) => m.vars.iter().copied().for_each(f),
            CFunc(c) => c.stmts.iter().copied().for_each(f),
            FTaskRef(t) => t.args.iter().copied().for_each(f),
            Assign(a) => {
                f(a.lhs);
                f(a.rhs);
            }
            Sel(s) => {
                f(s.from);
                f(s.bit);
            }
            BinOp(b) => {
                f(b.lhs);
                f(b.rhs);
            }
            Display(d) => d.args.iter().copied().for_each(f),
            Always(a) => a.stmts.iter().copied().for_each(f),
            Cell(_) | VarScope(_) | Var(_) | BasicDType(_) | MemberDType(_) | RefDType(_)
            | Typedef(_) | VarRef(_) | EnumItemRef(_) | Const(_) => {}
        }
    }

    /// Remove `child` from whichever owning list holds it. Returns false if
    /// this node does not own `child` through a list edge.
    pub(super) fn remove_child(&mut self, child: NodeRef) -> bool {
        use NodeData::*;
        fn take(list: &mut Vec<NodeRef>, child: NodeRef) -> bool {
            match list.iter().position(|&c| c == child) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            }
        }
        match self {
            Module(m) => take(&mut m.stmts, child),
            Scope(s) => {
                take(&mut s.varscopes, child)
                    || take(&mut s.blocks, child)
                    || take(&mut s.final_clks, child)
            }
            StructDType(s) => take(&mut s.members, child),
            Modport(m) => take(&mut m.vars, child),
            CFunc(c) => take(&mut c.stmts, child),
            FTaskRef(t) => take(&mut t.args, child),
            Display(d) => take(&mut d.args, child),
            Always(a) => take(&mut a.stmts, child),
            _ => false,
        }
    }
}
