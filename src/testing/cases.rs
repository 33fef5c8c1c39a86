//! Hand-built netlists exercising the cleanup passes.
//!
//! Each builder returns the netlist plus the handles a test needs to
//! observe. The trees are post-scoping shaped: variables live under
//! modules, varscopes under scopes, and package back-pointers are
//! redundant metadata left over from name resolution.

use crate::ast::{
    AlwaysData, AssignData, BasicKind, CellData, ConstData, DisplayData, MemberDTypeData,
    ModuleData, Netlist, NodeData, NodeRef, ScopeData, StructDTypeData, TypedefData, VarData,
    VarFlags, VarRefData, VarScopeData,
};
use crate::base::NullableValue;

pub fn logic32(nl: &mut Netlist) -> NodeRef {
    nl.find_basic_dtype(BasicKind::Logic, 32)
}

pub fn add_var(
    nl: &mut Netlist,
    module: NodeRef,
    name: &str,
    flags: VarFlags,
    dtype: NodeRef,
) -> NodeRef {
    let v = nl.new_node(NodeData::Var(VarData::new(name, flags)));
    nl.set_dtype(v, dtype);
    nl.add_stmt(module, v);
    v
}

pub fn add_top_scope(nl: &mut Netlist, module: NodeRef, name: &str) -> NodeRef {
    let s = nl.new_node(NodeData::Scope(ScopeData::new_top(name)));
    nl.add_stmt(module, s);
    s
}

pub fn add_scope(nl: &mut Netlist, module: NodeRef, name: &str, above: NodeRef) -> NodeRef {
    let s = nl.new_node(NodeData::Scope(ScopeData::new(name, above)));
    nl.add_stmt(module, s);
    s
}

pub fn add_varscope(nl: &mut Netlist, scope: NodeRef, var: NodeRef, dtype: NodeRef) -> NodeRef {
    let vs = nl.new_node(NodeData::VarScope(VarScopeData { scope, var }));
    nl.set_dtype(vs, dtype);
    nl.scope_add_varscope(scope, vs);
    vs
}

pub fn add_cell(nl: &mut Netlist, module: NodeRef, name: &str, target: NodeRef) -> NodeRef {
    let c = nl.new_node(NodeData::Cell(CellData { name: name.into(), modulep: target }));
    nl.add_stmt(module, c);
    c
}

pub fn new_varref(
    nl: &mut Netlist,
    var: NodeRef,
    varscope: NodeRef,
    package: NodeRef,
    lvalue: bool,
) -> NodeRef {
    let name = nl.node(var).data.name().unwrap_or("").to_owned();
    let dtype = nl.node(var).dtype;
    let r = nl.new_node(NodeData::VarRef(VarRefData {
        name: name.into(),
        var,
        varscope,
        package,
        lvalue,
    }));
    nl.set_dtype(r, dtype);
    r
}

/// `$display("%x", var)` under an always block: a live read of `var`
/// (and of `varscope`, when given).
pub fn add_display_use(
    nl: &mut Netlist,
    module: NodeRef,
    var: NodeRef,
    varscope: NodeRef,
    package: NodeRef,
) -> NodeRef {
    let r = new_varref(nl, var, varscope, package, false);
    let disp = nl.new_node(NodeData::Display(DisplayData { text: "%x".into(), args: Vec::new() }));
    nl.list_add_arg(disp, r);
    let always = nl.new_node(NodeData::Always(AlwaysData::default()));
    nl.add_stmt(always, disp);
    nl.add_stmt(module, always);
    r
}

/// ```verilog
/// module top;       // level 2
/// module orphan;    // level 3, instantiated nowhere
/// ```
pub fn two_modules() -> (Netlist, NodeRef, NodeRef) {
    let mut nl = Netlist::new("two_modules");
    let top = nl.add_module(ModuleData::new("top", 2));
    let orphan = nl.add_module(ModuleData::new("orphan", 3));
    (nl, top, orphan)
}

/// `top` instantiates `a`, `a` instantiates `b`; `c` hangs loose.
/// Killing `c` must not disturb the live `a`/`b` chain.
pub struct CellChainCase {
    pub nl: Netlist,
    pub top: NodeRef,
    pub a: NodeRef,
    pub b: NodeRef,
    pub c: NodeRef,
}

pub fn cell_chain() -> CellChainCase {
    let mut nl = Netlist::new("cell_chain");
    let top = nl.add_module(ModuleData::new("top", 2));
    let a = nl.add_module(ModuleData::new("a", 3));
    let b = nl.add_module(ModuleData::new("b", 4));
    let c = nl.add_module(ModuleData::new("c", 3));
    add_cell(&mut nl, top, "a0", a);
    add_cell(&mut nl, a, "b0", b);
    CellChainCase { nl, top, a, b, c }
}

/// A dead chain: `dead_mid` (level 3) instantiates `dead_leaf` (level 4),
/// and nothing instantiates `dead_mid`. Only the count fixup run over the
/// dying `dead_mid` lets `dead_leaf` go too.
pub struct DeadChainCase {
    pub nl: Netlist,
    pub top: NodeRef,
    pub mid: NodeRef,
    pub leaf: NodeRef,
}

pub fn dead_chain() -> DeadChainCase {
    let mut nl = Netlist::new("dead_chain");
    let top = nl.add_module(ModuleData::new("top", 2));
    let mid = nl.add_module(ModuleData::new("dead_mid", 3));
    let leaf = nl.add_module(ModuleData::new("dead_leaf", 4));
    add_cell(&mut nl, mid, "leaf0", leaf);
    DeadChainCase { nl, top, mid, leaf }
}

/// One compiler temporary with its varscope, never referenced.
pub struct ScopedTempVarCase {
    pub nl: Netlist,
    pub top: NodeRef,
    pub scope: NodeRef,
    pub var: NodeRef,
    pub vs: NodeRef,
}

pub fn scoped_temp_var() -> ScopedTempVarCase {
    let mut nl = Netlist::new("scoped_temp_var");
    let top = nl.add_module(ModuleData::new("top", 2));
    let dt = logic32(&mut nl);
    let scope = add_top_scope(&mut nl, top, "TOP");
    let var = add_var(&mut nl, top, "__Vtemp1", VarFlags::TEMP, dt);
    let vs = add_varscope(&mut nl, scope, var, dt);
    ScopedTempVarCase { nl, top, scope, var, vs }
}

/// Package whose only content is a public signal.
pub fn public_var_package() -> (Netlist, NodeRef, NodeRef) {
    let mut nl = Netlist::new("public_var_package");
    let pkg = nl.add_module(ModuleData::new_package("pkg", 3));
    let dt = logic32(&mut nl);
    let var = add_var(&mut nl, pkg, "cfg", VarFlags::SIG_PUBLIC, dt);
    (nl, pkg, var)
}

/// Package whose only content is a public typedef.
pub fn public_typedef_package() -> (Netlist, NodeRef, NodeRef) {
    let mut nl = Netlist::new("public_typedef_package");
    let pkg = nl.add_module(ModuleData::new_package("pkg", 3));
    let td = nl.new_node(NodeData::Typedef(TypedefData { name: "word_t".into(), attr_public: true }));
    let dt = logic32(&mut nl);
    nl.set_dtype(td, dt);
    nl.add_stmt(pkg, td);
    (nl, pkg, td)
}

/// Pooled struct dtype with two members; when `reference_member` is set a
/// surviving IO variable types itself by the first member.
pub struct StructMemberCase {
    pub nl: Netlist,
    pub top: NodeRef,
    pub st: NodeRef,
    pub m1: NodeRef,
    pub m2: NodeRef,
}

pub fn struct_with_members(reference_member: bool) -> StructMemberCase {
    let mut nl = Netlist::new("struct_with_members");
    let top = nl.add_module(ModuleData::new("top", 2));
    let st = nl.add_pool_dtype(NodeData::StructDType(StructDTypeData {
        name: "pair_t".into(),
        packed: true,
        members: Vec::new(),
    }));
    let dt = logic32(&mut nl);
    let m1 = nl.new_node(NodeData::MemberDType(MemberDTypeData { name: "lo".into() }));
    let m2 = nl.new_node(NodeData::MemberDType(MemberDTypeData { name: "hi".into() }));
    nl.set_dtype(m1, dt);
    nl.set_dtype(m2, dt);
    nl.struct_add_member(st, m1);
    nl.struct_add_member(st, m2);
    if reference_member {
        add_var(&mut nl, top, "io_lo", VarFlags::IO, m1);
    }
    StructMemberCase { nl, top, st, m1, m2 }
}

/// Straight-line `vs = 42` in an always block. With `side_effect` the
/// right-hand side is a `$display` call instead of a constant.
pub struct StraightAssignCase {
    pub nl: Netlist,
    pub top: NodeRef,
    pub scope: NodeRef,
    pub var: NodeRef,
    pub vs: NodeRef,
    pub assign: NodeRef,
    pub lhs: NodeRef,
}

pub fn straight_assign(side_effect: bool) -> StraightAssignCase {
    let mut nl = Netlist::new("straight_assign");
    let top = nl.add_module(ModuleData::new("top", 2));
    let dt = logic32(&mut nl);
    let scope = add_top_scope(&mut nl, top, "TOP");
    let var = add_var(&mut nl, top, "__Vtemp1", VarFlags::TEMP, dt);
    let vs = add_varscope(&mut nl, scope, var, dt);

    let lhs = new_varref(&mut nl, var, vs, NodeRef::new_null(), true);
    let rhs = if side_effect {
        nl.new_node(NodeData::Display(DisplayData { text: "boom".into(), args: Vec::new() }))
    } else {
        nl.new_node(NodeData::Const(ConstData { value: 42 }))
    };
    let assign = nl.new_node(NodeData::Assign(AssignData {
        lhs: NodeRef::new_null(),
        rhs: NodeRef::new_null(),
    }));
    nl.set_operands(assign, lhs, rhs);
    nl.set_dtype(assign, dt);

    let always = nl.new_node(NodeData::Always(AlwaysData::default()));
    nl.add_stmt(always, assign);
    nl.add_stmt(top, always);
    StraightAssignCase { nl, top, scope, var, vs, assign, lhs }
}

/// Scope ladder `TOP <- mid <- leaf` with nothing in the lower two.
pub struct ScopeChainCase {
    pub nl: Netlist,
    pub top_scope: NodeRef,
    pub mid: NodeRef,
    pub leaf: NodeRef,
}

pub fn empty_scope_chain() -> ScopeChainCase {
    let mut nl = Netlist::new("empty_scope_chain");
    let top = nl.add_module(ModuleData::new("top", 2));
    let top_scope = add_top_scope(&mut nl, top, "TOP");
    let mid = add_scope(&mut nl, top, "TOP.mid", top_scope);
    let leaf = add_scope(&mut nl, top, "TOP.mid.leaf", mid);
    ScopeChainCase { nl, top_scope, mid, leaf }
}

/// Interface with one empty modport and one carrying a signal.
pub struct ModportCase {
    pub nl: Netlist,
    pub iface: NodeRef,
    pub empty_mp: NodeRef,
    pub used_mp: NodeRef,
}

pub fn interface_modports() -> ModportCase {
    use crate::ast::ModportData;
    let mut nl = Netlist::new("interface_modports");
    let top = nl.add_module(ModuleData::new("top", 2));
    let iface = nl.add_module(ModuleData::new_interface("bus_if", 3));
    add_cell(&mut nl, top, "bus0", iface);
    let dt = logic32(&mut nl);
    let sig = add_var(&mut nl, iface, "valid", VarFlags::IO, dt);

    let empty_mp = nl.new_node(NodeData::Modport(ModportData { name: "mon".into(), vars: Vec::new() }));
    nl.add_stmt(iface, empty_mp);
    let used_mp = nl.new_node(NodeData::Modport(ModportData { name: "drv".into(), vars: Vec::new() }));
    let r = new_varref(&mut nl, sig, NodeRef::new_null(), NodeRef::new_null(), false);
    nl.modport_add_var(used_mp, r);
    nl.add_stmt(iface, used_mp);
    ModportCase { nl, iface, empty_mp, used_mp }
}

/// A package referenced only through a varref's package back-pointer.
pub struct PackageBackrefCase {
    pub nl: Netlist,
    pub pkg: NodeRef,
    pub varref: NodeRef,
}

pub fn package_backpointer() -> PackageBackrefCase {
    let mut nl = Netlist::new("package_backpointer");
    let top = nl.add_module(ModuleData::new("top", 2));
    let pkg = nl.add_module(ModuleData::new_package("pkg", 3));
    let dt = logic32(&mut nl);
    let x = add_var(&mut nl, top, "x", VarFlags::IO, dt);
    let varref = add_display_use(&mut nl, top, x, NodeRef::new_null(), pkg);
    PackageBackrefCase { nl, pkg, varref }
}
