//! Dead code elimination over the netlist tree.
//!
//! One traversal counts, per node, how many edges point at it, while
//! collecting the nodes of eliminable kinds. Kind-specific sweeps then
//! delete whatever ended up with zero references, fixing up the counts of
//! everything the deleted node pointed to and retrying until nothing more
//! dies. Which kinds are eligible depends on the entry point: see
//! [`dead_modules`] through [`dead_all_scoped`].
//!
//! Package back-pointers on references (varrefs, task calls, ref-dtypes,
//! enum item refs) are redundant once scoping has resolved every name, but
//! their presence keeps otherwise-empty packages alive. In cell-eliminating
//! modes this pass clears them, which is the only way such packages become
//! reclaimable.
//!
//! TODO: chains of mutually-referencing nodes are only resolved as far as
//! the fixed-point retries reach; an explicit reference graph with SCC
//! reachability would catch the rest.

use crate::{
    ast::{writer, Netlist, NodeData, NodeKind, NodeRef, VarFlags},
    base::{NullableValue, SlabRef},
};
use smallvec::SmallVec;
use std::collections::HashMap;

bitflags::bitflags! {
    /// Which entity kinds the current invocation may remove.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct ElimMask: u8 {
        /// User-declared variables, not just compiler temporaries.
        const USER_VARS = 0b0000_0001;
        /// Data types (post-widthing only).
        const DTYPES    = 0b0000_0010;
        /// Scopes; legal only on a flattened design.
        const SCOPES    = 0b0000_0100;
        /// Cells, modports, non-public typedefs, package back-pointers.
        const CELLS     = 0b0000_1000;
    }
}

/// Reference counters for the whole arena, indexed by node handle. Going
/// negative means a sweep decremented an edge the traversal never counted;
/// that is an upstream bug and fatal.
struct UseCounts {
    counts: Vec<i32>,
}

impl UseCounts {
    fn for_netlist(nl: &Netlist) -> Self {
        Self { counts: vec![0; nl.nodes.capacity()] }
    }

    fn inc(&mut self, n: NodeRef) {
        *self.slot(n) += 1;
    }
    fn dec(&mut self, n: NodeRef) {
        let slot = self.slot(n);
        *slot -= 1;
        let count = *slot;
        assert!(count >= 0, "use count of {n:?} went negative");
    }
    fn get(&self, n: NodeRef) -> i32 {
        self.counts[n.get_handle()]
    }
    fn slot(&mut self, n: NodeRef) -> &mut i32 {
        assert!(n.is_nonnull(), "counting a null edge");
        &mut self.counts[n.get_handle()]
    }
}

/// Transient state of one elimination run.
struct DeadContext {
    mask: ElimMask,
    uses: UseCounts,
    /// Current module while descending, for package pinning.
    curr_module: NodeRef,
    // Candidates of each eliminable kind, in traversal order.
    vars: Vec<NodeRef>,
    varscopes: Vec<NodeRef>,
    dtypes: Vec<NodeRef>,
    scopes: Vec<NodeRef>,
    cells: Vec<NodeRef>,
    /// Straight-line assignments per target varscope, in traversal order.
    assign_index: HashMap<NodeRef, Vec<NodeRef>>,
}

impl DeadContext {
    fn new(nl: &Netlist, mask: ElimMask) -> Self {
        Self {
            mask,
            uses: UseCounts::for_netlist(nl),
            curr_module: NodeRef::new_null(),
            vars: Vec::new(),
            varscopes: Vec::new(),
            dtypes: Vec::new(),
            scopes: Vec::new(),
            cells: Vec::new(),
            assign_index: HashMap::new(),
        }
    }

    // -- Counting traversal --

    fn scan(&mut self, nl: &mut Netlist) {
        let mut se = false;
        for m in nl.modules.clone() {
            self.scan_node(nl, m, &mut se);
        }
        for d in nl.types.pool().to_vec() {
            self.scan_node(nl, d, &mut se);
        }
    }

    /// Count the type edges every node carries: its `dtype` (dtype nodes
    /// self-reference; the self loop is not a use) and its owned
    /// `child_dtype`.
    fn check_all(&mut self, nl: &Netlist, n: NodeRef) {
        let node = nl.node(n);
        if node.dtype.is_nonnull() && node.dtype != n {
            self.uses.inc(node.dtype);
        }
        if node.child_dtype.is_nonnull() {
            self.uses.inc(node.child_dtype);
        }
    }

    /// Collect a dtype candidate and count its forwarded dtype, if any.
    /// Generic placeholders and member dtypes are not candidates; members
    /// live and die with their enclosing struct.
    fn check_dtype(&mut self, nl: &Netlist, n: NodeRef) {
        let node = nl.node(n);
        if !node.data.is_generic_dtype()
            && self.mask.contains(ElimMask::DTYPES)
            && !matches!(node.data, NodeData::MemberDType(_))
        {
            self.dtypes.push(n);
        }
        let forwarded = node.data.virt_ref_dtype();
        if forwarded.is_nonnull() {
            self.uses.inc(forwarded);
        }
    }

    /// Package back-pointers are dead weight after scoping: clear them when
    /// cells are being eliminated, otherwise count them like any edge.
    fn scrub_package(&mut self, nl: &mut Netlist, n: NodeRef) {
        let pkg = nl.node(n).data.package();
        if pkg.is_nonnull() {
            if self.mask.contains(ElimMask::CELLS) {
                nl.node_mut(n).data.clear_package();
            } else {
                self.uses.inc(pkg);
            }
        }
    }

    fn might_elim_var(&self, flags: VarFlags) -> bool {
        !flags.contains(VarFlags::SIG_PUBLIC)
            && !flags.contains(VarFlags::IO)
            && (flags.contains(VarFlags::TEMP)
                || (flags.contains(VarFlags::PARAM) && !flags.contains(VarFlags::TRACE))
                || self.mask.contains(ElimMask::USER_VARS))
    }

    fn scan_children(&mut self, nl: &mut Netlist, n: NodeRef, se: &mut bool) {
        let mut kids = SmallVec::<[NodeRef; 8]>::new();
        nl.node(n).for_each_child(|c| kids.push(c));
        for c in kids {
            self.scan_node(nl, c, se);
        }
    }

    fn scan_node(&mut self, nl: &mut Netlist, n: NodeRef, se: &mut bool) {
        match nl.kind(n) {
            NodeKind::Module => {
                self.curr_module = n;
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                self.curr_module = NodeRef::new_null();
            }
            NodeKind::Cell => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                self.cells.push(n);
                let target = match &nl.node(n).data {
                    NodeData::Cell(c) => c.modulep,
                    _ => unreachable!(),
                };
                self.uses.inc(target);
            }
            NodeKind::Scope => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                let (above, candidate) = {
                    let s = nl.scope(n);
                    let empty =
                        s.varscopes.is_empty() && s.blocks.is_empty() && s.final_clks.is_empty();
                    (s.above, !s.is_top && empty)
                };
                if above.is_nonnull() {
                    self.uses.inc(above);
                }
                if candidate {
                    self.scopes.push(n);
                }
            }
            NodeKind::CFunc => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                let scope = match &nl.node(n).data {
                    NodeData::CFunc(c) => c.scope,
                    _ => unreachable!(),
                };
                if scope.is_nonnull() {
                    self.uses.inc(scope);
                }
            }
            NodeKind::VarRef => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                let (var, vs) = match &nl.node(n).data {
                    NodeData::VarRef(v) => (v.var, v.varscope),
                    _ => unreachable!(),
                };
                if vs.is_nonnull() {
                    self.uses.inc(vs);
                    self.uses.inc(nl.varscope(vs).var);
                }
                if var.is_nonnull() {
                    self.uses.inc(var);
                }
                self.scrub_package(nl, n);
            }
            NodeKind::FTaskRef => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                self.scrub_package(nl, n);
            }
            NodeKind::RefDType => {
                self.scan_children(nl, n, se);
                self.check_dtype(nl, n);
                self.check_all(nl, n);
                self.scrub_package(nl, n);
            }
            NodeKind::BasicDType | NodeKind::StructDType | NodeKind::MemberDType => {
                self.scan_children(nl, n, se);
                self.check_dtype(nl, n);
                self.check_all(nl, n);
            }
            NodeKind::EnumItemRef => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                self.scrub_package(nl, n);
            }
            NodeKind::Modport => {
                self.scan_children(nl, n, se);
                if self.mask.contains(ElimMask::CELLS) {
                    let empty = match &nl.node(n).data {
                        NodeData::Modport(m) => m.vars.is_empty(),
                        _ => unreachable!(),
                    };
                    if empty {
                        let d = nl.unlink(n).expect("unlink empty modport");
                        nl.push_delete_later(d);
                        return;
                    }
                }
                self.check_all(nl, n);
            }
            NodeKind::Typedef => {
                self.scan_children(nl, n, se);
                let public = match &nl.node(n).data {
                    NodeData::Typedef(t) => t.attr_public,
                    _ => unreachable!(),
                };
                if self.mask.contains(ElimMask::CELLS) && !public {
                    let d = nl.unlink(n).expect("unlink non-public typedef");
                    nl.push_delete_later(d);
                    return;
                }
                self.check_all(nl, n);
                // Packages with only public typedefs must not disappear.
                if public && self.in_package(nl) {
                    self.uses.inc(self.curr_module);
                }
            }
            NodeKind::VarScope => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                let (scope, var) = {
                    let vs = nl.varscope(n);
                    (vs.scope, vs.var)
                };
                if scope.is_nonnull() {
                    self.uses.inc(scope);
                }
                let flags = nl.node(var).data.as_var().expect("varscope without var").flags;
                if self.might_elim_var(flags) {
                    self.varscopes.push(n);
                }
            }
            NodeKind::Var => {
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
                let flags = nl.node(n).data.as_var().expect("var payload").flags;
                // Packages with only public variables must not disappear;
                // ordinary modules may (e.g. parameterized away).
                if flags.contains(VarFlags::SIG_PUBLIC) && self.in_package(nl) {
                    self.uses.inc(self.curr_module);
                }
                if self.might_elim_var(flags) {
                    self.vars.push(n);
                }
            }
            NodeKind::Assign => self.scan_assign(nl, n),
            NodeKind::Sel
            | NodeKind::BinOp
            | NodeKind::Const
            | NodeKind::Display
            | NodeKind::Always => {
                if nl.node(n).data.is_outputter() {
                    *se = true;
                }
                self.scan_children(nl, n, se);
                self.check_all(nl, n);
            }
        }
    }

    /// A straight-line assignment whose target varscope turns out dead can
    /// be deleted along with it, provided the right-hand side has no
    /// observable effect and the write is direct (no select in the way).
    fn scan_assign(&mut self, nl: &mut Netlist, n: NodeRef) {
        let (lhs, rhs) = match &nl.node(n).data {
            NodeData::Assign(a) => (a.lhs, a.rhs),
            _ => unreachable!(),
        };
        let mut rhs_se = false;
        self.scan_node(nl, rhs, &mut rhs_se);
        self.check_all(nl, n);

        let direct_vs = match &nl.node(lhs).data {
            NodeData::VarRef(v) if v.varscope.is_nonnull() => Some(v.varscope),
            _ => None,
        };
        match direct_vs {
            Some(vs) if !rhs_se => {
                self.assign_index.entry(vs).or_default().push(n);
                // Track the lhs reference's type edge, but none of its
                // var/varscope edges: the write alone must not keep the
                // target alive.
                self.check_all(nl, lhs);
                if self.mask.contains(ElimMask::CELLS)
                    && nl.node(lhs).data.package().is_nonnull()
                {
                    nl.node_mut(lhs).data.clear_package();
                }
            }
            _ => self.scan_node(nl, lhs, &mut rhs_se),
        }
    }

    fn in_package(&self, nl: &Netlist) -> bool {
        self.curr_module.is_nonnull() && nl.module(self.curr_module).is_package()
    }

    // -- Sweeps --

    fn unlink_and_delete(&self, nl: &mut Netlist, n: NodeRef, what: &str) {
        log::trace!("dead {what} {n:?}");
        let d = nl.unlink(n).unwrap_or_else(|e| panic!("unlink dead {what}: {e}"));
        nl.delete_tree(d).unwrap_or_else(|e| panic!("delete dead {what}: {e}"));
    }

    /// Delete unreferenced varscopes (with their recorded straight-line
    /// assignments), then vars to fixed point, then dtypes guarded by
    /// member survival.
    fn sweep_vars_and_dtypes(&mut self, nl: &mut Netlist) {
        for i in 0..self.varscopes.len() {
            let vs = self.varscopes[i];
            if !nl.is_alive(vs) || self.uses.get(vs) != 0 {
                continue;
            }
            if let Some(assigns) = self.assign_index.remove(&vs) {
                for assign in assigns {
                    let dt = nl.node(assign).dtype;
                    assert!(dt.is_nonnull(), "assign {assign:?} without dtype");
                    self.uses.dec(dt);
                    self.unlink_and_delete(nl, assign, "assign");
                }
            }
            let scope = nl.varscope(vs).scope;
            if scope.is_nonnull() {
                self.uses.dec(scope);
            }
            let dt = nl.node(vs).dtype;
            assert!(dt.is_nonnull(), "varscope {vs:?} without dtype");
            self.uses.dec(dt);
            self.unlink_and_delete(nl, vs, "varscope");
        }

        // A var may only drop to zero after chained deletions above; keep
        // going until a whole pass deletes nothing.
        let mut retry = true;
        while retry {
            retry = false;
            for i in 0..self.vars.len() {
                let var = self.vars[i];
                if !nl.is_alive(var) || self.uses.get(var) != 0 {
                    continue;
                }
                let dt = nl.node(var).dtype;
                if dt.is_nonnull() {
                    self.uses.dec(dt);
                }
                self.unlink_and_delete(nl, var, "var");
                retry = true;
            }
        }

        for i in 0..self.dtypes.len() {
            let dt = self.dtypes[i];
            if !nl.is_alive(dt) || self.uses.get(dt) != 0 {
                continue;
            }
            // Each member may be referenced on its own even when the
            // struct itself is not; the struct must outlive its members.
            if let NodeData::StructDType(s) = &nl.node(dt).data {
                if s.members.iter().any(|&m| self.uses.get(m) != 0) {
                    continue;
                }
            }
            self.unlink_and_delete(nl, dt, "dtype");
        }
    }

    /// Only meaningful on a flattened design, where an empty scope with no
    /// remaining references really is vestigial.
    fn sweep_scopes(&mut self, nl: &mut Netlist) {
        let mut retry = true;
        while retry {
            retry = false;
            for i in 0..self.scopes.len() {
                let sc = self.scopes[i];
                if !nl.is_alive(sc) || self.uses.get(sc) != 0 {
                    continue;
                }
                let above = nl.scope(sc).above;
                debug_assert!(above.is_nonnull(), "non-top scope without an above scope");
                if above.is_nonnull() {
                    self.uses.dec(above);
                }
                let dt = nl.node(sc).dtype;
                if dt.is_nonnull() {
                    self.uses.dec(dt);
                }
                self.unlink_and_delete(nl, sc, "scope");
                retry = true;
            }
        }
    }

    /// A cell is removable when nothing references it and its target
    /// module has no statements left: an empty module is a safe proxy for
    /// "this instantiation does nothing".
    fn sweep_cells(&mut self, nl: &mut Netlist) {
        for i in 0..self.cells.len() {
            let cell = self.cells[i];
            if !nl.is_alive(cell) || self.uses.get(cell) != 0 {
                continue;
            }
            let target = match &nl.node(cell).data {
                NodeData::Cell(c) => c.modulep,
                _ => unreachable!(),
            };
            if !nl.module(target).stmts.is_empty() {
                continue;
            }
            self.uses.dec(target);
            self.unlink_and_delete(nl, cell, "cell");
        }
    }

    /// Kill unreferenced modules above the top level. Deleting one may
    /// orphan the modules it instantiated, so each deletion first walks the
    /// dying tree correcting target counts, and the whole list retries.
    fn sweep_modules(&mut self, nl: &mut Netlist) {
        let mut retry = true;
        while retry {
            retry = false;
            for m in nl.modules.clone() {
                let (level, internal) = {
                    let md = nl.module(m);
                    (md.level, md.internal)
                };
                // Level 1 is the wrapper and level 2 the top user module;
                // neither is ever dead.
                if level > 2 && self.uses.get(m) == 0 && !internal {
                    log::debug!("dead module {m:?} `{}`", nl.module(m).name);
                    self.dead_module_fixups(nl, m);
                    self.unlink_and_delete(nl, m, "module");
                    retry = true;
                }
            }
        }
    }

    /// Restricted walk over a dying module: give back the use its cells
    /// put on their target modules. Arithmetic subtrees contain no cells
    /// and are skipped outright.
    fn dead_module_fixups(&mut self, nl: &Netlist, n: NodeRef) {
        if nl.node(n).data.is_math() {
            return;
        }
        let mut kids = SmallVec::<[NodeRef; 8]>::new();
        nl.node(n).for_each_child(|c| kids.push(c));
        for c in kids {
            self.dead_module_fixups(nl, c);
        }
        if let NodeData::Cell(c) = &nl.node(n).data {
            self.uses.dec(c.modulep);
        }
    }
}

fn run_dead_pass(nl: &mut Netlist, mask: ElimMask, tag: &str) {
    nl.types.clear_cache();

    let mut ctx = DeadContext::new(nl, mask);
    ctx.scan(nl);

    ctx.sweep_vars_and_dtypes(nl);
    if mask.contains(ElimMask::SCOPES) {
        ctx.sweep_scopes(nl);
    }
    if mask.contains(ElimMask::CELLS) {
        ctx.sweep_cells(nl);
    }
    // Modules after vars: the vars we deleted may be all that was left of
    // a module we are about to delete.
    ctx.sweep_modules(nl);

    nl.flush_deletes();
    nl.repair_cache();

    if log::log_enabled!(log::Level::Debug) {
        writer::write_netlist_to_file_quiet(nl, &format!("debug.{tag}.{}", nl.name));
    }
}

/// Remove unreferenced nested modules only.
pub fn dead_modules(nl: &mut Netlist) {
    log::debug!("dead_modules on netlist `{}`", nl.name);
    run_dead_pass(nl, ElimMask::empty(), "dead_modules");
}

/// Also remove unreferenced data types.
pub fn dead_dtypes(nl: &mut Netlist) {
    log::debug!("dead_dtypes on netlist `{}`", nl.name);
    run_dead_pass(nl, ElimMask::DTYPES, "dead_dtypes");
}

/// [`dead_dtypes`] plus empty-scope removal; requires a flattened design.
pub fn dead_dtypes_scoped(nl: &mut Netlist) {
    log::debug!("dead_dtypes_scoped on netlist `{}`", nl.name);
    run_dead_pass(nl, ElimMask::DTYPES | ElimMask::SCOPES, "dead_dtypes_scoped");
}

/// Remove user variables, dtypes and cells; packages lose their redundant
/// back-pointers and may die too.
pub fn dead_all(nl: &mut Netlist) {
    log::debug!("dead_all on netlist `{}`", nl.name);
    run_dead_pass(nl, ElimMask::USER_VARS | ElimMask::DTYPES | ElimMask::CELLS, "dead_all");
}

/// Everything [`dead_all`] does plus empty-scope removal.
pub fn dead_all_scoped(nl: &mut Netlist) {
    log::debug!("dead_all_scoped on netlist `{}`", nl.name);
    run_dead_pass(
        nl,
        ElimMask::USER_VARS | ElimMask::DTYPES | ElimMask::SCOPES | ElimMask::CELLS,
        "dead_all_scoped",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        BasicDTypeData, BasicKind, ModuleData, Netlist, NodeData, RefDTypeData, TypedefData,
        VarFlags,
    };
    use crate::testing::cases::{self, add_cell, add_display_use, add_var, logic32};

    fn null() -> NodeRef {
        NodeRef::new_null()
    }

    #[test]
    fn unreferenced_level3_module_is_removed() {
        let (mut nl, top, orphan) = cases::two_modules();
        dead_modules(&mut nl);
        assert!(nl.is_alive(top));
        assert!(!nl.is_alive(orphan));
        assert_eq!(nl.modules, vec![top]);
    }

    #[test]
    fn top_level_modules_survive_with_zero_uses() {
        let mut nl = Netlist::new("levels");
        let wrapper = nl.add_module(ModuleData::new("wrapper", 1));
        let top = nl.add_module(ModuleData::new("top", 2));
        dead_modules(&mut nl);
        assert!(nl.is_alive(wrapper));
        assert!(nl.is_alive(top));
    }

    #[test]
    fn internal_modules_survive_with_zero_uses() {
        let mut nl = Netlist::new("internal");
        nl.add_module(ModuleData::new("top", 2));
        let hidden = nl.add_module(ModuleData { internal: true, ..ModuleData::new("hidden", 3) });
        dead_modules(&mut nl);
        assert!(nl.is_alive(hidden));
    }

    #[test]
    fn instantiated_modules_survive() {
        let case = cases::cell_chain();
        let mut nl = case.nl;
        dead_modules(&mut nl);
        assert!(nl.is_alive(case.a));
        assert!(nl.is_alive(case.b));
        assert!(!nl.is_alive(case.c));
    }

    #[test]
    fn dead_module_chain_cascades_through_count_fixups() {
        let case = cases::dead_chain();
        let mut nl = case.nl;
        dead_modules(&mut nl);
        // mid dies first; the fixup walk releases leaf, and the retry
        // loop picks it up.
        assert!(!nl.is_alive(case.mid));
        assert!(!nl.is_alive(case.leaf));
        assert!(nl.is_alive(case.top));
    }

    #[test]
    fn unreferenced_temp_var_and_varscope_are_removed() {
        let case = cases::scoped_temp_var();
        let mut nl = case.nl;
        dead_all_scoped(&mut nl);
        assert!(!nl.is_alive(case.var));
        assert!(!nl.is_alive(case.vs));
        assert!(nl.is_alive(case.top));
        // The scope held a varscope when scanned, so it was no candidate
        // this run even though it is empty now.
        assert!(nl.is_alive(case.scope));
    }

    #[test]
    fn referenced_temp_var_survives() {
        let case = cases::scoped_temp_var();
        let mut nl = case.nl;
        add_display_use(&mut nl, case.top, case.var, case.vs, null());
        dead_all_scoped(&mut nl);
        assert!(nl.is_alive(case.var));
        assert!(nl.is_alive(case.vs));
    }

    #[test]
    fn public_var_survives_and_pins_its_package() {
        let (mut nl, pkg, var) = cases::public_var_package();
        dead_all(&mut nl);
        assert!(nl.is_alive(var));
        assert!(nl.is_alive(pkg));
    }

    #[test]
    fn package_of_only_temps_is_removed() {
        let mut nl = Netlist::new("temp_pkg");
        nl.add_module(ModuleData::new("top", 2));
        let pkg = nl.add_module(ModuleData::new_package("pkg", 3));
        let dt = logic32(&mut nl);
        let tmp = add_var(&mut nl, pkg, "__Vtemp9", VarFlags::TEMP, dt);
        dead_all(&mut nl);
        assert!(!nl.is_alive(tmp));
        assert!(!nl.is_alive(pkg));
    }

    #[test]
    fn public_typedef_survives_and_pins_its_package() {
        let (mut nl, pkg, td) = cases::public_typedef_package();
        dead_all(&mut nl);
        assert!(nl.is_alive(td));
        assert!(nl.is_alive(pkg));
    }

    #[test]
    fn nonpublic_typedef_removed_only_when_eliminating_cells() {
        let build = || {
            let mut nl = Netlist::new("td");
            let top = nl.add_module(ModuleData::new("top", 2));
            let td = nl
                .new_node(NodeData::Typedef(TypedefData { name: "t".into(), attr_public: false }));
            let dt = logic32(&mut nl);
            nl.set_dtype(td, dt);
            nl.add_stmt(top, td);
            (nl, td)
        };
        let (mut nl, td) = build();
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(td));
        let (mut nl, td) = build();
        dead_all(&mut nl);
        assert!(!nl.is_alive(td));
    }

    #[test]
    fn empty_modport_removed_only_when_eliminating_cells() {
        let case = cases::interface_modports();
        let mut nl = case.nl;
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(case.empty_mp));
        assert!(nl.is_alive(case.used_mp));

        let case = cases::interface_modports();
        let mut nl = case.nl;
        dead_all(&mut nl);
        assert!(!nl.is_alive(case.empty_mp));
        assert!(nl.is_alive(case.used_mp));
        assert!(nl.is_alive(case.iface));
    }

    #[test]
    fn struct_with_live_member_survives() {
        let case = cases::struct_with_members(true);
        let mut nl = case.nl;
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(case.st));
        assert!(nl.is_alive(case.m1));
        assert!(nl.is_alive(case.m2));
    }

    #[test]
    fn struct_with_no_live_member_is_removed() {
        let case = cases::struct_with_members(false);
        let mut nl = case.nl;
        dead_dtypes(&mut nl);
        assert!(!nl.is_alive(case.st));
        assert!(!nl.is_alive(case.m1));
    }

    #[test]
    fn empty_scope_chain_collapses_to_fixed_point() {
        let case = cases::empty_scope_chain();
        let mut nl = case.nl;
        dead_dtypes_scoped(&mut nl);
        // deleting leaf drops mid to zero; the retry loop picks mid up.
        // The top scope is never a candidate.
        assert!(!nl.is_alive(case.leaf));
        assert!(!nl.is_alive(case.mid));
        assert!(nl.is_alive(case.top_scope));
    }

    #[test]
    fn scopes_stay_without_scope_elimination() {
        let case = cases::empty_scope_chain();
        let mut nl = case.nl;
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(case.leaf));
        assert!(nl.is_alive(case.mid));
    }

    #[test]
    fn straight_assign_dies_with_its_varscope() {
        let case = cases::straight_assign(false);
        let mut nl = case.nl;
        dead_all_scoped(&mut nl);
        assert!(!nl.is_alive(case.vs));
        assert!(!nl.is_alive(case.assign));
        assert!(!nl.is_alive(case.lhs));
        assert!(!nl.is_alive(case.var));
        assert!(nl.is_alive(case.top));
    }

    #[test]
    fn side_effecting_assign_keeps_its_varscope() {
        let case = cases::straight_assign(true);
        let mut nl = case.nl;
        dead_all_scoped(&mut nl);
        assert!(nl.is_alive(case.vs));
        assert!(nl.is_alive(case.assign));
        assert!(nl.is_alive(case.var));
    }

    #[test]
    fn package_backpointer_counts_unless_eliminating_cells() {
        let case = cases::package_backpointer();
        let mut nl = case.nl;
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(case.pkg));
        assert!(nl.node(case.varref).data.package().is_nonnull());

        let case = cases::package_backpointer();
        let mut nl = case.nl;
        dead_all(&mut nl);
        assert!(!nl.is_alive(case.pkg));
        assert!(nl.node(case.varref).data.package().is_null());
    }

    #[test]
    fn cell_to_empty_module_is_removed_and_cascades() {
        let mut nl = Netlist::new("empty_cell");
        let top = nl.add_module(ModuleData::new("top", 2));
        let empty = nl.add_module(ModuleData::new("empty", 3));
        let cell = add_cell(&mut nl, top, "e0", empty);

        let mut nl2 = Netlist::new("empty_cell");
        let top2 = nl2.add_module(ModuleData::new("top", 2));
        let empty2 = nl2.add_module(ModuleData::new("empty", 3));
        let cell2 = add_cell(&mut nl2, top2, "e0", empty2);

        dead_modules(&mut nl);
        assert!(nl.is_alive(cell));
        assert!(nl.is_alive(empty));

        dead_all(&mut nl2);
        assert!(!nl2.is_alive(cell2));
        assert!(!nl2.is_alive(empty2));
        assert!(nl2.is_alive(top2));
    }

    #[test]
    fn generic_dtype_is_never_a_candidate() {
        let mut nl = Netlist::new("generic");
        nl.add_module(ModuleData::new("top", 2));
        let g = nl.add_pool_dtype(NodeData::BasicDType(BasicDTypeData {
            kind: BasicKind::Logic,
            width: 1,
            generic: true,
        }));
        nl.node_mut(g).dtype = g;
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(g));
    }

    #[test]
    fn unreferenced_pool_dtype_removed_only_with_dtype_elimination() {
        let build = || {
            let mut nl = Netlist::new("pool");
            nl.add_module(ModuleData::new("top", 2));
            let d = nl.find_basic_dtype(BasicKind::Bit, 8);
            (nl, d)
        };
        let (mut nl, d) = build();
        dead_modules(&mut nl);
        assert!(nl.is_alive(d));
        let (mut nl, d) = build();
        dead_dtypes(&mut nl);
        assert!(!nl.is_alive(d));
        assert!(nl.types.pool().is_empty());
    }

    #[test]
    fn ref_dtype_counts_its_forwarded_dtype() {
        let mut nl = Netlist::new("refdtype");
        nl.add_module(ModuleData::new("top", 2));
        let base = nl.find_basic_dtype(BasicKind::Logic, 16);
        let r = nl.add_pool_dtype(NodeData::RefDType(RefDTypeData {
            name: "word_t".into(),
            target: base,
            package: null(),
        }));
        nl.node_mut(r).dtype = r;
        dead_dtypes(&mut nl);
        // the ref itself is unreferenced and dies; the count it put on its
        // target is never given back, so the target conservatively stays.
        assert!(!nl.is_alive(r));
        assert!(nl.is_alive(base));
    }

    #[test]
    fn scan_counts_match_the_edge_rules() {
        let case = cases::straight_assign(false);
        let mut nl = case.nl;
        let mut ctx = DeadContext::new(&nl, ElimMask::all());
        ctx.scan(&mut nl);
        // The recorded lhs contributes no var/varscope uses.
        assert_eq!(ctx.uses.get(case.vs), 0);
        assert_eq!(ctx.uses.get(case.var), 0);
        // One type edge each from var, varscope, lhs varref and assign.
        let dt = nl.node(case.assign).dtype;
        assert_eq!(ctx.uses.get(dt), 4);
        assert_eq!(ctx.assign_index[&case.vs], vec![case.assign]);
    }

    #[test]
    fn scan_counts_varrefs_twice_through_varscopes() {
        let case = cases::scoped_temp_var();
        let mut nl = case.nl;
        let r = add_display_use(&mut nl, case.top, case.var, case.vs, null());
        let mut ctx = DeadContext::new(&nl, ElimMask::all());
        ctx.scan(&mut nl);
        assert_eq!(ctx.uses.get(case.vs), 1);
        // once through the varscope, once directly
        assert_eq!(ctx.uses.get(case.var), 2);
        // varscope counts its scope
        assert_eq!(ctx.uses.get(case.scope), 1);
        assert!(nl.is_alive(r));
    }

    #[test]
    fn cfunc_pins_the_scope_it_runs_in() {
        use crate::ast::CFuncData;
        let mut nl = Netlist::new("cfunc_scope");
        let top = nl.add_module(ModuleData::new("top", 2));
        let ts = cases::add_top_scope(&mut nl, top, "TOP");
        let sub = cases::add_scope(&mut nl, top, "TOP.sub", ts);
        let cf = nl.new_node(NodeData::CFunc(CFuncData {
            name: "_eval".into(),
            scope: sub,
            stmts: Vec::new(),
        }));
        nl.add_stmt(top, cf);
        dead_dtypes_scoped(&mut nl);
        // empty and non-top, but the generated function still evaluates in it
        assert!(nl.is_alive(sub));
    }

    #[test]
    fn enum_item_ref_package_follows_the_scrub_rule() {
        use crate::ast::EnumItemRefData;
        let build = || {
            let mut nl = Netlist::new("enumref");
            let top = nl.add_module(ModuleData::new("top", 2));
            let pkg = nl.add_module(ModuleData::new_package("pkg", 3));
            let dt = logic32(&mut nl);
            let er =
                nl.new_node(NodeData::EnumItemRef(EnumItemRefData { name: "IDLE".into(), package: pkg }));
            nl.set_dtype(er, dt);
            let always = nl.new_node(NodeData::Always(Default::default()));
            nl.add_stmt(always, er);
            nl.add_stmt(top, always);
            (nl, pkg, er)
        };
        let (mut nl, pkg, er) = build();
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(pkg));
        assert!(nl.node(er).data.package().is_nonnull());

        let (mut nl, pkg, er) = build();
        dead_all(&mut nl);
        assert!(!nl.is_alive(pkg));
        assert!(nl.node(er).data.package().is_null());
    }

    #[test]
    fn ftask_ref_package_counts_as_a_use() {
        use crate::ast::FTaskRefData;
        let mut nl = Netlist::new("ftaskref");
        let top = nl.add_module(ModuleData::new("top", 2));
        let pkg = nl.add_module(ModuleData::new_package("pkg", 3));
        let dt = logic32(&mut nl);
        let arg = add_var(&mut nl, top, "a", VarFlags::IO, dt);
        let argref = cases::new_varref(&mut nl, arg, null(), null(), false);
        let call = nl.new_node(NodeData::FTaskRef(FTaskRefData {
            name: "check".into(),
            package: pkg,
            args: Vec::new(),
        }));
        nl.list_add_arg(call, argref);
        let always = nl.new_node(NodeData::Always(Default::default()));
        nl.add_stmt(always, call);
        nl.add_stmt(top, always);
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(pkg));
        assert!(nl.is_alive(arg));
    }

    #[test]
    fn selected_write_is_not_a_straight_assignment() {
        use crate::ast::{AssignData, ConstData, SelData};
        let case = cases::scoped_temp_var();
        let mut nl = case.nl;
        // top.__Vtemp1[0] = 42: the select makes the write indirect, so the
        // target varscope stays referenced.
        let dt = logic32(&mut nl);
        let inner = cases::new_varref(&mut nl, case.var, case.vs, null(), true);
        let bit = nl.new_node(NodeData::Const(ConstData { value: 0 }));
        let sel = nl.new_node(NodeData::Sel(SelData { from: null(), bit: null() }));
        nl.set_operands(sel, inner, bit);
        nl.set_dtype(sel, dt);
        let rhs = nl.new_node(NodeData::Const(ConstData { value: 42 }));
        let assign = nl.new_node(NodeData::Assign(AssignData { lhs: null(), rhs: null() }));
        nl.set_operands(assign, sel, rhs);
        nl.set_dtype(assign, dt);
        let always = nl.new_node(NodeData::Always(Default::default()));
        nl.add_stmt(always, assign);
        nl.add_stmt(case.top, always);

        dead_all_scoped(&mut nl);
        assert!(nl.is_alive(case.vs));
        assert!(nl.is_alive(case.var));
        assert!(nl.is_alive(assign));
    }

    #[test]
    fn param_vars_are_eliminable_unless_traced() {
        let build = |flags: VarFlags| {
            let mut nl = Netlist::new("params");
            let top = nl.add_module(ModuleData::new("top", 2));
            let dt = logic32(&mut nl);
            let v = add_var(&mut nl, top, "WIDTH", flags, dt);
            (nl, v)
        };
        // plain parameter: removable even in the weakest mode
        let (mut nl, v) = build(VarFlags::PARAM);
        dead_modules(&mut nl);
        assert!(!nl.is_alive(v));
        // traced parameter: only removable once user vars are fair game
        let (mut nl, v) = build(VarFlags::PARAM | VarFlags::TRACE);
        dead_dtypes(&mut nl);
        assert!(nl.is_alive(v));
        let (mut nl, v) = build(VarFlags::PARAM | VarFlags::TRACE);
        dead_all(&mut nl);
        assert!(!nl.is_alive(v));
    }

    fn kitchen_sink() -> Netlist {
        let mut nl = Netlist::new("kitchen_sink");
        let top = nl.add_module(ModuleData::new("top", 2));
        let orphan = nl.add_module(ModuleData::new("orphan", 3));
        let pkg = nl.add_module(ModuleData::new_package("pkg", 3));
        let dt = logic32(&mut nl);
        add_var(&mut nl, pkg, "cfg", VarFlags::SIG_PUBLIC, dt);
        add_var(&mut nl, orphan, "o", VarFlags::empty(), dt);
        add_var(&mut nl, top, "__Vtemp1", VarFlags::TEMP, dt);
        let ts = cases::add_top_scope(&mut nl, top, "TOP");
        cases::add_scope(&mut nl, top, "TOP.empty", ts);
        let used = add_var(&mut nl, top, "used", VarFlags::empty(), dt);
        let uvs = cases::add_varscope(&mut nl, ts, used, dt);
        add_display_use(&mut nl, top, used, uvs, pkg);
        nl.find_basic_dtype(BasicKind::Bit, 8);
        nl
    }

    /// Every pointer edge of every survivor must still resolve.
    fn assert_no_dangling(nl: &Netlist) {
        let check = |edge: NodeRef, what: &str, holder: usize| {
            assert!(
                edge.is_null() || nl.is_alive(edge),
                "{what} edge of node {holder} dangles: {edge:?}"
            );
        };
        for (handle, node) in nl.nodes.iter() {
            check(node.parent, "parent", handle);
            check(node.dtype, "dtype", handle);
            check(node.child_dtype, "child_dtype", handle);
            node.for_each_child(|c| check(c, "child", handle));
            match &node.data {
                NodeData::Cell(c) => check(c.modulep, "modulep", handle),
                NodeData::Scope(s) => check(s.above, "above", handle),
                NodeData::VarScope(vs) => {
                    check(vs.scope, "scope", handle);
                    check(vs.var, "var", handle);
                }
                NodeData::RefDType(r) => {
                    check(r.target, "target", handle);
                    check(r.package, "package", handle);
                }
                NodeData::VarRef(v) => {
                    check(v.var, "var", handle);
                    check(v.varscope, "varscope", handle);
                    check(v.package, "package", handle);
                }
                NodeData::FTaskRef(f) => check(f.package, "package", handle),
                NodeData::EnumItemRef(e) => check(e.package, "package", handle),
                NodeData::CFunc(c) => check(c.scope, "scope", handle),
                _ => {}
            }
        }
        for &m in &nl.modules {
            assert!(nl.is_alive(m), "module list entry {m:?} dangles");
        }
        for &d in nl.types.pool() {
            assert!(nl.is_alive(d), "type pool entry {d:?} dangles");
        }
    }

    #[test]
    fn survivors_never_point_at_deleted_nodes() {
        let mut nl = kitchen_sink();
        dead_all_scoped(&mut nl);
        assert_no_dangling(&nl);

        let case = cases::straight_assign(false);
        let mut nl = case.nl;
        dead_all_scoped(&mut nl);
        assert_no_dangling(&nl);

        let case = cases::empty_scope_chain();
        let mut nl = case.nl;
        dead_dtypes_scoped(&mut nl);
        assert_no_dangling(&nl);

        let case = cases::dead_chain();
        let mut nl = case.nl;
        dead_all_scoped(&mut nl);
        assert_no_dangling(&nl);
    }

    #[test]
    fn stronger_modes_delete_at_least_as_much() {
        let mut counts = Vec::new();
        let entries: [fn(&mut Netlist); 4] =
            [dead_modules, dead_dtypes, dead_dtypes_scoped, dead_all_scoped];
        for entry in entries {
            let mut nl = kitchen_sink();
            entry(&mut nl);
            counts.push(nl.node_count());
        }
        assert!(counts.windows(2).all(|w| w[0] >= w[1]), "counts not monotone: {counts:?}");
    }

    #[test]
    fn a_second_run_deletes_nothing() {
        let mut nl = kitchen_sink();
        dead_all_scoped(&mut nl);
        let after_first = nl.node_count();
        dead_all_scoped(&mut nl);
        assert_eq!(nl.node_count(), after_first);
    }
}
