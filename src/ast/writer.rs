//! Human-readable netlist dump, used by debug logging and tests.

use crate::{
    ast::{Netlist, NodeData, NodeRef},
    base::NullableValue,
};
use std::{
    cell::{Cell, RefCell},
    io::Write,
};

pub struct NetlistWriter<'nl> {
    pub output: RefCell<&'nl mut dyn Write>,
    pub nl: &'nl Netlist,
    pub indent: Cell<usize>,
}

impl<'nl> NetlistWriter<'nl> {
    pub fn new(output: &'nl mut dyn Write, nl: &'nl Netlist) -> Self {
        Self { output: RefCell::new(output), nl, indent: Cell::new(0) }
    }

    pub fn write_netlist(&self) -> std::io::Result<()> {
        writeln!(self.output.borrow_mut(), "netlist `{}`", self.nl.name)?;
        for &m in &self.nl.modules {
            self.write_node(m)?;
        }
        if !self.nl.types.pool().is_empty() {
            writeln!(self.output.borrow_mut(), "  typetable")?;
            self.indent.set(2);
            for &d in self.nl.types.pool() {
                self.write_node(d)?;
            }
            self.indent.set(0);
        }
        Ok(())
    }

    fn write_node(&self, n: NodeRef) -> std::io::Result<()> {
        let indent = self.indent.get() + 1;
        {
            let mut out = self.output.borrow_mut();
            write!(out, "{:indent$}", "", indent = indent * 2)?;
            self.describe(&mut **out, n)?;
            writeln!(out)?;
        }
        self.indent.set(indent);
        let mut children = smallvec::SmallVec::<[NodeRef; 8]>::new();
        self.nl.node(n).for_each_child(|c| children.push(c));
        for c in children {
            self.write_node(c)?;
        }
        self.indent.set(indent - 1);
        Ok(())
    }

    fn describe(&self, out: &mut dyn Write, n: NodeRef) -> std::io::Result<()> {
        let node = self.nl.node(n);
        match &node.data {
            NodeData::Module(m) => {
                write!(out, "module `{}` kind={:?} level={}", m.name, m.kind, m.level)?;
                if m.internal {
                    write!(out, " internal")?;
                }
            }
            NodeData::Cell(c) => {
                write!(out, "cell `{}` -> {:?}", c.name, c.modulep)?;
            }
            NodeData::Scope(s) => {
                write!(out, "scope `{}`", s.name)?;
                if s.is_top {
                    write!(out, " top")?;
                }
            }
            NodeData::VarScope(vs) => {
                write!(out, "varscope var={:?} scope={:?}", vs.var, vs.scope)?;
            }
            NodeData::Var(v) => {
                write!(out, "var `{}` {:?}", v.name, v.flags)?;
            }
            NodeData::BasicDType(b) => {
                write!(out, "dtype {:?}[{}]", b.kind, b.width)?;
                if b.generic {
                    write!(out, " generic")?;
                }
            }
            NodeData::StructDType(s) => {
                write!(out, "structdtype `{}`", s.name)?;
            }
            NodeData::MemberDType(m) => {
                write!(out, "memberdtype `{}`", m.name)?;
            }
            NodeData::RefDType(r) => {
                write!(out, "refdtype `{}` -> {:?}", r.name, r.target)?;
            }
            NodeData::Typedef(t) => {
                write!(out, "typedef `{}`", t.name)?;
                if t.attr_public {
                    write!(out, " public")?;
                }
            }
            other => {
                write!(out, "{:?}", other.kind())?;
                if let Some(name) = other.name() {
                    write!(out, " `{name}`")?;
                }
            }
        }
        if node.dtype.is_nonnull() && node.dtype != n {
            write!(out, " dtype={:?}", node.dtype)?;
        }
        Ok(())
    }
}

pub fn netlist_to_string(nl: &Netlist) -> String {
    let mut buf = Vec::new();
    NetlistWriter::new(&mut buf, nl).write_netlist().expect("write to Vec cannot fail");
    String::from_utf8(buf).expect("netlist dump is valid utf-8")
}

/// Dump the netlist to `<tmp>/<tag>.tree.txt`, warning instead of failing
/// when the file cannot be written.
pub fn write_netlist_to_file_quiet(nl: &Netlist, tag: &str) {
    let path = std::env::temp_dir().join(format!("{tag}.tree.txt"));
    let text = netlist_to_string(nl);
    if let Err(e) = std::fs::write(&path, text) {
        log::warn!("failed to dump netlist to {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ModuleData, NodeData, VarData, VarFlags};

    #[test]
    fn dump_lists_modules_and_typetable() {
        let mut nl = Netlist::new("dump");
        let top = nl.add_module(ModuleData::new("top", 2));
        let v = nl.new_node(NodeData::Var(VarData::new("sig", VarFlags::SIG_PUBLIC)));
        nl.add_stmt(top, v);
        nl.find_basic_dtype(crate::ast::BasicKind::Logic, 4);

        let text = netlist_to_string(&nl);
        assert!(text.contains("netlist `dump`"));
        assert!(text.contains("module `top`"));
        assert!(text.contains("var `sig` VarFlags(SIG_PUBLIC)"));
        assert!(text.contains("typetable"));
        assert!(text.contains("dtype Logic[4]"));
    }
}
