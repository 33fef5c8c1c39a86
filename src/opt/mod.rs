//! Netlist cleanup passes.

pub mod transform;

pub use transform::dead::{
    dead_all, dead_all_scoped, dead_dtypes, dead_dtypes_scoped, dead_modules,
};
