pub use {slab, smol_str};

pub mod ast;
pub mod base;
pub mod opt;
pub mod testing;

/// Netlist-IR uses SmolStr as symbol string so that
/// it can optimize for both memory usage and performance
pub type SymbolStr = smol_str::SmolStr;
