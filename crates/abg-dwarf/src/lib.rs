//! DWARF-to-IR builder (spec.md §4): turns a pair of `.debug_info`
//! partitions (main + optional alternate) into an `abg_ir::Corpus`.
//!
//! [`die_index`] builds the parent/import-point index a single DFS walk
//! produces (spec.md §4.3). [`expr`] evaluates the constant-address prefix of
//! a `DW_OP_*` location expression (spec.md §4.6). [`builder`] drives both of
//! those to construct IR nodes DIE by DIE.

mod builder;
mod die_index;
mod error;
mod expr;

pub use builder::{Builder, BuilderOptions};
pub use die_index::{DieIndex, DieIndexError, DieKey, ImportPoint};
pub use error::{DwarfError, Result};
pub use expr::{evaluate_constant_prefix, EvalResult, ExprError};
