//! The diff engine (spec.md §4.7): per-type structural diff, corpus-level
//! symbol-identity matching, change categorization, suppression application,
//! and report filtering.
//!
//! [`types::diff_types`] is the structural dispatcher every other diff here
//! builds on; [`corpus::diff_corpus`] drives it across two corpora's exported
//! functions and variables. [`categorize`] rolls categories up the tree,
//! [`suppress`] marks matches against a suppression set, and [`filter`]
//! decides what a reporter should actually print.

mod categorize;
mod category;
mod corpus;
mod decls;
mod filter;
mod node;
mod stats;
mod suppress;
mod types;

pub use categorize::propagate_categories;
pub use category::ChangeCategory;
pub use corpus::{diff_corpus, ChangedDecl, CorpusDiff};
pub use decls::{apply_member_function_extras, diff_function_decl, diff_var, symbol_identity};
pub use filter::DiffContext;
pub use node::{
    ClassDiff, DiffKind, DiffNode, EnumDiff, FunctionDeclDiff, FunctionTypeDiff, MemberDiff, VarDiff,
};
pub use stats::CorpusDiffStats;
pub use suppress::apply_suppressions;
pub use types::diff_types;
