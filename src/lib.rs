//! Umbrella crate for ABI-compatibility analysis of native artifacts.
//!
//! This crate re-exports the individual `abg-*` crates under one namespace.
//! Pull in `abigail::prelude::*` for the common path: read two corpora,
//! diff them, apply suppressions, print a report.

pub use abg_diff as diff;
pub use abg_dwarf as dwarf;
pub use abg_elf as elf;
pub use abg_ir as ir;
pub use abg_report as report;
pub use abg_suppression as suppression;

mod reader;

pub use reader::read_corpus_from_elf;

pub mod prelude {
    pub use abg_diff::{diff_corpus, propagate_categories, ChangeCategory, CorpusDiff, DiffContext};
    pub use abg_elf::{ElfError, ElfReader, ReadStatus};
    pub use abg_ir::{Corpus, CorpusOrigin, Environment};
    pub use abg_report::write_corpus_diff;
    pub use abg_suppression::{Suppression, SuppressionSet};

    pub use crate::read_corpus_from_elf;
}
