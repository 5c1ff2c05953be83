//! Textual reporter (spec.md §4.8): renders a [`abg_diff::CorpusDiff`] as the
//! summary-then-details report format, in default or leaf mode.

mod names;
mod writer;

pub use writer::{write_corpus_diff, ReportError};

pub use names::qualified_name_of;
