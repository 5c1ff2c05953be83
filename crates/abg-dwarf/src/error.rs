//! Errors for DIE indexing and IR building (spec.md §7 "Error handling
//! design").

#[derive(thiserror::Error, Debug)]
pub enum DwarfError {
    #[error("gimli read error: {0}")]
    Gimli(#[from] gimli::Error),
    #[error(transparent)]
    DieIndex(#[from] crate::die_index::DieIndexError),
    #[error(transparent)]
    Expr(#[from] crate::expr::ExprError),
    #[error("no debug info found in {0:?}")]
    NoDebugInfo(std::path::PathBuf),
    #[error(
        "alternate debug info build-id does not match {0:?}; treated the same as a missing file"
    )]
    AltDebugInfoBuildIdMismatch(std::path::PathBuf),
    #[error("alternate debug info file {0:?} not found")]
    AltDebugInfoMissing(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, DwarfError>;
