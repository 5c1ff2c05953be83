//! spec.md §7 "Malformed suppression": non-fatal, the offending rule is
//! dropped and others are kept — callers that want the parse to be strict
//! can inspect [`SuppressionError`] themselves via [`crate::parse_lenient`].

#[derive(thiserror::Error, Debug)]
pub enum SuppressionError {
    #[error("line {line}: {message}")]
    Parse { line: u32, message: String },
    #[error("line {line}: unknown section [{section}]")]
    UnknownSection { line: u32, section: String },
    #[error("line {line}: [{section}] is missing mandatory key `{key}`")]
    MissingKey { line: u32, section: String, key: String },
    #[error("line {line}: malformed range expression: {message}")]
    MalformedRange { line: u32, message: String },
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

pub type SuppressionResult<T> = std::result::Result<T, SuppressionError>;
