//! The intermediate representation (IR) that DWARF and, eventually, other
//! debug-info front ends are translated into: types, declarations, scopes,
//! translation units, corpora, and the canonicalization machinery that ties
//! them together (spec.md §3 "Component C4: IR Model").

mod canonicalize;
mod corpus;
mod decls;
mod environment;
mod interner;
mod scope;
mod translation_unit;
mod types;

pub use canonicalize::{structural_hash, structurally_equal, CanonicalRegistry};
pub use corpus::{
    Corpus, CorpusGroup, CorpusOrigin, ExportedDeclsBuilder, TypeMapKind, TypeNameMaps,
};
pub use decls::{Decl, DeclArena, DeclData, DeclId, SourceLocation};
pub use environment::Environment;
pub use interner::{IString, Interner};
pub use scope::{
    anonymous_name_base, names_equal_ignoring_anon_suffix, Scope, ScopeArena, ScopeId, ScopeKind,
};
pub use translation_unit::{
    LocationEntry, LocationManager, SourceLanguage, TranslationUnit, TuArena, TuId,
};
pub use types::{
    Access, BaseSpecifier, ClassData, ClassKind, CvQualifiers, DataMember, DieOrigin,
    EnumTypeData, Enumerator, FunctionTypeData, MemberFunction, Parameter, Subrange, Type,
    TypeArena, TypeData, TypeId,
};
