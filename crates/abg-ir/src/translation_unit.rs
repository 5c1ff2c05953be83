//! Translation units (spec.md §3).

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::scope::ScopeId;
use crate::types::TypeId;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TuId(u32);
entity_impl!(TuId, "tu");

/// `DW_AT_language`, reduced to the families the builder's default-lower-
/// bound rule (spec.md §4.5 "Arrays") needs to distinguish, plus enough
/// detail to be useful to a reporter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceLanguage {
    C,
    Cxx,
    Fortran,
    Ada,
    Pascal,
    Cobol,
    Pl1,
    Other,
}

impl SourceLanguage {
    /// spec.md §4.5: "Default lower bound depends on source language (0 for
    /// C-family, 1 for Fortran/Ada/Pascal/Cobol/PL1)".
    pub fn default_array_lower_bound(self) -> i64 {
        match self {
            SourceLanguage::C | SourceLanguage::Cxx | SourceLanguage::Other => 0,
            SourceLanguage::Fortran
            | SourceLanguage::Ada
            | SourceLanguage::Pascal
            | SourceLanguage::Cobol
            | SourceLanguage::Pl1 => 1,
        }
    }
}

/// A single source-line table entry; `LocationManager` is a flat,
/// TU-global table of these (spec.md §3: "a globally unique location
/// manager (file/line/column table)").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationEntry {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Default, Clone)]
pub struct LocationManager {
    entries: Vec<LocationEntry>,
}

impl LocationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `entry`, returning a stable index usable as a
    /// `SourceLocation` key; repeated identical entries reuse the same
    /// index the way the IR's string interner reuses identical strings.
    pub fn intern(&mut self, entry: LocationEntry) -> u32 {
        if let Some(pos) = self.entries.iter().position(|e| *e == entry) {
            return pos as u32;
        }
        self.entries.push(entry);
        (self.entries.len() - 1) as u32
    }

    pub fn get(&self, index: u32) -> &LocationEntry {
        &self.entries[index as usize]
    }
}

pub struct TranslationUnit {
    pub name: String,
    pub address_size: u8,
    pub language: SourceLanguage,
    pub locations: LocationManager,
    pub top_scope: ScopeId,
    /// Anonymous/synthesized function types created while reading this TU
    /// (spec.md §3: the TU is their owner).
    pub synthesized_function_types: Vec<TypeId>,
}

#[derive(Default)]
pub struct TuArena {
    tus: PrimaryMap<TuId, TranslationUnit>,
}

impl TuArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tu: TranslationUnit) -> TuId {
        self.tus.push(tu)
    }

    pub fn get(&self, id: TuId) -> &TranslationUnit {
        &self.tus[id]
    }

    pub fn get_mut(&mut self, id: TuId) -> &mut TranslationUnit {
        &mut self.tus[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TuId, &TranslationUnit)> {
        self.tus.iter()
    }
}

impl std::ops::Index<TuId> for TuArena {
    type Output = TranslationUnit;
    fn index(&self, id: TuId) -> &TranslationUnit {
        self.get(id)
    }
}

impl std::ops::IndexMut<TuId> for TuArena {
    fn index_mut(&mut self, id: TuId) -> &mut TranslationUnit {
        self.get_mut(id)
    }
}
