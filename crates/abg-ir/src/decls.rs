//! The declaration entity hierarchy (spec.md §3 "Declaration (abstract)").

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::interner::IString;
use crate::scope::ScopeId;
use crate::translation_unit::TuId;
use crate::types::TypeId;
use abg_elf::SymbolId;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);
entity_impl!(DeclId, "decl");

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: IString,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug)]
pub enum DeclData {
    Var {
        ty: TypeId,
        is_in_public_symbol_table: bool,
    },
    Function {
        function_type: TypeId,
        is_declaration_only: bool,
        /// Set when this decl was cloned from an `origin` function because
        /// its linkage name differs (spec.md §4.5: inline-instance DIEs
        /// referring to an out-of-line definition).
        cloned_from: Option<DeclId>,
    },
    Namespace,
    /// A generic lexical scope decl (spec.md's `scope_decl`).
    Scope,
    TranslationUnit(TuId),
}

impl DeclData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DeclData::Var { .. } => "var_decl",
            DeclData::Function { .. } => "function_decl",
            DeclData::Namespace => "namespace_decl",
            DeclData::Scope => "scope_decl",
            DeclData::TranslationUnit(_) => "translation_unit",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Decl {
    pub name: IString,
    pub qualified_name: String,
    pub linkage_name: Option<IString>,
    pub location: Option<SourceLocation>,
    pub scope: Option<ScopeId>,
    pub symbol: Option<SymbolId>,
    pub data: DeclData,
}

impl Decl {
    pub fn new(name: IString, qualified_name: String, data: DeclData) -> Self {
        Decl {
            name,
            qualified_name,
            linkage_name: None,
            location: None,
            scope: None,
            symbol: None,
            data,
        }
    }

    pub fn is_method(&self) -> bool {
        // A function_decl is a method_decl (spec.md's "function_decl in a
        // class") purely by virtue of living in a class scope; there is no
        // separate IR tag for it, matching how method_type already reduces
        // to function_type + owning class at the type level.
        matches!(self.data, DeclData::Function { .. })
    }

    pub fn as_function(&self) -> Option<(TypeId, bool)> {
        match self.data {
            DeclData::Function {
                function_type,
                is_declaration_only,
                ..
            } => Some((function_type, is_declaration_only)),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<TypeId> {
        match self.data {
            DeclData::Var { ty, .. } => Some(ty),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct DeclArena {
    decls: PrimaryMap<DeclId, Decl>,
}

impl DeclArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decl: Decl) -> DeclId {
        self.decls.push(decl)
    }

    pub fn get(&self, id: DeclId) -> &Decl {
        &self.decls[id]
    }

    pub fn get_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Decl)> {
        self.decls.iter()
    }
}

impl std::ops::Index<DeclId> for DeclArena {
    type Output = Decl;
    fn index(&self, id: DeclId) -> &Decl {
        self.get(id)
    }
}

impl std::ops::IndexMut<DeclId> for DeclArena {
    fn index_mut(&mut self, id: DeclId) -> &mut Decl {
        self.get_mut(id)
    }
}
