//! Diff nodes (spec.md §4.7): one variant per IR kind, mirroring IR
//! structure.

use abg_ir::{DeclId, Enumerator, TypeId};

use crate::category::ChangeCategory;

/// Common envelope every diff node carries, regardless of kind.
#[derive(Debug)]
pub struct DiffNode {
    pub category: ChangeCategory,
    /// spec.md §4.7 "Filtering": true when this node's own change is not
    /// fully explained by a descendant diff (leaf mode reports only these).
    pub is_local: bool,
    pub kind: DiffKind,
}

impl DiffNode {
    pub fn unchanged(kind: DiffKind) -> Self {
        DiffNode {
            category: ChangeCategory::NONE,
            is_local: false,
            kind,
        }
    }

    pub fn local(kind: DiffKind) -> Self {
        DiffNode {
            category: ChangeCategory::NONE,
            is_local: true,
            kind,
        }
    }

    /// A node is "changed" at all when it has any local change or any
    /// changed descendant (the two are not mutually exclusive: a pointer
    /// whose pointee changed is itself non-local, but the leaf is below it).
    pub fn has_change(&self) -> bool {
        !matches!(self.kind, DiffKind::Unchanged) || self.is_local
    }
}

#[derive(Debug)]
pub enum DiffKind {
    Unchanged,
    /// spec.md §4.7: "the engine falls back to 'something changed entirely'"
    /// when the two sides are of incompatible kinds.
    Distinct { first: TypeId, second: TypeId },
    Pointer(Box<DiffNode>),
    Reference(Box<DiffNode>),
    Qualified(Box<DiffNode>),
    Typedef(Box<DiffNode>),
    Array(Box<DiffNode>),
    Enum(EnumDiff),
    ClassOrUnion(ClassDiff),
    FunctionType(FunctionTypeDiff),
    FunctionDecl(FunctionDeclDiff),
    Var(VarDiff),
}

#[derive(Debug)]
pub struct EnumDiff {
    pub deleted: Vec<Enumerator>,
    pub inserted: Vec<Enumerator>,
    pub changed: Vec<(Enumerator, Enumerator)>,
}

#[derive(Debug)]
pub struct MemberDiff<T> {
    pub first: T,
    pub second: T,
    pub diff: Box<DiffNode>,
}

#[derive(Debug)]
pub struct ClassDiff {
    pub deleted_members: Vec<DeclId>,
    pub inserted_members: Vec<DeclId>,
    pub changed_members: Vec<MemberDiff<DeclId>>,
    pub deleted_functions: Vec<DeclId>,
    pub inserted_functions: Vec<DeclId>,
    pub changed_functions: Vec<MemberDiff<DeclId>>,
    pub base_diffs: Vec<DiffNode>,
}

#[derive(Debug)]
pub struct FunctionTypeDiff {
    pub return_type: Box<DiffNode>,
    pub parameters: Vec<DiffNode>,
}

#[derive(Debug)]
pub struct FunctionDeclDiff {
    pub function_type: Box<DiffNode>,
    pub symbol_changed: bool,
    pub linkage_name_changed: bool,
    pub is_virtual_changed: bool,
    pub vtable_offset_changed: bool,
    /// spec.md §4.8: "flagging ABI-incompatible changes explicitly" — set
    /// when a vtable-offset change is observed on a still-virtual function.
    pub is_abi_incompatible: bool,
}

#[derive(Debug)]
pub struct VarDiff {
    pub ty: Box<DiffNode>,
    pub symbol_changed: bool,
}
