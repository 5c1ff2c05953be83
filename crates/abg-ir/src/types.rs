//! The type entity hierarchy (spec.md §3 "Type entity (abstract)").

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::decls::DeclId;
use crate::interner::IString;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);
entity_impl!(TypeId, "ty");

/// A DIE origin: the offset a type was read from, tagged with which
/// debug-info partition (main vs alternate) the offset belongs to, since a
/// DIE offset is only unique *within* its partition (spec.md §3 invariant).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DieOrigin {
    pub offset: u64,
    pub is_alt: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Private,
}

bitflags::bitflags! {
    /// `const`/`volatile`/`restrict` bitset on a `qualified_type`.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CvQualifiers: u8 {
        const NONE = 0;
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Subrange {
    pub lower_bound: i64,
    pub upper_bound: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct Parameter {
    pub ty: TypeId,
    pub name: Option<IString>,
    pub is_variadic: bool,
    pub is_artificial: bool,
}

#[derive(Clone, Debug)]
pub struct FunctionTypeData {
    pub return_type: TypeId,
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug)]
pub struct Enumerator {
    pub name: IString,
    pub value: i64,
}

#[derive(Clone, Debug)]
pub struct EnumTypeData {
    pub underlying: TypeId,
    pub enumerators: Vec<Enumerator>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Struct,
    Class,
    Union,
}

#[derive(Clone, Debug)]
pub struct BaseSpecifier {
    pub base: TypeId,
    pub access: Access,
    pub offset_bits: u64,
    pub is_virtual: bool,
}

#[derive(Clone, Debug)]
pub struct DataMember {
    pub decl: DeclId,
    pub access: Access,
    pub layout_offset_bits: Option<u64>,
    pub is_static: bool,
    pub is_laid_out: bool,
}

#[derive(Clone, Debug)]
pub struct MemberFunction {
    pub decl: DeclId,
    pub access: Access,
    pub is_virtual: bool,
    pub vtable_offset: Option<u64>,
    pub is_ctor: bool,
    pub is_dtor: bool,
    pub is_const: bool,
    pub is_static: bool,
}

#[derive(Clone, Debug)]
pub struct ClassData {
    pub name: IString,
    pub kind: ClassKind,
    pub is_anonymous: bool,
    pub is_declaration_only: bool,
    pub definition_of_declaration: Option<TypeId>,
    pub bases: Vec<BaseSpecifier>,
    pub data_members: Vec<DataMember>,
    pub member_functions: Vec<MemberFunction>,
    pub member_types: Vec<TypeId>,
}

impl ClassData {
    /// spec.md §3 invariant: "A class with any non-static data member cannot
    /// remain declaration-only".
    pub fn has_non_static_data_member(&self) -> bool {
        self.data_members.iter().any(|m| !m.is_static)
    }
}

#[derive(Clone, Debug)]
pub enum TypeData {
    Builtin {
        name: IString,
    },
    Qualified {
        underlying: TypeId,
        cv: CvQualifiers,
    },
    Pointer {
        pointee: TypeId,
    },
    Reference {
        referee: TypeId,
        is_lvalue: bool,
    },
    Array {
        element: TypeId,
        subranges: Vec<Subrange>,
    },
    Function(FunctionTypeData),
    Method {
        function: FunctionTypeData,
        owning_class: TypeId,
    },
    Enum(EnumTypeData),
    Typedef {
        name: IString,
        underlying: TypeId,
    },
    ClassOrUnion(ClassData),
}

impl TypeData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeData::Builtin { .. } => "type_decl",
            TypeData::Qualified { .. } => "qualified_type",
            TypeData::Pointer { .. } => "pointer_type",
            TypeData::Reference { .. } => "reference_type",
            TypeData::Array { .. } => "array_type",
            TypeData::Function(_) => "function_type",
            TypeData::Method { .. } => "method_type",
            TypeData::Enum(_) => "enum_type",
            TypeData::Typedef { .. } => "typedef",
            TypeData::ClassOrUnion(c) if c.kind == ClassKind::Union => "union_type",
            TypeData::ClassOrUnion(_) => "class_or_union",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Type {
    pub size_bits: u64,
    pub align_bits: u64,
    pub canonical: Option<TypeId>,
    pub die_origin: Option<DieOrigin>,
    pub data: TypeData,
}

impl Type {
    pub fn new(size_bits: u64, align_bits: u64, data: TypeData) -> Self {
        Type {
            size_bits,
            align_bits,
            canonical: None,
            die_origin: None,
            data,
        }
    }

    pub fn with_origin(mut self, origin: DieOrigin) -> Self {
        self.die_origin = Some(origin);
        self
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        match &self.data {
            TypeData::ClassOrUnion(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassData> {
        match &mut self.data {
            TypeData::ClassOrUnion(c) => Some(c),
            _ => None,
        }
    }
}

/// The arena owning every [`Type`] ever built in one [`crate::Environment`].
#[derive(Default)]
pub struct TypeArena {
    types: PrimaryMap<TypeId, Type>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ty: Type) -> TypeId {
        self.types.push(ty)
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

impl std::ops::Index<TypeId> for TypeArena {
    type Output = Type;
    fn index(&self, id: TypeId) -> &Type {
        self.get(id)
    }
}

impl std::ops::IndexMut<TypeId> for TypeArena {
    fn index_mut(&mut self, id: TypeId) -> &mut Type {
        self.get_mut(id)
    }
}
