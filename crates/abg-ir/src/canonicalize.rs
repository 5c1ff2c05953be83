//! Canonicalization (spec.md §4.4, DESIGN NOTES "Canonicalization via
//! equality walks"): a structural-hash bucket map for O(1)-amortized lookup,
//! falling back to a deep structural comparator on hash collision. Once an
//! environment is marked "done", structural equality of canonical types
//! reduces to pointer equality of their canonical-type handle (spec.md §3
//! invariant).

use std::collections::{HashMap, HashSet};

use crate::decls::DeclArena;
use crate::scope::{anonymous_name_base, names_equal_ignoring_anon_suffix};
use crate::types::{ClassKind, Type, TypeArena, TypeData, TypeId};

/// A type is deferred to the late-canonicalization queue when canonicalizing
/// it eagerly could observe a subtype that hasn't settled yet (spec.md §4.4
/// "risky to canonicalize early"): classes, and typedefs/pointers/
/// references/arrays to them, function types still being built, and any
/// type transitively containing a non-canonicalized subtype.
pub fn is_risky(types: &TypeArena, id: TypeId) -> bool {
    fn references_noncanonical_class(types: &TypeArena, id: TypeId, seen: &mut HashSet<TypeId>) -> bool {
        if !seen.insert(id) {
            return false;
        }
        let ty = &types[id];
        match &ty.data {
            TypeData::ClassOrUnion(_) => ty.canonical.is_none(),
            TypeData::Typedef { underlying, .. } => {
                is_class(types, *underlying) || references_noncanonical_class(types, *underlying, seen)
            }
            TypeData::Pointer { pointee } => {
                is_class(types, *pointee) || references_noncanonical_class(types, *pointee, seen)
            }
            TypeData::Reference { referee, .. } => {
                is_class(types, *referee) || references_noncanonical_class(types, *referee, seen)
            }
            TypeData::Array { element, .. } => {
                is_class(types, *element) || references_noncanonical_class(types, *element, seen)
            }
            TypeData::Qualified { underlying, .. } => {
                references_noncanonical_class(types, *underlying, seen)
            }
            _ => false,
        }
    }
    fn is_class(types: &TypeArena, id: TypeId) -> bool {
        matches!(types[id].data, TypeData::ClassOrUnion(_))
    }

    match &types[id].data {
        TypeData::ClassOrUnion(_) => true,
        TypeData::Function(_) | TypeData::Method { .. } => true,
        _ => references_noncanonical_class(types, id, &mut HashSet::new()),
    }
}

fn mix(h: u64, v: u64) -> u64 {
    // FNV-1a style mixing; only needs to be a cheap, collision-tolerant
    // fingerprint since the deep comparator is the source of truth.
    (h ^ v).wrapping_mul(0x100000001b3)
}

/// A coarse structural fingerprint used only to bucket candidates; it is
/// deliberately shallow about subtypes (using their own id rather than
/// recursing) so it terminates on cyclic graphs. Collisions are resolved by
/// [`structurally_equal`].
pub fn structural_hash(types: &TypeArena, id: TypeId) -> u64 {
    let ty = &types[id];
    let mut h = 0xcbf29ce484222325u64;
    h = mix(h, ty.data.kind_name().len() as u64);
    for b in ty.data.kind_name().bytes() {
        h = mix(h, b as u64);
    }
    h = mix(h, ty.size_bits);
    h = mix(h, ty.align_bits);
    let sub = |id: TypeId| {
        use cranelift_entity::EntityRef;
        id.index() as u64
    };
    match &ty.data {
        TypeData::Builtin { name } => {
            for b in name.as_str().bytes() {
                h = mix(h, b as u64);
            }
        }
        TypeData::Qualified { underlying, cv } => {
            h = mix(h, sub(*underlying));
            h = mix(h, cv.bits() as u64);
        }
        TypeData::Pointer { pointee } => h = mix(h, sub(*pointee)),
        TypeData::Reference { referee, is_lvalue } => {
            h = mix(h, sub(*referee));
            h = mix(h, *is_lvalue as u64);
        }
        TypeData::Array { element, subranges } => {
            h = mix(h, sub(*element));
            h = mix(h, subranges.len() as u64);
        }
        TypeData::Function(f) => {
            h = mix(h, sub(f.return_type));
            h = mix(h, f.parameters.len() as u64);
        }
        TypeData::Method {
            function,
            owning_class,
        } => {
            h = mix(h, sub(function.return_type));
            h = mix(h, sub(*owning_class));
        }
        TypeData::Enum(e) => {
            h = mix(h, sub(e.underlying));
            h = mix(h, e.enumerators.len() as u64);
        }
        TypeData::Typedef { name, underlying } => {
            for b in name.as_str().bytes() {
                h = mix(h, b as u64);
            }
            h = mix(h, sub(*underlying));
        }
        TypeData::ClassOrUnion(c) => {
            // Hash the name modulo its synthesized anonymous-class suffix
            // (spec.md §4.4) so two anonymous instances that `class_eq`
            // would treat as equal land in the same bucket.
            for b in anonymous_name_base(c.name.as_str()).bytes() {
                h = mix(h, b as u64);
            }
            h = mix(h, c.kind as u64);
            h = mix(h, c.bases.len() as u64);
            h = mix(h, c.data_members.len() as u64);
            h = mix(h, c.member_functions.len() as u64);
        }
    }
    h
}

/// spec.md §4.4: "two types are structurally equal iff they have matching
/// kind, size, alignment, and recursively equal substructure"; for classes,
/// the ordered tuple of name/is_struct/bases/members/virtual-functions.
///
/// Cyclic type graphs (a class containing a pointer back to itself via a
/// member function parameter) are handled coinductively: a `(a, b)` pair
/// already being compared higher up the call stack is assumed equal, the
/// standard technique for recursive structural-equivalence checks.
pub fn structurally_equal(types: &TypeArena, decls: &DeclArena, a: TypeId, b: TypeId) -> bool {
    let mut seen = HashSet::new();
    eq_inner(types, decls, a, b, &mut seen)
}

fn eq_inner(
    types: &TypeArena,
    decls: &DeclArena,
    a: TypeId,
    b: TypeId,
    seen: &mut HashSet<(TypeId, TypeId)>,
) -> bool {
    if a == b {
        return true;
    }
    // Once both sides are canonicalized, equality is pointer equality.
    let ta = &types[a];
    let tb = &types[b];
    if let (Some(ca), Some(cb)) = (ta.canonical, tb.canonical) {
        return ca == cb;
    }
    if !seen.insert((a, b)) {
        return true;
    }
    if ta.size_bits != tb.size_bits || ta.align_bits != tb.align_bits {
        return false;
    }
    match (&ta.data, &tb.data) {
        (TypeData::Builtin { name: na }, TypeData::Builtin { name: nb }) => na == nb,
        (
            TypeData::Qualified {
                underlying: ua,
                cv: cva,
            },
            TypeData::Qualified {
                underlying: ub,
                cv: cvb,
            },
        ) => cva == cvb && eq_inner(types, decls, *ua, *ub, seen),
        (TypeData::Pointer { pointee: pa }, TypeData::Pointer { pointee: pb }) => {
            eq_inner(types, decls, *pa, *pb, seen)
        }
        (
            TypeData::Reference {
                referee: ra,
                is_lvalue: la,
            },
            TypeData::Reference {
                referee: rb,
                is_lvalue: lb,
            },
        ) => la == lb && eq_inner(types, decls, *ra, *rb, seen),
        (
            TypeData::Array {
                element: ea,
                subranges: sa,
            },
            TypeData::Array {
                element: eb,
                subranges: sb,
            },
        ) => sa == sb && eq_inner(types, decls, *ea, *eb, seen),
        (TypeData::Function(fa), TypeData::Function(fb)) => {
            function_eq(types, decls, fa, fb, seen)
        }
        (
            TypeData::Method {
                function: fa,
                owning_class: oa,
            },
            TypeData::Method {
                function: fb,
                owning_class: ob,
            },
        ) => eq_inner(types, decls, *oa, *ob, seen) && function_eq(types, decls, fa, fb, seen),
        (TypeData::Enum(ea), TypeData::Enum(eb)) => {
            eq_inner(types, decls, ea.underlying, eb.underlying, seen)
                && ea.enumerators.len() == eb.enumerators.len()
                && ea
                    .enumerators
                    .iter()
                    .zip(eb.enumerators.iter())
                    .all(|(x, y)| x.name == y.name && x.value == y.value)
        }
        (
            TypeData::Typedef {
                name: na,
                underlying: ua,
            },
            TypeData::Typedef {
                name: nb,
                underlying: ub,
            },
        ) => na == nb && eq_inner(types, decls, *ua, *ub, seen),
        (TypeData::ClassOrUnion(ca), TypeData::ClassOrUnion(cb)) => {
            class_eq(types, decls, ca, cb, seen)
        }
        _ => false,
    }
}

fn function_eq(
    types: &TypeArena,
    decls: &DeclArena,
    fa: &crate::types::FunctionTypeData,
    fb: &crate::types::FunctionTypeData,
    seen: &mut HashSet<(TypeId, TypeId)>,
) -> bool {
    if fa.parameters.len() != fb.parameters.len() {
        return false;
    }
    if !eq_inner(types, decls, fa.return_type, fb.return_type, seen) {
        return false;
    }
    fa.parameters.iter().zip(fb.parameters.iter()).all(|(pa, pb)| {
        pa.is_variadic == pb.is_variadic && eq_inner(types, decls, pa.ty, pb.ty, seen)
    })
}

fn class_eq(
    types: &TypeArena,
    decls: &DeclArena,
    ca: &crate::types::ClassData,
    cb: &crate::types::ClassData,
    seen: &mut HashSet<(TypeId, TypeId)>,
) -> bool {
    if ca.kind != cb.kind
        || !names_equal_ignoring_anon_suffix(ca.name.as_str(), cb.name.as_str())
        || ca.bases.len() != cb.bases.len()
        || ca.data_members.len() != cb.data_members.len()
    {
        return false;
    }
    for (ba, bb) in ca.bases.iter().zip(cb.bases.iter()) {
        if ba.access != bb.access || ba.offset_bits != bb.offset_bits || ba.is_virtual != bb.is_virtual {
            return false;
        }
        if !eq_inner(types, decls, ba.base, bb.base, seen) {
            return false;
        }
    }
    for (ma, mb) in ca.data_members.iter().zip(cb.data_members.iter()) {
        let da = &decls[ma.decl];
        let db = &decls[mb.decl];
        if da.name != db.name
            || ma.layout_offset_bits != mb.layout_offset_bits
            || ma.access != mb.access
            || ma.is_static != mb.is_static
        {
            return false;
        }
        let (ta, tb) = match (da.as_var(), db.as_var()) {
            (Some(ta), Some(tb)) => (ta, tb),
            _ => return false,
        };
        if !eq_inner(types, decls, ta, tb, seen) {
            return false;
        }
    }
    let virt_a: Vec<_> = ca.member_functions.iter().filter(|m| m.is_virtual).collect();
    let virt_b: Vec<_> = cb.member_functions.iter().filter(|m| m.is_virtual).collect();
    if virt_a.len() != virt_b.len() {
        return false;
    }
    for (fa, fb) in virt_a.iter().zip(virt_b.iter()) {
        if fa.vtable_offset != fb.vtable_offset {
            return false;
        }
        let da = &decls[fa.decl];
        let db = &decls[fb.decl];
        let (ta, _) = da.as_function().unwrap();
        let (tb, _) = db.as_function().unwrap();
        if !eq_inner(types, decls, ta, tb, seen) {
            return false;
        }
    }
    true
}

/// Per-environment canonicalization state (spec.md §3 "canonical-type
/// reference", §4.4).
#[derive(Default)]
pub struct CanonicalRegistry {
    buckets: HashMap<u64, Vec<TypeId>>,
    late_queue: Vec<TypeId>,
    done: bool,
}

impl CanonicalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn mark_done(&mut self) {
        self.done = true;
    }

    pub fn schedule_late(&mut self, id: TypeId) {
        self.late_queue.push(id);
    }

    pub fn drain_late_queue(&mut self) -> Vec<TypeId> {
        std::mem::take(&mut self.late_queue)
    }

    /// Canonicalize `id`: register it as the representative of its
    /// structural-equality class if it is the first one seen, or return the
    /// existing representative otherwise. Idempotent (testable property 1).
    pub fn canonicalize(&mut self, types: &mut TypeArena, decls: &DeclArena, id: TypeId) -> TypeId {
        if let Some(existing) = types[id].canonical {
            return existing;
        }
        let hash = structural_hash(types, id);
        let bucket = self.buckets.entry(hash).or_default();
        for &candidate in bucket.iter() {
            if candidate == id {
                continue;
            }
            if structurally_equal(types, decls, id, candidate) {
                let canon = types[candidate].canonical.unwrap_or(candidate);
                types[id].canonical = Some(canon);
                return canon;
            }
        }
        bucket.push(id);
        types[id].canonical = Some(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decls::DeclArena;
    use crate::interner::Interner;
    use crate::types::{Type, TypeData};

    fn builtin(types: &mut TypeArena, interner: &Interner, name: &str, size: u64) -> TypeId {
        types.push(Type::new(
            size,
            size,
            TypeData::Builtin {
                name: interner.intern(name),
            },
        ))
    }

    #[test]
    fn canonicalizing_twice_is_idempotent() {
        let interner = Interner::new();
        let mut types = TypeArena::new();
        let decls = DeclArena::new();
        let mut reg = CanonicalRegistry::new();

        let a = builtin(&mut types, &interner, "int", 32);
        let b = builtin(&mut types, &interner, "int", 32);

        let ca = reg.canonicalize(&mut types, &decls, a);
        let cb = reg.canonicalize(&mut types, &decls, b);
        assert_eq!(ca, cb);

        // Canonicalizing `a` again returns the same handle.
        let ca2 = reg.canonicalize(&mut types, &decls, a);
        assert_eq!(ca, ca2);
    }

    #[test]
    fn distinct_builtins_get_distinct_canonical_handles() {
        let interner = Interner::new();
        let mut types = TypeArena::new();
        let decls = DeclArena::new();
        let mut reg = CanonicalRegistry::new();

        let a = builtin(&mut types, &interner, "int", 32);
        let b = builtin(&mut types, &interner, "long", 64);
        let ca = reg.canonicalize(&mut types, &decls, a);
        let cb = reg.canonicalize(&mut types, &decls, b);
        assert_ne!(ca, cb);
    }

    #[test]
    fn pointer_to_class_is_risky() {
        let interner = Interner::new();
        let mut types = TypeArena::new();
        let class = types.push(Type::new(
            32,
            32,
            TypeData::ClassOrUnion(crate::types::ClassData {
                name: interner.intern("S"),
                kind: ClassKind::Struct,
                is_anonymous: false,
                is_declaration_only: false,
                definition_of_declaration: None,
                bases: Vec::new(),
                data_members: Vec::new(),
                member_functions: Vec::new(),
                member_types: Vec::new(),
            }),
        ));
        let ptr = types.push(Type::new(64, 64, TypeData::Pointer { pointee: class }));
        assert!(is_risky(&types, class));
        assert!(is_risky(&types, ptr));

        let int = types.push(Type::new(
            32,
            32,
            TypeData::Builtin {
                name: interner.intern("int"),
            },
        ));
        assert!(!is_risky(&types, int));
    }
}
