//! Per-type diff (spec.md §4.7 "Per-type diff"): the dispatcher walks two
//! types structurally, short-circuiting on canonical-handle equality.

use abg_ir::{ClassData, DataMember, Environment, TypeData, TypeId};

use crate::category::ChangeCategory;
use crate::decls::apply_member_function_extras;
use crate::node::{ClassDiff, DiffKind, DiffNode, EnumDiff, FunctionDeclDiff, FunctionTypeDiff, MemberDiff};

/// The id a type should be compared by: its canonical handle if one has been
/// assigned, else its own id (spec.md §5: canonicalization may still be
/// pending for types on the late queue at diff time, e.g. within one TU
/// during incremental use; corpus-level diffing always runs after
/// `perform_late_type_canonicalizing`, so this is effectively always the
/// canonical handle in practice).
fn effective_id(env: &Environment, id: TypeId) -> TypeId {
    env.types[id].canonical.unwrap_or(id)
}

/// Diffs two types. `env` must be the single environment both `a` and `b`
/// were built into (spec.md §5 "Canonical-type identity... within one
/// environment").
pub fn diff_types(env: &Environment, a: TypeId, b: TypeId) -> DiffNode {
    if effective_id(env, a) == effective_id(env, b) {
        return DiffNode::unchanged(DiffKind::Unchanged);
    }

    match (&env.types[a].data, &env.types[b].data) {
        (TypeData::Pointer { pointee: p1 }, TypeData::Pointer { pointee: p2 }) => {
            let inner = diff_types(env, *p1, *p2);
            wrap_if_changed(inner, DiffKind::Pointer)
        }
        (
            TypeData::Reference {
                referee: r1,
                is_lvalue: l1,
            },
            TypeData::Reference {
                referee: r2,
                is_lvalue: l2,
            },
        ) if l1 == l2 => {
            let inner = diff_types(env, *r1, *r2);
            wrap_if_changed(inner, DiffKind::Reference)
        }
        (
            TypeData::Qualified {
                underlying: u1,
                cv: cv1,
            },
            TypeData::Qualified {
                underlying: u2,
                cv: cv2,
            },
        ) => {
            let inner = diff_types(env, *u1, *u2);
            wrap_node(inner, DiffKind::Qualified, cv1 != cv2)
        }
        (
            TypeData::Typedef {
                underlying: u1, ..
            },
            TypeData::Typedef {
                underlying: u2, ..
            },
        ) => {
            let inner = diff_types(env, *u1, *u2);
            wrap_if_changed(inner, DiffKind::Typedef)
        }
        (
            TypeData::Array {
                element: e1,
                subranges: s1,
            },
            TypeData::Array {
                element: e2,
                subranges: s2,
            },
        ) => {
            let inner = diff_types(env, *e1, *e2);
            wrap_node(inner, DiffKind::Array, s1 != s2)
        }
        (TypeData::Enum(e1), TypeData::Enum(e2)) => diff_enum(e1, e2),
        (TypeData::ClassOrUnion(c1), TypeData::ClassOrUnion(c2)) if c1.kind == c2.kind => {
            diff_class(env, c1, c2)
        }
        (TypeData::Function(f1), TypeData::Method { function: f2, .. })
        | (TypeData::Method { function: f1, .. }, TypeData::Function(f2))
        | (TypeData::Function(f1), TypeData::Function(f2))
        | (TypeData::Method { function: f1, .. }, TypeData::Method { function: f2, .. }) => {
            diff_function_type(env, f1, f2)
        }
        _ => DiffNode::local(DiffKind::Distinct { first: a, second: b }),
    }
}

fn wrap_if_changed(inner: DiffNode, wrap: impl FnOnce(Box<DiffNode>) -> DiffKind) -> DiffNode {
    wrap_node(inner, wrap, false)
}

/// Wraps `inner` in `wrap` if it changed, or `force_local` says to wrap
/// regardless (e.g. a qualifier or subrange bound changed even though the
/// underlying type's canonical handle did not).
fn wrap_node(inner: DiffNode, wrap: impl FnOnce(Box<DiffNode>) -> DiffKind, force_local: bool) -> DiffNode {
    if inner.has_change() || force_local {
        DiffNode {
            category: Default::default(),
            is_local: force_local,
            kind: wrap(Box::new(inner)),
        }
    } else {
        DiffNode::unchanged(DiffKind::Unchanged)
    }
}

fn diff_enum(a: &abg_ir::EnumTypeData, b: &abg_ir::EnumTypeData) -> DiffNode {
    let mut deleted = Vec::new();
    let mut inserted = Vec::new();
    let mut changed = Vec::new();

    for ea in &a.enumerators {
        match b.enumerators.iter().find(|eb| eb.name == ea.name) {
            Some(eb) if eb.value != ea.value => changed.push((ea.clone(), eb.clone())),
            Some(_) => {}
            None => deleted.push(ea.clone()),
        }
    }
    for eb in &b.enumerators {
        if !a.enumerators.iter().any(|ea| ea.name == eb.name) {
            inserted.push(eb.clone());
        }
    }

    let is_local = !deleted.is_empty() || !inserted.is_empty() || !changed.is_empty();
    // spec.md §4.7 "Change categories": appending enumerators without
    // touching any existing value is harmless; anything else (a removed or
    // renumbered enumerator) is a real change and stays uncategorized here.
    let category = if is_local && deleted.is_empty() && changed.is_empty() {
        ChangeCategory::HARMLESS_ENUM_CHANGE
    } else {
        ChangeCategory::NONE
    };
    DiffNode {
        category,
        is_local,
        kind: DiffKind::Enum(EnumDiff {
            deleted,
            inserted,
            changed,
        }),
    }
}

fn diff_function_type(
    env: &Environment,
    a: &abg_ir::FunctionTypeData,
    b: &abg_ir::FunctionTypeData,
) -> DiffNode {
    let return_type = diff_types(env, a.return_type, b.return_type);
    let mut parameters = Vec::new();
    let mut any_local = return_type.has_change();

    let len = a.parameters.len().max(b.parameters.len());
    for i in 0..len {
        match (a.parameters.get(i), b.parameters.get(i)) {
            (Some(pa), Some(pb)) => {
                let d = diff_types(env, pa.ty, pb.ty);
                any_local |= d.has_change();
                parameters.push(d);
            }
            (Some(pa), None) => {
                any_local = true;
                parameters.push(DiffNode::local(DiffKind::Distinct {
                    first: pa.ty,
                    second: pa.ty,
                }));
            }
            (None, Some(pb)) => {
                any_local = true;
                parameters.push(DiffNode::local(DiffKind::Distinct {
                    first: pb.ty,
                    second: pb.ty,
                }));
            }
            (None, None) => unreachable!(),
        }
    }

    DiffNode {
        category: Default::default(),
        is_local: any_local && a.parameters.len() != b.parameters.len(),
        kind: DiffKind::FunctionType(FunctionTypeDiff {
            return_type: Box::new(return_type),
            parameters,
        }),
    }
}

fn find_member<'a>(members: &'a [DataMember], name: &str, env: &Environment) -> Option<&'a DataMember> {
    members
        .iter()
        .find(|m| env.decls[m.decl].name.as_str() == name)
}

fn diff_class(env: &Environment, a: &ClassData, b: &ClassData) -> DiffNode {
    let mut deleted_members = Vec::new();
    let mut inserted_members = Vec::new();
    let mut changed_members = Vec::new();
    let mut is_local = false;

    for ma in &a.data_members {
        let name = env.decls[ma.decl].name.as_str();
        match find_member(&b.data_members, name, env) {
            Some(mb) => {
                let ty_a = env.decls[ma.decl].as_var();
                let ty_b = env.decls[mb.decl].as_var();
                if let (Some(ta), Some(tb)) = (ty_a, ty_b) {
                    let mut d = diff_types(env, ta, tb);
                    if d.has_change() || ma.layout_offset_bits != mb.layout_offset_bits || ma.access != mb.access {
                        is_local = true;
                        d.is_local = true;
                        if ma.access != mb.access {
                            d.category.insert(ChangeCategory::ACCESS_CHANGE);
                        }
                        if ma.is_static && mb.is_static {
                            d.category.insert(ChangeCategory::STATIC_DATA_MEMBER_CHANGE);
                        }
                        changed_members.push(MemberDiff {
                            first: ma.decl,
                            second: mb.decl,
                            diff: Box::new(d),
                        });
                    }
                }
            }
            None => {
                is_local = true;
                deleted_members.push(ma.decl);
            }
        }
    }
    for mb in &b.data_members {
        let name = env.decls[mb.decl].name.as_str();
        if find_member(&a.data_members, name, env).is_none() {
            is_local = true;
            inserted_members.push(mb.decl);
        }
    }

    let mut deleted_functions = Vec::new();
    let mut inserted_functions = Vec::new();
    let mut changed_functions = Vec::new();

    for fa in &a.member_functions {
        let name = env.decls[fa.decl].name.as_str();
        match b
            .member_functions
            .iter()
            .find(|fb| env.decls[fb.decl].name.as_str() == name)
        {
            Some(fb) => {
                let (ta, _) = env.decls[fa.decl].as_function().unwrap();
                let (tb, _) = env.decls[fb.decl].as_function().unwrap();
                let function_type = diff_types(env, ta, tb);
                let mut fn_diff = FunctionDeclDiff {
                    function_type: Box::new(function_type),
                    symbol_changed: false,
                    linkage_name_changed: false,
                    is_virtual_changed: false,
                    vtable_offset_changed: false,
                    is_abi_incompatible: false,
                };
                apply_member_function_extras(
                    &mut fn_diff,
                    fa.is_virtual,
                    fb.is_virtual,
                    fa.vtable_offset,
                    fb.vtable_offset,
                );
                if fn_diff.function_type.has_change() || fn_diff.is_virtual_changed || fn_diff.vtable_offset_changed {
                    is_local = true;
                    let mut category = ChangeCategory::NONE;
                    if !fa.is_virtual && !fb.is_virtual {
                        category.insert(ChangeCategory::NON_VIRTUAL_MEMBER_FN_CHANGE);
                    }
                    changed_functions.push(MemberDiff {
                        first: fa.decl,
                        second: fb.decl,
                        diff: Box::new(DiffNode {
                            category,
                            is_local: true,
                            kind: DiffKind::FunctionDecl(fn_diff),
                        }),
                    });
                }
            }
            None => {
                is_local = true;
                deleted_functions.push(fa.decl);
            }
        }
    }
    for fb in &b.member_functions {
        let name = env.decls[fb.decl].name.as_str();
        if !a.member_functions.iter().any(|fa| env.decls[fa.decl].name.as_str() == name) {
            is_local = true;
            inserted_functions.push(fb.decl);
        }
    }

    let mut base_diffs = Vec::new();
    let blen = a.bases.len().max(b.bases.len());
    for i in 0..blen {
        match (a.bases.get(i), b.bases.get(i)) {
            (Some(ba), Some(bb)) => {
                let d = diff_types(env, ba.base, bb.base);
                if d.has_change() || ba.access != bb.access || ba.offset_bits != bb.offset_bits {
                    is_local = true;
                    base_diffs.push(d);
                }
            }
            _ => is_local = true,
        }
    }

    DiffNode {
        category: Default::default(),
        is_local,
        kind: DiffKind::ClassOrUnion(ClassDiff {
            deleted_members,
            inserted_members,
            changed_members,
            deleted_functions,
            inserted_functions,
            changed_functions,
            base_diffs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abg_ir::{Type, TypeData};

    #[test]
    fn identical_canonical_handles_short_circuit_to_unchanged() {
        let mut env = Environment::new();
        let name = env.interner.intern("int");
        let t = env.types.push(Type::new(32, 32, TypeData::Builtin { name }));
        let id = env.canonicalize_type(t);
        let diff = diff_types(&env, id, id);
        assert!(matches!(diff.kind, DiffKind::Unchanged));
        assert!(!diff.has_change());
    }

    #[test]
    fn pointer_to_changed_pointee_reports_as_pointer_change() {
        let mut env = Environment::new();
        let n1 = env.interner.intern("int");
        let n2 = env.interner.intern("long");
        let i1 = env.types.push(Type::new(32, 32, TypeData::Builtin { name: n1 }));
        let i2 = env.types.push(Type::new(64, 64, TypeData::Builtin { name: n2 }));
        env.canonicalize_type(i1);
        env.canonicalize_type(i2);
        let p1 = env.types.push(Type::new(64, 64, TypeData::Pointer { pointee: i1 }));
        let p2 = env.types.push(Type::new(64, 64, TypeData::Pointer { pointee: i2 }));
        env.canonicalize_type(p1);
        env.canonicalize_type(p2);
        let diff = diff_types(&env, p1, p2);
        assert!(matches!(diff.kind, DiffKind::Pointer(_)));
    }

    #[test]
    fn enum_diff_finds_changed_and_added_enumerators() {
        use abg_ir::{EnumTypeData, Enumerator};
        let mut env = Environment::new();
        let u = env.types.push(Type::new(32, 32, TypeData::Builtin { name: env.interner.intern("uint") }));
        let a = EnumTypeData {
            underlying: u,
            enumerators: vec![Enumerator { name: env.interner.intern("A"), value: 0 }],
        };
        let b = EnumTypeData {
            underlying: u,
            enumerators: vec![
                Enumerator { name: env.interner.intern("A"), value: 1 },
                Enumerator { name: env.interner.intern("B"), value: 2 },
            ],
        };
        let diff = diff_enum(&a, &b);
        match diff.kind {
            DiffKind::Enum(e) => {
                assert_eq!(e.changed.len(), 1);
                assert_eq!(e.inserted.len(), 1);
                assert!(e.deleted.is_empty());
            }
            _ => panic!("expected enum diff"),
        }
    }
}
