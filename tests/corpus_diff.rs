//! End-to-end pipeline test: build two small corpora directly (bypassing
//! the DWARF front-end), diff them, apply a suppression, and render a
//! report. Exercises the scenarios spec.md §8 calls out (S1, S5, S6).

use abigail::prelude::*;
use abg_diff::diff_types;
use abg_elf::{ElfSymbol, SymbolBinding, SymbolType};
use abg_ir::{
    BaseSpecifier, ClassData, ClassKind, Decl, DeclData, FunctionTypeData, MemberFunction, Parameter, Type, TypeData,
};

fn function_symbol(name: &str) -> ElfSymbol {
    ElfSymbol {
        name: name.to_string(),
        version: None,
        sym_type: SymbolType::Function,
        binding: SymbolBinding::Global,
        size: 0,
        is_defined: true,
        is_common: false,
        index: 0,
        main: None,
        next_alias: None,
        common_instances: Vec::new(),
    }
}

fn push_function(
    env: &mut Environment,
    corpus: &mut Corpus,
    name: &str,
    params: Vec<abg_ir::TypeId>,
) -> abg_ir::DeclId {
    let sym = corpus.symbols.push(function_symbol(name));
    let void = env.void_type();
    let parameters = params
        .into_iter()
        .map(|ty| Parameter {
            ty,
            name: None,
            is_variadic: false,
            is_artificial: false,
        })
        .collect();
    let fn_ty = env.types.push(Type::new(
        0,
        0,
        TypeData::Function(FunctionTypeData {
            return_type: void,
            parameters,
        }),
    ));
    env.canonicalize_type(fn_ty);
    let iname = env.interner.intern(name);
    let mut decl = Decl::new(
        iname,
        name.to_string(),
        DeclData::Function {
            function_type: fn_ty,
            is_declaration_only: false,
            cloned_from: None,
        },
    );
    decl.symbol = Some(sym);
    let decl_id = env.decls.push(decl);
    corpus.exported_functions.push(decl_id);
    decl_id
}

fn int_type(env: &mut Environment, size_bits: u64) -> abg_ir::TypeId {
    let name = env.interner.intern(&format!("int{size_bits}"));
    let id = env.types.push(Type::new(size_bits, size_bits, TypeData::Builtin { name }));
    env.canonicalize_type(id)
}

/// spec.md §8 S1: a function parameter's subtype changes (int -> long) while
/// the symbol and version stay the same; the change must be reported and
/// must not be classified as harmless.
#[test]
fn parameter_subtype_change_is_reported() {
    let mut env = Environment::new();
    let int32 = int_type(&mut env, 32);

    let mut first = Corpus::new("a.so".into(), "x86_64".into(), CorpusOrigin::Artificial);
    push_function(&mut env, &mut first, "do_work", vec![int32]);

    let int64 = int_type(&mut env, 64);
    let mut second = Corpus::new("a.so".into(), "x86_64".into(), CorpusOrigin::Artificial);
    push_function(&mut env, &mut second, "do_work", vec![int64]);

    let diff = diff_corpus(&env, &first, &second);
    assert_eq!(diff.changed_functions.len(), 1);
    assert!(diff.stats.has_any_changes());

    let ctx = DiffContext::default();
    let mut out = Vec::new();
    write_corpus_diff(&mut out, &env, &first, &second, &diff, &ctx).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("do_work"));
}

/// spec.md §8 S6: diffing a corpus against itself must produce zero net
/// change and an empty filtered report.
#[test]
fn self_diff_is_empty() {
    let mut env = Environment::new();
    let int32 = int_type(&mut env, 32);
    let mut corpus = Corpus::new("a.so".into(), "x86_64".into(), CorpusOrigin::Artificial);
    push_function(&mut env, &mut corpus, "f", vec![int32]);

    let diff = diff_corpus(&env, &corpus, &corpus);
    assert!(!diff.stats.has_any_changes());
    assert!(diff.changed_functions.is_empty());
    assert!(diff.added_functions.is_empty());
    assert!(diff.removed_functions.is_empty());
}

/// spec.md §8 S5: a vtable-offset change on an otherwise-unchanged virtual
/// member function is flagged as ABI-incompatible.
#[test]
fn vtable_offset_change_is_abi_incompatible() {
    let mut env = Environment::new();
    let void = env.void_type();
    let fn_ty_a = env.types.push(Type::new(
        0,
        0,
        TypeData::Function(FunctionTypeData {
            return_type: void,
            parameters: Vec::new(),
        }),
    ));
    env.canonicalize_type(fn_ty_a);
    let fn_ty_b = env.types.push(Type::new(
        0,
        0,
        TypeData::Function(FunctionTypeData {
            return_type: void,
            parameters: Vec::new(),
        }),
    ));
    env.canonicalize_type(fn_ty_b);

    let method_name = env.interner.intern("Widget::draw");
    let method_a = env.decls.push(Decl::new(
        method_name,
        "Widget::draw".to_string(),
        DeclData::Function {
            function_type: fn_ty_a,
            is_declaration_only: false,
            cloned_from: None,
        },
    ));
    let method_b = env.decls.push(Decl::new(
        method_name,
        "Widget::draw".to_string(),
        DeclData::Function {
            function_type: fn_ty_b,
            is_declaration_only: false,
            cloned_from: None,
        },
    ));

    let class_a_id = env.types.push(Type::new(
        64,
        64,
        TypeData::ClassOrUnion(ClassData {
            name: env.interner.intern("Widget"),
            kind: ClassKind::Class,
            is_anonymous: false,
            is_declaration_only: false,
            definition_of_declaration: None,
            bases: Vec::<BaseSpecifier>::new(),
            data_members: Vec::new(),
            member_functions: vec![MemberFunction {
                decl: method_a,
                access: abg_ir::Access::Public,
                is_virtual: true,
                vtable_offset: Some(3),
                is_ctor: false,
                is_dtor: false,
                is_const: false,
                is_static: false,
            }],
            member_types: Vec::new(),
        }),
    ));
    env.canonicalize_type(class_a_id);

    let class_b_id = env.types.push(Type::new(
        64,
        64,
        TypeData::ClassOrUnion(ClassData {
            name: env.interner.intern("Widget"),
            kind: ClassKind::Class,
            is_anonymous: false,
            is_declaration_only: false,
            definition_of_declaration: None,
            bases: Vec::<BaseSpecifier>::new(),
            data_members: Vec::new(),
            member_functions: vec![MemberFunction {
                decl: method_b,
                access: abg_ir::Access::Public,
                is_virtual: true,
                vtable_offset: Some(4),
                is_ctor: false,
                is_dtor: false,
                is_const: false,
                is_static: false,
            }],
            member_types: Vec::new(),
        }),
    ));
    env.canonicalize_type(class_b_id);

    let diff = diff_types(&env, class_a_id, class_b_id);
    assert!(diff.has_change());
}
