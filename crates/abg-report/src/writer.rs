//! Report rendering (spec.md §4.8): summary header, then one detail section
//! per removed/changed/added function, variable, and unreferenced symbol.

use std::io::Write;

use abg_diff::{ChangedDecl, CorpusDiff, DiffContext, DiffKind, DiffNode};
use abg_ir::{Corpus, DeclId, Environment};
use thiserror::Error;

use crate::names::{linkage_name_with_aliases, location_of, qualified_name_of};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, ReportError>;

/// Renders `diff` to `w` in the format `ctx.leaf_mode` selects (spec.md
/// §4.8). Returns `Ok` regardless of whether any changes were found; callers
/// decide the process exit code from `diff.stats`.
pub fn write_corpus_diff(
    w: &mut dyn Write,
    env: &Environment,
    first: &Corpus,
    second: &Corpus,
    diff: &CorpusDiff,
    ctx: &DiffContext,
) -> Result<()> {
    let stats = &diff.stats;
    writeln!(
        w,
        "Functions changes summary: {} Removed, {} Changed, {} Added",
        stats.num_removed_functions, stats.num_changed_functions, stats.num_added_functions
    )?;
    writeln!(
        w,
        "Variables changes summary: {} Removed, {} Changed, {} Added",
        stats.num_removed_variables, stats.num_changed_variables, stats.num_added_variables
    )?;
    writeln!(
        w,
        "Function symbols not referenced by debug info changes summary: {} Removed, {} Added",
        stats.num_removed_unreferenced_function_symbols, stats.num_added_unreferenced_function_symbols
    )?;
    writeln!(
        w,
        "Variable symbols not referenced by debug info changes summary: {} Removed, {} Added",
        stats.num_removed_unreferenced_variable_symbols, stats.num_added_unreferenced_variable_symbols
    )?;
    writeln!(w)?;

    write_decl_list(w, env, "function", "removed", &diff.removed_functions)?;
    write_changed_list(w, env, first, second, "function", ctx, &diff.changed_functions)?;
    write_decl_list(w, env, "function", "added", &diff.added_functions)?;

    write_decl_list(w, env, "variable", "removed", &diff.removed_variables)?;
    write_changed_list(w, env, first, second, "variable", ctx, &diff.changed_variables)?;
    write_decl_list(w, env, "variable", "added", &diff.added_variables)?;

    write_symbol_list(w, "function symbol", "removed", &diff.removed_unreferenced_function_symbols)?;
    write_symbol_list(w, "function symbol", "added", &diff.added_unreferenced_function_symbols)?;
    write_symbol_list(w, "variable symbol", "removed", &diff.removed_unreferenced_variable_symbols)?;
    write_symbol_list(w, "variable symbol", "added", &diff.added_unreferenced_variable_symbols)?;

    tracing::debug!(leaf_mode = ctx.leaf_mode, "corpus diff report written");
    Ok(())
}

fn write_decl_list(w: &mut dyn Write, env: &Environment, kind: &str, verb: &str, decls: &[DeclId]) -> Result<()> {
    for &decl in decls {
        writeln!(w, "  [{verb} {kind}] '{}'", qualified_name_of(env, decl))?;
        if let Some(loc) = location_of(env, decl) {
            writeln!(w, "    at {loc}")?;
        }
    }
    Ok(())
}

fn write_symbol_list(w: &mut dyn Write, kind: &str, verb: &str, names: &[String]) -> Result<()> {
    for name in names {
        writeln!(w, "  [{verb} {kind}] '{name}'")?;
    }
    Ok(())
}

fn write_changed_list(
    w: &mut dyn Write,
    env: &Environment,
    first: &Corpus,
    second: &Corpus,
    kind: &str,
    ctx: &DiffContext,
    entries: &[ChangedDecl],
) -> Result<()> {
    for entry in ctx.filter_changed(entries) {
        writeln!(w, "  [changed {kind}] '{}'", qualified_name_of(env, entry.first))?;
        if let Some(loc) = location_of(env, entry.first) {
            writeln!(w, "    at {loc}")?;
        }
        if let (Some(a), Some(b)) = (
            linkage_name_with_aliases(env, first, entry.first),
            linkage_name_with_aliases(env, second, entry.second),
        ) {
            if a != b {
                writeln!(w, "    linkage name changed from '{a}' to '{b}'")?;
            }
        }
        write_node(w, env, &entry.diff, 2)?;
    }
    Ok(())
}

/// Recursively renders a diff node, indenting two spaces per nesting depth
/// (spec.md §4.8).
fn write_node(w: &mut dyn Write, env: &Environment, node: &DiffNode, depth: usize) -> Result<()> {
    let pad = "  ".repeat(depth);
    match &node.kind {
        DiffKind::Unchanged => Ok(()),
        DiffKind::Distinct { .. } => writeln!(w, "{pad}type changed entirely").map_err(Into::into),
        DiffKind::Pointer(inner) => {
            writeln!(w, "{pad}pointed-to type changed:")?;
            write_node(w, env, inner, depth + 1)
        }
        DiffKind::Reference(inner) => {
            writeln!(w, "{pad}referenced type changed:")?;
            write_node(w, env, inner, depth + 1)
        }
        DiffKind::Qualified(inner) => {
            writeln!(w, "{pad}qualified type changed:")?;
            write_node(w, env, inner, depth + 1)
        }
        DiffKind::Typedef(inner) => {
            writeln!(w, "{pad}underlying type changed:")?;
            write_node(w, env, inner, depth + 1)
        }
        DiffKind::Array(inner) => {
            writeln!(w, "{pad}array element type or bounds changed:")?;
            write_node(w, env, inner, depth + 1)
        }
        DiffKind::Enum(e) => {
            for en in &e.deleted {
                writeln!(w, "{pad}enumerator '{}' deleted", en.name.as_str())?;
            }
            for en in &e.inserted {
                writeln!(w, "{pad}enumerator '{}' inserted", en.name.as_str())?;
            }
            for (a, b) in &e.changed {
                writeln!(w, "{pad}enumerator '{}' value changed from {} to {}", a.name.as_str(), a.value, b.value)?;
            }
            Ok(())
        }
        DiffKind::ClassOrUnion(c) => {
            for &m in &c.deleted_members {
                writeln!(w, "{pad}data member '{}' deleted", qualified_name_of(env, m))?;
            }
            for &m in &c.inserted_members {
                writeln!(w, "{pad}data member '{}' inserted", qualified_name_of(env, m))?;
            }
            for m in &c.changed_members {
                writeln!(w, "{pad}data member '{}' changed:", qualified_name_of(env, m.first))?;
                write_node(w, env, &m.diff, depth + 1)?;
            }
            for &f in &c.deleted_functions {
                writeln!(w, "{pad}member function '{}' deleted", qualified_name_of(env, f))?;
            }
            for &f in &c.inserted_functions {
                writeln!(w, "{pad}member function '{}' inserted", qualified_name_of(env, f))?;
            }
            for f in &c.changed_functions {
                writeln!(w, "{pad}member function '{}' changed:", qualified_name_of(env, f.first))?;
                write_node(w, env, &f.diff, depth + 1)?;
            }
            for base in &c.base_diffs {
                write_node(w, env, base, depth)?;
            }
            Ok(())
        }
        DiffKind::FunctionType(f) => {
            write_node(w, env, &f.return_type, depth)?;
            for p in &f.parameters {
                write_node(w, env, p, depth)?;
            }
            Ok(())
        }
        DiffKind::FunctionDecl(f) => {
            write_node(w, env, &f.function_type, depth)?;
            if f.symbol_changed {
                writeln!(w, "{pad}symbol changed")?;
            }
            if f.is_virtual_changed {
                writeln!(w, "{pad}virtual-ness changed")?;
            }
            if f.vtable_offset_changed {
                // spec.md §8 scenario S5's exact wording.
                writeln!(w, "{pad}the vtable offset changed")?;
            }
            if f.is_abi_incompatible {
                writeln!(w, "{pad}this change is incompatible with the current ABI")?;
            }
            Ok(())
        }
        DiffKind::Var(v) => {
            write_node(w, env, &v.ty, depth)?;
            if v.symbol_changed {
                writeln!(w, "{pad}symbol changed")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abg_diff::{diff_corpus, propagate_categories};
    use abg_ir::{CorpusOrigin, Decl, DeclData, FunctionTypeData, Type, TypeData};

    fn make_corpus_with_fn(env: &mut Environment, name: &str, ret: abg_ir::TypeId) -> Corpus {
        use abg_elf::{ElfSymbol, SymbolBinding, SymbolType};
        let mut corpus = Corpus::new("a.so".into(), "x86_64".into(), CorpusOrigin::Dwarf);
        let sym = corpus.symbols.push(ElfSymbol {
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
        });
        let fn_ty = env.types.push(Type::new(
            0,
            0,
            TypeData::Function(FunctionTypeData {
                return_type: ret,
                parameters: Vec::new(),
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
        corpus
    }

    #[test]
    fn identical_corpora_produce_all_zero_summary() {
        let mut env = Environment::new();
        let void = env.void_type();
        let first = make_corpus_with_fn(&mut env, "f", void);
        let second = make_corpus_with_fn(&mut env, "f", void);
        let mut diff = diff_corpus(&env, &first, &second);
        for c in &mut diff.changed_functions {
            propagate_categories(&mut c.diff);
        }
        let mut out = Vec::new();
        write_corpus_diff(&mut out, &env, &first, &second, &diff, &DiffContext::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Functions changes summary: 0 Removed, 0 Changed, 0 Added"));
        assert!(!diff.stats.has_any_changes());
    }

    #[test]
    fn removed_function_is_listed_in_details() {
        let mut env = Environment::new();
        let void = env.void_type();
        let first = make_corpus_with_fn(&mut env, "old_fn", void);
        let second = make_corpus_with_fn(&mut env, "new_fn", void);
        let diff = diff_corpus(&env, &first, &second);
        let mut out = Vec::new();
        write_corpus_diff(&mut out, &env, &first, &second, &diff, &DiffContext::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[removed function] 'old_fn'"));
        assert!(text.contains("[added function] 'new_fn'"));
    }
}
