//! Corpus-level diff (spec.md §4.7 "Corpus diff"): matches exported
//! functions and variables across two corpora by symbol identity
//! (name + version, tolerant of aliases), then diffs the matched pairs.

use std::collections::{HashMap, HashSet};

use abg_elf::SymbolId;
use abg_ir::{Corpus, DeclId, Environment};

use crate::category::ChangeCategory;
use crate::decls::{diff_function_decl, diff_var};
use crate::node::DiffNode;
use crate::stats::CorpusDiffStats;

pub struct ChangedDecl {
    pub first: DeclId,
    pub second: DeclId,
    pub diff: DiffNode,
}

#[derive(Default)]
pub struct CorpusDiff {
    pub added_functions: Vec<DeclId>,
    pub removed_functions: Vec<DeclId>,
    pub changed_functions: Vec<ChangedDecl>,

    pub added_variables: Vec<DeclId>,
    pub removed_variables: Vec<DeclId>,
    pub changed_variables: Vec<ChangedDecl>,

    /// spec.md §4.8: ELF symbols with no corresponding exported decl, i.e.
    /// no debug info was emitted for them.
    pub added_unreferenced_function_symbols: Vec<String>,
    pub removed_unreferenced_function_symbols: Vec<String>,
    pub added_unreferenced_variable_symbols: Vec<String>,
    pub removed_unreferenced_variable_symbols: Vec<String>,

    pub stats: CorpusDiffStats,
}

/// (name, version) identity key, spec.md §4.7 "Symbol identity".
type SymbolKey = (String, Option<String>);

fn symbol_keys(corpus: &Corpus, sym: SymbolId) -> Vec<SymbolKey> {
    corpus
        .symbols
        .aliases(sym)
        .into_iter()
        .map(|id| {
            let s = &corpus.symbols[id];
            (s.name.clone(), s.version.as_ref().map(|v| v.name.clone()))
        })
        .collect()
}

fn index_by_symbol(env: &Environment, corpus: &Corpus, decls: &[DeclId]) -> HashMap<SymbolKey, DeclId> {
    let mut map = HashMap::new();
    for &decl in decls {
        let Some(sym) = env.decls[decl].symbol else { continue };
        for key in symbol_keys(corpus, sym) {
            map.entry(key).or_insert(decl);
        }
    }
    map
}

fn find_match(env: &Environment, corpus: &Corpus, decl: DeclId, index: &HashMap<SymbolKey, DeclId>) -> Option<DeclId> {
    let sym = env.decls[decl].symbol?;
    symbol_keys(corpus, sym).into_iter().find_map(|k| index.get(&k).copied())
}

/// spec.md §4.7 "Change categories": the alias set grew or shrank but the
/// primary (name, version) identity used to match the pair did not change.
fn alias_set_changed(env: &Environment, first: &Corpus, a: DeclId, second: &Corpus, b: DeclId) -> bool {
    let (Some(sa), Some(sb)) = (env.decls[a].symbol, env.decls[b].symbol) else {
        return false;
    };
    let mut keys_a: Vec<_> = symbol_keys(first, sa);
    let mut keys_b: Vec<_> = symbol_keys(second, sb);
    keys_a.sort();
    keys_b.sort();
    keys_a != keys_b
}

/// Names of all aliases bound to `decls`' symbols, i.e. "this is referenced
/// by debug info" (spec.md §4.8).
fn referenced_symbol_names(env: &Environment, corpus: &Corpus, decls: &[DeclId]) -> HashSet<String> {
    let mut names = HashSet::new();
    for &decl in decls {
        let Some(sym) = env.decls[decl].symbol else { continue };
        for id in corpus.symbols.aliases(sym) {
            names.insert(corpus.symbols[id].name.clone());
        }
    }
    names
}

/// Defined ELF symbols in `defined` with no matching exported decl name.
fn unreferenced_names(defined: &HashMap<String, Vec<SymbolId>>, referenced: &HashSet<String>) -> HashSet<String> {
    defined.keys().filter(|name| !referenced.contains(*name)).cloned().collect()
}

fn symmetric_diff_counts(first: &HashSet<String>, second: &HashSet<String>) -> (Vec<String>, Vec<String>) {
    let mut added: Vec<String> = second.difference(first).cloned().collect();
    let mut removed: Vec<String> = first.difference(second).cloned().collect();
    added.sort();
    removed.sort();
    (added, removed)
}

/// Diffs the exported-function and exported-variable sets of two corpora
/// built in the same [`Environment`] (spec.md §5: canonical-type identity
/// only holds across corpora sharing one environment).
#[tracing::instrument(skip(env, first, second), fields(first = %first.path, second = %second.path))]
pub fn diff_corpus(env: &Environment, first: &Corpus, second: &Corpus) -> CorpusDiff {
    let mut result = CorpusDiff::default();

    let second_fn_index = index_by_symbol(env, second, &second.exported_functions);
    let mut matched_second_fns = std::collections::HashSet::new();

    for &fa in &first.exported_functions {
        match find_match(env, second, fa, &second_fn_index) {
            Some(fb) => {
                matched_second_fns.insert(fb);
                let mut diff_node = diff_function_decl(env, fa, fb);
                if alias_set_changed(env, first, fa, second, fb) {
                    diff_node.category.insert(ChangeCategory::HARMLESS_SYMBOL_ALIAS_CHANGE);
                }
                if diff_node.has_change() {
                    result.stats.num_changed_functions += 1;
                    if diff_node.is_local {
                        result.stats.num_leaf_changes += 1;
                    }
                    result.changed_functions.push(ChangedDecl {
                        first: fa,
                        second: fb,
                        diff: diff_node,
                    });
                }
            }
            None => {
                result.stats.num_removed_functions += 1;
                result.removed_functions.push(fa);
            }
        }
    }
    for &fb in &second.exported_functions {
        if !matched_second_fns.contains(&fb) {
            result.stats.num_added_functions += 1;
            result.added_functions.push(fb);
        }
    }

    let second_var_index = index_by_symbol(env, second, &second.exported_variables);
    let mut matched_second_vars = std::collections::HashSet::new();

    for &va in &first.exported_variables {
        match find_match(env, second, va, &second_var_index) {
            Some(vb) => {
                matched_second_vars.insert(vb);
                let mut diff_node = diff_var(env, va, vb);
                if alias_set_changed(env, first, va, second, vb) {
                    diff_node.category.insert(ChangeCategory::HARMLESS_SYMBOL_ALIAS_CHANGE);
                }
                if diff_node.has_change() {
                    result.stats.num_changed_variables += 1;
                    if diff_node.is_local {
                        result.stats.num_leaf_changes += 1;
                    }
                    result.changed_variables.push(ChangedDecl {
                        first: va,
                        second: vb,
                        diff: diff_node,
                    });
                }
            }
            None => {
                result.stats.num_removed_variables += 1;
                result.removed_variables.push(va);
            }
        }
    }
    for &vb in &second.exported_variables {
        if !matched_second_vars.contains(&vb) {
            result.stats.num_added_variables += 1;
            result.added_variables.push(vb);
        }
    }

    let first_ref_fns = referenced_symbol_names(env, first, &first.exported_functions);
    let second_ref_fns = referenced_symbol_names(env, second, &second.exported_functions);
    let first_unref_fns = unreferenced_names(&first.defined_functions, &first_ref_fns);
    let second_unref_fns = unreferenced_names(&second.defined_functions, &second_ref_fns);
    let (added_fn_syms, removed_fn_syms) = symmetric_diff_counts(&first_unref_fns, &second_unref_fns);
    result.stats.num_added_unreferenced_function_symbols = added_fn_syms.len();
    result.stats.num_removed_unreferenced_function_symbols = removed_fn_syms.len();
    result.added_unreferenced_function_symbols = added_fn_syms;
    result.removed_unreferenced_function_symbols = removed_fn_syms;

    let first_ref_vars = referenced_symbol_names(env, first, &first.exported_variables);
    let second_ref_vars = referenced_symbol_names(env, second, &second.exported_variables);
    let first_unref_vars = unreferenced_names(&first.defined_variables, &first_ref_vars);
    let second_unref_vars = unreferenced_names(&second.defined_variables, &second_ref_vars);
    let (added_var_syms, removed_var_syms) = symmetric_diff_counts(&first_unref_vars, &second_unref_vars);
    result.stats.num_added_unreferenced_variable_symbols = added_var_syms.len();
    result.stats.num_removed_unreferenced_variable_symbols = removed_var_syms.len();
    result.added_unreferenced_variable_symbols = added_var_syms;
    result.removed_unreferenced_variable_symbols = removed_var_syms;

    tracing::debug!(
        added_functions = result.stats.num_added_functions,
        removed_functions = result.stats.num_removed_functions,
        changed_functions = result.stats.num_changed_functions,
        added_variables = result.stats.num_added_variables,
        removed_variables = result.stats.num_removed_variables,
        changed_variables = result.stats.num_changed_variables,
        "corpus diff complete"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use abg_elf::{ElfSymbol, SymbolBinding, SymbolType};
    use abg_ir::{CorpusOrigin, Decl, DeclData, FunctionTypeData, Type, TypeData};

    fn func_symbol(name: &str) -> ElfSymbol {
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

    fn corpus_with_function(env: &mut Environment, symbol_name: &str, ret: abg_ir::TypeId) -> (Corpus, DeclId) {
        let mut corpus = Corpus::new("a.so".into(), "x86_64".into(), CorpusOrigin::Dwarf);
        let sym = corpus.symbols.push(func_symbol(symbol_name));
        let fn_ty = env.types.push(Type::new(
            0,
            0,
            TypeData::Function(FunctionTypeData {
                return_type: ret,
                parameters: Vec::new(),
            }),
        ));
        env.canonicalize_type(fn_ty);
        let name = env.interner.intern(symbol_name);
        let mut decl = Decl::new(
            name,
            symbol_name.to_string(),
            DeclData::Function {
                function_type: fn_ty,
                is_declaration_only: false,
                cloned_from: None,
            },
        );
        decl.symbol = Some(sym);
        let decl_id = env.decls.push(decl);
        corpus.exported_functions.push(decl_id);
        (corpus, decl_id)
    }

    #[test]
    fn unmatched_function_is_removed_then_added() {
        let mut env = Environment::new();
        let void = env.void_type();
        let (first, _) = corpus_with_function(&mut env, "old_fn", void);
        let (second, _) = corpus_with_function(&mut env, "new_fn", void);
        let diff = diff_corpus(&env, &first, &second);
        assert_eq!(diff.removed_functions.len(), 1);
        assert_eq!(diff.added_functions.len(), 1);
        assert!(diff.changed_functions.is_empty());
    }

    #[test]
    fn defined_symbol_with_no_exported_decl_is_unreferenced() {
        let mut env = Environment::new();
        let void = env.void_type();
        let (mut first, _) = corpus_with_function(&mut env, "f", void);
        first.defined_functions.insert("asm_stub".into(), vec![]);
        let (mut second, _) = corpus_with_function(&mut env, "f", void);
        second.defined_functions.insert("asm_stub".into(), vec![]);
        second.defined_functions.insert("new_stub".into(), vec![]);
        let diff = diff_corpus(&env, &first, &second);
        assert_eq!(diff.added_unreferenced_function_symbols, vec!["new_stub".to_string()]);
        assert!(diff.removed_unreferenced_function_symbols.is_empty());
    }

    #[test]
    fn matched_function_with_same_signature_is_not_reported_changed() {
        let mut env = Environment::new();
        let void = env.void_type();
        let (first, _) = corpus_with_function(&mut env, "f", void);
        let (second, _) = corpus_with_function(&mut env, "f", void);
        let diff = diff_corpus(&env, &first, &second);
        assert!(diff.removed_functions.is_empty());
        assert!(diff.added_functions.is_empty());
        assert!(diff.changed_functions.is_empty());
        assert!(!diff.stats.has_any_changes());
    }
}
