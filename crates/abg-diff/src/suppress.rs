//! Suppression application (spec.md §4.6, §4.7): consults a
//! [`abg_suppression::SuppressionSet`] against each top-level changed
//! function/variable and marks matches `SUPPRESSED`.

use abg_ir::{Corpus, DeclId, Environment};
use abg_suppression::{ChangeKind, Suppression, SuppressionSet};

use crate::category::ChangeCategory;
use crate::corpus::{ChangedDecl, CorpusDiff};

fn symbol_name_and_aliases(env: &Environment, corpus: &Corpus, decl: DeclId) -> Option<(String, Vec<String>)> {
    let sym = env.decls[decl].symbol?;
    let aliases = corpus.symbols.aliases(sym);
    let primary = corpus.symbols[sym].name.clone();
    let rest = aliases
        .into_iter()
        .map(|id| corpus.symbols[id].name.clone())
        .filter(|n| *n != primary)
        .collect();
    Some((primary, rest))
}

fn function_matches(
    rule: &abg_suppression::FunctionSuppression,
    env: &Environment,
    corpus: &Corpus,
    decl: DeclId,
    file_name: &str,
    soname: Option<&str>,
    change_kind: ChangeKind,
) -> bool {
    if !rule.binary.matches(file_name, soname) {
        return false;
    }
    if let Some(ck) = rule.change_kind {
        if ck != ChangeKind::All && ck != change_kind {
            return false;
        }
    }
    let name = env.decls[decl].name.as_str();
    if let Some(exact) = &rule.name {
        if exact != name {
            return false;
        }
    }
    if let Some(re) = &rule.name_regexp {
        if !re.is_match(name) {
            return false;
        }
    }
    if rule.symbol_name.is_some() || rule.symbol_name_regexp.is_some() {
        match symbol_name_and_aliases(env, corpus, decl) {
            Some((primary, aliases)) => {
                if !rule.matches_symbol_name(&primary, &aliases) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

fn variable_matches(
    rule: &abg_suppression::VariableSuppression,
    env: &Environment,
    corpus: &Corpus,
    decl: DeclId,
    file_name: &str,
    soname: Option<&str>,
    change_kind: ChangeKind,
) -> bool {
    if !rule.binary.matches(file_name, soname) {
        return false;
    }
    if let Some(ck) = rule.change_kind {
        if ck != ChangeKind::All && ck != change_kind {
            return false;
        }
    }
    let name = env.decls[decl].name.as_str();
    if let Some(exact) = &rule.name {
        if exact != name {
            return false;
        }
    }
    if let Some(re) = &rule.name_regexp {
        if !re.is_match(name) {
            return false;
        }
    }
    if let Some(exact) = &rule.symbol_name {
        match env.decls[decl].symbol {
            Some(sym) if corpus.symbols[sym].name == *exact => {}
            _ => return false,
        }
    }
    true
}

fn suppress_changed(
    changed: &mut [ChangedDecl],
    env: &Environment,
    corpus: &Corpus,
    file_name: &str,
    soname: Option<&str>,
    suppressions: &SuppressionSet,
    is_function: bool,
) {
    for entry in changed.iter_mut() {
        let matched = suppressions.rules.iter().any(|rule| match rule {
            Suppression::Function(f) if is_function => function_matches(
                f,
                env,
                corpus,
                entry.first,
                file_name,
                soname,
                ChangeKind::FunctionSubtypeChange,
            ),
            Suppression::Variable(v) if !is_function => variable_matches(
                v,
                env,
                corpus,
                entry.first,
                file_name,
                soname,
                ChangeKind::VariableSubtypeChange,
            ),
            _ => false,
        });
        if matched {
            entry.diff.category.insert(ChangeCategory::SUPPRESSED);
        }
    }
}

/// Applies `suppressions` to every changed function and variable in `diff`,
/// marking matches `SUPPRESSED` in place. `first`/`second` are the two
/// corpora the diff was built from (suppression binary filters match against
/// either side's path/soname; spec.md leaves the exact side unspecified, so
/// both are tried).
pub fn apply_suppressions(
    diff: &mut CorpusDiff,
    env: &Environment,
    first: &Corpus,
    second: &Corpus,
    suppressions: &SuppressionSet,
) {
    if suppressions.rules.is_empty() {
        return;
    }
    suppress_changed(
        &mut diff.changed_functions,
        env,
        first,
        &first.path,
        first.soname.as_deref(),
        suppressions,
        true,
    );
    suppress_changed(
        &mut diff.changed_functions,
        env,
        second,
        &second.path,
        second.soname.as_deref(),
        suppressions,
        true,
    );
    suppress_changed(
        &mut diff.changed_variables,
        env,
        first,
        &first.path,
        first.soname.as_deref(),
        suppressions,
        false,
    );
    suppress_changed(
        &mut diff.changed_variables,
        env,
        second,
        &second.path,
        second.soname.as_deref(),
        suppressions,
        false,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use abg_ir::{CorpusOrigin, Decl, DeclData, FunctionTypeData, Type, TypeData};

    fn make_env_and_decl(name: &str) -> (Environment, DeclId) {
        let mut env = Environment::new();
        let void = env.void_type();
        let fn_ty = env.types.push(Type::new(
            0,
            0,
            TypeData::Function(FunctionTypeData {
                return_type: void,
                parameters: Vec::new(),
            }),
        ));
        env.canonicalize_type(fn_ty);
        let n = env.interner.intern(name);
        let decl = env.decls.push(Decl::new(
            n,
            name.to_string(),
            DeclData::Function {
                function_type: fn_ty,
                is_declaration_only: false,
                cloned_from: None,
            },
        ));
        (env, decl)
    }

    #[test]
    fn function_suppression_by_name_marks_suppressed() {
        let (env, decl) = make_env_and_decl("internal_helper");
        let corpus = Corpus::new("a.so".into(), "x86_64".into(), CorpusOrigin::Dwarf);
        let (set, errors) = SuppressionSet::parse_lenient("[suppress_function]\nname_regexp = ^internal_\n");
        assert!(errors.is_empty());
        let rule = match &set.rules[0] {
            Suppression::Function(f) => f,
            _ => panic!("expected function suppression"),
        };
        assert!(function_matches(
            rule,
            &env,
            &corpus,
            decl,
            "a.so",
            None,
            ChangeKind::FunctionSubtypeChange
        ));
    }
}
