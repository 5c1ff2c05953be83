//! Name and location formatting shared by the detail sections (spec.md
//! §4.8: qualified name, linkage-name/alias set, source location).

use abg_ir::{Corpus, DeclId, Environment, SourceLocation};

pub fn qualified_name_of(env: &Environment, decl: DeclId) -> &str {
    &env.decls[decl].qualified_name
}

/// The decl's linkage name together with any other symbol aliases it has in
/// `corpus`, e.g. `_Z1fv {aliases: _Z1fv2, _Z1fv3}` when the alias set is
/// more than one name wide.
pub fn linkage_name_with_aliases(env: &Environment, corpus: &Corpus, decl: DeclId) -> Option<String> {
    let linkage = env.decls[decl].linkage_name.as_ref().map(|s| s.as_str().to_string());
    let sym = env.decls[decl].symbol?;
    let mut aliases: Vec<String> = corpus
        .symbols
        .aliases(sym)
        .into_iter()
        .map(|id| corpus.symbols[id].name.clone())
        .collect();
    aliases.sort();
    aliases.dedup();
    let primary = linkage.unwrap_or_else(|| corpus.symbols[sym].name.clone());
    let others: Vec<&String> = aliases.iter().filter(|n| **n != primary).collect();
    if others.is_empty() {
        Some(primary)
    } else {
        let joined = others.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
        Some(format!("{primary} {{aliases: {joined}}}"))
    }
}

pub fn format_location(loc: &SourceLocation) -> String {
    format!("{}:{}:{}", loc.file.as_str(), loc.line, loc.column)
}

pub fn location_of(env: &Environment, decl: DeclId) -> Option<String> {
    env.decls[decl].location.as_ref().map(format_location)
}
