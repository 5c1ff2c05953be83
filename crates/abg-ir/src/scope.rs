//! Scopes (spec.md §4.4 "Scopes"): namespaces, classes/unions, and
//! functions act as scopes; a translation unit's global scope has no
//! parent.

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::decls::DeclId;
use crate::types::TypeId;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);
entity_impl!(ScopeId, "scope");

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class(TypeId),
    Function(DeclId),
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub decls: Vec<DeclId>,
    pub children: Vec<ScopeId>,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Scope {
            kind,
            parent,
            decls: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Default)]
pub struct ScopeArena {
    scopes: PrimaryMap<ScopeId, Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope) -> ScopeId {
        self.scopes.push(scope)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id]
    }

    /// Walks `scope`'s ancestor chain to the global scope, inclusive.
    pub fn ancestors(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut out = vec![scope];
        let mut cur = self.scopes[scope].parent;
        while let Some(id) = cur {
            out.push(id);
            cur = self.scopes[id].parent;
        }
        out
    }
}

impl std::ops::Index<ScopeId> for ScopeArena {
    type Output = Scope;
    fn index(&self, id: ScopeId) -> &Scope {
        self.get(id)
    }
}

impl std::ops::IndexMut<ScopeId> for ScopeArena {
    fn index_mut(&mut self, id: ScopeId) -> &mut Scope {
        self.get_mut(id)
    }
}

/// Anonymous-type name comparison (spec.md §4.4): `__anonymous_struct__1`
/// and `__anonymous_struct__2` are equal under this rule, which strips the
/// numeric suffix that merely distinguishes fresh instances.
pub fn anonymous_name_base(name: &str) -> &str {
    const PREFIXES: &[&str] = &[
        "__anonymous_struct__",
        "__anonymous_union__",
        "__anonymous_enum__",
    ];
    for prefix in PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.chars().all(|c| c.is_ascii_digit()) {
                return prefix;
            }
        }
    }
    name
}

pub fn names_equal_ignoring_anon_suffix(a: &str, b: &str) -> bool {
    anonymous_name_base(a) == anonymous_name_base(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_struct_names_with_different_suffixes_are_equal() {
        assert!(names_equal_ignoring_anon_suffix(
            "__anonymous_struct__1",
            "__anonymous_struct__2"
        ));
        assert!(!names_equal_ignoring_anon_suffix(
            "__anonymous_struct__1",
            "__anonymous_union__1"
        ));
        assert!(!names_equal_ignoring_anon_suffix("foo", "bar"));
    }
}
