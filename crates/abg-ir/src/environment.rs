//! The environment (spec.md §3 "Environment", §5 "Concurrency & resource
//! model"): a process-wide, single-threaded, resource-owning context whose
//! lifetime exceeds all IR it creates. All IR artifacts compared together
//! must share one environment.

use crate::canonicalize::CanonicalRegistry;
use crate::decls::DeclArena;
use crate::interner::Interner;
use crate::scope::ScopeArena;
use crate::translation_unit::TuArena;
use crate::types::{Type, TypeArena, TypeData, TypeId};

pub struct Environment {
    pub interner: Interner,
    pub types: TypeArena,
    pub decls: DeclArena,
    pub scopes: ScopeArena,
    pub tus: TuArena,
    canonical: CanonicalRegistry,
    void_type: TypeId,
    variadic_type: TypeId,
}

impl Environment {
    pub fn new() -> Self {
        let interner = Interner::new();
        let mut types = TypeArena::new();
        let void_type = types.push(Type::new(
            0,
            0,
            TypeData::Builtin {
                name: interner.intern("void"),
            },
        ));
        let variadic_type = types.push(Type::new(
            0,
            0,
            TypeData::Builtin {
                name: interner.intern("..."),
            },
        ));
        Environment {
            interner,
            types,
            decls: DeclArena::new(),
            scopes: ScopeArena::new(),
            tus: TuArena::new(),
            canonical: CanonicalRegistry::new(),
            void_type,
            variadic_type,
        }
    }

    pub fn void_type(&self) -> TypeId {
        self.void_type
    }

    pub fn variadic_parameter_type(&self) -> TypeId {
        self.variadic_type
    }

    pub fn canonicalization_is_done(&self) -> bool {
        self.canonical.is_done()
    }

    /// Canonicalize `id` now, or defer it if it is "risky" (spec.md §4.4).
    /// Returns the type's own id when deferred — callers needing the final
    /// canonical handle must wait for [`Self::perform_late_type_canonicalizing`].
    pub fn canonicalize_type(&mut self, id: TypeId) -> TypeId {
        if crate::canonicalize::is_risky(&self.types, id) {
            self.canonical.schedule_late(id);
            return id;
        }
        self.canonical.canonicalize(&mut self.types, &self.decls, id)
    }

    pub fn schedule_late_canonicalization(&mut self, id: TypeId) {
        self.canonical.schedule_late(id);
    }

    /// Drains the late-canonicalization queue built up while reading one or
    /// more translation units (spec.md §4.5 step 7), then marks
    /// canonicalization done for this environment. Testable property 5:
    /// every type that was on the queue has a canonical handle afterward.
    pub fn perform_late_type_canonicalizing(&mut self) {
        loop {
            let queue = self.canonical.drain_late_queue();
            if queue.is_empty() {
                break;
            }
            for id in queue {
                if self.types[id].canonical.is_none() {
                    self.canonical.canonicalize(&mut self.types, &self.decls, id);
                }
            }
        }
        self.canonical.mark_done();
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassData, ClassKind};

    #[test]
    fn late_canonicalization_covers_every_queued_type() {
        let mut env = Environment::new();
        let name = env.interner.intern("S");
        let class = env.types.push(Type::new(
            32,
            32,
            TypeData::ClassOrUnion(ClassData {
                name,
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
        let deferred = env.canonicalize_type(class);
        assert_eq!(deferred, class);
        assert!(env.types[class].canonical.is_none());

        env.perform_late_type_canonicalizing();
        assert!(env.types[class].canonical.is_some());
        assert!(env.canonicalization_is_done());
    }

    #[test]
    fn void_and_variadic_singletons_are_distinct() {
        let env = Environment::new();
        assert_ne!(env.void_type(), env.variadic_parameter_type());
    }
}
