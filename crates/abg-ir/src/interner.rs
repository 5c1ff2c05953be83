//! String interning (spec.md §3, "Interned string"): a handle whose identity
//! is pointer-equal when content-equal within one [`crate::Environment`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An interned string. Two `IString`s compare equal iff they came from the
/// same [`Interner`] and were interned from equal content — in practice this
/// is implemented as pointer equality on the shared `Rc<str>` payload, which
/// is cheaper than a content comparison and is exactly the identity
/// guarantee spec.md asks for.
#[derive(Clone)]
pub struct IString(Rc<str>);

impl IString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for IString {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for IString {}

impl Hash for IString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const () as usize).hash(state)
    }
}

impl fmt::Debug for IString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for IString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::borrow::Borrow<str> for IString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The string pool. Lives inside [`crate::Environment`]; uses interior
/// mutability so `Environment::intern` can take `&self` the way the
/// canonical-type registry does.
#[derive(Default)]
pub struct Interner {
    table: RefCell<HashMap<Box<str>, Rc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, s: &str) -> IString {
        let mut table = self.table.borrow_mut();
        if let Some(existing) = table.get(s) {
            return IString(existing.clone());
        }
        let rc: Rc<str> = Rc::from(s);
        table.insert(Box::from(s), rc.clone());
        IString(rc)
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_content_yields_identity_equal_handles() {
        let interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert!(Rc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn distinct_content_is_not_equal() {
        let interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
    }
}
