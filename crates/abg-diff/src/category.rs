//! Change categories (spec.md §4.7 "Change categories"): a bitset per diff
//! node, assigned in a separable post-pass over the tree ([`crate::categorize`]).

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChangeCategory: u32 {
        const NONE = 0;
        const ACCESS_CHANGE = 1 << 0;
        const COMPATIBLE_TYPE_CHANGE = 1 << 1;
        const HARMLESS_DECL_NAME_CHANGE = 1 << 2;
        const NON_VIRTUAL_MEMBER_FN_CHANGE = 1 << 3;
        const STATIC_DATA_MEMBER_CHANGE = 1 << 4;
        const HARMLESS_ENUM_CHANGE = 1 << 5;
        const HARMLESS_SYMBOL_ALIAS_CHANGE = 1 << 6;
        const REDUNDANT = 1 << 7;
        const SUPPRESSED = 1 << 8;
    }
}

impl ChangeCategory {
    /// The categories spec.md §4.7 treats as not affecting ABI compatibility
    /// on their own; used by a filtering context to mask harmless noise.
    pub fn harmless() -> ChangeCategory {
        ChangeCategory::COMPATIBLE_TYPE_CHANGE
            | ChangeCategory::HARMLESS_DECL_NAME_CHANGE
            | ChangeCategory::NON_VIRTUAL_MEMBER_FN_CHANGE
            | ChangeCategory::HARMLESS_ENUM_CHANGE
            | ChangeCategory::HARMLESS_SYMBOL_ALIAS_CHANGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitor_accumulates_and_contains_checks_subset() {
        let mut c = ChangeCategory::NONE;
        c.insert(ChangeCategory::ACCESS_CHANGE);
        c.insert(ChangeCategory::SUPPRESSED);
        assert!(c.contains(ChangeCategory::ACCESS_CHANGE));
        assert!(!c.contains(ChangeCategory::HARMLESS_ENUM_CHANGE));
        assert!(c.intersects(ChangeCategory::harmless() | ChangeCategory::SUPPRESSED));
    }
}
